//! Domain events and the publisher port.
//!
//! Events are facts about committed state changes. They are collected while a
//! unit of work runs and handed to an [`EventPublisher`] only after the unit
//! commits, so a subscriber never observes a change that was rolled back.
//!
//! ```text
//! ┌──────────────┐     ┌──────────┐     ┌────────────────┐
//! │ Unit of work │ ──► │  commit  │ ──► │ EventPublisher │ ──► notifications,
//! │ (collects)   │     └──────────┘     └────────────────┘     dashboards, audit
//! └──────────────┘
//! ```
//!
//! Tracking-trail entries are not events; they are written inside the unit of
//! work as part of every transition.

use crate::distribution::ShipmentPhase;
use crate::ids::{BloodBankId, DistributionId, RequestGroupId, RequestId, UserId};
use crate::request::{ProcessingStatus, RequestStatus};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// A committed change to the request/distribution lifecycle.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    /// A request was fanned out to several facilities.
    RequestGroupCreated {
        /// New group
        group_id: RequestGroupId,
        /// One request per target facility, master first
        request_ids: Vec<RequestId>,
        /// Who asked
        requester_id: UserId,
    },
    /// A facility agreed to supply a request.
    RequestAccepted {
        /// Accepted request
        request_id: RequestId,
        /// Its group
        group_id: RequestGroupId,
        /// Who accepted
        fulfilled_by_id: UserId,
    },
    /// Open siblings were cancelled because another request was accepted.
    SiblingRequestsCancelled {
        /// Group the siblings belong to
        group_id: RequestGroupId,
        /// Request that was kept
        kept_request_id: RequestId,
        /// Requests that were cancelled
        cancelled_request_ids: Vec<RequestId>,
    },
    /// A request changed decision state.
    RequestStatusChanged {
        /// Request
        request_id: RequestId,
        /// Previous status
        from: RequestStatus,
        /// New status
        to: RequestStatus,
        /// Reason given, if any
        reason: Option<String>,
    },
    /// A request and everything it owned were deleted.
    RequestDeleted {
        /// Deleted request
        request_id: RequestId,
        /// Its group
        group_id: RequestGroupId,
    },
    /// A shipment was created.
    DistributionCreated {
        /// New shipment
        distribution_id: DistributionId,
        /// Its tracking number
        tracking_number: String,
        /// Request it fulfils
        request_id: Option<RequestId>,
        /// Issuing blood bank
        blood_bank_id: BloodBankId,
        /// Units shipped
        quantity: u32,
    },
    /// A shipment moved to another phase.
    DistributionStatusChanged {
        /// Shipment
        distribution_id: DistributionId,
        /// Previous phase
        from: ShipmentPhase,
        /// New phase
        to: ShipmentPhase,
    },
    /// A shipment that never left the bank was deleted.
    DistributionDeleted {
        /// Deleted shipment
        distribution_id: DistributionId,
        /// Request it was fulfilling
        request_id: Option<RequestId>,
    },
    /// A request's processing status followed its shipment.
    ProcessingStatusSynced {
        /// Request
        request_id: RequestId,
        /// Previous processing status
        from: ProcessingStatus,
        /// New processing status
        to: ProcessingStatus,
    },
}

impl DomainEvent {
    /// Stable, versioned event type name.
    ///
    /// # Examples
    ///
    /// ```
    /// use bloodbank_core::event::DomainEvent;
    /// use bloodbank_core::ids::{DistributionId, RequestId};
    ///
    /// let event = DomainEvent::DistributionDeleted {
    ///     distribution_id: DistributionId::new(),
    ///     request_id: Some(RequestId::new()),
    /// };
    /// assert_eq!(event.event_type(), "DistributionDeleted.v1");
    /// ```
    #[must_use]
    pub const fn event_type(&self) -> &'static str {
        match self {
            Self::RequestGroupCreated { .. } => "RequestGroupCreated.v1",
            Self::RequestAccepted { .. } => "RequestAccepted.v1",
            Self::SiblingRequestsCancelled { .. } => "SiblingRequestsCancelled.v1",
            Self::RequestStatusChanged { .. } => "RequestStatusChanged.v1",
            Self::RequestDeleted { .. } => "RequestDeleted.v1",
            Self::DistributionCreated { .. } => "DistributionCreated.v1",
            Self::DistributionStatusChanged { .. } => "DistributionStatusChanged.v1",
            Self::DistributionDeleted { .. } => "DistributionDeleted.v1",
            Self::ProcessingStatusSynced { .. } => "ProcessingStatusSynced.v1",
        }
    }
}

/// Errors raised by an [`EventPublisher`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EventPublishError {
    /// The downstream transport refused or lost the event.
    #[error("Publish failed for {event_type}: {reason}")]
    PublishFailed {
        /// Event that could not be delivered
        event_type: String,
        /// Transport message
        reason: String,
    },

    /// The event could not be encoded.
    #[error("Serialization failed: {0}")]
    Serialization(String),
}

/// Port through which committed domain events leave the lifecycle.
///
/// # Dyn Compatibility
///
/// This trait uses explicit `Pin<Box<dyn Future>>` returns instead of `async fn`
/// so the service can hold an `Arc<dyn EventPublisher>`.
pub trait EventPublisher: Send + Sync {
    /// Publish one event.
    ///
    /// # Errors
    ///
    /// Returns [`EventPublishError`] if the event could not be delivered.
    fn publish<'a>(
        &'a self,
        event: &'a DomainEvent,
    ) -> Pin<Box<dyn Future<Output = Result<(), EventPublishError>> + Send + 'a>>;
}

/// Publisher that discards every event.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopPublisher;

impl EventPublisher for NoopPublisher {
    fn publish<'a>(
        &'a self,
        _event: &'a DomainEvent,
    ) -> Pin<Box<dyn Future<Output = Result<(), EventPublishError>> + Send + 'a>> {
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_type_tag() {
        let event = DomainEvent::DistributionStatusChanged {
            distribution_id: DistributionId::new(),
            from: ShipmentPhase::PendingReceive,
            to: ShipmentPhase::InTransit,
        };
        let json = serde_json::to_value(&event).expect("serializable");
        assert_eq!(json["type"], "distribution_status_changed");
        assert_eq!(json["to"], "in_transit");
        let back: DomainEvent = serde_json::from_value(json).expect("deserializable");
        assert_eq!(back, event);
    }
}
