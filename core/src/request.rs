//! Blood requests and their status vocabularies.

use crate::blood::{BloodProduct, BloodType};
use crate::error::{BloodBankError, Result};
use crate::ids::{FacilityId, RequestGroupId, RequestId, UserId};
use crate::tracking::TrackLabel;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Reason written on siblings cancelled because another facility accepted.
pub const SIBLING_CANCELLATION_REASON: &str =
    "Automatically cancelled - request fulfilled by another facility";

/// Reason used when a requester cancels without giving one.
pub const DEFAULT_REQUESTER_CANCELLATION_REASON: &str = "Cancelled by requester";

/// Decision state of a single request.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    /// Awaiting a decision from the target facility
    #[default]
    Pending,
    /// The target facility will supply the blood
    Accepted,
    /// The target facility declined
    Rejected,
    /// Withdrawn, by the requester or automatically
    Cancelled,
}

impl RequestStatus {
    /// Convert to the stored string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
            Self::Cancelled => "cancelled",
        }
    }

    /// Parse from the stored string representation.
    ///
    /// # Errors
    ///
    /// Returns [`BloodBankError::Validation`] for unknown values.
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(Self::Pending),
            "accepted" => Ok(Self::Accepted),
            "rejected" => Ok(Self::Rejected),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(BloodBankError::Validation(format!(
                "invalid request status '{other}'"
            ))),
        }
    }

    /// Whether a request may move from `self` to `next`.
    ///
    /// Anything may be cancelled; rejected and cancelled requests never reopen.
    /// A self-transition is always allowed (and is a no-op).
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, _)
                | (Self::Accepted, Self::Accepted | Self::Cancelled)
                | (Self::Rejected, Self::Rejected | Self::Cancelled)
                | (Self::Cancelled, Self::Cancelled)
        )
    }

    /// Whether siblings in this status are swept up by group cancellation.
    #[must_use]
    pub const fn is_open(self) -> bool {
        matches!(self, Self::Pending | Self::Accepted)
    }

    /// Label recorded on the trail when a request enters this status.
    #[must_use]
    pub const fn to_track_label(self) -> TrackLabel {
        match self {
            Self::Pending => TrackLabel::PendingReceive,
            Self::Accepted => TrackLabel::Dispatched,
            Self::Rejected => TrackLabel::Rejected,
            Self::Cancelled => TrackLabel::Cancelled,
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse shipment progress of a request, derived from its distributions.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessingStatus {
    /// Nothing is being shipped
    #[default]
    Pending,
    /// A shipment exists but has not left the blood bank
    Initiated,
    /// A shipment is on its way
    Dispatched,
    /// A shipment arrived
    Completed,
}

impl ProcessingStatus {
    /// Convert to the stored string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Initiated => "initiated",
            Self::Dispatched => "dispatched",
            Self::Completed => "completed",
        }
    }

    /// Parse from the stored string representation.
    ///
    /// # Errors
    ///
    /// Returns [`BloodBankError::Validation`] for unknown values.
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(Self::Pending),
            "initiated" => Ok(Self::Initiated),
            "dispatched" => Ok(Self::Dispatched),
            "completed" => Ok(Self::Completed),
            other => Err(BloodBankError::Validation(format!(
                "invalid processing status '{other}'"
            ))),
        }
    }

    /// Label recorded on the trail when a request reaches this status.
    #[must_use]
    pub const fn to_track_label(self) -> TrackLabel {
        match self {
            Self::Pending | Self::Initiated => TrackLabel::PendingReceive,
            Self::Dispatched => TrackLabel::Dispatched,
            Self::Completed => TrackLabel::Received,
        }
    }
}

impl fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Urgency of a request.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    /// Needed immediately
    Urgent,
    /// Routine
    #[default]
    NotUrgent,
}

impl Priority {
    /// Convert to the stored string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Urgent => "urgent",
            Self::NotUrgent => "not_urgent",
        }
    }

    /// Parse from the stored string representation.
    ///
    /// # Errors
    ///
    /// Returns [`BloodBankError::Validation`] for unknown values.
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "urgent" => Ok(Self::Urgent),
            "not_urgent" => Ok(Self::NotUrgent),
            other => Err(BloodBankError::Validation(format!(
                "invalid priority '{other}'"
            ))),
        }
    }
}

/// A request for blood sent to one facility.
///
/// Requests are created in groups: one row per target facility, all sharing
/// `request_group_id`, exactly one flagged as master.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BloodRequest {
    /// Request id
    pub id: RequestId,
    /// Group shared by all siblings of one fan-out
    pub request_group_id: RequestGroupId,
    /// The group's canonical representative
    pub is_master_request: bool,
    /// User who asked for blood
    pub requester_id: UserId,
    /// User who accepted the request
    pub fulfilled_by_id: Option<UserId>,
    /// Facility asked to supply the blood
    pub facility_id: FacilityId,
    /// Facility that needs the blood (the requester's facility)
    pub source_facility_id: FacilityId,
    /// Requested blood group
    pub blood_type: BloodType,
    /// Requested product
    pub blood_product: BloodProduct,
    /// Units requested, always positive
    pub quantity_requested: u32,
    /// Decision state
    pub request_status: RequestStatus,
    /// Shipment progress
    pub processing_status: ProcessingStatus,
    /// Urgency
    pub priority: Priority,
    /// Free-text notes from the requester
    pub notes: Option<String>,
    /// Why the request was cancelled or rejected
    pub cancellation_reason: Option<String>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last modification time
    pub updated_at: DateTime<Utc>,
}

impl BloodRequest {
    /// Units still missing once `distributed` units have been shipped.
    #[must_use]
    pub const fn remaining_quantity(&self, distributed: u32) -> u32 {
        self.quantity_requested.saturating_sub(distributed)
    }

    /// Whether the request may be deleted in its current status.
    #[must_use]
    pub const fn is_deletable(&self) -> bool {
        matches!(
            self.request_status,
            RequestStatus::Pending | RequestStatus::Cancelled
        )
    }
}

/// Distributed and outstanding quantities for one request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestProgress {
    /// Request the figures belong to
    pub request_id: RequestId,
    /// Units requested
    pub quantity_requested: u32,
    /// Sum of quantities over non-cancelled distributions
    pub total_distributed_quantity: u32,
    /// `max(0, requested - distributed)`
    pub remaining_quantity: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [RequestStatus; 4] = [
        RequestStatus::Pending,
        RequestStatus::Accepted,
        RequestStatus::Rejected,
        RequestStatus::Cancelled,
    ];

    #[test]
    fn anything_may_be_cancelled() {
        for from in ALL {
            assert!(from.can_transition_to(RequestStatus::Cancelled), "{from}");
        }
    }

    #[test]
    fn closed_requests_never_reopen() {
        for from in [RequestStatus::Rejected, RequestStatus::Cancelled] {
            assert!(!from.can_transition_to(RequestStatus::Pending));
            assert!(!from.can_transition_to(RequestStatus::Accepted));
        }
        assert!(!RequestStatus::Cancelled.can_transition_to(RequestStatus::Rejected));
        assert!(!RequestStatus::Accepted.can_transition_to(RequestStatus::Pending));
        assert!(!RequestStatus::Accepted.can_transition_to(RequestStatus::Rejected));
    }

    #[test]
    fn status_strings_round_trip() {
        for status in ALL {
            assert_eq!(RequestStatus::parse(status.as_str()), Ok(status));
        }
        assert!(RequestStatus::parse("fulfilled").is_err());
        assert_eq!(Priority::parse("not_urgent"), Ok(Priority::NotUrgent));
        assert_eq!(ProcessingStatus::parse("initiated"), Ok(ProcessingStatus::Initiated));
    }

    #[test]
    fn processing_labels() {
        assert_eq!(ProcessingStatus::Initiated.to_track_label(), TrackLabel::PendingReceive);
        assert_eq!(ProcessingStatus::Completed.to_track_label(), TrackLabel::Received);
    }
}
