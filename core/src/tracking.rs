//! Tracking-trail entries.
//!
//! A [`TrackState`] is an immutable snapshot of where a request or shipment
//! stood at a point in time. Entries are only ever appended; the ordered
//! sequence per request (or per distribution) is the audit trail.

use crate::ids::{DistributionId, RequestId, TrackStateId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Status label recorded on a tracking entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackLabel {
    /// Awaiting processing or dispatch
    PendingReceive,
    /// On its way (or accepted for dispatch)
    Dispatched,
    /// Arrived at its destination
    Received,
    /// Sent back to the issuing blood bank
    Returned,
    /// Declined by the supplying facility
    Rejected,
    /// Withdrawn
    Cancelled,
}

impl TrackLabel {
    /// Convert to the stored string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::PendingReceive => "pending_receive",
            Self::Dispatched => "dispatched",
            Self::Received => "received",
            Self::Returned => "returned",
            Self::Rejected => "rejected",
            Self::Cancelled => "cancelled",
        }
    }

    /// Parse from the stored string representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending_receive" => Some(Self::PendingReceive),
            "dispatched" => Some(Self::Dispatched),
            "received" => Some(Self::Received),
            "returned" => Some(Self::Returned),
            "rejected" => Some(Self::Rejected),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

impl fmt::Display for TrackLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One immutable tracking-trail entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackState {
    /// Entry id
    pub id: TrackStateId,
    /// Request this entry belongs to
    pub blood_request_id: RequestId,
    /// Shipment this entry describes, if any
    pub blood_distribution_id: Option<DistributionId>,
    /// Status label
    pub status: TrackLabel,
    /// Blood bank or facility name where the snapshot was taken
    pub location: Option<String>,
    /// Human-readable description of the change
    pub notes: Option<String>,
    /// When the entry was recorded
    pub timestamp: DateTime<Utc>,
    /// Who caused the change
    pub created_by_id: UserId,
}

/// Input for appending a tracking entry.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewTrackState {
    /// Request the entry belongs to
    pub request_id: RequestId,
    /// Shipment the entry describes, if any
    pub distribution_id: Option<DistributionId>,
    /// Status label
    pub status: TrackLabel,
    /// Location label
    pub location: Option<String>,
    /// Notes
    pub notes: Option<String>,
    /// Author
    pub created_by: UserId,
}

/// Which trail to read.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrackScope {
    /// Every entry attached to a request (request-level and shipment-level)
    Request(RequestId),
    /// Only entries attached to one shipment
    Distribution(DistributionId),
}
