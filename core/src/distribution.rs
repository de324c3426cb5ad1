//! Blood distributions (shipments) and the canonical shipment phase.

use crate::blood::{BloodProduct, BloodType};
use crate::error::{BloodBankError, Result};
use crate::ids::{BloodBankId, DistributionId, FacilityId, InventoryUnitId, RequestId, UserId};
use crate::request::ProcessingStatus;
use crate::tracking::TrackLabel;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle phase of one shipment.
///
/// This is the single source of truth for shipment status. The request-level
/// [`ProcessingStatus`] and the trail's [`TrackLabel`] are derived from it.
///
/// ```text
/// pending_receive ──► in_transit ──► delivered
///        │                 │             │
///        ▼                 └──► returned ◄┘
///    cancelled
/// ```
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShipmentPhase {
    /// Created, waiting to leave the blood bank
    #[default]
    PendingReceive,
    /// On its way to the destination facility
    InTransit,
    /// Arrived at the destination facility
    Delivered,
    /// Withdrawn before dispatch
    Cancelled,
    /// Sent back to the issuing blood bank
    Returned,
}

/// Which party's name is used as the location of a trail entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LocationSide {
    /// The issuing blood bank
    Origin,
    /// The receiving facility
    Destination,
}

impl ShipmentPhase {
    /// Every phase.
    pub const ALL: [Self; 5] = [
        Self::PendingReceive,
        Self::InTransit,
        Self::Delivered,
        Self::Cancelled,
        Self::Returned,
    ];

    /// Convert to the stored string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::PendingReceive => "pending_receive",
            Self::InTransit => "in_transit",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
            Self::Returned => "returned",
        }
    }

    /// Parse from the stored string representation.
    ///
    /// # Errors
    ///
    /// Returns [`BloodBankError::Validation`] for unknown values.
    pub fn parse(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| BloodBankError::Validation(format!("invalid distribution status '{s}'")))
    }

    /// Phases reachable from `self` in one step, including `self`.
    #[must_use]
    pub const fn allowed_next(self) -> &'static [Self] {
        match self {
            Self::PendingReceive => &[Self::PendingReceive, Self::InTransit, Self::Cancelled],
            Self::InTransit => &[Self::InTransit, Self::Delivered, Self::Returned],
            Self::Delivered => &[Self::Delivered, Self::Returned],
            Self::Cancelled => &[Self::Cancelled],
            Self::Returned => &[Self::Returned],
        }
    }

    /// Whether a shipment may move from `self` to `next`.
    #[must_use]
    pub fn can_transition_to(self, next: Self) -> bool {
        self.allowed_next().contains(&next)
    }

    /// Whether no other phase is reachable.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Cancelled | Self::Returned)
    }

    /// Request-level progress implied by a shipment in this phase.
    #[must_use]
    pub const fn to_processing_status(self) -> ProcessingStatus {
        match self {
            Self::PendingReceive => ProcessingStatus::Initiated,
            Self::InTransit => ProcessingStatus::Dispatched,
            Self::Delivered => ProcessingStatus::Completed,
            Self::Cancelled | Self::Returned => ProcessingStatus::Pending,
        }
    }

    /// Label recorded on the trail when a shipment enters this phase.
    #[must_use]
    pub const fn to_track_label(self) -> TrackLabel {
        match self {
            Self::PendingReceive => TrackLabel::PendingReceive,
            Self::InTransit => TrackLabel::Dispatched,
            Self::Delivered => TrackLabel::Received,
            Self::Cancelled => TrackLabel::Cancelled,
            Self::Returned => TrackLabel::Returned,
        }
    }

    /// Where a shipment in this phase is located.
    #[must_use]
    pub const fn location_side(self) -> LocationSide {
        match self {
            Self::PendingReceive | Self::InTransit => LocationSide::Origin,
            Self::Delivered | Self::Cancelled | Self::Returned => LocationSide::Destination,
        }
    }

    /// Whether entering this phase puts the shipped units back into stock.
    #[must_use]
    pub const fn returns_stock(self) -> bool {
        matches!(self, Self::Cancelled | Self::Returned)
    }

    /// Whether a shipment in this phase counts toward a request's distributed quantity.
    #[must_use]
    pub const fn counts_as_distributed(self) -> bool {
        !matches!(self, Self::Cancelled)
    }
}

impl fmt::Display for ShipmentPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One physical shipment from a blood bank to a facility.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BloodDistribution {
    /// Distribution id
    pub id: DistributionId,
    /// Unique public tracking code
    pub tracking_number: String,
    /// Batch code, `YYYYMMDD-XXXX`
    pub batch_number: String,
    /// Shipped product
    pub blood_product: BloodProduct,
    /// Shipped blood group
    pub blood_type: BloodType,
    /// Units shipped, always positive
    pub quantity: u32,
    /// Current phase
    pub status: ShipmentPhase,
    /// When the shipment left the blood bank
    pub date_dispatched: Option<DateTime<Utc>>,
    /// When the shipment arrived
    pub date_delivered: Option<DateTime<Utc>>,
    /// Last day the product may be used
    pub expiry_date: Option<NaiveDate>,
    /// `Some(false)` flags a cold-chain breach
    pub temperature_maintained: Option<bool>,
    /// Issuing blood bank
    pub dispatched_from_id: BloodBankId,
    /// Receiving facility
    pub dispatched_to_id: FacilityId,
    /// Inventory unit the stock was taken from
    pub inventory_unit_id: Option<InventoryUnitId>,
    /// Request this shipment fulfils
    pub request_id: Option<RequestId>,
    /// Author
    pub created_by_id: UserId,
    /// Free-text notes
    pub notes: Option<String>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last modification time
    pub updated_at: DateTime<Utc>,
}

impl BloodDistribution {
    /// Whether the product is past its expiry date on `today`.
    #[must_use]
    pub fn is_expired(&self, today: NaiveDate) -> bool {
        self.expiry_date.is_some_and(|expiry| expiry <= today)
    }

    /// A shipment is safe unless it is expired or flagged for a temperature breach.
    #[must_use]
    pub fn is_safe(&self, today: NaiveDate) -> bool {
        !self.is_expired(today) && self.temperature_maintained != Some(false)
    }
}

/// Caller-supplied changes to a distribution. Absent fields are left alone.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributionPatch {
    /// New phase
    pub status: Option<ShipmentPhase>,
    /// Replacement notes
    pub notes: Option<String>,
    /// Replacement tracking number
    pub tracking_number: Option<String>,
    /// Replacement batch number
    pub batch_number: Option<String>,
    /// Explicit dispatch time
    pub date_dispatched: Option<DateTime<Utc>>,
    /// Explicit delivery time
    pub date_delivered: Option<DateTime<Utc>>,
    /// Replacement expiry date
    pub expiry_date: Option<NaiveDate>,
    /// Cold-chain flag
    pub temperature_maintained: Option<bool>,
}

impl DistributionPatch {
    /// A patch that only changes the phase.
    #[must_use]
    pub fn status(status: ShipmentPhase) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }
}

/// Validate a user-supplied tracking or batch code.
///
/// # Errors
///
/// Returns [`BloodBankError::Validation`] if the code is blank or the literal
/// placeholder `"string"`.
pub fn validate_code(field: &str, value: &str) -> Result<()> {
    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("string") {
        return Err(BloodBankError::Validation(format!(
            "{field} must be a real value, got '{value}'"
        )));
    }
    Ok(())
}

/// Aggregate counts of distributions per phase.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DistributionStats {
    /// All distributions considered
    pub total_distributions: u64,
    /// `pending_receive`
    pub pending_count: u64,
    /// `in_transit`
    pub in_transit_count: u64,
    /// `delivered`
    pub delivered_count: u64,
    /// `cancelled`
    pub cancelled_count: u64,
    /// `returned`
    pub returned_count: u64,
}

impl DistributionStats {
    /// Tally a set of distributions.
    #[must_use]
    pub fn tally<'a>(distributions: impl IntoIterator<Item = &'a BloodDistribution>) -> Self {
        distributions.into_iter().fold(Self::default(), |mut acc, d| {
            acc.total_distributions += 1;
            match d.status {
                ShipmentPhase::PendingReceive => acc.pending_count += 1,
                ShipmentPhase::InTransit => acc.in_transit_count += 1,
                ShipmentPhase::Delivered => acc.delivered_count += 1,
                ShipmentPhase::Cancelled => acc.cancelled_count += 1,
                ShipmentPhase::Returned => acc.returned_count += 1,
            }
            acc
        })
    }
}
