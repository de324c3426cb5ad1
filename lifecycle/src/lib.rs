//! # Blood Bank Lifecycle
//!
//! Request fan-out, the distribution state machine and the tracking trail.
//!
//! ## Components
//!
//! - **[`RequestGroupCoordinator`]**: creates a request group across facilities,
//!   accepts one request and cancels its open siblings
//! - **[`DistributionStateMachine`]**: creates shipments against inventory and
//!   enforces the phase transition table
//! - **[`InventoryLedger`]**: reserves and returns stock
//! - **[`RequestProcessingSync`]**: mirrors shipment phase onto the parent request
//! - **[`TrackingTrail`]**: append-only history of requests and shipments
//! - **[`BloodBankService`]**: runs each operation in one unit of work and
//!   publishes domain events after commit
//!
//! Components borrow a [`UnitContext`] and never commit; the service owns the
//! transaction boundary.
//!
//! ## Example
//!
//! ```ignore
//! use bloodbank_lifecycle::{BloodBankService, LifecycleEnvironment, NewRequestGroup};
//!
//! let service = BloodBankService::new(store, LifecycleEnvironment::production(config));
//! let group = service
//!     .create_request_group(NewRequestGroup::new("A-", "Plasma", 4, facilities, requester)?)
//!     .await?;
//! ```

pub mod context;
pub mod distribution;
pub mod group;
pub mod ledger;
pub mod service;
pub mod sync;
pub mod trail;

pub use context::{LifecycleEnvironment, UnitContext};
pub use distribution::{
    DEFAULT_DISTRIBUTION_NOTES, DistributionStateMachine, NewDistribution, ShipmentEffect,
    UpdatePlan, plan_update,
};
pub use group::{
    GroupResult, NewRequestGroup, RequestGroupCoordinator, RequestGroupSummary, RequestStatistics,
    StatusCounts,
};
pub use ledger::InventoryLedger;
pub use service::{BloodBankService, TrackQuery};
pub use sync::RequestProcessingSync;
pub use trail::TrackingTrail;
