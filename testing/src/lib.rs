//! # Blood Bank Testing
//!
//! Testing utilities for the blood-bank lifecycle.
//!
//! This crate provides:
//! - [`InMemoryStore`]: a transactional store with fault injection
//! - Mock implementations of the injected environment (clocks, codes, publishers)
//! - [`World`]: seed data builders
//! - [`TransitionTest`]: Given-When-Then harness for pure transitions
//! - Property-based testing strategies
//!
//! ## Example
//!
//! ```ignore
//! use bloodbank_testing::{World, test_clock, SequentialCodes};
//!
//! #[tokio::test]
//! async fn fan_out() {
//!     let world = World::new().await;
//!     let st_mary = world.add_site("St Mary").await;
//!     let service = BloodBankService::new(world.store.clone(), test_environment());
//!     // ...
//! }
//! ```

use bloodbank_core::{Clock, CodeGenerator, DateTime, Utc};

pub mod fixtures;
pub mod memory;
pub mod transition_test;

/// Mock implementations of the injected environment.
pub mod mocks {
    use super::{Clock, CodeGenerator, DateTime, Utc};
    use bloodbank_core::environment::CODE_ALPHABET;
    use bloodbank_core::{DomainEvent, EventPublishError, EventPublisher};
    use chrono::TimeDelta;
    use std::collections::VecDeque;
    use std::future::Future;
    use std::pin::Pin;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::{Mutex, PoisonError};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use bloodbank_testing::mocks::FixedClock;
    /// use bloodbank_core::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// assert_eq!(clock.now(), clock.now());
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }

    /// Clock that advances one second on every read.
    ///
    /// Gives each trail entry a distinct timestamp so ordering assertions do
    /// not depend on tie-breaking.
    #[derive(Debug)]
    pub struct SteppingClock {
        start: DateTime<Utc>,
        ticks: AtomicU64,
    }

    impl SteppingClock {
        /// Start at `start`.
        #[must_use]
        pub const fn new(start: DateTime<Utc>) -> Self {
            Self {
                start,
                ticks: AtomicU64::new(0),
            }
        }
    }

    impl Clock for SteppingClock {
        fn now(&self) -> DateTime<Utc> {
            let tick = self.ticks.fetch_add(1, Ordering::Relaxed);
            let seconds = i64::try_from(tick).unwrap_or(i64::MAX);
            self.start + TimeDelta::seconds(seconds)
        }
    }

    /// Predictable codes: `"A00000000001"`, `"A00000000002"`, ... for a
    /// length of 12.
    #[derive(Debug)]
    pub struct SequentialCodes {
        next: AtomicU64,
    }

    impl SequentialCodes {
        /// Start from 1.
        #[must_use]
        pub const fn new() -> Self {
            Self {
                next: AtomicU64::new(1),
            }
        }
    }

    impl Default for SequentialCodes {
        fn default() -> Self {
            Self::new()
        }
    }

    impl CodeGenerator for SequentialCodes {
        fn code(&self, len: usize) -> String {
            let n = self.next.fetch_add(1, Ordering::Relaxed);
            let digits = n.to_string();
            let width = len.saturating_sub(1).max(digits.len());
            let code = format!("A{digits:0>width$}");
            code[code.len().saturating_sub(len)..].to_string()
        }
    }

    /// Codes handed out from a script, then `fallback` forever.
    ///
    /// Used to force tracking-number collisions.
    #[derive(Debug)]
    pub struct ScriptedCodes {
        script: Mutex<VecDeque<String>>,
        fallback: String,
    }

    impl ScriptedCodes {
        /// Hand out `script` in order, then `fallback`.
        #[must_use]
        pub fn new<I, T>(script: I, fallback: impl Into<String>) -> Self
        where
            I: IntoIterator<Item = T>,
            T: Into<String>,
        {
            Self {
                script: Mutex::new(script.into_iter().map(Into::into).collect()),
                fallback: fallback.into(),
            }
        }
    }

    impl CodeGenerator for ScriptedCodes {
        fn code(&self, len: usize) -> String {
            let next = self
                .script
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .pop_front();
            let code = next.unwrap_or_else(|| self.fallback.clone());
            if code.len() == len {
                code
            } else {
                // Fit the requested length.
                let filler = char::from(CODE_ALPHABET[0]);
                code.chars().chain(std::iter::repeat(filler)).take(len).collect()
            }
        }
    }

    /// Publisher that records every event it receives.
    #[derive(Debug, Default)]
    pub struct RecordingPublisher {
        events: Mutex<Vec<DomainEvent>>,
    }

    impl RecordingPublisher {
        /// Create an empty recorder.
        #[must_use]
        pub fn new() -> Self {
            Self::default()
        }

        /// Every event published so far, in order.
        #[must_use]
        pub fn events(&self) -> Vec<DomainEvent> {
            self.events
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
        }

        /// Type tags of every event published so far.
        #[must_use]
        pub fn event_types(&self) -> Vec<&'static str> {
            self.events().iter().map(DomainEvent::event_type).collect()
        }
    }

    impl EventPublisher for RecordingPublisher {
        fn publish<'a>(
            &'a self,
            event: &'a DomainEvent,
        ) -> Pin<Box<dyn Future<Output = Result<(), EventPublishError>> + Send + 'a>> {
            Box::pin(async move {
                self.events
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .push(event.clone());
                Ok(())
            })
        }
    }

    /// Publisher whose transport is always down.
    #[derive(Clone, Copy, Debug, Default)]
    pub struct FailingPublisher;

    impl EventPublisher for FailingPublisher {
        fn publish<'a>(
            &'a self,
            event: &'a DomainEvent,
        ) -> Pin<Box<dyn Future<Output = Result<(), EventPublishError>> + Send + 'a>> {
            Box::pin(async move {
                Err(EventPublishError::PublishFailed {
                    event_type: event.event_type().to_string(),
                    reason: "broker unavailable".to_string(),
                })
            })
        }
    }
}

/// Test helpers and utilities.
pub mod helpers {
    /// Route `tracing` output to the test harness.
    ///
    /// Honors `RUST_LOG`; safe to call from every test.
    pub fn init_test_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    }
}

/// Property-based testing utilities using proptest.
pub mod properties {
    use bloodbank_core::{BloodType, ShipmentPhase};
    use proptest::prelude::*;

    /// Any of the eight blood groups.
    pub fn blood_type() -> impl Strategy<Value = BloodType> {
        proptest::sample::select(BloodType::ALL.to_vec())
    }

    /// Any shipment phase.
    pub fn shipment_phase() -> impl Strategy<Value = ShipmentPhase> {
        proptest::sample::select(ShipmentPhase::ALL.to_vec())
    }

    /// A sequence of requested phases, legal or not.
    pub fn phase_requests(max_len: usize) -> impl Strategy<Value = Vec<ShipmentPhase>> {
        proptest::collection::vec(shipment_phase(), 0..=max_len)
    }

    /// Requested quantity within typical bounds.
    pub fn quantity() -> impl Strategy<Value = u32> {
        1u32..=20
    }
}

// Re-export commonly used items
pub use fixtures::{Site, World};
pub use helpers::init_test_tracing;
pub use memory::{InMemoryStore, InMemoryUnitOfWork, StoreData};
pub use mocks::{
    FailingPublisher, FixedClock, RecordingPublisher, ScriptedCodes, SequentialCodes,
    SteppingClock, test_clock,
};
pub use transition_test::{TransitionTest, assertions};

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_clock() {
        let clock = test_clock();
        assert_eq!(clock.now(), clock.now());
    }

    #[test]
    fn stepping_clock_advances_per_read() {
        let clock = SteppingClock::new(test_clock().now());
        let first = clock.now();
        let second = clock.now();
        assert_eq!((second - first).num_seconds(), 1);
    }

    #[test]
    fn sequential_codes_have_requested_length() {
        let codes = SequentialCodes::new();
        assert_eq!(codes.code(12), "A00000000001");
        assert_eq!(codes.code(12), "A00000000002");
        assert_eq!(codes.code(4).len(), 4);
    }

    #[test]
    fn scripted_codes_fall_back_after_script() {
        let codes = ScriptedCodes::new(["DUPLICATE001"], "FRESHCODE001");
        assert_eq!(codes.code(12), "DUPLICATE001");
        assert_eq!(codes.code(12), "FRESHCODE001");
        assert_eq!(codes.code(12), "FRESHCODE001");
    }

    #[tokio::test]
    async fn recording_publisher_keeps_order() {
        use bloodbank_core::{DomainEvent, EventPublisher, RequestGroupId, RequestId};

        let publisher = RecordingPublisher::new();
        let event = DomainEvent::RequestDeleted {
            request_id: RequestId::new(),
            group_id: RequestGroupId::new(),
        };
        publisher.publish(&event).await.unwrap();
        assert_eq!(publisher.events(), vec![event]);
    }
}
