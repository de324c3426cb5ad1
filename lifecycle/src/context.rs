//! Injected environment and the per-call unit-of-work context.

use bloodbank_core::{
    BloodBankId, Clock, CodeGenerator, DomainEvent, FacilityId, LifecycleConfig,
    RandomCodeGenerator, SystemClock, UnitOfWork,
};
use chrono::{DateTime, NaiveDate, TimeDelta, Utc};
use std::fmt;
use std::sync::Arc;

/// Dependencies shared by every lifecycle component.
#[derive(Clone)]
pub struct LifecycleEnvironment {
    /// Source of "now"
    pub clock: Arc<dyn Clock>,
    /// Source of tracking and batch codes
    pub codes: Arc<dyn CodeGenerator>,
    /// Tunables
    pub config: LifecycleConfig,
}

impl LifecycleEnvironment {
    /// Build an environment from explicit parts.
    #[must_use]
    pub fn new(
        clock: Arc<dyn Clock>,
        codes: Arc<dyn CodeGenerator>,
        config: LifecycleConfig,
    ) -> Self {
        Self {
            clock,
            codes,
            config,
        }
    }

    /// System clock and random codes.
    #[must_use]
    pub fn production(config: LifecycleConfig) -> Self {
        Self::new(Arc::new(SystemClock), Arc::new(RandomCodeGenerator), config)
    }
}

impl fmt::Debug for LifecycleEnvironment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleEnvironment")
            .field("clock", &"<dyn Clock>")
            .field("codes", &"<dyn CodeGenerator>")
            .field("config", &self.config)
            .finish()
    }
}

/// One open unit of work plus the events it has produced so far.
///
/// Components borrow the context mutably for the duration of a call and never
/// commit it; the service decides when the unit ends.
pub struct UnitContext<'e, U> {
    uow: U,
    env: &'e LifecycleEnvironment,
    events: Vec<DomainEvent>,
}

impl<'e, U: UnitOfWork> UnitContext<'e, U> {
    /// Wrap a freshly opened unit of work.
    pub const fn new(uow: U, env: &'e LifecycleEnvironment) -> Self {
        Self {
            uow,
            env,
            events: Vec::new(),
        }
    }

    /// The underlying unit of work.
    pub const fn uow(&mut self) -> &mut U {
        &mut self.uow
    }

    /// The injected environment.
    #[must_use]
    pub const fn env(&self) -> &'e LifecycleEnvironment {
        self.env
    }

    /// Current time according to the injected clock.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        self.env.clock.now()
    }

    /// Current calendar day according to the injected clock.
    #[must_use]
    pub fn today(&self) -> NaiveDate {
        self.env.clock.today()
    }

    /// `today + days`, saturating at the calendar's end.
    #[must_use]
    pub fn days_from_today(&self, days: i64) -> NaiveDate {
        self.today()
            .checked_add_signed(TimeDelta::days(days))
            .unwrap_or(NaiveDate::MAX)
    }

    /// Queue an event for publication after commit.
    pub fn record(&mut self, event: DomainEvent) {
        self.events.push(event);
    }

    /// Events queued so far.
    #[must_use]
    pub fn events(&self) -> &[DomainEvent] {
        &self.events
    }

    /// Display name of a facility, if it exists.
    ///
    /// # Errors
    ///
    /// Propagates storage failures.
    pub async fn facility_name(&mut self, id: FacilityId) -> bloodbank_core::Result<Option<String>> {
        Ok(self.uow.get_facility(id).await?.map(|f| f.facility_name))
    }

    /// Display name of a blood bank, if it exists.
    ///
    /// # Errors
    ///
    /// Propagates storage failures.
    pub async fn blood_bank_name(
        &mut self,
        id: BloodBankId,
    ) -> bloodbank_core::Result<Option<String>> {
        Ok(self.uow.get_blood_bank(id).await?.map(|b| b.blood_bank_name))
    }

    /// Split into the unit of work and the queued events.
    pub fn into_parts(self) -> (U, Vec<DomainEvent>) {
        (self.uow, self.events)
    }
}
