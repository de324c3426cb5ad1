//! Distribution state machine.
//!
//! Status changes are planned by the pure [`plan_update`], which validates the
//! whole target state and describes the side effects the change implies. The
//! [`DistributionStateMachine`] then executes that plan inside the caller's
//! unit of work.
//!
//! ```text
//!   (current, patch, now) ──► plan_update ──► UpdatePlan { next, effects }
//!                                                   │
//!                                                   ▼
//!                         DistributionStateMachine::update executes effects:
//!                         tracking-number check, write, restock, trail, sync
//! ```

use crate::context::UnitContext;
use crate::ledger::InventoryLedger;
use crate::sync::RequestProcessingSync;
use crate::trail::TrackingTrail;
use bloodbank_core::distribution::{LocationSide, validate_code};
use bloodbank_core::{
    BloodBankError, BloodBankId, BloodDistribution, DistributionFilter, DistributionId,
    DistributionPatch, DistributionStats, DomainEvent, InventoryUnitId, NewTrackState,
    RequestId, RequestStatus, Result, ShipmentPhase, UnitOfWork, UserId,
};
use chrono::{DateTime, TimeDelta, Utc};
use smallvec::SmallVec;

/// Notes stored on a distribution created without any.
pub const DEFAULT_DISTRIBUTION_NOTES: &str = "Request dispatched";

/// Input for [`DistributionStateMachine::create`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewDistribution {
    /// Accepted request to fulfil
    pub request_id: RequestId,
    /// Issuing blood bank
    pub blood_bank_id: BloodBankId,
    /// Author
    pub created_by: UserId,
    /// Free-text notes
    pub notes: Option<String>,
    /// Unit to take stock from; chosen first-expiry-first when absent
    pub inventory_unit_id: Option<InventoryUnitId>,
}

impl NewDistribution {
    /// Ship a request from a blood bank.
    #[must_use]
    pub const fn new(request_id: RequestId, blood_bank_id: BloodBankId, created_by: UserId) -> Self {
        Self {
            request_id,
            blood_bank_id,
            created_by,
            notes: None,
            inventory_unit_id: None,
        }
    }

    /// Attach notes.
    #[must_use]
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Take stock from a specific unit.
    #[must_use]
    pub const fn from_unit(mut self, unit: InventoryUnitId) -> Self {
        self.inventory_unit_id = Some(unit);
        self
    }
}

/// Side effect implied by a distribution update.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ShipmentEffect {
    /// The new tracking number must not belong to another distribution
    ClaimTrackingNumber(String),
    /// Shipped units go back into stock. Unlinked shipments never took any,
    /// so they plan none.
    RestoreStock {
        /// Unit the stock came from
        unit: InventoryUnitId,
        /// Units to put back
        quantity: u32,
    },
    /// One trail entry describing the phase change
    AppendTrail {
        /// Phase before the update
        from: ShipmentPhase,
        /// Phase after the update
        to: ShipmentPhase,
    },
    /// The parent request's processing status must follow
    SyncRequest(RequestId),
}

/// Result of planning an update: the target state and what it implies.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UpdatePlan {
    /// The distribution as it will be stored
    pub next: BloodDistribution,
    /// Side effects, in execution order
    pub effects: SmallVec<[ShipmentEffect; 4]>,
}

impl UpdatePlan {
    /// Whether the update moves the distribution to another phase.
    #[must_use]
    pub fn changes_phase(&self) -> bool {
        self.effects
            .iter()
            .any(|e| matches!(e, ShipmentEffect::AppendTrail { .. }))
    }
}

/// Plan an update of `current` by `patch` at time `now`.
///
/// The whole target state is validated: the phase change must be in the
/// transition table, user-supplied codes must be real values, an expiry date
/// may not be in the past, `date_dispatched` may only be set on a shipment
/// that is in transit or delivered and `date_delivered` only on a delivered one.
///
/// # Errors
///
/// Returns [`BloodBankError::Validation`] naming the offending field or the
/// from→to pair; `current` is never modified.
pub fn plan_update(
    current: &BloodDistribution,
    patch: DistributionPatch,
    now: DateTime<Utc>,
) -> Result<UpdatePlan> {
    let from = current.status;
    let to = patch.status.unwrap_or(from);
    if !from.can_transition_to(to) {
        return Err(BloodBankError::Validation(format!(
            "invalid status transition from {from} to {to}"
        )));
    }

    let mut next = current.clone();
    let mut effects = SmallVec::new();

    if let Some(tracking_number) = patch.tracking_number {
        validate_code("tracking_number", &tracking_number)?;
        let tracking_number = tracking_number.trim().to_string();
        if tracking_number != current.tracking_number {
            effects.push(ShipmentEffect::ClaimTrackingNumber(tracking_number.clone()));
            next.tracking_number = tracking_number;
        }
    }
    if let Some(batch_number) = patch.batch_number {
        validate_code("batch_number", &batch_number)?;
        next.batch_number = batch_number.trim().to_string();
    }
    if let Some(expiry_date) = patch.expiry_date {
        if expiry_date < now.date_naive() {
            return Err(BloodBankError::Validation(format!(
                "expiry date {expiry_date} is in the past"
            )));
        }
        next.expiry_date = Some(expiry_date);
    }
    if let Some(dispatched) = patch.date_dispatched {
        if !matches!(to, ShipmentPhase::InTransit | ShipmentPhase::Delivered) {
            return Err(BloodBankError::Validation(format!(
                "date_dispatched can only be set when status is in_transit or delivered, not {to}"
            )));
        }
        next.date_dispatched = Some(dispatched);
    }
    if let Some(delivered) = patch.date_delivered {
        if to != ShipmentPhase::Delivered {
            return Err(BloodBankError::Validation(format!(
                "date_delivered can only be set when status is delivered, not {to}"
            )));
        }
        next.date_delivered = Some(delivered);
    }
    if let Some(notes) = patch.notes {
        next.notes = Some(notes);
    }
    if let Some(temperature_maintained) = patch.temperature_maintained {
        next.temperature_maintained = Some(temperature_maintained);
    }

    if from != to {
        next.status = to;
        match to {
            ShipmentPhase::InTransit => {
                next.date_dispatched.get_or_insert(now);
            }
            ShipmentPhase::Delivered => {
                next.date_delivered.get_or_insert(now);
            }
            _ => {}
        }
        if to.returns_stock() {
            if let Some(unit) = current.inventory_unit_id {
                effects.push(ShipmentEffect::RestoreStock {
                    unit,
                    quantity: current.quantity,
                });
            }
        }
        effects.push(ShipmentEffect::AppendTrail { from, to });
        if let Some(request_id) = current.request_id {
            effects.push(ShipmentEffect::SyncRequest(request_id));
        }
    }

    next.updated_at = now;
    Ok(UpdatePlan { next, effects })
}

/// Governs the lifecycle of single shipments.
pub struct DistributionStateMachine<'c, 'e, U> {
    ctx: &'c mut UnitContext<'e, U>,
}

impl<'c, 'e, U: UnitOfWork> DistributionStateMachine<'c, 'e, U> {
    /// Borrow the context for distribution operations.
    pub const fn new(ctx: &'c mut UnitContext<'e, U>) -> Self {
        Self { ctx }
    }

    /// Ship an accepted request.
    ///
    /// Product, group and quantity are copied from the request. Stock comes
    /// from the named unit, or from the bank's first-expiring matching unit.
    /// Without a matching unit the distribution is created unlinked when the
    /// configuration allows it.
    ///
    /// # Errors
    ///
    /// - [`BloodBankError::NotFound`] for a missing request, blood bank, user or unit
    /// - [`BloodBankError::Conflict`] if the request is not accepted, or no
    ///   unused tracking number could be generated
    /// - [`BloodBankError::Validation`] if the named unit holds another product or group
    /// - [`BloodBankError::InsufficientStock`] if the unit is short or foreign
    /// - [`BloodBankError::NoMatchingStock`] if no unit matches and unlinked
    ///   distributions are disabled
    pub async fn create(&mut self, input: NewDistribution) -> Result<BloodDistribution> {
        let request = self
            .ctx
            .uow()
            .get_request(input.request_id)
            .await?
            .ok_or_else(|| BloodBankError::not_found("BloodRequest", input.request_id))?;
        if request.request_status != RequestStatus::Accepted {
            return Err(BloodBankError::Conflict(format!(
                "request {} is {}; only accepted requests can be distributed",
                request.id, request.request_status
            )));
        }
        let bank_name = self
            .ctx
            .blood_bank_name(input.blood_bank_id)
            .await?
            .ok_or_else(|| BloodBankError::not_found("BloodBank", input.blood_bank_id))?;
        if self.ctx.uow().get_user(input.created_by).await?.is_none() {
            return Err(BloodBankError::not_found("User", input.created_by));
        }

        let quantity = request.quantity_requested;
        let product = request.blood_product.clone();
        let blood_type = request.blood_type;

        let inventory_unit_id = if let Some(unit_id) = input.inventory_unit_id {
            let unit = self
                .ctx
                .uow()
                .get_inventory_unit(unit_id)
                .await?
                .ok_or_else(|| BloodBankError::not_found("InventoryUnit", unit_id))?;
            if !unit.holds(&product, blood_type) {
                return Err(BloodBankError::Validation(format!(
                    "inventory unit {unit_id} holds {} {}, but the request is for {product} {blood_type}",
                    unit.blood_product, unit.blood_type
                )));
            }
            InventoryLedger::new(&mut *self.ctx)
                .reserve(unit_id, input.blood_bank_id, quantity)
                .await?;
            Some(unit_id)
        } else {
            let allow_unlinked = self.ctx.env().config.allow_unlinked_distributions;
            let mut ledger = InventoryLedger::new(&mut *self.ctx);
            match ledger
                .select_fifo(input.blood_bank_id, &product, blood_type, quantity)
                .await?
            {
                Some(unit) => {
                    ledger
                        .reserve(unit.id, input.blood_bank_id, quantity)
                        .await?;
                    Some(unit.id)
                }
                None if allow_unlinked => {
                    tracing::warn!(
                        request_id = %request.id,
                        blood_bank_id = %input.blood_bank_id,
                        quantity,
                        "No matching inventory unit, creating unlinked distribution"
                    );
                    None
                }
                None => {
                    return Err(BloodBankError::NoMatchingStock {
                        blood_bank_id: input.blood_bank_id.to_string(),
                        requested: quantity,
                    });
                }
            }
        };

        let tracking_number = self.unused_tracking_number().await?;
        let now = self.ctx.now();
        let today = self.ctx.today();
        let distribution = BloodDistribution {
            id: DistributionId::new(),
            tracking_number,
            batch_number: self.ctx.env().codes.batch_number(today),
            blood_product: product.clone(),
            blood_type,
            quantity,
            status: ShipmentPhase::PendingReceive,
            date_dispatched: None,
            date_delivered: None,
            expiry_date: today.checked_add_signed(TimeDelta::days(product.shelf_life_days())),
            temperature_maintained: Some(true),
            dispatched_from_id: input.blood_bank_id,
            // Ships to the requesting facility, not the supplier in facility_id.
            dispatched_to_id: request.source_facility_id,
            inventory_unit_id,
            request_id: Some(request.id),
            created_by_id: input.created_by,
            notes: Some(
                input
                    .notes
                    .unwrap_or_else(|| DEFAULT_DISTRIBUTION_NOTES.to_string()),
            ),
            created_at: now,
            updated_at: now,
        };
        self.ctx.uow().insert_distribution(&distribution).await?;

        TrackingTrail::new(&mut *self.ctx)
            .append(NewTrackState {
                request_id: request.id,
                distribution_id: Some(distribution.id),
                status: ShipmentPhase::PendingReceive.to_track_label(),
                location: Some(bank_name),
                notes: Some("Distribution created, awaiting dispatch".to_string()),
                created_by: input.created_by,
            })
            .await?;
        RequestProcessingSync::new(&mut *self.ctx)
            .sync(&distribution, input.created_by)
            .await?;

        self.ctx.record(DomainEvent::DistributionCreated {
            distribution_id: distribution.id,
            tracking_number: distribution.tracking_number.clone(),
            request_id: distribution.request_id,
            blood_bank_id: distribution.dispatched_from_id,
            quantity,
        });
        metrics::counter!("bloodbank.distributions.created").increment(1);
        tracing::info!(
            distribution_id = %distribution.id,
            tracking_number = %distribution.tracking_number,
            request_id = %request.id,
            quantity,
            "Created distribution"
        );
        Ok(distribution)
    }

    /// Apply a patch, validating it against the transition table first.
    ///
    /// # Errors
    ///
    /// - [`BloodBankError::NotFound`] if the distribution does not exist
    /// - [`BloodBankError::Validation`] for an illegal transition or field value
    /// - [`BloodBankError::Conflict`] if the new tracking number is taken
    pub async fn update(
        &mut self,
        distribution_id: DistributionId,
        patch: DistributionPatch,
        actor: UserId,
    ) -> Result<BloodDistribution> {
        let current = self.load(distribution_id).await?;
        let plan = plan_update(&current, patch, self.ctx.now())?;

        for effect in &plan.effects {
            if let ShipmentEffect::ClaimTrackingNumber(number) = effect {
                let taken = self
                    .ctx
                    .uow()
                    .find_distribution_by_tracking_number(number)
                    .await?
                    .is_some_and(|other| other.id != current.id);
                if taken {
                    return Err(BloodBankError::Conflict(format!(
                        "tracking number {number} is already in use"
                    )));
                }
            }
        }

        let next = plan.next;
        self.ctx.uow().update_distribution(&next).await?;

        for effect in plan.effects {
            match effect {
                ShipmentEffect::ClaimTrackingNumber(_) => {}
                ShipmentEffect::RestoreStock { unit, quantity } => {
                    InventoryLedger::new(&mut *self.ctx)
                        .restore(
                            unit,
                            next.dispatched_from_id,
                            &next.blood_product,
                            next.blood_type,
                            quantity,
                        )
                        .await?;
                }
                ShipmentEffect::AppendTrail { from, to } => {
                    self.append_transition(&next, from, to, actor).await?;
                }
                ShipmentEffect::SyncRequest(_) => {
                    RequestProcessingSync::new(&mut *self.ctx)
                        .sync(&next, actor)
                        .await?;
                }
            }
        }

        Ok(next)
    }

    /// Delete a distribution that has not left the blood bank yet.
    ///
    /// Linked stock goes back into its unit. A request left without any
    /// distribution falls back to processing status `pending`.
    ///
    /// # Errors
    ///
    /// - [`BloodBankError::NotFound`] if the distribution does not exist
    /// - [`BloodBankError::Conflict`] unless the distribution is `pending_receive`
    pub async fn delete(&mut self, distribution_id: DistributionId, actor: UserId) -> Result<()> {
        let distribution = self.load(distribution_id).await?;
        if distribution.status != ShipmentPhase::PendingReceive {
            return Err(BloodBankError::Conflict(format!(
                "distribution {distribution_id} is {}; only pending_receive distributions can be deleted",
                distribution.status
            )));
        }

        self.ctx.uow().delete_distribution(distribution_id).await?;

        if let Some(unit) = distribution.inventory_unit_id {
            InventoryLedger::new(&mut *self.ctx)
                .restore(
                    unit,
                    distribution.dispatched_from_id,
                    &distribution.blood_product,
                    distribution.blood_type,
                    distribution.quantity,
                )
                .await?;
        }

        if let Some(request_id) = distribution.request_id {
            let remaining = self
                .ctx
                .uow()
                .list_distributions(&DistributionFilter::request(request_id))
                .await?;
            if remaining.is_empty() {
                RequestProcessingSync::new(&mut *self.ctx)
                    .reset(request_id, actor)
                    .await?;
            }
        }

        self.ctx.record(DomainEvent::DistributionDeleted {
            distribution_id,
            request_id: distribution.request_id,
        });
        tracing::info!(distribution_id = %distribution_id, "Deleted distribution");
        Ok(())
    }

    /// Whether a distribution is still safe to use today.
    #[must_use]
    pub fn validate_safety(&self, distribution: &BloodDistribution) -> bool {
        distribution.is_safe(self.ctx.today())
    }

    /// Load a distribution.
    ///
    /// # Errors
    ///
    /// Returns [`BloodBankError::NotFound`] if it does not exist.
    pub async fn load(&mut self, distribution_id: DistributionId) -> Result<BloodDistribution> {
        self.ctx
            .uow()
            .get_distribution(distribution_id)
            .await?
            .ok_or_else(|| BloodBankError::not_found("BloodDistribution", distribution_id))
    }

    /// Distributions matching a filter, newest first.
    ///
    /// # Errors
    ///
    /// Propagates storage failures.
    pub async fn list(&mut self, filter: &DistributionFilter) -> Result<Vec<BloodDistribution>> {
        self.ctx.uow().list_distributions(filter).await
    }

    /// Per-phase counts, optionally for one blood bank.
    ///
    /// # Errors
    ///
    /// Propagates storage failures.
    pub async fn stats(&mut self, blood_bank: Option<BloodBankId>) -> Result<DistributionStats> {
        let filter = DistributionFilter {
            blood_bank,
            ..DistributionFilter::default()
        };
        let distributions = self.ctx.uow().list_distributions(&filter).await?;
        Ok(DistributionStats::tally(&distributions))
    }

    /// Shipments created within the last `days` days, newest first.
    ///
    /// # Errors
    ///
    /// Propagates storage failures.
    pub async fn recent(&mut self, days: i64) -> Result<Vec<BloodDistribution>> {
        let since = self
            .ctx
            .now()
            .checked_sub_signed(TimeDelta::days(days))
            .unwrap_or(DateTime::<Utc>::MIN_UTC);
        let filter = DistributionFilter {
            created_since: Some(since),
            ..DistributionFilter::default()
        };
        self.ctx.uow().list_distributions(&filter).await
    }

    /// Shipments not yet delivered whose product expires within `days_ahead` days.
    ///
    /// # Errors
    ///
    /// Propagates storage failures.
    pub async fn expiring(
        &mut self,
        days_ahead: i64,
        blood_bank: Option<BloodBankId>,
    ) -> Result<Vec<BloodDistribution>> {
        let filter = DistributionFilter {
            blood_bank,
            statuses: vec![ShipmentPhase::PendingReceive, ShipmentPhase::InTransit],
            expiring_on_or_before: Some(self.ctx.days_from_today(days_ahead)),
            ..DistributionFilter::default()
        };
        self.ctx.uow().list_distributions(&filter).await
    }

    async fn unused_tracking_number(&mut self) -> Result<String> {
        let config = &self.ctx.env().config;
        let length = config.tracking_number_length.max(1);
        let attempts = config.tracking_number_attempts.max(1);
        for attempt in 1..=attempts {
            let candidate = self.ctx.env().codes.code(length);
            let taken = self
                .ctx
                .uow()
                .find_distribution_by_tracking_number(&candidate)
                .await?
                .is_some();
            if !taken {
                return Ok(candidate);
            }
            tracing::debug!(attempt, "Tracking number collision, retrying");
        }
        Err(BloodBankError::Conflict(format!(
            "could not generate an unused tracking number after {attempts} attempts"
        )))
    }

    async fn append_transition(
        &mut self,
        distribution: &BloodDistribution,
        from: ShipmentPhase,
        to: ShipmentPhase,
        actor: UserId,
    ) -> Result<()> {
        if let Some(request_id) = distribution.request_id {
            let location = match to.location_side() {
                LocationSide::Origin => {
                    self.ctx
                        .blood_bank_name(distribution.dispatched_from_id)
                        .await?
                }
                LocationSide::Destination => {
                    self.ctx
                        .facility_name(distribution.dispatched_to_id)
                        .await?
                }
            };
            TrackingTrail::new(&mut *self.ctx)
                .append(NewTrackState {
                    request_id,
                    distribution_id: Some(distribution.id),
                    status: to.to_track_label(),
                    location,
                    notes: Some(format!("Distribution status changed from {from} to {to}")),
                    created_by: actor,
                })
                .await?;
        }

        self.ctx.record(DomainEvent::DistributionStatusChanged {
            distribution_id: distribution.id,
            from,
            to,
        });
        metrics::counter!(
            "bloodbank.distributions.transitions",
            "from" => from.as_str(),
            "to" => to.as_str()
        )
        .increment(1);
        tracing::info!(
            distribution_id = %distribution.id,
            from = %from,
            to = %to,
            "Distribution status changed"
        );
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use bloodbank_core::{BloodProduct, BloodType, FacilityId};
    use bloodbank_testing::{TransitionTest, assertions};
    use chrono::{NaiveDate, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap()
    }

    fn distribution(status: ShipmentPhase) -> BloodDistribution {
        BloodDistribution {
            id: DistributionId::new(),
            tracking_number: "ABCDEF123456".to_string(),
            batch_number: "20250101-AAAA".to_string(),
            blood_product: BloodProduct::new("Whole Blood").unwrap(),
            blood_type: BloodType::OPositive,
            quantity: 3,
            status,
            date_dispatched: None,
            date_delivered: None,
            expiry_date: NaiveDate::from_ymd_opt(2025, 2, 5),
            temperature_maintained: Some(true),
            dispatched_from_id: BloodBankId::new(),
            dispatched_to_id: FacilityId::new(),
            inventory_unit_id: Some(InventoryUnitId::new()),
            request_id: Some(RequestId::new()),
            created_by_id: UserId::new(),
            notes: None,
            created_at: now(),
            updated_at: now(),
        }
    }

    #[test]
    fn dispatch_stamps_date_and_plans_trail_and_sync() {
        let current = distribution(ShipmentPhase::PendingReceive);
        let plan = plan_update(
            &current,
            DistributionPatch::status(ShipmentPhase::InTransit),
            now(),
        )
        .unwrap();

        assert_eq!(plan.next.status, ShipmentPhase::InTransit);
        assert_eq!(plan.next.date_dispatched, Some(now()));
        assert_eq!(plan.next.date_delivered, None);
        assert_eq!(
            plan.effects.as_slice(),
            &[
                ShipmentEffect::AppendTrail {
                    from: ShipmentPhase::PendingReceive,
                    to: ShipmentPhase::InTransit,
                },
                ShipmentEffect::SyncRequest(current.request_id.unwrap()),
            ]
        );
    }

    #[test]
    fn explicit_dispatch_date_is_kept() {
        let current = distribution(ShipmentPhase::PendingReceive);
        let earlier = Utc.with_ymd_and_hms(2024, 12, 31, 8, 0, 0).unwrap();
        let patch = DistributionPatch {
            status: Some(ShipmentPhase::InTransit),
            date_dispatched: Some(earlier),
            ..DistributionPatch::default()
        };
        let plan = plan_update(&current, patch, now()).unwrap();
        assert_eq!(plan.next.date_dispatched, Some(earlier));
    }

    #[test]
    fn illegal_transition_names_both_phases() {
        let current = distribution(ShipmentPhase::PendingReceive);
        let err = plan_update(
            &current,
            DistributionPatch::status(ShipmentPhase::Delivered),
            now(),
        )
        .unwrap_err();
        assert_eq!(
            err,
            BloodBankError::Validation(
                "invalid status transition from pending_receive to delivered".to_string()
            )
        );
    }

    #[test]
    fn delivery_date_requires_delivered_target() {
        let current = distribution(ShipmentPhase::InTransit);
        let patch = DistributionPatch {
            date_delivered: Some(now()),
            ..DistributionPatch::default()
        };
        assert!(matches!(
            plan_update(&current, patch, now()),
            Err(BloodBankError::Validation(_))
        ));
    }

    #[test]
    fn return_restores_stock_before_trail() {
        let current = distribution(ShipmentPhase::Delivered);
        let plan = plan_update(
            &current,
            DistributionPatch::status(ShipmentPhase::Returned),
            now(),
        )
        .unwrap();
        assert_eq!(
            plan.effects.first(),
            Some(&ShipmentEffect::RestoreStock {
                unit: current.inventory_unit_id.unwrap(),
                quantity: 3,
            })
        );
    }

    #[test]
    fn self_transition_plans_no_side_effects() {
        let current = distribution(ShipmentPhase::InTransit);
        let patch = DistributionPatch {
            status: Some(ShipmentPhase::InTransit),
            notes: Some("Held at checkpoint".to_string()),
            ..DistributionPatch::default()
        };
        let plan = plan_update(&current, patch, now()).unwrap();
        assert!(plan.effects.is_empty());
        assert!(!plan.changes_phase());
        assert_eq!(plan.next.notes.as_deref(), Some("Held at checkpoint"));
    }

    #[test]
    fn placeholder_tracking_number_is_rejected() {
        let current = distribution(ShipmentPhase::PendingReceive);
        let patch = DistributionPatch {
            tracking_number: Some("string".to_string()),
            ..DistributionPatch::default()
        };
        assert!(plan_update(&current, patch, now()).is_err());
    }

    #[test]
    fn cancelling_a_pending_shipment_returns_stock() {
        TransitionTest::new(|current: &BloodDistribution, patch| plan_update(current, patch, now()))
            .given_state(distribution(ShipmentPhase::PendingReceive))
            .when(DistributionPatch::status(ShipmentPhase::Cancelled))
            .then_output(|current, plan| {
                assert_eq!(plan.next.status, ShipmentPhase::Cancelled);
                assert_eq!(plan.next.date_dispatched, None);
                assert!(plan.effects.contains(&ShipmentEffect::RestoreStock {
                    unit: current.inventory_unit_id.unwrap(),
                    quantity: current.quantity,
                }));
            })
            .run();
    }

    #[test]
    fn unlinked_shipments_plan_no_restock() {
        for (from, target) in [
            (ShipmentPhase::PendingReceive, ShipmentPhase::Cancelled),
            (ShipmentPhase::InTransit, ShipmentPhase::Returned),
        ] {
            let mut current = distribution(from);
            current.inventory_unit_id = None;
            let plan = plan_update(&current, DistributionPatch::status(target), now()).unwrap();
            assert!(
                !plan
                    .effects
                    .iter()
                    .any(|e| matches!(e, ShipmentEffect::RestoreStock { .. })),
                "{target} planned a restock for an unlinked shipment"
            );
            assert!(
                plan.effects
                    .contains(&ShipmentEffect::AppendTrail { from, to: target })
            );
        }
    }

    #[test]
    fn terminal_phases_reject_every_move() {
        for terminal in [ShipmentPhase::Cancelled, ShipmentPhase::Returned] {
            for target in ShipmentPhase::ALL.into_iter().filter(|p| *p != terminal) {
                TransitionTest::new(|current: &BloodDistribution, patch| {
                    plan_update(current, patch, now())
                })
                .given_state(distribution(terminal))
                .when(DistributionPatch::status(target))
                .then_rejected(assertions::assert_validation)
                .run();
            }
        }
    }

    #[test]
    fn past_expiry_is_rejected() {
        let current = distribution(ShipmentPhase::PendingReceive);
        let patch = DistributionPatch {
            expiry_date: NaiveDate::from_ymd_opt(2024, 12, 31),
            ..DistributionPatch::default()
        };
        assert!(plan_update(&current, patch, now()).is_err());
    }
}
