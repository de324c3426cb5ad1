//! Service facade: one unit of work per call, events after commit.

use crate::context::{LifecycleEnvironment, UnitContext};
use crate::distribution::{DistributionStateMachine, NewDistribution};
use crate::group::{
    GroupResult, NewRequestGroup, RequestGroupCoordinator, RequestGroupSummary, RequestStatistics,
};
use crate::trail::TrackingTrail;
use bloodbank_core::{
    BloodBankError, BloodBankId, BloodBankStore, BloodDistribution, BloodRequest,
    DistributionFilter, DistributionId, DistributionPatch, DistributionStats, DomainEvent,
    EventDelivery, EventPublisher, FacilityDirection, FacilityId, NewTrackState, NoopPublisher,
    ProcessingStatus, RequestGroupId, RequestId, RequestProgress, RequestStatus, Result,
    TrackState, UnitOfWork, UserId,
};
use std::sync::Arc;

/// Which trail [`BloodBankService::get_track_history`] reads.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TrackQuery {
    /// Every entry of a request
    Request(RequestId),
    /// Every entry of the distribution with this tracking number
    TrackingNumber(String),
}

/// Entry point for the request / distribution / tracking lifecycle.
///
/// Every method opens exactly one unit of work, runs the components against
/// it and commits once. A failing call commits nothing. Domain events queued
/// during the call are published after the commit under the configured
/// [`EventDelivery`] policy.
///
/// # Example
///
/// ```ignore
/// let service = BloodBankService::new(store, LifecycleEnvironment::production(config))
///     .with_publisher(Arc::new(notifications));
///
/// let group = service
///     .create_request_group(NewRequestGroup::new("O+", "Whole Blood", 2, facilities, nurse)?)
///     .await?;
/// let accepted = service.accept_request(group.requests[1].id, bank_officer).await?;
/// let shipment = service
///     .create_distribution(NewDistribution::new(accepted.id, bank_id, bank_officer))
///     .await?;
/// ```
pub struct BloodBankService<S> {
    store: S,
    env: LifecycleEnvironment,
    publisher: Arc<dyn EventPublisher>,
}

impl<S: BloodBankStore> BloodBankService<S> {
    /// Create a service that discards domain events.
    #[must_use]
    pub fn new(store: S, env: LifecycleEnvironment) -> Self {
        Self {
            store,
            env,
            publisher: Arc::new(NoopPublisher),
        }
    }

    /// Publish committed domain events through `publisher`.
    #[must_use]
    pub fn with_publisher(mut self, publisher: Arc<dyn EventPublisher>) -> Self {
        self.publisher = publisher;
        self
    }

    /// The injected environment.
    #[must_use]
    pub const fn environment(&self) -> &LifecycleEnvironment {
        &self.env
    }

    /// The underlying store.
    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Requests
    // ═══════════════════════════════════════════════════════════════════════

    /// Fan a request out to several facilities.
    ///
    /// # Errors
    ///
    /// See [`RequestGroupCoordinator::create_group`]. No request is created if any check fails.
    #[tracing::instrument(skip(self, input), fields(requester_id = %input.requester_id), name = "create_request_group")]
    pub async fn create_request_group(&self, input: NewRequestGroup) -> Result<GroupResult> {
        let mut ctx = self.open().await?;
        let result = RequestGroupCoordinator::new(&mut ctx)
            .create_group(input)
            .await?;
        self.commit(ctx).await?;
        Ok(result)
    }

    /// Accept a request and cancel its open siblings.
    ///
    /// # Errors
    ///
    /// See [`RequestGroupCoordinator::accept`].
    #[tracing::instrument(skip(self), name = "accept_request")]
    pub async fn accept_request(
        &self,
        request_id: RequestId,
        acting_user_id: UserId,
    ) -> Result<BloodRequest> {
        let mut ctx = self.open().await?;
        let request = RequestGroupCoordinator::new(&mut ctx)
            .accept(request_id, acting_user_id)
            .await?;
        self.commit(ctx).await?;
        Ok(request)
    }

    /// Move a request to another decision status.
    ///
    /// # Errors
    ///
    /// See [`RequestGroupCoordinator::update_status`].
    #[tracing::instrument(skip(self, reason), name = "update_request_status")]
    pub async fn update_request_status(
        &self,
        request_id: RequestId,
        status: RequestStatus,
        reason: Option<String>,
        acting_user_id: UserId,
    ) -> Result<BloodRequest> {
        let mut ctx = self.open().await?;
        let request = RequestGroupCoordinator::new(&mut ctx)
            .update_status(request_id, status, reason, acting_user_id)
            .await?;
        self.commit(ctx).await?;
        Ok(request)
    }

    /// Let the requester withdraw a pending request.
    ///
    /// # Errors
    ///
    /// See [`RequestGroupCoordinator::cancel_request`].
    #[tracing::instrument(skip(self, reason), name = "cancel_request")]
    pub async fn cancel_request(
        &self,
        request_id: RequestId,
        user_id: UserId,
        reason: Option<String>,
    ) -> Result<BloodRequest> {
        let mut ctx = self.open().await?;
        let request = RequestGroupCoordinator::new(&mut ctx)
            .cancel_request(request_id, user_id, reason)
            .await?;
        self.commit(ctx).await?;
        Ok(request)
    }

    /// Delete a pending or cancelled request.
    ///
    /// # Errors
    ///
    /// See [`RequestGroupCoordinator::delete`].
    #[tracing::instrument(skip(self), name = "delete_request")]
    pub async fn delete_request(&self, request_id: RequestId) -> Result<()> {
        let mut ctx = self.open().await?;
        RequestGroupCoordinator::new(&mut ctx)
            .delete(request_id)
            .await?;
        self.commit(ctx).await
    }

    /// Load one request.
    ///
    /// # Errors
    ///
    /// Returns [`BloodBankError::NotFound`] for an unknown request.
    pub async fn get_request(&self, request_id: RequestId) -> Result<BloodRequest> {
        let mut ctx = self.open().await?;
        let request = RequestGroupCoordinator::new(&mut ctx)
            .load(request_id)
            .await?;
        Self::close(ctx).await?;
        Ok(request)
    }

    /// Summarize one group.
    ///
    /// # Errors
    ///
    /// See [`RequestGroupCoordinator::get_group`].
    pub async fn get_request_group(&self, group_id: RequestGroupId) -> Result<RequestGroupSummary> {
        let mut ctx = self.open().await?;
        let summary = RequestGroupCoordinator::new(&mut ctx)
            .get_group(group_id)
            .await?;
        Self::close(ctx).await?;
        Ok(summary)
    }

    /// Every group made by a requester, newest first.
    ///
    /// # Errors
    ///
    /// Propagates storage failures.
    pub async fn list_request_groups(&self, requester_id: UserId) -> Result<Vec<RequestGroupSummary>> {
        let mut ctx = self.open().await?;
        let groups = RequestGroupCoordinator::new(&mut ctx)
            .list_groups(requester_id)
            .await?;
        Self::close(ctx).await?;
        Ok(groups)
    }

    /// Requests a facility received, sent or both, newest first. Cancelled
    /// requests are left out unless `request_status` asks for them.
    ///
    /// # Errors
    ///
    /// Propagates storage failures.
    #[tracing::instrument(skip(self), name = "list_facility_requests")]
    pub async fn list_facility_requests(
        &self,
        facility_id: FacilityId,
        direction: FacilityDirection,
        request_status: Option<RequestStatus>,
        processing_status: Option<ProcessingStatus>,
    ) -> Result<Vec<BloodRequest>> {
        let mut ctx = self.open().await?;
        let requests = RequestGroupCoordinator::new(&mut ctx)
            .list_for_facility(facility_id, direction, request_status, processing_status)
            .await?;
        Self::close(ctx).await?;
        Ok(requests)
    }

    /// Requests made on behalf of `from` and addressed to `to`, newest first.
    ///
    /// # Errors
    ///
    /// Propagates storage failures.
    pub async fn requests_between_facilities(
        &self,
        from: FacilityId,
        to: FacilityId,
    ) -> Result<Vec<BloodRequest>> {
        let mut ctx = self.open().await?;
        let requests = RequestGroupCoordinator::new(&mut ctx)
            .between_facilities(from, to)
            .await?;
        Self::close(ctx).await?;
        Ok(requests)
    }

    /// Aggregate counts over a requester's groups.
    ///
    /// # Errors
    ///
    /// Propagates storage failures.
    pub async fn request_statistics(&self, requester_id: UserId) -> Result<RequestStatistics> {
        let mut ctx = self.open().await?;
        let stats = RequestGroupCoordinator::new(&mut ctx)
            .statistics(requester_id)
            .await?;
        Self::close(ctx).await?;
        Ok(stats)
    }

    /// Distributed and outstanding quantities of a request.
    ///
    /// # Errors
    ///
    /// Returns [`BloodBankError::NotFound`] for an unknown request.
    pub async fn request_progress(&self, request_id: RequestId) -> Result<RequestProgress> {
        let mut ctx = self.open().await?;
        let progress = RequestGroupCoordinator::new(&mut ctx)
            .progress(request_id)
            .await?;
        Self::close(ctx).await?;
        Ok(progress)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Distributions
    // ═══════════════════════════════════════════════════════════════════════

    /// Ship an accepted request.
    ///
    /// # Errors
    ///
    /// See [`DistributionStateMachine::create`]. Stock is untouched if the call fails.
    #[tracing::instrument(skip(self), name = "create_distribution")]
    pub async fn create_distribution(&self, input: NewDistribution) -> Result<BloodDistribution> {
        let mut ctx = self.open().await?;
        let distribution = DistributionStateMachine::new(&mut ctx)
            .create(input)
            .await?;
        self.commit(ctx).await?;
        Ok(distribution)
    }

    /// Patch a distribution, possibly moving it to another phase.
    ///
    /// # Errors
    ///
    /// See [`DistributionStateMachine::update`]. The stored status is unchanged if the call fails.
    #[tracing::instrument(skip(self, patch), fields(status = ?patch.status), name = "update_distribution")]
    pub async fn update_distribution(
        &self,
        distribution_id: DistributionId,
        patch: DistributionPatch,
        acting_user_id: UserId,
    ) -> Result<BloodDistribution> {
        let mut ctx = self.open().await?;
        let distribution = DistributionStateMachine::new(&mut ctx)
            .update(distribution_id, patch, acting_user_id)
            .await?;
        self.commit(ctx).await?;
        Ok(distribution)
    }

    /// Delete a distribution that has not been dispatched.
    ///
    /// # Errors
    ///
    /// See [`DistributionStateMachine::delete`].
    #[tracing::instrument(skip(self), name = "delete_distribution")]
    pub async fn delete_distribution(
        &self,
        distribution_id: DistributionId,
        acting_user_id: UserId,
    ) -> Result<()> {
        let mut ctx = self.open().await?;
        DistributionStateMachine::new(&mut ctx)
            .delete(distribution_id, acting_user_id)
            .await?;
        self.commit(ctx).await
    }

    /// Load one distribution.
    ///
    /// # Errors
    ///
    /// Returns [`BloodBankError::NotFound`] for an unknown distribution.
    pub async fn get_distribution(&self, distribution_id: DistributionId) -> Result<BloodDistribution> {
        let mut ctx = self.open().await?;
        let distribution = DistributionStateMachine::new(&mut ctx)
            .load(distribution_id)
            .await?;
        Self::close(ctx).await?;
        Ok(distribution)
    }

    /// Distributions matching a filter, newest first.
    ///
    /// # Errors
    ///
    /// Propagates storage failures.
    pub async fn list_distributions(
        &self,
        filter: &DistributionFilter,
    ) -> Result<Vec<BloodDistribution>> {
        let mut ctx = self.open().await?;
        let distributions = DistributionStateMachine::new(&mut ctx).list(filter).await?;
        Self::close(ctx).await?;
        Ok(distributions)
    }

    /// Per-phase counts, optionally for one blood bank.
    ///
    /// # Errors
    ///
    /// Propagates storage failures.
    pub async fn distribution_stats(
        &self,
        blood_bank_id: Option<BloodBankId>,
    ) -> Result<DistributionStats> {
        let mut ctx = self.open().await?;
        let stats = DistributionStateMachine::new(&mut ctx)
            .stats(blood_bank_id)
            .await?;
        Self::close(ctx).await?;
        Ok(stats)
    }

    /// Shipments created within the last `days` days (default from config).
    ///
    /// # Errors
    ///
    /// Propagates storage failures.
    pub async fn recent_distributions(&self, days: Option<i64>) -> Result<Vec<BloodDistribution>> {
        let days = days.unwrap_or(self.env.config.recent_window_days);
        let mut ctx = self.open().await?;
        let distributions = DistributionStateMachine::new(&mut ctx).recent(days).await?;
        Self::close(ctx).await?;
        Ok(distributions)
    }

    /// Undelivered shipments expiring within `days_ahead` days (default from config).
    ///
    /// # Errors
    ///
    /// Propagates storage failures.
    pub async fn expiring_distributions(
        &self,
        days_ahead: Option<i64>,
        blood_bank_id: Option<BloodBankId>,
    ) -> Result<Vec<BloodDistribution>> {
        let days = days_ahead.unwrap_or(self.env.config.expiring_window_days);
        let mut ctx = self.open().await?;
        let distributions = DistributionStateMachine::new(&mut ctx)
            .expiring(days, blood_bank_id)
            .await?;
        Self::close(ctx).await?;
        Ok(distributions)
    }

    /// Whether a distribution is unexpired and kept cold.
    ///
    /// # Errors
    ///
    /// Returns [`BloodBankError::NotFound`] for an unknown distribution.
    pub async fn validate_safety(&self, distribution_id: DistributionId) -> Result<bool> {
        let mut ctx = self.open().await?;
        let mut machine = DistributionStateMachine::new(&mut ctx);
        let distribution = machine.load(distribution_id).await?;
        let safe = machine.validate_safety(&distribution);
        Self::close(ctx).await?;
        Ok(safe)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Tracking
    // ═══════════════════════════════════════════════════════════════════════

    /// Trail of a request or of a distribution, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`BloodBankError::NotFound`] for an unknown request or tracking number.
    #[tracing::instrument(skip(self), name = "get_track_history")]
    pub async fn get_track_history(&self, query: TrackQuery) -> Result<Vec<TrackState>> {
        let mut ctx = self.open().await?;
        let mut trail = TrackingTrail::new(&mut ctx);
        let history = match query {
            TrackQuery::Request(request_id) => trail.history_for_request(request_id).await?,
            TrackQuery::TrackingNumber(number) => trail.history_for_distribution(&number).await?,
        };
        Self::close(ctx).await?;
        tracing::debug!(entries = history.len(), "Loaded track history");
        Ok(history)
    }

    /// The newest trail entry of a distribution.
    ///
    /// # Errors
    ///
    /// Returns [`BloodBankError::NotFound`] for an unknown distribution.
    pub async fn latest_track_state(
        &self,
        distribution_id: DistributionId,
    ) -> Result<Option<TrackState>> {
        let mut ctx = self.open().await?;
        let latest = TrackingTrail::new(&mut ctx).latest(distribution_id).await?;
        Self::close(ctx).await?;
        Ok(latest)
    }

    /// Append a manual trail entry, such as a checkpoint scan.
    ///
    /// # Errors
    ///
    /// See [`TrackingTrail::append`].
    pub async fn append_track_state(&self, entry: NewTrackState) -> Result<TrackState> {
        let mut ctx = self.open().await?;
        let state = TrackingTrail::new(&mut ctx).append(entry).await?;
        self.commit(ctx).await?;
        Ok(state)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Unit of work
    // ═══════════════════════════════════════════════════════════════════════

    async fn open(&self) -> Result<UnitContext<'_, S::Tx>> {
        let uow = self.store.begin().await?;
        Ok(UnitContext::new(uow, &self.env))
    }

    async fn close(ctx: UnitContext<'_, S::Tx>) -> Result<()> {
        let (uow, _) = ctx.into_parts();
        uow.rollback().await
    }

    async fn commit(&self, ctx: UnitContext<'_, S::Tx>) -> Result<()> {
        let (uow, events) = ctx.into_parts();
        uow.commit().await?;
        self.publish(events).await
    }

    async fn publish(&self, events: Vec<DomainEvent>) -> Result<()> {
        let mut undelivered = Vec::new();
        for event in &events {
            if let Err(err) = self.publisher.publish(event).await {
                tracing::warn!(
                    event_type = event.event_type(),
                    error = %err,
                    "Failed to publish domain event"
                );
                metrics::counter!("bloodbank.events.dropped", "event_type" => event.event_type())
                    .increment(1);
                undelivered.push(format!("{}: {err}", event.event_type()));
            }
        }

        match self.env.config.event_delivery {
            EventDelivery::Required if !undelivered.is_empty() => {
                Err(BloodBankError::EventDelivery(undelivered.join("; ")))
            }
            EventDelivery::Required | EventDelivery::BestEffort => Ok(()),
        }
    }
}
