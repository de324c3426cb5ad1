//! Append-only tracking trail.
//!
//! Entries are only ever inserted. There is no update or delete here; rows
//! disappear only when their parent request or distribution is deleted.

use crate::context::UnitContext;
use bloodbank_core::{
    BloodBankError, DistributionId, NewTrackState, RequestId, Result, TrackScope, TrackState,
    TrackStateId, UnitOfWork,
};

/// Reads and appends tracking entries.
pub struct TrackingTrail<'c, 'e, U> {
    ctx: &'c mut UnitContext<'e, U>,
}

impl<'c, 'e, U: UnitOfWork> TrackingTrail<'c, 'e, U> {
    /// Borrow the context for trail operations.
    pub const fn new(ctx: &'c mut UnitContext<'e, U>) -> Self {
        Self { ctx }
    }

    /// Append one entry stamped with the current time.
    ///
    /// # Errors
    ///
    /// Returns [`BloodBankError::NotFound`] if the request, or the distribution
    /// when one is given, does not exist.
    pub async fn append(&mut self, entry: NewTrackState) -> Result<TrackState> {
        if self.ctx.uow().get_request(entry.request_id).await?.is_none() {
            return Err(BloodBankError::not_found("BloodRequest", entry.request_id));
        }
        if let Some(distribution_id) = entry.distribution_id {
            if self
                .ctx
                .uow()
                .get_distribution(distribution_id)
                .await?
                .is_none()
            {
                return Err(BloodBankError::not_found(
                    "BloodDistribution",
                    distribution_id,
                ));
            }
        }

        let state = TrackState {
            id: TrackStateId::new(),
            blood_request_id: entry.request_id,
            blood_distribution_id: entry.distribution_id,
            status: entry.status,
            location: entry.location,
            notes: entry.notes,
            timestamp: self.ctx.now(),
            created_by_id: entry.created_by,
        };
        self.ctx.uow().insert_track_state(&state).await?;

        tracing::debug!(
            request_id = %state.blood_request_id,
            status = %state.status,
            "Appended track state"
        );
        Ok(state)
    }

    /// Every entry of a request, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`BloodBankError::NotFound`] if the request does not exist.
    pub async fn history_for_request(&mut self, request_id: RequestId) -> Result<Vec<TrackState>> {
        if self.ctx.uow().get_request(request_id).await?.is_none() {
            return Err(BloodBankError::not_found("BloodRequest", request_id));
        }
        self.ctx
            .uow()
            .list_track_states(TrackScope::Request(request_id))
            .await
    }

    /// Every entry of the distribution with this tracking number, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`BloodBankError::NotFound`] if no distribution has that tracking number.
    pub async fn history_for_distribution(
        &mut self,
        tracking_number: &str,
    ) -> Result<Vec<TrackState>> {
        let distribution = self
            .ctx
            .uow()
            .find_distribution_by_tracking_number(tracking_number)
            .await?
            .ok_or_else(|| BloodBankError::not_found("BloodDistribution", tracking_number))?;
        self.ctx
            .uow()
            .list_track_states(TrackScope::Distribution(distribution.id))
            .await
    }

    /// The newest entry of a distribution.
    ///
    /// # Errors
    ///
    /// Returns [`BloodBankError::NotFound`] if the distribution does not exist.
    pub async fn latest(&mut self, distribution_id: DistributionId) -> Result<Option<TrackState>> {
        if self
            .ctx
            .uow()
            .get_distribution(distribution_id)
            .await?
            .is_none()
        {
            return Err(BloodBankError::not_found(
                "BloodDistribution",
                distribution_id,
            ));
        }
        let entries = self
            .ctx
            .uow()
            .list_track_states(TrackScope::Distribution(distribution_id))
            .await?;
        Ok(entries.into_iter().next())
    }
}
