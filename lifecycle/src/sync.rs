//! Projection of shipment phase onto the parent request's processing status.

use crate::context::UnitContext;
use crate::trail::TrackingTrail;
use bloodbank_core::{
    BloodBankError, BloodDistribution, DomainEvent, NewTrackState, ProcessingStatus, RequestId,
    Result, UnitOfWork, UserId,
};

/// Keeps `BloodRequest::processing_status` in step with its shipments.
///
/// Writes only when the derived value differs from the stored one, and every
/// write leaves a request-level trail entry (no distribution attached).
pub struct RequestProcessingSync<'c, 'e, U> {
    ctx: &'c mut UnitContext<'e, U>,
}

impl<'c, 'e, U: UnitOfWork> RequestProcessingSync<'c, 'e, U> {
    /// Borrow the context for sync operations.
    pub const fn new(ctx: &'c mut UnitContext<'e, U>) -> Self {
        Self { ctx }
    }

    /// Follow a distribution's phase. Unlinked distributions are ignored.
    ///
    /// Returns the new processing status when it changed.
    ///
    /// # Errors
    ///
    /// Returns [`BloodBankError::NotFound`] if the linked request is gone.
    pub async fn sync(
        &mut self,
        distribution: &BloodDistribution,
        actor: UserId,
    ) -> Result<Option<ProcessingStatus>> {
        let Some(request_id) = distribution.request_id else {
            return Ok(None);
        };
        let target = distribution.status.to_processing_status();
        let location = self.ctx.facility_name(distribution.dispatched_to_id).await?;
        self.apply(request_id, target, location, actor).await
    }

    /// Reset a request to `pending` once it has no shipments left.
    ///
    /// # Errors
    ///
    /// Returns [`BloodBankError::NotFound`] if the request is gone.
    pub async fn reset(
        &mut self,
        request_id: RequestId,
        actor: UserId,
    ) -> Result<Option<ProcessingStatus>> {
        self.apply(request_id, ProcessingStatus::Pending, None, actor)
            .await
    }

    async fn apply(
        &mut self,
        request_id: RequestId,
        target: ProcessingStatus,
        location: Option<String>,
        actor: UserId,
    ) -> Result<Option<ProcessingStatus>> {
        let mut request = self
            .ctx
            .uow()
            .get_request(request_id)
            .await?
            .ok_or_else(|| BloodBankError::not_found("BloodRequest", request_id))?;

        let previous = request.processing_status;
        if previous == target {
            return Ok(None);
        }

        request.processing_status = target;
        request.updated_at = self.ctx.now();
        self.ctx.uow().update_request(&request).await?;

        let location = match location {
            Some(name) => Some(name),
            None => self.ctx.facility_name(request.source_facility_id).await?,
        };
        TrackingTrail::new(&mut *self.ctx)
            .append(NewTrackState {
                request_id,
                distribution_id: None,
                status: target.to_track_label(),
                location,
                notes: Some(format!(
                    "Processing status automatically updated from {previous} to {target}"
                )),
                created_by: actor,
            })
            .await?;

        self.ctx.record(DomainEvent::ProcessingStatusSynced {
            request_id,
            from: previous,
            to: target,
        });
        tracing::info!(
            request_id = %request_id,
            from = %previous,
            to = %target,
            "Synced request processing status"
        );
        Ok(Some(target))
    }
}
