//! Request fan-out and group-wide acceptance.

use crate::context::UnitContext;
use crate::trail::TrackingTrail;
use bloodbank_core::request::{DEFAULT_REQUESTER_CANCELLATION_REASON, SIBLING_CANCELLATION_REASON};
use bloodbank_core::{
    BloodBankError, BloodProduct, BloodRequest, BloodType, DistributionFilter, DomainEvent,
    FacilityDirection, FacilityId, NewTrackState, Priority, ProcessingStatus, RequestFilter, RequestGroupId,
    RequestId, RequestProgress, RequestStatus, Result, ShipmentPhase, UnitOfWork, UserId,
};
use chrono::{DateTime, Utc};
use std::collections::HashSet;

/// Input for [`RequestGroupCoordinator::create_group`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewRequestGroup {
    /// Requested blood group
    pub blood_type: BloodType,
    /// Requested product
    pub blood_product: BloodProduct,
    /// Units requested from each facility
    pub quantity: u32,
    /// Facilities asked to supply the blood
    pub facility_ids: Vec<FacilityId>,
    /// Who is asking
    pub requester_id: UserId,
    /// Urgency
    pub priority: Priority,
    /// Free-text notes
    pub notes: Option<String>,
}

impl NewRequestGroup {
    /// Build a request from raw blood type and product names.
    ///
    /// # Errors
    ///
    /// Returns [`BloodBankError::Validation`] for a malformed blood type or product.
    pub fn new(
        blood_type: &str,
        blood_product: &str,
        quantity: u32,
        facility_ids: Vec<FacilityId>,
        requester_id: UserId,
    ) -> Result<Self> {
        Ok(Self {
            blood_type: BloodType::parse(blood_type)?,
            blood_product: BloodProduct::new(blood_product)?,
            quantity,
            facility_ids,
            requester_id,
            priority: Priority::default(),
            notes: None,
        })
    }

    /// Set the urgency.
    #[must_use]
    pub const fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    /// Attach notes.
    #[must_use]
    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

/// Outcome of a fan-out.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GroupResult {
    /// The new group
    pub group_id: RequestGroupId,
    /// One request per target facility, master first
    pub requests: Vec<BloodRequest>,
}

/// Number of requests per decision status.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StatusCounts {
    /// Still waiting for a decision
    pub pending: usize,
    /// Accepted
    pub accepted: usize,
    /// Rejected
    pub rejected: usize,
    /// Cancelled
    pub cancelled: usize,
}

impl StatusCounts {
    const fn add(&mut self, status: RequestStatus) {
        match status {
            RequestStatus::Pending => self.pending += 1,
            RequestStatus::Accepted => self.accepted += 1,
            RequestStatus::Rejected => self.rejected += 1,
            RequestStatus::Cancelled => self.cancelled += 1,
        }
    }
}

/// A group seen through its master request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestGroupSummary {
    /// Group id
    pub group_id: RequestGroupId,
    /// The group's representative
    pub master: BloodRequest,
    /// Every other request in the group
    pub siblings: Vec<BloodRequest>,
    /// Requests per decision status, master included
    pub status_counts: StatusCounts,
    /// Number of requests in the group
    pub total_requests: usize,
    /// Latest modification across the group
    pub updated_at: DateTime<Utc>,
}

impl RequestGroupSummary {
    /// Build a summary from every request of one group.
    ///
    /// # Errors
    ///
    /// Returns [`BloodBankError::NotFound`] if the group is empty or has no master.
    pub fn from_requests(group_id: RequestGroupId, requests: Vec<BloodRequest>) -> Result<Self> {
        let mut status_counts = StatusCounts::default();
        let mut updated_at = None;
        for request in &requests {
            status_counts.add(request.request_status);
            updated_at = updated_at.max(Some(request.updated_at));
        }
        let Some(updated_at) = updated_at else {
            return Err(BloodBankError::not_found("RequestGroup", group_id));
        };

        let total_requests = requests.len();
        let (masters, siblings): (Vec<_>, Vec<_>) =
            requests.into_iter().partition(|r| r.is_master_request);
        let master = masters
            .into_iter()
            .next()
            .ok_or_else(|| BloodBankError::not_found("master request of group", group_id))?;

        Ok(Self {
            group_id,
            master,
            siblings,
            status_counts,
            total_requests,
            updated_at,
        })
    }

    /// Whether any request of the group finished processing.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        std::iter::once(&self.master)
            .chain(&self.siblings)
            .any(|r| r.processing_status == ProcessingStatus::Completed)
    }
}

/// Per-requester aggregate over request groups.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RequestStatistics {
    /// Distinct groups
    pub total_groups: usize,
    /// Requests across all groups
    pub total_requests: usize,
    /// Groups with at least one pending request
    pub pending_groups: usize,
    /// Groups with at least one accepted request
    pub accepted_groups: usize,
    /// Groups with at least one rejected request
    pub rejected_groups: usize,
    /// Groups with at least one cancelled request
    pub cancelled_groups: usize,
    /// Groups with at least one completed shipment
    pub completed_groups: usize,
}

/// Fans requests out to facilities and keeps each group consistent.
pub struct RequestGroupCoordinator<'c, 'e, U> {
    ctx: &'c mut UnitContext<'e, U>,
}

impl<'c, 'e, U: UnitOfWork> RequestGroupCoordinator<'c, 'e, U> {
    /// Borrow the context for request operations.
    pub const fn new(ctx: &'c mut UnitContext<'e, U>) -> Self {
        Self { ctx }
    }

    /// Create one pending request per target facility, all in one new group.
    ///
    /// The requester's own facility is dropped from the targets with a warning. The
    /// first remaining facility gets the master request.
    ///
    /// # Errors
    ///
    /// - [`BloodBankError::Validation`] for a zero quantity, an empty, oversized
    ///   or duplicated facility list, a requester without a facility, or when
    ///   only the requester's own facility was named
    /// - [`BloodBankError::NotFound`] for an unknown requester, or listing every
    ///   unknown facility
    pub async fn create_group(&mut self, input: NewRequestGroup) -> Result<GroupResult> {
        let max = self.ctx.env().config.max_group_facilities;
        if input.quantity == 0 {
            return Err(BloodBankError::Validation(
                "quantity must be greater than zero".to_string(),
            ));
        }
        if input.facility_ids.is_empty() {
            return Err(BloodBankError::Validation(
                "at least one facility must be selected".to_string(),
            ));
        }
        if input.facility_ids.len() > max {
            return Err(BloodBankError::Validation(format!(
                "at most {max} facilities can be requested at once"
            )));
        }
        let mut seen = HashSet::new();
        if let Some(duplicate) = input.facility_ids.iter().find(|id| !seen.insert(**id)) {
            return Err(BloodBankError::Validation(format!(
                "facility {duplicate} is listed more than once"
            )));
        }

        let requester = self
            .ctx
            .uow()
            .get_user(input.requester_id)
            .await?
            .ok_or_else(|| BloodBankError::not_found("User", input.requester_id))?;
        let Some(own_facility) = requester.facility_id else {
            return Err(BloodBankError::Validation(format!(
                "requester {} is not assigned to a facility",
                requester.id
            )));
        };

        let targets: Vec<FacilityId> = input
            .facility_ids
            .iter()
            .copied()
            .filter(|id| *id != own_facility)
            .collect();
        if targets.len() < input.facility_ids.len() {
            tracing::warn!(
                requester_id = %requester.id,
                facility_id = %own_facility,
                "Removed requester's own facility from request targets"
            );
        }
        if targets.is_empty() {
            return Err(BloodBankError::Validation(
                "cannot request from own facility".to_string(),
            ));
        }

        let missing = self.ctx.uow().find_missing_facilities(&targets).await?;
        if !missing.is_empty() {
            return Err(BloodBankError::not_found_many("Facility", missing));
        }

        let group_id = RequestGroupId::new();
        let now = self.ctx.now();
        let mut requests = Vec::with_capacity(targets.len());
        for (index, facility_id) in targets.into_iter().enumerate() {
            let request = BloodRequest {
                id: RequestId::new(),
                request_group_id: group_id,
                is_master_request: index == 0,
                requester_id: requester.id,
                fulfilled_by_id: None,
                facility_id,
                source_facility_id: own_facility,
                blood_type: input.blood_type,
                blood_product: input.blood_product.clone(),
                quantity_requested: input.quantity,
                request_status: RequestStatus::Pending,
                processing_status: ProcessingStatus::Pending,
                priority: input.priority,
                notes: input.notes.clone(),
                cancellation_reason: None,
                created_at: now,
                updated_at: now,
            };
            self.ctx.uow().insert_request(&request).await?;

            let location = self.ctx.facility_name(facility_id).await?;
            TrackingTrail::new(&mut *self.ctx)
                .append(NewTrackState {
                    request_id: request.id,
                    distribution_id: None,
                    status: RequestStatus::Pending.to_track_label(),
                    location,
                    notes: Some("Request created, awaiting processing".to_string()),
                    created_by: requester.id,
                })
                .await?;
            requests.push(request);
        }

        self.ctx.record(DomainEvent::RequestGroupCreated {
            group_id,
            request_ids: requests.iter().map(|r| r.id).collect(),
            requester_id: requester.id,
        });
        metrics::counter!("bloodbank.requests.created").increment(requests.len() as u64);
        tracing::info!(
            group_id = %group_id,
            requester_id = %requester.id,
            facilities = requests.len(),
            "Created request group"
        );
        Ok(GroupResult { group_id, requests })
    }

    /// Accept a request on behalf of its target facility and cancel its open siblings.
    ///
    /// Accepting an already accepted request is a no-op for the request itself
    /// but re-runs sibling cancellation.
    ///
    /// # Errors
    ///
    /// - [`BloodBankError::NotFound`] for an unknown request or user
    /// - [`BloodBankError::Validation`] if the request is rejected or cancelled
    pub async fn accept(&mut self, request_id: RequestId, fulfiller: UserId) -> Result<BloodRequest> {
        if self.ctx.uow().get_user(fulfiller).await?.is_none() {
            return Err(BloodBankError::not_found("User", fulfiller));
        }
        self.transition(request_id, RequestStatus::Accepted, None, fulfiller)
            .await
    }

    /// Move a request to `status`.
    ///
    /// Any request may be cancelled unless one of its shipments was delivered;
    /// rejected and cancelled requests never reopen. Accepting runs sibling
    /// cancellation. `reason` is kept for rejections and cancellations.
    ///
    /// # Errors
    ///
    /// - [`BloodBankError::NotFound`] for an unknown request
    /// - [`BloodBankError::Validation`] for a transition that is not allowed
    /// - [`BloodBankError::Conflict`] when cancelling a request with a delivered shipment
    pub async fn update_status(
        &mut self,
        request_id: RequestId,
        status: RequestStatus,
        reason: Option<String>,
        actor: UserId,
    ) -> Result<BloodRequest> {
        self.transition(request_id, status, reason, actor).await
    }

    /// Let a requester withdraw a request nobody has acted on yet.
    ///
    /// # Errors
    ///
    /// - [`BloodBankError::NotFound`] for an unknown request
    /// - [`BloodBankError::Forbidden`] if `user` did not make the request
    /// - [`BloodBankError::Conflict`] unless the request is pending
    pub async fn cancel_request(
        &mut self,
        request_id: RequestId,
        user: UserId,
        reason: Option<String>,
    ) -> Result<BloodRequest> {
        let request = self.load(request_id).await?;
        if request.requester_id != user {
            return Err(BloodBankError::Forbidden(format!(
                "only the requester may cancel request {request_id}"
            )));
        }
        if request.request_status != RequestStatus::Pending {
            return Err(BloodBankError::Conflict(format!(
                "request {request_id} is {}; only pending requests can be cancelled",
                request.request_status
            )));
        }
        let reason = reason.unwrap_or_else(|| DEFAULT_REQUESTER_CANCELLATION_REASON.to_string());
        self.transition(request_id, RequestStatus::Cancelled, Some(reason), user)
            .await
    }

    /// Delete a pending or cancelled request with everything it owns.
    ///
    /// # Errors
    ///
    /// - [`BloodBankError::NotFound`] for an unknown request
    /// - [`BloodBankError::Conflict`] if the request is accepted or rejected, or
    ///   still has a shipment that is pending or in transit
    pub async fn delete(&mut self, request_id: RequestId) -> Result<()> {
        let request = self.load(request_id).await?;
        if !request.is_deletable() {
            return Err(BloodBankError::Conflict(format!(
                "request {request_id} is {}; only pending or cancelled requests can be deleted",
                request.request_status
            )));
        }
        let in_flight = DistributionFilter {
            request: Some(request_id),
            statuses: vec![ShipmentPhase::PendingReceive, ShipmentPhase::InTransit],
            ..DistributionFilter::default()
        };
        if !self.ctx.uow().list_distributions(&in_flight).await?.is_empty() {
            return Err(BloodBankError::Conflict(format!(
                "request {request_id} still has distributions in flight"
            )));
        }

        self.ctx.uow().delete_request(request_id).await?;
        self.ctx.record(DomainEvent::RequestDeleted {
            request_id,
            group_id: request.request_group_id,
        });
        tracing::info!(request_id = %request_id, "Deleted request");
        Ok(())
    }

    /// Load a request.
    ///
    /// # Errors
    ///
    /// Returns [`BloodBankError::NotFound`] if it does not exist.
    pub async fn load(&mut self, request_id: RequestId) -> Result<BloodRequest> {
        self.ctx
            .uow()
            .get_request(request_id)
            .await?
            .ok_or_else(|| BloodBankError::not_found("BloodRequest", request_id))
    }

    /// Summarize a group.
    ///
    /// # Errors
    ///
    /// Returns [`BloodBankError::NotFound`] if the group does not exist or has lost its master.
    pub async fn get_group(&mut self, group_id: RequestGroupId) -> Result<RequestGroupSummary> {
        let requests = self
            .ctx
            .uow()
            .list_requests(&RequestFilter::group(group_id))
            .await?;
        RequestGroupSummary::from_requests(group_id, requests)
    }

    /// One summary per group made by `requester`, newest group first.
    ///
    /// Groups whose master was deleted are skipped.
    ///
    /// # Errors
    ///
    /// Propagates storage failures.
    pub async fn list_groups(&mut self, requester: UserId) -> Result<Vec<RequestGroupSummary>> {
        let requests = self
            .ctx
            .uow()
            .list_requests(&RequestFilter::requester(requester))
            .await?;

        let mut order: Vec<RequestGroupId> = Vec::new();
        let mut grouped: Vec<Vec<BloodRequest>> = Vec::new();
        for request in requests {
            if let Some(slot) = order.iter().position(|g| *g == request.request_group_id) {
                grouped[slot].push(request);
            } else {
                order.push(request.request_group_id);
                grouped.push(vec![request]);
            }
        }

        let mut summaries = Vec::with_capacity(order.len());
        for (group_id, requests) in order.into_iter().zip(grouped) {
            match RequestGroupSummary::from_requests(group_id, requests) {
                Ok(summary) => summaries.push(summary),
                Err(err) => {
                    tracing::warn!(group_id = %group_id, error = %err, "Skipping incomplete request group");
                }
            }
        }
        Ok(summaries)
    }

    /// Requests a facility received, sent or both, newest first.
    ///
    /// Cancelled requests are left out unless `status` asks for them.
    ///
    /// # Errors
    ///
    /// Propagates storage failures.
    pub async fn list_for_facility(
        &mut self,
        facility: FacilityId,
        direction: FacilityDirection,
        status: Option<RequestStatus>,
        processing_status: Option<ProcessingStatus>,
    ) -> Result<Vec<BloodRequest>> {
        let filter = RequestFilter::facility(facility, direction, status, processing_status);
        let requests = self.ctx.uow().list_requests(&filter).await?;
        tracing::debug!(
            facility_id = %facility,
            ?direction,
            count = requests.len(),
            "Listed facility requests"
        );
        Ok(requests)
    }

    /// Requests made on behalf of `from` and addressed to `to`, newest first.
    ///
    /// # Errors
    ///
    /// Propagates storage failures.
    pub async fn between_facilities(
        &mut self,
        from: FacilityId,
        to: FacilityId,
    ) -> Result<Vec<BloodRequest>> {
        self.ctx
            .uow()
            .list_requests(&RequestFilter::between(from, to))
            .await
    }

    /// Aggregate counts over every group made by `requester`.
    ///
    /// # Errors
    ///
    /// Propagates storage failures.
    pub async fn statistics(&mut self, requester: UserId) -> Result<RequestStatistics> {
        let groups = self.list_groups(requester).await?;
        Ok(groups
            .iter()
            .fold(RequestStatistics::default(), |mut stats, group| {
                let counts = group.status_counts;
                stats.total_groups += 1;
                stats.total_requests += group.total_requests;
                stats.pending_groups += usize::from(counts.pending > 0);
                stats.accepted_groups += usize::from(counts.accepted > 0);
                stats.rejected_groups += usize::from(counts.rejected > 0);
                stats.cancelled_groups += usize::from(counts.cancelled > 0);
                stats.completed_groups += usize::from(group.is_completed());
                stats
            }))
    }

    /// Distributed and outstanding quantities of a request.
    ///
    /// # Errors
    ///
    /// Returns [`BloodBankError::NotFound`] for an unknown request.
    pub async fn progress(&mut self, request_id: RequestId) -> Result<RequestProgress> {
        let request = self.load(request_id).await?;
        let distributions = self
            .ctx
            .uow()
            .list_distributions(&DistributionFilter::request(request_id))
            .await?;
        let total_distributed_quantity = distributions
            .iter()
            .filter(|d| d.status.counts_as_distributed())
            .fold(0u32, |sum, d| sum.saturating_add(d.quantity));
        Ok(RequestProgress {
            request_id,
            quantity_requested: request.quantity_requested,
            total_distributed_quantity,
            remaining_quantity: request.remaining_quantity(total_distributed_quantity),
        })
    }

    async fn transition(
        &mut self,
        request_id: RequestId,
        to: RequestStatus,
        reason: Option<String>,
        actor: UserId,
    ) -> Result<BloodRequest> {
        let mut request = self.load(request_id).await?;
        let from = request.request_status;
        if !from.can_transition_to(to) {
            return Err(BloodBankError::Validation(format!(
                "invalid request status transition from {from} to {to}"
            )));
        }

        if from != to {
            if to == RequestStatus::Cancelled {
                let delivered = DistributionFilter {
                    request: Some(request_id),
                    statuses: vec![ShipmentPhase::Delivered],
                    ..DistributionFilter::default()
                };
                if !self.ctx.uow().list_distributions(&delivered).await?.is_empty() {
                    return Err(BloodBankError::Conflict(format!(
                        "request {request_id} has a delivered distribution and cannot be cancelled"
                    )));
                }
            }

            request.request_status = to;
            request.updated_at = self.ctx.now();
            match to {
                RequestStatus::Accepted => request.fulfilled_by_id = Some(actor),
                RequestStatus::Rejected | RequestStatus::Cancelled => {
                    request.cancellation_reason.clone_from(&reason);
                }
                RequestStatus::Pending => {}
            }
            self.ctx.uow().update_request(&request).await?;

            let location = self.ctx.facility_name(request.facility_id).await?;
            let notes = match &reason {
                Some(reason) => format!("Request status changed from {from} to {to}: {reason}"),
                None => format!("Request status changed from {from} to {to}"),
            };
            TrackingTrail::new(&mut *self.ctx)
                .append(NewTrackState {
                    request_id,
                    distribution_id: None,
                    status: to.to_track_label(),
                    location,
                    notes: Some(notes),
                    created_by: actor,
                })
                .await?;

            self.ctx.record(DomainEvent::RequestStatusChanged {
                request_id,
                from,
                to,
                reason,
            });
            if to == RequestStatus::Accepted {
                self.ctx.record(DomainEvent::RequestAccepted {
                    request_id,
                    group_id: request.request_group_id,
                    fulfilled_by_id: actor,
                });
            }
            tracing::info!(
                request_id = %request_id,
                from = %from,
                to = %to,
                "Request status changed"
            );
        }

        if to == RequestStatus::Accepted {
            self.cancel_siblings(&request, actor).await?;
        }
        Ok(request)
    }

    async fn cancel_siblings(&mut self, kept: &BloodRequest, actor: UserId) -> Result<()> {
        let now = self.ctx.now();
        let cancelled = self
            .ctx
            .uow()
            .cancel_group_siblings(
                kept.request_group_id,
                kept.id,
                SIBLING_CANCELLATION_REASON,
                now,
            )
            .await?;
        if cancelled.is_empty() {
            return Ok(());
        }

        for sibling_id in &cancelled {
            let sibling = self.load(*sibling_id).await?;
            let location = self.ctx.facility_name(sibling.facility_id).await?;
            TrackingTrail::new(&mut *self.ctx)
                .append(NewTrackState {
                    request_id: *sibling_id,
                    distribution_id: None,
                    status: RequestStatus::Cancelled.to_track_label(),
                    location,
                    notes: Some(SIBLING_CANCELLATION_REASON.to_string()),
                    created_by: actor,
                })
                .await?;
        }

        metrics::counter!("bloodbank.requests.siblings_cancelled")
            .increment(cancelled.len() as u64);
        tracing::info!(
            group_id = %kept.request_group_id,
            kept_request_id = %kept.id,
            cancelled = cancelled.len(),
            "Cancelled sibling requests"
        );
        self.ctx.record(DomainEvent::SiblingRequestsCancelled {
            group_id: kept.request_group_id,
            kept_request_id: kept.id,
            cancelled_request_ids: cancelled,
        });
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn request(group: RequestGroupId, master: bool, status: RequestStatus, minute: u32) -> BloodRequest {
        let at = Utc.with_ymd_and_hms(2025, 1, 1, 10, minute, 0).unwrap();
        BloodRequest {
            id: RequestId::new(),
            request_group_id: group,
            is_master_request: master,
            requester_id: UserId::new(),
            fulfilled_by_id: None,
            facility_id: FacilityId::new(),
            source_facility_id: FacilityId::new(),
            blood_type: BloodType::ONegative,
            blood_product: BloodProduct::new("Platelets").unwrap(),
            quantity_requested: 2,
            request_status: status,
            processing_status: ProcessingStatus::Pending,
            priority: Priority::Urgent,
            notes: None,
            cancellation_reason: None,
            created_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn summary_counts_and_latest_update() {
        let group = RequestGroupId::new();
        let summary = RequestGroupSummary::from_requests(
            group,
            vec![
                request(group, false, RequestStatus::Cancelled, 5),
                request(group, true, RequestStatus::Pending, 1),
                request(group, false, RequestStatus::Accepted, 9),
            ],
        )
        .unwrap();

        assert!(summary.master.is_master_request);
        assert_eq!(summary.siblings.len(), 2);
        assert_eq!(summary.total_requests, 3);
        assert_eq!(summary.status_counts.pending, 1);
        assert_eq!(summary.status_counts.accepted, 1);
        assert_eq!(summary.status_counts.cancelled, 1);
        assert_eq!(
            summary.updated_at,
            Utc.with_ymd_and_hms(2025, 1, 1, 10, 9, 0).unwrap()
        );
    }

    #[test]
    fn missing_master_is_not_found() {
        let group = RequestGroupId::new();
        let err = RequestGroupSummary::from_requests(
            group,
            vec![request(group, false, RequestStatus::Pending, 0)],
        )
        .unwrap_err();
        assert!(matches!(err, BloodBankError::NotFound { .. }));
    }

    #[test]
    fn empty_group_is_not_found() {
        let group = RequestGroupId::new();
        assert!(RequestGroupSummary::from_requests(group, Vec::new()).is_err());
    }

    #[test]
    fn raw_input_is_validated() {
        let err = NewRequestGroup::new("Z+", "Whole Blood", 1, vec![], UserId::new()).unwrap_err();
        assert!(matches!(err, BloodBankError::Validation(_)));
        let ok = NewRequestGroup::new("o+", "Whole Blood", 2, vec![], UserId::new())
            .unwrap()
            .with_priority(Priority::Urgent);
        assert_eq!(ok.blood_type, BloodType::OPositive);
        assert_eq!(ok.priority, Priority::Urgent);
    }
}
