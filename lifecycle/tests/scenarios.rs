//! End-to-end lifecycle scenarios against the in-memory store.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

mod common;

use bloodbank_core::request::SIBLING_CANCELLATION_REASON;
use bloodbank_core::{
    BloodBankError, BloodType, DistributionPatch, ProcessingStatus, RequestStatus, ShipmentPhase,
    TrackLabel,
};
use bloodbank_lifecycle::{NewDistribution, NewRequestGroup, TrackQuery};
use bloodbank_testing::assertions::{assert_conflict, assert_insufficient_stock, assert_validation};
use common::Harness;

#[tokio::test]
async fn scenario_a_accepting_one_request_cancels_its_siblings() {
    let h = Harness::new().await;
    let requests = h.request_group(2).await;

    assert_eq!(requests.len(), 3);
    let group_id = requests[0].request_group_id;
    assert!(requests.iter().all(|r| r.request_group_id == group_id));
    assert!(requests.iter().all(|r| r.request_status == RequestStatus::Pending));
    assert_eq!(requests.iter().filter(|r| r.is_master_request).count(), 1);
    assert!(requests.iter().all(|r| r.blood_type == BloodType::OPositive));

    let accepted = h
        .service
        .accept_request(requests[1].id, h.sites[1].staff.id)
        .await
        .unwrap();
    assert_eq!(accepted.request_status, RequestStatus::Accepted);
    assert_eq!(accepted.fulfilled_by_id, Some(h.sites[1].staff.id));

    for sibling in [&requests[0], &requests[2]] {
        let sibling = h.service.get_request(sibling.id).await.unwrap();
        assert_eq!(sibling.request_status, RequestStatus::Cancelled);
        assert!(
            sibling
                .cancellation_reason
                .as_deref()
                .unwrap()
                .contains("fulfilled by another facility")
        );
    }
    let kept = h.service.get_request(requests[1].id).await.unwrap();
    assert_eq!(kept.request_status, RequestStatus::Accepted);

    let summary = h.service.get_request_group(group_id).await.unwrap();
    assert_eq!(summary.status_counts.accepted, 1);
    assert_eq!(summary.status_counts.cancelled, 2);
    assert!(!summary.is_completed());
}

#[tokio::test]
async fn scenario_b_exhausted_unit_rejects_further_reservations() {
    let h = Harness::new().await;
    let site = &h.sites[0];
    let unit = h
        .world
        .add_stock(site.bank.id, "Platelets", BloodType::ANegative, 5, h.world.day(3))
        .await;

    let platelets = |quantity| {
        NewRequestGroup::new("A-", "Platelets", quantity, vec![site.facility.id], h.requester.id)
            .unwrap()
    };

    let first = h.service.create_request_group(platelets(5)).await.unwrap();
    h.service
        .accept_request(first.requests[0].id, site.staff.id)
        .await
        .unwrap();
    let shipment = h
        .service
        .create_distribution(
            NewDistribution::new(first.requests[0].id, site.bank.id, site.staff.id)
                .from_unit(unit.id),
        )
        .await
        .unwrap();
    assert_eq!(shipment.quantity, 5);
    assert_eq!(shipment.inventory_unit_id, Some(unit.id));
    assert_eq!(
        h.world.store.snapshot().await.unit(unit.id).unwrap().quantity,
        0
    );

    let second = h.service.create_request_group(platelets(1)).await.unwrap();
    h.service
        .accept_request(second.requests[0].id, site.staff.id)
        .await
        .unwrap();
    let err = h
        .service
        .create_distribution(
            NewDistribution::new(second.requests[0].id, site.bank.id, site.staff.id)
                .from_unit(unit.id),
        )
        .await
        .unwrap_err();
    assert_insufficient_stock(&err);
    assert_eq!(
        err,
        BloodBankError::InsufficientStock {
            unit_id: unit.id.to_string(),
            available: 0,
            requested: 1,
        }
    );
}

#[tokio::test]
async fn scenario_c_delivery_stamps_dates_and_leaves_three_trail_entries() {
    let h = Harness::new().await;
    let shipment = h.shipment(2, 0).await;
    let actor = h.sites[0].staff.id;

    h.service
        .update_distribution(shipment.id, DistributionPatch::status(ShipmentPhase::InTransit), actor)
        .await
        .unwrap();
    let delivered = h
        .service
        .update_distribution(shipment.id, DistributionPatch::status(ShipmentPhase::Delivered), actor)
        .await
        .unwrap();

    assert!(delivered.date_dispatched.is_some());
    assert!(delivered.date_delivered.is_some());
    assert!(delivered.date_dispatched <= delivered.date_delivered);

    let trail = h
        .service
        .get_track_history(TrackQuery::TrackingNumber(shipment.tracking_number.clone()))
        .await
        .unwrap();
    assert_eq!(trail.len(), 3);
    let labels: Vec<TrackLabel> = trail.iter().rev().map(|t| t.status).collect();
    assert_eq!(
        labels,
        vec![
            TrackLabel::PendingReceive,
            TrackLabel::Dispatched,
            TrackLabel::Received
        ]
    );
    assert!(trail.windows(2).all(|w| w[0].timestamp > w[1].timestamp));
    assert_eq!(trail[0].location.as_deref(), Some("Riverside Clinic"));
    assert_eq!(trail[2].location.as_deref(), Some("St Mary Blood Bank"));

    let request = h
        .service
        .get_request(shipment.request_id.unwrap())
        .await
        .unwrap();
    assert_eq!(request.processing_status, ProcessingStatus::Completed);
}

#[tokio::test]
async fn scenario_d_cancel_is_legal_but_skipping_transit_is_not() {
    let h = Harness::new().await;
    let actor = h.sites[0].staff.id;

    let skipped = h.shipment(1, 0).await;
    let err = h
        .service
        .update_distribution(skipped.id, DistributionPatch::status(ShipmentPhase::Delivered), actor)
        .await
        .unwrap_err();
    assert_eq!(
        err,
        BloodBankError::Validation(
            "invalid status transition from pending_receive to delivered".to_string()
        )
    );
    let unchanged = h.service.get_distribution(skipped.id).await.unwrap();
    assert_eq!(unchanged.status, ShipmentPhase::PendingReceive);

    let cancelled = h
        .service
        .update_distribution(skipped.id, DistributionPatch::status(ShipmentPhase::Cancelled), actor)
        .await
        .unwrap();
    assert_eq!(cancelled.status, ShipmentPhase::Cancelled);
}

#[tokio::test]
async fn scenario_e_only_pending_shipments_can_be_deleted() {
    let h = Harness::new().await;
    let site = &h.sites[0];
    let before = h.world.store.snapshot().await.stock_of(site.bank.id);

    let moving = h.shipment(3, 0).await;
    h.service
        .update_distribution(moving.id, DistributionPatch::status(ShipmentPhase::InTransit), site.staff.id)
        .await
        .unwrap();
    let err = h
        .service
        .delete_distribution(moving.id, site.staff.id)
        .await
        .unwrap_err();
    assert_conflict(&err);

    let waiting = h.shipment(4, 0).await;
    let reserved = h.world.store.snapshot().await.stock_of(site.bank.id);
    assert_eq!(reserved, before - 3 - 4);

    h.service
        .delete_distribution(waiting.id, site.staff.id)
        .await
        .unwrap();
    let data = h.world.store.snapshot().await;
    assert_eq!(data.stock_of(site.bank.id), before - 3);
    assert!(data.distribution(waiting.id).is_none());
    assert!(data.trail_of(waiting.id).is_empty());

    let request = data.request(waiting.request_id.unwrap()).unwrap();
    assert_eq!(request.processing_status, ProcessingStatus::Pending);
}

#[tokio::test]
async fn own_facility_is_dropped_from_targets() {
    let h = Harness::new().await;
    let mut facilities = h.site_facilities();
    facilities.push(h.ward);
    let input =
        NewRequestGroup::new("B+", "Plasma", 1, facilities, h.requester.id).unwrap();

    let group = h.service.create_request_group(input).await.unwrap();
    assert_eq!(group.requests.len(), 3);
    assert!(group.requests.iter().all(|r| r.facility_id != h.ward));
    assert!(group.requests.iter().all(|r| r.source_facility_id == h.ward));
}

#[tokio::test]
async fn requesting_only_from_own_facility_is_rejected() {
    let h = Harness::new().await;
    let input = NewRequestGroup::new("B+", "Plasma", 1, vec![h.ward], h.requester.id).unwrap();

    let err = h.service.create_request_group(input).await.unwrap_err();
    assert_eq!(
        err,
        BloodBankError::Validation("cannot request from own facility".to_string())
    );
    assert!(h.world.store.snapshot().await.requests.is_empty());
}

#[tokio::test]
async fn unknown_facilities_abort_the_whole_group() {
    let h = Harness::new().await;
    let ghost = bloodbank_core::FacilityId::new();
    let mut facilities = h.site_facilities();
    facilities.push(ghost);
    let input = NewRequestGroup::new("O-", "Plasma", 1, facilities, h.requester.id).unwrap();

    let err = h.service.create_request_group(input).await.unwrap_err();
    assert_eq!(
        err,
        BloodBankError::NotFound {
            entity: "Facility",
            ids: vec![ghost.to_string()],
        }
    );
    let data = h.world.store.snapshot().await;
    assert!(data.requests.is_empty());
    assert!(data.track_states.is_empty());
}

#[tokio::test]
async fn malformed_blood_type_is_a_validation_error() {
    let h = Harness::new().await;
    let err = NewRequestGroup::new("Q+", "Plasma", 1, h.site_facilities(), h.requester.id)
        .unwrap_err();
    assert_validation(&err);
}

#[tokio::test]
async fn distributions_copy_the_request_and_ship_to_the_requester() {
    let h = Harness::new().await;
    let shipment = h.shipment(2, 1).await;
    let request = h
        .service
        .get_request(shipment.request_id.unwrap())
        .await
        .unwrap();

    assert_eq!(shipment.quantity, request.quantity_requested);
    assert_eq!(shipment.blood_type, request.blood_type);
    assert_eq!(shipment.blood_product, request.blood_product);
    assert_eq!(shipment.dispatched_from_id, h.sites[1].bank.id);
    assert_eq!(shipment.dispatched_to_id, h.ward);
    assert_eq!(shipment.tracking_number.len(), 12);
    assert!(shipment.batch_number.starts_with("20250101-"));
    assert_eq!(shipment.expiry_date, Some(h.world.day(35)));
    assert_eq!(shipment.notes.as_deref(), Some("Request dispatched"));
    assert_eq!(request.processing_status, ProcessingStatus::Initiated);
}

#[tokio::test]
async fn pending_requests_cannot_be_distributed() {
    let h = Harness::new().await;
    let requests = h.request_group(1).await;
    let site = &h.sites[0];

    let err = h
        .service
        .create_distribution(NewDistribution::new(requests[0].id, site.bank.id, site.staff.id))
        .await
        .unwrap_err();
    assert_conflict(&err);
}

#[tokio::test]
async fn cancelled_requests_cannot_be_accepted_again() {
    let h = Harness::new().await;
    let requests = h.request_group(1).await;
    h.service
        .accept_request(requests[0].id, h.sites[0].staff.id)
        .await
        .unwrap();

    let err = h
        .service
        .accept_request(requests[1].id, h.sites[1].staff.id)
        .await
        .unwrap_err();
    assert_validation(&err);
}

#[tokio::test]
async fn sibling_cancellation_reason_is_shared() {
    let h = Harness::new().await;
    let requests = h.request_group(1).await;
    h.service
        .accept_request(requests[2].id, h.sites[2].staff.id)
        .await
        .unwrap();

    let trail = h
        .service
        .get_track_history(TrackQuery::Request(requests[0].id))
        .await
        .unwrap();
    assert_eq!(trail[0].status, TrackLabel::Cancelled);
    assert_eq!(trail[0].notes.as_deref(), Some(SIBLING_CANCELLATION_REASON));
}
