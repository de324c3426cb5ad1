//! Property tests for the lifecycle invariants.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

mod common;

use bloodbank_core::{
    BloodBankError, DistributionPatch, RequestStatus, ShipmentPhase, TrackState,
};
use bloodbank_lifecycle::NewRequestGroup;
use bloodbank_testing::properties::{phase_requests, quantity};
use common::Harness;
use proptest::prelude::*;
use std::future::Future;

fn block_on<F: Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("test runtime")
        .block_on(future)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn fan_out_creates_one_request_per_foreign_facility(mask in 1u8..8, include_own in any::<bool>()) {
        block_on(async {
            let h = Harness::new().await;
            let mut facilities: Vec<_> = h
                .site_facilities()
                .into_iter()
                .enumerate()
                .filter(|(i, _)| mask & (1 << i) != 0)
                .map(|(_, id)| id)
                .collect();
            let expected = facilities.len();
            if include_own {
                facilities.insert(0, h.ward);
            }

            let input = NewRequestGroup::new("AB+", "Red Blood Cells", 1, facilities.clone(), h.requester.id).unwrap();
            let group = h.service.create_request_group(input).await.unwrap();

            assert_eq!(group.requests.len(), expected);
            assert!(group.requests.iter().all(|r| r.request_group_id == group.group_id));
            assert_eq!(group.requests.iter().filter(|r| r.is_master_request).count(), 1);
            let targets: Vec<_> = group.requests.iter().map(|r| r.facility_id).collect();
            let foreign: Vec<_> = facilities.into_iter().filter(|f| *f != h.ward).collect();
            assert_eq!(targets, foreign);
        });
    }

    #[test]
    fn acceptance_cancels_open_siblings_but_keeps_rejections(
        rejected_mask in 0u8..8,
        accept in 0usize..3,
    ) {
        prop_assume!(rejected_mask & (1 << accept) == 0);
        block_on(async {
            let h = Harness::new().await;
            let requests = h.request_group(1).await;
            for (i, request) in requests.iter().enumerate() {
                if rejected_mask & (1 << i) != 0 {
                    h.service
                        .update_request_status(
                            request.id,
                            RequestStatus::Rejected,
                            Some("No stock".to_string()),
                            h.sites[i].staff.id,
                        )
                        .await
                        .unwrap();
                }
            }

            h.service
                .accept_request(requests[accept].id, h.sites[accept].staff.id)
                .await
                .unwrap();

            for (i, request) in requests.iter().enumerate() {
                let status = h.service.get_request(request.id).await.unwrap().request_status;
                let expected = if i == accept {
                    RequestStatus::Accepted
                } else if rejected_mask & (1 << i) != 0 {
                    RequestStatus::Rejected
                } else {
                    RequestStatus::Cancelled
                };
                assert_eq!(status, expected, "request #{i}");
            }
        });
    }

    #[test]
    fn shipments_conserve_stock_and_only_take_legal_steps(
        qty in quantity(),
        steps in phase_requests(6),
    ) {
        block_on(async {
            let h = Harness::new().await;
            let site = &h.sites[0];
            let before = h.world.store.snapshot().await.stock_of(site.bank.id);

            let shipment = h.shipment(qty, 0).await;
            let data = h.world.store.snapshot().await;
            assert_eq!(data.stock_of(site.bank.id), before - qty);

            let mut current = shipment.status;
            let mut trail: Vec<TrackState> = data.trail_of(shipment.id).into_iter().cloned().collect();

            for target in steps {
                let result = h
                    .service
                    .update_distribution(shipment.id, DistributionPatch::status(target), site.staff.id)
                    .await;
                let stored = h.service.get_distribution(shipment.id).await.unwrap();

                if current.can_transition_to(target) {
                    assert_eq!(result.unwrap().status, target);
                    current = target;
                } else {
                    assert_eq!(
                        result.unwrap_err(),
                        BloodBankError::Validation(format!(
                            "invalid status transition from {current} to {target}"
                        ))
                    );
                }
                assert_eq!(stored.status, current);

                let data = h.world.store.snapshot().await;
                let next: Vec<TrackState> = data.trail_of(shipment.id).into_iter().cloned().collect();
                assert!(next.len() >= trail.len());
                assert_eq!(&next[..trail.len()], trail.as_slice());
                trail = next;

                let out = if matches!(current, ShipmentPhase::Cancelled | ShipmentPhase::Returned) {
                    0
                } else {
                    qty
                };
                assert_eq!(data.stock_of(site.bank.id) + out, before);
            }
        });
    }
}
