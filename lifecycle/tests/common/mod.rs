//! Shared setup for lifecycle integration tests.

#![allow(dead_code)]
#![allow(clippy::unwrap_used)]

use bloodbank_core::{
    BloodDistribution, BloodRequest, Clock, CodeGenerator, EventPublisher, FacilityId,
    LifecycleConfig, User,
};
use bloodbank_lifecycle::{BloodBankService, LifecycleEnvironment, NewDistribution, NewRequestGroup};
use bloodbank_testing::{
    InMemoryStore, RecordingPublisher, SequentialCodes, Site, SteppingClock, World,
    init_test_tracing, test_clock,
};
use std::sync::Arc;

/// A world with a requesting ward and three supplying sites.
pub struct Harness {
    pub world: World,
    pub service: BloodBankService<InMemoryStore>,
    pub publisher: Arc<RecordingPublisher>,
    /// Facility the requester works at (no blood bank)
    pub ward: FacilityId,
    /// The requesting nurse
    pub requester: User,
    pub sites: Vec<Site>,
}

impl Harness {
    pub async fn new() -> Self {
        Self::with(LifecycleConfig::default(), Arc::new(SequentialCodes::new())).await
    }

    pub async fn with_config(config: LifecycleConfig) -> Self {
        Self::with(config, Arc::new(SequentialCodes::new())).await
    }

    pub async fn with(config: LifecycleConfig, codes: Arc<dyn CodeGenerator>) -> Self {
        init_test_tracing();
        let world = World::new().await;
        let ward = world.add_facility("Riverside Clinic").await;
        let requester = world.add_user("Nurse Adaeze", Some(ward.id)).await;
        let mut sites = Vec::new();
        for name in ["St Mary", "Central", "Northgate"] {
            sites.push(world.add_site(name).await);
        }

        let publisher = Arc::new(RecordingPublisher::new());
        let service = BloodBankService::new(world.store.clone(), environment(config, codes))
            .with_publisher(Arc::clone(&publisher) as Arc<dyn EventPublisher>);
        Self {
            world,
            service,
            publisher,
            ward: ward.id,
            requester,
            sites,
        }
    }

    /// Swap the service's publisher.
    pub fn publish_to(&mut self, publisher: Arc<dyn EventPublisher>) {
        let env = self.service.environment().clone();
        self.service = BloodBankService::new(self.world.store.clone(), env).with_publisher(publisher);
    }

    pub fn site_facilities(&self) -> Vec<FacilityId> {
        self.sites.iter().map(|s| s.facility.id).collect()
    }

    /// Fan out `quantity` units of O+ whole blood to every site.
    pub async fn request_group(&self, quantity: u32) -> Vec<BloodRequest> {
        let input = NewRequestGroup::new(
            "O+",
            "Whole Blood",
            quantity,
            self.site_facilities(),
            self.requester.id,
        )
        .unwrap();
        self.service.create_request_group(input).await.unwrap().requests
    }

    /// A request accepted by the site at `site` index.
    pub async fn accepted_request(&self, quantity: u32, site: usize) -> BloodRequest {
        let requests = self.request_group(quantity).await;
        self.service
            .accept_request(requests[site].id, self.sites[site].staff.id)
            .await
            .unwrap()
    }

    /// A pending shipment from `site` for an accepted request.
    pub async fn shipment(&self, quantity: u32, site: usize) -> BloodDistribution {
        let request = self.accepted_request(quantity, site).await;
        let site = &self.sites[site];
        self.service
            .create_distribution(NewDistribution::new(request.id, site.bank.id, site.staff.id))
            .await
            .unwrap()
    }
}

pub fn environment(config: LifecycleConfig, codes: Arc<dyn CodeGenerator>) -> LifecycleEnvironment {
    let clock: Arc<dyn Clock> = Arc::new(SteppingClock::new(test_clock().now()));
    LifecycleEnvironment::new(clock, codes, config)
}
