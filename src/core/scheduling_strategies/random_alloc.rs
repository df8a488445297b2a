//! Uniform random placement.

use rand::prelude::*;
use rand_pcg::Pcg64;

use crate::core::common::Placement;
use crate::core::logger::Logger;
use crate::core::request::StorageRequest;
use crate::core::resources::ResourceCatalog;
use crate::core::scheduling_strategy::SchedulingStrategy;

/// Picks a disk uniformly at random among all registered disks, ignoring the request
/// content entirely.
pub struct RandomAlloc {
    rng: Pcg64,
    logger: Box<dyn Logger>,
}

impl RandomAlloc {
    pub fn new(seed: u64, logger: Box<dyn Logger>) -> Self {
        Self {
            rng: Pcg64::seed_from_u64(seed),
            logger,
        }
    }
}

impl SchedulingStrategy for RandomAlloc {
    fn compute(&mut self, catalog: &ResourceCatalog, request: &StorageRequest) -> Option<Placement> {
        let candidates: Vec<Placement> = catalog.list_resources().collect();
        if candidates.is_empty() {
            self.logger
                .log_warn("random_alloc", "catalog holds no disks, nothing to pick".to_string());
            return None;
        }
        let placement = candidates[self.rng.gen_range(0..candidates.len())].clone();
        self.logger.log_debug(
            "random_alloc",
            format!("picked {} for job {}", placement, request.job_id),
        );
        Some(placement)
    }
}
