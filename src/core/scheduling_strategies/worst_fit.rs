//! Worst-fit placement.

use rand::prelude::*;
use rand_pcg::Pcg64;

use crate::core::common::Placement;
use crate::core::logger::Logger;
use crate::core::request::StorageRequest;
use crate::core::resources::ResourceCatalog;
use crate::core::scheduling_strategy::{allocated_capacity_during, SchedulingStrategy};

/// Chooses the disk with the highest percentage of free space over the request's time
/// interval; ties are broken uniformly at random.
pub struct WorstFit {
    rng: Pcg64,
    logger: Box<dyn Logger>,
}

impl WorstFit {
    pub fn new(seed: u64, logger: Box<dyn Logger>) -> Self {
        Self {
            rng: Pcg64::seed_from_u64(seed),
            logger,
        }
    }
}

impl SchedulingStrategy for WorstFit {
    fn compute(&mut self, catalog: &ResourceCatalog, request: &StorageRequest) -> Option<Placement> {
        let mut best_pct = f64::NEG_INFINITY;
        let mut candidates: Vec<Placement> = Vec::new();

        for (server_id, node_idx, node) in catalog.list_nodes() {
            for (disk_idx, disk) in node.disks.iter().enumerate() {
                let free_pct = (disk.capacity - allocated_capacity_during(disk, request)) * 100. / disk.capacity;
                if free_pct > best_pct {
                    best_pct = free_pct;
                    candidates.clear();
                    candidates.push(Placement::new(server_id, node_idx, disk_idx as u32));
                } else if free_pct == best_pct {
                    candidates.push(Placement::new(server_id, node_idx, disk_idx as u32));
                }
            }
        }

        if candidates.is_empty() {
            self.logger
                .log_warn("worst_fit", "catalog holds no disks, nothing to pick".to_string());
            return None;
        }
        let placement = candidates[self.rng.gen_range(0..candidates.len())].clone();
        self.logger.log_debug(
            "worst_fit",
            format!(
                "picked {} for job {} ({:.1}% free)",
                placement, request.job_id, best_pct
            ),
        );
        Some(placement)
    }
}
