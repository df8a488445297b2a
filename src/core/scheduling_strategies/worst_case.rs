//! Worst-case bandwidth placement.
//!
//! For every disk the strategy estimates the minimum bandwidth the new request is
//! guaranteed to get, assuming every overlapping allocation competes for the disk and
//! for the node's network link simultaneously during its whole overlap. The disk with
//! the best guaranteed bandwidth among those with enough remaining capacity wins.

use rand::prelude::*;
use rand_pcg::Pcg64;

use crate::core::common::Placement;
use crate::core::logger::Logger;
use crate::core::request::StorageRequest;
use crate::core::resources::{DiskStatus, Node, NodeStatus, ResourceCatalog};
use crate::core::scheduling_strategy::SchedulingStrategy;

pub struct WorstCase {
    rng: Pcg64,
    logger: Box<dyn Logger>,
}

impl WorstCase {
    pub fn new(seed: u64, logger: Box<dyn Logger>) -> Self {
        Self {
            rng: Pcg64::seed_from_u64(seed),
            logger,
        }
    }

    /// Worst-case estimate for every disk of one node, with the node's network
    /// throttling already applied.
    ///
    /// Per disk: remaining capacity is the nominal capacity minus every overlapping
    /// allocation (assumed held for its whole overlap, never released early), and the
    /// mean bandwidth over the request's duration is the nominal write bandwidth for
    /// the non-overlapping part plus a fair share (split `N+1` ways among the `N`
    /// overlapping allocations and the new request) for the worst overlapping
    /// sub-interval. The node throttles its disks when the summed read bandwidth of
    /// the disks with active overlaps exceeds its network bandwidth.
    fn estimate_node(node: &Node, request: &StorageRequest) -> NodeStatus {
        let duration = request.duration.num_milliseconds() as f64 / 1000.;
        let mut status = NodeStatus {
            uid: node.uid,
            bandwidth: 0.,
            disk_status: Vec::with_capacity(node.disks.len()),
        };
        let mut active_disks = 0u32;
        let mut active_read_bw = 0.;

        for disk in &node.disks {
            let mut disk_status = DiskStatus {
                uid: disk.uid,
                capacity: disk.capacity,
                bandwidth: 0.,
            };
            let mut overlap_count = 0u32;
            let mut max_overlap = 0.;

            for alloc in &disk.allocations {
                if alloc.end_time <= request.start_time {
                    // Allocations are sorted by descending end time: nothing further
                    // in the list can overlap the request.
                    break;
                }
                let overlap = request.overlaps(alloc);
                if overlap > 0. {
                    overlap_count += 1;
                    max_overlap = f64::max(max_overlap, overlap);
                    disk_status.capacity -= alloc.capacity;
                }
            }

            disk_status.bandwidth = if overlap_count > 0 {
                active_disks += 1;
                active_read_bw += disk.read_bandwidth;
                ((duration - max_overlap) * disk.write_bandwidth
                    + max_overlap * disk.write_bandwidth / (overlap_count + 1) as f64)
                    / duration
            } else {
                disk.write_bandwidth
            };
            status.disk_status.push(disk_status);
        }

        status.bandwidth = if active_read_bw < node.bandwidth {
            node.bandwidth - active_read_bw
        } else {
            node.bandwidth / active_disks as f64
        };
        for disk_status in status.disk_status.iter_mut() {
            disk_status.bandwidth = disk_status.bandwidth.min(status.bandwidth);
        }
        status
    }
}

impl SchedulingStrategy for WorstCase {
    fn compute(&mut self, catalog: &ResourceCatalog, request: &StorageRequest) -> Option<Placement> {
        let mut best_bandwidth = f64::NEG_INFINITY;
        let mut candidates: Vec<Placement> = Vec::new();

        for (server_id, node_idx, node) in catalog.list_nodes() {
            let node_status = Self::estimate_node(node, request);
            for (disk_idx, disk_status) in node_status.disk_status.iter().enumerate() {
                if disk_status.capacity < request.capacity {
                    continue;
                }
                if disk_status.bandwidth > best_bandwidth {
                    best_bandwidth = disk_status.bandwidth;
                    candidates.clear();
                    candidates.push(Placement::new(server_id, node_idx, disk_idx as u32));
                } else if disk_status.bandwidth == best_bandwidth {
                    candidates.push(Placement::new(server_id, node_idx, disk_idx as u32));
                }
            }
        }

        if candidates.is_empty() {
            self.logger.log_warn(
                "worst_case",
                format!("no disk can hold {} GB for job {}", request.capacity, request.job_id),
            );
            return None;
        }
        let placement = candidates[self.rng.gen_range(0..candidates.len())].clone();
        self.logger.log_debug(
            "worst_case",
            format!(
                "picked {} for job {} ({:.3} GB/s guaranteed)",
                placement, request.job_id, best_bandwidth
            ),
        );
        Some(placement)
    }
}
