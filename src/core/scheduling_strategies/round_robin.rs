//! Round-robin placement.

use std::collections::HashMap;

use crate::core::common::Placement;
use crate::core::logger::Logger;
use crate::core::request::StorageRequest;
use crate::core::resources::ResourceCatalog;
use crate::core::scheduling_strategy::{allocated_capacity_during, SchedulingStrategy};

/// Candidates examined per call before giving up.
const MAX_ATTEMPTS: u32 = 5;

/// Cycles over servers, nodes and disks with a cursor persisting across calls.
///
/// Servers advance on every call, nodes advance once per full server sweep, and each
/// (server, node) pair keeps its own disk cursor. A candidate without enough free
/// space over the request's time interval is skipped, up to [`MAX_ATTEMPTS`] per call.
pub struct RoundRobin {
    logger: Box<dyn Logger>,
    server_cursor: u32,
    node_cursor: u32,
    disk_cursors: HashMap<(String, u32), u32>,
}

impl RoundRobin {
    pub fn new(logger: Box<dyn Logger>) -> Self {
        Self {
            logger,
            server_cursor: 0,
            node_cursor: 0,
            disk_cursors: HashMap::new(),
        }
    }
}

impl SchedulingStrategy for RoundRobin {
    fn compute(&mut self, catalog: &ResourceCatalog, request: &StorageRequest) -> Option<Placement> {
        if catalog.is_empty() {
            self.logger
                .log_warn("round_robin", "catalog holds no servers, nothing to pick".to_string());
            return None;
        }
        let servers = catalog.server_ids();
        let server_count = servers.len() as u32;

        for _ in 0..MAX_ATTEMPTS {
            let server_pos = self.server_cursor % server_count;
            self.server_cursor = (self.server_cursor + 1) % server_count;
            let server_id = servers[server_pos as usize];

            let node_count = catalog.node_count(server_id);
            let node_pos = if node_count > 0 { self.node_cursor % node_count } else { 0 };
            if server_pos == server_count - 1 {
                // One full sweep over the servers completed, move to the next node round.
                self.node_cursor = self.node_cursor.wrapping_add(1);
            }
            if node_count == 0 {
                continue;
            }

            let disk_count = catalog.disk_count(server_id, node_pos);
            if disk_count == 0 {
                continue;
            }
            let cursor = self
                .disk_cursors
                .entry((server_id.to_string(), node_pos))
                .or_insert(0);
            let disk_pos = *cursor % disk_count;
            *cursor = cursor.wrapping_add(1);

            let disk = catalog.get_disk(server_id, node_pos, disk_pos);
            let free = disk.capacity - allocated_capacity_during(disk, request);
            if free > request.capacity {
                let placement = Placement::new(server_id, node_pos, disk_pos);
                self.logger.log_debug(
                    "round_robin",
                    format!("picked {} for job {} ({} GB free)", placement, request.job_id, free),
                );
                return Some(placement);
            }
        }

        self.logger.log_warn(
            "round_robin",
            format!(
                "no candidate with {} GB free found in {} attempts",
                request.capacity, MAX_ATTEMPTS
            ),
        );
        None
    }
}
