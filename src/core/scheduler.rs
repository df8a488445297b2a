//! Scheduler worker: placement decisions, retry policy and split accumulation.

use std::collections::HashMap;

use chrono::Duration;

use crate::core::common::Placement;
use crate::core::config::BrokerConfig;
use crate::core::events::registration::Registration;
use crate::core::events::{CoreEvent, SchedulerMessage};
use crate::core::logger::Logger;
use crate::core::request::{ReqState, StorageRequest};
use crate::core::resources::{Node, ResourceCatalog};
use crate::core::scheduling_strategy::SchedulingStrategy;
use crate::core::split::split_request;

/// Sibling decisions of one split request, accumulated until every part reports.
struct SplitAccumulation {
    ttl: u32,
    due_parts: u32,
    requests: Vec<(StorageRequest, Option<Placement>)>,
}

/// Scheduler worker. Owns the resource catalog exclusively and processes one message
/// to completion at a time, so every scheduling decision sees a consistent catalog.
///
/// Placement goes through the configured strategy. Oversized requests are divided
/// before scheduling and their siblings accumulated under the logical job id: the
/// group commits or rolls back as one unit.
pub struct Scheduler {
    catalog: ResourceCatalog,
    strategy: Box<dyn SchedulingStrategy>,
    config: BrokerConfig,
    split_accumulations: HashMap<String, SplitAccumulation>,
    logger: Box<dyn Logger>,
}

impl Scheduler {
    pub fn new(
        catalog: ResourceCatalog,
        strategy: Box<dyn SchedulingStrategy>,
        config: BrokerConfig,
        logger: Box<dyn Logger>,
    ) -> Self {
        Self {
            catalog,
            strategy,
            config,
            split_accumulations: HashMap::new(),
            logger,
        }
    }

    /// Read access to the catalog for inspection and reporting.
    pub fn catalog(&self) -> &ResourceCatalog {
        &self.catalog
    }

    /// Saves the decision log to a file, if the logger supports it.
    pub fn save_log(&self, path: &str) -> Result<(), std::io::Error> {
        self.logger.save_log(path)
    }

    /// Processes one message to completion and returns the outward events it produced.
    pub fn handle(&mut self, message: SchedulerMessage) -> Vec<CoreEvent> {
        match message {
            SchedulerMessage::Registration(registration) => {
                self.on_registration(registration);
                Vec::new()
            }
            SchedulerMessage::Request(request) => self.on_request(request),
            SchedulerMessage::Deallocation(request) => {
                self.on_deallocation(request);
                Vec::new()
            }
            SchedulerMessage::Tick => self.on_tick(),
        }
    }

    fn on_registration(&mut self, registration: Registration) {
        let nodes: Vec<Node> = registration.nodes.into_iter().map(Node::from).collect();
        self.logger.log_info(
            "scheduler",
            format!("server {} registered {} node(s)", registration.server_id, nodes.len()),
        );
        self.catalog.append_resources(&registration.server_id, nodes);
        self.logger.log_debug("scheduler", self.catalog.pretty_print());
    }

    fn on_request(&mut self, request: StorageRequest) -> Vec<CoreEvent> {
        if request.state != ReqState::Pending {
            self.logger.log_warn(
                "scheduler",
                format!(
                    "dropping job {}: expected a pending request, got state {}",
                    request.job_id, request.state
                ),
            );
            return Vec::new();
        }
        match split_request(&request, self.config.block_size_gb, self.config.min_block_size_gb) {
            Ok(mut parts) => {
                if parts.len() == 1 {
                    let part = parts.remove(0);
                    if part.divided() > 1 {
                        // A sibling divided by an upstream router joins its group here.
                        return self.process_sibling(part);
                    }
                    return self.process_single(part);
                }
                self.logger.log_info(
                    "scheduler",
                    format!("job {} divided into {} parts", request.job_id, parts.len()),
                );
                let mut events = Vec::new();
                for part in parts {
                    events.extend(self.process_sibling(part));
                }
                events
            }
            Err(err) => {
                // A refused re-split schedules the request whole, still within its group.
                self.logger.log_error("scheduler", format!("job {}: {}", request.job_id, err));
                if request.divided() > 1 {
                    self.process_sibling(request)
                } else {
                    self.process_single(request)
                }
            }
        }
    }

    fn on_deallocation(&mut self, request: StorageRequest) {
        self.logger.log_info(
            "scheduler",
            format!(
                "releasing job {} from {}:{}:{}",
                request.job_id, request.server_id, request.node_id, request.disk_id
            ),
        );
        self.catalog
            .remove_allocation(&request.server_id, request.node_id, request.disk_id, &request.job_id);
    }

    /// Counts down split accumulation TTLs and aborts groups whose siblings never all
    /// arrived within the budget.
    fn on_tick(&mut self) -> Vec<CoreEvent> {
        let mut expired = Vec::new();
        for (logical, accumulation) in self.split_accumulations.iter_mut() {
            if accumulation.ttl == 0 {
                expired.push(logical.clone());
            } else {
                accumulation.ttl -= 1;
            }
        }
        let mut events = Vec::new();
        for logical in expired {
            if let Some(accumulation) = self.split_accumulations.remove(&logical) {
                self.logger.log_error(
                    "scheduler",
                    format!(
                        "split job {} timed out with {} part(s) still due",
                        logical, accumulation.due_parts
                    ),
                );
                events.extend(self.abort_group(accumulation, "TTL exceeded before receiving all parts"));
            }
        }
        events
    }

    fn process_single(&mut self, mut request: StorageRequest) -> Vec<CoreEvent> {
        match self.place_with_retry(&mut request) {
            Some(placement) => {
                self.commit(&mut request, &placement);
                self.logger.log_info("scheduler", format!("{}", request));
                vec![CoreEvent::Granted(request)]
            }
            None => {
                let reason = if self.config.allow_retry {
                    "no fit within delay window"
                } else {
                    "no fit"
                };
                request.advance(ReqState::Refused);
                request.reason = reason.to_string();
                self.logger.log_warn("scheduler", format!("{}", request));
                vec![CoreEvent::Refused(request)]
            }
        }
    }

    /// Runs the strategy once, then retries with a delayed start time if allowed.
    ///
    /// The delay policy pushes the start time back in 5 minute steps, bounded by
    /// 1 hour of cumulative delay and by the fixed end time. The end time never
    /// moves: a delayed allocation is a shorter allocation.
    fn place_with_retry(&mut self, request: &mut StorageRequest) -> Option<Placement> {
        if let Some(placement) = self.strategy.compute(&self.catalog, request) {
            return Some(placement);
        }
        if !self.config.allow_retry {
            return None;
        }
        loop {
            if request.start_time - request.original_start_time >= Duration::hours(1)
                || request.start_time + Duration::minutes(5) >= request.end_time
            {
                return None;
            }
            request.start_time = request.start_time + Duration::minutes(5);
            self.logger.log_debug(
                "scheduler",
                format!("job {} delayed, retrying from {}", request.job_id, request.start_time),
            );
            if let Some(placement) = self.strategy.compute(&self.catalog, request) {
                return Some(placement);
            }
        }
    }

    /// Runs the strategy for one sibling of a split request and parks the outcome in
    /// the accumulation for its logical job. Successful placements are committed to
    /// the catalog immediately so later siblings see the load; the group is rolled
    /// back as a whole if any sibling fails.
    fn process_sibling(&mut self, mut request: StorageRequest) -> Vec<CoreEvent> {
        let placement = self.strategy.compute(&self.catalog, &request);
        if let Some(placement) = &placement {
            self.commit(&mut request, placement);
        }
        let logical = request.job_id.logical.clone();
        let due_parts = request.divided();
        let ttl = self.config.split_ttl_ticks;
        let entry = self
            .split_accumulations
            .entry(logical.clone())
            .or_insert_with(|| SplitAccumulation {
                ttl,
                due_parts,
                requests: Vec::new(),
            });
        entry.due_parts = entry.due_parts.saturating_sub(1);
        entry.requests.push((request, placement));
        if entry.due_parts == 0 {
            if let Some(accumulation) = self.split_accumulations.remove(&logical) {
                return self.finalize_split(&logical, accumulation);
            }
        }
        Vec::new()
    }

    /// Emits the group decision once every sibling has reported: granted for all, or
    /// rolled back and aborted for all.
    fn finalize_split(&mut self, logical: &str, accumulation: SplitAccumulation) -> Vec<CoreEvent> {
        let all_placed = accumulation.requests.iter().all(|(_, placement)| placement.is_some());
        if all_placed {
            self.logger.log_info(
                "scheduler",
                format!("split job {} fully placed ({} parts)", logical, accumulation.requests.len()),
            );
            return accumulation
                .requests
                .into_iter()
                .map(|(request, _)| CoreEvent::Granted(request))
                .collect();
        }
        self.logger.log_warn(
            "scheduler",
            format!("split job {} could not place every part, rolling back", logical),
        );
        self.abort_group(accumulation, "could not place every part of the split request")
    }

    /// Removes every committed sibling of the group from the catalog and marks the
    /// whole group aborted with a shared reason.
    fn abort_group(&mut self, accumulation: SplitAccumulation, reason: &str) -> Vec<CoreEvent> {
        let mut events = Vec::with_capacity(accumulation.requests.len());
        for (mut request, placement) in accumulation.requests {
            if let Some(placement) = placement {
                self.catalog.remove_allocation(
                    &placement.server_id,
                    placement.node_idx,
                    placement.disk_idx,
                    &request.job_id,
                );
            }
            request.advance(ReqState::Aborted);
            request.reason = reason.to_string();
            events.push(CoreEvent::Aborted(request));
        }
        events
    }

    /// Attaches the placement to the request, moves it to granted and records the
    /// allocation in the catalog.
    fn commit(&mut self, request: &mut StorageRequest, placement: &Placement) {
        request.advance(ReqState::Granted);
        request.server_id = placement.server_id.clone();
        request.node_id = placement.node_idx;
        request.disk_id = placement.disk_idx;
        self.catalog.add_allocation(
            &placement.server_id,
            placement.node_idx,
            placement.disk_idx,
            request.clone(),
        );
    }
}
