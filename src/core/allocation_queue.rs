//! Allocation queue worker: expiry of live allocations and split TTL supervision.

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Utc};

use crate::core::events::{CoreEvent, QueueMessage};
use crate::core::logger::Logger;
use crate::core::request::{ReqState, StorageRequest};

/// Siblings of one split request seen by the queue, with their arrival countdown.
struct SplitTracker {
    ttl: u32,
    due_parts: u32,
    requests: Vec<StorageRequest>,
}

/// Allocation queue worker. Keeps confirmed allocations ordered by ascending end time
/// and prunes the expired ones on every maintenance tick, emitting a deallocation
/// event for each.
///
/// A companion tracker watches split requests: when the siblings of a logical job do
/// not all confirm within the TTL budget, the recorded ones are force-ended so a lost
/// notification cannot strand capacity forever.
pub struct AllocationQueue {
    requests: VecDeque<StorageRequest>,
    split_trackers: HashMap<String, SplitTracker>,
    split_ttl_ticks: u32,
    logger: Box<dyn Logger>,
}

impl AllocationQueue {
    pub fn new(split_ttl_ticks: u32, logger: Box<dyn Logger>) -> Self {
        Self {
            requests: VecDeque::new(),
            split_trackers: HashMap::new(),
            split_ttl_ticks,
            logger,
        }
    }

    /// Number of live allocations currently queued.
    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    /// Processes one message to completion and returns the outward events it produced.
    pub fn handle(&mut self, message: QueueMessage) -> Vec<CoreEvent> {
        match message {
            QueueMessage::Allocated(request) => {
                self.on_allocated(request);
                Vec::new()
            }
            QueueMessage::Tick { now } => {
                let mut events = self.prune(now);
                events.extend(self.check_splits());
                events
            }
        }
    }

    fn on_allocated(&mut self, request: StorageRequest) {
        if request.state != ReqState::Allocated {
            self.logger.log_warn(
                "allocation-queue",
                format!(
                    "dropping job {}: expected an allocated request, got state {}",
                    request.job_id, request.state
                ),
            );
            return;
        }
        self.logger.log_debug(
            "allocation-queue",
            format!("queueing job {} until {}", request.job_id, request.end_time),
        );
        self.track_split(&request);
        self.store_request(request);
    }

    /// Inserts the request keeping the deque ordered by ascending end time.
    ///
    /// Scans from the tail until an entry with an end time not later than the new
    /// one is found; arrival order usually is end-time order, so appending at the
    /// tail is the common fast path.
    fn store_request(&mut self, request: StorageRequest) {
        let mut insert_at = 0;
        for (idx, queued) in self.requests.iter().enumerate().rev() {
            if queued.end_time <= request.end_time {
                insert_at = idx + 1;
                break;
            }
        }
        self.requests.insert(insert_at, request);
    }

    fn track_split(&mut self, request: &StorageRequest) {
        if !request.job_id.is_split() {
            return;
        }
        let due_parts = request.divided();
        let ttl = self.split_ttl_ticks;
        let entry = self
            .split_trackers
            .entry(request.job_id.logical.clone())
            .or_insert_with(|| SplitTracker {
                ttl,
                due_parts,
                requests: Vec::new(),
            });
        entry.due_parts = entry.due_parts.saturating_sub(1);
        entry.requests.push(request.clone());
    }

    /// Pops overdue requests from the head of the deque, marking each ended.
    fn prune(&mut self, now: DateTime<Utc>) -> Vec<CoreEvent> {
        let mut events = Vec::new();
        while self.requests.front().map_or(false, |request| request.is_overdue(now)) {
            if let Some(mut request) = self.requests.pop_front() {
                request.advance(ReqState::Ended);
                self.logger.log_info("allocation-queue", format!("{}", request));
                events.push(CoreEvent::Ended(request));
            }
        }
        events
    }

    /// Advances split tracker countdowns. Complete groups are dropped silently;
    /// groups still missing siblings when the TTL runs out are force-ended.
    fn check_splits(&mut self) -> Vec<CoreEvent> {
        let mut complete = Vec::new();
        let mut expired = Vec::new();
        for (logical, tracker) in self.split_trackers.iter_mut() {
            if tracker.due_parts == 0 {
                complete.push(logical.clone());
            } else if tracker.ttl == 0 {
                expired.push(logical.clone());
            } else {
                tracker.ttl -= 1;
            }
        }
        for logical in complete {
            self.split_trackers.remove(&logical);
        }
        let mut events = Vec::new();
        for logical in expired {
            if let Some(tracker) = self.split_trackers.remove(&logical) {
                self.logger.log_error(
                    "allocation-queue",
                    format!(
                        "split job {} incomplete after TTL, force-ending {} recorded part(s)",
                        logical,
                        tracker.requests.len()
                    ),
                );
                // The recorded siblings leave through the force-end path; drop them
                // from the expiry deque so they are not ended twice.
                self.requests.retain(|queued| queued.job_id.logical != logical);
                for mut request in tracker.requests {
                    request.advance(ReqState::Ended);
                    request.reason = "TTL exceeded before receiving all parts".to_string();
                    events.push(CoreEvent::Ended(request));
                }
            }
        }
        events
    }
}
