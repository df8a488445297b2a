//! Storage request entity and its lifecycle states.

use std::fmt::{Display, Formatter};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::common::JobId;

/// Errors rejected at request construction time.
#[derive(Debug, Error, PartialEq)]
pub enum RequestError {
    #[error("capacity must be strictly positive, got {0} GB")]
    InvalidCapacity(f64),
    #[error("duration must be strictly positive, got {0} s")]
    InvalidDuration(i64),
}

/// Lifecycle states of a storage request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReqState {
    Opened,
    Pending,
    Granted,
    Refused,
    Allocated,
    Failed,
    Aborted,
    Ended,
}

impl ReqState {
    /// Returns true if the lifecycle allows moving from this state to `next`.
    ///
    /// Transitions are forward-only: `Opened -> Pending -> Granted -> Allocated ->
    /// Ended`, with escapes to `Refused` (before allocation), `Failed` (after) and
    /// `Aborted` (split siblings rolled back as a group).
    pub fn can_advance(&self, next: ReqState) -> bool {
        use ReqState::*;
        matches!(
            (self, next),
            (Opened, Pending)
                | (Pending, Granted)
                | (Pending, Refused)
                | (Pending, Aborted)
                | (Granted, Allocated)
                | (Granted, Refused)
                | (Granted, Aborted)
                | (Allocated, Failed)
                | (Allocated, Ended)
        )
    }
}

impl Display for ReqState {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            ReqState::Opened => write!(f, "opened"),
            ReqState::Pending => write!(f, "pending"),
            ReqState::Granted => write!(f, "granted"),
            ReqState::Refused => write!(f, "refused"),
            ReqState::Allocated => write!(f, "allocated"),
            ReqState::Failed => write!(f, "failed"),
            ReqState::Aborted => write!(f, "aborted"),
            ReqState::Ended => write!(f, "ended"),
        }
    }
}

/// A client's storage allocation request.
///
/// The request is created with capacity, duration and start time; the remaining fields
/// are filled in as it moves through the lifecycle (client and job identity when
/// pending, placement when granted, connection details when allocated). `end_time` is
/// fixed at construction and does not move when the retry policy advances `start_time`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StorageRequest {
    pub capacity: f64,
    #[serde(with = "duration_secs")]
    pub duration: Duration,
    pub start_time: DateTime<Utc>,
    pub original_start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub client_id: String,
    pub job_id: JobId,
    pub node_id: u32,
    pub disk_id: u32,
    pub server_id: String,
    pub alloc_type: String,
    pub connection_handle: String,
    pub state: ReqState,
    pub reason: String,
}

impl StorageRequest {
    /// Creates an opened request, rejecting non-positive capacity or duration.
    pub fn new(capacity: f64, duration: Duration, start_time: DateTime<Utc>) -> Result<Self, RequestError> {
        if !(capacity > 0.) {
            return Err(RequestError::InvalidCapacity(capacity));
        }
        if duration.num_seconds() <= 0 {
            return Err(RequestError::InvalidDuration(duration.num_seconds()));
        }
        Ok(Self {
            capacity,
            duration,
            start_time,
            original_start_time: start_time,
            end_time: start_time + duration,
            client_id: String::new(),
            job_id: JobId::default(),
            node_id: 0,
            disk_id: 0,
            server_id: String::new(),
            alloc_type: String::new(),
            connection_handle: String::new(),
            state: ReqState::Opened,
            reason: String::new(),
        })
    }

    /// Number of siblings this request was divided into (1 if not split).
    pub fn divided(&self) -> u32 {
        self.job_id.split_count
    }

    /// Moves the request to `next`, enforcing the forward-only lifecycle in debug builds.
    pub fn advance(&mut self, next: ReqState) {
        debug_assert!(
            self.state.can_advance(next),
            "invalid request transition {} -> {}",
            self.state,
            next
        );
        self.state = next;
    }

    /// Returns true once the requested duration has elapsed from the start time.
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.start_time + self.duration <= now
    }

    /// Overlap between this request's time interval and the other's, in seconds.
    ///
    /// Symmetric; 0 when the `[start, end)` intervals are disjoint, the shorter
    /// request's duration when one interval fully contains the other, the exact
    /// intersection length otherwise.
    pub fn overlaps(&self, other: &StorageRequest) -> f64 {
        // No overlap
        if other.start_time >= self.end_time || other.end_time <= self.start_time {
            return 0.;
        }
        // Full overlap (self is in other)
        if other.start_time <= self.start_time && other.end_time >= self.end_time {
            return secs(self.duration);
        }
        // Full overlap (other is in self)
        if other.start_time >= self.start_time && other.end_time <= self.end_time {
            return secs(other.duration);
        }
        // Partial overlap
        if other.start_time > self.start_time {
            secs(self.end_time - other.start_time)
        } else {
            secs(other.end_time - self.start_time)
        }
    }
}

impl Display for StorageRequest {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self.state {
            ReqState::Opened => write!(
                f,
                "request [opened]: {} GB for {} s starting {}",
                self.capacity,
                self.duration.num_seconds(),
                self.start_time
            ),
            ReqState::Pending => write!(
                f,
                "request [pending]: job {} from client {}",
                self.job_id, self.client_id
            ),
            ReqState::Granted => write!(
                f,
                "request [granted]: {} GB on {}:{}:{} until {}",
                self.capacity, self.server_id, self.node_id, self.disk_id, self.end_time
            ),
            ReqState::Refused => write!(f, "request [refused]: job {} ({})", self.job_id, self.reason),
            ReqState::Allocated => write!(
                f,
                "request [allocated]: job {} on {}:{}:{}, connection {}",
                self.job_id, self.server_id, self.node_id, self.disk_id, self.connection_handle
            ),
            ReqState::Failed => write!(f, "request [failed]: job {} ({})", self.job_id, self.reason),
            ReqState::Aborted => write!(f, "request [aborted]: job {} ({})", self.job_id, self.reason),
            ReqState::Ended => write!(f, "request [ended]: job {} at {}", self.job_id, self.end_time),
        }
    }
}

fn secs(duration: Duration) -> f64 {
    duration.num_milliseconds() as f64 / 1000.
}

mod duration_secs {
    use chrono::Duration;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(value.num_seconds())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::seconds(i64::deserialize(deserializer)?))
    }
}
