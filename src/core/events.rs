//! Message contracts crossing the core's boundary.
//!
//! The wire transport, addressing and encoding belong to the routing collaborator;
//! the core only defines the payload shapes and the per-worker message enums.

use chrono::{DateTime, Utc};

use crate::core::request::StorageRequest;

// REGISTRATION ////////////////////////////////////////////////////////////////////////

pub mod registration {
    use serde::{Deserialize, Serialize};

    /// Wire description of one disk, as announced by a storage server.
    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    pub struct DiskDescriptor {
        pub uid: u32,
        pub vendor: String,
        pub model: String,
        pub serial: String,
        pub capacity: f64,
        pub write_bandwidth: f64,
        pub read_bandwidth: f64,
        pub block_device: String,
    }

    /// Wire description of one node and its disks.
    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    pub struct NodeDescriptor {
        pub uid: u32,
        pub hostname: String,
        pub ipv4: String,
        pub bandwidth: f64,
        pub disks: Vec<DiskDescriptor>,
    }

    /// A storage server announcing its resources to the scheduler.
    #[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
    pub struct Registration {
        pub server_id: String,
        pub nodes: Vec<NodeDescriptor>,
    }
}

// WORKER MESSAGES /////////////////////////////////////////////////////////////////////

/// Inputs accepted by the scheduler worker.
#[derive(Clone, Debug)]
pub enum SchedulerMessage {
    /// A storage server announced its resources.
    Registration(registration::Registration),
    /// A pending request to place.
    Request(StorageRequest),
    /// An ended request whose capacity must be released.
    Deallocation(StorageRequest),
    /// Periodic maintenance tick (drives split-accumulation TTLs).
    Tick,
}

/// Inputs accepted by the allocation queue worker.
#[derive(Clone, Debug)]
pub enum QueueMessage {
    /// A request confirmed allocated by its storage server.
    Allocated(StorageRequest),
    /// Periodic maintenance tick (drives expiry pruning and split TTLs).
    Tick { now: DateTime<Utc> },
}

/// Emissions from the workers toward the routing collaborator.
#[derive(Clone, Debug, PartialEq)]
pub enum CoreEvent {
    /// Placement decided; to be provisioned by the storage server.
    Granted(StorageRequest),
    /// No placement found; to be reported to the client.
    Refused(StorageRequest),
    /// Split sibling group rolled back; to be reported to the client.
    Aborted(StorageRequest),
    /// Allocation expired; to be released by the storage server and the scheduler.
    Ended(StorageRequest),
}
