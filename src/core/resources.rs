//! Storage resources: disks, nodes and the resource catalog.

use indexmap::IndexMap;
use serde::Deserialize;

use crate::core::common::{JobId, Placement};
use crate::core::config::ConfigError;
use crate::core::events::registration::{DiskDescriptor, NodeDescriptor};
use crate::core::request::StorageRequest;

/// Transient per-disk estimate built by a strategy while one decision is computed.
/// Never stored in the catalog and never serialized.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DiskStatus {
    pub uid: u32,
    pub capacity: f64,
    pub bandwidth: f64,
}

/// Transient per-node estimate built by a strategy while one decision is computed.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NodeStatus {
    pub uid: u32,
    pub bandwidth: f64,
    pub disk_status: Vec<DiskStatus>,
}

/// One addressable capacity and bandwidth resource.
///
/// The allocation list is owned exclusively by the disk and kept sorted by descending
/// end time after every insertion, so the latest-expiring entries sit at index 0 and
/// the soonest-to-expire at the tail.
#[derive(Clone, Debug)]
pub struct Disk {
    pub uid: u32,
    pub vendor: String,
    pub model: String,
    pub serial: String,
    pub capacity: f64,
    pub write_bandwidth: f64,
    pub read_bandwidth: f64,
    pub block_device: String,
    pub allocations: Vec<StorageRequest>,
}

impl From<DiskDescriptor> for Disk {
    fn from(d: DiskDescriptor) -> Self {
        Self {
            uid: d.uid,
            vendor: d.vendor,
            model: d.model,
            serial: d.serial,
            capacity: d.capacity,
            write_bandwidth: d.write_bandwidth,
            read_bandwidth: d.read_bandwidth,
            block_device: d.block_device,
            allocations: Vec::new(),
        }
    }
}

/// A storage node: a remote machine owning a set of disks behind one network link.
#[derive(Clone, Debug)]
pub struct Node {
    pub uid: u32,
    pub hostname: String,
    pub ipv4: String,
    pub bandwidth: f64,
    pub disks: Vec<Disk>,
}

impl From<NodeDescriptor> for Node {
    fn from(n: NodeDescriptor) -> Self {
        Self {
            uid: n.uid,
            hostname: n.hostname,
            ipv4: n.ipv4,
            bandwidth: n.bandwidth,
            disks: n.disks.into_iter().map(Disk::from).collect(),
        }
    }
}

// SYSTEM DESCRIPTION FILES ////////////////////////////////////////////////////////////

#[derive(Debug, Deserialize)]
struct RawSystem {
    hosts: Vec<RawHost>,
}

#[derive(Debug, Deserialize)]
struct RawHost {
    hostname: String,
    ipv4: String,
    network_bw: f64,
    disks: Vec<RawDisk>,
}

#[derive(Debug, Deserialize)]
struct RawDisk {
    vendor: String,
    model: String,
    serial: String,
    capacity: f64,
    write_bandwidth: f64,
    read_bandwidth: f64,
    block_device: String,
}

/// Reads a YAML system description into node descriptors, assigning positional uids.
pub fn load_system_file(path: &str) -> Result<Vec<NodeDescriptor>, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_string(),
        source,
    })?;
    let raw: RawSystem = serde_yaml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_string(),
        source,
    })?;
    let nodes = raw
        .hosts
        .into_iter()
        .enumerate()
        .map(|(node_idx, host)| NodeDescriptor {
            uid: node_idx as u32,
            hostname: host.hostname,
            ipv4: host.ipv4,
            bandwidth: host.network_bw,
            disks: host
                .disks
                .into_iter()
                .enumerate()
                .map(|(disk_idx, disk)| DiskDescriptor {
                    uid: disk_idx as u32,
                    vendor: disk.vendor,
                    model: disk.model,
                    serial: disk.serial,
                    capacity: disk.capacity,
                    write_bandwidth: disk.write_bandwidth,
                    read_bandwidth: disk.read_bandwidth,
                    block_device: disk.block_device,
                })
                .collect(),
        })
        .collect();
    Ok(nodes)
}

// RESOURCE CATALOG ////////////////////////////////////////////////////////////////////

/// Registry of servers, each owning an ordered list of nodes.
///
/// A `(server_id, node_idx, disk_idx)` triple addresses one disk stably for the whole
/// catalog lifetime: registration is append-only and indices are never reused. The
/// catalog is rebuilt from registration messages after a restart, never persisted.
///
/// Addressed accessors panic on an unknown server, node or disk: probing for resources
/// that never registered is a caller bug, not a recoverable condition.
#[derive(Clone, Debug, Default)]
pub struct ResourceCatalog {
    storage_resources: IndexMap<String, Vec<Node>>,
}

impl ResourceCatalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self {
            storage_resources: IndexMap::new(),
        }
    }

    /// Creates a catalog holding one server's resources read from a YAML system file.
    pub fn from_file(server_id: &str, path: &str) -> Result<Self, ConfigError> {
        let mut catalog = Self::new();
        let nodes = load_system_file(path)?;
        catalog.append_resources(server_id, nodes.into_iter().map(Node::from).collect());
        Ok(catalog)
    }

    /// Appends nodes received from a server.
    ///
    /// Append-only and without deduplication: a server registering twice duplicates
    /// its nodes (known limitation of the registration protocol).
    pub fn append_resources(&mut self, server_id: &str, nodes: Vec<Node>) {
        self.storage_resources
            .entry(server_id.to_string())
            .or_insert_with(Vec::new)
            .extend(nodes);
    }

    fn server(&self, server_id: &str) -> &Vec<Node> {
        self.storage_resources
            .get(server_id)
            .unwrap_or_else(|| panic!("unknown server {}", server_id))
    }

    /// Returns the node at the given index on the given server.
    pub fn get_node(&self, server_id: &str, node_idx: u32) -> &Node {
        self.server(server_id)
            .get(node_idx as usize)
            .unwrap_or_else(|| panic!("unknown node {} on server {}", node_idx, server_id))
    }

    /// Returns the disk at the given address.
    pub fn get_disk(&self, server_id: &str, node_idx: u32, disk_idx: u32) -> &Disk {
        self.get_node(server_id, node_idx)
            .disks
            .get(disk_idx as usize)
            .unwrap_or_else(|| panic!("unknown disk {}:{}:{}", server_id, node_idx, disk_idx))
    }

    fn get_disk_mut(&mut self, server_id: &str, node_idx: u32, disk_idx: u32) -> &mut Disk {
        self.storage_resources
            .get_mut(server_id)
            .unwrap_or_else(|| panic!("unknown server {}", server_id))
            .get_mut(node_idx as usize)
            .unwrap_or_else(|| panic!("unknown node {} on server {}", node_idx, server_id))
            .disks
            .get_mut(disk_idx as usize)
            .unwrap_or_else(|| panic!("unknown disk {}:{}:{}", server_id, node_idx, disk_idx))
    }

    /// Returns the number of nodes registered by the given server.
    pub fn node_count(&self, server_id: &str) -> u32 {
        self.server(server_id).len() as u32
    }

    /// Returns the number of nodes across all servers.
    pub fn total_node_count(&self) -> u32 {
        self.storage_resources.values().map(|nodes| nodes.len() as u32).sum()
    }

    /// Returns the number of disks of the given node.
    pub fn disk_count(&self, server_id: &str, node_idx: u32) -> u32 {
        self.get_node(server_id, node_idx).disks.len() as u32
    }

    /// Returns the nominal capacity of the given disk.
    pub fn disk_capacity(&self, server_id: &str, node_idx: u32, disk_idx: u32) -> f64 {
        self.get_disk(server_id, node_idx, disk_idx).capacity
    }

    /// Returns the registered server ids, in registration order.
    pub fn server_ids(&self) -> Vec<&str> {
        self.storage_resources.keys().map(|s| s.as_str()).collect()
    }

    /// Returns true if no resources were registered yet.
    pub fn is_empty(&self) -> bool {
        self.storage_resources.is_empty()
    }

    /// Records an allocation on the given disk and keeps the disk's allocation list
    /// sorted by descending end time.
    pub fn add_allocation(&mut self, server_id: &str, node_idx: u32, disk_idx: u32, request: StorageRequest) {
        let disk = self.get_disk_mut(server_id, node_idx, disk_idx);
        disk.allocations.push(request);
        disk.allocations.sort_by(|a, b| b.end_time.cmp(&a.end_time));
    }

    /// Removes the allocation of the given job from the given disk, freeing its capacity.
    pub fn remove_allocation(&mut self, server_id: &str, node_idx: u32, disk_idx: u32, job_id: &JobId) {
        let disk = self.get_disk_mut(server_id, node_idx, disk_idx);
        disk.allocations.retain(|alloc| &alloc.job_id != job_id);
    }

    /// Iterates `(server_id, node_idx, node)` over every node of every server,
    /// in registration order.
    pub fn list_nodes(&self) -> impl Iterator<Item = (&str, u32, &Node)> + '_ {
        self.storage_resources.iter().flat_map(|(server_id, nodes)| {
            nodes
                .iter()
                .enumerate()
                .map(move |(node_idx, node)| (server_id.as_str(), node_idx as u32, node))
        })
    }

    /// Iterates the address of every disk of every node, in registration order.
    ///
    /// Strategies walk the catalog through this sequence and the addressed accessors,
    /// computing their transient status locally instead of aliasing into the catalog.
    pub fn list_resources(&self) -> impl Iterator<Item = Placement> + '_ {
        self.list_nodes().flat_map(|(server_id, node_idx, node)| {
            node.disks
                .iter()
                .enumerate()
                .map(move |(disk_idx, _)| Placement::new(server_id, node_idx, disk_idx as u32))
        })
    }

    /// Human-readable dump of the catalog for operator logging.
    pub fn pretty_print(&self) -> String {
        let mut out = String::new();
        for (server_id, nodes) in &self.storage_resources {
            out.push_str(&format!("server {}\n", server_id));
            for node in nodes {
                out.push_str(&format!(
                    "  node {} ({}, {}), network {} GB/s\n",
                    node.uid, node.hostname, node.ipv4, node.bandwidth
                ));
                for disk in &node.disks {
                    out.push_str(&format!(
                        "    disk {} [{}/{}, {}] {} GB, write {} GB/s, read {} GB/s, {} allocation(s)\n",
                        disk.uid,
                        disk.vendor,
                        disk.model,
                        disk.serial,
                        disk.capacity,
                        disk.write_bandwidth,
                        disk.read_bandwidth,
                        disk.allocations.len()
                    ));
                }
            }
        }
        out
    }
}
