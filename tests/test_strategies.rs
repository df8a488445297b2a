use std::collections::HashMap;

use chrono::{DateTime, Duration, TimeZone, Utc};

use storbroker::core::common::{JobId, Placement};
use storbroker::core::logger::StdoutLogger;
use storbroker::core::request::StorageRequest;
use storbroker::core::resources::{Disk, Node, ResourceCatalog};
use storbroker::core::scheduling_strategies::random_alloc::RandomAlloc;
use storbroker::core::scheduling_strategies::round_robin::RoundRobin;
use storbroker::core::scheduling_strategies::worst_case::WorstCase;
use storbroker::core::scheduling_strategies::worst_fit::WorstFit;
use storbroker::core::scheduling_strategy::{strategy_resolver, SchedulingStrategy};

fn name_wrapper(file_name: &str) -> String {
    format!("test-configs/{}", file_name)
}

fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2022, 7, 1, 8, 0, 0).unwrap()
}

fn request(job: &str, capacity: f64, duration_hours: i64, start_offset_hours: i64) -> StorageRequest {
    let mut req = StorageRequest::new(
        capacity,
        Duration::hours(duration_hours),
        base_time() + Duration::hours(start_offset_hours),
    )
    .unwrap();
    req.job_id = JobId::new(job);
    req
}

fn disk(uid: u32, capacity: f64, write_bw: f64, read_bw: f64) -> Disk {
    Disk {
        uid,
        vendor: "Samsung".to_string(),
        model: "PM1725b".to_string(),
        serial: format!("S3RVNA0K70{:04}", uid),
        capacity,
        write_bandwidth: write_bw,
        read_bandwidth: read_bw,
        block_device: format!("/dev/nvme{}n1", uid),
        allocations: Vec::new(),
    }
}

fn node(uid: u32, bandwidth: f64, disks: Vec<Disk>) -> Node {
    Node {
        uid,
        hostname: format!("storage-node-{:02}", uid + 1),
        ipv4: format!("10.0.32.{}", uid + 11),
        bandwidth,
        disks,
    }
}

fn dummy_catalog() -> ResourceCatalog {
    ResourceCatalog::from_file("server-1", &name_wrapper("dummy_system.yaml")).unwrap()
}

#[test]
fn test_strategy_resolver() {
    for name in ["random_alloc", "round_robin", "worst_fit", "worst_case"] {
        assert!(strategy_resolver(name, 123, Box::new(StdoutLogger::new())).is_ok());
    }
    let err = strategy_resolver("best_fit", 123, Box::new(StdoutLogger::new())).unwrap_err();
    assert_eq!(err.to_string(), "unknown scheduling strategy 'best_fit'");
}

#[test]
fn test_random_alloc_empty_catalog() {
    let catalog = ResourceCatalog::new();
    let mut strategy = RandomAlloc::new(123, Box::new(StdoutLogger::new()));
    assert_eq!(strategy.compute(&catalog, &request("job-1", 10., 1, 0)), None);
}

#[test]
// Uniform sampling over the whole catalog: with enough picks every disk gets chosen.
fn test_random_alloc_distribution() {
    let catalog = ResourceCatalog::from_file("server-1", &name_wrapper("uniform_system.yaml")).unwrap();
    let mut strategy = RandomAlloc::new(123, Box::new(StdoutLogger::new()));
    let req = request("job-1", 10., 1, 0);

    let mut counts: HashMap<String, u32> = HashMap::new();
    for _ in 0..200 {
        let placement = strategy.compute(&catalog, &req).unwrap();
        *counts.entry(placement.to_string()).or_insert(0) += 1;
    }
    assert_eq!(counts.len(), 4);
    assert_eq!(counts.values().sum::<u32>(), 200);
}

#[test]
// One server, two nodes with two disks each: the cursors sweep servers, then nodes,
// then disks, visiting every disk once before reusing any.
fn test_round_robin_cycles() {
    let catalog = ResourceCatalog::from_file("server-1", &name_wrapper("uniform_system.yaml")).unwrap();
    let mut strategy = RoundRobin::new(Box::new(StdoutLogger::new()));
    let req = request("job-1", 10., 1, 0);

    let mut seen = Vec::new();
    for _ in 0..4 {
        seen.push(strategy.compute(&catalog, &req).unwrap().to_string());
    }
    seen.sort();
    assert_eq!(seen, vec!["server-1:0:0", "server-1:0:1", "server-1:1:0", "server-1:1:1"]);
}

#[test]
// A candidate without enough free space over the request's interval is skipped and
// the cursor moves on.
fn test_round_robin_skips_loaded_disk() {
    let mut catalog = dummy_catalog();
    catalog.add_allocation("server-1", 0, 0, request("job-full", 4000., 3, 0));

    let mut strategy = RoundRobin::new(Box::new(StdoutLogger::new()));
    let placement = strategy.compute(&catalog, &request("job-1", 100., 1, 0)).unwrap();
    assert_eq!(placement, Placement::new("server-1", 0, 1));
}

#[test]
fn test_round_robin_exhausts_attempts() {
    let mut catalog = dummy_catalog();
    catalog.add_allocation("server-1", 0, 0, request("job-a", 4000., 3, 0));
    catalog.add_allocation("server-1", 0, 1, request("job-b", 6500., 3, 0));

    let mut strategy = RoundRobin::new(Box::new(StdoutLogger::new()));
    assert_eq!(strategy.compute(&catalog, &request("job-1", 100., 1, 0)), None);
}

#[test]
// Worst fit ranks disks by percentage of free space over the request's interval.
fn test_worst_fit_prefers_emptier_disk() {
    let mut catalog = dummy_catalog();
    catalog.add_allocation("server-1", 0, 1, request("job-a", 2000., 3, 0));

    let mut strategy = WorstFit::new(123, Box::new(StdoutLogger::new()));
    let placement = strategy.compute(&catalog, &request("job-1", 100., 2, 0)).unwrap();
    assert_eq!(placement, Placement::new("server-1", 0, 0));
}

#[test]
// An allocation that does not overlap the request's interval does not count
// against the disk's free space.
fn test_worst_fit_ignores_disjoint_allocations() {
    let mut catalog = dummy_catalog();
    catalog.add_allocation("server-1", 0, 1, request("job-a", 2000., 3, 0));

    let mut strategy = WorstFit::new(123, Box::new(StdoutLogger::new()));
    // Starts after job-a ends: both disks are 100% free again and tie.
    let placement = strategy.compute(&catalog, &request("job-1", 100., 2, 5)).unwrap();
    assert_eq!(placement.server_id, "server-1");
    assert_eq!(placement.node_idx, 0);
}

#[test]
fn test_worst_case_empty_catalog() {
    let catalog = ResourceCatalog::new();
    let mut strategy = WorstCase::new(123, Box::new(StdoutLogger::new()));
    assert_eq!(strategy.compute(&catalog, &request("job-1", 20., 3, 0)), None);
}

#[test]
// With no overlapping allocations every disk offers its nominal write bandwidth,
// so the 3.2 GB/s disk wins over the 3.0 GB/s one.
fn test_worst_case_prefers_fastest_disk() {
    let catalog = dummy_catalog();
    let mut strategy = WorstCase::new(123, Box::new(StdoutLogger::new()));
    let placement = strategy.compute(&catalog, &request("job-1", 20., 3, 0)).unwrap();
    assert_eq!(placement, Placement::new("server-1", 0, 1));
}

#[test]
// Only disks whose worst-case remaining capacity covers the request qualify.
fn test_worst_case_capacity_filter() {
    let catalog = dummy_catalog();
    let mut strategy = WorstCase::new(123, Box::new(StdoutLogger::new()));

    let placement = strategy.compute(&catalog, &request("job-1", 6500., 3, 0)).unwrap();
    assert_eq!(placement, Placement::new("server-1", 0, 1));

    assert_eq!(strategy.compute(&catalog, &request("job-2", 7000., 3, 0)), None);
}

#[test]
// Two existing fully-overlapping allocations leave the new request a 3-way share of
// the 3.0 GB/s disk (1.0 GB/s), so the untouched 1.2 GB/s disk is the better pick.
// A 2-way split would wrongly rate the loaded disk at 1.5 GB/s and invert the choice.
fn test_worst_case_three_way_bandwidth_share() {
    let mut catalog = ResourceCatalog::new();
    catalog.append_resources(
        "server-1",
        vec![node(0, 12.5, vec![disk(0, 1000., 3.0, 3.2), disk(1, 1000., 1.2, 1.2)])],
    );
    catalog.add_allocation("server-1", 0, 0, request("job-a", 100., 1, 0));
    catalog.add_allocation("server-1", 0, 0, request("job-b", 100., 1, 0));

    let mut strategy = WorstCase::new(123, Box::new(StdoutLogger::new()));
    let placement = strategy.compute(&catalog, &request("job-1", 100., 1, 0)).unwrap();
    assert_eq!(placement, Placement::new("server-1", 0, 1));
}

#[test]
// The fair share applies only to the overlapping sub-interval. A 1 hour allocation
// under a 2 hour request halves the disk for one hour only: the 3.0 GB/s disk still
// averages 2.25 GB/s and beats an idle 2.0 GB/s disk.
fn test_worst_case_partial_overlap_average() {
    let mut catalog = ResourceCatalog::new();
    catalog.append_resources(
        "server-1",
        vec![node(0, 12.5, vec![disk(0, 1000., 3.0, 3.2), disk(1, 1000., 2.0, 2.2)])],
    );
    catalog.add_allocation("server-1", 0, 0, request("job-a", 100., 1, 0));

    let mut strategy = WorstCase::new(123, Box::new(StdoutLogger::new()));
    let placement = strategy.compute(&catalog, &request("job-1", 100., 2, 0)).unwrap();
    assert_eq!(placement, Placement::new("server-1", 0, 0));
}

#[test]
// Node throttling: on the 4.0 GB/s node the active disk's read bandwidth leaves only
// 1.0 GB/s, below the idle 1.2 GB/s disk on the unloaded node. Skipping the node
// estimate would wrongly rate the loaded disk at its 1.5 GB/s disk-level share.
fn test_worst_case_node_bandwidth_subtraction() {
    let mut catalog = ResourceCatalog::new();
    catalog.append_resources(
        "server-1",
        vec![
            node(0, 4.0, vec![disk(0, 1000., 3.0, 3.0)]),
            node(1, 12.5, vec![disk(0, 1000., 1.2, 1.2)]),
        ],
    );
    catalog.add_allocation("server-1", 0, 0, request("job-a", 100., 1, 0));

    let mut strategy = WorstCase::new(123, Box::new(StdoutLogger::new()));
    let placement = strategy.compute(&catalog, &request("job-1", 100., 1, 0)).unwrap();
    assert_eq!(placement, Placement::new("server-1", 1, 0));
}

#[test]
// When the summed read bandwidth of active disks exceeds the node link, the link is
// shared evenly and clamps every disk of that node, idle ones included.
fn test_worst_case_node_bandwidth_shared() {
    let mut catalog = ResourceCatalog::new();
    catalog.append_resources(
        "server-1",
        vec![
            node(0, 2.0, vec![disk(0, 1000., 3.0, 3.0), disk(1, 1000., 3.0, 5.0)]),
            node(1, 12.5, vec![disk(0, 1000., 2.5, 2.5)]),
        ],
    );
    // Leaves 50 GB free on node 0 disk 1, disqualifying it by capacity and marking
    // the node active with 5.0 GB/s of read bandwidth against a 2.0 GB/s link.
    catalog.add_allocation("server-1", 0, 1, request("job-a", 950., 1, 0));

    let mut strategy = WorstCase::new(123, Box::new(StdoutLogger::new()));
    let placement = strategy.compute(&catalog, &request("job-1", 100., 1, 0)).unwrap();
    assert_eq!(placement, Placement::new("server-1", 1, 0));
}

#[test]
// Ties are broken by the seeded generator: two instances with the same seed pick the
// same sequence of disks on an all-equal catalog.
fn test_worst_case_deterministic_under_seed() {
    let catalog = ResourceCatalog::from_file("server-1", &name_wrapper("uniform_system.yaml")).unwrap();
    let mut first = WorstCase::new(123, Box::new(StdoutLogger::new()));
    let mut second = WorstCase::new(123, Box::new(StdoutLogger::new()));

    for i in 0..10 {
        let req = request(&format!("job-{}", i), 10., 1, 0);
        assert_eq!(first.compute(&catalog, &req), second.compute(&catalog, &req));
    }
}

#[test]
// Strategies only read the catalog; allocation state stays untouched after a decision.
fn test_strategy_does_not_mutate_catalog() {
    let mut catalog = dummy_catalog();
    catalog.add_allocation("server-1", 0, 0, request("job-a", 100., 3, 0));
    catalog.add_allocation("server-1", 0, 1, request("job-b", 200., 3, 0));

    let mut strategy = WorstCase::new(123, Box::new(StdoutLogger::new()));
    strategy.compute(&catalog, &request("job-1", 50., 2, 0)).unwrap();

    assert_eq!(catalog.get_disk("server-1", 0, 0).allocations.len(), 1);
    assert_eq!(catalog.get_disk("server-1", 0, 1).allocations.len(), 1);
    assert_eq!(catalog.get_disk("server-1", 0, 0).capacity, 4000.);
    assert_eq!(catalog.get_disk("server-1", 0, 1).capacity, 6500.);
}
