//! Scheduling strategy interface.

use std::fmt::{Debug, Formatter};

use sugars::boxed;

use crate::core::common::Placement;
use crate::core::config::ConfigError;
use crate::core::logger::Logger;
use crate::core::request::StorageRequest;
use crate::core::resources::{Disk, ResourceCatalog};
use crate::core::scheduling_strategies::random_alloc::RandomAlloc;
use crate::core::scheduling_strategies::round_robin::RoundRobin;
use crate::core::scheduling_strategies::worst_case::WorstCase;
use crate::core::scheduling_strategies::worst_fit::WorstFit;

/// Interface for storage placement strategies.
///
/// A strategy reads the catalog and returns the address of the chosen disk, or `None`
/// when nothing fits. Strategies never mutate allocation state: they keep whatever
/// working estimates they need in local status structures.
pub trait SchedulingStrategy: Send {
    fn compute(&mut self, catalog: &ResourceCatalog, request: &StorageRequest) -> Option<Placement>;
}

/// Strategies carry loggers and generators with no useful textual form; the trait
/// object renders opaquely so `Result<Box<dyn SchedulingStrategy>, _>` stays debuggable.
impl Debug for dyn SchedulingStrategy {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        f.write_str("SchedulingStrategy")
    }
}

/// Creates a scheduling strategy from its configuration name.
pub fn strategy_resolver(
    strategy_name: &str,
    seed: u64,
    logger: Box<dyn Logger>,
) -> Result<Box<dyn SchedulingStrategy>, ConfigError> {
    match strategy_name {
        "random_alloc" => Ok(boxed!(RandomAlloc::new(seed, logger))),
        "round_robin" => Ok(boxed!(RoundRobin::new(logger))),
        "worst_fit" => Ok(boxed!(WorstFit::new(seed, logger))),
        "worst_case" => Ok(boxed!(WorstCase::new(seed, logger))),
        _ => Err(ConfigError::UnknownStrategy(strategy_name.to_string())),
    }
}

/// Capacity of the disk's allocations whose time interval overlaps the request's.
pub fn allocated_capacity_during(disk: &Disk, request: &StorageRequest) -> f64 {
    disk.allocations
        .iter()
        .filter(|alloc| alloc.overlaps(request) > 0.)
        .map(|alloc| alloc.capacity)
        .sum()
}
