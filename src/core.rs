//! Core components of the storage broker.

pub mod allocation_queue;
pub mod common;
pub mod config;
pub mod events;
pub mod logger;
pub mod request;
pub mod resources;
pub mod scheduler;
pub mod scheduling_strategies;
pub mod scheduling_strategy;
pub mod split;
