//! Implementations of scheduling strategies.

pub mod random_alloc;
pub mod round_robin;
pub mod worst_case;
pub mod worst_fit;
