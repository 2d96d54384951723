//! File workers and the pool running them.

pub mod backoff;
pub mod file;
pub mod policy;
pub mod pool;
