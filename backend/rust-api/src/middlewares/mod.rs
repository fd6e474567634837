pub mod access_guard;
pub mod metrics;
pub mod trace;
