//! Per-user locations: data root, binary cache and config directory.

pub mod cache;
pub mod utils;
