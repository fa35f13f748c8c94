//! Hydraulic erosion terrain simulation library
//!
//! Re-exports modules for use by binaries and tools.

pub mod erosion;
pub mod export;
pub mod heightmap;
pub mod tilemap;
pub mod worker;
