//! Parser, data model and zoomable layout engine for hierarchical flow networks.

pub mod config;
pub mod ftree;
pub mod layout;
pub mod network;
pub mod tree_path;
pub mod util;
