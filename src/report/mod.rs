//! Data preparation for the comparison figures: per-column min-max scaling
//! for radar charts, per-group kernel density curves and mixture clustering.

pub mod cluster;
pub mod density;
pub mod normalize;

pub use cluster::{cluster_table, ClusterReport};
pub use density::{group_densities, DensityCurve};
pub use normalize::normalize_table;
