//! Level-of-detail selection and desired tile set computation.

mod desired;
mod error;
mod policy;

pub use desired::{CellLod, DesiredSet, DesiredTile, assign_cell_lods, compute_desired};
pub use error::LodError;
pub use policy::{LodPolicy, LodThresholds, ThresholdPolicy};
