//! Scoring Module
//!
//! Score scales, dimension score sets, and the weighted aggregate.

mod dimensions;
mod scale;
mod weights;

pub use dimensions::{DimensionSet, ScoreSet};
pub use scale::ScoreScale;
pub use weights::{aggregate, round2, WeightSet};
