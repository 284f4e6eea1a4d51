//! Trial aggregation: grouping for fits, blocks for descriptive accuracy.

pub mod blocks;
pub mod groups;

pub use blocks::*;
pub use groups::*;
