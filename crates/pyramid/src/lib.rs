//! Pyramid construction.
//!
//! A parent tile at zoom `z` covers the same ground as its four children at
//! `z + 1` at the same pixel size, so every parent cell summarises a 2x2
//! block of child cells. [`PyramidAggregator`] does that for one parent,
//! [`PyramidGraph`] tracks which parents are ready, and [`PyramidScheduler`]
//! runs the whole build on the rayon pool.

pub mod aggregate;
pub mod combine;
pub mod downsample;
pub mod graph;
pub mod schedule;

pub use aggregate::{AggregateOutcome, BandRule, ChildSlot, MissingChildPolicy, PyramidAggregator};
pub use combine::CombineRule;
pub use downsample::downsample_2x;
pub use graph::{NodeStatus, PyramidGraph};
pub use schedule::{PyramidReport, PyramidScheduler};
