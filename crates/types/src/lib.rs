//! Core types for the gossim consensus simulator.
//!
//! This crate provides the foundational types used throughout the simulator:
//!
//! - **Identifiers**: [`NodeId`], plus the [`SimTime`] and [`Timestamp`]
//!   aliases for virtual-clock milliseconds and per-node freshness counters
//! - **Positions**: the three-valued [`Position`] a node can hold or report,
//!   and the [`PositionRecord`] gossiped between nodes
//!
//! # Design Philosophy
//!
//! This crate is self-contained with no dependencies. It does not depend on
//! any other workspace crates, making it the foundation layer.

mod identifiers;
mod position;

pub use identifiers::{NodeId, SimTime, Timestamp};
pub use position::{Position, PositionRecord};
