//! Core types for canon.

mod domain;
mod entity;
mod extraction;
mod graph;

pub use domain::*;
pub use entity::*;
pub use extraction::*;
pub use graph::*;
