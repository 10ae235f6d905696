//! Network tracing
//!
//! The search orchestration ([`engine`]), the two connectivity strategies
//! ([`graph`] and [`topo`]), and the result tree ([`node`]).

pub mod engine;
pub mod graph;
pub mod node;
pub mod topo;
