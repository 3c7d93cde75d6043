//! Measurement engine.
//!
//! Stages run in order: [`sampler`] expands ranges into candidates,
//! [`prober`] measures latency, [`filter`] ranks, [`speed`] downloads.
//! [`pipeline`] wires them together.

pub mod error;
pub mod filter;
pub mod network;
pub mod pipeline;
pub mod prober;
pub mod report;
pub mod sampler;
pub mod speed;
