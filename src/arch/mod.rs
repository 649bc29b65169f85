//! # Architecture Abstraction Layer
//!
//! Board support for the timer's collaborator traits. Currently implements
//! the Cortex-M4 port; other architectures go in sibling modules.

pub mod cortex_m4;
