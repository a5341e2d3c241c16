//! DCops CRD Definitions
//!
//! Kubernetes Custom Resource Definitions for the metal port controller.

pub mod metal_port;

pub use metal_port::*;
