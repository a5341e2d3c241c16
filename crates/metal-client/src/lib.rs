//! Metal REST API Client
//!
//! A Rust client library for the bare-metal provider's v1 REST API, limited
//! to what a network-port controller needs: ports and their VLAN assignment
//! batches, devices, and the read side of other asynchronously provisioned
//! resources.
//!
//! # Example
//!
//! ```no_run
//! use metal_client::{MetalClient, MetalClientTrait};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = MetalClient::new(
//!     "https://api.equinix.com/metal/v1".to_string(),
//!     "your-api-token".to_string(),
//! )?;
//!
//! let port = client.get_port("7c1b4f2e-7a9a-4f3e-9d1b-2c4f7a0e1b2d").await?;
//! println!("{} is {:?}, bonded: {}", port.name, port.network_type, port.is_bonded());
//! # Ok(())
//! # }
//! ```
//!
//! # Features
//!
//! - **Ports**: bond/disbond, Layer2/Layer3 conversion, native VLAN
//! - **VLAN batches**: create and poll VLAN assignment batches
//! - **Waiters**: wait for batches, gateways, virtual circuits, IP reservations and spot market requests
//! - **Mock**: in-memory `MockMetalClient` behind the `test-util` feature

pub mod client;
pub mod common;
pub mod error;
pub mod models;
#[path = "trait.rs"]
pub mod metal_trait;
pub mod waiters;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;

pub use client::{MetalClient, DEFAULT_BASE_URL};
pub use common::HttpClient;
pub use error::MetalError;
pub use models::*;
pub use metal_trait::MetalClientTrait;
#[cfg(any(test, feature = "test-util"))]
pub use mock::{MockCall, MockMetalClient, MockOperation};
