//! Port reconciler
//!
//! Drives a bare-metal server's network port from its observed remote state
//! to a declared one: bonding, Layer2/Layer3 mode, attached VLANs and the
//! native VLAN. The work is a fixed, ordered pipeline of idempotent steps:
//!
//! 1. sanity check (no remote calls)
//! 2. detach VLANs that are no longer wanted (one batch)
//! 3. disbond
//! 4. convert to Layer2
//! 5. bond
//! 6. convert to Layer3
//! 7. attach newly wanted VLANs (one batch)
//! 8. set or clear the native VLAN
//!
//! Bonding and mode changes decide which VLAN operations the API accepts, so
//! the order is fixed and steps never run concurrently.
//!
//! # Example
//!
//! ```no_run
//! use metal_client::MetalClient;
//! use port_reconciler::{PortIdentity, PortReconciler, PortSpec, ReconcilerSettings};
//! use std::sync::Arc;
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = Arc::new(MetalClient::new(
//!     "https://api.equinix.com/metal/v1".to_string(),
//!     "your-api-token".to_string(),
//! )?);
//! let reconciler = PortReconciler::new(client, ReconcilerSettings::default());
//!
//! let mut spec = PortSpec::new(PortIdentity::Id("port-uuid".to_string()), true);
//! spec.layer2 = Some(true);
//! spec.vxlan_ids = [1001, 1002].into();
//! spec.native_vlan = Some("1001".to_string());
//!
//! let budget = reconciler.budget(Duration::from_secs(30 * 60));
//! let port = reconciler.reconcile(&spec, &budget, &CancellationToken::new()).await?;
//! println!("{} is now {:?}", port.name, port.network_type);
//! # Ok(())
//! # }
//! ```

pub mod budget;
pub mod error;
pub mod observation;
pub mod plan;
pub mod reconciler;
pub mod reset;
pub mod sanity;
pub mod settings;
pub mod spec;
mod steps;


pub use budget::OperationBudget;
pub use error::{ReconcileError, Step};
pub use observation::PortObservation;
pub use plan::{plan, PlannedOperation};
pub use reconciler::PortReconciler;
pub use reset::{verify_reset, ResetOutcome};
pub use sanity::{sanity_check, SanityError};
pub use settings::ReconcilerSettings;
pub use spec::{PortIdentity, PortSpec, VlanAddressing};
