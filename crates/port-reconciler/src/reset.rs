//! Deletion-time reset
//!
//! When a managed port is released it is put back into the provider's
//! default shape: bonded, Layer3, nothing attached. A port that does not
//! end up that way is reported, not treated as an error, so deletion can
//! still complete.

use metal_client::Port;

/// Result of a reset
#[derive(Debug, Clone, PartialEq)]
pub enum ResetOutcome {
    /// The port could not be fetched (404/403); nothing to do
    AlreadyGone,
    /// The reset ran; `warnings` lists unmet post-conditions
    Reset { port: Port, warnings: Vec<String> },
}

impl ResetOutcome {
    /// True unless the reset left the port in a non-default state
    pub fn is_clean(&self) -> bool {
        match self {
            ResetOutcome::AlreadyGone => true,
            ResetOutcome::Reset { warnings, .. } => warnings.is_empty(),
        }
    }

    pub fn warnings(&self) -> &[String] {
        match self {
            ResetOutcome::AlreadyGone => &[],
            ResetOutcome::Reset { warnings, .. } => warnings,
        }
    }
}

/// Post-conditions a reset port must satisfy
pub fn verify_reset(port: &Port) -> Vec<String> {
    let mut warnings = Vec::new();
    if !port.is_bonded() {
        warnings.push(format!("port {} wasn't bonded after reset;", port.id));
    }
    if port.is_bond_port() && port.network_type != Some(metal_client::NetworkType::Layer3) {
        warnings.push("bond port should be in layer3 type after reset;".to_string());
    }
    if port.native_virtual_network.is_some() {
        warnings.push("port should not have native VLAN assigned after reset;".to_string());
    }
    if !port.virtual_networks.is_empty() {
        warnings.push("port should not have VLANs attached after reset".to_string());
    }
    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use metal_client::mock::fixtures;
    use metal_client::NetworkType;

    #[test]
    fn test_default_port_passes() {
        let port = fixtures::bond_port("p-1", NetworkType::Layer3, true);
        assert!(verify_reset(&port).is_empty());
    }

    #[test]
    fn test_every_violation_is_reported() {
        let port = fixtures::with_vlans(
            fixtures::bond_port("p-1", NetworkType::Layer2Individual, false),
            &[fixtures::vlan("a", 1), fixtures::vlan("b", 2)],
            Some("a"),
        );
        assert_eq!(
            verify_reset(&port),
            vec![
                "port p-1 wasn't bonded after reset;".to_string(),
                "bond port should be in layer3 type after reset;".to_string(),
                "port should not have native VLAN assigned after reset;".to_string(),
                "port should not have VLANs attached after reset".to_string(),
            ]
        );
    }

    #[test]
    fn test_member_port_skips_layer3_check() {
        let port = fixtures::member_port("p-2", true);
        assert!(verify_reset(&port).is_empty());
    }
}
