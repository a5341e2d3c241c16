//! Dry-run projection of the pipeline

use crate::spec::{attached_vlans, current_native, PortSpec};
use metal_client::Port;
use std::collections::BTreeSet;
use std::fmt;

/// One mutation the pipeline would issue
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlannedOperation {
    DetachVlans(BTreeSet<String>),
    Disbond,
    ToLayer2,
    Bond,
    ToLayer3,
    AttachVlans(BTreeSet<String>),
    RemoveNativeVlan,
    AssignNativeVlan(String),
}

impl fmt::Display for PlannedOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlannedOperation::DetachVlans(vlans) => write!(f, "detachVlans({})", join(vlans)),
            PlannedOperation::Disbond => f.write_str("disbond"),
            PlannedOperation::ToLayer2 => f.write_str("toLayer2"),
            PlannedOperation::Bond => f.write_str("bond"),
            PlannedOperation::ToLayer3 => f.write_str("toLayer3"),
            PlannedOperation::AttachVlans(vlans) => write!(f, "attachVlans({})", join(vlans)),
            PlannedOperation::RemoveNativeVlan => f.write_str("removeNativeVlan"),
            PlannedOperation::AssignNativeVlan(vlan) => write!(f, "assignNativeVlan({})", vlan),
        }
    }
}

fn join(vlans: &BTreeSet<String>) -> String {
    vlans.iter().map(String::as_str).collect::<Vec<_>>().join(",")
}

/// Operations a reconcile of `spec` would issue against `port`, in order
///
/// Detaching the native VLAN also clears it, so no separate removal is
/// planned in that case.
pub fn plan(port: &Port, spec: &PortSpec) -> Vec<PlannedOperation> {
    let addressing = spec.addressing();
    let desired = spec.desired_vlans();
    let attached = attached_vlans(port, addressing);
    let mut ops = Vec::new();

    let to_remove: BTreeSet<String> = attached.difference(&desired).cloned().collect();
    let current = current_native(port, addressing).filter(|native| !to_remove.contains(native));
    if !to_remove.is_empty() {
        ops.push(PlannedOperation::DetachVlans(to_remove));
    }

    let mut bonded = port.is_bonded();
    let mut layer2 = port.is_layer2();
    if !spec.bonded && bonded {
        ops.push(PlannedOperation::Disbond);
        bonded = false;
    }
    if spec.layer2 == Some(true) && port.is_bond_port() && !layer2 {
        ops.push(PlannedOperation::ToLayer2);
        layer2 = true;
    }
    if spec.bonded && !bonded {
        ops.push(PlannedOperation::Bond);
    }
    if spec.layer2 == Some(false) && port.is_bond_port() && layer2 {
        ops.push(PlannedOperation::ToLayer3);
    }

    let to_assign: BTreeSet<String> = desired.difference(&attached).cloned().collect();
    if !to_assign.is_empty() {
        ops.push(PlannedOperation::AttachVlans(to_assign));
    }

    match spec.desired_native() {
        desired if desired == current.as_deref() => {}
        None => ops.push(PlannedOperation::RemoveNativeVlan),
        Some(native) => ops.push(PlannedOperation::AssignNativeVlan(native.to_string())),
    }

    ops
}
