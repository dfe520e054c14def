// src/node/labels.rs
//
// =============================================================================
// TOPOLOGY-SCHED: LABEL INGESTION
// =============================================================================
//
// The recognised label keys (spec §6) and the top-level orchestrator that
// turns a flat label map into a `Node`'s CPU/GPU/NIC/misc fields. Ported
// from `Node.ParseLabels` / `Node.InitMisc`, which called `InitCores`,
// `InitNics`, `InitGpus`, `InitMisc` in sequence and rejected the node on
// the first failure.

pub const LABEL_NUM_SOCKETS: &str = "feature.node.kubernetes.io/nfd-extras-cpu.num_sockets";
pub const LABEL_NUM_CORES: &str = "feature.node.kubernetes.io/nfd-extras-cpu.num_cores";
pub const LABEL_SMT: &str = "feature.node.kubernetes.io/cpu-hardware_multithreading";
pub const LABEL_ISOLCPUS: &str = "feature.node.kubernetes.io/nfd-extras-cpu.isolcpus";
pub const LABEL_NIC_PREFIX: &str = "feature.node.kubernetes.io/nfd-extras-nic";
pub const LABEL_GPU_PREFIX: &str = "feature.node.kubernetes.io/nfd-extras-gpu";
pub const LABEL_DATA_VLAN: &str = "DATA_PLANE_VLAN";
pub const LABEL_DEFAULT_GW: &str = "DATA_DEFAULT_GW";

use crate::config::SchedulerConfig;
use crate::error::DiscoveryError;
use crate::node::cpu::CpuInventory;
use crate::node::gpu::GpuInventory;
use crate::node::nic::NicInventory;
use std::collections::HashMap;

/// The subset of a `Node`'s state that discovery produces from labels
/// alone (everything except hugepages, which arrives out-of-band).
pub struct DiscoveredInventory {
    pub cpu: CpuInventory,
    pub gpu: GpuInventory,
    pub nic: NicInventory,
    pub data_vlan: u32,
    pub gateway_ip: String,
}

/// Parses a node's full label map (spec §6). Any missing/invalid required
/// label rejects the node entirely (`DiscoveryError`), matching
/// `ParseLabels`'s "ignore node on first failure" contract but with a
/// typed reason instead of a bare `false`.
pub fn parse_labels(
    labels: &HashMap<String, String>,
    cfg: &SchedulerConfig,
) -> Result<DiscoveredInventory, DiscoveryError> {
    let cpu = CpuInventory::from_labels(labels)?;
    let nic = NicInventory::from_labels(labels, cfg)?;
    let gpu = GpuInventory::from_labels(labels)?;

    let data_vlan: u32 = labels
        .get(LABEL_DATA_VLAN)
        .ok_or(DiscoveryError::MissingLabel(LABEL_DATA_VLAN))?
        .parse()
        .map_err(|_| DiscoveryError::InvalidLabel {
            label: LABEL_DATA_VLAN.to_string(),
            reason: "not an integer".to_string(),
        })?;

    let gateway_ip = labels
        .get(LABEL_DEFAULT_GW)
        .ok_or(DiscoveryError::MissingLabel(LABEL_DEFAULT_GW))?
        .clone();

    Ok(DiscoveredInventory {
        cpu,
        gpu,
        nic,
        data_vlan,
        gateway_ip,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_node_missing_vlan_label() {
        let mut labels = HashMap::new();
        labels.insert(LABEL_NUM_SOCKETS.to_string(), "1".to_string());
        labels.insert(LABEL_NUM_CORES.to_string(), "2".to_string());

        let cfg = SchedulerConfig::default();
        let err = parse_labels(&labels, &cfg).unwrap_err();
        assert_eq!(err, DiscoveryError::MissingLabel(LABEL_DATA_VLAN));
    }

    #[test]
    fn accepts_minimal_valid_node() {
        let mut labels = HashMap::new();
        labels.insert(LABEL_NUM_SOCKETS.to_string(), "1".to_string());
        labels.insert(LABEL_NUM_CORES.to_string(), "4".to_string());
        labels.insert(LABEL_DATA_VLAN.to_string(), "100".to_string());
        labels.insert(LABEL_DEFAULT_GW.to_string(), "10.0.0.1".to_string());

        let cfg = SchedulerConfig::default();
        let discovered = parse_labels(&labels, &cfg).unwrap();
        assert_eq!(discovered.data_vlan, 100);
        assert_eq!(discovered.gateway_ip, "10.0.0.1");
        assert_eq!(discovered.cpu.cores.len(), 4);
    }
}
