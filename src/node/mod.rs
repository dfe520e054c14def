// src/node/mod.rs
//
// =============================================================================
// TOPOLOGY-SCHED: NODE — RESOURCE INVENTORY AGGREGATE
// =============================================================================
//
// Ported from the `Node` class in the original source. Owns arena-style
// vectors of cores/GPUs/NICs; cross-references elsewhere in the crate are
// plain indices/IDs into those vectors, never cyclic pointers (Design
// Notes item 1).

pub mod cpu;
pub mod gpu;
pub mod labels;
pub mod memory;
pub mod nic;

use crate::config::SchedulerConfig;
use crate::error::DiscoveryError;
use crate::topology::SmtSetting;
use cpu::CpuInventory;
use gpu::GpuInventory;
use memory::Memory;
use nic::NicInventory;
use std::collections::{HashMap, HashSet};

/// A single node's full resource inventory plus the cluster-facing
/// metadata the placement engine and reservation ledger need.
pub struct Node {
    pub name: String,
    pub address: Option<String>,

    pub cpu: CpuInventory,
    pub gpu: GpuInventory,
    pub nic: NicInventory,
    pub mem: Memory,

    pub data_vlan: u32,
    pub gateway_ip: String,
    pub sriov_enabled: bool,

    /// (pod, namespace) pairs currently scheduled on this node. Ported
    /// from `pods_scheduled` / `AddScheduledPod` / `RemoveScheduledPod`.
    pub scheduled: HashSet<(String, String)>,
}

impl Node {
    /// Builds a node from scratch: parses labels into inventories, then
    /// layers hugepages on top (since those arrive out-of-band per spec
    /// §6.3, not from the label map).
    pub fn from_labels(
        name: impl Into<String>,
        labels: &HashMap<String, String>,
        cfg: &SchedulerConfig,
    ) -> Result<Self, DiscoveryError> {
        let discovered = labels::parse_labels(labels, cfg)?;

        Ok(Self {
            name: name.into(),
            address: None,
            cpu: discovered.cpu,
            gpu: discovered.gpu,
            nic: discovered.nic,
            mem: Memory::default(),
            data_vlan: discovered.data_vlan,
            gateway_ip: discovered.gateway_ip,
            sriov_enabled: cfg.enable_sriov,
            scheduled: HashSet::new(),
        })
    }

    pub fn set_hugepages(&mut self, total_gb: u32, free_gb: u32) {
        self.mem.set(total_gb, free_gb);
    }

    /// Restores the node to full capacity: clears `used` except on
    /// reserved cores, zeroes NIC usage/pod counts, refills hugepages, and
    /// clears the scheduled-pod set (`ResetResources`).
    pub fn reset_resources(&mut self) {
        self.cpu.reset();
        self.gpu.reset();
        self.nic.reset();
        self.mem.reset();
        self.scheduled.clear();
    }

    // --- Free-resource views (spec §4.5) ---

    pub fn free_cpu_core_count(&self) -> usize {
        self.cpu.free_cpu_core_count()
    }

    pub fn free_cpu_per_numa(&self) -> Vec<usize> {
        self.cpu.free_cpu_per_numa()
    }

    pub fn free_gpu_per_numa(&self) -> Vec<usize> {
        self.gpu.free_gpu_per_numa(self.cpu.numa_nodes)
    }

    /// `[rx_free, tx_free]` Gbps per NIC, bucketed by NUMA.
    pub fn free_nic_bandwidth_per_numa_gbps(&self, cfg: &SchedulerConfig) -> Vec<Vec<(f64, f64)>> {
        self.nic
            .free_bandwidth_per_numa_mbps(self.cpu.numa_nodes, cfg)
            .into_iter()
            .map(|numa_nics| {
                numa_nics
                    .into_iter()
                    .map(|(rx, tx)| (rx as f64 / 1000.0, tx as f64 / 1000.0))
                    .collect()
            })
            .collect()
    }

    pub fn get_free_cpu_batch(&self, numa: u32, n: usize, smt: SmtSetting) -> Vec<u32> {
        self.cpu.get_free_cpu_batch(numa, n, smt)
    }

    // --- NIC lookup ---

    /// The key `Remove/AddResourcesFromTopology` use to find a NIC: by MAC
    /// normally, by interface name when SR-IOV is enabled (ported from
    /// `GetNIC(mac) if not sriov_en else GetNICFromIfName(mac)`).
    pub fn nic_index_for_key(&self, key: &str) -> Option<usize> {
        if self.sriov_enabled {
            self.nic.nics.iter().position(|n| n.ifname == key)
        } else {
            self.nic.nics.iter().position(|n| n.mac == key)
        }
    }

    // --- Scheduled-pod bookkeeping ---

    pub fn total_pods(&self) -> usize {
        self.scheduled.len()
    }

    pub fn pod_present(&self, pod: &str, ns: &str) -> bool {
        self.scheduled.contains(&(pod.to_string(), ns.to_string()))
    }

    pub fn add_scheduled_pod(&mut self, pod: impl Into<String>, ns: impl Into<String>) {
        self.scheduled.insert((pod.into(), ns.into()));
    }

    pub fn remove_scheduled_pod(&mut self, pod: &str, ns: &str) {
        self.scheduled.remove(&(pod.to_string(), ns.to_string()));
    }
}
