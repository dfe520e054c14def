// src/topology.rs
//
// =============================================================================
// TOPOLOGY-SCHED: TOPOLOGY REQUEST / MAPPING DECISION
// =============================================================================
//
// The topology request language itself is external to this crate (spec §1
// Non-goals); this module only fixes the *shape* the placement engine and
// reservation ledger consume, per spec §3 and the "Dynamic-typed mapping
// dict" design note: the mapping decision is a tagged record with three
// fixed fields rather than a string-keyed dict.

use serde::{Deserialize, Serialize};

/// Whether SMT siblings must be paired, must not be, or either is fine,
/// when a batch of CPU cores is handed out (spec §4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SmtSetting {
    Require,
    Forbid,
    Either,
}

/// Whether a requested core carries NIC traffic, and in which direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    None,
    Rx,
    Tx,
}

/// One requested CPU core slot within a processing group, GPU's core list,
/// or a top-level miscellaneous core list.
///
/// `id` is a stable identity assigned by whoever builds the topology
/// request (the external matcher); it is how `Topology::nic_group_for_core`
/// locates the NIC pairing a given request core belongs to, mirroring the
/// original's in-place `NodeCore`-style objects shared by reference between
/// a processing group's `proc_cores` and `nic_core_pairing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReqCore {
    pub id: u32,
    pub direction: Direction,
    /// Bandwidth this core accounts for against its NIC, in Mbps
    /// (fixed-point; see Design Notes on float bandwidth accounting).
    pub nic_bw_mbps: u32,
    /// Physical core ID assigned by the placement engine. `None` until
    /// placed.
    pub core: Option<u32>,
}

impl ReqCore {
    pub fn new(id: u32) -> Self {
        Self {
            id,
            direction: Direction::None,
            nic_bw_mbps: 0,
            core: None,
        }
    }

    pub fn with_direction(id: u32, direction: Direction, nic_bw_mbps: u32) -> Self {
        Self {
            id,
            direction,
            nic_bw_mbps,
            core: None,
        }
    }
}

/// A GPU requested by a processing group, plus the CPU cores dedicated to
/// feeding it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupGpu {
    pub cpu_cores: Vec<ReqCore>,
    /// Physical device ID assigned by the placement engine.
    pub device_id: Option<u32>,
}

/// A co-located bundle of CPU cores, GPUs, and NIC bandwidth that must land
/// on a single NUMA domain (spec §1, §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcGroup {
    pub proc_cores: Vec<ReqCore>,
    pub misc_cores: Vec<ReqCore>,
    pub group_gpus: Vec<GroupGpu>,
    pub proc_smt: SmtSetting,
    pub helper_smt: SmtSetting,
    /// Output: filled with the node's data-plane VLAN during placement.
    pub vlan: Option<u32>,
}

/// The output side of a NIC binding: the pairing of one rx-carrying and one
/// tx-carrying request core against a single physical NIC.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NicCorePairing {
    /// Output: the NIC's canonical MAC, filled unless SR-IOV routes by name.
    pub mac: Option<String>,
    /// Output: the NIC's interface name, filled when SR-IOV is enabled.
    pub ifname: Option<String>,
    pub rx_core: ReqCore,
    pub tx_core: ReqCore,
}

/// The full topology request bound to exactly one node (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Topology {
    pub proc_groups: Vec<ProcGroup>,
    pub misc_cores: Vec<ReqCore>,
    pub misc_cores_smt: SmtSetting,
    pub hugepages_gb: u32,
    /// Output: filled with the node's data-plane VLAN during placement.
    pub ctrl_vlan: Option<u32>,
    pub nic_core_pairing: Vec<NicCorePairing>,
    /// Output: filled with the node's gateway IP during placement.
    pub data_gateway: Option<String>,
}

impl Topology {
    /// Finds the NIC pairing entry that owns the given request core, by
    /// its stable `id`. Ported from `CfgTopology.GetNICGroup`, whose source
    /// wasn't retained in `original_source/` but whose contract is fully
    /// determined by its two call sites in `SetPhysicalIdsFromMapping`.
    pub fn nic_group_for_core_mut(&mut self, core_id: u32) -> Option<&mut NicCorePairing> {
        self.nic_core_pairing
            .iter_mut()
            .find(|p| p.rx_core.id == core_id || p.tx_core.id == core_id)
    }

    /// All request cores across every processing group and the top-level
    /// miscellaneous list, used by the reservation ledger to walk every
    /// reserved core in one pass.
    pub fn all_group_proc_cores(&self) -> impl Iterator<Item = &ReqCore> {
        self.proc_groups.iter().flat_map(|g| g.proc_cores.iter())
    }

    pub fn all_group_misc_cores(&self) -> impl Iterator<Item = &ReqCore> {
        self.proc_groups.iter().flat_map(|g| g.misc_cores.iter())
    }

    pub fn all_gpu_cpu_cores(&self) -> impl Iterator<Item = &ReqCore> {
        self.proc_groups
            .iter()
            .flat_map(|g| g.group_gpus.iter())
            .flat_map(|gpu| gpu.cpu_cores.iter())
    }
}

/// The mapping decision, produced by an external matcher and assumed
/// feasible against the node's free-resource views: which NUMA domain each
/// processing group's CPUs/GPUs land on, and which NIC (by NUMA + ordinal)
/// each group's NIC traffic binds to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappingDecision {
    /// One entry per processing group, plus a trailing entry for the
    /// top-level miscellaneous cores (spec §3: "numa per group + trailing
    /// numa for top-level misc").
    pub cpu: Vec<u32>,
    /// One NUMA domain per processing group. Per the original source,
    /// this is also what batch CPU/GPU allocation keys off for each group
    /// (`group_numa_node = mapping['gpu'][pi]`) — `cpu[pi]` is only
    /// consulted for the trailing top-level entry. See DESIGN.md.
    pub gpu: Vec<u32>,
    /// One `(numa, numa_ordinal)` pair per processing group, identifying
    /// which NIC on that NUMA domain carries the group's traffic.
    pub nic: Vec<(u32, u32)>,
}
