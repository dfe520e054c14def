// src/placement.rs
//
// =============================================================================
// TOPOLOGY-SCHED: PLACEMENT ENGINE
// =============================================================================
//
// Ported from `Node.SetPhysicalIdsFromMapping`. Maps a mapping decision
// plus a topology request onto concrete physical core/GPU/NIC IDs,
// reserving them atomically: any failure partway through unwinds every
// reservation made so far before the error is returned (spec §4.7, §5).
//
// The original signals failure three ways (`raise IndexError` mid-group,
// `return None` for helper/top-level shortfalls, logged-and-continued
// drift elsewhere); this unifies all placement failures into one
// `Result<_, PlacementError>`, with the same rollback on every path
// (Design Notes: "unify on a result variant").

use crate::config::SchedulerConfig;
use crate::error::PlacementError;
use crate::node::Node;
use crate::topology::{Direction, MappingDecision, Topology};

/// One NIC's bandwidth claim made during a placement, returned to the
/// caller for downstream network-attachment-definition generation (spec
/// §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsedNic {
    pub nic_index: usize,
    pub bandwidth_mbps: u32,
    pub direction: Direction,
}

/// Bookkeeping of everything reserved so far in this call, so a failure
/// can be unwound exactly (spec §4.7: "revert every CPU to !used, every
/// GPU to !used, and subtract previously added NIC bandwidth").
#[derive(Default)]
struct Reservations {
    cpus: Vec<u32>,
    gpus: Vec<u32>,
    nics: Vec<UsedNic>,
}

impl Reservations {
    fn rollback(self, node: &mut Node) {
        for core in self.cpus {
            node.cpu.mark_free(core);
        }
        for gpu in self.gpus {
            node.gpu.mark_free(gpu);
        }
        for used in self.nics {
            if let Some(nic) = node.nic.nics.get_mut(used.nic_index) {
                match used.direction {
                    Direction::Rx => {
                        nic.rx_used_mbps = nic.rx_used_mbps.saturating_sub(used.bandwidth_mbps)
                    }
                    Direction::Tx => {
                        nic.tx_used_mbps = nic.tx_used_mbps.saturating_sub(used.bandwidth_mbps)
                    }
                    Direction::None => {}
                }
            }
        }
    }
}

/// Maps `topology` onto `node`'s physical resources according to
/// `mapping`, reserving every assigned core/GPU/NIC-bandwidth unit. On
/// success, fills in the topology's output fields (device IDs, core IDs,
/// VLANs, gateway, NIC bindings) and returns the list of NIC bandwidth
/// claims made. On failure, the node's inventory is restored to exactly
/// its pre-call state and a `PlacementError` is returned.
///
/// The caller is still responsible for calling `node.add_scheduled_pod`
/// and retaining the bound topology afterwards, so that
/// `ledger::add_resources` can undo this placement later (spec §4.7).
pub fn place(
    node: &mut Node,
    mapping: &MappingDecision,
    topology: &mut Topology,
    cfg: &SchedulerConfig,
) -> Result<Vec<UsedNic>, PlacementError> {
    let mut reserved = Reservations::default();

    match place_inner(node, mapping, topology, cfg, &mut reserved) {
        Ok(used_nics) => Ok(used_nics),
        Err(e) => {
            reserved.rollback(node);
            Err(e)
        }
    }
}

fn place_inner(
    node: &mut Node,
    mapping: &MappingDecision,
    topology: &mut Topology,
    cfg: &SchedulerConfig,
    reserved: &mut Reservations,
) -> Result<Vec<UsedNic>, PlacementError> {
    for pi in 0..topology.proc_groups.len() {
        // NB: per the original source, a processing group's CPU/GPU batch
        // is keyed off `mapping.gpu[pi]`, not `mapping.cpu[pi]` — see
        // DESIGN.md. `mapping.cpu` is only consulted for the trailing
        // top-level misc-core entry below.
        let group_numa = *mapping
            .gpu
            .get(pi)
            .ok_or(PlacementError::MappingTooShort { field: "gpu", index: pi })?;

        topology.proc_groups[pi].vlan = Some(node.data_vlan);

        let group_cpu_req: usize = topology.proc_groups[pi].proc_cores.len()
            + topology.proc_groups[pi]
                .group_gpus
                .iter()
                .map(|g| g.cpu_cores.len())
                .sum::<usize>();

        let batch = node.get_free_cpu_batch(
            group_numa,
            group_cpu_req,
            topology.proc_groups[pi].proc_smt,
        );
        if batch.len() != group_cpu_req {
            return Err(PlacementError::InsufficientCpuBatch {
                requested: group_cpu_req,
                found: batch.len(),
                numa: group_numa,
            });
        }

        let mut cidx = 0usize;

        let n_gpus = topology.proc_groups[pi].group_gpus.len();
        for gi in 0..n_gpus {
            let gdev = node
                .gpu
                .next_free(group_numa)
                .ok_or(PlacementError::NoFreeGpu { numa: group_numa })?
                .device_id;

            node.gpu.mark_used(gdev);
            reserved.gpus.push(gdev);
            topology.proc_groups[pi].group_gpus[gi].device_id = Some(gdev);

            let n_cpu_cores = topology.proc_groups[pi].group_gpus[gi].cpu_cores.len();
            for ci in 0..n_cpu_cores {
                let core = batch[cidx];
                cidx += 1;
                node.cpu.mark_used(core);
                reserved.cpus.push(core);
                topology.proc_groups[pi].group_gpus[gi].cpu_cores[ci].core = Some(core);
            }
        }

        let n_proc_cores = topology.proc_groups[pi].proc_cores.len();
        for ci in 0..n_proc_cores {
            let core = batch[cidx];
            cidx += 1;
            node.cpu.mark_used(core);
            reserved.cpus.push(core);
            topology.proc_groups[pi].proc_cores[ci].core = Some(core);

            let req_core = topology.proc_groups[pi].proc_cores[ci];
            if matches!(req_core.direction, Direction::Rx | Direction::Tx) {
                let (numa, ordinal) = *mapping
                    .nic
                    .get(pi)
                    .ok_or(PlacementError::MappingTooShort { field: "nic", index: pi })?;
                let nic_index = node
                    .nic
                    .find_index(numa, ordinal)
                    .ok_or(PlacementError::NicNotFound { numa, ordinal })?;

                match req_core.direction {
                    Direction::Rx => {
                        node.nic.nics[nic_index].rx_used_mbps += req_core.nic_bw_mbps
                    }
                    Direction::Tx => {
                        node.nic.nics[nic_index].tx_used_mbps += req_core.nic_bw_mbps
                    }
                    Direction::None => unreachable!(),
                }
                reserved.nics.push(UsedNic {
                    nic_index,
                    bandwidth_mbps: req_core.nic_bw_mbps,
                    direction: req_core.direction,
                });

                let nic_ifname = node.nic.nics[nic_index].ifname.clone();
                let nic_mac = node.nic.nics[nic_index].mac.clone();
                let sriov = node.sriov_enabled;
                let pairing = topology
                    .nic_group_for_core_mut(req_core.id)
                    .ok_or(PlacementError::NicGroupMissing { core_id: req_core.id })?;
                if sriov {
                    pairing.ifname = Some(nic_ifname);
                } else {
                    pairing.mac = Some(nic_mac);
                }
            }
        }

        debug_assert_eq!(cidx, batch.len(), "all batch entries must be consumed");

        let misc_len = topology.proc_groups[pi].misc_cores.len();
        let helper_batch =
            node.get_free_cpu_batch(group_numa, misc_len, topology.proc_groups[pi].helper_smt);
        if helper_batch.len() != misc_len {
            return Err(PlacementError::InsufficientCpuBatch {
                requested: misc_len,
                found: helper_batch.len(),
                numa: group_numa,
            });
        }

        for (hi, core) in helper_batch.into_iter().enumerate() {
            node.cpu.mark_used(core);
            reserved.cpus.push(core);
            topology.proc_groups[pi].misc_cores[hi].core = Some(core);
        }
    }

    topology.data_gateway = Some(node.gateway_ip.clone());

    if topology.hugepages_gb > 0 {
        node.mem.free_hp_gb = node.mem.free_hp_gb.saturating_sub(topology.hugepages_gb);
    }

    let top_misc_len = topology.misc_cores.len();
    let top_numa = *mapping.cpu.last().ok_or(PlacementError::MappingTooShort {
        field: "cpu",
        index: mapping.cpu.len(),
    })?;
    let misc_batch = node.get_free_cpu_batch(top_numa, top_misc_len, topology.misc_cores_smt);
    if misc_batch.len() != top_misc_len {
        return Err(PlacementError::InsufficientCpuBatch {
            requested: top_misc_len,
            found: misc_batch.len(),
            numa: top_numa,
        });
    }

    for (mi, core) in misc_batch.into_iter().enumerate() {
        node.cpu.mark_used(core);
        reserved.cpus.push(core);
        topology.misc_cores[mi].core = Some(core);
    }

    topology.ctrl_vlan = Some(node.data_vlan);

    Ok(reserved.nics.clone())
}
