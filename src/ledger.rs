// src/ledger.rs
//
// =============================================================================
// TOPOLOGY-SCHED: RESERVATION LEDGER
// =============================================================================
//
// Ported from `Node.RemoveResourcesFromTopology` /
// `Node.AddResourcesFromTopology`. Used when a node's scheduled set is
// rediscovered from an external source of truth (e.g. a pod already
// running) rather than freshly placed. Unlike the placement engine, these
// operations do not abort on anomalies: a double-reserve or double-release
// indicates drift between the ledger and reality and is logged, not
// fatal (spec §7, error kind 3 and 4).

use crate::node::Node;
use crate::topology::{Direction, Topology};

/// Marks every CPU core, GPU, and NIC-bandwidth/pod-count entry named by
/// `top` as used, and decrements hugepages. Logs (but does not abort on)
/// an already-used resource.
pub fn remove_resources(node: &mut Node, top: &Topology) {
    for core in top.all_group_misc_cores().chain(top.all_group_proc_cores()) {
        if let Some(id) = core.core {
            if node.cpu.is_used(id) {
                log::error!("processing group core {} was already in use", id);
            }
            node.cpu.mark_used(id);
        }
    }

    for group in &top.proc_groups {
        for gpu in &group.group_gpus {
            if let Some(device_id) = gpu.device_id {
                match node.gpu.get(device_id) {
                    None => log::error!("cannot find gpu device id {}", device_id),
                    Some(dev) => {
                        if dev.used {
                            log::error!("gpu {} was already in use", device_id);
                        }
                        node.gpu.mark_used(device_id);
                    }
                }
            }
            for core in &gpu.cpu_cores {
                if let Some(id) = core.core {
                    if node.cpu.is_used(id) {
                        log::error!("gpu core {} was already in use", id);
                    }
                    node.cpu.mark_used(id);
                }
            }
        }
    }

    for core in &top.misc_cores {
        if let Some(id) = core.core {
            if node.cpu.is_used(id) {
                log::error!("miscellaneous core {} was already in use", id);
            }
            node.cpu.mark_used(id);
        }
    }

    for pairing in &top.nic_core_pairing {
        apply_nic_pairing(node, pairing, Direction::Rx, false);
        apply_nic_pairing(node, pairing, Direction::Tx, false);
        bump_pod_count(node, pairing, 1);
    }

    if top.hugepages_gb > 0 {
        node.mem.free_hp_gb = node.mem.free_hp_gb.saturating_sub(top.hugepages_gb);
    }
}

/// The exact inverse of `remove_resources`.
pub fn add_resources(node: &mut Node, top: &Topology) {
    for core in top.all_group_misc_cores().chain(top.all_group_proc_cores()) {
        if let Some(id) = core.core {
            if !node.cpu.is_used(id) {
                log::error!("processing group core {} was not in use", id);
            }
            node.cpu.mark_free(id);
        }
    }

    for group in &top.proc_groups {
        for gpu in &group.group_gpus {
            if let Some(device_id) = gpu.device_id {
                match node.gpu.get(device_id) {
                    None => log::error!("cannot find gpu device id {}", device_id),
                    Some(dev) => {
                        if !dev.used {
                            log::error!("gpu {} was not in use", device_id);
                        }
                        node.gpu.mark_free(device_id);
                    }
                }
            }
            for core in &gpu.cpu_cores {
                if let Some(id) = core.core {
                    if !node.cpu.is_used(id) {
                        log::error!("gpu core {} was not in use", id);
                    }
                    node.cpu.mark_free(id);
                }
            }
        }
    }

    for core in &top.misc_cores {
        if let Some(id) = core.core {
            if !node.cpu.is_used(id) {
                log::error!("misc core {} was not in use", id);
            }
            node.cpu.mark_free(id);
        }
    }

    for pairing in &top.nic_core_pairing {
        apply_nic_pairing(node, pairing, Direction::Rx, true);
        apply_nic_pairing(node, pairing, Direction::Tx, true);
        bump_pod_count(node, pairing, -1);
    }

    if top.hugepages_gb > 0 {
        node.mem.free_hp_gb += top.hugepages_gb;
    }
}

fn nic_pairing_key<'a>(pairing: &'a crate::topology::NicCorePairing, sriov: bool) -> Option<&'a str> {
    if sriov {
        pairing.ifname.as_deref()
    } else {
        pairing.mac.as_deref()
    }
}

fn apply_nic_pairing(
    node: &mut Node,
    pairing: &crate::topology::NicCorePairing,
    direction: Direction,
    is_add: bool,
) {
    let sriov = node.sriov_enabled;
    let Some(key) = nic_pairing_key(pairing, sriov) else {
        return;
    };
    let Some(idx) = node.nic_index_for_key(key) else {
        log::error!("cannot find nic {} on node", key);
        return;
    };

    let (core, nic) = match direction {
        Direction::Rx => (&pairing.rx_core, &mut node.nic.nics[idx].rx_used_mbps),
        Direction::Tx => (&pairing.tx_core, &mut node.nic.nics[idx].tx_used_mbps),
        Direction::None => return,
    };

    if is_add {
        // Double-release must not drive usage negative (spec §7, error
        // kind 4): clamp at 0 and log.
        if *nic < core.nic_bw_mbps {
            log::error!(
                "double-release on nic {}: usage would go negative, clamping to 0",
                key
            );
            *nic = 0;
        } else {
            *nic -= core.nic_bw_mbps;
        }
    } else {
        *nic += core.nic_bw_mbps;
    }
}

fn bump_pod_count(node: &mut Node, pairing: &crate::topology::NicCorePairing, delta: i64) {
    let sriov = node.sriov_enabled;
    let Some(key) = nic_pairing_key(pairing, sriov) else {
        return;
    };
    let Some(idx) = node.nic_index_for_key(key) else {
        return;
    };

    let nic = &mut node.nic.nics[idx];
    if delta > 0 {
        nic.pods_used += delta as u32;
    } else {
        let dec = (-delta) as u32;
        if nic.pods_used < dec {
            log::error!("double-release on nic {} pod count, clamping to 0", key);
            nic.pods_used = 0;
        } else {
            nic.pods_used -= dec;
        }
    }
}
