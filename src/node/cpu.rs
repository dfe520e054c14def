// src/node/cpu.rs
//
// =============================================================================
// TOPOLOGY-SCHED: CPU INVENTORY
// =============================================================================
//
// Ported from `NodeCore` / `Node.InitCores` / `Node.GetFreeCpuCoreCount` /
// `Node.GetFreeCpuCores` / `Node.GetFreeCpuBatch` in the original Python
// source. NUMA is assumed 1:1 with socket (spec §4.2's explicit
// simplifying assumption) but kept as a distinct field so a future
// topology where that's untrue is a non-breaking addition.

use crate::error::DiscoveryError;
use crate::node::labels::{LABEL_ISOLCPUS, LABEL_NUM_CORES, LABEL_NUM_SOCKETS, LABEL_SMT};
use crate::topology::SmtSetting;
use std::collections::HashMap;

/// A single logical CPU core.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Core {
    pub id: u32,
    pub socket: u32,
    pub numa: u32,
    pub sibling: Option<u32>,
    pub used: bool,
    /// Permanently used: excluded from scheduling by the `isolcpus` label
    /// (i.e. left to the OS scheduler).
    pub reserved: bool,
}

/// The node's full CPU inventory.
#[derive(Debug, Clone)]
pub struct CpuInventory {
    pub cores: Vec<Core>,
    pub sockets: u32,
    pub cores_per_socket: u32,
    pub smt_enabled: bool,
    pub numa_nodes: u32,
    pub reserved_cores: Vec<u32>,
}

impl CpuInventory {
    /// Builds the inventory from a node's label map (spec §4.2).
    pub fn from_labels(labels: &HashMap<String, String>) -> Result<Self, DiscoveryError> {
        let sockets: u32 = labels
            .get(LABEL_NUM_SOCKETS)
            .ok_or(DiscoveryError::MissingLabel(LABEL_NUM_SOCKETS))?
            .parse()
            .map_err(|_| DiscoveryError::InvalidLabel {
                label: LABEL_NUM_SOCKETS.to_string(),
                reason: "not an integer".to_string(),
            })?;

        let total_physical_cores: u32 = labels
            .get(LABEL_NUM_CORES)
            .ok_or(DiscoveryError::MissingLabel(LABEL_NUM_CORES))?
            .parse()
            .map_err(|_| DiscoveryError::InvalidLabel {
                label: LABEL_NUM_CORES.to_string(),
                reason: "not an integer".to_string(),
            })?;

        if sockets == 0 || total_physical_cores % sockets != 0 {
            return Err(DiscoveryError::InvalidSocketCoreRatio {
                sockets,
                cores: total_physical_cores,
            });
        }

        let smt_enabled = labels.contains_key(LABEL_SMT);
        let cores_per_socket = total_physical_cores / sockets;
        let numa_nodes = sockets;

        let logical_count = if smt_enabled {
            total_physical_cores * 2
        } else {
            total_physical_cores
        };

        let mut cores = Vec::with_capacity(logical_count as usize);
        for c in 0..logical_count {
            let socket = (c % total_physical_cores) / cores_per_socket;
            let sibling = if smt_enabled {
                Some(if c < total_physical_cores {
                    c + total_physical_cores
                } else {
                    c - total_physical_cores
                })
            } else {
                None
            };

            cores.push(Core {
                id: c,
                socket,
                numa: socket,
                sibling,
                used: false,
                reserved: false,
            });
        }

        let mut reserved_cores = Vec::new();
        if let Some(isolcpus) = labels.get(LABEL_ISOLCPUS) {
            let mut isolated = std::collections::BTreeSet::new();
            for token in isolcpus.split('_') {
                for v in crate::rangelist::parse(token).map_err(|e| DiscoveryError::InvalidLabel {
                    label: LABEL_ISOLCPUS.to_string(),
                    reason: e.to_string(),
                })? {
                    isolated.insert(v);
                }
            }

            // Cores NOT in the isolated set belong to the OS and are
            // permanently reserved/used.
            for core in cores.iter_mut() {
                if !isolated.contains(&core.id) {
                    core.used = true;
                    core.reserved = true;
                    reserved_cores.push(core.id);
                }
            }
        }

        Ok(Self {
            cores,
            sockets,
            cores_per_socket,
            smt_enabled,
            numa_nodes,
            reserved_cores,
        })
    }

    fn sibling_used(&self, core: &Core) -> bool {
        core.sibling.map(|s| self.cores[s as usize].used).unwrap_or(false)
    }

    /// Number of free CPU cores. With SMT, only counts cores whose sibling
    /// is also free (spec §4.5).
    pub fn free_cpu_core_count(&self) -> usize {
        self.cores
            .iter()
            .filter(|c| !c.used && (!self.smt_enabled || !self.sibling_used(c)))
            .count()
    }

    /// Free CPU count bucketed by NUMA domain, same SMT rule.
    pub fn free_cpu_per_numa(&self) -> Vec<usize> {
        let mut free = vec![0usize; self.numa_nodes as usize];
        for core in &self.cores {
            if !core.used && (!self.smt_enabled || !self.sibling_used(core)) {
                free[core.socket as usize] += 1;
            }
        }
        free
    }

    /// Hands out up to `n` free core IDs on `numa`, in ascending index
    /// order (spec §4.6). Does not mark anything used — the caller
    /// (placement engine) commits the reservation so it can be rolled
    /// back. Returning fewer than `n` entries signals insufficiency.
    pub fn get_free_cpu_batch(&self, numa: u32, n: usize, smt: SmtSetting) -> Vec<u32> {
        let mut out = Vec::with_capacity(n);
        let mut remaining = n;

        for core in &self.cores {
            if remaining == 0 {
                break;
            }
            if core.socket != numa || core.used {
                continue;
            }

            if self.smt_enabled {
                let sibling = core.sibling.expect("smt-enabled core always has a sibling");
                if self.cores[sibling as usize].used {
                    continue;
                }

                if matches!(smt, SmtSetting::Require) && remaining >= 2 {
                    out.push(core.id);
                    out.push(sibling);
                    remaining -= 2;
                } else {
                    out.push(core.id);
                    remaining -= 1;
                }
            } else {
                out.push(core.id);
                remaining -= 1;
            }
        }

        out
    }

    pub fn mark_used(&mut self, id: u32) {
        self.cores[id as usize].used = true;
    }

    pub fn mark_free(&mut self, id: u32) {
        self.cores[id as usize].used = false;
    }

    pub fn is_used(&self, id: u32) -> bool {
        self.cores[id as usize].used
    }

    /// Restores every non-reserved core to free (`ResetResources`).
    pub fn reset(&mut self) {
        for core in self.cores.iter_mut() {
            if !core.reserved {
                core.used = false;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn scenario_two_sockets_eight_cores_smt_with_isolcpus() {
        // spec §8 scenario 1: 2 sockets x 8 cores, SMT on, isolcpus=2-7_10-15
        let labels = labels(&[
            (LABEL_NUM_SOCKETS, "2"),
            (LABEL_NUM_CORES, "16"),
            (LABEL_SMT, ""),
            (LABEL_ISOLCPUS, "2-7_10-15"),
        ]);

        let inv = CpuInventory::from_labels(&labels).unwrap();
        assert_eq!(inv.cores.len(), 32);

        // "Schedulable logical cores" counts raw used==false, independent
        // of the SMT pairing rule applied by free_cpu_core_count.
        let schedulable = inv.cores.iter().filter(|c| !c.used).count();
        assert_eq!(schedulable, 12);

        for &reserved in &[0u32, 1, 8, 9] {
            assert!(inv.cores[reserved as usize].reserved);
            assert!(inv.cores[reserved as usize].used);
        }
    }

    #[test]
    fn sibling_relation_is_symmetric() {
        let labels = labels(&[(LABEL_NUM_SOCKETS, "1"), (LABEL_NUM_CORES, "4"), (LABEL_SMT, "")]);
        let inv = CpuInventory::from_labels(&labels).unwrap();
        for core in &inv.cores {
            if let Some(sib) = core.sibling {
                assert_eq!(inv.cores[sib as usize].sibling, Some(core.id));
            }
        }
    }

    #[test]
    fn missing_labels_reject_node() {
        let labels = labels(&[]);
        assert!(matches!(
            CpuInventory::from_labels(&labels),
            Err(DiscoveryError::MissingLabel(_))
        ));
    }

    #[test]
    fn batch_requires_both_siblings_free_for_require_pairing() {
        let labels = labels(&[(LABEL_NUM_SOCKETS, "1"), (LABEL_NUM_CORES, "4"), (LABEL_SMT, "")]);
        let inv = CpuInventory::from_labels(&labels).unwrap();

        // 4 physical cores -> 8 logical, numa 0, all free.
        let batch = inv.get_free_cpu_batch(0, 4, SmtSetting::Require);
        assert_eq!(batch.len(), 4);
        // Must come out paired: (0,4),(1,5)
        assert_eq!(batch, vec![0, 4, 1, 5]);
    }

    #[test]
    fn batch_returns_short_when_insufficient() {
        let labels = labels(&[(LABEL_NUM_SOCKETS, "1"), (LABEL_NUM_CORES, "2"), (LABEL_SMT, "")]);
        let mut inv = CpuInventory::from_labels(&labels).unwrap();
        inv.mark_used(0);
        inv.mark_used(2); // sibling of 0

        let batch = inv.get_free_cpu_batch(0, 4, SmtSetting::Require);
        assert!(batch.len() < 4);
    }
}
