// src/node/nic.rs
//
// =============================================================================
// TOPOLOGY-SCHED: NIC INVENTORY
// =============================================================================
//
// Ported from `NodeNic` / `Node.InitNics` / `Node.GetFreeNumaNicResources`
// in the original source. Bandwidth is tracked as fixed-point Mbps
// integers rather than floating point Gbps, per the Design Notes on float
// bandwidth accounting, so reserve/release round-trips are exact; the
// public free-view API converts to Gbps at the boundary.

use crate::config::SchedulerConfig;
use crate::error::DiscoveryError;
use crate::node::labels::LABEL_NIC_PREFIX;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Nic {
    pub ifname: String,
    pub mac: String,
    pub vendor: String,
    pub speed_mbps: u32,
    pub numa: u32,
    pub num_vfs: u32,
    pub pods_used: u32,
    pub rx_used_mbps: u32,
    pub tx_used_mbps: u32,
    /// Dense 0-based index among peer NICs on this NUMA node, assigned in
    /// discovery order.
    pub numa_ordinal: u32,
}

#[derive(Debug, Clone, Default)]
pub struct NicInventory {
    pub nics: Vec<Nic>,
}

/// Canonicalises a raw hex MAC string into `AA:BB:CC:DD:EE:FF` form.
/// Idempotent: `canonicalize_mac(canonicalize_mac(x)) == canonicalize_mac(x)`.
pub fn canonicalize_mac(raw: &str) -> String {
    let hex: String = raw.chars().filter(|c| *c != ':').collect();
    let upper = hex.to_uppercase();
    let mut out = String::with_capacity(upper.len() + upper.len() / 2);
    for (i, ch) in upper.chars().enumerate() {
        if i > 0 && i % 2 == 0 {
            out.push(':');
        }
        out.push(ch);
    }
    out
}

impl NicInventory {
    /// Builds the inventory from a node's label map (spec §4.3). Keys look
    /// like `feature.node.kubernetes.io/nfd-extras-nic.<ifname>.<vendor>.<mac>.<speedMbs>.<numa>`.
    pub fn from_labels(
        labels: &HashMap<String, String>,
        cfg: &SchedulerConfig,
    ) -> Result<Self, DiscoveryError> {
        let mut inv = Self::default();

        // HashMap iteration order is unspecified; sort keys so discovery
        // (and therefore numa_ordinal assignment) is deterministic given
        // an identical label set, per spec §5's determinism contract.
        let mut keys: Vec<&String> = labels.keys().collect();
        keys.sort();

        for key in keys {
            if !key.contains(LABEL_NIC_PREFIX) {
                continue;
            }

            let parts: Vec<&str> = key.split('.').collect();
            if parts.len() < 9 {
                return Err(DiscoveryError::InvalidLabel {
                    label: key.clone(),
                    reason: "nic label missing ifname/vendor/mac/speed/numa segments".to_string(),
                });
            }

            let ifname = parts[4];
            let vendor = parts[5];
            let mac = parts[6];
            let speed_token = parts[7];
            let numa: u32 = parts[8].parse().map_err(|_| DiscoveryError::InvalidLabel {
                label: key.clone(),
                reason: "numa is not an integer".to_string(),
            })?;

            if cfg.should_skip_nic(ifname) {
                continue;
            }

            let speed_mbps = match speed_token.find("Mbs") {
                Some(idx) => speed_token[..idx].parse::<u32>().map_err(|_| {
                    DiscoveryError::InvalidLabel {
                        label: key.clone(),
                        reason: "speed is not an integer".to_string(),
                    }
                })?,
                // Interface is down; no usable speed reported.
                None => continue,
            };

            if speed_mbps < cfg.schedulable_nic_speed_mbps {
                continue;
            }

            let canon_mac = canonicalize_mac(mac);

            if cfg.enable_sriov {
                // SR-IOV mode is append-only and routes lookups by ifname,
                // per the Open Question resolution in SPEC_FULL.md §9.
                if let Some(existing) = inv.nics.iter_mut().find(|n| n.ifname == ifname) {
                    existing.numa = numa;
                    existing.mac = canon_mac;
                    continue;
                }
            }

            inv.nics.push(Nic {
                ifname: ifname.to_string(),
                mac: canon_mac,
                vendor: vendor.to_string(),
                speed_mbps,
                numa,
                num_vfs: 0,
                pods_used: 0,
                rx_used_mbps: 0,
                tx_used_mbps: 0,
                numa_ordinal: 0,
            });
        }

        inv.assign_numa_ordinals();
        Ok(inv)
    }

    fn assign_numa_ordinals(&mut self) {
        let mut next_ordinal: HashMap<u32, u32> = HashMap::new();
        for nic in self.nics.iter_mut() {
            let ordinal = next_ordinal.entry(nic.numa).or_insert(0);
            nic.numa_ordinal = *ordinal;
            *ordinal += 1;
        }
    }

    pub fn get_by_mac(&self, mac: &str) -> Option<&Nic> {
        self.nics.iter().find(|n| n.mac == mac)
    }

    pub fn get_by_mac_mut(&mut self, mac: &str) -> Option<&mut Nic> {
        self.nics.iter_mut().find(|n| n.mac == mac)
    }

    pub fn get_by_ifname(&self, ifname: &str) -> Option<&Nic> {
        self.nics.iter().find(|n| n.ifname == ifname)
    }

    pub fn get_by_ifname_mut(&mut self, ifname: &str) -> Option<&mut Nic> {
        self.nics.iter_mut().find(|n| n.ifname == ifname)
    }

    pub fn find_index(&self, numa: u32, numa_ordinal: u32) -> Option<usize> {
        self.nics
            .iter()
            .position(|n| n.numa == numa && n.numa_ordinal == numa_ordinal)
    }

    /// `[rx_free, tx_free]` Mbps for every NIC, bucketed by NUMA (spec §4.5).
    pub fn free_bandwidth_per_numa_mbps(
        &self,
        numa_nodes: u32,
        cfg: &SchedulerConfig,
    ) -> Vec<Vec<(u32, u32)>> {
        let mut out = vec![Vec::new(); numa_nodes as usize];
        for nic in &self.nics {
            let pair = self.free_pair_mbps(nic, cfg);
            out[nic.numa as usize].push(pair);
        }
        out
    }

    fn free_pair_mbps(&self, nic: &Nic, cfg: &SchedulerConfig) -> (u32, u32) {
        if cfg.enable_sriov && nic.pods_used == nic.num_vfs {
            return (0, 0);
        }

        let usable = cfg.usable_mbps(nic.speed_mbps);
        if cfg.enable_sharing {
            (
                usable.saturating_sub(nic.rx_used_mbps),
                usable.saturating_sub(nic.tx_used_mbps),
            )
        } else if nic.pods_used > 0 {
            (0, 0)
        } else {
            (usable, usable)
        }
    }

    pub fn reset(&mut self) {
        for nic in self.nics.iter_mut() {
            nic.pods_used = 0;
            nic.rx_used_mbps = 0;
            nic.tx_used_mbps = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn label(ifname: &str, vendor: &str, mac: &str, speed: &str, numa: u32) -> String {
        format!(
            "feature.node.kubernetes.io/nfd-extras-nic.{}.{}.{}.{}.{}",
            ifname, vendor, mac, speed, numa
        )
    }

    #[test]
    fn mac_canonicalization_is_idempotent() {
        let once = canonicalize_mac("AABBCCDDEEFF");
        let twice = canonicalize_mac(&once);
        assert_eq!(once, "AA:BB:CC:DD:EE:FF");
        assert_eq!(once, twice);
    }

    #[test]
    fn redundant_f1_port_is_dropped() {
        let mut labels = HashMap::new();
        labels.insert(
            label("eth0", "intel", "AABBCCDDEEFF", "25000Mbs", 0),
            "true".to_string(),
        );
        labels.insert(
            label("eth0f1", "intel", "AABBCCDDEEFF", "25000Mbs", 0),
            "true".to_string(),
        );

        let cfg = SchedulerConfig::default();
        let inv = NicInventory::from_labels(&labels, &cfg).unwrap();
        assert_eq!(inv.nics.len(), 1);
        assert_eq!(inv.nics[0].mac, "AA:BB:CC:DD:EE:FF");
        assert_eq!(inv.nics[0].ifname, "eth0");
    }

    #[test]
    fn skips_slow_and_down_nics() {
        let mut labels = HashMap::new();
        labels.insert(
            label("eth1", "intel", "000000000001", "5000Mbs", 0),
            "true".to_string(),
        );
        labels.insert(
            label("eth2", "intel", "000000000002", "down", 0),
            "true".to_string(),
        );
        labels.insert(
            label("eth3", "intel", "000000000003", "25000Mbs", 0),
            "true".to_string(),
        );

        let cfg = SchedulerConfig::default();
        let inv = NicInventory::from_labels(&labels, &cfg).unwrap();
        assert_eq!(inv.nics.len(), 1);
        assert_eq!(inv.nics[0].ifname, "eth3");
    }

    #[test]
    fn numa_ordinals_are_dense_per_numa() {
        let mut labels = HashMap::new();
        labels.insert(label("eth0", "intel", "000000000000", "25000Mbs", 0), "x".into());
        labels.insert(label("eth1", "intel", "000000000001", "25000Mbs", 0), "x".into());
        labels.insert(label("eth2", "intel", "000000000002", "25000Mbs", 1), "x".into());

        let cfg = SchedulerConfig::default();
        let inv = NicInventory::from_labels(&labels, &cfg).unwrap();
        let ord0: Vec<u32> = inv.nics.iter().filter(|n| n.numa == 0).map(|n| n.numa_ordinal).collect();
        assert_eq!(ord0, vec![0, 1]);
        let ord1: Vec<u32> = inv.nics.iter().filter(|n| n.numa == 1).map(|n| n.numa_ordinal).collect();
        assert_eq!(ord1, vec![0]);
    }

    #[test]
    fn exclusive_mode_blocks_scheduling_once_a_pod_is_present() {
        let cfg = SchedulerConfig::default();
        let mut nic = Nic {
            ifname: "eth0".into(),
            mac: "AA:BB:CC:DD:EE:FF".into(),
            vendor: "intel".into(),
            speed_mbps: 25_000,
            numa: 0,
            num_vfs: 0,
            pods_used: 0,
            rx_used_mbps: 0,
            tx_used_mbps: 0,
            numa_ordinal: 0,
        };
        let inv = NicInventory { nics: vec![nic.clone()] };
        assert_eq!(inv.free_pair_mbps(&nic, &cfg), (22_500, 22_500));

        nic.pods_used = 1;
        let inv = NicInventory { nics: vec![nic.clone()] };
        assert_eq!(inv.free_pair_mbps(&nic, &cfg), (0, 0));
    }
}
