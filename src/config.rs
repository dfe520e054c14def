// src/config.rs
//
// =============================================================================
// TOPOLOGY-SCHED: SCHEDULER CONFIGURATION
// =============================================================================
//
// Replaces the module-level globals in the original Python source
// (NIC_BW_AVAIL_PERCENT, SCHEDULABLE_NIC_SPEED_THRESH_MBPS, ENABLE_SRIOV,
// ENABLE_SHARING) with an explicit value threaded through discovery and
// placement. A placement call observes one snapshot of this config for its
// whole duration.

use serde::{Deserialize, Serialize};

/// Tunables governing NIC usability and sharing semantics.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Fraction of a NIC's link speed made available to workloads.
    pub nic_bw_usable_fraction: f64,

    /// NICs slower than this (in Mbps) are excluded from discovery.
    pub schedulable_nic_speed_mbps: u32,

    /// Treat NICs as partitionable into SR-IOV virtual functions.
    pub enable_sriov: bool,

    /// Allow multiple pods to share a single NIC's bandwidth.
    pub enable_sharing: bool,

    /// Substring match against an interface name that excludes it from
    /// discovery (site convention for redundant-port naming, e.g. "f1").
    /// Kept configurable rather than hardcoded per the source's Open
    /// Question on this rule.
    pub nic_skip_predicate: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            nic_bw_usable_fraction: 0.9,
            schedulable_nic_speed_mbps: 11_000,
            enable_sriov: false,
            enable_sharing: false,
            nic_skip_predicate: "f1".to_string(),
        }
    }
}

impl SchedulerConfig {
    /// Loads a config snapshot from a TOML file, falling back to defaults
    /// for any field the file omits.
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let cfg: Self = toml::from_str(&text)?;
        Ok(cfg)
    }

    /// Whether an interface name should be excluded from discovery.
    pub fn should_skip_nic(&self, ifname: &str) -> bool {
        !self.nic_skip_predicate.is_empty() && ifname.contains(self.nic_skip_predicate.as_str())
    }

    /// A NIC's usable bandwidth in Mbps given its link speed in Mbps.
    pub fn usable_mbps(&self, speed_mbps: u32) -> u32 {
        (speed_mbps as f64 * self.nic_bw_usable_fraction) as u32
    }
}
