// src/node/gpu.rs
//
// =============================================================================
// TOPOLOGY-SCHED: GPU INVENTORY
// =============================================================================
//
// Ported from `NodeGpu` / `Node.InitGpus` / `Node.GetFreeGpuCount` /
// `Node.GetFreeNumaGPUs` / `Node.GetNextGpuFree` in the original source.

use crate::error::DiscoveryError;
use crate::node::labels::LABEL_GPU_PREFIX;
use std::collections::HashMap;

/// Supported GPU models. Substring match order matters: `Gtx1080Ti` must
/// be checked before `Gtx1080`, likewise `Gtx2080Ti` before `Gtx2080`
/// (spec §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GpuType {
    Gtx1080,
    Gtx1080Ti,
    Gtx2080,
    Gtx2080Ti,
    V100,
    Unsupported,
}

impl GpuType {
    pub fn from_label_value(s: &str) -> Self {
        if s.contains("1080Ti") {
            GpuType::Gtx1080Ti
        } else if s.contains("1080") {
            GpuType::Gtx1080
        } else if s.contains("2080Ti") {
            GpuType::Gtx2080Ti
        } else if s.contains("2080") {
            GpuType::Gtx2080
        } else if s.contains("V100") {
            GpuType::V100
        } else {
            GpuType::Unsupported
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Gpu {
    pub device_id: u32,
    pub gpu_type: GpuType,
    pub numa: u32,
    pub used: bool,
}

#[derive(Debug, Clone, Default)]
pub struct GpuInventory {
    pub gpus: Vec<Gpu>,
}

impl GpuInventory {
    /// Builds the inventory from a node's label map (spec §4.4). Keys look
    /// like `feature.node.kubernetes.io/nfd-extras-gpu.<device_id>.<type>.<numa>`.
    pub fn from_labels(labels: &HashMap<String, String>) -> Result<Self, DiscoveryError> {
        let mut gpus = Vec::new();

        // HashMap iteration order is unspecified; sort keys so insertion
        // order (and therefore `next_free`'s scan order) is deterministic
        // given an identical label set, per spec §5's determinism contract
        // (same fix as `NicInventory::from_labels`).
        let mut keys: Vec<&String> = labels.keys().collect();
        keys.sort();

        for key in keys {
            if !key.contains(LABEL_GPU_PREFIX) {
                continue;
            }

            let parts: Vec<&str> = key.split('.').collect();
            if parts.len() < 7 {
                return Err(DiscoveryError::InvalidLabel {
                    label: key.clone(),
                    reason: "gpu label missing device_id/type/numa segments".to_string(),
                });
            }

            let device_id: u32 = parts[4]
                .parse()
                .map_err(|_| DiscoveryError::InvalidLabel {
                    label: key.clone(),
                    reason: "device_id is not an integer".to_string(),
                })?;
            let type_str = parts[5];
            let numa: u32 = parts[6]
                .parse()
                .map_err(|_| DiscoveryError::InvalidLabel {
                    label: key.clone(),
                    reason: "numa is not an integer".to_string(),
                })?;

            gpus.push(Gpu {
                device_id,
                gpu_type: GpuType::from_label_value(type_str),
                numa,
                used: false,
            });
        }

        Ok(Self { gpus })
    }

    pub fn free_gpu_count(&self) -> usize {
        self.gpus.iter().filter(|g| !g.used).count()
    }

    pub fn free_gpu_per_numa(&self, numa_nodes: u32) -> Vec<usize> {
        let mut free = vec![0usize; numa_nodes as usize];
        for gpu in &self.gpus {
            if !gpu.used {
                free[gpu.numa as usize] += 1;
            }
        }
        free
    }

    /// The next free GPU on `numa`, in insertion (scan) order.
    pub fn next_free(&self, numa: u32) -> Option<&Gpu> {
        self.gpus.iter().find(|g| g.numa == numa && !g.used)
    }

    pub fn get(&self, device_id: u32) -> Option<&Gpu> {
        self.gpus.iter().find(|g| g.device_id == device_id)
    }

    pub fn mark_used(&mut self, device_id: u32) {
        if let Some(g) = self.gpus.iter_mut().find(|g| g.device_id == device_id) {
            g.used = true;
        }
    }

    pub fn mark_free(&mut self, device_id: u32) {
        if let Some(g) = self.gpus.iter_mut().find(|g| g.device_id == device_id) {
            g.used = false;
        }
    }

    pub fn reset(&mut self) {
        for gpu in self.gpus.iter_mut() {
            gpu.used = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_match_order_prefers_ti_variants() {
        assert_eq!(GpuType::from_label_value("GTX1080Ti"), GpuType::Gtx1080Ti);
        assert_eq!(GpuType::from_label_value("GTX1080"), GpuType::Gtx1080);
        assert_eq!(GpuType::from_label_value("GTX2080Ti"), GpuType::Gtx2080Ti);
        assert_eq!(GpuType::from_label_value("GTX2080"), GpuType::Gtx2080);
        assert_eq!(GpuType::from_label_value("TeslaV100"), GpuType::V100);
        assert_eq!(GpuType::from_label_value("FooBar"), GpuType::Unsupported);
    }

    #[test]
    fn parses_gpu_labels() {
        let mut labels = HashMap::new();
        labels.insert(
            "feature.node.kubernetes.io/nfd-extras-gpu.0.V100.1".to_string(),
            "true".to_string(),
        );
        labels.insert(
            "feature.node.kubernetes.io/nfd-extras-gpu.1.GTX1080Ti.0".to_string(),
            "true".to_string(),
        );

        let inv = GpuInventory::from_labels(&labels).unwrap();
        assert_eq!(inv.gpus.len(), 2);
        assert!(inv.get(0).is_some());
        assert_eq!(inv.get(0).unwrap().numa, 1);
        assert_eq!(inv.get(1).unwrap().gpu_type, GpuType::Gtx1080Ti);
    }

    #[test]
    fn next_free_scans_in_insertion_order() {
        let mut inv = GpuInventory {
            gpus: vec![
                Gpu { device_id: 3, gpu_type: GpuType::V100, numa: 0, used: false },
                Gpu { device_id: 1, gpu_type: GpuType::V100, numa: 0, used: false },
            ],
        };
        assert_eq!(inv.next_free(0).unwrap().device_id, 3);
        inv.mark_used(3);
        assert_eq!(inv.next_free(0).unwrap().device_id, 1);
    }
}
