// Integration coverage for building a `Node` straight from a realistic
// label map and reading back its free-resource views, the way `nhdctl
// discover` exercises the library.

use std::collections::HashMap;

use topology_sched::config::SchedulerConfig;
use topology_sched::node::labels::{
    LABEL_DATA_VLAN, LABEL_DEFAULT_GW, LABEL_ISOLCPUS, LABEL_NUM_CORES, LABEL_NUM_SOCKETS, LABEL_SMT,
};
use topology_sched::node::Node;

fn nic_label(ifname: &str, mac: &str, speed: &str, numa: u32) -> String {
    format!(
        "feature.node.kubernetes.io/nfd-extras-nic.{}.intel.{}.{}.{}",
        ifname, mac, speed, numa
    )
}

fn gpu_label(device_id: u32, kind: &str, numa: u32) -> String {
    format!(
        "feature.node.kubernetes.io/nfd-extras-gpu.{}.{}.{}",
        device_id, kind, numa
    )
}

#[test]
fn full_label_set_discovers_expected_free_views() {
    let mut labels = HashMap::new();
    labels.insert(LABEL_NUM_SOCKETS.to_string(), "2".to_string());
    labels.insert(LABEL_NUM_CORES.to_string(), "16".to_string());
    labels.insert(LABEL_SMT.to_string(), "".to_string());
    labels.insert(LABEL_ISOLCPUS.to_string(), "2-7_10-15".to_string());
    labels.insert(LABEL_DATA_VLAN.to_string(), "200".to_string());
    labels.insert(LABEL_DEFAULT_GW.to_string(), "10.2.0.1".to_string());
    labels.insert(nic_label("eth0", "AABBCCDDEEFF", "25000Mbs", 0), "x".into());
    labels.insert(nic_label("eth0f1", "AABBCCDDEEFF", "25000Mbs", 0), "x".into());
    labels.insert(nic_label("eth1", "112233445566", "5000Mbs", 1), "x".into());
    labels.insert(gpu_label(0, "V100", 0), "x".into());
    labels.insert(gpu_label(1, "GTX1080Ti", 1), "x".into());

    let cfg = SchedulerConfig::default();
    let mut node = Node::from_labels("worker-a", &labels, &cfg).unwrap();
    node.set_hugepages(32, 32);

    // isolcpus scenario 1: 12 raw-schedulable logical cores.
    assert_eq!(
        node.cpu.cores.iter().filter(|c| !c.used).count(),
        12
    );

    // Redundant f1 port dropped; slow NIC on numa 1 dropped entirely.
    assert_eq!(node.nic.nics.len(), 1);
    assert_eq!(node.nic.nics[0].mac, "AA:BB:CC:DD:EE:FF");

    assert_eq!(node.free_gpu_per_numa(), vec![1, 1]);
    assert_eq!(node.mem.free_hp_gb, 32);

    node.reset_resources();
    assert_eq!(node.mem.free_hp_gb, 32);
    assert_eq!(node.nic.nics[0].rx_used_mbps, 0);
}

#[test]
fn node_missing_required_label_is_rejected() {
    let mut labels = HashMap::new();
    labels.insert(LABEL_NUM_SOCKETS.to_string(), "1".to_string());
    // LABEL_NUM_CORES omitted.
    labels.insert(LABEL_DATA_VLAN.to_string(), "1".to_string());
    labels.insert(LABEL_DEFAULT_GW.to_string(), "10.0.0.1".to_string());

    let cfg = SchedulerConfig::default();
    assert!(Node::from_labels("broken", &labels, &cfg).is_err());
}
