// Integration coverage for the end-to-end placement/reservation lifecycle:
// place, fail to double-place the same footprint, then roll the first
// placement back through the reservation ledger and confirm capacity is
// restored exactly (spec §8 scenario 6).

use std::collections::HashMap;

use topology_sched::config::SchedulerConfig;
use topology_sched::error::PlacementError;
use topology_sched::ledger;
use topology_sched::node::labels::{LABEL_DATA_VLAN, LABEL_DEFAULT_GW, LABEL_NUM_CORES, LABEL_NUM_SOCKETS, LABEL_SMT};
use topology_sched::node::Node;
use topology_sched::place;
use topology_sched::topology::{ProcGroup, ReqCore, SmtSetting, Topology};

fn fresh_node() -> Node {
    let mut labels = HashMap::new();
    labels.insert(LABEL_NUM_SOCKETS.to_string(), "1".to_string());
    labels.insert(LABEL_NUM_CORES.to_string(), "4".to_string());
    labels.insert(LABEL_SMT.to_string(), "".to_string());
    labels.insert(LABEL_DATA_VLAN.to_string(), "7".to_string());
    labels.insert(LABEL_DEFAULT_GW.to_string(), "10.1.0.1".to_string());
    let cfg = SchedulerConfig::default();
    Node::from_labels("n0", &labels, &cfg).unwrap()
}

fn request_topology() -> Topology {
    // 1 socket x 4 physical cores -> 8 logical cores on numa 0. A group
    // asking for all 8 as 4 SMT pairs exactly exhausts the node.
    Topology {
        proc_groups: vec![ProcGroup {
            proc_cores: (0..8u32).map(ReqCore::new).collect(),
            misc_cores: vec![],
            group_gpus: vec![],
            proc_smt: SmtSetting::Require,
            helper_smt: SmtSetting::Either,
            vlan: None,
        }],
        misc_cores: vec![],
        misc_cores_smt: SmtSetting::Either,
        hugepages_gb: 0,
        ctrl_vlan: None,
        nic_core_pairing: vec![],
        data_gateway: None,
    }
}

#[test]
fn double_placement_fails_then_remove_restores_capacity_for_reschedule() {
    let mut node = fresh_node();
    let cfg = SchedulerConfig::default();
    let mapping = topology_sched::topology::MappingDecision {
        cpu: vec![0, 0],
        gpu: vec![0],
        nic: vec![(0, 0)],
    };

    let mut first = request_topology();
    let result = place(&mut node, &mapping, &mut first, &cfg);
    assert!(result.is_ok(), "{:?}", result);
    assert_eq!(node.free_cpu_core_count(), 0);

    // A second identical request against the now-exhausted node must fail
    // with a shortfall, and leave the (already exhausted) inventory as-is.
    let mut second = request_topology();
    let before = node.cpu.cores.iter().map(|c| c.used).collect::<Vec<_>>();
    let second_result = place(&mut node, &mapping, &mut second, &cfg);
    assert!(matches!(
        second_result,
        Err(PlacementError::InsufficientCpuBatch { .. })
    ));
    let after = node.cpu.cores.iter().map(|c| c.used).collect::<Vec<_>>();
    assert_eq!(before, after, "failed second placement must not mutate inventory");

    // Simulate the first placement's pod being deleted: releasing its
    // footprint through the ledger's inverse operation must restore full
    // capacity so a third placement attempt can succeed.
    ledger::add_resources(&mut node, &first);

    assert_eq!(node.free_cpu_core_count(), 8);

    let mut third = request_topology();
    let third_result = place(&mut node, &mapping, &mut third, &cfg);
    assert!(third_result.is_ok(), "{:?}", third_result);
}
