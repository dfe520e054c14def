// src/main.rs
//
// =============================================================================
// TOPOLOGY-SCHED: NHDCTL — LOCAL INSPECTION HARNESS
// =============================================================================
//
// A thin CLI around the library: load a label map, run discovery, run a
// scripted placement, or drive the reservation ledger directly. This is
// deliberately not a scheduler — cluster-level node filtering, the
// control loop, and pod lifecycle plumbing are all external collaborators
// (spec §1) this binary does not attempt to reproduce.
//
// Wiring style (clap derive, env_logger init before dispatch, anyhow at
// the boundary) mirrors the teacher's own `main.rs`.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use topology_sched::config::SchedulerConfig;
use topology_sched::node::Node;
use topology_sched::topology::{MappingDecision, Topology};
use topology_sched::{ledger, placement};

#[derive(Parser)]
#[command(name = "nhdctl", version, about = "Topology-aware node resource inventory inspector")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse a label map and print the resulting free-resource views.
    Discover {
        /// Path to a JSON file containing the node's label map.
        #[arg(long)]
        labels: PathBuf,

        /// Path to a TOML scheduler config file. Defaults are used for
        /// any field the file omits, or entirely if absent.
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Run discovery then placement, and print the filled topology.
    Place {
        #[arg(long)]
        labels: PathBuf,

        #[arg(long)]
        topology: PathBuf,

        #[arg(long)]
        mapping: PathBuf,

        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Apply or revert a previously-bound topology against the ledger,
    /// for reconciliation-style testing (spec §4.9, §8 scenario 6).
    Reconcile {
        #[arg(long)]
        labels: PathBuf,

        #[arg(long)]
        topology: PathBuf,

        #[arg(long)]
        config: Option<PathBuf>,

        #[arg(long, value_enum)]
        direction: ReconcileDirection,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum ReconcileDirection {
    Add,
    Remove,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Discover { labels, config } => run_discover(labels, config),
        Commands::Place {
            labels,
            topology,
            mapping,
            config,
        } => run_place(labels, topology, mapping, config),
        Commands::Reconcile {
            labels,
            topology,
            config,
            direction,
        } => run_reconcile(labels, topology, config, direction),
    }
}

fn load_config(path: Option<PathBuf>) -> Result<SchedulerConfig> {
    match path {
        Some(p) => SchedulerConfig::load_from_file(&p)
            .with_context(|| format!("failed to load scheduler config from {}", p.display())),
        None => Ok(SchedulerConfig::default()),
    }
}

fn load_labels(path: &PathBuf) -> Result<HashMap<String, String>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read label file {}", path.display()))?;
    let labels: HashMap<String, String> = serde_json::from_str(&text)
        .context("label file must be a JSON object of string to string")?;
    Ok(labels)
}

fn load_node(labels_path: &PathBuf, cfg: &SchedulerConfig) -> Result<Node> {
    let labels = load_labels(labels_path)?;
    Node::from_labels("local", &labels, cfg).map_err(|e| anyhow::anyhow!("discovery failed: {e}"))
}

fn run_discover(labels_path: PathBuf, config_path: Option<PathBuf>) -> Result<()> {
    let cfg = load_config(config_path)?;
    let node = load_node(&labels_path, &cfg)?;

    println!("node: {}", node.name);
    println!("free cpu cores: {}", node.free_cpu_core_count());
    println!("free cpu per numa: {:?}", node.free_cpu_per_numa());
    println!("free gpu per numa: {:?}", node.free_gpu_per_numa());
    println!(
        "free nic bandwidth per numa (gbps): {:?}",
        node.free_nic_bandwidth_per_numa_gbps(&cfg)
    );
    println!("hugepages: {}/{} free", node.mem.free_hp_gb, node.mem.total_hp_gb);

    Ok(())
}

fn run_place(
    labels_path: PathBuf,
    topology_path: PathBuf,
    mapping_path: PathBuf,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let cfg = load_config(config_path)?;
    let mut node = load_node(&labels_path, &cfg)?;

    let mut topology: Topology = serde_json::from_str(
        &fs::read_to_string(&topology_path)
            .with_context(|| format!("failed to read topology file {}", topology_path.display()))?,
    )
    .context("topology file must match the Topology schema")?;

    let mapping: MappingDecision = serde_json::from_str(
        &fs::read_to_string(&mapping_path)
            .with_context(|| format!("failed to read mapping file {}", mapping_path.display()))?,
    )
    .context("mapping file must match the MappingDecision schema")?;

    match placement::place(&mut node, &mapping, &mut topology, &cfg) {
        Ok(used_nics) => {
            println!("placement succeeded");
            println!("{}", serde_json::to_string_pretty(&topology)?);
            println!("used nics: {:?}", used_nics);
        }
        Err(e) => {
            println!("placement failed (inventory rolled back): {e}");
        }
    }

    Ok(())
}

fn run_reconcile(
    labels_path: PathBuf,
    topology_path: PathBuf,
    config_path: Option<PathBuf>,
    direction: ReconcileDirection,
) -> Result<()> {
    let cfg = load_config(config_path)?;
    let mut node = load_node(&labels_path, &cfg)?;

    let topology: Topology = serde_json::from_str(
        &fs::read_to_string(&topology_path)
            .with_context(|| format!("failed to read topology file {}", topology_path.display()))?,
    )
    .context("topology file must match the Topology schema")?;

    match direction {
        ReconcileDirection::Remove => ledger::remove_resources(&mut node, &topology),
        ReconcileDirection::Add => ledger::add_resources(&mut node, &topology),
    }

    println!("free cpu cores after reconcile: {}", node.free_cpu_core_count());
    Ok(())
}
