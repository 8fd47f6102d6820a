use agentmesh::config_loader;
use agentmesh::scenario::run_scenario;
use agentmesh::{JsonLinesSink, LogSink, MetricsSampler, TopologyConfig, TopologyManager};
use clap::Parser;
use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use env_logger::Env;
use log::info;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

/// Replay agent membership changes through the adaptive topology manager
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the topology configuration YAML file (defaults apply when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Path to the scenario YAML file
    #[arg(short, long)]
    scenario: PathBuf,

    /// Output path for the JSON report
    #[arg(short, long, default_value = "topology_report.json")]
    output: PathBuf,

    /// Also write the final topology as a GraphViz DOT file
    #[arg(long)]
    dot: Option<PathBuf>,

    /// Also write every change event as JSON lines
    #[arg(long)]
    events: Option<PathBuf>,

    /// Override the random seed from the configuration
    #[arg(long)]
    seed: Option<u64>,
}

fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Args::parse();

    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    info!("Starting agentmesh topology manager");
    info!("Scenario file: {:?}", args.scenario);
    info!("Report output: {:?}", args.output);

    let mut config = match &args.config {
        Some(path) => config_loader::load_config(path)?,
        None => {
            info!("No configuration file given, using defaults");
            TopologyConfig::default()
        }
    };
    if let Some(seed) = args.seed {
        config.seed = Some(seed);
    }
    let scenario = config_loader::load_scenario(&args.scenario)?;

    let sampling_interval = config.sampling_interval;
    let manager = TopologyManager::new(config)
        .wrap_err("Invalid topology configuration")?
        .with_sink(Arc::new(LogSink));

    if let Some(path) = &args.events {
        let sink = JsonLinesSink::create(path)
            .wrap_err_with(|| format!("Failed to create event log '{}'", path.display()))?;
        manager.add_sink(Arc::new(sink));
    }

    let manager = Arc::new(manager);
    let sampler = MetricsSampler::spawn(&manager, sampling_interval);
    let report = run_scenario(&manager, &scenario);
    sampler.stop();
    manager.flush_notifications();

    let json = serde_json::to_string_pretty(&report).wrap_err("Failed to serialize report")?;
    fs::write(&args.output, json)
        .wrap_err_with(|| format!("Failed to write report '{}'", args.output.display()))?;
    info!("Report written to {:?}", args.output);

    if let Some(path) = &args.dot {
        fs::write(path, manager.to_dot())
            .wrap_err_with(|| format!("Failed to write DOT file '{}'", path.display()))?;
        info!("Topology graph written to {:?}", path);
    }

    info!(
        "Final topology: {} with {} agents and {} connections (efficiency {:.3})",
        report.topology.topology_type,
        report.topology.node_count,
        report.topology.connection_count,
        report.metrics.efficiency
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let args = Args::parse_from(["agentmesh", "--scenario", "scenario.yaml"]);

        assert!(args.config.is_none());
        assert_eq!(args.scenario, PathBuf::from("scenario.yaml"));
        assert_eq!(args.output, PathBuf::from("topology_report.json"));
        assert!(args.dot.is_none());
    }

    #[test]
    fn test_optional_outputs() {
        let args = Args::parse_from([
            "agentmesh",
            "-c", "topology.yaml",
            "-s", "scenario.yaml",
            "--dot", "graph.dot",
            "--events", "events.jsonl",
            "--seed", "7",
        ]);

        assert_eq!(args.config, Some(PathBuf::from("topology.yaml")));
        assert_eq!(args.dot, Some(PathBuf::from("graph.dot")));
        assert_eq!(args.events, Some(PathBuf::from("events.jsonl")));
        assert_eq!(args.seed, Some(7));
    }

    #[test]
    fn test_scenario_is_required() {
        assert!(Args::try_parse_from(["agentmesh"]).is_err());
    }
}
