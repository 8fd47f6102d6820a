use crate::config::TopologyConfig;
use crate::scenario::Scenario;
use color_eyre::eyre::WrapErr;
use color_eyre::Result;
use log::info;
use std::fs::File;
use std::path::Path;

/// Load, parse and validate a topology configuration from a YAML file
pub fn load_config(config_path: &Path) -> Result<TopologyConfig> {
    info!("Loading configuration from: {:?}", config_path);

    let file = File::open(config_path)
        .wrap_err_with(|| format!("Failed to open configuration {:?}", config_path))?;

    let config: TopologyConfig = serde_yaml::from_reader(file)
        .wrap_err_with(|| format!("Failed to parse configuration {:?}", config_path))?;

    config.validate()?;

    info!(
        "Configuration loaded: {} topology, max {} agents",
        config.topology_type, config.max_nodes
    );
    Ok(config)
}

/// Load a scenario script from a YAML file
pub fn load_scenario(scenario_path: &Path) -> Result<Scenario> {
    info!("Loading scenario from: {:?}", scenario_path);

    let file = File::open(scenario_path)
        .wrap_err_with(|| format!("Failed to open scenario {:?}", scenario_path))?;

    let scenario: Scenario = serde_yaml::from_reader(file)
        .wrap_err_with(|| format!("Failed to parse scenario {:?}", scenario_path))?;

    info!("Scenario has {} steps", scenario.steps.len());
    Ok(scenario)
}
