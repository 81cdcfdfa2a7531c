//! tablets-coordinator: build a tablet directory from configuration.
//!
//! Loads config, seeds the directory and server list, applies the
//! configured splits, then prints the resulting snapshot as JSON.

use tablets_config::CoordinatorConfig;
use tablets_directory::{Snapshot, StaticServerRegistry, TabletDirectory};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tablets_metrics::init_tracing();

    // First CLI arg is the YAML config path
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.yaml".to_string());

    let config = tablets_config::load_from_file(std::path::Path::new(&config_path))
        .inspect_err(|e| tracing::error!("failed to load config from {}: {}", config_path, e))?;
    tracing::info!(
        "loaded {} server(s), {} tablet(s), {} split(s) from {}",
        config.servers.len(),
        config.tablets.len(),
        config.splits.len(),
        config_path
    );

    let snapshot = build_snapshot(&config)?;
    tracing::info!("directory holds {} tablet(s)", snapshot.len());

    let json = if config.output.pretty {
        snapshot.to_json_pretty()?
    } else {
        snapshot.to_json()?
    };
    println!("{}", json);

    if config.output.metrics {
        eprint!("{}", tablets_metrics::encode_metrics());
    }

    Ok(())
}

/// Seed a directory from `config`, apply its splits, and serialize it.
fn build_snapshot(config: &CoordinatorConfig) -> Result<Snapshot, Box<dyn std::error::Error>> {
    let registry: StaticServerRegistry = config
        .servers
        .iter()
        .map(|s| (s.id, s.locator.clone()))
        .collect();

    let directory = TabletDirectory::with_capacity(config.directory.initial_capacity);
    for entry in &config.tablets {
        directory.add(entry.to_tablet());
    }

    for split in &config.splits {
        directory
            .split(
                split.table_id,
                split.start_key_hash,
                split.end_key_hash,
                split.split_key_hash,
            )
            .inspect_err(|e| tracing::error!("split failed: {}", e))?;
    }
    tracing::debug!("{}", directory.debug_string());

    Ok(directory.serialize(&registry)?)
}
