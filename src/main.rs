use anyhow::Context;
use marketdna::config::ConfigManager;
use marketdna::population::RunOptions;
use marketdna::App;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_CONFIG: &str = "marketdna.toml";

/// `marketdna [config.toml] [generations]`
fn main() -> anyhow::Result<()> {
    env_logger::init();

    let mut args = std::env::args().skip(1);
    let config_path = PathBuf::from(args.next().unwrap_or_else(|| DEFAULT_CONFIG.to_string()));
    let generations: u32 = match args.next() {
        Some(raw) => raw.parse().with_context(|| format!("invalid generation count '{}'", raw))?,
        None => 1,
    };

    let manager = ConfigManager::new();
    if config_path.exists() {
        manager
            .load_from_file(&config_path)
            .with_context(|| format!("loading {}", config_path.display()))?;
    } else {
        log::warn!("{} not found, using default configuration", config_path.display());
    }
    let config = manager.get()?;

    let app = App::from_config(config)?;
    let populations = app.ensure_populations()?;
    if populations.is_empty() {
        log::warn!("No active populations to evolve");
        return Ok(());
    }

    for population in &populations {
        app.service.start(
            population.id,
            RunOptions {
                max_generations: Some(generations),
                interval: Some(Duration::ZERO),
                progress: None,
            },
        )?;
    }

    for population in &populations {
        let report = app.service.wait(population.id)?;
        match &report.error {
            Some(error) => log::error!(
                "{}: stopped after {} generation(s): {}",
                population.name,
                report.generations_completed,
                error
            ),
            None => {
                let status = app.manager.get_status(population.id)?;
                log::info!(
                    "{}: generation {} best={:.4} diversity={:.3}",
                    population.name,
                    status.current_generation,
                    status.latest_best_fitness.unwrap_or(0.0),
                    status.diversity_score
                );
            }
        }
    }
    Ok(())
}
