use marketdna::config::{AppConfig, ConfigManager, MarketSource};
use marketdna::MarketDnaError;
use std::path::PathBuf;

fn write_config(name: &str, contents: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("marketdna-{}-{}.toml", name, std::process::id()));
    std::fs::write(&path, contents).unwrap();
    path
}

#[test]
fn file_values_override_defaults() {
    let path = write_config(
        "file",
        r#"
[evolution]
seed = 7
replacement_rate = 0.4

[population]
max_size = 80
mutation_rate = 0.02

[storage]
database_path = "evolution.db"

[[populations]]
name = "btc-hourly"
symbol = "BTCUSDT"
timeframe = "1h"
"#,
    );

    let manager = ConfigManager::new();
    manager.load_from_file(&path).unwrap();
    let config = manager.get().unwrap();
    std::fs::remove_file(&path).ok();

    assert_eq!(config.evolution.seed, Some(7));
    assert_eq!(config.evolution.replacement_rate, 0.4);
    assert_eq!(config.population.max_size, 80);
    assert_eq!(config.population.mutation_rate, 0.02);
    assert_eq!(config.population.selection_pressure, 5);
    assert_eq!(config.storage.database_path, PathBuf::from("evolution.db"));
    assert_eq!(config.storage.market_source, MarketSource::Sqlite);
    assert_eq!(config.populations.len(), 1);
    assert_eq!(config.populations[0].config, None);
}

#[test]
fn environment_overrides_the_file() {
    let path = write_config("env", "[backtesting]\nworkers = 1\n");
    std::env::set_var("MARKETDNA__BACKTESTING__WORKERS", "3");

    let manager = ConfigManager::new();
    let loaded = manager.load_from_file(&path);
    std::env::remove_var("MARKETDNA__BACKTESTING__WORKERS");
    std::fs::remove_file(&path).ok();

    loaded.unwrap();
    assert_eq!(manager.get().unwrap().backtesting.workers, 3);
}

#[test]
fn every_invalid_field_is_reported() {
    let path = write_config(
        "invalid",
        "[population]\nmax_size = 10\nmutation_rate = 0.5\n\n[trade_management]\nposition_fraction = 2.0\n",
    );

    let manager = ConfigManager::new();
    let err = manager.load_from_file(&path).unwrap_err();
    std::fs::remove_file(&path).ok();

    match err {
        MarketDnaError::Validation(violations) => {
            assert_eq!(violations.len(), 3, "{:?}", violations);
            assert!(violations.iter().any(|v| v.starts_with("population.max_size")));
            assert!(violations.iter().any(|v| v.starts_with("population.mutation_rate")));
            assert!(violations.iter().any(|v| v.starts_with("trade_management.position_fraction")));
        }
        other => panic!("expected a validation error, got {:?}", other),
    }
    // A rejected file leaves the previous configuration in place.
    assert_eq!(manager.get().unwrap(), AppConfig::default());
}

#[test]
fn updates_are_validated() {
    let manager = ConfigManager::new();
    assert!(manager.update(|c| c.population.max_size = 1_000).is_err());
    assert_eq!(manager.get().unwrap().population.max_size, 100);

    manager.update(|c| c.population.max_size = 200).unwrap();
    assert_eq!(manager.get().unwrap().population.max_size, 200);
}

#[test]
fn saved_configuration_loads_back() {
    let manager = ConfigManager::new();
    manager.update(|c| c.evolution.seed = Some(99)).unwrap();
    let path = std::env::temp_dir().join(format!("marketdna-saved-{}.toml", std::process::id()));
    manager.save_to_file(&path).unwrap();

    let reloaded = ConfigManager::new();
    reloaded.load_from_file(&path).unwrap();
    std::fs::remove_file(&path).ok();
    assert_eq!(reloaded.get().unwrap().evolution.seed, Some(99));
}
