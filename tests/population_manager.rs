mod common;

use common::{app_with_market, population_config, SYMBOL, TIMEFRAME};
use marketdna::config::PopulationConfig;
use marketdna::types::{ChromosomeStatus, PopulationStatus};
use marketdna::MarketDnaError;
use std::collections::HashSet;

#[test]
fn create_population_seeds_exactly_max_size() {
    let (app, _) = app_with_market(300);
    let population = app
        .manager
        .create_population("alpha", SYMBOL, TIMEFRAME, &population_config(60))
        .unwrap();

    assert_eq!(population.status, PopulationStatus::Active);
    assert_eq!(population.current_generation, 0);
    assert_eq!(population.config.max_size, 60);

    let status = app.manager.get_status(population.id).unwrap();
    assert_eq!(status.count(ChromosomeStatus::Testing), 60);
    assert_eq!(status.count(ChromosomeStatus::Active), 0);
    assert_eq!(status.count(ChromosomeStatus::Archived), 0);
    assert_eq!(status.latest_best_fitness, None);

    let seeds = app.manager.chromosomes(population.id, &[ChromosomeStatus::Testing]).unwrap();
    let fingerprints: HashSet<&str> = seeds.iter().map(|c| c.fingerprint.as_str()).collect();
    assert_eq!(fingerprints.len(), seeds.len());
    for seed in &seeds {
        assert_eq!(seed.generation, 0);
        assert_eq!(seed.fitness, None);
        assert!(!seed.genes.is_empty());
        assert!(seed.genes.iter().all(|g| (0.1..=5.0).contains(&g.weight)));
    }
}

#[test]
fn every_violation_is_reported_at_once() {
    let (app, _) = app_with_market(300);
    let config = PopulationConfig {
        max_size: 10,
        mutation_rate: 0.2,
        ..Default::default()
    };
    let err = app.manager.create_population("", "", "2h", &config).unwrap_err();
    match err {
        MarketDnaError::Validation(violations) => {
            assert_eq!(violations.len(), 5, "{:?}", violations);
            assert!(violations.iter().any(|v| v.contains("name")));
            assert!(violations.iter().any(|v| v.contains("symbol")));
            assert!(violations.iter().any(|v| v.contains("timeframe")));
            assert!(violations.iter().any(|v| v.starts_with("max_size")));
            assert!(violations.iter().any(|v| v.starts_with("mutation_rate")));
        }
        other => panic!("expected a validation error, got {:?}", other),
    }
    assert!(app.manager.list_populations().unwrap().is_empty());
}

#[test]
fn names_are_unique() {
    let (app, _) = app_with_market(300);
    app.manager
        .create_population("alpha", SYMBOL, TIMEFRAME, &population_config(50))
        .unwrap();
    let err = app
        .manager
        .create_population("alpha", SYMBOL, TIMEFRAME, &population_config(50))
        .unwrap_err();
    assert!(matches!(err, MarketDnaError::Validation(ref v) if v.len() == 1));
    assert_eq!(app.manager.list_populations().unwrap().len(), 1);
}

#[test]
fn unknown_population_is_not_found() {
    let (app, _) = app_with_market(300);
    assert!(matches!(
        app.manager.get_status(404),
        Err(MarketDnaError::NotFound { entity: "population", id: 404 })
    ));
    assert!(matches!(app.manager.pause(404), Err(MarketDnaError::NotFound { .. })));
    assert!(matches!(app.manager.generation_history(404), Err(MarketDnaError::NotFound { .. })));
    assert!(matches!(app.manager.delete_population(404), Err(MarketDnaError::NotFound { .. })));
}

#[test]
fn pause_resume_and_archive() {
    let (app, _) = app_with_market(300);
    let id = app
        .manager
        .create_population("alpha", SYMBOL, TIMEFRAME, &population_config(50))
        .unwrap()
        .id;

    app.manager.pause(id).unwrap();
    assert_eq!(app.manager.get_status(id).unwrap().status, PopulationStatus::Paused);
    app.manager.resume(id).unwrap();
    assert_eq!(app.manager.get_status(id).unwrap().status, PopulationStatus::Active);

    app.manager.archive(id).unwrap();
    assert_eq!(app.manager.get_status(id).unwrap().status, PopulationStatus::Archived);
    assert!(matches!(app.manager.resume(id), Err(MarketDnaError::InvalidState(_))));
    assert!(matches!(app.manager.pause(id), Err(MarketDnaError::InvalidState(_))));

    // Archived rows stay readable.
    assert_eq!(app.manager.chromosomes(id, &[ChromosomeStatus::Testing]).unwrap().len(), 50);
}

#[test]
fn ensure_populations_creates_configured_ones_once() {
    let (app, market) = app_with_market(300);
    let mut config = app.config.clone();
    config.populations = vec![marketdna::config::PopulationSpec {
        name: "configured".to_string(),
        symbol: SYMBOL.to_string(),
        timeframe: TIMEFRAME.to_string(),
        config: Some(population_config(50)),
    }];
    let app = marketdna::App::in_memory(config, market).unwrap();

    assert_eq!(app.ensure_populations().unwrap().len(), 1);
    assert_eq!(app.ensure_populations().unwrap().len(), 1);
    assert_eq!(app.manager.list_populations().unwrap().len(), 1);
}

#[test]
fn seeded_populations_draw_different_founders() {
    let (app, _) = app_with_market(300);
    let alpha = app
        .manager
        .create_population("alpha", SYMBOL, TIMEFRAME, &population_config(50))
        .unwrap();
    let beta = app
        .manager
        .create_population("beta", SYMBOL, TIMEFRAME, &population_config(50))
        .unwrap();

    let fingerprints = |id: i64| -> HashSet<String> {
        app.manager
            .chromosomes(id, &[ChromosomeStatus::Testing])
            .unwrap()
            .into_iter()
            .map(|c| c.fingerprint)
            .collect()
    };
    let (a, b) = (fingerprints(alpha.id), fingerprints(beta.id));
    assert_eq!(a.len(), 50);
    assert_eq!(b.len(), 50);
    assert!(a.is_disjoint(&b));
}

#[test]
fn the_same_seed_replays_a_population() {
    let founders = || {
        let (app, _) = app_with_market(300);
        let population = app
            .manager
            .create_population("alpha", SYMBOL, TIMEFRAME, &population_config(50))
            .unwrap();
        let mut fingerprints: Vec<String> = app
            .manager
            .chromosomes(population.id, &[ChromosomeStatus::Testing])
            .unwrap()
            .into_iter()
            .map(|c| c.fingerprint)
            .collect();
        fingerprints.sort();
        fingerprints
    };
    assert_eq!(founders(), founders());
}
