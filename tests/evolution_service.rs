mod common;

use common::{app_with_market, population_config, SYMBOL, TIMEFRAME};
use marketdna::engines::generation::{CyclePhase, ProgressMessage};
use marketdna::population::RunOptions;
use marketdna::types::PopulationStatus;
use marketdna::MarketDnaError;
use std::sync::mpsc;
use std::time::Duration;

#[test]
fn bounded_run_reports_progress() {
    let (app, _) = app_with_market(300);
    let id = app
        .manager
        .create_population("bounded", SYMBOL, TIMEFRAME, &population_config(50))
        .unwrap()
        .id;

    let (tx, rx) = mpsc::channel();
    app.service
        .start(
            id,
            RunOptions {
                max_generations: Some(2),
                interval: Some(Duration::ZERO),
                progress: Some(tx),
            },
        )
        .unwrap();
    let report = app.service.wait(id).unwrap();

    assert_eq!(report.generations_completed, 2);
    assert!(report.error.is_none());
    assert!(!report.stopped_by_operator);
    assert_eq!(report.last_summary.unwrap().generation, 2);

    let completed: Vec<u32> = rx
        .try_iter()
        .filter_map(|m| match m {
            ProgressMessage::GenerationComplete(summary) => Some(summary.generation),
            _ => None,
        })
        .collect();
    assert_eq!(completed, vec![1, 2]);
    assert!(!app.service.is_running(id));
}

#[test]
fn operator_stop_ends_an_open_run() {
    let (app, _) = app_with_market(300);
    let id = app
        .manager
        .create_population("open", SYMBOL, TIMEFRAME, &population_config(50))
        .unwrap()
        .id;
    let options = RunOptions {
        interval: Some(Duration::from_secs(60)),
        ..Default::default()
    };

    app.service.start(id, options.clone()).unwrap();
    assert!(matches!(
        app.service.start(id, options.clone()),
        Err(MarketDnaError::InvalidState(_))
    ));
    assert_eq!(app.service.running(), vec![id]);

    let report = app.service.stop(id).unwrap();
    assert!(report.stopped_by_operator);
    assert!(report.error.is_none());
    assert_eq!(app.controller.phase(id), CyclePhase::Stopped);

    // Starting again clears the stop.
    app.service.start(id, options).unwrap();
    let reports = app.service.stop_all();
    assert_eq!(reports.len(), 1);
    assert!(reports[0].as_ref().unwrap().stopped_by_operator);
}

#[test]
fn only_active_populations_start() {
    let (app, _) = app_with_market(300);
    let id = app
        .manager
        .create_population("paused", SYMBOL, TIMEFRAME, &population_config(50))
        .unwrap()
        .id;
    app.manager.pause(id).unwrap();

    assert!(matches!(
        app.service.start(id, RunOptions::default()),
        Err(MarketDnaError::InvalidState(_))
    ));
    assert!(matches!(
        app.service.start(999, RunOptions::default()),
        Err(MarketDnaError::NotFound { .. })
    ));
    assert!(matches!(app.service.wait(id), Err(MarketDnaError::InvalidState(_))));
}

#[test]
fn a_halt_ends_the_background_run() {
    let (app, _) = app_with_market(300);
    let id = app
        .manager
        .create_population("orphan", "SOLUSDT", TIMEFRAME, &population_config(50))
        .unwrap()
        .id;

    app.service
        .start(
            id,
            RunOptions {
                interval: Some(Duration::ZERO),
                ..Default::default()
            },
        )
        .unwrap();
    let report = app.service.wait(id).unwrap();

    assert_eq!(report.generations_completed, 0);
    assert!(report.error.unwrap().contains("halted"));
    assert_eq!(app.manager.get_status(id).unwrap().status, PopulationStatus::Paused);
}

#[test]
fn finished_run_is_collected_when_restarted() {
    let (app, _) = app_with_market(300);
    let id = app
        .manager
        .create_population("relay", SYMBOL, TIMEFRAME, &population_config(50))
        .unwrap()
        .id;
    let options = RunOptions {
        max_generations: Some(1),
        interval: Some(Duration::ZERO),
        ..Default::default()
    };

    app.service.start(id, options.clone()).unwrap();
    while app.service.is_running(id) {
        std::thread::sleep(Duration::from_millis(10));
    }

    // The finished run is still registered; starting again collects it.
    app.service.start(id, options).unwrap();
    let report = app.service.wait(id).unwrap();
    assert_eq!(report.generations_completed, 1);
    assert!(report.error.is_none());
    assert_eq!(report.last_summary.unwrap().generation, 2);
    assert_eq!(app.manager.get_population(id).unwrap().current_generation, 2);
}
