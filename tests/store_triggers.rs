mod common;

use common::{app_with_market, population_config, SYMBOL, TIMEFRAME};
use marketdna::store::{history, NewHistoryRecord};
use marketdna::types::ChromosomeStatus;
use marketdna::{App, MarketDnaError};
use rusqlite::params;

fn setup() -> (App, i64, i64) {
    let (app, _) = app_with_market(300);
    let population = app
        .manager
        .create_population("triggers", SYMBOL, TIMEFRAME, &population_config(50))
        .unwrap();
    let chromosome = app
        .manager
        .chromosomes(population.id, &[ChromosomeStatus::Testing])
        .unwrap()
        .remove(0);
    (app, population.id, chromosome.id.unwrap())
}

fn history_row(population_id: i64, generation: u32) -> NewHistoryRecord {
    NewHistoryRecord {
        population_id,
        generation,
        best_fitness: 0.8,
        avg_fitness: 0.5,
        diversity_metric: 0.6,
        mutation_rate: 0.01,
        generation_stats: serde_json::json!({}),
        mutation_stats: serde_json::json!({}),
        selection_stats: serde_json::json!({}),
        performance_breakdown: serde_json::json!({}),
    }
}

#[test]
fn out_of_range_weight_is_rejected_on_insert() {
    let (app, _, chromosome_id) = setup();
    for weight in [0.05, 5.5] {
        let result = app.store.with_conn(|conn| {
            Ok(conn.execute(
                "INSERT INTO chromosome_genes (chromosome_id, position, gene_type, weight) VALUES (?1, 99, 'rsi', ?2)",
                params![chromosome_id, weight],
            )?)
        });
        assert!(matches!(result, Err(MarketDnaError::Storage(_))), "weight {} accepted", weight);
    }
}

#[test]
fn out_of_range_weight_is_rejected_on_update() {
    let (app, _, chromosome_id) = setup();
    let result = app.store.with_conn(|conn| {
        Ok(conn.execute(
            "UPDATE chromosome_genes SET weight = 9.0 WHERE chromosome_id = ?1",
            params![chromosome_id],
        )?)
    });
    assert!(matches!(result, Err(MarketDnaError::Storage(_))));

    let chromosome = app.manager.get_chromosome(chromosome_id).unwrap();
    assert!(chromosome.genes.iter().all(|g| (0.1..=5.0).contains(&g.weight)));
}

#[test]
fn mutation_history_cannot_shrink() {
    let (app, _, chromosome_id) = setup();
    let grown = app.store.with_conn(|conn| {
        Ok(conn.execute(
            "UPDATE chromosome_genes SET mutation_history = json_array(json_object('field', 'weight')) \
             WHERE chromosome_id = ?1",
            params![chromosome_id],
        )?)
    });
    assert!(grown.unwrap() > 0);

    let shrunk = app.store.with_conn(|conn| {
        Ok(conn.execute(
            "UPDATE chromosome_genes SET mutation_history = '[]' WHERE chromosome_id = ?1",
            params![chromosome_id],
        )?)
    });
    assert!(matches!(shrunk, Err(MarketDnaError::Storage(_))));
}

#[test]
fn history_insert_updates_the_population_summary() {
    let (app, population_id, _) = setup();
    app.store
        .with_conn(|conn| history::insert(conn, &history_row(population_id, 3)))
        .unwrap();

    let population = app.manager.get_population(population_id).unwrap();
    assert_eq!(population.current_generation, 3);
    assert!((population.performance_score - 0.8).abs() < 1e-12);
    assert!((population.diversity_score - 0.6).abs() < 1e-12);
}

#[test]
fn history_rows_are_unique_and_append_only() {
    let (app, population_id, _) = setup();
    app.store
        .with_conn(|conn| history::insert(conn, &history_row(population_id, 1)))
        .unwrap();

    let duplicate = app
        .store
        .with_conn(|conn| history::insert(conn, &history_row(population_id, 1)));
    assert!(matches!(duplicate, Err(MarketDnaError::Storage(_))));

    let rewrite = app.store.with_conn(|conn| {
        Ok(conn.execute(
            "UPDATE evolution_history SET best_fitness = 1.0 WHERE population_id = ?1",
            params![population_id],
        )?)
    });
    assert!(matches!(rewrite, Err(MarketDnaError::Storage(_))));
    assert_eq!(app.manager.generation_history(population_id).unwrap().len(), 1);
}

#[test]
fn deleting_a_population_cascades() {
    let (app, population_id, chromosome_id) = setup();
    app.store
        .with_conn(|conn| history::insert(conn, &history_row(population_id, 1)))
        .unwrap();
    app.manager.delete_population(population_id).unwrap();

    let (chromosomes, genes, rows): (i64, i64, i64) = app
        .store
        .with_conn(|conn| {
            Ok((
                conn.query_row("SELECT COUNT(*) FROM chromosomes", [], |r| r.get(0))?,
                conn.query_row("SELECT COUNT(*) FROM chromosome_genes", [], |r| r.get(0))?,
                conn.query_row("SELECT COUNT(*) FROM evolution_history", [], |r| r.get(0))?,
            ))
        })
        .unwrap();
    assert_eq!((chromosomes, genes, rows), (0, 0, 0));
    assert!(matches!(
        app.manager.get_chromosome(chromosome_id),
        Err(MarketDnaError::NotFound { .. })
    ));
}

#[test]
fn removing_a_parent_clears_the_reference() {
    let (app, population_id, parent_id) = setup();
    let child_id: i64 = app
        .store
        .with_conn(|conn| {
            conn.execute(
                "INSERT INTO chromosomes (population_id, fingerprint, generation, parent1_id) VALUES (?1, 'child', 1, ?2)",
                params![population_id, parent_id],
            )?;
            Ok(conn.last_insert_rowid())
        })
        .unwrap();

    app.store
        .with_conn(|conn| Ok(conn.execute("DELETE FROM chromosomes WHERE id = ?1", params![parent_id])?))
        .unwrap();

    let child = app.manager.get_chromosome(child_id).unwrap();
    assert_eq!(child.parent1_id, None);
}
