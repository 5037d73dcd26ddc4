use super::{json_column, optional, HistoryRecord, NewHistoryRecord};
use crate::error::Result;
use rusqlite::{params, Connection, Row};

const COLUMNS: &str = "id, population_id, generation, best_fitness, avg_fitness, diversity_metric, mutation_rate, \
     generation_stats, mutation_stats, selection_stats, performance_breakdown, timestamp";

fn from_row(row: &Row<'_>) -> rusqlite::Result<HistoryRecord> {
    Ok(HistoryRecord {
        id: row.get(0)?,
        population_id: row.get(1)?,
        generation: row.get(2)?,
        best_fitness: row.get(3)?,
        avg_fitness: row.get(4)?,
        diversity_metric: row.get(5)?,
        mutation_rate: row.get(6)?,
        generation_stats: json_column(row, 7)?,
        mutation_stats: json_column(row, 8)?,
        selection_stats: json_column(row, 9)?,
        performance_breakdown: json_column(row, 10)?,
        timestamp: row.get(11)?,
    })
}

/// Appends a generation. The `update_population_after_evolution` trigger
/// copies generation, best fitness and diversity onto the population.
pub fn insert(conn: &Connection, record: &NewHistoryRecord) -> Result<i64> {
    conn.execute(
        "INSERT INTO evolution_history (population_id, generation, best_fitness, avg_fitness,
                                        diversity_metric, mutation_rate, generation_stats,
                                        mutation_stats, selection_stats, performance_breakdown)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            record.population_id,
            record.generation,
            record.best_fitness,
            record.avg_fitness,
            record.diversity_metric,
            record.mutation_rate,
            record.generation_stats.to_string(),
            record.mutation_stats.to_string(),
            record.selection_stats.to_string(),
            record.performance_breakdown.to_string(),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn list(conn: &Connection, population_id: i64) -> Result<Vec<HistoryRecord>> {
    let sql = format!(
        "SELECT {} FROM evolution_history WHERE population_id = ?1 ORDER BY generation",
        COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([population_id], from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

pub fn latest(conn: &Connection, population_id: i64) -> Result<Option<HistoryRecord>> {
    let sql = format!(
        "SELECT {} FROM evolution_history WHERE population_id = ?1 ORDER BY generation DESC LIMIT 1",
        COLUMNS
    );
    optional(conn.query_row(&sql, [population_id], from_row))
}
