use super::{enum_column, optional, PopulationRecord};
use crate::config::PopulationConfig;
use crate::error::{MarketDnaError, Result};
use crate::types::PopulationStatus;
use rusqlite::{params, Connection, Row};

const COLUMNS: &str = "id, name, exchange, symbol, timeframe, max_size, current_generation, status, \
     diversity_score, performance_score, mutation_rate, selection_pressure, generation_interval, \
     diversity_threshold, created_at, updated_at";

fn from_row(row: &Row<'_>) -> rusqlite::Result<PopulationRecord> {
    Ok(PopulationRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        symbol: row.get(3)?,
        timeframe: row.get(4)?,
        config: PopulationConfig {
            exchange: row.get(2)?,
            max_size: row.get(5)?,
            mutation_rate: row.get(10)?,
            selection_pressure: row.get(11)?,
            generation_interval: row.get(12)?,
            diversity_threshold: row.get(13)?,
        },
        current_generation: row.get(6)?,
        status: enum_column(row, 7, PopulationStatus::parse)?,
        diversity_score: row.get(8)?,
        performance_score: row.get(9)?,
        created_at: row.get(14)?,
        updated_at: row.get(15)?,
    })
}

/// Inserts an `active` population at generation 0.
pub fn insert(conn: &Connection, name: &str, symbol: &str, timeframe: &str, config: &PopulationConfig) -> Result<i64> {
    conn.execute(
        "INSERT INTO populations (name, exchange, symbol, timeframe, max_size, mutation_rate,
                                  selection_pressure, generation_interval, diversity_threshold)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            name,
            config.exchange,
            symbol,
            timeframe,
            config.max_size,
            config.mutation_rate,
            config.selection_pressure,
            config.generation_interval,
            config.diversity_threshold,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn get(conn: &Connection, id: i64) -> Result<Option<PopulationRecord>> {
    let sql = format!("SELECT {} FROM populations WHERE id = ?1", COLUMNS);
    optional(conn.query_row(&sql, [id], from_row))
}

pub fn require(conn: &Connection, id: i64) -> Result<PopulationRecord> {
    get(conn, id)?.ok_or_else(|| MarketDnaError::not_found("population", id))
}

pub fn find_by_name(conn: &Connection, name: &str) -> Result<Option<PopulationRecord>> {
    let sql = format!("SELECT {} FROM populations WHERE name = ?1", COLUMNS);
    optional(conn.query_row(&sql, [name], from_row))
}

pub fn list(conn: &Connection) -> Result<Vec<PopulationRecord>> {
    let sql = format!("SELECT {} FROM populations ORDER BY id", COLUMNS);
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

pub fn set_status(conn: &Connection, id: i64, status: PopulationStatus) -> Result<()> {
    let changed = conn.execute(
        "UPDATE populations SET status = ?1, updated_at = CURRENT_TIMESTAMP WHERE id = ?2",
        params![status.as_str(), id],
    )?;
    if changed == 0 {
        return Err(MarketDnaError::not_found("population", id));
    }
    Ok(())
}

/// Hard delete; chromosomes, genes and history go with it.
pub fn delete(conn: &Connection, id: i64) -> Result<()> {
    let changed = conn.execute("DELETE FROM populations WHERE id = ?1", [id])?;
    if changed == 0 {
        return Err(MarketDnaError::not_found("population", id));
    }
    Ok(())
}
