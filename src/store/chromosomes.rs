use super::{enum_column, json_column, optional};
use crate::engines::generation::genome::{Chromosome, Gene, MutationRecord};
use crate::error::{MarketDnaError, Result};
use crate::genes::{GeneRegistry, MAX_WEIGHT, MIN_WEIGHT};
use crate::types::ChromosomeStatus;
use rusqlite::{params, Connection, Row};
use std::collections::{BTreeMap, HashSet};

const COLUMNS: &str = "id, population_id, fingerprint, generation, age, parent1_id, parent2_id, status, \
     fitness, performance_metrics, weight_distribution, test_results, last_test_date";

const GENE_COLUMNS: &str = "id, gene_type, parameters, weight, is_active, performance_contribution, \
     mutation_history, last_mutation_date";

fn from_row(row: &Row<'_>) -> rusqlite::Result<Chromosome> {
    Ok(Chromosome {
        id: row.get(0)?,
        population_id: row.get(1)?,
        fingerprint: row.get(2)?,
        generation: row.get(3)?,
        age: row.get(4)?,
        parent1_id: row.get(5)?,
        parent2_id: row.get(6)?,
        status: enum_column(row, 7, ChromosomeStatus::parse)?,
        fitness: row.get(8)?,
        performance_metrics: json_column(row, 9)?,
        weight_distribution: json_column(row, 10)?,
        test_results: json_column(row, 11)?,
        last_test_date: row.get(12)?,
        genes: Vec::new(),
    })
}

fn gene_from_row(row: &Row<'_>) -> rusqlite::Result<Gene> {
    Ok(Gene {
        id: row.get(0)?,
        gene_type: row.get(1)?,
        params: json_column(row, 2)?,
        weight: row.get(3)?,
        is_active: row.get(4)?,
        performance_contribution: row.get(5)?,
        mutation_history: json_column::<Vec<MutationRecord>>(row, 6)?,
        last_mutation_date: row.get(7)?,
    })
}

/// Bounds of the gene type at creation time, kept next to the gene.
fn validation_rules(gene_type: &str, registry: &GeneRegistry) -> serde_json::Value {
    let params = registry
        .get(gene_type)
        .map(|kind| serde_json::json!(kind.param_specs()))
        .unwrap_or_else(|| serde_json::json!([]));
    serde_json::json!({
        "weight": { "min": MIN_WEIGHT, "max": MAX_WEIGHT },
        "params": params,
    })
}

/// Inserts the chromosome and its genes, filling in the new row ids.
pub fn insert(conn: &Connection, chromosome: &mut Chromosome, registry: &GeneRegistry) -> Result<i64> {
    conn.execute(
        "INSERT INTO chromosomes (population_id, fingerprint, generation, age, parent1_id, parent2_id,
                                  status, fitness, performance_metrics, weight_distribution,
                                  test_results, last_test_date)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            chromosome.population_id,
            chromosome.fingerprint,
            chromosome.generation,
            chromosome.age,
            chromosome.parent1_id,
            chromosome.parent2_id,
            chromosome.status.as_str(),
            chromosome.fitness,
            chromosome.performance_metrics.to_string(),
            chromosome.weight_distribution.to_string(),
            chromosome.test_results.to_string(),
            chromosome.last_test_date,
        ],
    )?;
    let id = conn.last_insert_rowid();
    chromosome.id = Some(id);

    let mut stmt = conn.prepare_cached(
        "INSERT INTO chromosome_genes (chromosome_id, position, gene_type, parameters, weight, is_active,
                                       performance_contribution, mutation_history, last_mutation_date,
                                       validation_rules)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
    )?;
    for (position, gene) in chromosome.genes.iter_mut().enumerate() {
        stmt.execute(params![
            id,
            position as i64,
            gene.gene_type,
            serde_json::to_string(&gene.params)?,
            gene.weight,
            gene.is_active,
            gene.performance_contribution,
            serde_json::to_string(&gene.mutation_history)?,
            gene.last_mutation_date,
            validation_rules(&gene.gene_type, registry).to_string(),
        ])?;
        gene.id = Some(conn.last_insert_rowid());
    }
    Ok(id)
}

fn load_genes(conn: &Connection, chromosome_id: i64) -> Result<Vec<Gene>> {
    let sql = format!(
        "SELECT {} FROM chromosome_genes WHERE chromosome_id = ?1 ORDER BY position, id",
        GENE_COLUMNS
    );
    let mut stmt = conn.prepare_cached(&sql)?;
    let rows = stmt.query_map([chromosome_id], gene_from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

fn with_genes(conn: &Connection, mut chromosomes: Vec<Chromosome>) -> Result<Vec<Chromosome>> {
    for chromosome in chromosomes.iter_mut() {
        if let Some(id) = chromosome.id {
            chromosome.genes = load_genes(conn, id)?;
        }
    }
    Ok(chromosomes)
}

pub fn get(conn: &Connection, id: i64) -> Result<Option<Chromosome>> {
    let sql = format!("SELECT {} FROM chromosomes WHERE id = ?1", COLUMNS);
    match optional(conn.query_row(&sql, [id], from_row))? {
        Some(mut chromosome) => {
            chromosome.genes = load_genes(conn, id)?;
            Ok(Some(chromosome))
        }
        None => Ok(None),
    }
}

pub fn require(conn: &Connection, id: i64) -> Result<Chromosome> {
    get(conn, id)?.ok_or_else(|| MarketDnaError::not_found("chromosome", id))
}

/// Chromosomes of a population in the given statuses, oldest rows first.
pub fn list(conn: &Connection, population_id: i64, statuses: &[ChromosomeStatus]) -> Result<Vec<Chromosome>> {
    if statuses.is_empty() {
        return Ok(Vec::new());
    }
    let filter = statuses
        .iter()
        .map(|s| format!("'{}'", s.as_str()))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = format!(
        "SELECT {} FROM chromosomes WHERE population_id = ?1 AND status IN ({}) ORDER BY id",
        COLUMNS, filter
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([population_id], from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    with_genes(conn, rows)
}

/// Highest-fitness active chromosomes; ties favour younger then older rows.
pub fn best(conn: &Connection, population_id: i64, limit: usize) -> Result<Vec<Chromosome>> {
    let sql = format!(
        "SELECT {} FROM chromosomes
         WHERE population_id = ?1 AND status = 'active' AND fitness IS NOT NULL
         ORDER BY fitness DESC, age ASC, id ASC
         LIMIT ?2",
        COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![population_id, limit as i64], from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    with_genes(conn, rows)
}

/// Every fingerprint the population has ever held.
pub fn fingerprints(conn: &Connection, population_id: i64) -> Result<HashSet<String>> {
    let mut stmt = conn.prepare_cached("SELECT DISTINCT fingerprint FROM chromosomes WHERE population_id = ?1")?;
    let rows = stmt.query_map([population_id], |row| row.get::<_, String>(0))?;
    Ok(rows.collect::<rusqlite::Result<HashSet<_>>>()?)
}

pub fn exists_in_generation(conn: &Connection, population_id: i64, generation: u32, fingerprint: &str) -> Result<bool> {
    let found: i64 = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM chromosomes
                       WHERE population_id = ?1 AND generation = ?2 AND fingerprint = ?3)",
        params![population_id, generation, fingerprint],
        |row| row.get(0),
    )?;
    Ok(found != 0)
}

/// Row counts per status; statuses without rows report 0.
pub fn count_by_status(conn: &Connection, population_id: i64) -> Result<BTreeMap<ChromosomeStatus, usize>> {
    let mut counts: BTreeMap<ChromosomeStatus, usize> = [
        ChromosomeStatus::Active,
        ChromosomeStatus::Testing,
        ChromosomeStatus::Archived,
    ]
    .into_iter()
    .map(|s| (s, 0))
    .collect();

    let mut stmt = conn.prepare("SELECT status, COUNT(*) FROM chromosomes WHERE population_id = ?1 GROUP BY status")?;
    let rows = stmt.query_map([population_id], |row| {
        Ok((enum_column(row, 0, ChromosomeStatus::parse)?, row.get::<_, i64>(1)?))
    })?;
    for row in rows {
        let (status, count) = row?;
        counts.insert(status, count as usize);
    }
    Ok(counts)
}

/// Persists an evaluation: fitness, status, metrics and gene contributions.
pub fn save_evaluation(conn: &Connection, chromosome: &Chromosome) -> Result<()> {
    let id = chromosome
        .id
        .ok_or_else(|| MarketDnaError::InvalidState("cannot save the evaluation of an unsaved chromosome".to_string()))?;
    let changed = conn.execute(
        "UPDATE chromosomes
         SET fitness = ?1, status = ?2, performance_metrics = ?3, test_results = ?4, last_test_date = ?5
         WHERE id = ?6",
        params![
            chromosome.fitness,
            chromosome.status.as_str(),
            chromosome.performance_metrics.to_string(),
            chromosome.test_results.to_string(),
            chromosome.last_test_date,
            id,
        ],
    )?;
    if changed == 0 {
        return Err(MarketDnaError::not_found("chromosome", id));
    }

    let mut stmt = conn.prepare_cached("UPDATE chromosome_genes SET performance_contribution = ?1 WHERE id = ?2")?;
    for gene in &chromosome.genes {
        if let Some(gene_id) = gene.id {
            stmt.execute(params![gene.performance_contribution, gene_id])?;
        }
    }
    Ok(())
}

/// Writes a gene's mutable fields. The database rejects out-of-range
/// weights and shortened histories.
pub fn update_gene(conn: &Connection, gene: &Gene) -> Result<()> {
    let id = gene
        .id
        .ok_or_else(|| MarketDnaError::InvalidState("cannot update an unsaved gene".to_string()))?;
    let changed = conn.execute(
        "UPDATE chromosome_genes
         SET parameters = ?1, weight = ?2, is_active = ?3, mutation_history = ?4, last_mutation_date = ?5
         WHERE id = ?6",
        params![
            serde_json::to_string(&gene.params)?,
            gene.weight,
            gene.is_active,
            serde_json::to_string(&gene.mutation_history)?,
            gene.last_mutation_date,
            id,
        ],
    )?;
    if changed == 0 {
        return Err(MarketDnaError::not_found("gene", id));
    }
    Ok(())
}

pub fn set_status(conn: &Connection, ids: &[i64], status: ChromosomeStatus) -> Result<()> {
    let mut stmt = conn.prepare_cached("UPDATE chromosomes SET status = ?1 WHERE id = ?2")?;
    for id in ids {
        stmt.execute(params![status.as_str(), id])?;
    }
    Ok(())
}

pub fn increment_age(conn: &Connection, ids: &[i64]) -> Result<()> {
    let mut stmt = conn.prepare_cached("UPDATE chromosomes SET age = age + 1 WHERE id = ?1")?;
    for id in ids {
        stmt.execute([id])?;
    }
    Ok(())
}
