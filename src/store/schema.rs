/// Tables, constraints and triggers. Safe to run against an existing database.
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS populations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    exchange TEXT NOT NULL DEFAULT 'binance',
    symbol TEXT NOT NULL,
    timeframe TEXT NOT NULL,
    max_size INTEGER NOT NULL DEFAULT 100 CHECK (max_size BETWEEN 50 AND 500),
    current_generation INTEGER NOT NULL DEFAULT 0 CHECK (current_generation >= 0),
    status TEXT NOT NULL DEFAULT 'active' CHECK (status IN ('active', 'paused', 'archived')),
    diversity_score REAL NOT NULL DEFAULT 0.0 CHECK (diversity_score BETWEEN 0.0 AND 1.0),
    performance_score REAL NOT NULL DEFAULT 0.0,
    mutation_rate REAL NOT NULL DEFAULT 0.01 CHECK (mutation_rate BETWEEN 0.001 AND 0.05),
    selection_pressure INTEGER NOT NULL DEFAULT 5 CHECK (selection_pressure BETWEEN 1 AND 10),
    generation_interval INTEGER NOT NULL DEFAULT 4 CHECK (generation_interval BETWEEN 1 AND 24),
    diversity_threshold REAL NOT NULL DEFAULT 0.7 CHECK (diversity_threshold BETWEEN 0.5 AND 1.0),
    created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
    updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
);

CREATE TABLE IF NOT EXISTS chromosomes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    population_id INTEGER NOT NULL REFERENCES populations(id) ON DELETE CASCADE,
    fingerprint TEXT NOT NULL,
    generation INTEGER NOT NULL DEFAULT 0 CHECK (generation >= 0),
    age INTEGER NOT NULL DEFAULT 0 CHECK (age >= 0),
    parent1_id INTEGER REFERENCES chromosomes(id) ON DELETE SET NULL,
    parent2_id INTEGER REFERENCES chromosomes(id) ON DELETE SET NULL,
    status TEXT NOT NULL DEFAULT 'testing' CHECK (status IN ('active', 'testing', 'archived')),
    fitness REAL,
    performance_metrics TEXT NOT NULL DEFAULT '{}',
    weight_distribution TEXT NOT NULL DEFAULT '{}',
    test_results TEXT NOT NULL DEFAULT '{}',
    last_test_date TIMESTAMP,
    created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
    UNIQUE (population_id, generation, fingerprint)
);

CREATE INDEX IF NOT EXISTS idx_chromosomes_population_status
    ON chromosomes (population_id, status);
CREATE INDEX IF NOT EXISTS idx_chromosomes_fingerprint
    ON chromosomes (population_id, fingerprint);

CREATE TABLE IF NOT EXISTS chromosome_genes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    chromosome_id INTEGER NOT NULL REFERENCES chromosomes(id) ON DELETE CASCADE,
    position INTEGER NOT NULL DEFAULT 0,
    gene_type TEXT NOT NULL,
    parameters TEXT NOT NULL DEFAULT '{}',
    weight REAL NOT NULL DEFAULT 1.0 CHECK (weight >= 0.1 AND weight <= 5.0),
    is_active INTEGER NOT NULL DEFAULT 1,
    performance_contribution REAL NOT NULL DEFAULT 0.0,
    mutation_history TEXT NOT NULL DEFAULT '[]',
    last_mutation_date TIMESTAMP,
    validation_rules TEXT NOT NULL DEFAULT '{}'
);

CREATE INDEX IF NOT EXISTS idx_chromosome_genes_chromosome
    ON chromosome_genes (chromosome_id, position);

CREATE TRIGGER IF NOT EXISTS validate_gene_weight_insert
BEFORE INSERT ON chromosome_genes
WHEN NEW.weight < 0.1 OR NEW.weight > 5.0
BEGIN
    SELECT RAISE(ABORT, 'gene weight must be between 0.1 and 5.0');
END;

CREATE TRIGGER IF NOT EXISTS validate_gene_weight_update
BEFORE UPDATE OF weight ON chromosome_genes
WHEN NEW.weight < 0.1 OR NEW.weight > 5.0
BEGIN
    SELECT RAISE(ABORT, 'gene weight must be between 0.1 and 5.0');
END;

CREATE TRIGGER IF NOT EXISTS mutation_history_append_only
BEFORE UPDATE OF mutation_history ON chromosome_genes
WHEN json_array_length(NEW.mutation_history) < json_array_length(OLD.mutation_history)
BEGIN
    SELECT RAISE(ABORT, 'mutation history is append-only');
END;

CREATE TABLE IF NOT EXISTS evolution_history (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    population_id INTEGER NOT NULL REFERENCES populations(id) ON DELETE CASCADE,
    generation INTEGER NOT NULL CHECK (generation >= 0),
    best_fitness REAL NOT NULL,
    avg_fitness REAL NOT NULL,
    diversity_metric REAL NOT NULL CHECK (diversity_metric BETWEEN 0.0 AND 1.0),
    mutation_rate REAL NOT NULL,
    generation_stats TEXT NOT NULL DEFAULT '{}',
    mutation_stats TEXT NOT NULL DEFAULT '{}',
    selection_stats TEXT NOT NULL DEFAULT '{}',
    performance_breakdown TEXT NOT NULL DEFAULT '{}',
    timestamp TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
    UNIQUE (population_id, generation)
);

CREATE TRIGGER IF NOT EXISTS update_population_after_evolution
AFTER INSERT ON evolution_history
BEGIN
    UPDATE populations
    SET current_generation = NEW.generation,
        performance_score = NEW.best_fitness,
        diversity_score = NEW.diversity_metric,
        updated_at = CURRENT_TIMESTAMP
    WHERE id = NEW.population_id;
END;

CREATE TRIGGER IF NOT EXISTS evolution_history_append_only
BEFORE UPDATE ON evolution_history
BEGIN
    SELECT RAISE(ABORT, 'evolution history is append-only');
END;

CREATE TABLE IF NOT EXISTS market_data (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    exchange TEXT NOT NULL,
    symbol TEXT NOT NULL,
    timeframe TEXT NOT NULL,
    timestamp INTEGER NOT NULL,
    open REAL NOT NULL,
    high REAL NOT NULL,
    low REAL NOT NULL,
    close REAL NOT NULL,
    volume REAL NOT NULL,
    rsi REAL,
    macd REAL,
    macd_signal REAL,
    bb_upper REAL,
    bb_lower REAL,
    UNIQUE (exchange, symbol, timeframe, timestamp)
);
"#;
