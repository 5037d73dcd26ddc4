use super::PopulationManager;
use crate::engines::generation::{
    ChannelProgressCallback, ConsoleProgressCallback, EvolutionController, GenerationSummary, ProgressCallback,
    ProgressMessage,
};
use crate::error::{MarketDnaError, Result};
use crate::types::PopulationStatus;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Granularity of the wait between generations.
const WAIT_SLICE: Duration = Duration::from_millis(100);

/// How a background run behaves.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Stop after this many generations; run until stopped when `None`.
    pub max_generations: Option<u32>,
    /// Pause between generations; the population's `generation_interval`
    /// hours when `None`.
    pub interval: Option<Duration>,
    /// Forward progress here instead of logging it.
    pub progress: Option<Sender<ProgressMessage>>,
}

/// What a finished background run did.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub population_id: i64,
    pub generations_completed: u32,
    pub last_summary: Option<GenerationSummary>,
    /// Set when the run ended on an error, including a halt.
    pub error: Option<String>,
    pub stopped_by_operator: bool,
}

struct Run {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<RunReport>,
}

/// Evolves populations on their own threads.
pub struct EvolutionService {
    controller: Arc<EvolutionController>,
    manager: Arc<PopulationManager>,
    runs: Mutex<HashMap<i64, Run>>,
}

impl EvolutionService {
    pub fn new(controller: Arc<EvolutionController>, manager: Arc<PopulationManager>) -> Self {
        Self {
            controller,
            manager,
            runs: Mutex::new(HashMap::new()),
        }
    }

    fn runs(&self) -> std::sync::MutexGuard<'_, HashMap<i64, Run>> {
        self.runs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// One generation on the calling thread.
    pub fn run_once(&self, population_id: i64) -> Result<GenerationSummary> {
        self.controller.run_generation(population_id, &mut ConsoleProgressCallback)
    }

    /// Starts evolving an active population in the background.
    pub fn start(&self, population_id: i64, options: RunOptions) -> Result<()> {
        let population = self.manager.get_population(population_id)?;
        if population.status != PopulationStatus::Active {
            return Err(MarketDnaError::InvalidState(format!(
                "population {} is {} and cannot start evolving",
                population_id, population.status
            )));
        }

        let mut runs = self.runs();
        if let Some(run) = runs.get(&population_id) {
            if !run.handle.is_finished() {
                return Err(MarketDnaError::InvalidState(format!(
                    "population {} is already evolving",
                    population_id
                )));
            }
        }
        // Collect a finished run's report before it is replaced.
        if let Some(run) = runs.remove(&population_id) {
            match join(population_id, run) {
                Ok(report) => log::info!(
                    "Population {}: previous run completed {} generation(s){}",
                    population_id,
                    report.generations_completed,
                    report.error.map(|e| format!(" and ended on: {}", e)).unwrap_or_default()
                ),
                Err(e) => log::warn!("Population {}: {}", population_id, e),
            }
        }

        self.controller.reset(population_id);
        let interval = options
            .interval
            .unwrap_or_else(|| Duration::from_secs(u64::from(population.config.generation_interval) * 3600));
        let stop = Arc::new(AtomicBool::new(false));
        let controller = Arc::clone(&self.controller);
        let thread_stop = Arc::clone(&stop);

        let handle = thread::Builder::new()
            .name(format!("evolve-{}", population_id))
            .spawn(move || {
                let callback: Box<dyn ProgressCallback> = match options.progress {
                    Some(sender) => Box::new(ChannelProgressCallback::new(sender)),
                    None => Box::new(ConsoleProgressCallback),
                };
                run_loop(&controller, population_id, options.max_generations, interval, &thread_stop, callback)
            })?;

        log::info!("Started evolving population {} '{}'", population_id, population.name);
        runs.insert(population_id, Run { stop, handle });
        Ok(())
    }

    /// Asks the run to stop after its current generation and waits for it.
    pub fn stop(&self, population_id: i64) -> Result<RunReport> {
        let run = self.take(population_id)?;
        run.stop.store(true, Ordering::SeqCst);
        join(population_id, run)
    }

    /// Waits for a run to end on its own.
    pub fn wait(&self, population_id: i64) -> Result<RunReport> {
        let run = self.take(population_id)?;
        join(population_id, run)
    }

    pub fn is_running(&self, population_id: i64) -> bool {
        self.runs()
            .get(&population_id)
            .map_or(false, |run| !run.handle.is_finished())
    }

    pub fn running(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = self
            .runs()
            .iter()
            .filter(|(_, run)| !run.handle.is_finished())
            .map(|(id, _)| *id)
            .collect();
        ids.sort_unstable();
        ids
    }

    /// Stops every run; reports come back ordered by population id.
    pub fn stop_all(&self) -> Vec<Result<RunReport>> {
        let mut ids: Vec<i64> = self.runs().keys().copied().collect();
        ids.sort_unstable();
        ids.into_iter().map(|id| self.stop(id)).collect()
    }

    fn take(&self, population_id: i64) -> Result<Run> {
        self.runs().remove(&population_id).ok_or_else(|| {
            MarketDnaError::InvalidState(format!("population {} has no background run", population_id))
        })
    }
}

fn join(population_id: i64, run: Run) -> Result<RunReport> {
    run.handle.join().map_err(|_| {
        MarketDnaError::InvalidState(format!("evolution thread of population {} panicked", population_id))
    })
}

fn run_loop(
    controller: &EvolutionController,
    population_id: i64,
    max_generations: Option<u32>,
    interval: Duration,
    stop: &AtomicBool,
    mut callback: Box<dyn ProgressCallback>,
) -> RunReport {
    let mut report = RunReport {
        population_id,
        generations_completed: 0,
        last_summary: None,
        error: None,
        stopped_by_operator: false,
    };

    loop {
        if stop.load(Ordering::SeqCst) {
            report.stopped_by_operator = true;
            break;
        }
        match controller.run_generation(population_id, callback.as_mut()) {
            Ok(summary) => {
                report.generations_completed += 1;
                report.last_summary = Some(summary);
            }
            Err(e) => {
                log::error!("Population {}: background run ended: {}", population_id, e);
                report.error = Some(e.to_string());
                break;
            }
        }
        if max_generations.is_some_and(|max| report.generations_completed >= max) {
            break;
        }
        if !sleep_unless_stopped(interval, stop) {
            report.stopped_by_operator = true;
            break;
        }
    }

    if report.stopped_by_operator {
        if let Err(e) = controller.stop(population_id) {
            log::debug!("Population {}: {}", population_id, e);
        }
    }
    log::info!(
        "Population {}: background run finished after {} generation(s)",
        population_id,
        report.generations_completed
    );
    report
}

/// Sleeps in small slices; false when a stop was requested meanwhile.
fn sleep_unless_stopped(total: Duration, stop: &AtomicBool) -> bool {
    let until = Instant::now() + total;
    loop {
        if stop.load(Ordering::SeqCst) {
            return false;
        }
        let now = Instant::now();
        if now >= until {
            return true;
        }
        thread::sleep(WAIT_SLICE.min(until - now));
    }
}
