use super::controller::{CyclePhase, GenerationSummary};

/// Observer of one population's generation cycle.
pub trait ProgressCallback: Send {
    fn on_phase(&mut self, population_id: i64, phase: CyclePhase);
    fn on_generation_start(&mut self, population_id: i64, generation: u32);
    fn on_chromosome_evaluated(&mut self, population_id: i64, evaluated: usize, total: usize);
    fn on_generation_complete(&mut self, summary: &GenerationSummary);
}

pub struct ConsoleProgressCallback;

impl ProgressCallback for ConsoleProgressCallback {
    fn on_phase(&mut self, population_id: i64, phase: CyclePhase) {
        if phase == CyclePhase::Degraded {
            log::warn!("Population {}: cycle degraded, retrying", population_id);
        } else {
            log::debug!("Population {}: {}", population_id, phase);
        }
    }

    fn on_generation_start(&mut self, population_id: i64, generation: u32) {
        log::info!("Population {}: generation {} starting...", population_id, generation);
    }

    fn on_chromosome_evaluated(&mut self, population_id: i64, evaluated: usize, total: usize) {
        if evaluated % 10 == 0 || evaluated == total {
            log::info!("Population {}: evaluated {}/{} chromosomes", population_id, evaluated, total);
        }
    }

    fn on_generation_complete(&mut self, summary: &GenerationSummary) {
        log::info!(
            "Population {}: generation {} complete. Best fitness: {:.4}, avg: {:.4}, diversity: {:.3}",
            summary.population_id,
            summary.generation,
            summary.best_fitness,
            summary.avg_fitness,
            summary.diversity
        );
    }
}

/// Forwards progress to another thread, e.g. an operator front end.
pub struct ChannelProgressCallback {
    sender: std::sync::mpsc::Sender<ProgressMessage>,
}

#[derive(Debug, Clone)]
pub enum ProgressMessage {
    Phase { population_id: i64, phase: CyclePhase },
    GenerationStart { population_id: i64, generation: u32 },
    ChromosomeEvaluated { population_id: i64, current: usize, total: usize },
    GenerationComplete(GenerationSummary),
}

impl ChannelProgressCallback {
    pub fn new(sender: std::sync::mpsc::Sender<ProgressMessage>) -> Self {
        Self { sender }
    }
}

impl ProgressCallback for ChannelProgressCallback {
    fn on_phase(&mut self, population_id: i64, phase: CyclePhase) {
        let _ = self.sender.send(ProgressMessage::Phase { population_id, phase });
    }

    fn on_generation_start(&mut self, population_id: i64, generation: u32) {
        let _ = self.sender.send(ProgressMessage::GenerationStart {
            population_id,
            generation,
        });
    }

    fn on_chromosome_evaluated(&mut self, population_id: i64, evaluated: usize, total: usize) {
        let _ = self.sender.send(ProgressMessage::ChromosomeEvaluated {
            population_id,
            current: evaluated,
            total,
        });
    }

    fn on_generation_complete(&mut self, summary: &GenerationSummary) {
        let _ = self.sender.send(ProgressMessage::GenerationComplete(summary.clone()));
    }
}
