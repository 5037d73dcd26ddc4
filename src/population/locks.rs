use std::collections::HashMap;
use std::sync::{Arc, Mutex, TryLockError};

/// One writer per population.
///
/// Every write to a population's rows (status changes, a whole generation
/// cycle) holds that population's lock. Different populations never contend.
#[derive(Default)]
pub struct PopulationLocks {
    locks: Mutex<HashMap<i64, Arc<Mutex<()>>>>,
}

impl PopulationLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn handle(&self, population_id: i64) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        locks.entry(population_id).or_default().clone()
    }

    /// Run `f` while holding the population's lock.
    ///
    /// A lock poisoned by a panicking holder is taken over: the database
    /// transactions it guarded were rolled back.
    pub fn with<T, F: FnOnce() -> T>(&self, population_id: i64, f: F) -> T {
        let lock = self.handle(population_id);
        let _guard = lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        f()
    }

    /// Whether another thread currently holds the population.
    pub fn is_locked(&self, population_id: i64) -> bool {
        matches!(self.handle(population_id).try_lock(), Err(TryLockError::WouldBlock))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn same_population_is_serialized() {
        let locks = Arc::new(PopulationLocks::new());
        let (tx, rx) = mpsc::channel();

        let held = locks.clone();
        let holder = thread::spawn(move || {
            held.with(1, || {
                tx.send(()).unwrap();
                thread::sleep(Duration::from_millis(100));
            })
        });
        rx.recv().unwrap();

        assert!(locks.is_locked(1));
        assert!(!locks.is_locked(2));
        locks.with(1, || ());
        assert!(!locks.is_locked(1));
        holder.join().unwrap();
    }
}
