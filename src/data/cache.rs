use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Memoized gene signal series, keyed by gene type and parameters.
///
/// One cache serves one market series; the evaluator builds a fresh cache per
/// evaluation pass.
pub struct IndicatorCache {
    data: Mutex<HashMap<String, Arc<Vec<f64>>>>,
    capacity: usize,
}

impl IndicatorCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            data: Mutex::new(HashMap::with_capacity(capacity)),
            capacity,
        }
    }

    pub fn get(&self, key: &str) -> Option<Arc<Vec<f64>>> {
        let data = self.data.lock().ok()?;
        data.get(key).cloned()
    }

    pub fn set(&self, key: String, value: Arc<Vec<f64>>) {
        if let Ok(mut data) = self.data.lock() {
            if data.len() >= self.capacity {
                // A simple eviction strategy: clear the cache when full.
                data.clear();
            }
            data.insert(key, value);
        }
    }

    pub fn len(&self) -> usize {
        self.data.lock().map(|data| data.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clears_when_full() {
        let cache = IndicatorCache::new(2);
        cache.set("a".to_string(), Arc::new(vec![1.0]));
        cache.set("b".to_string(), Arc::new(vec![2.0]));
        assert_eq!(cache.len(), 2);

        cache.set("c".to_string(), Arc::new(vec![3.0]));
        assert_eq!(cache.len(), 1);
        assert!(cache.get("a").is_none());
        assert_eq!(cache.get("c").unwrap().as_slice(), &[3.0]);
    }
}
