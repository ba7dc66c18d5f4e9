//! UUID generation for exchange and unit-of-work ids.

use std::sync::atomic::{AtomicU64, Ordering};

/// Source of unique ids. Shared across threads by the routing context.
pub trait UuidGenerator: Send + Sync {
    /// Returns a new id, unique within the process.
    fn generate_uuid(&self) -> String;
}

/// Random v4 UUIDs. The production default.
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomUuidGenerator;

impl UuidGenerator for RandomUuidGenerator {
    fn generate_uuid(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }
}

/// Deterministic `<prefix>-<n>` ids, counting from 1.
#[derive(Debug)]
pub struct SequentialUuidGenerator {
    prefix: String,
    next: AtomicU64,
}

impl SequentialUuidGenerator {
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: AtomicU64::new(1),
        }
    }
}

impl UuidGenerator for SequentialUuidGenerator {
    fn generate_uuid(&self) -> String {
        let n = self.next.fetch_add(1, Ordering::Relaxed);
        format!("{}-{n}", self.prefix)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn random_ids_are_unique() {
        let generator = RandomUuidGenerator;
        let ids: HashSet<String> = (0..100).map(|_| generator.generate_uuid()).collect();
        assert_eq!(ids.len(), 100);
    }

    #[test]
    fn sequential_ids_count_up() {
        let generator = SequentialUuidGenerator::new("ex");
        assert_eq!(generator.generate_uuid(), "ex-1");
        assert_eq!(generator.generate_uuid(), "ex-2");
        assert_eq!(generator.generate_uuid(), "ex-3");
    }

    #[test]
    fn sequential_ids_are_unique_across_threads() {
        let generator = std::sync::Arc::new(SequentialUuidGenerator::new("t"));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let generator = std::sync::Arc::clone(&generator);
                std::thread::spawn(move || {
                    (0..250).map(|_| generator.generate_uuid()).collect::<Vec<_>>()
                })
            })
            .collect();

        let mut ids = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(ids.insert(id));
            }
        }
        assert_eq!(ids.len(), 1000);
    }
}
