//! Seeders: named units of factory work run in priority order

use crate::error::FactoryResult;
use crate::registry::Factory;

/// A named seeding step executed against a factory registry
#[async_trait::async_trait]
pub trait Seeder: Send + Sync {
    /// Seeder name for logging
    fn name(&self) -> &str;

    /// Lower priorities run first
    fn priority(&self) -> i32 {
        100
    }

    async fn run(&self, factory: &Factory) -> FactoryResult<()>;
}

/// Runs registered seeders in ascending priority order
#[derive(Default)]
pub struct SeederRunner {
    seeders: Vec<Box<dyn Seeder>>,
}

impl SeederRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<S: Seeder + 'static>(mut self, seeder: S) -> Self {
        self.seeders.push(Box::new(seeder));
        self
    }

    pub fn len(&self) -> usize {
        self.seeders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seeders.is_empty()
    }

    /// Run every seeder; the first failure aborts the run
    pub async fn run_all(&self, factory: &Factory) -> FactoryResult<()> {
        let mut ordered: Vec<&dyn Seeder> =
            self.seeders.iter().map(|seeder| seeder.as_ref()).collect();
        ordered.sort_by_key(|seeder| seeder.priority());

        tracing::info!("Running {} seeders", ordered.len());

        for seeder in ordered {
            tracing::info!("Running seeder: {}", seeder.name());
            seeder.run(factory).await?;
        }

        tracing::info!("All seeders completed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FactoryResult;
    use crate::persist::MemoryPersister;
    use std::sync::{Arc, Mutex};

    struct RecordingSeeder {
        name: &'static str,
        priority: i32,
        log: Arc<Mutex<Vec<&'static str>>>,
    }

    #[async_trait::async_trait]
    impl Seeder for RecordingSeeder {
        fn name(&self) -> &str {
            self.name
        }

        fn priority(&self) -> i32 {
            self.priority
        }

        async fn run(&self, _factory: &Factory) -> FactoryResult<()> {
            self.log.lock().unwrap().push(self.name);
            Ok(())
        }
    }

    #[tokio::test]
    async fn runs_in_priority_order() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let factory = Factory::new(Arc::new(MemoryPersister::new()));

        let runner = SeederRunner::new()
            .add(RecordingSeeder {
                name: "posts",
                priority: 20,
                log: Arc::clone(&log),
            })
            .add(RecordingSeeder {
                name: "users",
                priority: 10,
                log: Arc::clone(&log),
            });

        assert_eq!(runner.len(), 2);
        runner.run_all(&factory).await.unwrap();

        assert_eq!(*log.lock().unwrap(), vec!["users", "posts"]);
    }
}
