//! Worker pool driving a [`Simulation`]

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use glam::IVec2;
use parking_lot::Mutex;
use rand::Rng;

use crate::error::{Error, Result};
use crate::simulation::{stream_rng, Simulation};

/// Pool counters
#[derive(Default)]
pub struct PoolStats {
    pub ticks: AtomicU64,
    pub applied: AtomicU64,
}

/// Point-in-time copy of [`PoolStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub ticks: u64,
    pub applied: u64,
}

#[derive(Default)]
struct Shared {
    shutdown: AtomicBool,
    stats: PoolStats,
    failure: Mutex<Option<Error>>,
}

/// N worker threads ticking random (or shifted) targets until shut down
///
/// The first worker error stops the whole pool and is returned from
/// [`WorkerPool::shutdown`] or [`WorkerPool::join`].
pub struct WorkerPool {
    simulation: Arc<Simulation>,
    shared: Arc<Shared>,
    handles: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Start `config.workers` threads on `simulation`
    pub fn spawn(simulation: Arc<Simulation>) -> Result<Self> {
        let workers = simulation.config().workers;
        let mut pool = Self {
            simulation,
            shared: Arc::new(Shared::default()),
            handles: Vec::with_capacity(workers),
        };

        for index in 0..workers {
            let simulation = Arc::clone(&pool.simulation);
            let shared = Arc::clone(&pool.shared);
            let handle = thread::Builder::new()
                .name(format!("sandlang-worker-{index}"))
                .spawn(move || worker_loop(index, &simulation, &shared))
                .map_err(Error::Spawn)?;
            pool.handles.push(handle);
        }

        tracing::info!("Started {} workers", workers);
        Ok(pool)
    }

    pub fn simulation(&self) -> &Arc<Simulation> {
        &self.simulation
    }

    /// False once shutdown was requested or a worker failed
    pub fn is_running(&self) -> bool {
        !self.shared.shutdown.load(Ordering::Acquire)
    }

    pub fn stats(&self) -> StatsSnapshot {
        StatsSnapshot {
            ticks: self.shared.stats.ticks.load(Ordering::Relaxed),
            applied: self.shared.stats.applied.load(Ordering::Relaxed),
        }
    }

    /// Ask every worker to stop after its current tick
    pub fn stop(&self) {
        self.shared.shutdown.store(true, Ordering::Release);
    }

    /// Stop and wait for every worker; returns the final counters
    pub fn shutdown(mut self) -> Result<StatsSnapshot> {
        self.stop();
        self.join_workers()
    }

    /// Wait for the workers to stop on their own
    ///
    /// Only returns once something calls [`WorkerPool::stop`] from another
    /// thread or a worker fails.
    pub fn join(mut self) -> Result<StatsSnapshot> {
        self.join_workers()
    }

    fn join_workers(&mut self) -> Result<StatsSnapshot> {
        let mut panicked = None;
        for (index, handle) in self.handles.drain(..).enumerate() {
            if handle.join().is_err() {
                tracing::error!("Worker {} panicked", index);
                panicked.get_or_insert(index);
            }
        }

        let stats = self.stats();
        tracing::info!(
            "Workers stopped after {} ticks, {} rule applications",
            stats.ticks,
            stats.applied
        );

        if let Some(error) = self.shared.failure.lock().take() {
            return Err(error);
        }
        match panicked {
            Some(index) => Err(Error::WorkerPanicked(index)),
            None => Ok(stats),
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        if self.handles.is_empty() {
            return;
        }
        self.stop();
        for (index, handle) in self.handles.drain(..).enumerate() {
            if handle.join().is_err() {
                tracing::error!("Worker {} panicked", index);
            }
        }
    }
}

fn random_target<R: Rng + ?Sized>(size: IVec2, rng: &mut R) -> IVec2 {
    IVec2::new(rng.random_range(0..size.x), rng.random_range(0..size.y))
}

fn worker_loop(index: usize, simulation: &Simulation, shared: &Shared) {
    let config = simulation.config();
    let mut rng = stream_rng(config.seed, index as u64);
    let delay = config.update_delay();
    let size = simulation.size();
    let mut follow: Option<IVec2> = None;

    tracing::debug!("Worker {} running", index);

    while !shared.shutdown.load(Ordering::Acquire) {
        let target = match follow.take() {
            Some(position) if simulation.in_bounds(position) => position,
            _ => random_target(size, &mut rng),
        };

        match simulation.tick(target, &mut rng) {
            Ok(outcome) => {
                shared.stats.ticks.fetch_add(1, Ordering::Relaxed);
                shared
                    .stats
                    .applied
                    .fetch_add(outcome.applied as u64, Ordering::Relaxed);
                follow = outcome.shift.map(|shift| target + shift);
            }
            Err(e) => {
                tracing::error!("Worker {} stopped at {}: {}", index, target, e);
                shared.failure.lock().get_or_insert(e);
                shared.shutdown.store(true, Ordering::Release);
                break;
            }
        }

        if !delay.is_zero() {
            thread::sleep(delay);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SimConfig;
    use std::time::{Duration, Instant};

    fn wait_until(pool: &WorkerPool, ticks: u64) {
        let deadline = Instant::now() + Duration::from_secs(10);
        while pool.stats().ticks < ticks && pool.is_running() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn test_pool_runs_and_shuts_down() {
        let world = Arc::new(script::compile("atom Empty {\n}\n").unwrap());
        let config = SimConfig::default()
            .with_size(16, 16)
            .with_tile_size(4)
            .with_workers(3)
            .with_seed(1);
        let sim = Arc::new(Simulation::new(world, config).unwrap());
        let pool = WorkerPool::spawn(sim).unwrap();
        wait_until(&pool, 100);
        assert!(pool.is_running());
        assert!(pool.stats().ticks >= 100);
        assert!(pool.shutdown().is_ok());
    }

    #[test]
    fn test_drop_stops_and_joins_workers() {
        let world = Arc::new(script::compile("atom Empty {\n}\n").unwrap());
        let config = SimConfig::default().with_size(8, 8).with_workers(2).with_seed(2);
        let sim = Arc::new(Simulation::new(world, config).unwrap());
        let pool = WorkerPool::spawn(Arc::clone(&sim)).unwrap();
        wait_until(&pool, 10);
        drop(pool);
        // every worker released its handle on the simulation
        assert_eq!(Arc::strong_count(&sim), 1);
    }

    #[test]
    fn test_eval_error_stops_every_worker() {
        let world = Arc::new(
            script::compile(
                "atom Empty {\n section update {\n match (0, 0, 1, 1) {\n eval [missing] > 0\n }\n -> {\n }\n }\n}",
            )
            .unwrap(),
        );
        let config = SimConfig::default().with_size(8, 8).with_workers(2).with_seed(3);
        let sim = Arc::new(Simulation::new(world, config).unwrap());
        let pool = WorkerPool::spawn(sim).unwrap();
        match pool.join() {
            Err(Error::Eval(script::EvalError::MissingProperty { name, .. })) => {
                assert_eq!(name, "missing")
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
