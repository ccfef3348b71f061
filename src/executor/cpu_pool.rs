use super::qos::Qos;
use super::specific::QueueKey;
use super::task::Task;
use super::worker::{QueueStats, Worker};
use crate::config::Config;
use crate::error::{Error, Result};
use crossbeam_channel::{unbounded, Sender};
use std::sync::Arc;
use std::thread::JoinHandle;

/// A concurrent platform queue: a fixed set of threads pulling from one
/// shared FIFO. No ordering holds between submissions once more than one
/// thread is running.
pub(crate) struct CpuPool {
    worker: Worker,
    tx: Sender<Task>,
    threads: Vec<JoinHandle<()>>,
}

impl CpuPool {
    pub fn new(qos: Qos, key: Option<QueueKey>, config: &Config) -> Result<Self> {
        Self::with_threads(qos, key, config.pool_threads(qos), config)
    }

    pub fn with_threads(
        qos: Qos,
        key: Option<QueueKey>,
        num_threads: usize,
        config: &Config,
    ) -> Result<Self> {
        if num_threads == 0 {
            return Err(Error::config("need at least 1 thread"));
        }

        let label = format!("global-{}", qos);
        let worker = Worker::new(Arc::from(label.as_str()), qos, key, config);
        let (tx, rx) = unbounded();

        let mut threads = Vec::with_capacity(num_threads);
        for id in 0..num_threads {
            let name = format!("{}-{}-{}", config.thread_name_prefix, qos, id);
            threads.push(worker.spawn(name, rx.clone(), config)?);
        }

        tracing::debug!(pool = %label, threads = num_threads, "concurrent pool started");

        Ok(Self {
            worker,
            tx,
            threads,
        })
    }

    pub fn submit(&self, task: Task) {
        self.worker.counters.record_submit();
        let _ = self.tx.send(task);
    }

    pub fn num_threads(&self) -> usize {
        self.threads.len()
    }

    pub fn label(&self) -> &str {
        &self.worker.label
    }

    pub fn qos(&self) -> Qos {
        self.worker.qos
    }

    pub fn key(&self) -> Option<QueueKey> {
        self.worker.key
    }

    pub fn stats(&self) -> QueueStats {
        self.worker.counters.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;
    use std::time::Duration;

    #[test]
    fn test_rejects_empty_pool() {
        let result = CpuPool::with_threads(Qos::Default, None, 0, &Config::default());
        assert!(result.is_err());
    }

    #[test]
    fn test_pool_runs_all_work() {
        let pool = CpuPool::with_threads(Qos::Default, None, 4, &Config::default()).unwrap();
        let counter = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = unbounded();

        for _ in 0..1000 {
            let counter = counter.clone();
            let tx = tx.clone();
            pool.submit(Task::new(move || {
                counter.fetch_add(1, Ordering::Relaxed);
                tx.send(()).unwrap();
            }));
        }

        for _ in 0..1000 {
            rx.recv_timeout(Duration::from_secs(5)).unwrap();
        }
        assert_eq!(counter.load(Ordering::Relaxed), 1000);
        assert_eq!(pool.num_threads(), 4);
    }

    #[test]
    fn test_pool_runs_work_in_parallel() {
        let pool = CpuPool::with_threads(Qos::Default, None, 3, &Config::default()).unwrap();
        let barrier = Arc::new(Barrier::new(3));
        let (tx, rx) = unbounded();

        // Only completes if all three run at the same time.
        for _ in 0..3 {
            let barrier = barrier.clone();
            let tx = tx.clone();
            pool.submit(Task::new(move || {
                barrier.wait();
                tx.send(()).unwrap();
            }));
        }

        for _ in 0..3 {
            rx.recv_timeout(Duration::from_secs(5)).unwrap();
        }
    }

    #[test]
    fn test_thread_names_carry_tier() {
        let pool = CpuPool::with_threads(Qos::Utility, None, 1, &Config::default()).unwrap();
        let (tx, rx) = unbounded();

        pool.submit(Task::new(move || {
            tx.send(std::thread::current().name().map(str::to_owned))
                .unwrap();
        }));

        let name = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(name.as_deref(), Some("strand-utility-0"));
    }
}
