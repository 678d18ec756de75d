use crossbeam_channel::unbounded;
use rayon::{ThreadPool, ThreadPoolBuildError, ThreadPoolBuilder};

use crate::job::{JobSpec, WorkResult};

/// A fixed number of worker threads draining a shared job queue.
pub struct WorkerPool {
    pool: ThreadPool,
}

impl WorkerPool {
    pub fn new(workers: usize) -> Result<Self, ThreadPoolBuildError> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(workers.max(1))
            .thread_name(|index| format!("worker-{index}"))
            .build()?;
        Ok(WorkerPool { pool })
    }

    pub fn workers(&self) -> usize {
        self.pool.current_num_threads()
    }

    /// Runs `work` once for every job on the pool and hands each result to
    /// `on_result` on the calling thread, in completion order.
    ///
    /// Returns once every job has produced a result. A failed job does not
    /// stop the others.
    pub fn run<W, R>(&self, jobs: Vec<JobSpec>, work: W, mut on_result: R)
    where
        W: Fn(JobSpec) -> WorkResult + Sync,
        R: FnMut(WorkResult),
    {
        let (result_tx, result_rx) = unbounded();
        let work = &work;

        self.pool.in_place_scope(|scope| {
            for job in jobs {
                let result_tx = result_tx.clone();
                scope.spawn(move |_| {
                    let _ = result_tx.send(work(job));
                });
            }
            // results stop arriving once the last worker drops its sender
            drop(result_tx);
            for result in result_rx.iter() {
                on_result(result);
            }
        });
    }
}
