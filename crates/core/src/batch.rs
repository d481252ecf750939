//! 批处理编排
//!
//! 固定大小的工作线程池从队列领取任务，每个线程同一时刻只处理一个
//! 任务、独占自己的文档。结果通过通道汇到调用线程——这是工作线程
//! 之间唯一的共享状态，没有任何进程级全局量。
//!
//! 调用线程按固定间隔轮询收齐的结果数并上报进度，不阻塞任何工作
//! 线程；全部任务上报后返回汇总。单个任务失败只影响它自己。

use crate::job::{Job, JobOutcome, JobResult};
use crossbeam_channel::{unbounded, RecvTimeoutError};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::PathBuf;
use std::time::Duration;

/// 默认的工作线程数：跟随宿主机可用并行度
pub fn default_worker_count() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// 工作线程数，至少为 1
    pub workers: usize,
    /// 进度轮询间隔
    pub poll_interval: Duration,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            workers: default_worker_count(),
            poll_interval: Duration::from_millis(100),
        }
    }
}

/// 一次批处理的最终汇总
#[derive(Debug)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: Vec<PathBuf>,
    pub results: Vec<JobResult>,
}

/// 执行整批任务
///
/// `run_job` 对一个任务做完整的打开/变换/保存；`on_progress` 在调用
/// 线程上以 `(已完成, 总数)` 回调，用于对外展示 "N of M"。
pub fn run_batch<F>(
    jobs: Vec<Job>,
    options: &BatchOptions,
    run_job: F,
    mut on_progress: impl FnMut(usize, usize),
) -> BatchSummary
where
    F: Fn(&Job) -> Result<(), String> + Sync,
{
    let total = jobs.len();
    let worker_count = options.workers.clamp(1, total.max(1));

    let (job_tx, job_rx) = unbounded::<Job>();
    for job in jobs {
        // unbounded 通道，发送不会失败
        let _ = job_tx.send(job);
    }
    drop(job_tx);

    let (result_tx, result_rx) = unbounded::<JobResult>();
    let run_job = &run_job;

    let results = std::thread::scope(|scope| {
        for worker in 0..worker_count {
            let job_rx = job_rx.clone();
            let result_tx = result_tx.clone();
            scope.spawn(move || {
                while let Ok(job) = job_rx.recv() {
                    let outcome = execute_one(run_job, &job);
                    if let JobOutcome::Failure(reason) = &outcome {
                        log::error!(
                            "[批处理] 线程 {} 处理 {} 失败: {}",
                            worker,
                            job.input_path.display(),
                            reason
                        );
                    }
                    let _ = result_tx.send(JobResult {
                        input_path: job.input_path,
                        outcome,
                    });
                }
            });
        }
        drop(result_tx);

        // 收集线程即调用线程：每个任务恰好追加一次结果
        let mut results = Vec::with_capacity(total);
        loop {
            match result_rx.recv_timeout(options.poll_interval) {
                Ok(result) => {
                    results.push(result);
                    on_progress(results.len(), total);
                }
                Err(RecvTimeoutError::Timeout) => on_progress(results.len(), total),
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }
        results
    });

    let succeeded = results.iter().filter(|r| r.is_success()).count();
    let failed = results
        .iter()
        .filter(|r| !r.is_success())
        .map(|r| r.input_path.clone())
        .collect();

    BatchSummary {
        total,
        succeeded,
        failed,
        results,
    }
}

/// 任务边界：Err 与 panic 都收敛为该任务的失败，不向外扩散
fn execute_one<F>(run_job: &F, job: &Job) -> JobOutcome
where
    F: Fn(&Job) -> Result<(), String> + Sync,
{
    match catch_unwind(AssertUnwindSafe(|| run_job(job))) {
        Ok(Ok(())) => JobOutcome::Success,
        Ok(Err(reason)) => JobOutcome::Failure(reason),
        Err(panic) => {
            let reason = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "worker panicked".to_string());
            JobOutcome::Failure(reason)
        }
    }
}
