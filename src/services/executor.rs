//! 分析执行器
//!
//! 点击追踪与后台 AI 分析共用的有界 worker 池，与请求线程隔离，
//! 积压不会阻塞重定向。队列满时丢弃最旧的任务并记 WARN
//! （点击是尽力而为的）。

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio::sync::{Mutex, Notify};
use tracing::{debug, warn};

type Job = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

pub struct AnalyticsExecutor {
    queue: Arc<Mutex<VecDeque<Job>>>,
    notify: Arc<Notify>,
    capacity: usize,
}

impl AnalyticsExecutor {
    /// 创建执行器并启动 worker 任务
    pub fn start(workers: usize, capacity: usize) -> Arc<Self> {
        let executor = Arc::new(Self {
            queue: Arc::new(Mutex::new(VecDeque::new())),
            notify: Arc::new(Notify::new()),
            capacity: capacity.max(1),
        });

        for _ in 0..workers.max(1) {
            let queue = Arc::clone(&executor.queue);
            let notify = Arc::clone(&executor.notify);
            tokio::spawn(async move {
                loop {
                    let job = queue.lock().await.pop_front();
                    match job {
                        Some(job) => job.await,
                        None => notify.notified().await,
                    }
                }
            });
        }

        debug!(
            "AnalyticsExecutor started: {} workers, queue capacity {}",
            workers.max(1),
            capacity.max(1)
        );
        executor
    }

    /// 提交任务；队列满时丢弃最旧的一个
    pub async fn submit<F>(&self, job: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        {
            let mut queue = self.queue.lock().await;
            if queue.len() >= self.capacity {
                queue.pop_front();
                warn!(
                    "Analytics queue saturated ({}), dropping oldest job",
                    self.capacity
                );
            }
            queue.push_back(Box::pin(job));
        }
        self.notify.notify_one();
    }

    /// 当前积压任务数（监控用）
    pub async fn backlog(&self) -> usize {
        self.queue.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_jobs_run() {
        let executor = AnalyticsExecutor::start(2, 16);
        let counter = Arc::new(AtomicUsize::new(0));

        for _ in 0..8 {
            let c = Arc::clone(&counter);
            executor
                .submit(async move {
                    c.fetch_add(1, Ordering::SeqCst);
                })
                .await;
        }

        // 等待 worker 消化
        for _ in 0..50 {
            if counter.load(Ordering::SeqCst) == 8 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(counter.load(Ordering::SeqCst), 8);
    }

    #[tokio::test]
    async fn test_saturation_drops_oldest() {
        // 不启 worker 消化不了队列，直接构造后提交观察容量
        let executor = Arc::new(AnalyticsExecutor {
            queue: Arc::new(Mutex::new(VecDeque::new())),
            notify: Arc::new(Notify::new()),
            capacity: 2,
        });

        let ran = Arc::new(Mutex::new(Vec::new()));
        for i in 0..4 {
            let ran = Arc::clone(&ran);
            executor
                .submit(async move {
                    ran.lock().await.push(i);
                })
                .await;
        }

        assert_eq!(executor.backlog().await, 2);

        // 手动执行剩余任务，应只剩最新的两个
        let jobs: Vec<Job> = executor.queue.lock().await.drain(..).collect();
        for job in jobs {
            job.await;
        }
        assert_eq!(*ran.lock().await, vec![2, 3]);
    }
}
