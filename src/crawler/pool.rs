//! Bounded upload pool
//!
//! A producer (archive extraction) submits upload jobs through a channel whose
//! capacity equals the pool size; a dispatcher task starts each job once a
//! semaphore permit is free. A full channel blocks the producer, so memory
//! held by pending uploads stays bounded. A pool of size 1 uploads strictly
//! one file at a time.

use crate::{HoardError, Result};
use bytes::Bytes;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::{JoinHandle, JoinSet};

/// One file waiting to be uploaded
#[derive(Debug, Clone)]
pub struct UploadJob {
    pub key: String,
    pub body: Bytes,
}

/// Totals of a finished pool
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolReport {
    pub uploaded: usize,
    pub failed: usize,
    /// Highest number of uploads that ran at the same time
    pub peak_in_flight: usize,
}

pub struct UploadPool {
    sender: mpsc::Sender<UploadJob>,
    dispatcher: JoinHandle<PoolReport>,
}

impl UploadPool {
    /// Starts a pool running at most `size` uploads at once
    pub fn spawn<F, Fut>(size: usize, upload: F) -> Self
    where
        F: Fn(UploadJob) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let size = size.max(1);
        let (sender, receiver) = mpsc::channel(size);
        let dispatcher = tokio::spawn(dispatch(receiver, size, Arc::new(upload)));
        Self { sender, dispatcher }
    }

    /// Queues a job, waiting while the channel is full
    pub async fn submit(&self, job: UploadJob) -> Result<()> {
        tracing::debug!("Adding to uploading queue: {}", job.key);
        self.sender
            .send(job)
            .await
            .map_err(|e| HoardError::Worker(format!("upload pool closed before {}", e.0.key)))
    }

    /// Closes the queue and waits for every upload to finish
    pub async fn finish(self) -> Result<PoolReport> {
        drop(self.sender);
        self.dispatcher
            .await
            .map_err(|e| HoardError::Worker(e.to_string()))
    }
}

async fn dispatch<F, Fut>(
    mut receiver: mpsc::Receiver<UploadJob>,
    size: usize,
    upload: Arc<F>,
) -> PoolReport
where
    F: Fn(UploadJob) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<()>> + Send + 'static,
{
    let semaphore = Arc::new(Semaphore::new(size));
    let in_flight = Arc::new(AtomicUsize::new(0));
    let peak = Arc::new(AtomicUsize::new(0));
    let mut tasks = JoinSet::new();

    while let Some(job) = receiver.recv().await {
        let permit = match semaphore.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => break,
        };

        let upload = upload.clone();
        let in_flight = in_flight.clone();
        let peak = peak.clone();

        tasks.spawn(async move {
            let _permit = permit;
            let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            peak.fetch_max(now, Ordering::SeqCst);

            let key = job.key.clone();
            let result = upload(job).await;
            in_flight.fetch_sub(1, Ordering::SeqCst);

            if let Err(e) = &result {
                tracing::warn!("Failed to upload {}: {}", key, e);
            }
            result.is_ok()
        });
    }

    let mut report = PoolReport::default();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(true) => report.uploaded += 1,
            Ok(false) => report.failed += 1,
            Err(e) => {
                tracing::warn!("Upload task panicked: {}", e);
                report.failed += 1;
            }
        }
    }
    report.peak_in_flight = peak.load(Ordering::SeqCst);
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    fn job(key: &str) -> UploadJob {
        UploadJob {
            key: key.to_string(),
            body: Bytes::from_static(b"data"),
        }
    }

    #[tokio::test]
    async fn test_pool_never_exceeds_size() {
        for size in [1, 3] {
            let pool = UploadPool::spawn(size, |_job| async {
                tokio::time::sleep(Duration::from_millis(5)).await;
                Ok(())
            });

            for i in 0..12 {
                pool.submit(job(&format!("booth/1/2/a.zip/{}.png", i)))
                    .await
                    .unwrap();
            }

            let report = pool.finish().await.unwrap();
            assert_eq!(report.uploaded, 12);
            assert!(report.peak_in_flight <= size);
        }
    }

    #[tokio::test]
    async fn test_size_one_preserves_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let recorder = seen.clone();
        let pool = UploadPool::spawn(1, move |job| {
            let recorder = recorder.clone();
            async move {
                recorder.lock().unwrap().push(job.key);
                Ok(())
            }
        });

        for key in ["a", "b", "c"] {
            pool.submit(job(key)).await.unwrap();
        }
        pool.finish().await.unwrap();

        assert_eq!(*seen.lock().unwrap(), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_failures_are_counted() {
        let pool = UploadPool::spawn(2, |job| async move {
            if job.key.ends_with("bad") {
                Err(HoardError::Worker("boom".to_string()))
            } else {
                Ok(())
            }
        });

        pool.submit(job("good")).await.unwrap();
        pool.submit(job("bad")).await.unwrap();

        let report = pool.finish().await.unwrap();
        assert_eq!(report.uploaded, 1);
        assert_eq!(report.failed, 1);
    }
}
