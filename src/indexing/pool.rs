//! Worker pool for parallel symbol extraction
//!
//! N threads consume file jobs from a bounded channel, read the bytes
//! (through the file cache when one is attached), run the extractor, and
//! publish exactly one result or error per job on separate bounded
//! streams. Shutdown is idempotent; cancellation stops dispatch and lets
//! workers exit with jobs still queued, without interrupting in-flight
//! extractions.

use crate::error::{IndexError, IndexResult};
use crate::indexing::{optimal_pool_size, sha256_hex};
use crate::parsing::{ExtractedFile, SymbolExtractor};
use crate::storage::FileCache;
use crossbeam_channel::{Receiver, Sender, bounded, select};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::JoinHandle;

/// A unit of extraction work. `job_id` preserves submission order for
/// callers that need to reassemble results.
#[derive(Debug, Clone)]
pub struct FileJob {
    pub job_id: u64,
    pub path: PathBuf,
}

/// Successful extraction of one file.
#[derive(Debug)]
pub struct FileResult {
    pub job_id: u64,
    pub path: PathBuf,
    pub extracted: ExtractedFile,
    /// SHA-256 hex digest of the bytes the worker read
    pub content_hash: String,
}

/// Failed read or extraction of one file.
#[derive(Debug)]
pub struct FileError {
    pub path: PathBuf,
    pub error: IndexError,
}

/// Counter snapshot. `jobs_submitted >= jobs_processed + jobs_failed`
/// holds at all times; the difference is in-flight work.
#[derive(Debug, Clone, Copy, Default)]
pub struct WorkerPoolStats {
    pub workers: usize,
    pub jobs_submitted: u64,
    pub jobs_processed: u64,
    pub jobs_failed: u64,
}

/// Counters shared between the pool handle and its worker threads.
#[derive(Default)]
struct PoolCounters {
    jobs_processed: AtomicU64,
    jobs_failed: AtomicU64,
}

pub struct WorkerPool {
    workers: usize,
    extractor: Arc<dyn SymbolExtractor>,
    file_cache: Option<Arc<FileCache>>,
    counters: Arc<PoolCounters>,

    jobs_tx: Mutex<Option<Sender<FileJob>>>,
    jobs_rx: Receiver<FileJob>,
    results_tx: Mutex<Option<Sender<FileResult>>>,
    results_rx: Receiver<FileResult>,
    errors_tx: Mutex<Option<Sender<FileError>>>,
    errors_rx: Receiver<FileError>,
    cancel_tx: Mutex<Option<Sender<()>>>,
    cancel_rx: Receiver<()>,

    handles: Mutex<Vec<JoinHandle<()>>>,
    started: AtomicBool,
    stopped: AtomicBool,
    jobs_closed: AtomicBool,
    cancelled: AtomicBool,

    next_job_id: AtomicU64,
    jobs_submitted: AtomicU64,
}

impl WorkerPool {
    /// Create a pool with `num_workers` threads (0 = auto-detect via
    /// [`optimal_pool_size`]). Jobs buffer at 2N, results and errors at N.
    pub fn new(num_workers: usize, extractor: Arc<dyn SymbolExtractor>) -> Self {
        let workers = if num_workers == 0 {
            optimal_pool_size()
        } else {
            num_workers
        };

        let (jobs_tx, jobs_rx) = bounded(workers * 2);
        let (results_tx, results_rx) = bounded(workers);
        let (errors_tx, errors_rx) = bounded(workers);
        let (cancel_tx, cancel_rx) = bounded(1);

        Self {
            workers,
            extractor,
            file_cache: None,
            counters: Arc::new(PoolCounters::default()),
            jobs_tx: Mutex::new(Some(jobs_tx)),
            jobs_rx,
            results_tx: Mutex::new(Some(results_tx)),
            results_rx,
            errors_tx: Mutex::new(Some(errors_tx)),
            errors_rx,
            cancel_tx: Mutex::new(Some(cancel_tx)),
            cancel_rx,
            handles: Mutex::new(Vec::new()),
            started: AtomicBool::new(false),
            stopped: AtomicBool::new(false),
            jobs_closed: AtomicBool::new(false),
            cancelled: AtomicBool::new(false),
            next_job_id: AtomicU64::new(0),
            jobs_submitted: AtomicU64::new(0),
        }
    }

    /// Route worker reads through a file cache instead of plain `fs::read`.
    /// Must be called before [`start`](Self::start).
    pub fn with_file_cache(mut self, cache: Arc<FileCache>) -> Self {
        self.file_cache = Some(cache);
        self
    }

    /// Spawn the worker threads. Idempotent; a second call logs and returns.
    pub fn start(&self) {
        if self
            .started
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            tracing::debug!("worker pool already started");
            return;
        }

        // Workers hold the only result/error senders once spawned, so both
        // streams disconnect exactly when the last worker exits.
        let results_tx = self.results_tx.lock().take();
        let errors_tx = self.errors_tx.lock().take();
        let (Some(results_tx), Some(errors_tx)) = (results_tx, errors_tx) else {
            return;
        };

        let mut handles = self.handles.lock();
        for worker_id in 0..self.workers {
            let extractor = Arc::clone(&self.extractor);
            let file_cache = self.file_cache.clone();
            let counters = Arc::clone(&self.counters);
            let jobs = self.jobs_rx.clone();
            let cancel = self.cancel_rx.clone();
            let results = results_tx.clone();
            let errors = errors_tx.clone();

            handles.push(std::thread::spawn(move || {
                worker_loop(
                    worker_id, extractor, file_cache, counters, jobs, cancel, results, errors,
                );
            }));
        }
        tracing::debug!(workers = self.workers, "worker pool started");
    }

    /// Submit a file for extraction. Blocks while the jobs buffer is full;
    /// returns promptly with `PoolCancelled` if the pool is cancelled while
    /// waiting.
    pub fn submit(&self, path: PathBuf) -> IndexResult<u64> {
        if self.stopped.load(Ordering::Acquire) || self.jobs_closed.load(Ordering::Acquire) {
            return Err(IndexError::PoolStopped);
        }
        if self.cancelled.load(Ordering::Acquire) {
            return Err(IndexError::PoolCancelled);
        }

        let sender = self.jobs_tx.lock().clone();
        let Some(sender) = sender else {
            return Err(IndexError::PoolStopped);
        };

        let job = FileJob {
            job_id: self.next_job_id.fetch_add(1, Ordering::Relaxed),
            path,
        };
        let job_id = job.job_id;

        // Count before publishing so `submitted >= processed + failed`
        // holds even against a worker that finishes instantly.
        self.jobs_submitted.fetch_add(1, Ordering::Relaxed);

        let cancel = &self.cancel_rx;
        select! {
            send(sender, job) -> res => {
                if res.is_err() {
                    self.jobs_submitted.fetch_sub(1, Ordering::Relaxed);
                    return Err(IndexError::PoolStopped);
                }
            }
            recv(cancel) -> _ => {
                self.jobs_submitted.fetch_sub(1, Ordering::Relaxed);
                return Err(IndexError::PoolCancelled);
            }
        }

        Ok(job_id)
    }

    /// Close the jobs channel so workers drain and exit. Exactly-once via
    /// compare-and-set; safe from any thread.
    pub fn finish_submitting(&self) {
        if self
            .jobs_closed
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            self.jobs_tx.lock().take();
        }
    }

    /// Stop dispatch immediately. Queued jobs are abandoned; in-flight
    /// extractions run to completion.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
        self.cancel_tx.lock().take();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Shut the pool down: close jobs if still open, wait for every worker
    /// to return (results and errors disconnect as they do), then release
    /// the cancellation token. Idempotent.
    pub fn stop(&self) {
        if self
            .stopped
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }

        self.finish_submitting();

        let handles: Vec<_> = self.handles.lock().drain(..).collect();
        for handle in handles {
            let _ = handle.join();
        }

        self.cancel_tx.lock().take();
        tracing::debug!("worker pool stopped");
    }

    /// Receiver for successful extractions. Disconnects once all workers
    /// have exited.
    pub fn results(&self) -> Receiver<FileResult> {
        self.results_rx.clone()
    }

    /// Receiver for per-file failures. Disconnects once all workers have
    /// exited.
    pub fn errors(&self) -> Receiver<FileError> {
        self.errors_rx.clone()
    }

    pub fn workers(&self) -> usize {
        self.workers
    }

    pub fn stats(&self) -> WorkerPoolStats {
        WorkerPoolStats {
            workers: self.workers,
            jobs_submitted: self.jobs_submitted.load(Ordering::Relaxed),
            jobs_processed: self.counters.jobs_processed.load(Ordering::Relaxed),
            jobs_failed: self.counters.jobs_failed.load(Ordering::Relaxed),
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn worker_loop(
    worker_id: usize,
    extractor: Arc<dyn SymbolExtractor>,
    file_cache: Option<Arc<FileCache>>,
    counters: Arc<PoolCounters>,
    jobs: Receiver<FileJob>,
    cancel: Receiver<()>,
    results: Sender<FileResult>,
    errors: Sender<FileError>,
) {
    loop {
        select! {
            // The cancel channel never carries messages; a recv fires only
            // when the sender is dropped.
            recv(cancel) -> _ => {
                tracing::debug!(worker_id, "worker exiting on cancellation");
                return;
            }
            recv(jobs) -> msg => {
                let job = match msg {
                    Ok(job) => job,
                    Err(_) => return, // jobs channel closed and drained
                };
                if !process_job(job, &*extractor, file_cache.as_deref(), &counters, &results, &errors) {
                    return; // downstream gone
                }
            }
        }
    }
}

/// Run one job, publishing exactly one result or error. Returns false when
/// the downstream receiver disappeared and the worker should exit.
fn process_job(
    job: FileJob,
    extractor: &dyn SymbolExtractor,
    file_cache: Option<&FileCache>,
    counters: &PoolCounters,
    results: &Sender<FileResult>,
    errors: &Sender<FileError>,
) -> bool {
    let bytes = match read_bytes(&job.path, file_cache) {
        Ok(bytes) => bytes,
        Err(error) => {
            counters.jobs_failed.fetch_add(1, Ordering::Relaxed);
            return errors
                .send(FileError {
                    path: job.path,
                    error,
                })
                .is_ok();
        }
    };

    match extractor.extract(&job.path, &bytes) {
        Ok(extracted) => {
            counters.jobs_processed.fetch_add(1, Ordering::Relaxed);
            let content_hash = sha256_hex(&bytes);
            results
                .send(FileResult {
                    job_id: job.job_id,
                    path: job.path,
                    extracted,
                    content_hash,
                })
                .is_ok()
        }
        Err(err) => {
            counters.jobs_failed.fetch_add(1, Ordering::Relaxed);
            let error = IndexError::ExtractionFailed {
                path: job.path.clone(),
                reason: err.to_string(),
            };
            errors
                .send(FileError {
                    path: job.path,
                    error,
                })
                .is_ok()
        }
    }
}

fn read_bytes(path: &Path, file_cache: Option<&FileCache>) -> IndexResult<Vec<u8>> {
    match file_cache {
        Some(cache) => Ok(cache.get(path)?.data().to_vec()),
        None => std::fs::read(path).map_err(|e| IndexError::FileRead {
            path: path.to_path_buf(),
            source: e,
        }),
    }
}
