//! Background erosion worker.
//!
//! The host hands over a keyed heightmap plus configuration and gets back
//! either the eroded heightmap or an error message. Work happens on a
//! dedicated thread so an expensive run never blocks the caller; each worker
//! runs one request at a time, strictly request/response, with no progress
//! messages and no cancellation.

use std::any::Any;
use std::marker::PhantomData;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

use crate::erosion::{ErosionConfig, ErosionError, HydraulicErosion, DEFAULT_ITERATIONS};
use crate::heightmap::{self, GridMap};

/// Message sent to the worker.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErosionRequest {
    pub grid: GridMap,
    pub grid_size: usize,
    /// Partial config; omitted keys fall back to defaults
    #[serde(default)]
    pub config: Option<ErosionConfig>,
    /// Droplet count (defaults to [`DEFAULT_ITERATIONS`])
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iterations: Option<usize>,
    /// Seed for reproducible runs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl ErosionRequest {
    pub fn new(grid: GridMap, grid_size: usize) -> Self {
        Self {
            grid,
            grid_size,
            config: None,
            iterations: None,
            seed: None,
        }
    }

    /// Build the driver this request describes.
    pub fn erosion(&self) -> HydraulicErosion {
        let config = self.config.clone().unwrap_or_default();
        let erosion = HydraulicErosion::new(self.grid_size, config)
            .with_iterations(self.iterations.unwrap_or(DEFAULT_ITERATIONS));
        match self.seed {
            Some(seed) => erosion.with_seed(seed),
            None => erosion,
        }
    }
}

/// Reply from the worker, tagged by `status`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum ErosionResponse {
    Success { grid: GridMap },
    Error { error: String },
}

impl ErosionResponse {
    pub fn is_success(&self) -> bool {
        matches!(self, ErosionResponse::Success { .. })
    }
}

/// Run one request to completion on the current thread.
///
/// Every failure, including a panic inside the simulation, becomes an
/// [`ErosionResponse::Error`].
pub fn handle_request(request: ErosionRequest) -> ErosionResponse {
    match panic::catch_unwind(AssertUnwindSafe(|| run_request(request))) {
        Ok(Ok(grid)) => ErosionResponse::Success { grid },
        Ok(Err(e)) => {
            log::warn!("erosion request failed: {}", e);
            ErosionResponse::Error { error: e.to_string() }
        }
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            log::warn!("erosion worker panicked: {}", message);
            ErosionResponse::Error {
                error: format!("erosion panicked: {}", message),
            }
        }
    }
}

fn run_request(mut request: ErosionRequest) -> Result<GridMap, ErosionError> {
    let started = Instant::now();
    let erosion = request.erosion();

    // Work on a private copy; the request grid is only written after success
    let mut heightmap = heightmap::from_grid_map(&request.grid, request.grid_size)?;
    let stats = erosion.apply(&mut heightmap)?;
    heightmap::write_grid_map(&heightmap, &mut request.grid);

    log::info!(
        "eroded {}x{} grid with {} droplets in {:?} (eroded {:.2}, deposited {:.2})",
        request.grid_size,
        request.grid_size,
        stats.iterations,
        started.elapsed(),
        stats.total_eroded,
        stats.total_deposited
    );

    Ok(request.grid)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

type Job = (ErosionRequest, oneshot::Sender<ErosionResponse>);

/// A background thread that serves erosion requests.
pub struct ErosionWorker {
    jobs: mpsc::Sender<Job>,
    handle: JoinHandle<()>,
}

impl ErosionWorker {
    pub fn spawn() -> Result<Self, WorkerError> {
        let (jobs, queue) = mpsc::channel::<Job>();
        let handle = thread::Builder::new()
            .name("erosion-worker".to_string())
            .spawn(move || worker_loop(queue))
            .map_err(WorkerError::Spawn)?;
        Ok(Self { jobs, handle })
    }

    /// Hand a request to the worker.
    ///
    /// The returned [`PendingReply`] borrows the worker mutably, so a second
    /// request cannot be submitted until the first reply is collected or dropped.
    pub fn submit(&mut self, request: ErosionRequest) -> Result<PendingReply<'_>, WorkerError> {
        let (reply, receiver) = oneshot::channel();
        self.jobs
            .send((request, reply))
            .map_err(|_| WorkerError::Disconnected)?;
        Ok(PendingReply {
            receiver,
            _worker: PhantomData,
        })
    }

    /// Submit and block until the reply arrives.
    pub fn run_blocking(&mut self, request: ErosionRequest) -> Result<ErosionResponse, WorkerError> {
        self.submit(request)?.wait()
    }

    /// Submit and await the reply without blocking the async runtime.
    pub async fn run(&mut self, request: ErosionRequest) -> Result<ErosionResponse, WorkerError> {
        self.submit(request)?.recv().await
    }

    /// Abandon the worker. Any run in progress finishes in the background and
    /// its result is discarded.
    pub fn terminate(self) {
        log::debug!("terminating erosion worker");
        drop(self.jobs);
        // Detach: the thread exits once its current job (if any) completes
        drop(self.handle);
    }

    /// Close the queue and wait for the thread to exit.
    pub fn shutdown(self) -> Result<(), WorkerError> {
        drop(self.jobs);
        self.handle.join().map_err(|_| WorkerError::Panicked)
    }
}

fn worker_loop(queue: mpsc::Receiver<Job>) {
    log::debug!("erosion worker started");
    while let Ok((request, reply)) = queue.recv() {
        let response = handle_request(request);
        if reply.send(response).is_err() {
            log::debug!("erosion reply dropped: caller went away");
        }
    }
    log::debug!("erosion worker stopped");
}

/// A reply the worker has not delivered yet.
pub struct PendingReply<'a> {
    receiver: oneshot::Receiver<ErosionResponse>,
    _worker: PhantomData<&'a mut ErosionWorker>,
}

impl PendingReply<'_> {
    /// Block the current thread until the reply arrives.
    ///
    /// Must not be called from inside an async runtime; use [`recv`](Self::recv) there.
    pub fn wait(self) -> Result<ErosionResponse, WorkerError> {
        self.receiver.blocking_recv().map_err(|_| WorkerError::Disconnected)
    }

    pub async fn recv(self) -> Result<ErosionResponse, WorkerError> {
        self.receiver.await.map_err(|_| WorkerError::Disconnected)
    }
}

/// Failures of the worker itself, as opposed to a failed erosion run.
#[derive(Debug)]
pub enum WorkerError {
    /// Could not start the background thread
    Spawn(std::io::Error),
    /// Worker thread is gone; no reply will arrive
    Disconnected,
    /// Worker thread panicked outside a request
    Panicked,
}

impl std::fmt::Display for WorkerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkerError::Spawn(e) => write!(f, "Failed to spawn erosion worker: {}", e),
            WorkerError::Disconnected => write!(f, "Erosion worker disconnected"),
            WorkerError::Panicked => write!(f, "Erosion worker thread panicked"),
        }
    }
}

impl std::error::Error for WorkerError {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tilemap::Tilemap;

    fn sloped_request(size: usize) -> ErosionRequest {
        let map = Tilemap::from_fn(size, size, |x, _| 10.0 - x as f32);
        ErosionRequest {
            iterations: Some(200),
            seed: Some(9),
            ..ErosionRequest::new(heightmap::to_grid_map(&map), size)
        }
    }

    #[test]
    fn test_request_wire_format() {
        let json = r#"{
            "grid": {"0,0": 1.0, "1,0": 1.0, "0,1": 1.0, "1,1": 1.0},
            "gridSize": 2,
            "config": {"inertia": 0.2, "unknown": true}
        }"#;
        let request: ErosionRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.grid_size, 2);
        assert_eq!(request.grid.len(), 4);
        assert_eq!(request.config.as_ref().unwrap().inertia, 0.2);
        assert_eq!(request.iterations, None);

        let erosion = request.erosion();
        assert_eq!(erosion.config().erosion_radius, 3);
        assert_eq!(erosion.iterations(), DEFAULT_ITERATIONS);
    }

    #[test]
    fn test_missing_and_empty_config_agree() {
        let absent: ErosionRequest = serde_json::from_str(r#"{"grid": {}, "gridSize": 1}"#).unwrap();
        let empty: ErosionRequest =
            serde_json::from_str(r#"{"grid": {}, "gridSize": 1, "config": {}}"#).unwrap();
        let null: ErosionRequest =
            serde_json::from_str(r#"{"grid": {}, "gridSize": 1, "config": null}"#).unwrap();

        for request in [&absent, &empty, &null] {
            let erosion = request.erosion();
            assert_eq!(erosion.config(), &ErosionConfig::default());
            assert_eq!(erosion.iterations(), DEFAULT_ITERATIONS);
        }
    }

    #[test]
    fn test_response_wire_format() {
        let mut grid = GridMap::new();
        grid.insert("0,0".to_string(), 2.5);
        let ok = serde_json::to_value(ErosionResponse::Success { grid }).unwrap();
        assert_eq!(ok["status"], "success");
        assert_eq!(ok["grid"]["0,0"], 2.5);

        let err = serde_json::to_value(ErosionResponse::Error {
            error: "boom".to_string(),
        })
        .unwrap();
        assert_eq!(err, serde_json::json!({"status": "error", "error": "boom"}));
    }

    #[test]
    fn test_handle_request_success() {
        let request = sloped_request(8);
        let original = request.grid.clone();

        let response = handle_request(request);
        let ErosionResponse::Success { grid } = response else {
            panic!("expected success, got {:?}", response);
        };
        assert_eq!(grid.len(), original.len());
        assert_ne!(grid, original);
        assert!(grid.values().all(|h| h.is_finite()));
    }

    #[test]
    fn test_oversized_radius_is_error_reply() {
        for radius in [46_341u64, 1 << 32] {
            let mut request = sloped_request(5);
            request.config = Some(
                serde_json::from_value(serde_json::json!({ "erosionRadius": radius })).unwrap(),
            );
            match handle_request(request) {
                ErosionResponse::Error { error } => {
                    assert!(error.contains("erosionRadius"), "unexpected message: {}", error);
                }
                other => panic!("expected error, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_missing_cell_is_error_reply() {
        let mut request = sloped_request(5);
        request.grid.remove("3,4");

        match handle_request(request) {
            ErosionResponse::Error { error } => {
                assert!(error.contains("3,4"), "unhelpful message: {}", error);
            }
            other => panic!("expected error, got {:?}", other),
        }
    }

    #[test]
    fn test_invalid_config_is_error_reply() {
        let mut request = sloped_request(5);
        request.config = Some(ErosionConfig {
            deposit_speed: 2.0,
            ..Default::default()
        });
        assert!(!handle_request(request).is_success());
    }

    #[test]
    fn test_flat_scenario_unchanged() {
        let map = heightmap::flat(3, 1.0);
        let request = ErosionRequest {
            iterations: Some(1),
            seed: Some(0),
            ..ErosionRequest::new(heightmap::to_grid_map(&map), 3)
        };
        let original = request.grid.clone();
        assert_eq!(handle_request(request), ErosionResponse::Success { grid: original });
    }

    #[test]
    fn test_worker_serves_consecutive_requests() {
        let mut worker = ErosionWorker::spawn().unwrap();

        let first = worker.run_blocking(sloped_request(8)).unwrap();
        let second = worker.run_blocking(sloped_request(8)).unwrap();
        assert!(first.is_success());
        assert_eq!(first, second, "seeded runs should be identical");

        let mut broken = sloped_request(4);
        broken.grid_size = 5;
        assert!(!worker.run_blocking(broken).unwrap().is_success());

        // Still alive after an error reply
        assert!(worker.run_blocking(sloped_request(6)).unwrap().is_success());
        worker.shutdown().unwrap();
    }

    #[test]
    fn test_dropped_reply_does_not_kill_worker() {
        let mut worker = ErosionWorker::spawn().unwrap();
        drop(worker.submit(sloped_request(8)).unwrap());
        assert!(worker.run_blocking(sloped_request(6)).unwrap().is_success());
        worker.terminate();
    }

    #[tokio::test]
    async fn test_worker_async_reply() {
        let mut worker = ErosionWorker::spawn().unwrap();
        let response = worker.run(sloped_request(8)).await.unwrap();
        assert!(response.is_success());
        worker.terminate();
    }

    #[test]
    fn test_panic_message_extraction() {
        let payload = panic::catch_unwind(|| panic!("kaboom {}", 3)).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "kaboom 3");
        let payload = panic::catch_unwind(|| panic!("static")).unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "static");
    }
}
