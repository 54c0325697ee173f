//! Terrain geometry built on worker threads.
//!
//! The render thread snapshots what a build needs into a [`GeometryTask`], submits it, and
//! each frame drains finished [`GeometryResult`]s. Workers never touch tiles, so a tile's
//! geometry only changes when the render thread swaps in a finished result.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread::JoinHandle;

use orbis_geom::{Ellipsoid, Sector};

use crate::elevation::ElevationModel;
use crate::geometry::{TerrainGeometry, build_geometry};
use crate::tile::TileKey;

/// Everything needed to build one tile's geometry off the render thread.
pub struct GeometryTask {
    pub key: TileKey,
    pub sector: Sector,
    pub num_lat_cells: u32,
    pub num_lon_cells: u32,
    pub ellipsoid: Ellipsoid,
    pub elevation_model: Arc<dyn ElevationModel>,
    pub vertical_exaggeration: f64,
}

/// A finished build.
pub struct GeometryResult {
    pub key: TileKey,
    pub geometry: TerrainGeometry,
}

/// Worker pool for terrain geometry.
pub struct GeometryPipeline {
    task_sender: Option<crossbeam_channel::Sender<GeometryTask>>,
    result_receiver: crossbeam_channel::Receiver<GeometryResult>,
    worker_handles: Vec<JoinHandle<()>>,
    /// Maximum number of tasks in flight.
    budget: usize,
    in_flight: Arc<AtomicUsize>,
}

impl GeometryPipeline {
    /// Spawn `worker_count` workers (at least one) accepting up to `budget` queued tasks.
    pub fn new(worker_count: usize, budget: usize) -> Self {
        let budget = budget.max(1);
        let (task_tx, task_rx) = crossbeam_channel::bounded::<GeometryTask>(budget);
        let (result_tx, result_rx) = crossbeam_channel::unbounded();
        let in_flight = Arc::new(AtomicUsize::new(0));

        let worker_count = worker_count.max(1);
        let mut handles = Vec::with_capacity(worker_count);
        for _ in 0..worker_count {
            let rx = task_rx.clone();
            let tx = result_tx.clone();
            let flight = Arc::clone(&in_flight);

            handles.push(std::thread::spawn(move || {
                while let Ok(task) = rx.recv() {
                    let geometry = build_geometry(
                        &task.sector,
                        task.num_lat_cells,
                        task.num_lon_cells,
                        &task.ellipsoid,
                        task.elevation_model.as_ref(),
                        task.vertical_exaggeration,
                    );
                    let _ = tx.send(GeometryResult {
                        key: task.key,
                        geometry,
                    });
                    flight.fetch_sub(1, Ordering::Relaxed);
                }
            }));
        }
        log::debug!("Terrain geometry pipeline started with {worker_count} workers");

        Self {
            task_sender: Some(task_tx),
            result_receiver: result_rx,
            worker_handles: handles,
            budget,
            in_flight,
        }
    }

    /// Queue a build. Returns `false` when the budget is exhausted or the pipeline is shut
    /// down; the caller may retry on a later frame.
    pub fn submit(&self, task: GeometryTask) -> bool {
        let Some(sender) = &self.task_sender else {
            return false;
        };
        if self.in_flight.load(Ordering::Relaxed) >= self.budget {
            return false;
        }
        self.in_flight.fetch_add(1, Ordering::Relaxed);
        if sender.try_send(task).is_err() {
            self.in_flight.fetch_sub(1, Ordering::Relaxed);
            return false;
        }
        true
    }

    /// Collect every finished build without blocking.
    pub fn drain_results(&self) -> Vec<GeometryResult> {
        self.result_receiver.try_iter().collect()
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.load(Ordering::Relaxed)
    }

    /// Close the task channel and join the workers.
    pub fn shutdown(&mut self) {
        self.task_sender.take();
        for handle in self.worker_handles.drain(..) {
            let _ = handle.join();
        }
    }
}

impl Drop for GeometryPipeline {
    fn drop(&mut self) {
        self.shutdown();
    }
}
