//! Running a pyramid build on the rayon pool.
//!
//! Leaves are produced in parallel. Each finished tile reports to the
//! [`PyramidGraph`]; a parent is spawned the moment its last producer
//! finishes, so one slow branch never holds back the rest of its zoom level.
//! Children are handed to the parent through the [`TileStore`]. A node that
//! ends empty or failed has any raster left by an earlier run removed, so
//! the store only lists tiles this run produced.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Instant;

use tracing::{debug, error, info, warn};

use crate::aggregate::{ChildSlot, PyramidAggregator};
use crate::graph::{NodeStatus, PyramidGraph};
use raster_common::{
    PartialDataWarning, RasterError, RasterResult, RasterTile, TileCoord, TileLayout,
};
use storage::TileStore;

/// What a build produced.
#[derive(Debug, Default)]
pub struct PyramidReport {
    pub built: Vec<TileCoord>,
    pub empty: Vec<TileCoord>,
    pub failed: Vec<(TileCoord, String)>,
    pub warnings: Vec<PartialDataWarning>,
    /// First configuration error. Once set, no new tile starts.
    pub fatal: Option<RasterError>,
}

impl PyramidReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && self.fatal.is_none()
    }

    fn sort(&mut self) {
        self.built.sort();
        self.empty.sort();
        self.failed.sort_by_key(|(c, _)| *c);
        self.warnings.sort_by_key(|w| w.parent);
    }
}

struct RunState {
    graph: Mutex<PyramidGraph>,
    report: Mutex<PyramidReport>,
    abort: AtomicBool,
}

impl RunState {
    fn report(&self) -> std::sync::MutexGuard<'_, PyramidReport> {
        self.report.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn graph(&self) -> std::sync::MutexGuard<'_, PyramidGraph> {
        self.graph.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Drives leaf production and aggregation over a [`PyramidGraph`].
pub struct PyramidScheduler<'a> {
    aggregator: &'a PyramidAggregator,
    store: &'a dyn TileStore,
    layout: TileLayout,
    stored_leaves: bool,
}

impl<'a> PyramidScheduler<'a> {
    pub fn new(
        aggregator: &'a PyramidAggregator,
        store: &'a dyn TileStore,
        layout: TileLayout,
    ) -> Self {
        Self {
            aggregator,
            store,
            layout,
            stored_leaves: false,
        }
    }

    /// Leaves come from the store itself: they are read, never rewritten
    /// or removed.
    pub fn with_stored_leaves(mut self) -> Self {
        self.stored_leaves = true;
        self
    }

    /// Build every node of `graph`.
    ///
    /// `leaf` produces one leaf tile; `Ok(None)` means the leaf had no data.
    /// A failed leaf fails only the parents that depend on it, as the
    /// aggregator's [`crate::MissingChildPolicy`] decides. A configuration
    /// error stops the build.
    pub fn run<F>(&self, graph: PyramidGraph, leaf: F) -> PyramidReport
    where
        F: Fn(TileCoord) -> RasterResult<Option<RasterTile>> + Sync,
    {
        let start = Instant::now();
        let leaves = graph.leaves();
        let total = graph.len();
        info!(
            leaves = leaves.len(),
            tiles = total,
            leaf_zoom = graph.leaf_zoom(),
            min_zoom = graph.min_zoom(),
            "Starting pyramid build"
        );

        let state = RunState {
            graph: Mutex::new(graph),
            report: Mutex::new(PyramidReport::default()),
            abort: AtomicBool::new(false),
        };

        rayon::scope(|scope| {
            for coord in leaves {
                let state = &state;
                let leaf = &leaf;
                scope.spawn(move |scope| self.run_leaf(scope, state, leaf, coord));
            }
        });

        let pending = state.graph().unfinished();
        let mut report = state.report.into_inner().unwrap_or_else(|e| e.into_inner());
        if report.fatal.is_none() && !pending.is_empty() {
            warn!(count = pending.len(), "Tiles left unbuilt");
        }
        report.sort();

        info!(
            built = report.built.len(),
            empty = report.empty.len(),
            failed = report.failed.len(),
            partial = report.warnings.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Pyramid build finished"
        );
        report
    }

    fn run_leaf<'s, F>(
        &'s self,
        scope: &rayon::Scope<'s>,
        state: &'s RunState,
        leaf: &'s F,
        coord: TileCoord,
    ) where
        F: Fn(TileCoord) -> RasterResult<Option<RasterTile>> + Sync,
    {
        if state.abort.load(Ordering::Relaxed) {
            return;
        }
        let result = if self.stored_leaves {
            leaf(coord).map(|tile| tile.filter(|t| !t.is_empty()))
        } else {
            leaf(coord).and_then(|tile| self.persist(tile))
        };
        let owned = !self.stored_leaves;
        self.finish(scope, state, coord, owned, result.map(|tile| (tile, None)));
    }

    fn run_parent<'s>(&'s self, scope: &rayon::Scope<'s>, state: &'s RunState, coord: TileCoord) {
        if state.abort.load(Ordering::Relaxed) {
            return;
        }
        let slots = self.child_slots(state, coord);
        let result = self
            .aggregator
            .aggregate(&self.layout.spec(coord), slots)
            .and_then(|outcome| match outcome {
                Some(outcome) => {
                    let tile = self.persist(Some(outcome.tile))?;
                    Ok((tile, outcome.warning))
                }
                None => Ok((None, None)),
            });
        self.finish(scope, state, coord, true, result);
    }

    fn persist(&self, tile: Option<RasterTile>) -> RasterResult<Option<RasterTile>> {
        match tile {
            Some(tile) if !tile.is_empty() => {
                self.store
                    .put_raster(&tile)
                    .map_err(|e| RasterError::from(e).with_tile(tile.coord()))?;
                Ok(Some(tile))
            }
            _ => Ok(None),
        }
    }

    /// Remove what an earlier run stored for `coord`.
    fn clear_stale(&self, coord: TileCoord) {
        match self.store.remove_raster(coord) {
            Ok(true) => debug!(tile = %coord, "Removed raster from an earlier run"),
            Ok(false) => {}
            Err(e) => warn!(tile = %coord, error = %e, "Could not remove stale raster"),
        }
    }

    /// Gather the children of `parent` from the graph and the store.
    fn child_slots(&self, state: &RunState, parent: TileCoord) -> [ChildSlot; 4] {
        let statuses = {
            let graph = state.graph();
            parent.children().map(|c| graph.status(c).cloned())
        };

        let mut slots = [
            ChildSlot::Absent,
            ChildSlot::Absent,
            ChildSlot::Absent,
            ChildSlot::Absent,
        ];
        for ((slot, child), status) in slots.iter_mut().zip(parent.children()).zip(statuses) {
            *slot = match status {
                None | Some(NodeStatus::Empty) => ChildSlot::Absent,
                Some(NodeStatus::Built) => match self.store.get_raster(child) {
                    Ok(Some(tile)) => ChildSlot::Ready(tile),
                    Ok(None) => ChildSlot::Failed(
                        RasterError::data("built child missing from store").with_tile(child),
                    ),
                    Err(e) => ChildSlot::Failed(RasterError::from(e).with_tile(child)),
                },
                Some(NodeStatus::Failed(message)) => {
                    ChildSlot::Failed(RasterError::data(message).with_tile(child))
                }
                Some(NodeStatus::Pending) => ChildSlot::Failed(
                    RasterError::data("child has not finished").with_tile(child),
                ),
            };
        }
        slots
    }

    fn finish<'s>(
        &'s self,
        scope: &rayon::Scope<'s>,
        state: &'s RunState,
        coord: TileCoord,
        owned: bool,
        result: RasterResult<(Option<RasterTile>, Option<PartialDataWarning>)>,
    ) {
        let status = match result {
            Ok((Some(_), warning)) => {
                let mut report = state.report();
                report.built.push(coord);
                report.warnings.extend(warning);
                NodeStatus::Built
            }
            Ok((None, _)) => {
                state.report().empty.push(coord);
                NodeStatus::Empty
            }
            Err(err) if err.is_config() => {
                error!(tile = %coord, error = %err, "Configuration error, stopping build");
                state.abort.store(true, Ordering::Relaxed);
                let message = err.to_string();
                let mut report = state.report();
                report.failed.push((coord, message.clone()));
                report.fatal.get_or_insert(err);
                NodeStatus::Failed(message)
            }
            Err(err) => {
                error!(tile = %coord, error = %err, "Tile failed");
                let message = err.to_string();
                state.report().failed.push((coord, message.clone()));
                NodeStatus::Failed(message)
            }
        };
        if owned && status != NodeStatus::Built {
            self.clear_stale(coord);
        }

        let ready = state.graph().complete(coord, status);
        if let Some(parent) = ready {
            scope.spawn(move |scope| self.run_parent(scope, state, parent));
        }
    }
}
