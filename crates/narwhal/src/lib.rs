#![forbid(unsafe_code)]

//! Headless multi-level 3D force-directed graph layout.
//!
//! The pipeline coarsens the input graph into a hierarchy of smaller graphs, lays out the coarsest
//! one with Barnes-Hut accelerated forces, refines level by level back to the input graph, and
//! finishes with a simulated-annealing polish. All randomness comes from an injected
//! [`rand::Rng`]; a fixed seed gives bit-identical layouts.
//!
//! ```
//! use narwhal::{Graph, LayoutParams, compute_layout};
//!
//! let graph = Graph::new().with_node("a").with_node("b").with_edge("a", "b");
//! let outcome = compute_layout(&graph, &LayoutParams::default(), None).unwrap();
//! assert_eq!(outcome.result().positions.len(), 2);
//! ```

pub mod algo;
pub mod cancel;
pub mod error;
pub mod graph;
pub mod math;
pub mod rng;

pub use algo::LayoutParams;
pub use algo::anneal::AnnealReport;
pub use cancel::CancelToken;
pub use error::{Error, MalformedGraph, Result};
pub use graph::{Edge, Graph, IndexedGraph, PositionMap};
pub use math::Vector3D;
pub use rng::XorShift64Star;

use algo::anneal::{AnnealSchedule, anneal};
use algo::coarsen::Hierarchy;
use algo::forces::ForceModel;
use algo::relax::{Cooling, RelaxReport, initial_positions, relax};
use rand::{Rng, SeedableRng};
use serde::Serialize;
use std::time::{Duration, Instant};

/// Work done on one hierarchy level.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelStats {
    /// 0 is the input graph; higher is coarser.
    pub level: usize,
    pub nodes: usize,
    pub edges: usize,
    pub iterations: usize,
    pub final_temperature: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutStats {
    /// Coarsest level first, in the order they were relaxed.
    pub levels: Vec<LevelStats>,
    pub anneal: AnnealReport,
    #[serde(serialize_with = "serialize_millis", rename = "elapsedMs")]
    pub elapsed: Duration,
}

fn serialize_millis<S>(d: &Duration, s: S) -> std::result::Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    s.serialize_f64(d.as_secs_f64() * 1000.0)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LayoutResult {
    pub positions: PositionMap,
    pub stats: LayoutStats,
}

/// Result of a layout run. A cancelled run still places every input node.
#[derive(Debug, Clone, PartialEq)]
pub enum LayoutOutcome {
    Completed(LayoutResult),
    Cancelled(LayoutResult),
}

impl LayoutOutcome {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }

    pub fn result(&self) -> &LayoutResult {
        match self {
            Self::Completed(r) | Self::Cancelled(r) => r,
        }
    }

    pub fn into_result(self) -> LayoutResult {
        match self {
            Self::Completed(r) | Self::Cancelled(r) => r,
        }
    }

    pub fn positions(&self) -> &PositionMap {
        &self.result().positions
    }
}

/// Lays out `graph` using the built-in generator seeded from `params.random_seed`.
pub fn compute_layout(
    graph: &Graph,
    params: &LayoutParams,
    cancel: Option<&CancelToken>,
) -> Result<LayoutOutcome> {
    let mut rng = XorShift64Star::seed_from_u64(params.random_seed);
    compute_layout_with_rng(graph, params, &mut rng, cancel)
}

pub async fn compute_layout_async(
    graph: &Graph,
    params: &LayoutParams,
    cancel: Option<&CancelToken>,
) -> Result<LayoutOutcome> {
    compute_layout(graph, params, cancel)
}

/// Lays out `graph` drawing every random number from `rng`.
///
/// Parameters and edges are checked before any work is done. Cancellation is polled once per
/// iteration; when it fires, the positions reached so far are projected down to the input graph
/// without further relaxation.
pub fn compute_layout_with_rng<R: Rng + ?Sized>(
    graph: &Graph,
    params: &LayoutParams,
    rng: &mut R,
    cancel: Option<&CancelToken>,
) -> Result<LayoutOutcome> {
    let started = Instant::now();
    params.validate()?;
    let indexed = graph.index()?;
    if indexed.is_empty() {
        return Ok(LayoutOutcome::Completed(LayoutResult::default()));
    }

    let hierarchy = Hierarchy::build(indexed, params.coarsening_threshold);
    tracing::debug!(
        nodes = graph.nodes.len(),
        edges = graph.edges.len(),
        depth = hierarchy.depth(),
        "built coarsening hierarchy"
    );
    let depth = hierarchy.depth();
    let (mut levels, coarsest) = hierarchy.into_parts();

    let model = ForceModel::from_params(params);
    let cooling = Cooling {
        initial: params.temperature_initial,
        factor: params.cooling_factor,
        min: params.min_temperature,
    };
    let mut stats = LayoutStats::default();

    let mut positions = initial_positions(coarsest.len(), params.k, params.initial_spread, rng);
    let report = relax(
        &coarsest,
        &mut positions,
        &model,
        cooling,
        params.max_iterations,
        cancel,
    );
    stats.levels.push(level_stats(depth, &coarsest, &report));
    let mut cancelled = report.cancelled;

    let mut current = coarsest;
    while let Some(level) = levels.pop() {
        positions = level.clusters.project(&positions, params.jitter, rng);
        current = level.fine;
        if cancelled {
            continue;
        }
        let report = relax(
            &current,
            &mut positions,
            &model,
            cooling,
            params.refine_iterations(),
            cancel,
        );
        stats
            .levels
            .push(level_stats(levels.len(), &current, &report));
        cancelled = report.cancelled;
    }

    if !cancelled {
        let schedule = AnnealSchedule {
            iterations: params.anneal_iterations,
            temperature: params.anneal_temperature,
            cooling: params.anneal_cooling,
            min_temperature: params.anneal_min_temperature,
        };
        stats.anneal = anneal(&current, &mut positions, params.k, schedule, rng, cancel);
        cancelled = stats.anneal.cancelled;
    }

    if params.recenter {
        algo::orient::recenter(&mut positions);
    }
    if params.align_principal_axes {
        algo::orient::align_principal_axes(&mut positions);
    }

    stats.elapsed = started.elapsed();
    tracing::debug!(
        cancelled,
        levels = stats.levels.len(),
        anneal_accepted = stats.anneal.accepted,
        elapsed_ms = stats.elapsed.as_secs_f64() * 1000.0,
        "layout finished"
    );

    let result = LayoutResult {
        positions: current.position_map(&positions),
        stats,
    };
    Ok(if cancelled {
        LayoutOutcome::Cancelled(result)
    } else {
        LayoutOutcome::Completed(result)
    })
}

fn level_stats(level: usize, graph: &IndexedGraph, report: &RelaxReport) -> LevelStats {
    tracing::debug!(
        level,
        nodes = graph.len(),
        iterations = report.iterations,
        final_temperature = report.final_temperature,
        max_displacement = report.last_max_displacement,
        "relaxed level"
    );
    LevelStats {
        level,
        nodes: graph.len(),
        edges: graph.edges().len(),
        iterations: report.iterations,
        final_temperature: report.final_temperature,
    }
}
