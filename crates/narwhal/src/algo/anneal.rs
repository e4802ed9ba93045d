//! Simulated-annealing polish on the fully uncoarsened layout.
//!
//! Single-node moves under a Metropolis acceptance rule. The global energy is
//!
//! ```text
//! E = Σ_edges (d - k)² + Σ_{pairs} k² / d        (d floored at MIN_DISTANCE)
//! ```
//!
//! and each move is scored from the moved node's own terms only.

use crate::algo::octree::MIN_DISTANCE;
use crate::cancel::{self, CancelToken};
use crate::graph::IndexedGraph;
use crate::math::Vector3D;
use rand::Rng;
use serde::Serialize;

/// Energy function bound to one graph and ideal edge length.
#[derive(Debug, Clone)]
pub struct EnergyModel<'a> {
    graph: &'a IndexedGraph,
    incident: Vec<Vec<usize>>,
    k: f64,
}

impl<'a> EnergyModel<'a> {
    pub fn new(graph: &'a IndexedGraph, k: f64) -> Self {
        Self {
            graph,
            incident: graph.incident_edges(),
            k,
        }
    }

    fn spring(&self, d: f64) -> f64 {
        let diff = d.max(MIN_DISTANCE) - self.k;
        diff * diff
    }

    fn repulsion(&self, d: f64) -> f64 {
        self.k * self.k / d.max(MIN_DISTANCE)
    }

    /// Full O(n² + m) energy of `positions`.
    pub fn total(&self, positions: &[Vector3D]) -> f64 {
        let springs: f64 = self
            .graph
            .edges()
            .iter()
            .map(|&(u, v)| self.spring(positions[u].distance(positions[v])))
            .sum();
        let mut pairs = 0.0;
        for i in 0..positions.len() {
            for j in (i + 1)..positions.len() {
                pairs += self.repulsion(positions[i].distance(positions[j]));
            }
        }
        springs + pairs
    }

    /// Energy of the terms involving `node` if it sat at `at`.
    fn local(&self, positions: &[Vector3D], node: usize, at: Vector3D) -> f64 {
        let mut e = 0.0;
        for &edge in &self.incident[node] {
            let (u, v) = self.graph.edges()[edge];
            let other = if u == node { v } else { u };
            // A self-loop sits at the floor distance wherever the node goes.
            let d = if other == node {
                0.0
            } else {
                at.distance(positions[other])
            };
            e += self.spring(d);
        }
        for (j, &p) in positions.iter().enumerate() {
            if j != node {
                e += self.repulsion(at.distance(p));
            }
        }
        e
    }

    /// Energy change from moving `node` to `to`, all other nodes fixed.
    ///
    /// Equal to `total(after) - total(before)` up to rounding.
    pub fn delta(&self, positions: &[Vector3D], node: usize, to: Vector3D) -> f64 {
        self.local(positions, node, to) - self.local(positions, node, positions[node])
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnnealSchedule {
    pub iterations: usize,
    pub temperature: f64,
    pub cooling: f64,
    pub min_temperature: f64,
}

/// One proposed move, as seen by an [`anneal_with`] observer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnnealStep {
    pub node: usize,
    pub delta: f64,
    pub temperature: f64,
    pub accepted: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnealReport {
    pub iterations: usize,
    pub accepted: usize,
    /// Accepted moves that raised the energy.
    pub uphill_accepted: usize,
    pub rejected: usize,
    pub initial_energy: f64,
    pub final_energy: f64,
    pub final_temperature: f64,
    pub cancelled: bool,
}

pub fn anneal<R: Rng + ?Sized>(
    graph: &IndexedGraph,
    positions: &mut [Vector3D],
    k: f64,
    schedule: AnnealSchedule,
    rng: &mut R,
    cancel: Option<&CancelToken>,
) -> AnnealReport {
    anneal_with(graph, positions, k, schedule, rng, cancel, |_| {})
}

/// [`anneal`] with a per-step observer.
pub fn anneal_with<R, F>(
    graph: &IndexedGraph,
    positions: &mut [Vector3D],
    k: f64,
    schedule: AnnealSchedule,
    rng: &mut R,
    cancel: Option<&CancelToken>,
    mut on_step: F,
) -> AnnealReport
where
    R: Rng + ?Sized,
    F: FnMut(&AnnealStep),
{
    let n = positions.len();
    let mut report = AnnealReport {
        final_temperature: schedule.temperature,
        ..Default::default()
    };
    if n < 2 {
        return report;
    }

    let energy = EnergyModel::new(graph, k);
    let mut current = energy.total(positions);
    report.initial_energy = current;

    let mut temperature = schedule.temperature;
    for _ in 0..schedule.iterations {
        if cancel::is_cancelled(cancel) {
            report.cancelled = true;
            break;
        }

        let node = rng.random_range(0..n);
        let kick = Vector3D::new(
            rng.random_range(-1.0..=1.0),
            rng.random_range(-1.0..=1.0),
            rng.random_range(-1.0..=1.0),
        ) * temperature;
        let candidate = positions[node] + kick;
        let delta = energy.delta(positions, node, candidate);

        let accepted = if delta <= 0.0 {
            true
        } else {
            rng.random::<f64>() < (-delta / temperature).exp()
        };
        if accepted {
            positions[node] = candidate;
            current += delta;
            report.accepted += 1;
            if delta > 0.0 {
                report.uphill_accepted += 1;
            }
        } else {
            report.rejected += 1;
        }

        on_step(&AnnealStep {
            node,
            delta,
            temperature,
            accepted,
        });
        temperature = (temperature * schedule.cooling).max(schedule.min_temperature);
        report.iterations += 1;
    }

    report.final_energy = current;
    report.final_temperature = temperature;
    tracing::trace!(
        iterations = report.iterations,
        accepted = report.accepted,
        uphill = report.uphill_accepted,
        initial_energy = report.initial_energy,
        final_energy = report.final_energy,
        "annealing finished"
    );
    report
}
