//! Per-level force integration with a cooling displacement cap.

use crate::algo::coarsen::random_offset;
use crate::algo::forces::ForceModel;
use crate::cancel::{self, CancelToken};
use crate::graph::IndexedGraph;
use crate::math::Vector3D;
use rand::Rng;
use serde::Serialize;

/// Multiplicative cooling with a positive floor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Cooling {
    pub initial: f64,
    pub factor: f64,
    pub min: f64,
}

impl Cooling {
    pub fn next(&self, temperature: f64) -> f64 {
        (temperature * self.factor).max(self.min)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RelaxReport {
    pub iterations: usize,
    pub final_temperature: f64,
    /// Largest single-node displacement in the last completed iteration.
    pub last_max_displacement: f64,
    pub cancelled: bool,
}

/// Uniform random placement inside a cube of side `spread · k · ∛n` centred on the origin.
pub fn initial_positions<R: Rng + ?Sized>(
    n: usize,
    k: f64,
    spread: f64,
    rng: &mut R,
) -> Vec<Vector3D> {
    let half = 0.5 * spread * k * (n.max(1) as f64).cbrt();
    (0..n).map(|_| random_offset(rng, half)).collect()
}

/// Runs exactly `max_iterations` force passes (unless cancelled), moving each node by its force
/// clamped to the current temperature.
///
/// Cancellation is polled before every iteration; positions are left as of the last full pass.
pub fn relax(
    graph: &IndexedGraph,
    positions: &mut [Vector3D],
    model: &ForceModel,
    cooling: Cooling,
    max_iterations: usize,
    cancel: Option<&CancelToken>,
) -> RelaxReport {
    let mut report = RelaxReport {
        final_temperature: cooling.initial,
        ..Default::default()
    };
    if positions.is_empty() {
        return report;
    }

    let mut temperature = cooling.initial;
    for _ in 0..max_iterations {
        if cancel::is_cancelled(cancel) {
            report.cancelled = true;
            break;
        }

        let forces = model.compute(graph, positions);
        let mut max_disp = 0.0f64;
        for (p, f) in positions.iter_mut().zip(forces) {
            let step = f.clamp_magnitude(temperature);
            if !step.is_finite() {
                continue;
            }
            max_disp = max_disp.max(step.magnitude());
            *p += step;
        }

        temperature = cooling.next(temperature);
        report.iterations += 1;
        report.last_max_displacement = max_disp;
    }
    report.final_temperature = temperature;
    report
}
