pub mod anneal;
pub mod coarsen;
pub mod forces;
pub mod octree;
pub mod orient;
pub mod relax;

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Tuning knobs for [`crate::compute_layout`].
///
/// Deserialises from camelCase JSON; omitted fields take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LayoutParams {
    /// Ideal edge length; also the repulsion scale (`k²`).
    pub k: f64,
    /// Per-iteration displacement cap at the start of each relax pass.
    pub temperature_initial: f64,
    /// Iterations spent on the coarsest graph.
    pub max_iterations: usize,
    /// Graphs with at most this many nodes are not coarsened further.
    pub coarsening_threshold: usize,
    /// Barnes-Hut opening criterion (`cell width / distance`). Lower is more accurate.
    pub theta: f64,
    pub cooling_factor: f64,
    pub min_temperature: f64,
    /// Strength of the pull toward the origin.
    pub centering: f64,
    /// Side of the initial random cube, in units of `k * cbrt(n)`.
    pub initial_spread: f64,
    /// Half-width of the jitter cube used when projecting clusters onto their members.
    pub jitter: f64,
    /// Fraction of `max_iterations` spent on each finer level.
    pub refine_iteration_ratio: f64,
    pub anneal_iterations: usize,
    pub anneal_temperature: f64,
    pub anneal_cooling: f64,
    pub anneal_min_temperature: f64,
    pub random_seed: u64,
    /// Translate the final layout so its centroid sits on the origin.
    pub recenter: bool,
    /// Rotate the final layout onto its principal axes (largest variance along x).
    pub align_principal_axes: bool,
}

impl Default for LayoutParams {
    fn default() -> Self {
        Self {
            k: 30.0,
            temperature_initial: 10.0,
            max_iterations: 100,
            coarsening_threshold: 16,
            theta: 0.8,
            cooling_factor: 0.95,
            min_temperature: 0.01,
            centering: 0.01,
            initial_spread: 1.0,
            jitter: 1.0,
            refine_iteration_ratio: 0.5,
            anneal_iterations: 500,
            anneal_temperature: 1.0,
            anneal_cooling: 0.99,
            anneal_min_temperature: 0.001,
            random_seed: 1,
            recenter: true,
            align_principal_axes: false,
        }
    }
}

impl LayoutParams {
    pub fn validate(&self) -> Result<()> {
        positive("k", self.k)?;
        positive("temperatureInitial", self.temperature_initial)?;
        positive("theta", self.theta)?;
        positive("minTemperature", self.min_temperature)?;
        positive("annealTemperature", self.anneal_temperature)?;
        positive("annealMinTemperature", self.anneal_min_temperature)?;
        unit_interval("coolingFactor", self.cooling_factor)?;
        unit_interval("annealCooling", self.anneal_cooling)?;
        unit_interval("refineIterationRatio", self.refine_iteration_ratio)?;
        non_negative("centering", self.centering)?;
        non_negative("jitter", self.jitter)?;
        positive("initialSpread", self.initial_spread)?;
        if self.max_iterations == 0 {
            return Err(invalid("maxIterations", "must be at least 1"));
        }
        if self.coarsening_threshold == 0 {
            return Err(invalid("coarseningThreshold", "must be at least 1"));
        }
        Ok(())
    }

    /// Iteration budget for every level finer than the coarsest one.
    pub fn refine_iterations(&self) -> usize {
        ((self.max_iterations as f64 * self.refine_iteration_ratio).round() as usize).max(1)
    }
}

fn invalid(name: &'static str, reason: impl Into<String>) -> Error {
    Error::InvalidParameters {
        name,
        reason: reason.into(),
    }
}

fn positive(name: &'static str, v: f64) -> Result<()> {
    if v.is_finite() && v > 0.0 {
        Ok(())
    } else {
        Err(invalid(name, format!("must be a positive finite number, got {v}")))
    }
}

fn non_negative(name: &'static str, v: f64) -> Result<()> {
    if v.is_finite() && v >= 0.0 {
        Ok(())
    } else {
        Err(invalid(name, format!("must be a non-negative finite number, got {v}")))
    }
}

fn unit_interval(name: &'static str, v: f64) -> Result<()> {
    if v.is_finite() && v > 0.0 && v <= 1.0 {
        Ok(())
    } else {
        Err(invalid(name, format!("must be in (0, 1], got {v}")))
    }
}

#[cfg(test)]
mod tests {
    use super::LayoutParams;
    use crate::error::Error;

    #[test]
    fn defaults_are_valid() {
        LayoutParams::default().validate().unwrap();
    }

    #[test]
    fn rejects_non_positive_core_parameters() {
        for (name, params) in [
            (
                "k",
                LayoutParams {
                    k: 0.0,
                    ..Default::default()
                },
            ),
            (
                "theta",
                LayoutParams {
                    theta: -0.5,
                    ..Default::default()
                },
            ),
            (
                "maxIterations",
                LayoutParams {
                    max_iterations: 0,
                    ..Default::default()
                },
            ),
            (
                "k",
                LayoutParams {
                    k: f64::NAN,
                    ..Default::default()
                },
            ),
        ] {
            match params.validate() {
                Err(Error::InvalidParameters { name: got, .. }) => assert_eq!(got, name),
                other => panic!("expected InvalidParameters for {name}, got {other:?}"),
            }
        }
    }

    #[test]
    fn refine_iterations_never_drops_to_zero() {
        let p = LayoutParams {
            max_iterations: 1,
            refine_iteration_ratio: 0.1,
            ..Default::default()
        };
        assert_eq!(p.refine_iterations(), 1);
        assert_eq!(LayoutParams::default().refine_iterations(), 50);
    }

    #[test]
    fn deserializes_camel_case_with_defaults() {
        let p: LayoutParams =
            serde_json::from_str(r#"{"k": 12.5, "maxIterations": 40, "coarseningThreshold": 2}"#)
                .unwrap();
        assert_eq!(p.k, 12.5);
        assert_eq!(p.max_iterations, 40);
        assert_eq!(p.coarsening_threshold, 2);
        assert_eq!(p.theta, LayoutParams::default().theta);
    }
}
