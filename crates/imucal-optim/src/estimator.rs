//! The joint estimator: phase machine, outer optimization loop, and
//! solution write-back.
//!
//! The estimator exclusively owns one trajectory and one calibration state
//! per run. Factors only ever see immutable parameter snapshots; updates
//! happen through a single write-back after each accepted step.
//!
//! tiny-solver reports neither iteration counts nor termination reasons, so
//! the outer loop runs it in rounds: each round is a full damped LM solve
//! (so the damping state can adapt across its inner iterations), after which
//! the problem is rebuilt to re-center the time-offset parameterization
//! around the updated state. The loop tracks the per-round cost history
//! itself.

use crate::diagnostics;
use crate::init::SeededState;
use crate::measurement::Measurement;
use crate::params::{dvec_to_iso3, dvec_to_quat, dvec_to_vec3};
use crate::problem::{build_joint_problem, JointSolveOptions};
use anyhow::{bail, ensure, Context, Result};
use imucal_core::{
    CalibrationState, CornerObservation, LandmarkTable, PinholeIntrinsics, Trajectory,
};
use nalgebra::DVector;
use std::collections::HashMap;
use tiny_solver::linear::sparse::LinearSolverType;
use tiny_solver::optimizer::{Optimizer, OptimizerOptions};
use tiny_solver::problem::Problem;
use tiny_solver::LevenbergMarquardtOptimizer;

/// Lifecycle of one estimation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Uninitialized,
    Seeded,
    Optimizing,
    Converged,
    Failed,
}

/// Why the outer loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationReason {
    Converged,
    MaxIterations,
    NumericalFailure,
}

/// Outer-loop controls.
#[derive(Debug, Clone)]
pub struct OptimizeOptions {
    /// Cap on outer rounds (each round is one full LM solve followed by a
    /// re-centering rebuild).
    pub max_iterations: usize,
    /// Cap on LM iterations within one round. Kept high enough for the
    /// damping to relax into full Gauss-Newton steps before the rebuild
    /// resets it.
    pub inner_iterations: usize,
    /// Absolute cost decrease below which the run counts as converged.
    pub min_abs_decrease: f64,
    /// Relative cost decrease below which the run counts as converged.
    pub min_rel_decrease: f64,
    pub verbosity: usize,
    pub solve: JointSolveOptions,
}

impl Default for OptimizeOptions {
    fn default() -> Self {
        Self {
            max_iterations: 40,
            inner_iterations: 30,
            min_abs_decrease: 1e-10,
            min_rel_decrease: 1e-6,
            verbosity: 0,
            solve: JointSolveOptions::default(),
        }
    }
}

/// Result of one `optimize` call.
#[derive(Debug, Clone)]
pub struct OptimizeSummary {
    /// Number of accepted outer rounds.
    pub iterations: usize,
    pub initial_cost: f64,
    pub final_cost: f64,
    /// Cost after the seed and after each accepted round.
    pub cost_history: Vec<f64>,
    pub termination: TerminationReason,
}

/// Joint continuous-time calibration estimator.
pub struct JointEstimator {
    phase: Phase,
    landmarks: LandmarkTable,
    intrinsics: PinholeIntrinsics,
    trajectory: Option<Trajectory>,
    state: Option<CalibrationState>,
    measurements: Vec<Measurement>,
}

impl JointEstimator {
    pub fn new(landmarks: LandmarkTable, intrinsics: PinholeIntrinsics) -> Self {
        Self {
            phase: Phase::Uninitialized,
            landmarks,
            intrinsics,
            trajectory: None,
            state: None,
            measurements: Vec::new(),
        }
    }

    /// Install the seeded trajectory and state. Legal once, from
    /// `Uninitialized`.
    pub fn seed(&mut self, seeded: SeededState) -> Result<()> {
        ensure!(
            self.phase == Phase::Uninitialized,
            "seed is only legal in the Uninitialized phase (currently {:?})",
            self.phase
        );
        self.trajectory = Some(seeded.trajectory);
        self.state = Some(seeded.state);
        self.phase = Phase::Seeded;
        Ok(())
    }

    #[inline]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn state(&self) -> Option<&CalibrationState> {
        self.state.as_ref()
    }

    pub fn trajectory(&self) -> Option<&Trajectory> {
        self.trajectory.as_ref()
    }

    pub fn num_measurements(&self) -> usize {
        self.measurements.len()
    }

    /// Register one measurement. Legal only in the `Seeded` phase.
    pub fn add_measurement(&mut self, measurement: Measurement) -> Result<()> {
        ensure!(
            self.phase == Phase::Seeded,
            "measurements can only be added in the Seeded phase (currently {:?})",
            self.phase
        );
        self.measurements.push(measurement);
        Ok(())
    }

    /// Run the damped outer loop until convergence, the iteration cap, or a
    /// numerical failure.
    pub fn optimize(&mut self, opts: &OptimizeOptions) -> Result<OptimizeSummary> {
        ensure!(
            self.phase == Phase::Seeded,
            "optimize is only legal in the Seeded phase (currently {:?})",
            self.phase
        );
        self.phase = Phase::Optimizing;

        match self.run_outer_loop(opts) {
            Ok(summary) => {
                self.phase = match summary.termination {
                    TerminationReason::NumericalFailure => Phase::Failed,
                    _ => Phase::Converged,
                };
                Ok(summary)
            }
            Err(err) => {
                self.phase = Phase::Failed;
                Err(err)
            }
        }
    }

    fn run_outer_loop(&mut self, opts: &OptimizeOptions) -> Result<OptimizeSummary> {
        let optimizer = LevenbergMarquardtOptimizer::default();

        let initial_cost = {
            let (problem, initial) = self.build_with(&opts.solve)?;
            problem_cost(&problem, &initial)
        };
        let mut cost_history = vec![initial_cost];
        if !initial_cost.is_finite() {
            return Ok(OptimizeSummary {
                iterations: 0,
                initial_cost,
                final_cost: initial_cost,
                cost_history,
                termination: TerminationReason::NumericalFailure,
            });
        }

        let mut prev_cost = initial_cost;
        let mut iterations = 0usize;
        let mut termination = TerminationReason::MaxIterations;

        for _ in 0..opts.max_iterations {
            let (problem, initial) = self.build_with(&opts.solve)?;
            let options = OptimizerOptions {
                max_iteration: opts.inner_iterations,
                verbosity_level: opts.verbosity,
                linear_solver_type: LinearSolverType::SparseCholesky,
                ..OptimizerOptions::default()
            };

            let Some(solution) = optimizer.optimize(&problem, &initial, Some(options)) else {
                termination = TerminationReason::NumericalFailure;
                break;
            };
            let cost = problem_cost(&problem, &solution);
            if !cost.is_finite() {
                termination = TerminationReason::NumericalFailure;
                break;
            }
            if cost > prev_cost {
                // The step was rejected; keep the previous state.
                termination = TerminationReason::Converged;
                break;
            }

            self.write_back(&solution)?;
            iterations += 1;
            cost_history.push(cost);

            let abs_decrease = prev_cost - cost;
            let rel_decrease = if prev_cost > 0.0 {
                abs_decrease / prev_cost
            } else {
                0.0
            };
            prev_cost = cost;
            if abs_decrease < opts.min_abs_decrease || rel_decrease < opts.min_rel_decrease {
                termination = TerminationReason::Converged;
                break;
            }
        }

        log::info!(
            "joint optimization: {} iterations, cost {:.6e} -> {:.6e} ({:?})",
            iterations,
            initial_cost,
            prev_cost,
            termination
        );
        Ok(OptimizeSummary {
            iterations,
            initial_cost,
            final_cost: prev_cost,
            cost_history,
            termination,
        })
    }

    /// Mean pixel reprojection error with the frozen state. Legal after the
    /// run has finished, converged or not.
    pub fn mean_reprojection(&self, corners: &[CornerObservation]) -> Result<f64> {
        ensure!(
            matches!(self.phase, Phase::Converged | Phase::Failed),
            "mean_reprojection is only legal after optimization (currently {:?})",
            self.phase
        );
        let (trajectory, state) = self.parts()?;
        diagnostics::mean_reprojection(
            trajectory,
            state,
            &self.landmarks,
            &self.intrinsics,
            corners,
        )
    }

    fn build_with(
        &self,
        solve: &JointSolveOptions,
    ) -> Result<(Problem, HashMap<String, DVector<f64>>)> {
        let (trajectory, state) = self.parts()?;
        build_joint_problem(
            &self.measurements,
            trajectory,
            state,
            &self.landmarks,
            &self.intrinsics,
            solve,
        )
    }

    fn parts(&self) -> Result<(&Trajectory, &CalibrationState)> {
        match (self.trajectory.as_ref(), self.state.as_ref()) {
            (Some(trajectory), Some(state)) => Ok((trajectory, state)),
            _ => bail!("estimator has no seeded state"),
        }
    }

    fn write_back(&mut self, solution: &HashMap<String, DVector<f64>>) -> Result<()> {
        let trajectory = self
            .trajectory
            .as_mut()
            .context("estimator has no trajectory")?;
        let state = self.state.as_mut().context("estimator has no state")?;

        for (key, value) in solution {
            if let Some(idx) = key.strip_prefix("so3/") {
                let idx: usize = idx.parse().context("malformed rotation knot key")?;
                trajectory
                    .so3_mut()
                    .set_knot(idx, dvec_to_quat(value.as_view())?);
            } else if let Some(idx) = key.strip_prefix("r3/") {
                let idx: usize = idx.parse().context("malformed translation knot key")?;
                trajectory
                    .r3_mut()
                    .set_knot(idx, dvec_to_vec3(value.as_view())?);
            } else {
                match key.as_str() {
                    "t_i_c" => state.imu_from_cam = dvec_to_iso3(value.as_view())?,
                    "b_g" => state.gyro_bias = dvec_to_vec3(value.as_view())?,
                    "b_a" => state.accel_bias = dvec_to_vec3(value.as_view())?,
                    "g" => state.gravity = dvec_to_vec3(value.as_view())?,
                    "d" => state.time_offset_s = value[0],
                    other => bail!("unexpected parameter block {other} in solution"),
                }
            }
        }
        Ok(())
    }
}

fn problem_cost(problem: &Problem, params: &HashMap<String, DVector<f64>>) -> f64 {
    let blocks = problem.initialize_parameter_blocks(params);
    let residuals = problem.compute_residuals(&blocks, true);
    0.5 * residuals.as_ref().squared_norm_l2()
}
