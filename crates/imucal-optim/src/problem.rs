//! Assembly of the joint tiny-solver problem.
//!
//! Parameter naming: rotation knots are `so3/{i}`, translation knots
//! `r3/{i}`, extrinsics `t_i_c`, gyro bias `b_g`, accel bias `b_a`, gravity
//! `g`, and the time offset `d`. Only knots referenced by at least one
//! residual enter the problem; untouched knots keep their seed values.

use crate::factors::{AccelFactor, GyroFactor, SplineBases, SplineReprojFactor};
use crate::measurement::Measurement;
use crate::params::{iso3_to_dvec, quat_to_dvec, vec3_to_dvec};
use anyhow::{ensure, Context, Result};
use imucal_core::{
    s_to_ns, CalibrationState, LandmarkTable, PinholeIntrinsics, Trajectory,
};
use nalgebra::DVector;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tiny_solver::loss_functions::{ArctanLoss, CauchyLoss, HuberLoss, Loss};
use tiny_solver::manifold::se3::SE3Manifold;
use tiny_solver::manifold::so3::QuaternionManifold;
use tiny_solver::problem::Problem;

/// Robust loss applied to reprojection residual blocks.
#[derive(Debug, Clone, Default)]
pub enum RobustLoss {
    #[default]
    None,
    Huber {
        scale: f64,
    },
    Cauchy {
        scale: f64,
    },
    Arctan {
        tol: f64,
    },
}

impl RobustLoss {
    fn to_loss(&self) -> Result<Option<Box<dyn Loss + Send>>> {
        match *self {
            RobustLoss::None => Ok(None),
            RobustLoss::Huber { scale } => {
                ensure!(scale > 0.0, "Huber scale must be positive");
                Ok(Some(Box::new(HuberLoss::new(scale))))
            }
            RobustLoss::Cauchy { scale } => {
                ensure!(scale > 0.0, "Cauchy scale must be positive");
                Ok(Some(Box::new(CauchyLoss::new(scale))))
            }
            RobustLoss::Arctan { tol } => {
                ensure!(tol > 0.0, "Arctan tolerance must be positive");
                Ok(Some(Box::new(ArctanLoss::new(tol))))
            }
        }
    }
}

/// Structural options for problem assembly.
#[derive(Debug, Clone)]
pub struct JointSolveOptions {
    pub robust_loss: RobustLoss,
    /// When false the time offset block is held at its seed value.
    pub optimize_time_offset: bool,
}

impl Default for JointSolveOptions {
    fn default() -> Self {
        Self {
            robust_loss: RobustLoss::None,
            optimize_time_offset: true,
        }
    }
}

/// Build the tiny-solver problem and its initial parameter map around the
/// current state and trajectory.
pub fn build_joint_problem(
    measurements: &[Measurement],
    trajectory: &Trajectory,
    state: &CalibrationState,
    landmarks: &LandmarkTable,
    intrinsics: &PinholeIntrinsics,
    opts: &JointSolveOptions,
) -> Result<(Problem, HashMap<String, DVector<f64>>)> {
    ensure!(!measurements.is_empty(), "no measurements registered");
    ensure!(
        trajectory.so3().order() == trajectory.r3().order(),
        "rotation and translation splines must share the same order"
    );
    let order = trajectory.so3().order();
    let bases = Arc::new(SplineBases::new(order));
    let offset_ns = s_to_ns(state.time_offset_s);
    let inv_dt_so3 = 1.0 / trajectory.so3().dt_s();
    let inv_dt_r3 = 1.0 / trajectory.r3().dt_s();

    let mut problem = Problem::new();
    let mut used_so3: BTreeSet<usize> = BTreeSet::new();
    let mut used_r3: BTreeSet<usize> = BTreeSet::new();
    let mut uses_extrinsics = false;
    let mut uses_gyro_bias = false;
    let mut uses_accel = false;
    let mut uses_offset = false;

    for measurement in measurements {
        match *measurement {
            Measurement::Reprojection {
                t_ns,
                track_id,
                uv,
                weight,
            } => {
                let landmark = *landmarks
                    .get(track_id)
                    .with_context(|| format!("track id {track_id} not in landmark table"))?;
                let (s_so3, u_so3) = trajectory.so3().segment(t_ns)?;
                let (s_r3, u_r3) = trajectory.r3().segment(t_ns)?;

                let mut names = so3_keys(s_so3, order);
                names.extend(r3_keys(s_r3, order));
                names.push("t_i_c".to_string());
                used_so3.extend(s_so3..s_so3 + order);
                used_r3.extend(s_r3..s_r3 + order);
                uses_extrinsics = true;

                let factor = SplineReprojFactor {
                    landmark,
                    uv,
                    weight,
                    u_so3,
                    u_r3,
                    intrinsics: *intrinsics,
                    bases: Arc::clone(&bases),
                };
                let refs: Vec<&str> = names.iter().map(String::as_str).collect();
                problem.add_residual_block(2, &refs, Box::new(factor), opts.robust_loss.to_loss()?);
            }
            Measurement::Gyroscope { t_ns, value, weight } => {
                let t_cam = t_ns + offset_ns;
                let (s, u0) = trajectory.so3().segment(t_cam)?;

                let mut names = so3_keys(s, order);
                names.push("b_g".to_string());
                names.push("d".to_string());
                used_so3.extend(s..s + order);
                uses_gyro_bias = true;
                uses_offset = true;

                let factor = GyroFactor {
                    measured: value,
                    weight,
                    u0,
                    inv_dt_so3,
                    offset0_s: state.time_offset_s,
                    bases: Arc::clone(&bases),
                };
                let refs: Vec<&str> = names.iter().map(String::as_str).collect();
                problem.add_residual_block(3, &refs, Box::new(factor), None);
            }
            Measurement::Accelerometer { t_ns, value, weight } => {
                let t_cam = t_ns + offset_ns;
                let (s_so3, u0_so3) = trajectory.so3().segment(t_cam)?;
                let (s_r3, u0_r3) = trajectory.r3().segment(t_cam)?;

                let mut names = so3_keys(s_so3, order);
                names.extend(r3_keys(s_r3, order));
                names.push("b_a".to_string());
                names.push("g".to_string());
                names.push("d".to_string());
                used_so3.extend(s_so3..s_so3 + order);
                used_r3.extend(s_r3..s_r3 + order);
                uses_accel = true;
                uses_offset = true;

                let factor = AccelFactor {
                    measured: value,
                    weight,
                    u0_so3,
                    u0_r3,
                    inv_dt_so3,
                    inv_dt_r3,
                    offset0_s: state.time_offset_s,
                    bases: Arc::clone(&bases),
                };
                let refs: Vec<&str> = names.iter().map(String::as_str).collect();
                problem.add_residual_block(3, &refs, Box::new(factor), None);
            }
        }
    }

    let mut initial: HashMap<String, DVector<f64>> = HashMap::new();
    for &i in &used_so3 {
        let key = format!("so3/{i}");
        let knot = trajectory
            .so3()
            .knot(i)
            .with_context(|| format!("rotation knot {i} out of range"))?;
        initial.insert(key.clone(), quat_to_dvec(knot));
        problem.set_variable_manifold(&key, Arc::new(QuaternionManifold));
    }
    for &i in &used_r3 {
        let knot = trajectory
            .r3()
            .knot(i)
            .with_context(|| format!("translation knot {i} out of range"))?;
        initial.insert(format!("r3/{i}"), vec3_to_dvec(knot));
    }
    if uses_extrinsics {
        initial.insert("t_i_c".to_string(), iso3_to_dvec(&state.imu_from_cam));
        problem.set_variable_manifold("t_i_c", Arc::new(SE3Manifold));
    }
    if uses_gyro_bias {
        initial.insert("b_g".to_string(), vec3_to_dvec(&state.gyro_bias));
    }
    if uses_accel {
        initial.insert("b_a".to_string(), vec3_to_dvec(&state.accel_bias));
        initial.insert("g".to_string(), vec3_to_dvec(&state.gravity));
    }
    if uses_offset {
        initial.insert("d".to_string(), nalgebra::dvector![state.time_offset_s]);
        if !opts.optimize_time_offset {
            problem.fix_variable("d", 0);
        }
    }

    Ok((problem, initial))
}

fn so3_keys(start: usize, order: usize) -> Vec<String> {
    (start..start + order).map(|i| format!("so3/{i}")).collect()
}

fn r3_keys(start: usize, order: usize) -> Vec<String> {
    (start..start + order).map(|i| format!("r3/{i}")).collect()
}
