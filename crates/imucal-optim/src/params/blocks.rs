//! Dense parameter vector layouts.
//!
//! SE(3) blocks are 7D `[qx, qy, qz, qw, tx, ty, tz]`, rotation-only blocks
//! 4D `[qx, qy, qz, qw]`, matching tiny-solver's SE3 and quaternion
//! manifolds.

use anyhow::{ensure, Result};
use imucal_core::{Iso3, Vec3};
use nalgebra::{DVector, DVectorView, Quaternion, UnitQuaternion, Vector3};

/// Convert an `Iso3` into a 7D SE(3) parameter vector.
pub fn iso3_to_dvec(pose: &Iso3) -> DVector<f64> {
    let q = pose.rotation.into_inner();
    let t = pose.translation.vector;
    nalgebra::dvector![q.coords[0], q.coords[1], q.coords[2], q.coords[3], t.x, t.y, t.z]
}

/// Convert a 7D SE(3) vector back into an `Iso3`.
pub fn dvec_to_iso3(v: DVectorView<'_, f64>) -> Result<Iso3> {
    ensure!(
        v.len() == 7,
        "expected se3 vector of length 7, got {}",
        v.len()
    );
    let quat = Quaternion::new(v[3], v[0], v[1], v[2]);
    let rot = UnitQuaternion::from_quaternion(quat);
    let trans = Vector3::new(v[4], v[5], v[6]);
    Ok(Iso3::from_parts(trans.into(), rot))
}

/// Convert a unit quaternion into a 4D parameter vector.
pub fn quat_to_dvec(q: &UnitQuaternion<f64>) -> DVector<f64> {
    let q = q.into_inner();
    nalgebra::dvector![q.coords[0], q.coords[1], q.coords[2], q.coords[3]]
}

/// Convert a 4D quaternion vector back into a unit quaternion.
pub fn dvec_to_quat(v: DVectorView<'_, f64>) -> Result<UnitQuaternion<f64>> {
    ensure!(
        v.len() == 4,
        "expected quaternion vector of length 4, got {}",
        v.len()
    );
    let quat = Quaternion::new(v[3], v[0], v[1], v[2]);
    Ok(UnitQuaternion::from_quaternion(quat))
}

/// Convert a 3-vector into a parameter vector.
pub fn vec3_to_dvec(v: &Vec3) -> DVector<f64> {
    nalgebra::dvector![v.x, v.y, v.z]
}

/// Convert a 3D parameter vector back into a `Vec3`.
pub fn dvec_to_vec3(v: DVectorView<'_, f64>) -> Result<Vec3> {
    ensure!(
        v.len() == 3,
        "expected vector of length 3, got {}",
        v.len()
    );
    Ok(Vec3::new(v[0], v[1], v[2]))
}
