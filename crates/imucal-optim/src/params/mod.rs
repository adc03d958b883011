//! Parameter block conversions between nalgebra types and tiny-solver's
//! dense vectors.

pub mod blocks;

pub use blocks::{
    dvec_to_iso3, dvec_to_quat, dvec_to_vec3, iso3_to_dvec, quat_to_dvec, vec3_to_dvec,
};
