//! Serde utilities for glam types.
//!
//! glam is built without its `serde` feature, so fields use
//! `#[serde(with = "crate::serde_utils::vec3")]` and friends.

use glam::{Mat3, UVec3, Vec3};
use serde::{Deserialize, Serialize};

/// Serde proxy for Vec3
#[derive(Serialize, Deserialize)]
pub struct Vec3Def {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl From<Vec3> for Vec3Def {
    fn from(v: Vec3) -> Self {
        Self { x: v.x, y: v.y, z: v.z }
    }
}

impl From<Vec3Def> for Vec3 {
    fn from(def: Vec3Def) -> Self {
        Vec3::new(def.x, def.y, def.z)
    }
}

/// Serde proxy for UVec3 (grid dimensions)
#[derive(Serialize, Deserialize)]
pub struct UVec3Def {
    pub x: u32,
    pub y: u32,
    pub z: u32,
}

impl From<UVec3> for UVec3Def {
    fn from(v: UVec3) -> Self {
        Self { x: v.x, y: v.y, z: v.z }
    }
}

impl From<UVec3Def> for UVec3 {
    fn from(def: UVec3Def) -> Self {
        UVec3::new(def.x, def.y, def.z)
    }
}

/// Serde proxy for Mat3, stored column by column.
#[derive(Serialize, Deserialize)]
pub struct Mat3Def {
    pub x_axis: Vec3Def,
    pub y_axis: Vec3Def,
    pub z_axis: Vec3Def,
}

impl From<Mat3> for Mat3Def {
    fn from(m: Mat3) -> Self {
        Self {
            x_axis: m.x_axis.into(),
            y_axis: m.y_axis.into(),
            z_axis: m.z_axis.into(),
        }
    }
}

impl From<Mat3Def> for Mat3 {
    fn from(def: Mat3Def) -> Self {
        Mat3::from_cols(def.x_axis.into(), def.y_axis.into(), def.z_axis.into())
    }
}

macro_rules! proxy_module {
    ($name:ident, $ty:ty, $proxy:ty) => {
        pub mod $name {
            use super::*;
            use serde::{Deserializer, Serializer};

            pub fn serialize<S>(value: &$ty, s: S) -> Result<S::Ok, S::Error>
            where
                S: Serializer,
            {
                <$proxy>::from(*value).serialize(s)
            }

            pub fn deserialize<'de, D>(d: D) -> Result<$ty, D::Error>
            where
                D: Deserializer<'de>,
            {
                <$proxy>::deserialize(d).map(<$ty>::from)
            }
        }
    };
}

proxy_module!(vec3, Vec3, Vec3Def);
proxy_module!(uvec3, UVec3, UVec3Def);
proxy_module!(mat3, Mat3, Mat3Def);
