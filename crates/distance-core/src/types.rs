//! Common types used across the codec
//!
//! Vectors, quaternions and the partial [`Transform`] carried by every level
//! object. A transform element that is `None` is "absent": the object's class
//! default applies, and on disk the element is written as the [`SKIP`] pattern.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// The 4-byte "field absent" marker
pub const SKIP: [u8; 4] = [0xFD, 0xFF, 0xFF, 0x7F];

/// [`SKIP`] read as a little-endian `u32`
pub const SKIP_U32: u32 = u32::from_le_bytes(SKIP);

const EPSILON: f32 = 1e-5;

/// 3D vector (position, scale)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Self = Self { x: 0.0, y: 0.0, z: 0.0 };
    pub const ONE: Self = Self { x: 1.0, y: 1.0, z: 1.0 };

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn to_array(self) -> [f32; 3] {
        [self.x, self.y, self.z]
    }

    pub fn add(&self, other: &Self) -> Self {
        Self::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }

    /// Component-wise product
    pub fn scale(&self, other: &Self) -> Self {
        Self::new(self.x * other.x, self.y * other.y, self.z * other.z)
    }

    pub fn dot(&self, other: &Self) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn cross(&self, other: &Self) -> Self {
        Self {
            x: self.y * other.z - self.z * other.y,
            y: self.z * other.x - self.x * other.z,
            z: self.x * other.y - self.y * other.x,
        }
    }

    /// Whether all three components are equal
    pub fn is_uniform(&self) -> bool {
        (self.x - self.y).abs() < EPSILON && (self.y - self.z).abs() < EPSILON
    }
}

impl Default for Vec3 {
    fn default() -> Self {
        Self::ZERO
    }
}

impl From<[f32; 3]> for Vec3 {
    fn from(v: [f32; 3]) -> Self {
        Self::new(v[0], v[1], v[2])
    }
}

/// Rotation quaternion, stored xyzw as on disk
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quat {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Quat {
    pub const IDENTITY: Self = Self { x: 0.0, y: 0.0, z: 0.0, w: 1.0 };

    pub const fn new(x: f32, y: f32, z: f32, w: f32) -> Self {
        Self { x, y, z, w }
    }

    pub fn to_array(self) -> [f32; 4] {
        [self.x, self.y, self.z, self.w]
    }

    /// Hamilton product `self * other`
    pub fn mul(&self, other: &Self) -> Self {
        Self {
            x: self.w * other.x + self.x * other.w + self.y * other.z - self.z * other.y,
            y: self.w * other.y - self.x * other.z + self.y * other.w + self.z * other.x,
            z: self.w * other.z + self.x * other.y - self.y * other.x + self.z * other.w,
            w: self.w * other.w - self.x * other.x - self.y * other.y - self.z * other.z,
        }
    }

    /// Rotate a vector by this (unit) quaternion
    pub fn rotate(&self, v: &Vec3) -> Vec3 {
        let u = Vec3::new(self.x, self.y, self.z);
        let t = u.cross(v);
        let t = Vec3::new(t.x * 2.0, t.y * 2.0, t.z * 2.0);
        let c = u.cross(&t);
        Vec3::new(
            v.x + self.w * t.x + c.x,
            v.y + self.w * t.y + c.y,
            v.z + self.w * t.z + c.z,
        )
    }

    /// Whether this is (numerically) the identity rotation, in either sign
    pub fn is_identity(&self) -> bool {
        self.x.abs() < EPSILON && self.y.abs() < EPSILON && self.z.abs() < EPSILON
            && (self.w.abs() - 1.0).abs() < EPSILON
    }
}

impl Default for Quat {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl From<[f32; 4]> for Quat {
    fn from(v: [f32; 4]) -> Self {
        Self::new(v[0], v[1], v[2], v[3])
    }
}

/// Position, rotation and scale of an object
///
/// Any element may be absent. A transform with all three elements present is
/// *effective*.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub pos: Option<Vec3>,
    pub rot: Option<Quat>,
    pub scale: Option<Vec3>,
}

impl Transform {
    /// A transform with every element absent
    pub const EMPTY: Self = Self { pos: None, rot: None, scale: None };

    pub fn new(pos: Option<Vec3>, rot: Option<Quat>, scale: Option<Vec3>) -> Self {
        Self { pos, rot, scale }
    }

    /// The identity transform with every element present
    pub fn fill() -> Self {
        Self {
            pos: Some(Vec3::ZERO),
            rot: Some(Quat::IDENTITY),
            scale: Some(Vec3::ONE),
        }
    }

    /// Whether pos, rot and scale are all present
    pub fn is_effective(&self) -> bool {
        self.pos.is_some() && self.rot.is_some() && self.scale.is_some()
    }

    /// Fill absent elements from `defaults`, then from the identity
    pub fn effective(&self, defaults: &Transform) -> Transform {
        let identity = Transform::fill();
        Transform {
            pos: self.pos.or(defaults.pos).or(identity.pos),
            rot: self.rot.or(defaults.rot).or(identity.rot),
            scale: self.scale.or(defaults.scale).or(identity.scale),
        }
    }

    /// Compose: place `child` (given in this transform's space) into the outer space
    ///
    /// A non-uniform scale can only be carried through a child that is not
    /// rotated; otherwise the scale would shear, which the format cannot express.
    pub fn apply(&self, child: &Transform) -> Result<Transform> {
        let parent = self.effective(&Transform::EMPTY);
        let child = child.effective(&Transform::EMPTY);
        let (ppos, prot, pscale) = (parent.pos.unwrap_or_default(), parent.rot.unwrap_or_default(), parent.scale.unwrap_or(Vec3::ONE));
        let (cpos, crot, cscale) = (child.pos.unwrap_or_default(), child.rot.unwrap_or_default(), child.scale.unwrap_or(Vec3::ONE));

        if !pscale.is_uniform() && !crot.is_identity() {
            return Err(Error::Transform {
                message: format!(
                    "cannot rotate child inside non-uniform scale ({}, {}, {})",
                    pscale.x, pscale.y, pscale.z
                ),
            });
        }

        Ok(Transform {
            pos: Some(ppos.add(&prot.rotate(&pscale.scale(&cpos)))),
            rot: Some(prot.mul(&crot)),
            scale: Some(pscale.scale(&cscale)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec3_operations() {
        let v1 = Vec3::new(1.0, 2.0, 3.0);
        let v2 = Vec3::new(4.0, 5.0, 6.0);

        assert!((v1.dot(&v2) - 32.0).abs() < 0.001);

        let cross = v1.cross(&v2);
        assert!((cross.x - (-3.0)).abs() < 0.001);
        assert!((cross.y - 6.0).abs() < 0.001);
        assert!((cross.z - (-3.0)).abs() < 0.001);
    }

    #[test]
    fn test_skip_pattern() {
        assert_eq!(SKIP_U32.to_le_bytes(), SKIP);
    }

    #[test]
    fn test_effective_fill() {
        let partial = Transform::new(Some(Vec3::new(1.0, 2.0, 3.0)), None, None);
        assert!(!partial.is_effective());

        let defaults = Transform::new(None, None, Some(Vec3::new(2.0, 2.0, 2.0)));
        let eff = partial.effective(&defaults);
        assert!(eff.is_effective());
        assert_eq!(eff.rot, Some(Quat::IDENTITY));
        assert_eq!(eff.scale, Some(Vec3::new(2.0, 2.0, 2.0)));
    }

    #[test]
    fn test_apply_translation_and_scale() {
        let parent = Transform::new(Some(Vec3::new(10.0, 0.0, 0.0)), None, Some(Vec3::new(2.0, 2.0, 2.0)));
        let child = Transform::new(Some(Vec3::new(1.0, 1.0, 1.0)), None, None);

        let out = parent.apply(&child).unwrap();
        assert_eq!(out.pos, Some(Vec3::new(12.0, 2.0, 2.0)));
        assert_eq!(out.scale, Some(Vec3::new(2.0, 2.0, 2.0)));
    }

    #[test]
    fn test_apply_rotation() {
        // 90 degrees around z
        let h = std::f32::consts::FRAC_1_SQRT_2;
        let parent = Transform::new(None, Some(Quat::new(0.0, 0.0, h, h)), None);
        let child = Transform::new(Some(Vec3::new(1.0, 0.0, 0.0)), None, None);

        let pos = parent.apply(&child).unwrap().pos.unwrap();
        assert!(pos.x.abs() < 1e-5);
        assert!((pos.y - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_apply_locked_axes() {
        let h = std::f32::consts::FRAC_1_SQRT_2;
        let parent = Transform::new(None, None, Some(Vec3::new(1.0, 2.0, 1.0)));
        let child = Transform::new(None, Some(Quat::new(0.0, 0.0, h, h)), None);

        let err = parent.apply(&child).unwrap_err();
        assert!(matches!(err, Error::Transform { .. }));
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        fn vec3() -> impl Strategy<Value = Vec3> {
            (-1e3f32..1e3, -1e3f32..1e3, -1e3f32..1e3).prop_map(|(x, y, z)| Vec3::new(x, y, z))
        }

        proptest! {
            #[test]
            fn prop_effective_is_effective(pos in proptest::option::of(vec3()), scale in proptest::option::of(vec3())) {
                let t = Transform::new(pos, None, scale);
                let eff = t.effective(&Transform::EMPTY);
                prop_assert!(eff.is_effective());
                prop_assert_eq!(eff.pos, Some(pos.unwrap_or_default()));
            }

            #[test]
            fn prop_identity_parent_keeps_child(pos in vec3(), scale in vec3()) {
                let child = Transform::new(Some(pos), None, Some(scale));
                let out = Transform::fill().apply(&child).unwrap();
                prop_assert_eq!(out.pos, Some(pos));
                prop_assert_eq!(out.scale, Some(scale));
            }
        }
    }
}
