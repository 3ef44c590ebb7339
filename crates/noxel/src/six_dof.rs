//! Generalized 6‑DOF vector: stacked translation and rotation parts.
//!
//! Used by the solver for forces/torques, drive directions and outputs. All
//! norms and distances are Euclidean over the 6 stacked components.

use std::fmt;
use std::ops::{Add, AddAssign, Mul, Neg, Sub};

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// Translation + rotation pair, value type.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SixDofVector {
    pub translation: Vector3<f64>,
    pub rotation: Vector3<f64>,
}

impl SixDofVector {
    #[inline]
    pub fn new(translation: Vector3<f64>, rotation: Vector3<f64>) -> Self {
        Self {
            translation,
            rotation,
        }
    }

    #[inline]
    pub fn zeros() -> Self {
        Self::default()
    }

    /// Build from 6 stacked components `[tx, ty, tz, rx, ry, rz]`.
    #[inline]
    pub fn from_array(c: [f64; 6]) -> Self {
        Self {
            translation: Vector3::new(c[0], c[1], c[2]),
            rotation: Vector3::new(c[3], c[4], c[5]),
        }
    }

    #[inline]
    pub fn to_array(&self) -> [f64; 6] {
        [
            self.translation.x,
            self.translation.y,
            self.translation.z,
            self.rotation.x,
            self.rotation.y,
            self.rotation.z,
        ]
    }

    /// Basis vector `e_i` scaled by `scale`; `i < 3` is translation.
    pub fn axis(i: usize, scale: f64) -> Self {
        let mut v = Self::zeros();
        *v.component_mut(i) = scale;
        v
    }

    /// Component `i` in stacked order. Panics if `i >= 6`.
    #[inline]
    pub fn component(&self, i: usize) -> f64 {
        assert!(i < 6, "6-DOF component index out of range: {i}");
        if i < 3 {
            self.translation[i]
        } else {
            self.rotation[i - 3]
        }
    }

    #[inline]
    pub fn component_mut(&mut self, i: usize) -> &mut f64 {
        assert!(i < 6, "6-DOF component index out of range: {i}");
        if i < 3 {
            &mut self.translation[i]
        } else {
            &mut self.rotation[i - 3]
        }
    }

    #[inline]
    pub fn norm_squared(&self) -> f64 {
        self.translation.norm_squared() + self.rotation.norm_squared()
    }

    #[inline]
    pub fn norm(&self) -> f64 {
        self.norm_squared().sqrt()
    }

    /// Unit vector in the same direction, or `None` for a (near) zero vector.
    pub fn try_normalize(&self, eps: f64) -> Option<Self> {
        let n = self.norm();
        if !n.is_finite() || n <= eps {
            return None;
        }
        Some(*self * (1.0 / n))
    }

    #[inline]
    pub fn distance(a: &Self, b: &Self) -> f64 {
        (*a - *b).norm()
    }

    #[inline]
    pub fn dot(&self, other: &Self) -> f64 {
        self.translation.dot(&other.translation) + self.rotation.dot(&other.rotation)
    }

    /// Component-wise product.
    #[inline]
    pub fn component_mul(&self, other: &Self) -> Self {
        Self {
            translation: self.translation.component_mul(&other.translation),
            rotation: self.rotation.component_mul(&other.rotation),
        }
    }

    /// Sum of the 6 components.
    #[inline]
    pub fn sum(&self) -> f64 {
        self.translation.sum() + self.rotation.sum()
    }

    pub fn is_finite(&self) -> bool {
        self.to_array().iter().all(|c| c.is_finite())
    }
}

impl Add for SixDofVector {
    type Output = SixDofVector;
    #[inline]
    fn add(self, rhs: SixDofVector) -> Self::Output {
        SixDofVector {
            translation: self.translation + rhs.translation,
            rotation: self.rotation + rhs.rotation,
        }
    }
}

impl Sub for SixDofVector {
    type Output = SixDofVector;
    #[inline]
    fn sub(self, rhs: SixDofVector) -> Self::Output {
        SixDofVector {
            translation: self.translation - rhs.translation,
            rotation: self.rotation - rhs.rotation,
        }
    }
}

impl Mul<f64> for SixDofVector {
    type Output = SixDofVector;
    #[inline]
    fn mul(self, x: f64) -> Self::Output {
        SixDofVector {
            translation: self.translation * x,
            rotation: self.rotation * x,
        }
    }
}

impl AddAssign for SixDofVector {
    #[inline]
    fn add_assign(&mut self, rhs: SixDofVector) {
        self.translation += rhs.translation;
        self.rotation += rhs.rotation;
    }
}

impl Neg for SixDofVector {
    type Output = SixDofVector;
    #[inline]
    fn neg(self) -> Self::Output {
        SixDofVector {
            translation: -self.translation,
            rotation: -self.rotation,
        }
    }
}

impl fmt::Display for SixDofVector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let t = &self.translation;
        let r = &self.rotation;
        write!(
            f,
            "T:({:.3}, {:.3}, {:.3}) / R:({:.3}, {:.3}, {:.3})",
            t.x, t.y, t.z, r.x, r.y, r.z
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::vector;

    #[test]
    fn distance_is_euclidean_over_six_components() {
        let a = SixDofVector::new(vector![1.0, 0.0, 0.0], vector![0.0, 0.0, 0.0]);
        let b = SixDofVector::new(vector![0.0, 0.0, 0.0], vector![0.0, 2.0, 2.0]);
        let d = SixDofVector::distance(&a, &b);
        assert!((d - 3.0).abs() < 1e-12);
        assert!((SixDofVector::distance(&a, &a)).abs() < 1e-12);
    }

    #[test]
    fn components_stack_translation_then_rotation() {
        let mut v = SixDofVector::from_array([1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        assert_eq!(v.component(0), 1.0);
        assert_eq!(v.component(5), 6.0);
        *v.component_mut(3) = -4.0;
        assert_eq!(v.rotation.x, -4.0);
        assert!((v.sum() - 13.0).abs() < 1e-12);
        assert_eq!(SixDofVector::axis(4, 100.0).rotation.y, 100.0);
    }

    #[test]
    fn arithmetic_and_normalize() {
        let a = SixDofVector::from_array([3.0, 0.0, 0.0, 0.0, 4.0, 0.0]);
        assert!((a.norm() - 5.0).abs() < 1e-12);
        let u = a.try_normalize(1e-12).unwrap();
        assert!((u.norm() - 1.0).abs() < 1e-12);
        assert!(SixDofVector::zeros().try_normalize(1e-12).is_none());
        let mut s = a + a * 2.0 - a;
        s += -a;
        assert!((s - a).norm() < 1e-12);
        assert_eq!(a.component_mul(&a).to_array()[4], 16.0);
    }
}
