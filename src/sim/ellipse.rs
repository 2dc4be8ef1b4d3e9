//! Parametric ellipse in 3D
//!
//! An ellipse is defined by:
//! - center: the orbit center
//! - a: main axis vector (from center to the u=0 point)
//! - b: secondary axis vector (encodes the iteration direction)
//!
//! `point_at(u) = center + a*cos(u) + b*sin(u)`. The axes need not be
//! perpendicular; the shape is then a sheared ellipse.

use glam::Vec3;
use std::f32::consts::PI;

/// Ellipse owning its axis vectors
///
/// The perimeter is cached and only refreshed by `recalc_perimeter`, so callers
/// mutating `a` or `b` must recalculate before reading it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ellipse {
    pub center: Vec3,
    pub a: Vec3,
    pub b: Vec3,
    perimeter: f32,
}

impl Default for Ellipse {
    fn default() -> Self {
        Self {
            center: Vec3::ZERO,
            a: Vec3::ZERO,
            b: Vec3::ZERO,
            perimeter: 0.0,
        }
    }
}

impl Ellipse {
    pub fn new(center: Vec3, a: Vec3, b: Vec3) -> Self {
        let mut ellipse = Self {
            center,
            a,
            b,
            perimeter: 0.0,
        };
        ellipse.recalc_perimeter();
        ellipse
    }

    /// Point on the ellipse for parameter `u` (any real value)
    #[inline]
    pub fn point_at(&self, u: f32) -> Vec3 {
        self.center + self.a * u.cos() + self.b * u.sin()
    }

    /// Cached perimeter
    #[inline]
    pub fn perimeter(&self) -> f32 {
        self.perimeter
    }

    /// Refresh the perimeter (Ramanujan's second approximation over the axis lengths)
    pub fn recalc_perimeter(&mut self) -> f32 {
        self.perimeter = ramanujan_perimeter(self.a.length(), self.b.length());
        self.perimeter
    }
}

/// Perimeter of an ellipse with semi-axes `a` and `b`
pub fn ramanujan_perimeter(a: f32, b: f32) -> f32 {
    let sum = a + b;
    let lambda = (a - b) / sum;
    let three_lambda_sq = 3.0 * lambda * lambda;
    PI * sum * (1.0 + three_lambda_sq / (10.0 + (4.0 - three_lambda_sq).sqrt()))
}
