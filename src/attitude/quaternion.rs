use crate::error::Error;
use nalgebra::{Rotation3, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};
use uom::si::{angle::radian, f64::Angle};

/// Magnitudes at or below this are treated as zero.
pub(crate) const DEGENERATE_NORM: f64 = 1e-12;

/// Describes the position of the scalar part when a quaternion is laid out as four numbers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalarOrder {
    /// `[w, x, y, z]`
    First,

    /// `[x, y, z, w]`
    #[default]
    Last,
}

/// Describes an attitude as a rotation quaternion.
///
/// Components are held as `(x, y, z, w)` where `w` is the scalar part.
/// Rotations act on vectors actively using the Hamilton convention, `v' = q v q*`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Quaternion {
    x: f64,
    y: f64,
    z: f64,
    w: f64,
}

impl Quaternion {
    /// Creates a `Quaternion` from raw components without normalizing.
    pub fn new(x: f64, y: f64, z: f64, w: f64) -> Self {
        Self { x, y, z, w }
    }

    /// The attitude that applies no rotation.
    pub fn identity() -> Self {
        Self::new(0.0, 0.0, 0.0, 1.0)
    }

    /// Creates a unit `Quaternion` rotating by `angle` about `axis`.
    ///
    /// `axis` does not need to be normalized but it must have a non-zero length.
    pub fn from_axis_angle(axis: &Vector3<f64>, angle: Angle) -> Result<Self, Error> {
        let magnitude = axis.norm();
        if !(magnitude > DEGENERATE_NORM) || !magnitude.is_finite() {
            return Err(Error::DegenerateInput {
                what: "rotation axis",
                magnitude,
            });
        }

        let half = angle.get::<radian>() / 2.;
        let v = axis / magnitude * half.sin();
        Ok(Self::new(v.x, v.y, v.z, half.cos()))
    }

    /// Folds a sequence of axis-angle rotations into one attitude.
    ///
    /// The first rotation of `rotations` is applied first.
    pub fn from_rotations<I>(rotations: I) -> Result<Self, Error>
    where
        I: IntoIterator<Item = (Vector3<f64>, Angle)>,
    {
        rotations
            .into_iter()
            .try_fold(Self::identity(), |attitude, (axis, angle)| {
                attitude.compose(&Self::from_axis_angle(&axis, angle)?)
            })
    }

    pub fn x(&self) -> f64 {
        self.x
    }

    pub fn y(&self) -> f64 {
        self.y
    }

    pub fn z(&self) -> f64 {
        self.z
    }

    pub fn w(&self) -> f64 {
        self.w
    }

    /// Returns the vector part `(x, y, z)`.
    pub fn vector(&self) -> Vector3<f64> {
        Vector3::new(self.x, self.y, self.z)
    }

    /// Returns the four components in the layout described by `order`.
    pub fn components(&self, order: ScalarOrder) -> [f64; 4] {
        match order {
            ScalarOrder::First => [self.w, self.x, self.y, self.z],
            ScalarOrder::Last => [self.x, self.y, self.z, self.w],
        }
    }

    /// Creates a `Quaternion` from four components laid out as described by `order`.
    pub fn from_components(components: [f64; 4], order: ScalarOrder) -> Self {
        let [a, b, c, d] = components;
        match order {
            ScalarOrder::First => Self::new(b, c, d, a),
            ScalarOrder::Last => Self::new(a, b, c, d),
        }
    }

    pub fn norm(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z + self.w * self.w).sqrt()
    }

    /// Returns `self` scaled to unit norm.
    ///
    /// A quaternion already within a few ulps of unit norm is returned unchanged so
    /// that normalizing twice gives bit-identical results.
    pub fn normalize(&self) -> Result<Self, Error> {
        let norm = self.norm();
        if !(norm > DEGENERATE_NORM) || !norm.is_finite() {
            return Err(Error::DegenerateInput {
                what: "quaternion",
                magnitude: norm,
            });
        }

        if (norm - 1.0).abs() <= 8. * f64::EPSILON {
            return Ok(*self);
        }

        Ok(Self::new(
            self.x / norm,
            self.y / norm,
            self.z / norm,
            self.w / norm,
        ))
    }

    pub fn conjugate(&self) -> Self {
        Self::new(-self.x, -self.y, -self.z, self.w)
    }

    /// Returns the attitude that applies `self` first, then `other`.
    ///
    /// The product is renormalized so chains of compositions do not drift away from
    /// unit norm.
    pub fn compose(&self, other: &Quaternion) -> Result<Self, Error> {
        let (x1, y1, z1, w1) = (self.x, self.y, self.z, self.w);
        let (x2, y2, z2, w2) = (other.x, other.y, other.z, other.w);

        Self::new(
            w2 * x1 + x2 * w1 + y2 * z1 - z2 * y1,
            w2 * y1 - x2 * z1 + y2 * w1 + z2 * x1,
            w2 * z1 + x2 * y1 - y2 * x1 + z2 * w1,
            w2 * w1 - x2 * x1 - y2 * y1 - z2 * z1,
        )
        .normalize()
    }

    /// Rotates `v` by this attitude.
    ///
    /// Assumes `self` has unit norm.
    pub fn rotate(&self, v: &Vector3<f64>) -> Vector3<f64> {
        let u = self.vector();
        let t = u.cross(v) * 2.;
        v + t * self.w + u.cross(&t)
    }

    /// Returns the rotation angle on the range `[0, PI]`.
    pub fn angle(&self) -> Angle {
        Angle::new::<radian>(2. * self.vector().norm().atan2(self.w.abs()))
    }

    pub fn to_rotation_matrix(&self) -> Rotation3<f64> {
        UnitQuaternion::from_quaternion(nalgebra::Quaternion::new(
            self.w, self.x, self.y, self.z,
        ))
        .to_rotation_matrix()
    }
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::identity()
    }
}

impl From<UnitQuaternion<f64>> for Quaternion {
    fn from(unit: UnitQuaternion<f64>) -> Self {
        // nalgebra stores the scalar part last.
        let c = unit.as_ref().coords;
        Self::new(c[0], c[1], c[2], c[3])
    }
}

impl From<Rotation3<f64>> for Quaternion {
    fn from(rotation: Rotation3<f64>) -> Self {
        UnitQuaternion::from_rotation_matrix(&rotation).into()
    }
}
