//! Celestial targets and the attitudes that point a camera at them.

use crate::{
    attitude::{Quaternion, attitude_toward},
    error::Error,
};
use nalgebra::Vector3;
use uom::si::{
    angle::{degree, radian},
    f64::Angle,
};

/// Bright stars handy for pointing checks, as `(name, right ascension, declination)`.
pub const EXAMPLE_STARS: [(&str, &str, &str); 6] = [
    ("sirius", "6_45_8.91728", "-16_42_58.02"),
    ("crux_beta", "12_47_43.32", "-59_41_19.4"),
    ("vega", "18_36_56.33635", "38_47_01.2802"),
    ("alnilam", "5_36_12.81", "-1_12_6.9"),
    ("betelgeuse", "5_55_10.29", "7_24_25.3"),
    ("dubhe", "12_54_1.63", "55_57_35.4"),
];

/// Equatorial coordinates of a target on the celestial sphere in the J2000 frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Equatorial {
    right_ascension: Angle,
    declination: Angle,
}

impl Equatorial {
    /// Creates a new `Equatorial`.
    ///
    /// Fails if `right_ascension` is not on the range `[0, 360)` degrees or
    /// `declination` is not on the range `[-90, 90]` degrees.
    pub fn new(right_ascension: Angle, declination: Angle) -> Result<Self, Error> {
        if !(Angle::new::<degree>(0.0)..Angle::FULL_TURN).contains(&right_ascension) {
            return Err(Error::InvalidInput(format!(
                "expected right ascension in range [0, 360) degrees but got: {}",
                right_ascension.get::<degree>()
            )));
        }

        if !(-Angle::HALF_TURN / 2.0..=Angle::HALF_TURN / 2.0).contains(&declination) {
            return Err(Error::InvalidInput(format!(
                "expected declination in range [-90, 90] degrees but got: {}",
                declination.get::<degree>()
            )));
        }

        Ok(Self {
            right_ascension,
            declination,
        })
    }

    /// Parses a right ascension in hours, minutes, seconds and a declination in degrees,
    /// arcminutes, arcseconds.
    ///
    /// Fields may be separated by `_`, `:` or whitespace, e.g. `"6_45_8.91728"` and
    /// `"-16_42_58.02"`. A leading sign applies to the whole value.
    pub fn from_sexagesimal(right_ascension: &str, declination: &str) -> Result<Self, Error> {
        let hours = parse_sexagesimal(right_ascension, "right ascension")?;
        let degrees = parse_sexagesimal(declination, "declination")?;
        Self::new(
            Angle::new::<degree>(hours * 15.0),
            Angle::new::<degree>(degrees),
        )
    }

    /// Looks up one of [`EXAMPLE_STARS`] by name.
    pub fn example_star(name: &str) -> Result<Self, Error> {
        let (_, ra, dec) = EXAMPLE_STARS
            .iter()
            .find(|(star, _, _)| star.eq_ignore_ascii_case(name))
            .ok_or_else(|| Error::InvalidInput(format!("unknown example star: {name}")))?;

        Self::from_sexagesimal(ra, dec)
    }

    pub fn right_ascension(&self) -> Angle {
        self.right_ascension
    }

    pub fn declination(&self) -> Angle {
        self.declination
    }

    /// Returns the unit vector from the observer toward the target.
    pub fn line_of_sight(&self) -> Vector3<f64> {
        let ra = self.right_ascension.get::<radian>();
        let dec = self.declination.get::<radian>();
        Vector3::new(dec.cos() * ra.cos(), dec.cos() * ra.sin(), dec.sin())
    }
}

/// Parses up to three sexagesimal fields into a single value in units of the first field.
fn parse_sexagesimal(text: &str, what: &str) -> Result<f64, Error> {
    let invalid = |reason: &str| Error::InvalidInput(format!("{what} '{text}' {reason}"));

    let trimmed = text.trim();
    let (sign, unsigned) = match trimmed.strip_prefix('-') {
        Some(rest) => (-1.0, rest),
        None => (1.0, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };

    let fields = unsigned
        .split(|c: char| c == '_' || c == ':' || c.is_whitespace())
        .filter(|field| !field.is_empty())
        .map(|field| {
            field
                .parse::<f64>()
                .map_err(|_| invalid("has a non-numeric field"))
        })
        .collect::<Result<Vec<f64>, Error>>()?;

    if fields.is_empty() || fields.len() > 3 {
        return Err(invalid("must have between one and three fields"));
    }

    if fields.iter().any(|field| !field.is_finite() || *field < 0.0) {
        return Err(invalid("has a negative or non-finite field"));
    }

    if fields[1..].iter().any(|field| *field >= 60.0) {
        return Err(invalid("has minutes or seconds of 60 or more"));
    }

    let value = fields
        .iter()
        .zip([1.0, 60.0, 3600.0])
        .map(|(field, scale)| field / scale)
        .sum::<f64>();

    Ok(sign * value)
}

/// Computes the attitude that points `boresight` at `star`.
pub fn look_at_star(boresight: &Vector3<f64>, star: &Equatorial) -> Result<Quaternion, Error> {
    attitude_toward(boresight, &star.line_of_sight())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rstest::rstest;

    #[rstest]
    #[case("0_0_0", "0_0_0", Vector3::x())]
    #[case("6", "0", Vector3::y())]
    #[case("12:00:00", "0 0 0", -Vector3::x())]
    #[case("18_0_0", "45", Vector3::new(0.0, -0.5f64.sqrt(), 0.5f64.sqrt()))]
    #[case("0_0_0", "-30", Vector3::new(0.75f64.sqrt(), 0.0, -0.5))]
    fn cardinal_directions(#[case] ra: &str, #[case] dec: &str, #[case] expected: Vector3<f64>) {
        let star = Equatorial::from_sexagesimal(ra, dec).unwrap();
        assert_relative_eq!(star.line_of_sight(), expected, epsilon = 1e-15);
    }

    #[rstest]
    #[case("-16_42_58.02", -(16.0 + 42.0 / 60.0 + 58.02 / 3600.0))]
    #[case("-0_30_0", -0.5)]
    #[case("+38_47_01.2802", 38.0 + 47.0 / 60.0 + 1.2802 / 3600.0)]
    fn signed_declination(#[case] dec: &str, #[case] degrees: f64) {
        let star = Equatorial::from_sexagesimal("0", dec).unwrap();
        assert_relative_eq!(star.declination().get::<degree>(), degrees, epsilon = 1e-12);
    }

    #[rstest]
    #[case("24_0_0", "0")]
    #[case("1_60_0", "0")]
    #[case("1_2_3_4", "0")]
    #[case("", "0")]
    #[case("1_x_0", "0")]
    #[case("0", "90_0_1")]
    #[case("0", "10_-5_0")]
    fn invalid_coordinates(#[case] ra: &str, #[case] dec: &str) {
        assert!(matches!(
            Equatorial::from_sexagesimal(ra, dec),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn sirius_line_of_sight() {
        let sirius = Equatorial::example_star("Sirius").unwrap();
        let los = sirius.line_of_sight();

        assert_relative_eq!(los.norm(), 1.0, epsilon = 1e-15);
        assert_relative_eq!(
            sirius.right_ascension().get::<degree>(),
            (6.0 + 45.0 / 60.0 + 8.91728 / 3600.0) * 15.0,
            epsilon = 1e-12
        );
        assert_relative_eq!(los.z, sirius.declination().get::<radian>().sin());
        assert_relative_eq!(
            los.y.atan2(los.x),
            sirius.right_ascension().get::<radian>(),
            epsilon = 1e-12
        );
    }

    #[test]
    fn every_example_star_parses() {
        for (name, _, _) in EXAMPLE_STARS {
            assert!(Equatorial::example_star(name).is_ok(), "{name}");
        }
        assert!(Equatorial::example_star("polaris").is_err());
    }

    #[test]
    fn boresight_points_at_star() {
        let vega = Equatorial::example_star("vega").unwrap();
        let q = look_at_star(&Vector3::z(), &vega).unwrap();
        assert_relative_eq!(q.rotate(&Vector3::z()), vega.line_of_sight(), epsilon = 1e-12);
    }
}
