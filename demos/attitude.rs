use nalgebra::Vector3;
use skyshot::{
    attitude::{Quaternion, ScalarOrder, attitude_toward, attitude_toward_or},
    celestial::{Equatorial, look_at_star},
    error::Error,
};
use uom::si::{angle::degree, f64::Angle};

fn main() {
    // A camera looking down its Z axis.
    let boresight = Vector3::z();

    // Rotate the boresight onto the X axis.
    let q = attitude_toward(&boresight, &Vector3::x()).expect("directions are not antiparallel");
    dbg!(q.components(ScalarOrder::First));
    dbg!(q.rotate(&boresight));
    dbg!(q.angle().get::<degree>());

    // Roll about the boresight, then slew.
    let roll = Quaternion::from_axis_angle(&boresight, Angle::new::<degree>(30.0))
        .expect("axis is not zero");
    let slewed = roll.compose(&q).expect("attitudes are not degenerate");
    dbg!(slewed.rotate(&boresight));

    // Pointing straight behind the camera has no unique minimal rotation.
    match attitude_toward(&boresight, &-boresight) {
        Err(Error::AmbiguousRotation) => println!("antiparallel target needs a disambiguating axis"),
        other => panic!("unexpected result: {other:?}"),
    }
    let flip = attitude_toward_or(&boresight, &-boresight, &Vector3::y())
        .expect("fallback axis is not parallel to the boresight");
    dbg!(flip.rotate(&boresight));

    // Point the camera at each bundled star.
    for name in ["sirius", "vega", "betelgeuse"] {
        let star = Equatorial::example_star(name).expect("star is bundled");
        let q = look_at_star(&boresight, &star).expect("star is not behind the camera");
        println!(
            "{name:>10}: q = {:?}, boresight -> {:?}",
            q.components(ScalarOrder::Last),
            q.rotate(&boresight).as_slice()
        );
    }
}
