use nalgebra::Vector3;
use skyshot::{
    celestial::{Equatorial, look_at_star},
    psf::Psf,
    scene::CAMERA,
    session::{
        MockTransport, Session, SessionConfig,
        protocol::{ImageFormat, PsfKernel, SceneSettings},
    },
};
use std::collections::BTreeMap;

fn main() {
    // Swap in `Session::connect("localhost", 5151)` to talk to a real server.
    let mut session = Session::with_transport(MockTransport::new(), SessionConfig::default());
    println!("server version {}", session.version().expect("no version"));

    let psf = Psf::gaussian(5, 0.8).expect("sigma is positive");
    let settings = SceneSettings {
        fov_deg: 0.5,
        image_size: (41, 41),
        samples_per_pixel: 32,
        psf: Some(PsfKernel::from(&psf)),
        ..Default::default()
    };
    session
        .configure_scene(&settings)
        .expect("failed to configure scene");

    session
        .create_shape(
            "sun_shape",
            "sphere.shp",
            BTreeMap::from([("radius".to_string(), 6.96342e8)]),
        )
        .expect("failed to create shape");
    session
        .create_brdf("sun", "sun.brdf", BTreeMap::new())
        .expect("failed to create brdf");
    session
        .create_body("sun", "sun_shape", "sun", &[])
        .expect("failed to create body");
    session
        .set_object_position("sun", &Vector3::new(0.0, 0.0, 1.5e11))
        .expect("failed to place body");
    session
        .set_sun_power([3.8e26; 4])
        .expect("failed to set sun power");

    let star = Equatorial::example_star("vega").expect("star is bundled");
    let attitude = look_at_star(&settings.conventions.boresight(), &star).expect("star is visible");
    session
        .set_object_position(CAMERA, &Vector3::zeros())
        .expect("failed to place camera");
    session
        .set_object_attitude(CAMERA, &attitude)
        .expect("failed to point camera");

    session.render().expect("render failed");
    let frame = session.frame(ImageFormat::Rgba8).expect("no frame");
    dbg!((frame.rows, frame.cols, frame.channels));

    let image = session.image(ImageFormat::Gray32F).expect("no image");
    let patch = image
        .get_patch(skyshot::image::Window::square(20, 20, 2))
        .expect("window lies inside the image");
    println!("{patch}");

    session.reset().expect("failed to reset");
    let transport = session.close().expect("failed to close");
    println!("{} requests sent", transport.requests().len());
}
