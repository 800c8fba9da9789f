use clap::Parser;
use skyshot::{
    celestial::{Equatorial, look_at_star},
    error::Error,
    image::{Hot, Window, render_heatmap},
    psf::Psf,
    scene::CAMERA,
    session::{
        MockTransport, Session, SessionConfig,
        protocol::{ImageFormat, PsfKernel, SceneSettings},
        transport::Transport,
    },
};
use nalgebra::Vector3;
use std::{fs, path::PathBuf};
use tracing::info;
use uom::si::angle::degree;

#[derive(Parser)]
#[command(version, about = "Render the sky around a star and report the pixels at its image.", long_about = None)]
struct Args {
    /// Name of a bundled example star, e.g. sirius or vega.
    #[arg(long, default_value = "sirius", conflicts_with_all = ["ra", "dec"])]
    star: String,

    /// Right ascension as hours_minutes_seconds.
    #[arg(long, requires = "dec", allow_hyphen_values = true)]
    ra: Option<String>,

    /// Declination as degrees_arcminutes_arcseconds.
    #[arg(long, requires = "ra", allow_hyphen_values = true)]
    dec: Option<String>,

    #[arg(long, default_value = "localhost")]
    host: String,

    #[arg(long, default_value_t = 5151)]
    port: u16,

    /// Render against an in-memory server instead of connecting.
    #[arg(long)]
    mock: bool,

    /// Camera field of view in degrees.
    #[arg(long, default_value_t = 1.0)]
    fov: f64,

    /// Width and height of the image in pixels.
    #[arg(long, default_value_t = 201)]
    size: u32,

    #[arg(long, default_value_t = 16)]
    samples_per_pixel: u32,

    #[arg(long, default_value_t = 7)]
    psf_size: usize,

    #[arg(long, default_value_t = 1.0)]
    psf_sigma: f64,

    /// Half size of the reported patch in pixels.
    #[arg(long, default_value_t = 3)]
    half: usize,

    /// Star map used as background.
    #[arg(long)]
    starmap: Option<String>,

    /// Directory receiving the image, report and heatmap.
    #[arg(short, long, default_value = ".")]
    output: PathBuf,
}

fn main() -> Result<(), Error> {
    // Register an event subscriber that prints events to STDOUT.
    let subscriber = tracing_subscriber::FmtSubscriber::new();
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|err| Error::InvalidInput(err.to_string()))?;

    let args = Args::parse();

    match args.mock {
        true => run(
            Session::with_transport(MockTransport::new(), SessionConfig::default()),
            &args,
        ),
        false => run(Session::connect(&args.host, args.port)?, &args),
    }
}

fn run<T: Transport>(mut session: Session<T>, args: &Args) -> Result<(), Error> {
    let star = match (&args.ra, &args.dec) {
        (Some(ra), Some(dec)) => Equatorial::from_sexagesimal(ra, dec)?,
        _ => Equatorial::example_star(&args.star)?,
    };
    info!(
        ra_deg = star.right_ascension().get::<degree>(),
        dec_deg = star.declination().get::<degree>(),
        "pointing at star"
    );

    let version = session.version()?;
    info!(%version, "render server");

    let psf = Psf::gaussian(args.psf_size, args.psf_sigma)?;
    let settings = SceneSettings {
        fov_deg: args.fov,
        image_size: (args.size, args.size),
        samples_per_pixel: args.samples_per_pixel,
        psf: Some(PsfKernel::from(&psf)),
        ..Default::default()
    };
    session.configure_scene(&settings)?;

    if let Some(starmap) = &args.starmap {
        session.set_background(starmap)?;
    }

    let attitude = look_at_star(&settings.conventions.boresight(), &star)?;
    session.set_object_position(CAMERA, &Vector3::zeros())?;
    session.set_object_attitude(CAMERA, &attitude)?;

    session.render()?;
    let image = session.image(ImageFormat::Gray32F)?;

    fs::create_dir_all(&args.output)?;
    image.save_float(args.output.join("star.tiff"))?;

    let window = Window::square(image.rows() / 2, image.cols() / 2, args.half);
    let patch = image.patch(window)?;
    println!("{patch}");
    patch.append_report(args.output.join("star_extract.txt"))?;

    let heatmap = render_heatmap(&patch, &Hot, 32)?;
    fs::write(args.output.join("star_heatmap.png"), heatmap)?;
    info!(output = %args.output.display(), "wrote image, report and heatmap");

    session.close()?;
    Ok(())
}
