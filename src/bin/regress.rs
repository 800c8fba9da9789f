use clap::Parser;
use skyshot::{
    check::{ErrorHistogram, Thresholds},
    error::Error,
    image::Image,
    scene::SceneConfig,
    session::{MockTransport, Session, SessionConfig, transport::Transport},
};
use std::{
    fs,
    path::{Path, PathBuf},
    process::ExitCode,
};
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(version, about = "Render a scene and compare it against its reference image.", long_about = None)]
struct Args {
    /// Path to the JSON scene description.
    scene: PathBuf,

    /// Directory holding reference images, histograms and thresholds.
    #[arg(short, long, default_value = "references")]
    references: PathBuf,

    /// Regenerate the reference image instead of checking against it.
    #[arg(long)]
    gen_ref: bool,

    /// Regenerate the error histogram.
    #[arg(long)]
    gen_hist: bool,

    /// Regenerate the error thresholds from the current histogram.
    #[arg(long)]
    gen_thres: bool,

    /// Save the rendered image next to the references.
    #[arg(long)]
    save: bool,

    #[arg(long, default_value = "localhost")]
    host: String,

    #[arg(long, default_value_t = 5151)]
    port: u16,

    /// Render against an in-memory server instead of connecting.
    #[arg(long)]
    mock: bool,

    #[arg(long, default_value_t = 1000)]
    bins: usize,

    /// Histogram quantile used when generating thresholds.
    #[arg(long, default_value_t = 0.999)]
    quantile: f64,

    /// Factor applied to the histogram error when generating thresholds.
    #[arg(long, default_value_t = 1.5)]
    margin: f64,
}

fn main() -> Result<ExitCode, Error> {
    // Register an event subscriber that prints events to STDOUT.
    let subscriber = tracing_subscriber::FmtSubscriber::new();
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|err| Error::InvalidInput(err.to_string()))?;

    let args = Args::parse();
    let scene = SceneConfig::from_path(&args.scene)?;

    let image = match args.mock {
        true => render(
            Session::with_transport(MockTransport::new(), SessionConfig::default()),
            &scene,
        )?,
        false => render(Session::connect(&args.host, args.port)?, &scene)?,
    };

    let stem = args
        .scene
        .file_stem()
        .and_then(|stem| stem.to_str())
        .ok_or_else(|| Error::InvalidInput("scene path has no file name".into()))?;
    fs::create_dir_all(&args.references)?;
    let path = |suffix: &str| args.references.join(format!("{stem}{suffix}"));

    if args.save {
        image.save_float(path("_render.tiff"))?;
        image.save_gray8(path("_render.png"))?;
        info!(stem, "saved rendered image");
    }

    if args.gen_ref {
        image.save_float(path(".tiff"))?;
        info!(stem, "generated reference image");
        return Ok(ExitCode::SUCCESS);
    }

    let reference = Image::open(path(".tiff"))?;
    let histogram = ErrorHistogram::between(&image, &reference, args.bins)?;

    if args.gen_hist {
        histogram.save(path(".hist.json"))?;
        info!(stem, samples = histogram.total(), "generated error histogram");
    }

    if args.gen_thres {
        let thresholds = Thresholds::from_histogram(&histogram, args.quantile, args.margin);
        thresholds.save(path(".thres.json"))?;
        info!(stem, max_error = thresholds.max_error, "generated thresholds");
        return Ok(ExitCode::SUCCESS);
    }

    check(&path(".thres.json"), &histogram)
}

fn render<T: Transport>(mut session: Session<T>, scene: &SceneConfig) -> Result<Image, Error> {
    let image = scene.render(&mut session)?;
    session.close()?;
    Ok(image)
}

fn check(thresholds: &Path, histogram: &ErrorHistogram) -> Result<ExitCode, Error> {
    if !thresholds.exists() {
        warn!(path = %thresholds.display(), "no thresholds, run with --gen-thres first");
        return Ok(ExitCode::FAILURE);
    }

    let verdict = Thresholds::load(thresholds)?.check(histogram);
    println!("{verdict}");

    match verdict.passed {
        true => Ok(ExitCode::SUCCESS),
        false => {
            error!(error = verdict.error, max_error = verdict.max_error, "regression check failed");
            Ok(ExitCode::FAILURE)
        }
    }
}
