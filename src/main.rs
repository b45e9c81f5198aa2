use std::path::PathBuf;
use std::time::Instant;

use clap::Parser;
use patchmatch_stereo::{MatchOptions, StereoMatcher};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod error;
mod io;
mod viz;

#[derive(Parser)]
#[command(name = "parallax")]
#[command(about = "PatchMatch stereo disparity maps from a rectified image pair")]
struct Cli {
    /// Left image of the rectified pair
    left: PathBuf,

    /// Right image of the rectified pair
    right: PathBuf,

    /// Output prefix; writes <prefix>_left.png and <prefix>_right.png
    #[arg(short, long, default_value = "disparity")]
    output: String,

    /// Support window side length (odd)
    #[arg(long, default_value_t = 35)]
    patch_size: i32,

    /// Minimum disparity searched in the left view
    #[arg(long, default_value_t = 0)]
    min_disparity: i32,

    /// Maximum disparity searched in the left view
    #[arg(long, default_value_t = 64)]
    max_disparity: i32,

    /// Adaptive-weight colour bandwidth
    #[arg(long, default_value_t = 10.0)]
    gamma: f32,

    /// Colour/gradient blend (0 = colour only, 1 = gradient only)
    #[arg(long, default_value_t = 0.9)]
    alpha: f32,

    /// Colour dissimilarity truncation threshold
    #[arg(long, default_value_t = 10.0)]
    tau_color: f32,

    /// Gradient dissimilarity truncation threshold
    #[arg(long, default_value_t = 2.0)]
    tau_gradient: f32,

    /// Number of propagation iterations
    #[arg(long, default_value_t = 3)]
    iterations: u32,

    /// Run the left/right consistency check
    #[arg(long)]
    lr_check: bool,

    /// Consistency tolerance in pixels
    #[arg(long, default_value_t = 1.0)]
    lr_threshold: f32,

    /// Fill pixels invalidated by the consistency check
    #[arg(long)]
    fill_holes: bool,

    /// Restrict planes to frontal-parallel windows
    #[arg(long)]
    frontal_parallel: bool,

    /// Round disparity hypotheses to integers
    #[arg(long)]
    integer_disparity: bool,

    /// Fix the pseudo-random seed for reproducible output
    #[arg(long)]
    seed: Option<u64>,
}

impl Cli {
    fn match_options(&self) -> MatchOptions {
        let mut options = MatchOptions::new()
            .patch_size(self.patch_size)
            .disparity_range(self.min_disparity, self.max_disparity)
            .gamma(self.gamma)
            .alpha(self.alpha)
            .tau_color(self.tau_color)
            .tau_gradient(self.tau_gradient)
            .num_iterations(self.iterations)
            .fill_holes(self.fill_holes)
            .frontal_parallel(self.frontal_parallel)
            .integer_disparity(self.integer_disparity);
        if self.lr_check {
            options = options.check_lr(self.lr_threshold);
        }
        if let Some(seed) = self.seed {
            options = options.seed(seed);
        }
        options
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "parallax=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().without_time())
        .init();

    let cli = Cli::parse();

    let left = io::load_bgr(&cli.left)?;
    let right = io::load_bgr(&cli.right)?;
    io::check_pair(&left, &right)?;
    tracing::info!(width = left.width, height = left.height, "loaded stereo pair");

    let mut matcher = StereoMatcher::new(left.width, left.height, cli.match_options())?;

    let started = Instant::now();
    let (disp_left, disp_right) = matcher.compute(&left.data, &right.data)?;
    tracing::info!(elapsed = ?started.elapsed(), "matching finished");

    let left_path = PathBuf::from(format!("{}_left.png", cli.output));
    let right_path = PathBuf::from(format!("{}_right.png", cli.output));
    viz::save_png(&disp_left, &left_path)?;
    viz::save_png(&disp_right, &right_path)?;
    println!(
        "Wrote {} and {}",
        left_path.display(),
        right_path.display()
    );

    Ok(())
}
