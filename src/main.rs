use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use tile_registration::config::load_config_or_default;
use tile_registration::logging::init_logging;
use tile_registration::synth::{textured_tile, warp_affine};
use tile_registration::{
    Affine, AngleMode, FftScanner, PairSession, PairTable, PixelPair, SearchPath, TileId,
};

#[derive(Parser)]
#[command(name = "register")]
#[command(about = "Correlation-based pairwise registration of overlapping microscopy tiles")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Optional configuration file (TOML or JSON)
    #[arg(short, long)]
    config: Option<String>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Mode {
    /// Use the --angle override as the center angle
    Override,
    /// Derive the center angle from the prior transform
    Derive,
    /// Median of prior recorded angles for the layer pair
    PriorTable,
}

#[derive(Subcommand)]
enum Commands {
    /// Register one tile pair
    Pair {
        /// Path to tile A image
        #[arg(short, long)]
        a: PathBuf,

        /// Path to tile B image
        #[arg(short, long)]
        b: PathBuf,

        /// Identity of tile A as layer.tile:region
        #[arg(long, default_value = "0.0:0")]
        a_id: String,

        /// Identity of tile B as layer.tile:region
        #[arg(long, default_value = "0.1:0")]
        b_id: String,

        /// Prior transform, six comma-separated affine coefficients
        #[arg(short, long)]
        tab: Option<String>,

        /// Angle resolution mode
        #[arg(short, long, value_enum, default_value_t = Mode::Derive)]
        mode: Mode,

        /// Center-angle override in degrees (mode = override)
        #[arg(long, default_value_t = 0.0)]
        angle: f64,

        /// Working scale reduction factor
        #[arg(short, long, default_value_t = 2)]
        scale: usize,

        /// Use the disc-limited search instead of an angle sweep
        #[arg(long)]
        disc: bool,

        /// Evaluate one correlation for diagnosis and stop
        #[arg(long)]
        debug_cor: bool,

        /// Directory for the result/prior tables
        #[arg(long, default_value = "results/tables")]
        tables: PathBuf,
    },

    /// Register a synthetic pair with known ground truth
    Demo {
        /// Ground-truth rotation, degrees
        #[arg(long, default_value_t = 5.0)]
        rotation: f64,

        /// Ground-truth translation, pixels
        #[arg(long, default_value_t = 12.0)]
        dx: f64,

        #[arg(long, default_value_t = -7.0)]
        dy: f64,

        /// Tile side length, pixels
        #[arg(long, default_value_t = 192)]
        size: u32,

        /// Directory for the result/prior tables
        #[arg(long, default_value = "results/tables")]
        tables: PathBuf,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = load_config_or_default(cli.config.as_deref());
    let _log_guard = init_logging(&config.logging)?;

    match cli.command {
        Commands::Pair {
            a,
            b,
            a_id,
            b_id,
            tab,
            mode,
            angle,
            scale,
            disc,
            debug_cor,
            tables,
        } => {
            let img_a = image::open(&a)?.to_luma8();
            let img_b = image::open(&b)?.to_luma8();
            let px = PixelPair::from_images(&img_a, &img_b, scale)?;

            let tab = match tab {
                Some(s) => parse_affine(&s)?,
                None => Affine::identity(),
            };

            let mode = match mode {
                Mode::Override => AngleMode::Override { deg: angle },
                Mode::Derive => AngleMode::Derive,
                Mode::PriorTable => AngleMode::PriorTable,
            };

            let table = PairTable::new(&tables)?;
            let mut session = PairSession::new(
                parse_tile_id(&a_id)?,
                parse_tile_id(&b_id)?,
                tab,
                &px,
                mode,
                &config,
                &table,
            );
            session.dbg_cor = debug_cor;

            let mut scanner = FftScanner::new(scanner_params(&config));
            let path = if disc { SearchPath::Disc } else { SearchPath::Sweep };
            let outcome = session.run(&mut scanner, path)?;

            report(&outcome);
        }

        Commands::Demo {
            rotation,
            dx,
            dy,
            size,
            tables,
        } => {
            let truth = Affine::rotation_with_translation(rotation.to_radians(), dx, dy);
            let img_a = textured_tile(size, size, 20260825);
            let img_b = warp_affine(&img_a, &truth);

            let px = PixelPair::from_images(&img_a, &img_b, 2)?;
            let table = PairTable::new(&tables)?;

            let mut config = config;
            config.overlap.xy_conf = 0.0;

            let mut session = PairSession::new(
                TileId::new(0, 0, 0),
                TileId::new(0, 1, 0),
                Affine::identity(),
                &px,
                AngleMode::Derive,
                &config,
                &table,
            );

            let mut scanner = FftScanner::new(scanner_params(&config));
            let outcome = session.run(&mut scanner, SearchPath::Sweep)?;

            println!(
                "ground truth: angle {:.3} deg, offset ({:.2}, {:.2})",
                rotation, dx, dy
            );
            report(&outcome);
        }
    }

    Ok(())
}

fn scanner_params(config: &tile_registration::RegistrationConfig) -> tile_registration::search::ScannerParams {
    tile_registration::search::ScannerParams {
        min_sweep_r: config.search.min_sweep_r,
        full_res_radius: config.search.full_res_radius,
    }
}

fn report(outcome: &tile_registration::PairOutcome) {
    match &outcome.err {
        None => println!(
            "registered: angle {:.3} deg, offset ({:.2}, {:.2}), r {:.3}, {:.1} ms",
            outcome.best.angle, outcome.best.x, outcome.best.y, outcome.best.r, outcome.elapsed_ms
        ),
        Some(e) => println!("rejected: {} ({:.1} ms)", e, outcome.elapsed_ms),
    }
}

fn parse_affine(s: &str) -> anyhow::Result<Affine> {
    let parts: Vec<f64> = s
        .split(',')
        .map(|p| p.trim().parse::<f64>())
        .collect::<Result<_, _>>()?;

    anyhow::ensure!(parts.len() == 6, "expected 6 affine coefficients, got {}", parts.len());
    Ok(Affine::from_coeffs([
        parts[0], parts[1], parts[2], parts[3], parts[4], parts[5],
    ]))
}

fn parse_tile_id(s: &str) -> anyhow::Result<TileId> {
    let (layer, rest) = s
        .split_once('.')
        .ok_or_else(|| anyhow::anyhow!("tile id must look like layer.tile:region"))?;
    let (tile, region) = rest
        .split_once(':')
        .ok_or_else(|| anyhow::anyhow!("tile id must look like layer.tile:region"))?;

    Ok(TileId::new(layer.parse()?, tile.parse()?, region.parse()?))
}
