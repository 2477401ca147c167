use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Context;
use clap::{ArgGroup, Parser, ValueEnum};

use bsp_tiler::{BoundaryCoordinates, ErrorCategory, InputFormat, OutputFormat, TilingConfig, TilingError, TilingReport};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum CliOutputFormat {
    Xyz,
    Las,
    Off,
}

impl From<CliOutputFormat> for OutputFormat {
    fn from(value: CliOutputFormat) -> Self {
        match value {
            CliOutputFormat::Xyz => OutputFormat::Xyz,
            CliOutputFormat::Las => OutputFormat::Las,
            CliOutputFormat::Off => OutputFormat::Off,
        }
    }
}

/// bsp-tiler - Split large point clouds and meshes into bounded-size tiles
#[derive(Parser, Debug)]
#[command(name = "bsp-tiler", version, about)]
#[command(group(ArgGroup::new("input").required(true).multiple(true).args(["files", "dir"])))]
struct Cli {
    /// Input file (.xyz, .las or .off); may be repeated
    #[arg(short = 'f', long = "file", value_name = "FILE")]
    files: Vec<PathBuf>,

    /// Directory whose .xyz, .las and .off files are all inputs
    #[arg(short = 'd', long = "dir", value_name = "DIR")]
    dir: Option<PathBuf>,

    /// Output directory for tiles and index files
    #[arg(short = 'o', long = "output", value_name = "DIR")]
    output: PathBuf,

    /// Target maximum number of vertices per tile
    #[arg(short = 'v', long = "max-vertices", value_name = "N")]
    max_vertices: u64,

    /// Tile file format
    #[arg(short = 'e', long = "extension", value_enum, default_value_t = CliOutputFormat::Xyz)]
    format: CliOutputFormat,

    /// Sample one vertex in N for the downsample
    #[arg(long, value_name = "N", default_value_t = 1000)]
    stride: u64,

    /// Seed for the sampling jitter
    #[arg(long)]
    seed: Option<u64>,

    /// Directory for scratch files (defaults to the output directory)
    #[arg(long, value_name = "DIR")]
    scratch: Option<PathBuf>,

    /// Build LAS tiles from cached coordinates instead of re-reading inputs
    #[arg(long)]
    cache_boundary: bool,

    /// Log progress at info level (RUST_LOG overrides)
    #[arg(long)]
    verbose: bool,
}

impl Cli {
    fn config(&self) -> TilingConfig {
        let mut config = TilingConfig::new(self.max_vertices)
            .with_sample_stride(self.stride)
            .with_output_format(self.format.into());
        if let Some(seed) = self.seed {
            config = config.with_seed(seed);
        }
        if let Some(dir) = &self.scratch {
            config = config.with_scratch_dir(dir);
        }
        if self.cache_boundary {
            config = config.with_boundary_coordinates(BoundaryCoordinates::Cache);
        }
        config
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let default_filter = if cli.verbose { "info" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter)).init();

    match run(&cli) {
        Ok(report) => {
            for path in report.tile_paths() {
                println!("{}", path.display());
            }
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(exit_code(&err))
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<TilingReport> {
    let inputs = collect_inputs(&cli.files, cli.dir.as_deref())?;
    let report = bsp_tiler::tile_files(&inputs, &cli.output, &cli.config())?;
    log::info!(
        "{} tiles from {} vertices ({} empty leaves, seed {})",
        report.tiles.len(),
        report.vertices,
        report.empty_leaves(),
        report.seed
    );
    Ok(report)
}

/// `files` followed by the supported files of `dir`, sorted by name.
fn collect_inputs(files: &[PathBuf], dir: Option<&Path>) -> anyhow::Result<Vec<PathBuf>> {
    let mut inputs = files.to_vec();
    if let Some(dir) = dir {
        let mut found = Vec::new();
        let entries = fs::read_dir(dir).with_context(|| format!("cannot read directory {}", dir.display()))?;
        for entry in entries {
            let path = entry
                .with_context(|| format!("cannot read directory {}", dir.display()))?
                .path();
            if path.is_file() && InputFormat::from_path(&path).is_some() {
                found.push(path);
            }
        }
        found.sort();
        log::info!("Found {} input files in {}", found.len(), dir.display());
        inputs.extend(found);
    }
    Ok(inputs)
}

/// Process status for a failed run.
///
/// An unreadable input directory counts as an input error.
fn exit_code(err: &anyhow::Error) -> u8 {
    if let Some(err) = err.downcast_ref::<TilingError>() {
        err.category().exit_code() as u8
    } else if err.downcast_ref::<io::Error>().is_some() {
        ErrorCategory::Input.exit_code() as u8
    } else {
        1
    }
}
