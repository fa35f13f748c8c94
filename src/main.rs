use std::error::Error;
use std::fs;
use std::io::{self, Read, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};

use terrain_erosion::export;
use terrain_erosion::heightmap::{self, TerrainParams};
use terrain_erosion::worker::{ErosionRequest, ErosionResponse, ErosionWorker};

#[derive(Parser, Debug)]
#[command(name = "terrain_erosion")]
#[command(about = "Run hydraulic erosion on a keyed heightmap")]
struct Args {
    /// Request JSON ({grid, gridSize, config}); reads stdin if omitted
    #[arg(short, long, conflicts_with = "generate")]
    input: Option<PathBuf>,

    /// Where to write the response JSON; stdout if omitted
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Synthesize the input heightmap instead of reading a request
    #[arg(short, long, value_enum)]
    generate: Option<Terrain>,

    /// Side length of a synthesized heightmap
    #[arg(long, default_value = "128")]
    size: usize,

    /// Number of droplets (overrides the request)
    #[arg(short = 'n', long)]
    iterations: Option<usize>,

    /// Random seed (overrides the request)
    #[arg(short, long)]
    seed: Option<u64>,

    /// Render the eroded terrain as a shaded PNG
    #[arg(long)]
    png: Option<PathBuf>,

    /// Pretty-print the response JSON
    #[arg(long)]
    pretty: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Terrain {
    Flat,
    Slope,
    Noise,
}

fn main() -> ExitCode {
    env_logger::init();
    let args = Args::parse();

    match run(&args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Returns whether the worker reported success.
fn run(args: &Args) -> Result<bool, Box<dyn Error>> {
    let mut request = match args.generate {
        Some(terrain) => generate_request(terrain, args.size, args.seed.unwrap_or(0)),
        None => read_request(args.input.as_ref())?,
    };
    if args.iterations.is_some() {
        request.iterations = args.iterations;
    }
    if args.seed.is_some() {
        request.seed = args.seed;
    }

    let grid_size = request.grid_size;
    log::info!(
        "eroding {}x{} heightmap ({} droplets)",
        grid_size,
        grid_size,
        request.erosion().iterations()
    );

    let mut worker = ErosionWorker::spawn()?;
    let response = worker.run_blocking(request)?;
    worker.shutdown()?;

    if let (Some(path), ErosionResponse::Success { grid }) = (&args.png, &response) {
        let eroded = heightmap::from_grid_map(grid, grid_size)?;
        export::save_png(&export::render_shaded_heightmap(&eroded), path)?;
        log::info!("saved relief to {}", path.display());
    }

    let json = if args.pretty {
        serde_json::to_string_pretty(&response)?
    } else {
        serde_json::to_string(&response)?
    };
    match &args.output {
        Some(path) => fs::write(path, json)?,
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(json.as_bytes())?;
            stdout.write_all(b"\n")?;
        }
    }

    if let ErosionResponse::Error { error } = &response {
        eprintln!("erosion failed: {}", error);
    }
    Ok(response.is_success())
}

fn read_request(input: Option<&PathBuf>) -> Result<ErosionRequest, Box<dyn Error>> {
    let text = match input {
        Some(path) => fs::read_to_string(path)?,
        None => {
            let mut buf = String::new();
            io::stdin().read_to_string(&mut buf)?;
            buf
        }
    };
    Ok(serde_json::from_str(&text)?)
}

fn generate_request(terrain: Terrain, size: usize, seed: u64) -> ErosionRequest {
    let map = match terrain {
        Terrain::Flat => heightmap::flat(size, 1.0),
        Terrain::Slope => heightmap::slope(size, size as f32, 1.0),
        Terrain::Noise => heightmap::generate_noise_terrain(size, seed, &TerrainParams::default()),
    };
    ErosionRequest::new(heightmap::to_grid_map(&map), size)
}
