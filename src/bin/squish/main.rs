//! Squish CLI - flatten meshes from the command line.
//!
//! Usage: squish <COMMAND> [OPTIONS] <INPUT> [OUTPUT]
//!
//! Run `squish --help` for available commands.

use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use clap::{Parser, Subcommand, ValueEnum};

use squisher::adapt::adapt_mesh;
use squisher::algo::{flatten_with_progress, Progress};
use squisher::io;
use squisher::params::{FlatteningAlgorithm, SquishOptions, SquishParameters};

#[derive(Parser)]
#[command(name = "squish")]
#[command(author, version, about = "Mesh flattening CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Display mesh information
    Info {
        /// Input mesh file
        input: PathBuf,

        /// Merge coincident vertices before analysing topology
        #[arg(long)]
        preserve_topology: bool,
    },

    /// Flatten a mesh into the plane
    Flatten {
        /// Input mesh file
        input: PathBuf,

        /// Output mesh file (the pattern, on z = 0)
        output: PathBuf,

        /// Flattening algorithm
        #[arg(short, long, value_enum, default_value = "physical-stress")]
        algorithm: Algorithm,

        /// Length-ratio limit in [-1, 1]: negative caps compression, positive caps stretching
        #[arg(short = 'l', long, default_value = "0.0", allow_hyphen_values = true)]
        absolute_limit: f64,

        /// Spring constant for compressed boundary edges
        #[arg(long, default_value = "1.0")]
        boundary_compress: f64,

        /// Spring constant for stretched boundary edges
        #[arg(long, default_value = "1.0")]
        boundary_stretch: f64,

        /// Spring constant for compressed interior edges
        #[arg(long, default_value = "1.0")]
        interior_compress: f64,

        /// Spring constant for stretched interior edges
        #[arg(long, default_value = "1.0")]
        interior_stretch: f64,

        /// Keep coincident vertices coincident in the pattern
        #[arg(long)]
        preserve_topology: bool,

        /// Build the 3D/2D mapping index and report its round-trip error
        #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
        save_mapping: bool,

        /// Maximum solver iterations
        #[arg(short, long, default_value = "500")]
        iterations: usize,

        /// Convergence threshold, relative to the mean edge length
        #[arg(long, default_value = "1e-7")]
        tolerance: f64,

        /// Use single-threaded execution (for benchmarking)
        #[arg(long)]
        sequential: bool,
    },
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum Algorithm {
    /// As-rigid-as-possible distance preservation
    Geometric,
    /// Mass-spring relaxation
    PhysicalStress,
}

impl From<Algorithm> for FlatteningAlgorithm {
    fn from(a: Algorithm) -> Self {
        match a {
            Algorithm::Geometric => FlatteningAlgorithm::Geometric,
            Algorithm::PhysicalStress => FlatteningAlgorithm::PhysicalStress,
        }
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Info {
            input,
            preserve_topology,
        } => {
            cmd_info(&input, preserve_topology)?;
        }

        Commands::Flatten {
            input,
            output,
            algorithm,
            absolute_limit,
            boundary_compress,
            boundary_stretch,
            interior_compress,
            interior_stretch,
            preserve_topology,
            save_mapping,
            iterations,
            tolerance,
            sequential,
        } => {
            let params = SquishParameters::default()
                .with_algorithm(algorithm.into())
                .with_absolute_limit(absolute_limit)
                .with_spring_constants(boundary_compress, boundary_stretch, interior_compress, interior_stretch)
                .with_preserve_topology(preserve_topology)
                .with_save_mapping(save_mapping);
            let options = SquishOptions::default()
                .with_max_iterations(iterations)
                .with_convergence_tolerance(tolerance)
                .with_parallel(!sequential);
            cmd_flatten(&input, &output, &params, &options)?;
        }
    }

    Ok(())
}

/// Create a progress reporter that displays a progress bar on the terminal.
fn create_progress() -> Progress {
    let max_percent = Arc::new(AtomicUsize::new(0));

    Progress::new(move |current, total, message| {
        if total == 0 {
            return;
        }

        let raw_percent = if current >= total {
            100
        } else {
            ((current * 100) + (total / 2)) / total
        };

        // Monotonic: components report their own slices in turn.
        let previous = max_percent.fetch_max(raw_percent, Ordering::Relaxed);
        let percent = previous.max(raw_percent);
        if percent == previous && percent != 100 {
            return;
        }

        let bar_width = 30;
        let filled = (percent * bar_width) / 100;
        let bar = "=".repeat(filled);
        let space = " ".repeat(bar_width - filled);

        eprint!("\r[{}{}] {:3}% {:<24}", bar, space, percent, message);
        let _ = std::io::stderr().flush();

        if current >= total {
            eprintln!();
        }
    })
}

fn cmd_info(input: &PathBuf, preserve_topology: bool) -> Result<(), Box<dyn std::error::Error>> {
    let mesh = io::load(input)?;

    println!("File: {}", input.display());
    println!("Vertices: {}", mesh.num_vertices());
    println!("Faces: {}", mesh.num_faces());
    println!("Surface area: {:.6}", mesh.area());

    if let Some((min, max)) = mesh.bounding_box() {
        println!(
            "Bounding box: ({:.3}, {:.3}, {:.3}) to ({:.3}, {:.3}, {:.3})",
            min.x, min.y, min.z, max.x, max.y, max.z
        );
        let diag = max - min;
        println!("Dimensions: {:.3} x {:.3} x {:.3}", diag.x, diag.y, diag.z);
    }

    match adapt_mesh(&mesh, preserve_topology, &SquishOptions::default()) {
        Ok(surface) => {
            println!("Flattening variables: {}", surface.num_variables());
            println!("Triangles: {}", surface.triangles().len());
            println!("Average edge length: {:.6}", surface.mean_edge_length());
            println!("Components: {}", surface.components().len());
            let loops = surface.boundary_loops();
            if loops.is_empty() {
                println!("Topology: Closed (no boundary, cannot be flattened)");
            } else {
                let sizes: Vec<String> = loops.iter().map(|l| l.len().to_string()).collect();
                println!("Boundary loops: {} (vertices: {})", loops.len(), sizes.join(", "));
            }
        }
        Err(e) => println!("Topology: not flattenable ({})", e),
    }

    Ok(())
}

fn cmd_flatten(
    input: &PathBuf,
    output: &PathBuf,
    params: &SquishParameters,
    options: &SquishOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let mesh = io::load(input)?;
    println!("Loaded: {} vertices, {} faces", mesh.num_vertices(), mesh.num_faces());

    params.validate()?;
    let surface = adapt_mesh(&mesh, params.preserve_topology, options)?;

    let mode = if options.parallel { "parallel" } else { "sequential" };
    println!(
        "Flattening {} components ({:?}, limit {}, {})...",
        surface.components().len(),
        params.algorithm,
        params.absolute_limit,
        mode
    );
    let progress = create_progress();

    let start = Instant::now();
    let result = flatten_with_progress(&surface, params, options, &progress)?;
    let elapsed = start.elapsed();

    let report = result.report();
    println!(
        "Result: {} iterations, {}, length ratio [{:.6}, {:.6}]",
        report.iterations,
        if report.converged { "converged" } else { "not converged" },
        report.min_ratio,
        report.max_ratio
    );
    for warning in &report.warnings {
        println!("Warning: {}", warning);
    }

    if let Ok(mapping) = result.mapping() {
        let worst = mesh
            .vertices
            .iter()
            .filter_map(|p| {
                let back = mapping.forward(p).and_then(|q| mapping.backward(&q)).ok()?;
                Some((back - *p).norm())
            })
            .fold(0.0, f64::max);
        println!(
            "Mapping: {} triangles, worst vertex round trip {:.3e}",
            mapping.num_triangles(),
            worst
        );
    }

    io::save(result.mesh(), output)?;
    println!("Saved: {} ({:.2?})", output.display(), elapsed);

    Ok(())
}
