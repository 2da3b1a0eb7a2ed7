use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use rectcheck::logging::init_logging_default;
use rectcheck::{check_overlap_rect, run_stress, Coord3, HostRectDevice, RectStressConfig};
use serde::Serialize;

#[derive(Parser, Debug)]
#[command(name = "rectcheck", version)]
#[command(about = "Verify rect copy, read and write commands against host shadow buffers", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a randomized session against the host device
    Run {
        /// JSON configuration file; flags below override its values
        #[arg(long)]
        config: Option<PathBuf>,
        /// Seed for every random choice (also RECTCHECK_SEED)
        #[arg(long)]
        seed: Option<u64>,
        /// Number of random operations (also RECTCHECK_NUM_TRIES)
        #[arg(long)]
        tries: Option<usize>,
        /// Number of buffers
        #[arg(long)]
        buffers: Option<usize>,
        /// Largest allowed allocation in bytes
        #[arg(long)]
        max_alloc_bytes: Option<usize>,
        /// Bytes per element
        #[arg(long)]
        element_size: Option<usize>,
        /// Divisor applied to the guessed maximum dimension
        #[arg(long)]
        alloc_scale: Option<usize>,
        /// Verify source and destination after every operation
        #[arg(long)]
        verify_each: bool,
        /// Print the session report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Evaluate the same-buffer overlap rule for one copy
    Overlap {
        /// Source origin "x,y,z" (x in bytes)
        #[arg(long, value_parser = parse_coord)]
        src: Coord3,
        /// Destination origin "x,y,z" (x in bytes)
        #[arg(long, value_parser = parse_coord)]
        dst: Coord3,
        /// Region "w,h,d" (w in bytes)
        #[arg(long, value_parser = parse_coord)]
        region: Coord3,
        #[arg(long)]
        row_pitch: usize,
        #[arg(long, default_value_t = 0)]
        slice_pitch: usize,
        #[arg(long)]
        json: bool,
    },
}

#[derive(Serialize)]
struct OverlapAnswer {
    src: Coord3,
    dst: Coord3,
    region: Coord3,
    row_pitch: usize,
    slice_pitch: usize,
    overlap: bool,
}

fn parse_coord(s: &str) -> Result<Coord3, String> {
    let parts: Vec<&str> = s.split(',').map(str::trim).collect();
    if parts.len() != 3 {
        return Err(format!("expected three comma-separated values, got '{}'", s));
    }
    let mut coord = [0usize; 3];
    for (slot, part) in coord.iter_mut().zip(&parts) {
        *slot = part
            .parse()
            .map_err(|e| format!("invalid component '{}': {}", part, e))?;
    }
    Ok(coord)
}

fn main() -> anyhow::Result<()> {
    init_logging_default();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            seed,
            tries,
            buffers,
            max_alloc_bytes,
            element_size,
            alloc_scale,
            verify_each,
            json,
        } => {
            let mut cfg = match &config {
                Some(path) => RectStressConfig::from_json_file(path)
                    .with_context(|| format!("loading {}", path.display()))?,
                None => RectStressConfig::default(),
            };
            cfg = cfg.apply_env_overrides()?;
            if let Some(seed) = seed {
                cfg.seed = seed;
            }
            if let Some(tries) = tries {
                cfg.num_tries = tries;
            }
            if let Some(buffers) = buffers {
                cfg.num_buffers = buffers;
            }
            if let Some(max_alloc_bytes) = max_alloc_bytes {
                cfg.max_alloc_bytes = max_alloc_bytes;
            }
            if let Some(element_size) = element_size {
                cfg.element_size = element_size;
            }
            if let Some(alloc_scale) = alloc_scale {
                cfg.alloc_scale = alloc_scale;
            }
            cfg.verify_each_operation |= verify_each;

            let report = run_stress(HostRectDevice::new(), &cfg)
                .with_context(|| format!("rect session with seed {} failed", cfg.seed))?;

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                println!(
                    "passed: seed {}, {} buffers ({} bytes), {} copies ({} skipped overlaps), {} reads, {} writes",
                    report.seed,
                    report.buffers.len(),
                    report.total_bytes,
                    report.operations.copies,
                    report.operations.skipped_overlaps,
                    report.operations.read_verifies,
                    report.operations.writes
                );
            }
        }
        Commands::Overlap {
            src,
            dst,
            region,
            row_pitch,
            slice_pitch,
            json,
        } => {
            if row_pitch == 0 {
                anyhow::bail!("row pitch must be non-zero");
            }
            let overlap = check_overlap_rect(src, dst, region, row_pitch, slice_pitch);
            if json {
                let answer = OverlapAnswer {
                    src,
                    dst,
                    region,
                    row_pitch,
                    slice_pitch,
                    overlap,
                };
                println!("{}", serde_json::to_string(&answer)?);
            } else if overlap {
                println!("overlap");
            } else {
                println!("no overlap");
            }
        }
    }

    Ok(())
}
