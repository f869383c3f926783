//! Fluid simulation CLI - run fresh fields or resume checkpoints.

use std::env;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::process;

use cellflow::dispatch::{build_engine, load_checkpoint};
use cellflow::error::SimError;
use cellflow::schema::{ConfigError, ScalarType, SimConfig};
use cellflow::Simulator;

const DEFAULT_TICKS: u64 = 1_000_000;

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        print_usage(&args[0]);
        process::exit(1);
    }
    if args[1] == "--help" || args[1] == "-h" {
        print_usage(&args[0]);
        return;
    }

    let cli = match CliArgs::parse(&args[1..]) {
        Ok(cli) => cli,
        Err(err) => {
            eprintln!("Error: {err}");
            eprintln!();
            print_usage(&args[0]);
            process::exit(1);
        }
    };

    if let Err(err) = run(cli) {
        eprintln!("Error: {err}");
        process::exit(1);
    }
}

fn print_usage(program: &str) {
    eprintln!("Cellflow - deterministic cellular fluid simulation");
    eprintln!();
    eprintln!("Usage:");
    eprintln!(
        "  {program} --p-type TYPE --v-type TYPE --v-flow-type TYPE --field-path PATH [options]"
    );
    eprintln!("  {program} --load-path PATH [options]");
    eprintln!();
    eprintln!("Types:");
    eprintln!("  DOUBLE | FLOAT | FIXED(N,K) | FAST_FIXED(N,K)");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --num-threads N   Workers for the flow phase (default 1)");
    eprintln!("  --ticks N         Tick count to run (default {DEFAULT_TICKS})");
    eprintln!("  --save-path PATH  Write a checkpoint after the run");
    eprintln!("  --help, -h        Show this help message");
}

struct CliArgs {
    p_type: Option<ScalarType>,
    v_type: Option<ScalarType>,
    vf_type: Option<ScalarType>,
    field_path: Option<PathBuf>,
    load_path: Option<PathBuf>,
    num_threads: usize,
    ticks: u64,
    save_path: Option<PathBuf>,
}

impl CliArgs {
    fn parse(args: &[String]) -> Result<Self, ConfigError> {
        let mut cli = CliArgs {
            p_type: None,
            v_type: None,
            vf_type: None,
            field_path: None,
            load_path: None,
            num_threads: 1,
            ticks: DEFAULT_TICKS,
            save_path: None,
        };

        let mut iter = args.iter();
        while let Some(arg) = iter.next() {
            let mut value_for = |name: &'static str| {
                iter.next()
                    .cloned()
                    .ok_or(ConfigError::MissingArgument(name))
            };
            match arg.as_str() {
                "--p-type" => cli.p_type = Some(value_for("--p-type")?.parse()?),
                "--v-type" => cli.v_type = Some(value_for("--v-type")?.parse()?),
                "--v-flow-type" => cli.vf_type = Some(value_for("--v-flow-type")?.parse()?),
                "--field-path" => cli.field_path = Some(value_for("--field-path")?.into()),
                "--load-path" => cli.load_path = Some(value_for("--load-path")?.into()),
                "--save-path" => cli.save_path = Some(value_for("--save-path")?.into()),
                "--num-threads" => {
                    let value = value_for("--num-threads")?;
                    cli.num_threads = value.parse().map_err(|_| ConfigError::InvalidArgument {
                        arg: "--num-threads",
                        value,
                    })?;
                }
                "--ticks" => {
                    let value = value_for("--ticks")?;
                    cli.ticks = value.parse().map_err(|_| ConfigError::InvalidArgument {
                        arg: "--ticks",
                        value,
                    })?;
                }
                other => return Err(ConfigError::UnexpectedArgument(other.to_string())),
            }
        }
        Ok(cli)
    }
}

fn run(cli: CliArgs) -> Result<(), SimError> {
    let mut sim = build_simulator(&cli)?;

    let (rows, cols) = sim.dimensions();
    println!("Cellflow Simulation");
    println!("===================");
    println!("Grid: {rows}x{cols}");
    println!("Starting at tick {}", sim.tick_count());
    println!();

    for _ in 0..cli.ticks {
        let stats = sim.tick();
        if stats.moved {
            println!("Tick {}:", stats.tick);
            print!("{}", sim.render());
        }
    }

    if let Some(path) = &cli.save_path {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        sim.write_checkpoint(&mut writer)?;
        writer.flush()?;
        println!("Checkpoint saved: {}", path.display());
    }
    Ok(())
}

fn build_simulator(cli: &CliArgs) -> Result<Box<dyn Simulator>, SimError> {
    match (&cli.load_path, &cli.field_path) {
        (Some(_), Some(_)) | (None, None) => Err(ConfigError::ConflictingModes.into()),
        (Some(load_path), None) => {
            if cli.p_type.is_some() || cli.v_type.is_some() || cli.vf_type.is_some() {
                return Err(ConfigError::ConflictingModes.into());
            }
            load_checkpoint(load_path, cli.num_threads)
        }
        (None, Some(field_path)) => {
            let config = SimConfig {
                p_type: cli.p_type.ok_or(ConfigError::MissingArgument("--p-type"))?,
                v_type: cli.v_type.ok_or(ConfigError::MissingArgument("--v-type"))?,
                vf_type: cli
                    .vf_type
                    .ok_or(ConfigError::MissingArgument("--v-flow-type"))?,
                field_path: field_path.clone(),
                num_threads: cli.num_threads,
            };
            build_engine(&config)
        }
    }
}
