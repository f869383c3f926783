//! Field generator - companion tool producing random bordered fields.

use std::env;
use std::fs;
use std::process;

use cellflow::schema::random_field;

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 4 || args[1] == "--help" || args[1] == "-h" {
        eprintln!("Usage: {} <output-path> <width> <height> [seed]", args[0]);
        eprintln!();
        eprintln!("Writes a random field with walls on all four borders.");
        process::exit(if args.len() < 4 { 1 } else { 0 });
    }

    let path = &args[1];
    let width: usize = args[2].parse().unwrap_or_else(|_| {
        eprintln!("Error: width must be a positive integer, got {}", args[2]);
        process::exit(1);
    });
    let height: usize = args[3].parse().unwrap_or_else(|_| {
        eprintln!("Error: height must be a positive integer, got {}", args[3]);
        process::exit(1);
    });
    if width < 3 || height < 3 {
        eprintln!("Error: the field must be at least 3x3");
        process::exit(1);
    }
    let seed: u64 = match args.get(4) {
        Some(raw) => raw.parse().unwrap_or_else(|_| {
            eprintln!("Error: seed must be an integer, got {raw}");
            process::exit(1);
        }),
        None => rand::random(),
    };

    let field = random_field(height, width, seed);
    if let Err(err) = fs::write(path, &field) {
        eprintln!("Error writing {path}: {err}");
        process::exit(1);
    }
    println!("Wrote {width}x{height} field to {path} (seed {seed})");
}
