use clap::Parser;
use geonear::{Config, Point, ProcessorBuilder};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::time::Instant;

/// Radius search over a geotagged CSV file.
///
/// Reads queries from stdin, one per line, as `LAT LON [RADIUS_KM]`;
/// `quit` exits.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// JSON or TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// CSV dataset; overrides the path in the configuration
    dataset: Option<PathBuf>,

    /// Radius in kilometers for queries that do not give one
    #[arg(short, long)]
    radius: Option<f64>,
}

impl Args {
    fn load_config(&self) -> geonear::Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::from_file(path)?,
            None => Config::default(),
        };
        if let Some(radius_km) = self.radius {
            config = config.with_radius_km(radius_km);
        }
        config.validate()?;
        Ok(config)
    }
}

/// Parses `LAT LON [RADIUS_KM]`.
fn parse_query(line: &str, default_radius_km: f64) -> Option<(Point, f64)> {
    let mut parts = line.split_whitespace();
    let latitude: f64 = parts.next()?.parse().ok()?;
    let longitude: f64 = parts.next()?.parse().ok()?;
    let radius_km = match parts.next() {
        Some(raw) => raw.parse().ok()?,
        None => default_radius_km,
    };
    if parts.next().is_some() {
        return None;
    }
    Some((Point::new(latitude, longitude), radius_km))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let args = Args::parse();
    let config = args.load_config()?;
    let radius_km = config.radius_km;

    let mut builder = ProcessorBuilder::new().config(config);
    if let Some(dataset) = args.dataset {
        builder = builder.dataset(dataset);
    }
    let mut processor = builder.build()?;

    let started = Instant::now();
    let stats = processor.preprocess()?.stats();
    println!(
        "Indexed {} records in {} ms (tree height {})",
        stats.points,
        started.elapsed().as_millis(),
        stats.height
    );
    println!("Enter queries as: LAT LON [RADIUS_KM], or 'quit' to exit");

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    for line in stdin.lock().lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.eq_ignore_ascii_case("quit") {
            break;
        }

        let Some((target, radius)) = parse_query(line, radius_km) else {
            println!("Invalid query '{}'; expected: LAT LON [RADIUS_KM]", line);
            continue;
        };

        let started = Instant::now();
        let records = processor.process(&target, radius)?;
        let elapsed = started.elapsed();

        for record in &records {
            writeln!(stdout, "{}", record)?;
        }
        writeln!(
            stdout,
            "{} found within {} km of {} in {} ms",
            records.len(),
            radius,
            target,
            elapsed.as_millis()
        )?;
        stdout.flush()?;
    }

    Ok(())
}
