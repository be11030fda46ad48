//! Loadstone binary: drives write and read/verify pools over a store.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use loadstone_core::{Key, KeyRange, Limits};
use loadstone_store::{SimulatedStore, StoreClient, StoreFaultConfig};
use loadstone_workload::profiles::{self, ReaderProfile, RunProfile, WriterProfile};
use loadstone_workload::{Bounds, ReaderConfig, ReaderEngine, WriterConfig, WriterEngine};
use tracing::{info, Level};

const DEFAULT_WORKERS: u32 = 20;

/// Writer settings given on the command line.
#[derive(Debug, Clone, Copy)]
struct WriteSpec {
    avg_columns: u32,
    avg_value_size: u32,
    workers: Option<u32>,
}

/// Reader settings given on the command line.
#[derive(Debug, Clone, Copy)]
struct ReadSpec {
    verify_percent: u8,
    workers: Option<u32>,
}

#[derive(Debug, Parser)]
#[command(name = "loadstone", about = "Load generation and verification for sorted stores")]
struct Args {
    /// Write load: avg_columns:avg_value_size[:workers]
    #[arg(long, value_parser = parse_write_spec)]
    write: Option<WriteSpec>,

    /// Read load: verify_percent[:workers]
    #[arg(long, value_parser = parse_read_spec)]
    read: Option<ReadSpec>,

    /// Write whole records in one call instead of column-by-column
    #[arg(long)]
    multiput: bool,

    /// First key of the run
    #[arg(long, default_value_t = 0)]
    start_key: i64,

    /// Number of keys in the run
    #[arg(long)]
    num_keys: Option<u64>,

    /// How far the writer watermark must trail past a key before a
    /// linked reader claims it
    #[arg(long, default_value_t = 0)]
    key_window: u64,

    /// Read errors tolerated before the reader pool aborts
    #[arg(long, default_value_t = 10)]
    max_read_errors: u64,

    /// Table to run against
    #[arg(long, default_value = "cluster_test")]
    table: String,

    /// Named built-in profile to run
    #[arg(long)]
    profile: Option<String>,

    /// Profile TOML file to run
    #[arg(long)]
    profile_file: Option<PathBuf>,

    /// List built-in profiles and exit
    #[arg(long)]
    list_profiles: bool,

    /// Fraction of puts the simulated store fails
    #[arg(long, default_value_t = 0.0, value_parser = parse_rate)]
    put_fail_rate: f64,

    /// Fraction of gets the simulated store fails
    #[arg(long, default_value_t = 0.0, value_parser = parse_rate)]
    get_fail_rate: f64,

    /// Seed for fault injection and verification sampling
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info", value_parser = parse_level)]
    log_level: Level,
}

fn parse_write_spec(spec: &str) -> Result<WriteSpec, String> {
    let parts: Vec<&str> = spec.split(':').collect();
    if !(2..=3).contains(&parts.len()) {
        return Err("expected avg_columns:avg_value_size[:workers]".to_string());
    }
    let avg_columns = parts[0]
        .parse()
        .map_err(|_| format!("invalid avg_columns: {}", parts[0]))?;
    let avg_value_size = parts[1]
        .parse()
        .map_err(|_| format!("invalid avg_value_size: {}", parts[1]))?;
    let workers = match parts.get(2) {
        Some(raw) => Some(raw.parse().map_err(|_| format!("invalid workers: {raw}"))?),
        None => None,
    };
    Ok(WriteSpec {
        avg_columns,
        avg_value_size,
        workers,
    })
}

fn parse_read_spec(spec: &str) -> Result<ReadSpec, String> {
    let parts: Vec<&str> = spec.split(':').collect();
    if parts.is_empty() || parts.len() > 2 {
        return Err("expected verify_percent[:workers]".to_string());
    }
    let verify_percent: u8 = parts[0]
        .parse()
        .map_err(|_| format!("invalid verify_percent: {}", parts[0]))?;
    if verify_percent > 100 {
        return Err("verify_percent must be <= 100".to_string());
    }
    let workers = match parts.get(1) {
        Some(raw) => Some(raw.parse().map_err(|_| format!("invalid workers: {raw}"))?),
        None => None,
    };
    Ok(ReadSpec {
        verify_percent,
        workers,
    })
}

fn parse_rate(raw: &str) -> Result<f64, String> {
    let rate: f64 = raw.parse().map_err(|_| format!("invalid rate: {raw}"))?;
    if !(0.0..=1.0).contains(&rate) {
        return Err("rate must be in [0.0, 1.0]".to_string());
    }
    Ok(rate)
}

fn parse_level(raw: &str) -> Result<Level, String> {
    raw.parse().map_err(|_| format!("invalid log level: {raw}"))
}

/// Resolves the run configuration from a profile or from explicit flags.
fn effective_profile(args: &Args) -> Result<RunProfile, String> {
    let profile_given = args.profile.is_some() || args.profile_file.is_some();
    if profile_given {
        if args.profile.is_some() && args.profile_file.is_some() {
            return Err("--profile and --profile-file are mutually exclusive".to_string());
        }
        if args.write.is_some() || args.read.is_some() || args.num_keys.is_some() {
            return Err(
                "--profile cannot be combined with --write, --read, or --num-keys".to_string(),
            );
        }
        let profile = match (&args.profile, &args.profile_file) {
            (Some(name), _) => profiles::load_profile(name).map_err(|error| error.to_string())?,
            (_, Some(path)) => {
                RunProfile::from_file(path).map_err(|error| error.to_string())?
            }
            _ => unreachable!("profile_given checked above"),
        };
        return Ok(profile);
    }

    if args.write.is_none() && args.read.is_none() {
        return Err("at least one of --write or --read is required".to_string());
    }
    let Some(num_keys) = args.num_keys else {
        return Err("--num-keys is required".to_string());
    };

    // Readers regenerate expected records, so a read-only run still
    // carries the writer shape; the defaults match what a default
    // writer produced.
    let shape = args.write.map_or_else(WriterProfile::default, |spec| WriterProfile {
        avg_columns: spec.avg_columns,
        avg_value_size: spec.avg_value_size,
        ..WriterProfile::default()
    });

    Ok(RunProfile {
        name: "cli".to_string(),
        description: String::new(),
        start_key: args.start_key,
        num_keys,
        table: args.table.clone(),
        writer: WriterProfile {
            enabled: args.write.is_some(),
            workers: args
                .write
                .and_then(|spec| spec.workers)
                .unwrap_or(DEFAULT_WORKERS),
            multi_put: args.multiput,
            ..shape
        },
        reader: ReaderProfile {
            enabled: args.read.is_some(),
            workers: args
                .read
                .and_then(|spec| spec.workers)
                .unwrap_or(DEFAULT_WORKERS),
            verify_percent: args.read.map_or(100, |spec| spec.verify_percent),
            key_window: args.key_window,
            max_errors: args.max_read_errors,
        },
    })
}

fn key_range(profile: &RunProfile) -> Result<KeyRange, String> {
    let start = Key::new(profile.start_key);
    let end = start
        .checked_add(profile.num_keys)
        .ok_or("num_keys overflows the key space")?;
    KeyRange::new(start, end).map_err(|error| error.to_string())
}

async fn run(args: Args) -> Result<bool, Box<dyn std::error::Error>> {
    let profile = effective_profile(&args)?;
    let range = key_range(&profile)?;
    let limits = Limits::new();

    info!(
        profile = %profile.name,
        %range,
        table = %profile.table,
        "starting run"
    );

    let faults = StoreFaultConfig::none()
        .with_put_fail_rate(args.put_fail_rate)
        .with_get_fail_rate(args.get_fail_rate);
    let store = Arc::new(SimulatedStore::with_faults(args.seed, faults));
    store.create_table(&profile.table).await?;

    let columns = Bounds::from_average_columns(profile.writer.avg_columns)?;
    let value_sizes = Bounds::from_average_size(profile.writer.avg_value_size)?;

    let mut writer = if profile.writer.enabled {
        Some(WriterEngine::new(
            Arc::clone(&store),
            WriterConfig {
                table: profile.table.clone(),
                multi_put: profile.writer.multi_put,
                columns,
                value_sizes,
            },
            limits,
        )?)
    } else {
        None
    };

    let mut reader = if profile.reader.enabled {
        let mut reader = ReaderEngine::new(
            Arc::clone(&store),
            ReaderConfig {
                table: profile.table.clone(),
                verify_percent: profile.reader.verify_percent,
                max_errors: profile.reader.max_errors,
                key_window: profile.reader.key_window,
                columns,
                value_sizes,
                seed: args.seed,
            },
            limits,
        )?;
        if let Some(writer) = &writer {
            reader.link_to_writer(writer.link())?;
        }
        Some(reader)
    } else {
        None
    };

    if let Some(writer) = &mut writer {
        writer.start(range, profile.writer.workers)?;
    }
    if let Some(reader) = &mut reader {
        reader.start(range, profile.reader.workers)?;
    }

    let mut failed = false;
    if let Some(writer) = &mut writer {
        let summary = writer.wait_for_finish().await?;
        summary.print();
        if summary.keys_failed > 0 {
            failed = true;
        }
    }
    if let Some(reader) = &mut reader {
        let summary = reader.wait_for_finish().await?;
        summary.print();
        if summary.error_count > 0 || summary.aborted {
            failed = true;
        }
    }
    Ok(failed)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_max_level(args.log_level)
        .with_target(false)
        .with_thread_ids(true)
        .with_writer(std::io::stderr)
        .init();

    if args.list_profiles {
        for name in profiles::list_profiles() {
            println!("{name}");
        }
        return Ok(());
    }

    let failed = run(args).await?;
    if failed {
        std::process::exit(1);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_parse_write_spec() {
        let spec = parse_write_spec("4:512").unwrap();
        assert_eq!(spec.avg_columns, 4);
        assert_eq!(spec.avg_value_size, 512);
        assert_eq!(spec.workers, None);

        let spec = parse_write_spec("2:128:8").unwrap();
        assert_eq!(spec.workers, Some(8));

        assert!(parse_write_spec("4").is_err());
        assert!(parse_write_spec("4:512:8:9").is_err());
        assert!(parse_write_spec("x:512").is_err());
    }

    #[test]
    fn test_parse_read_spec() {
        let spec = parse_read_spec("100").unwrap();
        assert_eq!(spec.verify_percent, 100);
        assert_eq!(spec.workers, None);

        let spec = parse_read_spec("10:4").unwrap();
        assert_eq!(spec.verify_percent, 10);
        assert_eq!(spec.workers, Some(4));

        assert!(parse_read_spec("101").is_err());
        assert!(parse_read_spec("10:4:2").is_err());
    }

    #[test]
    fn test_parse_rate() {
        assert_eq!(parse_rate("0.0").unwrap(), 0.0);
        assert_eq!(parse_rate("1.0").unwrap(), 1.0);
        assert!(parse_rate("1.5").is_err());
        assert!(parse_rate("-0.1").is_err());
        assert!(parse_rate("nan").is_err());
    }

    #[test]
    fn test_flags_mode_requires_num_keys() {
        let args = Args::parse_from(["loadstone", "--write", "4:512"]);
        assert!(effective_profile(&args).is_err());
    }

    #[test]
    fn test_flags_mode_builds_profile() {
        let args = Args::parse_from([
            "loadstone",
            "--write",
            "4:512:8",
            "--read",
            "10:4",
            "--num-keys",
            "1000",
            "--key-window",
            "50",
        ]);
        let profile = effective_profile(&args).unwrap();

        assert!(profile.writer.enabled);
        assert_eq!(profile.writer.workers, 8);
        assert_eq!(profile.writer.avg_columns, 4);
        assert!(profile.reader.enabled);
        assert_eq!(profile.reader.workers, 4);
        assert_eq!(profile.reader.verify_percent, 10);
        assert_eq!(profile.reader.key_window, 50);
        assert_eq!(profile.num_keys, 1000);
    }

    #[test]
    fn test_read_only_uses_default_shape() {
        let args = Args::parse_from(["loadstone", "--read", "100", "--num-keys", "10"]);
        let profile = effective_profile(&args).unwrap();

        assert!(!profile.writer.enabled);
        assert!(profile.reader.enabled);
        assert_eq!(profile.writer.avg_columns, 4);
        assert_eq!(profile.writer.avg_value_size, 512);
    }

    #[test]
    fn test_profile_conflicts_with_explicit_flags() {
        let args = Args::parse_from([
            "loadstone",
            "--profile",
            "smoke",
            "--write",
            "4:512",
        ]);
        assert!(effective_profile(&args).is_err());
    }

    #[test]
    fn test_profile_mode_loads_builtin() {
        let args = Args::parse_from(["loadstone", "--profile", "smoke"]);
        let profile = effective_profile(&args).unwrap();
        assert_eq!(profile.name, "smoke");
        assert_eq!(profile.num_keys, 1_000);
    }

    #[test]
    fn test_key_range_overflow_rejected() {
        let profile = RunProfile {
            start_key: i64::MAX - 1,
            num_keys: 10,
            ..RunProfile::default()
        };
        assert!(key_range(&profile).is_err());
    }
}
