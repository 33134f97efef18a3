use std::error::Error;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::{Parser, Subcommand};

use copytrade_detect::config::{Config, Mode, SymbolTable, UserPair};
use copytrade_detect::dataset::DatasetReader;
use copytrade_detect::detection::{MatchPolicy, Matcher};
use copytrade_detect::error::ScanError;
use copytrade_detect::generator;
use copytrade_detect::report::{CsvReports, ReportTotals};
use copytrade_detect::types::PatternKind;

#[derive(Parser)]
#[command(
    name = "copytrade-detect",
    about = "Offline scanner for copy, reversal, and partial-copy trade patterns between two users"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Scan a dataset and write the three CSV report streams
    Scan {
        /// JSON run configuration (dataset_path, symbols_path, mode)
        config: PathBuf,

        /// First user id under investigation
        user_a: i32,

        /// Second user id under investigation
        user_b: i32,

        /// Directory the CSV reports are written to
        #[arg(long, default_value = "results")]
        out_dir: PathBuf,
    },
    /// Generate a synthetic dataset with planted mirror scenarios
    Generate {
        /// RNG seed; the same seed reproduces the same dataset
        #[arg(long, default_value = "42")]
        seed: u64,

        /// Hours of trading to generate
        #[arg(long, default_value = "24")]
        hours: u64,

        /// Probability that an emission plants a leader/follower pair
        #[arg(long, default_value = "0.05")]
        mirror_rate: f64,

        /// Directory for dataset.bin and symbols.json
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    match cli.command {
        Command::Scan { config, user_a, user_b, out_dir } => {
            run_scan(&config, user_a, user_b, &out_dir)?
        }
        Command::Generate { seed, hours, mirror_rate, out_dir } => {
            run_generate(seed, hours, mirror_rate, &out_dir)?
        }
    }
    Ok(())
}

fn run_scan(
    config_path: &Path,
    user_a: i32,
    user_b: i32,
    out_dir: &Path,
) -> Result<(), ScanError> {
    let config = Config::load(config_path)?;
    let users = UserPair::new(user_a, user_b)?;
    let symbols = SymbolTable::load(&config.symbols_path)?;
    let symbol_count = symbols.len();

    println!("=== copytrade-detect (scan) ===");
    println!(
        "Dataset: {}, {} symbols, mode {:?}",
        config.dataset_path.display(),
        symbol_count,
        config.mode
    );
    println!("Users analyzed: {} vs {}", users.first, users.second);
    println!();

    let start = Instant::now();
    let stats = match scan_stream(&config, users, symbols, out_dir) {
        Ok(stats) => stats,
        Err(err) => {
            // A failed run must not leave partial reports behind.
            for kind in PatternKind::ALL {
                let _ = fs::remove_file(out_dir.join(format!("{}.csv", kind.label())));
            }
            return Err(err);
        }
    };
    let elapsed = start.elapsed().as_secs_f64();

    println!("=== Results ===");
    println!("  Trades read:      {}", stats.trades_read);
    println!("  Trades analyzed:  {}", stats.trades_analyzed);
    println!("  Matched pairs:    {}", stats.totals.pairs_total());
    for kind in PatternKind::ALL {
        println!("    {:<22} {}", kind.label(), stats.totals.pairs[kind as usize]);
    }
    if config.mode == Mode::B {
        println!("  Violations:       {}", stats.totals.violations_total());
    }
    println!();
    println!(
        "  Elapsed: {:.3}s ({:.0} trades/sec)",
        elapsed,
        stats.trades_read as f64 / elapsed.max(1e-9)
    );
    Ok(())
}

struct ScanStats {
    trades_read: u64,
    trades_analyzed: u64,
    totals: ReportTotals,
}

fn scan_stream(
    config: &Config,
    users: UserPair,
    symbols: SymbolTable,
    out_dir: &Path,
) -> Result<ScanStats, ScanError> {
    let mut matcher = Matcher::new(MatchPolicy { mode: config.mode, users }, symbols.len());
    let mut reports = CsvReports::create(out_dir, config.mode, symbols)?;

    let mut trades_read = 0u64;
    let mut trades_analyzed = 0u64;
    for record in DatasetReader::open(&config.dataset_path)? {
        let trade = record?;
        trades_read += 1;
        if matcher.process(trade, &mut reports)? {
            trades_analyzed += 1;
        }
    }
    matcher.finish(&mut reports);
    let totals = reports.finish()?;
    Ok(ScanStats { trades_read, trades_analyzed, totals })
}

fn run_generate(
    seed: u64,
    hours: u64,
    mirror_rate: f64,
    out_dir: &Path,
) -> std::io::Result<()> {
    println!("=== copytrade-detect (generate) ===");
    let start = Instant::now();
    let (count, users) = generator::write_dataset(out_dir, seed, hours, mirror_rate)?;
    println!(
        "  Wrote {} trades ({} hours, seed {}, mirror rate {:.0}%)",
        count,
        hours,
        seed,
        mirror_rate * 100.0
    );
    println!("  User ids: {users:?}");
    println!("  Dataset:  {}", out_dir.join("dataset.bin").display());
    println!("  Symbols:  {}", out_dir.join("symbols.json").display());
    println!("  Elapsed: {:.3}s", start.elapsed().as_secs_f64());
    Ok(())
}
