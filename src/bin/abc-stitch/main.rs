//! abc-stitch - merge time-ranged archives of one scene into a single archive.

use abc_stitch::stitch::{stitch_files, ChildMatching, MergePolicy, StitchOptions};
use std::env;
use std::path::PathBuf;

use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

/// Environment variable overriding the log filter, e.g. `abc_stitch=trace`.
const LOG_ENV: &str = "ABC_STITCH_LOG";

fn main() {
    let args: Vec<String> = env::args().collect();

    let mut level = "warn";
    let mut options = StitchOptions::default();
    let mut paths: Vec<PathBuf> = Vec::new();
    let mut iter = args[1..].iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "-v" | "--verbose" => level = "debug",
            "-vv" | "--trace" => level = "trace",
            "-q" | "--quiet" => level = "error",
            "--by-index" => options = options.with_identity(ChildMatching::ByIndex),
            "--strict" => options = options.with_merge_policy(MergePolicy::Strict),
            "-c" | "--compression" => {
                let Some(value) = iter.next() else {
                    usage_error("missing value for --compression");
                };
                match value.parse::<i32>() {
                    Ok(n) => options = options.with_compression(n),
                    Err(_) => usage_error(&format!("invalid compression level: {}", value)),
                }
            }
            "-h" | "--help" => {
                print_help();
                return;
            }
            "-V" | "--version" => {
                println!(
                    "abc-stitch {} ({})",
                    env!("CARGO_PKG_VERSION"),
                    env!("ABC_STITCH_BUILD_DATE")
                );
                return;
            }
            s if s.starts_with('-') && s.len() > 1 => usage_error(&format!("unknown option: {}", s)),
            _ => paths.push(PathBuf::from(arg)),
        }
    }

    init_logging(level);

    if paths.len() < 3 {
        usage_error("need an output file and at least two input files");
    }
    let output = paths.remove(0);

    match stitch_files(&output, &paths, &options) {
        Ok(report) => {
            for skip in report.skipped() {
                tracing::info!("skipped {}", skip);
            }
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(e.exit_code());
        }
    }
}

fn init_logging(default_level: &str) {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(default_level));
    let fmt = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);
    tracing_subscriber::registry().with(filter).with(fmt).init();
}

fn usage_error(msg: &str) -> ! {
    eprintln!("Error: {}", msg);
    eprintln!();
    print_help();
    std::process::exit(-1);
}

fn print_help() {
    println!("abc-stitch - merge archives covering consecutive time ranges");
    println!();
    println!("USAGE:");
    println!("    abc-stitch [OPTIONS] <out.abc> <in1.abc> <in2.abc> [in3.abc ...]");
    println!();
    println!("Inputs are ordered by start time; the same object paths in every");
    println!("input become one object whose samples span all inputs.");
    println!();
    println!("OPTIONS:");
    println!("    -v, --verbose         Log every object");
    println!("    -vv, --trace          Log every property");
    println!("    -q, --quiet           Errors only");
    println!("    --by-index            Match children by position instead of name");
    println!("    --strict              Fail on property data type mismatches");
    println!("    -c, --compression N   Output compression level (-1 none, 0-9, binary format only)");
    println!("    -h, --help            Show this help");
    println!("    -V, --version         Show version");
    println!();
    println!("ENVIRONMENT:");
    println!("    {}        Log filter, overrides -v/-q (e.g. abc_stitch=trace)", LOG_ENV);
}
