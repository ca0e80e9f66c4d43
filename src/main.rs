use clap::{ArgAction, Parser};
use gdubm::report::{self, OutputMode, ReportOptions, TimeFormat, TimeStyle, TimeZoneStyle};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(
    name = "gdubm-summarize",
    version,
    about = "Outputs information from GNOME Disks benchmark cache files"
)]
struct Cli {
    /// Print the averages and filename separated by tabs
    #[arg(short, long)]
    tsv: bool,
    /// Show the benchmark time in the local time zone instead of UTC
    /// (%Z then prints a numeric offset such as +02:00)
    #[arg(long)]
    local_time: bool,
    /// strftime pattern for the benchmark time
    #[arg(long, default_value = report::DEFAULT_TIME_FORMAT)]
    time_format: TimeFormat,
    /// Log more (-v info, -vv debug); RUST_LOG overrides
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
    /// Benchmark cache files created by GNOME Disks
    #[arg(required = true, num_args = 1..)]
    files: Vec<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let options = ReportOptions {
        mode: if cli.tsv { OutputMode::Tsv } else { OutputMode::Summary },
        time: TimeStyle {
            zone:   if cli.local_time { TimeZoneStyle::Local } else { TimeZoneStyle::Utc },
            format: cli.time_format,
        },
    };

    let mut failed = 0usize;
    for path in &cli.files {
        match gdubm::summarize(path, &options) {
            Ok(text) => print!("{text}"),
            Err(e) => {
                log::debug!("{:?} failure on {}", e.kind(), e.path().display());
                eprintln!("error: {e}");
                failed += 1;
            }
        }
    }

    if failed > 0 {
        log::info!("{failed} of {} file(s) could not be summarised", cli.files.len());
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

// ── helpers ──────────────────────────────────────────────────────────────────

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}
