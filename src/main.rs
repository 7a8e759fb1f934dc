//! OS Emulator CLI.
//!
//! The main executable for the emulator. It parses command-line arguments,
//! sets up logging, and hands control to the interactive shell. The
//! emulator core itself is only constructed when the user issues
//! `initialize`, so a bad config file is reported at the prompt rather
//! than on startup.

use clap::Parser;

use os_emulator::shell::{self, ShellOptions};

/// Command-line arguments for the OS emulator.
///
/// All three paths are fixed for the lifetime of the run: the config file
/// read by `initialize`, the backing-store journal the memory manager
/// truncates and appends to, and the destination of `report-util`.
#[derive(Parser, Debug)]
#[command(author, version, about = "Tick-driven OS emulator: scheduling + demand paging")]
struct Args {
    #[arg(short, long, default_value = "config.txt")]
    config: String,

    #[arg(long, default_value = "backing-store.txt")]
    backing_store: String,

    #[arg(long, default_value = "utilization-report.txt")]
    report: String,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    shell::run(ShellOptions {
        config_path: args.config.into(),
        backing_store_path: args.backing_store.into(),
        report_path: args.report.into(),
    });
}
