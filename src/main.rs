use clap::Parser;
use colored::Colorize;
use std::path::PathBuf;
use std::time::Duration;

use shakedown::config::{RunConfig, DEFAULT_CHECK_TIMEOUT};
use shakedown::runner;

#[derive(Parser)]
#[command(name = "shakedown")]
#[command(about = "Post-change verification runner for npm projects", long_about = None)]
#[command(version)]
struct Cli {
    /// Package that was upgraded or swapped in
    #[arg(default_value = "unknown")]
    package: String,

    /// Package the subject replaced; enables the stale-reference and
    /// manifest-removal checks
    #[arg(short, long, value_name = "PACKAGE")]
    replaces: Option<String>,

    /// Project directory to verify
    #[arg(short, long, value_name = "DIR", default_value = ".")]
    project: PathBuf,

    /// Directory the JSON report is written to [default: the project directory]
    #[arg(long, value_name = "DIR")]
    report_dir: Option<PathBuf>,

    /// Per-check timeout in seconds
    #[arg(short, long, value_name = "SECONDS", default_value_t = DEFAULT_CHECK_TIMEOUT.as_secs())]
    timeout: u64,
}

fn main() {
    let cli = Cli::parse();

    let config = RunConfig {
        subject: cli.package,
        previous: cli.replaces,
        project_dir: cli.project,
        report_dir: cli.report_dir,
        check_timeout: Duration::from_secs(cli.timeout),
        ..RunConfig::default()
    };

    match runner::execute(&config) {
        Ok(report) => {
            if !report.all_passed() {
                std::process::exit(1);
            }
        }
        Err(err) => {
            eprintln!("{} {err}", "✗".red());
            std::process::exit(err.exit_code());
        }
    }
}
