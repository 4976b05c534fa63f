use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use nurse_tracker::logger;
use nurse_tracker::pipeline::{run, RunOptions, EXIT_FATAL, EXIT_OK};

/// Scrape hospital career sites for matching nursing postings.
#[derive(Debug, Parser)]
#[command(name = "nurse_tracker", version)]
struct Cli {
    #[arg(long, default_value = "config.yaml")]
    config: PathBuf,

    /// Send the digest email after scraping and filtering
    #[arg(long)]
    send_email: bool,

    /// Write the rendered HTML email here
    #[arg(long, default_value = "output/email_preview.html")]
    email_preview_path: Option<PathBuf>,

    /// Commit the seen set even when no email is sent
    #[arg(long)]
    update_last_state: bool,

    /// Also write every scraped posting before filtering
    #[arg(long)]
    dump_raw: bool,

    /// Repeat the run every N seconds until a run fails
    #[arg(long)]
    interval_seconds: Option<u64>,
}

fn run_once(cli: &Cli, options: &RunOptions) -> i32 {
    match run(&cli.config, options) {
        Ok(code) => code,
        Err(e) => {
            log::error!("Run failed: {:#}", e);
            EXIT_FATAL
        }
    }
}

fn main() -> Result<()> {
    logger::init();
    let cli = Cli::parse();

    let options = RunOptions {
        send_email: cli.send_email,
        email_preview_path: cli.email_preview_path.clone().filter(|p| !p.as_os_str().is_empty()),
        update_last_state: cli.update_last_state,
        dump_raw: cli.dump_raw,
    };

    let code = match cli.interval_seconds {
        None => run_once(&cli, &options),
        Some(seconds) => loop {
            let code = run_once(&cli, &options);
            if code != EXIT_OK {
                break code;
            }
            log::info!("Next run in {} seconds", seconds);
            std::thread::sleep(Duration::from_secs(seconds));
        },
    };

    if code != EXIT_OK {
        std::process::exit(code);
    }
    Ok(())
}
