use clap::Parser;
use parley::core::config::{self, CliOverrides};
use simplelog::{ConfigBuilder, WriteLogger};
use std::fs::File;

#[derive(Parser)]
#[command(name = "parley", about = "Terminal client for a streaming chat backend")]
struct Args {
    /// Backend base URL (overrides config file and PARLEY_BASE_URL)
    #[arg(long)]
    base_url: Option<String>,

    /// Start with an empty conversation instead of the most recent one
    #[arg(long)]
    no_auto_open: bool,
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let args = Args::parse();
    dotenv::dotenv().ok();

    let file_config = config::load_config()
        .map_err(|e| std::io::Error::other(format!("config error: {e}")))?;
    let resolved = config::resolve(
        &file_config,
        &CliOverrides {
            base_url: args.base_url,
            no_auto_open: args.no_auto_open,
        },
    );

    // Initialize file logger - writes to parley.log in current directory
    let log_config = ConfigBuilder::new().set_time_format_rfc3339().build();

    if let Ok(log_file) = File::create("parley.log") {
        let _ = WriteLogger::init(resolved.log_level, log_config, log_file);
    }

    log::info!("Parley starting up against {}", resolved.base_url);

    parley::tui::run(resolved)
}
