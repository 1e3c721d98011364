//! Keeper: a game master's campaign companion for the terminal.
//!
//! Reads `#commands` from stdin, one per line, and prints results and
//! notifications to stdout. Logs go to stderr.
//!
//! ```bash
//! cargo run -p keeper -- --dir ./my-campaign
//! ```

mod headless;

use campaign_core::headless::HeadlessConfig;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "keeper=info,campaign_core=info,ai_gateway=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        print_help();
        return Ok(());
    }

    let config = parse_config_from_args(&args);
    if std::env::var("AI_API_KEY").is_err() {
        tracing::warn!("AI_API_KEY not set; using the key stored in the campaign settings, if any");
    }

    headless::run(config).await.map_err(|e| e.into())
}

fn parse_config_from_args(args: &[String]) -> HeadlessConfig {
    let mut config = HeadlessConfig::new("campaign");

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--dir" => {
                if let Some(dir) = args.get(i + 1) {
                    config.dir = dir.into();
                    i += 1;
                }
            }
            "--bestiary-url" => {
                if let Some(url) = args.get(i + 1) {
                    config = config.with_bestiary_url(url.clone());
                    i += 1;
                }
            }
            "--no-env" => config = config.without_env(),
            _ => {}
        }
        i += 1;
    }

    config
}

fn print_help() {
    println!("Keeper - campaign companion for game masters");
    println!();
    println!("USAGE:");
    println!("  keeper [OPTIONS]");
    println!();
    println!("OPTIONS:");
    println!("  -h, --help              Show this help message");
    println!("  --dir <PATH>            Campaign directory (default: ./campaign)");
    println!("  --bestiary-url <URL>    Monster reference base URL");
    println!("  --no-env                Ignore AI_* environment variables");
    println!();
    println!("ENVIRONMENT:");
    println!("  AI_PROVIDER      openrouter | openai");
    println!("  AI_API_KEY       Provider API key");
    println!("  AI_BASE_URL      Override the provider endpoint");
    println!("  AI_MODEL         Text model");
    println!("  AI_IMAGE_MODEL   Image model");
    println!("  AI_LANGUAGE      Language of generated content");
    println!("  RUST_LOG         Log filter (logs are written to stderr)");
    println!();
    println!("Type #help once running for the command list.");
}
