mod blt_api;
mod blt_catalog;
mod blt_config;
mod blt_controllers;
mod blt_geo;
mod blt_models;
mod blt_overlay;
mod blt_scheduler;
mod blt_slot;
mod blt_views;

use anyhow::Context;
use blt_config::{Args, TrackerConfig};
use blt_controllers::BLTControllers;
use clap::Parser;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Set up panic hook for better error messages
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("\n{}", "═".repeat(70));
        eprintln!("❌ APPLICATION PANIC");
        eprintln!("{}", "═".repeat(70));
        eprintln!("\nThe tracker encountered an unexpected error:");
        eprintln!("{}", panic_info);
        eprintln!("\n💡 Troubleshooting:");
        eprintln!("  • Check that BUS_API_BASE_URL points at a running backend");
        eprintln!("  • Check that the route catalog file is valid JSON");
        eprintln!("  • Rerun with RUST_LOG=debug for more detail");
        eprintln!("\n{}", "═".repeat(70));
    }));

    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = TrackerConfig::from_args(&args).context("Invalid configuration")?;
    log::debug!("Configuration: {:?}", config);

    BLTControllers::run(config, args.command).await
}
