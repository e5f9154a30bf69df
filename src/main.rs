use anyhow::Result;
use clap::Parser;
use formula_relay::{FormulaRelay, FormulaRelayArgs, Settings};
use tracing::info;
use tracing_chrome::ChromeLayerBuilder;
use tracing_subscriber::prelude::*;

#[tokio::main]
async fn main() -> Result<()> {
    let start = std::time::Instant::now();

    let args = FormulaRelayArgs::parse();

    let settings = Settings::load(args.config.as_deref())?;
    // -v/-q win over the verbosity setting, which only supplies the default
    let log_level_filter = args.log_level_filter(&settings);

    let (chrome_layer, _guard) = if args.tracing {
        let (layer, guard) = ChromeLayerBuilder::new().build();
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };
    tracing_subscriber::registry()
        .with(chrome_layer)
        .with(tracing_subscriber::fmt::layer().with_filter(log_level_filter))
        .init();
    info!("Initialized args, settings, and logging in {:?}", start.elapsed());

    let relay = FormulaRelay::new(settings, args, Some(start));
    relay.exec().await?;

    Ok(())
}
