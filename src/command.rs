use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use clap::{Parser, Subcommand};
use clap_verbosity_flag::LogLevel;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::level_filters::LevelFilter;
use tracing::{error, info};
use tracing_log::AsTrace;

use crate::ai_backend;
use crate::cors::CorsPolicy;
use crate::server;
use crate::service::{FormulaRequest, FormulaRequestService, InvocationPolicy};
use crate::settings::Settings;

/// `-v`/`-q` count from `info`; without them the `verbosity` setting decides.
#[derive(Debug)]
pub struct ConfigLogLevel {}

impl LogLevel for ConfigLogLevel {
    fn default() -> Option<clap_verbosity_flag::Level> {
        Some(clap_verbosity_flag::Level::Info)
    }
}

fn parse_level(verbosity: Option<&str>) -> LevelFilter {
    match verbosity.map(str::trim) {
        Some("off") => LevelFilter::OFF,
        Some("error") => LevelFilter::ERROR,
        Some("warn") => LevelFilter::WARN,
        Some("debug") => LevelFilter::DEBUG,
        Some("trace") => LevelFilter::TRACE,
        _ => LevelFilter::INFO,
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct FormulaRelayArgs {
    /// Enable tracing (generates a trace-timestamp.json file).
    #[arg(long)]
    pub tracing: bool,

    /// Read settings from this file instead of the per-user config file.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub verbose: clap_verbosity_flag::Verbosity<ConfigLogLevel>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Serve the formula endpoint over HTTP (default).
    Serve {
        /// Address to bind, overrides server.bind_address.
        #[arg(long)]
        bind: Option<IpAddr>,
        /// Port to listen on, overrides server.port.
        #[arg(long)]
        port: Option<u16>,
    },
    /// Generate a single formula and print it.
    Ask {
        /// Natural-language description of the calculation.
        #[arg(long)]
        prompt: String,
    },
}

impl FormulaRelayArgs {
    /// Resolves the log level against settings loaded from `--config` or the per-user file.
    pub fn log_level_filter(&self, settings: &Settings) -> LevelFilter {
        if self.verbose.is_present() {
            self.verbose.log_level_filter().as_trace()
        } else {
            parse_level(settings.verbosity.as_deref())
        }
    }
}

pub struct FormulaRelay {
    settings: Settings,
    args: FormulaRelayArgs,
    start: Instant,
}

impl FormulaRelay {
    pub fn new(settings: Settings, args: FormulaRelayArgs, start: Option<Instant>) -> Self {
        Self {
            settings,
            args,
            start: start.unwrap_or(Instant::now()),
        }
    }

    pub async fn exec(self) -> Result<()> {
        let backend = ai_backend::from_settings(&self.settings).await?;
        info!(
            "{} backend ready in {:?}",
            backend.name(),
            self.start.elapsed()
        );
        let service = FormulaRequestService::new(backend)
            .with_policy(InvocationPolicy::from(&self.settings.invocation));

        let command = self.args.command.clone().unwrap_or(Command::Serve {
            bind: None,
            port: None,
        });
        match command {
            Command::Serve { bind, port } => self.serve(service, bind, port).await,
            Command::Ask { prompt } => self.ask(service, prompt).await,
        }
    }

    async fn serve(
        &self,
        service: FormulaRequestService,
        bind: Option<IpAddr>,
        port: Option<u16>,
    ) -> Result<()> {
        let server_settings = &self.settings.server;
        let ip = match bind {
            Some(ip) => ip,
            None => server_settings.bind_address.parse()?,
        };
        let addr = SocketAddr::new(ip, port.unwrap_or(server_settings.port));
        let cors = CorsPolicy::new(&server_settings.allowed_origin)?;
        info!(
            "Formula endpoint {} allows origin {}",
            server_settings.endpoint_path, server_settings.allowed_origin
        );

        let router = server::router(Arc::new(service), cors, &server_settings.endpoint_path);
        server::serve(addr, router).await
    }

    async fn ask(&self, service: FormulaRequestService, prompt: String) -> Result<()> {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(ProgressStyle::default_spinner().template("{spinner} {msg}")?);
        spinner.set_message("Generating...");
        spinner.enable_steady_tick(Duration::from_millis(100));

        let result = service
            .generate_formula(FormulaRequest {
                prompt: Some(prompt),
            })
            .await;
        spinner.finish_and_clear();

        match result {
            Ok(formula) => {
                info!("generated the formula in {:?}", self.start.elapsed());
                #[cfg(feature = "clipboard")]
                copy_to_clipboard(&formula)?;
                println!("{formula}");
                Ok(())
            }
            Err(e) => {
                error!("{e}");
                anyhow::bail!(e.client_message())
            }
        }
    }
}

#[cfg(feature = "clipboard")]
fn copy_to_clipboard(formula: &str) -> Result<()> {
    let mut clipboard = arboard::Clipboard::new()?;
    clipboard.set_text(formula.to_string())?;
    info!("Copied formula to clipboard");
    Ok(())
}
