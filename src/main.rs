use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use resilient_ops::auth::{authorize, StaticTokenProvider, TokenProvider};
use resilient_ops::binding::ErrorHandler;
use resilient_ops::config::Settings;
use resilient_ops::coordinator::{ExecuteOptions, OperationCoordinator};
use resilient_ops::error::{ErrorClassifier, RawError};
use resilient_ops::logging::{init_logging, LoggingConfig};
use resilient_ops::network::{ConnectivityProbe, NetworkStatusMonitor, ProbeConfig};
use resilient_ops::notification::{ConsoleSink, ToastRenderer};
use resilient_ops::retry::RetryOverrides;

#[derive(Parser, Debug)]
#[command(name = "resops")]
#[command(version)]
#[command(about = "Classify failures, retry requests and check connectivity")]
struct Cli {
    /// Increase verbosity (-v, -vv)
    #[arg(long, short, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Settings file (TOML)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Disable colors (also respects NO_COLOR)
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// GET a URL with retries and print the outcome as JSON
    Probe {
        url: String,

        /// Retries after the first attempt (overrides settings)
        #[arg(long)]
        max_retries: Option<u32>,

        /// Context attached to a failure
        #[arg(long)]
        context: Option<String>,

        /// Bearer token
        #[arg(long)]
        token: Option<String>,

        /// Time limit per attempt
        #[arg(long, value_name = "SECONDS")]
        timeout: Option<u64>,
    },

    /// Classify a status code or message and print the result as JSON
    Classify {
        /// HTTP status code
        #[arg(long, required_unless_present = "message", conflicts_with = "message")]
        status: Option<u16>,

        /// Response body for --status
        #[arg(long, requires = "status")]
        body: Option<String>,

        /// Plain error message
        #[arg(long)]
        message: Option<String>,

        /// Context attached to the result
        #[arg(long)]
        context: Option<String>,
    },

    /// Print the backoff schedule, without jitter
    Backoff {
        #[arg(long)]
        max_retries: Option<u32>,

        #[arg(long)]
        base_delay_ms: Option<u64>,

        #[arg(long)]
        max_delay_ms: Option<u64>,

        #[arg(long)]
        exponential_base: Option<f64>,
    },

    /// Check whether a health endpoint is reachable
    Status {
        /// Endpoint to check (defaults to network.probe_url)
        url: Option<String>,

        /// Keep watching and report transitions for this many seconds
        #[arg(long, value_name = "SECONDS")]
        watch: Option<u64>,
    },
}

mod exit_codes {
    use std::process::ExitCode;

    pub fn success() -> ExitCode {
        ExitCode::SUCCESS
    }

    /// The operation failed or the endpoint is unreachable
    pub fn failed() -> ExitCode {
        ExitCode::from(1)
    }

    /// Settings or arguments could not be used
    pub fn config_error() -> ExitCode {
        ExitCode::from(2)
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let settings = match Settings::load(cli.config.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("error: {e}");
            return Ok(exit_codes::config_error());
        }
    };

    init_logging(LoggingConfig::new().with_level(settings.logging.level.raised(cli.verbose)));

    let use_color = !cli.no_color && std::env::var_os("NO_COLOR").is_none();
    let renderer = ToastRenderer::new().with_color(use_color);

    match cli.command {
        Commands::Probe {
            url,
            max_retries,
            context,
            token,
            timeout,
        } => {
            let mut overrides = RetryOverrides::new();
            if let Some(max_retries) = max_retries {
                overrides = overrides.max_retries(max_retries);
            }
            let mut options = ExecuteOptions::new().with_retry_config(overrides);
            if let Some(context) = context {
                options = options.with_context(context);
            }
            if let Some(secs) = timeout {
                options = options.with_attempt_timeout(Duration::from_secs(secs));
            }
            run_probe(&settings, renderer, url, token, options).await
        }
        Commands::Classify {
            status,
            body,
            message,
            context,
        } => {
            let raw = match (status, message) {
                (Some(status), _) => RawError::Http { status, body },
                (None, Some(message)) => RawError::Message(message),
                (None, None) => {
                    eprintln!("error: either --status or --message is required");
                    return Ok(exit_codes::config_error());
                }
            };
            let error = ErrorClassifier::new().classify(raw, context.as_deref().unwrap_or(""));
            println!("{}", serde_json::to_string_pretty(&error)?);
            Ok(exit_codes::success())
        }
        Commands::Backoff {
            max_retries,
            base_delay_ms,
            max_delay_ms,
            exponential_base,
        } => {
            let mut overrides = RetryOverrides::new();
            if let Some(n) = max_retries {
                overrides = overrides.max_retries(n);
            }
            if let Some(ms) = base_delay_ms {
                overrides = overrides.base_delay(Duration::from_millis(ms));
            }
            if let Some(ms) = max_delay_ms {
                overrides = overrides.max_delay(Duration::from_millis(ms));
            }
            if let Some(base) = exponential_base {
                overrides = overrides.exponential_base(base);
            }
            let config = match settings.retry_config() {
                Ok(defaults) => defaults.merged(&overrides),
                Err(e) => {
                    eprintln!("error: {e}");
                    return Ok(exit_codes::config_error());
                }
            };
            if let Err(e) = config.validate() {
                eprintln!("error: {e}");
                return Ok(exit_codes::config_error());
            }
            for (i, delay) in config.schedule().iter().enumerate() {
                println!("retry {}: {}ms", i + 1, delay.as_millis());
            }
            Ok(exit_codes::success())
        }
        Commands::Status { url, watch } => {
            let config = match (url, settings.probe_config()) {
                (Some(url), Some(configured)) => ProbeConfig {
                    url,
                    ..configured
                },
                (Some(url), None) => ProbeConfig::new(url),
                (None, Some(configured)) => configured,
                (None, None) => {
                    eprintln!("error: no URL given and network.probe_url is not set");
                    return Ok(exit_codes::config_error());
                }
            };
            run_status(config, watch).await
        }
    }
}

async fn run_probe(
    settings: &Settings,
    renderer: ToastRenderer,
    url: String,
    token: Option<String>,
    options: ExecuteOptions,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let coordinator = Arc::new(OperationCoordinator::with_config(settings.retry_config()?));
    let handler = ErrorHandler::new(
        coordinator,
        Arc::new(ConsoleSink::new(renderer.clone())),
        NetworkStatusMonitor::default(),
    );

    let retry_renderer = renderer;
    let options = options.on_retry(move |event| eprintln!("{}", retry_renderer.render_retry(event)));

    let client = reqwest::Client::new();
    let provider = Arc::new(StaticTokenProvider::new(token));
    let operation_id = format!("GET {url}");

    let result = handler
        .execute_with_retry(
            || fetch_status(client.clone(), Arc::clone(&provider), url.clone()),
            &operation_id,
            &options,
        )
        .await;

    match result {
        Ok(status) => {
            let output = serde_json::json!({ "url": url, "status": status });
            println!("{}", serde_json::to_string_pretty(&output)?);
            Ok(exit_codes::success())
        }
        Err(error) => {
            println!("{}", serde_json::to_string_pretty(&error)?);
            Ok(exit_codes::failed())
        }
    }
}

async fn fetch_status(
    client: reqwest::Client,
    provider: Arc<StaticTokenProvider>,
    url: String,
) -> Result<u16, RawError> {
    let provider: &dyn TokenProvider = provider.as_ref();
    let response = authorize(client.get(&url), provider).await.send().await?;
    if response.status().is_success() {
        Ok(response.status().as_u16())
    } else {
        Err(RawError::from_response(response).await)
    }
}

async fn run_status(
    config: ProbeConfig,
    watch: Option<u64>,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let url = config.url.clone();
    let (probe, events) = match ConnectivityProbe::new(config) {
        Ok(created) => created,
        Err(e) => {
            eprintln!("error: {e}");
            return Ok(exit_codes::config_error());
        }
    };

    let online = probe.check().await;
    println!("{url}: {}", if online { "online" } else { "offline" });

    if let Some(secs) = watch {
        let monitor = NetworkStatusMonitor::new(online);
        let mut changes = monitor.subscribe();
        let guard = monitor.attach(events);
        probe.start(online).await;

        let deadline = tokio::time::sleep(Duration::from_secs(secs));
        tokio::pin!(deadline);
        loop {
            tokio::select! {
                _ = &mut deadline => break,
                changed = changes.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let now_online = *changes.borrow_and_update();
                    println!("{url}: {}", if now_online { "online" } else { "offline" });
                }
            }
        }

        probe.stop().await;
        guard.detach();
        return Ok(if monitor.is_online() {
            exit_codes::success()
        } else {
            exit_codes::failed()
        });
    }

    Ok(if online {
        exit_codes::success()
    } else {
        exit_codes::failed()
    })
}
