//! MPN Channel CLI - exercises the push-notification retry layer.
//!
//! This is the main binary entry point. See the `mpn_channel` library
//! for the core functionality.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mpn_channel::constants::{SIMULATED_DEVICE_ID, SIMULATION_DEADLINE, SIMULATION_TICK};
use mpn_channel::queue::PendingSubscribe;
use mpn_channel::{
    ChannelTransport, Config, ControlTransport, Device, MemoryQueue, PendingQueue, Platform,
    PollOutcome, Request, RequestKind, RequestManager, RetryScheduler, StatusFilter, Subscription,
    SubscriptionMode, WebPushFormat,
};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "mpn-channel")]
#[command(version = VERSION)]
#[command(about = "Reliable push-notification control requests")]
struct Cli {
    /// Configuration file (JSON). Missing file means defaults.
    #[arg(long, global = true, default_value = "mpn-channel.json")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run register, subscribe and filtered unsubscribe against a lossy
    /// in-process server.
    Simulate {
        /// Attempts of each request kind the server ignores.
        #[arg(long, default_value_t = 2)]
        drops: u32,
        /// Retry interval override for every request, in milliseconds.
        #[arg(long)]
        timeout_ms: Option<u64>,
    },
    /// Print a web push notification format.
    Format {
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        body: Option<String>,
        #[arg(long)]
        icon: Option<String>,
        /// Custom data as key=value, repeatable.
        #[arg(long = "data", value_parser = parse_key_value)]
        data: Vec<(String, String)>,
    },
    /// Print the effective configuration.
    Config,
}

fn main() -> Result<()> {
    // MPN_LOG_FILE redirects logs away from stdout
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if let Ok(path) = std::env::var("MPN_LOG_FILE") {
        let log_file = std::fs::File::create(&path)
            .with_context(|| format!("Failed to create log file at {path}"))?;
        builder.target(env_logger::Target::Pipe(Box::new(log_file)));
    }
    builder.format_timestamp_secs().init();

    let cli = Cli::parse();
    let config = Config::load_from(&cli.config)?;

    match cli.command {
        Commands::Simulate { drops, timeout_ms } => {
            let runtime = tokio::runtime::Runtime::new().context("Failed to start runtime")?;
            let report = runtime.block_on(simulate(&config, drops, timeout_ms))?;
            for (kind, attempts) in report {
                println!("{kind}: {attempts} attempt(s)");
            }
        }
        Commands::Format {
            title,
            body,
            icon,
            data,
        } => {
            let format = data.iter().fold(
                WebPushFormat::new()
                    .title(title.as_deref())
                    .body(body.as_deref())
                    .icon(icon.as_deref()),
                |format, (key, value)| format.data(key, Some(value)),
            );
            println!("{}", format.to_json());
        }
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(())
}

fn parse_key_value(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected key=value, got {raw:?}"))
}

/// Server that ignores the first `drops` attempts of every request kind.
struct LossyServer {
    drops: u32,
    attempts: HashMap<RequestKind, u32>,
}

impl LossyServer {
    fn new(drops: u32) -> Self {
        Self {
            drops,
            attempts: HashMap::new(),
        }
    }

    /// Whether this attempt gets a response.
    fn answers(&mut self, request: &Request) -> bool {
        let attempts = self.attempts.entry(request.kind()).or_insert(0);
        *attempts += 1;
        let answered = *attempts > self.drops;
        log::info!(
            "[Server] {} req {} attempt {}: {}",
            request.kind(),
            request.id(),
            attempts,
            if answered { "REQOK" } else { "dropped" }
        );
        answered
    }
}

/// Drive one streaming session until the filtered unsubscribe is answered.
///
/// Returns attempts per request kind.
async fn simulate(
    config: &Config,
    drops: u32,
    timeout_ms: Option<u64>,
) -> Result<Vec<(RequestKind, u32)>> {
    let timeout = |configured: u64| timeout_ms.unwrap_or(configured);
    let app_id = config
        .application_id
        .clone()
        .unwrap_or_else(|| "com.example.mpn".to_string());

    let subscription = Subscription::new(SubscriptionMode::Merge, "item1 item2", "stock_name last_price")
        .data_adapter("QUOTE_ADAPTER")
        .notification_format(
            WebPushFormat::new()
                .title(Some("${stock_name}"))
                .body(Some("Last price: ${last_price}"))
                .to_json(),
        )
        .coalescing(true);

    // Subscriptions wait for the device id assigned on registration
    let subscribe_queue = Arc::new(MemoryQueue::<PendingSubscribe>::new(
        "subscribe",
        timeout(config.subscribe_timeout_ms),
    ));
    subscribe_queue.enqueue(PendingSubscribe::new(subscription));

    let (transport, mut rx) = ChannelTransport::new();
    let manager = RequestManager::builder(Arc::new(transport) as Arc<dyn ControlTransport>)
        .device(Device::new(Platform::WebPush, app_id, "sim-token"))
        .subscribe_queue(Arc::clone(&subscribe_queue) as Arc<dyn PendingQueue>)
        .build();
    manager.create_new_session();
    manager.send_register(timeout(config.register_timeout_ms))?;

    let mut server = LossyServer::new(drops);
    let mut scheduler = RetryScheduler::new();
    let mut ticker = tokio::time::interval(SIMULATION_TICK);
    let deadline = Instant::now() + SIMULATION_DEADLINE;
    let mut done = false;

    while !done {
        ticker.tick().await;
        let now = Instant::now();
        if now >= deadline {
            anyhow::bail!("Simulation did not settle within {:?}", SIMULATION_DEADLINE);
        }

        for request in scheduler.absorb(&mut rx, now) {
            log::debug!("[Sim] -> {}", request.to_wire());
            if !server.answers(&request) {
                continue;
            }
            if let Some(tutor) = scheduler.get(request.id()) {
                tutor.on_response();
            }

            match request.kind() {
                RequestKind::MpnRegister => {
                    manager.on_device_registered(SIMULATED_DEVICE_ID)?;
                    manager.flush_pending();
                }
                RequestKind::MpnSubscribe => {
                    manager.send_unsubscribe_by_filter(
                        timeout(config.filter_timeout_ms),
                        StatusFilter::All,
                    )?;
                }
                RequestKind::MpnUnsubscribeByFilter => done = true,
                _ => {}
            }
        }

        for (id, outcome) in scheduler.poll_due(now) {
            if let PollOutcome::RecoveryFailed(target) = outcome {
                log::warn!("[Sim] Req {} could not be rebuilt: {:?}", id, target);
            }
        }
        scheduler.retire_finished();
    }

    // Ends the session; anything still armed stops
    manager.create_new_session();
    scheduler.retire_finished();

    let mut report: Vec<_> = server.attempts.into_iter().collect();
    report.sort_by_key(|(kind, _)| kind.code());
    Ok(report)
}
