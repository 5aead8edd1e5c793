mod options;
mod sim;

use anyhow::Context;
use soilsense_core::runtime::ShutdownGuard;
use soilsense_core::{Device, RunOutcome, SettingsStore};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use options::Options;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let opts = Options::from_env()?;

    // stdout carries telemetry, so logs go to stderr
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    if opts.log_json {
        registry
            .with(fmt::layer().json().with_target(true).with_writer(std::io::stderr))
            .init();
    } else {
        registry.with(fmt::layer().with_writer(std::io::stderr)).init();
    }

    let mut settings = match &opts.config {
        Some(path) => SettingsStore::load(path)
            .with_context(|| format!("loading settings from {}", path.display()))?,
        None => SettingsStore::new(),
    };

    let guard = ShutdownGuard::new();
    guard.spawn_signal_listener();
    let token = guard.token();
    let inbox = sim::spawn_stdin_thread();

    let mut boots: u32 = 0;
    loop {
        boots += 1;
        tracing::info!(boot = boots, device = %opts.device_id, "boot");
        let mut device = Device::new(settings, sim::ports(&opts.device_id, inbox.clone()));

        let micros = match device.run(opts.tick, token.clone()).await {
            RunOutcome::Cancelled => break,
            RunOutcome::Slept { micros } => micros,
        };
        settings = device.into_settings();

        if opts.max_boots.is_some_and(|max| boots >= max) {
            tracing::info!(boots, "boot limit reached");
            break;
        }

        // waking is a reset: the next boot starts AWAKE with the persisted settings
        if !guard.sleep_until_wake(micros).await {
            break;
        }
    }

    tracing::info!(boots, "simulator stopped");
    Ok(())
}
