use std::time::Duration;

use tokio::signal;
use tokio_util::sync::CancellationToken;

/// Power switch for a hosted device: SIGINT or SIGTERM cuts power.
///
/// Cutting power cancels the running tick loop and any pending wake-up timer.
#[derive(Debug, Clone, Default)]
pub struct ShutdownGuard {
    token: CancellationToken,
}

impl ShutdownGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Token handed to [`Device::run`](super::Device::run).
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn power_off(&self) {
        self.token.cancel();
    }

    pub fn is_powered_off(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Hold the device in deep sleep until its wake-up timer fires.
    ///
    /// Returns `false` if power was cut first.
    pub async fn sleep_until_wake(&self, duration_micros: u64) -> bool {
        let wake_in = Duration::from_micros(duration_micros);
        tracing::info!(wake_in_ms = wake_in.as_millis() as u64, "sleeping until wake-up timer");
        tokio::select! {
            _ = self.token.cancelled() => false,
            _ = tokio::time::sleep(wake_in) => true,
        }
    }

    /// Spawn a background task that cuts power on the first OS signal.
    pub fn spawn_signal_listener(&self) {
        let guard = self.clone();
        tokio::spawn(async move {
            #[cfg(unix)]
            {
                match signal::unix::signal(signal::unix::SignalKind::terminate()) {
                    Ok(mut sigterm) => tokio::select! {
                        _ = sigterm.recv() => tracing::info!("SIGTERM, powering off"),
                        _ = signal::ctrl_c() => tracing::info!("Ctrl+C, powering off"),
                    },
                    Err(e) => {
                        tracing::warn!(error = %e, "no SIGTERM handler, listening for Ctrl+C only");
                        let _ = signal::ctrl_c().await;
                        tracing::info!("Ctrl+C, powering off");
                    }
                }
            }
            #[cfg(not(unix))]
            {
                let _ = signal::ctrl_c().await;
                tracing::info!("Ctrl+C, powering off");
            }
            guard.power_off();
        });
    }
}
