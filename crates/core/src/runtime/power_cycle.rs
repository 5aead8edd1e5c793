use super::deferred::{DeferredAction, DeferredQueue};
use crate::types::{PowerState, SleepConfig};

/// Delay between the transport coming up and the sleep handshake, so the
/// telemetry just sent can flush.
pub const PREPARE_SLEEP_DELAY_MS: u32 = 100;

/// Inputs to the power state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerEvent {
    /// One pass of the cooperative loop.
    Tick,
    TransportReady,
    TransportLost,
    ReadyToSleep,
}

/// Side effects the driver must carry out for the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerCommand {
    /// Ask the transport to flush and detach.
    PrepareTransport,
    /// Issue the hardware deep-sleep request. No way back except a reset.
    DeepSleep { micros: u64 },
}

/// Awake / deep-sleep state machine.
///
/// Awake → AwaitingTransportReady once sleep is enabled.
/// Transport up → a `PrepareSleep` action is deferred by [`PREPARE_SLEEP_DELAY_MS`].
/// The deferred queue only advances past the awake grace window.
/// Deferred action fires → PreparingSleep (transport handshake).
/// ReadyToSleep → Sleeping (deep-sleep request, terminal).
/// Disabling sleep before that returns to Awake; losing the transport
/// returns to AwaitingTransportReady.
#[derive(Debug, Default)]
pub struct PowerCycle {
    state: PowerState,
    deferred: DeferredQueue,
    link_up: bool,
}

impl PowerCycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> PowerState {
        self.state
    }

    /// True while the sleep handshake is scheduled but has not started.
    pub fn sleep_pending(&self) -> bool {
        self.deferred.is_pending(DeferredAction::PrepareSleep)
    }

    /// Transition function. `sleep` is read fresh by the caller every tick.
    pub fn handle(
        &mut self,
        event: PowerEvent,
        now: u32,
        sleep: &SleepConfig,
    ) -> Option<PowerCommand> {
        match event {
            PowerEvent::TransportReady => self.link_up = true,
            PowerEvent::TransportLost => self.link_up = false,
            PowerEvent::Tick | PowerEvent::ReadyToSleep => {}
        }

        if self.state == PowerState::Sleeping {
            return None;
        }

        if !sleep.enabled {
            if self.state != PowerState::Awake {
                tracing::info!("deep sleep disabled, staying awake");
                self.deferred.clear();
                self.set_state(PowerState::Awake);
            }
            return None;
        }

        if self.state == PowerState::Awake {
            self.set_state(PowerState::AwaitingTransportReady);
        }

        match event {
            PowerEvent::TransportReady => {
                self.arm(now);
                None
            }
            PowerEvent::TransportLost => {
                if self.sleep_pending() || self.state == PowerState::PreparingSleep {
                    tracing::warn!(state = %self.state, "transport lost before sleep, waiting for reconnect");
                }
                self.deferred.cancel(DeferredAction::PrepareSleep);
                if self.state == PowerState::PreparingSleep {
                    self.set_state(PowerState::AwaitingTransportReady);
                }
                None
            }
            PowerEvent::ReadyToSleep => {
                if self.state != PowerState::PreparingSleep {
                    tracing::debug!(state = %self.state, "ready-to-sleep outside handshake, ignored");
                    return None;
                }
                let micros = sleep.sleep_duration_micros();
                tracing::info!(
                    sleep_secs = sleep.sleep_duration_secs,
                    micros,
                    "ready to sleep"
                );
                self.set_state(PowerState::Sleeping);
                Some(PowerCommand::DeepSleep { micros })
            }
            PowerEvent::Tick => {
                // sleep enabled while the link was already up
                self.arm(now);
                if !sleep.grace_elapsed(now) {
                    return None;
                }
                let due = self.deferred.poll(now);
                if due.contains(&DeferredAction::PrepareSleep)
                    && self.state == PowerState::AwaitingTransportReady
                {
                    self.set_state(PowerState::PreparingSleep);
                    return Some(PowerCommand::PrepareTransport);
                }
                None
            }
        }
    }

    fn arm(&mut self, now: u32) {
        if self.state != PowerState::AwaitingTransportReady || !self.link_up {
            return;
        }
        if self
            .deferred
            .schedule(now, PREPARE_SLEEP_DELAY_MS, DeferredAction::PrepareSleep)
        {
            tracing::info!(
                delay_ms = PREPARE_SLEEP_DELAY_MS,
                "transport ready, preparing for deep sleep"
            );
        }
    }

    fn set_state(&mut self, to: PowerState) {
        if self.state != to {
            tracing::info!(from = %self.state, %to, "power state transition");
            self.state = to;
        }
    }
}
