//! Deep-sleep lifecycle tests: power controller driven through a whole `Device`.

use std::time::Duration;

use serde_json::json;
use soilsense_core::config::SettingsStore;
use soilsense_core::ports::{Clock, TransportEvent};
use soilsense_core::ports::mock::{
    FixedSensor, ManualClock, RecordingIndicator, RecordingSleep, RecordingTransport,
};
use soilsense_core::runtime::{Device, DevicePorts, RunOutcome};
use soilsense_core::types::PowerState;
use tokio_util::sync::CancellationToken;

struct Rig {
    transport: RecordingTransport,
    sleeper: RecordingSleep,
    clock: ManualClock,
    sensor: FixedSensor,
}

impl Rig {
    fn new() -> Self {
        Self {
            transport: RecordingTransport::new(),
            sleeper: RecordingSleep::new(),
            clock: ManualClock::new(1),
            sensor: FixedSensor::new(605.0),
        }
    }

    fn boot(&self, settings: SettingsStore) -> Device {
        Device::new(
            settings,
            DevicePorts {
                sensor: Box::new(self.sensor.clone()),
                indicator: Box::new(RecordingIndicator::new()),
                transport: Box::new(self.transport.clone()),
                sleeper: Box::new(self.sleeper.clone()),
                clock: Box::new(self.clock.clone()),
            },
        )
    }

    /// Tick every `step_ms` until `until_ms`, stopping early once asleep.
    fn run_until(&self, dev: &mut Device, until_ms: u32, step_ms: u32) {
        while self.clock.millis() < until_ms && dev.power_state() != PowerState::Sleeping {
            dev.tick();
            self.clock.advance(step_ms);
        }
    }
}

fn sleepy_settings() -> SettingsStore {
    let mut s = SettingsStore::new();
    assert!(s.apply_json(&json!({ "deepSleep": true })).is_empty());
    s
}

/// deepSleep=false: no transport event ever moves the device out of AWAKE.
#[test]
fn sleep_disabled_stays_awake_forever() {
    let rig = Rig::new();
    rig.transport.ack_sleep(true);
    let mut dev = rig.boot(SettingsStore::new());

    rig.transport.connect();
    for i in 0..2_000 {
        if i % 100 == 0 {
            rig.transport.push_event(TransportEvent::ReadyToSleep);
        }
        if i % 250 == 0 {
            rig.transport.disconnect();
            rig.transport.connect();
        }
        assert_eq!(dev.tick().power, PowerState::Awake);
        rig.clock.advance(50);
    }
    assert_eq!(rig.transport.prepare_calls(), 0);
    assert!(rig.sleeper.requests().is_empty());
}

/// Full cycle with the default 20 s grace window: ready → wait out grace → prepare → sleep.
#[test]
fn sleeps_after_grace_window() {
    let rig = Rig::new();
    rig.transport.ack_sleep(true);
    let mut dev = rig.boot(sleepy_settings());

    rig.transport.connect();
    rig.run_until(&mut dev, 20_000, 50);
    assert_eq!(dev.power_state(), PowerState::AwaitingTransportReady);
    assert_eq!(rig.transport.prepare_calls(), 0);

    rig.run_until(&mut dev, 21_000, 50);
    assert_eq!(dev.power_state(), PowerState::Sleeping);
    assert_eq!(rig.transport.prepare_calls(), 1);
    assert_eq!(rig.sleeper.requests(), vec![30_000_000]);
    assert_eq!(dev.slept_micros(), Some(30_000_000));
}

/// The sample is taken and published before the sleep handshake starts.
#[test]
fn telemetry_goes_out_before_sleep() {
    let rig = Rig::new();
    rig.transport.ack_sleep(true);
    let mut dev = rig.boot(sleepy_settings());
    rig.transport.connect();
    rig.run_until(&mut dev, 60_000, 50);

    assert_eq!(dev.power_state(), PowerState::Sleeping);
    assert_eq!(rig.transport.values_of("saturation"), vec!["50".to_owned()]);
}

/// Config pushed during the grace window is honoured before sleeping.
#[test]
fn grace_window_allows_reconfiguration() {
    let rig = Rig::new();
    rig.transport.ack_sleep(true);
    let mut dev = rig.boot(sleepy_settings());
    rig.transport.connect();
    rig.run_until(&mut dev, 5_000, 50);

    rig.transport.push_settings(json!({ "deepSleep": false }));
    rig.run_until(&mut dev, 120_000, 50);

    assert_eq!(dev.power_state(), PowerState::Awake);
    assert!(rig.sleeper.requests().is_empty());
}

/// A longer pushed sleep duration is what reaches the hardware, in microseconds.
#[test]
fn pushed_sleep_duration_reaches_hardware() {
    let rig = Rig::new();
    rig.transport.ack_sleep(true);
    let mut dev = rig.boot(sleepy_settings());
    rig.transport.connect();
    rig.transport.push_settings(json!({ "sleepSeconds": 600 }));
    rig.run_until(&mut dev, 30_000, 50);

    assert_eq!(rig.sleeper.requests(), vec![600_000_000]);
}

/// Transport never comes up: the device keeps sampling and never sleeps.
#[test]
fn unreachable_transport_degrades_to_always_on() {
    let rig = Rig::new();
    let mut dev = rig.boot(sleepy_settings());
    let mut samples = 0;
    while rig.clock.millis() < 300_000 {
        if dev.tick().sample.is_some() {
            samples += 1;
        }
        rig.clock.advance(100);
    }
    assert_eq!(dev.power_state(), PowerState::AwaitingTransportReady);
    assert_eq!(samples, 10);
    assert!(rig.sleeper.requests().is_empty());
}

/// Handshake started but never acknowledged: device stays up and keeps sampling.
#[test]
fn unacknowledged_handshake_keeps_sampling() {
    let rig = Rig::new();
    let mut dev = rig.boot(sleepy_settings());
    rig.transport.connect();
    rig.run_until(&mut dev, 120_000, 50);

    assert_eq!(dev.power_state(), PowerState::PreparingSleep);
    assert_eq!(rig.transport.prepare_calls(), 1);
    assert_eq!(rig.transport.values_of("saturation").len(), 4);
    assert!(rig.sleeper.requests().is_empty());
}

/// Disconnect mid-handshake, reconnect, and the cycle completes.
#[test]
fn reconnect_rearms_sleep() {
    let rig = Rig::new();
    let mut dev = rig.boot(sleepy_settings());
    rig.transport.connect();
    rig.run_until(&mut dev, 21_000, 50);
    assert_eq!(dev.power_state(), PowerState::PreparingSleep);

    rig.transport.disconnect();
    rig.run_until(&mut dev, 22_000, 50);
    assert_eq!(dev.power_state(), PowerState::AwaitingTransportReady);

    rig.transport.ack_sleep(true);
    rig.transport.connect();
    rig.run_until(&mut dev, 23_000, 50);
    assert_eq!(dev.power_state(), PowerState::Sleeping);
    assert_eq!(rig.transport.prepare_calls(), 2);
}

/// After a reset the device boots AWAKE again with the persisted settings.
#[test]
fn reset_resumes_awake_with_persisted_settings() {
    let rig = Rig::new();
    rig.transport.ack_sleep(true);
    let mut dev = rig.boot(sleepy_settings());
    rig.transport.connect();
    rig.transport.push_settings(json!({ "sleepSeconds": 120 }));
    rig.run_until(&mut dev, 30_000, 50);
    assert_eq!(dev.power_state(), PowerState::Sleeping);

    let settings = dev.into_settings();
    rig.clock.set(1);
    let rebooted = rig.boot(settings);
    assert_eq!(rebooted.power_state(), PowerState::Awake);
    assert_eq!(rebooted.settings().snapshot().sleep_seconds, 120);
}

#[tokio::test(start_paused = true)]
async fn run_returns_once_asleep() {
    let rig = Rig::new();
    rig.transport.ack_sleep(true);
    // boot past the grace window so only the flush delay remains
    rig.clock.set(25_000);
    rig.transport.connect();
    let mut dev = rig.boot(sleepy_settings());

    let clock = rig.clock.clone();
    let token = CancellationToken::new();
    let advance = tokio::spawn(async move {
        loop {
            tokio::time::sleep(Duration::from_millis(10)).await;
            clock.advance(10);
        }
    });

    let outcome = dev.run(Duration::from_millis(10), token).await;
    advance.abort();
    assert_eq!(outcome, RunOutcome::Slept { micros: 30_000_000 });
}

#[tokio::test(start_paused = true)]
async fn run_stops_on_cancel() {
    let rig = Rig::new();
    let mut dev = rig.boot(SettingsStore::new());
    let token = CancellationToken::new();
    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(5)).await;
        canceller.cancel();
    });

    let outcome = dev.run(Duration::from_millis(50), token).await;
    assert_eq!(outcome, RunOutcome::Cancelled);
    assert!(dev.tick_count() > 0);
    assert_eq!(dev.power_state(), PowerState::Awake);
}
