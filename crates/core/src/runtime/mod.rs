mod deferred;
mod device;
mod power_cycle;
mod sampling;
mod shutdown;

pub use deferred::{DeferredAction, DeferredQueue};
pub use device::{
    Device, DevicePorts, MAX_EVENTS_PER_TICK, RunOutcome, SampleOutcome, TickReport,
};
pub use power_cycle::{PREPARE_SLEEP_DELAY_MS, PowerCommand, PowerCycle, PowerEvent};
pub use sampling::{SamplingScheduler, is_sample_due};
pub use shutdown::ShutdownGuard;
pub use crate::types::PowerState;
