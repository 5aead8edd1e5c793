/// True when a new sample should be taken.
///
/// `last == 0` means never sampled. Elapsed time uses wrapping subtraction,
/// so the check keeps working across a millisecond counter overflow.
pub fn is_sample_due(now: u32, last: u32, interval_secs: u64) -> bool {
    last == 0 || interval_elapsed(now, last, interval_secs)
}

fn interval_elapsed(now: u32, last: u32, interval_secs: u64) -> bool {
    let elapsed = u64::from(now.wrapping_sub(last));
    elapsed >= interval_secs.saturating_mul(1000)
}

/// Owns the timestamp of the last sample; nothing else writes it.
///
/// "Never sampled" is tracked apart from the timestamp, so a sample taken
/// while the counter reads 0 still starts a full interval.
#[derive(Debug, Default)]
pub struct SamplingScheduler {
    last_sample_ms: Option<u32>,
    samples: u64,
}

impl SamplingScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_due(&self, now: u32, interval_secs: u64) -> bool {
        match self.last_sample_ms {
            None => true,
            Some(last) => interval_elapsed(now, last, interval_secs),
        }
    }

    /// Record a sample attempt at `now`; the next one is due a full interval later.
    pub fn mark(&mut self, now: u32) {
        self.last_sample_ms = Some(now);
        self.samples += 1;
    }

    pub fn last_sample_ms(&self) -> Option<u32> {
        self.last_sample_ms
    }

    pub fn samples(&self) -> u64 {
        self.samples
    }
}
