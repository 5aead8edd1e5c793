/// One-shot actions the power controller can defer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeferredAction {
    /// Start the transport's sleep handshake.
    PrepareSleep,
}

#[derive(Debug, Clone, Copy)]
struct Entry {
    scheduled_at: u32,
    delay_ms: u32,
    action: DeferredAction,
}

/// Cooperative one-shot timer list, polled once per tick.
///
/// Deadlines are stored as (start, delay) pairs and compared with wrapping
/// subtraction, so a millisecond counter overflow between scheduling and
/// firing does not matter.
#[derive(Debug, Default)]
pub struct DeferredQueue {
    entries: Vec<Entry>,
}

impl DeferredQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `action` to fire `delay_ms` after `now`. Returns false if the
    /// same action is already pending.
    pub fn schedule(&mut self, now: u32, delay_ms: u32, action: DeferredAction) -> bool {
        if self.is_pending(action) {
            return false;
        }
        self.entries.push(Entry {
            scheduled_at: now,
            delay_ms,
            action,
        });
        true
    }

    /// Remove and return every action whose delay has elapsed, oldest first.
    pub fn poll(&mut self, now: u32) -> Vec<DeferredAction> {
        let mut due = Vec::new();
        self.entries.retain(|e| {
            if now.wrapping_sub(e.scheduled_at) >= e.delay_ms {
                due.push(e.action);
                false
            } else {
                true
            }
        });
        due
    }

    pub fn is_pending(&self, action: DeferredAction) -> bool {
        self.entries.iter().any(|e| e.action == action)
    }

    pub fn cancel(&mut self, action: DeferredAction) {
        self.entries.retain(|e| e.action != action);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
