// ABOUTME: Tracks the timestamp of the most recent journaled operation.
// ABOUTME: Kept behind its own small lock so journaling never contends with list data locks.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;

/// The "last logged operation" timestamp. Starts at the recovered watermark
/// (the Unix epoch for a fresh store) and only moves forward.
#[derive(Debug)]
pub struct Watermark {
    inner: Mutex<DateTime<Utc>>,
}

impl Watermark {
    pub fn new(initial: DateTime<Utc>) -> Self {
        Self {
            inner: Mutex::new(initial),
        }
    }

    pub fn get(&self) -> DateTime<Utc> {
        *self.inner.lock()
    }

    /// Move the watermark to `ts` if it is later than the current value.
    pub fn advance(&self, ts: DateTime<Utc>) {
        let mut current = self.inner.lock();
        if ts > *current {
            *current = ts;
        }
    }
}

impl Default for Watermark {
    fn default() -> Self {
        Self::new(DateTime::<Utc>::UNIX_EPOCH)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn advance_keeps_the_maximum() {
        let start = Utc::now();
        let mark = Watermark::new(start);

        mark.advance(start - Duration::seconds(1));
        assert_eq!(mark.get(), start);

        mark.advance(start + Duration::nanoseconds(1));
        assert_eq!(mark.get(), start + Duration::nanoseconds(1));
    }

    #[test]
    fn default_is_epoch() {
        assert_eq!(Watermark::default().get(), DateTime::<Utc>::UNIX_EPOCH);
    }
}
