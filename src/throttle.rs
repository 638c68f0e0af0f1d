use rand::Rng;
use std::time::Duration;

/// Randomized pause taken before every page request.
///
/// The delay is unconditional; it does not react to anything the server says.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThrottlePolicy {
    min_delay_ms: u64,
    max_delay_ms: u64,
}

impl ThrottlePolicy {
    /// Bounds are swapped if given in the wrong order.
    pub fn new(min_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            min_delay_ms: min_delay_ms.min(max_delay_ms),
            max_delay_ms: min_delay_ms.max(max_delay_ms),
        }
    }

    pub fn disabled() -> Self {
        Self::new(0, 0)
    }

    pub fn is_disabled(&self) -> bool {
        self.max_delay_ms == 0
    }

    pub fn sample(&self) -> Duration {
        if self.min_delay_ms == self.max_delay_ms {
            return Duration::from_millis(self.min_delay_ms);
        }
        let ms = rand::thread_rng().gen_range(self.min_delay_ms..=self.max_delay_ms);
        Duration::from_millis(ms)
    }

    pub async fn wait(&self) {
        if self.is_disabled() {
            return;
        }
        let delay = self.sample();
        tracing::trace!("Throttling for {}ms", delay.as_millis());
        tokio::time::sleep(delay).await;
    }
}

impl Default for ThrottlePolicy {
    fn default() -> Self {
        Self::new(2000, 4000)
    }
}
