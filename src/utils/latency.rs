use std::time::Duration;

/// Simulated processing delay awaited by every mutating handler
///
/// Production wiring reads the delay from `MASTERY_LATENCY_MS`; tests use
/// [`Latency::none`]. The pause cannot be cancelled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Latency(Duration);

impl Latency {
    pub fn none() -> Self {
        Latency(Duration::ZERO)
    }

    pub fn from_millis(millis: u64) -> Self {
        Latency(Duration::from_millis(millis))
    }

    pub fn duration(&self) -> Duration {
        self.0
    }

    pub async fn pause(&self) {
        if !self.0.is_zero() {
            tokio::time::sleep(self.0).await;
        }
    }
}
