//! Bounded polling for asynchronous guest state.
//!
//! Windows appear, marker files materialize and processes exit on their own
//! schedule. [`Poller::wait_until`] re-checks a [`Probe`] until it holds, and
//! before giving up asks it for one diagnostic snapshot and checks it a final
//! time, so a timeout always carries the state that was last observed.

use std::time::{Duration, Instant};

use crate::error::{HarnessError, Result};

/// A condition the poller can check and describe.
pub trait Probe {
    /// Returns true once the awaited state holds.
    ///
    /// `Ok(false)` means "not yet"; an `Err` is fatal and ends the wait.
    fn probe(&mut self) -> Result<bool>;

    /// Describes the currently observed state. Called once, on the last chance.
    fn diagnose(&mut self) -> Result<String>;
}

/// [`Probe`] built from a pair of closures.
pub struct FnProbe<P, D> {
    probe: P,
    diagnose: D,
}

/// Builds a [`Probe`] from a check closure and a diagnostic closure.
pub fn probe_fn<P, D>(probe: P, diagnose: D) -> FnProbe<P, D>
where
    P: FnMut() -> Result<bool>,
    D: FnMut() -> Result<String>,
{
    FnProbe { probe, diagnose }
}

impl<P, D> Probe for FnProbe<P, D>
where
    P: FnMut() -> Result<bool>,
    D: FnMut() -> Result<String>,
{
    fn probe(&mut self) -> Result<bool> {
        (self.probe)()
    }

    fn diagnose(&mut self) -> Result<String> {
        (self.diagnose)()
    }
}

/// Retry schedule shared by every wait in a run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Poller {
    interval: Duration,
    timeout: Duration,
    backoff: f64,
    max_interval: Duration,
}

impl Default for Poller {
    fn default() -> Self {
        Self::new(Duration::from_secs(1), Duration::from_secs(900))
    }
}

impl Poller {
    /// Creates a poller with a fixed interval.
    #[must_use]
    pub const fn new(interval: Duration, timeout: Duration) -> Self {
        Self {
            interval,
            timeout,
            backoff: 1.0,
            max_interval: interval,
        }
    }

    /// Multiplies the interval by `factor` after each attempt, up to `max_interval`.
    #[must_use]
    pub fn with_backoff(mut self, factor: f64, max_interval: Duration) -> Self {
        self.backoff = factor.max(1.0);
        self.max_interval = max_interval.max(self.interval);
        self
    }

    /// Returns a copy with a different overall timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Overall timeout before the last chance.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Initial interval between attempts.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        self.interval
    }

    fn next_delay(&self, delay: Duration) -> Duration {
        if self.backoff <= 1.0 {
            return delay;
        }
        Duration::try_from_secs_f64(delay.as_secs_f64() * self.backoff)
            .map_or(self.max_interval, |next| next.min(self.max_interval))
    }

    /// Blocks until `probe` holds or the timeout elapses.
    ///
    /// # Errors
    ///
    /// Returns [`HarnessError::Timeout`] with the last-chance diagnostic if the
    /// probe never held, or the first error raised by the probe.
    pub fn wait_until<P: Probe + ?Sized>(&self, what: &str, probe: &mut P) -> Result<()> {
        let start = Instant::now();
        let mut delay = self.interval;
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            if probe.probe()? {
                tracing::debug!("{} after {} attempt(s)", what, attempts);
                return Ok(());
            }

            let remaining = self.timeout.saturating_sub(start.elapsed());
            if delay.is_zero() || delay > remaining {
                break;
            }
            std::thread::sleep(delay);
            delay = self.next_delay(delay);
        }

        let diagnostic = probe.diagnose()?;
        tracing::warn!("Last call for {}! Observed state: {}", what, diagnostic);

        if probe.probe()? {
            return Ok(());
        }

        Err(HarnessError::Timeout {
            what: what.to_string(),
            timeout: self.timeout,
            diagnostic: Some(diagnostic),
        })
    }
}
