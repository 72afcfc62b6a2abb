//! Test harness wiring a simulated guest into a scenario context.

use std::time::Duration;

use vmcheck_core::{Config, Context, Guest, Poller, RunReport, ScenarioDriver, Suite};

use crate::vm::{Fault, SimulatedVm};

/// One suite against one simulated guest.
///
/// Every harness owns a fresh guest, so tests never share state.
pub struct TestHarness {
    suite: Suite,
    config: Config,
    vm: SimulatedVm,
}

impl TestHarness {
    /// Creates a harness for `suite` with its built-in configuration.
    pub fn new(suite: Suite) -> Self {
        let mut config = suite.default_config();
        config.poll.interval_ms = 1;
        config.poll.timeout_secs = 1;
        let vm = SimulatedVm::new(&config);
        Self { suite, config, vm }
    }

    /// Makes the guest misbehave for the whole run.
    #[must_use]
    pub fn with_fault(self, fault: Fault) -> Self {
        self.vm.inject(fault);
        self
    }

    pub const fn vm(&self) -> &SimulatedVm {
        &self.vm
    }

    pub const fn config(&self) -> &Config {
        &self.config
    }

    /// Builds a scenario context over the guest.
    ///
    /// Waits give up after 50ms so a failing scenario fails fast.
    pub fn context(&self) -> Context {
        let poller = Poller::new(Duration::from_millis(1), Duration::from_millis(50));
        Context::new(Guest::new(self.vm.clone(), poller), self.config.clone())
    }

    /// Runs the whole suite.
    pub fn run(&self) -> RunReport {
        let mut ctx = self.context();
        ScenarioDriver::new(self.suite).run(&mut ctx)
    }
}
