//! Waiting for windows to appear in the compositor tree.

use std::time::Duration;

use crate::channel::CommandChannel;
use crate::error::Result;
use crate::poll::Probe;
use crate::tree::window_names;

/// Polls the window tree for a title containing a pattern.
pub struct WindowProbe<'c, 'a> {
    channel: &'c CommandChannel<'a>,
    pattern: String,
}

impl<'c, 'a> WindowProbe<'c, 'a> {
    /// Creates a probe for titles containing `pattern`.
    #[must_use]
    pub fn new(channel: &'c CommandChannel<'a>, pattern: impl Into<String>) -> Self {
        Self {
            channel,
            pattern: pattern.into(),
        }
    }
}

impl Probe for WindowProbe<'_, '_> {
    fn probe(&mut self) -> Result<bool> {
        let tree = self.channel.get_tree()?;
        Ok(window_names(&tree)
            .iter()
            .any(|name| name.contains(&self.pattern)))
    }

    fn diagnose(&mut self) -> Result<String> {
        let tree = self.channel.get_tree()?;
        Ok(format!("current list of windows: {:?}", window_names(&tree)))
    }
}

/// Blocks until a window whose title contains `pattern` exists.
pub fn wait_for_window(channel: &CommandChannel<'_>, pattern: &str, timeout: Duration) -> Result<()> {
    tracing::info!("waiting for window matching {:?}", pattern);
    let mut probe = WindowProbe::new(channel, pattern);
    channel
        .guest()
        .poller()
        .with_timeout(timeout)
        .wait_until(&format!("window {pattern:?}"), &mut probe)
}
