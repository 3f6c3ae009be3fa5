//! Single-value progress channel for one validation or recovery call

use tokio::sync::watch;

/// Publishes progress in `0.0..=1.0`; only the latest value is kept
///
/// A reporter created with [`ProgressReporter::disabled`] drops every update.
#[derive(Clone, Debug, Default)]
pub struct ProgressReporter {
    sender: Option<watch::Sender<f32>>,
}

impl ProgressReporter {
    /// Reporter plus the receiver observing it, starting at 0.0
    pub fn channel() -> (Self, watch::Receiver<f32>) {
        let (sender, receiver) = watch::channel(0.0);
        (
            Self {
                sender: Some(sender),
            },
            receiver,
        )
    }

    /// Reporter that discards updates
    pub fn disabled() -> Self {
        Self { sender: None }
    }

    /// Publish a new value, clamped to `0.0..=1.0`
    pub fn set(&self, value: f32) {
        if let Some(sender) = &self.sender {
            // send_replace never fails, even with no receivers left
            sender.send_replace(value.clamp(0.0, 1.0));
        }
    }
}
