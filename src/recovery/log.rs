use tracing::debug;

/// Human-readable trail of one recovery run
///
/// Every line is also emitted as a `debug!` event so the trail shows up in
/// the host application's logs without being returned.
#[derive(Clone, Debug, Default)]
pub struct RecoveryLog {
    lines: Vec<String>,
}

impl RecoveryLog {
    /// Empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one line
    pub fn push(&mut self, line: impl Into<String>) {
        let line = line.into();
        debug!(recovery_step = %line, "recovery log");
        self.lines.push(line);
    }

    /// Lines recorded so far
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Consume the log, returning its lines
    pub fn into_lines(self) -> Vec<String> {
        self.lines
    }
}
