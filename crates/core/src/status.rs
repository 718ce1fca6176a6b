use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Severity::Info => "info",
            Severity::Success => "success",
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        f.write_str(label)
    }
}

/// The one status line shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    pub message: String,
    pub severity: Severity,
}

impl Status {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            severity,
        }
    }
}

impl Default for Status {
    fn default() -> Self {
        Status::new(Severity::Info, "Ready")
    }
}

/// Holds the current status line. Each report replaces the previous one and
/// is mirrored to the log at a matching level.
#[derive(Clone)]
pub struct StatusReporter {
    tx: Arc<watch::Sender<Status>>,
}

impl StatusReporter {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(Status::default());
        Self { tx: Arc::new(tx) }
    }

    pub fn subscribe(&self) -> watch::Receiver<Status> {
        self.tx.subscribe()
    }

    pub fn current(&self) -> Status {
        self.tx.borrow().clone()
    }

    pub fn report(&self, severity: Severity, message: impl Into<String>) {
        let status = Status::new(severity, message);
        match severity {
            Severity::Info | Severity::Success => tracing::info!("{}", status.message),
            Severity::Warning => tracing::warn!("{}", status.message),
            Severity::Error => tracing::error!("{}", status.message),
        }
        self.tx.send_replace(status);
    }

    pub fn info(&self, message: impl Into<String>) {
        self.report(Severity::Info, message);
    }

    pub fn success(&self, message: impl Into<String>) {
        self.report(Severity::Success, message);
    }

    pub fn warning(&self, message: impl Into<String>) {
        self.report(Severity::Warning, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.report(Severity::Error, message);
    }
}

impl Default for StatusReporter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latest_report_wins() {
        let reporter = StatusReporter::new();
        assert_eq!(reporter.current(), Status::default());

        reporter.info("Loading avatars...");
        reporter.error("HTTP 500");

        let current = reporter.current();
        assert_eq!(current.severity, Severity::Error);
        assert_eq!(current.message, "HTTP 500");
    }

    #[tokio::test]
    async fn subscribers_see_changes() {
        let reporter = StatusReporter::new();
        let mut rx = reporter.subscribe();

        reporter.clone().success("Session started");

        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().severity, Severity::Success);
    }
}
