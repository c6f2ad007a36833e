//! User-facing notifications ("toasts"). The UI decides how to render them;
//! the core only emits them through an injected [`Notifier`].

use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastLevel {
    Info,
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub level: ToastLevel,
    pub message: String,
}

impl Toast {
    pub fn new(level: ToastLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }
}

pub trait Notifier: Send + Sync {
    fn notify(&self, toast: Toast);
}

/// Writes toasts to the log; the notifier for terminal tools such as `compliance_probe`.
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn notify(&self, toast: Toast) {
        match toast.level {
            ToastLevel::Warning | ToastLevel::Error => {
                tracing::warn!(target: "toast", level = ?toast.level, "{}", toast.message)
            }
            _ => tracing::info!(target: "toast", level = ?toast.level, "{}", toast.message),
        }
    }
}

// --- Test helper ---
#[derive(Default)]
pub struct RecordingNotifier {
    pub toasts: Mutex<Vec<Toast>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<String> {
        self.toasts
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .iter()
            .map(|t| t.message.clone())
            .collect()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, toast: Toast) {
        self.toasts
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(toast);
    }
}
