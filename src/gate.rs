//! Compliance gate for an edited post.
//!
//! ```text
//! Viewing ──begin_edit──▶ Editing ──save──▶ CheckingCompliance ──compliant──▶ Viewing (committed)
//!    ▲                       ▲                       │
//!    │                       └──begin_edit── Flagged ◀──non-compliant──┘
//! ```
//!
//! Nothing here persists; a reload starts over in `Viewing`.

use thiserror::Error;
use tracing::debug;

use crate::compliance::{ComplianceCheck, ComplianceVerdict};
use crate::notify::{Notifier, Toast, ToastLevel};

pub const FLAGGED_COPY_NOTICE: &str =
    "This content was flagged by the compliance check. Edit it and save again before copying.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Viewing,
    Editing,
    CheckingCompliance,
    Flagged,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GateError {
    #[error("cannot {action} while {from:?}")]
    InvalidTransition { from: GateState, action: &'static str },
}

/// System clipboard seam.
pub trait Clipboard {
    fn write_text(&mut self, text: &str) -> anyhow::Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CopyOutcome {
    Copied,
    /// Flagged content; clipboard untouched.
    Blocked,
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct ComplianceGate {
    state: GateState,
    committed: String,
    draft: String,
    last_verdict: Option<ComplianceVerdict>,
}

impl ComplianceGate {
    /// Freshly generated content starts in `Viewing`, optionally with its verdict.
    pub fn new(content: impl Into<String>, verdict: Option<ComplianceVerdict>) -> Self {
        let state = match &verdict {
            Some(v) if !v.is_compliant => GateState::Flagged,
            _ => GateState::Viewing,
        };
        let content = content.into();
        Self {
            state,
            draft: content.clone(),
            committed: content,
            last_verdict: verdict,
        }
    }

    pub fn state(&self) -> GateState {
        self.state
    }

    pub fn committed(&self) -> &str {
        &self.committed
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn last_verdict(&self) -> Option<&ComplianceVerdict> {
        self.last_verdict.as_ref()
    }

    fn invalid(&self, action: &'static str) -> GateError {
        GateError::InvalidTransition {
            from: self.state,
            action,
        }
    }

    /// Viewing → Editing (draft reset to committed); Flagged → Editing (draft kept).
    pub fn begin_edit(&mut self) -> Result<(), GateError> {
        match self.state {
            GateState::Viewing => {
                self.draft = self.committed.clone();
                self.state = GateState::Editing;
                Ok(())
            }
            GateState::Flagged => {
                self.state = GateState::Editing;
                Ok(())
            }
            GateState::Editing => Ok(()),
            GateState::CheckingCompliance => Err(self.invalid("edit")),
        }
    }

    pub fn update_draft(&mut self, text: impl Into<String>) -> Result<(), GateError> {
        if self.state != GateState::Editing {
            return Err(self.invalid("update draft"));
        }
        self.draft = text.into();
        Ok(())
    }

    /// Abandon the edit. Only from Editing, and only back to the committed text.
    pub fn cancel_edit(&mut self) -> Result<(), GateError> {
        if self.state != GateState::Editing {
            return Err(self.invalid("cancel edit"));
        }
        self.draft = self.committed.clone();
        self.state = match &self.last_verdict {
            Some(v) if !v.is_compliant => GateState::Flagged,
            _ => GateState::Viewing,
        };
        Ok(())
    }

    /// Editing → CheckingCompliance; returns the text to check.
    pub fn save(&mut self) -> Result<String, GateError> {
        if self.state != GateState::Editing {
            return Err(self.invalid("save"));
        }
        self.state = GateState::CheckingCompliance;
        Ok(self.draft.clone())
    }

    /// CheckingCompliance → Viewing (commit) or → Flagged (draft kept, not committed).
    pub fn apply_verdict(&mut self, verdict: ComplianceVerdict) -> Result<GateState, GateError> {
        if self.state != GateState::CheckingCompliance {
            return Err(self.invalid("apply verdict"));
        }
        if verdict.is_compliant {
            self.committed = self.draft.clone();
            self.state = GateState::Viewing;
        } else {
            self.state = GateState::Flagged;
        }
        debug!(target: "gate", state = ?self.state, "verdict applied");
        self.last_verdict = Some(verdict);
        Ok(self.state)
    }

    /// `save` + check + `apply_verdict` in one step.
    pub async fn save_and_check<C: ComplianceCheck + ?Sized>(
        &mut self,
        checker: &C,
    ) -> Result<GateState, GateError> {
        let text = self.save()?;
        let verdict = checker.check_content(&text).await;
        self.apply_verdict(verdict)
    }

    fn is_flagged(&self) -> bool {
        self.state == GateState::Flagged
            || self.last_verdict.as_ref().is_some_and(|v| !v.is_compliant)
    }

    /// Copy/export allowed only for committed, non-flagged content in `Viewing`.
    pub fn can_export(&self) -> bool {
        self.state == GateState::Viewing && !self.is_flagged()
    }

    pub fn copy(&self, clipboard: &mut dyn Clipboard, notifier: &dyn Notifier) -> CopyOutcome {
        if self.is_flagged() {
            notifier.notify(Toast::new(ToastLevel::Warning, FLAGGED_COPY_NOTICE));
            return CopyOutcome::Blocked;
        }
        if self.state != GateState::Viewing {
            notifier.notify(Toast::new(
                ToastLevel::Info,
                "Save your edits before copying.",
            ));
            return CopyOutcome::Blocked;
        }
        match clipboard.write_text(&self.committed) {
            Ok(()) => {
                notifier.notify(Toast::new(ToastLevel::Success, "Copied to clipboard"));
                CopyOutcome::Copied
            }
            Err(e) => {
                notifier.notify(Toast::new(ToastLevel::Error, "Failed to copy to clipboard"));
                CopyOutcome::Failed(e.to_string())
            }
        }
    }
}

// --- Test helper ---
#[derive(Debug, Default)]
pub struct RecordingClipboard {
    pub writes: Vec<String>,
}

impl Clipboard for RecordingClipboard {
    fn write_text(&mut self, text: &str) -> anyhow::Result<()> {
        self.writes.push(text.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compliance::FallbackPolicy;
    use crate::notify::RecordingNotifier;

    struct FixedCheck(ComplianceVerdict);

    #[async_trait::async_trait]
    impl ComplianceCheck for FixedCheck {
        async fn check_content(&self, _content: &str) -> ComplianceVerdict {
            self.0.clone()
        }
    }

    #[tokio::test]
    async fn compliant_save_commits() {
        let mut g = ComplianceGate::new("v1", Some(ComplianceVerdict::compliant()));
        g.begin_edit().unwrap();
        g.update_draft("v2").unwrap();
        let s = g
            .save_and_check(&FixedCheck(ComplianceVerdict::compliant()))
            .await
            .unwrap();
        assert_eq!(s, GateState::Viewing);
        assert_eq!(g.committed(), "v2");
        assert!(g.can_export());
    }

    #[tokio::test]
    async fn flagged_save_keeps_draft_uncommitted() {
        let mut g = ComplianceGate::new("v1", None);
        g.begin_edit().unwrap();
        g.update_draft("buy now!").unwrap();
        let s = g
            .save_and_check(&FixedCheck(ComplianceVerdict::flagged("advice")))
            .await
            .unwrap();
        assert_eq!(s, GateState::Flagged);
        assert_eq!(g.committed(), "v1");
        assert_eq!(g.draft(), "buy now!");
        assert!(!g.can_export());

        // Flagged → Editing keeps the retained draft.
        g.begin_edit().unwrap();
        assert_eq!(g.draft(), "buy now!");
    }

    #[test]
    fn copy_while_flagged_is_a_noop_with_notice() {
        let g = ComplianceGate::new("text", Some(FallbackPolicy::ServerFailSafe.verdict()));
        assert_eq!(g.state(), GateState::Flagged);
        let mut clip = RecordingClipboard::default();
        let n = RecordingNotifier::new();
        assert_eq!(g.copy(&mut clip, &n), CopyOutcome::Blocked);
        assert!(clip.writes.is_empty());
        assert_eq!(n.messages(), vec![FLAGGED_COPY_NOTICE.to_string()]);
    }

    #[test]
    fn copy_when_viewing_writes_committed_text() {
        let g = ComplianceGate::new("clean", Some(ComplianceVerdict::compliant()));
        let mut clip = RecordingClipboard::default();
        let n = RecordingNotifier::new();
        assert_eq!(g.copy(&mut clip, &n), CopyOutcome::Copied);
        assert_eq!(clip.writes, vec!["clean".to_string()]);
    }

    #[test]
    fn illegal_transitions_are_rejected() {
        let mut g = ComplianceGate::new("x", None);
        assert!(g.save().is_err());
        assert!(g.apply_verdict(ComplianceVerdict::compliant()).is_err());
        g.begin_edit().unwrap();
        g.save().unwrap();
        assert_eq!(
            g.begin_edit(),
            Err(GateError::InvalidTransition {
                from: GateState::CheckingCompliance,
                action: "edit"
            })
        );
    }

    #[test]
    fn cancel_returns_to_prior_state() {
        let mut g = ComplianceGate::new("x", Some(ComplianceVerdict::flagged("r")));
        g.begin_edit().unwrap();
        g.update_draft("y").unwrap();
        g.cancel_edit().unwrap();
        assert_eq!(g.state(), GateState::Flagged);
        assert_eq!(g.draft(), "x");
    }
}
