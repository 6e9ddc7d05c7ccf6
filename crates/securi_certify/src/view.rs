//! State-to-view mapping.
//!
//! One table maps every workflow state and session mode to what a
//! presentation layer shows: title, tone, checklist, record panel, error
//! banner and available actions. Presentation layers only render the model.

use crate::state::{StateTag, WorkflowState};
use securi_core::{CertificationRecord, CoreError, ErrorKind, Fingerprint, SessionMode};
use serde::Serialize;

/// Overall tone of a screen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tone {
    /// Waiting for input
    Neutral,
    /// Work in progress
    Progress,
    /// Record shown
    Success,
    /// No record, or failure
    Danger,
}

/// Status of one checklist line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    /// Not started
    Pending,
    /// In progress
    Active,
    /// Completed
    Done,
}

/// One checklist line
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckItem {
    /// Label
    pub label: &'static str,
    /// Status
    pub status: CheckStatus,
    /// Secondary text
    pub detail: Option<String>,
}

/// Details of a certification record
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordPanel {
    /// Author address in checksum form
    pub author: String,
    /// Abbreviated author address
    pub author_short: String,
    /// Certification date, e.g. `Tuesday, November 14, 2023`
    pub date: String,
    /// Certification time, e.g. `22:13 UTC`
    pub time: String,
    /// Full fingerprint
    pub fingerprint: String,
    /// Abbreviated fingerprint
    pub fingerprint_short: String,
    /// Suggested file name for saving the certified image
    pub download_name: String,
}

/// Error banner
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Banner {
    /// Classified cause
    pub kind: ErrorKind,
    /// Headline
    pub message: &'static str,
    /// Underlying error
    pub detail: String,
}

/// User action offered by a screen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Pick a file
    SelectFile,
    /// Save the certified image
    Download,
    /// Stop waiting for the ledger
    Abandon,
    /// Run the same file again
    Retry,
    /// Back to the dashboard
    StartOver,
    /// Destroy the session
    LogOut,
}

impl Action {
    /// Button label
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::SelectFile => "Select image",
            Self::Download => "Save image",
            Self::Abandon => "Stop waiting",
            Self::Retry => "Try again",
            Self::StartOver => "Start over",
            Self::LogOut => "Log out",
        }
    }
}

/// Everything a presentation layer needs to draw one state
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ViewModel {
    /// State being shown
    pub state: StateTag,
    /// Session mode
    pub mode: SessionMode,
    /// Heading
    pub title: &'static str,
    /// Text under the heading
    pub subtitle: Option<&'static str>,
    /// Tone
    pub tone: Tone,
    /// Progress checklist
    pub checklist: Vec<CheckItem>,
    /// Record details for `Exists` and `Certified`
    pub record: Option<RecordPanel>,
    /// Error banner; never shown for a rejected signing request
    pub banner: Option<Banner>,
    /// Available actions
    pub actions: Vec<Action>,
}

/// Map `state` under `mode` to its view
#[must_use]
pub fn render(state: &WorkflowState, mode: SessionMode) -> ViewModel {
    let authenticated = mode == SessionMode::Authenticated;
    let mut view = ViewModel {
        state: state.tag(),
        mode,
        title: "",
        subtitle: None,
        tone: Tone::Neutral,
        checklist: Vec::new(),
        record: None,
        banner: None,
        actions: Vec::new(),
    };

    match state {
        WorkflowState::Idle => {
            view.title = if authenticated { "Certify a new image" } else { "Verify an image" };
            view.subtitle = (!authenticated).then_some("Verifying does not require a wallet");
            view.actions = vec![Action::SelectFile, Action::LogOut];
        }
        WorkflowState::Hashing
        | WorkflowState::LookingUp { .. }
        | WorkflowState::Certifying { .. }
        | WorkflowState::Confirming { .. } => {
            view.title = if authenticated { "Certifying..." } else { "Verifying..." };
            view.tone = Tone::Progress;
            view.checklist = progress_checklist(state, authenticated);
            if matches!(state, WorkflowState::LookingUp { .. } | WorkflowState::Confirming { .. }) {
                view.actions = vec![Action::Abandon];
            }
        }
        WorkflowState::Exists { record } => {
            view.title = "Image certified";
            view.subtitle = Some("This file has an immutable record on the ledger.");
            view.tone = Tone::Success;
            view.checklist = vec![done("Fingerprint matches (integrity)", None)];
            view.record = Some(record_panel(record, "certified_valid"));
            view.actions = vec![Action::Download, Action::SelectFile, Action::LogOut];
        }
        WorkflowState::Certified { record } => {
            view.title = "Certification successful";
            view.tone = Tone::Success;
            view.checklist = vec![done("Immutable fingerprint recorded", None)];
            view.record = Some(record_panel(record, "certified"));
            view.actions = vec![Action::Download, Action::StartOver, Action::LogOut];
        }
        WorkflowState::NotFound { fingerprint } => {
            view.title = "Image not certified";
            view.subtitle = Some("No ledger record matches this file.");
            view.tone = Tone::Danger;
            view.checklist = vec![done("Digital fingerprint", Some(short(fingerprint)))];
            view.actions = vec![Action::StartOver, Action::LogOut];
        }
        WorkflowState::Failed { error, .. } if error.kind() == ErrorKind::UserCancelled => {
            view.title = "Signing cancelled";
            view.actions = vec![Action::StartOver, Action::LogOut];
        }
        WorkflowState::Failed { error, .. } => {
            view.title = if authenticated { "Certification failed" } else { "Verification failed" };
            view.tone = Tone::Danger;
            view.banner = Some(banner(error));
            if error.kind().is_retryable() {
                view.actions.push(Action::Retry);
            }
            view.actions.extend([Action::StartOver, Action::LogOut]);
        }
    }
    view
}

fn progress_checklist(state: &WorkflowState, authenticated: bool) -> Vec<CheckItem> {
    let fingerprint = match state.fingerprint() {
        Some(fp) => done("Digital fingerprint", Some(short(fp))),
        None => CheckItem {
            label: "Digital fingerprint",
            status: CheckStatus::Active,
            detail: Some("Computing...".to_string()),
        },
    };

    let (status, detail) = match state {
        WorkflowState::Certifying { .. } => (CheckStatus::Active, "Awaiting signature..."),
        WorkflowState::Confirming { .. } => (CheckStatus::Active, "Waiting for block..."),
        _ => (CheckStatus::Pending, "Waiting for block..."),
    };
    let ledger = CheckItem {
        label: "Ledger confirmation",
        status,
        detail: Some(detail.to_string()),
    };

    let mut checklist = vec![fingerprint];
    if authenticated {
        checklist.push(done("Wallet connected", None));
    }
    checklist.push(ledger);
    checklist
}

fn done(label: &'static str, detail: Option<String>) -> CheckItem {
    CheckItem {
        label,
        status: CheckStatus::Done,
        detail,
    }
}

fn short(fingerprint: &Fingerprint) -> String {
    format!("{}...", fingerprint.short_hex(13))
}

fn record_panel(record: &CertificationRecord, download_prefix: &str) -> RecordPanel {
    let (date, time) = record.certified_at().map_or_else(
        || ("unknown date".to_string(), "unknown time".to_string()),
        |at| (at.format("%A, %B %-d, %Y").to_string(), at.format("%H:%M UTC").to_string()),
    );
    RecordPanel {
        author: record.author.to_checksum(),
        author_short: record.author.short(),
        date,
        time,
        fingerprint: record.fingerprint.to_hex(),
        fingerprint_short: short(&record.fingerprint),
        download_name: format!("{}_{}.png", download_prefix, record.fingerprint.short_hex(4)),
    }
}

fn banner(error: &CoreError) -> Banner {
    let message = match error.kind() {
        ErrorKind::Validation => "The request was not valid.",
        ErrorKind::TransientNetwork => "Could not reach the ledger. The image may or may not be certified; try again.",
        ErrorKind::InsufficientResource => "The network rejected the fee. Check your balance and try again.",
        ErrorKind::AlreadyCertified => "This image was certified by someone else first.",
        ErrorKind::UserCancelled | ErrorKind::Unknown => "Something went wrong.",
    };
    Banner {
        kind: error.kind(),
        message,
        detail: error.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use securi_core::{Address, TxHash};
    use securi_ledger::TxHandle;

    fn fp() -> Fingerprint {
        Fingerprint::from_bytes([0xab; 32])
    }

    fn record() -> CertificationRecord {
        CertificationRecord::new(fp(), Address::from_bytes([0x11; 20]), 1_700_000_000)
    }

    #[test]
    fn test_idle_copy_by_mode() {
        let auth = render(&WorkflowState::Idle, SessionMode::Authenticated);
        let anon = render(&WorkflowState::Idle, SessionMode::Anonymous);
        assert_eq!(auth.title, "Certify a new image");
        assert_eq!(anon.title, "Verify an image");
        assert!(anon.subtitle.is_some());
        assert_eq!(auth.actions, vec![Action::SelectFile, Action::LogOut]);
    }

    #[test]
    fn test_progress_checklist() {
        let hashing = render(&WorkflowState::Hashing, SessionMode::Anonymous);
        assert_eq!(hashing.tone, Tone::Progress);
        assert_eq!(hashing.checklist.len(), 2);
        assert_eq!(hashing.checklist[0].status, CheckStatus::Active);

        let tx = TxHandle {
            hash: TxHash::from_bytes([1; 32]),
            fingerprint: fp(),
            from: Address::from_bytes([0x11; 20]),
        };
        let confirming = render(
            &WorkflowState::Confirming { fingerprint: fp(), tx },
            SessionMode::Authenticated,
        );
        assert_eq!(confirming.checklist.len(), 3);
        assert_eq!(confirming.checklist[0].status, CheckStatus::Done);
        assert_eq!(confirming.checklist[1].label, "Wallet connected");
        assert_eq!(confirming.checklist[2].status, CheckStatus::Active);
        assert_eq!(confirming.actions, vec![Action::Abandon]);
    }

    #[test]
    fn test_record_panel() {
        let view = render(&WorkflowState::Certified { record: record() }, SessionMode::Authenticated);
        let panel = view.record.unwrap();
        assert_eq!(panel.date, "Tuesday, November 14, 2023");
        assert_eq!(panel.time, "22:13 UTC");
        assert_eq!(panel.download_name, "certified_0xabab.png");
        assert_eq!(panel.author, Address::from_bytes([0x11; 20]).to_checksum());

        let view = render(&WorkflowState::Exists { record: record() }, SessionMode::Anonymous);
        assert_eq!(view.tone, Tone::Success);
        assert_eq!(view.record.unwrap().download_name, "certified_valid_0xabab.png");
    }

    #[test]
    fn test_user_cancelled_has_no_banner() {
        let state = WorkflowState::Failed {
            fingerprint: Some(fp()),
            error: CoreError::UserCancelled,
        };
        let view = render(&state, SessionMode::Authenticated);
        assert!(view.banner.is_none());
        assert_eq!(view.tone, Tone::Neutral);
        assert!(view.actions.contains(&Action::StartOver));
    }

    #[test]
    fn test_failure_banners() {
        let state = WorkflowState::Failed {
            fingerprint: Some(fp()),
            error: CoreError::network("lookup", "connection refused"),
        };
        let view = render(&state, SessionMode::Anonymous);
        let banner = view.banner.unwrap();
        assert_eq!(banner.kind, ErrorKind::TransientNetwork);
        assert!(banner.detail.contains("connection refused"));
        assert_eq!(view.actions[0], Action::Retry);

        let state = WorkflowState::Failed {
            fingerprint: None,
            error: CoreError::Unknown { message: "boom".into() },
        };
        let view = render(&state, SessionMode::Authenticated);
        assert_eq!(view.banner.unwrap().kind, ErrorKind::Unknown);
        assert!(!view.actions.contains(&Action::Retry));
    }

    #[test]
    fn test_not_found() {
        let view = render(&WorkflowState::NotFound { fingerprint: fp() }, SessionMode::Anonymous);
        assert_eq!(view.tone, Tone::Danger);
        assert_eq!(view.title, "Image not certified");
        assert!(view.record.is_none());
    }

    #[test]
    fn test_serializes() {
        let view = render(&WorkflowState::Exists { record: record() }, SessionMode::Anonymous);
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["state"], "exists");
        assert_eq!(json["tone"], "success");
        assert_eq!(json["mode"], "anonymous");
        assert_eq!(json["actions"][0], "download");
    }
}
