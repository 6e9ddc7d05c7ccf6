//! Terminal output.

use console::{style, StyledObject};
use indicatif::{ProgressBar, ProgressStyle};
use securi_certify::{CheckItem, CheckStatus, Tone, Transition, ViewModel, WorkflowState};
use std::time::Duration;

/// Spinner that follows workflow transitions on stderr
pub fn spinner(hidden: bool) -> ProgressBar {
    if hidden {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}

/// Listener that narrates transitions on `bar`
pub fn narrate(bar: ProgressBar) -> impl Fn(&Transition<'_>) + Send + Sync + 'static {
    move |transition: &Transition<'_>| {
        if let Some(message) = progress_message(transition.to) {
            bar.set_message(message);
        }
    }
}

fn progress_message(state: &WorkflowState) -> Option<String> {
    match state {
        WorkflowState::Hashing => Some("Computing digital fingerprint...".to_string()),
        WorkflowState::LookingUp { fingerprint } => Some(format!("Looking up {}...", fingerprint.short_hex(12))),
        WorkflowState::Certifying { .. } => Some("Waiting for your signature in the wallet...".to_string()),
        WorkflowState::Confirming { tx, .. } => Some(format!(
            "Waiting for block confirmation of {} (Ctrl-C stops waiting)...",
            tx.hash
        )),
        _ => None,
    }
}

/// Human-readable rendering of a view
pub fn print_view(view: &ViewModel) {
    println!();
    println!("{}", toned(view.tone, view.title).bold());
    if let Some(subtitle) = view.subtitle {
        println!("{}", style(subtitle).dim());
    }

    for item in &view.checklist {
        println!("  {}", check_line(item));
    }

    if let Some(record) = &view.record {
        println!();
        println!("  {:<12} {}", style("Author").dim(), record.author);
        println!("  {:<12} {}", style("Date").dim(), record.date);
        println!("  {:<12} {}", style("Time").dim(), record.time);
        println!("  {:<12} {}", style("Fingerprint").dim(), record.fingerprint);
        println!("  {:<12} {}", style("Save as").dim(), record.download_name);
    }

    if let Some(banner) = &view.banner {
        println!();
        println!("  {}", style(banner.message).red().bold());
        println!("  {}", style(&banner.detail).dim());
    }
}

fn check_line(item: &CheckItem) -> String {
    let mark = match item.status {
        CheckStatus::Done => style("✔").green(),
        CheckStatus::Active => style("…").cyan(),
        CheckStatus::Pending => style("·").dim(),
    };
    match &item.detail {
        Some(detail) => format!("{} {}  {}", mark, item.label, style(detail).dim()),
        None => format!("{} {}", mark, item.label),
    }
}

fn toned(tone: Tone, text: &str) -> StyledObject<&str> {
    match tone {
        Tone::Neutral => style(text),
        Tone::Progress => style(text).cyan(),
        Tone::Success => style(text).green(),
        Tone::Danger => style(text).red(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use securi_core::Fingerprint;

    #[test]
    fn test_progress_messages() {
        assert!(progress_message(&WorkflowState::Idle).is_none());
        assert!(progress_message(&WorkflowState::Hashing).is_some());

        let fingerprint = Fingerprint::from_bytes([0xab; 32]);
        let message = progress_message(&WorkflowState::LookingUp { fingerprint }).unwrap();
        assert!(message.contains("0xabababababab"));
    }

    #[test]
    fn test_check_line_has_label() {
        let item = CheckItem {
            label: "Wallet connected",
            status: CheckStatus::Done,
            detail: None,
        };
        assert!(console::strip_ansi_codes(&check_line(&item)).contains("Wallet connected"));
    }
}
