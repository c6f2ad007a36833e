//! Runs one compliance check with the configured providers and prints the verdict.
//! Text comes from the arguments, or stdin when none are given. Compliant text is
//! then exported to stdout through the same gate the editor uses.

use std::io::Read;

use social_studio::gate::{Clipboard, ComplianceGate};
use social_studio::notify::TracingNotifier;
use social_studio::AppState;

/// Export target for a terminal session.
struct StdoutClipboard;

impl Clipboard for StdoutClipboard {
    fn write_text(&mut self, text: &str) -> anyhow::Result<()> {
        println!("--- export ---\n{text}");
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt().with_target(false).init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let text = if args.is_empty() {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        args.join(" ")
    };
    if text.trim().is_empty() {
        anyhow::bail!("usage: compliance_probe <text> (or pipe text on stdin)");
    }

    let state = AppState::from_env()?;
    let outcome = state.compliance.check(&text).await;

    println!("{}", serde_json::to_string_pretty(&outcome.verdict)?);
    match (outcome.provider, outcome.policy_applied) {
        (Some(p), _) => println!("provider: {p}"),
        (None, Some(policy)) => println!("fallback policy: {policy:?}"),
        (None, None) => println!("decided by banned-phrase screen"),
    }

    let gate = ComplianceGate::new(text.trim(), Some(outcome.verdict));
    let copied = gate.copy(&mut StdoutClipboard, &TracingNotifier);
    tracing::debug!(?copied, "export attempted");
    Ok(())
}
