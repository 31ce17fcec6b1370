//! Terminal output: live status lines and the final work report.

use std::process::ExitCode;

use recsync_core::domain::{PassOutcome, SyncEvent, TransferStatus};
use recsync_core::host::{WorkReport, WorkState};
use recsync_core::ports::StatusSink;

/// Prints user-facing status text as the pass progresses.
pub struct ConsoleStatusSink;

impl StatusSink for ConsoleStatusSink {
    fn emit(&self, event: &SyncEvent) {
        // Uploaded は Completed の件数でわかるので出さない
        if !matches!(event, SyncEvent::Uploaded { .. }) {
            eprintln!("{}", event.status_text());
        }
    }
}

pub fn print_report(report: &WorkReport, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    println!(
        "{}: {:?} after {} attempt(s)",
        report.name, report.state, report.attempts
    );
    if let Some(pass) = &report.last_report {
        for transfer in &pass.transfers {
            let mark = match transfer.status {
                TransferStatus::Succeeded => "ok",
                status if status.is_failure() => "FAILED",
                _ => "skipped",
            };
            match &transfer.error {
                Some(error) => println!("  {mark:7} {} ({error})", transfer.display_name),
                None => println!("  {mark:7} {}", transfer.display_name),
            }
        }
    }
    if let Some(last) = report.history.last()
        && let Some(error) = &last.error
    {
        println!("last error: {error}");
    }
    Ok(())
}

/// 0: everything uploaded, 1: needs the user (or cancelled), 2: transient failures left.
pub fn exit_code(report: &WorkReport) -> ExitCode {
    ExitCode::from(exit_status(report))
}

fn exit_status(report: &WorkReport) -> u8 {
    match (report.state, report.outcome) {
        (WorkState::Succeeded, _) => 0,
        (WorkState::Cancelled, _) | (_, Some(PassOutcome::HardFailureNoRetry)) => 1,
        _ => 2,
    }
}
