//! # Status Subcommand
//!
//! `dossier status` shows the caller's dossier as the service reports it.

use anyhow::Result;
use clap::Args;
use dossier_client::{CaseSummary, ClientConfig, ClientError, DossierApi, DossierClient};

use crate::EXIT_SESSION_EXPIRED;

/// Arguments for the `dossier status` subcommand.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Print JSON instead of text.
    #[arg(long)]
    pub json: bool,
}

/// Execute the status subcommand.
pub fn run_status(args: &StatusArgs) -> Result<u8> {
    let client = DossierClient::new(ClientConfig::from_env()?)?;
    let summary = match crate::runtime()?.block_on(client.case_status()) {
        Ok(summary) => summary,
        Err(ClientError::SessionExpired { message, .. }) => {
            eprintln!("session expired: {message}");
            return Ok(EXIT_SESSION_EXPIRED);
        }
        Err(e) => return Err(e.into()),
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print!("{}", render_summary(&summary));
    }
    Ok(0)
}

fn render_summary(summary: &CaseSummary) -> String {
    let mut out = match (summary.case_id, &summary.reference, summary.status) {
        (Some(case_id), Some(reference), Some(status)) if summary.has_dossier => format!(
            "Dossier: {case_id}\n  Reference: {reference}\n  Status: {status}\n  {}\n",
            summary.message
        ),
        _ => format!("No dossier yet\n  {}\n", summary.message),
    };
    if !summary.next_steps.is_empty() {
        out.push_str("  Next steps:\n");
        for step in &summary.next_steps {
            out.push_str(&format!("    - {step}\n"));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use dossier_core::CaseId;
    use dossier_state::CaseStatus;

    fn summary(next_steps: Vec<String>) -> CaseSummary {
        CaseSummary {
            has_dossier: true,
            case_id: Some(CaseId::new()),
            reference: Some("DOS-2026-000042".into()),
            status: Some(CaseStatus::Draft),
            message: "Your dossier is a draft.".into(),
            next_steps,
        }
    }

    #[test]
    fn summary_lists_next_steps() {
        let text = render_summary(&summary(vec!["Upload the sanitary certificate".into()]));
        assert!(text.contains("Reference: DOS-2026-000042"));
        assert!(text.contains("Status: DRAFT"));
        assert!(text.contains("    - Upload the sanitary certificate"));
    }

    #[test]
    fn first_time_exporter_is_told_to_start() {
        let text = render_summary(&CaseSummary::no_dossier());
        assert!(text.starts_with("No dossier yet"));
        assert!(!text.contains("Reference:"));
        assert!(text.contains("Next steps:"));
    }

    #[test]
    fn summary_without_next_steps_has_no_heading() {
        let text = render_summary(&summary(Vec::new()));
        assert!(!text.contains("Next steps"));
    }
}
