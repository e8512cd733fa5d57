//! Run summary output.

use anyhow::{Context, Result};

use teamsync_sync::{ChangeAction, MembershipChange, MutationOutcome, RunSummary, TeamOutcome};

pub fn print(summary: &RunSummary, json: bool) -> Result<()> {
    if json {
        let rendered =
            serde_json::to_string_pretty(summary).context("failed to serialize run summary")?;
        println!("{rendered}");
    } else {
        for line in render(summary) {
            println!("{line}");
        }
    }
    Ok(())
}

/// One line per team with changes or problems, each change indented below
/// it, then a totals line.
fn render(summary: &RunSummary) -> Vec<String> {
    let prefix = if summary.dry_run { "[dry-run] " } else { "" };
    let mut lines = Vec::new();

    for team in &summary.teams {
        let label = format!("{}/{}", team.organization, team.team);
        match &team.outcome {
            TeamOutcome::Synced {
                added: 0,
                removed: 0,
                failed: 0,
            }
            | TeamOutcome::Excluded => continue,
            TeamOutcome::Synced {
                added,
                removed,
                failed,
            } => {
                let mut line = format!("{prefix}✓ {label}: {added} added, {removed} removed");
                if *failed > 0 {
                    line.push_str(&format!(", {failed} failed"));
                }
                lines.push(line);
                lines.extend(
                    summary
                        .changes
                        .iter()
                        .filter(|c| c.team_id == team.team_id && c.organization == team.organization)
                        .map(change_line),
                );
            }
            TeamOutcome::Skipped { reason } => {
                lines.push(format!("{prefix}✗ {label}: skipped ({reason})"));
            }
        }
    }

    lines.push(format!(
        "{prefix}{} organizations, {} teams synced, {} skipped, {} excluded; {} added, {} removed in {}ms",
        summary.organizations,
        summary.synced(),
        summary.skipped(),
        summary.excluded(),
        summary.changes_for(ChangeAction::Add).count(),
        summary.changes_for(ChangeAction::Remove).count(),
        summary.duration.as_millis(),
    ));
    lines
}

fn change_line(change: &MembershipChange) -> String {
    let sign = match change.action {
        ChangeAction::Add => '+',
        ChangeAction::Remove => '-',
    };
    let note = match change.outcome {
        MutationOutcome::AlreadySatisfied => " (already settled)",
        _ => "",
    };
    format!("  {sign} {}{note}", change.login)
}
