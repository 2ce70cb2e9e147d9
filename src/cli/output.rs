//! Output formatting for CLI commands.
//!
//! Every formatter renders either colored text with tables or pretty JSON.

use colored::Colorize;
use serde::Serialize;
use std::fmt::Write;
use tabled::{Table, Tabled};

use crate::config::ValidationResult;
use crate::planner::{ActionType, DeploymentPlan};
use crate::reconciler::{NodeInfo, ReconciliationResult};
use crate::state::{LockInfo, StateSnapshot};

use super::commands::OutputFormat;

/// Output formatter for CLI.
#[derive(Debug)]
pub struct OutputFormatter {
    /// Output format.
    format: OutputFormat,
}

/// Plan action row for table display.
#[derive(Tabled)]
struct PlanActionRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Action")]
    action: String,
    #[tabled(rename = "Path")]
    path: String,
    #[tabled(rename = "Type")]
    type_name: String,
    #[tabled(rename = "Reason")]
    reason: String,
}

/// Resource row for table display.
#[derive(Tabled)]
struct NodeRow {
    #[tabled(rename = "Path")]
    path: String,
    #[tabled(rename = "Type")]
    kind: String,
    #[tabled(rename = "Name")]
    title: String,
    #[tabled(rename = "ID")]
    id: String,
}

impl OutputFormatter {
    /// Creates a new output formatter.
    #[must_use]
    pub const fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Formats a deployment plan for display.
    #[must_use]
    pub fn format_plan(&self, plan: &DeploymentPlan, detailed: bool) -> String {
        match self.format {
            OutputFormat::Json => to_json(plan),
            OutputFormat::Text => Self::format_plan_text(plan, detailed),
        }
    }

    fn format_plan_text(plan: &DeploymentPlan, detailed: bool) -> String {
        if plan.is_empty() && !detailed {
            return format!("{} No changes required - resources are up to date.\n", "✓".green());
        }

        let mut output = String::from("\nDeployment Plan\n\n");

        let rows: Vec<PlanActionRow> = plan
            .actions
            .iter()
            .filter(|a| detailed || a.action_type != ActionType::Noop)
            .enumerate()
            .map(|(i, a)| PlanActionRow {
                index: i + 1,
                action: Self::format_action_type(a.action_type),
                path: a.path.clone(),
                type_name: a.type_name.clone(),
                reason: truncate(&a.reason, 40),
            })
            .collect();

        if !rows.is_empty() {
            output.push_str(&Table::new(rows).to_string());
            output.push('\n');
        }

        let _ = writeln!(
            output,
            "\nPlan: {} to create, {} to update, {} to replace, {} to remove",
            plan.count(ActionType::Create).to_string().green(),
            plan.count(ActionType::Update).to_string().yellow(),
            plan.count(ActionType::Replace).to_string().yellow(),
            plan.count(ActionType::Remove).to_string().red()
        );

        output
    }

    /// Formats a validation result.
    #[must_use]
    pub fn format_validation(&self, result: &ValidationResult, show_warnings: bool) -> String {
        match self.format {
            OutputFormat::Json => to_json(&serde_json::json!({
                "valid": result.is_valid(),
                "errors": result.errors.iter().map(ToString::to_string).collect::<Vec<_>>(),
                "warnings": result.warnings,
            })),
            OutputFormat::Text => {
                let mut output = if result.is_valid() {
                    format!("{} Configuration is valid\n", "✓".green())
                } else {
                    let mut output = format!("{} Configuration is invalid:\n", "✗".red());
                    for error in &result.errors {
                        let _ = writeln!(output, "   - {error}");
                    }
                    output
                };

                if show_warnings && !result.warnings.is_empty() {
                    let _ = write!(output, "\n{} Warnings:\n", "⚠".yellow());
                    for warning in &result.warnings {
                        let _ = writeln!(output, "   - {warning}");
                    }
                }
                output
            }
        }
    }

    /// Formats a reconciliation result.
    #[must_use]
    pub fn format_reconciliation(&self, result: &ReconciliationResult) -> String {
        match self.format {
            OutputFormat::Json => to_json(result),
            OutputFormat::Text => format!("{} {result}", "✓".green()),
        }
    }

    /// Formats deployed resource summaries.
    #[must_use]
    pub fn format_info(&self, nodes: &[NodeInfo]) -> String {
        match self.format {
            OutputFormat::Json => to_json(nodes),
            OutputFormat::Text => {
                if nodes.is_empty() {
                    return String::from("No resources deployed.\n");
                }

                let rows: Vec<NodeRow> = nodes
                    .iter()
                    .map(|n| NodeRow {
                        path: n.path.clone(),
                        kind: n.kind.clone(),
                        title: truncate(&n.title, 30),
                        id: truncate(n.instance_id.as_str(), 12),
                    })
                    .collect();

                let mut output = Table::new(rows).to_string();
                output.push('\n');
                output
            }
        }
    }

    /// Formats the state snapshot.
    #[must_use]
    pub fn format_state(&self, state: &StateSnapshot) -> String {
        match self.format {
            OutputFormat::Json => to_json(state),
            OutputFormat::Text => {
                let mut output = String::new();

                let _ = write!(output, "\nState: {}/{}\n\n", state.project, state.environment);
                let _ = writeln!(output, "   Version: {}", state.version);
                let _ = writeln!(output, "   Config hash: {}", truncate(&state.config_hash, 8));
                let _ = writeln!(output, "   Last updated: {}", state.last_updated);
                let _ = writeln!(output, "   Resources: {}", state.node_count());

                if !state.history.is_empty() {
                    let _ = writeln!(output, "\n   Recent history ({}):", state.history.len());
                    for entry in state.history.iter().rev().take(5) {
                        let status = if entry.success { "✓".green() } else { "✗".red() };
                        let _ = write!(
                            output,
                            "     {status} {} - {}",
                            entry.timestamp.format("%Y-%m-%d %H:%M"),
                            entry.operation
                        );
                        match &entry.error {
                            Some(error) => {
                                let _ = writeln!(output, ": {error}");
                            }
                            None => {
                                let _ = writeln!(output, " ({} changed)", entry.resources.len());
                            }
                        }
                    }
                }

                output
            }
        }
    }

    /// Formats a lock.
    #[must_use]
    pub fn format_lock(&self, lock: &LockInfo) -> String {
        match self.format {
            OutputFormat::Json => to_json(lock),
            OutputFormat::Text => format!(
                "State locked by {} ({}), expires in {}s\n",
                lock.holder,
                lock.lock_id,
                lock.remaining_secs()
            ),
        }
    }

    fn format_action_type(action_type: ActionType) -> String {
        match action_type {
            ActionType::Create => "+create".green().to_string(),
            ActionType::Update => "~update".yellow().to_string(),
            ActionType::Replace => "±replace".yellow().to_string(),
            ActionType::Remove => "-remove".red().to_string(),
            ActionType::Noop => "noop".dimmed().to_string(),
        }
    }
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_default()
}

/// Truncates a string to at most `max_len` characters.
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("orders", 10), "orders");
        assert_eq!(truncate("abcdefghijkl", 8), "abcde...");
        assert_eq!(truncate("", 8), "");
    }

    #[test]
    fn test_state_json_round_trips() {
        let formatter = OutputFormatter::new(OutputFormat::Json);
        let state = StateSnapshot::new("shop", "dev");

        let rendered = formatter.format_state(&state);
        let parsed: StateSnapshot = serde_json::from_str(&rendered).unwrap();
        assert_eq!(parsed.project, "shop");
    }

    #[test]
    fn test_text_validation_lists_errors() {
        let mut result = ValidationResult::default();
        result.errors.push(crate::config::ValidationError {
            field: String::from("project.name"),
            message: String::from("Project name cannot be empty"),
        });

        let rendered = OutputFormatter::new(OutputFormat::Text).format_validation(&result, false);
        assert!(rendered.contains("invalid"));
        assert!(rendered.contains("project.name: Project name cannot be empty"));
    }
}
