//! Output formatters for run outcomes
//!
//! Provides table, summary, JSON, and CSV output formats.

use anyhow::Result;
use serde::Serialize;
use std::io::Write;
use std::path::Path;

use crate::benchmark::JobExit;
use crate::models::{NodeReport, NodeStatus, RunOutcome};

/// Output format options
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
    JsonPretty,
    Csv,
    Summary,
}

impl OutputFormat {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "table" => Some(OutputFormat::Table),
            "json" => Some(OutputFormat::Json),
            "json-pretty" | "jsonpretty" => Some(OutputFormat::JsonPretty),
            "csv" => Some(OutputFormat::Csv),
            "summary" => Some(OutputFormat::Summary),
            _ => None,
        }
    }
}

/// Result formatter
pub struct ResultFormatter {
    format: OutputFormat,
    colorize: bool,
}

impl ResultFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            colorize: true,
        }
    }

    pub fn no_color(mut self) -> Self {
        self.colorize = false;
        self
    }

    /// Format a verification run
    pub fn format_outcome(&self, outcome: &RunOutcome) -> String {
        match self.format {
            OutputFormat::Table => self.format_outcome_table(outcome),
            OutputFormat::Json => serde_json::to_string(outcome).unwrap_or_default(),
            OutputFormat::JsonPretty => serde_json::to_string_pretty(outcome).unwrap_or_default(),
            OutputFormat::Csv => outcome_csv(outcome).unwrap_or_default(),
            OutputFormat::Summary => self.format_outcome_brief(outcome),
        }
    }

    fn status(&self, status: NodeStatus) -> String {
        let text = format!("{} {}", status.symbol(), status);
        match (self.colorize, status) {
            (false, _) => text,
            (true, NodeStatus::Succeeded) => format!("\x1b[32m{text}\x1b[0m"),
            (true, NodeStatus::Failed) => format!("\x1b[31m{text}\x1b[0m"),
        }
    }

    fn format_report_row(&self, report: &NodeReport) -> String {
        let mut row = format!(
            "  {:16} {} [{:>7}ms]",
            report.node.name(),
            self.status(report.status),
            report.duration_ms
        );
        for failure in &report.failures {
            row.push_str(&format!("\n      - {failure}"));
        }
        row
    }

    fn format_outcome_table(&self, outcome: &RunOutcome) -> String {
        let mut output = String::new();

        output.push_str("\n═══════════════════════════════════════════════════════════════\n");
        output.push_str(&format!(
            " Verification run started {}\n",
            outcome.started_at.format("%Y-%m-%d %H:%M:%S UTC")
        ));
        output.push_str("═══════════════════════════════════════════════════════════════\n");

        for report in outcome.reports.values() {
            output.push_str(&self.format_report_row(report));
            output.push('\n');
        }

        output.push_str("───────────────────────────────────────────────────────────────\n");
        output.push_str(&format!(
            " Nodes: {} | Pass: {} | Fail: {} | Duration: {}ms\n",
            outcome.total(),
            outcome.passed(),
            outcome.total() - outcome.passed(),
            outcome.duration_ms()
        ));

        output
    }

    fn format_outcome_brief(&self, outcome: &RunOutcome) -> String {
        format!(
            "{} {}/{} node(s) passed in {}ms",
            if outcome.is_success() { "✓" } else { "✗" },
            outcome.passed(),
            outcome.total(),
            outcome.duration_ms()
        )
    }

    /// Format joined benchmark jobs
    pub fn format_jobs(&self, exits: &[JobExit]) -> String {
        #[derive(Serialize)]
        struct JobJson<'a> {
            node: &'a str,
            exit_code: Option<i32>,
            error: Option<String>,
        }

        let rows: Vec<JobJson> = exits
            .iter()
            .map(|exit| JobJson {
                node: exit.node.name(),
                exit_code: exit.exit_code(),
                error: exit.result.as_ref().err().map(|e| e.to_string()),
            })
            .collect();

        match self.format {
            OutputFormat::Json => serde_json::to_string(&rows).unwrap_or_default(),
            OutputFormat::JsonPretty => serde_json::to_string_pretty(&rows).unwrap_or_default(),
            OutputFormat::Csv => {
                to_csv(&["node", "exit_code", "error"], rows.iter().map(|r| {
                    vec![
                        r.node.to_string(),
                        r.exit_code.map(|c| c.to_string()).unwrap_or_default(),
                        r.error.clone().unwrap_or_default(),
                    ]
                }))
                .unwrap_or_default()
            }
            OutputFormat::Table | OutputFormat::Summary => {
                let mut output = String::from("\nBenchmark jobs:\n");
                for row in &rows {
                    let status = match (row.exit_code, &row.error) {
                        (Some(code), _) => format!("exit {code}"),
                        (None, Some(error)) => format!("not joined: {error}"),
                        (None, None) => "unknown".to_string(),
                    };
                    output.push_str(&format!("  {:16} {}\n", row.node, status));
                }
                output
            }
        }
    }
}

impl Default for ResultFormatter {
    fn default() -> Self {
        Self::new(OutputFormat::Table)
    }
}

/// One row per recorded failure, one row for each passing node
fn outcome_csv(outcome: &RunOutcome) -> Result<String> {
    let mut rows = Vec::new();
    for report in outcome.reports.values() {
        let base = [
            report.node.name().to_string(),
            report.status.to_string(),
            report.duration_ms.to_string(),
        ];
        if report.failures.is_empty() {
            rows.push([base.to_vec(), vec![String::new(); 3]].concat());
        }
        for failure in &report.failures {
            rows.push(
                [
                    base.to_vec(),
                    vec![
                        failure.command.clone().unwrap_or_default(),
                        failure.kind.to_string(),
                        failure.diagnostic.clone(),
                    ],
                ]
                .concat(),
            );
        }
    }

    to_csv(
        &["node", "status", "duration_ms", "command", "kind", "diagnostic"],
        rows,
    )
}

fn to_csv<I>(header: &[&str], rows: I) -> Result<String>
where
    I: IntoIterator<Item = Vec<String>>,
{
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(header)?;
    for row in rows {
        writer.write_record(&row)?;
    }
    let bytes = writer.into_inner().map_err(|e| anyhow::anyhow!("{}", e))?;
    Ok(String::from_utf8(bytes)?)
}

/// Write a run outcome to a file
pub fn write_outcome_to_file(
    path: impl AsRef<Path>,
    outcome: &RunOutcome,
    format: OutputFormat,
) -> Result<()> {
    let formatter = ResultFormatter::new(format).no_color();
    let content = formatter.format_outcome(outcome);

    let mut file = std::fs::File::create(path)?;
    file.write_all(content.as_bytes())?;

    Ok(())
}
