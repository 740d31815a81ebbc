//! Output formatting for the CLI.

use crate::config::OutputFormat;
use crate::error::Result;
use colored::*;
use stratum_contracts::document;
use stratum_domain::{Constraint, Contract, Fit, Status, Tier};
use stratum_query::{Answer, Citation};
use stratum_store::{ImportReport, Snapshot};
use tabled::{
    builder::Builder,
    settings::{object::Rows, Alignment, Modify, Style},
};

const STATEMENT_WIDTH: usize = 60;

/// Output formatter.
pub struct Formatter {
    format: OutputFormat,
    color_enabled: bool,
}

impl Formatter {
    /// Create a new formatter.
    pub fn new(format: OutputFormat, color_enabled: bool) -> Self {
        Self {
            format,
            color_enabled,
        }
    }

    /// Selected output format.
    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Format a list of constraint versions.
    pub fn format_constraints(&self, constraints: &[&Constraint]) -> Result<String> {
        match self.format {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(constraints)?),
            OutputFormat::Quiet => Ok(constraints
                .iter()
                .map(|c| c.id.to_string())
                .collect::<Vec<_>>()
                .join("\n")),
            OutputFormat::Table => Ok(self.constraints_table(constraints)),
        }
    }

    fn constraints_table(&self, constraints: &[&Constraint]) -> String {
        if constraints.is_empty() {
            return self.colorize("No constraints found.", "yellow");
        }

        let mut builder = Builder::default();
        builder.push_record(["ID", "Tier", "Scope", "Status", "Statement", "Source"]);

        for record in constraints {
            builder.push_record([
                record.id.to_string(),
                self.tier_label(record.tier),
                record.scope.to_string(),
                record.status.to_string(),
                truncate(&record.statement, STATEMENT_WIDTH),
                record.provenance.to_string(),
            ]);
        }

        let mut table = builder.build();
        table
            .with(Style::rounded())
            .with(Modify::new(Rows::first()).with(Alignment::center()));
        table.to_string()
    }

    /// Format one constraint version with its relations.
    pub fn format_constraint(&self, snapshot: &Snapshot, record: &Constraint) -> Result<String> {
        if self.format != OutputFormat::Table {
            return self.format_constraints(&[record]);
        }

        let mut lines = vec![
            format!("{} {}", self.colorize(record.id.as_str(), "cyan"), record.statement),
            format!("  tier:       {}", self.tier_label(record.tier)),
            format!("  scope:      {}", record.scope),
            format!("  status:     {}", record.status),
            format!("  family:     {} (version {})", record.family, record.version),
            format!("  source:     {}", record.provenance),
            format!("  review:     {}", review_label(record)),
        ];
        if let Some(previous) = snapshot.supersedes(&record.id) {
            lines.push(format!("  supersedes: {}", previous));
        }
        if let Some(next) = snapshot.superseded_by(&record.id) {
            lines.push(format!("  superseded by: {}", next));
        }
        if let Some(key) = &record.claim_key {
            lines.push(format!("  claim key:  {}", key));
        }
        if let Some(evidence) = &record.evidence {
            lines.push(format!("  evidence:   {}", evidence));
        }

        let fits = snapshot.supporters_of(&record.id);
        if !fits.is_empty() {
            let ids: Vec<String> = fits.iter().map(|f| f.id.to_string()).collect();
            lines.push(format!("  fits:       {}", ids.join(", ")));
        }
        let contracts = snapshot.referencing_contracts(&record.id);
        if !contracts.is_empty() {
            let keys: Vec<String> = contracts.iter().map(|k| k.to_string()).collect();
            lines.push(format!("  contracts:  {}", keys.join(", ")));
        }
        Ok(lines.join("\n"))
    }

    /// Format a fit and the constraints it supports.
    pub fn format_fit(&self, snapshot: &Snapshot, fit: &Fit) -> Result<String> {
        let supports = snapshot.fits.supported_by(&fit.id, &snapshot.graph);
        match self.format {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(&serde_json::json!({
                "fit": fit,
                "supports": supports,
            }))?),
            OutputFormat::Quiet => Ok(fit.id.to_string()),
            OutputFormat::Table => {
                let ids: Vec<String> = supports.iter().map(|id| id.to_string()).collect();
                let mut lines = vec![
                    format!("{} {}", self.colorize(fit.id.as_str(), "magenta"), fit.statement),
                    format!("  tier:     {} (non-binding)", fit.tier),
                    format!("  scope:    {}", fit.scope),
                    format!("  result:   {}", fit.result),
                    format!("  supports: {}", ids.join(", ")),
                ];
                if let Some(file) = &fit.file {
                    lines.push(format!("  file:     {}", file));
                }
                Ok(lines.join("\n"))
            }
        }
    }

    /// Format query hits.
    pub fn format_citations(&self, citations: &[Citation]) -> Result<String> {
        match self.format {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(citations)?),
            OutputFormat::Quiet => Ok(citations
                .iter()
                .map(|c| c.id.to_string())
                .collect::<Vec<_>>()
                .join("\n")),
            OutputFormat::Table => {
                if citations.is_empty() {
                    return Ok(self.colorize("No matching records.", "yellow"));
                }
                let mut builder = Builder::default();
                builder.push_record(["ID", "Tier", "Scope", "Status", "Score", "Statement"]);
                for citation in citations {
                    builder.push_record([
                        citation.id.to_string(),
                        self.tier_label(citation.tier),
                        citation.scope.to_string(),
                        match &citation.result {
                            Some(result) => format!("fit {}", result),
                            None => citation.status.to_string(),
                        },
                        format!("{:.2}", citation.score),
                        truncate(&citation.statement, STATEMENT_WIDTH),
                    ]);
                }
                let mut table = builder.build();
                table
                    .with(Style::rounded())
                    .with(Modify::new(Rows::first()).with(Alignment::center()));
                Ok(table.to_string())
            }
        }
    }

    /// Format an answer.
    pub fn format_answer(&self, answer: &Answer) -> Result<String> {
        match (self.format, answer) {
            (OutputFormat::Json, _) => Ok(serde_json::to_string_pretty(answer)?),
            (OutputFormat::Quiet, Answer::Grounded { citations, .. }) => Ok(citations
                .iter()
                .map(|c| c.id.to_string())
                .collect::<Vec<_>>()
                .join("\n")),
            (OutputFormat::Table, Answer::Grounded { text, .. }) => Ok(text.clone()),
            (_, Answer::InsufficientContext { missing, reason }) => {
                let mut message = format!("INSUFFICIENT CONTEXT: {}", reason);
                if !missing.is_empty() {
                    message.push_str(&format!(" (no record covers: {})", missing.join(", ")));
                }
                Ok(self.warning(&message))
            }
        }
    }

    /// Format an import report.
    pub fn format_report(&self, report: &ImportReport) -> Result<String> {
        match self.format {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(report)?),
            OutputFormat::Quiet => Ok(report
                .accepted
                .iter()
                .map(|id| id.to_string())
                .collect::<Vec<_>>()
                .join("\n")),
            OutputFormat::Table => {
                let mut lines = vec![self.success(&format!(
                    "Imported {}: {} constraint(s), {} fit(s)",
                    report.phase,
                    report.accepted.len(),
                    report.fits.len()
                ))];
                if !report.unverified.is_empty() {
                    let ids: Vec<String> = report.unverified.iter().map(|id| id.to_string()).collect();
                    lines.push(self.warning(&format!("UNVERIFIED: {}", ids.join(", "))));
                }
                Ok(lines.join("\n"))
            }
        }
    }

    /// Format a contract (YAML unless JSON was requested).
    pub fn format_contract(&self, contract: &Contract) -> Result<String> {
        match self.format {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(contract)?),
            OutputFormat::Quiet => Ok(contract.key().to_string()),
            OutputFormat::Table => Ok(document::to_yaml(contract)?),
        }
    }

    /// Format a success message.
    pub fn success(&self, message: &str) -> String {
        self.colorize(&format!("✓ {}", message), "green")
    }

    /// Format an error message.
    pub fn error(&self, message: &str) -> String {
        self.colorize(&format!("✗ {}", message), "red")
    }

    /// Format an info message.
    pub fn info(&self, message: &str) -> String {
        self.colorize(&format!("ℹ {}", message), "blue")
    }

    /// Format a warning message.
    pub fn warning(&self, message: &str) -> String {
        self.colorize(&format!("⚠ {}", message), "yellow")
    }

    fn tier_label(&self, tier: Tier) -> String {
        let color = match tier {
            Tier::Frozen => "green",
            Tier::Falsified => "red",
            Tier::Established => "cyan",
            Tier::Speculative | Tier::Exploratory => "yellow",
        };
        self.colorize(&tier.to_string(), color)
    }

    /// Colorize text if color is enabled.
    fn colorize(&self, text: &str, color: &str) -> String {
        if !self.color_enabled {
            return text.to_string();
        }

        match color {
            "red" => text.red().to_string(),
            "green" => text.green().to_string(),
            "blue" => text.blue().to_string(),
            "yellow" => text.yellow().to_string(),
            "cyan" => text.cyan().to_string(),
            "magenta" => text.magenta().to_string(),
            _ => text.to_string(),
        }
    }
}

fn review_label(record: &Constraint) -> String {
    use stratum_domain::ReviewState;

    match &record.review {
        ReviewState::Unchecked => "UNCHECKED".to_string(),
        ReviewState::Clear => "CLEAR".to_string(),
        ReviewState::Unverified(notes) => format!("UNVERIFIED ({} note(s))", notes.len()),
    }
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(width.saturating_sub(1)).collect();
    cut.push('…');
    cut
}

/// Whether a version should appear in default listings.
pub fn is_listed(record: &Constraint, all: bool) -> bool {
    all || record.status == Status::Active
}

#[cfg(test)]
mod tests {
    use super::*;
    use stratum_domain::{Candidate, ConstraintId, FamilyId, ReviewState, Scope};

    fn record() -> Constraint {
        let id = ConstraintId::parse("C121").unwrap();
        Constraint::from_candidate(
            Candidate::new(id.clone(), "Token inventory is closed", Tier::Frozen, Scope::B),
            id,
            FamilyId::new("C121"),
            0,
            ReviewState::Clear,
            1_700_000_000,
        )
    }

    #[test]
    fn test_json_format() {
        let formatter = Formatter::new(OutputFormat::Json, false);
        let record = record();
        let output = formatter.format_constraints(&[&record]).unwrap();
        assert!(output.contains("\"statement\""));
        assert!(output.contains("C121"));
    }

    #[test]
    fn test_quiet_format() {
        let formatter = Formatter::new(OutputFormat::Quiet, false);
        let record = record();
        assert_eq!(formatter.format_constraints(&[&record]).unwrap(), "C121");
    }

    #[test]
    fn test_table_format() {
        let formatter = Formatter::new(OutputFormat::Table, false);
        let record = record();
        let output = formatter.format_constraints(&[&record]).unwrap();
        assert!(output.contains("Statement"));
        assert!(output.contains("0 FROZEN"));
    }

    #[test]
    fn test_empty_constraints() {
        let formatter = Formatter::new(OutputFormat::Table, false);
        let output = formatter.format_constraints(&[]).unwrap();
        assert!(output.contains("No constraints found"));
    }

    #[test]
    fn test_insufficient_context() {
        let formatter = Formatter::new(OutputFormat::Table, false);
        let answer = Answer::InsufficientContext {
            missing: vec!["glyph".to_string()],
            reason: "no record matches".to_string(),
        };
        let output = formatter.format_answer(&answer).unwrap();
        assert!(output.starts_with("⚠ INSUFFICIENT CONTEXT"));
        assert!(output.contains("glyph"));
    }

    #[test]
    fn test_colorize_disabled() {
        let formatter = Formatter::new(OutputFormat::Table, false);
        assert_eq!(formatter.success("test"), "✓ test");
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdefghij", 5), "abcd…");
    }
}
