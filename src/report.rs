//! Replacement report and its renderings
//!
//! The report is a plain value. Table output is driven by a declarative column
//! list where each column says whether it only appears in the wide view.

use crate::error::{ConfigError, Result};
use comfy_table::{presets, Table};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A flexibility-set member priced below the threshold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub instance_type: String,
    pub price: f64,
}

/// Non-fatal observations made while selecting candidates
#[derive(Debug, Clone, PartialEq)]
pub enum Diagnostic {
    /// No quote for this flexibility-set member; it was skipped.
    PriceMissing { instance_type: String },
    /// Priced at or above the threshold.
    AboveThreshold {
        instance_type: String,
        price: f64,
        threshold: f64,
    },
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnostic::PriceMissing { instance_type } => {
                write!(f, "Not able to find pricing for {}, skipping", instance_type)
            }
            Diagnostic::AboveThreshold {
                instance_type,
                price,
                threshold,
            } => write!(
                f,
                "{} (${:.3}) was not below the pricing threshold of ${:.3}",
                instance_type, price, threshold
            ),
        }
    }
}

/// Result of one selection run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplacementReport {
    pub replacement: String,
    pub replacement_price: f64,
    pub threshold_price: f64,
    pub zone: String,
    pub flexibility_set_size: usize,
    /// Cheapest first
    pub candidates: Vec<Candidate>,
    #[serde(skip)]
    pub diagnostics: Vec<Diagnostic>,
}

/// Report output mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Short,
    Wide,
    Yaml,
    Json,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OutputFormat::Short => "short",
            OutputFormat::Wide => "wide",
            OutputFormat::Yaml => "yaml",
            OutputFormat::Json => "json",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for OutputFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "short" => Ok(OutputFormat::Short),
            "wide" => Ok(OutputFormat::Wide),
            "yaml" => Ok(OutputFormat::Yaml),
            "json" => Ok(OutputFormat::Json),
            other => Err(ConfigError::InvalidValue {
                field: "output".to_string(),
                reason: format!("expected one of short, wide, yaml, json; got '{}'", other),
            }),
        }
    }
}

struct Column {
    header: &'static str,
    wide_only: bool,
    value: fn(&ReplacementReport, &Candidate) -> String,
}

const COLUMNS: &[Column] = &[
    Column {
        header: "Instance Type",
        wide_only: false,
        value: instance_type_cell,
    },
    Column {
        header: "Price",
        wide_only: false,
        value: price_cell,
    },
    Column {
        header: "Zone",
        wide_only: true,
        value: zone_cell,
    },
    Column {
        header: "Savings",
        wide_only: true,
        value: savings_cell,
    },
    Column {
        header: "Savings %",
        wide_only: true,
        value: savings_percent_cell,
    },
];

fn instance_type_cell(_: &ReplacementReport, candidate: &Candidate) -> String {
    candidate.instance_type.clone()
}

fn price_cell(_: &ReplacementReport, candidate: &Candidate) -> String {
    format_price(candidate.price)
}

fn zone_cell(report: &ReplacementReport, _: &Candidate) -> String {
    report.zone.clone()
}

fn savings_cell(report: &ReplacementReport, candidate: &Candidate) -> String {
    format_price(report.replacement_price - candidate.price)
}

fn savings_percent_cell(report: &ReplacementReport, candidate: &Candidate) -> String {
    if report.replacement_price > 0.0 {
        format!(
            "{:.1}%",
            (1.0 - candidate.price / report.replacement_price) * 100.0
        )
    } else {
        "-".to_string()
    }
}

pub fn format_price(price: f64) -> String {
    format!("${:.3}", price)
}

/// Render the report in the requested format
pub fn render(report: &ReplacementReport, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Short => Ok(render_text(report, false)),
        OutputFormat::Wide => Ok(render_text(report, true)),
        OutputFormat::Yaml => Ok(serde_yaml::to_string(report)?),
        OutputFormat::Json => Ok(format!("{}\n", serde_json::to_string_pretty(report)?)),
    }
}

fn render_text(report: &ReplacementReport, wide: bool) -> String {
    let mut out = String::new();
    out.push_str(&format!("Replacement Instance Type: {}\n", report.replacement));
    out.push_str(&format!(
        "      Instance Type Price: {}\n",
        format_price(report.replacement_price)
    ));
    out.push_str(&format!(
        "          Threshold Price: {}\n",
        format_price(report.threshold_price)
    ));
    out.push_str(&format!(
        "          Flexibility Set: {}\n",
        report.flexibility_set_size
    ));
    out.push_str(&format!(
        "   Replacement Candidates: {}\n",
        report.candidates.len()
    ));

    if !report.candidates.is_empty() {
        out.push('\n');
        out.push_str(&candidate_table(report, wide).to_string());
        out.push('\n');
    }
    out
}

fn candidate_table(report: &ReplacementReport, wide: bool) -> Table {
    let columns: Vec<&Column> = COLUMNS.iter().filter(|c| wide || !c.wide_only).collect();

    let mut table = Table::new();
    table.load_preset(presets::NOTHING);
    table.set_header(columns.iter().map(|c| c.header).collect::<Vec<_>>());
    for candidate in &report.candidates {
        table.add_row(
            columns
                .iter()
                .map(|c| (c.value)(report, candidate))
                .collect::<Vec<_>>(),
        );
    }
    table
}
