//! Threshold table
//!
//! Rules are read once at startup from a plain text file with one rule per
//! line:
//!
//! ```text
//! # prefix   metric  limit
//! Machine    temp    80
//! Press-     rpm     3200.5
//! ```
//!
//! Order matters: the first rule whose metric equals the reading's metric and
//! whose prefix starts the reading's machine id wins.

use std::path::Path;

use tracing::{debug, trace, warn};

use crate::{MACHINE_ID_LEN, METRIC_LEN, util::truncate_to};

/// Upper bound on the number of rules a table holds.
pub const MAX_RULES: usize = 16;

#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdRule {
    pub machine_prefix: String,
    pub metric: String,
    pub limit: f64,
}

impl ThresholdRule {
    pub fn new(machine_prefix: &str, metric: &str, limit: f64) -> Self {
        Self {
            machine_prefix: truncate_to(machine_prefix, MACHINE_ID_LEN - 1).to_string(),
            metric: truncate_to(metric, METRIC_LEN - 1).to_string(),
            limit,
        }
    }

    pub fn matches(&self, machine_id: &str, metric: &str) -> bool {
        self.metric == metric && machine_id.starts_with(&self.machine_prefix)
    }

    /// Parses `<machine_prefix> <metric> <limit>`. Anything else is malformed.
    fn parse_line(line: &str) -> Option<ThresholdRule> {
        let mut fields = line.split_whitespace();
        let (Some(prefix), Some(metric), Some(limit), None) =
            (fields.next(), fields.next(), fields.next(), fields.next())
        else {
            return None;
        };

        let limit = limit.parse::<f64>().ok().filter(|limit| limit.is_finite())?;
        Some(ThresholdRule::new(prefix, metric, limit))
    }
}

impl Default for ThresholdRule {
    fn default() -> Self {
        ThresholdRule::new("Machine", "temp", 80.0)
    }
}

/// What happened while loading a table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Rules installed from the source.
    pub loaded: usize,

    /// Lines that were neither comments nor valid rules.
    pub skipped: usize,

    /// Valid rules that did not fit because the table was already full.
    pub dropped: usize,

    /// The default rule was installed instead of configured rules.
    pub defaulted: bool,
}

impl LoadReport {
    pub fn truncated(&self) -> bool {
        self.dropped > 0
    }
}

/// Ordered, read-only list of threshold rules.
#[derive(Debug, Clone, PartialEq)]
pub struct ThresholdTable {
    rules: Vec<ThresholdRule>,
}

impl ThresholdTable {
    /// Builds a table from `rules`, keeping at most [`MAX_RULES`] of them.
    pub fn from_rules(rules: impl IntoIterator<Item = ThresholdRule>) -> Self {
        Self {
            rules: rules.into_iter().take(MAX_RULES).collect(),
        }
    }

    /// A table holding only `Machine temp 80`.
    pub fn with_default_rule() -> Self {
        Self {
            rules: vec![ThresholdRule::default()],
        }
    }

    pub fn rules(&self) -> &[ThresholdRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Limit of the first rule matching `(machine_id, metric)`, or `None` if
    /// the pair is unbounded.
    pub fn limit_for(&self, machine_id: &str, metric: &str) -> Option<f64> {
        self.rules
            .iter()
            .find(|rule| rule.matches(machine_id, metric))
            .map(|rule| rule.limit)
    }

    /// Parses the textual rule format.
    ///
    /// Comment lines (`#`) and lines shorter than three bytes are ignored,
    /// malformed lines are skipped. Once [`MAX_RULES`] rules are loaded the
    /// remaining valid lines are counted as dropped. If no rule could be
    /// loaded the default rule is installed.
    pub fn parse(text: &str) -> (ThresholdTable, LoadReport) {
        let mut report = LoadReport::default();
        let mut rules = Vec::new();

        for line in text.lines() {
            if line.starts_with('#') || line.len() < 3 {
                continue;
            }

            let Some(rule) = ThresholdRule::parse_line(line) else {
                debug!("skipping malformed threshold line: {line:?}");
                report.skipped += 1;
                continue;
            };

            if rules.len() == MAX_RULES {
                report.dropped += 1;
                continue;
            }

            trace!("loaded threshold rule: {rule:?}");
            rules.push(rule);
        }

        report.loaded = rules.len();

        if report.truncated() {
            warn!(
                "threshold table is limited to {MAX_RULES} rules, dropped {} more",
                report.dropped
            );
        }

        if rules.is_empty() {
            warn!("no valid threshold rules found, using default: temp > 80");
            report.defaulted = true;
            return (ThresholdTable::with_default_rule(), report);
        }

        (ThresholdTable { rules }, report)
    }

    /// Reads and parses the rule file at `path`. A missing or unreadable
    /// file yields the default table.
    pub fn load(path: impl AsRef<Path>) -> (ThresholdTable, LoadReport) {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(text) => {
                let (table, report) = Self::parse(&text);
                debug!("loaded {} thresholds from {}", table.len(), path.display());
                (table, report)
            }
            Err(e) => {
                warn!(
                    "cannot read threshold file {} ({e}), using default: temp > 80",
                    path.display()
                );
                let report = LoadReport {
                    defaulted: true,
                    ..Default::default()
                };
                (ThresholdTable::with_default_rule(), report)
            }
        }
    }
}

impl Default for ThresholdTable {
    fn default() -> Self {
        Self::with_default_rule()
    }
}
