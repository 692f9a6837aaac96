//! Annotation export row format
//!
//! Exports are whitespace-delimited tables without a header. Columns are
//! positional, in one of two fixed orders:
//! - `Tier start_ms end_ms duration_ms label`
//! - `Tier participant start_ms end_ms duration_ms label`

use crate::error::BinarizeError;
use crate::types::Interval;
use serde::{Deserialize, Serialize};

/// Tokens read as a missing value
///
/// Any token that parses as a NaN float (`NAN`, `+nan`, ...) is missing too.
pub const MISSING_TOKENS: &[&str] = &[
    "#N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN", "<NA>", "N/A",
    "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

/// Positional column order of an export
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnLayout {
    /// Tier, start, end, duration, label
    Five,
    /// Tier, participant, start, end, duration, label
    Six,
    /// Pick `Five` or `Six` from the widest row of the file
    #[default]
    Auto,
}

impl ColumnLayout {
    /// Number of columns, `None` for `Auto`
    pub fn width(&self) -> Option<usize> {
        match self {
            ColumnLayout::Five => Some(5),
            ColumnLayout::Six => Some(6),
            ColumnLayout::Auto => None,
        }
    }

    /// Resolve `Auto` against the widest row of a file
    pub fn resolve(self, widest: usize, widest_line: usize) -> Result<ColumnLayout, BinarizeError> {
        match self {
            ColumnLayout::Auto => match widest {
                0..=5 => Ok(ColumnLayout::Five),
                6 => Ok(ColumnLayout::Six),
                n => Err(BinarizeError::MalformedRow {
                    line: widest_line,
                    reason: format!("{} fields, expected 5 or 6", n),
                }),
            },
            fixed => Ok(fixed),
        }
    }
}

/// One parsed export row. Fields beyond the row's width are `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationRecord {
    pub tier: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub participant: Option<String>,
    pub start_ms: Option<f64>,
    pub end_ms: Option<f64>,
    /// Carried positionally, never used downstream
    pub duration_ms: Option<f64>,
    pub label: Option<String>,
}

impl AnnotationRecord {
    /// Parse one non-blank line against a resolved layout
    ///
    /// `line` is the 1-based line number used in diagnostics.
    pub fn parse_line(text: &str, line: usize, layout: ColumnLayout) -> Result<Self, BinarizeError> {
        let width = layout.width().ok_or_else(|| BinarizeError::MalformedRow {
            line,
            reason: "column layout must be resolved before parsing".to_string(),
        })?;

        let fields: Vec<&str> = text.split_whitespace().collect();
        if fields.is_empty() {
            return Err(BinarizeError::MalformedRow {
                line,
                reason: "empty row".to_string(),
            });
        }
        if fields.len() > width {
            return Err(BinarizeError::MalformedRow {
                line,
                reason: format!("{} fields, layout has {}", fields.len(), width),
            });
        }

        // Offset of start_ms: the six-column layout carries a participant first
        let offset = width - 4;
        let field = |i: usize| fields.get(i).copied().filter(|f| !is_missing(f));

        let participant = if offset == 2 {
            field(1).map(str::to_string)
        } else {
            None
        };

        Ok(Self {
            tier: fields[0].to_string(),
            participant,
            start_ms: parse_ms(field(offset), line, "start_ms")?,
            end_ms: parse_ms(field(offset + 1), line, "end_ms")?,
            duration_ms: parse_ms(field(offset + 2), line, "duration_ms")?,
            label: field(offset + 3).map(str::to_string),
        })
    }

    /// Interval view of the row, `None` if start, end or label is missing
    pub fn to_interval(&self) -> Option<Interval> {
        let start_ms = self.start_ms?;
        let end_ms = self.end_ms?;
        let label = normalize_label(self.label.as_deref()?);
        Some(Interval {
            start_ms,
            end_ms,
            label,
        })
    }
}

/// Trim and upper-case a label before any comparison
pub fn normalize_label(label: &str) -> String {
    label.trim().to_uppercase()
}

fn is_missing(token: &str) -> bool {
    MISSING_TOKENS.contains(&token) || token.parse::<f64>().map_or(false, f64::is_nan)
}

fn parse_ms(token: Option<&str>, line: usize, column: &str) -> Result<Option<f64>, BinarizeError> {
    let Some(token) = token else {
        return Ok(None);
    };
    match token.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(Some(v)),
        _ => Err(BinarizeError::MalformedRow {
            line,
            reason: format!("{} is not a number: '{}'", column, token),
        }),
    }
}
