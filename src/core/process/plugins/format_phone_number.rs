#![allow(clippy::result_large_err)]

//! `format_phone_number`: normalize ten digit phone numbers.
//!
//! ```yaml
//! field_phone:
//!   plugin: format_phone_number
//!   source: old_phone_number
//!   format: "($1) $2-$3"
//!   invalid_return_empty: true
//! ```

use crate::core::error::AppError;
use crate::core::process::plugin::{
    parse_config, PluginConfig, PluginDeps, ProcessPlugin, RowContext, StageOutcome,
};
use crate::core::row::FieldValue;
use regex::Regex;
use serde::Deserialize;
use serde_json::{Number, Value};
use std::str::FromStr;
use std::sync::{Arc, OnceLock};

pub const PLUGIN_ID: &str = "format_phone_number";
pub const DEFAULT_FORMAT: &str = "$1-$2-$3";

const PHONE_DIGITS: usize = 10;
const MAX_GROUP: usize = 3;

static PLACEHOLDER: OnceLock<Regex> = OnceLock::new();

fn placeholder() -> &'static Regex {
    PLACEHOLDER.get_or_init(|| {
        Regex::new(r"\$(?:\{(\d{1,2})\}|(\d{1,2}))").expect("placeholder regex is valid")
    })
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PatternError {
    #[error("format pattern is empty")]
    Empty,
    #[error("format pattern references ${0}; only $0 through $3 are available")]
    UnknownGroup(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Group(usize),
}

/// Output pattern with `$1`/`$2`/`$3` (or `${1}`...) placeholders for the
/// 3+3+4 digit groups. `$0` is the whole ten digit run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhonePattern {
    segments: Vec<Segment>,
}

impl PhonePattern {
    pub fn parse(pattern: &str) -> Result<Self, PatternError> {
        if pattern.is_empty() {
            return Err(PatternError::Empty);
        }
        let mut segments = Vec::new();
        let mut cursor = 0;
        for captures in placeholder().captures_iter(pattern) {
            let Some(whole) = captures.get(0) else {
                continue;
            };
            if whole.start() > cursor {
                segments.push(Segment::Literal(pattern[cursor..whole.start()].to_string()));
            }
            let digits = captures
                .get(1)
                .or_else(|| captures.get(2))
                .map(|m| m.as_str())
                .unwrap_or_default();
            let Ok(group) = digits.parse::<usize>() else {
                continue;
            };
            if group > MAX_GROUP {
                return Err(PatternError::UnknownGroup(group));
            }
            segments.push(Segment::Group(group));
            cursor = whole.end();
        }
        if cursor < pattern.len() {
            segments.push(Segment::Literal(pattern[cursor..].to_string()));
        }
        Ok(Self { segments })
    }

    /// Substitute `groups` (`[whole, first, second, third]`) into the pattern.
    fn render(&self, groups: [&str; 4]) -> String {
        let mut output = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => output.push_str(text),
                Segment::Group(index) => output.push_str(groups[*index]),
            }
        }
        output
    }
}

impl Default for PhonePattern {
    fn default() -> Self {
        Self {
            segments: vec![
                Segment::Group(1),
                Segment::Literal("-".to_string()),
                Segment::Group(2),
                Segment::Literal("-".to_string()),
                Segment::Group(3),
            ],
        }
    }
}

impl FromStr for PhonePattern {
    type Err = PatternError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

/// Stateless phone number normalizer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValueFormatter {
    pattern: PhonePattern,
    invalid_return_empty: bool,
}

impl ValueFormatter {
    pub fn new(pattern: PhonePattern, invalid_return_empty: bool) -> Self {
        Self {
            pattern,
            invalid_return_empty,
        }
    }

    /// `None` means "no value": the input was empty.
    ///
    /// Ten digits (after dropping everything else) are regrouped into the
    /// pattern. Anything else comes back unchanged, or as an empty string
    /// when `invalid_return_empty` is set.
    pub fn format(&self, value: &str) -> Option<String> {
        if value.is_empty() {
            return None;
        }
        match self.regroup(value) {
            Some(formatted) => Some(formatted),
            None if self.invalid_return_empty => Some(String::new()),
            None => Some(value.to_string()),
        }
    }

    /// The formatted number, or `None` when `value` is not a valid phone
    /// number.
    pub fn regroup(&self, value: &str) -> Option<String> {
        let digits: String = value.chars().filter(char::is_ascii_digit).collect();
        if digits.len() != PHONE_DIGITS {
            return None;
        }
        let formatted = self
            .pattern
            .render([digits.as_str(), &digits[0..3], &digits[3..6], &digits[6..10]]);
        (!formatted.is_empty()).then_some(formatted)
    }

    pub fn invalid_return_empty(&self) -> bool {
        self.invalid_return_empty
    }
}

/// Decimal text of a number. Integral floats lose the fraction so
/// `5551234567.0` reads as ten digits.
fn number_text(number: &Number) -> String {
    match number.as_f64() {
        Some(float) if number.is_f64() && float.fract() == 0.0 && float.abs() < 1e15 => {
            format!("{:.0}", float)
        }
        _ => number.to_string(),
    }
}

/// Values the formatter reads as "no value".
fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null | Value::Bool(false) => true,
        Value::String(text) => text.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FormatPhoneNumberConfig {
    #[serde(default = "default_format")]
    format: String,
    #[serde(default)]
    invalid_return_empty: bool,
}

fn default_format() -> String {
    DEFAULT_FORMAT.to_string()
}

pub struct FormatPhoneNumber {
    formatter: ValueFormatter,
}

impl FormatPhoneNumber {
    pub fn new(formatter: ValueFormatter) -> Self {
        Self { formatter }
    }

    pub fn from_config(
        config: &PluginConfig,
        _deps: &PluginDeps,
    ) -> Result<Arc<dyn ProcessPlugin>, AppError> {
        let parsed: FormatPhoneNumberConfig = parse_config(PLUGIN_ID, config)?;
        let pattern = PhonePattern::parse(&parsed.format).map_err(|err| {
            AppError::configuration(format!("{}: {}", PLUGIN_ID, err)).with_code("MIG-CFG-003")
        })?;
        Ok(Arc::new(Self::new(ValueFormatter::new(
            pattern,
            parsed.invalid_return_empty,
        ))))
    }
}

impl ProcessPlugin for FormatPhoneNumber {
    fn id(&self) -> &'static str {
        PLUGIN_ID
    }

    fn transform(
        &self,
        value: FieldValue,
        _ctx: &RowContext<'_>,
    ) -> Result<StageOutcome, AppError> {
        let Some(value) = value.filter(|value| !is_blank(value)) else {
            return Ok(StageOutcome::Unset);
        };
        let formatted = match &value {
            Value::String(text) => self.formatter.regroup(text),
            Value::Number(number) => self.formatter.regroup(&number_text(number)),
            _ => None,
        };
        let outcome = match formatted {
            Some(formatted) => StageOutcome::Value(Value::String(formatted)),
            None if self.formatter.invalid_return_empty() => {
                StageOutcome::Value(Value::String(String::new()))
            }
            // Invalid input passes through as it came, type included.
            None => StageOutcome::Value(value),
        };
        Ok(outcome)
    }
}
