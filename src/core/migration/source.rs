#![allow(clippy::result_large_err)]

use crate::core::error::AppError;
use crate::core::row::SourceRow;
use crate::core::types::ErrorCategory;
use serde_json::Value;
use std::collections::VecDeque;
use std::fs;
use std::path::Path;

/// Yields source rows one at a time.
pub trait RowProvider {
    fn next_row(&mut self) -> Result<Option<SourceRow>, AppError>;
}

/// Rows read from a JSON array or a JSON-lines document.
pub struct JsonRowProvider {
    rows: VecDeque<Value>,
    position: usize,
}

impl JsonRowProvider {
    pub fn from_rows(rows: Vec<Value>) -> Self {
        Self {
            rows: rows.into(),
            position: 0,
        }
    }

    /// A document starting with `[` is one array; anything else is one JSON
    /// object per non-blank line.
    pub fn parse(content: &str) -> Result<Self, AppError> {
        let trimmed = content.trim_start();
        if trimmed.starts_with('[') {
            let rows: Vec<Value> = serde_json::from_str(trimmed).map_err(|e| {
                AppError::new(
                    ErrorCategory::SourceError,
                    format!("invalid JSON source document: {}", e),
                )
                .with_code("MIG-SRC-001")
            })?;
            return Ok(Self::from_rows(rows));
        }
        let mut rows = Vec::new();
        for (index, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let row = serde_json::from_str(line).map_err(|e| {
                AppError::new(
                    ErrorCategory::SourceError,
                    format!("invalid JSON on source line {}: {}", index + 1, e),
                )
                .with_code("MIG-SRC-001")
            })?;
            rows.push(row);
        }
        Ok(Self::from_rows(rows))
    }

    pub fn load(path: &Path) -> Result<Self, AppError> {
        let content = fs::read_to_string(path).map_err(|e| {
            AppError::new(
                ErrorCategory::IoError,
                format!("Failed to read source file {}", path.display()),
            )
            .with_code("MIG-SRC-001")
            .with_source(e)
        })?;
        Self::parse(&content).map_err(|mut err| {
            err.add_context("file", &path.display().to_string());
            err
        })
    }

    pub fn remaining(&self) -> usize {
        self.rows.len()
    }
}

impl RowProvider for JsonRowProvider {
    fn next_row(&mut self) -> Result<Option<SourceRow>, AppError> {
        let Some(value) = self.rows.pop_front() else {
            return Ok(None);
        };
        self.position += 1;
        SourceRow::from_json(value).map(Some).map_err(|mut err| {
            err.add_context("position", &self.position.to_string());
            err
        })
    }
}
