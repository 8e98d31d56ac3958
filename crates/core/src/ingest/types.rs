use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub last_price: Option<f64>,
    pub market_cap: Option<f64>,
    pub year_high: Option<f64>,
    pub year_low: Option<f64>,
    pub volume: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompanyInfo {
    pub sector: Option<String>,
    pub industry: Option<String>,
    pub trailing_eps: Option<f64>,
    pub trailing_pe: Option<f64>,
    pub return_on_equity: Option<f64>,
    pub debt_to_equity: Option<f64>,
    pub profit_margins: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementFrequency {
    Annual,
    Quarterly,
}

impl StatementFrequency {
    pub fn as_str(self) -> &'static str {
        match self {
            StatementFrequency::Annual => "annual",
            StatementFrequency::Quarterly => "quarterly",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StatementCell {
    pub period_end: NaiveDate,
    pub value: Option<f64>,
}

/// Financial statement keyed by line-item label, one row per label.
///
/// Cells of a row are kept most-recent period first, so the first cell is the latest reported
/// value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StatementTable {
    rows: BTreeMap<String, Vec<StatementCell>>,
}

impl StatementTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_row(&mut self, label: impl Into<String>, mut cells: Vec<StatementCell>) {
        cells.sort_by(|a, b| b.period_end.cmp(&a.period_end));
        self.rows.insert(label.into(), cells);
    }

    pub fn row(&self, label: &str) -> Option<&[StatementCell]> {
        self.rows.get(label).map(Vec::as_slice)
    }

    pub fn contains(&self, label: &str) -> bool {
        self.rows.contains_key(label)
    }

    /// Value of the most recent period for `label`.
    pub fn latest(&self, label: &str) -> Option<f64> {
        self.row(label)?.first()?.value
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.rows.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DailyBar {
    pub date: NaiveDate,
    pub close: Option<f64>,
    pub volume: Option<f64>,
}
