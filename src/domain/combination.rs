//! Combination keys
//!
//! A [`CombinationKey`] is one concrete assignment of a value to every
//! filterable field plus the shared month range. It renders itself as a
//! query filter, a deterministic file name and a display label.

use crate::domain::request::{month_range_token, FilterField, MonthSerial, WILDCARD};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Suffix appended to the month token in every output file name
pub const FILE_NAME_SUFFIX: &str = "EXP";

/// One concrete filter combination
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CombinationKey {
    values: [String; 7],
    from_month: MonthSerial,
    to_month: MonthSerial,
}

impl CombinationKey {
    /// Creates a key; blank values are replaced with the wildcard
    pub fn new(values: [String; 7], from_month: MonthSerial, to_month: MonthSerial) -> Self {
        let values = values.map(|v| {
            let trimmed = v.trim();
            if trimmed.is_empty() {
                WILDCARD.to_string()
            } else if trimmed.len() == v.len() {
                v
            } else {
                trimmed.to_string()
            }
        });
        Self {
            values,
            from_month,
            to_month,
        }
    }

    /// Value for a field
    pub fn value(&self, field: FilterField) -> &str {
        &self.values[field.index()]
    }

    /// Whether a field matches all records
    pub fn is_wildcard(&self, field: FilterField) -> bool {
        self.value(field) == WILDCARD
    }

    pub fn hs_code(&self) -> &str {
        self.value(FilterField::HsCode)
    }

    pub fn product(&self) -> &str {
        self.value(FilterField::Product)
    }

    pub fn exporter(&self) -> &str {
        self.value(FilterField::Exporter)
    }

    pub fn port(&self) -> &str {
        self.value(FilterField::Port)
    }

    pub fn iec(&self) -> &str {
        self.value(FilterField::Iec)
    }

    pub fn country(&self) -> &str {
        self.value(FilterField::Country)
    }

    pub fn foreign_party(&self) -> &str {
        self.value(FilterField::ForeignParty)
    }

    pub fn from_month(&self) -> MonthSerial {
        self.from_month
    }

    pub fn to_month(&self) -> MonthSerial {
        self.to_month
    }

    /// Fields that carry a concrete (non-wildcard) value, in field order
    pub fn concrete_fields(&self) -> impl Iterator<Item = (FilterField, &str)> {
        FilterField::ALL
            .into_iter()
            .filter(move |f| !self.is_wildcard(*f))
            .map(move |f| (f, self.value(f)))
    }

    /// Renders the key as a query filter
    pub fn to_query_filter(&self) -> QueryFilter {
        QueryFilter {
            hs_code: self.hs_code().to_string(),
            product: self.product().to_string(),
            exporter: self.exporter().to_string(),
            port: self.port().to_string(),
            iec: self.iec().to_string(),
            country: self.country().to_string(),
            foreign_party: self.foreign_party().to_string(),
            from_month: self.from_month.value(),
            to_month: self.to_month.value(),
        }
    }

    /// Deterministic file name without extension, e.g. `01_JAN24EXP`
    pub fn file_stem(&self) -> String {
        let mut parts: Vec<String> = self
            .concrete_fields()
            .map(|(_, value)| sanitize_file_component(value))
            .filter(|part| !part.is_empty())
            .collect();
        parts.push(format!(
            "{}{}",
            month_range_token(self.from_month, self.to_month),
            FILE_NAME_SUFFIX
        ));
        parts.join("_")
    }

    /// File name with the given extension, e.g. `01_JAN24EXP.csv`
    pub fn file_name(&self, extension: &str) -> String {
        let extension = extension.trim_start_matches('.');
        if extension.is_empty() {
            self.file_stem()
        } else {
            format!("{}.{}", self.file_stem(), extension)
        }
    }

    /// Human-readable label, e.g. `HS:01 | Exporter:ACME | JAN24`
    pub fn label(&self) -> String {
        let mut parts: Vec<String> = self
            .concrete_fields()
            .map(|(field, value)| format!("{}:{}", field.label(), value))
            .collect();
        if parts.is_empty() {
            parts.push("All records".to_string());
        }
        parts.push(month_range_token(self.from_month, self.to_month));
        parts.join(" | ")
    }
}

impl fmt::Display for CombinationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

/// Filter handed to the query collaborator
///
/// Field values are `LIKE` patterns; `%` matches everything.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryFilter {
    pub hs_code: String,
    pub product: String,
    pub exporter: String,
    pub port: String,
    pub iec: String,
    pub country: String,
    pub foreign_party: String,
    pub from_month: u32,
    pub to_month: u32,
}

impl QueryFilter {
    /// Field patterns in [`FilterField::ALL`] order
    pub fn patterns(&self) -> [&str; 7] {
        [
            &self.hs_code,
            &self.product,
            &self.exporter,
            &self.port,
            &self.iec,
            &self.country,
            &self.foreign_party,
        ]
    }
}

/// Makes a filter value safe to embed in a file name
fn sanitize_file_component(value: &str) -> String {
    value
        .chars()
        .filter(|c| *c != '%')
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_') {
                c
            } else {
                '-'
            }
        })
        .collect::<String>()
        .trim_matches(|c| c == '-' || c == '.')
        .to_string()
}
