//! Export request types
//!
//! A [`FilterListRequest`] holds one ordered value-list per filterable field
//! plus the shared month range. It is built once per export run and never
//! mutated afterwards.

use crate::domain::{Result, TradexError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Sentinel value meaning "match every record" for a field
pub const WILDCARD: &str = "%";

const MONTH_ABBREVIATIONS: [&str; 12] = [
    "JAN", "FEB", "MAR", "APR", "MAY", "JUN", "JUL", "AUG", "SEP", "OCT", "NOV", "DEC",
];

/// A calendar month encoded as a `YYYYMM` integer
///
/// Only years 2000-2099 are accepted.
///
/// # Examples
///
/// ```
/// use tradex::domain::request::MonthSerial;
/// use std::str::FromStr;
///
/// let month = MonthSerial::from_str("202401").unwrap();
/// assert_eq!(month.year(), 2024);
/// assert_eq!(month.abbreviation(), "JAN24");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct MonthSerial(u32);

impl MonthSerial {
    /// Creates a month serial, validating year and month ranges
    pub fn new(serial: u32) -> std::result::Result<Self, String> {
        let year = serial / 100;
        let month = serial % 100;

        if !(2000..=2099).contains(&year) {
            return Err(format!(
                "Invalid month serial {serial}: year must be between 2000 and 2099"
            ));
        }
        if !(1..=12).contains(&month) {
            return Err(format!(
                "Invalid month serial {serial}: month must be between 1 and 12"
            ));
        }

        Ok(Self(serial))
    }

    /// Returns the raw `YYYYMM` value
    pub fn value(&self) -> u32 {
        self.0
    }

    /// Four-digit year
    pub fn year(&self) -> u32 {
        self.0 / 100
    }

    /// Month of year, 1-12
    pub fn month(&self) -> u32 {
        self.0 % 100
    }

    /// Abbreviated form used in file names, e.g. `JAN24`
    pub fn abbreviation(&self) -> String {
        let name = MONTH_ABBREVIATIONS[(self.month() - 1) as usize];
        format!("{}{:02}", name, self.year() % 100)
    }
}

impl fmt::Display for MonthSerial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for MonthSerial {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err("Month serial cannot be empty".to_string());
        }
        if trimmed.len() != 6 || !trimmed.chars().all(|c| c.is_ascii_digit()) {
            return Err(format!(
                "Invalid month serial '{trimmed}': expected YYYYMM"
            ));
        }
        let serial: u32 = trimmed
            .parse()
            .map_err(|e| format!("Invalid month serial '{trimmed}': {e}"))?;
        Self::new(serial)
    }
}

impl TryFrom<u32> for MonthSerial {
    type Error = String;

    fn try_from(value: u32) -> std::result::Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<MonthSerial> for u32 {
    fn from(month: MonthSerial) -> Self {
        month.0
    }
}

/// Token for a month range: `JAN24` for a single month, `JAN24-MAR24` otherwise
pub fn month_range_token(from: MonthSerial, to: MonthSerial) -> String {
    if from == to {
        from.abbreviation()
    } else {
        format!("{}-{}", from.abbreviation(), to.abbreviation())
    }
}

/// The seven filterable fields, in expansion order (outermost first)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterField {
    HsCode,
    Product,
    Exporter,
    Port,
    Iec,
    Country,
    ForeignParty,
}

impl FilterField {
    /// All fields in cartesian-product order
    pub const ALL: [FilterField; 7] = [
        FilterField::HsCode,
        FilterField::Product,
        FilterField::Exporter,
        FilterField::Port,
        FilterField::Iec,
        FilterField::Country,
        FilterField::ForeignParty,
    ];

    /// Position of this field in [`FilterField::ALL`]
    pub fn index(self) -> usize {
        match self {
            FilterField::HsCode => 0,
            FilterField::Product => 1,
            FilterField::Exporter => 2,
            FilterField::Port => 3,
            FilterField::Iec => 4,
            FilterField::Country => 5,
            FilterField::ForeignParty => 6,
        }
    }

    /// Short label used in progress text
    pub fn label(self) -> &'static str {
        match self {
            FilterField::HsCode => "HS",
            FilterField::Product => "Product",
            FilterField::Exporter => "Exporter",
            FilterField::Port => "Port",
            FilterField::Iec => "IEC",
            FilterField::Country => "Country",
            FilterField::ForeignParty => "Party",
        }
    }

    /// Column name in the source view
    pub fn column(self) -> &'static str {
        match self {
            FilterField::HsCode => "hs_code",
            FilterField::Product => "product",
            FilterField::Exporter => "exporter",
            FilterField::Port => "port",
            FilterField::Iec => "iec",
            FilterField::Country => "country",
            FilterField::ForeignParty => "foreign_party",
        }
    }
}

impl fmt::Display for FilterField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Splits raw user input into a value-list
///
/// Values are comma-separated and trimmed. Blank entries and repeats are
/// dropped (first occurrence wins). Blank input yields `["%"]`.
///
/// ```
/// use tradex::domain::request::parse_value_list;
///
/// assert_eq!(parse_value_list("01, 02,,01"), vec!["01", "02"]);
/// assert_eq!(parse_value_list("  "), vec!["%"]);
/// ```
pub fn parse_value_list(raw: &str) -> Vec<String> {
    let mut values: Vec<String> = Vec::new();
    for part in raw.split(',') {
        let value = part.trim();
        if value.is_empty() || values.iter().any(|v| v == value) {
            continue;
        }
        values.push(value.to_string());
    }

    if values.is_empty() {
        values.push(WILDCARD.to_string());
    }
    values
}

/// Filter value-lists for one export run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterListRequest {
    pub hs_codes: Vec<String>,
    pub products: Vec<String>,
    pub exporters: Vec<String>,
    pub ports: Vec<String>,
    pub iecs: Vec<String>,
    pub countries: Vec<String>,
    pub foreign_parties: Vec<String>,
    pub from_month: MonthSerial,
    pub to_month: MonthSerial,
}

impl FilterListRequest {
    /// Request with every field set to the wildcard
    pub fn all_records(from_month: MonthSerial, to_month: MonthSerial) -> Self {
        let wildcard = || vec![WILDCARD.to_string()];
        Self {
            hs_codes: wildcard(),
            products: wildcard(),
            exporters: wildcard(),
            ports: wildcard(),
            iecs: wildcard(),
            countries: wildcard(),
            foreign_parties: wildcard(),
            from_month,
            to_month,
        }
    }

    /// Value-list for a field
    pub fn values(&self, field: FilterField) -> &[String] {
        match field {
            FilterField::HsCode => &self.hs_codes,
            FilterField::Product => &self.products,
            FilterField::Exporter => &self.exporters,
            FilterField::Port => &self.ports,
            FilterField::Iec => &self.iecs,
            FilterField::Country => &self.countries,
            FilterField::ForeignParty => &self.foreign_parties,
        }
    }

    /// Mutable value-list for a field
    pub fn values_mut(&mut self, field: FilterField) -> &mut Vec<String> {
        match field {
            FilterField::HsCode => &mut self.hs_codes,
            FilterField::Product => &mut self.products,
            FilterField::Exporter => &mut self.exporters,
            FilterField::Port => &mut self.ports,
            FilterField::Iec => &mut self.iecs,
            FilterField::Country => &mut self.countries,
            FilterField::ForeignParty => &mut self.foreign_parties,
        }
    }

    /// Validates the month range
    ///
    /// # Errors
    ///
    /// Returns [`TradexError::Validation`] when `from_month` is after `to_month`.
    pub fn validate(&self) -> Result<()> {
        if self.from_month > self.to_month {
            return Err(TradexError::Validation(format!(
                "fromMonth {} is after toMonth {}",
                self.from_month, self.to_month
            )));
        }
        Ok(())
    }
}

/// Builder for [`FilterListRequest`] from raw user input
///
/// Every field defaults to the wildcard. Month serials are parsed and
/// validated in [`build`](Self::build).
#[derive(Debug, Default)]
pub struct FilterListRequestBuilder {
    values: [Option<Vec<String>>; 7],
    from_month: Option<String>,
    to_month: Option<String>,
}

impl FilterListRequestBuilder {
    /// Creates an empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a field from comma-separated raw input
    pub fn field(mut self, field: FilterField, raw: &str) -> Self {
        self.values[field.index()] = Some(parse_value_list(raw));
        self
    }

    /// Sets a field from raw input when present
    pub fn field_opt(self, field: FilterField, raw: Option<&str>) -> Self {
        match raw {
            Some(raw) => self.field(field, raw),
            None => self,
        }
    }

    /// Sets the month range from raw `YYYYMM` strings
    pub fn months(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.from_month = Some(from.into());
        self.to_month = Some(to.into());
        self
    }

    /// Builds and validates the request
    ///
    /// # Errors
    ///
    /// Returns [`TradexError::Validation`] if either month is missing or
    /// malformed, or if the range is inverted.
    pub fn build(self) -> Result<FilterListRequest> {
        let from_month = parse_month(self.from_month.as_deref(), "fromMonth")?;
        let to_month = parse_month(self.to_month.as_deref(), "toMonth")?;

        let mut request = FilterListRequest::all_records(from_month, to_month);
        for (field, values) in FilterField::ALL.iter().zip(self.values) {
            if let Some(values) = values {
                *request.values_mut(*field) = values;
            }
        }

        request.validate()?;
        Ok(request)
    }
}

fn parse_month(raw: Option<&str>, name: &str) -> Result<MonthSerial> {
    let raw = raw.ok_or_else(|| TradexError::Validation(format!("{name} is required")))?;
    MonthSerial::from_str(raw).map_err(|e| TradexError::Validation(format!("{name}: {e}")))
}
