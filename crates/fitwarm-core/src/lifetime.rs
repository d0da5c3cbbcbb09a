//! FIT contract lifetime: years left on the tariff and the repowering window
//! derived from it.
//!
//! Thresholds (years left): up to 2 is IMMEDIATE, up to 5 URGENT, up to 10
//! OPTIMAL, beyond that PLANNING. Expired contracts count as IMMEDIATE.
//!
//! The index only filters on labels already stored with a record;
//! [`RepoweringWindow::from_years_left`] is for callers that precompute them,
//! and the `FromStr` impl validates labels given on the command line.

use std::fmt;
use std::str::FromStr;

use chrono::{Months, NaiveDate, NaiveDateTime};

use crate::record::Metadata;
use crate::technology::Technology;

const DAYS_PER_YEAR: f64 = 365.25;

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y"];
const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"];

/// Parses the date formats seen in FIT exports. Unknown formats are `None`.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
                .map(|dt| dt.date())
        })
}

/// When the FIT contract ends: the explicit expiry date if parseable, else
/// commission date plus the technology's term (20 years when unknown).
pub fn expiry_date(meta: &Metadata) -> Option<NaiveDate> {
    if let Some(expiry) = meta.fit_expiry_date.as_deref().and_then(parse_date) {
        return Some(expiry);
    }
    let commissioned = meta.commission_date.as_deref().and_then(parse_date)?;
    let term = meta
        .technology
        .as_deref()
        .and_then(Technology::canonicalize)
        .map_or(20, Technology::fit_term_years);
    commissioned.checked_add_months(Months::new(term as u32 * 12))
}

/// Years remaining on the tariff as of `as_of`. Negative once expired.
pub fn years_left(meta: &Metadata, as_of: NaiveDate) -> Option<f64> {
    let expiry = expiry_date(meta)?;
    Some((expiry - as_of).num_days() as f64 / DAYS_PER_YEAR)
}

/// How soon an installation should be considered for repowering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RepoweringWindow {
    Immediate,
    Urgent,
    Optimal,
    Planning,
}

impl RepoweringWindow {
    pub fn from_years_left(years: f64) -> Self {
        if years <= 2.0 {
            RepoweringWindow::Immediate
        } else if years <= 5.0 {
            RepoweringWindow::Urgent
        } else if years <= 10.0 {
            RepoweringWindow::Optimal
        } else {
            RepoweringWindow::Planning
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RepoweringWindow::Immediate => "IMMEDIATE",
            RepoweringWindow::Urgent => "URGENT",
            RepoweringWindow::Optimal => "OPTIMAL",
            RepoweringWindow::Planning => "PLANNING",
        }
    }
}

impl fmt::Display for RepoweringWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RepoweringWindow {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "IMMEDIATE" => Ok(RepoweringWindow::Immediate),
            "URGENT" => Ok(RepoweringWindow::Urgent),
            "OPTIMAL" => Ok(RepoweringWindow::Optimal),
            "PLANNING" => Ok(RepoweringWindow::Planning),
            other => Err(format!("unknown repowering window: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn parses_export_formats() {
        assert_eq!(parse_date("2031-03-31"), Some(date(2031, 3, 31)));
        assert_eq!(parse_date("31/03/2031"), Some(date(2031, 3, 31)));
        assert_eq!(parse_date("2031-03-31 00:00:00"), Some(date(2031, 3, 31)));
        assert_eq!(parse_date("2031-03-31T12:30:00"), Some(date(2031, 3, 31)));
        assert_eq!(parse_date("March 2031"), None);
        assert_eq!(parse_date(""), None);
    }

    #[test]
    fn years_left_from_expiry() {
        let meta = Metadata {
            fit_expiry_date: Some("2030-01-01".into()),
            ..Metadata::default()
        };
        let years = years_left(&meta, date(2025, 1, 1)).unwrap();
        assert!((years - 5.0).abs() < 0.01, "{years}");
    }

    #[test]
    fn years_left_from_commission_uses_term() {
        let wind = Metadata {
            commission_date: Some("2012-06-01".into()),
            technology: Some("Wind".into()),
            ..Metadata::default()
        };
        assert_eq!(expiry_date(&wind), Some(date(2032, 6, 1)));

        let chp = Metadata {
            commission_date: Some("2012-06-01".into()),
            technology: Some("Micro CHP".into()),
            ..Metadata::default()
        };
        assert_eq!(expiry_date(&chp), Some(date(2022, 6, 1)));
        assert!(years_left(&chp, date(2025, 1, 1)).unwrap() < 0.0);
    }

    #[test]
    fn no_dates_no_value() {
        assert_eq!(years_left(&Metadata::default(), date(2025, 1, 1)), None);
        let bad = Metadata {
            fit_expiry_date: Some("soon".into()),
            ..Metadata::default()
        };
        assert_eq!(years_left(&bad, date(2025, 1, 1)), None);
    }

    #[test]
    fn window_thresholds() {
        assert_eq!(RepoweringWindow::from_years_left(-1.0), RepoweringWindow::Immediate);
        assert_eq!(RepoweringWindow::from_years_left(2.0), RepoweringWindow::Immediate);
        assert_eq!(RepoweringWindow::from_years_left(4.5), RepoweringWindow::Urgent);
        assert_eq!(RepoweringWindow::from_years_left(10.0), RepoweringWindow::Optimal);
        assert_eq!(RepoweringWindow::from_years_left(12.0), RepoweringWindow::Planning);
        assert_eq!("urgent".parse::<RepoweringWindow>(), Ok(RepoweringWindow::Urgent));
    }
}
