//! Display-only derivations over simulation results.
//!
//! Nothing here feeds back into the engine: unit divisors are applied to
//! presented values only, and every function is a pure view over a
//! [`SummaryAggregates`] or [`Ledger`].

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use super::types::{Ledger, SummaryAggregates};

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayUnit {
    #[default]
    Rupees,
    Lakhs,
    Crores,
    Millions,
    Billions,
}

impl DisplayUnit {
    pub fn divisor(self) -> f64 {
        match self {
            DisplayUnit::Rupees => 1.0,
            DisplayUnit::Lakhs => 1e5,
            DisplayUnit::Crores => 1e7,
            DisplayUnit::Millions => 1e6,
            DisplayUnit::Billions => 1e9,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            DisplayUnit::Rupees => "₹",
            DisplayUnit::Lakhs => "Lakhs ₹",
            DisplayUnit::Crores => "Crores ₹",
            DisplayUnit::Millions => "Millions $",
            DisplayUnit::Billions => "Billions $",
        }
    }
}

impl fmt::Display for DisplayUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for DisplayUnit {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "rupees" | "inr" => Ok(DisplayUnit::Rupees),
            "lakh" | "lakhs" => Ok(DisplayUnit::Lakhs),
            "crore" | "crores" => Ok(DisplayUnit::Crores),
            "million" | "millions" => Ok(DisplayUnit::Millions),
            "billion" | "billions" => Ok(DisplayUnit::Billions),
            other => Err(format!("unknown display unit `{other}`")),
        }
    }
}

pub fn convert(value: f64, unit: DisplayUnit) -> f64 {
    value / unit.divisor()
}

/// Two decimals with comma thousands separators, e.g. `2,964,736.09`.
pub fn format_amount(value: f64, unit: DisplayUnit) -> String {
    let scaled = convert(value, unit);
    let fixed = format!("{:.2}", scaled.abs());
    let (whole, frac) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (idx, digit) in whole.chars().enumerate() {
        if idx > 0 && (whole.len() - idx) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    let negative = scaled < 0.0 && fixed.bytes().any(|b| matches!(b, b'1'..=b'9'));
    let sign = if negative { "-" } else { "" };
    format!("{sign}{grouped}.{frac}")
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryRow {
    pub label: &'static str,
    pub value: f64,
    pub formatted: String,
}

pub fn summary_rows(summary: &SummaryAggregates, unit: DisplayUnit) -> Vec<SummaryRow> {
    [
        ("Total Contributed", summary.total_contributed),
        ("Total Withdrawn", summary.total_withdrawn),
        ("Total Interest Earned", summary.total_interest),
        ("Total Interest Credited", summary.total_interest_credited),
        ("Final Balance", summary.final_balance),
    ]
    .into_iter()
    .map(|(label, value)| SummaryRow {
        label,
        value: convert(value, unit),
        formatted: format_amount(value, unit),
    })
    .collect()
}

/// Shares of contributed, withdrawn and interest in their combined total.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Breakdown {
    pub contributed: f64,
    pub withdrawn: f64,
    pub interest: f64,
}

pub fn breakdown(summary: &SummaryAggregates) -> Breakdown {
    // An overdrawn final month can credit negative interest.
    let interest = summary.total_interest_credited.max(0.0);
    let total = summary.total_contributed + summary.total_withdrawn + interest;
    if total <= 0.0 {
        return Breakdown {
            contributed: 0.0,
            withdrawn: 0.0,
            interest: 0.0,
        };
    }
    Breakdown {
        contributed: summary.total_contributed / total,
        withdrawn: summary.total_withdrawn / total,
        interest: interest / total,
    }
}

/// `(month, balance)` points for plotting the trajectory.
pub fn balance_series(ledger: &Ledger) -> Vec<(u32, f64)> {
    ledger.iter().map(|r| (r.month, r.balance)).collect()
}

pub fn render_summary_table(summary: &SummaryAggregates, unit: DisplayUnit) -> String {
    let rows = summary_rows(summary, unit);
    let label_width = rows.iter().map(|r| r.label.len()).max().unwrap_or(0);
    let value_width = rows.iter().map(|r| r.formatted.len()).max().unwrap_or(0);

    let mut out = format!("{:<label_width$}  Value ({unit})\n", "Parameter");
    for row in &rows {
        out.push_str(&format!(
            "{:<label_width$}  {:>value_width$}\n",
            row.label, row.formatted
        ));
    }
    match summary.exhausted_at_month {
        Some(month) => out.push_str(&format!("Funds exhausted at month {month}\n")),
        None => out.push_str(&format!(
            "Balance remained positive for all {} months\n",
            summary.months_simulated
        )),
    }
    out
}
