use serde::Serialize;

use super::error::{Result, SimError};

/// Longest horizon the engine will simulate (100 years).
pub const MAX_HORIZON_MONTHS: u32 = 1_200;
/// Largest accepted currency amount for any single input.
pub const MAX_AMOUNT: f64 = 1e15;
pub const MAX_RATE_PCT: f64 = 100.0;
pub const MAX_INFLATION_PCT: f64 = 20.0;

/// Order in which a month's contribution, interest and withdrawal are applied.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum CompoundingOrder {
    /// `(b + c) * (1 + r) - w`
    #[default]
    ContributeThenCompound,
    /// `b * (1 + r) + c - w`
    CompoundThenContribute,
    /// `(b + c - w) * (1 + r)`
    WithdrawThenCompound,
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContributionMode {
    /// Contribute every month of the horizon, including withdrawal months.
    #[default]
    Throughout,
    /// Stop contributing once the withdrawal window opens.
    StopAtWithdrawalStart,
}

/// Immutable inputs for one simulation run. Rates are annual percentages.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationParameters {
    pub monthly_contribution: f64,
    pub sip_rate_pct: f64,
    pub swp_rate_pct: f64,
    pub monthly_withdrawal: f64,
    pub contribution_months: u32,
    /// 0-based offset: a value of 0 withdraws from month 1 onwards.
    pub swp_start_month: u32,
    pub swp_months: u32,
    pub inflation_rate_pct: f64,
    pub adjust_for_inflation: bool,
    /// Lump sum deposited at month 1, recorded as part of that month's contribution.
    pub initial_balance: f64,
    pub contribution_mode: ContributionMode,
    pub compounding_order: CompoundingOrder,
}

impl SimulationParameters {
    pub fn validate(&self) -> Result<()> {
        check_amount("monthly_contribution", self.monthly_contribution)?;
        check_amount("monthly_withdrawal", self.monthly_withdrawal)?;
        check_amount("initial_balance", self.initial_balance)?;
        check_rate("sip_rate_pct", self.sip_rate_pct, MAX_RATE_PCT)?;
        check_rate("swp_rate_pct", self.swp_rate_pct, MAX_RATE_PCT)?;
        check_rate(
            "inflation_rate_pct",
            self.inflation_rate_pct,
            MAX_INFLATION_PCT,
        )?;

        if self.contribution_months == 0 {
            return Err(SimError::invalid("contribution_months", "must be > 0"));
        }
        if self.contribution_months > MAX_HORIZON_MONTHS {
            return Err(SimError::invalid(
                "contribution_months",
                format!("must be <= {MAX_HORIZON_MONTHS}"),
            ));
        }
        Ok(())
    }

    /// Whether 1-based `month` falls inside the withdrawal window.
    pub fn in_withdrawal_window(&self, month: u32) -> bool {
        let Some(offset) = month.checked_sub(1) else {
            return false;
        };
        offset >= self.swp_start_month && offset - self.swp_start_month < self.swp_months
    }

    /// Whether 1-based `month` receives the regular monthly contribution.
    pub fn in_contribution_phase(&self, month: u32) -> bool {
        if month == 0 || month > self.contribution_months {
            return false;
        }
        match self.contribution_mode {
            ContributionMode::Throughout => true,
            ContributionMode::StopAtWithdrawalStart => {
                self.swp_months == 0 || month - 1 < self.swp_start_month
            }
        }
    }
}

fn check_amount(name: &'static str, value: f64) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(SimError::invalid(name, "must be finite and >= 0"));
    }
    if value > MAX_AMOUNT {
        return Err(SimError::invalid(name, format!("must be <= {MAX_AMOUNT:e}")));
    }
    Ok(())
}

fn check_rate(name: &'static str, value: f64, max: f64) -> Result<()> {
    if !value.is_finite() || !(0.0..=max).contains(&value) {
        return Err(SimError::invalid(
            name,
            format!("must be between 0 and {max}"),
        ));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyRecord {
    pub month: u32,
    pub opening_balance: f64,
    pub contribution: f64,
    pub withdrawal: f64,
    /// Interest on the opening balance, before this month's cash flows.
    pub interest: f64,
    /// Interest actually added to the balance under the compounding order.
    pub interest_credited: f64,
    pub balance: f64,
}

/// Append-only month-by-month audit trail of one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Ledger(Vec<MonthlyRecord>);

impl Ledger {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self(Vec::with_capacity(capacity))
    }

    pub(crate) fn push(&mut self, record: MonthlyRecord) {
        debug_assert_eq!(record.month as usize, self.0.len() + 1);
        self.0.push(record);
    }

    pub fn records(&self) -> &[MonthlyRecord] {
        &self.0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, MonthlyRecord> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn last(&self) -> Option<&MonthlyRecord> {
        self.0.last()
    }

    /// Month in which the balance first reached zero or below.
    pub fn exhaustion_month(&self) -> Option<u32> {
        self.last()
            .filter(|record| record.balance <= 0.0)
            .map(|record| record.month)
    }
}

impl<'a> IntoIterator for &'a Ledger {
    type Item = &'a MonthlyRecord;
    type IntoIter = std::slice::Iter<'a, MonthlyRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryAggregates {
    pub total_contributed: f64,
    pub total_withdrawn: f64,
    pub total_interest: f64,
    pub total_interest_credited: f64,
    pub final_balance: f64,
    pub months_simulated: u32,
    pub exhausted_at_month: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationOutcome {
    /// Reported terminal value; deflated when inflation adjustment is enabled.
    pub final_balance: f64,
    pub inflation_adjusted: bool,
    pub summary: SummaryAggregates,
    pub ledger: Ledger,
}
