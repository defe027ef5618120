use tracing::debug;

use super::error::Result;
use super::types::{
    CompoundingOrder, Ledger, MonthlyRecord, SimulationOutcome, SimulationParameters,
    SummaryAggregates,
};

#[derive(Debug, Clone, Copy)]
struct MonthFlow {
    contribution: f64,
    withdrawal: f64,
    monthly_rate: f64,
}

pub fn simulate(params: &SimulationParameters) -> Result<SimulationOutcome> {
    params.validate()?;

    let ledger = build_ledger(params);
    let summary = summarize(&ledger);
    let final_balance = if params.adjust_for_inflation {
        deflate(
            summary.final_balance,
            params.inflation_rate_pct,
            params.contribution_months,
        )
    } else {
        summary.final_balance
    };

    match summary.exhausted_at_month {
        Some(month) => debug!(
            month,
            horizon = params.contribution_months,
            "funds exhausted before horizon"
        ),
        None => debug!(
            months = summary.months_simulated,
            final_balance = summary.final_balance,
            "simulation completed"
        ),
    }

    Ok(SimulationOutcome {
        final_balance,
        inflation_adjusted: params.adjust_for_inflation,
        summary,
        ledger,
    })
}

pub fn monthly_rate(annual_rate_pct: f64) -> f64 {
    annual_rate_pct / 100.0 / 12.0
}

fn build_ledger(params: &SimulationParameters) -> Ledger {
    let mut ledger = Ledger::with_capacity(params.contribution_months as usize);
    let mut balance = 0.0;

    for month in 1..=params.contribution_months {
        let flow = month_flow(params, month);
        let record = apply_month(params.compounding_order, month, balance, flow);
        balance = record.balance;
        ledger.push(record);

        if balance <= 0.0 {
            break;
        }
    }

    ledger
}

fn month_flow(params: &SimulationParameters, month: u32) -> MonthFlow {
    let withdrawing = params.in_withdrawal_window(month);

    let mut contribution = if params.in_contribution_phase(month) {
        params.monthly_contribution
    } else {
        0.0
    };
    if month == 1 {
        contribution += params.initial_balance;
    }

    MonthFlow {
        contribution,
        withdrawal: if withdrawing {
            params.monthly_withdrawal
        } else {
            0.0
        },
        monthly_rate: if withdrawing {
            monthly_rate(params.swp_rate_pct)
        } else {
            monthly_rate(params.sip_rate_pct)
        },
    }
}

fn apply_month(
    order: CompoundingOrder,
    month: u32,
    opening_balance: f64,
    flow: MonthFlow,
) -> MonthlyRecord {
    let MonthFlow {
        contribution,
        withdrawal,
        monthly_rate,
    } = flow;

    let (interest_credited, balance) = match order {
        CompoundingOrder::ContributeThenCompound => {
            let invested = opening_balance + contribution;
            let interest = invested * monthly_rate;
            (interest, invested + interest - withdrawal)
        }
        CompoundingOrder::CompoundThenContribute => {
            let interest = opening_balance * monthly_rate;
            (
                interest,
                opening_balance + interest + contribution - withdrawal,
            )
        }
        CompoundingOrder::WithdrawThenCompound => {
            let invested = opening_balance + contribution - withdrawal;
            let interest = invested * monthly_rate;
            (interest, invested + interest)
        }
    };

    MonthlyRecord {
        month,
        opening_balance,
        contribution,
        withdrawal,
        interest: opening_balance * monthly_rate,
        interest_credited,
        balance,
    }
}

pub fn summarize(ledger: &Ledger) -> SummaryAggregates {
    SummaryAggregates {
        total_contributed: ledger.iter().map(|r| r.contribution).sum(),
        total_withdrawn: ledger.iter().map(|r| r.withdrawal).sum(),
        total_interest: ledger.iter().map(|r| r.interest).sum(),
        total_interest_credited: ledger.iter().map(|r| r.interest_credited).sum(),
        final_balance: ledger.last().map_or(0.0, |r| r.balance),
        months_simulated: ledger.len() as u32,
        exhausted_at_month: ledger.exhaustion_month(),
    }
}

/// Express a terminal value in today's money.
pub fn deflate(value: f64, inflation_rate_pct: f64, horizon_months: u32) -> f64 {
    let years = f64::from(horizon_months) / 12.0;
    value / (1.0 + inflation_rate_pct / 100.0).powf(years)
}
