//! Cross-column financial invariants of the sales table.
//!
//! Each rule is evaluated only when every column it reads is present; a
//! row takes part in a rule only when all of that rule's operands are
//! non-missing. Equalities are checked against absolute tolerances.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    config::FinancialHealthConfig,
    frame::{Column, Frame},
};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum FinancialRule {
    UnitsIntegrity,
    PromoEquality,
    MarginIntegrity,
    UtilityCalc,
    RevenueCalc,
    CostCalc,
    NonNegative,
}

impl FinancialRule {
    pub const ALL: [FinancialRule; 7] = [
        FinancialRule::UnitsIntegrity,
        FinancialRule::PromoEquality,
        FinancialRule::MarginIntegrity,
        FinancialRule::UtilityCalc,
        FinancialRule::RevenueCalc,
        FinancialRule::CostCalc,
        FinancialRule::NonNegative,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FinancialRule::UnitsIntegrity => "units_integrity",
            FinancialRule::PromoEquality => "promo_equality",
            FinancialRule::MarginIntegrity => "margin_integrity",
            FinancialRule::UtilityCalc => "utility_calc",
            FinancialRule::RevenueCalc => "revenue_calc",
            FinancialRule::CostCalc => "cost_calc",
            FinancialRule::NonNegative => "non_negative",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Magnitude {
    Rows(usize),
    Columns(BTreeMap<String, usize>),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Violation {
    pub rule: FinancialRule,
    pub magnitude: Magnitude,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HealthStatus {
    Pass,
    Fail,
    Skipped,
}

impl HealthStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            HealthStatus::Pass => "PASS",
            HealthStatus::Fail => "FAIL",
            HealthStatus::Skipped => "SKIPPED",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FinancialReport {
    pub status: HealthStatus,
    pub evaluated_rules: Vec<FinancialRule>,
    pub violations: Vec<Violation>,
}

impl FinancialReport {
    pub fn skipped() -> Self {
        Self {
            status: HealthStatus::Skipped,
            evaluated_rules: Vec::new(),
            violations: Vec::new(),
        }
    }

    pub fn violation(&self, rule: FinancialRule) -> Option<&Magnitude> {
        self.violations
            .iter()
            .find(|v| v.rule == rule)
            .map(|v| &v.magnitude)
    }
}

/// Runs all seven rules against `frame`. Tables that are not financial
/// targets are skipped.
pub fn check(frame: &Frame, table: &str, config: &FinancialHealthConfig) -> FinancialReport {
    if !config.target_files.iter().any(|t| t == table) {
        return FinancialReport::skipped();
    }
    let mut evaluated_rules = Vec::new();
    let mut violations = Vec::new();
    for rule in FinancialRule::ALL {
        if let Some(magnitude) = evaluate(frame, rule, config) {
            evaluated_rules.push(rule);
            let violated = match &magnitude {
                Magnitude::Rows(count) => *count > 0,
                Magnitude::Columns(columns) => !columns.is_empty(),
            };
            if violated {
                violations.push(Violation { rule, magnitude });
            }
        }
    }
    let status = if violations.is_empty() {
        HealthStatus::Pass
    } else {
        HealthStatus::Fail
    };
    FinancialReport {
        status,
        evaluated_rules,
        violations,
    }
}

/// `None` when the rule cannot be evaluated because a column is absent or
/// holds non-numeric values.
pub fn evaluate(
    frame: &Frame,
    rule: FinancialRule,
    config: &FinancialHealthConfig,
) -> Option<Magnitude> {
    let c = &config.columns;
    let units = config.unit_tolerance;
    let money = config.currency_tolerance;
    let rows = match rule {
        FinancialRule::UnitsIntegrity => failing_rows(
            frame,
            &[&c.total_units, &c.normal_units, &c.paid_promo_units, &c.bonus_promo_units],
            |v| (v[0] - (v[1] + v[2] + v[3])).abs() > units,
        )?,
        FinancialRule::PromoEquality => failing_rows(
            frame,
            &[&c.paid_promo_units, &c.bonus_promo_units],
            |v| (v[0] - v[1]).abs() > units,
        )?,
        FinancialRule::MarginIntegrity => {
            failing_rows(frame, &[&c.unit_price, &c.unit_cost], |v| v[0] < v[1])?
        }
        FinancialRule::UtilityCalc => failing_rows(
            frame,
            &[&c.profit, &c.total_revenue, &c.total_cost],
            |v| (v[0] - (v[1] - v[2])).abs() > money,
        )?,
        FinancialRule::RevenueCalc => failing_rows(
            frame,
            &[&c.total_revenue, &c.normal_units, &c.paid_promo_units, &c.unit_price],
            |v| (v[0] - (v[1] + v[2]) * v[3]).abs() > money,
        )?,
        FinancialRule::CostCalc => failing_rows(
            frame,
            &[&c.total_cost, &c.total_units, &c.unit_cost],
            |v| (v[0] - v[1] * v[2]).abs() > money,
        )?,
        FinancialRule::NonNegative => return Some(Magnitude::Columns(negative_counts(frame))),
    };
    Some(Magnitude::Rows(rows))
}

fn failing_rows(
    frame: &Frame,
    columns: &[&String],
    fails: impl Fn(&[f64]) -> bool,
) -> Option<usize> {
    let series = columns
        .iter()
        .map(|name| {
            frame
                .column(name)
                .filter(|c| c.kind().is_numeric())
                .map(Column::numeric)
        })
        .collect::<Option<Vec<_>>>()?;
    let mut operands = Vec::with_capacity(series.len());
    let count = (0..frame.height())
        .filter(|&row| {
            operands.clear();
            for values in &series {
                match values[row] {
                    Some(value) => operands.push(value),
                    None => return false,
                }
            }
            fails(&operands)
        })
        .count();
    Some(count)
}

fn negative_counts(frame: &Frame) -> BTreeMap<String, usize> {
    frame
        .columns()
        .iter()
        .filter(|c| c.kind().is_numeric())
        .filter_map(|c| {
            let negatives = c
                .numeric()
                .into_iter()
                .filter(|v| v.is_some_and(|v| v < 0.0))
                .count();
            (negatives > 0).then(|| (c.name.clone(), negatives))
        })
        .collect()
}
