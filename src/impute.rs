//! Declarative, per-table gap filling.
//!
//! A table's policy is an ordered list of [`FillStep`]s. Defaults are
//! derived from the table's [`TableRole`] and the business calendar; a
//! configuration may replace the list for any table. Each step names the
//! columns it touches and silently does nothing for absent columns.

use anyhow::{Result, anyhow};
use chrono::{Datelike, NaiveDate};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::{
    config::{BusinessCalendar, ChannelColumns, Config, SalesColumns, TableRole},
    data::Value,
    frame::{Column, Frame},
};

/// One fill operation. An empty `columns` list selects every numeric
/// column except the date column.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum FillStep {
    /// Missing cells take the mean of the preceding `window` cells of the
    /// already-filled series, when at least `min_periods` are known.
    RollingMean {
        #[serde(default)]
        columns: Vec<String>,
        window: usize,
        #[serde(default = "FillStep::default_min_periods")]
        min_periods: usize,
    },
    BackFill {
        #[serde(default)]
        columns: Vec<String>,
    },
    ForwardBackFill {
        columns: Vec<String>,
    },
    /// Missing flags become 1 in campaign promotion months, 0 otherwise.
    SeasonalFlag { column: String },
    /// Missing labels become the season label when any spend channel is
    /// positive in one of the season's label months, else the no-campaign
    /// label. The first candidate column present is used.
    CampaignLabel {
        candidates: Vec<String>,
        spend: Vec<String>,
    },
    /// Missing spend is interpolated inside an active campaign window and
    /// zero outside of it.
    WindowedSpend { columns: Vec<String> },
    /// Overwrites the first present target candidate with the row sum of
    /// `sources`, when all sources are present.
    SumColumns {
        candidates: Vec<String>,
        sources: Vec<String>,
    },
    /// Interior gaps interpolated linearly, leading and trailing gaps zero.
    InterpolateThenZero { columns: Vec<String> },
    ZeroFill { columns: Vec<String> },
    /// Missing `target` cells become `total - sum(minus)`, floored at zero.
    Residual {
        target: String,
        total: String,
        minus: Vec<String>,
    },
}

impl FillStep {
    const fn default_min_periods() -> usize {
        1
    }

    pub fn describe(&self) -> String {
        let list = |columns: &[String]| {
            if columns.is_empty() {
                "<numeric>".to_string()
            } else {
                columns.join(",")
            }
        };
        match self {
            FillStep::RollingMean {
                columns,
                window,
                min_periods,
            } => format!("rolling_mean({}; window={window}, min={min_periods})", list(columns)),
            FillStep::BackFill { columns } => format!("back_fill({})", list(columns)),
            FillStep::ForwardBackFill { columns } => {
                format!("forward_back_fill({})", list(columns))
            }
            FillStep::SeasonalFlag { column } => format!("seasonal_flag({column})"),
            FillStep::CampaignLabel { candidates, .. } => {
                format!("campaign_label({})", candidates.join("|"))
            }
            FillStep::WindowedSpend { columns } => format!("windowed_spend({})", list(columns)),
            FillStep::SumColumns {
                candidates,
                sources,
            } => format!("sum_columns({} = {})", candidates.join("|"), sources.join("+")),
            FillStep::InterpolateThenZero { columns } => {
                format!("interpolate_then_zero({})", list(columns))
            }
            FillStep::ZeroFill { columns } => format!("zero_fill({})", list(columns)),
            FillStep::Residual {
                target,
                total,
                minus,
            } => format!("residual({target} = {total} - {})", minus.join(" - ")),
        }
    }
}

pub fn default_policy(
    role: TableRole,
    sales: &SalesColumns,
    channels: &ChannelColumns,
) -> Vec<FillStep> {
    match role {
        TableRole::Macro => vec![
            FillStep::RollingMean {
                columns: Vec::new(),
                window: 60,
                min_periods: 1,
            },
            FillStep::BackFill {
                columns: Vec::new(),
            },
        ],
        TableRole::Promotion => vec![FillStep::SeasonalFlag {
            column: channels.promo_flag.clone(),
        }],
        TableRole::Marketing => vec![
            FillStep::CampaignLabel {
                candidates: channels.campaign_label.clone(),
                spend: channels.spend_channels.clone(),
            },
            FillStep::WindowedSpend {
                columns: channels.spend_channels.clone(),
            },
            FillStep::SumColumns {
                candidates: channels.spend_total.clone(),
                sources: channels.spend_channels.clone(),
            },
        ],
        TableRole::Sales => vec![
            FillStep::ForwardBackFill {
                columns: vec![sales.unit_price.clone(), sales.unit_cost.clone()],
            },
            FillStep::InterpolateThenZero {
                columns: vec![sales.total_units.clone()],
            },
            FillStep::ZeroFill {
                columns: vec![sales.paid_promo_units.clone(), sales.bonus_promo_units.clone()],
            },
            FillStep::Residual {
                target: sales.normal_units.clone(),
                total: sales.total_units.clone(),
                minus: vec![sales.paid_promo_units.clone(), sales.bonus_promo_units.clone()],
            },
        ],
        TableRole::Other => Vec::new(),
    }
}

/// The fill plan of `table`: the configured override, or its role default.
pub fn policy_for(config: &Config, table: &str) -> Vec<FillStep> {
    config
        .preprocessing
        .imputation
        .get(table)
        .cloned()
        .unwrap_or_else(|| {
            default_policy(
                config.role_of(table),
                &config.financial_health.columns,
                &config.preprocessing.columns,
            )
        })
}

pub struct FillContext<'a> {
    pub date_column: &'a str,
    pub calendar: &'a BusinessCalendar,
}

/// Applies `steps` in order; returns the number of cells filled.
pub fn apply_policy(frame: &mut Frame, steps: &[FillStep], ctx: &FillContext<'_>) -> Result<usize> {
    let before = frame.total_nulls();
    for step in steps {
        apply_step(frame, step, ctx)?;
        debug!("Applied {}", step.describe());
    }
    Ok(before.saturating_sub(frame.total_nulls()))
}

pub fn apply_step(frame: &mut Frame, step: &FillStep, ctx: &FillContext<'_>) -> Result<()> {
    match step {
        FillStep::RollingMean {
            columns,
            window,
            min_periods,
        } => map_numeric(frame, columns, ctx, |v| {
            rolling_mean_fill(v, *window, *min_periods)
        }),
        FillStep::BackFill { columns } => map_numeric(frame, columns, ctx, back_fill),
        FillStep::ForwardBackFill { columns } => {
            map_numeric(frame, columns, ctx, |v| back_fill(forward_fill(v)))
        }
        FillStep::InterpolateThenZero { columns } => map_numeric(frame, columns, ctx, |v| {
            zero_fill(interpolate_linear(&v, false))
        }),
        FillStep::ZeroFill { columns } => map_numeric(frame, columns, ctx, zero_fill),
        FillStep::SeasonalFlag { column } => seasonal_flag(frame, column, ctx),
        FillStep::CampaignLabel { candidates, spend } => {
            campaign_label(frame, candidates, spend, ctx)
        }
        FillStep::WindowedSpend { columns } => windowed_spend(frame, columns, ctx),
        FillStep::SumColumns {
            candidates,
            sources,
        } => sum_columns(frame, candidates, sources),
        FillStep::Residual {
            target,
            total,
            minus,
        } => residual(frame, target, total, minus),
    }
}

/// Rewrites the selected numeric columns through `fill`. Columns that only
/// gain values keep their original cells where present.
fn map_numeric(
    frame: &mut Frame,
    columns: &[String],
    ctx: &FillContext<'_>,
    fill: impl Fn(Vec<Option<f64>>) -> Vec<Option<f64>>,
) -> Result<()> {
    let selected = if columns.is_empty() {
        frame
            .numeric_column_names()
            .into_iter()
            .filter(|name| name != ctx.date_column)
            .collect()
    } else {
        columns.to_vec()
    };
    for name in selected {
        let Some(column) = frame.column(&name) else {
            continue;
        };
        if column.null_count() == 0 {
            continue;
        }
        let original = column.values.clone();
        let filled = fill(column.numeric());
        let merged = original
            .into_iter()
            .zip(filled)
            .map(|(old, new)| old.or_else(|| new.map(Value::Float)))
            .collect();
        frame.push_column(Column::new(name, merged))?;
    }
    Ok(())
}

fn dates_of(frame: &Frame, ctx: &FillContext<'_>) -> Result<Vec<Option<NaiveDate>>> {
    frame
        .dates(ctx.date_column)
        .ok_or_else(|| anyhow!("Date column '{}' not found", ctx.date_column))
}

pub fn forward_fill(values: Vec<Option<f64>>) -> Vec<Option<f64>> {
    let mut last = None;
    values
        .into_iter()
        .map(|v| {
            if v.is_some() {
                last = v;
            }
            last
        })
        .collect()
}

pub fn back_fill(values: Vec<Option<f64>>) -> Vec<Option<f64>> {
    let mut next = None;
    let mut filled = values
        .into_iter()
        .rev()
        .map(|v| {
            if v.is_some() {
                next = v;
            }
            next
        })
        .collect::<Vec<_>>();
    filled.reverse();
    filled
}

pub fn zero_fill(values: Vec<Option<f64>>) -> Vec<Option<f64>> {
    values.into_iter().map(|v| Some(v.unwrap_or(0.0))).collect()
}

/// Linear interpolation by position between known neighbours. Leading gaps
/// stay missing; trailing gaps hold the last known value when
/// `hold_trailing` is set.
pub fn interpolate_linear(values: &[Option<f64>], hold_trailing: bool) -> Vec<Option<f64>> {
    let mut out = values.to_vec();
    let known = values
        .iter()
        .enumerate()
        .filter_map(|(idx, v)| v.map(|v| (idx, v)))
        .collect::<Vec<_>>();
    for pair in known.windows(2) {
        let ((start, from), (end, to)) = (pair[0], pair[1]);
        let span = (end - start) as f64;
        for (idx, slot) in out.iter_mut().enumerate().take(end).skip(start + 1) {
            let t = (idx - start) as f64 / span;
            *slot = Some(from + (to - from) * t);
        }
    }
    if hold_trailing && let Some(&(last_idx, last)) = known.last() {
        for slot in out.iter_mut().skip(last_idx + 1) {
            *slot = Some(last);
        }
    }
    out
}

/// Fills each gap with the mean of the observed values in the `window`
/// positions before it. Earlier fills never feed later means.
pub fn rolling_mean_fill(
    values: Vec<Option<f64>>,
    window: usize,
    min_periods: usize,
) -> Vec<Option<f64>> {
    let window = window.max(1);
    let min_periods = min_periods.max(1);
    values
        .iter()
        .enumerate()
        .map(|(idx, value)| {
            value.or_else(|| {
                let from = idx.saturating_sub(window);
                let (sum, count) = values[from..idx]
                    .iter()
                    .flatten()
                    .fold((0.0, 0usize), |(sum, count), v| (sum + v, count + 1));
                (count >= min_periods).then(|| sum / count as f64)
            })
        })
        .collect()
}

fn seasonal_flag(frame: &mut Frame, column: &str, ctx: &FillContext<'_>) -> Result<()> {
    let Some(flags) = frame.numeric(column) else {
        return Ok(());
    };
    let dates = dates_of(frame, ctx)?;
    let promo_months = ctx.calendar.promo_months();
    let filled = flags
        .into_iter()
        .zip(&dates)
        .map(|(flag, date)| {
            flag.or_else(|| {
                let active = date.is_some_and(|d| promo_months.contains(&d.month()));
                Some(if active { 1.0 } else { 0.0 })
            })
        })
        .collect();
    frame.set_numeric(column, filled)
}

fn campaign_label(
    frame: &mut Frame,
    candidates: &[String],
    spend: &[String],
    ctx: &FillContext<'_>,
) -> Result<()> {
    let Some(target) = candidates.iter().find(|c| frame.has_column(c)).cloned() else {
        return Ok(());
    };
    let dates = dates_of(frame, ctx)?;
    let spend_series = spend
        .iter()
        .filter_map(|name| frame.numeric(name))
        .collect::<Vec<_>>();
    let Some(column) = frame.column_mut(&target) else {
        return Ok(());
    };
    for (row, cell) in column.values.iter_mut().enumerate() {
        if cell.is_some() {
            continue;
        }
        let has_spend = spend_series
            .iter()
            .any(|series| series[row].unwrap_or(0.0) > 0.0);
        let season = dates[row].filter(|_| has_spend).and_then(|date| {
            ctx.calendar
                .campaign_seasons
                .iter()
                .find(|s| s.label_months.contains(&date.month()))
        });
        let label = season
            .map(|s| s.label.clone())
            .unwrap_or_else(|| ctx.calendar.no_campaign_label.clone());
        *cell = Some(Value::Text(label));
    }
    Ok(())
}

fn windowed_spend(frame: &mut Frame, columns: &[String], ctx: &FillContext<'_>) -> Result<()> {
    let dates = dates_of(frame, ctx)?;
    for name in columns {
        let Some(values) = frame.numeric(name) else {
            continue;
        };
        let interpolated = interpolate_linear(&values, true);
        let filled = values
            .iter()
            .zip(interpolated)
            .zip(&dates)
            .map(|((value, interp), date)| {
                value.or_else(|| {
                    let in_window = date.is_some_and(|d| ctx.calendar.in_active_window(d));
                    if in_window {
                        Some(interp.unwrap_or(0.0))
                    } else {
                        Some(0.0)
                    }
                })
            })
            .collect();
        frame.set_numeric(name, filled)?;
    }
    Ok(())
}

fn sum_columns(frame: &mut Frame, candidates: &[String], sources: &[String]) -> Result<()> {
    let Some(target) = candidates.iter().find(|c| frame.has_column(c)).cloned() else {
        return Ok(());
    };
    let Some(series) = sources
        .iter()
        .map(|name| frame.numeric(name))
        .collect::<Option<Vec<_>>>()
    else {
        return Ok(());
    };
    let totals = (0..frame.height())
        .map(|row| series.iter().map(|s| s[row]).sum::<Option<f64>>())
        .collect();
    frame.set_numeric(&target, totals)
}

fn residual(frame: &mut Frame, target: &str, total: &str, minus: &[String]) -> Result<()> {
    let Some(current) = frame.numeric(target) else {
        return Ok(());
    };
    let Some(totals) = frame.numeric(total) else {
        return Ok(());
    };
    let Some(parts) = minus
        .iter()
        .map(|name| frame.numeric(name))
        .collect::<Option<Vec<_>>>()
    else {
        return Ok(());
    };
    let filled = current
        .into_iter()
        .enumerate()
        .map(|(row, value)| {
            value.or_else(|| {
                let subtracted = parts.iter().map(|p| p[row]).sum::<Option<f64>>()?;
                Some((totals[row]? - subtracted).max(0.0))
            })
        })
        .collect();
    frame.set_numeric(target, filled)
}

/// Recomputes cost, revenue and profit for the rows flagged in `imputed`
/// from the (imputed) quantities and unit prices. Returns the number of
/// rows rewritten; zero when a required column is absent.
pub fn recalculate_financials(
    frame: &mut Frame,
    imputed: &[bool],
    columns: &SalesColumns,
) -> Result<usize> {
    let required = [
        &columns.total_units,
        &columns.unit_cost,
        &columns.normal_units,
        &columns.paid_promo_units,
        &columns.unit_price,
    ];
    let Some(inputs) = required
        .iter()
        .map(|name| frame.numeric(name))
        .collect::<Option<Vec<_>>>()
    else {
        return Ok(0);
    };
    let (total, unit_cost, normal, paid, price) =
        (&inputs[0], &inputs[1], &inputs[2], &inputs[3], &inputs[4]);
    let height = frame.height();
    let existing = |name: &str| frame.numeric(name).unwrap_or_else(|| vec![None; height]);
    let mut cost = existing(&columns.total_cost);
    let mut revenue = existing(&columns.total_revenue);
    let mut profit = existing(&columns.profit);

    let mut rewritten = 0;
    for row in (0..height).filter(|&row| imputed.get(row).copied().unwrap_or(false)) {
        let row_cost = total[row].zip(unit_cost[row]).map(|(q, c)| q * c);
        let row_revenue = normal[row]
            .zip(paid[row])
            .zip(price[row])
            .map(|((n, p), unit)| (n + p) * unit);
        cost[row] = row_cost;
        revenue[row] = row_revenue;
        profit[row] = row_revenue.zip(row_cost).map(|(r, c)| r - c);
        rewritten += 1;
    }
    frame.set_numeric(&columns.total_cost, cost)?;
    frame.set_numeric(&columns.total_revenue, revenue)?;
    frame.set_numeric(&columns.profit, profit)?;
    Ok(rewritten)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn daily_frame(start: NaiveDate, columns: Vec<Column>) -> Frame {
        let height = columns.first().map(Column::len).unwrap_or(0);
        let dates = (0..height)
            .map(|i| Some(Value::Date(start + chrono::Duration::days(i as i64))))
            .collect();
        let mut all = vec![Column::new("fecha", dates)];
        all.extend(columns);
        Frame::from_columns(all).unwrap()
    }

    fn ctx(calendar: &BusinessCalendar) -> FillContext<'_> {
        FillContext {
            date_column: "fecha",
            calendar,
        }
    }

    #[test]
    fn interpolation_leaves_leading_gaps_and_optionally_holds_trailing() {
        let values = vec![None, Some(1.0), None, None, Some(4.0), None];
        assert_eq!(
            interpolate_linear(&values, false),
            vec![None, Some(1.0), Some(2.0), Some(3.0), Some(4.0), None]
        );
        assert_eq!(interpolate_linear(&values, true)[5], Some(4.0));
    }

    #[test]
    fn rolling_mean_uses_preceding_window_only() {
        let filled = rolling_mean_fill(vec![Some(2.0), Some(4.0), None, None], 2, 1);
        assert_eq!(filled, vec![Some(2.0), Some(4.0), Some(3.0), Some(4.0)]);
        assert_eq!(rolling_mean_fill(vec![None, Some(1.0)], 60, 1)[0], None);
    }

    #[test]
    fn rolling_mean_ignores_its_own_fills() {
        let filled = rolling_mean_fill(vec![Some(6.0), None, None, None, Some(1.0), None], 2, 1);
        assert_eq!(
            filled,
            vec![Some(6.0), Some(6.0), Some(6.0), None, Some(1.0), Some(1.0)]
        );
    }

    #[test]
    fn macro_policy_leaves_no_gaps() {
        let calendar = BusinessCalendar::default();
        let mut frame = daily_frame(
            date(2023, 1, 1),
            vec![Column::from_f64("ipc", vec![None, None, Some(3.0), None, Some(6.0), None])],
        );
        let steps = default_policy(
            TableRole::Macro,
            &SalesColumns::default(),
            &ChannelColumns::default(),
        );
        let filled = apply_policy(&mut frame, &steps, &ctx(&calendar)).unwrap();
        assert_eq!(filled, 4);
        assert_eq!(
            frame.numeric("ipc").unwrap(),
            vec![Some(3.0), Some(3.0), Some(3.0), Some(3.0), Some(6.0), Some(4.5)]
        );
    }

    #[test]
    fn promo_flag_defaults_by_season_month() {
        let calendar = BusinessCalendar::default();
        let frame_dates = vec![
            Some(Value::Date(date(2023, 4, 10))),
            Some(Value::Date(date(2023, 6, 10))),
            Some(Value::Date(date(2023, 9, 1))),
        ];
        let mut frame = Frame::from_columns(vec![
            Column::new("fecha", frame_dates),
            Column::from_f64("es_promo", vec![None, None, Some(0.0)]),
        ])
        .unwrap();
        apply_step(
            &mut frame,
            &FillStep::SeasonalFlag {
                column: "es_promo".into(),
            },
            &ctx(&calendar),
        )
        .unwrap();
        assert_eq!(
            frame.numeric("es_promo").unwrap(),
            vec![Some(1.0), Some(0.0), Some(0.0)]
        );
    }

    #[test]
    fn marketing_policy_labels_and_fills_spend() {
        let calendar = BusinessCalendar::default();
        // 2023-04-01 .. 2023-04-04 sits inside the spring window.
        let mut frame = daily_frame(
            date(2023, 4, 1),
            vec![
                Column::new("ciclo", vec![None, None, None, None]),
                Column::from_f64("inversion_facebook", vec![Some(10.0), None, Some(30.0), None]),
                Column::from_f64("inversion_instagram", vec![Some(0.0), Some(0.0), None, Some(1.0)]),
                Column::from_f64("inversion_marketing_total", vec![None; 4]),
            ],
        );
        let steps = default_policy(
            TableRole::Marketing,
            &SalesColumns::default(),
            &ChannelColumns::default(),
        );
        apply_policy(&mut frame, &steps, &ctx(&calendar)).unwrap();
        assert_eq!(
            frame.cell(0, "ciclo"),
            Some(&Value::Text("Ciclo Abr-May".into()))
        );
        assert_eq!(
            frame.cell(1, "ciclo"),
            Some(&Value::Text("Sin Campaña".into()))
        );
        assert_eq!(
            frame.numeric("inversion_facebook").unwrap(),
            vec![Some(10.0), Some(20.0), Some(30.0), Some(30.0)]
        );
        assert_eq!(
            frame.numeric("inversion_marketing_total").unwrap(),
            vec![Some(10.0), Some(20.0), Some(30.5), Some(31.0)]
        );
    }

    #[test]
    fn spend_outside_window_defaults_to_zero() {
        let calendar = BusinessCalendar::default();
        let mut frame = daily_frame(
            date(2023, 7, 1),
            vec![Column::from_f64("inversion_facebook", vec![Some(5.0), None, Some(5.0)])],
        );
        apply_step(
            &mut frame,
            &FillStep::WindowedSpend {
                columns: vec!["inversion_facebook".into()],
            },
            &ctx(&calendar),
        )
        .unwrap();
        assert_eq!(
            frame.numeric("inversion_facebook").unwrap(),
            vec![Some(5.0), Some(0.0), Some(5.0)]
        );
    }

    #[test]
    fn sales_policy_derives_residual_units() {
        let calendar = BusinessCalendar::default();
        let mut frame = daily_frame(
            date(2023, 1, 1),
            vec![
                Column::from_f64("total_unidades_entregadas", vec![None, Some(10.0), None, Some(30.0), None]),
                Column::from_f64("unidades_promo_pagadas", vec![Some(1.0), None, Some(2.0), Some(2.0), None]),
                Column::from_f64("unidades_promo_bonificadas", vec![Some(1.0), None, Some(2.0), Some(2.0), None]),
                Column::from_f64("unidades_precio_normal", vec![None, Some(10.0), None, Some(26.0), None]),
                Column::from_f64("precio_unitario_full", vec![None, Some(5.0), None, Some(6.0), None]),
            ],
        );
        let steps = default_policy(
            TableRole::Sales,
            &SalesColumns::default(),
            &ChannelColumns::default(),
        );
        apply_policy(&mut frame, &steps, &ctx(&calendar)).unwrap();
        assert_eq!(
            frame.numeric("total_unidades_entregadas").unwrap(),
            vec![Some(0.0), Some(10.0), Some(20.0), Some(30.0), Some(0.0)]
        );
        assert_eq!(
            frame.numeric("unidades_precio_normal").unwrap(),
            vec![Some(0.0), Some(10.0), Some(16.0), Some(26.0), Some(0.0)]
        );
        assert_eq!(
            frame.numeric("precio_unitario_full").unwrap(),
            vec![Some(5.0), Some(5.0), Some(5.0), Some(6.0), Some(6.0)]
        );
    }

    #[test]
    fn recalculation_only_touches_imputed_rows() {
        let mut frame = Frame::from_columns(vec![
            Column::from_f64("total_unidades_entregadas", vec![Some(10.0), Some(4.0)]),
            Column::from_f64("costo_unitario", vec![Some(2.0), Some(2.0)]),
            Column::from_f64("unidades_precio_normal", vec![Some(8.0), Some(4.0)]),
            Column::from_f64("unidades_promo_pagadas", vec![Some(1.0), Some(0.0)]),
            Column::from_f64("precio_unitario_full", vec![Some(3.0), Some(3.0)]),
            Column::from_f64("costo_total", vec![Some(99.0), None]),
        ])
        .unwrap();
        let rewritten =
            recalculate_financials(&mut frame, &[false, true], &SalesColumns::default()).unwrap();
        assert_eq!(rewritten, 1);
        assert_eq!(frame.numeric("costo_total").unwrap(), vec![Some(99.0), Some(8.0)]);
        assert_eq!(frame.numeric("ingresos_totales").unwrap(), vec![None, Some(12.0)]);
        assert_eq!(frame.numeric("utilidad").unwrap(), vec![None, Some(4.0)]);
    }

    #[test]
    fn policy_steps_deserialize_from_yaml() {
        let raw = r#"
- op: rolling_mean
  window: 12
- op: zero_fill
  columns: [a]
"#;
        let steps: Vec<FillStep> = serde_yaml::from_str(raw).unwrap();
        assert_eq!(
            steps[0],
            FillStep::RollingMean {
                columns: Vec::new(),
                window: 12,
                min_periods: 1
            }
        );
        assert_eq!(steps[1].describe(), "zero_fill(a)");
    }
}
