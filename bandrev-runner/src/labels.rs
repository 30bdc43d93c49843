//! Display labels for the performance report.
//!
//! Report fields have stable, language-neutral ids. A `LabelMap` maps each id
//! to a display label; presets exist for English and Chinese, and any label
//! can be overridden from the config file.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

use crate::metrics::{HoldingSpan, PerformanceReport};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    En,
    Zh,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportField {
    CumulativeReturn,
    AnnualizedReturn,
    MaxDrawdown,
    DrawdownStart,
    DrawdownEnd,
    ReturnDrawdownRatio,
    TradeCount,
    WinCount,
    LossCount,
    WinRate,
    MeanTradeReturn,
    ProfitFactor,
    MaxTradeReturn,
    MinTradeReturn,
    MaxHolding,
    MinHolding,
    MeanHolding,
    MaxConsecutiveWins,
    MaxConsecutiveLosses,
    Liquidations,
    MonthlyReturns,
}

impl ReportField {
    /// Every field in report order.
    pub const ALL: [ReportField; 21] = [
        ReportField::CumulativeReturn,
        ReportField::AnnualizedReturn,
        ReportField::MaxDrawdown,
        ReportField::DrawdownStart,
        ReportField::DrawdownEnd,
        ReportField::ReturnDrawdownRatio,
        ReportField::TradeCount,
        ReportField::WinCount,
        ReportField::LossCount,
        ReportField::WinRate,
        ReportField::MeanTradeReturn,
        ReportField::ProfitFactor,
        ReportField::MaxTradeReturn,
        ReportField::MinTradeReturn,
        ReportField::MaxHolding,
        ReportField::MinHolding,
        ReportField::MeanHolding,
        ReportField::MaxConsecutiveWins,
        ReportField::MaxConsecutiveLosses,
        ReportField::Liquidations,
        ReportField::MonthlyReturns,
    ];

    pub fn key(self) -> &'static str {
        match self {
            ReportField::CumulativeReturn => "cumulative_return",
            ReportField::AnnualizedReturn => "annualized_return",
            ReportField::MaxDrawdown => "max_drawdown",
            ReportField::DrawdownStart => "drawdown_start",
            ReportField::DrawdownEnd => "drawdown_end",
            ReportField::ReturnDrawdownRatio => "return_drawdown_ratio",
            ReportField::TradeCount => "trade_count",
            ReportField::WinCount => "win_count",
            ReportField::LossCount => "loss_count",
            ReportField::WinRate => "win_rate",
            ReportField::MeanTradeReturn => "mean_trade_return",
            ReportField::ProfitFactor => "profit_factor",
            ReportField::MaxTradeReturn => "max_trade_return",
            ReportField::MinTradeReturn => "min_trade_return",
            ReportField::MaxHolding => "max_holding",
            ReportField::MinHolding => "min_holding",
            ReportField::MeanHolding => "mean_holding",
            ReportField::MaxConsecutiveWins => "max_consecutive_wins",
            ReportField::MaxConsecutiveLosses => "max_consecutive_losses",
            ReportField::Liquidations => "liquidations",
            ReportField::MonthlyReturns => "monthly_returns",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.key() == key)
    }

    fn english(self) -> &'static str {
        match self {
            ReportField::CumulativeReturn => "Cumulative net value",
            ReportField::AnnualizedReturn => "Annualized return",
            ReportField::MaxDrawdown => "Max drawdown",
            ReportField::DrawdownStart => "Max drawdown start",
            ReportField::DrawdownEnd => "Max drawdown end",
            ReportField::ReturnDrawdownRatio => "Return / drawdown",
            ReportField::TradeCount => "Trades",
            ReportField::WinCount => "Winning trades",
            ReportField::LossCount => "Losing trades",
            ReportField::WinRate => "Win rate",
            ReportField::MeanTradeReturn => "Mean trade return",
            ReportField::ProfitFactor => "Profit factor",
            ReportField::MaxTradeReturn => "Largest win",
            ReportField::MinTradeReturn => "Largest loss",
            ReportField::MaxHolding => "Longest holding",
            ReportField::MinHolding => "Shortest holding",
            ReportField::MeanHolding => "Mean holding",
            ReportField::MaxConsecutiveWins => "Max consecutive wins",
            ReportField::MaxConsecutiveLosses => "Max consecutive losses",
            ReportField::Liquidations => "Liquidations",
            ReportField::MonthlyReturns => "Monthly returns",
        }
    }

    fn chinese(self) -> &'static str {
        match self {
            ReportField::CumulativeReturn => "累积净值",
            ReportField::AnnualizedReturn => "年化收益",
            ReportField::MaxDrawdown => "最大回撤",
            ReportField::DrawdownStart => "最大回撤开始时间",
            ReportField::DrawdownEnd => "最大回撤结束时间",
            ReportField::ReturnDrawdownRatio => "年化收益/回撤比",
            ReportField::TradeCount => "交易笔数",
            ReportField::WinCount => "盈利笔数",
            ReportField::LossCount => "亏损笔数",
            ReportField::WinRate => "胜率",
            ReportField::MeanTradeReturn => "每笔交易平均盈亏",
            ReportField::ProfitFactor => "盈亏收益比",
            ReportField::MaxTradeReturn => "单笔最大盈利",
            ReportField::MinTradeReturn => "单笔最大亏损",
            ReportField::MaxHolding => "单笔最长持有时间",
            ReportField::MinHolding => "单笔最短持有时间",
            ReportField::MeanHolding => "平均持仓周期",
            ReportField::MaxConsecutiveWins => "最大连续盈利笔数",
            ReportField::MaxConsecutiveLosses => "最大连续亏损笔数",
            ReportField::Liquidations => "强平次数",
            ReportField::MonthlyReturns => "月度收益",
        }
    }
}

/// Field id → display label, plus the locale used for value formatting.
#[derive(Debug, Clone, PartialEq)]
pub struct LabelMap {
    locale: Locale,
    labels: BTreeMap<ReportField, String>,
}

impl Default for LabelMap {
    fn default() -> Self {
        Self::for_locale(Locale::En)
    }
}

impl LabelMap {
    pub fn for_locale(locale: Locale) -> Self {
        let labels = ReportField::ALL
            .into_iter()
            .map(|f| {
                let label = match locale {
                    Locale::En => f.english(),
                    Locale::Zh => f.chinese(),
                };
                (f, label.to_string())
            })
            .collect();
        Self { locale, labels }
    }

    /// Apply overrides keyed by field id. Fails on the first unknown id.
    pub fn with_overrides(mut self, overrides: &BTreeMap<String, String>) -> Result<Self, String> {
        for (key, label) in overrides {
            let field = ReportField::from_key(key).ok_or_else(|| key.clone())?;
            self.labels.insert(field, label.clone());
        }
        Ok(self)
    }

    pub fn label(&self, field: ReportField) -> &str {
        self.labels.get(&field).map(String::as_str).unwrap_or(field.key())
    }

    fn holding(&self, span: &HoldingSpan) -> String {
        match self.locale {
            Locale::En => format!("{}d {}h {}m", span.days, span.hours, span.minutes),
            Locale::Zh => format!("{} 天 {} 小时 {} 分钟", span.days, span.hours, span.minutes),
        }
    }
}

fn pct(value: f64) -> String {
    format!("{:.2}%", value * 100.0)
}

fn ratio(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{v:.2}"))
}

/// Formatted value of one scalar field; `None` for `MonthlyReturns`.
pub fn field_value(report: &PerformanceReport, field: ReportField, labels: &LabelMap) -> Option<String> {
    let value = match field {
        ReportField::CumulativeReturn => format!("{:.2}", report.cumulative_return),
        ReportField::AnnualizedReturn => pct(report.annualized_return),
        ReportField::MaxDrawdown => pct(report.max_drawdown),
        ReportField::DrawdownStart => report.drawdown_start.to_string(),
        ReportField::DrawdownEnd => report.drawdown_end.to_string(),
        ReportField::ReturnDrawdownRatio => ratio(report.return_drawdown_ratio),
        ReportField::TradeCount => report.trade_count.to_string(),
        ReportField::WinCount => report.win_count.to_string(),
        ReportField::LossCount => report.loss_count.to_string(),
        ReportField::WinRate => pct(report.win_rate),
        ReportField::MeanTradeReturn => pct(report.mean_trade_return),
        ReportField::ProfitFactor => ratio(report.profit_factor),
        ReportField::MaxTradeReturn => pct(report.max_trade_return),
        ReportField::MinTradeReturn => pct(report.min_trade_return),
        ReportField::MaxHolding => labels.holding(&report.holding.max),
        ReportField::MinHolding => labels.holding(&report.holding.min),
        ReportField::MeanHolding => labels.holding(&report.holding.mean),
        ReportField::MaxConsecutiveWins => report.max_consecutive_wins.to_string(),
        ReportField::MaxConsecutiveLosses => report.max_consecutive_losses.to_string(),
        ReportField::Liquidations => report.liquidations.to_string(),
        ReportField::MonthlyReturns => return None,
    };
    Some(value)
}

/// Render the report as aligned `label  value` lines followed by the monthly table.
pub fn render_report(report: &PerformanceReport, labels: &LabelMap) -> String {
    let rows: Vec<(&str, String)> = ReportField::ALL
        .into_iter()
        .filter_map(|f| field_value(report, f, labels).map(|v| (labels.label(f), v)))
        .collect();
    let width = rows.iter().map(|(l, _)| l.chars().count()).max().unwrap_or(0);

    let mut out = String::new();
    for (label, value) in &rows {
        let pad = width - label.chars().count();
        let _ = writeln!(out, "{label}{}  {value}", " ".repeat(pad));
    }

    let _ = writeln!(out, "\n{}", labels.label(ReportField::MonthlyReturns));
    for m in &report.monthly_returns {
        let _ = writeln!(out, "{:04}-{:02}  {}", m.year, m.month, pct(m.value));
    }
    out
}
