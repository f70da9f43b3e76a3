use std::collections::BTreeMap;
use std::fmt::Write;

use common::models::SignalAction;

use crate::controller::{SignalState, UiState};

/// What the main panel shows. A refresh in progress does not hide data or an
/// error that is already on screen; see `ViewState::refreshing`.
#[derive(Debug, Clone, PartialEq)]
pub enum Status {
    Idle,
    Loading,
    Error(String),
    Data,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    Bullish,
    Bearish,
    Neutral,
}

impl Tone {
    fn of(action: Option<&SignalAction>) -> Self {
        match action {
            Some(a) if a.is_bullish() => Self::Bullish,
            Some(a) if a.is_bearish() => Self::Bearish,
            _ => Self::Neutral,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChartSummary {
    pub points: usize,
    pub first: f64,
    pub last: f64,
    pub min: f64,
    pub max: f64,
    pub latest_indicators: BTreeMap<String, f64>,
}

impl ChartSummary {
    pub fn change_pct(&self) -> Option<f64> {
        (self.first != 0.0).then(|| (self.last - self.first) / self.first * 100.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ViewState {
    pub status: Status,
    pub refreshing: bool,
    pub polling: bool,
    pub headline: Option<String>,
    pub tone: Tone,
    pub levels: Vec<(&'static str, f64)>,
    pub reason: Option<String>,
    pub chart: Option<ChartSummary>,
    pub portfolio: Option<String>,
    pub notice: Option<String>,
}

impl ViewState {
    pub fn derive(state: &UiState) -> Self {
        let status = match &state.latest {
            SignalState::Failed(err) => Status::Error(err.to_string()),
            SignalState::Ready(_) => Status::Data,
            SignalState::Pending => Status::Loading,
            SignalState::Empty if state.is_loading() => Status::Loading,
            SignalState::Empty => Status::Idle,
        };

        let report = state.latest.report();
        let action = report.and_then(|r| r.action.as_ref());

        let headline = state.query.as_ref().map(|query| match action {
            Some(action) => format!("{} — {}", query, action),
            None => query.to_string(),
        });

        let levels = report
            .map(|r| {
                [
                    ("Price", r.price),
                    ("Stop loss", r.stop_loss),
                    ("Take profit", r.take_profit),
                    ("Risk %", r.risk_percent),
                    ("Greed %", r.greed_percent),
                    ("RSI", r.rsi),
                    ("Risk/reward", r.risk_reward),
                ]
                .into_iter()
                .filter_map(|(label, value)| value.map(|v| (label, v)))
                .collect()
            })
            .unwrap_or_default();

        Self {
            status,
            refreshing: state.is_loading(),
            polling: state.polling,
            headline,
            tone: Tone::of(action),
            levels,
            reason: report.and_then(|r| r.reason.clone()),
            chart: summarize(state),
            portfolio: state
                .portfolio
                .as_ref()
                .and_then(|p| serde_json::to_string_pretty(p).ok()),
            notice: state.notice.clone(),
        }
    }

    pub fn render_text(&self) -> String {
        let mut out = String::new();

        let marker = match self.tone {
            Tone::Bullish => "▲",
            Tone::Bearish => "▼",
            Tone::Neutral => "•",
        };
        let headline = self.headline.as_deref().unwrap_or("No symbol selected");
        let _ = write!(out, "{} {}", marker, headline);
        if self.polling {
            out.push_str(" [live]");
        }
        if self.refreshing {
            out.push_str(" (refreshing)");
        }
        out.push('\n');

        match &self.status {
            Status::Idle => out.push_str("Enter a symbol to load a signal.\n"),
            Status::Loading => out.push_str("Loading...\n"),
            Status::Error(msg) => {
                let _ = writeln!(out, "Error: {}", msg);
            }
            Status::Data => {
                for (label, value) in &self.levels {
                    let _ = writeln!(out, "  {:<12} {}", label, value);
                }
                if let Some(reason) = &self.reason {
                    let _ = writeln!(out, "  {}", reason);
                }
            }
        }

        if let Some(chart) = &self.chart {
            let _ = write!(
                out,
                "Chart: {} pts, {} -> {} (min {}, max {}",
                chart.points, chart.first, chart.last, chart.min, chart.max
            );
            if let Some(change) = chart.change_pct() {
                let _ = write!(out, ", {:+.2}%", change);
            }
            out.push_str(")\n");
            for (name, value) in &chart.latest_indicators {
                let _ = writeln!(out, "  {:<12} {:.2}", name, value);
            }
        }

        if let Some(portfolio) = &self.portfolio {
            let _ = writeln!(out, "Portfolio:\n{}", portfolio);
        }
        if let Some(notice) = &self.notice {
            let _ = writeln!(out, "! {}", notice);
        }
        out
    }
}

fn summarize(state: &UiState) -> Option<ChartSummary> {
    let latest = state.buffer.latest()?;
    let first = state.buffer.iter().next()?;
    let (min, max) = state
        .buffer
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), s| {
            (lo.min(s.price), hi.max(s.price))
        });

    Some(ChartSummary {
        points: state.buffer.len(),
        first: first.price,
        last: latest.price,
        min,
        max,
        latest_indicators: latest.indicators.clone(),
    })
}
