//! SVG rendering of chart specs via askama templates.
//!
//! All geometry is computed here; the templates only lay out precomputed
//! coordinates.

use askama::Template;

use super::{BarChart, ScatterChart};
use crate::detect::AnomalyFlag;

const MARGIN_LEFT: f64 = 70.0;
const MARGIN_RIGHT: f64 = 20.0;
const MARGIN_TOP: f64 = 50.0;
const MIN_WIDTH: f64 = 640.0;
const BAR_SLOT: f64 = 36.0;
const Y_TICKS: usize = 4;

struct BarView {
    x: f64,
    y: f64,
    width: f64,
    height: f64,
    center_x: f64,
    count_y: f64,
    count: usize,
    label: String,
}

struct TickView {
    pos: f64,
    label: String,
}

struct PointView {
    cx: f64,
    cy: f64,
    color: &'static str,
}

struct LegendView {
    y: f64,
    color: &'static str,
    label: &'static str,
}

#[derive(Template)]
#[template(path = "bar_chart.svg", escape = "html")]
struct BarChartSvg<'a> {
    title: &'a str,
    x_label: &'a str,
    y_label: &'a str,
    width: f64,
    height: f64,
    plot_left: f64,
    plot_right: f64,
    plot_top: f64,
    plot_bottom: f64,
    tick_label_y: f64,
    rotation: i32,
    anchor: &'static str,
    bars: Vec<BarView>,
    y_ticks: Vec<TickView>,
}

#[derive(Template)]
#[template(path = "scatter_chart.svg", escape = "html")]
struct ScatterChartSvg<'a> {
    title: &'a str,
    x_label: &'a str,
    y_label: &'a str,
    width: f64,
    height: f64,
    plot_left: f64,
    plot_right: f64,
    plot_top: f64,
    plot_bottom: f64,
    tick_label_y: f64,
    points: Vec<PointView>,
    x_ticks: Vec<TickView>,
    y_ticks: Vec<TickView>,
    legend_x: f64,
    legend: Vec<LegendView>,
}

/// Render a bar chart with a count annotation above each bar.
pub fn bar_chart(chart: &BarChart) -> askama::Result<String> {
    let rotated = chart.x_tick_rotation != 0;
    let margin_bottom = if rotated { 130.0 } else { 70.0 };
    let height = if rotated { 480.0 } else { 420.0 };
    let n = chart.bars.len();
    let width = (MARGIN_LEFT + MARGIN_RIGHT + n as f64 * BAR_SLOT).max(MIN_WIDTH);

    let plot_left = MARGIN_LEFT;
    let plot_right = width - MARGIN_RIGHT;
    let plot_top = MARGIN_TOP;
    let plot_bottom = height - margin_bottom;
    let plot_h = plot_bottom - plot_top;
    let slot = if n == 0 { 0.0 } else { (plot_right - plot_left) / n as f64 };
    let max = chart.bars.iter().map(|b| b.count).max().unwrap_or(0).max(1);

    let bars = chart
        .bars
        .iter()
        .enumerate()
        .map(|(i, bar)| {
            let h = bar.count as f64 / max as f64 * plot_h;
            let x = plot_left + i as f64 * slot + slot * 0.1;
            let y = plot_bottom - h;
            BarView {
                x: round1(x),
                y: round1(y),
                width: round1(slot * 0.8),
                height: round1(h),
                center_x: round1(x + slot * 0.4),
                count_y: round1(y - 4.0),
                count: bar.count,
                label: bar.label.clone(),
            }
        })
        .collect();

    BarChartSvg {
        title: &chart.title,
        x_label: &chart.x_label,
        y_label: &chart.y_label,
        width: round1(width),
        height,
        plot_left,
        plot_right: round1(plot_right),
        plot_top,
        plot_bottom,
        tick_label_y: plot_bottom + 16.0,
        rotation: chart.x_tick_rotation,
        anchor: if rotated { "end" } else { "middle" },
        bars,
        y_ticks: value_ticks(max as f64, plot_top, plot_bottom),
    }
    .render()
}

/// Render a timestamp/response-time scatter, one colour per anomaly flag.
pub fn scatter_chart(chart: &ScatterChart) -> askama::Result<String> {
    let width = 900.0;
    let height = 480.0;
    let plot_left = MARGIN_LEFT;
    let plot_right = width - 140.0;
    let plot_top = MARGIN_TOP;
    let plot_bottom = height - 70.0;

    let all = || chart.series.iter().flat_map(|s| s.points.iter());
    let t_min = all().map(|p| p.timestamp).min();
    let t_max = all().map(|p| p.timestamp).max();
    let y_max = all().map(|p| p.response_time).max().unwrap_or(0).max(1) as f64;

    let (t0, t1) = match (t_min, t_max) {
        (Some(lo), Some(hi)) => (lo.and_utc().timestamp() as f64, hi.and_utc().timestamp() as f64),
        _ => (0.0, 0.0),
    };
    let (t0, t1) = if t1 > t0 { (t0, t1) } else { (t0 - 1.0, t0 + 1.0) };
    let sx = |t: f64| plot_left + (t - t0) / (t1 - t0) * (plot_right - plot_left);
    let sy = |v: f64| plot_bottom - v / y_max * (plot_bottom - plot_top);

    let points = chart
        .series
        .iter()
        .flat_map(|s| {
            let color = flag_color(s.anomaly);
            s.points.iter().map(move |p| (color, p))
        })
        .map(|(color, p)| PointView {
            cx: round1(sx(p.timestamp.and_utc().timestamp() as f64)),
            cy: round1(sy(f64::from(p.response_time))),
            color,
        })
        .collect();

    let x_ticks = match (t_min, t_max) {
        (Some(lo), Some(hi)) => {
            let mid = lo + (hi - lo) / 2;
            let mut ticks = vec![lo, mid, hi];
            ticks.dedup();
            ticks
                .into_iter()
                .map(|t| TickView {
                    pos: round1(sx(t.and_utc().timestamp() as f64)),
                    label: t.format("%Y-%m-%d %H:%M").to_string(),
                })
                .collect()
        }
        _ => Vec::new(),
    };

    let legend = chart
        .series
        .iter()
        .enumerate()
        .map(|(i, s)| LegendView {
            y: plot_top + 10.0 + i as f64 * 20.0,
            color: flag_color(s.anomaly),
            label: s.anomaly.as_str(),
        })
        .collect();

    ScatterChartSvg {
        title: &chart.title,
        x_label: &chart.x_label,
        y_label: &chart.y_label,
        width,
        height,
        plot_left,
        plot_right,
        plot_top,
        plot_bottom,
        tick_label_y: plot_bottom + 16.0,
        points,
        x_ticks,
        y_ticks: value_ticks(y_max, plot_top, plot_bottom),
        legend_x: plot_right + 20.0,
        legend,
    }
    .render()
}

fn flag_color(flag: AnomalyFlag) -> &'static str {
    match flag {
        AnomalyFlag::Inlier => "#1f77b4",
        AnomalyFlag::Outlier => "#d62728",
    }
}

fn value_ticks(max: f64, top: f64, bottom: f64) -> Vec<TickView> {
    (0..=Y_TICKS)
        .map(|i| {
            let frac = i as f64 / Y_TICKS as f64;
            TickView {
                pos: round1(bottom - frac * (bottom - top)),
                label: format!("{}", (max * frac).round()),
            }
        })
        .collect()
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}
