//! Static SVG charts rendered with maud.
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use itertools_num::linspace;
use maud::{html, Markup};

const WIDTH: f64 = 720.0;
const LABEL_WIDTH: f64 = 200.0;
const BAR_HEIGHT: f64 = 22.0;
const BAR_GAP: f64 = 6.0;
const TOP: f64 = 48.0;
const AXIS_HEIGHT: f64 = 40.0;
const RIGHT_PAD: f64 = 60.0;

/// Horizontal bar chart, bars in the given order from the top.
pub fn bar_chart(title: &str, x_label: &str, bars: &[(String, f64)]) -> Markup {
    let plot_width = WIDTH - LABEL_WIDTH - RIGHT_PAD;
    let height = TOP + bars.len() as f64 * (BAR_HEIGHT + BAR_GAP) + AXIS_HEIGHT;
    let max_value = bars
        .iter()
        .map(|(_, v)| *v)
        .fold(0.0f64, f64::max)
        .max(f64::MIN_POSITIVE);
    let scale = |v: f64| v.max(0.0) / max_value * plot_width;
    let axis_y = TOP + bars.len() as f64 * (BAR_HEIGHT + BAR_GAP);
    let ticks: Vec<f64> = linspace(0.0, max_value, 5).collect();

    html! {
        svg xmlns="http://www.w3.org/2000/svg" width=(WIDTH) height=(height)
            viewBox=(format!("0 0 {} {}", WIDTH, height)) font-family="sans-serif" {
            rect x="0" y="0" width=(WIDTH) height=(height) fill="white" {}
            text x=(WIDTH / 2.0) y="24" text-anchor="middle" font-size="16" { (title) }
            @for (i, (name, value)) in bars.iter().enumerate() {
                @let y = TOP + i as f64 * (BAR_HEIGHT + BAR_GAP);
                text x=(LABEL_WIDTH - 8.0) y=(y + BAR_HEIGHT * 0.7) text-anchor="end" font-size="12" { (name) }
                rect x=(LABEL_WIDTH) y=(y) width=(scale(*value)) height=(BAR_HEIGHT) fill="#1e88e5" {}
                text x=(LABEL_WIDTH + scale(*value) + 4.0) y=(y + BAR_HEIGHT * 0.7) font-size="11" fill="#555" {
                    (format!("{:.3}", value))
                }
            }
            line x1=(LABEL_WIDTH) y1=(axis_y) x2=(LABEL_WIDTH + plot_width) y2=(axis_y) stroke="#333" {}
            @for tick in &ticks {
                @let x = LABEL_WIDTH + scale(*tick);
                line x1=(x) y1=(axis_y) x2=(x) y2=(axis_y + 4.0) stroke="#333" {}
                text x=(x) y=(axis_y + 16.0) text-anchor="middle" font-size="10" { (format!("{:.2}", tick)) }
            }
            text x=(LABEL_WIDTH + plot_width / 2.0) y=(axis_y + 34.0) text-anchor="middle" font-size="12" { (x_label) }
        }
    }
}

/// Write the global attribution summary as a static SVG image.
pub fn write_importance_svg<P: AsRef<Path>>(summary: &[(String, f64)], path: P) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    let svg = bar_chart("Global feature importance", "mean(|SHAP value|)", summary);
    fs::write(path, svg.into_string()).with_context(|| format!("Failed to write {}", path.display()))?;
    log::info!("attribution summary saved to {}", path.display());
    Ok(())
}
