// Report and ReportSection come from the shared `report_builder` crate.
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use maud::{html, Markup};

pub use report_builder::Report;
pub use report_builder::ReportSection;

/// Two-column key/value table for `ReportSection::add_content`.
pub fn key_value_table(rows: &[(String, String)]) -> Markup {
    html! {
        table class="metrics" {
            @for (key, value) in rows {
                tr { th style="text-align: left; padding-right: 2em;" { (key) } td { (value) } }
            }
        }
    }
}

/// Write a report, creating its directory first.
pub fn write_report<P: AsRef<Path>>(report: &Report, path: P) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    let target = path.display().to_string();
    report
        .save_to_file(&target)
        .map_err(|e| anyhow::anyhow!("Failed to write report {}: {}", target, e))?;
    log::info!("report written to {}", target);
    Ok(())
}
