use super::ui;
use crate::core::aggregate::round_dp;
use crate::core::{CycleReport, FundMonitor, HistoryEntry, HoldingDetail};
use anyhow::Result;
use comfy_table::Cell;

/// Number of history rows shown under a cycle.
const HISTORY_ROWS: usize = 10;

impl CycleReport {
    pub fn display_as_table(&self, fund_name: &str, total_weight_ratio: f64) -> String {
        let mut table = ui::new_styled_table();
        table.set_header(vec![
            ui::header_cell("Code"),
            ui::header_cell("Name"),
            ui::header_cell("Weight (%)"),
            ui::header_cell("Last"),
            ui::header_cell("Open"),
            ui::header_cell("High"),
            ui::header_cell("Low"),
            ui::header_cell("Prev Close"),
            ui::header_cell("Change (%)"),
            ui::header_cell("Weighted (%)"),
        ]);

        for detail in &self.details {
            let failed = detail.error.is_some();
            let price = |value: f64| {
                if failed {
                    ui::na_cell(true)
                } else {
                    ui::number_cell(format!("{value:.2}"))
                }
            };
            let (change, weighted) = if failed {
                (ui::na_cell(true), ui::na_cell(true))
            } else {
                (
                    ui::change_cell(detail.change_pct, 2),
                    ui::change_cell(detail.weighted_change_pct, 4),
                )
            };

            table.add_row(vec![
                Cell::new(&detail.code),
                Cell::new(&detail.name),
                ui::number_cell(format!("{:.2}", detail.weight * 100.0)),
                price(detail.last_price),
                price(detail.open),
                price(detail.high),
                price(detail.low),
                price(detail.previous_close),
                change,
                weighted,
            ]);
        }

        let metrics = &self.metrics;
        let mut output = format!(
            "Fund: {}  {}\n\n",
            ui::style_text(fund_name, ui::StyleType::Title),
            ui::style_text(
                &self.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
                ui::StyleType::Subtle
            )
        );
        output.push_str(&format!(
            "{} {}   {} {}   {} {}\n\n",
            ui::style_text("Fund change:", ui::StyleType::Label),
            ui::style_signed(
                metrics.fund_change_pct,
                &format!("{:.2}%", metrics.fund_change_pct)
            ),
            ui::style_text("Today's earnings:", ui::StyleType::Label),
            ui::style_signed(metrics.real_earnings, &format!("{:.2}", metrics.real_earnings)),
            ui::style_text("Hold earnings:", ui::StyleType::Label),
            ui::style_signed(metrics.hold_earnings, &format!("{:.2}", metrics.hold_earnings)),
        ));
        output.push_str(&table.to_string());

        output.push_str(&format!(
            "\n{}",
            ui::style_text(
                &check_line(&self.details, total_weight_ratio),
                ui::StyleType::Subtle
            )
        ));

        for diagnostic in &self.diagnostics {
            output.push_str(&format!(
                "\n{}",
                ui::style_text(
                    &format!(
                        "Quote for {} ({}) unavailable: {}",
                        diagnostic.name, diagnostic.code, diagnostic.message
                    ),
                    ui::StyleType::Warning
                )
            ));
        }

        output
    }
}

/// Sum of the displayed per-holding figures and the fund change implied by
/// it, to compare against the reported fund change.
fn check_line(details: &[HoldingDetail], total_weight_ratio: f64) -> String {
    let displayed_sum: f64 = details.iter().map(|d| d.weighted_change_pct).sum();
    let implied_change = round_dp(displayed_sum / (total_weight_ratio * 100.0) * 100.0, 2);
    format!(
        "Weighted sum: {:.4}% | Covered weight: {:.2}% | Implied fund change: {:.2}%",
        displayed_sum,
        total_weight_ratio * 100.0,
        implied_change
    )
}

/// Renders the most recent history entries, newest last.
pub fn display_history(history: &[HistoryEntry]) -> String {
    if history.len() < 2 {
        return ui::style_text("Waiting for more samples to show a trend...", ui::StyleType::Subtle);
    }

    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Time"),
        ui::header_cell("Fund Change (%)"),
        ui::header_cell("Earnings"),
    ]);
    let start = history.len().saturating_sub(HISTORY_ROWS);
    for entry in &history[start..] {
        table.add_row(vec![
            Cell::new(entry.timestamp.format("%H:%M:%S").to_string()),
            ui::change_cell(entry.fund_change_pct, 2),
            ui::number_cell(format!("{:.2}", entry.real_earnings)),
        ]);
    }

    format!(
        "{} ({} of {} samples)\n{}",
        ui::style_text("Recent history", ui::StyleType::Label),
        history.len() - start,
        history.len(),
        table
    )
}

/// Runs a single refresh cycle and prints it.
pub async fn run(monitor: &FundMonitor) -> Result<()> {
    let config = monitor.config();
    let pb = ui::new_progress_bar(config.fund.holdings.len() as u64, true);
    pb.set_message("Fetching quotes...");
    let report = monitor.run_cycle(&|| pb.inc(1)).await;
    pb.finish_and_clear();

    println!(
        "{}",
        report.display_as_table(&config.fund.name, config.fund.total_weight_ratio)
    );
    Ok(())
}
