use super::ui;
use crate::core::{FundMonitor, IntradaySeries, QuoteSnapshot, SeriesView};
use anyhow::Result;
use comfy_table::Cell;

const MOVING_AVERAGE_WINDOW: usize = 5;
const SERIES_ROWS: usize = 15;

/// Renders the tail of an intraday series with its moving average and the
/// previous close as reference.
pub fn display_series(code: &str, view: &SeriesView, quote: Option<&QuoteSnapshot>) -> String {
    let series = &view.series;
    if series.is_empty() {
        let mut output = ui::style_text(
            &format!("No intraday data for {code} (market closed or fetch failed)"),
            ui::StyleType::Subtle,
        );
        if let Some(diagnostic) = &view.diagnostic {
            output.push_str(&format!(
                "\n{}",
                ui::style_text(diagnostic, ui::StyleType::Error)
            ));
        }
        return output;
    }

    let average = series.moving_average(MOVING_AVERAGE_WINDOW);
    // Each average sits on the middle row of its window
    let offset = IntradaySeries::centre_offset(MOVING_AVERAGE_WINDOW);

    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Time"),
        ui::header_cell("Price"),
        ui::header_cell(&format!("MA{MOVING_AVERAGE_WINDOW}")),
    ]);
    let start = series.len().saturating_sub(SERIES_ROWS);
    for i in start..series.len() {
        let ma = i
            .checked_sub(offset)
            .and_then(|j| average.prices().get(j))
            .map(|v| ui::number_cell(format!("{v:.2}")))
            .unwrap_or_else(|| ui::na_cell(false));
        table.add_row(vec![
            Cell::new(&series.times()[i]),
            ui::number_cell(format!("{:.2}", series.prices()[i])),
            ma,
        ]);
    }

    let mut output = format!(
        "{} {} points\n",
        ui::style_text(&format!("Intraday {code}:"), ui::StyleType::Title),
        series.len()
    );
    if let Some(prev) = quote.map(|q| q.previous_close).filter(|p| *p > 0.0) {
        output.push_str(&format!("Previous close: {prev:.2}\n"));
    }
    output.push_str(&table.to_string());
    if view.stale {
        output.push_str(&format!(
            "\n{}",
            ui::style_text("Showing last known data, refresh failed", ui::StyleType::Warning)
        ));
    }
    if let Some(diagnostic) = &view.diagnostic {
        output.push_str(&format!(
            "\n{}",
            ui::style_text(diagnostic, ui::StyleType::Error)
        ));
    }
    output
}

pub async fn run(monitor: &FundMonitor, code: &str) -> Result<()> {
    let view = monitor.get_series(code).await;
    let quote = monitor.quote(code).await;
    println!("{}", display_series(code, &view, quote.snapshot()));
    Ok(())
}
