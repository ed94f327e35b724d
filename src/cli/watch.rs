use super::{cycle, series, ui};
use crate::core::FundMonitor;
use anyhow::Result;
use chrono::{DateTime, Local};
use std::time::Duration;
use tokio::time::{MissedTickBehavior, interval};
use tracing::info;

/// `None` when `now + refresh` is out of range for a timestamp.
fn next_refresh_label(now: DateTime<Local>, refresh: Duration) -> Option<String> {
    let next = chrono::Duration::from_std(refresh)
        .ok()
        .and_then(|delta| now.checked_add_signed(delta))?;
    Some(format!("Next refresh at {}", next.format("%H:%M:%S")))
}

/// Refreshes on the configured interval until interrupted, or until
/// `max_cycles` cycles have run. A tick that arrives while a cycle is still
/// running is skipped rather than queued.
pub async fn run(
    monitor: &FundMonitor,
    series_code: Option<&str>,
    max_cycles: Option<usize>,
) -> Result<()> {
    let config = monitor.config();
    let refresh = config.refresh_interval();
    let mut ticker = interval(refresh);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let term = console::Term::stdout();
    let mut completed = 0;

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, stopping watch");
                break;
            }
        }

        let Some(report) = monitor.try_run_cycle(&|| {}).await else {
            continue;
        };
        let history = monitor.history().await;

        if term.is_term() {
            term.clear_screen()?;
        }
        println!(
            "{}",
            report.display_as_table(&config.fund.name, config.fund.total_weight_ratio)
        );
        ui::print_separator();
        println!("{}", cycle::display_history(&history));

        if let Some(code) = series_code {
            ui::print_separator();
            let view = monitor.get_series(code).await;
            let quote = monitor.quote(code).await;
            println!("{}", series::display_series(code, &view, quote.snapshot()));
        }

        if let Some(next) = next_refresh_label(Local::now(), refresh) {
            println!("\n{}", ui::style_text(&next, ui::StyleType::Subtle));
        }

        completed += 1;
        if max_cycles.is_some_and(|max| completed >= max) {
            break;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_next_refresh_label() {
        let now = Local.with_ymd_and_hms(2024, 5, 17, 9, 30, 0).unwrap();
        assert_eq!(
            next_refresh_label(now, Duration::from_secs(30)).as_deref(),
            Some("Next refresh at 09:30:30")
        );
    }

    #[test]
    fn test_next_refresh_label_out_of_range() {
        let now = Local.with_ymd_and_hms(2024, 5, 17, 9, 30, 0).unwrap();
        assert!(next_refresh_label(now, Duration::from_secs(u64::MAX)).is_none());
        assert!(next_refresh_label(now, Duration::from_secs(i64::MAX as u64 / 1000)).is_none());
    }
}
