//! Terminal presentation of cycles, history and intraday series.

pub mod cycle;
pub mod series;
pub mod setup;
pub mod ui;
pub mod watch;
