pub mod caching;
pub mod jqka;
pub mod tencent;
pub mod util;

pub use caching::SeriesCache;
pub use jqka::JqkaSeriesProvider;
pub use tencent::TencentQuoteProvider;
