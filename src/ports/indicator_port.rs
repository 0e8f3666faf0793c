//! Indicator provider port.

use crate::domain::indicator::set::IndicatorSnapshot;
use crate::domain::ohlcv::MarketBar;

/// Supplies indicator values bar by bar.
///
/// After `advance(bar)`, `current()` describes `bar` and `previous()` the bar
/// before it. A snapshot for a bar must be computed only from that bar and
/// the ones before it.
pub trait IndicatorProvider {
    fn advance(&mut self, bar: &MarketBar);
    fn current(&self) -> Option<&IndicatorSnapshot>;
    fn previous(&self) -> Option<&IndicatorSnapshot>;
}
