//! Assembling bid/ask price series into bars and ticks.
//!
//! The history collaborator returns one series per book side. Both series
//! are inner-joined on timestamp; rows missing on either side or carrying a
//! non-finite price are dropped, crossed quotes are a hard error.

use std::cmp::Ordering;

use crate::domain::{validate_bars, Bar, BarError, Tick};

use super::provider::{DataError, HistoryRequest, MarketDataSource, PricePoint, PriceSide};

fn join_quotes(bid: &[PricePoint], ask: &[PricePoint]) -> Vec<(PricePoint, f64)> {
    let mut joined = Vec::with_capacity(bid.len().min(ask.len()));
    let (mut i, mut j) = (0, 0);
    while i < bid.len() && j < ask.len() {
        match bid[i].timestamp.cmp(&ask[j].timestamp) {
            Ordering::Less => i += 1,
            Ordering::Greater => j += 1,
            Ordering::Equal => {
                if bid[i].price.is_finite() && ask[j].price.is_finite() {
                    joined.push((bid[i], ask[j].price));
                }
                i += 1;
                j += 1;
            }
        }
    }
    joined
}

/// Combine bid and ask closes into a validated bar sequence.
pub fn bars_from_quotes(bid: &[PricePoint], ask: &[PricePoint]) -> Result<Vec<Bar>, BarError> {
    let bars = join_quotes(bid, ask)
        .into_iter()
        .map(|(b, ask_price)| Bar::from_quote(b.timestamp, b.price, ask_price))
        .collect::<Result<Vec<_>, _>>()?;
    validate_bars(&bars)?;
    Ok(bars)
}

/// Combine bid and ask closes into a tick sequence (one tick per candle).
pub fn ticks_from_quotes(bid: &[PricePoint], ask: &[PricePoint]) -> Result<Vec<Tick>, BarError> {
    join_quotes(bid, ask)
        .into_iter()
        .map(|(b, ask_price)| {
            let tick = Tick::new(b.timestamp, b.price, ask_price);
            tick.validate().map(|_| tick)
        })
        .collect()
}

/// Fetch both sides of the book and assemble bars.
pub fn fetch_bars(
    source: &dyn MarketDataSource,
    request: &HistoryRequest<'_>,
) -> Result<Vec<Bar>, DataError> {
    let bid = source.get_history(request, PriceSide::Bid)?;
    let ask = source.get_history(request, PriceSide::Ask)?;
    let bars = bars_from_quotes(&bid, &ask)?;
    if bars.is_empty() {
        return Err(DataError::Empty {
            instrument: request.instrument.to_string(),
            start: request.start,
            end: request.end,
        });
    }
    Ok(bars)
}

/// Fetch both sides of the book as fine-grained ticks (live backfill).
pub fn fetch_ticks(
    source: &dyn MarketDataSource,
    request: &HistoryRequest<'_>,
) -> Result<Vec<Tick>, DataError> {
    let bid = source.get_history(request, PriceSide::Bid)?;
    let ask = source.get_history(request, PriceSide::Ask)?;
    Ok(ticks_from_quotes(&bid, &ask)?)
}
