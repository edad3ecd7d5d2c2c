//! Cash and position accounting for one instrument.
//!
//! Buys execute at the ask (`bid + spread`) when spread costs are enabled,
//! sells always at the bid. Closing a short always pays the ask.

use thiserror::Error;
use tracing::{debug, info};

use crate::domain::{Bar, Position};

use super::order::{ExecutionEntry, ExecutionKind, OrderSize, Side};

/// Slack for float rounding when an `All` order spends the whole balance.
const BALANCE_EPSILON: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum LedgerError {
    #[error("insufficient balance: order needs {required:.2}, available {available:.2}")]
    InsufficientBalance { required: f64, available: f64 },

    #[error("invalid order size: {0}")]
    InvalidOrderSize(String),

    #[error("initial balance must be positive and finite, got {0}")]
    InvalidInitialBalance(f64),
}

#[derive(Debug, Clone)]
pub struct PositionLedger {
    initial_balance: f64,
    cash: f64,
    units: i64,
    avg_entry_price: f64,
    trade_count: usize,
    use_spread: bool,
    realized_pnl: Vec<f64>,
    executions: Vec<ExecutionEntry>,
}

impl PositionLedger {
    pub fn new(initial_balance: f64, use_spread: bool) -> Result<Self, LedgerError> {
        if !initial_balance.is_finite() || initial_balance <= 0.0 {
            return Err(LedgerError::InvalidInitialBalance(initial_balance));
        }
        Ok(Self {
            initial_balance,
            cash: initial_balance,
            units: 0,
            avg_entry_price: 0.0,
            trade_count: 0,
            use_spread,
            realized_pnl: Vec::new(),
            executions: Vec::new(),
        })
    }

    pub fn initial_balance(&self) -> f64 {
        self.initial_balance
    }

    pub fn cash_balance(&self) -> f64 {
        self.cash
    }

    pub fn units_held(&self) -> i64 {
        self.units
    }

    pub fn position(&self) -> Position {
        Position::from_units(self.units)
    }

    pub fn trade_count(&self) -> usize {
        self.trade_count
    }

    pub fn uses_spread(&self) -> bool {
        self.use_spread
    }

    pub fn avg_entry_price(&self) -> f64 {
        self.avg_entry_price
    }

    /// Realized P/L of every reducing order, in execution order.
    pub fn realized_pnl_history(&self) -> &[f64] {
        &self.realized_pnl
    }

    pub fn realized_pnl(&self) -> f64 {
        self.realized_pnl.iter().sum()
    }

    pub fn executions(&self) -> &[ExecutionEntry] {
        &self.executions
    }

    /// `(cash - initial) / initial`; only meaningful once flat.
    pub fn performance(&self) -> f64 {
        (self.cash - self.initial_balance) / self.initial_balance
    }

    /// Mark-to-market value of the open position at the bid.
    pub fn position_value(&self, bar: &Bar) -> f64 {
        self.units as f64 * bar.bid_price
    }

    pub fn nav(&self, bar: &Bar) -> f64 {
        self.cash + self.position_value(bar)
    }

    /// Back to the initial balance with no position, trades or history.
    pub fn reset(&mut self) {
        self.cash = self.initial_balance;
        self.units = 0;
        self.avg_entry_price = 0.0;
        self.trade_count = 0;
        self.realized_pnl.clear();
        self.executions.clear();
    }

    fn buy_price(&self, bar: &Bar) -> f64 {
        if self.use_spread {
            bar.bid_price + bar.spread
        } else {
            bar.bid_price
        }
    }

    /// Buy at the (spread-adjusted) ask. Returns the units bought.
    pub fn buy(&mut self, bar: &Bar, size: OrderSize) -> Result<i64, LedgerError> {
        let price = self.buy_price(bar);
        let units = resolve_units(size, price, self.cash)?;
        self.execute(bar, Side::Buy, units, price, ExecutionKind::Order)?;
        Ok(units)
    }

    /// Sell at the bid. Shorting is allowed, so there is no balance check.
    pub fn sell(&mut self, bar: &Bar, size: OrderSize) -> Result<i64, LedgerError> {
        let price = bar.bid_price;
        let units = resolve_units(size, price, self.cash)?;
        self.execute(bar, Side::Sell, units, price, ExecutionKind::Order)?;
        Ok(units)
    }

    /// Enter (or flip into) a long position of `size`.
    ///
    /// A short position is covered in the same order: one buy of
    /// `|units_held| + target`. `All` and `Amount` are sized against the
    /// balance left after covering, at the ask.
    pub fn go_long(&mut self, bar: &Bar, size: OrderSize) -> Result<i64, LedgerError> {
        let price = self.buy_price(bar);
        let cover = (-self.units).max(0);
        let available = self.cash - cover as f64 * price;
        let target = resolve_units(size, price, available)?;
        self.execute(bar, Side::Buy, cover + target, price, ExecutionKind::Order)?;
        Ok(cover + target)
    }

    /// Enter (or flip into) a short position of `size`; mirror of `go_long`.
    pub fn go_short(&mut self, bar: &Bar, size: OrderSize) -> Result<i64, LedgerError> {
        let price = bar.bid_price;
        let flatten = self.units.max(0);
        let available = self.cash + flatten as f64 * price;
        let target = resolve_units(size, price, available)?;
        self.execute(bar, Side::Sell, flatten + target, price, ExecutionKind::Order)?;
        Ok(flatten + target)
    }

    /// Flatten with an ordinary (balance-checked) order. No-op when flat.
    pub fn go_neutral(&mut self, bar: &Bar) -> Result<(), LedgerError> {
        match self.units.signum() {
            1 => self.sell(bar, OrderSize::Units(self.units)).map(|_| ()),
            -1 => self.buy(bar, OrderSize::Units(-self.units)).map(|_| ()),
            _ => Ok(()),
        }
    }

    /// Liquidate the whole position and return `(cash - initial) / initial`.
    ///
    /// Longs sell at the bid, shorts buy back at `bid + spread`. Calling it
    /// while flat changes nothing.
    pub fn close_position(&mut self, bar: &Bar) -> f64 {
        if self.units != 0 {
            let (side, price) = if self.units > 0 {
                (Side::Sell, bar.bid_price)
            } else {
                (Side::Buy, bar.bid_price + bar.spread)
            };
            let units = self.units.abs();
            self.apply(bar, side, units, price, ExecutionKind::Close);
        }
        let performance = self.performance();
        info!(
            timestamp = %bar.timestamp,
            balance = self.cash,
            performance_pct = performance * 100.0,
            trades = self.trade_count,
            "position closed"
        );
        performance
    }

    fn execute(
        &mut self,
        bar: &Bar,
        side: Side,
        units: i64,
        price: f64,
        kind: ExecutionKind,
    ) -> Result<(), LedgerError> {
        if side == Side::Buy {
            let required = units as f64 * price;
            if required > self.cash + BALANCE_EPSILON {
                debug!(required, available = self.cash, "buy rejected");
                return Err(LedgerError::InsufficientBalance {
                    required,
                    available: self.cash,
                });
            }
        }
        self.apply(bar, side, units, price, kind);
        Ok(())
    }

    fn apply(&mut self, bar: &Bar, side: Side, units: i64, price: f64, kind: ExecutionKind) {
        let delta = side.sign() * units;
        self.cash -= delta as f64 * price;
        let realized = self.move_units(delta, price);
        self.trade_count += 1;

        debug!(
            timestamp = %bar.timestamp,
            ?side,
            units,
            price,
            cash = self.cash,
            units_held = self.units,
            "order executed"
        );
        self.executions.push(ExecutionEntry {
            timestamp: bar.timestamp,
            kind,
            side,
            units,
            price,
            cash_after: self.cash,
            units_after: self.units,
            realized_pnl: realized,
        });
    }

    /// Update units and average entry; returns the P/L realized by the
    /// reducing part of the order, if any.
    fn move_units(&mut self, delta: i64, price: f64) -> Option<f64> {
        let before = self.units;
        let after = before + delta;

        let mut realized = None;
        if before != 0 && before.signum() != delta.signum() {
            let closed = delta.abs().min(before.abs());
            let pnl = closed as f64 * (price - self.avg_entry_price) * before.signum() as f64;
            self.realized_pnl.push(pnl);
            realized = Some(pnl);
        }

        if after == 0 {
            self.avg_entry_price = 0.0;
        } else if before == 0 || after.signum() != before.signum() {
            self.avg_entry_price = price;
        } else if after.abs() > before.abs() {
            self.avg_entry_price = (before.abs() as f64 * self.avg_entry_price
                + delta.abs() as f64 * price)
                / after.abs() as f64;
        }

        self.units = after;
        realized
    }
}

fn resolve_units(size: OrderSize, price: f64, available: f64) -> Result<i64, LedgerError> {
    if !price.is_finite() || price <= 0.0 {
        return Err(LedgerError::InvalidOrderSize(format!(
            "execution price {price} is not positive"
        )));
    }
    let (amount, units) = match size {
        OrderSize::Units(units) if units > 0 => return Ok(units),
        OrderSize::Units(units) => {
            return Err(LedgerError::InvalidOrderSize(format!(
                "unit count must be positive, got {units}"
            )))
        }
        OrderSize::Amount(amount) if amount.is_finite() && amount > 0.0 => {
            (amount, (amount / price).floor())
        }
        OrderSize::Amount(amount) => {
            return Err(LedgerError::InvalidOrderSize(format!(
                "amount must be positive, got {amount}"
            )))
        }
        OrderSize::All => (available, (available.max(0.0) / price).floor()),
    };
    if units < 1.0 {
        return Err(LedgerError::InsufficientBalance {
            required: price,
            available: amount,
        });
    }
    Ok(units as i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn bar(bid: f64, ask: f64) -> Bar {
        Bar::from_quote(Utc.timestamp_opt(1_700_000_000, 0).unwrap(), bid, ask).unwrap()
    }

    #[test]
    fn rejects_non_positive_initial_balance() {
        assert!(matches!(
            PositionLedger::new(0.0, true),
            Err(LedgerError::InvalidInitialBalance(_))
        ));
        assert!(PositionLedger::new(f64::NAN, true).is_err());
    }

    #[test]
    fn buy_pays_the_ask_when_spread_enabled() {
        let mut ledger = PositionLedger::new(1000.0, true).unwrap();
        ledger.buy(&bar(1.0, 1.25), OrderSize::Units(100)).unwrap();
        assert_eq!(ledger.cash_balance(), 875.0);
        assert_eq!(ledger.units_held(), 100);
        assert_eq!(ledger.trade_count(), 1);
    }

    #[test]
    fn buy_pays_the_bid_without_spread() {
        let mut ledger = PositionLedger::new(1000.0, false).unwrap();
        ledger.buy(&bar(1.0, 1.25), OrderSize::Units(100)).unwrap();
        assert_eq!(ledger.cash_balance(), 900.0);
    }

    #[test]
    fn insufficient_balance_leaves_state_untouched() {
        let mut ledger = PositionLedger::new(100.0, true).unwrap();
        let err = ledger
            .buy(&bar(1.0, 1.25), OrderSize::Units(100))
            .unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientBalance { .. }));
        assert_eq!(ledger.cash_balance(), 100.0);
        assert_eq!(ledger.units_held(), 0);
        assert_eq!(ledger.trade_count(), 0);
        assert!(ledger.executions().is_empty());
    }

    #[test]
    fn sell_has_no_balance_check() {
        let mut ledger = PositionLedger::new(100.0, true).unwrap();
        ledger.sell(&bar(1.0, 1.25), OrderSize::Units(1000)).unwrap();
        assert_eq!(ledger.cash_balance(), 1100.0);
        assert_eq!(ledger.units_held(), -1000);
        assert_eq!(ledger.position(), Position::Short);
    }

    #[test]
    fn amount_is_truncated_to_whole_units() {
        let mut ledger = PositionLedger::new(1000.0, false).unwrap();
        let units = ledger.buy(&bar(10.0, 10.0), OrderSize::Amount(105.0)).unwrap();
        assert_eq!(units, 10);
        assert!(matches!(
            ledger.buy(&bar(10.0, 10.0), OrderSize::Amount(5.0)),
            Err(LedgerError::InsufficientBalance { .. })
        ));
        assert!(matches!(
            ledger.buy(&bar(10.0, 10.0), OrderSize::Units(0)),
            Err(LedgerError::InvalidOrderSize(_))
        ));
    }

    #[test]
    fn close_short_pays_the_ask_and_reports_performance() {
        let mut ledger = PositionLedger::new(1000.0, true).unwrap();
        ledger.sell(&bar(2.0, 2.5), OrderSize::Units(100)).unwrap();
        let perf = ledger.close_position(&bar(1.0, 1.25));
        assert_eq!(ledger.cash_balance(), 1075.0);
        assert!((perf - 0.075).abs() < 1e-12);
        assert_eq!(ledger.units_held(), 0);
        assert_eq!(ledger.realized_pnl_history(), &[75.0]);
    }

    #[test]
    fn close_when_flat_is_a_no_op() {
        let mut ledger = PositionLedger::new(1000.0, true).unwrap();
        ledger.buy(&bar(1.0, 1.25), OrderSize::Units(100)).unwrap();
        ledger.close_position(&bar(1.0, 1.25));
        let (cash, trades) = (ledger.cash_balance(), ledger.trade_count());

        ledger.close_position(&bar(3.0, 3.5));
        ledger.close_position(&bar(3.0, 3.5));
        assert_eq!(ledger.cash_balance(), cash);
        assert_eq!(ledger.trade_count(), trades);
    }

    #[test]
    fn go_short_from_long_is_one_order() {
        let mut ledger = PositionLedger::new(1000.0, false).unwrap();
        ledger.go_long(&bar(10.0, 10.0), OrderSize::All).unwrap();
        assert_eq!(ledger.units_held(), 100);
        assert_eq!(ledger.cash_balance(), 0.0);

        let sold = ledger.go_short(&bar(5.0, 5.0), OrderSize::All).unwrap();
        assert_eq!(sold, 200);
        assert_eq!(ledger.units_held(), -100);
        assert_eq!(ledger.cash_balance(), 1000.0);
        assert_eq!(ledger.trade_count(), 2);
        assert_eq!(ledger.executions()[1].units, 200);
        assert_eq!(ledger.realized_pnl_history(), &[-500.0]);
    }

    #[test]
    fn go_long_from_short_sizes_after_covering_at_the_ask() {
        let mut ledger = PositionLedger::new(1000.0, true).unwrap();
        ledger.sell(&bar(10.0, 10.0), OrderSize::Units(50)).unwrap();
        assert_eq!(ledger.cash_balance(), 1500.0);

        let bought = ledger.go_long(&bar(8.0, 10.0), OrderSize::All).unwrap();
        assert_eq!(bought, 150);
        assert_eq!(ledger.units_held(), 100);
        assert_eq!(ledger.cash_balance(), 0.0);
        assert_eq!(ledger.trade_count(), 2);
    }

    #[test]
    fn realized_pnl_uses_average_entry() {
        let mut ledger = PositionLedger::new(10_000.0, false).unwrap();
        ledger.buy(&bar(10.0, 10.0), OrderSize::Units(10)).unwrap();
        ledger.buy(&bar(20.0, 20.0), OrderSize::Units(10)).unwrap();
        assert_eq!(ledger.avg_entry_price(), 15.0);

        ledger.sell(&bar(25.0, 25.0), OrderSize::Units(5)).unwrap();
        assert_eq!(ledger.realized_pnl_history(), &[50.0]);
        assert_eq!(ledger.avg_entry_price(), 15.0);
    }

    #[test]
    fn go_neutral_flattens_with_one_order() {
        let mut ledger = PositionLedger::new(1000.0, false).unwrap();
        ledger.sell(&bar(10.0, 10.0), OrderSize::Units(20)).unwrap();
        ledger.go_neutral(&bar(9.0, 9.0)).unwrap();
        assert_eq!(ledger.units_held(), 0);
        assert_eq!(ledger.trade_count(), 2);
        ledger.go_neutral(&bar(9.0, 9.0)).unwrap();
        assert_eq!(ledger.trade_count(), 2);
    }

    #[test]
    fn nav_marks_at_the_bid() {
        let mut ledger = PositionLedger::new(1000.0, true).unwrap();
        ledger.buy(&bar(10.0, 12.5), OrderSize::Units(10)).unwrap();
        assert_eq!(ledger.cash_balance(), 875.0);
        assert_eq!(ledger.position_value(&bar(10.0, 12.5)), 100.0);
        assert_eq!(ledger.nav(&bar(10.0, 12.5)), 975.0);
    }

    #[test]
    fn reset_restores_initial_state() {
        let mut ledger = PositionLedger::new(1000.0, true).unwrap();
        ledger.sell(&bar(1.0, 1.25), OrderSize::Units(10)).unwrap();
        ledger.reset();
        assert_eq!(ledger.cash_balance(), 1000.0);
        assert_eq!(ledger.units_held(), 0);
        assert_eq!(ledger.trade_count(), 0);
        assert!(ledger.executions().is_empty());
        assert!(ledger.realized_pnl_history().is_empty());
    }
}
