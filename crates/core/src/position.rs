use crate::events::{OrderFill, OrderSide};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Long-only spot holding kept by a strategy from its own fills.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub quantity: Decimal,
    /// Cost of the quantity still held.
    pub cost_basis: Decimal,
    pub realized_pnl: Decimal,
}

impl Position {
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.quantity > Decimal::ZERO
    }

    #[must_use]
    pub fn average_cost(&self) -> Option<Decimal> {
        if self.quantity.is_zero() {
            None
        } else {
            Some(self.cost_basis / self.quantity)
        }
    }

    /// Applies a fill and returns the realized P&L it produced.
    ///
    /// Buys extend the position at their price plus fee. Sells close against
    /// the average cost; quantity beyond what is held is ignored.
    pub fn apply_fill(&mut self, fill: &OrderFill) -> Decimal {
        match fill.side {
            OrderSide::Buy => {
                self.cost_basis += fill.price * fill.amount + fill.fee;
                self.quantity += fill.amount;
                Decimal::ZERO
            }
            OrderSide::Sell => {
                let Some(avg) = self.average_cost() else {
                    return Decimal::ZERO;
                };
                let closed = fill.amount.min(self.quantity);
                let pnl = (fill.price - avg) * closed - fill.fee;

                self.quantity -= closed;
                self.cost_basis = if self.quantity.is_zero() {
                    Decimal::ZERO
                } else {
                    self.cost_basis - avg * closed
                };
                self.realized_pnl += pnl;
                pnl
            }
        }
    }
}
