//! Indicator math over closing prices.
//!
//! All functions take oldest-first slices and return `None` when there is not
//! enough history.

use rust_decimal::Decimal;

#[must_use]
pub fn sma(values: &[Decimal], period: usize) -> Option<Decimal> {
    if period == 0 || values.len() < period {
        return None;
    }
    let window = &values[values.len() - period..];
    Some(window.iter().sum::<Decimal>() / Decimal::from(period))
}

/// Exponential moving average series, seeded with the SMA of the first `period` values.
///
/// The returned series has `values.len() - period + 1` points, the last one
/// being the current EMA.
#[must_use]
pub fn ema_series(values: &[Decimal], period: usize) -> Option<Vec<Decimal>> {
    let seed = sma(&values[..period.min(values.len())], period)?;
    let k = Decimal::TWO / Decimal::from(period + 1);

    let mut series = Vec::with_capacity(values.len() - period + 1);
    series.push(seed);
    let mut prev = seed;
    for value in &values[period..] {
        prev = (*value - prev) * k + prev;
        series.push(prev);
    }
    Some(series)
}

/// Relative strength index with Wilder smoothing, on a 0..=100 scale.
#[must_use]
pub fn rsi(values: &[Decimal], period: usize) -> Option<Decimal> {
    if period == 0 || values.len() < period + 1 {
        return None;
    }
    let period_dec = Decimal::from(period);
    let mut gains = Decimal::ZERO;
    let mut losses = Decimal::ZERO;
    for pair in values[..=period].windows(2) {
        let change = pair[1] - pair[0];
        if change > Decimal::ZERO {
            gains += change;
        } else {
            losses -= change;
        }
    }
    let mut avg_gain = gains / period_dec;
    let mut avg_loss = losses / period_dec;

    for pair in values[period..].windows(2) {
        let change = pair[1] - pair[0];
        let (gain, loss) = if change > Decimal::ZERO {
            (change, Decimal::ZERO)
        } else {
            (Decimal::ZERO, -change)
        };
        avg_gain = (avg_gain * (period_dec - Decimal::ONE) + gain) / period_dec;
        avg_loss = (avg_loss * (period_dec - Decimal::ONE) + loss) / period_dec;
    }

    if avg_loss.is_zero() {
        return Some(if avg_gain.is_zero() {
            Decimal::from(50)
        } else {
            Decimal::ONE_HUNDRED
        });
    }
    let rs = avg_gain / avg_loss;
    Some(Decimal::ONE_HUNDRED - Decimal::ONE_HUNDRED / (Decimal::ONE + rs))
}

/// Direction of a fast/slow line cross between the last two points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cross {
    Bullish,
    Bearish,
}

/// Detects a cross of `fast` over `slow` on the most recent step.
///
/// Both series must end at the same bar.
#[must_use]
pub fn last_cross(fast: &[Decimal], slow: &[Decimal]) -> Option<Cross> {
    if fast.len() < 2 || slow.len() < 2 {
        return None;
    }
    let (fast_prev, fast_now) = (fast[fast.len() - 2], fast[fast.len() - 1]);
    let (slow_prev, slow_now) = (slow[slow.len() - 2], slow[slow.len() - 1]);

    if fast_prev <= slow_prev && fast_now > slow_now {
        Some(Cross::Bullish)
    } else if fast_prev >= slow_prev && fast_now < slow_now {
        Some(Cross::Bearish)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn series(values: &[i64]) -> Vec<Decimal> {
        values.iter().copied().map(Decimal::from).collect()
    }

    #[test]
    fn test_sma_uses_trailing_window() {
        assert_eq!(sma(&series(&[1, 2, 3, 4]), 2), Some(dec!(3.5)));
        assert_eq!(sma(&series(&[1]), 2), None);
    }

    #[test]
    fn test_ema_of_constant_is_constant() {
        let ema = ema_series(&series(&[5; 10]), 3).unwrap();
        assert_eq!(ema.len(), 8);
        assert!(ema.iter().all(|v| *v == dec!(5)));
    }

    #[test]
    fn test_ema_moves_toward_new_values() {
        let ema = ema_series(&series(&[10, 10, 10, 20]), 3).unwrap();
        // k = 0.5
        assert_eq!(ema, vec![dec!(10), dec!(15)]);
    }

    #[test]
    fn test_rsi_extremes() {
        let rising = series(&(1..=20).collect::<Vec<_>>());
        assert_eq!(rsi(&rising, 14), Some(Decimal::ONE_HUNDRED));

        let falling: Vec<Decimal> = rising.iter().rev().copied().collect();
        assert_eq!(rsi(&falling, 14), Some(Decimal::ZERO));

        assert_eq!(rsi(&rising[..10], 14), None);
    }

    #[test]
    fn test_last_cross() {
        let fast = series(&[1, 3]);
        let slow = series(&[2, 2]);
        assert_eq!(last_cross(&fast, &slow), Some(Cross::Bullish));
        assert_eq!(last_cross(&slow, &fast), Some(Cross::Bearish));
        assert_eq!(last_cross(&fast[1..], &slow[1..]), None);
    }
}
