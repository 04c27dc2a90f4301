use crate::utilities::data_loader::Candles;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;

/// How much trailing history a non-sequential call keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CandleWindow {
    pub warmup_candles: usize,
}

impl Default for CandleWindow {
    fn default() -> Self {
        Self {
            warmup_candles: 240,
        }
    }
}

/// Vector of `len` elements whose first `warm` entries are quiet NaN.
/// The remainder is zeroed and expected to be overwritten by the kernel.
#[inline]
pub fn alloc_with_nan_prefix(len: usize, warm: usize) -> Vec<f64> {
    let warm = warm.min(len);
    let mut v = Vec::with_capacity(len);
    v.resize(warm, f64::NAN);
    v.resize(len, 0.0);
    v
}

/// Restricts the candle set for a non-sequential call. `needed` is the
/// minimum history the indicator requires to produce its last value; the
/// window never shrinks below it.
pub fn slice_candles<'a>(
    candles: &'a Candles,
    sequential: bool,
    needed: usize,
    window: &CandleWindow,
) -> Cow<'a, Candles> {
    if sequential {
        return Cow::Borrowed(candles);
    }
    let keep = window.warmup_candles.max(needed);
    if candles.len() > keep {
        tracing::trace!(total = candles.len(), keep, "restricting candles to trailing window");
        Cow::Owned(candles.tail(keep))
    } else {
        Cow::Borrowed(candles)
    }
}

/// Left-pads `result` with NaN so it lines up with a series of
/// `original_len` elements.
pub fn same_length(original_len: usize, result: Vec<f64>) -> Vec<f64> {
    if result.len() >= original_len {
        return result;
    }
    let mut out = vec![f64::NAN; original_len - result.len()];
    out.extend(result);
    out
}
