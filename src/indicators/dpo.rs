//! # Detrended Price Oscillator (DPO)
//!
//! Removes the trend from a price series so that shorter cycles stand out. Each
//! output is the price `period / 2 + 1` bars ago minus the `period`-bar simple
//! moving average ending at the current bar.
//!
//! ## Parameters
//! - **period**: SMA window length (defaults to 5).
//!
//! ## Errors
//! - **InvalidPeriod**: dpo: `period` is zero or negative.
//! - **InvalidRange**: dpo: a batch sweep expands to no periods.
//! - **OutputLengthMismatch**: dpo: destination buffer length differs from the input.
//! - **Candles**: the requested candle source is unknown.
//!
//! ## Returns
//! - **`Ok(DpoOutput)`** with a `Vec<f64>` as long as the input. The first
//!   `period - 1 + period / 2 + 1` entries are `NaN`; a series shorter than
//!   that is entirely `NaN`.
//! - **`Err(DpoError)`** otherwise.

use crate::utilities::data_loader::{source_type, CandleError, Candles};
use crate::utilities::helpers::{alloc_with_nan_prefix, same_length, slice_candles, CandleWindow};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use thiserror::Error;

#[derive(Debug, Clone)]
pub enum DpoData<'a> {
    Candles {
        candles: &'a Candles,
        source: &'a str,
    },
    Slice(&'a [f64]),
}

#[derive(Debug, Clone)]
pub struct DpoOutput {
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DpoParams {
    pub period: Option<usize>,
}

impl Default for DpoParams {
    fn default() -> Self {
        Self { period: Some(5) }
    }
}

#[derive(Debug, Clone)]
pub struct DpoInput<'a> {
    pub data: DpoData<'a>,
    pub params: DpoParams,
}

impl<'a> DpoInput<'a> {
    #[inline]
    pub fn from_candles(c: &'a Candles, s: &'a str, p: DpoParams) -> Self {
        Self {
            data: DpoData::Candles {
                candles: c,
                source: s,
            },
            params: p,
        }
    }
    #[inline]
    pub fn from_slice(sl: &'a [f64], p: DpoParams) -> Self {
        Self {
            data: DpoData::Slice(sl),
            params: p,
        }
    }
    #[inline]
    pub fn with_default_candles(c: &'a Candles) -> Self {
        Self::from_candles(c, "close", DpoParams::default())
    }
    #[inline]
    pub fn get_period(&self) -> usize {
        self.params.period.unwrap_or(5)
    }

    /// Price series the indicator runs on.
    pub fn source(&self) -> Result<Cow<'a, [f64]>, DpoError> {
        match self.data {
            DpoData::Slice(slice) => Ok(Cow::Borrowed(slice)),
            DpoData::Candles { candles, source } => Ok(source_type(candles, source)?),
        }
    }
}

#[derive(Copy, Clone, Debug, Default)]
pub struct DpoBuilder<'s> {
    period: Option<usize>,
    source: Option<&'s str>,
}

impl<'s> DpoBuilder<'s> {
    #[inline(always)]
    pub fn new() -> Self {
        Self::default()
    }
    #[inline(always)]
    pub fn period(mut self, n: usize) -> Self {
        self.period = Some(n);
        self
    }
    /// Candle field used by `apply`; `"close"` when unset.
    #[inline(always)]
    pub fn source(mut self, s: &'s str) -> Self {
        self.source = Some(s);
        self
    }

    #[inline(always)]
    pub fn apply(self, c: &Candles) -> Result<DpoOutput, DpoError> {
        self.apply_candles(c, self.source.unwrap_or("close"))
    }

    #[inline(always)]
    pub fn apply_candles(self, c: &Candles, source: &str) -> Result<DpoOutput, DpoError> {
        let p = DpoParams {
            period: self.period,
        };
        let i = DpoInput::from_candles(c, source, p);
        dpo(&i)
    }

    #[inline(always)]
    pub fn apply_slice(self, d: &[f64]) -> Result<DpoOutput, DpoError> {
        let p = DpoParams {
            period: self.period,
        };
        let i = DpoInput::from_slice(d, p);
        dpo(&i)
    }
}

#[derive(Debug, Error)]
pub enum DpoError {
    #[error("dpo: Invalid period: period = {period}")]
    InvalidPeriod { period: i64 },

    #[error("dpo: Invalid period range: start = {start}, end = {end}, step = {step}")]
    InvalidRange {
        start: usize,
        end: usize,
        step: usize,
    },

    #[error("dpo: Output length mismatch: expected = {expected}, got = {got}")]
    OutputLengthMismatch { expected: usize, got: usize },

    #[error(transparent)]
    Candles(#[from] CandleError),
}

/// Number of bars the price sample lags the current bar.
#[inline(always)]
pub fn dpo_shift(period: usize) -> usize {
    period / 2 + 1
}

/// Length of the undefined prefix: `period - 1 + shift`.
#[inline(always)]
pub fn dpo_warmup(period: usize) -> usize {
    period.saturating_sub(1).saturating_add(dpo_shift(period))
}

#[inline]
fn check_period(period: usize) -> Result<usize, DpoError> {
    if period == 0 {
        return Err(DpoError::InvalidPeriod { period: 0 });
    }
    Ok(period)
}

#[inline]
pub fn dpo(input: &DpoInput) -> Result<DpoOutput, DpoError> {
    let period = check_period(input.get_period())?;
    let data = input.source()?;

    let mut out = alloc_with_nan_prefix(data.len(), dpo_warmup(period));
    dpo_scalar(&data, period, &mut out);
    Ok(DpoOutput { values: out })
}

#[inline]
pub fn dpo_into_slice(dst: &mut [f64], input: &DpoInput) -> Result<(), DpoError> {
    let period = check_period(input.get_period())?;
    let data = input.source()?;
    if dst.len() != data.len() {
        return Err(DpoError::OutputLengthMismatch {
            expected: data.len(),
            got: dst.len(),
        });
    }

    let warm = dpo_warmup(period).min(dst.len());
    dst[..warm].fill(f64::NAN);
    dpo_scalar(&data, period, dst);
    Ok(())
}

/// Cumulative sums with a leading zero: `out[i]` is the sum of `data[..i]`.
#[inline]
pub fn prefix_sums(data: &[f64]) -> Vec<f64> {
    let mut out = Vec::with_capacity(data.len() + 1);
    let mut acc = 0.0f64;
    out.push(acc);
    for &x in data {
        acc += x;
        out.push(acc);
    }
    out
}

/// Fills `out[warmup..]`. Entries before the warmup are left as they are.
#[inline]
pub fn dpo_scalar(data: &[f64], period: usize, out: &mut [f64]) {
    debug_assert_eq!(data.len(), out.len());
    let pfx = prefix_sums(data);
    dpo_row_from_prefix(data, &pfx, period, out);
}

#[inline(always)]
fn dpo_row_from_prefix(data: &[f64], pfx: &[f64], period: usize, out: &mut [f64]) {
    let back = dpo_shift(period);
    let denom = period as f64;

    // warmup >= back, so `i - back` never underflows
    for i in dpo_warmup(period)..data.len() {
        let avg = (pfx[i + 1] - pfx[i + 1 - period]) / denom;
        out[i] = data[i - back] - avg;
    }
}

/// Result of the candle-level entry point.
#[derive(Debug, Clone, PartialEq)]
pub enum DpoResult {
    Last(f64),
    Series(Vec<f64>),
}

impl DpoResult {
    /// Most recent value, `NaN` when there is none.
    pub fn last(&self) -> f64 {
        match self {
            DpoResult::Last(v) => *v,
            DpoResult::Series(v) => v.last().copied().unwrap_or(f64::NAN),
        }
    }

    pub fn into_values(self) -> Vec<f64> {
        match self {
            DpoResult::Last(v) => vec![v],
            DpoResult::Series(v) => v,
        }
    }
}

/// DPO over a candle set.
///
/// With `sequential` the whole series is returned, aligned with `candles`.
/// Otherwise only the trailing `window` is processed and the last value is
/// returned.
pub fn dpo_candles(
    candles: &Candles,
    period: i64,
    source: &str,
    sequential: bool,
    window: &CandleWindow,
) -> Result<DpoResult, DpoError> {
    let period = usize::try_from(period)
        .ok()
        .filter(|&p| p >= 1)
        .ok_or(DpoError::InvalidPeriod { period })?;

    tracing::debug!(
        period,
        source,
        sequential,
        candles = candles.len(),
        "computing dpo"
    );

    let sliced = slice_candles(candles, sequential, dpo_warmup(period).saturating_add(1), window);
    let input = DpoInput::from_candles(&sliced, source, DpoParams { period: Some(period) });
    let DpoOutput { values } = dpo(&input)?;

    if sequential {
        Ok(DpoResult::Series(same_length(candles.len(), values)))
    } else {
        Ok(DpoResult::Last(values.last().copied().unwrap_or(f64::NAN)))
    }
}

/// Period 5 on closes, last value only.
#[inline]
pub fn dpo_candles_default(candles: &Candles) -> Result<DpoResult, DpoError> {
    dpo_candles(candles, 5, "close", false, &CandleWindow::default())
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DpoBatchRange {
    pub period: (usize, usize, usize),
}

impl Default for DpoBatchRange {
    fn default() -> Self {
        Self {
            period: (5, 60, 1),
        }
    }
}

#[derive(Clone, Debug)]
pub struct DpoBatchBuilder {
    range: DpoBatchRange,
    parallel: bool,
}

impl Default for DpoBatchBuilder {
    fn default() -> Self {
        Self {
            range: DpoBatchRange::default(),
            parallel: true,
        }
    }
}

impl DpoBatchBuilder {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn parallel(mut self, on: bool) -> Self {
        self.parallel = on;
        self
    }
    #[inline]
    pub fn period_range(mut self, start: usize, end: usize, step: usize) -> Self {
        self.range.period = (start, end, step);
        self
    }
    #[inline]
    pub fn period_static(mut self, p: usize) -> Self {
        self.range.period = (p, p, 0);
        self
    }

    pub fn apply_slice(self, data: &[f64]) -> Result<DpoBatchOutput, DpoError> {
        dpo_batch_inner(data, &self.range, self.parallel)
    }
    pub fn with_default_slice(data: &[f64]) -> Result<DpoBatchOutput, DpoError> {
        DpoBatchBuilder::new().apply_slice(data)
    }
    pub fn apply_candles(self, c: &Candles, src: &str) -> Result<DpoBatchOutput, DpoError> {
        let slice = source_type(c, src)?;
        self.apply_slice(&slice)
    }
    pub fn with_default_candles(c: &Candles) -> Result<DpoBatchOutput, DpoError> {
        DpoBatchBuilder::new().apply_candles(c, "close")
    }
}

/// Row-major matrix, one row per period in `combos`.
#[derive(Clone, Debug)]
pub struct DpoBatchOutput {
    pub values: Vec<f64>,
    pub combos: Vec<DpoParams>,
    pub rows: usize,
    pub cols: usize,
}

impl DpoBatchOutput {
    pub fn row_for_params(&self, p: &DpoParams) -> Option<usize> {
        self.combos
            .iter()
            .position(|c| c.period.unwrap_or(5) == p.period.unwrap_or(5))
    }

    pub fn values_for(&self, p: &DpoParams) -> Option<&[f64]> {
        self.row_for_params(p).map(|row| {
            let start = row * self.cols;
            &self.values[start..start + self.cols]
        })
    }
}

#[inline(always)]
fn expand_grid(r: &DpoBatchRange) -> Vec<DpoParams> {
    fn axis_usize((start, end, step): (usize, usize, usize)) -> Vec<usize> {
        if step == 0 || start == end {
            return vec![start];
        }
        (start..=end).step_by(step).collect()
    }
    axis_usize(r.period)
        .into_iter()
        .map(|p| DpoParams { period: Some(p) })
        .collect()
}

#[inline(always)]
pub fn dpo_batch_slice(data: &[f64], sweep: &DpoBatchRange) -> Result<DpoBatchOutput, DpoError> {
    dpo_batch_inner(data, sweep, false)
}

#[inline(always)]
pub fn dpo_batch_par_slice(
    data: &[f64],
    sweep: &DpoBatchRange,
) -> Result<DpoBatchOutput, DpoError> {
    dpo_batch_inner(data, sweep, true)
}

fn dpo_batch_inner(
    data: &[f64],
    sweep: &DpoBatchRange,
    parallel: bool,
) -> Result<DpoBatchOutput, DpoError> {
    let combos = expand_grid(sweep);
    if combos.is_empty() {
        let (start, end, step) = sweep.period;
        return Err(DpoError::InvalidRange { start, end, step });
    }
    let periods = combos
        .iter()
        .map(|c| check_period(c.period.unwrap_or(5)))
        .collect::<Result<Vec<usize>, DpoError>>()?;

    let rows = combos.len();
    let cols = data.len();
    tracing::debug!(rows, cols, parallel, "dpo batch sweep");

    let mut values = vec![0.0f64; rows * cols];
    if cols == 0 {
        return Ok(DpoBatchOutput {
            values,
            combos,
            rows,
            cols,
        });
    }

    // one prefix-sum pass shared by every row
    let pfx = prefix_sums(data);

    let do_row = |row: usize, out_row: &mut [f64]| {
        let period = periods[row];
        let warm = dpo_warmup(period).min(cols);
        out_row[..warm].fill(f64::NAN);
        dpo_row_from_prefix(data, &pfx, period, out_row);
    };

    if parallel {
        values
            .par_chunks_mut(cols)
            .enumerate()
            .for_each(|(row, slice)| do_row(row, slice));
    } else {
        for (row, slice) in values.chunks_mut(cols).enumerate() {
            do_row(row, slice);
        }
    }

    Ok(DpoBatchOutput {
        values,
        combos,
        rows,
        cols,
    })
}
