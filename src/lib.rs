#![allow(clippy::needless_range_loop)]

pub mod indicators;
pub mod utilities;

pub use indicators::dpo::{
    dpo, dpo_candles, dpo_candles_default, DpoBatchBuilder, DpoBatchOutput, DpoBatchRange,
    DpoBuilder, DpoError, DpoInput, DpoOutput, DpoParams, DpoResult,
};
pub use utilities::data_loader::{read_candles_from_csv, source_type, CandleError, Candles};
pub use utilities::helpers::CandleWindow;
