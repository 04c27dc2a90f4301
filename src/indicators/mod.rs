pub mod dpo;
pub use dpo::{
    dpo, dpo_candles, dpo_into_slice, DpoBatchBuilder, DpoBatchOutput, DpoBatchRange, DpoBuilder,
    DpoData, DpoError, DpoInput, DpoOutput, DpoParams, DpoResult,
};
