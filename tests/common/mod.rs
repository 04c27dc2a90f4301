/// Shared fixtures for the integration tests.
use dpo_ta::utilities::data_loader::{read_candles_from_csv, Candles};
use std::error::Error;

pub const FIXTURE: &str = "src/data/2018-09-01-sample-4h.csv";

pub struct TestData {
    pub candles: Candles,
}

impl TestData {
    pub fn load() -> Result<Self, Box<dyn Error>> {
        let candles = read_candles_from_csv(FIXTURE)?;
        Ok(TestData { candles })
    }

    pub fn close_prices(&self) -> &[f64] {
        &self.candles.close
    }
}

/// Compare two arrays with a tolerance; NaN must line up with NaN.
pub fn assert_array_close(actual: &[f64], expected: &[f64], rtol: f64, atol: f64, name: &str) {
    assert_eq!(
        actual.len(),
        expected.len(),
        "{}: Length mismatch: actual {} vs expected {}",
        name,
        actual.len(),
        expected.len()
    );

    for (i, (&a, &e)) in actual.iter().zip(expected.iter()).enumerate() {
        if a.is_nan() || e.is_nan() {
            assert!(
                a.is_nan() && e.is_nan(),
                "{}: NaN mismatch at index {}: actual {} vs expected {}",
                name,
                i,
                a,
                e
            );
            continue;
        }

        let diff = (a - e).abs();
        let tol = atol + rtol * e.abs();

        assert!(
            diff <= tol,
            "{}: Value mismatch at index {}: actual {} vs expected {} (diff: {}, tol: {})",
            name,
            i,
            a,
            e,
            diff,
            tol
        );
    }
}
