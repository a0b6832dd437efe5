//! Seeded random-walk market data.
//!
//! Same seed, symbol, timeframe and window always produce the same bars.

use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::domain::error::GatetraderError;
use crate::domain::ohlcv::{PriceBar, Timeframe};
use crate::ports::data_port::DataPort;

#[derive(Debug, Clone)]
pub struct SyntheticAdapter {
    seed: u64,
    start_price: f64,
    max_step: f64,
    symbols: Vec<String>,
}

impl SyntheticAdapter {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            start_price: 100.0,
            max_step: 0.01,
            symbols: Vec::new(),
        }
    }

    pub fn with_start_price(mut self, price: f64) -> Self {
        self.start_price = price;
        self
    }

    /// Largest fractional close-to-close move per bar.
    pub fn with_max_step(mut self, step: f64) -> Self {
        self.max_step = step;
        self
    }

    pub fn with_symbols(mut self, symbols: Vec<String>) -> Self {
        self.symbols = symbols;
        self
    }

    /// FNV-1a over the symbol, mixed into the configured seed.
    fn symbol_seed(&self, symbol: &str) -> u64 {
        let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
        for byte in symbol.bytes() {
            hash ^= byte as u64;
            hash = hash.wrapping_mul(0x0100_0000_01b3);
        }
        hash ^ self.seed
    }

    pub fn generate(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Vec<PriceBar> {
        let mut rng = StdRng::seed_from_u64(self.symbol_seed(symbol));
        let mut bars = Vec::with_capacity(limit);
        let mut price = self.start_price;
        let mut open_time = since;

        for _ in 0..limit {
            let step: f64 = rng.gen_range(-self.max_step..=self.max_step);
            let open = price;
            let close = price * (1.0 + step);
            let high = open.max(close) * (1.0 + rng.gen_range(0.0..0.005));
            let low = open.min(close) * (1.0 - rng.gen_range(0.0..0.005));
            let volume = rng.gen_range(1.0..100.0);

            bars.push(PriceBar {
                symbol: symbol.to_string(),
                timeframe,
                open_time,
                open,
                high,
                low,
                close,
                volume,
            });

            price = close;
            open_time += timeframe.duration();
        }

        bars
    }
}

impl DataPort for SyntheticAdapter {
    fn get_ohlcv(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        since: DateTime<Utc>,
        limit: usize,
    ) -> Result<Vec<PriceBar>, GatetraderError> {
        Ok(self.generate(symbol, timeframe, since, limit))
    }

    fn list_symbols(&self) -> Result<Vec<String>, GatetraderError> {
        Ok(self.symbols.clone())
    }
}
