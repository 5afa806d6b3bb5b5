use chrono::Utc;
use core_types::{BookLevel, BookTick};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

const BOOK_DEPTH: usize = 15;
/// Per-tick drift bound, as a fraction of the mid price.
const MAX_DRIFT: f64 = 0.0008;

/// Deterministic random-walk order-book feed. Seeded, so a run is
/// reproducible tick for tick.
pub struct SyntheticFeed {
    rng: StdRng,
    mid: Decimal,
}

impl SyntheticFeed {
    pub fn new(start_price: Decimal, seed: u64) -> Self {
        Self { rng: StdRng::seed_from_u64(seed), mid: start_price }
    }

    pub fn next_tick(&mut self) -> BookTick {
        let drift: f64 = self.rng.gen_range(-MAX_DRIFT..MAX_DRIFT);
        let step = self.mid * Decimal::from_f64(drift).unwrap_or(Decimal::ZERO);
        self.mid = (self.mid + step).max(dec!(0.01));

        let half_spread = self.mid * dec!(0.0001);
        let level_gap = self.mid * dec!(0.0002);

        let mut bids = Vec::with_capacity(BOOK_DEPTH);
        let mut asks = Vec::with_capacity(BOOK_DEPTH);
        for i in 0..BOOK_DEPTH {
            let offset = half_spread + level_gap * Decimal::from(i as u64);
            bids.push(BookLevel {
                price: self.mid - offset,
                quantity: self.random_quantity(),
            });
            asks.push(BookLevel {
                price: self.mid + offset,
                quantity: self.random_quantity(),
            });
        }

        BookTick {
            bids,
            asks,
            last_price: Some(self.mid),
            timestamp: Utc::now(),
        }
    }

    fn random_quantity(&mut self) -> Decimal {
        let q: f64 = self.rng.gen_range(0.1..5.0);
        Decimal::from_f64(q).unwrap_or(dec!(1)).round_dp(3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_reproduces_the_walk() {
        let mut a = SyntheticFeed::new(dec!(100), 7);
        let mut b = SyntheticFeed::new(dec!(100), 7);
        for _ in 0..10 {
            assert_eq!(a.next_tick().last_price, b.next_tick().last_price);
        }
    }

    #[test]
    fn book_is_priced_around_the_mid() {
        let mut feed = SyntheticFeed::new(dec!(100), 1);
        let tick = feed.next_tick();
        let mid = tick.last_price.unwrap();
        assert!(tick.bids.iter().all(|l| l.price < mid));
        assert!(tick.asks.iter().all(|l| l.price > mid));
    }
}
