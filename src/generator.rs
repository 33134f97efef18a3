//! Seeded synthetic dataset generation: background trading noise with
//! deliberately planted mirror scenarios, written in the binary record
//! format together with the symbols dictionary.

use std::fs;
use std::io;
use std::path::Path;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::dataset;
use crate::detection::MATCH_WINDOW_MS;
use crate::types::{Side, Trade};

pub const SYMBOLS: &[&str] = &["EURUSD", "GBPUSD", "USDJPY", "XAUUSD", "BTCUSD"];

/// One real lot at the 10^8 scale.
const LOT_SCALE: i64 = 100_000_000;

#[derive(Debug, Clone, Copy)]
enum MirrorScenario {
    Copy,
    Reversal,
    PartialCopy,
    SameUserSplit,
}

const ALL_SCENARIOS: &[MirrorScenario] = &[
    MirrorScenario::Copy,
    MirrorScenario::Reversal,
    MirrorScenario::PartialCopy,
    MirrorScenario::SameUserSplit,
];

pub struct DatasetGenerator {
    rng: StdRng,
    current_ts: i64,
    /// (account_id, owning user_id); every user owns at least two accounts
    /// so same-user scenarios always have a counterparty account.
    accounts: Vec<(i32, i32)>,
    pub mirror_rate: f64,
}

impl DatasetGenerator {
    pub fn new(seed: u64, mirror_rate: f64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let user_count = rng.gen_range(4..=8);
        let mut accounts = Vec::new();
        let mut next_account = 0;
        for user in 0..user_count {
            for _ in 0..rng.gen_range(2..=5) {
                accounts.push((next_account, user));
                next_account += 1;
            }
        }
        Self { rng, current_ts: 0, accounts, mirror_rate }
    }

    pub fn user_ids(&self) -> Vec<i32> {
        let mut users: Vec<i32> = self.accounts.iter().map(|&(_, u)| u).collect();
        users.dedup();
        users
    }

    /// Generate `hours` of trading, sorted by open timestamp, with trade ids
    /// assigned in sorted order.
    pub fn generate(&mut self, hours: u64) -> Vec<Trade> {
        let span_ms = hours as i64 * 60 * 60 * 1000;
        let mut trades = Vec::new();
        while self.current_ts < span_ms {
            self.current_ts += self.rng.gen_range(10..20_000);
            if self.rng.gen_bool(self.mirror_rate.min(1.0)) {
                let scenario = ALL_SCENARIOS[self.rng.gen_range(0..ALL_SCENARIOS.len())];
                self.inject_mirror(scenario, &mut trades);
            } else {
                let trade = self.background_trade();
                trades.push(trade);
            }
        }
        trades.sort_by_key(|t| t.open_ts);
        for (id, trade) in trades.iter_mut().enumerate() {
            trade.trade_id = id as i32;
        }
        trades
    }

    fn background_trade(&mut self) -> Trade {
        let (account_id, user_id) = self.pick_account();
        let open_ts = self.current_ts;
        let close_ts = open_ts + self.rng.gen_range(100..3_600_000);
        Trade {
            open_ts,
            close_ts,
            duration_ms: (close_ts - open_ts) as i32,
            lot: self.rng.gen_range(100_000..100 * LOT_SCALE),
            side: if self.rng.gen_bool(0.5) { Side::Buy } else { Side::Sell },
            trade_id: 0,
            symbol: self.rng.gen_range(0..SYMBOLS.len() as i32),
            account_id,
            user_id,
        }
    }

    /// Plant a leader plus a follower inside the matching window. Planted
    /// trades are sized and timed to survive the dust filter.
    fn inject_mirror(&mut self, scenario: MirrorScenario, trades: &mut Vec<Trade>) {
        let (leader_account, leader_user) = self.pick_account();
        let open_ts = self.current_ts;
        let close_ts = open_ts + self.rng.gen_range(5_000..1_800_000);
        let leader = Trade {
            open_ts,
            close_ts,
            duration_ms: (close_ts - open_ts) as i32,
            lot: self.rng.gen_range(LOT_SCALE..50 * LOT_SCALE),
            side: if self.rng.gen_bool(0.5) { Side::Buy } else { Side::Sell },
            trade_id: 0,
            symbol: self.rng.gen_range(0..SYMBOLS.len() as i32),
            account_id: leader_account,
            user_id: leader_user,
        };

        let same_user = matches!(scenario, MirrorScenario::SameUserSplit);
        let (follower_account, follower_user) =
            self.pick_counterparty(leader_account, leader_user, same_user);
        let follower_open = leader.open_ts + self.rng.gen_range(500..MATCH_WINDOW_MS);
        let follower_close = follower_open + self.rng.gen_range(5_000..1_800_000);
        let (side, lot) = match scenario {
            MirrorScenario::Copy | MirrorScenario::SameUserSplit => (leader.side, leader.lot),
            MirrorScenario::Reversal => (
                match leader.side {
                    Side::Buy => Side::Sell,
                    Side::Sell => Side::Buy,
                },
                leader.lot,
            ),
            MirrorScenario::PartialCopy => {
                let mut percent = self.rng.gen_range(72..=128);
                if percent == 100 {
                    percent = 85;
                }
                (leader.side, leader.lot / 100 * percent)
            }
        };
        let follower = Trade {
            open_ts: follower_open,
            close_ts: follower_close,
            duration_ms: (follower_close - follower_open) as i32,
            lot,
            side,
            trade_id: 0,
            symbol: leader.symbol,
            account_id: follower_account,
            user_id: follower_user,
        };

        trades.push(leader);
        trades.push(follower);
    }

    fn pick_account(&mut self) -> (i32, i32) {
        self.accounts[self.rng.gen_range(0..self.accounts.len())]
    }

    fn pick_counterparty(&mut self, account: i32, user: i32, same_user: bool) -> (i32, i32) {
        // Pool construction guarantees a candidate exists for both cases.
        loop {
            let (candidate_account, candidate_user) = self.pick_account();
            if candidate_account == account {
                continue;
            }
            if same_user == (candidate_user == user) {
                return (candidate_account, candidate_user);
            }
        }
    }
}

/// Write `dataset.bin` and `symbols.json` under `out_dir`. Returns the
/// number of trades written and the user ids present in the dataset.
pub fn write_dataset(
    out_dir: &Path,
    seed: u64,
    hours: u64,
    mirror_rate: f64,
) -> io::Result<(usize, Vec<i32>)> {
    let mut generator = DatasetGenerator::new(seed, mirror_rate);
    let trades = generator.generate(hours);
    fs::create_dir_all(out_dir)?;
    dataset::write_trades(&out_dir.join("dataset.bin"), &trades)?;
    let symbols = serde_json::to_string(SYMBOLS)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    fs::write(out_dir.join("symbols.json"), symbols)?;
    Ok((trades.len(), generator.user_ids()))
}
