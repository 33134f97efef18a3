//! The matching core: per-(symbol, kind) sliding-window indices over parent
//! batches, fed one time-sorted trade at a time.

use std::collections::VecDeque;

use crate::config::{Mode, UserPair};
use crate::error::MatchError;
use crate::types::{Batch, PatternKind, Trade};

/// Maximum distance between a parent's and a follower's open timestamps,
/// and the eviction horizon for parents.
pub const MATCH_WINDOW_MS: i64 = 5 * 60 * 1000;

pub const MIN_TRADE_DURATION_MS: i32 = 1000;

/// 0.01 lots at the 10^8 scale.
pub const MIN_LOT: i64 = 1_000_000;

/// Pre-filter: only trades of the two selected users are considered, and
/// dust trades (short-lived and below 0.01 lots) are dropped.
pub fn passes_prefilter(trade: &Trade, users: &UserPair) -> bool {
    if !users.contains(trade.user_id) {
        return false;
    }
    !(trade.duration_ms <= MIN_TRADE_DURATION_MS && trade.lot < MIN_LOT)
}

/// Receives finalized batches as parents fall out of the window. Ownership
/// transfers here; the index keeps no reference.
pub trait BatchSink {
    fn emit(&mut self, kind: PatternKind, batch: Batch);
}

impl BatchSink for Vec<(PatternKind, Batch)> {
    fn emit(&mut self, kind: PatternKind, batch: Batch) {
        self.push((kind, batch));
    }
}

/// Pair acceptance rules configured once per run.
#[derive(Debug, Clone, Copy)]
pub struct MatchPolicy {
    pub mode: Mode,
    pub users: UserPair,
}

impl MatchPolicy {
    /// Precondition shared by all kinds, checked before the kind predicate:
    /// distinct trades, distinct accounts, and the mode's user rule.
    fn accepts_pair(&self, parent: &Trade, child: &Trade) -> bool {
        if parent.trade_id == child.trade_id || parent.account_id == child.account_id {
            return false;
        }
        match self.mode {
            Mode::A => parent.user_id != child.user_id,
            Mode::B => true,
        }
    }

    /// In Mode B a matched same-user pair is reported as a violation.
    pub fn is_violation(&self, parent: &Trade, child: &Trade) -> bool {
        self.mode == Mode::B && parent.user_id == child.user_id
    }
}

fn kind_matches(kind: PatternKind, parent: &Trade, child: &Trade) -> bool {
    match kind {
        PatternKind::Copy => child.side == parent.side,
        PatternKind::Reversal => child.side != parent.side,
        PatternKind::PartialCopy => {
            child.side == parent.side && lots_close_but_unequal(parent.lot, child.lot)
        }
    }
}

/// Volume ratio within [0.7, 1.3] but not exactly 1.0, as an exact integer
/// comparison. Widened to i128 so `130 * lot` cannot overflow.
fn lots_close_but_unequal(parent_lot: i64, child_lot: i64) -> bool {
    if child_lot == parent_lot {
        return false;
    }
    let p = parent_lot as i128;
    let c = child_lot as i128;
    70 * p <= 100 * c && 100 * c <= 130 * p
}

/// Batches of one (symbol, kind) pair, ordered by parent open timestamp.
/// Push-back and pop-front are O(1); the attach scan visits the live window
/// oldest first.
#[derive(Debug, Clone, Default)]
struct WindowIndex {
    batches: VecDeque<Batch>,
}

impl WindowIndex {
    /// Evict every batch whose parent has aged out relative to `now_ts`,
    /// oldest first, handing each to the sink.
    fn advance<S: BatchSink>(&mut self, kind: PatternKind, now_ts: i64, sink: &mut S) {
        loop {
            match self.batches.front() {
                Some(head) if now_ts - head.parent.open_ts > MATCH_WINDOW_MS => {
                    if let Some(batch) = self.batches.pop_front() {
                        sink.emit(kind, batch);
                    }
                }
                _ => break,
            }
        }
    }

    /// Attach `trade` to the oldest batch whose parent accepts it. The head
    /// of the deque is the earliest eligible leader; later parents are only
    /// considered once every older one has refused.
    fn try_attach(&mut self, kind: PatternKind, policy: &MatchPolicy, trade: &Trade) -> bool {
        for batch in self.batches.iter_mut() {
            if policy.accepts_pair(&batch.parent, trade)
                && kind_matches(kind, &batch.parent, trade)
            {
                batch.children.push(*trade);
                return true;
            }
        }
        false
    }

    fn open(&mut self, trade: Trade) {
        self.batches.push_back(Batch::new(trade));
    }
}

/// The classifier driver: three window indices per symbol, mutated only by
/// the single-threaded caller feeding trades in open-timestamp order.
pub struct Matcher {
    policy: MatchPolicy,
    indices: Vec<[WindowIndex; 3]>,
    last_open_ts: Option<i64>,
}

impl Matcher {
    pub fn new(policy: MatchPolicy, symbol_count: usize) -> Self {
        Self {
            policy,
            indices: (0..symbol_count).map(|_| <[WindowIndex; 3]>::default()).collect(),
            last_open_ts: None,
        }
    }

    /// Feed the next trade of the stream. Returns whether the trade survived
    /// the pre-filter and was classified. A trade that is classified either
    /// attaches to an existing batch or opens a new one, in each of the
    /// three kinds independently.
    pub fn process<S: BatchSink>(
        &mut self,
        trade: Trade,
        sink: &mut S,
    ) -> Result<bool, MatchError> {
        if let Some(last) = self.last_open_ts {
            if trade.open_ts < last {
                return Err(MatchError::NonMonotonicOpenTs {
                    current: trade.open_ts,
                    last,
                    trade_id: trade.trade_id,
                });
            }
        }
        self.last_open_ts = Some(trade.open_ts);

        if !passes_prefilter(&trade, &self.policy.users) {
            return Ok(false);
        }

        let policy = self.policy;
        let symbol_count = self.indices.len();
        let Some(lanes) =
            usize::try_from(trade.symbol).ok().and_then(|i| self.indices.get_mut(i))
        else {
            return Err(MatchError::UnknownSymbol {
                symbol: trade.symbol,
                known: symbol_count,
                trade_id: trade.trade_id,
            });
        };

        for kind in PatternKind::ALL {
            let index = &mut lanes[kind as usize];
            index.advance(kind, trade.open_ts, sink);
            if !index.try_attach(kind, &policy, &trade) {
                index.open(trade);
            }
        }
        Ok(true)
    }

    /// End of stream: drain every remaining batch, per symbol in id order,
    /// per kind in the fixed order. Within an index, batches leave in parent
    /// open-timestamp order.
    pub fn finish<S: BatchSink>(&mut self, sink: &mut S) {
        for lanes in &mut self.indices {
            for kind in PatternKind::ALL {
                let index = &mut lanes[kind as usize];
                while let Some(batch) = index.batches.pop_front() {
                    sink.emit(kind, batch);
                }
            }
        }
    }
}
