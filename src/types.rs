// ── Input Type (decoded from the binary dataset) ──

/// One opened-and-closed position, one record of input.
///
/// `lot` is the real lot size scaled by 10^8. `duration_ms` is carried as
/// stored even though it is redundant with `close_ts - open_ts`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Trade {
    pub open_ts: i64,
    pub close_ts: i64,
    pub duration_ms: i32,
    pub lot: i64,
    pub side: Side,
    pub trade_id: i32,
    pub symbol: i32,
    pub account_id: i32,
    pub user_id: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Sell = 0,
    Buy = 1,
}

impl Side {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(Side::Sell),
            1 => Some(Side::Buy),
            _ => None,
        }
    }

    /// Report label, matching the dataset's short/long convention.
    pub fn label(&self) -> &'static str {
        match self {
            Side::Sell => "Short",
            Side::Buy => "Long",
        }
    }
}

// ── Output Types (handed to the report sink) ──

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PatternKind {
    Copy,
    Reversal,
    PartialCopy,
}

impl PatternKind {
    /// Fixed evaluation order of the three per-symbol indices.
    pub const ALL: [PatternKind; 3] =
        [PatternKind::Copy, PatternKind::Reversal, PatternKind::PartialCopy];

    pub fn label(&self) -> &'static str {
        match self {
            PatternKind::Copy => "copy_trades",
            PatternKind::Reversal => "reversal_trades",
            PatternKind::PartialCopy => "partial_copy_trades",
        }
    }
}

/// A parent trade plus the later trades that matched it under one kind,
/// in arrival order. Owned by exactly one window index until eviction
/// hands it to the sink.
#[derive(Debug, Clone)]
pub struct Batch {
    pub parent: Trade,
    pub children: Vec<Trade>,
}

impl Batch {
    pub fn new(parent: Trade) -> Self {
        Self { parent, children: Vec::new() }
    }
}
