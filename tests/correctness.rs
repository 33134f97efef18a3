//! Correctness tests for the matching core and the full scan pipeline.
//!
//! Feeds known deterministic trade streams through the matcher and asserts
//! exact (parent, child) pair output per pattern kind, then checks the
//! stream-level properties on a generated dataset and the CSV emitters end
//! to end.

use std::fs;

use copytrade_detect::config::{Config, Mode, SymbolTable, UserPair};
use copytrade_detect::dataset::{self, DatasetReader, RECORD_SIZE};
use copytrade_detect::detection::{MatchPolicy, Matcher, MATCH_WINDOW_MS};
use copytrade_detect::error::{DatasetError, MatchError};
use copytrade_detect::generator::{self, DatasetGenerator};
use copytrade_detect::report::CsvReports;
use copytrade_detect::types::{Batch, PatternKind, Side, Trade};

const LOT: i64 = 100_000_000;

fn trade(open_ms: i64, lot: i64, side: Side, trade_id: i32, account: i32, user: i32) -> Trade {
    Trade {
        open_ts: open_ms,
        close_ts: open_ms + 60_000,
        duration_ms: 60_000,
        lot,
        side,
        trade_id,
        symbol: 0,
        account_id: account,
        user_id: user,
    }
}

/// Runs a stream through the matcher with users 42/57 and drains everything.
fn classify(mode: Mode, trades: &[Trade]) -> Vec<(PatternKind, Batch)> {
    let policy = MatchPolicy { mode, users: UserPair::new(42, 57).unwrap() };
    let mut matcher = Matcher::new(policy, 2);
    let mut out: Vec<(PatternKind, Batch)> = Vec::new();
    for &t in trades {
        matcher.process(t, &mut out).unwrap();
    }
    matcher.finish(&mut out);
    out
}

fn pairs_of(out: &[(PatternKind, Batch)], kind: PatternKind) -> Vec<(i32, i32)> {
    out.iter()
        .filter(|(k, _)| *k == kind)
        .flat_map(|(_, b)| {
            let parent_id = b.parent.trade_id;
            b.children.iter().map(move |c| (parent_id, c.trade_id))
        })
        .collect()
}

// ── Test 1: basic copy ──
// Two same-side trades of the two users, 30s apart, equal lots.
// One COPY pair; no REVERSAL; no PARTIAL_COPY (exact equal lots).
#[test]
fn test_basic_copy() {
    let trades = [
        trade(0, LOT, Side::Buy, 1, 1, 42),
        trade(30_000, LOT, Side::Buy, 2, 2, 57),
    ];
    let out = classify(Mode::A, &trades);

    assert_eq!(pairs_of(&out, PatternKind::Copy), vec![(1, 2)]);
    assert!(pairs_of(&out, PatternKind::Reversal).is_empty());
    assert!(pairs_of(&out, PatternKind::PartialCopy).is_empty());
}

// ── Test 2: reversal ──
// A SELL arrives after two BUYs. The reversal child attaches to the oldest
// eligible parent only (first matching parent wins).
#[test]
fn test_reversal_attaches_to_oldest_parent() {
    let trades = [
        trade(0, LOT, Side::Buy, 1, 1, 42),
        trade(30_000, LOT, Side::Buy, 2, 2, 57),
        trade(60_000, LOT, Side::Sell, 3, 3, 57),
    ];
    let out = classify(Mode::A, &trades);

    assert_eq!(pairs_of(&out, PatternKind::Copy), vec![(1, 2)]);
    assert_eq!(pairs_of(&out, PatternKind::Reversal), vec![(1, 3)]);
    assert!(pairs_of(&out, PatternKind::PartialCopy).is_empty());
}

// ── Test 3: partial copy ──
// Same side, lot ratio 1.2: both a COPY pair and a PARTIAL_COPY pair.
#[test]
fn test_partial_copy() {
    let trades = [
        trade(0, LOT, Side::Buy, 1, 1, 42),
        trade(10_000, 120_000_000, Side::Buy, 2, 2, 57),
    ];
    let out = classify(Mode::A, &trades);

    assert_eq!(pairs_of(&out, PatternKind::Copy), vec![(1, 2)]);
    assert_eq!(pairs_of(&out, PatternKind::PartialCopy), vec![(1, 2)]);
    assert!(pairs_of(&out, PatternKind::Reversal).is_empty());
}

// ── Test 4: window edge ──
// A follower at exactly W attaches; one past W finds the parent evicted and
// opens a fresh batch instead.
#[test]
fn test_window_edge() {
    let trades = [
        trade(0, LOT, Side::Buy, 1, 1, 42),
        trade(MATCH_WINDOW_MS, LOT, Side::Buy, 2, 2, 57),
        trade(MATCH_WINDOW_MS + 1, LOT, Side::Buy, 3, 3, 57),
    ];
    let out = classify(Mode::A, &trades);

    assert_eq!(pairs_of(&out, PatternKind::Copy), vec![(1, 2)]);

    let copy_parents: Vec<i32> = out
        .iter()
        .filter(|(k, _)| *k == PatternKind::Copy)
        .map(|(_, b)| b.parent.trade_id)
        .collect();
    assert_eq!(copy_parents, vec![1, 3], "the trade past W must become a new parent");
}

// ── Test 5: mode B violation vs mode A suppression ──
// Same user on two accounts: one COPY pair flagged as a violation in Mode B,
// nothing at all in Mode A.
#[test]
fn test_same_user_pair_mode_b_only() {
    let trades = [
        trade(0, LOT, Side::Buy, 1, 1, 42),
        trade(5_000, LOT, Side::Buy, 2, 2, 42),
    ];

    let out_b = classify(Mode::B, &trades);
    assert_eq!(pairs_of(&out_b, PatternKind::Copy), vec![(1, 2)]);
    let policy = MatchPolicy { mode: Mode::B, users: UserPair::new(42, 57).unwrap() };
    let (_, batch) = out_b.iter().find(|(k, _)| *k == PatternKind::Copy).unwrap();
    assert!(policy.is_violation(&batch.parent, &batch.children[0]));

    let out_a = classify(Mode::A, &trades);
    for kind in PatternKind::ALL {
        assert!(pairs_of(&out_a, kind).is_empty(), "mode A must suppress same-user pairs");
    }
}

// ── Test 6: dust filter ──
// duration <= 1000ms and lot < 0.01: dropped before classification.
#[test]
fn test_dust_filter() {
    let policy = MatchPolicy { mode: Mode::A, users: UserPair::new(42, 57).unwrap() };
    let mut matcher = Matcher::new(policy, 1);
    let mut out: Vec<(PatternKind, Batch)> = Vec::new();

    let mut dust = trade(0, 100_000, Side::Buy, 1, 1, 42);
    dust.duration_ms = 500;
    dust.close_ts = 500;
    assert!(!matcher.process(dust, &mut out).unwrap());

    assert!(matcher.process(trade(1_000, LOT, Side::Buy, 2, 2, 57), &mut out).unwrap());
    matcher.finish(&mut out);
    assert!(pairs_of(&out, PatternKind::Copy).is_empty(), "dust must never become a parent");
}

// ── Test 7: ineligible heads are skipped, not evicted ──
// Trade 2 cannot attach to trade 1 (same user in Mode A) so it opens its
// own batch; trade 3 shares an account with the head parent and must fall
// through to trade 2 without disturbing the head.
#[test]
fn test_first_eligible_parent_wins() {
    let trades = [
        trade(0, LOT, Side::Buy, 1, 1, 42),
        trade(10_000, LOT, Side::Buy, 2, 2, 42),
        trade(20_000, LOT, Side::Buy, 3, 1, 57),
    ];
    let out = classify(Mode::A, &trades);

    assert_eq!(pairs_of(&out, PatternKind::Copy), vec![(2, 3)]);

    let copy_parents: Vec<i32> = out
        .iter()
        .filter(|(k, _)| *k == PatternKind::Copy)
        .map(|(_, b)| b.parent.trade_id)
        .collect();
    assert_eq!(copy_parents, vec![1, 2], "skipping a head must not remove it");
}

// ── Test 8: stream properties on a generated dataset ──
// Attachment validity, coverage, side relations, and determinism over a
// seeded synthetic stream.
#[test]
fn test_properties_on_generated_stream() {
    let users = UserPair::new(0, 1).unwrap();
    let trades = DatasetGenerator::new(5, 0.3).generate(2);
    assert!(trades.len() > 100, "generator should produce a meaningful stream");

    let run = |mode: Mode| {
        let mut matcher =
            Matcher::new(MatchPolicy { mode, users }, generator::SYMBOLS.len());
        let mut out: Vec<(PatternKind, Batch)> = Vec::new();
        let mut analyzed = 0u64;
        for &t in &trades {
            if matcher.process(t, &mut out).unwrap() {
                analyzed += 1;
            }
        }
        matcher.finish(&mut out);
        (analyzed, out)
    };

    let (analyzed, out) = run(Mode::B);

    // Every emitted pair satisfies the window, identity, and kind predicates.
    for (kind, batch) in &out {
        for child in &batch.children {
            let p = &batch.parent;
            assert_eq!(p.symbol, child.symbol);
            assert_ne!(p.trade_id, child.trade_id);
            assert_ne!(p.account_id, child.account_id);
            assert!(child.open_ts - p.open_ts <= MATCH_WINDOW_MS);
            assert!(child.open_ts >= p.open_ts);
            assert!(users.contains(p.user_id) && users.contains(child.user_id));
            match kind {
                PatternKind::Copy => assert_eq!(p.side, child.side),
                PatternKind::Reversal => assert_ne!(p.side, child.side),
                PatternKind::PartialCopy => {
                    assert_eq!(p.side, child.side);
                    assert_ne!(p.lot, child.lot);
                    let (pl, cl) = (p.lot as i128, child.lot as i128);
                    assert!(70 * pl <= 100 * cl && 100 * cl <= 130 * pl);
                }
            }
        }
    }

    // Coverage: per kind, every analyzed trade appears exactly once as a
    // parent or as a child.
    for kind in PatternKind::ALL {
        let batches: Vec<&Batch> =
            out.iter().filter(|(k, _)| *k == kind).map(|(_, b)| b).collect();
        let children: usize = batches.iter().map(|b| b.children.len()).sum();
        assert_eq!(
            batches.len() as u64 + children as u64,
            analyzed,
            "coverage broken for {kind:?}"
        );
    }

    // A second run over the same input yields the identical pair multiset.
    let (analyzed_again, out_again) = run(Mode::B);
    assert_eq!(analyzed, analyzed_again);
    let key = |out: &[(PatternKind, Batch)]| {
        let mut keys: Vec<(PatternKind, i32, i32)> = out
            .iter()
            .flat_map(|(k, b)| {
                let parent_id = b.parent.trade_id;
                b.children.iter().map(move |c| (*k, parent_id, c.trade_id)).collect::<Vec<_>>()
            })
            .collect();
        keys.sort();
        keys
    };
    assert_eq!(key(&out), key(&out_again));
}

// ── Test 9: non-monotonic input aborts ──
#[test]
fn test_out_of_order_stream_aborts() {
    let policy = MatchPolicy { mode: Mode::A, users: UserPair::new(42, 57).unwrap() };
    let mut matcher = Matcher::new(policy, 1);
    let mut out: Vec<(PatternKind, Batch)> = Vec::new();

    matcher.process(trade(10_000, LOT, Side::Buy, 1, 1, 42), &mut out).unwrap();
    let err = matcher.process(trade(9_999, LOT, Side::Buy, 2, 2, 57), &mut out).unwrap_err();
    assert!(matches!(
        err,
        MatchError::NonMonotonicOpenTs { current: 9_999, last: 10_000, trade_id: 2 }
    ));
}

// ── Test 10: dataset format errors ──
#[test]
fn test_dataset_rejects_misaligned_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dataset.bin");
    fs::write(&path, vec![0u8; RECORD_SIZE + 7]).unwrap();

    match DatasetReader::open(&path) {
        Err(DatasetError::MisalignedLength { len, record_size }) => {
            assert_eq!(len, (RECORD_SIZE + 7) as u64);
            assert_eq!(record_size, RECORD_SIZE);
        }
        other => panic!("expected MisalignedLength, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_dataset_rejects_invalid_side_byte() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dataset.bin");

    let good = trade(0, LOT, Side::Buy, 1, 1, 42);
    dataset::write_trades(&path, &[good, good]).unwrap();
    let mut bytes = fs::read(&path).unwrap();
    bytes[RECORD_SIZE + 28] = 9;
    fs::write(&path, bytes).unwrap();

    let results: Vec<_> = DatasetReader::open(&path).unwrap().collect();
    assert_eq!(results.len(), 2);
    assert!(results[0].is_ok());
    assert!(matches!(
        results[1],
        Err(DatasetError::InvalidSide { byte: 9, offset }) if offset == (RECORD_SIZE + 28) as u64
    ));
}

// ── Test 11: end-to-end scan over a real file ──
// Writes a dataset + symbols + config into a temp dir, runs the full
// reader → matcher → CSV pipeline in Mode B, and checks the report files.
#[test]
fn test_end_to_end_scan() {
    let dir = tempfile::tempdir().unwrap();
    let dataset_path = dir.path().join("dataset.bin");
    let symbols_path = dir.path().join("symbols.json");
    let config_path = dir.path().join("config.json");
    let out_dir = dir.path().join("results");

    let trades = [
        trade(0, LOT, Side::Buy, 1, 1, 42),
        trade(30_000, LOT, Side::Buy, 2, 2, 57),
        trade(60_000, LOT, Side::Sell, 3, 3, 57),
        // Same user, different account: violation in Mode B.
        trade(90_000, LOT, Side::Buy, 4, 4, 42),
        // Foreign user: pre-filtered.
        trade(95_000, LOT, Side::Buy, 5, 5, 7),
    ];
    dataset::write_trades(&dataset_path, &trades).unwrap();
    fs::write(&symbols_path, r#"["EURUSD"]"#).unwrap();
    fs::write(
        &config_path,
        format!(
            r#"{{"dataset_path": {:?}, "symbols_path": {:?}, "mode": "B"}}"#,
            dataset_path, symbols_path
        ),
    )
    .unwrap();

    let config = Config::load(&config_path).unwrap();
    assert_eq!(config.mode, Mode::B);
    let users = UserPair::new(42, 57).unwrap();
    let symbols = SymbolTable::load(&config.symbols_path).unwrap();

    let mut matcher =
        Matcher::new(MatchPolicy { mode: config.mode, users }, symbols.len());
    let mut reports = CsvReports::create(&out_dir, config.mode, symbols).unwrap();
    for record in DatasetReader::open(&config.dataset_path).unwrap() {
        matcher.process(record.unwrap(), &mut reports).unwrap();
    }
    matcher.finish(&mut reports);
    let totals = reports.finish().unwrap();

    // Copy pairs: (1,2), (1,4) with the second one a violation. Reversal:
    // (1,3) only (oldest parent wins). No partial copies (equal lots).
    assert_eq!(totals.pairs[PatternKind::Copy as usize], 2);
    assert_eq!(totals.pairs[PatternKind::Reversal as usize], 1);
    assert_eq!(totals.pairs[PatternKind::PartialCopy as usize], 0);
    assert_eq!(totals.violations_total(), 1);

    let copy_csv = fs::read_to_string(out_dir.join("copy_trades.csv")).unwrap();
    let lines: Vec<&str> = copy_csv.lines().collect();
    assert_eq!(lines.len(), 3, "header + two copy rows, got: {copy_csv}");
    assert!(lines[0].starts_with("Trade ID A,Trade ID B,"));
    assert!(lines[0].ends_with(",Violation"));
    assert_eq!(
        lines[1],
        format!("1,2,42,57,1,2,EURUSD,Long,Long,{LOT},{LOT},0,60000,30000,90000,No")
    );
    assert_eq!(
        lines[2],
        format!("1,4,42,42,1,4,EURUSD,Long,Long,{LOT},{LOT},0,60000,90000,150000,Yes")
    );

    let reversal_csv = fs::read_to_string(out_dir.join("reversal_trades.csv")).unwrap();
    assert_eq!(reversal_csv.lines().count(), 2, "header + one reversal row");

    let partial_csv = fs::read_to_string(out_dir.join("partial_copy_trades.csv")).unwrap();
    assert_eq!(partial_csv.lines().count(), 1, "header only");
}

// ── Test 12: reading the same file twice doubles every pair ──
#[test]
fn test_two_passes_double_the_pairs() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("dataset.bin");
    let trades = [
        trade(0, LOT, Side::Buy, 1, 1, 42),
        trade(30_000, LOT, Side::Buy, 2, 2, 57),
    ];
    dataset::write_trades(&path, &trades).unwrap();

    let mut pair_count = 0usize;
    for _ in 0..2 {
        let policy = MatchPolicy { mode: Mode::A, users: UserPair::new(42, 57).unwrap() };
        let mut matcher = Matcher::new(policy, 1);
        let mut out: Vec<(PatternKind, Batch)> = Vec::new();
        for record in DatasetReader::open(&path).unwrap() {
            matcher.process(record.unwrap(), &mut out).unwrap();
        }
        matcher.finish(&mut out);
        pair_count += pairs_of(&out, PatternKind::Copy).len();
    }
    assert_eq!(pair_count, 2);
}
