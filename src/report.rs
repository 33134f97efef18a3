//! CSV report emission: one stream per pattern kind, one row per
//! (parent, child) pair, written as batches are evicted from the window.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;

use crate::config::{Mode, SymbolTable};
use crate::detection::BatchSink;
use crate::types::{Batch, PatternKind, Trade};

const HEADER: &str = "Trade ID A,Trade ID B,User ID A,User ID B,Account ID A,Account ID B,\
Symbol,Side A,Side B,Lot size A,Lot size B,Trade open date A,Trade close date A,\
Trade open date B,Trade close date B";

#[derive(Debug, Clone, Default)]
pub struct ReportTotals {
    /// Emitted batches per kind, including childless ones (zero rows).
    pub batches: [u64; 3],
    /// Report rows per kind.
    pub pairs: [u64; 3],
    /// Same-user rows per kind; only populated in Mode B.
    pub violations: [u64; 3],
}

impl ReportTotals {
    pub fn pairs_total(&self) -> u64 {
        self.pairs.iter().sum()
    }

    pub fn violations_total(&self) -> u64 {
        self.violations.iter().sum()
    }
}

/// The production batch sink: three buffered CSV writers. Write failures are
/// held until `finish` so the matcher loop stays infallible.
pub struct CsvReports {
    mode: Mode,
    symbols: SymbolTable,
    writers: [BufWriter<File>; 3],
    totals: ReportTotals,
    error: Option<io::Error>,
}

impl CsvReports {
    pub fn create(out_dir: &Path, mode: Mode, symbols: SymbolTable) -> io::Result<Self> {
        fs::create_dir_all(out_dir)?;
        let mut writers = Vec::with_capacity(3);
        for kind in PatternKind::ALL {
            let path = out_dir.join(format!("{}.csv", kind.label()));
            let mut writer = BufWriter::new(File::create(path)?);
            match mode {
                Mode::A => writeln!(writer, "{HEADER}")?,
                Mode::B => writeln!(writer, "{HEADER},Violation")?,
            }
            writers.push(writer);
        }
        let writers = match <[BufWriter<File>; 3]>::try_from(writers) {
            Ok(w) => w,
            Err(_) => unreachable!("exactly three report writers are created"),
        };
        Ok(Self { mode, symbols, writers, totals: ReportTotals::default(), error: None })
    }

    fn write_pair(&mut self, kind: PatternKind, parent: &Trade, child: &Trade) -> io::Result<()> {
        let slot = kind as usize;
        let symbol = self.symbols.name(parent.symbol).unwrap_or("<unknown>");
        let writer = &mut self.writers[slot];
        write!(
            writer,
            "{},{},{},{},{},{},{},{},{},{},{},{},{},{},{}",
            parent.trade_id,
            child.trade_id,
            parent.user_id,
            child.user_id,
            parent.account_id,
            child.account_id,
            symbol,
            parent.side.label(),
            child.side.label(),
            parent.lot,
            child.lot,
            parent.open_ts,
            parent.close_ts,
            child.open_ts,
            child.close_ts,
        )?;
        if self.mode == Mode::B {
            let violation = parent.user_id == child.user_id;
            if violation {
                self.totals.violations[slot] += 1;
            }
            write!(writer, ",{}", if violation { "Yes" } else { "No" })?;
        }
        writeln!(writer)?;
        self.totals.pairs[slot] += 1;
        Ok(())
    }

    /// Flushes all three streams and reports the first write error, if any.
    pub fn finish(mut self) -> io::Result<ReportTotals> {
        if let Some(err) = self.error.take() {
            return Err(err);
        }
        for writer in &mut self.writers {
            writer.flush()?;
        }
        Ok(self.totals)
    }
}

impl BatchSink for CsvReports {
    fn emit(&mut self, kind: PatternKind, batch: Batch) {
        if self.error.is_some() {
            return;
        }
        self.totals.batches[kind as usize] += 1;
        for child in &batch.children {
            if let Err(err) = self.write_pair(kind, &batch.parent, child) {
                self.error = Some(err);
                return;
            }
        }
    }
}
