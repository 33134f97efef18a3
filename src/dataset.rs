//! Fixed-width binary trade records: packed little-endian, 45 bytes each,
//! sorted by open timestamp.

use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;

use crate::error::DatasetError;
use crate::types::{Side, Trade};

/// i64 open_ts + i64 close_ts + i32 duration_ms + i64 lot + u8 side
/// + i32 trade_id + i32 symbol + i32 account_id + i32 user_id, no padding.
pub const RECORD_SIZE: usize = 45;

/// Records per read. The format contract asks for chunks of at least 1000.
const CHUNK_RECORDS: usize = 1024;

/// Streaming reader over a dataset file. Decodes records chunk by chunk
/// without materializing the stream; yields trades in file order.
pub struct DatasetReader {
    file: File,
    buf: Vec<u8>,
    filled: usize,
    pos: usize,
    offset: u64,
    failed: bool,
}

impl DatasetReader {
    pub fn open(path: &Path) -> Result<Self, DatasetError> {
        let file = File::open(path)?;
        let len = file.metadata()?.len();
        if len % RECORD_SIZE as u64 != 0 {
            return Err(DatasetError::MisalignedLength { len, record_size: RECORD_SIZE });
        }
        Ok(Self {
            file,
            buf: vec![0u8; CHUNK_RECORDS * RECORD_SIZE],
            filled: 0,
            pos: 0,
            offset: 0,
            failed: false,
        })
    }

    fn refill(&mut self) -> Result<usize, DatasetError> {
        self.filled = 0;
        self.pos = 0;
        while self.filled < self.buf.len() {
            let n = self.file.read(&mut self.buf[self.filled..])?;
            if n == 0 {
                break;
            }
            self.filled += n;
        }
        // The length check at open time guarantees whole records per chunk.
        debug_assert_eq!(self.filled % RECORD_SIZE, 0);
        Ok(self.filled)
    }
}

impl Iterator for DatasetReader {
    type Item = Result<Trade, DatasetError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        if self.pos == self.filled {
            match self.refill() {
                Ok(0) => return None,
                Ok(_) => {}
                Err(e) => {
                    self.failed = true;
                    return Some(Err(e));
                }
            }
        }
        let record = &self.buf[self.pos..self.pos + RECORD_SIZE];
        let decoded = decode_record(record, self.offset);
        self.pos += RECORD_SIZE;
        self.offset += RECORD_SIZE as u64;
        if decoded.is_err() {
            self.failed = true;
        }
        Some(decoded)
    }
}

fn decode_record(rec: &[u8], offset: u64) -> Result<Trade, DatasetError> {
    let open_ts = i64::from_le_bytes(rec[0..8].try_into().unwrap());
    let close_ts = i64::from_le_bytes(rec[8..16].try_into().unwrap());
    let duration_ms = i32::from_le_bytes(rec[16..20].try_into().unwrap());
    let lot = i64::from_le_bytes(rec[20..28].try_into().unwrap());
    if lot < 0 {
        return Err(DatasetError::NegativeLot { lot, offset: offset + 20 });
    }
    let side = Side::from_byte(rec[28])
        .ok_or(DatasetError::InvalidSide { byte: rec[28], offset: offset + 28 })?;
    let trade_id = i32::from_le_bytes(rec[29..33].try_into().unwrap());
    let symbol = i32::from_le_bytes(rec[33..37].try_into().unwrap());
    let account_id = i32::from_le_bytes(rec[37..41].try_into().unwrap());
    let user_id = i32::from_le_bytes(rec[41..45].try_into().unwrap());
    Ok(Trade {
        open_ts,
        close_ts,
        duration_ms,
        lot,
        side,
        trade_id,
        symbol,
        account_id,
        user_id,
    })
}

pub fn encode_record(trade: &Trade, out: &mut Vec<u8>) {
    out.extend_from_slice(&trade.open_ts.to_le_bytes());
    out.extend_from_slice(&trade.close_ts.to_le_bytes());
    out.extend_from_slice(&trade.duration_ms.to_le_bytes());
    out.extend_from_slice(&trade.lot.to_le_bytes());
    out.push(trade.side as u8);
    out.extend_from_slice(&trade.trade_id.to_le_bytes());
    out.extend_from_slice(&trade.symbol.to_le_bytes());
    out.extend_from_slice(&trade.account_id.to_le_bytes());
    out.extend_from_slice(&trade.user_id.to_le_bytes());
}

/// Writes trades in the record format, chunk-buffered. The caller is
/// responsible for passing them sorted by open timestamp.
pub fn write_trades(path: &Path, trades: &[Trade]) -> std::io::Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    let mut buf = Vec::with_capacity(CHUNK_RECORDS * RECORD_SIZE);
    for chunk in trades.chunks(CHUNK_RECORDS) {
        buf.clear();
        for trade in chunk {
            encode_record(trade, &mut buf);
        }
        writer.write_all(&buf)?;
    }
    writer.flush()
}
