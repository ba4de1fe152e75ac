//! Memory trace reader.
//!
//! One request per line: `<host-cycle> <op> <address>`, where `op` is one of
//! `R` (read), `W` (write), `U` (update), `E` (evict), `M` (migrate hint) and
//! the address is hexadecimal with an optional `0x` prefix. Blank lines and
//! lines starting with `#` are skipped. Cycles must not decrease.

use std::fs;
use std::path::{Path, PathBuf};

use asymdram_core::common::MemoryOp;
use thiserror::Error;

/// A single trace entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TraceRecord {
    /// Host cycle at which the request becomes eligible for injection.
    pub cycle: u64,
    /// Operation.
    pub op: MemoryOp,
    /// Byte address.
    pub address: u64,
}

/// Trace loading failure.
#[derive(Debug, Error)]
pub enum TraceError {
    /// The trace file could not be read.
    #[error("failed to read trace {path}: {source}")]
    Io {
        /// Trace path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A line could not be parsed.
    #[error("trace line {line}: {reason}")]
    Malformed {
        /// One-based line number.
        line: usize,
        /// What was wrong.
        reason: String,
    },
}

/// Parses one trace line. Returns `Ok(None)` for blank and comment lines.
pub fn parse_line(line: usize, text: &str) -> Result<Option<TraceRecord>, TraceError> {
    let text = text.trim();
    if text.is_empty() || text.starts_with('#') {
        return Ok(None);
    }
    let malformed = |reason: String| TraceError::Malformed { line, reason };

    let fields: Vec<&str> = text.split_whitespace().collect();
    let [cycle, op, address] = fields.as_slice() else {
        return Err(malformed(format!("expected 3 fields, found {}", fields.len())));
    };

    let cycle = cycle
        .parse()
        .map_err(|_| malformed(format!("bad cycle {cycle:?}")))?;
    let op = match *op {
        "R" | "r" => MemoryOp::Read,
        "W" | "w" => MemoryOp::Write,
        "U" | "u" => MemoryOp::Update,
        "E" | "e" => MemoryOp::Evict,
        "M" | "m" => MemoryOp::Migrate,
        other => return Err(malformed(format!("unknown operation {other:?}"))),
    };
    let digits = address
        .strip_prefix("0x")
        .or_else(|| address.strip_prefix("0X"))
        .unwrap_or(address);
    let address = u64::from_str_radix(digits, 16)
        .map_err(|_| malformed(format!("bad address {address:?}")))?;

    Ok(Some(TraceRecord { cycle, op, address }))
}

/// Parses a whole trace.
pub fn parse(text: &str) -> Result<Vec<TraceRecord>, TraceError> {
    let mut records: Vec<TraceRecord> = Vec::new();
    for (number, line) in text.lines().enumerate() {
        let Some(record) = parse_line(number + 1, line)? else {
            continue;
        };
        if let Some(last) = records.last()
            && record.cycle < last.cycle
        {
            return Err(TraceError::Malformed {
                line: number + 1,
                reason: format!("cycle {} precedes {}", record.cycle, last.cycle),
            });
        }
        records.push(record);
    }
    Ok(records)
}

/// Reads and parses the trace at `path`.
pub fn load(path: &Path) -> Result<Vec<TraceRecord>, TraceError> {
    let text = fs::read_to_string(path).map_err(|source| TraceError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse(&text)
}
