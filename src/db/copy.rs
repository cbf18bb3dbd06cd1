//! PostgreSQL binary COPY encoding for raw rows.
//!
//! ```text
//! header   PGCOPY\n\377\r\n\0  flags:i32=0  ext:i32=0
//! tuple    fields:i16=2  len:i32=4 pkey:i32  len:i32=n+1 0x01 json[n]
//! trailer  -1:i16
//! ```
//!
//! The `jsonb` binary wire format is a version byte (1) followed by the
//! document text.

use super::RawRow;

const SIGNATURE: &[u8; 11] = b"PGCOPY\n\xff\r\n\0";
const JSONB_VERSION: u8 = 1;

/// Statement that accepts the encoded stream.
pub fn copy_statement(qualified_table: &str) -> String {
    format!(
        "COPY {} (\"__id\", \"jsonb\") FROM STDIN (FORMAT BINARY)",
        qualified_table
    )
}

/// Writes COPY BINARY data for `(__id integer, jsonb jsonb)` tuples.
#[derive(Debug, Default)]
pub struct CopyEncoder {
    buf: Vec<u8>,
}

impl CopyEncoder {
    /// Start a stream with the header already written.
    pub fn new() -> Self {
        let mut buf = Vec::with_capacity(64 * 1024);
        buf.extend_from_slice(SIGNATURE);
        buf.extend_from_slice(&0i32.to_be_bytes());
        buf.extend_from_slice(&0i32.to_be_bytes());
        Self { buf }
    }

    /// Append one tuple. Keys beyond `i32` are truncated by the column type
    /// anyway, so they are rejected here.
    pub fn push(&mut self, row: &RawRow) -> Result<(), String> {
        let pkey = i32::try_from(row.pkey)
            .map_err(|_| format!("record key {} does not fit an INTEGER column", row.pkey))?;
        let json = row.json.as_bytes();
        let len = i32::try_from(json.len() + 1)
            .map_err(|_| format!("record {} is too large to copy", row.pkey))?;

        self.buf.extend_from_slice(&2i16.to_be_bytes());
        self.buf.extend_from_slice(&4i32.to_be_bytes());
        self.buf.extend_from_slice(&pkey.to_be_bytes());
        self.buf.extend_from_slice(&len.to_be_bytes());
        self.buf.push(JSONB_VERSION);
        self.buf.extend_from_slice(json);
        Ok(())
    }

    /// Append the trailer and return the encoded stream.
    pub fn finish(mut self) -> Vec<u8> {
        self.buf.extend_from_slice(&(-1i16).to_be_bytes());
        self.buf
    }
}
