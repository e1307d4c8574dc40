//! Parser for the systemd journal export format, as produced by
//! `journalctl --output=export`.
//!
//! Entries are blank-line separated groups of fields. A `NAME=value` line
//! carries a text field; a bare `NAME` line introduces a binary field whose
//! value follows as a 64-bit little-endian length, that many raw bytes, and
//! a trailing newline.

use super::{JournalError, RawEntry, Result};
use crate::cursor::Cursor;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

const CURSOR_FIELD: &str = "__CURSOR";
const REALTIME_FIELD: &str = "__REALTIME_TIMESTAMP";
const MONOTONIC_FIELD: &str = "__MONOTONIC_TIMESTAMP";
const BOOT_ID_FIELD: &str = "_BOOT_ID";

/// Read one complete entry from the stream. Returns `Ok(None)` at a clean
/// end of stream; a stream that ends mid-entry is a parse error, because the
/// resume position can no longer be trusted.
pub async fn read_entry<R: AsyncBufRead + Unpin>(reader: &mut R) -> Result<Option<RawEntry>> {
    let mut raw: Vec<(String, String)> = Vec::new();
    let mut line: Vec<u8> = Vec::new();

    loop {
        line.clear();
        let n = reader.read_until(b'\n', &mut line).await?;
        if n == 0 {
            if raw.is_empty() {
                return Ok(None);
            }
            return Err(JournalError::Parse("stream ended mid-entry".to_string()));
        }
        if line.last() == Some(&b'\n') {
            line.pop();
        }

        if line.is_empty() {
            if raw.is_empty() {
                // Tolerate extra blank lines between entries
                continue;
            }
            break;
        }

        match line.iter().position(|&b| b == b'=') {
            Some(pos) => {
                let name = String::from_utf8_lossy(&line[..pos]).into_owned();
                let value = String::from_utf8_lossy(&line[pos + 1..]).into_owned();
                raw.push((name, value));
            }
            None => {
                // Binary field: length-prefixed raw value
                let name = String::from_utf8_lossy(&line).into_owned();
                let mut len_buf = [0u8; 8];
                reader.read_exact(&mut len_buf).await?;
                let len = u64::from_le_bytes(len_buf) as usize;
                let mut data = vec![0u8; len];
                reader.read_exact(&mut data).await?;
                let mut newline = [0u8; 1];
                reader.read_exact(&mut newline).await?;
                if newline[0] != b'\n' {
                    return Err(JournalError::Parse(format!(
                        "binary field {} not newline-terminated",
                        name
                    )));
                }
                raw.push((name, String::from_utf8_lossy(&data).into_owned()));
            }
        }
    }

    into_entry(raw).map(Some)
}

/// Split the address fields (`__` prefixed, synthesized by the journal) out
/// of the field list and build the entry. `_BOOT_ID` is both metadata and an
/// ordinary field.
fn into_entry(raw: Vec<(String, String)>) -> Result<RawEntry> {
    let mut cursor: Option<Cursor> = None;
    let mut realtime_usec: Option<u64> = None;
    let mut monotonic_usec = 0u64;
    let mut boot_id = String::new();
    let mut fields = Vec::with_capacity(raw.len());

    for (name, value) in raw {
        match name.as_str() {
            CURSOR_FIELD => cursor = Some(Cursor::new(value)),
            REALTIME_FIELD => {
                realtime_usec = Some(value.parse().map_err(|_| {
                    JournalError::Parse(format!("bad realtime timestamp '{}'", value))
                })?);
            }
            MONOTONIC_FIELD => {
                monotonic_usec = value.parse().map_err(|_| {
                    JournalError::Parse(format!("bad monotonic timestamp '{}'", value))
                })?;
            }
            _ if name.starts_with("__") => {
                // Unknown address field, not part of the entry payload
            }
            _ => {
                if name == BOOT_ID_FIELD {
                    boot_id = value.clone();
                }
                fields.push((name, value));
            }
        }
    }

    Ok(RawEntry {
        fields,
        realtime_usec: realtime_usec.ok_or(JournalError::MissingField(REALTIME_FIELD))?,
        monotonic_usec,
        boot_id,
        cursor: cursor.ok_or(JournalError::MissingField(CURSOR_FIELD))?,
    })
}
