//! Tag block: optional `key=value` metadata trailing the compressed block.
//!
//! ```text
//! [TAG]title=Green Hill Zone
//! comment=first line
//! comment=second line
//! _lib=sonic.gsflib
//! ```
//!
//! # Line rules
//! - Leading bytes `<= 0x20` are skipped.
//! - The key runs up to the first `=` or whitespace byte.  Any byte `>= 0x7F`
//!   in the key makes the line malformed.
//! - Whitespace may separate the key from `=`; anything else there, or no
//!   `=` at all, makes the line malformed.
//! - In the value, bytes `< 0x20` and `> 0x7F` become spaces.  Non-ASCII
//!   text is therefore not preserved.  Inner whitespace is kept as-is.
//! - A line whose key equals the key of the previous tag is appended to that
//!   tag's value after a `\n`.  Only the immediately preceding tag counts.
//!
//! Malformed lines are skipped; they never fail the block.  A missing or
//! short `[TAG]` marker simply means there are no tags.
//!
//! Lines longer than the line limit (1024 bytes by default) keep their first
//! `limit` bytes; the remainder up to the next `\n` is discarded.

use serde::Serialize;
use std::fmt;
use std::io::{self, BufRead, Read};
use tracing::{debug, trace, warn};

pub const TAG_MAGIC: &[u8; 5] = b"[TAG]";
pub const DEFAULT_LINE_LIMIT: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tag {
    pub key:   String,
    pub value: String,
}

impl Tag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self { key: key.into(), value: value.into() }
    }
}

/// Why a tag line was skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MalformedLine {
    EmptyKey,
    InvalidKeyByte { byte: u8, offset: usize },
    MissingSeparator,
}

impl fmt::Display for MalformedLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MalformedLine::EmptyKey => f.write_str("empty key"),
            MalformedLine::InvalidKeyByte { byte, offset } => {
                write!(f, "byte {byte:#04x} at offset {offset} is not allowed in a key")
            }
            MalformedLine::MissingSeparator => f.write_str("no '=' after key"),
        }
    }
}

// ── Block reader ─────────────────────────────────────────────────────────────

/// Read the tag block from the current position to end of stream.
pub fn read_tags<R: BufRead>(mut reader: R, line_limit: usize) -> io::Result<Vec<Tag>> {
    let mut magic = [0u8; 5];
    match reader.read_exact(&mut magic) {
        Ok(()) => {}
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => {
            debug!("no tag block");
            return Ok(Vec::new());
        }
        Err(e) => return Err(e),
    }
    if &magic != TAG_MAGIC {
        debug!(found = ?magic, "no [TAG] marker after program data");
        return Ok(Vec::new());
    }

    let mut tags: Vec<Tag> = Vec::new();
    let mut line = Vec::with_capacity(line_limit.min(4096));
    let mut line_no = 0usize;

    while read_line_capped(&mut reader, &mut line, line_limit)? {
        line_no += 1;
        match parse_line(&line) {
            Ok(Some(tag)) => {
                trace!(line = line_no, key = %tag.key, "tag");
                push_tag(&mut tags, tag);
            }
            Ok(None) => {}
            Err(reason) => warn!(line = line_no, %reason, "skipping malformed tag line"),
        }
    }

    debug!(lines = line_no, tags = tags.len(), "parsed tag block");
    Ok(tags)
}

/// Convenience wrapper for an in-memory block that starts with `[TAG]`.
pub fn parse_tag_block(block: &[u8]) -> Vec<Tag> {
    // Reading from a slice cannot fail.
    read_tags(block, DEFAULT_LINE_LIMIT).unwrap_or_default()
}

/// Append `tag`, or fold it into the previous tag when the keys match.
fn push_tag(tags: &mut Vec<Tag>, tag: Tag) {
    match tags.last_mut() {
        Some(prev) if prev.key == tag.key => {
            prev.value.push('\n');
            prev.value.push_str(&tag.value);
        }
        _ => tags.push(tag),
    }
}

/// Read one `\n`-terminated line into `buf`, keeping at most `limit` bytes.
/// Returns `false` once the stream is exhausted.
fn read_line_capped<R: BufRead>(reader: &mut R, buf: &mut Vec<u8>, limit: usize) -> io::Result<bool> {
    buf.clear();
    let mut read_any = false;
    loop {
        let available = match reader.fill_buf() {
            Ok(b) => b,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        if available.is_empty() {
            return Ok(read_any);
        }
        read_any = true;

        let (chunk, used, done) = match available.iter().position(|&b| b == b'\n') {
            Some(i) => (&available[..i], i + 1, true),
            None    => (available, available.len(), false),
        };
        let room = limit.saturating_sub(buf.len());
        buf.extend_from_slice(&chunk[..chunk.len().min(room)]);
        reader.consume(used);

        if done {
            return Ok(true);
        }
    }
}

// ── Line parser ──────────────────────────────────────────────────────────────

#[inline]
fn is_blank(b: u8) -> bool {
    b <= 0x20
}

/// Parse one line (without its terminator).  `Ok(None)` for a blank line.
pub fn parse_line(line: &[u8]) -> Result<Option<Tag>, MalformedLine> {
    let start = match line.iter().position(|&b| !is_blank(b)) {
        Some(i) => i,
        None    => return Ok(None),
    };

    let mut i = start;
    while i < line.len() {
        let b = line[i];
        if b == b'=' || is_blank(b) {
            break;
        }
        if b >= 0x7F {
            return Err(MalformedLine::InvalidKeyByte { byte: b, offset: i });
        }
        i += 1;
    }
    let key_end = i;

    while i < line.len() && is_blank(line[i]) {
        i += 1;
    }
    if i == line.len() || line[i] != b'=' {
        return Err(MalformedLine::MissingSeparator);
    }
    if key_end == start {
        return Err(MalformedLine::EmptyKey);
    }

    let key: String = line[start..key_end].iter().map(|&b| b as char).collect();
    let value: String = line[i + 1..]
        .iter()
        .map(|&b| if b < 0x20 || b > 0x7F { ' ' } else { b as char })
        .collect();
    Ok(Some(Tag { key, value }))
}
