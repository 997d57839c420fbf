//! Read-only summary of a container tree for display.

use serde::Serialize;
use std::fmt::{self, Write};

use crate::container::Container;
use crate::tags::Tag;

/// Reserved-area bytes shown in the text report.
const RESERVED_PREVIEW: usize = 16;

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub path:            String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub library_index:   Option<u32>,
    pub version:         u8,
    pub version_name:    String,
    pub reserved_size:   u32,
    pub compressed_size: u32,
    pub compressed_crc:  String,
    pub payload_size:    usize,
    /// BLAKE3 of the inflated payload; absent when there is no payload.
    pub payload_blake3:  Option<String>,
    pub tags:            Vec<Tag>,
    pub libraries:       Vec<Report>,
    #[serde(skip)]
    reserved_head:       Vec<u8>,
}

impl Report {
    pub fn from_container(c: &Container) -> Self {
        Self {
            path:            c.path().display().to_string(),
            library_index:   c.library_index,
            version:         c.version().as_u8(),
            version_name:    c.version().to_string(),
            reserved_size:   c.header.reserved_size,
            compressed_size: c.header.compressed_size,
            compressed_crc:  format!("{:08x}", c.header.compressed_crc),
            payload_size:    c.payload.len(),
            payload_blake3:  (!c.payload.is_empty())
                .then(|| blake3::hash(&c.payload).to_hex().to_string()),
            tags:            c.tags.clone(),
            libraries:       c.libraries.iter().map(Report::from_container).collect(),
            reserved_head:   c.reserved.iter().take(RESERVED_PREVIEW).copied().collect(),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn render_text(&self) -> String {
        let mut out = String::new();
        // Writing into a String cannot fail.
        let _ = self.write_text(&mut out, 0);
        out
    }

    fn write_text(&self, out: &mut String, depth: usize) -> fmt::Result {
        let pad = "  ".repeat(depth);
        match self.library_index {
            Some(idx) => writeln!(out, "{pad}Library {idx}: {}", self.path)?,
            None      => writeln!(out, "{pad}PSF information ({}):", self.path)?,
        }
        writeln!(out, "{pad}  Version         {} (0x{:02x})", self.version_name, self.version)?;
        writeln!(out, "{pad}  Reserved area   {} B", self.reserved_size)?;
        if !self.reserved_head.is_empty() {
            let more = if self.reserved_size as usize > self.reserved_head.len() { " …" } else { "" };
            writeln!(out, "{pad}                  {}{more}", hex::encode(&self.reserved_head))?;
        }
        writeln!(out, "{pad}  Compressed      {} B (crc32 {})", self.compressed_size, self.compressed_crc)?;
        writeln!(out, "{pad}  Program data    {} B", self.payload_size)?;
        if let Some(ref h) = self.payload_blake3 {
            writeln!(out, "{pad}  BLAKE3          {h}")?;
        }
        if self.tags.is_empty() {
            writeln!(out, "{pad}  Tags            (none)")?;
        } else {
            writeln!(out, "{pad}  Tags ({}):", self.tags.len())?;
            let width = self.tags.iter().map(|t| t.key.len()).max().unwrap_or(0);
            for t in &self.tags {
                let mut lines = t.value.split('\n');
                let first = lines.next().unwrap_or("");
                writeln!(out, "{pad}    {:<width$} = {first}", t.key)?;
                for cont in lines {
                    writeln!(out, "{pad}    {:<width$}   {cont}", "")?;
                }
            }
        }
        for lib in &self.libraries {
            lib.write_text(out, depth + 1)?;
        }
        Ok(())
    }
}
