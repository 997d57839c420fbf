use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::codec::InflateError;

/// Coarse, caller-visible classification of a [`PsfError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Open failure or short read at any stage.
    Io,
    /// The file does not start with the `PSF` magic.
    Format,
    /// CRC-32 of the compressed block disagrees with the header.
    Checksum,
    /// The codec rejected the compressed block.
    Decompression,
    /// A referenced library could not be located or fully decoded.
    LibraryResolution,
}

#[derive(Error, Debug)]
pub enum PsfError {
    #[error("Cannot open {}: {source}", path.display())]
    Open {
        path:   PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Invalid magic number {0:02x?} (expected \"PSF\")")]
    InvalidMagic([u8; 3]),
    #[error("Checksum mismatch: header says {expected:#010x}, block hashes to {actual:#010x}")]
    ChecksumMismatch { expected: u32, actual: u32 },
    #[error("Decompression error: {0}")]
    Decompression(#[from] InflateError),
    #[error("Library {key}={} failed to load: {source}", path.display())]
    Library {
        key:    String,
        path:   PathBuf,
        #[source]
        source: Box<PsfError>,
    },
    #[error("Library chain deeper than {limit} levels at {}", path.display())]
    LibraryDepth { limit: usize, path: PathBuf },
    #[error("Library cycle: {} is already being loaded", path.display())]
    LibraryCycle { path: PathBuf },
    #[error("Cannot resolve libraries relative to {}: path has no parent directory", path.display())]
    InvalidParentPath { path: PathBuf },
}

impl PsfError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PsfError::Open { .. } | PsfError::Io(_) => ErrorKind::Io,
            PsfError::InvalidMagic(_)               => ErrorKind::Format,
            PsfError::ChecksumMismatch { .. }       => ErrorKind::Checksum,
            PsfError::Decompression(_)              => ErrorKind::Decompression,
            PsfError::Library { .. }
            | PsfError::LibraryDepth { .. }
            | PsfError::LibraryCycle { .. }
            | PsfError::InvalidParentPath { .. }    => ErrorKind::LibraryResolution,
        }
    }

    /// Innermost error of a library chain (the one that actually failed).
    pub fn root_cause(&self) -> &PsfError {
        let mut cur = self;
        while let PsfError::Library { source, .. } = cur {
            cur = &**source;
        }
        cur
    }
}

pub type Result<T> = std::result::Result<T, PsfError>;
