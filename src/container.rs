//! High-level [`Container`] API — the primary embedding surface.
//!
//! ```no_run
//! use psfkit::container::Container;
//!
//! let mut psf = Container::open("track01.minigsf")?;
//! println!("{} with {} tags", psf.version(), psf.tags.len());
//!
//! // Following `_lib` references is opt-in.
//! psf.load_libraries()?;
//! for (depth, c) in psf.walk() {
//!     println!("{:indent$}{}", "", c.path().display(), indent = depth * 2);
//! }
//! # Ok::<(), psfkit::PsfError>(())
//! ```

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::codec::{decode_block, Inflater, DEFAULT_MAX_RATIO};
use crate::error::{PsfError, Result};
use crate::header::PsfHeader;
use crate::library::resolve_libraries;
use crate::region::read_region;
use crate::tags::{read_tags, Tag, DEFAULT_LINE_LIMIT};
use crate::version::Version;

/// Default bound on `_lib` nesting.
pub const DEFAULT_MAX_LIBRARY_DEPTH: usize = 16;

// ── ReadOptions ───────────────────────────────────────────────────────────────

/// Configuration for [`Container::open_with`] and
/// [`Container::load_libraries_with`].
#[derive(Debug, Clone)]
pub struct ReadOptions {
    /// Inflate output cap as a multiple of the compressed size.
    /// `None` grows the buffer without limit.
    pub max_inflate_ratio: Option<u32>,
    /// Deepest allowed `_lib` nesting below the opened file.
    /// `None` follows chains of any length.
    pub max_library_depth: Option<usize>,
    /// Refuse a reference to a file that is already an ancestor.
    pub detect_cycles:     bool,
    /// Bytes kept per tag line.
    pub tag_line_limit:    usize,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            max_inflate_ratio: Some(DEFAULT_MAX_RATIO),
            max_library_depth: Some(DEFAULT_MAX_LIBRARY_DEPTH),
            detect_cycles:     true,
            tag_line_limit:    DEFAULT_LINE_LIMIT,
        }
    }
}

impl ReadOptions {
    /// Options with every guard removed.
    pub fn unbounded() -> Self {
        Self {
            max_inflate_ratio: None,
            max_library_depth: None,
            detect_cycles:     false,
            tag_line_limit:    DEFAULT_LINE_LIMIT,
        }
    }

    pub fn max_inflate_ratio(mut self, ratio: Option<u32>) -> Self {
        self.max_inflate_ratio = ratio;
        self
    }

    pub fn max_library_depth(mut self, depth: Option<usize>) -> Self {
        self.max_library_depth = depth;
        self
    }

    pub fn detect_cycles(mut self, on: bool) -> Self {
        self.detect_cycles = on;
        self
    }

    pub fn tag_line_limit(mut self, limit: usize) -> Self {
        self.tag_line_limit = limit.max(1);
        self
    }

    pub fn inflater(&self) -> Inflater {
        Inflater { max_ratio: self.max_inflate_ratio }
    }
}

// ── Container ─────────────────────────────────────────────────────────────────

/// One decoded file, plus any libraries it has loaded.
///
/// The file handle is closed once decoding finishes; everything the
/// container needs lives in its own buffers.
#[derive(Debug)]
pub struct Container {
    path:              PathBuf,
    pub header:        PsfHeader,
    /// Opaque reserved area, `header.reserved_size` bytes.
    pub reserved:      Vec<u8>,
    /// Inflated program data.  Its length comes from the codec alone.
    pub payload:       Vec<u8>,
    /// Tags in file order.
    pub tags:          Vec<Tag>,
    /// Loaded libraries, in the order their tags appear.
    pub libraries:     Vec<Container>,
    /// Index from the parent's `_lib`/`_libN` tag; `None` for the root.
    pub library_index: Option<u32>,
}

impl Container {
    // ── Constructors ─────────────────────────────────────────────────────────

    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with(path, &ReadOptions::default())
    }

    pub fn open_with<P: AsRef<Path>>(path: P, opts: &ReadOptions) -> Result<Self> {
        let path = path.as_ref().to_owned();
        let file = File::open(&path)
            .map_err(|source| PsfError::Open { path: path.clone(), source })?;
        Self::read_from(BufReader::new(file), path, opts)
    }

    /// Decode a container from any stream positioned at its first byte.
    ///
    /// `path` is recorded for library resolution only; it is not opened.
    pub fn read_from<R: BufRead>(mut reader: R, path: impl Into<PathBuf>, opts: &ReadOptions) -> Result<Self> {
        let path = path.into();

        let header = PsfHeader::read(&mut reader)?;
        debug!(
            path = %path.display(),
            version = %header.version,
            reserved = header.reserved_size,
            compressed = header.compressed_size,
            "read header"
        );

        let reserved = read_region(&mut reader, header.reserved_size, "reserved area")?;

        let payload = if header.compressed_size > 0 {
            let compressed = read_region(&mut reader, header.compressed_size, "compressed block")?;
            decode_block(&compressed, header.compressed_crc, &opts.inflater())?
        } else {
            Vec::new()
        };

        let tags = read_tags(&mut reader, opts.tag_line_limit)?;

        Ok(Self {
            path,
            header,
            reserved,
            payload,
            tags,
            libraries: Vec::new(),
            library_index: None,
        })
    }

    // ── Libraries ─────────────────────────────────────────────────────────────

    /// Load every `_lib`/`_libN` reference with default options.
    pub fn load_libraries(&mut self) -> Result<()> {
        self.load_libraries_with(&ReadOptions::default())
    }

    /// On failure, libraries loaded before the failing reference remain in
    /// [`Container::libraries`].
    pub fn load_libraries_with(&mut self, opts: &ReadOptions) -> Result<()> {
        resolve_libraries(self, opts)
    }

    // ── Accessors ─────────────────────────────────────────────────────────────

    pub fn path(&self) -> &Path { &self.path }

    pub fn version(&self) -> Version { self.header.version }

    /// Value of the first tag named `key`.
    pub fn tag(&self, key: &str) -> Option<&str> {
        self.tags.iter().find(|t| t.key == key).map(|t| t.value.as_str())
    }

    /// Depth-first, pre-order walk over this container and its libraries.
    /// Yields `(depth, container)`; the receiver is depth 0.
    pub fn walk(&self) -> Walk<'_> {
        Walk { stack: vec![(0, self)] }
    }

    /// Number of containers in the tree, this one included.
    pub fn tree_len(&self) -> usize {
        self.walk().count()
    }

    /// Release the container and all its libraries.
    pub fn close(self) {
        drop(self);
    }
}

impl Drop for Container {
    // Flatten the tree so deep library chains are not released through
    // nested drop calls.
    fn drop(&mut self) {
        let mut pending = std::mem::take(&mut self.libraries);
        while let Some(mut lib) = pending.pop() {
            pending.append(&mut lib.libraries);
        }
    }
}

pub struct Walk<'a> {
    stack: Vec<(usize, &'a Container)>,
}

impl<'a> Iterator for Walk<'a> {
    type Item = (usize, &'a Container);

    fn next(&mut self) -> Option<Self::Item> {
        let (depth, node) = self.stack.pop()?;
        self.stack.extend(node.libraries.iter().rev().map(|c| (depth + 1, c)));
        Some((depth, node))
    }
}
