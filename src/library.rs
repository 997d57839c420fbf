//! Library resolution: following `_lib` / `_libN` tags to sibling files.
//!
//! "Mini" files carry only a small patch of program data and name one or
//! more base libraries in their tags.  Each referenced file is loaded as a
//! full [`Container`] and attached to the referencing container, in tag
//! order, recursively.
//!
//! # Path resolution
//! A tag value is joined onto the directory of the container that carries
//! the tag.  At every level that is the immediate parent's directory, never
//! the root file's and never the process working directory.
//!
//! # Failure
//! The first reference that fails to load stops resolution for that
//! container.  Libraries already attached stay attached.
//!
//! # Recursion guard
//! References are followed only down to [`ReadOptions::max_library_depth`],
//! and with [`ReadOptions::detect_cycles`] a reference back to a file that
//! is already being loaded higher up the chain is refused.  Neither guard
//! changes the order in which references are visited.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::container::{Container, ReadOptions};
use crate::error::{PsfError, Result};

pub const LIB_KEY: &str = "_lib";

/// Library index named by a tag key: `_lib` is 1, `_lib<N>` is N.
///
/// `N` must be plain ASCII digits.  Anything else, including an index that
/// overflows `u32`, is not a library reference.
pub fn library_index(key: &str) -> Option<u32> {
    let digits = key.strip_prefix(LIB_KEY)?;
    if digits.is_empty() {
        return Some(1);
    }
    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Join `name` onto the directory that contains `referrer`.
pub fn resolve_library_path(referrer: &Path, name: &str) -> Result<PathBuf> {
    let dir = referrer
        .parent()
        .ok_or_else(|| PsfError::InvalidParentPath { path: referrer.to_owned() })?;
    Ok(dir.join(name))
}

/// Load every library `container` references, recursively.
pub fn resolve_libraries(container: &mut Container, opts: &ReadOptions) -> Result<()> {
    let mut chain = Vec::new();
    if opts.detect_cycles {
        if let Ok(canonical) = fs::canonicalize(container.path()) {
            chain.push(canonical);
        }
    }
    resolve_level(container, opts, 0, &mut chain)
}

fn resolve_level(
    container: &mut Container,
    opts:      &ReadOptions,
    depth:     usize,
    chain:     &mut Vec<PathBuf>,
) -> Result<()> {
    let refs: Vec<(String, u32, String)> = container
        .tags
        .iter()
        .filter_map(|t| library_index(&t.key).map(|idx| (t.key.clone(), idx, t.value.clone())))
        .collect();
    if refs.is_empty() {
        return Ok(());
    }

    if let Some(limit) = opts.max_library_depth {
        if depth >= limit {
            return Err(PsfError::LibraryDepth { limit, path: container.path().to_owned() });
        }
    }

    for (key, index, name) in refs {
        let path = resolve_library_path(container.path(), &name)?;
        debug!(%key, index, path = %path.display(), depth = depth + 1, "loading library");

        let child = load_library(index, &path, opts, depth + 1, chain).map_err(|source| {
            PsfError::Library { key: key.clone(), path: path.clone(), source: Box::new(source) }
        })?;
        container.libraries.push(child);
    }

    info!(
        path = %container.path().display(),
        libraries = container.libraries.len(),
        "resolved libraries"
    );
    Ok(())
}

fn load_library(
    index: u32,
    path:  &Path,
    opts:  &ReadOptions,
    depth: usize,
    chain: &mut Vec<PathBuf>,
) -> Result<Container> {
    let canonical = if opts.detect_cycles {
        let canonical = fs::canonicalize(path)
            .map_err(|source| PsfError::Open { path: path.to_owned(), source })?;
        if chain.contains(&canonical) {
            return Err(PsfError::LibraryCycle { path: path.to_owned() });
        }
        Some(canonical)
    } else {
        None
    };

    let mut child = Container::open_with(path, opts)?;
    child.library_index = Some(index);

    let pushed = match canonical {
        Some(c) => {
            chain.push(c);
            true
        }
        None => false,
    };
    let nested = resolve_level(&mut child, opts, depth, chain);
    if pushed {
        chain.pop();
    }
    nested?;

    Ok(child)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lib_keys() {
        assert_eq!(library_index("_lib"), Some(1));
        assert_eq!(library_index("_lib2"), Some(2));
        assert_eq!(library_index("_lib0"), Some(0));
        assert_eq!(library_index("_lib10"), Some(10));
        assert_eq!(library_index("_lib007"), Some(7));
    }

    #[test]
    fn non_lib_keys() {
        assert_eq!(library_index("title"), None);
        assert_eq!(library_index("_li"), None);
        assert_eq!(library_index("_libx"), None);
        assert_eq!(library_index("_lib_2"), None);
        assert_eq!(library_index("_lib+2"), None);
        assert_eq!(library_index("_LIB"), None);
        assert_eq!(library_index("_lib99999999999"), None);
    }

    #[test]
    fn paths_resolve_against_referrer_directory() {
        let p = resolve_library_path(Path::new("rips/game/track01.minigsf"), "game.gsflib").unwrap();
        assert_eq!(p, Path::new("rips/game/game.gsflib"));

        let p = resolve_library_path(Path::new("track01.minigsf"), "game.gsflib").unwrap();
        assert_eq!(p, Path::new("game.gsflib"));

        let p = resolve_library_path(Path::new("rips/track.minipsf"), "../shared/base.psflib").unwrap();
        assert_eq!(p, Path::new("rips/../shared/base.psflib"));
    }

    #[test]
    fn referrer_without_parent_is_rejected() {
        let err = resolve_library_path(Path::new(""), "x.psflib").unwrap_err();
        assert!(matches!(err, PsfError::InvalidParentPath { .. }));
        assert_eq!(err.kind(), crate::error::ErrorKind::LibraryResolution);
    }
}
