use flate2::write::ZlibEncoder;
use flate2::Compression;
use psfkit::codec::crc32;
use psfkit::{Container, ErrorKind, PsfError, ReadOptions, Tag, Version};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn build_psf(version: u8, program: Option<&[u8]>, tags: &str) -> Vec<u8> {
    let compressed = match program {
        Some(p) => {
            let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
            enc.write_all(p).unwrap();
            enc.finish().unwrap()
        }
        None => Vec::new(),
    };
    let crc = if compressed.is_empty() { 0 } else { crc32(&compressed) };

    let mut out = b"PSF".to_vec();
    out.push(version);
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(&(compressed.len() as u32).to_le_bytes());
    out.extend_from_slice(&crc.to_le_bytes());
    out.extend_from_slice(&compressed);
    if !tags.is_empty() {
        out.extend_from_slice(b"[TAG]");
        out.extend_from_slice(tags.as_bytes());
    }
    out
}

fn write_file(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, bytes).unwrap();
    path
}

#[test]
fn test_bare_header_decodes_to_empty_container() {
    let dir = TempDir::new().unwrap();
    let path = write_file(dir.path(), "empty.gsf", &build_psf(0x22, None, ""));

    let c = Container::open(&path).unwrap();
    assert_eq!(c.version(), Version::GameBoyAdvance);
    assert!(c.reserved.is_empty());
    assert!(c.payload.is_empty());
    assert!(c.tags.is_empty());
    assert!(c.libraries.is_empty());
}

#[test]
fn test_single_tag() {
    let dir = TempDir::new().unwrap();
    let path = write_file(dir.path(), "tagged.gsf", &build_psf(0x22, None, "key=value\n"));

    let c = Container::open(&path).unwrap();
    assert_eq!(c.tags, vec![Tag::new("key", "value")]);
}

#[test]
fn test_program_data_and_tags() {
    let dir = TempDir::new().unwrap();
    let program: Vec<u8> = (0..50_000u32).map(|i| (i * 7 % 251) as u8).collect();
    let path = write_file(
        dir.path(),
        "song.psf",
        &build_psf(0x01, Some(&program), "title=Song\nartist=Composer\nartist=Arranger\n"),
    );

    let c = Container::open(&path).unwrap();
    assert_eq!(c.payload, program);
    assert_eq!(c.tag("title"), Some("Song"));
    assert_eq!(c.tag("artist"), Some("Composer\nArranger"));
}

#[test]
fn test_checksum_mismatch() {
    let dir = TempDir::new().unwrap();
    let mut bytes = build_psf(0x21, Some(b"n64 program data"), "");
    bytes[12] ^= 0x01; // stored crc
    let path = write_file(dir.path(), "bad.usf", &bytes);

    let err = Container::open(&path).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Checksum);
}

#[test]
fn test_corrupt_stream_with_matching_crc() {
    let dir = TempDir::new().unwrap();
    let garbage = b"definitely not a zlib stream";
    let mut bytes = b"PSF\x01".to_vec();
    bytes.extend_from_slice(&0u32.to_le_bytes());
    bytes.extend_from_slice(&(garbage.len() as u32).to_le_bytes());
    bytes.extend_from_slice(&crc32(garbage).to_le_bytes());
    bytes.extend_from_slice(garbage);
    let path = write_file(dir.path(), "garbage.psf", &bytes);

    let err = Container::open(&path).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Decompression);
}

#[test]
fn test_nonexistent_path_is_io() {
    let dir = TempDir::new().unwrap();
    let err = Container::open(dir.path().join("missing.psf")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Io);
    assert!(matches!(err, PsfError::Open { .. }));
}

#[test]
fn test_bad_magic_is_format() {
    let dir = TempDir::new().unwrap();
    let path = write_file(dir.path(), "riff.wav", b"RIFF\x00\x00\x00\x00WAVEfmt ");
    let err = Container::open(&path).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Format);
}

#[test]
fn test_unknown_version_is_preserved() {
    let dir = TempDir::new().unwrap();
    let path = write_file(dir.path(), "future.psf", &build_psf(0x99, None, ""));
    let c = Container::open(&path).unwrap();
    assert_eq!(c.version(), Version::Unknown(0x99));
}

#[test]
fn test_libraries_are_opt_in() {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "base.gsflib", &build_psf(0x22, Some(b"base"), ""));
    let path = write_file(dir.path(), "track.minigsf", &build_psf(0x22, None, "_lib=base.gsflib\n"));

    let c = Container::open(&path).unwrap();
    assert!(c.libraries.is_empty());
}

#[test]
fn test_lib_resolves_next_to_parent() {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "rips/sibling.dat", &build_psf(0x22, Some(b"library program"), "title=Base\n"));
    let path = write_file(dir.path(), "rips/mini.dat", &build_psf(0x22, None, "_lib=sibling.dat\n"));

    let mut c = Container::open(&path).unwrap();
    c.load_libraries().unwrap();

    assert_eq!(c.libraries.len(), 1);
    let lib = &c.libraries[0];
    assert_eq!(lib.library_index, Some(1));
    assert_eq!(lib.payload, b"library program");
    assert_eq!(lib.tag("title"), Some("Base"));
    assert_eq!(lib.path(), dir.path().join("rips/sibling.dat"));
    assert_eq!(c.library_index, None);
}

#[test]
fn test_numbered_libs_in_tag_order() {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "a.dat", &build_psf(0x01, Some(b"a"), ""));
    write_file(dir.path(), "x.dat", &build_psf(0x01, Some(b"x"), ""));
    let path = write_file(
        dir.path(),
        "mini.psf",
        &build_psf(0x01, None, "title=t\n_lib3=x.dat\n_lib=a.dat\n_library=ignored.dat\n"),
    );

    let mut c = Container::open(&path).unwrap();
    c.load_libraries().unwrap();

    let seen: Vec<(Option<u32>, &[u8])> =
        c.libraries.iter().map(|l| (l.library_index, l.payload.as_slice())).collect();
    assert_eq!(seen, vec![(Some(3), &b"x"[..]), (Some(1), &b"a"[..])]);
}

#[test]
fn test_nested_libs_resolve_against_immediate_parent() {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "shared/deep/core.lib", &build_psf(0x11, Some(b"core"), ""));
    write_file(dir.path(), "shared/base.lib", &build_psf(0x11, Some(b"base"), "_lib=deep/core.lib\n"));
    // Decoy next to the root: must not be picked up for the nested reference.
    write_file(dir.path(), "deep/core.lib", &build_psf(0x11, Some(b"decoy"), ""));
    let path = write_file(dir.path(), "song.minissf", &build_psf(0x11, None, "_lib=shared/base.lib\n"));

    let mut c = Container::open(&path).unwrap();
    c.load_libraries().unwrap();

    assert_eq!(c.tree_len(), 3);
    let base = &c.libraries[0];
    assert_eq!(base.payload, b"base");
    assert_eq!(base.libraries[0].payload, b"core");
    let depths: Vec<usize> = c.walk().map(|(d, _)| d).collect();
    assert_eq!(depths, vec![0, 1, 2]);
}

#[test]
fn test_failed_library_keeps_earlier_siblings() {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "one.lib", &build_psf(0x01, Some(b"one"), ""));
    write_file(dir.path(), "three.lib", &build_psf(0x01, Some(b"three"), ""));
    let path = write_file(
        dir.path(),
        "mini.psf",
        &build_psf(0x01, None, "_lib=one.lib\n_lib2=missing.lib\n_lib3=three.lib\n"),
    );

    let mut c = Container::open(&path).unwrap();
    let err = c.load_libraries().unwrap_err();

    assert_eq!(err.kind(), ErrorKind::LibraryResolution);
    assert_eq!(err.root_cause().kind(), ErrorKind::Io);
    match &err {
        PsfError::Library { key, path, .. } => {
            assert_eq!(key, "_lib2");
            assert!(path.ends_with("missing.lib"));
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert_eq!(c.libraries.len(), 1);
    assert_eq!(c.libraries[0].payload, b"one");
    c.close();
}

#[test]
fn test_corrupt_library_is_library_error() {
    let dir = TempDir::new().unwrap();
    let mut lib = build_psf(0x01, Some(b"library"), "");
    lib[12] ^= 0xFF;
    write_file(dir.path(), "bad.lib", &lib);
    let path = write_file(dir.path(), "mini.psf", &build_psf(0x01, None, "_lib=bad.lib\n"));

    let mut c = Container::open(&path).unwrap();
    let err = c.load_libraries().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::LibraryResolution);
    assert_eq!(err.root_cause().kind(), ErrorKind::Checksum);
    assert!(c.libraries.is_empty());
}

#[test]
fn test_library_cycle_is_refused() {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "a.psf", &build_psf(0x01, None, "_lib=b.psf\n"));
    write_file(dir.path(), "b.psf", &build_psf(0x01, None, "_lib=a.psf\n"));

    let mut c = Container::open(dir.path().join("a.psf")).unwrap();
    let err = c.load_libraries().unwrap_err();
    assert!(matches!(err.root_cause(), PsfError::LibraryCycle { .. }), "{err}");
}

#[test]
fn test_self_reference_is_a_cycle() {
    let dir = TempDir::new().unwrap();
    let path = write_file(dir.path(), "self.psf", &build_psf(0x01, None, "_lib=self.psf\n"));

    let mut c = Container::open(&path).unwrap();
    let err = c.load_libraries().unwrap_err();
    assert!(matches!(err.root_cause(), PsfError::LibraryCycle { .. }));
}

#[test]
fn test_depth_limit_without_cycle_detection() {
    let dir = TempDir::new().unwrap();
    let path = write_file(dir.path(), "loop.psf", &build_psf(0x01, None, "_lib=loop.psf\n"));

    let opts = ReadOptions::default()
        .detect_cycles(false)
        .max_library_depth(Some(3));
    let mut c = Container::open_with(&path, &opts).unwrap();
    let err = c.load_libraries_with(&opts).unwrap_err();
    assert!(matches!(err.root_cause(), PsfError::LibraryDepth { limit: 3, .. }));
}

#[test]
fn test_shared_library_between_siblings_is_not_a_cycle() {
    let dir = TempDir::new().unwrap();
    write_file(dir.path(), "common.lib", &build_psf(0x01, Some(b"common"), ""));
    write_file(dir.path(), "a.lib", &build_psf(0x01, None, "_lib=common.lib\n"));
    write_file(dir.path(), "b.lib", &build_psf(0x01, None, "_lib=common.lib\n"));
    let path = write_file(dir.path(), "mini.psf", &build_psf(0x01, None, "_lib=a.lib\n_lib2=b.lib\n"));

    let mut c = Container::open(&path).unwrap();
    c.load_libraries().unwrap();
    assert_eq!(c.tree_len(), 5);
}
