use proptest::prelude::*;
use rcarve_core::{Carver, CarverConfig, NullSink, RecordingSink, Signature, SignatureRegistry};
use std::fs;
use std::io::{self, Cursor, Read};
use std::path::Path;
use tempfile::TempDir;

const SMALL: Signature = Signature::new("sml", b"<<", b">>", 256);
const LARGE: Signature = Signature::new("lrg", b"[[BEGIN", b"END]]", 4096);

fn registry() -> SignatureRegistry {
    SignatureRegistry::with_signatures([SMALL, LARGE]).unwrap()
}

/// Endless-looking stream: `prefix`, then `len` filler bytes, generated on
/// the fly so the test never holds the whole input in memory
struct Synthetic {
    prefix: Cursor<Vec<u8>>,
    remaining: u64,
    filler: u8,
}

impl Read for Synthetic {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.prefix.read(buf)?;
        if n > 0 {
            return Ok(n);
        }
        let n = buf.len().min(self.remaining as usize);
        buf[..n].fill(self.filler);
        self.remaining -= n as u64;
        Ok(n)
    }
}

fn artifacts(dir: &Path) -> Vec<(String, Vec<u8>)> {
    let mut found: Vec<_> = fs::read_dir(dir)
        .unwrap()
        .map(|entry| {
            let entry = entry.unwrap();
            (
                entry.file_name().to_string_lossy().into_owned(),
                fs::read(entry.path()).unwrap(),
            )
        })
        .collect();
    found.sort();
    found
}

#[test]
fn test_memory_bound_on_large_stream() {
    let registry = registry();
    let temp_dir = TempDir::new().unwrap();
    let chunk_size = 64 * 1024;
    let total = 64 * 1024 * 1024;

    // an undecided header right at the start must not pin the whole stream
    let summary = Carver::with_config(&registry, CarverConfig::new().chunk_size(chunk_size))
        .carve(
            Synthetic {
                prefix: Cursor::new(b"[[BEGIN<<".to_vec()),
                remaining: total,
                filler: 0,
            },
            None,
            temp_dir.path(),
            &["sml", "lrg"],
            NullSink,
        )
        .unwrap();

    assert_eq!(summary.files_written, 0);
    assert_eq!(summary.bytes_scanned, total + 9);
    assert!(summary.peak_buffer_bytes <= LARGE.max_span() + chunk_size);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn prop_peak_buffer_is_bounded(
        prefix in proptest::collection::vec(prop_oneof![Just(b'<'), Just(b'['), Just(b'x')], 0..64),
        len in 0u64..200_000,
        chunk_size in 1usize..8192,
    ) {
        let registry = registry();
        let temp_dir = TempDir::new().unwrap();
        let summary = Carver::with_config(&registry, CarverConfig::new().chunk_size(chunk_size))
            .carve(
                Synthetic { prefix: Cursor::new(prefix), remaining: len, filler: b'.' },
                None,
                temp_dir.path(),
                &["sml", "lrg"],
                NullSink,
            )
            .unwrap();

        prop_assert!(summary.peak_buffer_bytes <= LARGE.max_span() + chunk_size);
    }

    #[test]
    fn prop_single_container_is_carved_exactly(
        before in proptest::collection::vec(b'a'..=b'z', 0..300),
        payload in proptest::collection::vec(b'a'..=b'z', 0..200),
        after in proptest::collection::vec(b'a'..=b'z', 0..300),
        chunk_size in 1usize..512,
    ) {
        let mut container = b"<<".to_vec();
        container.extend_from_slice(&payload);
        container.extend_from_slice(b">>");
        let mut input = before.clone();
        input.extend_from_slice(&container);
        input.extend_from_slice(&after);

        let registry = registry();
        let temp_dir = TempDir::new().unwrap();
        let mut sink = RecordingSink::new();
        let summary = Carver::with_config(&registry, CarverConfig::new().chunk_size(chunk_size))
            .carve(Cursor::new(&input), None, temp_dir.path(), &["sml"], &mut sink)
            .unwrap();

        prop_assert_eq!(summary.files_written, 1);
        prop_assert_eq!(sink.matches[0].absolute_start_offset, before.len() as u64);
        prop_assert_eq!(
            artifacts(temp_dir.path()),
            vec![("000001.sml".to_string(), container)]
        );
    }

    #[test]
    fn prop_runs_are_idempotent(
        input in proptest::collection::vec(
            prop_oneof![Just(b'<'), Just(b'>'), Just(b'['), Just(b'x')],
            0..2048,
        ),
        chunk_size in 1usize..300,
    ) {
        let registry = registry();
        let carver = Carver::with_config(&registry, CarverConfig::new().chunk_size(chunk_size));
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();

        let a = carver
            .carve(Cursor::new(&input), None, first.path(), &["sml", "lrg"], NullSink)
            .unwrap();
        let b = carver
            .carve(Cursor::new(&input), None, second.path(), &["sml", "lrg"], NullSink)
            .unwrap();

        prop_assert_eq!(a, b);
        prop_assert_eq!(artifacts(first.path()), artifacts(second.path()));
    }

    #[test]
    fn prop_matches_never_exceed_span(
        input in proptest::collection::vec(
            prop_oneof![Just(b'<'), Just(b'>'), Just(b'x')],
            0..2048,
        ),
        chunk_size in 1usize..300,
    ) {
        let registry = registry();
        let temp_dir = TempDir::new().unwrap();
        let mut sink = RecordingSink::new();
        Carver::with_config(&registry, CarverConfig::new().chunk_size(chunk_size))
            .carve(Cursor::new(&input), None, temp_dir.path(), &["sml"], &mut sink)
            .unwrap();

        let mut last_start = None;
        for event in &sink.matches {
            prop_assert!(event.len() as usize <= SMALL.max_span());
            prop_assert!(event.len() as usize >= SMALL.min_span());
            let start = event.absolute_start_offset as usize;
            let end = event.absolute_end_offset as usize;
            prop_assert!(input[start..].starts_with(b"<<"));
            prop_assert!(input[..end].ends_with(b">>"));
            if let Some(previous) = last_start {
                prop_assert!(start > previous);
            }
            last_start = Some(start);
        }
    }
}
