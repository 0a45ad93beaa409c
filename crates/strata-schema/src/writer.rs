use std::io::{self, Read};

use serde::{Deserialize, Serialize};
use strata_store::BlobStore;
use strata_types::BlobRef;
use tracing::debug;

use crate::chunker::{ChunkPolicy, RollingPolicy};
use crate::document::{Document, FileMap};
use crate::error::{SchemaError, SchemaResult};
use crate::part::{BytesPart, Part};
use crate::reader::ReaderOptions;

const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Chunking and tree-shape parameters for the writer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriterConfig {
    /// Smallest chunk the rolling policy will cut (default: 64 KiB).
    pub min_chunk_size: usize,
    /// Hard upper bound on any data blob (default: 1 MiB).
    pub max_chunk_size: usize,
    /// Rolling checksum bits that must be set for a boundary (default: 13).
    pub split_bits: u32,
    /// Most parts any single document may list (default: 256).
    pub max_parts_per_document: usize,
    /// Most levels of intermediate `"bytes"` documents the writer may
    /// build (default: 32). Readers refuse trees deeper than their own
    /// `max_depth`, so this should not exceed the readers' setting.
    pub max_depth: usize,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            min_chunk_size: 64 * 1024,
            max_chunk_size: 1024 * 1024,
            split_bits: 13,
            max_parts_per_document: 256,
            max_depth: ReaderOptions::default().max_depth,
        }
    }
}

impl WriterConfig {
    /// Check that the parameters can produce a finite, bounded tree.
    pub fn validate(&self) -> SchemaResult<()> {
        if self.max_chunk_size == 0 {
            return Err(SchemaError::InvalidConfig("max_chunk_size must be positive".into()));
        }
        if self.min_chunk_size > self.max_chunk_size {
            return Err(SchemaError::InvalidConfig(format!(
                "min_chunk_size {} exceeds max_chunk_size {}",
                self.min_chunk_size, self.max_chunk_size
            )));
        }
        if !(1..=31).contains(&self.split_bits) {
            return Err(SchemaError::InvalidConfig(format!(
                "split_bits must be in 1..=31, got {}",
                self.split_bits
            )));
        }
        if self.max_parts_per_document < 2 {
            return Err(SchemaError::InvalidConfig(
                "max_parts_per_document must be at least 2".into(),
            ));
        }
        Ok(())
    }
}

/// Write `source` to `store` with the default configuration and rolling
/// chunk policy. Returns the ref of the top-level `"file"` document.
pub fn write_file_map(
    store: &dyn BlobStore,
    file_map: &FileMap,
    source: impl Read,
) -> SchemaResult<BlobRef> {
    let config = WriterConfig::default();
    let policy = RollingPolicy::from_config(&config);
    write_file_map_with(store, file_map, source, &config, policy)
}

/// Write `source` to `store`, cutting chunks with `policy`.
///
/// Every chunk becomes a data blob of at most `config.max_chunk_size`
/// bytes. When the chunk list is longer than
/// `config.max_parts_per_document`, parts are grouped into intermediate
/// `"bytes"` documents, level by level, until the top level fits; the tree
/// is balanced because every level splits into equally sized groups.
pub fn write_file_map_with<P: ChunkPolicy>(
    store: &dyn BlobStore,
    file_map: &FileMap,
    mut source: impl Read,
    config: &WriterConfig,
    mut policy: P,
) -> SchemaResult<BlobRef> {
    config.validate()?;

    let mut parts = Vec::new();
    let mut chunk = Vec::with_capacity(config.max_chunk_size.min(READ_BUFFER_SIZE * 4));
    let mut buf = vec![0u8; READ_BUFFER_SIZE];

    loop {
        let n = match source.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        };
        for &byte in &buf[..n] {
            chunk.push(byte);
            if policy.split_after(byte, chunk.len()) || chunk.len() >= config.max_chunk_size {
                parts.push(flush_chunk(store, &mut chunk)?);
            }
        }
    }
    if !chunk.is_empty() {
        parts.push(flush_chunk(store, &mut chunk)?);
    }

    let chunks = parts.len();
    let needed = tree_levels(chunks, config.max_parts_per_document);
    if needed > config.max_depth {
        return Err(SchemaError::RecursionLimitExceeded {
            limit: config.max_depth,
        });
    }
    let mut levels = 0;
    while parts.len() > config.max_parts_per_document {
        parts = group_level(store, &parts, config.max_parts_per_document)?;
        levels += 1;
    }

    let mut document = Document::file(file_map);
    populate(&mut document, &parts)?;
    let file_ref = document.store(store)?;
    debug!(
        file = %file_ref.short(),
        size = document.total_size(),
        chunks,
        levels,
        "wrote file"
    );
    Ok(file_ref)
}

/// Levels of grouping needed to bring `parts` down to at most `max`.
fn tree_levels(mut parts: usize, max: usize) -> usize {
    let mut levels = 0;
    while parts > max {
        parts = parts.div_ceil(max);
        levels += 1;
    }
    levels
}

fn flush_chunk(store: &dyn BlobStore, chunk: &mut Vec<u8>) -> SchemaResult<Part> {
    let blob = store.put(chunk)?;
    let part = Part::blob(blob, 0, chunk.len() as u64);
    chunk.clear();
    Ok(part)
}

/// Replace one level of parts with `"bytes"` documents of at most `max`
/// parts each, spread as evenly as possible.
fn group_level(store: &dyn BlobStore, parts: &[Part], max: usize) -> SchemaResult<Vec<Part>> {
    let groups = parts.len().div_ceil(max);
    let base = parts.len() / groups;
    let extra = parts.len() % groups;

    let mut next = Vec::with_capacity(groups);
    let mut start = 0;
    for g in 0..groups {
        let len = base + usize::from(g < extra);
        let mut document = Document::bytes();
        populate(&mut document, &parts[start..start + len])?;
        let blob = document.store(store)?;
        next.push(Part::bytes(blob, 0, document.total_size()));
        start += len;
    }
    Ok(next)
}

fn populate(document: &mut Document, parts: &[Part]) -> SchemaResult<()> {
    let total: u128 = parts.iter().map(|p| u128::from(p.size)).sum();
    let declared = u64::try_from(total).map_err(|_| SchemaError::SizeMismatch {
        declared: u64::MAX,
        actual: total,
    })?;
    let wire: Vec<BytesPart> = parts.iter().map(BytesPart::from).collect();
    document.populate(declared, &wire)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunker::FixedPolicy;
    use crate::document::DocType;
    use crate::part::PartSource;
    use crate::reader::FileReader;
    use proptest::prelude::*;
    use rand::{Rng, SeedableRng};
    use std::io::{Seek, SeekFrom};
    use strata_store::{BlobFetcher, InMemoryBlobStore};

    fn random_bytes(n: usize, seed: u64) -> Vec<u8> {
        let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
        (0..n).map(|_| rng.gen()).collect()
    }

    fn small_config() -> WriterConfig {
        WriterConfig {
            min_chunk_size: 256,
            max_chunk_size: 4096,
            split_bits: 9,
            max_parts_per_document: 4,
            ..WriterConfig::default()
        }
    }

    fn write_small(store: &InMemoryBlobStore, data: &[u8]) -> BlobRef {
        let config = small_config();
        write_file_map_with(
            store,
            &FileMap::new("small"),
            data,
            &config,
            RollingPolicy::from_config(&config),
        )
        .unwrap()
    }

    fn load(store: &InMemoryBlobStore, blob: &BlobRef) -> Document {
        Document::from_bytes(&store.fetch_bytes(blob).unwrap()).unwrap()
    }

    /// Walk the document tree, returning (leaf parts, max nesting depth).
    fn leaves(store: &InMemoryBlobStore, doc: &Document) -> (Vec<Part>, usize) {
        let mut out = Vec::new();
        let mut depth = 0;
        for part in doc.parts() {
            match part.source {
                PartSource::Bytes(r) => {
                    let (inner, d) = leaves(store, &load(store, &r));
                    out.extend(inner);
                    depth = depth.max(d + 1);
                }
                _ => out.push(*part),
            }
        }
        (out, depth)
    }

    fn read_all(store: &InMemoryBlobStore, blob: &BlobRef) -> Vec<u8> {
        let mut reader = FileReader::open(store, blob).unwrap();
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        out
    }

    // -----------------------------------------------------------------------
    // Shape
    // -----------------------------------------------------------------------

    #[test]
    fn empty_input_writes_empty_file() {
        let store = InMemoryBlobStore::new();
        let blob = write_file_map(&store, &FileMap::new("empty"), &b""[..]).unwrap();
        let doc = load(&store, &blob);
        assert_eq!(doc.doc_type(), DocType::File);
        assert_eq!(doc.name(), Some("empty"));
        assert!(doc.parts().is_empty());
        assert_eq!(store.len(), 1);
        assert!(read_all(&store, &blob).is_empty());
    }

    #[test]
    fn small_input_is_single_flat_part() {
        let store = InMemoryBlobStore::new();
        let blob = write_file_map(&store, &FileMap::new("hello.txt"), &b"hello world"[..]).unwrap();
        let doc = load(&store, &blob);
        assert_eq!(doc.parts().len(), 1);
        let part = doc.parts()[0];
        assert_eq!(part.offset, 0);
        assert_eq!(part.size, 11);
        match part.source {
            PartSource::Blob(r) => assert_eq!(store.contents(&r).unwrap(), b"hello world"),
            other => panic!("expected blob part, got {other:?}"),
        }
    }

    #[test]
    fn flat_list_when_under_part_limit() {
        let store = InMemoryBlobStore::new();
        let data = random_bytes(3000, 4);
        let config = WriterConfig {
            max_parts_per_document: 8,
            ..small_config()
        };
        let blob = write_file_map_with(
            &store,
            &FileMap::new("flat"),
            &data[..],
            &config,
            FixedPolicy::new(1000),
        )
        .unwrap();
        let doc = load(&store, &blob);
        let sizes: Vec<u64> = doc.parts().iter().map(|p| p.size).collect();
        assert_eq!(sizes, vec![1000, 1000, 1000]);
        assert!(doc
            .parts()
            .iter()
            .all(|p| matches!(p.source, PartSource::Blob(_))));
    }

    #[test]
    fn large_input_nests_bounded_documents() {
        let store = InMemoryBlobStore::new();
        let data = random_bytes(200_000, 5);
        let blob = write_small(&store, &data);

        let root = load(&store, &blob);
        assert_eq!(root.doc_type(), DocType::File);
        assert!(root.parts().len() <= 4);
        assert!(root
            .parts()
            .iter()
            .all(|p| matches!(p.source, PartSource::Bytes(_))));

        let (leaf_parts, depth) = leaves(&store, &root);
        assert!(depth >= 2, "expected a multi-level tree, got depth {depth}");
        assert_eq!(
            leaf_parts.iter().map(|p| p.size).sum::<u64>(),
            data.len() as u64
        );
        assert!(leaf_parts.iter().all(|p| p.size <= 4096));
        assert_eq!(read_all(&store, &blob), data);
    }

    #[test]
    fn intermediate_documents_respect_part_limit() {
        let store = InMemoryBlobStore::new();
        let data = random_bytes(120_000, 6);
        write_small(&store, &data);
        for r in store.all_refs() {
            if let Ok(doc) = Document::from_bytes(&store.contents(&r).unwrap()) {
                assert!(doc.parts().len() <= 4);
                if doc.doc_type() == DocType::Bytes {
                    assert!(doc.parts().len() >= 2);
                }
            }
        }
    }

    #[test]
    fn chunks_never_exceed_max() {
        let store = InMemoryBlobStore::new();
        // Constant input never triggers a content boundary.
        let data = vec![0u8; 50_000];
        let blob = write_small(&store, &data);
        let (leaf_parts, _) = leaves(&store, &load(&store, &blob));
        assert!(leaf_parts.iter().all(|p| p.size <= 4096));
        assert_eq!(read_all(&store, &blob), data);
    }

    // -----------------------------------------------------------------------
    // Determinism and deduplication
    // -----------------------------------------------------------------------

    #[test]
    fn identical_content_yields_identical_ref() {
        let data = random_bytes(80_000, 7);
        let s1 = InMemoryBlobStore::new();
        let s2 = InMemoryBlobStore::new();
        assert_eq!(write_small(&s1, &data), write_small(&s2, &data));
        assert_eq!(s1.all_refs(), s2.all_refs());
    }

    #[test]
    fn rewriting_adds_no_blobs() {
        let store = InMemoryBlobStore::new();
        let data = random_bytes(80_000, 8);
        let first = write_small(&store, &data);
        let count = store.len();
        let second = write_small(&store, &data);
        assert_eq!(first, second);
        assert_eq!(store.len(), count);
    }

    #[test]
    fn shared_content_reuses_chunks() {
        let store = InMemoryBlobStore::new();
        let data = random_bytes(60_000, 9);
        write_small(&store, &data);
        let before = store.len();

        let mut edited = vec![0xABu8; 10];
        edited.extend_from_slice(&data);
        write_small(&store, &edited);
        let added = store.len() - before;
        // Most data chunks survive the prefix edit.
        assert!(added < before / 2, "added {added} of {before}");
    }

    #[test]
    fn name_and_mtime_are_recorded() {
        use chrono::TimeZone;
        let store = InMemoryBlobStore::new();
        let mtime = chrono::Utc.with_ymd_and_hms(2020, 1, 2, 3, 4, 5).unwrap();
        let map = FileMap::new("dated.txt").with_mtime(mtime);
        let blob = write_file_map(&store, &map, &b"x"[..]).unwrap();
        let doc = load(&store, &blob);
        assert_eq!(doc.name(), Some("dated.txt"));
        assert_eq!(doc.unix_mtime(), Some(mtime));
    }

    // -----------------------------------------------------------------------
    // Configuration and source errors
    // -----------------------------------------------------------------------

    #[test]
    fn invalid_configs_are_rejected() {
        let bad = [
            WriterConfig {
                max_chunk_size: 0,
                min_chunk_size: 0,
                ..WriterConfig::default()
            },
            WriterConfig {
                min_chunk_size: 10,
                max_chunk_size: 5,
                ..WriterConfig::default()
            },
            WriterConfig {
                split_bits: 0,
                ..WriterConfig::default()
            },
            WriterConfig {
                max_parts_per_document: 1,
                ..WriterConfig::default()
            },
        ];
        for config in bad {
            assert!(matches!(config.validate(), Err(SchemaError::InvalidConfig(_))));
        }
        assert!(WriterConfig::default().validate().is_ok());
    }

    #[test]
    fn source_errors_propagate() {
        struct Failing;
        impl Read for Failing {
            fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
                Err(io::Error::new(io::ErrorKind::ConnectionReset, "peer went away"))
            }
        }
        let store = InMemoryBlobStore::new();
        let err = write_file_map(&store, &FileMap::new("x"), Failing).unwrap_err();
        match err {
            SchemaError::Io(e) => assert_eq!(e.kind(), io::ErrorKind::ConnectionReset),
            other => panic!("expected Io, got {other:?}"),
        }
    }

    #[test]
    fn tree_levels_counts_grouping_rounds() {
        assert_eq!(tree_levels(0, 4), 0);
        assert_eq!(tree_levels(4, 4), 0);
        assert_eq!(tree_levels(5, 4), 1);
        assert_eq!(tree_levels(16, 4), 1);
        assert_eq!(tree_levels(17, 4), 2);
        assert_eq!(tree_levels(10, 2), 3);
        assert_eq!(tree_levels(20, 2), 4);
    }

    fn narrow_config(max_depth: usize) -> WriterConfig {
        WriterConfig {
            min_chunk_size: 1,
            max_chunk_size: 16,
            split_bits: 9,
            max_parts_per_document: 2,
            max_depth,
        }
    }

    #[test]
    fn tree_deeper_than_limit_is_rejected() {
        let store = InMemoryBlobStore::new();
        // Twenty fixed chunks, two parts per document: four grouping levels.
        let data = random_bytes(200, 13);
        let err = write_file_map_with(
            &store,
            &FileMap::new("deep"),
            &data[..],
            &narrow_config(3),
            FixedPolicy::new(10),
        )
        .unwrap_err();
        assert!(matches!(err, SchemaError::RecursionLimitExceeded { limit: 3 }));
    }

    #[test]
    fn tree_at_limit_reads_back() {
        let store = InMemoryBlobStore::new();
        let data = random_bytes(200, 14);
        let blob = write_file_map_with(
            &store,
            &FileMap::new("deep"),
            &data[..],
            &narrow_config(4),
            FixedPolicy::new(10),
        )
        .unwrap();
        let (_, depth) = leaves(&store, &load(&store, &blob));
        assert_eq!(depth, 4);

        let options = crate::reader::ReaderOptions { max_depth: 4 };
        let mut reader = FileReader::open_with(&store, &blob, options).unwrap();
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(out, data);
    }

    // -----------------------------------------------------------------------
    // Round trip under seeks
    // -----------------------------------------------------------------------

    #[test]
    fn seek_stress_default_config() {
        const FILE_SIZE: usize = (750 << 10) + 123;
        let data = random_bytes(FILE_SIZE, 1);
        let store = InMemoryBlobStore::new();
        let blob = write_file_map(&store, &FileMap::new("testfile"), &data[..]).unwrap();

        let mut off = 0;
        while off < FILE_SIZE {
            let mut reader = FileReader::open(&store, &blob).unwrap();
            assert_eq!(reader.seek(SeekFrom::Start(off as u64)).unwrap(), off as u64);
            let mut got = Vec::new();
            reader.read_to_end(&mut got).unwrap();
            assert!(got == data[off..], "incorrect read at offset {off}");
            reader.close().unwrap();
            off += 9_999;
        }
    }

    #[test]
    fn seek_stress_nested_tree() {
        let data = random_bytes(150_000, 11);
        let store = InMemoryBlobStore::new();
        let blob = write_small(&store, &data);

        let mut reader = FileReader::open(&store, &blob).unwrap();
        let mut rng = rand::rngs::StdRng::seed_from_u64(12);
        for _ in 0..200 {
            let off = rng.gen_range(0..data.len());
            let len = rng.gen_range(0..10_000).min(data.len() - off);
            let got = reader.read_range(off as u64, len).unwrap();
            assert!(got == data[off..off + len], "mismatch at {off}+{len}");
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn roundtrip_any_range(
            data in proptest::collection::vec(any::<u8>(), 0..20_000),
            start in 0usize..20_000,
            len in 0usize..5_000,
        ) {
            let store = InMemoryBlobStore::new();
            let config = WriterConfig {
                min_chunk_size: 64,
                max_chunk_size: 700,
                split_bits: 7,
                max_parts_per_document: 3,
                ..WriterConfig::default()
            };
            let blob = write_file_map_with(
                &store,
                &FileMap::new("prop"),
                &data[..],
                &config,
                RollingPolicy::from_config(&config),
            ).unwrap();

            let mut reader = FileReader::open(&store, &blob).unwrap();
            prop_assert_eq!(reader.size(), data.len() as u64);
            let start = start.min(data.len());
            let end = (start + len).min(data.len());
            let got = reader.read_range(start as u64, len).unwrap();
            prop_assert_eq!(&got[..], &data[start..end]);
        }
    }
}
