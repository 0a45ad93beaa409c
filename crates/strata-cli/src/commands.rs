use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom, Write};

use anyhow::Context;
use chrono::{DateTime, Utc};
use colored::Colorize;
use strata_schema::{
    write_file_map_with, Document, FileMap, FileReader, FixedPolicy, PartSource, RollingPolicy,
};
use strata_store::{BlobFetcher, DiskBlobStore};
use strata_types::BlobRef;
use tracing::debug;

use crate::cli::*;
use crate::config::StrataConfig;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let mut config = StrataConfig::load(cli.config.as_deref())?;
    if let Some(store) = cli.store {
        config.store_root = store;
    }
    match cli.command {
        Command::Put(args) => cmd_put(&config, args),
        Command::Cat(args) => cmd_cat(&config, args),
        Command::Show(args) => cmd_show(&config, args),
        Command::Stat(args) => cmd_stat(&config, args),
        Command::Config(args) => cmd_config(&config, args),
    }
}

fn open_store(config: &StrataConfig) -> anyhow::Result<DiskBlobStore> {
    DiskBlobStore::open(&config.store_root, config.hash_algorithm)
        .with_context(|| format!("opening store at {}", config.store_root.display()))
}

fn parse_ref(s: &str) -> anyhow::Result<BlobRef> {
    s.parse().with_context(|| format!("invalid blob ref {s:?}"))
}

fn load_document(store: &dyn BlobFetcher, blob: &BlobRef) -> anyhow::Result<(Vec<u8>, Document)> {
    let bytes = store
        .fetch_bytes(blob)
        .with_context(|| format!("fetching {blob}"))?;
    let document = Document::from_bytes(&bytes)
        .with_context(|| format!("{blob} is not a composition document"))?;
    Ok((bytes, document))
}

// ---------------------------------------------------------------------------
// put
// ---------------------------------------------------------------------------

fn cmd_put(config: &StrataConfig, args: PutArgs) -> anyhow::Result<()> {
    let store = open_store(config)?;
    let (blob, size) = put_file(&store, config, &args)?;
    println!(
        "{} Stored {} ({} bytes)",
        "✓".green().bold(),
        args.path.display().to_string().bold(),
        size
    );
    println!("{blob}");
    Ok(())
}

fn put_file(
    store: &DiskBlobStore,
    config: &StrataConfig,
    args: &PutArgs,
) -> anyhow::Result<(BlobRef, u64)> {
    let file = File::open(&args.path)
        .with_context(|| format!("opening {}", args.path.display()))?;
    let metadata = file.metadata()?;
    let name = match &args.name {
        Some(name) => name.clone(),
        None => args
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
    };
    let mut file_map = FileMap::new(name);
    if let Ok(modified) = metadata.modified() {
        file_map = file_map.with_mtime(DateTime::<Utc>::from(modified));
    }

    let blob = match args.fixed {
        Some(size) => {
            write_file_map_with(store, &file_map, file, &config.writer, FixedPolicy::new(size))
        }
        None => write_file_map_with(
            store,
            &file_map,
            file,
            &config.writer,
            RollingPolicy::from_config(&config.writer),
        ),
    }
    .with_context(|| format!("storing {}", args.path.display()))?;
    debug!(blob = %blob.short(), size = metadata.len(), "stored file");
    Ok((blob, metadata.len()))
}

// ---------------------------------------------------------------------------
// cat
// ---------------------------------------------------------------------------

/// Bytes `cat` streams through one reader before reopening, which bounds
/// the reader's blob cache.
const CAT_WINDOW: u64 = 64 * 1024 * 1024;

fn cmd_cat(config: &StrataConfig, args: CatArgs) -> anyhow::Result<()> {
    let store = open_store(config)?;
    let stdout = io::stdout();
    let mut out = stdout.lock();
    cat_to(&store, config, &args, &mut out, CAT_WINDOW)?;
    out.flush()?;
    Ok(())
}

fn cat_to(
    store: &dyn BlobFetcher,
    config: &StrataConfig,
    args: &CatArgs,
    out: &mut dyn Write,
    window: u64,
) -> anyhow::Result<u64> {
    let blob = parse_ref(&args.blob)?;
    let open = || {
        FileReader::open_with(store, &blob, config.reader)
            .with_context(|| format!("opening {blob}"))
    };
    let size = open()?.size();
    let end = match args.length {
        Some(len) => args.offset.saturating_add(len).min(size),
        None => size,
    };

    let mut pos = args.offset;
    let mut windows = 0;
    while pos < end {
        let mut reader = open()?;
        reader.seek(SeekFrom::Start(pos))?;
        let want = (end - pos).min(window.max(1));
        let n = io::copy(&mut reader.by_ref().take(want), out)
            .with_context(|| format!("reading {blob}"))?;
        reader.close()?;
        windows += 1;
        if n == 0 {
            break;
        }
        pos += n;
    }
    let copied = pos - args.offset;
    debug!(blob = %blob.short(), offset = args.offset, copied, windows, "cat");
    Ok(copied)
}

// ---------------------------------------------------------------------------
// show / stat
// ---------------------------------------------------------------------------

fn cmd_show(config: &StrataConfig, args: ShowArgs) -> anyhow::Result<()> {
    let store = open_store(config)?;
    let blob = parse_ref(&args.blob)?;
    let (bytes, _) = load_document(&store, &blob)?;
    if args.raw {
        io::stdout().write_all(&bytes)?;
        println!();
    } else {
        let value: serde_json::Value = serde_json::from_slice(&bytes)?;
        println!("{}", serde_json::to_string_pretty(&value)?);
    }
    Ok(())
}

/// Shape of a document tree.
#[derive(Debug, Default, PartialEq, Eq)]
struct TreeStats {
    documents: usize,
    blob_parts: usize,
    zero_parts: usize,
    depth: usize,
}

fn tree_stats(store: &dyn BlobFetcher, document: &Document, limit: usize) -> anyhow::Result<TreeStats> {
    let mut stats = TreeStats {
        documents: 1,
        ..TreeStats::default()
    };
    for part in document.parts() {
        match part.source {
            PartSource::Blob(_) => stats.blob_parts += 1,
            PartSource::Zero => stats.zero_parts += 1,
            PartSource::Bytes(blob) => {
                anyhow::ensure!(limit > 0, "document tree deeper than the reader limit");
                let (_, nested) = load_document(store, &blob)?;
                let inner = tree_stats(store, &nested, limit - 1)?;
                stats.documents += inner.documents;
                stats.blob_parts += inner.blob_parts;
                stats.zero_parts += inner.zero_parts;
                stats.depth = stats.depth.max(inner.depth + 1);
            }
        }
    }
    Ok(stats)
}

fn cmd_stat(config: &StrataConfig, args: StatArgs) -> anyhow::Result<()> {
    let store = open_store(config)?;
    let blob = parse_ref(&args.blob)?;
    let (_, document) = load_document(&store, &blob)?;
    let stats = tree_stats(&store, &document, config.reader.max_depth)?;
    debug!(blob = %blob.short(), ?stats, "stat");

    println!("{} {}", "Ref:".bold(), blob.to_string().yellow());
    println!("  Type: {}", document.doc_type().to_string().cyan());
    if let Some(name) = document.name() {
        println!("  Name: {}", name.bold());
    }
    if let Some(mtime) = document.unix_mtime() {
        println!("  Modified: {}", mtime.to_rfc3339());
    }
    println!("  Size: {} bytes", document.total_size());
    println!("  Parts: {}", document.parts().len());
    println!(
        "  Tree: {} documents, {} data chunks, {} zero runs, depth {}",
        stats.documents, stats.blob_parts, stats.zero_parts, stats.depth
    );
    Ok(())
}

// ---------------------------------------------------------------------------
// config
// ---------------------------------------------------------------------------

fn cmd_config(config: &StrataConfig, args: ConfigArgs) -> anyhow::Result<()> {
    let shown = if args.defaults {
        StrataConfig::default()
    } else {
        config.clone()
    };
    print!("{}", shown.to_toml()?);
    Ok(())
}
