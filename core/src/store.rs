use crate::chunker::ChunkParams;
use crate::document::Chunk;
use crate::error::{Result, RetrievalError};
use crate::index::Index;
use crate::vectorizer::{SparseVector, TermStats};
use serde::{Deserialize, Serialize};
use std::fs::{self, create_dir_all, File};
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

const VECTORS_FILE: &str = "vectors.bin";
const METADATA_FILE: &str = "metadata.json";

/// Statistics and chunk vectors, bincode encoded.
#[derive(Debug, Serialize, Deserialize)]
struct VectorFile {
    built_at: String,
    stats: TermStats,
    vectors: Vec<SparseVector>,
}

/// Human readable half of an index: chunk metadata in index order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataFile {
    pub built_at: String,
    pub chunk_count: usize,
    pub chunking: ChunkParams,
    pub chunks: Vec<Chunk>,
}

#[derive(Debug, Clone)]
pub struct IndexPaths {
    pub root: PathBuf,
}

impl IndexPaths {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        // collecting components drops a trailing separator, keeping siblings outside the root
        Self { root: root.as_ref().components().collect() }
    }
    pub fn vectors(&self) -> PathBuf { self.root.join(VECTORS_FILE) }
    pub fn metadata(&self) -> PathBuf { self.root.join(METADATA_FILE) }
    /// Where the next generation is written before it is swapped in.
    pub fn staging(&self) -> PathBuf { self.sibling(".staging") }
    /// Where the replaced generation waits until the swap completes.
    pub fn previous(&self) -> PathBuf { self.sibling(".previous") }

    fn sibling(&self, suffix: &str) -> PathBuf {
        let mut name = self.root.as_os_str().to_os_string();
        name.push(suffix);
        PathBuf::from(name)
    }
}

fn build_stamp() -> String {
    let now = OffsetDateTime::now_utc();
    now.format(&Rfc3339).unwrap_or_else(|_| now.unix_timestamp_nanos().to_string())
}

fn write_synced(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut f = File::create(path)?;
    f.write_all(bytes)?;
    f.sync_all()?;
    Ok(())
}

fn read_all(path: &Path) -> Result<Vec<u8>> {
    let mut f = File::open(path)?;
    let mut buf = Vec::new();
    f.read_to_end(&mut buf)?;
    Ok(buf)
}

fn corrupt(msg: impl Into<String>) -> RetrievalError {
    RetrievalError::CorruptIndex(msg.into())
}

fn remove_dir_if_present(dir: &Path) -> Result<()> {
    match fs::remove_dir_all(dir) {
        Err(e) if e.kind() != ErrorKind::NotFound => Err(e.into()),
        _ => Ok(()),
    }
}

// The swap moves the whole root aside, so it must hold nothing but index artifacts.
fn ensure_replaceable(root: &Path) -> Result<()> {
    if !root.exists() {
        return Ok(());
    }
    for entry in fs::read_dir(root)? {
        let name = entry?.file_name();
        if name != VECTORS_FILE && name != METADATA_FILE {
            return Err(RetrievalError::Configuration(format!(
                "refusing to replace {}: it contains {:?}, which is not an index artifact",
                root.display(),
                name
            )));
        }
    }
    Ok(())
}

/// Persist `index` as a unit. Both artifacts are written into a staging directory next to
/// the root, which then replaces the root by directory rename. The replaced generation is
/// kept as `<root>.previous` until the new one is in place, and [`load_index`] falls back to
/// it, so a crash mid-swap never loses the last good index. Both artifacts share a build
/// stamp, so any torn pair is still rejected on load.
pub fn save_index(paths: &IndexPaths, index: &Index, chunking: &ChunkParams) -> Result<()> {
    ensure_replaceable(&paths.root)?;
    let built_at = build_stamp();

    let vectors = VectorFile { built_at: built_at.clone(), stats: index.stats().clone(), vectors: index.vectors().to_vec() };
    let vector_bytes = bincode::serialize(&vectors).map_err(|e| corrupt(format!("encode {VECTORS_FILE}: {e}")))?;
    let metadata = MetadataFile {
        built_at: built_at.clone(),
        chunk_count: index.len(),
        chunking: *chunking,
        chunks: index.chunks().to_vec(),
    };
    let metadata_json = serde_json::to_string_pretty(&metadata).map_err(|e| corrupt(format!("encode {METADATA_FILE}: {e}")))?;

    let staging = paths.staging();
    remove_dir_if_present(&staging)?;
    create_dir_all(&staging)?;
    write_synced(&staging.join(VECTORS_FILE), &vector_bytes)?;
    write_synced(&staging.join(METADATA_FILE), metadata_json.as_bytes())?;

    // without a root, `previous` is the last good generation and stays until the swap lands
    let previous = paths.previous();
    if paths.root.exists() {
        remove_dir_if_present(&previous)?;
        fs::rename(&paths.root, &previous)?;
    }
    fs::rename(&staging, &paths.root)?;
    remove_dir_if_present(&previous)?;

    tracing::info!(root = %paths.root.display(), chunks = index.len(), %built_at, "index saved");
    Ok(())
}

pub fn load_metadata(paths: &IndexPaths) -> Result<MetadataFile> {
    let bytes = read_all(&paths.metadata())?;
    serde_json::from_slice(&bytes).map_err(|e| corrupt(format!("{METADATA_FILE}: {e}")))
}

fn load_vectors(paths: &IndexPaths) -> Result<VectorFile> {
    let bytes = read_all(&paths.vectors())?;
    bincode::deserialize(&bytes).map_err(|e| corrupt(format!("{VECTORS_FILE}: {e}")))
}

/// Load and cross-check both artifacts. Any disagreement is a [`RetrievalError::CorruptIndex`].
///
/// A missing root with a complete `<root>.previous` means a save stopped mid-swap; the
/// previous generation is served. A torn read is retried once, since a concurrent save may
/// have swapped directories between the two artifact reads.
pub fn load_index(paths: &IndexPaths) -> Result<Index> {
    match load_generation(paths) {
        Err(RetrievalError::CorruptIndex(reason)) => {
            tracing::debug!(%reason, root = %paths.root.display(), "retrying load once");
            load_generation(paths)
        }
        other => other,
    }
}

fn load_generation(paths: &IndexPaths) -> Result<Index> {
    if !paths.root.exists() {
        let previous = IndexPaths { root: paths.previous() };
        if previous.vectors().is_file() && previous.metadata().is_file() {
            tracing::warn!(root = %paths.root.display(), "index directory missing, serving previous generation");
            return load_from(&previous).or_else(|_| load_from(paths));
        }
        return Err(RetrievalError::IndexNotFound { path: paths.root.clone() });
    }
    load_from(paths)
}

fn load_from(paths: &IndexPaths) -> Result<Index> {
    let has_vectors = paths.vectors().is_file();
    let has_metadata = paths.metadata().is_file();
    match (has_vectors, has_metadata) {
        (false, false) => return Err(RetrievalError::IndexNotFound { path: paths.root.clone() }),
        (true, false) => return Err(corrupt(format!("{METADATA_FILE} is missing"))),
        (false, true) => return Err(corrupt(format!("{VECTORS_FILE} is missing"))),
        (true, true) => {}
    }

    let metadata = load_metadata(paths).map_err(not_found_as_corrupt)?;
    let vectors = load_vectors(paths).map_err(not_found_as_corrupt)?;

    if metadata.built_at != vectors.built_at {
        return Err(corrupt(format!(
            "artifacts come from different builds ({} vs {})",
            metadata.built_at, vectors.built_at
        )));
    }
    if metadata.chunk_count != metadata.chunks.len() {
        return Err(corrupt(format!(
            "metadata declares {} chunks but lists {}",
            metadata.chunk_count,
            metadata.chunks.len()
        )));
    }
    if vectors.stats.corpus_size != metadata.chunks.len() {
        return Err(corrupt(format!(
            "statistics fitted over {} chunks but index holds {}",
            vectors.stats.corpus_size,
            metadata.chunks.len()
        )));
    }
    if !vectors.stats.idf.keys().eq(vectors.stats.document_frequency.keys()) {
        return Err(corrupt("idf and document frequency vocabularies differ"));
    }

    let index = Index::new(metadata.chunks, vectors.vectors, vectors.stats)?;
    tracing::info!(root = %paths.root.display(), chunks = index.len(), built_at = %metadata.built_at, "index loaded");
    Ok(index)
}

// A file vanishing between the existence check and the read means a publish raced us.
fn not_found_as_corrupt(err: RetrievalError) -> RetrievalError {
    match err {
        RetrievalError::Io(e) if e.kind() == ErrorKind::NotFound => corrupt(format!("artifact disappeared during load: {e}")),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vectorizer::{fit, transform};
    use tempfile::tempdir;

    fn tiny_index() -> Index {
        let corpus = vec![vec!["cat", "dog", "cat"], vec!["dog", "bird"]];
        let stats = fit(&corpus);
        let vectors = corpus.iter().map(|t| transform(&t[..], &stats)).collect();
        let chunks = vec![
            Chunk { document_id: "a.txt".into(), ordinal: 0, text: "cat dog cat".into() },
            Chunk { document_id: "b.txt".into(), ordinal: 0, text: "dog bird".into() },
        ];
        Index::new(chunks, vectors, stats).unwrap()
    }

    fn params() -> ChunkParams { ChunkParams::new(10, 2).unwrap() }

    #[test]
    fn round_trip() {
        let dir = tempdir().unwrap();
        let paths = IndexPaths::new(dir.path().join("idx"));
        let index = tiny_index();
        save_index(&paths, &index, &params()).unwrap();
        assert_eq!(load_index(&paths).unwrap(), index);
        assert!(!paths.staging().exists());
        assert!(!paths.previous().exists());
        assert_eq!(load_metadata(&paths).unwrap().chunking, params());
    }

    #[test]
    fn missing_directory_is_not_found() {
        let dir = tempdir().unwrap();
        let err = load_index(&IndexPaths::new(dir.path().join("nope"))).unwrap_err();
        assert!(matches!(err, RetrievalError::IndexNotFound { .. }));
    }

    #[test]
    fn one_missing_artifact_is_corrupt() {
        let dir = tempdir().unwrap();
        let paths = IndexPaths::new(dir.path().join("idx"));
        save_index(&paths, &tiny_index(), &params()).unwrap();
        fs::remove_file(paths.vectors()).unwrap();
        assert!(matches!(load_index(&paths), Err(RetrievalError::CorruptIndex(_))));
    }

    #[test]
    fn count_mismatch_is_corrupt() {
        let dir = tempdir().unwrap();
        let paths = IndexPaths::new(dir.path().join("idx"));
        save_index(&paths, &tiny_index(), &params()).unwrap();
        let mut meta = load_metadata(&paths).unwrap();
        meta.chunks.pop();
        meta.chunk_count = meta.chunks.len();
        fs::write(paths.metadata(), serde_json::to_string(&meta).unwrap()).unwrap();
        assert!(matches!(load_index(&paths), Err(RetrievalError::CorruptIndex(_))));
    }

    #[test]
    fn mixed_builds_are_corrupt() {
        let dir = tempdir().unwrap();
        let paths = IndexPaths::new(dir.path().join("idx"));
        save_index(&paths, &tiny_index(), &params()).unwrap();
        let mut meta = load_metadata(&paths).unwrap();
        meta.built_at = "1970-01-01T00:00:00Z".into();
        fs::write(paths.metadata(), serde_json::to_string(&meta).unwrap()).unwrap();
        assert!(matches!(load_index(&paths), Err(RetrievalError::CorruptIndex(_))));
    }

    #[test]
    fn garbage_is_corrupt() {
        let dir = tempdir().unwrap();
        let paths = IndexPaths::new(dir.path().join("idx"));
        save_index(&paths, &tiny_index(), &params()).unwrap();
        fs::write(paths.vectors(), b"not bincode").unwrap();
        assert!(matches!(load_index(&paths), Err(RetrievalError::CorruptIndex(_))));
        fs::write(paths.metadata(), b"{").unwrap();
        assert!(matches!(load_index(&paths), Err(RetrievalError::CorruptIndex(_))));
    }

    #[test]
    fn trailing_separator_keeps_siblings_outside_root() {
        let dir = tempdir().unwrap();
        let paths = IndexPaths::new(format!("{}/", dir.path().join("idx").display()));
        assert_eq!(paths.staging(), dir.path().join("idx.staging"));
        assert_eq!(paths.previous(), dir.path().join("idx.previous"));
    }

    #[test]
    fn overwrite_replaces_the_whole_generation() {
        let dir = tempdir().unwrap();
        let paths = IndexPaths::new(dir.path().join("idx"));
        save_index(&paths, &tiny_index(), &params()).unwrap();

        let corpus = vec![vec!["fish"]];
        let stats = fit(&corpus);
        let vectors = vec![transform(&corpus[0][..], &stats)];
        let chunks = vec![Chunk { document_id: "c.txt".into(), ordinal: 0, text: "fish".into() }];
        let smaller = Index::new(chunks, vectors, stats).unwrap();
        save_index(&paths, &smaller, &params()).unwrap();

        assert_eq!(load_index(&paths).unwrap(), smaller);
        assert!(!paths.previous().exists());
    }

    #[test]
    fn interrupted_swap_serves_previous_generation() {
        let dir = tempdir().unwrap();
        let paths = IndexPaths::new(dir.path().join("idx"));
        let index = tiny_index();
        save_index(&paths, &index, &params()).unwrap();
        // state left by a crash after the old root was moved aside
        fs::rename(&paths.root, paths.previous()).unwrap();

        assert_eq!(load_index(&paths).unwrap(), index);
        save_index(&paths, &index, &params()).unwrap();
        assert!(!paths.previous().exists());
        assert_eq!(load_index(&paths).unwrap(), index);
    }

    #[test]
    fn stale_staging_is_discarded() {
        let dir = tempdir().unwrap();
        let paths = IndexPaths::new(dir.path().join("idx"));
        create_dir_all(paths.staging()).unwrap();
        fs::write(paths.staging().join(VECTORS_FILE), b"half written").unwrap();
        fs::write(paths.staging().join("junk"), b"x").unwrap();

        save_index(&paths, &tiny_index(), &params()).unwrap();
        assert_eq!(load_index(&paths).unwrap(), tiny_index());
        assert!(!paths.staging().exists());
        assert!(!paths.root.join("junk").exists());
    }

    #[test]
    fn foreign_files_block_replacement() {
        let dir = tempdir().unwrap();
        let paths = IndexPaths::new(dir.path().join("idx"));
        create_dir_all(&paths.root).unwrap();
        fs::write(paths.root.join("notes.txt"), b"keep me").unwrap();

        let err = save_index(&paths, &tiny_index(), &params()).unwrap_err();
        assert!(matches!(err, RetrievalError::Configuration(_)));
        assert_eq!(fs::read(paths.root.join("notes.txt")).unwrap(), b"keep me");
        assert!(!paths.staging().exists());
    }
}
