use anyhow::{Context, Result};
use lexrag_core::Document;
use serde::Deserialize;
use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug, Deserialize)]
struct JsonlDoc {
    id: String,
    text: String,
}

fn files_with_ext(dir: &Path, ext: &str) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .map(|e| e.into_path())
        .filter(|p| p.is_file() && p.extension().and_then(|s| s.to_str()) == Some(ext))
        .collect();
    files.sort();
    files
}

fn file_id(path: &Path) -> String {
    path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default()
}

fn load_jsonl(path: &Path, docs: &mut Vec<Document>) -> Result<()> {
    let reader = BufReader::new(File::open(path)?);
    for (lineno, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() { continue; }
        let doc: JsonlDoc = serde_json::from_str(&line)
            .with_context(|| format!("{}:{}: invalid document record", path.display(), lineno + 1))?;
        docs.push(Document::new(doc.id, doc.text));
    }
    Ok(())
}

/// Read every directory in order, non-recursively: `*.md`, then `*.txt`, then `*.jsonl`
/// records, each group sorted by file name. Missing directories are skipped.
pub fn load_documents<P: AsRef<Path>>(dirs: &[P]) -> Result<Vec<Document>> {
    let mut docs = Vec::new();
    for dir in dirs {
        let dir = dir.as_ref();
        if !dir.is_dir() {
            tracing::warn!(dir = %dir.display(), "corpus directory missing, skipping");
            continue;
        }
        for ext in ["md", "txt"] {
            for path in files_with_ext(dir, ext) {
                let text = fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
                docs.push(Document::new(file_id(&path), text));
            }
        }
        for path in files_with_ext(dir, "jsonl") {
            load_jsonl(&path, &mut docs)?;
        }
    }
    tracing::info!(documents = docs.len(), "loaded corpus");
    Ok(docs)
}
