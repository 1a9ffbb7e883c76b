//! File and directory loading.
//!
//! Each file becomes one [`Document`] whose metadata carries `source`
//! (the path as given). PDFs are text-extracted with `pdf-extract`;
//! every other file must be valid UTF-8. A file that cannot be read or
//! decoded fails the whole load.

use anyhow::{bail, Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use content_rag_core::models::{Document, SOURCE_KEY};

/// Glob patterns always excluded from directory imports.
pub const DEFAULT_EXCLUDES: &[&str] = &["**/.git/**", "**/target/**", "**/node_modules/**"];

/// Load one file.
pub fn load_file(path: &Path) -> Result<Document> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read file: {}", path.display()))?;

    let text = if is_pdf(path) {
        pdf_extract::extract_text_from_mem(&bytes)
            .map_err(|e| anyhow::anyhow!("PDF extraction failed for {}: {}", path.display(), e))?
    } else {
        String::from_utf8(bytes)
            .with_context(|| format!("File is not valid UTF-8: {}", path.display()))?
    };

    Ok(Document::new(text).with_metadata(SOURCE_KEY, path.display().to_string()))
}

/// Load every path in order, one document per file.
pub fn load_files(paths: &[PathBuf]) -> Result<Vec<Document>> {
    let mut documents = Vec::with_capacity(paths.len());
    for path in paths {
        tracing::debug!(path = %path.display(), "loading file");
        documents.push(load_file(path)?);
    }
    Ok(documents)
}

/// Files under `root` matching `include_globs` (everything when empty)
/// and not matching `exclude_globs` or [`DEFAULT_EXCLUDES`], sorted by
/// relative path.
pub fn scan_dir(
    root: &Path,
    include_globs: &[String],
    exclude_globs: &[String],
) -> Result<Vec<PathBuf>> {
    if !root.is_dir() {
        bail!("Not a directory: {}", root.display());
    }

    let include_set = if include_globs.is_empty() {
        None
    } else {
        Some(build_globset(include_globs)?)
    };

    let mut excludes: Vec<String> = DEFAULT_EXCLUDES.iter().map(|s| s.to_string()).collect();
    excludes.extend(exclude_globs.iter().cloned());
    let exclude_set = build_globset(&excludes)?;

    let mut files: Vec<(String, PathBuf)> = Vec::new();
    for entry in WalkDir::new(root) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let rel_str = relative.to_string_lossy().to_string();

        if exclude_set.is_match(&rel_str) {
            continue;
        }
        if let Some(include) = &include_set {
            if !include.is_match(&rel_str) {
                continue;
            }
        }
        files.push((rel_str, path.to_path_buf()));
    }

    files.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(files.into_iter().map(|(_, p)| p).collect())
}

/// Expand a mix of files and directories into a file list. Directories
/// are scanned with [`scan_dir`]; files are kept as given.
pub fn expand_paths(
    paths: &[PathBuf],
    include_globs: &[String],
    exclude_globs: &[String],
) -> Result<Vec<PathBuf>> {
    let mut out = Vec::new();
    for path in paths {
        if path.is_dir() {
            out.extend(scan_dir(path, include_globs, exclude_globs)?);
        } else {
            out.push(path.clone());
        }
    }
    Ok(out)
}

fn is_pdf(path: &Path) -> bool {
    path.extension()
        .map(|e| e.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false)
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(Glob::new(pattern).with_context(|| format!("Invalid glob: {}", pattern))?);
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn tree() -> TempDir {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        fs::create_dir_all(root.join("docs/sub")).unwrap();
        fs::create_dir_all(root.join(".git")).unwrap();
        fs::create_dir_all(root.join("node_modules/pkg")).unwrap();
        fs::write(root.join("docs/b.md"), "bee").unwrap();
        fs::write(root.join("docs/a.txt"), "ay").unwrap();
        fs::write(root.join("docs/sub/c.md"), "see").unwrap();
        fs::write(root.join(".git/config"), "x").unwrap();
        fs::write(root.join("node_modules/pkg/index.md"), "x").unwrap();
        tmp
    }

    fn names(paths: &[PathBuf], root: &Path) -> Vec<String> {
        paths
            .iter()
            .map(|p| p.strip_prefix(root).unwrap().to_string_lossy().to_string())
            .collect()
    }

    #[test]
    fn test_scan_dir_sorted_with_default_excludes() {
        let tmp = tree();
        let files = scan_dir(tmp.path(), &[], &[]).unwrap();
        assert_eq!(
            names(&files, tmp.path()),
            vec!["docs/a.txt", "docs/b.md", "docs/sub/c.md"]
        );
    }

    #[test]
    fn test_scan_dir_include_and_exclude() {
        let tmp = tree();
        let files = scan_dir(
            tmp.path(),
            &["**/*.md".to_string()],
            &["**/sub/**".to_string()],
        )
        .unwrap();
        assert_eq!(names(&files, tmp.path()), vec!["docs/b.md"]);
    }

    #[test]
    fn test_load_file_sets_source() {
        let tmp = tree();
        let path = tmp.path().join("docs/b.md");
        let doc = load_file(&path).unwrap();
        assert_eq!(doc.text, "bee");
        assert_eq!(doc.metadata[SOURCE_KEY], path.display().to_string());
    }

    #[test]
    fn test_load_missing_file_fails() {
        let tmp = TempDir::new().unwrap();
        let err = load_file(&tmp.path().join("nope.txt")).unwrap_err();
        assert!(err.to_string().contains("Failed to read file"));
    }

    #[test]
    fn test_load_invalid_utf8_fails() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("bin.dat");
        fs::write(&path, [0xff, 0xfe, 0x00]).unwrap();
        assert!(load_file(&path).is_err());
    }

    #[test]
    fn test_corrupt_pdf_fails() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("bad.PDF");
        fs::write(&path, b"not a valid pdf").unwrap();
        let err = load_file(&path).unwrap_err();
        assert!(err.to_string().contains("PDF extraction failed"));
    }

    #[test]
    fn test_expand_paths_mixes_files_and_dirs() {
        let tmp = tree();
        let single = tmp.path().join("docs/a.txt");
        let files = expand_paths(
            &[single.clone(), tmp.path().join("docs/sub")],
            &[],
            &[],
        )
        .unwrap();
        assert_eq!(files, vec![single, tmp.path().join("docs/sub/c.md")]);
    }
}
