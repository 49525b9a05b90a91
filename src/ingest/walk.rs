//! Input enumeration

use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

/// Find every regular file under `root`, recursively. The export layout is
/// flat-ish but archives sometimes nest by year; either way all files are
/// candidates and the extractor decides what each one is.
pub fn collect_files(root: &Path) -> Result<Vec<PathBuf>, walkdir::Error> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root) {
        let entry = entry?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    debug!(count = files.len(), root = %root.display(), "enumerated input files");
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn finds_nested_files() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("index.html"), "x").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub").join("t1.html"), "x").unwrap();

        let mut files = collect_files(dir.path()).unwrap();
        files.sort();
        assert_eq!(files.len(), 2);
        assert!(files[0].ends_with("index.html"));
        assert!(files[1].ends_with("t1.html"));
    }

    #[test]
    fn missing_root_is_an_error() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope");
        assert!(collect_files(&missing).is_err());
    }
}
