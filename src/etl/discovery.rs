use std::path::{Path, PathBuf};
use tracing::warn;
use walkdir::WalkDir;

/// Returns the absolute paths of all files under `root` (recursively) whose
/// extension is `extension`, sorted so that runs are reproducible.
pub fn discover_files(root: &Path, extension: &str) -> Vec<PathBuf> {
    let mut files = Vec::new();
    for entry_result in WalkDir::new(root).follow_links(true) {
        let entry = match entry_result {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable entry under {}: {}", root.display(), e);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        if entry.path().extension().and_then(|e| e.to_str()) != Some(extension) {
            continue;
        }
        let path = match entry.path().canonicalize() {
            Ok(path) => path,
            Err(e) => {
                warn!("Could not resolve {}: {}", entry.path().display(), e);
                continue;
            }
        };
        files.push(path);
    }
    files.sort();
    files
}
