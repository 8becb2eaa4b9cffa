// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Input directory scanning

use std::path::{Path, PathBuf};
use tracing::{debug, error};

use crate::{AgesortError, Result};

/// List the images directly inside `dir` whose extension is in `extensions`.
///
/// Sub-directories are not descended into. The result is sorted by file name
/// so that runs are reproducible.
pub fn list_images(dir: &Path, extensions: &[String]) -> Result<Vec<PathBuf>> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            error!("Directory not found: {:?}", dir);
            error!("Is the drive mounted, and is the path correct?");
            return Err(AgesortError::InputMissing(dir.to_path_buf()));
        }
        Err(e) => return Err(e.into()),
    };

    let mut files: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file())
        .filter(|p| should_process(p) && has_extension(p, extensions))
        .collect();

    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    debug!("Found {} candidate images in {:?}", files.len(), dir);

    Ok(files)
}

/// Case-insensitive extension check against an allow-list (without dots)
pub fn has_extension(path: &Path, extensions: &[String]) -> bool {
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => extensions
            .iter()
            .any(|allowed| allowed.trim_start_matches('.').eq_ignore_ascii_case(ext)),
        None => false,
    }
}

/// Check if a file should be processed
pub fn should_process(path: &Path) -> bool {
    let filename = match path.file_name().and_then(|n| n.to_str()) {
        Some(n) => n,
        None => return false,
    };

    // Hidden files, including macOS "._" resource forks
    if filename.starts_with('.') {
        return false;
    }

    let temp_extensions = [".tmp", ".part", ".crdownload", ".partial", ".download"];
    if temp_extensions.iter().any(|ext| filename.ends_with(ext)) {
        return false;
    }

    let skip_names = ["desktop.ini", "thumbs.db", "ds_store"];
    if skip_names.iter().any(|n| filename.eq_ignore_ascii_case(n)) {
        return false;
    }

    true
}

/// Is this a HEIC/HEIF container by extension
pub fn is_heic(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("heic") || e.eq_ignore_ascii_case("heif"))
        .unwrap_or(false)
}

/// File name for log lines
pub fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn exts() -> Vec<String> {
        ["jpg", "jpeg", "png", "webp"].into_iter().map(String::from).collect()
    }

    #[test]
    fn filters_by_extension_case_insensitively() {
        assert!(has_extension(Path::new("a/face.JPG"), &exts()));
        assert!(has_extension(Path::new("face.webp"), &exts()));
        assert!(!has_extension(Path::new("face.heic"), &exts()));
        assert!(!has_extension(Path::new("face.gif"), &exts()));
        assert!(!has_extension(Path::new("README"), &exts()));
    }

    #[test]
    fn accepts_dotted_allow_list_entries() {
        let dotted = vec![".jpg".to_string()];
        assert!(has_extension(Path::new("x.jpg"), &dotted));
    }

    #[test]
    fn skips_hidden_and_system_files() {
        assert!(!should_process(Path::new("/in/.hidden.jpg")));
        assert!(!should_process(Path::new("/in/._face.jpg")));
        assert!(!should_process(Path::new("/in/DS_Store")));
        assert!(!should_process(Path::new("/in/Thumbs.db")));
        assert!(!should_process(Path::new("/in/face.jpg.part")));
        assert!(should_process(Path::new("/in/face.jpg")));
    }

    #[test]
    fn lists_only_supported_top_level_files_sorted() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.png", "a.JPG", "c.txt", ".d.jpg", "e.gif"] {
            fs::write(dir.path().join(name), b"x").unwrap();
        }
        fs::create_dir(dir.path().join("nested.jpg")).unwrap();

        let files = list_images(dir.path(), &exts()).unwrap();
        let names: Vec<String> = files.iter().map(|p| display_name(p)).collect();
        assert_eq!(names, vec!["a.JPG", "b.png"]);
    }

    #[test]
    fn missing_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = list_images(&dir.path().join("unmounted"), &exts());
        assert!(matches!(result, Err(AgesortError::InputMissing(_))));
    }

    #[test]
    fn detects_heic() {
        assert!(is_heic(Path::new("IMG_0001.HEIC")));
        assert!(is_heic(Path::new("x.heif")));
        assert!(!is_heic(Path::new("x.jpg")));
    }
}
