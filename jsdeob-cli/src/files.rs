use std::path::{Path, PathBuf};

use anyhow::Context;

/// Collect the `.js` files below `root`, sorted.
///
/// A file path is returned as-is if it has a `.js` extension. A missing root yields
/// an empty list.
pub fn collect_scripts(root: &Path) -> anyhow::Result<Vec<PathBuf>> {
    if root.is_file() {
        return Ok(if is_script_file(root) {
            vec![root.to_path_buf()]
        } else {
            Vec::new()
        });
    }
    let mut files = Vec::new();
    if root.is_dir() {
        collect_scripts_recursive(root, &mut files)?;
    }
    files.sort();
    Ok(files)
}

fn collect_scripts_recursive(dir: &Path, files: &mut Vec<PathBuf>) -> anyhow::Result<()> {
    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read directory: {}", dir.display()))?;

    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            collect_scripts_recursive(&path, files)?;
        } else if is_script_file(&path) {
            files.push(path);
        }
    }
    Ok(())
}

/// Returns true if the path has a `.js` extension, in any case.
pub fn is_script_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("js"))
}

/// Where the decoded copy of `file` goes.
///
/// The path of `file` relative to `input_root` is recreated under `output_root`; a
/// single-file input lands directly in `output_root`.
pub fn mirror_path(input_root: &Path, file: &Path, output_root: &Path) -> PathBuf {
    match file.strip_prefix(input_root) {
        Ok(relative) if !relative.as_os_str().is_empty() => output_root.join(relative),
        _ => output_root.join(file.file_name().unwrap_or(file.as_os_str())),
    }
}

/// Write `contents` to `path`, creating parent directories.
pub fn write_mirrored(path: &Path, contents: &str) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create output directory: {}", parent.display()))?;
    }
    std::fs::write(path, contents)
        .with_context(|| format!("failed to write output: {}", path.display()))
}

/// Extract a display-friendly filename from a path.
pub fn file_display_name(path: &Path) -> String {
    path.file_name().map_or_else(
        || path.display().to_string(),
        |f| f.to_string_lossy().to_string(),
    )
}
