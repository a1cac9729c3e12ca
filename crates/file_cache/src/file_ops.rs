//! Basic file operations

use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::path::Path;

/// Read entire file content
pub fn read_file<P: AsRef<Path>>(path: P) -> Result<String> {
    let path = path.as_ref();
    fs::read_to_string(path).with_context(|| format!("Failed to read file: {}", path.display()))
}

/// Write content to file, creating parent directories if needed
pub fn write_file<P: AsRef<Path>>(path: P, content: &str) -> Result<()> {
    let path = path.as_ref();

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| {
            format!("Failed to create parent directories: {}", parent.display())
        })?;
    }

    fs::write(path, content).with_context(|| format!("Failed to write file: {}", path.display()))
}

pub fn file_exists<P: AsRef<Path>>(path: P) -> bool {
    path.as_ref().is_file()
}

/// Read and deserialize a JSON file
pub fn read_json<T: DeserializeOwned, P: AsRef<Path>>(path: P) -> Result<T> {
    let path = path.as_ref();
    let text = read_file(path)?;
    serde_json::from_str(&text).with_context(|| format!("Failed to parse json: {}", path.display()))
}

/// Serialize as pretty JSON and write, creating parent directories if needed
pub fn write_json<T: Serialize + ?Sized, P: AsRef<Path>>(path: P, value: &T) -> Result<()> {
    let path = path.as_ref();
    let text = serde_json::to_string_pretty(value)
        .with_context(|| format!("Failed to serialize json for: {}", path.display()))?;
    write_file(path, &text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_with_parent_dirs() {
        let temp_dir = TempDir::new().unwrap();
        let nested_file = temp_dir.path().join("nested").join("dir").join("test.txt");

        write_file(&nested_file, "Nested content").unwrap();

        assert_eq!(read_file(&nested_file).unwrap(), "Nested content");
        assert!(file_exists(&nested_file));
        assert!(!file_exists(temp_dir.path().join("missing.txt")));
    }

    #[test]
    fn test_json_helpers() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("a").join("value.json");

        write_json(&file, &vec![1, 2, 3]).unwrap();
        let back: Vec<i32> = read_json(&file).unwrap();
        assert_eq!(back, vec![1, 2, 3]);

        let text = read_file(&file).unwrap();
        assert!(text.contains('\n'), "pretty printed");
    }

    #[test]
    fn test_read_json_reports_path_on_garbage() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("bad.json");
        write_file(&file, "{not json").unwrap();

        let err = read_json::<serde_json::Value, _>(&file).unwrap_err();
        assert!(format!("{:#}", err).contains("bad.json"));
    }
}
