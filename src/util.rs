//! Shared utility functions for the textcraft crate.

use std::fs;
use std::io;
use std::path::Path;
use uuid::Uuid;

/// Extract a JSON object from text that may contain other content.
/// Uses brace-counting to find the outermost JSON object, skipping braces
/// that appear inside string literals.
pub fn extract_json_object(text: &str) -> Option<String> {
    let start = text.find('{')?;
    let mut depth = 0;
    let mut end = start;
    let mut in_string = false;
    let mut escaped = false;

    for (i, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    end = start + i + 1;
                    break;
                }
            }
            _ => {}
        }
    }

    if depth == 0 && end > start {
        Some(text[start..end].to_string())
    } else {
        None
    }
}

/// Replace `path` with `contents` so readers only ever see the old or the new
/// document: write a sibling temp file, then rename it over the target.
///
/// Every call gets its own temp name, so writers in different processes
/// never truncate or rename each other's half-written file.
pub fn write_atomic(path: &Path, contents: &str) -> io::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(format!(".{}.tmp", Uuid::new_v4().simple()));
    let tmp_path = path.with_file_name(tmp_name);
    if let Err(e) = fs::write(&tmp_path, contents) {
        let _ = fs::remove_file(&tmp_path);
        return Err(e);
    }
    fs::rename(&tmp_path, path).inspect_err(|_| {
        let _ = fs::remove_file(&tmp_path);
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_json_object_simple() {
        let text = r#"{"key": "value"}"#;
        assert_eq!(extract_json_object(text), Some(r#"{"key": "value"}"#.to_string()));
    }

    #[test]
    fn test_extract_json_object_with_prefix() {
        let text = r#"Here is the JSON: {"key": "value"}"#;
        assert_eq!(extract_json_object(text), Some(r#"{"key": "value"}"#.to_string()));
    }

    #[test]
    fn test_extract_json_object_inside_code_fence() {
        let text = "```json\n{\"action_type\": \"wait\"}\n```";
        assert_eq!(
            extract_json_object(text),
            Some("{\"action_type\": \"wait\"}".to_string())
        );
    }

    #[test]
    fn test_extract_json_object_nested() {
        let text = r#"{"outer": {"inner": "value"}}"#;
        assert_eq!(extract_json_object(text), Some(r#"{"outer": {"inner": "value"}}"#.to_string()));
    }

    #[test]
    fn test_extract_json_object_ignores_braces_in_strings() {
        let text = r#"{"note": "use } carefully", "n": 1} trailing"#;
        assert_eq!(
            extract_json_object(text),
            Some(r#"{"note": "use } carefully", "n": 1}"#.to_string())
        );
    }

    #[test]
    fn test_extract_json_object_no_json() {
        assert_eq!(extract_json_object("No JSON here"), None);
    }

    #[test]
    fn test_extract_json_object_unclosed() {
        let text = r#"{"key": "value""#;
        assert_eq!(extract_json_object(text), None);
    }

    #[test]
    fn test_write_atomic_replaces_and_leaves_no_temp() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("doc.json");
        write_atomic(&path, "{\"v\": 1}").unwrap();
        write_atomic(&path, "{\"v\": 2}").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "{\"v\": 2}");
        let names: Vec<_> = fs::read_dir(dir.path().join("nested"))
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec!["doc.json"]);
    }

    #[test]
    fn test_write_atomic_concurrent_writers_never_tear() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("control.json");
        let docs: Vec<String> = (0..4)
            .map(|i| format!("{{\"writer\": {}, \"pad\": \"{}\"}}", i, "x".repeat(64 * 1024)))
            .collect();

        std::thread::scope(|scope| {
            for doc in &docs {
                let path = &path;
                scope.spawn(move || {
                    for _ in 0..25 {
                        write_atomic(path, doc).unwrap();
                    }
                });
            }
        });

        let last = fs::read_to_string(&path).unwrap();
        assert!(docs.contains(&last));
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
