use anyhow::{anyhow, Result};
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use std::fs;
use std::io::Write;
use std::path::Path;

pub fn ensure_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path)
        .map_err(|e| anyhow!("failed to create directory {}: {}", path.display(), e))
}

/// Writes `bytes` next to `path` under a hidden temp name, syncs, then renames
/// over `path`. Readers never observe a partially written file.
pub fn atomic_write_bytes(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            ensure_dir(parent)?;
        }
    }
    let ts = Utc::now().timestamp_micros();
    let pid = std::process::id();
    let name = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("tmpfile");
    let tmp = path.with_file_name(format!(".{}.tmp.{}.{}", name, pid, ts));
    let mut file = fs::File::create(&tmp)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    fs::rename(&tmp, path)?;
    if let Some(parent) = path.parent() {
        if let Ok(dir) = fs::File::open(parent) {
            let _ = dir.sync_all();
        }
    }
    Ok(())
}

pub fn atomic_write_json_pretty<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let mut bytes = serde_json::to_vec_pretty(value)?;
    bytes.push(b'\n');
    atomic_write_bytes(path, &bytes)
}

pub fn load_json_file(path: &Path) -> Result<Value> {
    let bytes = fs::read(path).map_err(|e| anyhow!("failed to read {}: {}", path.display(), e))?;
    serde_json::from_slice(&bytes)
        .map_err(|e| anyhow!("failed to parse JSON in {}: {}", path.display(), e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn temp_root(tag: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!(
            "lab_core_{}_{}_{}",
            tag,
            std::process::id(),
            Utc::now().timestamp_micros()
        ))
    }

    #[test]
    fn atomic_write_creates_parent_and_leaves_no_temp_files() {
        let root = temp_root("atomic");
        let target = root.join("nested").join("report.json");
        atomic_write_json_pretty(&target, &json!({"trials": []})).expect("write");

        let loaded = load_json_file(&target).expect("load");
        assert_eq!(loaded, json!({"trials": []}));

        let leftovers: Vec<_> = fs::read_dir(target.parent().expect("parent"))
            .expect("read dir")
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().contains(".tmp."))
            .collect();
        assert!(leftovers.is_empty(), "temp files left behind: {:?}", leftovers);
        let _ = fs::remove_dir_all(root);
    }

    #[test]
    fn atomic_write_replaces_existing_content() {
        let root = temp_root("replace");
        ensure_dir(&root).expect("root");
        let target = root.join("out.json");
        atomic_write_bytes(&target, b"old").expect("first write");
        atomic_write_json_pretty(&target, &json!({"v": 2})).expect("second write");
        assert_eq!(load_json_file(&target).expect("load"), json!({"v": 2}));
        let _ = fs::remove_dir_all(root);
    }

    #[test]
    fn load_json_file_reports_path_on_parse_failure() {
        let root = temp_root("parse");
        ensure_dir(&root).expect("root");
        let target = root.join("broken.json");
        fs::write(&target, "{not json").expect("write");
        let err = load_json_file(&target).expect_err("should fail");
        assert!(
            err.to_string().contains("broken.json"),
            "missing path in error: {}",
            err
        );
        let _ = fs::remove_dir_all(root);
    }
}
