// src/store/persist.rs
//! JSON persistence for the dedup store.
//!
//! Document shape: `{ "<namespace>": { "<identity>": "<RFC3339>" } }`.
//! Files written before sinks were namespaced are flat (`{ "<identity>": "<RFC3339>" }`);
//! those records land in the caller-supplied default namespace. Mixed documents
//! are accepted entry by entry.

use super::{DedupStore, Snapshot, StoreError};
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use crate::shutdown::Shutdown;

fn parse_ts(namespace: &str, key: &str, value: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|source| StoreError::BadTimestamp {
            namespace: namespace.to_string(),
            key: key.to_string(),
            value: value.to_string(),
            source,
        })
}

/// Decode a persisted document. Fails on the first malformed value.
pub fn decode(bytes: &[u8], default_namespace: &str) -> Result<Snapshot, StoreError> {
    let doc: Map<String, Value> = serde_json::from_slice(bytes).map_err(StoreError::Decode)?;

    let mut snapshot = Snapshot::default();
    for (top_key, value) in doc {
        match value {
            // legacy flat entry: identity -> timestamp
            Value::String(ts) => {
                let parsed = parse_ts(default_namespace, &top_key, &ts)?;
                snapshot
                    .namespaces
                    .entry(default_namespace.to_string())
                    .or_default()
                    .insert(top_key, parsed);
            }
            Value::Object(records) => {
                let ns = snapshot.namespaces.entry(top_key.clone()).or_default();
                for (key, ts) in records {
                    let Value::String(ts) = ts else {
                        return Err(StoreError::BadTimeValue {
                            namespace: top_key,
                            key,
                        });
                    };
                    let parsed = parse_ts(&top_key, &key, &ts)?;
                    ns.insert(key, parsed);
                }
            }
            _ => return Err(StoreError::BadValue { key: top_key }),
        }
    }
    Ok(snapshot)
}

/// Encode as the namespaced document, timestamps in whole-second RFC3339 UTC.
pub fn encode(snapshot: &Snapshot) -> Result<Vec<u8>, StoreError> {
    let doc: BTreeMap<&str, BTreeMap<&str, String>> = snapshot
        .namespaces
        .iter()
        .map(|(ns, records)| {
            let records = records
                .iter()
                .map(|(k, ts)| (k.as_str(), ts.to_rfc3339_opts(SecondsFormat::Secs, true)))
                .collect();
            (ns.as_str(), records)
        })
        .collect();
    serde_json::to_vec_pretty(&doc).map_err(StoreError::Encode)
}

/// Read a snapshot from `path`. A missing file yields `Ok(None)`.
pub fn load(path: &Path, default_namespace: &str) -> Result<Option<Snapshot>, StoreError> {
    let bytes = match fs::read(path) {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(StoreError::Io {
                action: "reading",
                path: path.to_path_buf(),
                source,
            })
        }
    };
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Some(Snapshot::default()));
    }
    decode(&bytes, default_namespace).map(Some)
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Write `snapshot` to `path` via a sibling temp file and rename, so a crash
/// mid-write never leaves a truncated document behind.
pub fn save(path: &Path, snapshot: &Snapshot) -> Result<(), StoreError> {
    let io = |action: &'static str, p: &Path| {
        let p = p.to_path_buf();
        move |source| StoreError::Io {
            action,
            path: p,
            source,
        }
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io("creating directory", parent))?;
    }

    let bytes = encode(snapshot)?;
    let tmp = tmp_path(path);
    fs::write(&tmp, bytes).map_err(io("writing", &tmp))?;
    fs::rename(&tmp, path).map_err(io("replacing", path))?;
    Ok(())
}

/// Restore `store` from `path`. Returns the number of records loaded.
pub fn restore_from_file(
    store: &DedupStore,
    path: &Path,
    default_namespace: &str,
) -> Result<usize, StoreError> {
    match load(path, default_namespace)? {
        Some(snapshot) => {
            let n = snapshot.len();
            store.restore(snapshot);
            Ok(n)
        }
        None => {
            tracing::warn!(target: "store", path = %path.display(), "storage file does not exist, starting empty");
            Ok(0)
        }
    }
}

/// Snapshot `store` and write it to `path`. Returns the number of records saved.
pub fn save_store(store: &DedupStore, path: &Path) -> Result<usize, StoreError> {
    let snapshot = store.snapshot();
    save(path, &snapshot)?;
    Ok(snapshot.len())
}

/// `save_store`, retried `attempts` times with `pause` in between.
pub async fn save_store_with_retry(
    store: &DedupStore,
    path: &Path,
    attempts: u32,
    pause: Duration,
) -> Result<usize, StoreError> {
    let attempts = attempts.max(1);
    let mut attempt = 0;
    loop {
        attempt += 1;
        match save_store(store, path) {
            Ok(n) => return Ok(n),
            Err(e) if attempt < attempts => {
                tracing::warn!(target: "store", error = %e, attempt, "snapshot failed, retrying");
                tokio::time::sleep(pause).await;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Snapshot every `every` until shutdown. Failures are logged and the task keeps going.
pub fn spawn_periodic(
    store: Arc<DedupStore>,
    path: PathBuf,
    every: Duration,
    mut shutdown: Shutdown,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while !shutdown.sleep(every).await {
            match save_store(&store, &path) {
                Ok(n) => tracing::debug!(target: "store", records = n, "periodic snapshot written"),
                Err(e) => tracing::warn!(target: "store", error = %e, "periodic snapshot failed"),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn flat_document_goes_to_default_namespace() {
        let doc = br#"{"abc": "2024-01-01T00:00:00Z", "def": "2024-01-02T10:00:00+02:00"}"#;
        let snap = decode(doc, "telegram-42").unwrap();
        assert_eq!(snap.namespaces.len(), 1);
        let ns = &snap.namespaces["telegram-42"];
        assert_eq!(ns["abc"], Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        assert_eq!(ns["def"], Utc.with_ymd_and_hms(2024, 1, 2, 8, 0, 0).unwrap());
    }

    #[test]
    fn namespaced_document_keeps_namespaces() {
        let doc = br#"{
            "stdout": {"a": "2024-01-01T00:00:00Z"},
            "telegram-1": {"a": "2024-01-01T00:00:00Z", "b": "2024-01-01T00:00:01Z"}
        }"#;
        let snap = decode(doc, "unused").unwrap();
        assert_eq!(snap.namespaces["stdout"].len(), 1);
        assert_eq!(snap.namespaces["telegram-1"].len(), 2);
        assert!(!snap.namespaces.contains_key("unused"));
    }

    #[test]
    fn mixed_document_is_accepted() {
        let doc = br#"{"legacy": "2024-01-01T00:00:00Z", "stdout": {"a": "2024-01-01T00:00:00Z"}}"#;
        let snap = decode(doc, "stdout").unwrap();
        assert_eq!(snap.namespaces["stdout"].len(), 2);
    }

    #[test]
    fn malformed_timestamp_fails_fast() {
        let doc = br#"{"stdout": {"a": "yesterday"}}"#;
        let err = decode(doc, "x").unwrap_err();
        assert!(matches!(err, StoreError::BadTimestamp { ref key, .. } if key == "a"));
    }

    #[test]
    fn non_string_time_value_is_rejected() {
        let err = decode(br#"{"stdout": {"a": 12}}"#, "x").unwrap_err();
        assert!(matches!(err, StoreError::BadTimeValue { .. }));
        let err = decode(br#"{"stdout": 12}"#, "x").unwrap_err();
        assert!(matches!(err, StoreError::BadValue { .. }));
    }

    #[test]
    fn garbage_is_a_decode_error() {
        assert!(matches!(
            decode(b"not json", "x").unwrap_err(),
            StoreError::Decode(_)
        ));
    }

    #[test]
    fn save_then_load_reproduces_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("data.json");

        let store = DedupStore::new();
        store.insert("stdout", "a");
        store.insert("stdout", "b");
        store.insert("telegram-1", "a");

        assert_eq!(save_store(&store, &path).unwrap(), 3);
        assert!(!tmp_path(&path).exists());

        let restored = DedupStore::new();
        assert_eq!(restore_from_file(&restored, &path, "stdout").unwrap(), 3);
        assert_eq!(restored.snapshot(), store.snapshot());
    }

    #[test]
    fn missing_file_is_empty_not_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = DedupStore::new();
        let n = restore_from_file(&store, &dir.path().join("absent.json"), "x").unwrap();
        assert_eq!(n, 0);
        assert!(store.snapshot().is_empty());
    }

    #[test]
    fn encoded_timestamps_are_whole_second_rfc3339() {
        let mut snap = Snapshot::default();
        snap.namespaces.entry("ns".into()).or_default().insert(
            "k".into(),
            Utc.with_ymd_and_hms(2020, 4, 20, 0, 0, 1).unwrap(),
        );
        let text = String::from_utf8(encode(&snap).unwrap()).unwrap();
        assert!(text.contains("\"2020-04-20T00:00:01Z\""), "{text}");
    }

    #[tokio::test(start_paused = true)]
    async fn retry_gives_up_after_attempts() {
        let tmp = tempfile::tempdir().unwrap();
        // A directory where the file should be: rename can never succeed.
        let path = tmp.path().join("occupied");
        fs::create_dir_all(path.join("child")).unwrap();

        let store = DedupStore::new();
        store.insert("ns", "k");
        let res = save_store_with_retry(&store, &path, 3, Duration::from_secs(1)).await;
        assert!(matches!(res, Err(StoreError::Io { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn periodic_snapshot_writes_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("data.json");
        let store = Arc::new(DedupStore::new());
        store.insert("ns", "k");

        let (tx, rx) = crate::shutdown::channel();
        let h = spawn_periodic(store.clone(), path.clone(), Duration::from_secs(60), rx);
        tokio::time::sleep(Duration::from_secs(61)).await;
        tx.trigger();
        h.await.unwrap();

        let snap = load(&path, "ns").unwrap().unwrap();
        assert_eq!(snap.len(), 1);
    }
}
