// Session state persistence. One JSON file carries what the last
// successful submission left behind (author email, flow identifiers,
// result links) so later invocations can pick up where it stopped.

use crate::error::Error;
use anyhow::{Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};

const DEFAULT_STATE_FILE: &str = ".fairflow.json";

/// The record persisted between invocations. Every field is optional: a
/// fresh install starts from an empty object, and each run fills in what
/// it learned. Fields written by other tools (or newer versions) are kept
/// in `extra` and survive every rewrite untouched.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct SessionState {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_instance: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flow_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flow_instance_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub globus_web_link: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// What one command wants changed. The email is written only when present;
/// a flow run replaces the whole run-related half of the record.
#[derive(Debug, Clone, Default)]
pub struct SessionStateUpdate {
    pub author_email: Option<String>,
    pub flow_run: Option<FlowRunRecord>,
}

/// Outcome of a successful submission. `service_instance` is assigned
/// verbatim: a run against the default deployment clears a stale saved
/// instance, so a later `status` does not query the wrong service.
#[derive(Debug, Clone)]
pub struct FlowRunRecord {
    pub service_instance: Option<String>,
    pub flow_id: String,
    pub flow_instance_id: String,
    pub http_link: String,
    pub globus_web_link: String,
}

impl SessionStateUpdate {
    fn apply_to(&self, state: &mut SessionState) {
        if let Some(email) = &self.author_email {
            state.author_email = Some(email.clone());
        }
        if let Some(run) = &self.flow_run {
            state.service_instance = run.service_instance.clone();
            state.flow_id = Some(run.flow_id.clone());
            state.flow_instance_id = Some(run.flow_instance_id.clone());
            state.http_link = Some(run.http_link.clone());
            state.globus_web_link = Some(run.globus_web_link.clone());
        }
    }
}

/// Owns the path to the session state file and the read/merge/write cycle
/// against it.
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    /// A store over the given file, or over `~/.fairflow.json` when no
    /// override is given.
    pub fn new(path: Option<PathBuf>) -> Self {
        let path = path.unwrap_or_else(default_state_path);
        StateStore { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the record. A missing file is a normal first run and yields the
    /// empty record; a file that exists but does not parse is fatal.
    pub fn load(&self) -> Result<SessionState> {
        if !self.path.exists() {
            debug!("no session state at {}; starting fresh", self.path.display());
            return Ok(SessionState::default());
        }
        let raw = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        let state = serde_json::from_str(&raw).map_err(|e| Error::InvalidJson {
            path: self.path.display().to_string(),
            detail: e.to_string(),
        })?;
        debug!("loaded session state from {}", self.path.display());
        Ok(state)
    }

    /// Merge the update into whatever is on disk right now and rewrite the
    /// file. The state is re-read here rather than passed in, so only the
    /// fields the update names change hands even if another invocation
    /// finished in between (the file itself is not locked; two writers
    /// racing on the same field is last-writer-wins).
    pub fn save(&self, update: &SessionStateUpdate) -> Result<()> {
        let mut state = self.load()?;
        update.apply_to(&mut state);

        if let Some(dir) = self.path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir)
                    .with_context(|| format!("Failed to create {}", dir.display()))?;
            }
        }

        // Write a sibling file and rename it into place, so a crash mid-write
        // never leaves a truncated record behind.
        let mut tmp = self.path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        let body = serde_json::to_string_pretty(&state).context("Serializing session state")?;
        fs::write(&tmp, body).with_context(|| format!("Failed to write {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to move {} into place", tmp.display()))?;
        debug!("session state saved to {}", self.path.display());
        Ok(())
    }
}

fn default_state_path() -> PathBuf {
    let dir = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    dir.join(DEFAULT_STATE_FILE)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_in(dir: &tempfile::TempDir) -> StateStore {
        StateStore::new(Some(dir.path().join("state.json")))
    }

    #[test]
    fn missing_file_loads_the_empty_record() {
        let dir = tempfile::tempdir().unwrap();
        let state = store_in(&dir).load().unwrap();
        assert_eq!(state, SessionState::default());
    }

    #[test]
    fn malformed_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        fs::write(store.path(), "{not json").unwrap();

        let err = store.load().unwrap_err();
        match err.downcast_ref::<Error>() {
            Some(Error::InvalidJson { path, .. }) => {
                assert!(path.ends_with("state.json"));
            }
            other => panic!("expected InvalidJson, got {:?}", other),
        }
    }

    #[test]
    fn save_merges_and_keeps_unknown_fields() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        fs::write(
            store.path(),
            r#"{"author_email": "old@example.org", "pet": "tortoise"}"#,
        )
        .unwrap();

        let update = SessionStateUpdate {
            author_email: Some("new@example.org".into()),
            flow_run: None,
        };
        store.save(&update).unwrap();

        let state = store.load().unwrap();
        assert_eq!(state.author_email.as_deref(), Some("new@example.org"));
        assert_eq!(state.extra.get("pet"), Some(&Value::from("tortoise")));
        assert_eq!(state.flow_id, None);

        // No leftover temp file either.
        assert!(!dir.path().join("state.json.tmp").exists());
    }

    #[test]
    fn flow_run_replaces_the_run_half_of_the_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        fs::write(
            store.path(),
            r#"{"service_instance": "staging", "flow_id": "F1", "author_email": "keep@me.org"}"#,
        )
        .unwrap();

        let update = SessionStateUpdate {
            author_email: None,
            flow_run: Some(FlowRunRecord {
                service_instance: None,
                flow_id: "F2".into(),
                flow_instance_id: "I2".into(),
                http_link: "https://data.example.org/public/bag.zip".into(),
                globus_web_link: "https://app.globus.org/file-manager?x=1".into(),
            }),
        };
        store.save(&update).unwrap();

        let state = store.load().unwrap();
        // The default-instance run cleared the stale staging marker.
        assert_eq!(state.service_instance, None);
        assert_eq!(state.flow_id.as_deref(), Some("F2"));
        assert_eq!(state.flow_instance_id.as_deref(), Some("I2"));
        assert_eq!(state.author_email.as_deref(), Some("keep@me.org"));

        let raw = fs::read_to_string(store.path()).unwrap();
        assert!(!raw.contains("service_instance"), "cleared fields are absent, not null");
    }

    #[test]
    fn save_creates_parent_directories_for_custom_paths() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(Some(dir.path().join("deep/nested/state.json")));
        store.save(&SessionStateUpdate::default()).unwrap();
        assert!(store.path().exists());
    }
}
