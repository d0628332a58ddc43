//! Markers for long-running work (e.g. predictor calls) that supervisors can inspect.
//! A mark lives in a process-wide registry and optionally as an empty file
//! `<dir>/<kind>/<id>`; dropping the guard removes both, on every exit path.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use tracing::{debug, warn};

static MARKS: Lazy<RwLock<HashMap<String, HashSet<String>>>> = Lazy::new(|| RwLock::new(HashMap::new()));

#[derive(Debug)]
pub struct ProcessMark {
    kind: String,
    id: String,
    file: Option<PathBuf>,
}

impl ProcessMark {
    /// Raise a mark of `kind`; `dir` enables the on-disk copy.
    pub fn create(kind: &str, dir: Option<&Path>) -> Self {
        let id = format!("{}-{}", std::process::id(), uuid::Uuid::new_v4());
        MARKS.write().entry(kind.to_string()).or_default().insert(id.clone());
        let file = dir.and_then(|d| {
            let p = d.join(kind).join(&id);
            let res = p.parent().map(std::fs::create_dir_all).transpose().and_then(|_| std::fs::write(&p, b""));
            match res {
                Ok(()) => Some(p),
                Err(e) => {
                    warn!(target: "conflux::exec", "process mark file {} not written: {}", p.display(), e);
                    None
                }
            }
        });
        debug!(target: "conflux::exec", "process mark raised: {}/{}", kind, id);
        Self { kind: kind.to_string(), id, file }
    }

    pub fn id(&self) -> &str { &self.id }

    pub fn kind(&self) -> &str { &self.kind }

    pub fn file(&self) -> Option<&Path> { self.file.as_deref() }
}

impl Drop for ProcessMark {
    fn drop(&mut self) {
        {
            let mut marks = MARKS.write();
            if let Some(set) = marks.get_mut(&self.kind) {
                set.remove(&self.id);
                if set.is_empty() { marks.remove(&self.kind); }
            }
        }
        if let Some(p) = &self.file {
            if let Err(e) = std::fs::remove_file(p) {
                debug!(target: "conflux::exec", "process mark file {} not removed: {}", p.display(), e);
            }
        }
        debug!(target: "conflux::exec", "process mark cleared: {}/{}", self.kind, self.id);
    }
}

/// Ids of marks currently raised for `kind`.
pub fn active_marks(kind: &str) -> Vec<String> {
    MARKS.read().get(kind).map(|s| s.iter().cloned().collect()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_clears_registry_and_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path;
        let id;
        {
            let mark = ProcessMark::create("predict_test", Some(tmp.path()));
            id = mark.id().to_string();
            path = mark.file().map(|p| p.to_path_buf()).unwrap();
            assert!(path.exists());
            assert!(active_marks("predict_test").contains(&id));
        }
        assert!(!path.exists());
        assert!(!active_marks("predict_test").contains(&id));
    }

    #[test]
    fn cleared_on_unwind() {
        let result = std::panic::catch_unwind(|| {
            let _mark = ProcessMark::create("predict_unwind", None);
            panic!("boom");
        });
        assert!(result.is_err());
        assert!(active_marks("predict_unwind").is_empty());
    }
}
