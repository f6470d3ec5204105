//! RON file loading and change watching.
//!
//! Settings live in RON files on disk. `load_ron_files` reads and parses
//! every `.ron` file in a directory; `setup_ron_watcher` returns a resource
//! whose shared flag flips when anything under the directory is modified, so
//! a system can re-load without polling the filesystem itself.

use bevy::prelude::Resource;
use notify::{Config, RecommendedWatcher, RecursiveMode, Watcher};
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Directory watcher resource for RON hot-reload.
#[derive(Resource)]
pub struct RonWatcher {
    /// Set to `true` by the watcher callback when a watched file changed.
    pub changed: Arc<Mutex<bool>>,
    // Keeps the OS watcher alive; `None` for the stub.
    _watcher: Option<RecommendedWatcher>,
}

impl RonWatcher {
    /// A watcher with no OS backing. Fallback for platforms or sandboxes
    /// where `notify` cannot register a watch.
    #[must_use]
    pub fn stub() -> Self {
        RonWatcher {
            changed: Arc::new(Mutex::new(false)),
            _watcher: None,
        }
    }

    /// Consume and reset the change flag.
    pub fn take_changed(&self) -> bool {
        match self.changed.lock() {
            Ok(mut flag) => std::mem::take(&mut *flag),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }
}

/// Parse every `.ron` file in `path` into `T`. Files that fail to parse are
/// skipped with a message on stderr.
#[must_use]
pub fn load_ron_files<T: DeserializeOwned>(path: &str) -> Vec<T> {
    let mut items = Vec::new();
    let Ok(entries) = std::fs::read_dir(path) else {
        return items;
    };

    for entry in entries.flatten() {
        let file = entry.path();
        if file.extension().is_none_or(|ext| ext != "ron") {
            continue;
        }
        let Ok(content) = std::fs::read_to_string(&file) else {
            continue;
        };
        match ron::from_str::<T>(&content) {
            Ok(item) => items.push(item),
            Err(e) => eprintln!("Failed to parse {}: {e:?}", file.display()),
        }
    }

    items
}

/// Watch a directory for modifications.
///
/// # Errors
/// Returns the underlying `notify` error when the watcher cannot be created
/// or registered; callers typically fall back to [`RonWatcher::stub`].
pub fn setup_ron_watcher(path: &str) -> Result<RonWatcher, notify::Error> {
    let changed = Arc::new(Mutex::new(false));
    let flag = changed.clone();
    // Canonicalize so event paths can be compared against the watched
    // directory; events for unrelated paths must not trigger a reload.
    let watched_path: PathBuf =
        std::fs::canonicalize(path).unwrap_or_else(|_| PathBuf::from(path));

    let mut watcher: RecommendedWatcher = Watcher::new(
        move |res: Result<notify::Event, notify::Error>| match res {
            Ok(event) => {
                if matches!(
                    event.kind,
                    notify::EventKind::Modify(_) | notify::EventKind::Create(_)
                ) {
                    let relevant = event.paths.iter().any(|p| {
                        let p_canon = std::fs::canonicalize(p).unwrap_or_else(|_| p.clone());
                        p_canon.starts_with(&watched_path)
                    });
                    if relevant
                        && let Ok(mut f) = flag.lock()
                    {
                        *f = true;
                    }
                }
            }
            Err(e) => eprintln!("Watch error: {e:?}"),
        },
        Config::default(),
    )?;
    watcher.watch(Path::new(path), RecursiveMode::NonRecursive)?;

    Ok(RonWatcher {
        changed,
        _watcher: Some(watcher),
    })
}
