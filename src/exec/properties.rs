// src/exec/properties.rs

//! Process-wide system properties for same-runtime calls.
//!
//! A [`PropertyOverlay`] installs a call's properties for the lifetime of the
//! guard and restores the previous values when dropped, including during a
//! panic unwind. It also holds a process-wide lock, so same-runtime calls
//! inside one process run one at a time. An entry point must not start
//! another same-runtime call itself; that would wait on its own lock.

use std::collections::BTreeMap;
use std::sync::{LazyLock, Mutex, MutexGuard, RwLock};

use tracing::trace;

static PROPERTIES: LazyLock<RwLock<BTreeMap<String, String>>> =
    LazyLock::new(|| RwLock::new(BTreeMap::new()));

static SERIAL: Mutex<()> = Mutex::new(());

/// Current value of a system property.
pub fn property(name: &str) -> Option<String> {
    let map = PROPERTIES.read().unwrap_or_else(|e| e.into_inner());
    map.get(name).cloned()
}

/// Snapshot of all system properties.
pub fn properties() -> BTreeMap<String, String> {
    PROPERTIES.read().unwrap_or_else(|e| e.into_inner()).clone()
}

/// Scoped installation of system properties.
#[derive(Debug)]
pub struct PropertyOverlay {
    saved: Vec<(String, Option<String>)>,
    // Dropped after `Drop::drop` has restored the map.
    _serial: MutexGuard<'static, ()>,
}

impl PropertyOverlay {
    /// Blocks while another same-runtime call holds the overlay.
    pub fn install(props: &BTreeMap<String, String>) -> Self {
        let serial = SERIAL.lock().unwrap_or_else(|e| e.into_inner());

        let mut map = PROPERTIES.write().unwrap_or_else(|e| e.into_inner());
        let saved = props
            .iter()
            .map(|(k, v)| {
                trace!(name = %k, value = %v, "installing system property");
                (k.clone(), map.insert(k.clone(), v.clone()))
            })
            .collect();

        Self {
            saved,
            _serial: serial,
        }
    }
}

impl Drop for PropertyOverlay {
    fn drop(&mut self) {
        let mut map = PROPERTIES.write().unwrap_or_else(|e| e.into_inner());
        for (name, previous) in self.saved.drain(..).rev() {
            match previous {
                Some(value) => {
                    map.insert(name, value);
                }
                None => {
                    map.remove(&name);
                }
            }
        }
    }
}
