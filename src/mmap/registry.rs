/*!
 * Mapping Registry
 * Process-wide table from mapped base pointer to the native release handles
 */

use ahash::RandomState;
use dashmap::DashMap;
use log::trace;
use once_cell::sync::Lazy;

/// Native handles required to release one mapping.
///
/// The base address doubles as the registry key, so only the companion
/// handles are stored here.
#[cfg(unix)]
#[derive(Debug, Clone, Copy)]
pub(crate) struct MappingEntry {
    /// Backing descriptor; -1 when the mapping owns no descriptor
    pub fd: std::os::unix::io::RawFd,
    /// Length of the mapped view
    pub len: usize,
}

#[cfg(windows)]
#[derive(Debug, Clone, Copy)]
pub(crate) struct MappingEntry {
    /// Backing file handle; `INVALID_HANDLE_VALUE` for pagefile-backed
    /// shared memory
    pub file: winapi::um::winnt::HANDLE,
    /// File-mapping object handle
    pub mapping: winapi::um::winnt::HANDLE,
}

// SAFETY: the stored HANDLEs are plain kernel object identifiers owned by
// this registry; they are only dereferenced by the OS.
#[cfg(windows)]
unsafe impl Send for MappingEntry {}
#[cfg(windows)]
unsafe impl Sync for MappingEntry {}

/// Process-wide registry keyed by mapped base address.
///
/// Concurrent map/unmap calls on different pointers are safe; racing map and
/// unmap on the same pointer is the caller's responsibility.
pub(crate) struct MappingRegistry {
    entries: DashMap<usize, MappingEntry, RandomState>,
}

static REGISTRY: Lazy<MappingRegistry> = Lazy::new(MappingRegistry::new);

impl MappingRegistry {
    fn new() -> Self {
        Self {
            entries: DashMap::with_hasher(RandomState::new()),
        }
    }

    /// The process-wide registry instance
    pub fn global() -> &'static MappingRegistry {
        &REGISTRY
    }

    pub fn insert(&self, base: *const u8, entry: MappingEntry) {
        trace!("registering mapping at {:p}", base);
        self.entries.insert(base as usize, entry);
    }

    /// Find-and-remove. Returns `None` for pointers never registered.
    pub fn remove(&self, base: *const u8) -> Option<MappingEntry> {
        self.entries.remove(&(base as usize)).map(|(_, entry)| entry)
    }

    pub fn contains(&self, base: *const u8) -> bool {
        self.entries.contains_key(&(base as usize))
    }
}
