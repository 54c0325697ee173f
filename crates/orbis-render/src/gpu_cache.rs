//! GPU resource cache: a [`MemoryCache`] of mesh handles keyed by string.
//!
//! Eviction can happen on any thread holding the cache, but GPU resources may
//! only be deleted on the render thread. The eviction listener therefore only
//! queues the handle, and [`GpuResourceCache::release_evicted`] deletes the
//! queued handles once the render thread owns the graphics context again.

use std::sync::Arc;

use orbis_cache::{CacheError, MemoryCache, MemoryCacheListener};
use parking_lot::Mutex;

use crate::graphics::{GpuHandle, Graphics};

/// A GPU-resident resource plus the version of the data it was built from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct GpuResource {
    pub handle: GpuHandle,
    /// Caller-defined version of the source data. A mismatch means the
    /// resource is stale and must be rebuilt.
    pub version: u64,
    pub size: usize,
}

/// Queues evicted handles for deletion on the render thread.
struct ReleaseQueue {
    handles: Mutex<Vec<GpuHandle>>,
}

impl MemoryCacheListener<String, GpuResource> for ReleaseQueue {
    fn entry_removed(&self, key: &String, value: &GpuResource) {
        log::trace!("Queueing GPU release of {key} ({:?})", value.handle);
        self.handles.lock().push(value.handle);
    }
}

/// GPU meshes bounded by their byte size.
///
/// Entries evicted under memory pressure, replaced under the same key, or
/// dropped by [`GpuResourceCache::clear`] are not deleted immediately. Their
/// handles wait in a release queue until
/// [`GpuResourceCache::release_evicted`] runs with the graphics context.
pub struct GpuResourceCache {
    cache: MemoryCache<String, GpuResource>,
    releases: Arc<ReleaseQueue>,
}

impl GpuResourceCache {
    /// A cache holding up to `capacity` bytes that trims to `low_water` when
    /// it overflows. Fails when `low_water` is not below `capacity`.
    pub fn new(capacity: usize, low_water: usize) -> Result<Self, CacheError> {
        let cache = MemoryCache::new(capacity, low_water)?;
        let releases = Arc::new(ReleaseQueue {
            handles: Mutex::new(Vec::new()),
        });
        cache.add_listener(releases.clone());
        Ok(Self { cache, releases })
    }

    /// Returns the resource for `key` when it exists and matches `version`.
    pub fn get(&self, key: &str, version: u64) -> Option<GpuResource> {
        self.cache.get(key).filter(|r| r.version == version)
    }

    /// Stores a resource. A previous resource under the same key is queued
    /// for release.
    pub fn put(&self, key: impl Into<String>, resource: GpuResource) -> Result<(), CacheError> {
        self.cache.put(resource, key.into(), resource.size)
    }

    /// Stores a freshly uploaded resource and returns its handle. When the
    /// cache refuses it, the mesh is deleted before the error is returned.
    pub fn put_uploaded(
        &self,
        graphics: &mut dyn Graphics,
        key: impl Into<String>,
        resource: GpuResource,
    ) -> Result<GpuHandle, CacheError> {
        let key = key.into();
        if let Err(e) = self.put(key.as_str(), resource) {
            log::warn!("Dropping GPU resource {key} ({} bytes): {e}", resource.size);
            graphics.delete_mesh(resource.handle);
            return Err(e);
        }
        Ok(resource.handle)
    }

    /// Removes `key` and queues its handle for release.
    pub fn remove(&self, key: &str) -> Option<GpuResource> {
        self.cache.remove_entry_for_key(key)
    }

    /// Evicts everything. The handles are released on the next
    /// [`GpuResourceCache::release_evicted`].
    pub fn clear(&self) {
        self.cache.clear();
    }

    /// Deletes every queued handle. Returns how many were released.
    pub fn release_evicted(&self, graphics: &mut dyn Graphics) -> usize {
        let handles = std::mem::take(&mut *self.releases.handles.lock());
        for handle in &handles {
            graphics.delete_mesh(*handle);
        }
        if !handles.is_empty() {
            log::debug!("Released {} GPU resources", handles.len());
        }
        handles.len()
    }

    /// Handles queued for deletion.
    #[must_use]
    pub fn pending_releases(&self) -> usize {
        self.releases.handles.lock().len()
    }

    #[must_use]
    pub fn memory_cache(&self) -> &MemoryCache<String, GpuResource> {
        &self.cache
    }

    /// Bytes currently accounted to cached resources.
    #[must_use]
    pub fn used_capacity(&self) -> usize {
        self.cache.used_capacity()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.cache.capacity()
    }

    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.cache.entry_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graphics::Topology;
    use crate::software::SoftwareGraphics;

    fn mesh(g: &mut SoftwareGraphics) -> GpuHandle {
        let vertices = [[0.0; 3], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];
        g.create_mesh(&vertices, &[0, 1, 2], Topology::Triangles).unwrap()
    }

    #[test]
    fn test_version_mismatch_is_a_miss() {
        let mut g = SoftwareGraphics::new(4, 4).unwrap();
        let cache = GpuResourceCache::new(100, 50).unwrap();
        let handle = mesh(&mut g);
        cache
            .put("terrain/a", GpuResource { handle, version: 3, size: 10 })
            .unwrap();
        assert_eq!(cache.get("terrain/a", 3).map(|r| r.handle), Some(handle));
        assert!(cache.get("terrain/a", 4).is_none());
        assert!(cache.get("terrain/b", 3).is_none());
    }

    #[test]
    fn test_eviction_releases_meshes_on_drain() {
        let mut g = SoftwareGraphics::new(4, 4).unwrap();
        let cache = GpuResourceCache::new(100, 40).unwrap();
        for i in 0..4 {
            let handle = mesh(&mut g);
            cache
                .put(format!("m{i}"), GpuResource { handle, version: 0, size: 30 })
                .unwrap();
        }
        // The fourth put overflowed and evicted down to the low-water mark.
        assert_eq!(cache.entry_count(), 1);
        assert_eq!(cache.pending_releases(), 3);
        assert_eq!(g.mesh_count(), 4);

        assert_eq!(cache.release_evicted(&mut g), 3);
        assert_eq!(g.mesh_count(), 1);
        assert_eq!(cache.pending_releases(), 0);
    }

    #[test]
    fn test_replacement_releases_old_handle() {
        let mut g = SoftwareGraphics::new(4, 4).unwrap();
        let cache = GpuResourceCache::new(100, 50).unwrap();
        let old = mesh(&mut g);
        let new = mesh(&mut g);
        cache.put("k", GpuResource { handle: old, version: 1, size: 10 }).unwrap();
        cache.put("k", GpuResource { handle: new, version: 2, size: 10 }).unwrap();
        cache.release_evicted(&mut g);
        assert_eq!(g.mesh_count(), 1);
        assert_eq!(cache.get("k", 2).map(|r| r.handle), Some(new));
    }

    #[test]
    fn test_clear_queues_everything() {
        let mut g = SoftwareGraphics::new(4, 4).unwrap();
        let cache = GpuResourceCache::new(100, 50).unwrap();
        for i in 0..3 {
            let handle = mesh(&mut g);
            cache.put(format!("m{i}"), GpuResource { handle, version: 0, size: 5 }).unwrap();
        }
        cache.clear();
        assert_eq!(cache.release_evicted(&mut g), 3);
        assert_eq!(g.mesh_count(), 0);
        assert_eq!(cache.used_capacity(), 0);
    }
}
