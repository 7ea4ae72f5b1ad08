//! History resource cache.
//!
//! Temporal effects (TAA history, previous-frame color for SSR) need one GPU
//! resource per semantic key that survives across frames and follows the
//! render resolution. The cache owns those resources exclusively:
//!
//! - a resource is created lazily by its factory on first request,
//! - it is disposed and recreated when requested at a different size,
//! - every resource is rebuilt when the framegraph resizes,
//! - [`invalidate`](HistoryCache::invalidate) disposes everything.
//!
//! Passes reach the cache through
//! [`PassContext::get_history_texture`](crate::PassContext::get_history_texture)
//! and long-lived owners through a [`HistoryHandle`]. Both hand out shared
//! references and release the cache lock before returning, so any number of
//! resources can be held at once. A reference kept across a rebuild points
//! at the disposed resource.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::size::FramegraphSize;

/// Capability to release the GPU memory behind a resource.
///
/// Every resource type stored in a [`HistoryCache`] implements this; the
/// cache calls it exactly once before dropping a resource it replaces.
pub trait Disposable {
    /// Release the underlying resource.
    fn dispose(&self);
}

impl Disposable for wgpu::Texture {
    fn dispose(&self) {
        self.destroy();
    }
}

impl Disposable for wgpu::Buffer {
    fn dispose(&self) {
        self.destroy();
    }
}

/// Factory building a history resource for a given size.
pub type HistoryFactory<T> = Box<dyn FnMut(FramegraphSize) -> T + Send>;

/// History cache shared between the framegraph, its passes and handles.
pub type SharedHistory<T> = Arc<Mutex<HistoryCache<T>>>;

/// One cached resource together with the size and factory that built it.
pub struct HistoryEntry<T> {
    resource: Arc<T>,
    size: FramegraphSize,
    factory: HistoryFactory<T>,
    stale: bool,
}

impl<T> HistoryEntry<T> {
    /// The cached resource.
    pub fn resource(&self) -> &Arc<T> {
        &self.resource
    }

    /// Size the resource was built for.
    pub fn size(&self) -> FramegraphSize {
        self.size
    }
}

/// Keyed cache of size-dependent resources.
pub struct HistoryCache<T: Disposable> {
    entries: HashMap<String, HistoryEntry<T>>,
    size: FramegraphSize,
}

impl<T: Disposable> HistoryCache<T> {
    /// Create an empty cache for the given render size.
    pub fn new(size: FramegraphSize) -> Self {
        Self {
            entries: HashMap::new(),
            size,
        }
    }

    /// Current render size resources are built for.
    pub fn size(&self) -> FramegraphSize {
        self.size
    }

    /// Number of cached resources.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the cache holds no resources.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Check if a resource is cached under `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Look up an entry without creating it.
    pub fn entry(&self, key: &str) -> Option<&HistoryEntry<T>> {
        self.entries.get(key)
    }

    /// Get the resource for `key`, building it with `factory` when absent,
    /// stale, or built for a different size.
    ///
    /// When a resource is (re)built, `factory` replaces the stored factory.
    /// A cached resource of the right size is returned unchanged and
    /// `factory` is dropped unused.
    pub fn get<F>(&mut self, key: &str, factory: F) -> Arc<T>
    where
        F: FnMut(FramegraphSize) -> T + Send + 'static,
    {
        let size = self.size;
        let entry = match self.entries.entry(key.to_string()) {
            Entry::Occupied(occupied) => {
                let entry = occupied.into_mut();
                if entry.stale || entry.size != size {
                    log::debug!(
                        "History '{}' rebuilt: {}x{} -> {}x{}",
                        key,
                        entry.size.width,
                        entry.size.height,
                        size.width,
                        size.height
                    );
                    entry.resource.dispose();
                    let mut factory: HistoryFactory<T> = Box::new(factory);
                    entry.resource = Arc::new(factory(size));
                    entry.factory = factory;
                    entry.size = size;
                    entry.stale = false;
                }
                entry
            }
            Entry::Vacant(vacant) => {
                log::debug!("History '{}' created at {}x{}", key, size.width, size.height);
                let mut factory: HistoryFactory<T> = Box::new(factory);
                let resource = Arc::new(factory(size));
                vacant.insert(HistoryEntry {
                    resource,
                    size,
                    factory,
                    stale: false,
                })
            }
        };
        Arc::clone(&entry.resource)
    }

    /// Switch to a new render size and rebuild every cached resource.
    ///
    /// All resources are rebuilt, including ones that happen to match
    /// `size`, because the renderer's backing resolution changed.
    pub fn resize(&mut self, size: FramegraphSize) {
        self.size = size;
        for (key, entry) in &mut self.entries {
            entry.resource.dispose();
            entry.resource = Arc::new((entry.factory)(size));
            entry.size = size;
            entry.stale = false;
            log::trace!("History '{}' rebuilt for resize", key);
        }
    }

    /// Mark an entry so the next [`get`](Self::get) rebuilds it.
    pub fn mark_stale(&mut self, key: &str) {
        if let Some(entry) = self.entries.get_mut(key) {
            entry.stale = true;
        }
    }

    /// Dispose and forget the resource stored under `key`.
    ///
    /// Returns `true` if a resource was removed.
    pub fn remove(&mut self, key: &str) -> bool {
        match self.entries.remove(key) {
            Some(entry) => {
                entry.resource.dispose();
                true
            }
            None => false,
        }
    }

    /// Dispose and forget every cached resource.
    pub fn invalidate(&mut self) {
        if !self.entries.is_empty() {
            log::debug!("Invalidating {} history resources", self.entries.len());
        }
        for (_, entry) in self.entries.drain() {
            entry.resource.dispose();
        }
    }
}

impl<T: Disposable> Drop for HistoryCache<T> {
    fn drop(&mut self) {
        self.invalidate();
    }
}

/// Long-lived access to one history resource.
///
/// The handle owns the factory; [`get`](Self::get) rebuilds through it after
/// a resize, an invalidation, or a factory update.
///
/// # Example
///
/// ```ignore
/// let history = framegraph.history_handle("taa.history", texture_factory(device, desc));
/// let texture = history.get();
/// ```
pub struct HistoryHandle<T: Disposable> {
    key: String,
    factory: Arc<Mutex<HistoryFactory<T>>>,
    cache: SharedHistory<T>,
}

impl<T: Disposable + 'static> HistoryHandle<T> {
    pub(crate) fn new<F>(key: impl Into<String>, factory: F, cache: SharedHistory<T>) -> Self
    where
        F: FnMut(FramegraphSize) -> T + Send + 'static,
    {
        Self {
            key: key.into(),
            factory: Arc::new(Mutex::new(Box::new(factory))),
            cache,
        }
    }

    /// Cache key of this handle.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Get the resource, building it if needed.
    pub fn get(&self) -> Arc<T> {
        let factory = Arc::clone(&self.factory);
        self.cache.lock().get(&self.key, move |size| {
            let mut factory = factory.lock();
            (*factory)(size)
        })
    }

    /// Replace the factory. The next [`get`](Self::get) rebuilds with it.
    pub fn update_factory<F>(&self, factory: F)
    where
        F: FnMut(FramegraphSize) -> T + Send + 'static,
    {
        *self.factory.lock() = Box::new(factory);
        self.cache.lock().mark_stale(&self.key);
    }

    /// Dispose the resource behind this handle.
    pub fn dispose(self) {
        self.cache.lock().remove(&self.key);
    }
}

/// Parameters of history textures created by [`texture_factory`].
#[derive(Debug, Clone, Copy)]
pub struct HistoryTextureDesc {
    /// Debug label.
    pub label: &'static str,
    /// Texel format.
    pub format: wgpu::TextureFormat,
    /// Allowed usages.
    pub usage: wgpu::TextureUsages,
}

impl HistoryTextureDesc {
    /// Sampled and render-attachment texture of the given format.
    pub fn color(label: &'static str, format: wgpu::TextureFormat) -> Self {
        Self {
            label,
            format,
            usage: wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::COPY_DST,
        }
    }
}

/// Factory producing 2D textures at the physical extent of the render size.
pub fn texture_factory(
    device: Arc<wgpu::Device>,
    desc: HistoryTextureDesc,
) -> impl FnMut(FramegraphSize) -> wgpu::Texture + Send + 'static {
    move |size: FramegraphSize| {
        let (width, height) = size.physical_extent();
        device.create_texture(&wgpu::TextureDescriptor {
            label: Some(desc.label),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: desc.format,
            usage: desc.usage,
            view_formats: &[],
        })
    }
}
