//! Presentation-side collaborators of the framegraph.
//!
//! The framegraph never creates the canvas or the renderer. It reads layout
//! dimensions from a [`Canvas`] and pushes the derived size into a
//! [`Renderer`] on every resize.

use std::sync::Arc;

/// Source of layout dimensions for the render target.
pub trait Canvas {
    /// Layout width in logical pixels. Zero when detached.
    fn client_width(&self) -> f32;

    /// Layout height in logical pixels. Zero when detached.
    fn client_height(&self) -> f32;

    /// Ratio of physical to logical pixels.
    fn device_pixel_ratio(&self) -> f32 {
        1.0
    }
}

/// Renderer the framegraph resizes.
pub trait Renderer {
    /// Set the logical render size.
    fn set_size(&mut self, width: u32, height: u32, update_style: bool);

    /// Set the physical-to-logical pixel ratio.
    fn set_pixel_ratio(&mut self, ratio: f32);

    /// Release renderer-owned GPU resources. The default does nothing.
    fn dispose(&mut self) {}
}

/// Canvas with explicitly assigned dimensions.
///
/// Used for offscreen rendering and tests; [`resize`](Self::resize) followed
/// by [`Framegraph::refresh`](crate::Framegraph::refresh) models an external
/// layout change.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FixedCanvas {
    width: f32,
    height: f32,
    device_pixel_ratio: f32,
}

impl FixedCanvas {
    /// Create a canvas with a pixel ratio of 1.
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            width,
            height,
            device_pixel_ratio: 1.0,
        }
    }

    /// Set the device pixel ratio.
    pub fn with_device_pixel_ratio(mut self, ratio: f32) -> Self {
        self.device_pixel_ratio = ratio;
        self
    }

    /// Change the layout dimensions.
    pub fn resize(&mut self, width: f32, height: f32) {
        self.width = width;
        self.height = height;
    }
}

impl Canvas for FixedCanvas {
    fn client_width(&self) -> f32 {
        self.width
    }

    fn client_height(&self) -> f32 {
        self.height
    }

    fn device_pixel_ratio(&self) -> f32 {
        self.device_pixel_ratio
    }
}

impl<C: Canvas + ?Sized> Canvas for Arc<parking_lot::Mutex<C>> {
    fn client_width(&self) -> f32 {
        self.lock().client_width()
    }

    fn client_height(&self) -> f32 {
        self.lock().client_height()
    }

    fn device_pixel_ratio(&self) -> f32 {
        self.lock().device_pixel_ratio()
    }
}

/// [`Renderer`] that presents into a wgpu surface.
///
/// The surface is reconfigured with the physical extent
/// (`logical size * pixel ratio`) whenever either changes.
pub struct SurfaceRenderer {
    device: Arc<wgpu::Device>,
    surface: wgpu::Surface<'static>,
    config: wgpu::SurfaceConfiguration,
    logical_size: (u32, u32),
    pixel_ratio: f32,
}

impl SurfaceRenderer {
    /// Wrap a surface and the configuration template to present with.
    pub fn new(
        device: Arc<wgpu::Device>,
        surface: wgpu::Surface<'static>,
        config: wgpu::SurfaceConfiguration,
    ) -> Self {
        let logical_size = (config.width.max(1), config.height.max(1));
        Self {
            device,
            surface,
            config,
            logical_size,
            pixel_ratio: 1.0,
        }
    }

    /// Borrow the presented surface.
    pub fn surface(&self) -> &wgpu::Surface<'static> {
        &self.surface
    }

    /// Current surface configuration.
    pub fn config(&self) -> &wgpu::SurfaceConfiguration {
        &self.config
    }

    fn reconfigure(&mut self) {
        let (width, height) = surface_extent(self.logical_size, self.pixel_ratio);
        if width == self.config.width && height == self.config.height {
            return;
        }
        self.config.width = width;
        self.config.height = height;
        self.surface.configure(&self.device, &self.config);
        log::debug!("Surface reconfigured to {}x{}", width, height);
    }
}

/// Physical surface extent for a logical size, at least 1x1.
fn surface_extent(logical_size: (u32, u32), pixel_ratio: f32) -> (u32, u32) {
    let scale = |extent: u32| ((extent as f32 * pixel_ratio).floor() as u32).max(1);
    (scale(logical_size.0), scale(logical_size.1))
}

impl Renderer for SurfaceRenderer {
    fn set_size(&mut self, width: u32, height: u32, _update_style: bool) {
        self.logical_size = (width.max(1), height.max(1));
        self.reconfigure();
    }

    fn set_pixel_ratio(&mut self, ratio: f32) {
        self.pixel_ratio = ratio;
        self.reconfigure();
    }
}
