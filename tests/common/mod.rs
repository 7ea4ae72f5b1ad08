//! Shared fixtures for the framegraph and compute integration tests.
//!
//! Everything here records what the core did to it so tests can assert on
//! call counts and ordering without a GPU.

#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use studio_framegraph::{
    ComputeError, ComputeQueue, ComputeTask, CpuQueue, Disposable, DispatchContext,
    FrameContext, FramegraphSize, PostChain, Renderer, TaskId,
};

/// Install a test logger once per process.
pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

// ============================================================================
// Renderer
// ============================================================================

/// Renderer remembering every size it was given and every pass that ran.
#[derive(Debug, Default)]
pub struct RecordingRenderer {
    pub sizes: Vec<(u32, u32)>,
    pub pixel_ratios: Vec<f32>,
    pub executed: Vec<String>,
    pub disposed: bool,
}

impl Renderer for RecordingRenderer {
    fn set_size(&mut self, width: u32, height: u32, update_style: bool) {
        assert!(!update_style, "framegraph must not touch canvas style");
        self.sizes.push((width, height));
    }

    fn set_pixel_ratio(&mut self, ratio: f32) {
        self.pixel_ratios.push(ratio);
    }

    fn dispose(&mut self) {
        self.disposed = true;
    }
}

// ============================================================================
// History resources
// ============================================================================

/// History resource with a unique serial number per construction.
#[derive(Debug)]
pub struct Counted {
    pub serial: u32,
    pub size: FramegraphSize,
    pub disposed: AtomicBool,
    disposals: Arc<AtomicU32>,
}

impl Counted {
    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }
}

impl Disposable for Counted {
    fn dispose(&self) {
        let already = self.disposed.swap(true, Ordering::SeqCst);
        assert!(!already, "resource {} disposed twice", self.serial);
        self.disposals.fetch_add(1, Ordering::SeqCst);
    }
}

/// Counts factory calls and disposals across every resource it builds.
#[derive(Debug, Clone, Default)]
pub struct CountingFactory {
    calls: Arc<AtomicU32>,
    disposals: Arc<AtomicU32>,
}

impl CountingFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// A factory closure sharing this counter.
    pub fn factory(&self) -> impl FnMut(FramegraphSize) -> Counted + Send + 'static {
        let calls = Arc::clone(&self.calls);
        let disposals = Arc::clone(&self.disposals);
        move |size| Counted {
            serial: calls.fetch_add(1, Ordering::SeqCst),
            size,
            disposed: AtomicBool::new(false),
            disposals: Arc::clone(&disposals),
        }
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn disposals(&self) -> u32 {
        self.disposals.load(Ordering::SeqCst)
    }
}

// ============================================================================
// Compute
// ============================================================================

/// One recorded submission.
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    pub label: String,
    pub tasks: Vec<TaskId>,
    pub frame_index: u64,
}

/// CPU queue recording every submission it executes.
#[derive(Debug, Default)]
pub struct RecordingQueue {
    inner: CpuQueue,
    pub submissions: Vec<Submission>,
}

impl RecordingQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn submit_count(&self) -> usize {
        self.submissions.len()
    }
}

impl ComputeQueue for RecordingQueue {
    fn submit(
        &mut self,
        label: &str,
        tasks: &mut [ComputeTask],
        ctx: &DispatchContext,
    ) -> Result<(), ComputeError> {
        self.inner.submit(label, tasks, ctx)?;
        self.submissions.push(Submission {
            label: label.to_string(),
            tasks: tasks.iter().map(|t| t.id().clone()).collect(),
            frame_index: ctx.frame_index,
        });
        Ok(())
    }
}

/// Post chain storing every evaluation.
#[derive(Debug, Clone, Default)]
pub struct RecordingPostChain {
    pub calls: Rc<RefCell<Vec<(f64, FrameContext)>>>,
}

impl RecordingPostChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<(f64, FrameContext)> {
        self.calls.borrow().clone()
    }
}

impl PostChain for RecordingPostChain {
    fn evaluate(&mut self, timestamp: f64, frame: &FrameContext) {
        self.calls.borrow_mut().push((timestamp, *frame));
    }
}

// ============================================================================
// GPU
// ============================================================================

/// Shader adding one to every element of `src` into `dst`.
pub const ADD_ONE_WGSL: &str = r#"
@group(0) @binding(0) var<storage, read> src: array<u32>;
@group(0) @binding(1) var<storage, read_write> dst: array<u32>;

@compute @workgroup_size(64)
fn main(@builtin(global_invocation_id) id: vec3<u32>) {
    let i = id.x;
    if (i < arrayLength(&dst)) {
        dst[i] = src[i] + 1u;
    }
}
"#;

/// Workgroup size of [`ADD_ONE_WGSL`].
pub const ADD_ONE_WORKGROUP_SIZE: u32 = 64;

/// Headless device for tests that need a real wgpu backend.
pub struct GpuContext {
    pub device: Arc<wgpu::Device>,
    pub queue: Arc<wgpu::Queue>,
}

impl GpuContext {
    /// Request a device on `backends`, or `None` when no adapter is found.
    pub fn new(backends: wgpu::Backends) -> Option<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends,
            ..Default::default()
        });
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::LowPower,
            force_fallback_adapter: false,
            compatible_surface: None,
        }))?;
        let downlevel = adapter.get_downlevel_capabilities();
        if !downlevel.flags.contains(wgpu::DownlevelFlags::COMPUTE_SHADERS) {
            return None;
        }
        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("test device"),
                required_limits: wgpu::Limits::downlevel_defaults(),
                ..Default::default()
            },
            None,
        ))
        .ok()?;
        Some(Self {
            device: Arc::new(device),
            queue: Arc::new(queue),
        })
    }

    /// Compute pipeline running [`ADD_ONE_WGSL`].
    pub fn add_one_pipeline(&self) -> Arc<wgpu::ComputePipeline> {
        let module = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("add_one"),
                source: wgpu::ShaderSource::Wgsl(ADD_ONE_WGSL.into()),
            });
        Arc::new(
            self.device
                .create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                    label: Some("add_one"),
                    layout: None,
                    module: &module,
                    entry_point: Some("main"),
                    compilation_options: Default::default(),
                    cache: None,
                }),
        )
    }

    /// Storage buffer initialised with `data`.
    pub fn storage_buffer(&self, label: &str, data: &[u32]) -> wgpu::Buffer {
        use wgpu::util::DeviceExt;

        self.device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents: bytemuck::cast_slice(data),
                usage: wgpu::BufferUsages::STORAGE
                    | wgpu::BufferUsages::COPY_SRC
                    | wgpu::BufferUsages::COPY_DST,
            })
    }

    /// Bind group reading `src` and writing `dst`.
    pub fn add_one_bind_group(
        &self,
        pipeline: &wgpu::ComputePipeline,
        src: &wgpu::Buffer,
        dst: &wgpu::Buffer,
    ) -> Arc<wgpu::BindGroup> {
        Arc::new(self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("add_one"),
            layout: &pipeline.get_bind_group_layout(0),
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: src.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: dst.as_entire_binding(),
                },
            ],
        }))
    }

    /// Copy a storage buffer back to the CPU.
    pub fn read_u32(&self, buffer: &wgpu::Buffer) -> Vec<u32> {
        let size = buffer.size();
        let readback = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("readback"),
            size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("readback"),
            });
        encoder.copy_buffer_to_buffer(buffer, 0, &readback, 0, size);
        self.queue.submit(std::iter::once(encoder.finish()));

        let slice = readback.slice(..);
        slice.map_async(wgpu::MapMode::Read, |result| {
            result.expect("readback mapping failed");
        });
        let _ = self.device.poll(wgpu::Maintain::Wait);
        let data = bytemuck::cast_slice::<u8, u32>(&slice.get_mapped_range()).to_vec();
        readback.unmap();
        data
    }
}
