//! Density diffusion kernel on a 2D grid.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::compute::{ComputeBackend, ComputeTask, DispatchContext, PingPong};

/// Workgroup edge of the fluid shaders (8x8 threads).
pub const FLUID_WORKGROUP_EDGE: u32 = 8;

/// Explicit diffusion is unstable above this per-step coefficient.
const MAX_DIFFUSION_STEP: f32 = 0.25;

/// Shared double-buffered density grid, row-major.
pub type FluidState = Arc<Mutex<PingPong<Vec<f32>>>>;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FluidConfig {
    pub width: u32,
    pub height: u32,
    /// Diffusion rate per second.
    pub diffusion: f32,
    /// Fraction of density lost per second.
    pub decay: f32,
    /// Largest simulated step in seconds.
    pub max_step: f32,
}

impl Default for FluidConfig {
    fn default() -> Self {
        Self {
            width: 128,
            height: 128,
            diffusion: 4.0,
            decay: 0.1,
            max_step: 1.0 / 30.0,
        }
    }
}

/// Density field producing init and update tasks over shared state.
pub struct FluidKernel {
    config: FluidConfig,
    state: FluidState,
}

impl FluidKernel {
    pub fn new(config: FluidConfig) -> Self {
        let cells = cell_count(&config);
        Self {
            config,
            state: Arc::new(Mutex::new(PingPong::from_fn(|| vec![0.0; cells]))),
        }
    }

    pub fn config(&self) -> &FluidConfig {
        &self.config
    }

    /// The kernel's ping-pong state.
    pub fn state(&self) -> &FluidState {
        &self.state
    }

    fn shaped(&self, id: &str, backend: ComputeBackend) -> ComputeTask {
        let x = ComputeTask::workgroups_for(self.config.width, FLUID_WORKGROUP_EDGE);
        let y = ComputeTask::workgroups_for(self.config.height, FLUID_WORKGROUP_EDGE);
        ComputeTask::new(id, backend)
            .with_workgroup_size([FLUID_WORKGROUP_EDGE, FLUID_WORKGROUP_EDGE, 1])
            .with_workgroup_count([x, y, 1])
    }

    /// Task seeding a gaussian blob in the middle of the grid.
    pub fn init_task(&self) -> ComputeTask {
        let state = Arc::clone(&self.state);
        let config = self.config;
        self.shaped(
            "fluid.init",
            ComputeBackend::cpu(move |_| {
                let mut grid = state.lock();
                seed(grid.write_mut(), &config);
                grid.swap();
            }),
        )
    }

    /// Per-frame diffusion and decay task.
    pub fn update_task(&self) -> ComputeTask {
        let state = Arc::clone(&self.state);
        let config = self.config;
        self.update_task_on(ComputeBackend::cpu(move |ctx| {
            let mut grid = state.lock();
            let (read, write) = grid.read_write();
            diffuse(read, write, &config, ctx);
            grid.swap();
        }))
    }

    /// Update task with the fluid dispatch shape and a custom backend.
    pub fn update_task_on(&self, backend: ComputeBackend) -> ComputeTask {
        self.shaped("fluid.update", backend)
    }

    /// Add density at a cell of the read slot. Out-of-grid cells are ignored.
    pub fn inject(&self, x: u32, y: u32, amount: f32) {
        if x >= self.config.width || y >= self.config.height {
            log::trace!("Fluid injection at ({}, {}) outside grid", x, y);
            return;
        }
        let index = y as usize * self.config.width as usize + x as usize;
        self.state.lock().read_mut()[index] += amount;
    }

    /// Sum of the density in the read slot.
    pub fn total_density(&self) -> f32 {
        self.state.lock().read().iter().sum()
    }
}

fn cell_count(config: &FluidConfig) -> usize {
    config.width as usize * config.height as usize
}

fn seed(grid: &mut [f32], config: &FluidConfig) {
    let (w, h) = (config.width as usize, config.height as usize);
    let center = (w as f32 * 0.5, h as f32 * 0.5);
    let sigma = (w.min(h) as f32 * 0.1).max(1.0);
    for y in 0..h {
        for x in 0..w {
            let dx = x as f32 + 0.5 - center.0;
            let dy = y as f32 + 0.5 - center.1;
            grid[y * w + x] = (-(dx * dx + dy * dy) / (2.0 * sigma * sigma)).exp();
        }
    }
}

fn diffuse(read: &[f32], write: &mut [f32], config: &FluidConfig, ctx: &DispatchContext) {
    let dt = ((ctx.delta_time / 1000.0) as f32).clamp(0.0, config.max_step);
    let k = (config.diffusion * dt).min(MAX_DIFFUSION_STEP);
    let keep = (1.0 - config.decay * dt).clamp(0.0, 1.0);
    let (w, h) = (config.width as usize, config.height as usize);

    for y in 0..h {
        for x in 0..w {
            let at = |cx: usize, cy: usize| read[cy * w + cx];
            let center = at(x, y);
            // Clamp-to-edge neighbours.
            let left = at(x.saturating_sub(1), y);
            let right = at((x + 1).min(w - 1), y);
            let up = at(x, y.saturating_sub(1));
            let down = at(x, (y + 1).min(h - 1));
            let laplacian = left + right + up + down - 4.0 * center;
            write[y * w + x] = (center + k * laplacian) * keep;
        }
    }
}
