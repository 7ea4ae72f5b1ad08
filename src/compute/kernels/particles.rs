//! Gravity-driven particle kernel.

use std::sync::Arc;

use glam::{Vec3, Vec4};
use parking_lot::Mutex;

use crate::compute::{ComputeBackend, ComputeTask, DispatchContext, PingPong};

/// Workgroup size of the particle shaders.
pub const PARTICLE_WORKGROUP_SIZE: u32 = 64;

/// GPU-layout particle: `position.w` is the particle's phase in `[0, 1)`,
/// `velocity.w` is padding.
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Particle {
    pub position: Vec4,
    pub velocity: Vec4,
}

/// Shared double-buffered particle storage.
pub type ParticleState = Arc<Mutex<PingPong<Vec<Particle>>>>;

/// Simulation parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParticleConfig {
    pub count: u32,
    /// Acceleration in units per second squared.
    pub gravity: Vec3,
    /// Half extent of the axis-aligned box particles bounce inside.
    pub bounds: Vec3,
    /// Fraction of speed kept on a bounce.
    pub restitution: f32,
    /// Radius of the initial spiral.
    pub spawn_radius: f32,
    /// Largest simulated step in seconds.
    pub max_step: f32,
}

impl Default for ParticleConfig {
    fn default() -> Self {
        Self {
            count: 1024,
            gravity: Vec3::new(0.0, -9.81, 0.0),
            bounds: Vec3::splat(1.0),
            restitution: 0.8,
            spawn_radius: 0.5,
            max_step: 1.0 / 30.0,
        }
    }
}

/// Particle system producing init and update tasks over shared state.
pub struct ParticleKernel {
    config: ParticleConfig,
    state: ParticleState,
}

impl ParticleKernel {
    pub fn new(config: ParticleConfig) -> Self {
        let count = config.count as usize;
        let state = PingPong::from_fn(|| vec![Particle::default(); count]);
        Self {
            config,
            state: Arc::new(Mutex::new(state)),
        }
    }

    pub fn config(&self) -> &ParticleConfig {
        &self.config
    }

    /// The kernel's ping-pong state.
    pub fn state(&self) -> &ParticleState {
        &self.state
    }

    fn shaped(&self, id: &str, backend: ComputeBackend) -> ComputeTask {
        let groups = ComputeTask::workgroups_for(self.config.count, PARTICLE_WORKGROUP_SIZE);
        ComputeTask::new(id, backend)
            .with_workgroup_size([PARTICLE_WORKGROUP_SIZE, 1, 1])
            .with_workgroup_count([groups, 1, 1])
    }

    /// Task seeding particles on a deterministic spiral.
    pub fn init_task(&self) -> ComputeTask {
        let state = Arc::clone(&self.state);
        let config = self.config;
        self.shaped(
            "particles.init",
            ComputeBackend::cpu(move |_| {
                let mut buffers = state.lock();
                seed(buffers.write_mut(), &config);
                buffers.swap();
            }),
        )
    }

    /// Per-frame integration task.
    pub fn update_task(&self) -> ComputeTask {
        let state = Arc::clone(&self.state);
        let config = self.config;
        self.update_task_on(ComputeBackend::cpu(move |ctx| {
            let mut buffers = state.lock();
            let (read, write) = buffers.read_write();
            integrate(read, write, &config, ctx);
            buffers.swap();
        }))
    }

    /// Update task with the particle dispatch shape and a custom backend.
    ///
    /// A GPU backend is expected to alternate its bind groups the way
    /// [`GpuKernel::ping_pong`](crate::compute::GpuKernel::ping_pong) does.
    pub fn update_task_on(&self, backend: ComputeBackend) -> ComputeTask {
        self.shaped("particles.update", backend)
    }

    /// Copy the current read slot into a GPU buffer.
    pub fn upload(&self, queue: &wgpu::Queue, buffer: &wgpu::Buffer) {
        let buffers = self.state.lock();
        queue.write_buffer(buffer, 0, bytemuck::cast_slice(buffers.read().as_slice()));
    }
}

fn seed(particles: &mut [Particle], config: &ParticleConfig) {
    let count = particles.len().max(1) as f32;
    for (i, particle) in particles.iter_mut().enumerate() {
        let phase = i as f32 / count;
        let angle = phase * std::f32::consts::TAU * 8.0;
        let radius = config.spawn_radius * phase.sqrt();
        let position = Vec3::new(radius * angle.cos(), 0.0, radius * angle.sin());
        let tangent = Vec3::new(-angle.sin(), 0.5, angle.cos());
        particle.position = position.extend(phase);
        particle.velocity = tangent.extend(0.0);
    }
}

fn integrate(
    read: &[Particle],
    write: &mut [Particle],
    config: &ParticleConfig,
    ctx: &DispatchContext,
) {
    let dt = ((ctx.delta_time / 1000.0) as f32).clamp(0.0, config.max_step);
    for (src, dst) in read.iter().zip(write.iter_mut()) {
        let mut velocity = src.velocity.truncate() + config.gravity * dt;
        let mut position = src.position.truncate() + velocity * dt;

        for axis in 0..3 {
            let limit = config.bounds[axis];
            if position[axis].abs() > limit {
                position[axis] = position[axis].clamp(-limit, limit);
                velocity[axis] = -velocity[axis] * config.restitution;
            }
        }

        dst.position = position.extend(src.position.w);
        dst.velocity = velocity.extend(0.0);
    }
}
