use std::sync::Arc;
use std::time::{Duration, Instant};

use glam::Vec3;
use rand::SeedableRng;
use rand::rngs::StdRng;
use winit::event::MouseButton;
use winit::window::Window;

use crate::config::FlockingConfig;
use crate::error::FlockingError;
use crate::gpu::GpuContext;
use crate::rendering::render_pass::{CLEAR_COLOR, create_background_render_pass};
use crate::rendering::{Camera, DisplayPass, FlockingPipeline, GridOverlay, StepOutcome};
use crate::simulation::{ParameterKnob, ParticleGrid, SimulationParameters};

// Center of the flock in world space: model lift 2 * scale 5
const FLOCK_FOCUS: Vec3 = Vec3::new(0.0, 10.0, 0.0);
const FPS_INTERVAL: Duration = Duration::from_millis(500);

/// Counts frames and reports a rate at most once per `FPS_INTERVAL`.
#[derive(Debug)]
pub struct FrameTimer {
    window_start: Instant,
    frames: u32,
}

impl FrameTimer {
    pub fn new(now: Instant) -> Self {
        Self {
            window_start: now,
            frames: 0,
        }
    }

    /// Records a frame finished at `now`, returning frames per second when a
    /// measuring window has elapsed.
    pub fn tick_at(&mut self, now: Instant) -> Option<f64> {
        self.frames += 1;
        let elapsed = now.saturating_duration_since(self.window_start);
        if elapsed < FPS_INTERVAL {
            return None;
        }
        let fps = self.frames as f64 / elapsed.as_secs_f64();
        self.window_start = now;
        self.frames = 0;
        Some(fps)
    }
}

pub fn fps_title(fps: f64) -> String {
    format!("Flocking - FPS: {fps:.2}")
}

/// Owns every piece of a running simulation: window, device, pipelines,
/// particle state, camera and interaction flags.
pub struct SimulationContext {
    window: Arc<Window>,
    gpu: GpuContext,
    surface: wgpu::Surface<'static>,
    surface_config: wgpu::SurfaceConfiguration,
    config: FlockingConfig,
    params: SimulationParameters,
    pipeline: FlockingPipeline,
    display: DisplayPass,
    grid_overlay: GridOverlay,
    camera: Camera,
    rng: StdRng,
    paused: bool,
    show_grid: bool,
    frame_timer: FrameTimer,
}

impl SimulationContext {
    pub async fn new(window: Arc<Window>, config: FlockingConfig) -> Result<Self, FlockingError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
        let surface = instance.create_surface(window.clone())?;
        let gpu = GpuContext::for_surface(instance, &surface).await?;

        let size = window.inner_size();
        let caps = surface.get_capabilities(&gpu.adapter);
        let surface_format = caps
            .formats
            .iter()
            .copied()
            .find(|format| format.is_srgb())
            .or_else(|| caps.formats.first().copied())
            .ok_or_else(|| FlockingError::Unsupported {
                adapter: gpu.adapter.get_info().name,
                reason: "surface reports no texture formats".into(),
            })?;
        let surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            view_formats: vec![],
            alpha_mode: caps.alpha_modes.first().copied().unwrap_or(wgpu::CompositeAlphaMode::Auto),
            width: size.width.max(1),
            height: size.height.max(1),
            desired_maximum_frame_latency: 2,
            present_mode: wgpu::PresentMode::AutoVsync,
        };
        surface.configure(&gpu.device, &surface_config);

        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let mut grid = ParticleGrid::initialize(config.tex_size)?;
        grid.randomize(&mut rng);

        let pipeline = FlockingPipeline::new(&gpu, &grid)?;
        let display = DisplayPass::new(&gpu, surface_format, config.blend)?;
        let grid_overlay = GridOverlay::new(&gpu, surface_format)?;
        let camera = Camera::for_flock(surface_config.width as f32 / surface_config.height as f32);

        log::info!(
            "flocking {} particles, press Space to pause, R to reset",
            pipeline.num_particles()
        );

        Ok(Self {
            window,
            gpu,
            surface,
            surface_config,
            params: config.simulation_parameters(),
            show_grid: config.show_grid,
            config,
            pipeline,
            display,
            grid_overlay,
            camera,
            rng,
            paused: false,
            frame_timer: FrameTimer::new(Instant::now()),
        })
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    pub fn params(&self) -> &SimulationParameters {
        &self.params
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Simulates, copies and draws one frame in a single submission.
    pub fn render(&mut self) {
        let surface_texture = match self.surface.get_current_texture() {
            Ok(texture) => texture,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                log::warn!("surface lost or outdated, reconfiguring");
                self.surface.configure(&self.gpu.device, &self.surface_config);
                return;
            }
            Err(wgpu::SurfaceError::Timeout) => {
                log::debug!("timed out waiting for the next frame");
                return;
            }
            Err(err) => {
                log::error!("cannot acquire next frame: {err}");
                return;
            }
        };
        let texture_view = surface_texture
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let viewport = [
            self.surface_config.width as f32,
            self.surface_config.height as f32,
        ];
        self.display
            .update(&self.gpu.queue, self.camera.view_projection(), viewport, self.params.point_size);
        if self.show_grid {
            self.grid_overlay
                .update(&self.gpu.queue, self.camera.world_view_projection());
        }

        let mut encoder = self
            .gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Flocking Frame Encoder"),
            });

        // compute, then transfer, then display; one submit keeps that order
        let outcome = self
            .pipeline
            .encode_step(&self.gpu, &mut encoder, &self.params, !self.paused);
        if let StepOutcome::Skipped(reason) = &outcome {
            log::trace!("frame not advanced: {reason}");
        }

        {
            let mut render_pass = create_background_render_pass(&mut encoder, &texture_view, CLEAR_COLOR);
            if self.show_grid {
                self.grid_overlay.draw(&mut render_pass);
            }
            self.display
                .draw(&mut render_pass, self.pipeline.render_buffers());
        }

        self.gpu.queue.submit([encoder.finish()]);
        self.window.pre_present_notify();
        surface_texture.present();

        if let Some(fps) = self.frame_timer.tick_at(Instant::now()) {
            self.window.set_title(&fps_title(fps));
        }
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.surface_config.width = width;
        self.surface_config.height = height;
        self.surface.configure(&self.gpu.device, &self.surface_config);
        self.camera.resize(width, height);
    }

    /// Re-randomizes the flock at the current size.
    pub fn reset_particles(&mut self) -> Result<(), FlockingError> {
        let mut grid = ParticleGrid::initialize(self.config.tex_size)?;
        grid.randomize(&mut self.rng);
        self.pipeline.reinitialize(&self.gpu, &grid)?;
        log::info!("particles reset");
        Ok(())
    }

    pub fn toggle_pause(&mut self) {
        self.paused = !self.paused;
        log::info!("simulation {}", if self.paused { "paused" } else { "resumed" });
    }

    pub fn toggle_grid(&mut self) {
        self.show_grid = !self.show_grid;
    }

    pub fn reset_camera(&mut self) {
        self.camera.reset();
    }

    pub fn focus_flock(&mut self) {
        self.camera.set_focus(FLOCK_FOCUS);
    }

    pub fn pan_camera(&mut self, delta_x: f32, delta_y: f32) {
        self.camera.pan(delta_x, delta_y);
    }

    pub fn adjust_parameter(&mut self, knob: ParameterKnob, factor: f32) {
        let value = self.params.adjust(knob, factor);
        log::info!("{knob:?} set to {value}");
    }

    pub fn handle_mouse_press(&mut self, button: MouseButton, cursor: [f32; 2]) {
        self.camera.handle_mouse_press(button, cursor);
    }

    pub fn handle_mouse_release(&mut self) {
        self.camera.handle_mouse_release();
    }

    pub fn handle_mouse_move(&mut self, cursor: [f32; 2]) {
        self.camera.handle_mouse_move(cursor);
    }

    pub fn handle_mouse_wheel(&mut self, delta: f32) {
        self.camera.handle_mouse_wheel(delta);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_timer_waits_for_a_full_interval() {
        let start = Instant::now();
        let mut timer = FrameTimer::new(start);
        assert_eq!(timer.tick_at(start + Duration::from_millis(100)), None);
        assert_eq!(timer.tick_at(start + Duration::from_millis(200)), None);

        let fps = timer.tick_at(start + Duration::from_millis(500)).unwrap();
        assert!((fps - 6.0).abs() < 1e-9);
    }

    #[test]
    fn frame_timer_restarts_after_reporting() {
        let start = Instant::now();
        let mut timer = FrameTimer::new(start);
        assert!(timer.tick_at(start + Duration::from_secs(1)).is_some());
        assert_eq!(timer.tick_at(start + Duration::from_millis(1100)), None);
        let fps = timer.tick_at(start + Duration::from_secs(2)).unwrap();
        assert!((fps - 2.0).abs() < 1e-9);
    }

    #[test]
    fn title_shows_two_decimals() {
        assert_eq!(fps_title(59.876), "Flocking - FPS: 59.88");
    }
}
