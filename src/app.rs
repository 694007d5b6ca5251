use std::sync::Arc;

use winit::{
    application::ApplicationHandler,
    dpi::LogicalSize,
    event::{ElementState, KeyEvent, MouseScrollDelta, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{KeyCode, PhysicalKey},
    window::{Window, WindowId},
};

use crate::config::FlockingConfig;
use crate::context::SimulationContext;
use crate::error::FlockingError;
use crate::simulation::ParameterKnob;

const DEFAULT_LOG_FILTER: &str = "warn,gpu_flocking=info";
const PAN_STEP: f32 = 20.0; // pixels
const DECREASE: f32 = 0.9;
const INCREASE: f32 = 1.1;

/// What a key press asks the simulation to do.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    Quit,
    ResetParticles,
    TogglePause,
    ToggleGrid,
    ResetCamera,
    FocusFlock,
    Pan(f32, f32),
    Adjust(ParameterKnob, f32),
}

pub fn command_for_key(key: KeyCode) -> Option<Command> {
    let command = match key {
        KeyCode::Escape | KeyCode::KeyQ => Command::Quit,
        KeyCode::KeyR => Command::ResetParticles,
        KeyCode::Space => Command::TogglePause,
        KeyCode::KeyG => Command::ToggleGrid,
        KeyCode::KeyC => Command::ResetCamera,
        KeyCode::KeyF => Command::FocusFlock,

        KeyCode::KeyW => Command::Pan(0.0, PAN_STEP),
        KeyCode::KeyS => Command::Pan(0.0, -PAN_STEP),
        KeyCode::KeyA => Command::Pan(PAN_STEP, 0.0),
        KeyCode::KeyD => Command::Pan(-PAN_STEP, 0.0),

        // Pairs of keys shrink / grow one knob
        KeyCode::Digit1 => Command::Adjust(ParameterKnob::Cohesion, DECREASE),
        KeyCode::Digit2 => Command::Adjust(ParameterKnob::Cohesion, INCREASE),
        KeyCode::Digit3 => Command::Adjust(ParameterKnob::Alignment, DECREASE),
        KeyCode::Digit4 => Command::Adjust(ParameterKnob::Alignment, INCREASE),
        KeyCode::Digit5 => Command::Adjust(ParameterKnob::NeighborRadius, DECREASE),
        KeyCode::Digit6 => Command::Adjust(ParameterKnob::NeighborRadius, INCREASE),
        KeyCode::Digit7 => Command::Adjust(ParameterKnob::CollisionRadius, DECREASE),
        KeyCode::Digit8 => Command::Adjust(ParameterKnob::CollisionRadius, INCREASE),

        _ => return None,
    };
    Some(command)
}

pub struct App {
    config: FlockingConfig,
    context: Option<SimulationContext>,
    cursor: [f32; 2],
    fatal: Option<FlockingError>,
}

impl App {
    pub fn new(config: FlockingConfig) -> Self {
        Self {
            config,
            context: None,
            cursor: [0.0, 0.0],
            fatal: None,
        }
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, error: FlockingError) {
        self.fatal = Some(error);
        event_loop.exit();
    }

    fn create_context(&self, event_loop: &ActiveEventLoop) -> Result<SimulationContext, FlockingError> {
        let attributes = Window::default_attributes()
            .with_title("Flocking")
            .with_inner_size(LogicalSize::new(self.config.window_width, self.config.window_height));
        let window = Arc::new(event_loop.create_window(attributes)?);
        pollster::block_on(SimulationContext::new(window, self.config.clone()))
    }

    fn execute(&mut self, event_loop: &ActiveEventLoop, command: Command) {
        let Some(context) = self.context.as_mut() else {
            return;
        };
        match command {
            Command::Quit => event_loop.exit(),
            Command::ResetParticles => {
                if let Err(err) = context.reset_particles() {
                    log::error!("cannot reset particles: {err}");
                }
            }
            Command::TogglePause => context.toggle_pause(),
            Command::ToggleGrid => context.toggle_grid(),
            Command::ResetCamera => context.reset_camera(),
            Command::FocusFlock => context.focus_flock(),
            Command::Pan(dx, dy) => context.pan_camera(dx, dy),
            Command::Adjust(knob, factor) => context.adjust_parameter(knob, factor),
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.context.is_some() {
            return;
        }
        match self.create_context(event_loop) {
            Ok(context) => {
                context.window().request_redraw();
                self.context = Some(context);
            }
            Err(err) => self.fail(event_loop, err),
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        if let WindowEvent::KeyboardInput {
            event:
                KeyEvent {
                    physical_key: PhysicalKey::Code(key_code),
                    state: ElementState::Pressed,
                    ..
                },
            ..
        } = event
        {
            if let Some(command) = command_for_key(key_code) {
                self.execute(event_loop, command);
            }
            return;
        }

        let Some(context) = self.context.as_mut() else {
            return;
        };
        match event {
            WindowEvent::CloseRequested => {
                log::info!("window closed, stopping");
                event_loop.exit();
            }
            WindowEvent::RedrawRequested => {
                context.render();
                context.window().request_redraw();
            }
            WindowEvent::Resized(size) => {
                // Always followed by a redraw request
                context.resize(size.width, size.height);
            }
            WindowEvent::MouseWheel { delta, .. } => match delta {
                MouseScrollDelta::LineDelta(_, y) => context.handle_mouse_wheel(y),
                // Touchpad deltas come in pixels
                MouseScrollDelta::PixelDelta(position) => context.handle_mouse_wheel(position.y as f32 * 0.003),
            },
            WindowEvent::MouseInput { state, button, .. } => match state {
                ElementState::Pressed => context.handle_mouse_press(button, self.cursor),
                ElementState::Released => context.handle_mouse_release(),
            },
            WindowEvent::CursorMoved { position, .. } => {
                self.cursor = [position.x as f32, position.y as f32];
                context.handle_mouse_move(self.cursor);
            }
            _ => (),
        }
    }
}

/// Loads the configuration, opens the window and runs until it is closed.
pub fn run() -> Result<(), FlockingError> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(DEFAULT_LOG_FILTER)).init();

    let config = FlockingConfig::load()?;

    let event_loop = EventLoop::new()?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new(config);
    event_loop.run_app(&mut app)?;

    match app.fatal.take() {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

/// Logs a fatal error once and maps the outcome of [`run`] to an exit code.
pub fn exit_code(result: Result<(), FlockingError>) -> i32 {
    match result {
        Ok(()) => 0,
        Err(err) => {
            log::error!("{err}");
            1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quit_keys() {
        assert_eq!(command_for_key(KeyCode::Escape), Some(Command::Quit));
        assert_eq!(command_for_key(KeyCode::KeyQ), Some(Command::Quit));
    }

    #[test]
    fn digit_pairs_shrink_then_grow() {
        assert_eq!(
            command_for_key(KeyCode::Digit1),
            Some(Command::Adjust(ParameterKnob::Cohesion, DECREASE))
        );
        assert_eq!(
            command_for_key(KeyCode::Digit8),
            Some(Command::Adjust(ParameterKnob::CollisionRadius, INCREASE))
        );
    }

    #[test]
    fn opposite_pan_keys_cancel() {
        let Some(Command::Pan(wx, wy)) = command_for_key(KeyCode::KeyW) else {
            panic!("W does not pan");
        };
        let Some(Command::Pan(sx, sy)) = command_for_key(KeyCode::KeyS) else {
            panic!("S does not pan");
        };
        assert_eq!((wx + sx, wy + sy), (0.0, 0.0));
    }

    #[test]
    fn fatal_errors_exit_non_zero() {
        assert_eq!(exit_code(Ok(())), 0);
        assert_eq!(exit_code(Err(FlockingError::Readback("device lost".into()))), 1);
    }

    #[test]
    fn unbound_keys_do_nothing() {
        assert_eq!(command_for_key(KeyCode::KeyZ), None);
    }
}
