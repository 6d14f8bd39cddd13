//! Lipstick Try-On - Main Entry Point
//!
//! Real-time AR lipstick try-on: live camera preview with face-tracked
//! lipstick (and optional eyelash) overlays.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use lipstick_tryon::config::TryOnConfig;
use lipstick_tryon::App;
use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::{ElementState, KeyEvent, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowAttributes, WindowId};

const WINDOW_TITLE: &str = "Lipstick Try-On";
const DEFAULT_WIDTH: u32 = 960;
const DEFAULT_HEIGHT: u32 = 720;
const CONFIG_PATH: &str = "tryon-config.json";

/// Application state machine
enum AppState {
    /// Initial state before window is created
    Uninitialized,
    /// Window and graphics context are ready
    Running { window: Arc<Window>, app: App },
}

/// Main application handler implementing winit's ApplicationHandler trait
struct TryOnApp {
    state: AppState,
    settings: TryOnConfig,
    target_fps: u32,
    next_redraw_at: Instant,
    face_detected: Option<bool>,
}

impl TryOnApp {
    fn new(settings: TryOnConfig) -> Self {
        let target_fps = settings.target_fps;
        Self {
            state: AppState::Uninitialized,
            settings,
            target_fps,
            next_redraw_at: Instant::now(),
            face_detected: None,
        }
    }
}

impl ApplicationHandler for TryOnApp {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if let AppState::Uninitialized = &self.state {
            log::info!("Creating window...");

            let window_attributes = WindowAttributes::default()
                .with_title(WINDOW_TITLE)
                .with_inner_size(LogicalSize::new(DEFAULT_WIDTH, DEFAULT_HEIGHT));

            let window = Arc::new(
                event_loop
                    .create_window(window_attributes)
                    .expect("Failed to create window"),
            );

            log::info!(
                "Window created: {}x{}",
                window.inner_size().width,
                window.inner_size().height
            );

            let app = pollster::block_on(App::new(window.clone(), self.settings.clone()));

            log::info!("Lipstick Try-On ready!");
            log::info!("Keys: [/] shade, -/= opacity, E eyelashes, M mirror, F11 fullscreen, ESC exit");

            self.state = AppState::Running { window, app };
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        let AppState::Running { window, app } = &mut self.state else {
            return;
        };

        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested, exiting...");
                app.save_settings();
                app.shutdown();
                event_loop.exit();
            }

            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(key_code),
                        state: ElementState::Pressed,
                        ..
                    },
                ..
            } => match key_code {
                KeyCode::Escape => {
                    log::info!("Escape pressed, exiting...");
                    app.save_settings();
                    app.shutdown();
                    event_loop.exit();
                }
                KeyCode::F11 => {
                    let fullscreen = window.fullscreen();
                    if fullscreen.is_some() {
                        window.set_fullscreen(None);
                        log::info!("Exiting fullscreen");
                    } else {
                        window.set_fullscreen(Some(winit::window::Fullscreen::Borderless(None)));
                        log::info!("Entering fullscreen");
                    }
                }
                // Shade catalogue
                KeyCode::BracketRight => app.cycle_shade(1),
                KeyCode::BracketLeft => app.cycle_shade(-1),
                // Opacity
                KeyCode::Equal => app.adjust_opacity(0.05),
                KeyCode::Minus => app.adjust_opacity(-0.05),
                // Toggles
                KeyCode::KeyE => app.toggle_eyelashes(),
                KeyCode::KeyM => app.toggle_mirror(),
                _ => {}
            },

            WindowEvent::Resized(physical_size) => {
                app.resize(physical_size);
            }

            WindowEvent::RedrawRequested => {
                app.tick();

                // Surface the tracking state in the window title.
                let face = app.face_detected();
                if self.face_detected != Some(face) {
                    self.face_detected = Some(face);
                    let status = if face { "tracking" } else { "no face" };
                    window.set_title(&format!("{} - {}", WINDOW_TITLE, status));
                }

                match app.render() {
                    Ok(_) => {}
                    Err(wgpu::SurfaceError::Lost) => {
                        log::warn!("Surface lost, reconfiguring...");
                        app.resize(app.size());
                    }
                    Err(wgpu::SurfaceError::OutOfMemory) => {
                        log::error!("Out of GPU memory!");
                        event_loop.exit();
                    }
                    Err(e) => {
                        log::warn!("Surface error: {:?}", e);
                    }
                }
            }

            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        let AppState::Running { window, .. } = &mut self.state else {
            event_loop.set_control_flow(ControlFlow::Wait);
            return;
        };

        // Drive redraws at target FPS
        let frame_duration = Duration::from_nanos(1_000_000_000u64 / self.target_fps as u64);
        let wake_early = Duration::from_micros(1000);
        let wake_at = self
            .next_redraw_at
            .checked_sub(wake_early)
            .unwrap_or(self.next_redraw_at);
        let now = Instant::now();

        if now >= wake_at {
            // Spin-wait for precise timing
            while Instant::now() < self.next_redraw_at {
                std::hint::spin_loop();
            }

            window.request_redraw();
            self.next_redraw_at += frame_duration;

            // Reset if too far behind
            let max_behind = frame_duration * 2;
            let now_after = Instant::now();
            if now_after > self.next_redraw_at + max_behind {
                self.next_redraw_at = now_after + frame_duration;
            }
        }

        event_loop.set_control_flow(ControlFlow::WaitUntil(wake_at));
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    log::info!("Lipstick Try-On v0.1.0");

    let settings = match TryOnConfig::load(&PathBuf::from(CONFIG_PATH)) {
        Ok(settings) => settings,
        Err(e) => {
            log::warn!("Failed to load config: {}, using defaults", e);
            TryOnConfig::default()
        }
    };

    let event_loop = EventLoop::new().expect("Failed to create event loop");
    event_loop.set_control_flow(ControlFlow::Wait);

    let mut app = TryOnApp::new(settings);
    event_loop.run_app(&mut app).expect("Event loop error");
}
