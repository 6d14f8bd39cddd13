//! Application state: wgpu context, camera, detector, and the per-frame
//! try-on pipeline.
//!
//! Each display frame is composited on the CPU (cover-fit camera image
//! with the overlay canvas blended on top), uploaded as a single texture
//! and blitted to the surface through the passthrough pipeline.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use winit::dpi::PhysicalSize;
use winit::window::Window;

use crate::camera::CameraCapture;
use crate::config::{parse_hex_color, TryOnConfig, PRESET_SHADES};
use crate::ml::face_mesh::FaceMeshModel;
use crate::ml::{DetectError, DetectorHandle, LandmarkSet};
use crate::tryon::canvas::Color;
use crate::tryon::eyelash::EyelashSprite;
use crate::tryon::{FrameOutcome, FrameStyle, TryOnRenderer};

const EYELASH_SPRITE_PATH: &str = "assets/eyelash.png";
const CONFIG_PATH: &str = "tryon-config.json";

/// Main application state.
pub struct App {
    window: Arc<Window>,
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    surface_config: wgpu::SurfaceConfiguration,
    size: PhysicalSize<u32>,

    sampler: wgpu::Sampler,
    passthrough_bind_group_layout: wgpu::BindGroupLayout,
    passthrough_pipeline: wgpu::RenderPipeline,
    /// Composited frame destination, recreated when its size changes.
    display_texture: Option<wgpu::Texture>,
    display_bind_group: Option<wgpu::BindGroup>,

    camera: Option<CameraCapture>,
    detector: Option<DetectorHandle>,
    renderer: TryOnRenderer,

    settings: TryOnConfig,
    current_color: Color,
    /// CPU composite buffer, reused across frames.
    composite: Vec<u8>,
    composite_size: (u32, u32),
    last_outcome: FrameOutcome,
}

impl App {
    /// Create a new App instance with initialized wgpu context.
    pub async fn new(window: Arc<Window>, settings: TryOnConfig) -> Self {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = instance
            .create_surface(window.clone())
            .expect("Failed to create surface");

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .expect("Failed to find suitable GPU adapter");

        log::info!("Using GPU: {}", adapter.get_info().name);
        log::info!("Backend: {:?}", adapter.get_info().backend);

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Try-On Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: adapter.limits(),
                    memory_hints: wgpu::MemoryHints::Performance,
                },
                None,
            )
            .await
            .expect("Failed to create device");

        let surface_caps = surface.get_capabilities(&adapter);

        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .copied()
            .unwrap_or(surface_caps.formats[0]);

        log::info!("Surface format: {:?}", surface_format);

        let surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode: surface_caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 1,
        };

        surface.configure(&device, &surface_config);

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Sampler"),
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let passthrough_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Passthrough Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/passthrough.wgsl").into()),
        });

        let passthrough_bind_group_layout =
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("Passthrough Bind Group Layout"),
                entries: &[
                    wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Texture {
                            sample_type: wgpu::TextureSampleType::Float { filterable: true },
                            view_dimension: wgpu::TextureViewDimension::D2,
                            multisampled: false,
                        },
                        count: None,
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 1,
                        visibility: wgpu::ShaderStages::FRAGMENT,
                        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                        count: None,
                    },
                ],
            });

        let passthrough_pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("Passthrough Pipeline Layout"),
                bind_group_layouts: &[&passthrough_bind_group_layout],
                push_constant_ranges: &[],
            });

        let passthrough_pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Passthrough Pipeline"),
            layout: Some(&passthrough_pipeline_layout),
            vertex: wgpu::VertexState {
                module: &passthrough_shader,
                entry_point: Some("vs_main"),
                buffers: &[],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &passthrough_shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: surface_format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        let camera = match CameraCapture::new(settings.camera_index) {
            Ok(c) => Some(c),
            Err(e) => {
                log::error!("Camera unavailable: {}", e);
                None
            }
        };

        let detector = match FaceMeshModel::load() {
            Ok(model) => {
                match DetectorHandle::spawn(
                    Box::new(model),
                    Duration::from_millis(settings.detect_timeout_ms),
                ) {
                    Ok(handle) => Some(handle),
                    Err(e) => {
                        log::error!("Failed to spawn detector thread: {}", e);
                        None
                    }
                }
            }
            Err(e) => {
                log::warn!("Face detection disabled: {}", e);
                None
            }
        };

        let sprite = EyelashSprite::load(&PathBuf::from(EYELASH_SPRITE_PATH));
        let renderer = TryOnRenderer::new(sprite, settings.smoothing);

        let current_color = parse_hex_color(&settings.lipstick_color).unwrap_or_else(|e| {
            log::warn!("{}, falling back to first preset", e);
            parse_hex_color(PRESET_SHADES[0].hex).unwrap_or([90, 16, 51, 255])
        });

        Self {
            window,
            surface,
            device,
            queue,
            surface_config,
            size,
            sampler,
            passthrough_bind_group_layout,
            passthrough_pipeline,
            display_texture: None,
            display_bind_group: None,
            camera,
            detector,
            renderer,
            settings,
            current_color,
            composite: Vec::new(),
            composite_size: (0, 0),
            last_outcome: FrameOutcome::AwaitingInputs,
        }
    }

    pub fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            self.size = new_size;
            self.surface_config.width = new_size.width;
            self.surface_config.height = new_size.height;
            self.surface.configure(&self.device, &self.surface_config);
        }
    }

    pub fn size(&self) -> PhysicalSize<u32> {
        self.size
    }

    pub fn face_detected(&self) -> bool {
        self.renderer.face_detected()
    }

    pub fn last_outcome(&self) -> FrameOutcome {
        self.last_outcome
    }

    /// Run one frame-loop iteration: detect, draw the overlay, and build
    /// the CPU composite that `render` uploads.
    pub fn tick(&mut self) {
        // Settings snapshot, read once so a change mid-frame cannot tear.
        let style = FrameStyle {
            color: self.current_color,
            opacity: self.settings.lipstick_opacity,
            eyelashes_enabled: self.settings.eyelashes_enabled,
            mirror: self.settings.mirror_display,
        };

        let frame = self.camera.as_ref().and_then(|c| c.latest_frame());
        let Some(frame) = frame else {
            self.last_outcome = FrameOutcome::AwaitingInputs;
            return;
        };

        let detection = self.run_detection(&frame);

        let scale = self.window.scale_factor() as f32;
        let container_width = (self.size.width as f32 / scale).round() as u32;
        let container_height = (self.size.height as f32 / scale).round() as u32;

        self.last_outcome = self.renderer.render_frame(
            detection.as_ref(),
            frame.width,
            frame.height,
            container_width,
            container_height,
            scale,
            &style,
        );
        if self.last_outcome == FrameOutcome::AwaitingInputs {
            return;
        }

        // Composite at the overlay's device resolution.
        let canvas = self.renderer.canvas();
        let (out_w, out_h) = (canvas.width(), canvas.height());
        if let Some(mut background) = frame.cover_resample(out_w, out_h, style.mirror) {
            canvas.composite_over(&mut background);
            self.composite = background;
            self.composite_size = (out_w, out_h);
        }
    }

    fn run_detection(&mut self, frame: &crate::camera::CameraFrame) -> Option<LandmarkSet> {
        let detector = self.detector.as_mut()?;
        let image = Arc::new(frame.to_image()?);
        match detector.detect(image) {
            Ok(result) => result,
            Err(DetectError::Timeout) => {
                log::debug!("Detection missed its deadline, treating as no face");
                None
            }
            Err(e) => {
                log::warn!("Detection error: {}", e);
                None
            }
        }
    }

    /// Upload the composite and blit it to the surface.
    pub fn render(&mut self) -> Result<(), wgpu::SurfaceError> {
        let (width, height) = self.composite_size;
        if width > 0 && height > 0 {
            self.ensure_display_texture(width, height);
            if let Some(texture) = &self.display_texture {
                self.queue.write_texture(
                    wgpu::TexelCopyTextureInfo {
                        texture,
                        mip_level: 0,
                        origin: wgpu::Origin3d::ZERO,
                        aspect: wgpu::TextureAspect::All,
                    },
                    &self.composite,
                    wgpu::TexelCopyBufferLayout {
                        offset: 0,
                        bytes_per_row: Some(width * 4),
                        rows_per_image: Some(height),
                    },
                    wgpu::Extent3d {
                        width,
                        height,
                        depth_or_array_layers: 1,
                    },
                );
            }
        }

        let output = self.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Blit Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            if let Some(bind_group) = &self.display_bind_group {
                render_pass.set_pipeline(&self.passthrough_pipeline);
                render_pass.set_bind_group(0, bind_group, &[]);
                render_pass.draw(0..3, 0..1);
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();

        Ok(())
    }

    fn ensure_display_texture(&mut self, width: u32, height: u32) {
        let needs_new = match &self.display_texture {
            None => true,
            Some(tex) => {
                let size = tex.size();
                size.width != width || size.height != height
            }
        };
        if !needs_new {
            return;
        }

        log::info!("Creating display texture: {}x{}", width, height);
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Display Texture"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let texture_view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Display Bind Group"),
            layout: &self.passthrough_bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&texture_view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.sampler),
                },
            ],
        });

        self.display_texture = Some(texture);
        self.display_bind_group = Some(bind_group);
    }

    // Settings surface used by the key bindings.

    pub fn cycle_shade(&mut self, step: i32) {
        let count = PRESET_SHADES.len() as i32;
        let current = self.settings.shade_index().unwrap_or(0) as i32;
        let next = (current + step).rem_euclid(count) as usize;
        let shade = PRESET_SHADES[next];
        self.settings.lipstick_color = shade.hex.to_string();
        if let Ok(color) = parse_hex_color(shade.hex) {
            self.current_color = color;
        }
        log::info!("Shade: {} ({})", shade.name, shade.hex);
    }

    pub fn adjust_opacity(&mut self, delta: f32) {
        self.settings.lipstick_opacity = (self.settings.lipstick_opacity + delta).clamp(0.0, 1.0);
        log::info!("Opacity: {:.2}", self.settings.lipstick_opacity);
    }

    pub fn toggle_eyelashes(&mut self) {
        self.settings.eyelashes_enabled = !self.settings.eyelashes_enabled;
        log::info!("Eyelashes: {}", self.settings.eyelashes_enabled);
    }

    pub fn toggle_mirror(&mut self) {
        self.settings.mirror_display = !self.settings.mirror_display;
        log::info!("Mirror: {}", self.settings.mirror_display);
    }

    /// Persist the current settings. Called on shutdown.
    pub fn save_settings(&self) {
        if let Err(e) = self.settings.save(&PathBuf::from(CONFIG_PATH)) {
            log::warn!("Failed to save settings: {}", e);
        }
    }

    /// Stop capture and detection threads. The camera is released here
    /// rather than relying on process teardown so the device light goes
    /// off as soon as the window closes.
    pub fn shutdown(&mut self) {
        if let Some(mut camera) = self.camera.take() {
            camera.stop();
        }
        self.detector = None;
    }
}
