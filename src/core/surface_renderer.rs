use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;

use glam::Vec3;
use wgpu::util::DeviceExt;
use wgpu::{Buffer, Device, RenderPipeline, Surface, SurfaceConfiguration, Texture, TextureView};
use winit::event::WindowEvent;
use winit::window::Window;

use super::asset::LoadProgress;
use super::gpu_context::GpuContext;
use super::overlay::{Overlay, OverlayElement};
use super::scene::{ModelGraph, SceneGraph};
use super::signal::{Signal, Subscription};
use crate::error::AssetKind;
use crate::traits::SceneRenderer;
use crate::types::{CameraState, CameraUniform, Vertex, Viewport};

const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// Flatten every mesh of `model` into one vertex and index list
pub fn build_geometry(model: &ModelGraph) -> (Vec<Vertex>, Vec<u32>) {
    let mut vertices = Vec::new();
    let mut indices = Vec::new();

    for mesh in &model.meshes {
        let base = vertices.len() as u32;
        let has_normals = mesh.normals.len() == mesh.positions.len();
        for (i, position) in mesh.positions.iter().enumerate() {
            let normal = if has_normals { mesh.normals[i] } else { Vec3::Y };
            vertices.push(Vertex {
                position: position.to_array(),
                normal: normal.to_array(),
                color: mesh.base_color,
            });
        }
        let count = mesh.positions.len();
        indices.extend(
            mesh.indices
                .chunks_exact(3)
                .filter(|triangle| triangle.iter().all(|&index| (index as usize) < count))
                .flatten()
                .map(|index| base + index),
        );
    }

    (vertices, indices)
}

/// Uniform data for one frame
pub fn camera_uniform(scene: &SceneGraph, camera: &CameraState) -> CameraUniform {
    let lighting = scene.lighting();
    CameraUniform {
        view_proj: camera.view_projection().to_cols_array_2d(),
        eye: camera.position.extend(1.0).to_array(),
        ambient: scene.effective_ambient().extend(1.0).to_array(),
        light_dir: lighting.light_direction().extend(0.0).to_array(),
        light_color: lighting.directional_color.extend(1.0).to_array(),
    }
}

struct GpuMesh {
    vertex_buffer: Buffer,
    index_buffer: Buffer,
    index_count: u32,
}

struct UiLayer {
    ctx: egui::Context,
    state: egui_winit::State,
    renderer: egui_wgpu::Renderer,
}

/// Forward renderer for the scene plus the egui overlay
///
/// Draws every model mesh with Lambert + ambient shading, then the activation
/// control, fallback notice and loading progress on top.
pub struct WgpuRenderer {
    window: Arc<Window>,
    gpu: GpuContext,
    surface: Option<Surface<'static>>,
    surface_config: SurfaceConfiguration,
    pipeline: RenderPipeline,
    camera_buffer: Buffer,
    camera_bind_group: wgpu::BindGroup,
    depth_texture: Texture,
    depth_view: TextureView,
    mesh: Option<GpuMesh>,
    uploaded_revision: Option<u64>,
    overlay: Overlay,
    progress: Rc<RefCell<HashMap<AssetKind, LoadProgress>>>,
    ui: Option<UiLayer>,
}

impl WgpuRenderer {
    pub async fn new(window: Arc<Window>, overlay: Overlay, show_ui: bool) -> anyhow::Result<Self> {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });
        let surface = instance.create_surface(window.clone())?;
        let gpu = GpuContext::for_surface(&instance, &surface).await?;

        let caps = surface.get_capabilities(gpu.adapter());
        let format = caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .or_else(|| caps.formats.first())
            .copied()
            .ok_or_else(|| anyhow::anyhow!("surface reports no texture formats"))?;
        let alpha_mode = caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let surface_config = SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(gpu.device(), &surface_config);

        let camera_buffer = gpu.device().create_buffer(&wgpu::BufferDescriptor {
            label: Some("Camera Uniform"),
            size: std::mem::size_of::<CameraUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let (pipeline, camera_bind_group) =
            Self::create_pipeline(gpu.device(), &camera_buffer, format);
        let (depth_texture, depth_view) =
            Self::create_depth_texture(gpu.device(), surface_config.width, surface_config.height);

        let ui = show_ui.then(|| {
            let ctx = egui::Context::default();
            let state = egui_winit::State::new(
                ctx.clone(),
                egui::ViewportId::ROOT,
                &window,
                Some(window.scale_factor() as f32),
                None,
                None,
            );
            let renderer =
                egui_wgpu::Renderer::new(gpu.device(), format, egui_wgpu::RendererOptions::default());
            UiLayer {
                ctx,
                state,
                renderer,
            }
        });

        log::info!(
            "renderer initialized: {}x{} {:?}",
            surface_config.width,
            surface_config.height,
            format
        );

        Ok(Self {
            window,
            gpu,
            surface: Some(surface),
            surface_config,
            pipeline,
            camera_buffer,
            camera_bind_group,
            depth_texture,
            depth_view,
            mesh: None,
            uploaded_revision: None,
            overlay,
            progress: Rc::new(RefCell::new(HashMap::new())),
            ui,
        })
    }

    /// Let the overlay see window input first. Returns true if it consumed the event.
    pub fn handle_window_event(&mut self, event: &WindowEvent) -> bool {
        match &mut self.ui {
            Some(ui) => ui.state.on_window_event(&self.window, event).consumed,
            None => false,
        }
    }

    /// Mirror load progress into the overlay readout
    pub fn track_progress(&self, progress: &Signal<LoadProgress>) -> Subscription {
        let board = self.progress.clone();
        progress.subscribe(move |update| {
            board.borrow_mut().insert(update.kind, *update);
        })
    }

    fn upload_scene(&mut self, scene: &SceneGraph) {
        if let Some(old) = self.mesh.take() {
            old.vertex_buffer.destroy();
            old.index_buffer.destroy();
        }
        self.uploaded_revision = Some(scene.revision());

        let Some(model) = scene.model() else {
            return;
        };
        let (vertices, indices) = build_geometry(model);
        if indices.is_empty() {
            return;
        }

        let device = self.gpu.device();
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Model Vertices"),
            contents: bytemuck::cast_slice(&vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Model Indices"),
            contents: bytemuck::cast_slice(&indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        log::debug!(
            "uploaded {} vertices, {} triangles",
            vertices.len(),
            indices.len() / 3
        );
        self.mesh = Some(GpuMesh {
            vertex_buffer,
            index_buffer,
            index_count: indices.len() as u32,
        });
    }

    fn draw_overlay(
        &mut self,
        encoder: &mut wgpu::CommandEncoder,
        view: &TextureView,
    ) -> Vec<wgpu::CommandBuffer> {
        let Some(ui) = &mut self.ui else {
            return Vec::new();
        };

        let elements = self.overlay.elements();
        let overlay = self.overlay.clone();
        let progress: Vec<LoadProgress> = self.progress.borrow().values().copied().collect();

        let raw_input = ui.state.take_egui_input(&self.window);
        let full_output = ui.ctx.run(raw_input, |ctx| {
            egui::Area::new(egui::Id::new("immersive-overlay"))
                .anchor(egui::Align2::CENTER_BOTTOM, egui::vec2(0.0, -24.0))
                .show(ctx, |ui| {
                    for (id, element) in &elements {
                        match element {
                            OverlayElement::ActivationControl { label } => {
                                let button = egui::Button::new(
                                    egui::RichText::new(label).size(18.0).strong(),
                                );
                                if ui.add(button).clicked() {
                                    overlay.activate(*id);
                                }
                            }
                            OverlayElement::FallbackNotice { text } => {
                                ui.label(
                                    egui::RichText::new(text)
                                        .size(14.0)
                                        .color(egui::Color32::LIGHT_GRAY),
                                );
                            }
                        }
                    }
                });

            let loading: Vec<&LoadProgress> = progress
                .iter()
                .filter(|p| p.fraction().map_or(true, |f| f < 1.0))
                .collect();
            if !loading.is_empty() {
                egui::Area::new(egui::Id::new("load-progress"))
                    .anchor(egui::Align2::LEFT_TOP, egui::vec2(10.0, 10.0))
                    .show(ctx, |ui| {
                        for p in loading {
                            let text = match p.fraction() {
                                Some(f) => format!("Loading {}: {:.0}%", p.kind, f * 100.0),
                                None => format!("Loading {}: {} KB", p.kind, p.loaded / 1024),
                            };
                            ui.label(
                                egui::RichText::new(text).color(egui::Color32::from_rgb(74, 158, 255)),
                            );
                        }
                    });
            }
        });

        ui.state
            .handle_platform_output(&self.window, full_output.platform_output);

        let device = self.gpu.device();
        let queue = self.gpu.queue();
        let tris = ui
            .ctx
            .tessellate(full_output.shapes, full_output.pixels_per_point);
        for (id, image_delta) in &full_output.textures_delta.set {
            ui.renderer.update_texture(device, queue, *id, image_delta);
        }

        let screen_descriptor = egui_wgpu::ScreenDescriptor {
            size_in_pixels: [self.surface_config.width, self.surface_config.height],
            pixels_per_point: full_output.pixels_per_point,
        };
        let extra = ui
            .renderer
            .update_buffers(device, queue, encoder, &tris, &screen_descriptor);

        {
            let mut render_pass = encoder
                .begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("Overlay Pass"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Load,
                            store: wgpu::StoreOp::Store,
                        },
                        depth_slice: None,
                    })],
                    depth_stencil_attachment: None,
                    occlusion_query_set: None,
                    timestamp_writes: None,
                })
                .forget_lifetime();
            ui.renderer.render(&mut render_pass, &tris, &screen_descriptor);
        }

        for id in &full_output.textures_delta.free {
            ui.renderer.free_texture(id);
        }
        extra
    }

    fn create_pipeline(
        device: &Device,
        camera_buffer: &Buffer,
        format: wgpu::TextureFormat,
    ) -> (RenderPipeline, wgpu::BindGroup) {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Scene Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("../scene.wgsl").into()),
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Camera Bind Group Layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Camera Bind Group"),
            layout: &bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: camera_buffer.as_entire_binding(),
            }],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Scene Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Scene Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[Vertex::layout()],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format,
                    blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                cull_mode: None,
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        (pipeline, bind_group)
    }

    fn create_depth_texture(device: &Device, width: u32, height: u32) -> (Texture, TextureView) {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Depth Texture"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        (texture, view)
    }
}

impl SceneRenderer for WgpuRenderer {
    fn resize(&mut self, viewport: &Viewport) {
        let (width, height) = viewport.physical_size();
        let Some(surface) = &self.surface else {
            return;
        };
        if width == 0 || height == 0 {
            return;
        }
        if width == self.surface_config.width && height == self.surface_config.height {
            return;
        }

        self.surface_config.width = width;
        self.surface_config.height = height;
        surface.configure(self.gpu.device(), &self.surface_config);

        self.depth_texture.destroy();
        let (depth_texture, depth_view) = Self::create_depth_texture(self.gpu.device(), width, height);
        self.depth_texture = depth_texture;
        self.depth_view = depth_view;
    }

    fn render(&mut self, scene: &SceneGraph, camera: &CameraState) -> anyhow::Result<()> {
        if self.surface.is_none() {
            return Ok(());
        }
        if self.uploaded_revision != Some(scene.revision()) {
            self.upload_scene(scene);
        }

        let uniform = camera_uniform(scene, camera);
        self.gpu
            .queue()
            .write_buffer(&self.camera_buffer, 0, bytemuck::cast_slice(&[uniform]));

        let Some(surface) = &self.surface else {
            return Ok(());
        };
        let frame = match surface.get_current_texture() {
            Ok(frame) => frame,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                surface.configure(self.gpu.device(), &self.surface_config);
                return Ok(());
            }
            Err(e) => return Err(anyhow::anyhow!("cannot acquire surface texture: {}", e)),
        };
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .gpu
            .device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            });

        let background = scene.lighting().background;
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Scene Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: background.x as f64,
                            g: background.y as f64,
                            b: background.z as f64,
                            a: 1.0,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            if let Some(mesh) = &self.mesh {
                render_pass.set_pipeline(&self.pipeline);
                render_pass.set_bind_group(0, &self.camera_bind_group, &[]);
                render_pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
                render_pass.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
                render_pass.draw_indexed(0..mesh.index_count, 0, 0..1);
            }
        }

        let extra = self.draw_overlay(&mut encoder, &view);

        self.gpu
            .queue()
            .submit(extra.into_iter().chain(std::iter::once(encoder.finish())));
        self.window.pre_present_notify();
        frame.present();
        Ok(())
    }

    fn release(&mut self) {
        if self.surface.take().is_none() {
            return;
        }
        if let Some(mesh) = self.mesh.take() {
            mesh.vertex_buffer.destroy();
            mesh.index_buffer.destroy();
        }
        self.camera_buffer.destroy();
        self.depth_texture.destroy();
        self.uploaded_revision = None;
        self.ui = None;
        log::debug!("renderer released GPU resources");
    }
}
