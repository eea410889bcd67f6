//! The headless volume rendering engine.

use glam::Vec3;
use medvol_core::{Options, VolumeGridHelper};

use crate::camera::Camera;
use crate::cutting_planes::CuttingPlanesStage;
use crate::error::{RenderError, RenderResult};
use crate::framebuffer::{check_adapter_support, Framebuffer};
use crate::post_process::PostProcessPass;
use crate::ray_marching::{DrrMode, DvrMode, MaskMode, MipMode, RayMarchingMode, RayMarchingStage};
use crate::stage::{FrameContext, RenderStage, SceneNode};
use crate::texture3d::{GpuTextureFactory, ManagedTexture3D};

/// Grid helper uploading its segments as wgpu textures.
pub type GpuVolumeGridHelper<V> = VolumeGridHelper<V, ManagedTexture3D>;

/// Renders scene graphs of volume segments into an off-screen framebuffer.
///
/// A frame clears the scene, runs every stage in the order it was appended
/// and post-processes the result into the color and depth image targets.
/// A failed frame engages the render lock: further frames are refused until
/// [`unlock`](Self::unlock) is called.
pub struct VolumeEngine {
    device: wgpu::Device,
    queue: wgpu::Queue,
    adapter_info: wgpu::AdapterInfo,
    framebuffer: Framebuffer,
    /// Main camera.
    pub camera: Camera,
    /// Loading and rendering options.
    pub options: Options,
    /// Color the scene is cleared to.
    pub background: wgpu::Color,
    stages: Vec<Box<dyn RenderStage>>,
    post_process: PostProcessPass,
    render_lock: u32,
}

impl VolumeEngine {
    /// Creates a new headless engine rendering `width`×`height` images.
    pub async fn new_headless(width: u32, height: u32) -> RenderResult<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..wgpu::InstanceDescriptor::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .map_err(|_| RenderError::AdapterCreationFailed)?;
        let adapter_info = adapter.get_info();
        check_adapter_support(&adapter)?;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("medvol device (headless)"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: wgpu::MemoryHints::default(),
                trace: wgpu::Trace::default(),
                experimental_features: wgpu::ExperimentalFeatures::default(),
            })
            .await?;

        log::info!(
            "created headless engine on {} ({:?})",
            adapter_info.name,
            adapter_info.backend
        );

        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let framebuffer = Framebuffer::new(&device, width, height);
        let post_process = PostProcessPass::new(&device);
        if let Some(error) = device.pop_error_scope().await {
            return Err(RenderError::Device(error.to_string()));
        }
        let post_process = post_process?;
        #[allow(clippy::cast_precision_loss)]
        let camera = Camera::new(framebuffer.width() as f32 / framebuffer.height() as f32);

        Ok(Self {
            device,
            queue,
            adapter_info,
            framebuffer,
            camera,
            options: Options::default(),
            background: wgpu::Color::BLACK,
            stages: Vec::new(),
            post_process,
            render_lock: 0,
        })
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    pub fn adapter_info(&self) -> &wgpu::AdapterInfo {
        &self.adapter_info
    }

    pub fn framebuffer(&self) -> &Framebuffer {
        &self.framebuffer
    }

    /// Resizes the framebuffer and updates the camera aspect ratio.
    #[allow(clippy::cast_precision_loss)]
    pub fn resize(&mut self, width: u32, height: u32) -> RenderResult<()> {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        self.framebuffer.resize(&self.device, width, height);
        if let Some(error) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(RenderError::Device(error.to_string()));
        }
        self.camera
            .set_aspect_ratio(self.framebuffer.width() as f32 / self.framebuffer.height() as f32);
        Ok(())
    }

    /// Factory uploading segments to this engine's device.
    pub fn texture_factory(&self) -> GpuTextureFactory<'_> {
        GpuTextureFactory::new(&self.device, &self.queue)
    }

    /// Creates a grid helper sized by the engine options.
    pub fn create_grid_helper<V: medvol_core::Voxel>(
        &self,
        native_resolution: glam::UVec3,
    ) -> RenderResult<GpuVolumeGridHelper<V>> {
        Ok(VolumeGridHelper::new(
            native_resolution,
            self.options.max_segment_bytesize,
            self.options.normals,
        )?)
    }

    /// Points the camera at a volume of `extent` centered at the origin.
    pub fn frame_volume(&mut self, extent: Vec3) {
        self.camera.look_at_extent(Vec3::ZERO, extent);
    }

    /// Appends a stage; stages run in insertion order.
    pub fn append_stage(&mut self, stage: Box<dyn RenderStage>) {
        log::debug!("appended render stage '{}'", stage.name());
        self.stages.push(stage);
    }

    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    pub fn clear_stages(&mut self) {
        self.stages.clear();
    }

    /// Creates a ray-marching stage configured from the engine options.
    pub fn ray_marching_stage<M: RayMarchingMode>(
        &self,
        mode: M,
        geometry_type: u32,
    ) -> RenderResult<RayMarchingStage<M>> {
        let mut stage = RayMarchingStage::new(
            &self.device,
            &self.queue,
            mode,
            geometry_type,
            self.options.first_volume_unit,
        )?;
        stage.set_sample_rate(self.options.sample_rate)?;
        Ok(stage)
    }

    /// DVR stage using the default color map.
    pub fn dvr_stage(&self, geometry_type: u32) -> RenderResult<RayMarchingStage<DvrMode>> {
        let mode = DvrMode {
            config: self.options.dvr.clone(),
            ..DvrMode::default()
        };
        self.ray_marching_stage(mode, geometry_type)
    }

    /// MIP stage using a gray ramp.
    pub fn mip_stage(&self, geometry_type: u32) -> RenderResult<RayMarchingStage<MipMode>> {
        let mode = MipMode {
            config: self.options.mip.clone(),
            ..MipMode::default()
        };
        self.ray_marching_stage(mode, geometry_type)
    }

    pub fn drr_stage(&self, geometry_type: u32) -> RenderResult<RayMarchingStage<DrrMode>> {
        self.ray_marching_stage(DrrMode::new(self.options.drr.clone()), geometry_type)
    }

    /// Mask stage drawing the `Role::Mask` features of `geometry_type`.
    pub fn mask_stage(&self, geometry_type: u32) -> RenderResult<RayMarchingStage<MaskMode>> {
        self.ray_marching_stage(MaskMode::new(self.options.mask.clone()), geometry_type)
    }

    /// Cutting planes stage without any planes.
    pub fn cutting_planes_stage(&self, geometry_type: u32) -> RenderResult<CuttingPlanesStage> {
        CuttingPlanesStage::new(&self.device, geometry_type, self.options.cutting_planes.clone())
    }

    /// Number of failed frames since the last [`unlock`](Self::unlock).
    pub fn render_lock(&self) -> u32 {
        self.render_lock
    }

    pub fn is_locked(&self) -> bool {
        self.render_lock > 0
    }

    /// Re-enables rendering after a failed frame.
    pub fn unlock(&mut self) {
        if self.render_lock > 0 {
            log::info!("render lock released after {} failed frame(s)", self.render_lock);
        }
        self.render_lock = 0;
    }

    /// Renders one frame of `root`.
    ///
    /// Fails with [`RenderError::RenderLocked`] while the render lock is
    /// engaged. Any other failure engages it.
    pub fn render_frame(&mut self, root: &SceneNode) -> RenderResult<()> {
        if self.render_lock > 0 {
            return Err(RenderError::RenderLocked(self.render_lock));
        }

        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let result = self.encode_frame(root);
        let validation = pollster::block_on(self.device.pop_error_scope());
        let out_of_memory = pollster::block_on(self.device.pop_error_scope());

        let result = result.and_then(|()| match validation.or(out_of_memory) {
            Some(error) => Err(RenderError::Device(error.to_string())),
            None => Ok(()),
        });
        if let Err(error) = &result {
            self.render_lock += 1;
            log::error!("rendering failed, render lock engaged: {error}");
        }
        result
    }

    fn encode_frame(&mut self, root: &SceneNode) -> RenderResult<()> {
        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("frame encoder"),
        });

        {
            let _clear_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Clear Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: self.framebuffer.scene().view(),
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.background),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: self.framebuffer.depth().view(),
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                ..Default::default()
            });
        }

        let frame = FrameContext {
            device: &self.device,
            queue: &self.queue,
            framebuffer: &self.framebuffer,
            view: self.camera.view_matrix(),
            projection: self.camera.projection_matrix(),
        };
        for stage in &mut self.stages {
            stage.render(&frame, &mut encoder, root)?;
        }

        self.post_process.update_uniforms(
            &self.queue,
            &self.options.post_process,
            self.framebuffer.width(),
            self.framebuffer.height(),
        );
        self.post_process.render(&self.device, &mut encoder, &self.framebuffer);

        self.queue.submit(std::iter::once(encoder.finish()));
        Ok(())
    }

    /// Reads the post-processed color of the last frame.
    pub fn read_color(&self) -> RenderResult<image::RgbaImage> {
        self.framebuffer.read_color(&self.device, &self.queue)
    }

    /// Reads the post-processed depth of the last frame.
    pub fn read_depth(&self) -> RenderResult<Vec<f32>> {
        self.framebuffer.read_depth(&self.device, &self.queue)
    }
}
