use anyhow::Context;
use ash::vk;
use volren_gfx::{
    basic::color::LabelColor,
    commands::command_buffer::GfxCommandBuffer,
    config::FRAMES_IN_FLIGHT,
    gfx::Gfx,
    resources::{
        desc::{GfxBufferDesc, GfxResidency, GfxTextureDesc, GfxViewFlags},
        resource::GfxResource,
    },
    state::{
        resource_state::GfxResourceState,
        state_tracker::{GfxBarrierBatch, transition},
    },
};

use crate::{
    config::AppConfig,
    constants::{CameraConstants, DescriptorIndices, PerFrameConstants, cube_model_matrix},
    cube::{CUBE_VERTEX_COUNT, CUBE_VERTEX_STRIDE, cube_vertex_bytes},
    volume::load_or_generate,
};

const DEPTH_FORMAT: vk::Format = vk::Format::D32_SFLOAT;
const FACE_FORMAT: vk::Format = vk::Format::R8G8B8A8_SRGB;
const VOLUME_FORMAT: vk::Format = vk::Format::R8_UNORM;

const BACK_BUFFER_CLEAR_COLOR: [f32; 4] = [0.1, 0.1, 0.15, 1.0];

/// 每帧旋转的角度（弧度）
const ROTATION_PER_FRAME: f32 = 0.01;

/// 一个 attachment：view 以及 clear 的值
struct ClearTarget {
    view: vk::ImageView,
    clear_value: vk::ClearValue,
}

impl ClearTarget {
    fn of(resource: &GfxResource, view: Option<vk::ImageView>) -> anyhow::Result<Self> {
        let view = view.with_context(|| format!("`{}` has no attachment view", resource.name()))?;
        let clear_value = resource
            .clear_value()
            .with_context(|| format!("`{}` has no clear value", resource.name()))?
            .vk_clear_value();
        Ok(Self { view, clear_value })
    }
}

/// 体渲染需要的全部资源
///
/// front/back face 的捕获 texture 以固定的尺寸创建，窗口 resize 时不会重建，
/// 因为描述符表不回收 slot
pub struct VolumeApp {
    depth: GfxResource,
    cube: GfxResource,
    front_faces: GfxResource,
    back_faces: GfxResource,
    volume: GfxResource,
    /// 每个 frame slot 一个，CPU 只写入 GPU 已经用完的那一个
    per_frame_cbs: Vec<GfxResource>,
    camera_cb: GfxResource,

    render_extent: vk::Extent2D,
    indices: DescriptorIndices,
    frame_count: u64,
}

// new & init
impl VolumeApp {
    pub fn new(gfx: &mut Gfx, config: &AppConfig) -> anyhow::Result<Self> {
        let _span = tracy_client::span!("VolumeApp::new");

        let render_extent = vk::Extent2D {
            width: config.window.width.max(1),
            height: config.window.height.max(1),
        };
        let (width, height) = (render_extent.width, render_extent.height);

        let depth = gfx
            .create_texture(
                &GfxTextureDesc::new_2d("depth", DEPTH_FORMAT, width, height)
                    .views(GfxViewFlags::DSV)
                    .initial_state(GfxResourceState::DepthWrite),
            )
            .context("create depth buffer")?;

        let cube = gfx
            .create_buffer(
                &GfxBufferDesc::new_elements("cube-vertices", CUBE_VERTEX_COUNT, CUBE_VERTEX_STRIDE)
                    .views(GfxViewFlags::SRV)
                    .raw(true)
                    .initial_state(GfxResourceState::ShaderResource),
                Some(cube_vertex_bytes()),
            )
            .context("create cube vertex buffer")?;

        let face_desc = |name: &str| {
            GfxTextureDesc::new_2d(name, FACE_FORMAT, width, height)
                .views(GfxViewFlags::RTV | GfxViewFlags::SRV)
                .initial_state(GfxResourceState::ShaderResource)
        };
        let front_faces = gfx.create_texture(&face_desc("front-faces")).context("create front face texture")?;
        let back_faces = gfx.create_texture(&face_desc("back-faces")).context("create back face texture")?;

        let volume_config = &config.volume;
        let [vw, vh, vd] = volume_config.dims();
        let volume_data = load_or_generate(&volume_config.resolved_path(), volume_config.dims())?;
        let mut volume = gfx
            .create_texture(&GfxTextureDesc::new_3d("volume", VOLUME_FORMAT, vw, vh, vd).views(GfxViewFlags::SRV))
            .context("create volume texture")?;
        gfx.immediate_upload_texture(&mut volume, &volume_data.voxels, GfxResourceState::ShaderResource)
            .context("upload volume")?;

        let constant_buffer_desc = |name: String, size: usize| {
            GfxBufferDesc::new(name, size as u64)
                .views(GfxViewFlags::CBV)
                .residency(GfxResidency::Upload)
                .initial_state(GfxResourceState::GenericRead)
        };
        let per_frame_cbs = (0..FRAMES_IN_FLIGHT)
            .map(|i| {
                gfx.create_buffer(&constant_buffer_desc(format!("per-frame-{i}"), size_of::<PerFrameConstants>()), None)
            })
            .collect::<Result<Vec<_>, _>>()
            .context("create per frame constant buffers")?;

        let camera = CameraConstants::new(width as f32 / height as f32);
        let camera_cb = gfx
            .create_buffer(
                &constant_buffer_desc("camera".to_string(), size_of::<CameraConstants>()),
                Some(bytemuck::bytes_of(&camera)),
            )
            .context("create camera constant buffer")?;

        let descriptor_index = |resource: &GfxResource| {
            resource.descriptor_index().with_context(|| format!("`{}` has no shader visible view", resource.name()))
        };
        let indices = DescriptorIndices {
            front: descriptor_index(&front_faces)?,
            back: descriptor_index(&back_faces)?,
            cube: descriptor_index(&cube)?,
            volume: descriptor_index(&volume)?,
        };
        log::info!("volume app initialized: render {}x{}, {:?}", width, height, indices);

        Ok(Self {
            depth,
            cube,
            front_faces,
            back_faces,
            volume,
            per_frame_cbs,
            camera_cb,
            render_extent,
            indices,
            frame_count: 0,
        })
    }

    /// 等待 GPU 空闲之后销毁所有资源
    pub fn destroy(self, gfx: &mut Gfx) -> anyhow::Result<()> {
        let result = gfx.wait_for_idle();

        let resources = [self.depth, self.cube, self.front_faces, self.back_faces, self.volume, self.camera_cb]
            .into_iter()
            .chain(self.per_frame_cbs);
        for resource in resources {
            resource.destroy(gfx.device(), gfx.allocator());
        }

        Ok(result?)
    }
}

// 每帧
impl VolumeApp {
    /// 录制并提交一帧；窗口最小化时直接返回
    pub fn render(&mut self, gfx: &mut Gfx) -> anyhow::Result<()> {
        let _span = tracy_client::span!("VolumeApp::render");

        let Some(cmd) = gfx.begin_frame()? else {
            return Ok(());
        };

        // begin_frame 之后，这个 slot 的 constant buffer 已经不再被 GPU 使用
        let constants = PerFrameConstants::new(
            cube_model_matrix(self.frame_count as f32 * ROTATION_PER_FRAME),
            [self.render_extent.width, self.render_extent.height],
            self.indices,
        );
        self.per_frame_cbs[gfx.frame_index()].map(gfx.allocator())?.write_pod(0, &constants);

        self.record_face_passes(gfx, &cmd)?;
        self.record_back_buffer_pass(gfx, &cmd)?;

        gfx.end_frame()?;
        self.frame_count += 1;
        Ok(())
    }

    fn record_face_passes(&mut self, gfx: &Gfx, cmd: &GfxCommandBuffer) -> anyhow::Result<()> {
        let mut batch = GfxBarrierBatch::new();
        transition(&mut self.front_faces, GfxResourceState::RenderTarget, &mut batch);
        transition(&mut self.back_faces, GfxResourceState::RenderTarget, &mut batch);
        transition(&mut self.depth, GfxResourceState::DepthWrite, &mut batch);
        batch.flush(cmd);

        let depth = ClearTarget::of(&self.depth, gfx.dsv(&self.depth))?;
        for (name, faces) in [("front-faces", &self.front_faces), ("back-faces", &self.back_faces)] {
            let color = ClearTarget::of(faces, gfx.rtv(faces))?;
            clear_pass(cmd, name, self.render_extent, &color, Some(&depth));
        }

        transition(&mut self.front_faces, GfxResourceState::ShaderResource, &mut batch);
        transition(&mut self.back_faces, GfxResourceState::ShaderResource, &mut batch);
        batch.flush(cmd);
        Ok(())
    }

    fn record_back_buffer_pass(&mut self, gfx: &mut Gfx, cmd: &GfxCommandBuffer) -> anyhow::Result<()> {
        let extent = gfx.back_buffer_extent();

        let mut batch = GfxBarrierBatch::new();
        transition(gfx.current_back_buffer_mut(), GfxResourceState::RenderTarget, &mut batch);
        batch.flush(cmd);

        let back_buffer = gfx.current_back_buffer();
        let color = ClearTarget {
            view: gfx.rtv(back_buffer).with_context(|| format!("`{}` has no rtv", back_buffer.name()))?,
            clear_value: vk::ClearValue {
                color: vk::ClearColorValue {
                    float32: BACK_BUFFER_CLEAR_COLOR,
                },
            },
        };
        clear_pass(cmd, "back-buffer", extent, &color, None);

        transition(gfx.current_back_buffer_mut(), GfxResourceState::Present, &mut batch);
        batch.flush(cmd);
        Ok(())
    }
}

/// 只 clear，不绘制的 dynamic rendering pass
fn clear_pass(
    cmd: &GfxCommandBuffer,
    name: &str,
    extent: vk::Extent2D,
    color: &ClearTarget,
    depth: Option<&ClearTarget>,
) {
    cmd.begin_label(name, LabelColor::COLOR_PASS);

    let color_attachments = [vk::RenderingAttachmentInfo::default()
        .image_view(color.view)
        .image_layout(GfxResourceState::RenderTarget.access_state().layout)
        .load_op(vk::AttachmentLoadOp::CLEAR)
        .store_op(vk::AttachmentStoreOp::STORE)
        .clear_value(color.clear_value)];
    let depth_attachment = depth.map(|depth| {
        vk::RenderingAttachmentInfo::default()
            .image_view(depth.view)
            .image_layout(GfxResourceState::DepthWrite.access_state().layout)
            .load_op(vk::AttachmentLoadOp::CLEAR)
            .store_op(vk::AttachmentStoreOp::STORE)
            .clear_value(depth.clear_value)
    });

    let mut rendering_info = vk::RenderingInfo::default()
        .render_area(vk::Rect2D {
            offset: vk::Offset2D::default(),
            extent,
        })
        .layer_count(1)
        .color_attachments(&color_attachments);
    if let Some(depth_attachment) = depth_attachment.as_ref() {
        rendering_info = rendering_info.depth_attachment(depth_attachment);
    }

    cmd.cmd_begin_rendering(&rendering_info);
    cmd.cmd_end_rendering();

    cmd.end_label();
}

// getters
impl VolumeApp {
    #[inline]
    pub fn descriptor_indices(&self) -> DescriptorIndices {
        self.indices
    }

    #[inline]
    pub fn render_extent(&self) -> vk::Extent2D {
        self.render_extent
    }

    #[inline]
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    #[inline]
    pub fn volume(&self) -> &GfxResource {
        &self.volume
    }

    #[inline]
    pub fn camera_cb(&self) -> &GfxResource {
        &self.camera_cb
    }
}
