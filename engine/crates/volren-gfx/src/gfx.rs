use std::{mem::ManuallyDrop, rc::Rc};

use ash::vk;

use crate::{
    basic::color::LabelColor,
    commands::{
        command_buffer::GfxCommandBuffer, command_pool::GfxCommandPool, command_queue::GfxCommandQueue,
        semaphore::GfxSemaphore, submit_info::GfxSubmitInfo,
    },
    config::{FRAMES_IN_FLIGHT, GfxConfig},
    descriptors::{
        descriptor_allocator::GfxDescriptor,
        descriptor_heap::{GfxDescriptorHeap, GfxDescriptorHeapKind, GfxDescriptorHeaps},
    },
    error::{GfxError, GfxResult},
    foundation::{device::GfxDevice, mem_allocator::GfxMemAllocator, physical_device::GfxPhysicalDevice},
    frame::{frame_context::GfxFrameContext, frame_ring::GfxFrameRing},
    gfx_core::GfxCore,
    resources::{
        desc::{GfxBufferDesc, GfxResidency, GfxTextureDesc},
        factory::GfxResourceFactory,
        format::bytes_per_texel,
        resource::{GfxResource, GfxResourceKind},
        upload::{copy_rows_into, copyable_footprint},
    },
    state::{
        resource_state::GfxResourceState,
        state_tracker::{GfxBarrierBatch, GfxStateTracked, assume_after_host_write, transition},
    },
    swapchain::render_swapchain::{GfxAcquire, GfxRenderSwapchain, GfxSwapchainDesc},
};

/// 一次性提交使用的 command buffer，提交之后阻塞等待完成
struct GfxImmediateContext {
    command_pool: GfxCommandPool,
    command_buffer: GfxCommandBuffer,
}

impl GfxImmediateContext {
    fn new(device: Rc<GfxDevice>, queue_family_index: u32) -> GfxResult<Self> {
        let command_pool =
            GfxCommandPool::new(device, queue_family_index, vk::CommandPoolCreateFlags::TRANSIENT, "immediate")?;
        let command_buffer = GfxCommandBuffer::new(&command_pool, "immediate")?;
        Ok(Self {
            command_pool,
            command_buffer,
        })
    }

    fn destroy(self) {
        self.command_pool.destroy();
    }
}

/// GPU 设备：持有 queue、三张描述符表、swapchain 以及 frame ring
///
/// 所有对象都由显式传入的 [`GfxConfig`] 构造，没有全局单例。
///
/// # 帧的生命周期
/// ```ignore
/// let cmd = gfx.begin_frame()?;   // 等待该 slot 上一次提交完成，acquire back buffer
/// // ... 通过 state tracker 录制命令
/// gfx.end_frame()?;               // submit，present，signal fence，前进到下一个 slot
/// ```
///
/// drop 时会先等待 GPU 空闲，然后逆序销毁所有对象
pub struct Gfx {
    config: GfxConfig,
    window_extent: vk::Extent2D,

    immediate: ManuallyDrop<GfxImmediateContext>,
    frame_ring: ManuallyDrop<GfxFrameRing<GfxFrameContext>>,

    /// 每个 swapchain image 一个，present 等待
    render_finished: Vec<GfxSemaphore>,
    /// swapchain image 包装成的资源，RTV 在创建时绑定，resize 时复用同样的 slot
    back_buffers: Vec<GfxResource>,
    swapchain: ManuallyDrop<GfxRenderSwapchain>,
    swapchain_dirty: bool,

    heaps: ManuallyDrop<GfxDescriptorHeaps>,
    queue: ManuallyDrop<GfxCommandQueue>,
    core: ManuallyDrop<GfxCore>,
}

// new & init
impl Gfx {
    pub fn new(
        config: GfxConfig,
        raw_display_handle: raw_window_handle::RawDisplayHandle,
        raw_window_handle: raw_window_handle::RawWindowHandle,
        window_extent: vk::Extent2D,
    ) -> GfxResult<Self> {
        let _span = tracy_client::span!("Gfx::new");

        let core = GfxCore::new(&config, raw_display_handle, raw_window_handle)?;
        let device = core.device.clone();
        let queue_family = core.physical_device.gfx_queue_family().clone();
        let queue_family_index = queue_family.queue_family_index;

        let queue = GfxCommandQueue::new(device.clone(), queue_family, config.wait_timeout_ns())?;

        let capacity = config.descriptor_capacity;
        let mut heaps = GfxDescriptorHeaps {
            cbv_srv_uav: GfxDescriptorHeap::new_shader_visible(
                &core.device,
                &core.allocator,
                &core.physical_device,
                capacity.cbv_srv_uav,
            )?,
            rtv: GfxDescriptorHeap::new_view_table(GfxDescriptorHeapKind::Rtv, capacity.rtv),
            dsv: GfxDescriptorHeap::new_view_table(GfxDescriptorHeapKind::Dsv, capacity.dsv),
        };

        let swapchain = GfxRenderSwapchain::new(
            &core.device,
            core.physical_device.vk_handle(),
            &core.surface,
            &Self::swapchain_desc(&config, window_extent),
            vk::SwapchainKHR::null(),
        )?;
        let back_buffers = Self::wrap_back_buffers(
            &mut GfxResourceFactory::new(&core.device, &core.allocator, &mut heaps),
            &swapchain,
            &[],
        )?;
        let render_finished = (0..back_buffers.len())
            .map(|i| GfxSemaphore::new(&device, &format!("render-finished-{i}")))
            .collect::<GfxResult<Vec<_>>>()?;

        let contexts = (0..FRAMES_IN_FLIGHT)
            .map(|slot| GfxFrameContext::new(device.clone(), queue_family_index, slot))
            .collect::<GfxResult<Vec<_>>>()?;
        let Ok(contexts) = <[GfxFrameContext; FRAMES_IN_FLIGHT]>::try_from(contexts) else {
            unreachable!("exactly FRAMES_IN_FLIGHT frame contexts are created");
        };
        let immediate = GfxImmediateContext::new(device, queue_family_index)?;

        log::info!(
            "gfx initialized: {} back buffers ({:?}, {}x{}), {} frames in flight",
            back_buffers.len(),
            swapchain.format(),
            swapchain.extent().width,
            swapchain.extent().height,
            FRAMES_IN_FLIGHT
        );

        Ok(Self {
            config,
            window_extent,
            immediate: ManuallyDrop::new(immediate),
            frame_ring: ManuallyDrop::new(GfxFrameRing::new(contexts)),
            render_finished,
            back_buffers,
            swapchain: ManuallyDrop::new(swapchain),
            swapchain_dirty: false,
            heaps: ManuallyDrop::new(heaps),
            queue: ManuallyDrop::new(queue),
            core: ManuallyDrop::new(core),
        })
    }

    fn swapchain_desc(config: &GfxConfig, window_extent: vk::Extent2D) -> GfxSwapchainDesc {
        GfxSwapchainDesc {
            present_mode: config.present_mode.vk_present_mode(),
            prefer_srgb: config.srgb_back_buffer,
            image_count: config.back_buffer_count,
            window_extent,
        }
    }

    /// `rtv_slots` 中的 slot 会被依次复用，不足的部分从 RTV 表中分配
    fn wrap_back_buffers(
        factory: &mut GfxResourceFactory,
        swapchain: &GfxRenderSwapchain,
        rtv_slots: &[GfxDescriptor],
    ) -> GfxResult<Vec<GfxResource>> {
        swapchain
            .images()
            .iter()
            .enumerate()
            .map(|(i, image)| {
                factory.wrap_back_buffer(
                    format!("back-buffer-{i}"),
                    *image,
                    swapchain.format(),
                    swapchain.extent(),
                    rtv_slots.get(i).copied(),
                )
            })
            .collect()
    }
}

impl Drop for Gfx {
    fn drop(&mut self) {
        log::info!("destroying gfx");
        if let Err(e) = self.wait_for_idle() {
            log::error!("failed to wait for gpu idle before destroying gfx: {}", e);
        }

        unsafe {
            ManuallyDrop::take(&mut self.immediate).destroy();
            for context in ManuallyDrop::take(&mut self.frame_ring).into_contexts() {
                context.destroy();
            }
            for semaphore in self.render_finished.drain(..) {
                semaphore.destroy(&self.core.device);
            }
            for back_buffer in self.back_buffers.drain(..) {
                back_buffer.destroy(&self.core.device, &self.core.allocator);
            }
            ManuallyDrop::take(&mut self.swapchain).destroy(&self.core.device);
            ManuallyDrop::take(&mut self.heaps).destroy(&self.core.allocator);
            ManuallyDrop::take(&mut self.queue).destroy();
            ManuallyDrop::take(&mut self.core).destroy();
        }
    }
}

// getters
impl Gfx {
    #[inline]
    pub fn config(&self) -> &GfxConfig {
        &self.config
    }

    #[inline]
    pub fn device(&self) -> &Rc<GfxDevice> {
        &self.core.device
    }

    #[inline]
    pub fn allocator(&self) -> &GfxMemAllocator {
        &self.core.allocator
    }

    #[inline]
    pub fn physical_device(&self) -> &GfxPhysicalDevice {
        &self.core.physical_device
    }

    #[inline]
    pub fn heaps(&self) -> &GfxDescriptorHeaps {
        &self.heaps
    }

    #[inline]
    pub fn frame_index(&self) -> usize {
        self.frame_ring.frame_index()
    }

    #[inline]
    pub fn is_recording(&self) -> bool {
        self.frame_ring.is_recording()
    }

    /// 最近一次 signal 的 fence 值
    #[inline]
    pub fn last_signaled_value(&self) -> u64 {
        self.queue.last_signaled_value()
    }

    #[inline]
    pub fn back_buffer_count(&self) -> usize {
        self.back_buffers.len()
    }

    #[inline]
    pub fn back_buffer_extent(&self) -> vk::Extent2D {
        self.swapchain.extent()
    }

    #[inline]
    pub fn back_buffer_format(&self) -> vk::Format {
        self.swapchain.format()
    }

    /// 当前帧 acquire 到的 back buffer
    #[inline]
    pub fn current_back_buffer(&self) -> &GfxResource {
        &self.back_buffers[self.swapchain.current_image_index()]
    }

    #[inline]
    pub fn current_back_buffer_mut(&mut self) -> &mut GfxResource {
        &mut self.back_buffers[self.swapchain.current_image_index()]
    }

    /// 资源的 RTV 对应的 attachment view
    pub fn rtv(&self, resource: &GfxResource) -> Option<vk::ImageView> {
        resource.views().rtv.map(|descriptor| self.heaps.rtv.view(&descriptor))
    }

    /// 资源的 DSV 对应的 attachment view
    pub fn dsv(&self, resource: &GfxResource) -> Option<vk::ImageView> {
        resource.views().dsv.map(|descriptor| self.heaps.dsv.view(&descriptor))
    }

    /// 所有 shader visible 资源所在的描述符表
    pub fn descriptor_buffer_binding(&self) -> Option<vk::DescriptorBufferBindingInfoEXT<'static>> {
        self.heaps.cbv_srv_uav.binding_info()
    }
}

// 帧的生命周期
impl Gfx {
    /// 等待当前 slot 上一次提交完成，重置 command buffer 并 acquire 下一个 back buffer
    ///
    /// 窗口面积为 0 时返回 `None`，此时不进入 Recording，也不能调用 [`Self::end_frame`]
    ///
    /// # panic
    /// 上一帧还没有 `end_frame` 时 panic
    pub fn begin_frame(&mut self) -> GfxResult<Option<GfxCommandBuffer>> {
        let _span = tracy_client::span!("Gfx::begin_frame");

        if self.window_extent.width == 0 || self.window_extent.height == 0 {
            return Ok(None);
        }
        if self.swapchain_dirty {
            self.recreate_swapchain()?;
        }

        let context = self.frame_ring.begin(&mut *self.queue)?;
        context.reset()?;
        let command_buffer = context.command_buffer().clone();
        let image_available = *context.image_available();

        let mut acquire = self.swapchain.acquire_next_image(&self.core.device, &image_available)?;
        if acquire == GfxAcquire::OutOfDate {
            self.recreate_swapchain()?;
            acquire = self.swapchain.acquire_next_image(&self.core.device, &image_available)?;
        }
        match acquire {
            GfxAcquire::Acquired { suboptimal } => self.swapchain_dirty |= suboptimal,
            GfxAcquire::OutOfDate => {
                return Err(GfxError::from_vk("acquire next image", vk::Result::ERROR_OUT_OF_DATE_KHR));
            }
        }

        command_buffer
            .begin(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT, &format!("frame-{}", self.frame_ring.frame_index()))?;
        if let Some(binding) = self.heaps.cbv_srv_uav.binding_info() {
            command_buffer.cmd_bind_descriptor_buffers(std::slice::from_ref(&binding));
        }

        Ok(Some(command_buffer))
    }

    /// back buffer 转换到 Present，提交、present，然后 signal 新的 fence 值并前进到下一个 slot
    ///
    /// # panic
    /// 没有对应的 `begin_frame` 时 panic
    pub fn end_frame(&mut self) -> GfxResult<()> {
        let _span = tracy_client::span!("Gfx::end_frame");
        assert!(self.frame_ring.is_recording(), "end_frame called without begin_frame");

        let image_index = self.swapchain.current_image_index();
        let context = self.frame_ring.current();
        let command_buffer = context.command_buffer().clone();
        let image_available = *context.image_available();
        let render_finished = self.render_finished[image_index];

        let mut batch = GfxBarrierBatch::new();
        transition(&mut self.back_buffers[image_index], GfxResourceState::Present, &mut batch);
        batch.flush(&command_buffer);
        command_buffer.end()?;

        self.queue.begin_label(&format!("frame-{}", self.frame_ring.frame_index()), LabelColor::COLOR_FRAME);
        let submit_result = self.queue.submit_batches(&[GfxSubmitInfo::new(std::slice::from_ref(&command_buffer))
            .wait(&image_available, vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT, None)
            .signal(&render_finished, vk::PipelineStageFlags2::ALL_COMMANDS, None)]);
        self.queue.end_label();
        submit_result?;

        let present_result =
            self.swapchain.present_image(&self.core.device, self.queue.handle(), std::slice::from_ref(&render_finished));

        let fence_value = self.queue.signal()?;
        self.frame_ring.end(fence_value);

        self.swapchain_dirty |= present_result?;
        Ok(())
    }

    /// 等待所有 slot 的最后一次提交完成
    pub fn wait_for_idle(&mut self) -> GfxResult<()> {
        let _span = tracy_client::span!("Gfx::wait_for_idle");
        self.frame_ring.wait_all(&mut *self.queue)?;
        self.queue.wait_idle()
    }

    /// 窗口大小变化，面积为 0 时推迟到窗口恢复
    ///
    /// # panic
    /// 正在录制时 panic
    pub fn resize(&mut self, width: u32, height: u32) -> GfxResult<()> {
        assert!(!self.frame_ring.is_recording(), "resize called while a frame is recording");

        self.window_extent = vk::Extent2D { width, height };
        if width == 0 || height == 0 {
            log::info!("window is minimized, swapchain recreation is deferred");
            self.swapchain_dirty = true;
            return Ok(());
        }
        self.wait_for_idle()?;
        self.recreate_swapchain()
    }

    /// back buffer 的 RTV 写回原来的 slot
    fn recreate_swapchain(&mut self) -> GfxResult<()> {
        let _span = tracy_client::span!("Gfx::recreate_swapchain");
        self.queue.wait_idle()?;

        let rtv_slots = self.back_buffers.iter().filter_map(|back_buffer| back_buffer.views().rtv).collect::<Vec<_>>();
        for back_buffer in self.back_buffers.drain(..) {
            back_buffer.destroy(&self.core.device, &self.core.allocator);
        }

        let old_swapchain = self.swapchain.retire();
        *self.swapchain = GfxRenderSwapchain::new(
            &self.core.device,
            self.core.physical_device.vk_handle(),
            &self.core.surface,
            &Self::swapchain_desc(&self.config, self.window_extent),
            old_swapchain,
        )?;
        self.back_buffers = Self::wrap_back_buffers(
            &mut GfxResourceFactory::new(&self.core.device, &self.core.allocator, &mut self.heaps),
            &self.swapchain,
            &rtv_slots,
        )?;
        while self.render_finished.len() < self.back_buffers.len() {
            let i = self.render_finished.len();
            self.render_finished.push(GfxSemaphore::new(&self.core.device, &format!("render-finished-{i}"))?);
        }

        self.swapchain_dirty = false;
        log::info!(
            "swapchain recreated: {}x{}, {} back buffers",
            self.swapchain.extent().width,
            self.swapchain.extent().height,
            self.back_buffers.len()
        );
        Ok(())
    }
}

// 资源
impl Gfx {
    #[inline]
    fn factory(&mut self) -> GfxResourceFactory<'_> {
        GfxResourceFactory::new(&self.core.device, &self.core.allocator, &mut self.heaps)
    }

    /// 创建 buffer，并记录 `desc.initial_state`
    ///
    /// `initial_data` 不为空时，随后立即上传（host visible 的 buffer 直接写入）
    pub fn create_buffer(&mut self, desc: &GfxBufferDesc, initial_data: Option<&[u8]>) -> GfxResult<GfxResource> {
        let mut buffer = self.factory().create_buffer(desc)?;
        buffer.set_current_state(desc.initial_state);

        if let Some(data) = initial_data {
            if let Err(e) = self.immediate_upload_buffer(&mut buffer, data, desc.initial_state) {
                buffer.destroy(&self.core.device, &self.core.allocator);
                return Err(e);
            }
        }
        Ok(buffer)
    }

    /// 创建 texture；`desc.initial_state` 不是 `Undefined` 时立即提交一次状态转换
    pub fn create_texture(&mut self, desc: &GfxTextureDesc) -> GfxResult<GfxResource> {
        let mut texture = self.factory().create_texture(desc)?;

        let initial_state = desc.initial_state;
        if initial_state != GfxResourceState::Undefined {
            let result = self.immediate_submit(&format!("{}-initial-state", desc.name), |cmd| {
                let mut batch = GfxBarrierBatch::new();
                transition(&mut texture, initial_state, &mut batch);
                batch.flush(cmd);
            });
            if let Err(e) = result {
                texture.destroy(&self.core.device, &self.core.allocator);
                return Err(e);
            }
        }
        Ok(texture)
    }

    /// 等待 GPU 空闲之后销毁资源
    pub fn destroy_resource(&mut self, resource: GfxResource) -> GfxResult<()> {
        let result = self.wait_for_idle();
        resource.destroy(&self.core.device, &self.core.allocator);
        result
    }

    /// 录制并提交一个 command buffer，然后阻塞等待完成
    ///
    /// # panic
    /// 正在录制某一帧时 panic
    pub fn immediate_submit(&mut self, name: &str, record: impl FnOnce(&GfxCommandBuffer)) -> GfxResult<()> {
        let _span = tracy_client::span!("Gfx::immediate_submit");
        assert!(!self.frame_ring.is_recording(), "immediate submit `{}` while a frame is recording", name);

        // 上一次 immediate 提交已经完成
        self.immediate.command_pool.reset_all_buffers()?;
        let command_buffer = self.immediate.command_buffer.clone();
        command_buffer.begin(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT, name)?;
        record(&command_buffer);
        self.queue.submit(&command_buffer)?;

        let fence_value = self.queue.signal()?;
        self.queue.wait_for_completion(fence_value)
    }

    /// 通过 staging buffer 把紧密排列的 `data` 上传到 texture 的 mip 0，完成后转换到 `final_state`
    pub fn immediate_upload_texture(
        &mut self,
        texture: &mut GfxResource,
        data: &[u8],
        final_state: GfxResourceState,
    ) -> GfxResult<()> {
        let _span = tracy_client::span!("Gfx::immediate_upload_texture");

        let invalid = |reason: &str| GfxError::InvalidDescription(format!("texture `{}` {}", texture.name(), reason));
        let extent = texture.extent().ok_or_else(|| invalid("is not a texture"))?;
        let format = texture.formats().map(|formats| formats.resource).ok_or_else(|| invalid("is not a texture"))?;
        let bytes_per_texel = bytes_per_texel(format).ok_or_else(|| invalid("has a format that can not be uploaded"))?;

        let pdevice = &self.core.physical_device;
        let footprint = copyable_footprint(
            extent,
            bytes_per_texel,
            0,
            pdevice.copy_row_pitch_alignment(),
            // vkCmdCopyBufferToImage 要求 offset 至少 4 字节对齐
            pdevice.copy_offset_alignment().max(4),
        );
        if data.len() as u64 != footprint.source_size() {
            return Err(GfxError::UploadSizeMismatch {
                expected: footprint.source_size() as usize,
                actual: data.len(),
            });
        }

        let staging_desc =
            GfxBufferDesc::new(format!("{}-staging", texture.name()), footprint.required_size())
                .residency(GfxResidency::Upload);
        let mut staging = self.factory().create_buffer(&staging_desc)?;
        let copy_result = staging.map(&self.core.allocator).and_then(|mut mapped| copy_rows_into(&footprint, data, &mut mapped));
        let rows = match copy_result {
            Ok(rows) => rows,
            Err(e) => {
                staging.destroy(&self.core.device, &self.core.allocator);
                return Err(e);
            }
        };
        log::debug!(
            "upload `{}`: {} rows, row pitch {}, offset {}",
            texture.name(),
            rows,
            footprint.row_pitch,
            footprint.offset
        );

        let region = footprint.buffer_image_copy(texture.aspect());
        let staging_buffer = staging.vk_buffer();
        let name = format!("{}-upload", texture.name());
        let result = self.immediate_submit(&name, |cmd| {
            cmd.begin_label(&name, LabelColor::COLOR_UPLOAD);
            let mut batch = GfxBarrierBatch::new();
            transition(texture, GfxResourceState::CopyDest, &mut batch);
            batch.flush(cmd);

            cmd.cmd_copy_buffer_to_image(staging_buffer, texture.vk_image(), std::slice::from_ref(&region));

            transition(texture, final_state, &mut batch);
            batch.flush(cmd);
            cmd.end_label();
        });

        // immediate_submit 返回时 GPU 已经不再使用 staging buffer
        staging.destroy(&self.core.device, &self.core.allocator);
        result
    }

    /// 把 `data` 写入 buffer 的起始位置，完成后转换到 `final_state`
    ///
    /// host visible 的 buffer 直接通过 map 写入；否则经过 staging buffer 拷贝
    pub fn immediate_upload_buffer(
        &mut self,
        buffer: &mut GfxResource,
        data: &[u8],
        final_state: GfxResourceState,
    ) -> GfxResult<()> {
        let _span = tracy_client::span!("Gfx::immediate_upload_buffer");

        if data.len() as u64 > buffer.size() {
            return Err(GfxError::UploadSizeMismatch {
                expected: buffer.size() as usize,
                actual: data.len(),
            });
        }

        let host_visible =
            matches!(buffer.kind(), GfxResourceKind::Buffer { residency, .. } if residency.is_host_visible());
        if host_visible {
            {
                let mut mapped = buffer.map(&self.core.allocator)?;
                mapped[..data.len()].copy_from_slice(data);
            }
            assume_after_host_write(buffer, final_state);
            return Ok(());
        }

        let staging_desc =
            GfxBufferDesc::new(format!("{}-staging", buffer.name()), data.len() as u64).residency(GfxResidency::Upload);
        let mut staging = self.factory().create_buffer(&staging_desc)?;
        if let Err(e) = staging.map(&self.core.allocator).map(|mut mapped| mapped[..data.len()].copy_from_slice(data)) {
            staging.destroy(&self.core.device, &self.core.allocator);
            return Err(e);
        }

        let staging_buffer = staging.vk_buffer();
        let name = format!("{}-upload", buffer.name());
        let result = self.immediate_submit(&name, |cmd| {
            cmd.begin_label(&name, LabelColor::COLOR_UPLOAD);
            let mut batch = GfxBarrierBatch::new();
            transition(buffer, GfxResourceState::CopyDest, &mut batch);
            batch.flush(cmd);

            cmd.cmd_copy_buffer(
                staging_buffer,
                buffer.vk_buffer(),
                &[vk::BufferCopy {
                    src_offset: 0,
                    dst_offset: 0,
                    size: data.len() as u64,
                }],
            );

            transition(buffer, final_state, &mut batch);
            batch.flush(cmd);
            cmd.end_label();
        });

        staging.destroy(&self.core.device, &self.core.allocator);
        result
    }
}
