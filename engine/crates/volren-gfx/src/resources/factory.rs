use ash::vk;
use vk_mem::Alloc;

use crate::{
    basic::align::{RESOURCE_ALIGNMENT, align_up},
    descriptors::{
        descriptor_allocator::GfxDescriptor,
        descriptor_heap::{GfxDescriptorHeap, GfxDescriptorHeaps},
    },
    error::{GfxError, GfxResult, VkResultExt},
    foundation::{device::GfxDevice, mem_allocator::GfxMemAllocator},
    resources::{
        desc::{GfxBufferDesc, GfxResidency, GfxTextureDesc, GfxTextureDimension, GfxViewFlags},
        format::{GfxTextureFormats, aspect_flags, is_depth_format, texture_formats},
        resource::{GfxMemory, GfxResource, GfxResourceKind, GfxResourceViews},
        view_layout::{
            GfxBufferViewLayout, buffer_usage, buffer_view_plan, image_type, image_usage, image_view_type,
            optimized_clear_value,
        },
    },
};

/// 根据描述创建资源，并在描述符表中为每个请求的 view 分配一个 slot
///
/// 创建出的资源处于 `Undefined` 状态，初始状态的转换由 [`crate::gfx::Gfx`] 负责
pub struct GfxResourceFactory<'a> {
    device: &'a GfxDevice,
    allocator: &'a GfxMemAllocator,
    heaps: &'a mut GfxDescriptorHeaps,
}

impl<'a> GfxResourceFactory<'a> {
    pub fn new(device: &'a GfxDevice, allocator: &'a GfxMemAllocator, heaps: &'a mut GfxDescriptorHeaps) -> Self {
        Self {
            device,
            allocator,
            heaps,
        }
    }
}

// buffer
impl GfxResourceFactory<'_> {
    pub fn create_buffer(&mut self, desc: &GfxBufferDesc) -> GfxResult<GfxResource> {
        let _span = tracy_client::span!("GfxResourceFactory::create_buffer");

        let requested_size = desc.requested_size();
        if requested_size == 0 {
            return Err(GfxError::InvalidDescription(format!("buffer `{}` has zero size", desc.name)));
        }
        let buffer_views = GfxViewFlags::CBV | GfxViewFlags::SRV | GfxViewFlags::UAV;
        if !buffer_views.contains(desc.views) {
            return Err(GfxError::InvalidDescription(format!(
                "buffer `{}` requests texture views {:?}",
                desc.name,
                desc.views - buffer_views
            )));
        }

        let size = align_up(requested_size, RESOURCE_ALIGNMENT);
        let typed = desc.format != vk::Format::UNDEFINED && !desc.raw;

        // 先计算所有 view，描述无效时不会分配任何东西
        let layouts = buffer_view_plan(desc, size)?;

        let buffer_ci = vk::BufferCreateInfo::default().size(size).usage(buffer_usage(desc.views, typed));
        let alloc_ci = Self::buffer_alloc_info(desc.residency);
        let (buffer, allocation) =
            unsafe { self.allocator.create_buffer_with_alignment(&buffer_ci, &alloc_ci, RESOURCE_ALIGNMENT) }
                .vk_context("create buffer")?;
        let device_address =
            unsafe { self.device.get_buffer_device_address(&vk::BufferDeviceAddressInfo::default().buffer(buffer)) };
        self.device.set_object_debug_name(buffer, format!("Buffer::{}", desc.name));

        let mut views = GfxResourceViews::default();
        let mut resource = GfxResource::new(
            desc.name.clone(),
            GfxResourceKind::Buffer {
                handle: buffer,
                residency: desc.residency,
                device_address,
                stride: desc.stride,
            },
            GfxMemory::Allocated(allocation),
            size,
            views,
            Vec::new(),
        );

        for (view, layout) in layouts {
            let descriptor = match self.write_buffer_descriptor(device_address, &layout) {
                Ok(descriptor) => descriptor,
                Err(e) => {
                    resource.destroy(self.device, self.allocator);
                    return Err(e);
                }
            };
            match view {
                v if v == GfxViewFlags::SRV => views.srv = Some(descriptor),
                v if v == GfxViewFlags::UAV => views.uav = Some(descriptor),
                _ => views.cbv = Some(descriptor),
            }
        }
        resource.set_views(views);

        log::debug!(
            "create buffer `{}`: {} bytes (requested {}), views {:?}, descriptor index {:?}",
            desc.name,
            size,
            requested_size,
            desc.views,
            resource.descriptor_index()
        );
        Ok(resource)
    }

    fn buffer_alloc_info(residency: GfxResidency) -> vk_mem::AllocationCreateInfo {
        match residency {
            GfxResidency::Device => vk_mem::AllocationCreateInfo {
                usage: vk_mem::MemoryUsage::AutoPreferDevice,
                ..Default::default()
            },
            GfxResidency::Upload => vk_mem::AllocationCreateInfo {
                usage: vk_mem::MemoryUsage::AutoPreferHost,
                flags: vk_mem::AllocationCreateFlags::HOST_ACCESS_SEQUENTIAL_WRITE,
                ..Default::default()
            },
            GfxResidency::Readback => vk_mem::AllocationCreateInfo {
                usage: vk_mem::MemoryUsage::AutoPreferHost,
                flags: vk_mem::AllocationCreateFlags::HOST_ACCESS_RANDOM,
                ..Default::default()
            },
        }
    }

    fn write_buffer_descriptor(
        &mut self,
        device_address: vk::DeviceAddress,
        layout: &GfxBufferViewLayout,
    ) -> GfxResult<GfxDescriptor> {
        let descriptor = self.heaps.cbv_srv_uav.allocate();
        let address_info = vk::DescriptorAddressInfoEXT::default()
            .address(device_address)
            .range(layout.range)
            .format(layout.format);
        let data = match layout.descriptor_type {
            vk::DescriptorType::UNIFORM_BUFFER => vk::DescriptorDataEXT {
                p_uniform_buffer: &address_info,
            },
            vk::DescriptorType::STORAGE_BUFFER => vk::DescriptorDataEXT {
                p_storage_buffer: &address_info,
            },
            vk::DescriptorType::UNIFORM_TEXEL_BUFFER => vk::DescriptorDataEXT {
                p_uniform_texel_buffer: &address_info,
            },
            _ => vk::DescriptorDataEXT {
                p_storage_texel_buffer: &address_info,
            },
        };
        let get_info = vk::DescriptorGetInfoEXT::default().ty(layout.descriptor_type).data(data);
        self.heaps.cbv_srv_uav.write_descriptor(self.device, self.allocator, &descriptor, &get_info)?;
        Ok(descriptor)
    }
}

// texture
impl GfxResourceFactory<'_> {
    pub fn create_texture(&mut self, desc: &GfxTextureDesc) -> GfxResult<GfxResource> {
        let _span = tracy_client::span!("GfxResourceFactory::create_texture");

        Self::validate_texture_desc(desc)?;

        let formats = texture_formats(desc.format, desc.views);
        let aspect = aspect_flags(formats.resource);
        let image_ci = vk::ImageCreateInfo::default()
            .flags(if formats.mutable { vk::ImageCreateFlags::MUTABLE_FORMAT } else { vk::ImageCreateFlags::empty() })
            .image_type(image_type(desc.dimension))
            .format(formats.resource)
            .extent(desc.extent())
            .mip_levels(desc.mip_levels)
            .array_layers(1)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(image_usage(desc.views))
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);
        let alloc_ci = vk_mem::AllocationCreateInfo {
            usage: vk_mem::MemoryUsage::AutoPreferDevice,
            flags: if desc.views.intersects(GfxViewFlags::RTV | GfxViewFlags::DSV) {
                vk_mem::AllocationCreateFlags::DEDICATED_MEMORY
            } else {
                vk_mem::AllocationCreateFlags::empty()
            },
            ..Default::default()
        };
        let (image, allocation) =
            unsafe { self.allocator.create_image(&image_ci, &alloc_ci) }.vk_context("create image")?;
        let size = unsafe { self.device.get_image_memory_requirements(image) }.size;
        self.device.set_object_debug_name(image, format!("Image::{}", desc.name));

        let mut resource = GfxResource::new(
            desc.name.clone(),
            GfxResourceKind::Texture {
                handle: image,
                dimension: desc.dimension,
                extent: desc.extent(),
                formats,
                aspect,
                clear_value: optimized_clear_value(desc.views),
            },
            GfxMemory::Allocated(allocation),
            size,
            GfxResourceViews::default(),
            Vec::new(),
        );

        if let Err(e) = self.create_texture_views(desc, &mut resource) {
            resource.destroy(self.device, self.allocator);
            return Err(e);
        }

        log::debug!(
            "create texture `{}`: {:?} {}x{}x{}, format {:?}, views {:?}, descriptor index {:?}",
            desc.name,
            desc.dimension,
            desc.width,
            desc.height,
            desc.depth,
            formats.resource,
            desc.views,
            resource.descriptor_index()
        );
        Ok(resource)
    }

    fn validate_texture_desc(desc: &GfxTextureDesc) -> GfxResult<()> {
        let invalid = |reason: &str| -> GfxResult<()> {
            Err(GfxError::InvalidDescription(format!("texture `{}` {}", desc.name, reason)))
        };

        if desc.width == 0 || desc.height == 0 || desc.depth == 0 || desc.mip_levels == 0 {
            return invalid("has a zero extent");
        }
        if desc.views.contains(GfxViewFlags::CBV) {
            return invalid("can not have a CBV");
        }
        if desc.dimension == GfxTextureDimension::Tex2D && desc.depth != 1 {
            return invalid("is 2D but has depth > 1");
        }
        if desc.dimension == GfxTextureDimension::Tex3D && desc.views.intersects(GfxViewFlags::RTV | GfxViewFlags::DSV)
        {
            return invalid("is 3D and can not be an attachment");
        }
        if desc.views.contains(GfxViewFlags::DSV) != is_depth_format(desc.format) {
            return invalid("must have a DSV exactly when it has a depth format");
        }
        Ok(())
    }

    fn create_image_view(
        &self,
        resource: &mut GfxResource,
        view_type: vk::ImageViewType,
        format: vk::Format,
        aspect: vk::ImageAspectFlags,
        suffix: &str,
    ) -> GfxResult<vk::ImageView> {
        let view_ci = vk::ImageViewCreateInfo::default()
            .image(resource.vk_image())
            .view_type(view_type)
            .format(format)
            .subresource_range(
                vk::ImageSubresourceRange::default()
                    .aspect_mask(aspect)
                    .base_mip_level(0)
                    .level_count(vk::REMAINING_MIP_LEVELS)
                    .base_array_layer(0)
                    .layer_count(1),
            );
        let view = unsafe { self.device.create_image_view(&view_ci, None) }.vk_context("create image view")?;
        self.device.set_object_debug_name(view, format!("ImageView::{}-{}", resource.name(), suffix));
        resource.push_image_view(view);
        Ok(view)
    }

    fn create_texture_views(&mut self, desc: &GfxTextureDesc, resource: &mut GfxResource) -> GfxResult<()> {
        let Some(formats) = resource.formats().copied() else {
            return Ok(());
        };
        // 深度格式的 SRV 只读 depth
        let sampled_aspect = if is_depth_format(formats.resource) {
            vk::ImageAspectFlags::DEPTH
        } else {
            vk::ImageAspectFlags::COLOR
        };
        let attachment_aspect = resource.aspect();
        let mut views = GfxResourceViews::default();

        if desc.views.contains(GfxViewFlags::SRV) {
            let view = self.create_image_view(
                resource,
                image_view_type(desc.dimension),
                formats.other_views,
                sampled_aspect,
                "srv",
            )?;
            views.srv = Some(self.write_image_descriptor(
                vk::DescriptorType::SAMPLED_IMAGE,
                view,
                vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
            )?);
        }
        if desc.views.contains(GfxViewFlags::UAV) {
            let view = self.create_image_view(
                resource,
                image_view_type(desc.dimension),
                formats.other_views,
                sampled_aspect,
                "uav",
            )?;
            views.uav =
                Some(self.write_image_descriptor(vk::DescriptorType::STORAGE_IMAGE, view, vk::ImageLayout::GENERAL)?);
        }
        if desc.views.contains(GfxViewFlags::RTV) {
            let view =
                self.create_image_view(resource, vk::ImageViewType::TYPE_2D, formats.rtv, attachment_aspect, "rtv")?;
            views.rtv = Some(Self::write_attachment_view(&mut self.heaps.rtv, view));
        }
        if desc.views.contains(GfxViewFlags::DSV) {
            let view = self.create_image_view(
                resource,
                vk::ImageViewType::TYPE_2D,
                formats.other_views,
                attachment_aspect,
                "dsv",
            )?;
            views.dsv = Some(Self::write_attachment_view(&mut self.heaps.dsv, view));
        }

        resource.set_views(views);
        Ok(())
    }

    fn write_image_descriptor(
        &mut self,
        ty: vk::DescriptorType,
        view: vk::ImageView,
        layout: vk::ImageLayout,
    ) -> GfxResult<GfxDescriptor> {
        let descriptor = self.heaps.cbv_srv_uav.allocate();
        let image_info = vk::DescriptorImageInfo::default().image_view(view).image_layout(layout);
        let data = if ty == vk::DescriptorType::STORAGE_IMAGE {
            vk::DescriptorDataEXT {
                p_storage_image: &image_info,
            }
        } else {
            vk::DescriptorDataEXT {
                p_sampled_image: &image_info,
            }
        };
        let get_info = vk::DescriptorGetInfoEXT::default().ty(ty).data(data);
        self.heaps.cbv_srv_uav.write_descriptor(self.device, self.allocator, &descriptor, &get_info)?;
        Ok(descriptor)
    }

    fn write_attachment_view(heap: &mut GfxDescriptorHeap, view: vk::ImageView) -> GfxDescriptor {
        let descriptor = heap.allocate();
        heap.write_view(&descriptor, view);
        descriptor
    }
}

// swapchain
impl GfxResourceFactory<'_> {
    /// 把 swapchain image 包装为带有 RTV 的外部资源
    ///
    /// `rtv` 为 `None` 时从 RTV 表中分配新的 slot，否则复用该 slot（resize 时）
    pub fn wrap_back_buffer(
        &mut self,
        name: String,
        image: vk::Image,
        format: vk::Format,
        extent: vk::Extent2D,
        rtv: Option<GfxDescriptor>,
    ) -> GfxResult<GfxResource> {
        // swapchain image 本身就是 RTV 的格式
        let formats = GfxTextureFormats {
            resource: format,
            rtv: format,
            other_views: format,
            mutable: false,
        };
        let mut resource = GfxResource::new(
            name,
            GfxResourceKind::Texture {
                handle: image,
                dimension: GfxTextureDimension::Tex2D,
                extent: vk::Extent3D {
                    width: extent.width,
                    height: extent.height,
                    depth: 1,
                },
                formats,
                aspect: vk::ImageAspectFlags::COLOR,
                clear_value: optimized_clear_value(GfxViewFlags::RTV),
            },
            GfxMemory::External,
            0,
            GfxResourceViews::default(),
            Vec::new(),
        );

        let view = match self.create_image_view(
            &mut resource,
            vk::ImageViewType::TYPE_2D,
            formats.rtv,
            vk::ImageAspectFlags::COLOR,
            "rtv",
        ) {
            Ok(view) => view,
            Err(e) => {
                resource.destroy(self.device, self.allocator);
                return Err(e);
            }
        };
        let descriptor = match rtv {
            Some(descriptor) => {
                self.heaps.rtv.write_view(&descriptor, view);
                descriptor
            }
            None => Self::write_attachment_view(&mut self.heaps.rtv, view),
        };
        resource.set_views(GfxResourceViews {
            rtv: Some(descriptor),
            ..Default::default()
        });
        Ok(resource)
    }
}
