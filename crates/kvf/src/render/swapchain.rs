//! Swapchain management
//!
//! Owns the swapchain images, their views and one present semaphore per image. The
//! acquired image index is held until it is presented.

use std::sync::Arc;

use ash::extensions::khr::Swapchain as SwapchainLoader;
use ash::vk;

use super::api::RenderApi;
use super::barriers::backbuffer_transition;
use super::buffered::RESOURCE_BUFFERING;
use super::present::{filter_modes, optimal_present_mode, present_mode_str};
use super::sync::{Semaphore, FENCE_TIMEOUT};
use crate::error::{KvfError, KvfResult};

const IMAGE_USAGE: vk::ImageUsageFlags = vk::ImageUsageFlags::from_raw(
    vk::ImageUsageFlags::COLOR_ATTACHMENT.as_raw() | vk::ImageUsageFlags::TRANSFER_DST.as_raw(),
);

/// Extent to create the swapchain with: the surface's current extent, or the
/// framebuffer size clamped to the supported range when the surface leaves it up to us.
pub fn image_extent(caps: &vk::SurfaceCapabilitiesKHR, framebuffer: vk::Extent2D) -> vk::Extent2D {
    if caps.current_extent.width != u32::MAX {
        return caps.current_extent;
    }
    vk::Extent2D {
        width: framebuffer
            .width
            .clamp(caps.min_image_extent.width, caps.max_image_extent.width),
        height: framebuffer
            .height
            .clamp(caps.min_image_extent.height, caps.max_image_extent.height),
    }
}

/// Number of images to request: one more than the frames in flight, within the surface limits
pub fn image_count(caps: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let min = RESOURCE_BUFFERING as u32 + 1;
    if caps.max_image_count < caps.min_image_count {
        min.max(caps.min_image_count)
    } else {
        min.clamp(caps.min_image_count, caps.max_image_count)
    }
}

/// Reject counts that cannot keep every frame in flight on its own image
pub fn check_image_count(count: u32) -> KvfResult<()> {
    if count as usize <= RESOURCE_BUFFERING {
        return Err(KvfError::InsufficientSwapchainImages {
            count,
            buffering: RESOURCE_BUFFERING,
        });
    }
    Ok(())
}

/// Bookkeeping for the image between acquire and present
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AcquiredImage {
    index: Option<u32>,
    stale: bool,
}

impl AcquiredImage {
    /// Index of the held image
    pub fn index(&self) -> Option<u32> {
        self.index
    }

    /// Hold `index` until it is presented or abandoned
    pub fn acquire(&mut self, index: u32) {
        self.index = Some(index);
    }

    /// Release the held image for presentation
    pub fn take(&mut self) -> Option<u32> {
        self.index.take()
    }

    /// Drop the held image without presenting it. The swapchain must be recreated before
    /// the next acquire.
    pub fn abandon(&mut self) {
        self.index = None;
        self.stale = true;
    }

    /// Whether an image was abandoned since the last recreate
    pub fn is_stale(&self) -> bool {
        self.stale
    }
}

/// The acquired swapchain image
#[derive(Debug, Clone, Copy)]
pub struct Backbuffer {
    /// Swapchain image
    pub image: vk::Image,
    /// Colour view of `image`
    pub view: vk::ImageView,
    /// Image size
    pub extent: vk::Extent2D,
    /// Signaled when rendering to the image is complete
    pub present_semaphore: vk::Semaphore,
}

/// Swapchain wrapper with RAII cleanup
pub struct Swapchain {
    loader: SwapchainLoader,
    swapchain: vk::SwapchainKHR,
    images: Vec<vk::Image>,
    views: Vec<vk::ImageView>,
    present_semaphores: Vec<Semaphore>,
    extent: vk::Extent2D,
    present_mode: vk::PresentModeKHR,
    supported_modes: Vec<vk::PresentModeKHR>,
    acquired: AcquiredImage,
    image_layout: vk::ImageLayout,
    api: Arc<RenderApi>,
}

impl Swapchain {
    /// Create an empty swapchain. Call [`Swapchain::recreate`] to build the images.
    pub fn new(api: Arc<RenderApi>) -> KvfResult<Self> {
        let loader = SwapchainLoader::new(api.instance(), api.device());
        let all_modes = unsafe {
            api.surface_loader()
                .get_physical_device_surface_present_modes(api.gpu().device, api.surface())
                .map_err(KvfError::Api)?
        };
        let supported_modes = filter_modes(&all_modes);
        let present_mode = optimal_present_mode(&supported_modes);
        Ok(Self {
            loader,
            swapchain: vk::SwapchainKHR::null(),
            images: Vec::new(),
            views: Vec::new(),
            present_semaphores: Vec::new(),
            extent: vk::Extent2D::default(),
            present_mode,
            supported_modes,
            acquired: AcquiredImage::default(),
            image_layout: vk::ImageLayout::UNDEFINED,
            api,
        })
    }

    /// Rebuild the swapchain for `framebuffer`, optionally switching present mode.
    ///
    /// A zero-sized framebuffer (minimized window) leaves the swapchain untouched and returns `false`.
    pub fn recreate(&mut self, framebuffer: vk::Extent2D, present_mode: Option<vk::PresentModeKHR>) -> KvfResult<bool> {
        if framebuffer.width == 0 || framebuffer.height == 0 {
            return Ok(false);
        }
        let caps = unsafe {
            self.api
                .surface_loader()
                .get_physical_device_surface_capabilities(self.api.gpu().device, self.api.surface())
                .map_err(KvfError::Api)?
        };
        let extent = image_extent(&caps, framebuffer);
        if extent.width == 0 || extent.height == 0 {
            return Ok(false);
        }
        let count = image_count(&caps);
        check_image_count(count)?;
        if let Some(mode) = present_mode {
            self.present_mode = mode;
        }

        let format = self.api.surface_format();
        let create_info = vk::SwapchainCreateInfoKHR::builder()
            .surface(self.api.surface())
            .min_image_count(count)
            .image_format(format.format)
            .image_color_space(format.color_space)
            .image_extent(extent)
            .image_array_layers(1)
            .image_usage(IMAGE_USAGE)
            .image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            .pre_transform(caps.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(self.present_mode)
            .clipped(true)
            .old_swapchain(self.swapchain);

        self.api.wait_idle()?;
        let swapchain = unsafe { self.loader.create_swapchain(&create_info, None).map_err(KvfError::Api)? };
        self.destroy_images();
        self.swapchain = swapchain;
        self.extent = extent;

        self.images = unsafe { self.loader.get_swapchain_images(swapchain).map_err(KvfError::Api)? };
        for &image in &self.images {
            let view_info = vk::ImageViewCreateInfo::builder()
                .image(image)
                .view_type(vk::ImageViewType::TYPE_2D)
                .format(format.format)
                .subresource_range(vk::ImageSubresourceRange {
                    aspect_mask: vk::ImageAspectFlags::COLOR,
                    base_mip_level: 0,
                    level_count: 1,
                    base_array_layer: 0,
                    layer_count: 1,
                });
            let view = unsafe { self.api.device().create_image_view(&view_info, None).map_err(KvfError::Api)? };
            self.views.push(view);
            self.present_semaphores.push(Semaphore::new(self.api.device().clone())?);
        }
        self.acquired = AcquiredImage::default();
        self.image_layout = vk::ImageLayout::UNDEFINED;

        log::debug!(
            "Swapchain recreated: {:?}, {}x{}, {}",
            format.color_space,
            extent.width,
            extent.height,
            present_mode_str(self.present_mode)
        );
        Ok(true)
    }

    fn destroy_images(&mut self) {
        let old = std::mem::replace(&mut self.swapchain, vk::SwapchainKHR::null());
        unsafe {
            for view in self.views.drain(..) {
                self.api.device().destroy_image_view(view, None);
            }
            if old != vk::SwapchainKHR::null() {
                self.loader.destroy_swapchain(old, None);
            }
        }
        self.present_semaphores.clear();
        self.images.clear();
    }

    /// Acquire the next image, signaling `signal` when it is ready.
    ///
    /// Returns `false` if the swapchain is out of date and must be recreated.
    pub fn acquire_next_image(&mut self, signal: vk::Semaphore) -> KvfResult<bool> {
        if self.acquired.index().is_some() {
            return Ok(true);
        }
        let timeout = u64::try_from(FENCE_TIMEOUT.as_nanos()).unwrap_or(u64::MAX);
        let result = unsafe {
            self.loader
                .acquire_next_image(self.swapchain, timeout, signal, vk::Fence::null())
        };
        match result {
            Ok((index, _suboptimal)) => {
                self.acquired.acquire(index);
                self.image_layout = vk::ImageLayout::UNDEFINED;
                Ok(true)
            }
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => Ok(false),
            Err(err) => Err(KvfError::Api(err)),
        }
    }

    /// Present the held image on `queue`.
    ///
    /// Returns `false` if the swapchain is out of date or suboptimal.
    pub fn present(&mut self, queue: vk::Queue) -> KvfResult<bool> {
        let Some(index) = self.acquired.take() else {
            return Err(KvfError::invalid("present called without an acquired image"));
        };
        let wait = [self.present_semaphores[index as usize].handle()];
        let swapchains = [self.swapchain];
        let indices = [index];
        let present_info = vk::PresentInfoKHR::builder()
            .wait_semaphores(&wait)
            .swapchains(&swapchains)
            .image_indices(&indices);
        match unsafe { self.loader.queue_present(queue, &present_info) } {
            Ok(false) => Ok(true),
            Ok(true) | Err(vk::Result::ERROR_OUT_OF_DATE_KHR | vk::Result::SUBOPTIMAL_KHR) => Ok(false),
            Err(err) => Err(KvfError::Api(err)),
        }
    }

    /// The acquired image, if any
    pub fn backbuffer(&self) -> Option<Backbuffer> {
        let index = self.acquired.index()? as usize;
        Some(Backbuffer {
            image: self.images[index],
            view: self.views[index],
            extent: self.extent,
            present_semaphore: self.present_semaphores[index].handle(),
        })
    }

    /// Record a layout transition of the acquired image to `layout`
    pub fn transition_backbuffer(&mut self, cmd: vk::CommandBuffer, layout: vk::ImageLayout) -> KvfResult<()> {
        let backbuffer = self
            .backbuffer()
            .ok_or_else(|| KvfError::invalid("no acquired swapchain image"))?;
        let (src_access, src_stage, dst_access, dst_stage) = backbuffer_transition(self.image_layout, layout);
        let barrier = vk::ImageMemoryBarrier2 {
            src_stage_mask: src_stage,
            src_access_mask: src_access,
            dst_stage_mask: dst_stage,
            dst_access_mask: dst_access,
            old_layout: self.image_layout,
            new_layout: layout,
            image: backbuffer.image,
            ..self.api.image_barrier(vk::ImageAspectFlags::COLOR)
        };
        let barriers = [barrier];
        let dependency = vk::DependencyInfo::builder().image_memory_barriers(&barriers);
        unsafe { self.api.device().cmd_pipeline_barrier2(cmd, &dependency) };
        self.image_layout = layout;
        Ok(())
    }

    /// Give up the held image after a failed submit. [`Swapchain::is_stale`] reports `true`
    /// until the next [`Swapchain::recreate`].
    pub fn abandon_image(&mut self) {
        self.acquired.abandon();
    }

    /// Whether the swapchain must be recreated before acquiring again
    pub fn is_stale(&self) -> bool {
        self.acquired.is_stale()
    }

    /// Current image extent
    pub fn extent(&self) -> vk::Extent2D {
        self.extent
    }

    /// Current present mode
    pub fn present_mode(&self) -> vk::PresentModeKHR {
        self.present_mode
    }

    /// Present modes supported by the surface
    pub fn supported_present_modes(&self) -> &[vk::PresentModeKHR] {
        &self.supported_modes
    }

    /// Number of swapchain images
    pub fn image_count(&self) -> usize {
        self.images.len()
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        self.destroy_images();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn caps(min: u32, max: u32) -> vk::SurfaceCapabilitiesKHR {
        vk::SurfaceCapabilitiesKHR {
            min_image_count: min,
            max_image_count: max,
            current_extent: vk::Extent2D {
                width: u32::MAX,
                height: u32::MAX,
            },
            min_image_extent: vk::Extent2D { width: 16, height: 16 },
            max_image_extent: vk::Extent2D {
                width: 1024,
                height: 768,
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_image_extent_uses_current_extent() {
        let mut caps = caps(2, 8);
        caps.current_extent = vk::Extent2D { width: 640, height: 480 };
        let extent = image_extent(&caps, vk::Extent2D { width: 10, height: 10 });
        assert_eq!((extent.width, extent.height), (640, 480));
    }

    #[test]
    fn test_image_extent_clamps_framebuffer() {
        let extent = image_extent(&caps(2, 8), vk::Extent2D { width: 4000, height: 4 });
        assert_eq!((extent.width, extent.height), (1024, 16));
    }

    #[test]
    fn test_image_count() {
        let desired = RESOURCE_BUFFERING as u32 + 1;
        assert_eq!(image_count(&caps(1, 8)), desired);
        assert_eq!(image_count(&caps(1, 0)), desired);
        assert_eq!(image_count(&caps(6, 0)), 6);
        assert_eq!(image_count(&caps(6, 8)), 6);
        assert_eq!(image_count(&caps(1, 2)), 2);
    }

    #[test]
    fn test_image_count_must_exceed_buffering() {
        let buffering = RESOURCE_BUFFERING as u32;
        assert!(matches!(
            check_image_count(buffering),
            Err(KvfError::InsufficientSwapchainImages { count, .. }) if count == buffering
        ));
        assert!(check_image_count(1).is_err());
        assert!(check_image_count(buffering + 1).is_ok());
        // A surface capped at the buffering count cannot satisfy the request.
        assert!(check_image_count(image_count(&caps(1, buffering))).is_err());
    }

    #[test]
    fn test_acquired_image_present_cycle() {
        let mut acquired = AcquiredImage::default();
        assert_eq!(acquired.index(), None);
        acquired.acquire(2);
        assert_eq!(acquired.index(), Some(2));
        assert_eq!(acquired.take(), Some(2));
        assert_eq!(acquired.take(), None);
        assert!(!acquired.is_stale());
    }

    #[test]
    fn test_abandoned_image_is_not_reused() {
        let mut acquired = AcquiredImage::default();
        acquired.acquire(1);
        acquired.abandon();
        assert_eq!(acquired.index(), None);
        assert!(acquired.is_stale());
        assert_eq!(AcquiredImage::default(), AcquiredImage { index: None, stale: false });
    }
}
