//! Shared Vulkan context: instance, surface, logical device, queue and allocator
//!
//! Every GPU resource holds an `Arc<RenderApi>`, so the context outlives all of them.
//! Fields are declared in destruction order: allocator, device, surface, instance.

use std::ffi::{CStr, CString};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use ash::extensions::ext::{DebugUtils, ShaderObject};
use ash::extensions::khr::{Surface, Swapchain as SwapchainLoader};
use ash::{vk, Device, Entry, Instance};

use super::buffered::FrameIndex;
use super::device::RenderDeviceFlags;
use super::gpu::{DefaultGpuSelector, Gpu, GpuList, GpuSelector, VK_API_VERSION};
use super::present::compatible_surface_format;
use crate::error::{KvfError, KvfResult};
use crate::window::Window;

const VALIDATION_LAYER: &CStr = unsafe { CStr::from_bytes_with_nul_unchecked(b"VK_LAYER_KHRONOS_validation\0") };
const SHADER_OBJECT_LAYER: &CStr = unsafe { CStr::from_bytes_with_nul_unchecked(b"VK_LAYER_KHRONOS_shader_object\0") };

const DEPTH_FORMATS: [vk::Format; 3] = [
    vk::Format::D32_SFLOAT,
    vk::Format::D32_SFLOAT_S8_UINT,
    vk::Format::D24_UNORM_S8_UINT,
];

/// Vulkan entry and instance, plus the debug messenger in debug builds
pub struct VulkanInstance {
    entry: Entry,
    instance: Instance,
    loader_version: u32,
    #[cfg(debug_assertions)]
    debug: Option<(DebugUtils, vk::DebugUtilsMessengerEXT)>,
}

impl VulkanInstance {
    fn new(window: &Window, flags: RenderDeviceFlags) -> KvfResult<Self> {
        let entry = unsafe { Entry::load() }.map_err(|e| KvfError::Loading(e.to_string()))?;
        let loader_version = entry
            .try_enumerate_instance_version()
            .map_err(KvfError::Api)?
            .unwrap_or(vk::API_VERSION_1_0);
        log::info!(
            "Vulkan loader version: {}.{}.{}",
            vk::api_version_major(loader_version),
            vk::api_version_minor(loader_version),
            vk::api_version_patch(loader_version)
        );
        if loader_version < VK_API_VERSION {
            return Err(KvfError::InitializationFailed("Vulkan 1.3 loader required".to_string()));
        }

        let app_name = CString::new("kvf").map_err(|e| KvfError::InitializationFailed(e.to_string()))?;
        let app_info = vk::ApplicationInfo::builder()
            .application_name(&app_name)
            .application_version(vk::make_api_version(0, 1, 0, 0))
            .engine_name(&app_name)
            .engine_version(vk::make_api_version(0, 1, 0, 0))
            .api_version(VK_API_VERSION);

        let cstr_extensions = window
            .required_instance_extensions()?
            .into_iter()
            .map(CString::new)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| KvfError::InitializationFailed(e.to_string()))?;
        let mut extensions: Vec<*const std::ffi::c_char> = cstr_extensions.iter().map(|ext| ext.as_ptr()).collect();

        let available_layers = entry.enumerate_instance_layer_properties().map_err(KvfError::Api)?;
        let has_layer = |name: &CStr| {
            available_layers
                .iter()
                .any(|layer| unsafe { CStr::from_ptr(layer.layer_name.as_ptr()) } == name)
        };
        let mut layers = Vec::new();
        if flags.contains(RenderDeviceFlags::SHADER_OBJECT_LAYER) {
            if has_layer(SHADER_OBJECT_LAYER) {
                layers.push(SHADER_OBJECT_LAYER.as_ptr());
            } else {
                log::warn!("{} requested but not available", SHADER_OBJECT_LAYER.to_string_lossy());
            }
        }

        #[cfg(debug_assertions)]
        let debug_utils_available = {
            let available = entry.enumerate_instance_extension_properties(None).map_err(KvfError::Api)?;
            available
                .iter()
                .any(|ext| unsafe { CStr::from_ptr(ext.extension_name.as_ptr()) } == DebugUtils::name())
        };
        #[cfg(debug_assertions)]
        {
            if debug_utils_available {
                extensions.push(DebugUtils::name().as_ptr());
            }
            if has_layer(VALIDATION_LAYER) {
                layers.push(VALIDATION_LAYER.as_ptr());
            }
        }

        let create_info = vk::InstanceCreateInfo::builder()
            .application_info(&app_info)
            .enabled_extension_names(&extensions)
            .enabled_layer_names(&layers);

        let instance = unsafe { entry.create_instance(&create_info, None).map_err(KvfError::Api)? };

        #[cfg(debug_assertions)]
        let debug = if debug_utils_available {
            let debug_utils = DebugUtils::new(&entry, &instance);
            match Self::setup_debug_messenger(&debug_utils) {
                Ok(messenger) => Some((debug_utils, messenger)),
                Err(err) => {
                    log::warn!("Failed to create debug messenger: {err}");
                    None
                }
            }
        } else {
            None
        };

        Ok(Self {
            entry,
            instance,
            loader_version,
            #[cfg(debug_assertions)]
            debug,
        })
    }

    #[cfg(debug_assertions)]
    fn setup_debug_messenger(debug_utils: &DebugUtils) -> KvfResult<vk::DebugUtilsMessengerEXT> {
        let create_info = vk::DebugUtilsMessengerCreateInfoEXT::builder()
            .message_severity(
                vk::DebugUtilsMessageSeverityFlagsEXT::WARNING | vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            )
            .message_type(
                vk::DebugUtilsMessageTypeFlagsEXT::GENERAL
                    | vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION
                    | vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE,
            )
            .pfn_user_callback(Some(debug_callback));

        unsafe { debug_utils.create_debug_utils_messenger(&create_info, None).map_err(KvfError::Api) }
    }
}

impl Drop for VulkanInstance {
    fn drop(&mut self) {
        unsafe {
            #[cfg(debug_assertions)]
            if let Some((debug_utils, messenger)) = &self.debug {
                debug_utils.destroy_debug_utils_messenger(*messenger, None);
            }
            self.instance.destroy_instance(None);
        }
    }
}

#[cfg(debug_assertions)]
unsafe extern "system" fn debug_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_type: vk::DebugUtilsMessageTypeFlagsEXT,
    callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT,
    _user_data: *mut std::ffi::c_void,
) -> vk::Bool32 {
    let message = CStr::from_ptr((*callback_data).p_message).to_string_lossy();

    if message_severity >= vk::DebugUtilsMessageSeverityFlagsEXT::ERROR {
        log::error!(target: "vulkan", "{message_type:?} - {message}");
    } else if message_severity >= vk::DebugUtilsMessageSeverityFlagsEXT::WARNING {
        log::warn!(target: "vulkan", "{message_type:?} - {message}");
    } else {
        log::debug!(target: "vulkan", "{message_type:?} - {message}");
    }

    vk::FALSE
}

struct SurfaceHandle {
    loader: Surface,
    surface: vk::SurfaceKHR,
}

impl Drop for SurfaceHandle {
    fn drop(&mut self) {
        unsafe { self.loader.destroy_surface(self.surface, None) };
    }
}

struct DeviceHandle {
    device: Device,
}

impl Drop for DeviceHandle {
    fn drop(&mut self) {
        unsafe { self.device.destroy_device(None) };
    }
}

/// Sampler with RAII cleanup
pub struct Sampler {
    sampler: vk::Sampler,
    api: Arc<RenderApi>,
}

impl Sampler {
    /// Get the sampler handle
    pub fn handle(&self) -> vk::Sampler {
        self.sampler
    }
}

impl Drop for Sampler {
    fn drop(&mut self) {
        unsafe { self.api.device().destroy_sampler(self.sampler, None) };
    }
}

/// Vulkan context shared by every kvf resource
pub struct RenderApi {
    allocator: vk_mem::Allocator,
    device: DeviceHandle,
    surface: SurfaceHandle,
    instance: VulkanInstance,
    gpu: Gpu,
    queue_family: u32,
    queue: Mutex<vk::Queue>,
    surface_format: vk::SurfaceFormatKHR,
    depth_format: vk::Format,
    frame_index: AtomicUsize,
    flags: RenderDeviceFlags,
    shader_object: Option<ShaderObject>,
}

impl RenderApi {
    /// Create instance, surface and device for `window`, picking a GPU with `selector`
    pub fn new(window: &Window, flags: RenderDeviceFlags, selector: Option<&dyn GpuSelector>) -> KvfResult<Self> {
        let instance = VulkanInstance::new(window, flags)?;

        let surface = SurfaceHandle {
            loader: Surface::new(&instance.entry, &instance.instance),
            surface: window.create_surface(instance.instance.handle())?,
        };

        let (gpu, queue_family) = GpuList::viable(&instance.instance, &surface.loader, surface.surface)?
            .select(selector.unwrap_or(&DefaultGpuSelector))?;
        log::info!("Using GPU: {}", gpu.name());

        let device = DeviceHandle {
            device: create_device(&instance.instance, &gpu, queue_family, flags)?,
        };
        let queue = unsafe { device.device.get_device_queue(queue_family, 0) };

        let surface_formats = unsafe {
            surface
                .loader
                .get_physical_device_surface_formats(gpu.device, surface.surface)
                .map_err(KvfError::Api)?
        };
        let linear = flags.contains(RenderDeviceFlags::LINEAR_BACKBUFFER);
        let surface_format = compatible_surface_format(&surface_formats, linear);
        if surface_format.format == vk::Format::UNDEFINED {
            return Err(KvfError::InitializationFailed("No compatible surface format".to_string()));
        }
        let depth_format = optimal_depth_format(&instance.instance, gpu.device)?;

        let allocator = vk_mem::Allocator::new(vk_mem::AllocatorCreateInfo::new(
            &instance.instance,
            &device.device,
            gpu.device,
        ))
        .map_err(|e| KvfError::InitializationFailed(format!("Failed to create VMA allocator: {e}")))?;

        let shader_object = flags
            .contains(RenderDeviceFlags::SHADER_OBJECT_FEATURE)
            .then(|| ShaderObject::new(&instance.instance, &device.device));

        Ok(Self {
            allocator,
            device,
            surface,
            instance,
            gpu,
            queue_family,
            queue: Mutex::new(queue),
            surface_format,
            depth_format,
            frame_index: AtomicUsize::new(0),
            flags,
            shader_object,
        })
    }

    /// Vulkan entry points
    pub fn entry(&self) -> &Entry {
        &self.instance.entry
    }

    /// Vulkan instance
    pub fn instance(&self) -> &Instance {
        &self.instance.instance
    }

    /// Logical device
    pub fn device(&self) -> &Device {
        &self.device.device
    }

    /// VMA allocator
    pub fn allocator(&self) -> &vk_mem::Allocator {
        &self.allocator
    }

    /// Surface extension loader
    pub fn surface_loader(&self) -> &Surface {
        &self.surface.loader
    }

    /// Window surface
    pub fn surface(&self) -> vk::SurfaceKHR {
        self.surface.surface
    }

    /// Selected GPU
    pub fn gpu(&self) -> &Gpu {
        &self.gpu
    }

    /// Queue family of the graphics queue
    pub fn queue_family(&self) -> u32 {
        self.queue_family
    }

    /// Swapchain format and colour space
    pub fn surface_format(&self) -> vk::SurfaceFormatKHR {
        self.surface_format
    }

    /// Swapchain image format
    pub fn swapchain_format(&self) -> vk::Format {
        self.surface_format.format
    }

    /// Depth attachment format
    pub fn depth_format(&self) -> vk::Format {
        self.depth_format
    }

    /// Flags the device was created with
    pub fn flags(&self) -> RenderDeviceFlags {
        self.flags
    }

    /// Vulkan version reported by the loader
    pub fn loader_api_version(&self) -> u32 {
        self.instance.loader_version
    }

    /// `VK_EXT_shader_object` entry points, if enabled
    pub fn shader_object(&self) -> Option<&ShaderObject> {
        self.shader_object.as_ref()
    }

    /// Frame currently being recorded
    pub fn frame_index(&self) -> FrameIndex {
        FrameIndex(self.frame_index.load(Ordering::Acquire))
    }

    pub(crate) fn advance_frame(&self) {
        let next = self.frame_index().next();
        self.frame_index.store(next.0, Ordering::Release);
    }

    /// Barrier template on the graphics queue family covering one mip level and one layer
    pub fn image_barrier(&self, aspect: vk::ImageAspectFlags) -> vk::ImageMemoryBarrier2 {
        vk::ImageMemoryBarrier2 {
            src_queue_family_index: self.queue_family,
            dst_queue_family_index: self.queue_family,
            subresource_range: vk::ImageSubresourceRange {
                aspect_mask: aspect,
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            },
            ..Default::default()
        }
    }

    /// Create a sampler
    pub fn create_sampler(self: &Arc<Self>, info: &vk::SamplerCreateInfo) -> KvfResult<Sampler> {
        let sampler = unsafe { self.device().create_sampler(info, None).map_err(KvfError::Api)? };
        Ok(Sampler {
            sampler,
            api: Arc::clone(self),
        })
    }

    /// Lock the graphics queue for exclusive use
    pub fn lock_queue(&self) -> MutexGuard<'_, vk::Queue> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Submit to the graphics queue
    pub fn queue_submit(&self, submits: &[vk::SubmitInfo2], fence: vk::Fence) -> KvfResult<()> {
        let queue = self.lock_queue();
        unsafe { self.device().queue_submit2(*queue, submits, fence).map_err(KvfError::Api) }
    }

    /// Block until the device is idle
    pub fn wait_idle(&self) -> KvfResult<()> {
        unsafe { self.device().device_wait_idle().map_err(KvfError::Api) }
    }
}

impl Drop for RenderApi {
    fn drop(&mut self) {
        if let Err(err) = self.wait_idle() {
            log::error!("Failed to wait for device idle: {err}");
        }
    }
}

fn create_device(instance: &Instance, gpu: &Gpu, queue_family: u32, flags: RenderDeviceFlags) -> KvfResult<Device> {
    let priorities = [1.0];
    let queue_infos = [vk::DeviceQueueCreateInfo::builder()
        .queue_family_index(queue_family)
        .queue_priorities(&priorities)
        .build()];

    let features = vk::PhysicalDeviceFeatures {
        fill_mode_non_solid: gpu.features.fill_mode_non_solid,
        wide_lines: gpu.features.wide_lines,
        sampler_anisotropy: gpu.features.sampler_anisotropy,
        sample_rate_shading: gpu.features.sample_rate_shading,
        ..Default::default()
    };
    let mut vk13_features = vk::PhysicalDeviceVulkan13Features::builder()
        .dynamic_rendering(true)
        .synchronization2(true);
    let mut shader_object_features = vk::PhysicalDeviceShaderObjectFeaturesEXT::builder().shader_object(true);

    let mut extensions = vec![SwapchainLoader::name().as_ptr()];
    let use_shader_object = flags.contains(RenderDeviceFlags::SHADER_OBJECT_FEATURE);
    if use_shader_object {
        extensions.push(ShaderObject::name().as_ptr());
    }

    let mut create_info = vk::DeviceCreateInfo::builder()
        .queue_create_infos(&queue_infos)
        .enabled_extension_names(&extensions)
        .enabled_features(&features)
        .push_next(&mut vk13_features);
    if use_shader_object {
        create_info = create_info.push_next(&mut shader_object_features);
    }

    unsafe { instance.create_device(gpu.device, &create_info, None).map_err(KvfError::Api) }
}

fn optimal_depth_format(instance: &Instance, gpu: vk::PhysicalDevice) -> KvfResult<vk::Format> {
    DEPTH_FORMATS
        .into_iter()
        .find(|format| {
            let props = unsafe { instance.get_physical_device_format_properties(gpu, *format) };
            props
                .optimal_tiling_features
                .contains(vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT)
        })
        .ok_or_else(|| KvfError::InitializationFailed("No supported depth format".to_string()))
}
