//! Physical device discovery and selection

use std::ffi::CStr;

use ash::extensions::khr::{Surface, Swapchain as SwapchainLoader};
use ash::{vk, Instance};

use crate::error::{KvfError, KvfResult};

/// Minimum Vulkan version a GPU must report
pub const VK_API_VERSION: u32 = vk::API_VERSION_1_3;

const QUEUE_FLAGS: vk::QueueFlags = vk::QueueFlags::from_raw(vk::QueueFlags::GRAPHICS.as_raw() | vk::QueueFlags::TRANSFER.as_raw());

/// A physical device with its cached properties and features
#[derive(Debug, Clone, Copy)]
pub struct Gpu {
    /// Physical device handle
    pub device: vk::PhysicalDevice,
    /// Device properties and limits
    pub properties: vk::PhysicalDeviceProperties,
    /// Supported device features
    pub features: vk::PhysicalDeviceFeatures,
}

impl Gpu {
    /// Device name as reported by the driver
    pub fn name(&self) -> String {
        // SAFETY: drivers return a NUL terminated name within the fixed size array.
        unsafe { CStr::from_ptr(self.properties.device_name.as_ptr()) }
            .to_string_lossy()
            .into_owned()
    }
}

/// Chooses which of the viable GPUs to render with
pub trait GpuSelector {
    /// Pick one of `gpus`, which is never empty
    fn select<'a>(&self, gpus: &'a [Gpu]) -> &'a Gpu {
        gpus.iter()
            .find(|gpu| gpu.properties.device_type == vk::PhysicalDeviceType::DISCRETE_GPU)
            .unwrap_or(&gpus[0])
    }
}

/// Prefers the first discrete GPU, else the first GPU
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultGpuSelector;

impl GpuSelector for DefaultGpuSelector {}

/// First queue family that supports both graphics and transfer
pub fn find_queue_family(families: &[vk::QueueFamilyProperties]) -> Option<u32> {
    families
        .iter()
        .position(|family| family.queue_flags.contains(QUEUE_FLAGS))
        .map(|index| index as u32)
}

/// Whether the device extension list contains `VK_KHR_swapchain`
pub fn has_required_extensions(available: &[vk::ExtensionProperties]) -> bool {
    let swapchain = SwapchainLoader::name();
    available.iter().any(|props| {
        // SAFETY: extension names are NUL terminated fixed size arrays.
        (unsafe { CStr::from_ptr(props.extension_name.as_ptr()) }) == swapchain
    })
}

/// GPUs that can render to a surface, paired with the queue family to use
#[derive(Debug, Default)]
pub struct GpuList {
    /// Viable GPUs
    pub gpus: Vec<Gpu>,
    /// Queue family for each entry of `gpus`
    pub queue_families: Vec<u32>,
}

impl GpuList {
    /// Enumerate GPUs that support Vulkan 1.3, swapchains, and presenting to `surface`
    pub fn viable(instance: &Instance, surface_loader: &Surface, surface: vk::SurfaceKHR) -> KvfResult<Self> {
        let devices = unsafe { instance.enumerate_physical_devices().map_err(KvfError::Api)? };
        let mut ret = Self::default();
        for device in devices {
            let properties = unsafe { instance.get_physical_device_properties(device) };
            if properties.api_version < VK_API_VERSION {
                continue;
            }
            let extensions = unsafe {
                instance
                    .enumerate_device_extension_properties(device)
                    .map_err(KvfError::Api)?
            };
            if !has_required_extensions(&extensions) {
                continue;
            }
            let families = unsafe { instance.get_physical_device_queue_family_properties(device) };
            let Some(queue_family) = find_queue_family(&families) else {
                continue;
            };
            let supported = unsafe {
                surface_loader
                    .get_physical_device_surface_support(device, queue_family, surface)
                    .map_err(KvfError::Api)?
            };
            if !supported {
                continue;
            }
            let features = unsafe { instance.get_physical_device_features(device) };
            ret.gpus.push(Gpu {
                device,
                properties,
                features,
            });
            ret.queue_families.push(queue_family);
        }
        Ok(ret)
    }

    /// Let `selector` choose a GPU, returning it with its queue family
    pub fn select(&self, selector: &dyn GpuSelector) -> KvfResult<(Gpu, u32)> {
        if self.gpus.is_empty() {
            return Err(KvfError::NoViableGpu);
        }
        let selected = selector.select(&self.gpus);
        self.gpus
            .iter()
            .zip(&self.queue_families)
            .find(|(gpu, _)| gpu.device == selected.device)
            .map(|(gpu, family)| (*gpu, *family))
            .ok_or_else(|| KvfError::invalid("GPU selector returned a GPU outside the viable list"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk::Handle;

    fn gpu(raw: u64, device_type: vk::PhysicalDeviceType) -> Gpu {
        Gpu {
            device: vk::PhysicalDevice::from_raw(raw),
            properties: vk::PhysicalDeviceProperties {
                device_type,
                ..Default::default()
            },
            features: vk::PhysicalDeviceFeatures::default(),
        }
    }

    #[test]
    fn test_default_selector_prefers_discrete() {
        let gpus = [
            gpu(1, vk::PhysicalDeviceType::INTEGRATED_GPU),
            gpu(2, vk::PhysicalDeviceType::DISCRETE_GPU),
            gpu(3, vk::PhysicalDeviceType::DISCRETE_GPU),
        ];
        assert_eq!(DefaultGpuSelector.select(&gpus).device, gpus[1].device);
    }

    #[test]
    fn test_default_selector_falls_back_to_first() {
        let gpus = [gpu(7, vk::PhysicalDeviceType::CPU), gpu(8, vk::PhysicalDeviceType::INTEGRATED_GPU)];
        assert_eq!(DefaultGpuSelector.select(&gpus).device, gpus[0].device);
    }

    #[test]
    fn test_list_select_returns_matching_queue_family() {
        let list = GpuList {
            gpus: vec![gpu(1, vk::PhysicalDeviceType::INTEGRATED_GPU), gpu(2, vk::PhysicalDeviceType::DISCRETE_GPU)],
            queue_families: vec![0, 3],
        };
        let (selected, family) = list.select(&DefaultGpuSelector).unwrap();
        assert_eq!(selected.device, vk::PhysicalDevice::from_raw(2));
        assert_eq!(family, 3);

        assert!(matches!(GpuList::default().select(&DefaultGpuSelector), Err(KvfError::NoViableGpu)));
    }

    #[test]
    fn test_find_queue_family_requires_graphics_and_transfer() {
        let family = |queue_flags| vk::QueueFamilyProperties {
            queue_flags,
            ..Default::default()
        };
        let families = [
            family(vk::QueueFlags::TRANSFER),
            family(vk::QueueFlags::GRAPHICS),
            family(vk::QueueFlags::GRAPHICS | vk::QueueFlags::COMPUTE | vk::QueueFlags::TRANSFER),
        ];
        assert_eq!(find_queue_family(&families), Some(2));
        assert_eq!(find_queue_family(&families[..2]), None);
    }

    #[test]
    fn test_has_required_extensions() {
        let mut props = vk::ExtensionProperties::default();
        for (dst, src) in props.extension_name.iter_mut().zip(b"VK_KHR_swapchain") {
            *dst = *src as std::ffi::c_char;
        }
        assert!(has_required_extensions(&[props]));
        assert!(!has_required_extensions(&[vk::ExtensionProperties::default()]));
    }
}
