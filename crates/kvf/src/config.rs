//! Configuration system
//!
//! [`RenderDeviceConfig`] is the serializable face of [`RenderDeviceCreateInfo`]: it can be
//! kept in a `.toml` or `.ron` file next to the executable and converted at startup.

use std::path::Path;

use ash::vk;
pub use serde::{Deserialize, Serialize};

use crate::render::{RenderDeviceCreateInfo, RenderDeviceFlags};

/// Configuration trait
pub trait Config: Serialize + for<'de> Deserialize<'de> + Default {
    /// Load configuration from file
    fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let format = Format::of(path)?;
        let contents = std::fs::read_to_string(path)?;

        match format {
            Format::Toml => toml::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string())),
            Format::Ron => ron::from_str(&contents).map_err(|e| ConfigError::Parse(e.to_string())),
        }
    }

    /// Save configuration to file
    fn save_to_file(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let contents = match Format::of(path)? {
            Format::Toml => {
                toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?
            }
            Format::Ron => ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
                .map_err(|e| ConfigError::Serialize(e.to_string()))?,
        };

        std::fs::write(path, contents).map_err(ConfigError::Io)
    }
}

enum Format {
    Toml,
    Ron,
}

impl Format {
    fn of(path: &Path) -> Result<Self, ConfigError> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Ok(Self::Toml),
            Some("ron") => Ok(Self::Ron),
            _ => Err(ConfigError::UnsupportedFormat(path.display().to_string())),
        }
    }
}

/// Configuration errors
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialize(String),

    /// Unsupported format
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),
}

/// Present mode names usable in config files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PresentModePreference {
    /// Vsync, never tears
    Fifo,
    /// Vsync, tears when a frame is late
    FifoRelaxed,
    /// Low latency, never tears
    Mailbox,
    /// No vsync
    Immediate,
}

impl PresentModePreference {
    /// The matching Vulkan present mode
    pub fn to_vk(self) -> vk::PresentModeKHR {
        match self {
            Self::Fifo => vk::PresentModeKHR::FIFO,
            Self::FifoRelaxed => vk::PresentModeKHR::FIFO_RELAXED,
            Self::Mailbox => vk::PresentModeKHR::MAILBOX,
            Self::Immediate => vk::PresentModeKHR::IMMEDIATE,
        }
    }
}

/// Serializable render device settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderDeviceConfig {
    /// Use a UNORM backbuffer instead of sRGB
    pub linear_backbuffer: bool,
    /// Enable `VK_EXT_shader_object`
    pub shader_object_feature: bool,
    /// Enable the shader object emulation layer
    pub shader_object_layer: bool,
    /// Descriptor sets per pool
    pub sets_per_pool: u32,
    /// Descriptors of each default type per pool
    pub descriptors_per_type: u32,
    /// Present mode to use when supported
    pub present_mode: Option<PresentModePreference>,
    /// Draw the Dear ImGui overlay
    pub render_imgui: bool,
}

impl Default for RenderDeviceConfig {
    fn default() -> Self {
        Self {
            linear_backbuffer: false,
            shader_object_feature: false,
            shader_object_layer: false,
            sets_per_pool: RenderDeviceCreateInfo::SETS_PER_POOL,
            descriptors_per_type: RenderDeviceCreateInfo::DESCRIPTORS_PER_TYPE,
            present_mode: None,
            render_imgui: true,
        }
    }
}

impl Config for RenderDeviceConfig {}

impl RenderDeviceConfig {
    /// Flags described by this config
    pub fn flags(&self) -> RenderDeviceFlags {
        let mut flags = RenderDeviceFlags::empty();
        flags.set(RenderDeviceFlags::LINEAR_BACKBUFFER, self.linear_backbuffer);
        flags.set(RenderDeviceFlags::SHADER_OBJECT_FEATURE, self.shader_object_feature);
        flags.set(RenderDeviceFlags::SHADER_OBJECT_LAYER, self.shader_object_layer);
        flags
    }

    /// Build create info for [`RenderDevice::new`](crate::render::RenderDevice::new)
    pub fn create_info(&self) -> RenderDeviceCreateInfo {
        let custom_pool_sizes = if self.descriptors_per_type == RenderDeviceCreateInfo::DESCRIPTORS_PER_TYPE {
            Vec::new()
        } else {
            RenderDeviceCreateInfo::default_pool_sizes(self.descriptors_per_type)
        };
        RenderDeviceCreateInfo {
            flags: self.flags(),
            custom_pool_sizes,
            sets_per_pool: self.sets_per_pool.max(1),
            gpu_selector: None,
            present_mode: self.present_mode.map(PresentModePreference::to_vk),
            render_imgui: self.render_imgui,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_matches_create_info_defaults() {
        let info = RenderDeviceConfig::default().create_info();
        assert!(info.flags.is_empty());
        assert_eq!(info.sets_per_pool, 64);
        assert!(info.custom_pool_sizes.is_empty());
        assert!(info.present_mode.is_none());
        assert!(info.render_imgui);
    }

    #[test]
    fn test_flags_from_bools() {
        let config = RenderDeviceConfig {
            linear_backbuffer: true,
            shader_object_layer: true,
            ..Default::default()
        };
        let flags = config.flags();
        assert!(flags.contains(RenderDeviceFlags::LINEAR_BACKBUFFER));
        assert!(flags.contains(RenderDeviceFlags::SHADER_OBJECT_LAYER));
        assert!(!flags.contains(RenderDeviceFlags::SHADER_OBJECT_FEATURE));
    }

    #[test]
    fn test_custom_descriptor_count_produces_pool_sizes() {
        let config = RenderDeviceConfig {
            descriptors_per_type: 16,
            sets_per_pool: 0,
            ..Default::default()
        };
        let info = config.create_info();
        assert_eq!(info.custom_pool_sizes.len(), 3);
        assert!(info.custom_pool_sizes.iter().all(|size| size.descriptor_count == 16));
        assert_eq!(info.sets_per_pool, 1);
    }

    #[test]
    fn test_toml_round_trip_through_file() {
        let path = std::env::temp_dir().join(format!("kvf-config-{}.toml", std::process::id()));
        let config = RenderDeviceConfig {
            present_mode: Some(PresentModePreference::Mailbox),
            render_imgui: false,
            ..Default::default()
        };
        config.save_to_file(&path).unwrap();
        let loaded = RenderDeviceConfig::load_from_file(&path).unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(loaded, config);
        assert_eq!(loaded.create_info().present_mode, Some(vk::PresentModeKHR::MAILBOX));
    }

    #[test]
    fn test_partial_ron_uses_defaults() {
        let config: RenderDeviceConfig = ron::from_str("(linear_backbuffer: true)").unwrap();
        assert!(config.linear_backbuffer);
        assert_eq!(config.sets_per_pool, RenderDeviceCreateInfo::SETS_PER_POOL);
    }

    #[test]
    fn test_unsupported_extension() {
        let result = RenderDeviceConfig::load_from_file("settings.json");
        assert!(matches!(result, Err(ConfigError::UnsupportedFormat(_))));
    }
}
