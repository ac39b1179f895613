//! Buffers, images and textures backed by the VMA allocator

pub mod buffer;
pub mod image;
pub mod texture;

pub use buffer::{Buffer, BufferCreateInfo, BufferType};
pub use self::image::{Image, ImageCreateInfo, ImageFlags};
pub use texture::{Texture, TextureCreateInfo};
