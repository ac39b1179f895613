//! Present mode and surface format policy

use ash::vk;

/// Present modes kvf knows how to use, in display order
pub const PRESENT_MODES: [vk::PresentModeKHR; 4] = [
    vk::PresentModeKHR::FIFO,
    vk::PresentModeKHR::FIFO_RELAXED,
    vk::PresentModeKHR::MAILBOX,
    vk::PresentModeKHR::IMMEDIATE,
];

const SRGB_FORMATS: [vk::Format; 3] = [
    vk::Format::R8G8B8A8_SRGB,
    vk::Format::B8G8R8A8_SRGB,
    vk::Format::A8B8G8R8_SRGB_PACK32,
];

const LINEAR_FORMATS: [vk::Format; 3] = [
    vk::Format::R8G8B8A8_UNORM,
    vk::Format::B8G8R8A8_UNORM,
    vk::Format::A8B8G8R8_UNORM_PACK32,
];

/// Keep the modes of `all` that appear in [`PRESENT_MODES`], in input order
pub fn filter_modes(all: &[vk::PresentModeKHR]) -> Vec<vk::PresentModeKHR> {
    all.iter().copied().filter(|mode| PRESENT_MODES.contains(mode)).collect()
}

/// Preferred mode among `modes`: FIFO relaxed, then FIFO, then mailbox
pub fn optimal_present_mode(modes: &[vk::PresentModeKHR]) -> vk::PresentModeKHR {
    [
        vk::PresentModeKHR::FIFO_RELAXED,
        vk::PresentModeKHR::FIFO,
        vk::PresentModeKHR::MAILBOX,
    ]
    .into_iter()
    .find(|desired| modes.contains(desired))
    .unwrap_or(vk::PresentModeKHR::FIFO)
}

/// First preferred format in `supported` with an sRGB non-linear colour space.
///
/// Returns a format of `UNDEFINED` if none match.
pub fn compatible_surface_format(supported: &[vk::SurfaceFormatKHR], linear: bool) -> vk::SurfaceFormatKHR {
    let candidates = if linear { &LINEAR_FORMATS } else { &SRGB_FORMATS };
    candidates
        .iter()
        .find_map(|format| {
            supported
                .iter()
                .find(|surface| surface.format == *format && surface.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR)
        })
        .copied()
        .unwrap_or_default()
}

/// Whether `format` stores sRGB encoded colour
pub fn is_srgb(format: vk::Format) -> bool {
    matches!(
        format,
        vk::Format::R8_SRGB
            | vk::Format::R8G8_SRGB
            | vk::Format::R8G8B8_SRGB
            | vk::Format::B8G8R8_SRGB
            | vk::Format::R8G8B8A8_SRGB
            | vk::Format::B8G8R8A8_SRGB
            | vk::Format::A8B8G8R8_SRGB_PACK32
    )
}

/// Human readable present mode name
pub fn present_mode_str(mode: vk::PresentModeKHR) -> &'static str {
    match mode {
        vk::PresentModeKHR::FIFO => "FIFO",
        vk::PresentModeKHR::FIFO_RELAXED => "FIFO Relaxed",
        vk::PresentModeKHR::MAILBOX => "Mailbox",
        vk::PresentModeKHR::IMMEDIATE => "Immediate",
        _ => "Unsupported",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn surface(format: vk::Format, color_space: vk::ColorSpaceKHR) -> vk::SurfaceFormatKHR {
        vk::SurfaceFormatKHR { format, color_space }
    }

    #[test]
    fn test_filter_modes_keeps_known_in_order() {
        let all = [
            vk::PresentModeKHR::MAILBOX,
            vk::PresentModeKHR::SHARED_DEMAND_REFRESH,
            vk::PresentModeKHR::FIFO,
        ];
        assert_eq!(filter_modes(&all), vec![vk::PresentModeKHR::MAILBOX, vk::PresentModeKHR::FIFO]);
    }

    #[test]
    fn test_optimal_present_mode() {
        use vk::PresentModeKHR as M;
        assert_eq!(optimal_present_mode(&[M::FIFO, M::FIFO_RELAXED, M::MAILBOX]), M::FIFO_RELAXED);
        assert_eq!(optimal_present_mode(&[M::MAILBOX, M::FIFO]), M::FIFO);
        assert_eq!(optimal_present_mode(&[M::IMMEDIATE, M::MAILBOX]), M::MAILBOX);
        assert_eq!(optimal_present_mode(&[M::IMMEDIATE]), M::FIFO);
    }

    #[test]
    fn test_compatible_surface_format_prefers_list_order() {
        let supported = [
            surface(vk::Format::B8G8R8A8_SRGB, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            surface(vk::Format::R8G8B8A8_SRGB, vk::ColorSpaceKHR::EXTENDED_SRGB_LINEAR_EXT),
            surface(vk::Format::B8G8R8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
        ];
        assert_eq!(compatible_surface_format(&supported, false).format, vk::Format::B8G8R8A8_SRGB);
        assert_eq!(compatible_surface_format(&supported, true).format, vk::Format::B8G8R8A8_UNORM);
        assert_eq!(compatible_surface_format(&supported[1..2], false).format, vk::Format::UNDEFINED);
    }

    #[test]
    fn test_present_mode_str_and_srgb() {
        assert_eq!(present_mode_str(vk::PresentModeKHR::FIFO_RELAXED), "FIFO Relaxed");
        assert_eq!(present_mode_str(vk::PresentModeKHR::SHARED_CONTINUOUS_REFRESH), "Unsupported");
        assert!(is_srgb(vk::Format::B8G8R8A8_SRGB));
        assert!(!is_srgb(vk::Format::R8G8B8A8_UNORM));
    }
}
