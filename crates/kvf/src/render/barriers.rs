//! Access and stage masks for backbuffer and frame image transitions

use ash::vk;

/// Source and destination masks for moving the backbuffer from `old` to `new`.
///
/// Returns `(src_access, src_stage, dst_access, dst_stage)`.
pub fn backbuffer_transition(
    old: vk::ImageLayout,
    new: vk::ImageLayout,
) -> (vk::AccessFlags2, vk::PipelineStageFlags2, vk::AccessFlags2, vk::PipelineStageFlags2) {
    let color_rw = vk::AccessFlags2::COLOR_ATTACHMENT_READ | vk::AccessFlags2::COLOR_ATTACHMENT_WRITE;

    let (src_access, src_stage) = match old {
        vk::ImageLayout::TRANSFER_DST_OPTIMAL => (vk::AccessFlags2::TRANSFER_WRITE, vk::PipelineStageFlags2::TRANSFER),
        vk::ImageLayout::ATTACHMENT_OPTIMAL => (color_rw, vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT),
        _ => (vk::AccessFlags2::NONE, vk::PipelineStageFlags2::TOP_OF_PIPE),
    };

    let (dst_access, dst_stage) = match new {
        vk::ImageLayout::TRANSFER_DST_OPTIMAL => (vk::AccessFlags2::TRANSFER_WRITE, vk::PipelineStageFlags2::TRANSFER),
        vk::ImageLayout::ATTACHMENT_OPTIMAL => (color_rw, vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT),
        _ => (vk::AccessFlags2::NONE, vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT),
    };

    (src_access, src_stage, dst_access, dst_stage)
}

/// Barriers around blitting a sampled frame image: into `TRANSFER_SRC`, then back to `SHADER_READ_ONLY`.
///
/// `template` supplies the image, queue families and subresource range.
pub fn blit_barriers(template: vk::ImageMemoryBarrier2) -> [vk::ImageMemoryBarrier2; 2] {
    let to_src = vk::ImageMemoryBarrier2 {
        src_stage_mask: vk::PipelineStageFlags2::FRAGMENT_SHADER,
        src_access_mask: vk::AccessFlags2::SHADER_SAMPLED_READ,
        dst_stage_mask: vk::PipelineStageFlags2::TRANSFER,
        dst_access_mask: vk::AccessFlags2::TRANSFER_READ,
        old_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        new_layout: vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
        ..template
    };
    let to_read = vk::ImageMemoryBarrier2 {
        src_stage_mask: vk::PipelineStageFlags2::TRANSFER,
        src_access_mask: vk::AccessFlags2::TRANSFER_READ,
        dst_stage_mask: vk::PipelineStageFlags2::FRAGMENT_SHADER,
        dst_access_mask: vk::AccessFlags2::SHADER_SAMPLED_READ,
        old_layout: vk::ImageLayout::TRANSFER_SRC_OPTIMAL,
        new_layout: vk::ImageLayout::SHADER_READ_ONLY_OPTIMAL,
        ..template
    };
    [to_src, to_read]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_undefined_to_transfer() {
        let (src_access, src_stage, dst_access, dst_stage) =
            backbuffer_transition(vk::ImageLayout::UNDEFINED, vk::ImageLayout::TRANSFER_DST_OPTIMAL);
        assert_eq!(src_access, vk::AccessFlags2::NONE);
        assert_eq!(src_stage, vk::PipelineStageFlags2::TOP_OF_PIPE);
        assert_eq!(dst_access, vk::AccessFlags2::TRANSFER_WRITE);
        assert_eq!(dst_stage, vk::PipelineStageFlags2::TRANSFER);
    }

    #[test]
    fn test_transfer_to_attachment() {
        let (src_access, src_stage, dst_access, dst_stage) =
            backbuffer_transition(vk::ImageLayout::TRANSFER_DST_OPTIMAL, vk::ImageLayout::ATTACHMENT_OPTIMAL);
        assert_eq!(src_access, vk::AccessFlags2::TRANSFER_WRITE);
        assert_eq!(src_stage, vk::PipelineStageFlags2::TRANSFER);
        assert!(dst_access.contains(vk::AccessFlags2::COLOR_ATTACHMENT_WRITE));
        assert_eq!(dst_stage, vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT);
    }

    #[test]
    fn test_attachment_to_present() {
        let (src_access, src_stage, dst_access, dst_stage) =
            backbuffer_transition(vk::ImageLayout::ATTACHMENT_OPTIMAL, vk::ImageLayout::PRESENT_SRC_KHR);
        assert!(src_access.contains(vk::AccessFlags2::COLOR_ATTACHMENT_READ));
        assert_eq!(src_stage, vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT);
        assert_eq!(dst_access, vk::AccessFlags2::NONE);
        assert_eq!(dst_stage, vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT);

        let (src_access, src_stage, ..) =
            backbuffer_transition(vk::ImageLayout::PRESENT_SRC_KHR, vk::ImageLayout::ATTACHMENT_OPTIMAL);
        assert_eq!(src_access, vk::AccessFlags2::NONE);
        assert_eq!(src_stage, vk::PipelineStageFlags2::TOP_OF_PIPE);
    }

    #[test]
    fn test_blit_barriers_round_trip_layout() {
        let [to_src, to_read] = blit_barriers(vk::ImageMemoryBarrier2::default());
        assert_eq!(to_src.old_layout, to_read.new_layout);
        assert_eq!(to_src.new_layout, vk::ImageLayout::TRANSFER_SRC_OPTIMAL);
        assert_eq!(to_read.old_layout, vk::ImageLayout::TRANSFER_SRC_OPTIMAL);
    }
}
