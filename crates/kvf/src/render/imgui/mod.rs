//! Dear ImGui overlay drawn straight into the backbuffer with dynamic rendering
//!
//! Frames follow a small state machine: [`DearImGui::new_frame`] starts one (ending a
//! pending frame first), [`DearImGui::end_frame`] renders it exactly once and
//! [`DearImGui::draw`] records the last draw data.

pub mod platform;

use std::ptr::NonNull;
use std::sync::Arc;

use ash::vk;
use glfw::WindowEvent;
use imgui::{Context, DrawData, Ui};
use imgui_rs_vulkan_renderer::{DynamicRendering, Options, Renderer};

use super::api::RenderApi;
use super::buffered::RESOURCE_BUFFERING;
use crate::color::srgb_to_linear;
use crate::error::{KvfError, KvfResult};
use crate::foundation::math::Vec4;
use crate::foundation::time::DeltaTime;
use crate::window::Window;

const WINDOW_BG_ALPHA: f32 = 0.99;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameState {
    Idle,
    Started,
    Ended,
}

impl FrameState {
    /// A frame is open: the context's `Ui` is live and `render` has not run yet
    fn has_ui(self) -> bool {
        self == Self::Started
    }

    /// `render` ran and no frame started since, so the context's draw data is current
    fn has_draw_data(self) -> bool {
        self == Self::Ended
    }
}

struct RendererPool {
    pool: vk::CommandPool,
    api: Arc<RenderApi>,
}

impl Drop for RendererPool {
    fn drop(&mut self) {
        unsafe { self.api.device().destroy_command_pool(self.pool, None) };
    }
}

/// Imgui context plus its Vulkan renderer
pub struct DearImGui {
    // Declared before the pool and the context: the renderer frees its resources first.
    renderer: Renderer,
    _pool: RendererPool,
    // Boxed so the `Ui` inside keeps its address when `DearImGui` moves.
    context: Box<Context>,
    // SAFETY: points at the `Ui` owned by `context`. Set by `new_frame`, cleared by
    // `end_frame` before `Context::render` consumes the frame, and only dereferenced
    // while `state.has_ui()`.
    ui: Option<NonNull<Ui>>,
    state: FrameState,
    delta: DeltaTime,
}

fn apply_style(context: &mut Context) {
    let style = context.style_mut();
    style.use_dark_colors();
    for color in style.colors.iter_mut() {
        *color = srgb_to_linear(Vec4::from(*color)).into();
    }
    style[imgui::StyleColor::WindowBg][3] = WINDOW_BG_ALPHA;
}

impl DearImGui {
    /// Create the context and a renderer targeting the swapchain format
    pub fn new(api: &Arc<RenderApi>) -> KvfResult<Self> {
        let mut context = Box::new(Context::create());
        context.set_ini_filename(None);
        context.set_platform_name(Some(String::from("kvf-glfw")));
        context.io_mut().config_flags |= imgui::ConfigFlags::NAV_ENABLE_KEYBOARD;
        context
            .fonts()
            .add_font(&[imgui::FontSource::DefaultFontData { config: None }]);
        apply_style(&mut context);

        let pool_info = vk::CommandPoolCreateInfo::builder()
            .queue_family_index(api.queue_family())
            .flags(vk::CommandPoolCreateFlags::RESET_COMMAND_BUFFER);
        let pool = RendererPool {
            pool: unsafe { api.device().create_command_pool(&pool_info, None) }.map_err(KvfError::Api)?,
            api: Arc::clone(api),
        };

        let queue = *api.lock_queue();
        let renderer = Renderer::with_default_allocator(
            api.instance(),
            api.gpu().device,
            api.device().clone(),
            queue,
            pool.pool,
            DynamicRendering {
                color_attachment_format: api.swapchain_format(),
                depth_attachment_format: None,
            },
            &mut context,
            Some(Options {
                in_flight_frames: RESOURCE_BUFFERING,
                ..Default::default()
            }),
        )
        .map_err(|e| KvfError::Imgui(e.to_string()))?;
        log::debug!("Dear ImGui initialized");

        Ok(Self {
            renderer,
            _pool: pool,
            context,
            ui: None,
            state: FrameState::Idle,
            delta: DeltaTime::default(),
        })
    }

    /// Feed window events into imgui input
    pub fn handle_events(&mut self, events: &[WindowEvent]) {
        let io = self.context.io_mut();
        for event in events {
            platform::handle_event(io, event);
        }
    }

    /// Start a frame, ending the pending one first
    pub fn new_frame(&mut self, window: &Window) {
        if self.state.has_ui() {
            self.end_frame();
        }
        let dt = self.delta.tick();
        platform::update_frame(self.context.io_mut(), window, dt);
        // SAFETY: see the `ui` field. The pointer outlives this borrow of `context` but is
        // never used past `end_frame`.
        let ui = self.context.new_frame();
        self.ui = Some(NonNull::from(ui));
        self.state = FrameState::Started;
    }

    /// The frame in progress, if any
    pub fn ui(&mut self) -> Option<&mut Ui> {
        if !self.state.has_ui() {
            return None;
        }
        // SAFETY: a frame is open, so the pointer targets the live `Ui` of the boxed
        // context. The returned borrow is tied to `&mut self`, which `end_frame` needs.
        self.ui.map(|mut ui| unsafe { ui.as_mut() })
    }

    /// Whether a frame is in progress
    pub fn is_frame_started(&self) -> bool {
        self.state.has_ui()
    }

    /// Render the frame in progress. Does nothing otherwise.
    pub fn end_frame(&mut self) {
        if !self.state.has_ui() {
            return;
        }
        self.ui = None;
        self.context.render();
        self.state = FrameState::Ended;
    }

    fn draw_data(&self) -> Option<&DrawData> {
        if !self.state.has_draw_data() {
            return None;
        }
        // SAFETY: `igGetDrawData` reads the current context. imgui-rs allows one active
        // context at a time and ours is it for as long as `self` lives. `render` ran and no
        // frame started since, so the draw data is complete and stays valid until the next
        // `new_frame`, which needs `&mut self`. `DrawData` is `repr(C)` over `ImDrawData`.
        unsafe { (imgui::sys::igGetDrawData() as *const DrawData).as_ref() }
    }

    /// Record the last rendered frame into `cmd`, inside an active rendering scope
    pub fn draw(&mut self, cmd: vk::CommandBuffer) -> KvfResult<()> {
        let Some(draw_data) = self.draw_data() else {
            return Ok(());
        };
        // SAFETY: see `draw_data`; the reference is detached from `self` only to borrow the renderer.
        let draw_data = unsafe { &*(draw_data as *const DrawData) };
        self.renderer
            .cmd_draw(cmd, draw_data)
            .map_err(|e| KvfError::Imgui(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ui_only_while_frame_is_open() {
        assert!(!FrameState::Idle.has_ui());
        assert!(FrameState::Started.has_ui());
        assert!(!FrameState::Ended.has_ui());
    }

    #[test]
    fn test_draw_data_only_after_render() {
        assert!(!FrameState::Idle.has_draw_data());
        assert!(!FrameState::Started.has_draw_data());
        assert!(FrameState::Ended.has_draw_data());
    }
}
