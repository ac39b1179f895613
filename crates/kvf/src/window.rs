//! Window management using GLFW
//!
//! Provides window creation for Vulkan rendering (no client API), event draining and
//! surface creation.

use ash::vk;
use glfw::{ClientApiHint, WindowEvent, WindowHint, WindowMode};

use crate::error::{KvfError, KvfResult};

/// GLFW window wrapper with proper resource management
pub struct Window {
    glfw: glfw::Glfw,
    window: glfw::PWindow,
    events: glfw::GlfwReceiver<(f64, WindowEvent)>,
    frame_events: Vec<WindowEvent>,
}

fn log_glfw_error(error: glfw::Error, description: String) {
    log::error!(target: "glfw", "{error:?}: {description}");
}

fn init_glfw() -> KvfResult<glfw::Glfw> {
    let mut glfw =
        glfw::init(log_glfw_error).map_err(|e| KvfError::Window(format!("Failed to initialize GLFW: {e:?}")))?;
    if !glfw.vulkan_supported() {
        return Err(KvfError::Window("Vulkan not supported".to_string()));
    }
    glfw.window_hint(WindowHint::ClientApi(ClientApiHint::NoApi));
    glfw.window_hint(WindowHint::AutoIconify(false));
    Ok(glfw)
}

/// Create a windowed window of `size` pixels
pub fn create_window(size: [u32; 2], title: &str, decorated: bool) -> KvfResult<Window> {
    let mut glfw = init_glfw()?;
    glfw.window_hint(WindowHint::Decorated(decorated));
    let (window, events) = glfw
        .create_window(size[0], size[1], title, WindowMode::Windowed)
        .ok_or_else(|| KvfError::Window("Failed to create GLFW Window".to_string()))?;
    Ok(Window::from_parts(glfw, window, events))
}

/// Create a fullscreen window on the primary monitor, using its current video mode
pub fn create_fullscreen_window(title: &str) -> KvfResult<Window> {
    let mut glfw = init_glfw()?;
    let created = glfw.with_primary_monitor(|glfw, monitor| {
        let monitor = monitor?;
        let mode = monitor.get_video_mode()?;
        glfw.window_hint(WindowHint::RedBits(Some(mode.red_bits)));
        glfw.window_hint(WindowHint::GreenBits(Some(mode.green_bits)));
        glfw.window_hint(WindowHint::BlueBits(Some(mode.blue_bits)));
        glfw.window_hint(WindowHint::RefreshRate(Some(mode.refresh_rate)));
        glfw.window_hint(WindowHint::CenterCursor(true));
        glfw.create_window(mode.width, mode.height, title, WindowMode::FullScreen(&*monitor))
    });
    let (window, events) = created.ok_or_else(|| KvfError::Window("Failed to create fullscreen GLFW Window".to_string()))?;
    Ok(Window::from_parts(glfw, window, events))
}

impl Window {
    fn from_parts(glfw: glfw::Glfw, mut window: glfw::PWindow, events: glfw::GlfwReceiver<(f64, WindowEvent)>) -> Self {
        window.set_all_polling(true);
        Self {
            glfw,
            window,
            events,
            frame_events: Vec::new(),
        }
    }

    /// Poll GLFW and collect this frame's events, discarding the previous frame's
    pub fn poll_events(&mut self) -> &[WindowEvent] {
        self.glfw.poll_events();
        self.frame_events.clear();
        self.frame_events
            .extend(glfw::flush_messages(&self.events).map(|(_, event)| event));
        &self.frame_events
    }

    /// Events collected by the last [`poll_events`](Self::poll_events)
    pub fn events(&self) -> &[WindowEvent] {
        &self.frame_events
    }

    /// Whether the user (or the app) requested the window to close
    pub fn is_closing(&self) -> bool {
        self.window.should_close()
    }

    /// Request (or cancel a request) to close the window
    pub fn set_closing(&mut self, value: bool) {
        self.window.set_should_close(value);
    }

    /// Window size in screen coordinates
    pub fn size(&self) -> [u32; 2] {
        let (width, height) = self.window.get_size();
        [width.max(0) as u32, height.max(0) as u32]
    }

    /// Resize the window, in screen coordinates
    pub fn set_size(&mut self, size: [u32; 2]) {
        self.window.set_size(size[0] as i32, size[1] as i32);
    }

    /// Set the window title
    pub fn set_title(&mut self, title: &str) {
        self.window.set_title(title);
    }

    /// Framebuffer size in pixels; zero while minimized
    pub fn framebuffer_extent(&self) -> vk::Extent2D {
        let (width, height) = self.window.get_framebuffer_size();
        vk::Extent2D {
            width: width.max(0) as u32,
            height: height.max(0) as u32,
        }
    }

    /// Seconds since GLFW was initialized
    pub fn time(&self) -> f64 {
        self.glfw.get_time()
    }

    /// Cursor position in screen coordinates
    pub fn cursor_pos(&self) -> (f64, f64) {
        self.window.get_cursor_pos()
    }

    /// Direct access to the GLFW window
    pub fn glfw_window(&self) -> &glfw::PWindow {
        &self.window
    }

    /// Mutable access to the GLFW window
    pub fn glfw_window_mut(&mut self) -> &mut glfw::PWindow {
        &mut self.window
    }

    /// Get required Vulkan instance extensions from GLFW
    pub fn required_instance_extensions(&self) -> KvfResult<Vec<String>> {
        self.glfw
            .get_required_instance_extensions()
            .ok_or_else(|| KvfError::Window("Failed to get required extensions".to_string()))
    }

    /// Create Vulkan surface using GLFW's built-in functionality
    pub fn create_surface(&self, instance: vk::Instance) -> KvfResult<vk::SurfaceKHR> {
        let mut surface = vk::SurfaceKHR::null();
        let result = self.window.create_window_surface(instance, std::ptr::null(), &mut surface);
        if result == vk::Result::SUCCESS {
            Ok(surface)
        } else {
            Err(KvfError::Api(result))
        }
    }
}
