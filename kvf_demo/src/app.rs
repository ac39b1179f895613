//! Demo state and frame loop

use std::path::Path;

use anyhow::{Context, Result};
use ash::vk;
use glfw::{Action, Key, WindowEvent};
use imgui::Condition;
use kvf::bitmap::{ColorBitmap, ImageBitmap};
use kvf::color::{self, Color};
use kvf::config::RenderDeviceConfig;
use kvf::foundation::math::IVec2;
use kvf::foundation::time::DeltaTime;
use kvf::render::present::present_mode_str;
use kvf::render::{DeviceBlock, RenderDevice, RenderPass};
use kvf::ttf::{self, TextInput, Typeface};
use kvf::vma::{Texture, TextureCreateInfo};
use kvf::window::{create_fullscreen_window, create_window};

use crate::Args;

const WINDOW_SIZE: [u32; 2] = [800, 600];
const WINDOW_TITLE: &str = "kvf demo";
const FONT_HEIGHT: u32 = 32;
const SAMPLE_TEXT: &str = "kvf demo\nHello, Vulkan!";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Source {
    Pass,
    Texture,
}

/// Font metrics shown in the info window
struct FontInfo {
    name: String,
    glyph_count: usize,
    kerning: bool,
    text_size: [f32; 2],
}

/// Changes requested by the UI, applied once the frame's UI borrow ends
#[derive(Default)]
struct UiActions {
    exit: bool,
    present_mode: Option<vk::PresentModeKHR>,
}

/// The demo
pub struct App {
    // Waits for the GPU before the pass and texture below are destroyed.
    _block: DeviceBlock,
    pass: RenderPass,
    texture: Texture,
    font: Option<FontInfo>,
    source: Source,
    clear: [f32; 4],
    delta: DeltaTime,
    device: RenderDevice,
}

fn checkerboard() -> ColorBitmap {
    let mut bitmap = ColorBitmap::new(IVec2::new(2, 2));
    *bitmap.at_mut(0, 0) = color::MAGENTA;
    *bitmap.at_mut(1, 0) = color::CYAN;
    *bitmap.at_mut(0, 1) = color::YELLOW;
    *bitmap.at_mut(1, 1) = color::WHITE;
    bitmap
}

fn load_texture(device: &RenderDevice, assets: &Path) -> Result<Texture> {
    let info = TextureCreateInfo::default();
    let path = assets.join("image.png");
    if let Ok(bytes) = std::fs::read(&path) {
        let image = ImageBitmap::new(&bytes).with_context(|| format!("Failed to decode {}", path.display()))?;
        log::info!("Loaded {}", path.display());
        return Ok(Texture::from_bitmap(device.api(), &info, image.bitmap())?);
    }
    log::info!("{} not found, using a 2x2 checkerboard", path.display());
    Ok(Texture::from_bitmap(device.api(), &info, checkerboard().bitmap())?)
}

fn load_font(assets: &Path) -> Result<Option<FontInfo>> {
    let path = assets.join("font.ttf");
    let Ok(bytes) = std::fs::read(&path) else {
        log::info!("{} not found, skipping text layout", path.display());
        return Ok(None);
    };
    let face = Typeface::new(&bytes).with_context(|| format!("Failed to load {}", path.display()))?;
    let glyphs = face.load_glyphs(FONT_HEIGHT, &ttf::default_codepoints());
    let mut layouts = Vec::new();
    face.push_layouts(&mut layouts, &TextInput::new(SAMPLE_TEXT, &glyphs, FONT_HEIGHT), true);
    let size = ttf::glyph_bounds(&layouts).size();
    Ok(Some(FontInfo {
        name: face.name().unwrap_or("unnamed").to_string(),
        glyph_count: glyphs.len(),
        kerning: face.has_kerning(),
        text_size: [size.x, size.y],
    }))
}

impl App {
    /// Open the window and create the device, pass and texture
    pub fn new(args: &Args, config: &RenderDeviceConfig) -> Result<Self> {
        let window = if args.fullscreen {
            create_fullscreen_window(WINDOW_TITLE)?
        } else {
            create_window(WINDOW_SIZE, WINDOW_TITLE, true)?
        };
        let device = RenderDevice::new(window, config.create_info())?;

        let mut pass = RenderPass::new(&device, vk::SampleCountFlags::TYPE_1)?.with_color_target(vk::Format::UNDEFINED)?;
        pass.clear_color = Color::new(0x20, 0x40, 0x60, 0xff);
        let texture = load_texture(&device, &args.assets)?;
        let font = load_font(&args.assets)?;

        Ok(Self {
            _block: DeviceBlock::new(&device),
            clear: pass.clear_color.to_vec4().into(),
            pass,
            texture,
            font,
            source: Source::Pass,
            delta: DeltaTime::default(),
            device,
        })
    }

    /// Render until the window closes
    pub fn run(&mut self) -> Result<()> {
        while !self.device.is_window_closing() {
            self.frame()?;
        }
        Ok(())
    }

    fn handle_events(&mut self) {
        let mut close = false;
        for event in self.device.window().events() {
            match event {
                WindowEvent::Key(Key::Escape, _, Action::Press, _) => close = true,
                WindowEvent::FileDrop(paths) => {
                    for path in paths {
                        log::info!("Dropped: {}", path.display());
                    }
                }
                _ => {}
            }
        }
        if close {
            self.device.set_window_closing(true);
        }
    }

    fn frame(&mut self) -> Result<()> {
        let dt = self.delta.tick();
        let cmd = self.device.next_frame()?;
        self.handle_events();

        let extent = self.device.framebuffer_extent();
        let target = match self.source {
            Source::Texture => Some(self.texture.render_target()),
            Source::Pass if extent.width > 0 && extent.height > 0 => {
                self.pass.clear_color = Color::from_vec4(self.clear.into());
                self.pass.begin_render(cmd, extent)?;
                self.pass.end_render()?;
                self.pass.render_target()
            }
            Source::Pass => None,
        };

        let actions = self.build_ui(dt.as_secs_f32());
        if actions.exit {
            self.device.set_window_closing(true);
        }
        if let Some(mode) = actions.present_mode {
            if !self.device.set_present_mode(mode)? {
                log::warn!("Present mode {} is not supported", present_mode_str(mode));
            }
        }

        let filter = match self.source {
            Source::Pass => vk::Filter::LINEAR,
            Source::Texture => vk::Filter::NEAREST,
        };
        self.device.render(target, filter)?;
        Ok(())
    }

    fn build_ui(&mut self, dt: f32) -> UiActions {
        let mut actions = UiActions::default();
        let gpu_name = self.device.gpu().name();
        let modes = self.device.supported_present_modes().to_vec();
        let current_mode = self.device.present_mode();
        let Some(ui) = self.device.imgui_frame() else {
            return actions;
        };

        ui.main_menu_bar(|| {
            ui.menu("File", || {
                if ui.menu_item("Exit") {
                    actions.exit = true;
                }
            });
        });

        let source = &mut self.source;
        let clear = &mut self.clear;
        let font = self.font.as_ref();
        ui.window("Info")
            .position([20.0, 40.0], Condition::FirstUseEver)
            .size([320.0, 240.0], Condition::FirstUseEver)
            .build(|| {
                ui.text(format!("GPU: {gpu_name}"));
                ui.text(format!("Frame time: {:.2} ms", dt * 1000.0));

                let names: Vec<&str> = modes.iter().map(|&mode| present_mode_str(mode)).collect();
                let mut selected = modes.iter().position(|&mode| mode == current_mode).unwrap_or(0);
                if ui.combo_simple_string("Present mode", &mut selected, &names) {
                    actions.present_mode = modes.get(selected).copied().filter(|&mode| mode != current_mode);
                }

                ui.separator();
                ui.radio_button("Render pass", source, Source::Pass);
                ui.radio_button("Texture", source, Source::Texture);
                if *source == Source::Pass {
                    ui.color_edit4("Clear colour", clear);
                }

                if let Some(font) = font {
                    ui.separator();
                    ui.text(format!("Font: {} ({} glyphs)", font.name, font.glyph_count));
                    ui.text(format!("Kerning: {}", font.kerning));
                    ui.text(format!("Sample text: {:.0}x{:.0} px", font.text_size[0], font.text_size[1]));
                }
            });
        actions
    }
}
