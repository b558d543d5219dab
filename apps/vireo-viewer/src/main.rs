//! Vireo viewer
//!
//! Opens a window and drives the UI layer with Dear ImGui: the demo window
//! plus a small stats panel. Useful for checking resize, minimize, input
//! capture and present behavior on a given driver.
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p vireo-viewer -- [OPTIONS]
//! ```
//!
//! ## Environment Variables
//!
//! - `RUST_LOG`: Set log level (e.g., info, debug, trace)

use vireo_app::{run_app, AppConfig, FatalPolicy, LayerConfig, RendererConfig, UiApp, VulkanTarget};
use vireo_gpu::vk;
use vireo_imgui::imgui::Condition;
use vireo_imgui::ImguiUi;

const WIDTH: u32 = 1280;
const HEIGHT: u32 = 720;

struct Viewer {
    frames: u64,
    show_demo: bool,
}

impl UiApp for Viewer {
    type Ui = ImguiUi;

    fn init(target: &VulkanTarget) -> anyhow::Result<(Self, Self::Ui)> {
        let info = target.render_target_info();
        tracing::info!(
            "Render target ready: queue family {}, {} images (min {})",
            info.queue_family,
            info.image_count,
            info.min_image_count
        );
        let ui = ImguiUi::new(&info)?;
        Ok((
            Self {
                frames: 0,
                show_demo: true,
            },
            ui,
        ))
    }

    fn draw(&mut self, ui: &mut ImguiUi) {
        self.frames += 1;
        let frames = self.frames;
        let image_count = ui.image_count();
        let show_demo = &mut self.show_demo;

        ui.build(|ui| {
            if *show_demo {
                ui.show_demo_window(show_demo);
            }
            ui.window("Vireo")
                .position([16.0, 16.0], Condition::FirstUseEver)
                .always_auto_resize(true)
                .build(|| {
                    ui.text(format!("{:.1} fps", ui.io().framerate));
                    ui.text(format!("{frames} frames, {image_count} swapchain images"));
                    ui.checkbox("Demo window", show_demo);
                });
        });
    }

    fn cleanup(&mut self) {
        tracing::info!("Drew {} frames", self.frames);
    }
}

fn main() -> anyhow::Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.iter().any(|arg| arg == "-h" || arg == "--help") {
        print_help();
        return Ok(());
    }

    let mut renderer = RendererConfig::builder().app_name("Vireo Viewer");
    let mut layer = LayerConfig::builder();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--no-validation" => renderer = renderer.validation(false),
            "--validation" => renderer = renderer.validation(true),
            "--mailbox" => {
                renderer = renderer.preferred_present_modes([
                    vk::PresentModeKHR::MAILBOX,
                    vk::PresentModeKHR::IMMEDIATE,
                    vk::PresentModeKHR::FIFO,
                ]);
            }
            "--images" => {
                let count = iter
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--images needs a value"))?
                    .parse()?;
                renderer = renderer.min_image_count(count);
            }
            "--propagate" => layer = layer.fatal_policy(FatalPolicy::Propagate),
            other => anyhow::bail!("unknown option {other:?}, see --help"),
        }
    }

    run_app::<Viewer>(
        AppConfig::new("Vireo Viewer")
            .with_size(WIDTH, HEIGHT)
            .with_renderer(renderer.build()?)
            .with_layer(layer.build()),
    )
}

fn print_help() {
    eprintln!(
        "Vireo viewer

USAGE:
    cargo run -p vireo-viewer -- [OPTIONS]

OPTIONS:
    --validation            Enable the Vulkan validation layer (default in debug builds)
    --no-validation         Disable the Vulkan validation layer
    --mailbox               Prefer MAILBOX, then IMMEDIATE, then FIFO presentation
    --images <N>            Minimum swapchain image count (default: 2)
    --propagate             Return fatal GPU errors instead of aborting
    -h, --help              Print this help message

ENVIRONMENT VARIABLES:
    RUST_LOG                Set log level (e.g., info, debug, trace)"
    );
}
