//! Rotating quad demo
//!
//! Opens an 800x600 window and renders a vertex-colored quad until the window
//! is closed. Settings come from `quad_demo.toml` when it exists.

use quad_engine::prelude::*;
use thiserror::Error;

const CONFIG_PATH: &str = "quad_demo.toml";

/// Anything that ends the demo early
#[derive(Error, Debug)]
enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Log(#[from] LogError),

    #[error(transparent)]
    Window(#[from] WindowError),

    #[error(transparent)]
    Vulkan(#[from] VulkanError),
}

fn run() -> Result<(), AppError> {
    let config = DemoConfig::load_or_default(CONFIG_PATH)?;
    config.validate()?;

    RunLog::open(&config.log_file)?.install()?;

    let mut window = Window::new(&config.window)?;
    let mut renderer = QuadRenderer::new(&mut window, &config.renderer)?;
    renderer.run(&mut window)?;

    // The renderer's surface and device go before the window that backs them.
    drop(renderer);
    drop(window);
    Ok(())
}

fn main() {
    if let Err(e) = run() {
        // Falls back to stderr when the failure happened before the log was installed.
        if log::log_enabled!(log::Level::Error) {
            log::error!("{}", e);
        } else {
            eprintln!("quad_demo: {}", e);
        }
        std::process::exit(1);
    }
}
