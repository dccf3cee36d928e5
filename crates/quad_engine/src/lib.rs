//! # Quad Engine
//!
//! A minimal Vulkan renderer that draws a vertex-colored quad with a rotating
//! model-view-projection transform.
//!
//! The interesting part is the frame lifecycle rather than the drawing:
//!
//! - **Swapchain rebuild**: out-of-date/suboptimal results and window resizes
//!   converge on one rebuild path that waits out minimized windows
//! - **Frames in flight**: two slots, each with its own fence, semaphores,
//!   command buffer and uniform buffer
//! - **Staged uploads**: geometry is written to a host-visible staging buffer and
//!   copied to device-local memory with a blocking one-shot transfer
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use quad_engine::prelude::*;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = DemoConfig::default();
//!     RunLog::open(&config.log_file)?.install()?;
//!
//!     let mut window = Window::new(&config.window)?;
//!     let mut renderer = QuadRenderer::new(&mut window, &config.renderer)?;
//!     renderer.run(&mut window)?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod config;
pub mod frame;
pub mod logging;
pub mod math;
pub mod renderer;
pub mod vertex;
pub mod vulkan;
pub mod window;

/// Number of frame slots recorded and submitted concurrently.
pub const MAX_FRAMES_IN_FLIGHT: usize = 2;

/// Common imports for engine users
pub mod prelude {
    pub use crate::{
        config::{Config, ConfigError, DemoConfig, RendererConfig, WindowConfig},
        frame::{FrameCounter, FrameStatus},
        logging::{LogError, RunLog},
        renderer::QuadRenderer,
        vulkan::{VulkanError, VulkanResult},
        window::{Window, WindowError},
        MAX_FRAMES_IN_FLIGHT,
    };
}
