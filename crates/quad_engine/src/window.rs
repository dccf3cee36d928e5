//! Window management using GLFW
//!
//! Provides the demo window, its resize flag, and the framebuffer-size wait
//! used by swapchain rebuilds while the window is minimized.

use thiserror::Error;

use crate::config::WindowConfig;

/// Window management errors
#[derive(Error, Debug)]
pub enum WindowError {
    /// GLFW could not be initialized
    #[error("GLFW initialization failed")]
    InitializationFailed,

    /// The window itself could not be created
    #[error("Window creation failed")]
    CreationFailed,

    /// Any other GLFW failure
    #[error("GLFW error: {0}")]
    GlfwError(String),
}

/// Result type for window operations
pub type WindowResult<T> = Result<T, WindowError>;

/// Source of the current framebuffer size
///
/// Swapchain rebuilds query this until both dimensions are non-zero, blocking on
/// window events in between.
pub trait FramebufferSource {
    /// Current framebuffer size in pixels
    fn framebuffer_size(&self) -> (u32, u32);

    /// Block until the window system delivers at least one event
    fn wait_events(&mut self);
}

/// Block until the framebuffer has a non-zero area and return its size
///
/// A minimized window reports `(0, 0)`; no swapchain can be created for it.
pub fn wait_for_framebuffer<S: FramebufferSource + ?Sized>(source: &mut S) -> (u32, u32) {
    let (mut width, mut height) = source.framebuffer_size();
    while width == 0 || height == 0 {
        source.wait_events();
        (width, height) = source.framebuffer_size();
    }
    (width, height)
}

/// GLFW window wrapper with proper resource management
pub struct Window {
    glfw: glfw::Glfw,
    window: glfw::PWindow,
    events: glfw::GlfwReceiver<(f64, glfw::WindowEvent)>,
    framebuffer_resized: bool,
}

impl Window {
    /// Create a resizable window without a client API for Vulkan rendering
    pub fn new(config: &WindowConfig) -> WindowResult<Self> {
        log::info!("GLFW initialization.");
        let mut glfw = glfw::init(glfw::fail_on_errors)
            .map_err(|_| WindowError::InitializationFailed)?;

        glfw.window_hint(glfw::WindowHint::ClientApi(glfw::ClientApiHint::NoApi));
        glfw.window_hint(glfw::WindowHint::Resizable(true));

        let (mut window, events) = glfw
            .create_window(config.width, config.height, &config.title, glfw::WindowMode::Windowed)
            .ok_or(WindowError::CreationFailed)?;

        window.set_key_polling(true);
        window.set_close_polling(true);
        window.set_framebuffer_size_polling(true);

        Ok(Self {
            glfw,
            window,
            events,
            framebuffer_resized: false,
        })
    }

    /// Whether the user asked to close the window
    pub fn should_close(&self) -> bool {
        self.window.should_close()
    }

    /// Poll pending events, flagging resizes and handling close requests
    pub fn poll_events(&mut self) {
        self.glfw.poll_events();
        self.process_events();
    }

    fn process_events(&mut self) {
        for (_, event) in glfw::flush_messages(&self.events) {
            match event {
                glfw::WindowEvent::FramebufferSize(width, height) => {
                    log::info!("GLFW window was resized to {}x{}.", width, height);
                    self.framebuffer_resized = true;
                }
                glfw::WindowEvent::Key(glfw::Key::Escape, _, glfw::Action::Press, _)
                | glfw::WindowEvent::Close => {
                    self.window.set_should_close(true);
                }
                _ => {}
            }
        }
    }

    /// Whether a resize happened since the flag was last cleared
    pub fn framebuffer_resized(&self) -> bool {
        self.framebuffer_resized
    }

    /// Mutable access to the resize flag for the draw loop to consume
    pub fn resize_flag(&mut self) -> &mut bool {
        &mut self.framebuffer_resized
    }

    /// Get required Vulkan instance extensions from GLFW
    pub fn required_instance_extensions(&self) -> WindowResult<Vec<String>> {
        self.glfw
            .get_required_instance_extensions()
            .ok_or_else(|| WindowError::GlfwError("Vulkan is not supported by this GLFW build".to_string()))
    }

    /// Create Vulkan surface using GLFW's built-in functionality
    pub fn create_vulkan_surface(&mut self, instance: ash::vk::Instance) -> WindowResult<ash::vk::SurfaceKHR> {
        let mut surface = ash::vk::SurfaceKHR::null();
        let result = self.window.create_window_surface(instance, std::ptr::null(), &mut surface);

        if result == ash::vk::Result::SUCCESS {
            Ok(surface)
        } else {
            Err(WindowError::GlfwError(format!("Failed to create Vulkan surface: {:?}", result)))
        }
    }
}

impl FramebufferSource for Window {
    fn framebuffer_size(&self) -> (u32, u32) {
        let (width, height) = self.window.get_framebuffer_size();
        (width.max(0) as u32, height.max(0) as u32)
    }

    fn wait_events(&mut self) {
        self.glfw.wait_events();
        self.process_events();
    }
}

impl Drop for Window {
    fn drop(&mut self) {
        log::info!("GLFW destroyed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::collections::VecDeque;

    /// Replays framebuffer sizes, one per query, repeating the last one
    struct ScriptedFramebuffer {
        sizes: RefCell<VecDeque<(u32, u32)>>,
        queries: Cell<usize>,
        waits: usize,
    }

    impl ScriptedFramebuffer {
        fn new(sizes: &[(u32, u32)]) -> Self {
            Self {
                sizes: RefCell::new(sizes.iter().copied().collect()),
                queries: Cell::new(0),
                waits: 0,
            }
        }
    }

    impl FramebufferSource for ScriptedFramebuffer {
        fn framebuffer_size(&self) -> (u32, u32) {
            self.queries.set(self.queries.get() + 1);
            let mut sizes = self.sizes.borrow_mut();
            if sizes.len() > 1 {
                sizes.pop_front().unwrap_or((0, 0))
            } else {
                sizes.front().copied().unwrap_or((0, 0))
            }
        }

        fn wait_events(&mut self) {
            self.waits += 1;
        }
    }

    #[test]
    fn test_wait_returns_immediately_for_visible_window() {
        let mut source = ScriptedFramebuffer::new(&[(800, 600)]);
        assert_eq!(wait_for_framebuffer(&mut source), (800, 600));
        assert_eq!(source.queries.get(), 1);
        assert_eq!(source.waits, 0);
    }

    #[test]
    fn test_wait_blocks_while_minimized() {
        let mut source = ScriptedFramebuffer::new(&[(0, 0), (0, 0), (800, 600)]);

        assert_eq!(wait_for_framebuffer(&mut source), (800, 600));
        assert_eq!(source.queries.get(), 3);
        assert_eq!(source.waits, 2);
    }

    #[test]
    fn test_wait_rejects_single_zero_dimension() {
        let mut source = ScriptedFramebuffer::new(&[(800, 0), (0, 600), (640, 480)]);

        assert_eq!(wait_for_framebuffer(&mut source), (640, 480));
        assert_eq!(source.waits, 2);
    }
}
