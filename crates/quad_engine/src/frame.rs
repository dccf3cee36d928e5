//! Frame orchestration
//!
//! [`draw_frame`] drives one frame slot through
//! `Idle → Acquiring → Recording → Submitted → Presenting → Idle`. The steps
//! go through [`FrameBackend`], so the ordering rules hold for any backend.
//!
//! Staleness is discovered lazily, from the acquire and present results or the
//! window's resize flag. All three converge on the same rebuild; an out-of-date
//! acquire wins and skips the frame before anything is submitted.

use crate::vulkan::{SurfaceStatus, VulkanError, VulkanResult};
use crate::MAX_FRAMES_IN_FLIGHT;

/// Outcome of a successful [`draw_frame`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameStatus {
    /// The frame was submitted and presented
    Presented,
    /// The swapchain was out of date at acquire; nothing was drawn
    Skipped,
    /// The frame was presented, then the swapchain was rebuilt
    Rebuilt,
}

/// Frame slot selector cycling over `[0, frames)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameCounter {
    current: usize,
    frames: usize,
}

impl FrameCounter {
    /// Counter over `frames` slots, starting at slot 0
    pub const fn new(frames: usize) -> Self {
        Self {
            current: 0,
            frames: if frames == 0 { 1 } else { frames },
        }
    }

    /// Active slot
    pub const fn current(&self) -> usize {
        self.current
    }

    /// Number of slots
    pub const fn frames(&self) -> usize {
        self.frames
    }

    /// Move to the next slot, wrapping to 0
    pub fn advance(&mut self) -> usize {
        self.current = (self.current + 1) % self.frames;
        self.current
    }
}

impl Default for FrameCounter {
    fn default() -> Self {
        Self::new(MAX_FRAMES_IN_FLIGHT)
    }
}

/// The operations [`draw_frame`] sequences
pub trait FrameBackend {
    /// Block until the slot's previous submission has finished
    fn wait_for_fence(&mut self, slot: usize) -> VulkanResult<()>;

    /// Acquire the next swapchain image, signalling the slot's image-available semaphore
    fn acquire_image(&mut self, slot: usize) -> VulkanResult<(Option<u32>, SurfaceStatus)>;

    /// Return the slot's fence to unsignaled
    fn reset_fence(&mut self, slot: usize) -> VulkanResult<()>;

    /// Reset the slot's command buffer for re-recording
    fn reset_command_buffer(&mut self, slot: usize) -> VulkanResult<()>;

    /// Write the slot's uniform buffer
    fn update_uniforms(&mut self, slot: usize) -> VulkanResult<()>;

    /// Record the draw for `image_index` into the slot's command buffer
    fn record(&mut self, slot: usize, image_index: u32) -> VulkanResult<()>;

    /// Submit the slot's command buffer
    fn submit(&mut self, slot: usize) -> VulkanResult<()>;

    /// Present `image_index` once rendering has finished
    fn present(&mut self, slot: usize, image_index: u32) -> VulkanResult<SurfaceStatus>;

    /// Rebuild the swapchain for the current window size
    fn rebuild_swapchain(&mut self) -> VulkanResult<()>;

    /// Whether the swapchain can be rendered to
    fn swapchain_valid(&self) -> bool;
}

/// Render one frame in `slot`, consuming `framebuffer_resized` if it is set
pub fn draw_frame<B: FrameBackend + ?Sized>(
    backend: &mut B,
    slot: usize,
    framebuffer_resized: &mut bool,
) -> VulkanResult<FrameStatus> {
    backend.wait_for_fence(slot)?;

    let (image_index, status) = backend.acquire_image(slot)?;
    let Some(image_index) = image_index else {
        log::info!("Swapchain out of date at acquire, rebuilding.");
        rebuild(backend, "an out-of-date acquire")?;
        return Ok(FrameStatus::Skipped);
    };
    if status == SurfaceStatus::Suboptimal {
        log::debug!("Acquired image {} from a suboptimal swapchain.", image_index);
    }

    // Reset only once work is certain to be submitted, or the next wait would never return.
    backend.reset_fence(slot)?;
    backend.reset_command_buffer(slot)?;
    backend.update_uniforms(slot)?;
    backend.record(slot, image_index)?;
    backend.submit(slot)?;

    let present_status = backend.present(slot, image_index)?;
    if present_status.needs_rebuild() || *framebuffer_resized {
        *framebuffer_resized = false;
        log::info!("Swapchain {:?} at present, rebuilding.", present_status);
        rebuild(backend, "present")?;
        return Ok(FrameStatus::Rebuilt);
    }

    Ok(FrameStatus::Presented)
}

fn rebuild<B: FrameBackend + ?Sized>(backend: &mut B, trigger: &'static str) -> VulkanResult<()> {
    backend.rebuild_swapchain()?;
    if !backend.swapchain_valid() {
        log::error!("Failed to rebuild swapchain.");
        return Err(VulkanError::SwapchainInvalid(trigger));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ash::vk;
    use std::collections::VecDeque;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Call {
        WaitFence(usize),
        Acquire(usize),
        ResetFence(usize),
        ResetCommands(usize),
        UpdateUniforms(usize),
        Record(usize, u32),
        Submit(usize),
        Present(usize, u32),
        Rebuild,
    }

    /// Records every call and replays scripted acquire and present results
    struct RecordingBackend {
        calls: Vec<Call>,
        acquires: VecDeque<VulkanResult<(Option<u32>, SurfaceStatus)>>,
        presents: VecDeque<VulkanResult<SurfaceStatus>>,
        valid_after_rebuild: bool,
    }

    impl RecordingBackend {
        fn new() -> Self {
            Self {
                calls: Vec::new(),
                acquires: VecDeque::new(),
                presents: VecDeque::new(),
                valid_after_rebuild: true,
            }
        }

        fn count(&self, call: Call) -> usize {
            self.calls.iter().filter(|&&c| c == call).count()
        }

        fn submitted_or_presented(&self) -> bool {
            self.calls
                .iter()
                .any(|c| matches!(c, Call::Submit(_) | Call::Present(..)))
        }
    }

    impl FrameBackend for RecordingBackend {
        fn wait_for_fence(&mut self, slot: usize) -> VulkanResult<()> {
            self.calls.push(Call::WaitFence(slot));
            Ok(())
        }

        fn acquire_image(&mut self, slot: usize) -> VulkanResult<(Option<u32>, SurfaceStatus)> {
            self.calls.push(Call::Acquire(slot));
            self.acquires.pop_front().unwrap_or(Ok((Some(0), SurfaceStatus::Optimal)))
        }

        fn reset_fence(&mut self, slot: usize) -> VulkanResult<()> {
            self.calls.push(Call::ResetFence(slot));
            Ok(())
        }

        fn reset_command_buffer(&mut self, slot: usize) -> VulkanResult<()> {
            self.calls.push(Call::ResetCommands(slot));
            Ok(())
        }

        fn update_uniforms(&mut self, slot: usize) -> VulkanResult<()> {
            self.calls.push(Call::UpdateUniforms(slot));
            Ok(())
        }

        fn record(&mut self, slot: usize, image_index: u32) -> VulkanResult<()> {
            self.calls.push(Call::Record(slot, image_index));
            Ok(())
        }

        fn submit(&mut self, slot: usize) -> VulkanResult<()> {
            self.calls.push(Call::Submit(slot));
            Ok(())
        }

        fn present(&mut self, slot: usize, image_index: u32) -> VulkanResult<SurfaceStatus> {
            self.calls.push(Call::Present(slot, image_index));
            self.presents.pop_front().unwrap_or(Ok(SurfaceStatus::Optimal))
        }

        fn rebuild_swapchain(&mut self) -> VulkanResult<()> {
            self.calls.push(Call::Rebuild);
            Ok(())
        }

        fn swapchain_valid(&self) -> bool {
            self.valid_after_rebuild
        }
    }

    #[test]
    fn test_counter_returns_to_first_slot() {
        let mut counter = FrameCounter::default();
        assert_eq!(counter.current(), 0);

        for _ in 0..MAX_FRAMES_IN_FLIGHT {
            counter.advance();
        }
        assert_eq!(counter.current(), 0);
    }

    #[test]
    fn test_counter_visits_every_slot() {
        let mut counter = FrameCounter::new(3);
        let visited: Vec<usize> = (0..4).map(|_| counter.advance()).collect();
        assert_eq!(visited, vec![1, 2, 0, 1]);
        assert_eq!(FrameCounter::new(0).frames(), 1);
    }

    #[test]
    fn test_frame_steps_run_in_order() {
        let mut backend = RecordingBackend::new();
        backend.acquires.push_back(Ok((Some(2), SurfaceStatus::Optimal)));
        let mut resized = false;

        let status = draw_frame(&mut backend, 1, &mut resized).unwrap();

        assert_eq!(status, FrameStatus::Presented);
        assert_eq!(
            backend.calls,
            vec![
                Call::WaitFence(1),
                Call::Acquire(1),
                Call::ResetFence(1),
                Call::ResetCommands(1),
                Call::UpdateUniforms(1),
                Call::Record(1, 2),
                Call::Submit(1),
                Call::Present(1, 2),
            ]
        );
    }

    #[test]
    fn test_out_of_date_acquire_rebuilds_once_and_skips() {
        let mut backend = RecordingBackend::new();
        backend.acquires.push_back(Ok((None, SurfaceStatus::OutOfDate)));
        let mut resized = false;

        let status = draw_frame(&mut backend, 0, &mut resized).unwrap();

        assert_eq!(status, FrameStatus::Skipped);
        assert_eq!(backend.count(Call::Rebuild), 1);
        assert!(!backend.submitted_or_presented());
        assert!(!backend.calls.contains(&Call::ResetFence(0)));
    }

    #[test]
    fn test_out_of_date_acquire_leaves_resize_flag_for_present() {
        let mut backend = RecordingBackend::new();
        backend.acquires.push_back(Ok((None, SurfaceStatus::OutOfDate)));
        let mut resized = true;

        draw_frame(&mut backend, 0, &mut resized).unwrap();
        assert!(resized);

        let status = draw_frame(&mut backend, 1, &mut resized).unwrap();
        assert_eq!(status, FrameStatus::Rebuilt);
        assert!(!resized);
        assert_eq!(backend.count(Call::Rebuild), 2);
    }

    #[test]
    fn test_acquire_failure_aborts_frame() {
        let mut backend = RecordingBackend::new();
        backend
            .acquires
            .push_back(Err(VulkanError::Api(vk::Result::ERROR_DEVICE_LOST)));
        let mut resized = false;

        let err = draw_frame(&mut backend, 0, &mut resized).unwrap_err();

        assert!(matches!(err, VulkanError::Api(vk::Result::ERROR_DEVICE_LOST)));
        assert_eq!(backend.calls, vec![Call::WaitFence(0), Call::Acquire(0)]);
    }

    #[test]
    fn test_suboptimal_acquire_still_draws() {
        let mut backend = RecordingBackend::new();
        backend.acquires.push_back(Ok((Some(1), SurfaceStatus::Suboptimal)));
        let mut resized = false;

        let status = draw_frame(&mut backend, 0, &mut resized).unwrap();

        assert_eq!(status, FrameStatus::Presented);
        assert_eq!(backend.count(Call::Submit(0)), 1);
        assert_eq!(backend.count(Call::Rebuild), 0);
    }

    #[test]
    fn test_stale_present_triggers_rebuild() {
        for present_status in [SurfaceStatus::Suboptimal, SurfaceStatus::OutOfDate] {
            let mut backend = RecordingBackend::new();
            backend.presents.push_back(Ok(present_status));
            let mut resized = false;

            let status = draw_frame(&mut backend, 0, &mut resized).unwrap();

            assert_eq!(status, FrameStatus::Rebuilt);
            assert_eq!(backend.calls.last(), Some(&Call::Rebuild));
            assert_eq!(backend.count(Call::Rebuild), 1);
        }
    }

    #[test]
    fn test_resize_flag_is_cleared_by_rebuild() {
        let mut backend = RecordingBackend::new();
        let mut resized = true;

        let status = draw_frame(&mut backend, 0, &mut resized).unwrap();

        assert_eq!(status, FrameStatus::Rebuilt);
        assert!(!resized);
        assert_eq!(backend.count(Call::Present(0, 0)), 1);
        assert_eq!(backend.count(Call::Rebuild), 1);
    }

    #[test]
    fn test_invalid_swapchain_after_rebuild_is_an_error() {
        let mut backend = RecordingBackend::new();
        backend.acquires.push_back(Ok((None, SurfaceStatus::OutOfDate)));
        backend.valid_after_rebuild = false;
        let mut resized = false;

        let err = draw_frame(&mut backend, 0, &mut resized).unwrap_err();
        assert!(matches!(err, VulkanError::SwapchainInvalid(_)));
    }

    #[test]
    fn test_present_failure_is_fatal() {
        let mut backend = RecordingBackend::new();
        backend
            .presents
            .push_back(Err(VulkanError::Api(vk::Result::ERROR_SURFACE_LOST_KHR)));
        let mut resized = true;

        assert!(draw_frame(&mut backend, 0, &mut resized).is_err());
        assert_eq!(backend.count(Call::Rebuild), 0);
    }

    #[test]
    fn test_slots_alternate_across_frames() {
        let mut backend = RecordingBackend::new();
        let mut counter = FrameCounter::default();
        let mut resized = false;

        for _ in 0..4 {
            draw_frame(&mut backend, counter.current(), &mut resized).unwrap();
            counter.advance();
        }

        let waited: Vec<usize> = backend
            .calls
            .iter()
            .filter_map(|c| match c {
                Call::WaitFence(slot) => Some(*slot),
                _ => None,
            })
            .collect();
        assert_eq!(waited, vec![0, 1, 0, 1]);
    }
}
