// SPDX-License-Identifier: CEPL-1.0
//! Frames in flight.
//!
//! A fixed ring of slots, each with its own acquire semaphore, render
//! semaphore and fence, plus a map from swapchain image to the fence of the
//! last frame that rendered into it. The fence of a slot is the only thing
//! the CPU ever waits on; acquire, submit and present are ordered on the GPU
//! through the semaphores alone.

use tracing::{debug, trace};

use crate::device::{
    AcquireOutcome, DeviceError, GpuDevice, PresentOutcome, Submission, WaitStage,
};
use crate::error::{FrameError, FrameResult};
use crate::handle::{CommandBufferHandle, FenceHandle, SemaphoreHandle, SwapchainHandle};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlotState {
    Idle,
    Submitted,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameSlot {
    pub image_available: SemaphoreHandle,
    pub render_finished: SemaphoreHandle,
    pub in_flight: FenceHandle,
}

/// Per-image record of the fence guarding the last submission into it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ImagesInFlight {
    fences: Vec<Option<FenceHandle>>,
}

impl ImagesInFlight {
    pub fn new(image_count: usize) -> Self {
        Self {
            fences: vec![None; image_count],
        }
    }

    pub fn reset(&mut self, image_count: usize) {
        self.fences.clear();
        self.fences.resize(image_count, None);
    }

    pub fn len(&self) -> usize {
        self.fences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fences.is_empty()
    }

    pub fn get(&self, image: usize) -> Option<FenceHandle> {
        self.fences.get(image).copied().flatten()
    }

    /// Marks `image` as rendered by `fence`, returning the previous owner.
    fn claim(&mut self, image: usize, fence: FenceHandle) -> Option<FenceHandle> {
        self.fences[image].replace(fence)
    }
}

/// What the swapchain looks like for one frame.
#[derive(Clone, Copy, Debug)]
pub struct FrameTarget<'a> {
    pub swapchain: SwapchainHandle,
    /// One pre-recorded buffer per swapchain image.
    pub command_buffers: &'a [CommandBufferHandle],
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameStatus {
    /// Work was submitted and presented. `stale` asks for a rebuild.
    Presented { image_index: u32, stale: bool },
    /// Acquire found the chain unusable. Nothing was submitted.
    Stale,
}

#[derive(Debug)]
pub struct FrameSynchronizer {
    slots: Vec<FrameSlot>,
    states: Vec<SlotState>,
    images: ImagesInFlight,
    current: usize,
}

impl FrameSynchronizer {
    /// Creates the ring with signalled fences so the first wait on each slot
    /// returns at once.
    pub fn new<D: GpuDevice>(
        device: &mut D,
        frames_in_flight: usize,
        image_count: usize,
    ) -> FrameResult<Self> {
        let mut sync = Self {
            slots: Vec::with_capacity(frames_in_flight),
            states: Vec::with_capacity(frames_in_flight),
            images: ImagesInFlight::new(image_count),
            current: 0,
        };
        for _ in 0..frames_in_flight {
            match create_slot(device) {
                Ok(slot) => {
                    sync.slots.push(slot);
                    sync.states.push(SlotState::Idle);
                }
                Err(e) => {
                    sync.destroy(device);
                    return Err(FrameError::SyncCreation(e));
                }
            }
        }
        debug!(frames_in_flight, image_count, "frame ring created");
        Ok(sync)
    }

    pub fn frames_in_flight(&self) -> usize {
        self.slots.len()
    }

    pub fn current_slot(&self) -> usize {
        self.current
    }

    pub fn slot(&self, index: usize) -> &FrameSlot {
        &self.slots[index]
    }

    pub fn slot_state(&self, index: usize) -> SlotState {
        self.states[index]
    }

    pub fn images_in_flight(&self) -> &ImagesInFlight {
        &self.images
    }

    /// Forgets every image owner and marks every slot idle. Only valid once
    /// the device is drained, as it is after a swapchain rebuild.
    pub fn reset_images(&mut self, image_count: usize) {
        self.images.reset(image_count);
        self.states.fill(SlotState::Idle);
    }

    /// Throttle, acquire, guard the image, submit, present, advance.
    pub fn draw_frame<D: GpuDevice>(
        &mut self,
        device: &mut D,
        target: FrameTarget<'_>,
    ) -> FrameResult<FrameStatus> {
        let slot_index = self.current;
        let slot = self.slots[slot_index];

        device
            .wait_for_fence(slot.in_flight)
            .map_err(FrameError::FenceWait)?;
        self.states[slot_index] = SlotState::Idle;

        let (image_index, suboptimal) =
            match device
                .acquire_next_image(target.swapchain, slot.image_available)
                .map_err(FrameError::Acquire)?
            {
                AcquireOutcome::Ready(i) => (i, false),
                AcquireOutcome::Suboptimal(i) => (i, true),
                AcquireOutcome::Stale => {
                    debug!(slot = slot_index, "acquire reported a stale swapchain");
                    return Ok(FrameStatus::Stale);
                }
            };
        let image = image_index as usize;
        if image >= self.images.len() || image >= target.command_buffers.len() {
            return Err(FrameError::Acquire(DeviceError::new(
                "acquire_next_image",
                format!(
                    "image index {image_index} out of range for {} images",
                    self.images.len()
                ),
            )));
        }

        // An older slot may still be rendering into this image when there are
        // more images than slots.
        if let Some(owner) = self.images.get(image) {
            if owner != slot.in_flight {
                trace!(image, "waiting on image still in flight");
                device.wait_for_fence(owner).map_err(FrameError::FenceWait)?;
            }
        }
        self.images.claim(image, slot.in_flight);

        device
            .reset_fence(slot.in_flight)
            .map_err(FrameError::Submit)?;
        device
            .submit(&Submission {
                command_buffer: target.command_buffers[image],
                wait: slot.image_available,
                wait_stage: WaitStage::ColorAttachmentOutput,
                signal: slot.render_finished,
                fence: slot.in_flight,
            })
            .map_err(FrameError::Submit)?;
        self.states[slot_index] = SlotState::Submitted;

        let presented = device
            .present(target.swapchain, image_index, slot.render_finished)
            .map_err(FrameError::Present)?;
        let stale = suboptimal || presented != PresentOutcome::Presented;
        if stale {
            debug!(
                slot = slot_index,
                image,
                ?presented,
                suboptimal,
                "present asks for a rebuild"
            );
        }

        self.current = (self.current + 1) % self.slots.len();
        Ok(FrameStatus::Presented { image_index, stale })
    }

    /// Releases the ring. The device must be idle.
    pub fn destroy<D: GpuDevice>(&mut self, device: &mut D) {
        for slot in self.slots.drain(..) {
            device.destroy_semaphore(slot.image_available);
            device.destroy_semaphore(slot.render_finished);
            device.destroy_fence(slot.in_flight);
        }
        self.states.clear();
        self.images.reset(0);
        self.current = 0;
    }
}

fn create_slot<D: GpuDevice>(device: &mut D) -> Result<FrameSlot, DeviceError> {
    let image_available = device.create_semaphore()?;
    let render_finished = match device.create_semaphore() {
        Ok(s) => s,
        Err(e) => {
            device.destroy_semaphore(image_available);
            return Err(e);
        }
    };
    let in_flight = match device.create_fence(true) {
        Ok(f) => f,
        Err(e) => {
            device.destroy_semaphore(image_available);
            device.destroy_semaphore(render_finished);
            return Err(e);
        }
    };
    Ok(FrameSlot {
        image_available,
        render_finished,
        in_flight,
    })
}
