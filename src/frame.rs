use vulkanalia::prelude::v1_0::*;

/// How many frames the host may work on before waiting for the
/// device. Two keeps the host one frame ahead of the device
/// without the latency of a deeper queue.
pub const MAX_FRAMES_IN_FLIGHT: usize = 2;

/// The synchronization objects owned by one frame slot:
/// - the "image available" semaphore, signaled by the
///   presentation engine when the acquired image can be
///   rendered to;
/// - the "render finished" semaphore, signaled by the graphics
///   queue when rendering completes, gating presentation;
/// - the frame fence, signaled with the render-finished
///   semaphore, letting the host know the slot is reusable.
#[derive(Copy, Clone, Debug, Default)]
pub struct FrameSlot {
    pub image_available_semaphore: vk::Semaphore,
    pub render_finished_semaphore: vk::Semaphore,
    pub in_flight_fence: vk::Fence,
}

impl FrameSlot {
    pub unsafe fn destroy(&self, device: &Device) {
        device.destroy_semaphore(self.image_available_semaphore, None);
        device.destroy_semaphore(self.render_finished_semaphore, None);
        device.destroy_fence(self.in_flight_fence, None);
    }
}

/// The frame schedule: a fixed ring of frame slots rotated
/// round-robin, plus the in-flight image tracker recording, for
/// each presentable image, which slot last submitted work
/// targeting it.
///
/// The slot count and the presentable image count are unrelated
/// (the driver decides the latter), so the slot fence alone is
/// not enough: the image handed out by an acquire may still be
/// the render target of another slot's submission. The tracker
/// stores the slot index, not the fence handle, so a slot never
/// has two owners for its fence.
#[derive(Default)]
pub struct FrameSchedule {
    slots: Vec<FrameSlot>,
    images_in_flight: Vec<Option<usize>>,
    current: usize,
}

impl FrameSchedule {
    pub fn new(slots: Vec<FrameSlot>, image_count: usize) -> Self {
        Self {
            slots,
            images_in_flight: vec![None; image_count],
            current: 0,
        }
    }

    /// The slot the next frame will be scheduled on.
    pub fn current_slot(&self) -> &FrameSlot {
        &self.slots[self.current]
    }

    /// The fence to wait on before rendering into the given
    /// image, if some slot has submitted work targeting it.
    pub fn image_in_flight(&self, image_index: usize) -> Option<vk::Fence> {
        self.images_in_flight[image_index].map(|slot| self.slots[slot].in_flight_fence)
    }

    /// Records that the current slot is about to submit work
    /// targeting the given image.
    pub fn mark_in_flight(&mut self, image_index: usize) {
        self.images_in_flight[image_index] = Some(self.current);
    }

    /// Advances to the next slot, wrapping around the ring.
    pub fn advance(&mut self) {
        self.current = (self.current + 1) % self.slots.len();
    }

    pub unsafe fn destroy(&mut self, device: &Device) {
        self.slots.iter().for_each(|s| s.destroy(device));
        self.slots.clear();
        self.images_in_flight.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schedule(slot_count: usize, image_count: usize) -> FrameSchedule {
        FrameSchedule::new(vec![FrameSlot::default(); slot_count], image_count)
    }

    #[test]
    fn slots_rotate_round_robin() {
        let mut frames = schedule(MAX_FRAMES_IN_FLIGHT, 3);

        assert_eq!(frames.current, 0);
        frames.advance();
        assert_eq!(frames.current, 1);
        frames.advance();
        assert_eq!(frames.current, 0);
    }

    #[test]
    fn unmarked_image_has_no_fence_to_wait() {
        let frames = schedule(2, 3);
        assert!(frames.image_in_flight(0).is_none());
        assert!(frames.image_in_flight(2).is_none());
    }

    #[test]
    fn marked_image_tracks_the_marking_slot() {
        let mut frames = schedule(2, 3);

        frames.mark_in_flight(1);
        assert_eq!(frames.images_in_flight[1], Some(0));

        frames.advance();
        frames.mark_in_flight(1);
        assert_eq!(frames.images_in_flight[1], Some(1));
    }

    #[test]
    fn image_reuse_is_fenced() {
        // Simulate the per-frame state machine with two slots
        // and three presentable images handed out in FIFO
        // order, checking that whenever an image comes around
        // again, the schedule demands a wait on the slot that
        // last targeted it.
        let mut frames = schedule(2, 3);
        let mut last_slot_for_image = [None::<usize>; 3];

        for frame in 0..12 {
            let image_index = frame % 3;

            let tracked = frames.images_in_flight[image_index];
            assert_eq!(tracked, last_slot_for_image[image_index]);

            // From the fourth frame on, every image has been
            // targeted before and must carry a back-reference.
            if frame >= 3 {
                assert!(tracked.is_some());
            }

            frames.mark_in_flight(image_index);
            last_slot_for_image[image_index] = Some(frames.current);
            frames.advance();
        }
    }

    #[test]
    fn more_slots_than_images_still_tracks() {
        // A single presentable image contested by both slots:
        // every frame after the first must wait on the other
        // slot.
        let mut frames = schedule(2, 1);

        frames.mark_in_flight(0);
        frames.advance();

        assert_eq!(frames.images_in_flight[0], Some(0));
        frames.mark_in_flight(0);
        frames.advance();

        assert_eq!(frames.images_in_flight[0], Some(1));
    }
}
