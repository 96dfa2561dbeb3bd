use crate::frame::Frame;

/// Ring of the most recent `capacity` frames, overwritten oldest-first.
///
/// Slots that have never been written stay `None` and are skipped by [`drain`](Self::drain).
pub struct PreRollBuffer {
    slots: Vec<Option<Frame>>,
    write_index: usize,
}

impl PreRollBuffer {
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "pre-roll capacity must be at least one frame");
        Self {
            slots: vec![None; capacity],
            write_index: 0,
        }
    }

    pub fn push(&mut self, frame: Frame) {
        self.slots[self.write_index] = Some(frame);
        self.write_index = (self.write_index + 1) % self.slots.len();
    }

    /// Buffered frames, oldest first. Does not consume anything.
    pub fn drain(&self) -> impl Iterator<Item = &Frame> + '_ {
        let capacity = self.slots.len();
        (0..capacity)
            .map(move |offset| (self.write_index + offset) % capacity)
            .filter_map(move |slot| self.slots[slot].as_ref())
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.slots.iter().filter(|slot| slot.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.iter().all(Option::is_none)
    }
}
