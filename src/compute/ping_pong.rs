//! Double-buffered kernel state.

/// Two slots with distinct read and write roles.
///
/// `read` holds the previous result, `write` receives the current one.
/// [`swap`](Self::swap) flips the roles by toggling an index; no data is
/// copied and both slots stay where they are, so a reference taken to the
/// write slot before a swap points at the read slot after it.
#[derive(Debug, Clone, PartialEq)]
pub struct PingPong<T> {
    slots: [T; 2],
    read: usize,
}

impl<T> PingPong<T> {
    /// Create from explicit read and write values.
    pub fn new(read: T, write: T) -> Self {
        Self {
            slots: [read, write],
            read: 0,
        }
    }

    /// Create both slots with the same constructor.
    pub fn from_fn(mut make: impl FnMut() -> T) -> Self {
        Self::new(make(), make())
    }

    /// The slot consumers read from.
    pub fn read(&self) -> &T {
        &self.slots[self.read]
    }

    /// The read slot, mutably. For edits between dispatches.
    pub fn read_mut(&mut self) -> &mut T {
        &mut self.slots[self.read]
    }

    /// The slot the next update writes into.
    pub fn write(&self) -> &T {
        &self.slots[1 - self.read]
    }

    /// The write slot, mutably.
    pub fn write_mut(&mut self) -> &mut T {
        &mut self.slots[1 - self.read]
    }

    /// Borrow the read slot and the write slot at once.
    pub fn read_write(&mut self) -> (&T, &mut T) {
        let (first, second) = self.slots.split_at_mut(1);
        if self.read == 0 {
            (&first[0], &mut second[0])
        } else {
            (&second[0], &mut first[0])
        }
    }

    /// Make the write slot the new read slot.
    pub fn swap(&mut self) {
        self.read = 1 - self.read;
    }

    /// Index (0 or 1) of the current read slot.
    pub fn read_index(&self) -> usize {
        self.read
    }
}

impl<T: Default> Default for PingPong<T> {
    fn default() -> Self {
        Self::from_fn(T::default)
    }
}
