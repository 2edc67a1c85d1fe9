/// Two-slot register separating a committed value from a pending one.
///
/// Writers stage into the pending slot as often as they like; readers only
/// see the committed slot, which changes solely on `advance`.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct TwoSlot<T: Copy> {
    committed: T,
    pending: T,
}

impl<T: Copy> TwoSlot<T> {
    /// Creates a register with both slots set to `value`.
    pub fn new(value: T) -> Self {
        Self {
            committed: value,
            pending: value,
        }
    }

    #[inline]
    pub fn committed(&self) -> T {
        self.committed
    }

    #[inline]
    pub fn pending(&self) -> T {
        self.pending
    }

    /// Overwrites the pending slot.
    #[inline]
    pub fn stage(&mut self, value: T) {
        self.pending = value;
    }

    /// Publishes the pending slot.
    #[inline]
    pub fn advance(&mut self) {
        self.committed = self.pending;
    }
}
