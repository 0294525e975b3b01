//! Fixed-capacity stack used for both the operand stack and the call stack.
//!
//! Capacity violations are reported to the caller, never silently clamped;
//! the engine turns them into `StackOverflow`/`StackUnderflow` errors.

/// A stack with a hard capacity set at construction.
#[derive(Debug, Clone)]
pub struct FixedStack<T> {
    data: Vec<T>,
    capacity: usize,
}

impl<T> FixedStack<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Push an item; false when the stack is already full.
    pub fn push(&mut self, item: T) -> bool {
        if self.data.len() >= self.capacity {
            return false;
        }
        self.data.push(item);
        true
    }

    pub fn pop(&mut self) -> Option<T> {
        self.data.pop()
    }

    pub fn peek(&self) -> Option<&T> {
        self.data.last()
    }

    /// Exchange the top with the element `offset` positions below it.
    /// False when the offset does not address a valid element.
    pub fn swap(&mut self, offset: usize) -> bool {
        let len = self.data.len();
        if offset == 0 || offset >= len {
            return false;
        }
        self.data.swap(len - 1, len - 1 - offset);
        true
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn clear(&mut self) {
        self.data.clear();
    }

    /// Iterate from bottom to top.
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.data.iter()
    }
}
