//! Growable positional bucket used by the ready and waiting pools

/// Initial capacity of every bucket
const INITIAL_CAPACITY: usize = 10;

/// Ordered, positionally addressable list
///
/// Appends are amortized O(1); removal by position is O(n) and shifts every
/// later item one slot to the left. Items that are not removed keep their
/// relative insertion order. Callers that cache positions must renumber the
/// items returned by [`Bucket::shifted_from`] after a removal.
#[derive(Debug, Clone)]
pub struct Bucket<T> {
    items: Vec<T>,
}

impl<T> Bucket<T> {
    /// Create an empty bucket
    pub fn new() -> Self {
        Self {
            items: Vec::with_capacity(INITIAL_CAPACITY),
        }
    }

    /// Append an item and return its position
    pub fn append(&mut self, item: T) -> usize {
        self.items.push(item);
        self.items.len() - 1
    }

    /// Remove the item at `position`, shifting later items left
    ///
    /// # Panics
    ///
    /// Panics if `position` is out of bounds.
    pub fn remove_at(&mut self, position: usize) -> T {
        self.items.remove(position)
    }

    /// Items that now sit at `position` or later, with their new positions
    pub fn shifted_from(&self, position: usize) -> impl Iterator<Item = (usize, &T)> {
        self.items.iter().enumerate().skip(position)
    }

    /// Number of items
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the bucket holds no items
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Item at `index`
    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    /// Iterate items in bucket order
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    /// Remove every item, preserving order
    pub fn drain(&mut self) -> std::vec::Drain<'_, T> {
        self.items.drain(..)
    }
}

impl<T> Default for Bucket<T> {
    fn default() -> Self {
        Self::new()
    }
}
