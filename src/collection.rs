//! Remote lists and the cursors that rotate through them.

/// A list fetched from the backend. It is only ever replaced wholesale by
/// the latest successful fetch.
#[derive(Debug, Clone)]
pub struct RemoteCollection<T> {
    items: Vec<T>,
}

impl<T> Default for RemoteCollection<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<T> RemoteCollection<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replace(&mut self, items: Vec<T>) {
        self.items = items;
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }
}

impl<T> From<Vec<T>> for RemoteCollection<T> {
    fn from(items: Vec<T>) -> Self {
        Self { items }
    }
}

/// Walks a collection by identity: the next item is the one after the
/// current item's position in the *latest* list, or the first item when
/// the current one is gone.
#[derive(Debug, Clone)]
pub struct RotationCursor<T> {
    current: Option<T>,
}

impl<T> Default for RotationCursor<T> {
    fn default() -> Self {
        Self { current: None }
    }
}

impl<T: PartialEq + Clone> RotationCursor<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Move to the next item. An empty collection leaves the cursor alone.
    pub fn advance<'a>(&mut self, collection: &'a RemoteCollection<T>) -> Option<&'a T> {
        if collection.is_empty() {
            return None;
        }

        let position = self
            .current
            .as_ref()
            .and_then(|current| collection.items().iter().position(|item| item == current));

        let next = match position {
            Some(pos) => (pos + 1) % collection.len(),
            None => 0,
        };

        let item = collection.get(next)?;
        self.current = Some(item.clone());
        Some(item)
    }

    pub fn current(&self) -> Option<&T> {
        self.current.as_ref()
    }

    pub fn reset(&mut self) {
        self.current = None;
    }
}

/// Position-based carousel cursor that wraps in both directions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexCursor {
    index: usize,
    len: usize,
}

impl IndexCursor {
    pub fn new(len: usize) -> Self {
        Self { index: 0, len }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Shrinking below the current position moves back to the start
    pub fn set_len(&mut self, len: usize) {
        self.len = len;
        if self.index >= len {
            self.index = 0;
        }
    }

    pub fn next(&mut self) -> usize {
        if self.len > 0 {
            self.index = (self.index + 1) % self.len;
        }
        self.index
    }

    pub fn previous(&mut self) -> usize {
        if self.len > 0 {
            self.index = (self.index + self.len - 1) % self.len;
        }
        self.index
    }

    /// Out-of-range selections are ignored
    pub fn select(&mut self, index: usize) -> usize {
        if index < self.len {
            self.index = index;
        }
        self.index
    }
}
