//! One-pass listing results.

/// Finite, non-restartable sequence returned by listing operations.
///
/// Items are produced once, in the order the store yielded them; there is no
/// rewind. Collect it if you need to walk the results twice.
#[derive(Debug)]
pub struct Cursor<T> {
    inner: std::vec::IntoIter<T>,
}

impl<T> Cursor<T> {
    pub fn new(items: Vec<T>) -> Self {
        Self {
            inner: items.into_iter(),
        }
    }
}

impl<T> From<Vec<T>> for Cursor<T> {
    fn from(items: Vec<T>) -> Self {
        Self::new(items)
    }
}

impl<T> Iterator for Cursor<T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        self.inner.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<T> ExactSizeIterator for Cursor<T> {}
