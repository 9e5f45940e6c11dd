/// Groups a stream into batches of `size`; the last batch may be shorter.
/// Pulls from the inner iterator only as batches are requested.
pub struct BatchGenerator<I> {
    inner: I,
    size: usize,
}

impl<I: Iterator> BatchGenerator<I> {
    pub fn new(inner: I, size: usize) -> Self {
        Self {
            inner,
            size: size.max(1),
        }
    }
}

impl<I: Iterator> Iterator for BatchGenerator<I> {
    type Item = Vec<I::Item>;

    fn next(&mut self) -> Option<Self::Item> {
        let batch: Vec<_> = self.inner.by_ref().take(self.size).collect();
        if batch.is_empty() {
            None
        } else {
            Some(batch)
        }
    }
}
