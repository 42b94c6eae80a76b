//! Batcher — fixed-size chunking of a record stream.
//!
//! Bulk writes are submitted one batch at a time, so only the current batch
//! is resident. The adaptor pulls lazily from its source and never yields
//! an empty batch.

use std::num::NonZeroUsize;

/// Lazily split `iter` into batches of at most `size` elements.
///
/// Order is preserved within and across batches; the last batch may be
/// shorter; an empty input yields no batches.
pub fn batches<I>(iter: I, size: NonZeroUsize) -> Batches<I::IntoIter>
where
    I: IntoIterator,
{
    Batches { inner: iter.into_iter(), size: size.get() }
}

/// Iterator returned by [`batches`].
#[derive(Debug, Clone)]
pub struct Batches<I> {
    inner: I,
    size: usize,
}

impl<I: Iterator> Iterator for Batches<I> {
    type Item = Vec<I::Item>;

    fn next(&mut self) -> Option<Self::Item> {
        let first = self.inner.next()?;
        let mut batch = Vec::with_capacity(self.size.min(self.inner.size_hint().0 + 1));
        batch.push(first);
        batch.extend(self.inner.by_ref().take(self.size - 1));
        Some(batch)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let (lo, hi) = self.inner.size_hint();
        (lo.div_ceil(self.size), hi.map(|h| h.div_ceil(self.size)))
    }
}
