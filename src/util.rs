//! # Misc utilities
//!
//! Small helpers that are used in several places but are not specific to posts.
use std::marker::PhantomData;

/// A counter that produces values of type T
#[derive(Debug)]
pub struct Counter<T>(u64, PhantomData<fn() -> T>);

impl<T> Default for Counter<T> {
    fn default() -> Self {
        Self(0, PhantomData)
    }
}

impl<T: From<u64>> Counter<T> {
    /// Get the next value from this counter
    pub fn next(&mut self) -> T {
        let id = self.0;
        self.0 = id + 1;
        T::from(id)
    }
}

/// Whether an event loop goes on
pub(crate) enum LoopState<T> {
    Break(T),
    Continue,
}

#[cfg(test)]
mod tests {
    use super::Counter;

    #[test]
    fn test_counter() {
        let mut counter = Counter::<u64>::default();
        assert_eq!(counter.next(), 0);
        assert_eq!(counter.next(), 1);
    }
}
