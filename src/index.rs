use std::{fmt::Debug, hash::Hash, marker::PhantomData};

/// A trait to be implemented by any "index-like" types
pub trait Index: Copy + 'static + Eq + PartialEq + Debug + Hash {
    fn new(idx: usize) -> Self;

    fn index(self) -> usize;
}

macro_rules! simple_index {
    ($(#[$attr:meta])* $vis:vis struct $name:ident;) => {
        $(#[$attr])*
        #[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Hash)]
        $vis struct $name(u32);

        impl $crate::index::Index for $name {
            fn new(idx: usize) -> Self {
                Self(idx as _)
            }

            fn index(self) -> usize {
                self.0 as _
            }
        }
    };
}

pub(crate) use simple_index;

/// An append-only arena addressed by a typed index
pub struct IndexVec<I: Index, T> {
    raw: Vec<T>,
    _marker: PhantomData<fn(&I)>,
}

impl<I: Index, T> IndexVec<I, T> {
    #[inline]
    pub const fn new() -> Self {
        IndexVec {
            raw: Vec::new(),
            _marker: PhantomData,
        }
    }

    /// Pushes an element to the arena returning the index where it was pushed to.
    #[inline]
    pub fn push(&mut self, d: T) -> I {
        let idx = self.next_index();
        self.raw.push(d);
        idx
    }

    pub fn enumerate(&self) -> impl Iterator<Item = (I, &'_ T)> {
        self.raw.iter().enumerate().map(|(i, v)| (I::new(i), v))
    }

    /// Gives the next index that will be assigned when `push` is called.
    #[inline]
    pub fn next_index(&self) -> I {
        I::new(self.raw.len())
    }
}

impl<I: Index, T> Default for IndexVec<I, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I: Index, T: Debug> Debug for IndexVec<I, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.raw.iter()).finish()
    }
}

impl<I: Index, T> core::ops::Index<I> for IndexVec<I, T> {
    type Output = T;

    fn index(&self, index: I) -> &Self::Output {
        &self.raw[index.index()]
    }
}

impl<I: Index, T> core::ops::IndexMut<I> for IndexVec<I, T> {
    fn index_mut(&mut self, index: I) -> &mut Self::Output {
        &mut self.raw[index.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    simple_index! {
        struct TestId;
    }

    #[test]
    fn push_returns_sequential_indices() {
        let mut arena: IndexVec<TestId, &str> = IndexVec::new();

        let first = arena.push("global");
        let second = arena.push("main");

        assert_eq!(first.index(), 0);
        assert_eq!(second.index(), 1);
        assert_eq!(arena[second], "main");
        assert_eq!(arena.next_index().index(), 2);
    }

    #[test]
    fn enumerate_pairs_indices_with_values() {
        let mut arena: IndexVec<TestId, u32> = IndexVec::new();
        arena.push(10);
        arena.push(20);
        arena[TestId::new(1)] += 1;

        let pairs = arena
            .enumerate()
            .map(|(id, value)| (id.index(), *value))
            .collect::<Vec<_>>();

        assert_eq!(pairs, vec![(0, 10), (1, 21)]);
    }
}
