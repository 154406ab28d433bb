use std::{fmt, hash::Hash, marker::PhantomData};

/// Stable position of a definition inside one of the [`ResourceBundle`]
/// collections or the scene's node list.
///
/// The type parameter keeps indices of different kinds apart; a material
/// index cannot be used to look up a mesh.
///
/// [`ResourceBundle`]: crate::ResourceBundle
pub struct Index<T> {
    idx: usize,
    _p: PhantomData<fn() -> T>,
}

impl<T> Index<T> {
    pub const fn new(idx: usize) -> Self {
        Self {
            idx,
            _p: PhantomData,
        }
    }

    pub const fn get(self) -> usize {
        self.idx
    }
}

impl<T> Copy for Index<T> {}

impl<T> Clone for Index<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> PartialEq for Index<T> {
    fn eq(&self, other: &Self) -> bool {
        self.idx == other.idx
    }
}

impl<T> Eq for Index<T> {}

impl<T> Hash for Index<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.idx.hash(state);
    }
}

impl<T> fmt::Debug for Index<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Index({})", self.idx)
    }
}

impl<T> fmt::Display for Index<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.idx)
    }
}

impl<T> From<Index<T>> for usize {
    fn from(index: Index<T>) -> Self {
        index.idx
    }
}
