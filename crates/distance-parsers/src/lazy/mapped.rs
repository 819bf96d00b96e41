//! Caching, non-owning map over a lazy sequence

use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;

use super::LazySeq;

type MapFn<S, T> = Arc<dyn Fn(&S) -> T + Send + Sync>;

/// View that applies `map` to each element of a shared [`LazySeq`]
///
/// Results are cached per index; the underlying sequence is only inflated as
/// far as the highest index read.
pub struct MappedSeq<S, T> {
    base: Arc<LazySeq<S>>,
    map: MapFn<S, T>,
    cache: Vec<OnceCell<T>>,
}

impl<S, T> MappedSeq<S, T> {
    pub fn new(base: Arc<LazySeq<S>>, map: impl Fn(&S) -> T + Send + Sync + 'static) -> Self {
        let cache = (0..base.nominal_len()).map(|_| OnceCell::new()).collect();
        Self {
            base,
            map: Arc::new(map),
            cache,
        }
    }

    pub fn base(&self) -> &Arc<LazySeq<S>> {
        &self.base
    }

    pub fn len(&self) -> usize {
        self.base.len()
    }

    pub fn is_empty(&self) -> bool {
        self.base.is_empty()
    }

    /// Mapped element `index`, computed on first access
    pub fn get(&self, index: usize) -> Option<&T> {
        let source = self.base.get(index)?;
        Some(self.cache[index].get_or_init(|| (self.map)(source)))
    }

    /// Mapped element `index` only if it was already computed
    pub fn get_cached(&self, index: usize) -> Option<&T> {
        if index >= self.len() {
            return None;
        }
        self.cache.get(index).and_then(OnceCell::get)
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        (0..).map_while(move |i| self.get(i))
    }

    /// Compute every element
    pub fn materialize_all(&self) {
        for _ in self.iter() {}
    }

    /// Owned mapped elements, reusing cached results
    pub fn into_vec(self) -> Vec<T> {
        let Self { base, map, cache } = self;
        cache
            .into_iter()
            .enumerate()
            .map_while(|(i, cell)| cell.into_inner().or_else(|| base.get(i).map(|s| map(s))))
            .collect()
    }
}

impl<S, T> fmt::Debug for MappedSeq<S, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MappedSeq")
            .field("len", &self.len())
            .field("cached", &self.cache.iter().filter(|c| c.get().is_some()).count())
            .finish()
    }
}
