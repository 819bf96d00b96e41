//! Lazy sequences
//!
//! A [`LazySeq`] is a fixed-length random-access view over a one-shot
//! iterator. Reading element `i` pulls elements `0..=i` from the iterator and
//! caches them; the source is only touched for what is actually read. If the
//! iterator runs dry before the nominal length, the reported length shrinks to
//! what was produced. It never grows except through explicit mutation.
//!
//! A [`MappedSeq`] is a caching view that applies a pure function to each
//! element of a shared `LazySeq`.

mod mapped;

pub use mapped::MappedSeq;

use std::fmt;
use std::ops::{Bound, RangeBounds};
use std::sync::atomic::{AtomicUsize, Ordering};

use once_cell::sync::OnceCell;
use parking_lot::Mutex;

type BoxedIter<T> = Box<dyn Iterator<Item = T> + Send>;

struct Inflater<T> {
    iter: BoxedIter<T>,
    /// Index of the next element the iterator will produce
    next: usize,
}

/// Random-access view over a bounded iterator with on-demand caching
pub struct LazySeq<T> {
    slots: Vec<OnceCell<T>>,
    len: AtomicUsize,
    inflater: Mutex<Option<Inflater<T>>>,
}

impl<T> LazySeq<T> {
    /// Sequence of nominal length `len` backed by `iter`
    pub fn new<I>(len: usize, iter: I) -> Self
    where
        I: Iterator<Item = T> + Send + 'static,
    {
        let slots = (0..len).map(|_| OnceCell::new()).collect();
        let inflater = (len > 0).then(|| Inflater {
            iter: Box::new(iter),
            next: 0,
        });
        Self {
            slots,
            len: AtomicUsize::new(len),
            inflater: Mutex::new(inflater),
        }
    }

    /// Fully materialized sequence
    pub fn from_vec(items: Vec<T>) -> Self {
        let len = items.len();
        Self {
            slots: items.into_iter().map(OnceCell::with_value).collect(),
            len: AtomicUsize::new(len),
            inflater: Mutex::new(None),
        }
    }

    /// Current length; may shrink as the iterator is consumed
    pub fn len(&self) -> usize {
        self.len.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Length the sequence was created with
    pub fn nominal_len(&self) -> usize {
        self.slots.len()
    }

    /// Whether the backing iterator is done with
    pub fn is_materialized(&self) -> bool {
        self.inflater.lock().is_none()
    }

    /// Number of elements already pulled from the iterator
    pub fn materialized_len(&self) -> usize {
        match self.inflater.lock().as_ref() {
            Some(inflater) => inflater.next,
            None => self.len(),
        }
    }

    /// Element `index`, inflating up to it if needed
    pub fn get(&self, index: usize) -> Option<&T> {
        if index >= self.len() {
            return None;
        }
        if let Some(item) = self.slots[index].get() {
            return Some(item);
        }
        self.inflate_to(index);
        if index >= self.len() {
            return None;
        }
        self.slots[index].get()
    }

    /// Element `index` only if it was already materialized
    pub fn get_cached(&self, index: usize) -> Option<&T> {
        if index >= self.len() {
            return None;
        }
        self.slots.get(index).and_then(OnceCell::get)
    }

    /// Python-style index: negative values count from the end
    pub fn get_signed(&self, index: isize) -> Option<&T> {
        let index = if index < 0 {
            self.materialize_all();
            self.len().checked_sub(index.unsigned_abs())?
        } else {
            index as usize
        };
        self.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.get(index)?;
        self.slots[index].get_mut()
    }

    pub fn first(&self) -> Option<&T> {
        self.get(0)
    }

    pub fn last(&self) -> Option<&T> {
        self.get_signed(-1)
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        (0..).map_while(move |i| self.get(i))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> + '_ {
        self.own();
        self.slots.iter_mut().filter_map(OnceCell::get_mut)
    }

    /// Pull every remaining element from the iterator
    pub fn materialize_all(&self) {
        let len = self.len();
        if len > 0 {
            self.inflate_to(len - 1);
        }
    }

    /// Materialize everything and drop slots past the final length
    fn own(&mut self) {
        self.materialize_all();
        let len = self.len();
        self.slots.truncate(len);
    }

    /// Append an element (materializes the sequence first)
    pub fn push(&mut self, item: T) {
        self.own();
        self.slots.push(OnceCell::with_value(item));
        self.len.fetch_add(1, Ordering::AcqRel);
    }

    /// Insert at `index`, clamped to the length
    pub fn insert(&mut self, index: usize, item: T) {
        self.own();
        let index = index.min(self.slots.len());
        self.slots.insert(index, OnceCell::with_value(item));
        self.len.fetch_add(1, Ordering::AcqRel);
    }

    pub fn remove(&mut self, index: usize) -> Option<T> {
        self.own();
        if index >= self.slots.len() {
            return None;
        }
        self.len.fetch_sub(1, Ordering::AcqRel);
        self.slots.remove(index).into_inner()
    }

    /// Replace element `index`, returning the previous one
    pub fn set(&mut self, index: usize, item: T) -> Option<T> {
        self.own();
        let slot = self.slots.get_mut(index)?;
        std::mem::replace(slot, OnceCell::with_value(item)).into_inner()
    }

    pub fn retain(&mut self, mut keep: impl FnMut(&T) -> bool) {
        self.own();
        self.slots.retain(|slot| slot.get().is_some_and(&mut keep));
        self.len.store(self.slots.len(), Ordering::Release);
    }

    /// Owned copies of a range of elements
    pub fn slice(&self, range: impl RangeBounds<usize>) -> Vec<T>
    where
        T: Clone,
    {
        let start = match range.start_bound() {
            Bound::Included(&s) => s,
            Bound::Excluded(&s) => s + 1,
            Bound::Unbounded => 0,
        };
        let end = match range.end_bound() {
            Bound::Included(&e) => Some(e + 1),
            Bound::Excluded(&e) => Some(e),
            Bound::Unbounded => None,
        };
        (start..)
            .take_while(|i| end.map_or(true, |e| *i < e))
            .map_while(|i| self.get(i).cloned())
            .collect()
    }

    pub fn into_vec(mut self) -> Vec<T> {
        self.own();
        std::mem::take(&mut self.slots)
            .into_iter()
            .filter_map(OnceCell::into_inner)
            .collect()
    }

    /// Take the elements materialized so far and abandon the iterator
    ///
    /// Leaves the sequence empty. Used to tear trees down without recursing.
    pub fn take_materialized(&mut self) -> Vec<T> {
        *self.inflater.get_mut() = None;
        self.len.store(0, Ordering::Release);
        std::mem::take(&mut self.slots)
            .into_iter()
            .filter_map(OnceCell::into_inner)
            .collect()
    }

    fn inflate_to(&self, index: usize) {
        let mut guard = self.inflater.lock();
        let done = {
            let Some(inflater) = guard.as_mut() else {
                return;
            };
            loop {
                if inflater.next >= self.slots.len() {
                    break true;
                }
                if inflater.next > index {
                    break false;
                }
                match inflater.iter.next() {
                    Some(item) => {
                        // Slots past `next` are only ever filled here, under the lock
                        let _ = self.slots[inflater.next].set(item);
                        inflater.next += 1;
                    }
                    None => {
                        tracing::debug!(
                            nominal = self.slots.len(),
                            actual = inflater.next,
                            "lazy sequence ended early"
                        );
                        self.len.store(inflater.next, Ordering::Release);
                        break true;
                    }
                }
            }
        };
        if done {
            *guard = None;
        }
    }
}

impl<T> Default for LazySeq<T> {
    fn default() -> Self {
        Self::from_vec(Vec::new())
    }
}

impl<T> From<Vec<T>> for LazySeq<T> {
    fn from(items: Vec<T>) -> Self {
        Self::from_vec(items)
    }
}

impl<T> FromIterator<T> for LazySeq<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::from_vec(iter.into_iter().collect())
    }
}

impl<T> fmt::Debug for LazySeq<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LazySeq")
            .field("len", &self.len())
            .field("materialized", &self.materialized_len())
            .finish()
    }
}
