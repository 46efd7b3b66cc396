//! Comparator-driven binary heap.
//!
//! A single array-backed sift implementation serves two purposes: [`heap_sort_by`] instantiates it in max order
//! to sort a slice in place, [`Heap`] instantiates it in min order as the priority queue of the k-way merge.

use std::cmp::Ordering;
use std::fmt;

use crate::SortError;

/// Moves the element at `index` towards the leaves until neither child precedes it.
/// `precedes(a, b)` returns `true` if `a` must be closer to the root than `b`.
fn sift_down<T, P>(data: &mut [T], mut index: usize, precedes: &P)
where
    P: Fn(&T, &T) -> bool,
{
    let len = data.len();
    loop {
        let left = 2 * index + 1;
        let right = left + 1;
        let mut top = index;

        if left < len && precedes(&data[left], &data[top]) {
            top = left;
        }
        if right < len && precedes(&data[right], &data[top]) {
            top = right;
        }
        if top == index {
            break;
        }

        data.swap(index, top);
        index = top;
    }
}

/// Moves the element at `index` towards the root while it precedes its parent.
fn sift_up<T, P>(data: &mut [T], mut index: usize, precedes: &P)
where
    P: Fn(&T, &T) -> bool,
{
    while index > 0 {
        let parent = (index - 1) / 2;
        if !precedes(&data[index], &data[parent]) {
            break;
        }
        data.swap(index, parent);
        index = parent;
    }
}

/// Bottom-up heap construction, O(n).
fn heapify<T, P>(data: &mut [T], precedes: &P)
where
    P: Fn(&T, &T) -> bool,
{
    for index in (0..data.len() / 2).rev() {
        sift_down(data, index, precedes);
    }
}

/// Sorts the slice in ascending order using heap sort.
///
/// The sort is in place and not stable, time complexity is *n* \* log(*n*).
pub fn heap_sort<T: Ord>(data: &mut [T]) {
    heap_sort_by(data, T::cmp)
}

/// Sorts the slice in ascending order of `compare` using heap sort.
///
/// Builds a max-heap over the whole slice and then repeatedly swaps the maximum into the tail, shrinking the heap
/// by one element each time.
pub fn heap_sort_by<T, F>(data: &mut [T], compare: F)
where
    F: Fn(&T, &T) -> Ordering,
{
    let precedes = |a: &T, b: &T| compare(a, b) == Ordering::Greater;

    heapify(data, &precedes);
    for end in (1..data.len()).rev() {
        data.swap(0, end);
        sift_down(&mut data[..end], 0, &precedes);
    }
}

/// Binary heap ordered by a comparator.
///
/// The top of the heap is the element that compares as the least, so with a natural ordering this is a min-heap.
/// Reverse the comparator to get a max-heap.
pub struct Heap<T, F>
where
    F: Fn(&T, &T) -> Ordering,
{
    data: Vec<T>,
    compare: F,
}

impl<T: Ord> Heap<T, fn(&T, &T) -> Ordering> {
    /// Creates an empty min-heap using the natural ordering of `T`.
    pub fn new() -> Self {
        Heap::with_capacity_by(0, T::cmp as fn(&T, &T) -> Ordering)
    }

    /// Builds a min-heap from an existing vector using the natural ordering of `T`.
    pub fn from_vec(data: Vec<T>) -> Self {
        Heap::from_vec_by(data, T::cmp as fn(&T, &T) -> Ordering)
    }
}

impl<T: Ord> Default for Heap<T, fn(&T, &T) -> Ordering> {
    fn default() -> Self {
        Heap::new()
    }
}

impl<T, F> Heap<T, F>
where
    F: Fn(&T, &T) -> Ordering,
{
    /// Creates an empty heap with space for at least `capacity` elements.
    pub fn with_capacity_by(capacity: usize, compare: F) -> Self {
        Heap {
            data: Vec::with_capacity(capacity),
            compare,
        }
    }

    /// Builds a heap from an existing vector in linear time.
    pub fn from_vec_by(mut data: Vec<T>, compare: F) -> Self {
        heapify(&mut data, &|a: &T, b: &T| compare(a, b) == Ordering::Less);
        Heap { data, compare }
    }

    /// Inserts an element.
    pub fn insert(&mut self, value: T) {
        self.data.push(value);
        let compare = &self.compare;
        let last = self.data.len() - 1;
        sift_up(&mut self.data, last, &|a: &T, b: &T| compare(a, b) == Ordering::Less);
    }

    /// Removes and returns the top element.
    ///
    /// Fails with [`SortError::PreconditionViolation`] if the heap is empty.
    pub fn extract_top(&mut self) -> Result<T, SortError> {
        if self.data.is_empty() {
            return Err(SortError::PreconditionViolation("extract from an empty heap"));
        }

        let top = self.data.swap_remove(0);
        let compare = &self.compare;
        sift_down(&mut self.data, 0, &|a: &T, b: &T| compare(a, b) == Ordering::Less);

        return Ok(top);
    }

    /// Returns a reference to the top element without removing it.
    ///
    /// Fails with [`SortError::PreconditionViolation`] if the heap is empty.
    pub fn peek_top(&self) -> Result<&T, SortError> {
        self.data
            .first()
            .ok_or(SortError::PreconditionViolation("peek into an empty heap"))
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Consumes the heap returning the underlying vector in heap order.
    pub fn into_vec(self) -> Vec<T> {
        self.data
    }
}

impl<T: fmt::Debug, F> fmt::Debug for Heap<T, F>
where
    F: Fn(&T, &T) -> Ordering,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Heap").field("data", &self.data).finish()
    }
}
