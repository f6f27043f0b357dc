//  A single bucket of the table, holding all entries whose hash collides.
//
//  A bucket is a single allocation: a header, followed by `capacity` key slots, followed by `capacity` values.

use core::{
    alloc::Layout,
    fmt,
    marker::PhantomData,
    mem,
    ptr::{self, NonNull},
    slice,
};

use alloc::alloc::{alloc, dealloc, handle_alloc_error, realloc};

use crate::key::Key;

/// The maximum number of entries of any bucket.
pub const BUCKET_MAX: u16 = u16::MAX;

/// The expansion function of a bucket, returning the new capacity from the current one.
///
/// The result is clamped to the bucket limit, then raised to at least the capacity required by the insertion.
pub type Expansion = fn(usize) -> usize;

/// The default expansion function, doubling the capacity.
pub fn double(capacity: usize) -> usize {
    capacity.saturating_mul(2)
}

/// Common fields of all buckets.
pub(crate) struct BucketDirector {
    value_size: usize,
    limit: u16,
    expansion: Expansion,
}

impl BucketDirector {
    /// Creates a new director.
    ///
    /// #   Panics
    ///
    /// If a bucket of `limit` entries of `value_size` bytes would overflow `isize::MAX` bytes.
    pub(crate) fn new(value_size: usize, limit: u16, expansion: Expansion) -> Self {
        debug_assert!(limit > 0);

        let director = Self {
            value_size,
            limit,
            expansion,
        };

        //  No bucket ever exceeds `limit` entries, hence all layouts of this director are valid.
        assert!(
            director.try_layout(limit as usize).is_some(),
            "a bucket of {limit} values of {value_size} bytes would overflow `isize::MAX` bytes"
        );

        director
    }

    /// Returns the size of a value, in bytes.
    pub(crate) fn value_size(&self) -> usize {
        self.value_size
    }

    /// Returns the maximum number of entries of a bucket.
    pub(crate) fn limit(&self) -> u16 {
        self.limit
    }
}

impl fmt::Debug for BucketDirector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        f.debug_struct("BucketDirector")
            .field("value_size", &self.value_size)
            .field("limit", &self.limit)
            .finish()
    }
}

/// The outcome of `Bucket::locate_or_reserve`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub(crate) enum Locate {
    /// The key is absent, and the bucket cannot hold any more entries.
    Full,
    /// The key is present, at this index.
    Found(usize),
    /// The key was absent, and has been appended at this index, with a zeroed value.
    Inserted(usize),
}

/// A growable array of entries.
///
/// The bucket does not know the size of its values, nor its growth policy: the `BucketDirector` does. The same
/// director must be used for all operations on a given bucket, from allocation to release.
pub(crate) struct Bucket<'k> {
    header: NonNull<BucketHeader>,
    _marker: PhantomData<Key<'k>>,
}

impl<'k> Bucket<'k> {
    /// Allocates a new, empty, bucket able to hold a single entry.
    pub(crate) fn allocate(director: &BucketDirector) -> Self {
        let layout = director.layout(1);

        //  Safety:
        //  -   `layout` has a non-zero size, as it always contains the header.
        let pointer = unsafe { alloc(layout) };

        let Some(pointer) = NonNull::new(pointer) else { handle_alloc_error(layout) };

        let header = pointer.cast::<BucketHeader>();

        //  Safety:
        //  -   `header` is valid for writes, it's just freshly allocated.
        //  -   `header` is aligned for `BucketHeader`, as is the layout.
        unsafe {
            ptr::write(
                header.as_ptr(),
                BucketHeader {
                    length: 0,
                    capacity: 1,
                    _align: [],
                },
            )
        };

        Self {
            header,
            _marker: PhantomData,
        }
    }

    /// Releases the memory of the bucket.
    ///
    /// #   Safety
    ///
    /// This `director` must have been used for all operations on this instance.
    pub(crate) unsafe fn release(self, director: &BucketDirector) {
        let layout = director.layout(self.capacity());

        //  Safety:
        //  -   `self.header` was allocated by the global allocator.
        //  -   `layout` is the layout of the current allocation, as the same `director` was used throughout.
        unsafe { dealloc(self.header.as_ptr().cast(), layout) }
    }

    /// Returns the number of entries.
    #[inline(always)]
    pub(crate) fn len(&self) -> usize {
        self.header().length as usize
    }

    /// Returns the number of entries the bucket can hold without growing.
    #[inline(always)]
    pub(crate) fn capacity(&self) -> usize {
        self.header().capacity as usize
    }

    /// Forgets all entries, retaining the memory.
    pub(crate) fn clear(&mut self) {
        self.header_mut().length = 0;
    }

    /// Returns the number of bytes allocated for this bucket.
    pub(crate) fn memory_usage(&self, director: &BucketDirector) -> usize {
        director.layout(self.capacity()).size()
    }

    /// Returns the keys of all entries, in insertion order.
    #[inline]
    pub(crate) fn keys(&self) -> &[Key<'k>] {
        //  Safety:
        //  -   The first `length` key slots are initialized.
        //  -   The slice borrows `self`, hence cannot outlive a reallocation.
        unsafe { slice::from_raw_parts(self.keys_pointer(), self.len()) }
    }

    /// Returns the index of `key`, if present.
    ///
    /// #   Complexity
    ///
    /// O(self.len()), due to the linear scan.
    #[inline]
    pub(crate) fn locate(&self, key: &[u8]) -> Option<usize> {
        self.keys().iter().position(|candidate| candidate.matches(key))
    }

    /// Locates `key`, or appends it if absent.
    ///
    /// #   Safety
    ///
    /// This `director` must have been used for all operations on this instance.
    ///
    /// #   Complexity
    ///
    /// -   O(self.len()) due to the linear scan.
    /// -   O(self.capacity()) if the bucket grows, as the values are moved.
    pub(crate) unsafe fn locate_or_reserve(&mut self, key: &'k [u8], director: &BucketDirector) -> Locate {
        if let Some(index) = self.locate(key) {
            return Locate::Found(index);
        }

        //  Safety:
        //  -   `key` is absent.
        //  -   This `director` was used for all operations.
        match unsafe { self.push(key, director) } {
            Some(index) => Locate::Inserted(index),
            None => Locate::Full,
        }
    }

    /// Appends `key`, without checking whether it is already present.
    ///
    /// The value of the new entry is zeroed. Returns the index of the new entry, or None if the bucket is full.
    ///
    /// #   Panics
    ///
    /// If `key` is longer than `KEY_MAX`, even if the bucket is full.
    ///
    /// #   Safety
    ///
    /// -   `key` must be absent from this instance.
    /// -   This `director` must have been used for all operations on this instance.
    pub(crate) unsafe fn push(&mut self, key: &'k [u8], director: &BucketDirector) -> Option<usize> {
        let key = Key::new(key);
        let index = self.len();

        if index >= director.limit() as usize {
            log::debug!("bucket full at {index} entries");

            return None;
        }

        if index == self.capacity() {
            //  Safety:
            //  -   `index + 1 <= director.limit()`.
            //  -   This `director` was used for all operations.
            unsafe { self.grow(index + 1, director) };
        }

        debug_assert!(index < self.capacity());

        //  Safety:
        //  -   `index < self.capacity()`, hence the key slot is within the allocation.
        unsafe { ptr::write(self.keys_pointer().add(index), key) };

        //  Safety:
        //  -   `index < self.capacity()`, hence the value slot is within the allocation.
        unsafe { ptr::write_bytes(self.value_pointer(index, director), 0, director.value_size()) };

        self.header_mut().length += 1;

        Some(index)
    }

    /// Returns the value at `index`.
    ///
    /// #   Panics
    ///
    /// If `index` is out of bounds.
    ///
    /// #   Safety
    ///
    /// This `director` must have been used for all operations on this instance.
    #[inline]
    pub(crate) unsafe fn value(&self, index: usize, director: &BucketDirector) -> &[u8] {
        assert!(index < self.len());

        //  Safety:
        //  -   `index < self.len()`, hence the value is within the allocation, and initialized.
        //  -   The slice borrows `self`, hence cannot outlive a reallocation.
        unsafe { slice::from_raw_parts(self.value_pointer(index, director), director.value_size()) }
    }

    /// Returns the value at `index`.
    ///
    /// #   Panics
    ///
    /// If `index` is out of bounds.
    ///
    /// #   Safety
    ///
    /// This `director` must have been used for all operations on this instance.
    #[inline]
    pub(crate) unsafe fn value_mut(&mut self, index: usize, director: &BucketDirector) -> &mut [u8] {
        assert!(index < self.len());

        //  Safety:
        //  -   `index < self.len()`, hence the value is within the allocation, and initialized.
        //  -   The slice borrows `self` mutably, hence is the only access to this memory for its lifetime.
        unsafe { slice::from_raw_parts_mut(self.value_pointer(index, director), director.value_size()) }
    }

    /// Removes the entry at `index`, shifting all subsequent entries down by one.
    ///
    /// #   Panics
    ///
    /// If `index` is out of bounds.
    ///
    /// #   Safety
    ///
    /// This `director` must have been used for all operations on this instance.
    pub(crate) unsafe fn remove(&mut self, index: usize, director: &BucketDirector) {
        let length = self.len();

        assert!(index < length);

        let (trailing, value_size) = (length - index - 1, director.value_size());

        //  Safety:
        //  -   `index + 1 + trailing == length`, hence both ranges are within the initialized key slots.
        //  -   `ptr::copy` supports overlapping ranges.
        unsafe {
            let keys = self.keys_pointer();

            ptr::copy(keys.add(index + 1), keys.add(index), trailing);
        }

        //  Safety:
        //  -   `index + 1 + trailing == length`, hence both ranges are within the initialized values.
        //  -   `ptr::copy` supports overlapping ranges.
        unsafe {
            let values = self.value_pointer(0, director);

            ptr::copy(
                values.add((index + 1) * value_size),
                values.add(index * value_size),
                trailing * value_size,
            );
        }

        self.header_mut().length -= 1;
    }

    /// Iterates over all entries, in insertion order.
    ///
    /// #   Safety
    ///
    /// This `director` must have been used for all operations on this instance.
    pub(crate) unsafe fn iter<'a>(&'a self, director: &'a BucketDirector) -> BucketIter<'a, 'k> {
        BucketIter {
            bucket: self,
            director,
            index: 0,
        }
    }
}

/// An iterator over the entries of a bucket, in insertion order.
pub(crate) struct BucketIter<'a, 'k> {
    bucket: &'a Bucket<'k>,
    director: &'a BucketDirector,
    index: usize,
}

impl<'a> Iterator for BucketIter<'a, '_> {
    type Item = (&'a [u8], &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        let key = self.bucket.keys().get(self.index)?;

        //  Safety:
        //  -   This `director` was used for all operations, as guaranteed by `Bucket::iter`.
        let value = unsafe { self.bucket.value(self.index, self.director) };

        self.index += 1;

        Some((key.as_bytes(), value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.bucket.len() - self.index;

        (remaining, Some(remaining))
    }
}

impl fmt::Debug for Bucket<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        f.debug_struct("Bucket")
            .field("length", &self.len())
            .field("capacity", &self.capacity())
            .field("keys", &self.keys())
            .finish()
    }
}

//
//  Implementation
//

const HEADER_SIZE: usize = mem::size_of::<BucketHeader>();
const KEY_SIZE: usize = mem::size_of::<Key<'static>>();

#[repr(C)]
struct BucketHeader {
    length: u16,
    capacity: u16,
    //  Key slots immediately follow the header, hence its size must be a multiple of their alignment.
    _align: [Key<'static>; 0],
}

impl BucketDirector {
    //  Returns the layout of a bucket of `capacity` entries, with `capacity` no greater than the limit.
    fn layout(&self, capacity: usize) -> Layout {
        debug_assert!(capacity <= self.limit as usize);

        self.try_layout(capacity).expect("Bucket not to overflow `isize::MAX` bytes")
    }

    //  Returns the layout of a bucket of `capacity` entries, if it fits in `isize::MAX` bytes.
    //
    //  The layout matches `header | keys[capacity] | values[capacity]`, without any padding.
    fn try_layout(&self, capacity: usize) -> Option<Layout> {
        let size = KEY_SIZE
            .checked_add(self.value_size)
            .and_then(|entry| capacity.checked_mul(entry))
            .and_then(|entries| entries.checked_add(HEADER_SIZE))?;

        Layout::from_size_align(size, mem::align_of::<BucketHeader>()).ok()
    }

    //  Returns the offset of the value at `index`, in a bucket of `capacity` entries.
    //
    //  All values follow all keys, hence the offset of every value depends on the capacity.
    fn value_offset(&self, capacity: usize, index: usize) -> usize {
        HEADER_SIZE + capacity * KEY_SIZE + index * self.value_size
    }
}

impl<'k> Bucket<'k> {
    #[inline(always)]
    fn header(&self) -> &BucketHeader {
        //  Safety:
        //  -   The pointer is properly aligned, and points to an initialized header.
        //  -   The lifetime is tied to `self`, preventing de-allocation or re-allocation.
        unsafe { self.header.as_ref() }
    }

    #[inline(always)]
    fn header_mut(&mut self) -> &mut BucketHeader {
        //  Safety:
        //  -   The pointer is properly aligned, and points to an initialized header.
        //  -   The lifetime is tied to `self`, which is borrowed mutably.
        unsafe { self.header.as_mut() }
    }

    #[inline(always)]
    fn keys_pointer(&self) -> *mut Key<'k> {
        //  Safety:
        //  -   The key slots start right after the header, within the allocation.
        unsafe { self.header.as_ptr().cast::<u8>().add(HEADER_SIZE).cast() }
    }

    //  Returns a pointer to the value slot at `index`, which need not be initialized.
    //
    //  #   Safety
    //
    //  -   `index` must be less than or equal to `self.capacity()`.
    //  -   This `director` must have been used for all operations on this instance.
    #[inline(always)]
    unsafe fn value_pointer(&self, index: usize, director: &BucketDirector) -> *mut u8 {
        debug_assert!(index <= self.capacity());

        let offset = director.value_offset(self.capacity(), index);

        //  Safety:
        //  -   `index <= self.capacity()`, hence `offset` is within, or one past the end of, the allocation.
        unsafe { self.header.as_ptr().cast::<u8>().add(offset) }
    }

    //  Grows the bucket to hold at least `required` entries.
    //
    //  This is the only operation reshaping the layout: the values are moved after the last key slot.
    //
    //  #   Safety
    //
    //  -   `required` must be greater than `self.capacity()`, and no greater than `director.limit()`.
    //  -   This `director` must have been used for all operations on this instance.
    #[cold]
    #[inline(never)]
    unsafe fn grow(&mut self, required: usize, director: &BucketDirector) {
        let (length, capacity, limit) = (self.len(), self.capacity(), director.limit() as usize);

        debug_assert!(capacity < required);
        debug_assert!(required <= limit);

        let new_capacity = (director.expansion)(capacity).min(limit).max(required);

        log::debug!("growing bucket from {capacity} to {new_capacity} entries");

        let old_layout = director.layout(capacity);
        let new_layout = director.layout(new_capacity);

        //  Safety:
        //  -   `self.header` was allocated by the global allocator, with `old_layout`.
        //  -   `new_layout` has the same alignment, and a non-zero size.
        let pointer = unsafe { realloc(self.header.as_ptr().cast(), old_layout, new_layout.size()) };

        let Some(pointer) = NonNull::new(pointer) else { handle_alloc_error(new_layout) };

        self.header = pointer.cast();

        let (source, destination) = (
            director.value_offset(capacity, 0),
            director.value_offset(new_capacity, 0),
        );

        //  Safety:
        //  -   Both ranges are within the new allocation, as `new_capacity > capacity`.
        //  -   The source range holds the `length` initialized values, preserved by `realloc`.
        //  -   `ptr::copy` supports overlapping ranges.
        unsafe {
            let base = pointer.as_ptr();

            ptr::copy(
                base.add(source),
                base.add(destination),
                length * director.value_size(),
            );
        }

        self.header_mut().capacity = new_capacity as u16;
    }
}

//  Safety:
//  -   A bucket exclusively owns its allocation, and only shares the indirect keys' bytes, hence is as thread-safe as
//      `&'k [u8]`.
unsafe impl Send for Bucket<'_> {}
unsafe impl Sync for Bucket<'_> {}

// mod tests
