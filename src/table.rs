//  Implementation of the `Table`.

use core::{fmt, iter, mem, slice};

use alloc::{boxed::Box, vec::Vec};

use crate::{
    bucket::{double, Bucket, BucketDirector, BucketIter, Expansion, Locate, BUCKET_MAX},
    error::TableError,
    hash::{KeyHash, OneAtATime},
};

/// A hash table mapping byte-string keys to fixed-size values.
///
/// The number of buckets is a power of 2, fixed at construction, and each bucket grows independently as keys collide
/// into it, up to its limit. There is no rehashing: a full bucket rejects new keys with `TableError::Full`.
///
/// #   Keys
///
/// Short keys, up to `DIRECT_KEY_MAX` bytes, are copied into the table. Longer keys are NOT copied: the table only
/// borrows them, for `'k`.
///
/// #   Values
///
/// All values are `value_size` bytes. A value slice returned by `find`, `see`, or an `Entry` mutably borrows the
/// table: any insertion may reallocate the bucket it points into, hence none may occur while it is alive.
pub struct Table<'k, H = OneAtATime> {
    hasher: H,
    mask: u32,
    director: BucketDirector,
    buckets: Box<[Option<Bucket<'k>>]>,
}

impl<'k> Table<'k> {
    /// Creates a new Table of `2^bucket_bits` buckets, hashing with Jenkins' One-at-a-Time.
    ///
    /// To customize the Table, use the `with()` method instead.
    ///
    /// #   Panics
    ///
    /// If `bucket_bits` is greater than 32, or too large for the platform, or if a full bucket of values of
    /// `value_size` bytes would overflow `isize::MAX` bytes.
    pub fn new(bucket_bits: u32, value_size: usize) -> Self {
        Self::with_hasher(bucket_bits, value_size, OneAtATime)
    }
}

impl<'k, H> Table<'k, H> {
    /// Creates a new Table of `2^bucket_bits` buckets, hashing with `hasher`.
    ///
    /// #   Panics
    ///
    /// If `bucket_bits` is greater than 32, or too large for the platform, or if a full bucket of values of
    /// `value_size` bytes would overflow `isize::MAX` bytes.
    pub fn with_hasher(bucket_bits: u32, value_size: usize, hasher: H) -> Self {
        let mut builder = Self::with(hasher, value_size);

        builder.set_bucket_bits(bucket_bits);

        builder.build()
    }

    /// Creates a builder for the Table, allowing finer-grained tuning.
    ///
    /// `value_size` is only validated by `TableBuilder::build`, against the bucket limit then in effect.
    pub fn with(hasher: H, value_size: usize) -> TableBuilder<H> {
        let bucket_bits = 4; //  16 buckets by default.
        let limit = BUCKET_MAX;
        let expansion = double;

        TableBuilder {
            hasher,
            bucket_bits,
            value_size,
            limit,
            expansion,
        }
    }

    /// Returns the number of buckets.
    pub fn number_buckets(&self) -> usize {
        self.buckets.len()
    }

    /// Returns the size of each value, in bytes.
    pub fn value_size(&self) -> usize {
        self.director.value_size()
    }

    /// Returns the number of entries.
    ///
    /// #   Complexity
    ///
    /// O(number-buckets).
    pub fn len(&self) -> usize {
        self.buckets.iter().flatten().map(Bucket::len).sum()
    }

    /// Returns whether the table has no entry.
    ///
    /// #   Complexity
    ///
    /// O(number-buckets).
    pub fn is_empty(&self) -> bool {
        self.buckets.iter().flatten().all(|bucket| bucket.len() == 0)
    }

    /// Removes all entries, retaining the memory of all buckets.
    pub fn clear(&mut self) {
        self.buckets.iter_mut().flatten().for_each(Bucket::clear);
    }

    /// Returns the number of bytes allocated by this instance, excluding the instance itself.
    ///
    /// Meant for diagnostics: it accounts for the array of buckets, and the full capacity of each allocated bucket.
    pub fn memory_usage(&self) -> usize {
        let array = self.buckets.len() * mem::size_of::<Option<Bucket<'k>>>();

        let buckets: usize = self
            .buckets
            .iter()
            .flatten()
            .map(|bucket| bucket.memory_usage(&self.director))
            .sum();

        array + buckets
    }

    /// Iterates over all entries, bucket by bucket, in insertion order within each bucket.
    pub fn iter(&self) -> Iter<'_, 'k> {
        Iter {
            buckets: self.buckets.iter(),
            current: None,
            director: &self.director,
        }
    }
}

impl<'k, H> Table<'k, H>
where
    H: KeyHash,
{
    /// Inserts `key` and `value`, only if `key` is absent.
    ///
    /// Returns `TableError::AlreadySet` if `key` is present, leaving its value untouched, or `TableError::Full` if its
    /// bucket cannot hold another entry.
    ///
    /// #   Panics
    ///
    /// If `value` is not `value_size` bytes, or `key` is longer than `KEY_MAX` bytes.
    pub fn add(&mut self, key: &'k [u8], value: &[u8]) -> Result<(), TableError> {
        self.check_value(value);

        let (slot, inserted) = self.reserve(key)?;

        if !inserted {
            return Err(TableError::AlreadySet);
        }

        slot.copy_from_slice(value);

        Ok(())
    }

    /// Inserts `key` and `value`, overwriting any previous value.
    ///
    /// Returns `TableError::Full` if `key` is absent and its bucket cannot hold another entry.
    ///
    /// #   Panics
    ///
    /// If `value` is not `value_size` bytes, or `key` is longer than `KEY_MAX` bytes.
    pub fn set(&mut self, key: &'k [u8], value: &[u8]) -> Result<(), TableError> {
        self.check_value(value);

        let (slot, _) = self.reserve(key)?;

        slot.copy_from_slice(value);

        Ok(())
    }

    /// Ensures `key` is in the table, inserting it with `default`, or zeroes if None, if it is not.
    ///
    /// Returns `TableError::Full` if `key` is absent and its bucket cannot hold another entry.
    ///
    /// #   Panics
    ///
    /// If `default` is not `value_size` bytes, or `key` is longer than `KEY_MAX` bytes.
    pub fn see(&mut self, key: &'k [u8], default: Option<&[u8]>) -> Result<Seen<'_>, TableError> {
        if let Some(default) = default {
            self.check_value(default);
        }

        let (slot, inserted) = self.reserve(key)?;

        if !inserted {
            return Ok(Seen::Existing(slot));
        }

        if let Some(default) = default {
            slot.copy_from_slice(default);
        }

        Ok(Seen::Inserted(slot))
    }

    /// Returns the value associated to `key`, if any.
    ///
    /// The value may be modified in place.
    pub fn find(&mut self, key: &[u8]) -> Option<&mut [u8]> {
        let index = self.bucket_index(key);

        let bucket = self.buckets[index].as_mut()?;
        let position = bucket.locate(key)?;

        //  Safety:
        //  -   The director of the table is used for all operations.
        Some(unsafe { bucket.value_mut(position, &self.director) })
    }

    /// Returns the value associated to `key`, if any.
    pub fn get(&self, key: &[u8]) -> Option<&[u8]> {
        let bucket = self.buckets[self.bucket_index(key)].as_ref()?;
        let position = bucket.locate(key)?;

        //  Safety:
        //  -   The director of the table is used for all operations.
        Some(unsafe { bucket.value(position, &self.director) })
    }

    /// Returns whether `key` is in the table.
    pub fn contains(&self, key: &[u8]) -> bool {
        self.get(key).is_some()
    }

    /// Verifies that `key` is associated to `value`.
    ///
    /// Returns `TableError::NotFound` if `key` is absent, and `TableError::NotEqual` if associated to another value.
    ///
    /// Values are compared byte-wise: padding bytes of structures are only deterministic if zeroed before insertion.
    ///
    /// #   Panics
    ///
    /// If `value` is not `value_size` bytes.
    pub fn verify(&self, key: &[u8], value: &[u8]) -> Result<(), TableError> {
        self.check_value(value);

        let stored = self.get(key).ok_or(TableError::NotFound)?;

        if stored != value {
            return Err(TableError::NotEqual);
        }

        Ok(())
    }

    /// Removes `key` and its value.
    ///
    /// The subsequent entries of the bucket are shifted down, preserving their order. The bucket retains its capacity.
    ///
    /// Returns `TableError::NotFound` if `key` is absent.
    pub fn remove(&mut self, key: &[u8]) -> Result<(), TableError> {
        let index = self.bucket_index(key);

        let bucket = self.buckets[index].as_mut().ok_or(TableError::NotFound)?;
        let position = bucket.locate(key).ok_or(TableError::NotFound)?;

        //  Safety:
        //  -   The director of the table is used for all operations.
        unsafe { bucket.remove(position, &self.director) };

        Ok(())
    }

    /// Looks up `key` once, returning an `Entry` to inspect, insert, or remove it without looking it up again.
    pub fn entry_find(&mut self, key: &'k [u8]) -> Entry<'_, 'k> {
        let index = self.bucket_index(key);

        let slot = &mut self.buckets[index];
        let position = slot.as_ref().and_then(|bucket| bucket.locate(key));

        Entry {
            slot,
            director: &self.director,
            key,
            position,
        }
    }
}

impl<'k, H> Drop for Table<'k, H> {
    fn drop(&mut self) {
        for bucket in self.buckets.iter_mut().filter_map(Option::take) {
            //  Safety:
            //  -   The director of the table is used for all operations.
            unsafe { bucket.release(&self.director) };
        }
    }
}

impl<'k, H> fmt::Debug for Table<'k, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        write!(f, "{{ director: {:?}, buckets: [", self.director)?;

        let mut first = true;

        for (index, bucket) in self.buckets.iter().enumerate() {
            let Some(bucket) = bucket else { continue };

            let separator = if first { "" } else { ", " };
            first = false;

            write!(f, "{separator}{index}: (")?;

            //  Safety:
            //  -   The director of the table is used for all operations.
            let iterator = unsafe { bucket.iter(&self.director) };

            for (index, (key, value)) in iterator.enumerate() {
                let separator = if index > 0 { ", " } else { "" };

                write!(f, "{separator}")?;

                if let Ok(string) = core::str::from_utf8(key) {
                    write!(f, "{string:?}")?;
                } else {
                    write!(f, "{key:x?}")?;
                }

                write!(f, " -> {value:x?}")?;
            }

            write!(f, ")")?;
        }

        write!(f, "] }}")
    }
}

/// The result of `Table::see`.
#[derive(Debug, Eq, PartialEq)]
pub enum Seen<'a> {
    /// The key was already present, with this value.
    Existing(&'a mut [u8]),
    /// The key was absent, and has just been inserted with this value.
    Inserted(&'a mut [u8]),
}

impl<'a> Seen<'a> {
    /// Returns whether the key has just been inserted.
    pub fn is_inserted(&self) -> bool {
        matches!(self, Self::Inserted(_))
    }

    /// Returns the value, regardless of whether it was just inserted.
    pub fn into_value(self) -> &'a mut [u8] {
        match self {
            Self::Existing(value) | Self::Inserted(value) => value,
        }
    }
}

/// The entry of a key, as looked up by `Table::entry_find`.
///
/// The entry records where the key is, or is to be inserted, so that none of the following operations hashes or scans
/// again. It borrows the table mutably, hence the recorded position cannot be invalidated.
pub struct Entry<'t, 'k> {
    slot: &'t mut Option<Bucket<'k>>,
    director: &'t BucketDirector,
    key: &'k [u8],
    position: Option<usize>,
}

impl<'t, 'k> Entry<'t, 'k> {
    /// Returns the key of the entry.
    pub fn key(&self) -> &'k [u8] {
        self.key
    }

    /// Returns whether the key is in the table.
    pub fn is_found(&self) -> bool {
        self.position.is_some()
    }

    /// Returns the value associated to the key, if any.
    pub fn value(&mut self) -> Option<&mut [u8]> {
        let (bucket, position) = (self.slot.as_mut()?, self.position?);

        //  Safety:
        //  -   The director of the table is used for all operations.
        Some(unsafe { bucket.value_mut(position, self.director) })
    }

    /// Returns the value associated to the key, if any, for the lifetime of the borrow of the table.
    pub fn into_value(self) -> Option<&'t mut [u8]> {
        let Self {
            slot,
            director,
            position,
            ..
        } = self;

        let (bucket, position) = (slot.as_mut()?, position?);

        //  Safety:
        //  -   The director of the table is used for all operations.
        Some(unsafe { bucket.value_mut(position, director) })
    }

    /// Inserts the key with `value`.
    ///
    /// Returns `TableError::AlreadySet` if the key is present, leaving its value untouched, or `TableError::Full` if its
    /// bucket cannot hold another entry.
    ///
    /// #   Panics
    ///
    /// If `value` is not `value_size` bytes, or the key is longer than `KEY_MAX` bytes.
    pub fn insert(self, value: &[u8]) -> Result<&'t mut [u8], TableError> {
        assert_eq!(self.director.value_size(), value.len(), "value of invalid size");

        if self.position.is_some() {
            return Err(TableError::AlreadySet);
        }

        let Self {
            slot, director, key, ..
        } = self;

        let bucket = slot.get_or_insert_with(|| {
            log::trace!("allocating bucket");

            Bucket::allocate(director)
        });

        //  Safety:
        //  -   `key` is absent, as the table was borrowed since looking it up.
        //  -   The director of the table is used for all operations.
        let position = unsafe { bucket.push(key, director) }.ok_or(TableError::Full)?;

        //  Safety:
        //  -   The director of the table is used for all operations.
        let slot = unsafe { bucket.value_mut(position, director) };

        slot.copy_from_slice(value);

        Ok(slot)
    }

    /// Removes the key and its value.
    ///
    /// Returns `TableError::NotFound` if the key is absent.
    pub fn remove(self) -> Result<(), TableError> {
        let (Some(bucket), Some(position)) = (self.slot.as_mut(), self.position) else {
            return Err(TableError::NotFound);
        };

        //  Safety:
        //  -   The director of the table is used for all operations.
        unsafe { bucket.remove(position, self.director) };

        Ok(())
    }
}

impl fmt::Debug for Entry<'_, '_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        f.debug_struct("Entry")
            .field("key", &self.key)
            .field("position", &self.position)
            .finish()
    }
}

/// An iterator over the entries of a `Table`.
pub struct Iter<'a, 'k> {
    buckets: slice::Iter<'a, Option<Bucket<'k>>>,
    current: Option<BucketIter<'a, 'k>>,
    director: &'a BucketDirector,
}

impl<'a> Iterator for Iter<'a, '_> {
    type Item = (&'a [u8], &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(entry) = self.current.as_mut().and_then(|current| current.next()) {
                return Some(entry);
            }

            let bucket = self.buckets.next()?;
            let director = self.director;

            //  Safety:
            //  -   The director of the table is used for all operations.
            self.current = bucket.as_ref().map(|bucket| unsafe { bucket.iter(director) });
        }
    }
}

impl iter::FusedIterator for Iter<'_, '_> {}

/// A builder for the Table.
pub struct TableBuilder<H> {
    hasher: H,
    bucket_bits: u32,
    value_size: usize,
    limit: u16,
    expansion: Expansion,
}

impl<H> TableBuilder<H> {
    /// Sets the number of buckets, as a power of 2.
    ///
    /// #   Panics
    ///
    /// If `bucket_bits` is greater than 32, or too large for the platform.
    pub fn set_bucket_bits(&mut self, bucket_bits: u32) -> &mut Self {
        assert!(bucket_bits <= 32, "at most 2^32 buckets, not 2^{bucket_bits}");
        assert!(bucket_bits < usize::BITS, "2^{bucket_bits} buckets cannot be addressed");

        self.bucket_bits = bucket_bits;
        self
    }

    /// Sets the maximum number of entries of a single bucket.
    ///
    /// A lower limit lets callers detect skewed distributions, and reshard, earlier.
    ///
    /// #   Panics
    ///
    /// If `limit` is 0.
    pub fn set_bucket_limit(&mut self, limit: u16) -> &mut Self {
        assert!(limit > 0, "a bucket must hold at least one entry");

        self.limit = limit;
        self
    }

    /// Sets the expansion function of the buckets, which doubles the capacity by default.
    ///
    /// Whatever the function returns is clamped to the bucket limit, then raised to fit the pending insertion.
    pub fn set_expansion(&mut self, expansion: Expansion) -> &mut Self {
        self.expansion = expansion;
        self
    }

    /// Builds a Table with the current configuration.
    ///
    /// Buckets are allocated lazily, only the array of buckets is allocated upfront.
    ///
    /// #   Panics
    ///
    /// If a bucket of `limit` values of `value_size` bytes would overflow `isize::MAX` bytes.
    pub fn build<'k>(self) -> Table<'k, H> {
        let number_buckets = 1usize << self.bucket_bits;
        let mask = ((1u64 << self.bucket_bits) - 1) as u32;

        let director = BucketDirector::new(self.value_size, self.limit, self.expansion);

        let buckets: Vec<_> = iter::repeat_with(|| None).take(number_buckets).collect();

        log::debug!("building table of {number_buckets} buckets, with {director:?}");

        Table {
            hasher: self.hasher,
            mask,
            director,
            buckets: buckets.into_boxed_slice(),
        }
    }
}

impl<H> fmt::Debug for TableBuilder<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        f.debug_struct("TableBuilder")
            .field("bucket_bits", &self.bucket_bits)
            .field("value_size", &self.value_size)
            .field("limit", &self.limit)
            .finish()
    }
}

//
//  Implementation
//

impl<'k, H> Table<'k, H> {
    #[inline(always)]
    fn check_value(&self, value: &[u8]) {
        assert_eq!(self.director.value_size(), value.len(), "value of invalid size");
    }
}

impl<'k, H> Table<'k, H>
where
    H: KeyHash,
{
    #[inline(always)]
    fn bucket_index(&self, key: &[u8]) -> usize {
        (self.hasher.hash(key) & self.mask) as usize
    }

    //  Locates `key`, or inserts it with a zeroed value, returning its value and whether it was inserted.
    fn reserve(&mut self, key: &'k [u8]) -> Result<(&mut [u8], bool), TableError> {
        let index = self.bucket_index(key);
        let director = &self.director;

        let bucket = self.buckets[index].get_or_insert_with(|| {
            log::trace!("allocating bucket {index}");

            Bucket::allocate(director)
        });

        //  Safety:
        //  -   The director of the table is used for all operations.
        let (position, inserted) = match unsafe { bucket.locate_or_reserve(key, director) } {
            Locate::Full => return Err(TableError::Full),
            Locate::Found(position) => (position, false),
            Locate::Inserted(position) => (position, true),
        };

        //  Safety:
        //  -   The director of the table is used for all operations.
        let value = unsafe { bucket.value_mut(position, director) };

        Ok((value, inserted))
    }
}

#[doc(hidden)]
pub mod compile_tests {

    //  Bad enough it needs to be `pub`, there's really no sense in exposing it any further.
    #![allow(dead_code)]

    /// ```compile_fail,E0499
    /// let mut table = endor_htable::Table::new(2, 4);
    ///
    /// table.set(b"ab", &[1, 0, 0, 0]).unwrap();
    ///
    /// let value = table.find(b"ab").unwrap();
    ///
    /// //  May reallocate the bucket `value` points into.
    /// table.set(b"cd", &[2, 0, 0, 0]).unwrap();
    ///
    /// value[0] = 3;
    /// ```
    pub fn value_invalidated_by_insertion() {}

    /// ```compile_fail,E0499
    /// let mut table = endor_htable::Table::new(2, 4);
    ///
    /// let value = table.see(b"ab", None).unwrap().into_value();
    ///
    /// table.remove(b"cd").unwrap_err();
    ///
    /// value[0] = 3;
    /// ```
    pub fn value_invalidated_by_removal() {}

    /// ```compile_fail,E0597
    /// let mut table = endor_htable::Table::new(2, 4);
    ///
    /// {
    ///     let key = vec![b'k'; 32];
    ///
    ///     table.set(&key, &[1, 0, 0, 0]).unwrap();
    /// }
    ///
    /// assert!(table.contains(&[b'k'; 32]));
    /// ```
    pub fn key_outlives_table() {}

    /// ```compile_fail,E0277
    /// fn ensure_send<T: Send>() {}
    ///
    /// struct NoSendH(std::rc::Rc<u32>);
    ///
    /// ensure_send::<endor_htable::Table<'static, NoSendH>>();
    /// ```
    pub fn table_not_send_if_hasher_not_send() {}

    /// ```compile_fail,E0277
    /// fn ensure_sync<T: Sync>() {}
    ///
    /// struct NoSyncH(std::cell::Cell<u32>);
    ///
    /// ensure_sync::<endor_htable::Table<'static, NoSyncH>>();
    /// ```
    pub fn table_not_sync_if_hasher_not_sync() {}
} // mod compile_tests

// mod tests
