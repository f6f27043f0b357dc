//  The encoding of a key within a bucket slot.

use core::{fmt, marker::PhantomData, mem, ptr::NonNull, slice};

/// The maximum length of a key stored in place, within its slot.
///
/// Longer keys are stored as a length and a reference to the caller's memory, and are never copied.
///
/// This is 14 bytes with 64-bits pointers, and 6 bytes with 32-bits pointers, one byte less than a slot packing its
/// direct/indirect flag and its length in a single byte would allow: the enum discriminant takes a byte of its own.
pub const DIRECT_KEY_MAX: usize = 2 * mem::size_of::<usize>() - 2;

/// The maximum length of any key.
pub const KEY_MAX: usize = u16::MAX as usize;

/// A key, as stored in a slot.
///
/// A `Direct` key owns a copy of its bytes, an `Indirect` key borrows them for `'k`. Which is which is purely a
/// storage concern: two keys are equal if their bytes are, regardless of where these bytes live.
#[derive(Clone, Copy)]
pub(crate) enum Key<'k> {
    /// Bytes stored in place, only the first `length` bytes are meaningful.
    Direct {
        length: u8,
        bytes: [u8; DIRECT_KEY_MAX],
    },
    /// Bytes stored out of place, in memory owned by the caller.
    Indirect {
        length: u16,
        pointer: NonNull<u8>,
        _marker: PhantomData<&'k [u8]>,
    },
}

impl<'k> Key<'k> {
    /// Encodes `key`, copying it in place if it is short enough.
    ///
    /// #   Panics
    ///
    /// If `key` is longer than `KEY_MAX`.
    #[inline]
    pub(crate) fn new(key: &'k [u8]) -> Self {
        assert!(key.len() <= KEY_MAX, "key of {} bytes, maximum is {KEY_MAX}", key.len());

        if key.len() <= DIRECT_KEY_MAX {
            let mut bytes = [0; DIRECT_KEY_MAX];
            bytes[..key.len()].copy_from_slice(key);

            return Self::Direct {
                length: key.len() as u8,
                bytes,
            };
        }

        Self::Indirect {
            length: key.len() as u16,
            pointer: NonNull::from(key).cast(),
            _marker: PhantomData,
        }
    }

    /// Returns whether the key is stored in place.
    #[cfg(test)]
    pub(crate) fn is_direct(&self) -> bool {
        matches!(self, Self::Direct { .. })
    }

    /// Returns the length of the key, in bytes.
    #[inline(always)]
    pub(crate) fn len(&self) -> usize {
        match *self {
            Self::Direct { length, .. } => length as usize,
            Self::Indirect { length, .. } => length as usize,
        }
    }

    /// Returns the bytes of the key.
    #[inline]
    pub(crate) fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Direct { length, bytes } => &bytes[..*length as usize],
            Self::Indirect {
                length, pointer, ..
            } => {
                //  Safety:
                //  -   `pointer` and `length` were obtained from a `&'k [u8]`, and `'k` is still alive as `self` is.
                unsafe { slice::from_raw_parts(pointer.as_ptr(), *length as usize) }
            }
        }
    }

    /// Returns whether the key matches `other`.
    ///
    /// Lengths are compared first, so that mismatched keys are rejected without touching their bytes.
    #[inline]
    pub(crate) fn matches(&self, other: &[u8]) -> bool {
        self.len() == other.len() && self.as_bytes() == other
    }
}

impl fmt::Debug for Key<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        let kind = match self {
            Self::Direct { .. } => "Direct",
            Self::Indirect { .. } => "Indirect",
        };

        f.debug_tuple(kind).field(&self.as_bytes()).finish()
    }
}

// mod tests
