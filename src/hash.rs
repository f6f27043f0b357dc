//  Hash strategies, reducing a key to a 32-bits digest.
//
//  Only the low bits of the digest select a bucket, hence the quality of the low bits is what matters.

use core::hash::{BuildHasher, Hasher};

/// A strategy to hash a key.
///
/// Implementations must be pure: the same bytes must always produce the same digest, for the lifetime of the table.
///
/// Any `Fn(&[u8]) -> u32` is a strategy, which is handy to force collisions in tests.
pub trait KeyHash {
    /// Computes the digest of `key`.
    fn hash(&self, key: &[u8]) -> u32;
}

impl<F> KeyHash for F
where
    F: Fn(&[u8]) -> u32,
{
    #[inline(always)]
    fn hash(&self, key: &[u8]) -> u32 {
        self(key)
    }
}

/// Bob Jenkins' One-at-a-Time hash.
///
/// Mixes the key one byte at a time, then avalanches the result in 3 rounds. Simple, and good distribution in the low
/// bits, but not the fastest.
///
/// Bytes are sign-extended prior to mixing, as `char` is on x86.
///
/// See `http://www.burtleburtle.net/bob/hash/doobs.html`.
#[derive(Clone, Copy, Debug, Default)]
pub struct OneAtATime;

impl KeyHash for OneAtATime {
    #[inline]
    fn hash(&self, key: &[u8]) -> u32 {
        let mut hash = 0u32;

        for &byte in key {
            hash = hash.wrapping_add(sign_extend(byte));
            hash = hash.wrapping_add(hash << 10);
            hash ^= hash >> 6;
        }

        hash = hash.wrapping_add(hash << 3);
        hash ^= hash >> 11;
        hash.wrapping_add(hash << 15)
    }
}

/// Paul Hsieh's SuperFastHash.
///
/// Processes the key 4 bytes at a time, as two little-endian halfwords, then mixes the 1 to 3 trailing bytes and
/// avalanches the result in 6 rounds.
///
/// The empty key hashes to 0.
///
/// See `http://www.azillionmonkeys.com/qed/hash.html`.
#[derive(Clone, Copy, Debug, Default)]
pub struct SuperFast;

impl KeyHash for SuperFast {
    #[inline]
    fn hash(&self, key: &[u8]) -> u32 {
        if key.is_empty() {
            return 0;
        }

        let mut hash = key.len() as u32;
        let mut bytes = key;

        while let Some((block, rest)) = bytes.split_first_chunk::<4>() {
            let (low, high) = (halfword(block[0], block[1]), halfword(block[2], block[3]));

            hash = hash.wrapping_add(low);

            let tmp = (high << 11) ^ hash;

            hash = (hash << 16) ^ tmp;
            hash = hash.wrapping_add(hash >> 11);

            bytes = rest;
        }

        match *bytes {
            [a, b, c] => {
                hash = hash.wrapping_add(halfword(a, b));
                hash ^= hash << 16;
                hash ^= sign_extend(c) << 18;
                hash = hash.wrapping_add(hash >> 11);
            }
            [a, b] => {
                hash = hash.wrapping_add(halfword(a, b));
                hash ^= hash << 11;
                hash = hash.wrapping_add(hash >> 17);
            }
            [a] => {
                hash = hash.wrapping_add(sign_extend(a));
                hash ^= hash << 10;
                hash = hash.wrapping_add(hash >> 1);
            }
            _ => (),
        }

        //  Force "avalanching" of the final bits.
        hash ^= hash << 3;
        hash = hash.wrapping_add(hash >> 5);
        hash ^= hash << 4;
        hash = hash.wrapping_add(hash >> 17);
        hash ^= hash << 25;
        hash.wrapping_add(hash >> 6)
    }
}

/// Adapts any `BuildHasher`, such as Fx Hash or SipHash, into a `KeyHash`.
///
/// The 64-bits result of the `Hasher` is folded in half, so that its high bits also influence bucket selection.
#[derive(Clone, Copy, Debug, Default)]
pub struct BuildHasherKeyHash<B>(
    /// The adapted `BuildHasher`.
    pub B,
);

impl<B> KeyHash for BuildHasherKeyHash<B>
where
    B: BuildHasher,
{
    #[inline]
    fn hash(&self, key: &[u8]) -> u32 {
        let mut hasher = self.0.build_hasher();

        hasher.write(key);

        let hash = hasher.finish();

        (hash ^ (hash >> 32)) as u32
    }
}

//
//  Implementation
//

#[inline(always)]
fn sign_extend(byte: u8) -> u32 {
    byte as i8 as u32
}

#[inline(always)]
fn halfword(low: u8, high: u8) -> u32 {
    u32::from(u16::from_le_bytes([low, high]))
}

// mod tests
