//! Bucketed hash table, mapping byte-string keys to fixed-size values.
//!
//! The `Table` is a plain, single-threaded, hash table designed to avoid one allocation per key: short keys are stored
//! in place, while long keys are borrowed from the caller rather than copied.
//!
//!
//! #   How to use?
//!
//! If you just want to get going, use the `new` method, and you'll get a table hashing with Jenkins' One-at-a-Time,
//! which will be quite fine.
//!
//! ```
//! use endor_htable::{Table, TableError};
//!
//! let mut table = Table::new(2, 4);
//!
//! table.set(b"ab", &1u32.to_le_bytes()).unwrap();
//! table.set(b"cd", &2u32.to_le_bytes()).unwrap();
//!
//! assert_eq!(Err(TableError::AlreadySet), table.add(b"ab", &3u32.to_le_bytes()));
//! assert_eq!(Some(&1u32.to_le_bytes()[..]), table.get(b"ab"));
//!
//! table.remove(b"ab").unwrap();
//!
//! assert_eq!(None, table.get(b"ab"));
//! assert_eq!(Some(&2u32.to_le_bytes()[..]), table.get(b"cd"));
//! ```
//!
//! You can always tune it later, using the configuration options.
//!
//!
//! #   Configuration options
//!
//! The `Table` offers multiple configuration options, available via the `TableBuilder`:
//!
//! -   The hashing algorithm can be tuned, it defaults to Jenkins' One-at-a-Time. Hsieh's SuperFastHash is also
//!     provided, and any `Fn(&[u8]) -> u32` or `BuildHasher` can be used.
//! -   The number of buckets can be tuned, it defaults to 16. It is fixed for the lifetime of the table.
//! -   The expansion function of the buckets can be tuned, it defaults to doubling.
//! -   The maximum number of entries per bucket can be lowered, it defaults to 65535.
//!
//!
//! #   Limits
//!
//! The `Table` has some hard limits, due to design constraints:
//!
//! -   It supports only up to 2**32 buckets.
//! -   It supports only up to 65535 entries per bucket, further insertions in a full bucket fail.
//! -   It supports only keys up to 65535 bytes.
//!
//!
//! #   Internals
//!
//! The `Table` is an array of lazily allocated buckets, indexed by the low bits of the hash of the key.
//!
//! Each bucket is a single allocation: a small header, followed by an array of key slots, followed by an array of
//! values. Growing a bucket thus requires moving its values after the newly enlarged array of key slots.
//!
//! Each key slot is either:
//!
//! -   Direct: up to `DIRECT_KEY_MAX` bytes, stored in place.
//! -   Indirect: a length, and a pointer to the caller's memory. The key is NOT copied, and the table borrows it for
//!     its whole lifetime.
//!
//! Lookups scan the bucket linearly, in insertion order. Removals shift the subsequent entries down, preserving order.

//  Use only core and alloc, guaranteeing no I/O nor threads.
#![cfg_attr(not(test), no_std)]
//  Ensure unsafe operations are duly checked.
#![deny(unsafe_op_in_unsafe_fn)]
//  Ensure proper documentation.
#![deny(missing_docs)]

//  Non-core must be explicitly depended on in no_std.
extern crate alloc;

mod bucket;
mod error;
mod hash;
mod key;
mod table;

pub use bucket::{double, Expansion, BUCKET_MAX};
pub use error::TableError;
pub use hash::{BuildHasherKeyHash, KeyHash, OneAtATime, SuperFast};
pub use key::{DIRECT_KEY_MAX, KEY_MAX};
pub use table::{Entry, Iter, Seen, Table, TableBuilder};
