/// Behavioral tests of the table, through its public API.
///
/// Reminder: the capacity ceiling test is heavy, and only runs in release, run it with `cargo test --release`.
use endor_htable::{
    BuildHasherKeyHash, OneAtATime, SuperFast, Table, TableError, BUCKET_MAX, DIRECT_KEY_MAX,
};

fn collide(_: &[u8]) -> u32 {
    0
}

#[test]
fn scenario() {
    let mut table = Table::new(2, 4);

    table.set(b"ab", &0x1u32.to_ne_bytes()).unwrap();
    table.set(b"cd", &0x2u32.to_ne_bytes()).unwrap();

    assert_eq!(Some(&0x1u32.to_ne_bytes()[..]), table.get(b"ab"));

    assert_eq!(Ok(()), table.remove(b"ab"));

    assert_eq!(None, table.find(b"ab"));
    assert_eq!(Some(&mut 0x2u32.to_ne_bytes()[..]), table.find(b"cd"));
}

#[test]
fn round_trip_all_strategies() {
    let words = words();

    round_trip(Table::with_hasher(3, 8, OneAtATime), &words);
    round_trip(Table::with_hasher(3, 8, SuperFast), &words);
    round_trip(Table::with_hasher(3, 8, BuildHasherKeyHash(fxhash::FxBuildHasher::default())), &words);
    round_trip(Table::with_hasher(3, 8, collide), &words);
}

#[test]
fn add_does_not_overwrite() {
    let mut table = Table::new(4, 2);

    assert_eq!(Ok(()), table.add(b"key", &[1, 1]));
    assert_eq!(Err(TableError::AlreadySet), table.add(b"key", &[2, 2]));

    assert_eq!(Some(&[1u8, 1][..]), table.get(b"key"));
    assert_eq!(Err(TableError::NotEqual), table.verify(b"key", &[2, 2]));
}

#[test]
fn clear_forgets_everything() {
    let words = words();

    let mut table = Table::new(2, 8);

    for (index, word) in words.iter().enumerate() {
        table.set(word, &(index as u64).to_le_bytes()).unwrap();
    }

    assert_eq!(words.len(), table.len());

    table.clear();

    assert!(table.is_empty());
    assert_eq!(0, table.iter().count());

    for word in &words {
        assert_eq!(None, table.find(word));
        assert_eq!(Err(TableError::NotFound), table.verify(word, &[0; 8]));
    }
}

#[test]
fn direct_indirect_boundary() {
    let bytes: Vec<u8> = (0..=DIRECT_KEY_MAX as u8).collect();

    let below = &bytes[..DIRECT_KEY_MAX - 1];
    let at = &bytes[..DIRECT_KEY_MAX];
    let above = &bytes[..DIRECT_KEY_MAX + 1];

    for hasher in [one_at_a_time as fn(&[u8]) -> u32, collide] {
        let mut table = Table::with_hasher(1, 1, hasher);

        for (index, key) in [below, at, above].into_iter().enumerate() {
            assert_eq!(Ok(()), table.add(key, &[index as u8]));
        }

        for (index, key) in [below, at, above].into_iter().enumerate() {
            //  Look-up with a copy, at a different address.
            let copy = key.to_vec();

            assert_eq!(Some(&[index as u8][..]), table.get(&copy));
            assert_eq!(Ok(()), table.verify(&copy, &[index as u8]));
            assert_eq!(Err(TableError::AlreadySet), table.add(key, &[0xff]));
        }

        //  A prefix, or an extension, is a different key.
        let mut longer = above.to_vec();
        longer.push(0);

        assert!(!table.contains(&above[..DIRECT_KEY_MAX - 2]));
        assert!(!table.contains(&longer));

        for key in [above, below, at] {
            assert_eq!(Ok(()), table.remove(&key.to_vec()));
            assert_eq!(None, table.get(key));
        }

        assert!(table.is_empty());
    }
}

#[test]
fn growth_preserves_entries() {
    let keys: Vec<[u8; 4]> = (0..300u32).map(u32::to_le_bytes).collect();

    let mut table = Table::with_hasher(4, 4, collide);

    let mut memory = table.memory_usage();

    for (count, key) in keys.iter().enumerate() {
        table.set(key, key).unwrap();

        let current = table.memory_usage();

        //  A power of 2 entries means the bucket was full prior to the insertion.
        if count.is_power_of_two() || count == 0 {
            assert!(current > memory, "{count}: {current} <= {memory}");
        } else {
            assert_eq!(memory, current, "{count}");
        }

        memory = current;

        for key in &keys[..=count] {
            assert_eq!(Some(&key[..]), table.get(key));
        }
    }
}

#[test]
fn long_keys_are_borrowed() {
    let keys: Vec<Vec<u8>> = (0..64u8).map(|n| vec![n; 64 + n as usize]).collect();

    let mut table = Table::with_hasher(2, 1, SuperFast);

    for (index, key) in keys.iter().enumerate() {
        table.set(key, &[index as u8]).unwrap();
    }

    //  Keys are yielded from their original location, not a copy.
    for (key, value) in table.iter() {
        let original = &keys[value[0] as usize];

        assert_eq!(original.as_ptr(), key.as_ptr());
    }
}

#[test]
fn see_inserts_default_once() {
    let mut table = Table::new(2, 2);

    let seen = table.see(b"counter", Some(&[0, 10])).unwrap();

    assert!(seen.is_inserted());

    seen.into_value()[0] += 1;

    for _ in 0..4 {
        let seen = table.see(b"counter", Some(&[0, 10])).unwrap();

        assert!(!seen.is_inserted());

        seen.into_value()[0] += 1;
    }

    assert_eq!(Ok(()), table.verify(b"counter", &[5, 10]));
}

#[test]
fn entry_single_lookup() {
    let mut table = Table::new(3, 1);

    for word in [&b"one"[..], &b"two"[..], &b"one"[..], &b"three"[..], &b"one"[..]] {
        let mut entry = table.entry_find(word);

        if let Some(value) = entry.value() {
            value[0] += 1;
            continue;
        }

        entry.insert(&[1]).unwrap();
    }

    assert_eq!(Some(&[3u8][..]), table.get(b"one"));
    assert_eq!(Some(&[1u8][..]), table.get(b"two"));
    assert_eq!(Some(&[1u8][..]), table.get(b"three"));

    assert_eq!(Ok(()), table.entry_find(b"two").remove());
    assert_eq!(2, table.len());
}

#[test]
fn bucket_limit() {
    let keys: Vec<[u8; 2]> = (0..16u16).map(u16::to_le_bytes).collect();

    let mut builder = Table::with(collide, 1);
    builder.set_bucket_bits(0).set_bucket_limit(10);

    let mut table = builder.build();

    for key in &keys[..10] {
        assert_eq!(Ok(()), table.set(key, &[1]));
    }

    for key in &keys[10..] {
        assert_eq!(Err(TableError::Full), table.set(key, &[1]));
        assert_eq!(Err(TableError::Full), table.add(key, &[1]));
        assert_eq!(Err(TableError::Full), table.see(key, None));
        assert_eq!(Err(TableError::Full), table.entry_find(key).insert(&[1]));
    }

    //  Present keys are still reachable, and removing one makes room again.
    assert_eq!(Ok(()), table.set(&keys[3], &[2]));
    assert_eq!(Err(TableError::AlreadySet), table.add(&keys[3], &[3]));
    assert_eq!(Ok(()), table.remove(&keys[3]));
    assert_eq!(Ok(()), table.add(&keys[12], &[4]));

    assert_eq!(10, table.len());
}

#[test]
fn expansion_override() {
    fn linear(capacity: usize) -> usize {
        capacity + 8
    }

    let keys: Vec<[u8; 2]> = (0..20u16).map(u16::to_le_bytes).collect();

    let mut builder = Table::with(collide, 0);
    builder.set_bucket_bits(0).set_expansion(linear);

    let mut table = builder.build();
    let mut memory = table.memory_usage();
    let mut growths = Vec::new();

    for (count, key) in keys.iter().enumerate() {
        table.set(key, &[]).unwrap();

        if table.memory_usage() != memory {
            growths.push(count);
            memory = table.memory_usage();
        }
    }

    //  Capacity 1 -> 9 -> 17 -> 25.
    assert_eq!(vec![0, 1, 9, 17], growths);
    assert!(keys.iter().all(|key| table.contains(key)));
}

//  Too expensive to run unoptimized: the linear scan makes filling a bucket quadratic.
#[test]
#[cfg_attr(debug_assertions, ignore = "quadratic, run with --release")]
fn capacity_ceiling() {
    let keys: Vec<[u8; 4]> = (0..=BUCKET_MAX as u32).map(u32::to_le_bytes).collect();

    assert_eq!(65536, keys.len());

    let mut table = Table::with_hasher(0, 0, collide);

    for key in &keys[..65535] {
        assert_eq!(Ok(()), table.add(key, &[]));
    }

    assert_eq!(Err(TableError::Full), table.add(&keys[65535], &[]));
    assert_eq!(Err(TableError::AlreadySet), table.add(&keys[65534], &[]));
    assert_eq!(65535, table.len());
}

#[test]
fn hash_determinism() {
    let words = words();

    for word in &words {
        assert_eq!(one_at_a_time(word), one_at_a_time(&word.to_vec()));
        assert_eq!(super_fast(word), super_fast(&word.to_vec()));
    }
}

//
//  Helpers
//

fn one_at_a_time(key: &[u8]) -> u32 {
    endor_htable::KeyHash::hash(&OneAtATime, key)
}

fn super_fast(key: &[u8]) -> u32 {
    endor_htable::KeyHash::hash(&SuperFast, key)
}

fn words() -> Vec<Vec<u8>> {
    let text = "To be, or not to be, that is the question: Whether 'tis nobler in the mind to suffer the slings and \
                arrows of outrageous fortune, or to take arms against a sea of troubles, and by opposing end them. \
                Incomprehensibilities notwithstanding, antidisestablishmentarianism remains uncharacteristically \
                overrepresented.";

    let mut words: Vec<Vec<u8>> = Vec::new();

    for word in text.split(|c: char| !c.is_ascii_alphanumeric()).filter(|w| !w.is_empty()) {
        if !words.iter().any(|w| w == word.as_bytes()) {
            words.push(word.as_bytes().to_vec());
        }
    }

    words
}

#[track_caller]
fn round_trip<'k, H>(mut table: Table<'k, H>, words: &'k [Vec<u8>])
where
    H: endor_htable::KeyHash,
{
    for (index, word) in words.iter().enumerate() {
        assert_eq!(Ok(()), table.set(word, &(index as u64).to_le_bytes()));
    }

    assert_eq!(words.len(), table.len());

    for (index, word) in words.iter().enumerate() {
        assert_eq!(Some(&(index as u64).to_le_bytes()[..]), table.get(word), "{word:?}");
        assert_eq!(Ok(()), table.verify(word, &(index as u64).to_le_bytes()));
    }
}
