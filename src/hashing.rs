//! Hash spreading applied on top of the user's `BuildHasher`.

use core::hash::{BuildHasher, Hash};

/// Fold a 64-bit hash to 32 bits and mix it so that poor user hash
/// functions do not cluster in the low bits used for bucket selection.
#[inline]
pub fn spread(raw: u64) -> u32 {
    let mut h = (raw ^ (raw >> 32)) as u32;
    h = h.wrapping_add(!(h << 9));
    h ^= h >> 14;
    h = h.wrapping_add(h << 4);
    h ^= h >> 10;
    h
}

#[inline]
pub fn hash_of<S, Q>(hasher: &S, q: &Q) -> u32
where
    S: BuildHasher,
    Q: ?Sized + Hash,
{
    spread(hasher.hash_one(q))
}

/// Bucket index for a cached hash; `capacity` is a power of two.
#[inline]
pub fn bucket_index(hash: u32, capacity: usize) -> usize {
    debug_assert!(capacity.is_power_of_two());
    (hash as usize) & (capacity - 1)
}
