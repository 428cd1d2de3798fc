//! Address-to-lock mapping.
//!
//! Provides [`LockIndex`], the position of the lock guarding a given address.

use core::fmt::Debug;
use core::fmt::Display;
use core::fmt::Formatter;
use core::fmt::Result;
use core::marker::PhantomData;

use crate::params::Params;
use crate::params::ParamsExt;

// -----------------------------------------------------------------------------
// Lock Index
// -----------------------------------------------------------------------------

/// The position of a lock in a table configured by `P`.
///
/// Always less than [`P::LENGTH`]; the only way to build one from an address
/// is through the mask.
///
/// # Examples
///
/// ```
/// use latom::LockIndex;
/// use latom::config::DefaultParams;
///
/// let data: [u64; 2] = [0; 2];
///
/// let head: LockIndex<DefaultParams> = LockIndex::of(&raw const data[0]);
/// let tail: LockIndex<DefaultParams> = LockIndex::of(&raw const data[1]);
///
/// // Both halves of one 16-byte block share a lock.
/// # if (&raw const data).addr() % 16 == 0 {
/// assert_eq!(head, tail);
/// # }
/// ```
///
/// [`P::LENGTH`]: crate::config::Params::LENGTH
#[repr(transparent)]
pub struct LockIndex<P>
where
  P: ?Sized,
{
  source: usize,
  marker: PhantomData<fn(P)>,
}

impl<P> LockIndex<P>
where
  P: Params + ?Sized,
{
  /// Returns the index of the lock guarding `addr`.
  ///
  /// The low [`ALIGN_SHIFT`] bits are discarded so every byte of an aligned
  /// granule hashes identically. The next [`INDEX_BITS`] bits form the base
  /// index, and the bits from [`MIX_SHIFT`] upwards are folded in with an
  /// exclusive-or to spread objects whose low bits coincide, such as the same
  /// field across the elements of an array.
  ///
  /// [`ALIGN_SHIFT`]: crate::config::ParamsExt::ALIGN_SHIFT
  /// [`INDEX_BITS`]: crate::config::ParamsExt::INDEX_BITS
  /// [`MIX_SHIFT`]: crate::config::ParamsExt::MIX_SHIFT
  #[inline]
  pub const fn from_addr(addr: usize) -> Self {
    let hash: usize = addr >> P::ALIGN_SHIFT;
    let base: usize = hash & P::INDEX_MASK;
    let mixed: usize = (hash >> P::MIX_SHIFT) ^ base;

    Self::new(mixed & P::INDEX_MASK)
  }

  /// Returns the index of the lock guarding the memory at `ptr`.
  #[inline]
  pub fn of<T>(ptr: *const T) -> Self
  where
    T: ?Sized,
  {
    Self::from_addr(ptr.addr())
  }
}

impl<P> LockIndex<P>
where
  P: ?Sized,
{
  #[inline]
  const fn new(source: usize) -> Self {
    Self {
      source,
      marker: PhantomData,
    }
  }

  /// Returns the index as a [`usize`].
  #[inline]
  pub const fn get(self) -> usize {
    self.source
  }
}

impl<P> Clone for LockIndex<P>
where
  P: ?Sized,
{
  #[inline]
  fn clone(&self) -> Self {
    *self
  }
}

impl<P> Copy for LockIndex<P> where P: ?Sized {}

impl<P> PartialEq for LockIndex<P>
where
  P: ?Sized,
{
  #[inline]
  fn eq(&self, other: &Self) -> bool {
    self.source == other.source
  }
}

impl<P> Eq for LockIndex<P> where P: ?Sized {}

impl<P> Debug for LockIndex<P>
where
  P: ?Sized,
{
  fn fmt(&self, f: &mut Formatter<'_>) -> Result {
    Debug::fmt(&self.source, f)
  }
}

impl<P> Display for LockIndex<P>
where
  P: ?Sized,
{
  fn fmt(&self, f: &mut Formatter<'_>) -> Result {
    Display::fmt(&self.source, f)
  }
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
  use std::collections::HashSet;

  use crate::index::LockIndex;
  use crate::params::ALIGNMENT;
  use crate::params::DefaultParams;
  use crate::params::Params;
  use crate::params::ParamsExt;
  use crate::utils::each_capacity;

  type Index = LockIndex<DefaultParams>;

  // An arbitrary heap-like address aligned to the granule.
  const BASE: usize = 0x3a9c_1230;

  #[expect(clippy::clone_on_copy)]
  #[test]
  fn index_clone_copy() {
    let a: Index = Index::from_addr(BASE);
    let b: Index = a.clone();
    let c: Index = b;

    assert_eq!(a, b);
    assert_eq!(b, c);
    assert_eq!(c, a);
  }

  #[test]
  fn index_debug_transparency() {
    let index: Index = Index::from_addr(BASE);
    let value: usize = index.get();

    assert_eq!(format!("{index:?}"), format!("{value:?}"));
    assert_eq!(format!("{index}"), format!("{value}"));
  }

  #[test]
  fn granule_shares_one_lock() {
    let head: Index = Index::from_addr(BASE);

    for offset in 0..ALIGNMENT {
      assert_eq!(
        Index::from_addr(BASE + offset),
        head,
        "invalid lock mapping: offset {offset} escapes the granule",
      );
    }
  }

  #[test]
  fn adjacent_words_share_one_lock() {
    assert_eq!(Index::from_addr(BASE), Index::from_addr(BASE + 8));
  }

  #[test]
  fn page_stride_spreads_locks() {
    assert_ne!(Index::from_addr(BASE), Index::from_addr(BASE + 4096));
  }

  #[test]
  fn next_granule_uses_other_lock() {
    assert_ne!(Index::from_addr(BASE), Index::from_addr(BASE + ALIGNMENT));
  }

  #[test]
  fn high_bits_perturb_index() {
    // Same low bits, different high bits: the fold must tell them apart.
    let shift: u32 = DefaultParams::ALIGN_SHIFT + DefaultParams::MIX_SHIFT;
    let lhs: Index = Index::from_addr(BASE);
    let rhs: Index = Index::from_addr(BASE ^ (1 << shift));

    assert_ne!(lhs, rhs);
  }

  #[test]
  fn index_always_in_bounds() {
    each_capacity!({
      for step in 0..4096_usize {
        let addr: usize = BASE.wrapping_mul(step).rotate_left(step as u32);
        let index: LockIndex<P> = LockIndex::from_addr(addr);

        assert!(
          index.get() < P::LENGTH.as_usize(),
          "invalid lock mapping: index[{}] escapes the table - {:?}",
          index.get(),
          P::debug(),
        );
      }
    });
  }

  #[test]
  fn array_elements_cover_table() {
    each_capacity!({
      // Start where no element carries into the folded bits.
      let start: usize = BASE & !((ALIGNMENT << P::MIX_SHIFT) - 1);
      let mut used: HashSet<usize> = HashSet::with_capacity(P::LENGTH.as_usize());

      for element in 0..P::LENGTH.as_usize() {
        used.insert(LockIndex::<P>::from_addr(start + element * ALIGNMENT).get());
      }

      assert_eq!(
        used.len(),
        P::LENGTH.as_usize(),
        "invalid lock mapping: consecutive granules collide - {:?}",
        P::debug(),
      );
    });
  }

  #[cfg_attr(
    not(feature = "slow"),
    ignore = "enable the 'slow' feature to run this test."
  )]
  #[test]
  fn strided_objects_are_balanced() {
    each_capacity!({
      let length: usize = P::LENGTH.as_usize();
      let mut counts: Vec<usize> = vec![0; length];

      // One 64-byte object per iteration, over 64x the table size.
      for element in 0..length * 64 {
        counts[LockIndex::<P>::from_addr(BASE + element * 64).get()] += 1;
      }

      let max: usize = counts.iter().copied().max().unwrap_or_default();

      assert!(
        max <= 64 * 4 * 2,
        "invalid lock mapping: strided objects pile onto one lock ({max}) - {:?}",
        P::debug(),
      );
    });
  }
}
