use core::any;
use core::fmt::Debug;
use core::fmt::Formatter;
use core::fmt::Result as FmtResult;
use core::marker::PhantomData;
use core::mem;
use core::num::NonZeroUsize;

// -----------------------------------------------------------------------------
// Address Granularity
// -----------------------------------------------------------------------------

/// The size in bytes of the address granule that always maps to one lock.
///
/// Any two addresses inside the same aligned `ALIGNMENT`-byte block select the
/// same lock, so sub-fields of one object accessed at different widths still
/// serialize against each other.
pub const ALIGNMENT: usize = 16;

const _: () = assert!(
  ALIGNMENT.is_power_of_two(),
  "invalid params: `ALIGNMENT` must be a power of two",
);

const _: () = assert!(
  ALIGNMENT >= size_of::<u128>(),
  "invalid params: `ALIGNMENT` must cover the widest supported word",
);

/// The bit offset of the higher-order address bits folded into each index.
const FOLD_OFFSET: u32 = 16;

// -----------------------------------------------------------------------------
// Configurable Params
// -----------------------------------------------------------------------------

/// Configuration parameters for a [`LockTable`].
///
/// The simplest approach is [`ConstParams`], which is what [`LockTable`]
/// itself uses for its const-generic length:
///
/// ```no_run
/// use latom::config::{ConstParams, Params};
///
/// assert_eq!(<ConstParams<4096> as Params>::LENGTH.as_usize(), 4096);
/// ```
///
/// # Implementing `Params`
///
/// ```no_run
/// use latom::config::{Capacity, Params, ParamsExt};
///
/// struct WideParams;
///
/// impl Params for WideParams {
///   const LENGTH: Capacity = Capacity::new(1 << 14);
/// }
///
/// assert_eq!(WideParams::INDEX_BITS, 14);
/// ```
///
/// [`Capacity::new`] clamps values to the valid range and rounds up to the
/// nearest power of two.
///
/// [`LockTable`]: crate::LockTable
pub trait Params {
  /// The number of locks in the table.
  ///
  /// This value is rounded up to the nearest power of two and clamped to
  /// <code>[Capacity::MIN]..=[Capacity::MAX]</code>.
  const LENGTH: Capacity = DefaultParams::LENGTH;
}

// -----------------------------------------------------------------------------
// Configurable Params - Extensions
// -----------------------------------------------------------------------------

/// Derived parameters computed from [`Params`].
///
/// Automatically implemented for all [`Params`] types. Provides the constants
/// used by the address hash.
///
/// # Example
///
/// ```no_run
/// use latom::config::{ConstParams, ParamsExt};
///
/// println!("{:#?}", <ConstParams<1024> as ParamsExt>::debug());
/// ```
pub trait ParamsExt: Params + Sealed {
  /// The number of address bits selecting the base index.
  const INDEX_BITS: u32 = Self::LENGTH.log2();
  /// Mask reducing a hash to `0..LENGTH`.
  const INDEX_MASK: usize = Self::LENGTH.as_usize().strict_sub(1);
  /// Number of low address bits discarded before hashing.
  const ALIGN_SHIFT: u32 = ALIGNMENT.trailing_zeros();
  /// Offset of the higher-order bits folded into the base index.
  const MIX_SHIFT: u32 = FOLD_OFFSET;

  #[inline]
  fn debug() -> DebugParams<Self> {
    DebugParams {
      marker: PhantomData,
    }
  }
}

// -----------------------------------------------------------------------------
// Debug Params
// -----------------------------------------------------------------------------

/// A helper type for displaying [`Params`] configuration.
///
/// Returned by [`ParamsExt::debug`]; implements [`Debug`] to show all derived
/// configuration values.
#[derive(Clone, Copy)]
pub struct DebugParams<P>
where
  P: ?Sized,
{
  marker: PhantomData<fn(P)>,
}

impl<P> Debug for DebugParams<P>
where
  P: Params + ?Sized,
{
  fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
    f.debug_struct(any::type_name::<P>())
      .field("LENGTH", &P::LENGTH)
      .field("INDEX_BITS", &P::INDEX_BITS)
      .field("INDEX_MASK", &format_args!("{:0>32b}", P::INDEX_MASK))
      .field("ALIGN_SHIFT", &P::ALIGN_SHIFT)
      .field("MIX_SHIFT", &P::MIX_SHIFT)
      .finish()
  }
}

// -----------------------------------------------------------------------------
// Default Params
// -----------------------------------------------------------------------------

/// The default configuration with [`Capacity::DEF`] locks.
///
/// This is the size of the process-wide table used by the dispatchers.
#[derive(Clone, Copy)]
#[non_exhaustive]
pub struct DefaultParams;

impl Debug for DefaultParams {
  fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
    Debug::fmt(&<Self as ParamsExt>::debug(), f)
  }
}

impl Params for DefaultParams {
  const LENGTH: Capacity = Capacity::DEF;
}

// -----------------------------------------------------------------------------
// Const-Generic Params
// -----------------------------------------------------------------------------

/// A [`Params`] implementation with compile-time configurable length.
///
/// The length `N` is rounded up to the nearest power of two and clamped to
/// <code>[Capacity::MIN]..=[Capacity::MAX]</code>.
///
/// ```no_run
/// use latom::config::{ConstParams, Params};
///
/// // Values are rounded up to powers of two
/// assert_eq!(<ConstParams<1000> as Params>::LENGTH.as_usize(), 1024);
/// ```
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
#[non_exhaustive]
pub struct ConstParams<const N: usize>;

impl<const N: usize> Params for ConstParams<N> {
  const LENGTH: Capacity = Capacity::new(N);
}

// -----------------------------------------------------------------------------
// Auto-implement Derive
// -----------------------------------------------------------------------------

mod private {
  pub trait Sealed {}
}

use private::Sealed;

impl<P> Sealed for P where P: Params + ?Sized {}
impl<P> ParamsExt for P where P: Params + ?Sized {}

// -----------------------------------------------------------------------------
// Capacity
// -----------------------------------------------------------------------------

/// A validated lock count.
///
/// Represents a power-of-two value in the range <code>[MIN]..=[MAX]</code>.
///
/// ```no_run
/// use latom::config::Capacity;
///
/// // Exact power of two
/// assert_eq!(Capacity::new(256).as_usize(), 256);
///
/// // Rounded up
/// assert_eq!(Capacity::new(100).as_usize(), 128);
///
/// // Clamped
/// assert_eq!(Capacity::new(1), Capacity::MIN);
/// assert_eq!(Capacity::new(usize::MAX), Capacity::MAX);
/// ```
///
/// [MIN]: Self::MIN
/// [MAX]: Self::MAX
#[derive(Copy, Clone, PartialEq, Eq)]
#[repr(transparent)]
pub struct Capacity(CapacityEnum);

impl Capacity {
  /// The minimum supported lock count (2⁴ locks).
  pub const MIN: Self = Self(CapacityEnum::_Capacity1Shl4);

  /// The maximum supported lock count (2¹⁶ locks).
  ///
  /// Larger tables would overlap the base index with the folded high bits.
  pub const MAX: Self = Self(CapacityEnum::_Capacity1Shl16);

  /// The default lock count (2¹⁰ locks).
  pub const DEF: Self = Self(CapacityEnum::_Capacity1Shl10);

  /// Creates a new [`Capacity`] from an arbitrary value.
  ///
  /// Rounds up to the nearest power of two and clamps to
  /// <code>[MIN]..=[MAX]</code>.
  ///
  /// [MIN]: Self::MIN
  /// [MAX]: Self::MAX
  #[inline]
  pub const fn new(value: usize) -> Self {
    let Some(capacity) = value.checked_next_power_of_two() else {
      return Self::MAX;
    };

    if capacity < Self::MIN.as_usize() {
      Self::MIN
    } else if capacity > Self::MAX.as_usize() {
      Self::MAX
    } else {
      // SAFETY: `capacity` is a power of two within `MIN..=MAX`.
      unsafe { Self::new_unchecked(capacity) }
    }
  }

  /// Creates a new [`Capacity`] without validation.
  ///
  /// # Safety
  ///
  /// `value` must be a power of two in <code>[MIN]..=[MAX]</code>.
  ///
  /// [MIN]: Self::MIN
  /// [MAX]: Self::MAX
  #[inline]
  pub const unsafe fn new_unchecked(value: usize) -> Self {
    // SAFETY: Caller guarantees `value` is a valid `Capacity`.
    unsafe { mem::transmute::<usize, Self>(value) }
  }

  /// Returns the capacity as a [`usize`].
  #[inline]
  pub const fn as_usize(self) -> usize {
    self.0 as usize
  }

  /// Returns the capacity as a [`NonZeroUsize`].
  #[inline]
  pub const fn as_nonzero(self) -> NonZeroUsize {
    // SAFETY: All `Capacity` values are non-zero by construction.
    unsafe { mem::transmute::<Self, NonZeroUsize>(self) }
  }

  /// Returns the base-2 logarithm of the capacity.
  ///
  /// ```no_run
  /// use latom::config::Capacity;
  ///
  /// assert_eq!(Capacity::new(1024).log2(), 10);
  /// ```
  #[inline]
  pub const fn log2(self) -> u32 {
    self.as_nonzero().trailing_zeros()
  }
}

impl Debug for Capacity {
  fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
    write!(f, "{:?} (1 << {:?})", self.as_nonzero(), self.log2())
  }
}

impl Default for Capacity {
  #[inline]
  fn default() -> Self {
    Self::DEF
  }
}

impl From<Capacity> for NonZeroUsize {
  #[inline]
  fn from(other: Capacity) -> Self {
    other.as_nonzero()
  }
}

impl From<Capacity> for usize {
  #[inline]
  fn from(other: Capacity) -> Self {
    other.as_usize()
  }
}

#[derive(Copy, Clone, PartialEq, Eq)]
#[repr(usize)]
enum CapacityEnum {
  _Capacity1Shl4 = 1 << 4,
  _Capacity1Shl5 = 1 << 5,
  _Capacity1Shl6 = 1 << 6,
  _Capacity1Shl7 = 1 << 7,
  _Capacity1Shl8 = 1 << 8,
  _Capacity1Shl9 = 1 << 9,
  _Capacity1Shl10 = 1 << 10,
  _Capacity1Shl11 = 1 << 11,
  _Capacity1Shl12 = 1 << 12,
  _Capacity1Shl13 = 1 << 13,
  _Capacity1Shl14 = 1 << 14,
  _Capacity1Shl15 = 1 << 15,
  _Capacity1Shl16 = 1 << 16,
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------
