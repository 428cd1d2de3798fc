//! Access widths and their hardware atomic views.
//!
//! [`Word`] is implemented for the closed set of fixed widths (`u8` through
//! `u128`). Each word names a [`Native`] view: the matching `core` atomic type
//! where the target has one, or [`Locked`] where the fallback path must be
//! used. `u128` is always [`Locked`].

use core::fmt::Debug;
use core::sync::atomic::Ordering;

#[cfg(target_has_atomic = "8")]
use core::sync::atomic::AtomicU8;
#[cfg(target_has_atomic = "16")]
use core::sync::atomic::AtomicU16;
#[cfg(target_has_atomic = "32")]
use core::sync::atomic::AtomicU32;
#[cfg(target_has_atomic = "64")]
use core::sync::atomic::AtomicU64;

use thiserror::Error;

// -----------------------------------------------------------------------------
// Width
// -----------------------------------------------------------------------------

/// A width with a dedicated fixed-size entry point.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
#[repr(usize)]
pub enum Width {
  U8 = 1,
  U16 = 2,
  U32 = 4,
  U64 = 8,
  U128 = 16,
}

impl Width {
  /// Returns the width of `size` bytes, or [`None`] for any other size.
  #[inline]
  pub const fn new(size: usize) -> Option<Self> {
    match size {
      1 => Some(Self::U8),
      2 => Some(Self::U16),
      4 => Some(Self::U32),
      8 => Some(Self::U64),
      16 => Some(Self::U128),
      _ => None,
    }
  }

  /// Returns the width in bytes.
  #[inline]
  pub const fn bytes(self) -> usize {
    self as usize
  }

  /// Returns `true` if accesses of this width take the hardware path.
  #[inline]
  pub const fn is_lock_free(self) -> bool {
    match self {
      Self::U8 => lock_free::<u8>(),
      Self::U16 => lock_free::<u16>(),
      Self::U32 => lock_free::<u32>(),
      Self::U64 => lock_free::<u64>(),
      Self::U128 => lock_free::<u128>(),
    }
  }
}

impl TryFrom<usize> for Width {
  type Error = WidthError;

  #[inline]
  fn try_from(other: usize) -> Result<Self, Self::Error> {
    Self::new(other).ok_or(WidthError(other))
  }
}

/// A size with no fixed-width entry point.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, Error)]
#[error("unsupported access width: {0} bytes")]
pub struct WidthError(usize);

impl WidthError {
  /// Returns the rejected size.
  #[inline]
  pub const fn size(self) -> usize {
    self.0
  }
}

/// Returns `true` if an access of `size` bytes takes the hardware path.
///
/// Only 1, 2, 4 and 8 byte accesses can, and only where the target has the
/// matching atomic instructions. 16-byte accesses never do.
///
/// ```
/// assert!(!latom::is_lock_free(16));
/// assert!(!latom::is_lock_free(3));
/// ```
#[inline]
pub const fn is_lock_free(size: usize) -> bool {
  match Width::new(size) {
    Some(width) => width.is_lock_free(),
    None => false,
  }
}

#[inline]
const fn lock_free<W>() -> bool
where
  W: Word,
{
  <W::Native as Native<W>>::LOCK_FREE
}

// -----------------------------------------------------------------------------
// Read-Modify-Write Ops
// -----------------------------------------------------------------------------

/// The binary operation applied by a fetch-and-modify.
///
/// Arithmetic wraps on overflow.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq)]
pub enum RmwOp {
  Add,
  Sub,
  And,
  Or,
  Xor,
}

impl RmwOp {
  /// Every operation.
  pub const ALL: [Self; 5] = [Self::Add, Self::Sub, Self::And, Self::Or, Self::Xor];
}

// -----------------------------------------------------------------------------
// Word
// -----------------------------------------------------------------------------

mod private {
  pub trait Sealed {}
}

use private::Sealed;

/// An unsigned integer of a supported fixed width.
pub trait Word: Copy + Eq + Debug + Send + Sync + Sealed + 'static {
  /// The width of this word.
  const WIDTH: Width;

  const ZERO: Self;
  const ONE: Self;
  const MAX: Self;

  /// The hardware view of this word, or [`Locked`].
  type Native: Native<Self>;

  /// Computes `lhs <op> rhs` with wrapping arithmetic.
  fn apply(op: RmwOp, lhs: Self, rhs: Self) -> Self;

  /// Keeps the low bits of `value` that fit this width.
  fn truncate(value: u128) -> Self;

  /// Zero-extends this word.
  fn widen(self) -> u128;
}

/// A hardware atomic view of a `W` in memory.
///
/// # Safety
///
/// Every operation must be a single indivisible hardware atomic access with
/// at least the requested ordering, and [`LOCK_FREE`] must be `true` exactly
/// when [`from_ptr`] can return [`Some`].
///
/// [`LOCK_FREE`]: Native::LOCK_FREE
/// [`from_ptr`]: Native::from_ptr
pub unsafe trait Native<W>: Sync {
  /// Whether this view is ever available.
  const LOCK_FREE: bool;

  /// Views the memory at `ptr` as a hardware atomic.
  ///
  /// Returns [`None`] if accesses must take the fallback path instead.
  ///
  /// # Safety
  ///
  /// `ptr` must be valid for reads and writes, aligned for the atomic type,
  /// for all of `'a`. Every concurrent access to it during `'a` must also be
  /// atomic.
  unsafe fn from_ptr<'a>(ptr: *mut W) -> Option<&'a Self>;

  fn load(&self, order: Ordering) -> W;

  fn store(&self, value: W, order: Ordering);

  fn swap(&self, value: W, order: Ordering) -> W;

  fn compare_exchange(
    &self,
    current: W,
    new: W,
    success: Ordering,
    failure: Ordering,
  ) -> Result<W, W>;

  fn fetch(&self, op: RmwOp, value: W, order: Ordering) -> W;
}

/// The [`Native`] view of a word that never takes the hardware path.
///
/// Uninhabited: [`from_ptr`] always returns [`None`].
///
/// [`from_ptr`]: Native::from_ptr
#[derive(Debug)]
pub enum Locked {}

// SAFETY: Uninhabited; no operation can ever be called.
unsafe impl<W> Native<W> for Locked {
  const LOCK_FREE: bool = false;

  #[inline]
  unsafe fn from_ptr<'a>(_ptr: *mut W) -> Option<&'a Self> {
    None
  }

  fn load(&self, _order: Ordering) -> W {
    match *self {}
  }

  fn store(&self, _value: W, _order: Ordering) {
    match *self {}
  }

  fn swap(&self, _value: W, _order: Ordering) -> W {
    match *self {}
  }

  fn compare_exchange(
    &self,
    _current: W,
    _new: W,
    _success: Ordering,
    _failure: Ordering,
  ) -> Result<W, W> {
    match *self {}
  }

  fn fetch(&self, _op: RmwOp, _value: W, _order: Ordering) -> W {
    match *self {}
  }
}

macro_rules! word {
  ($word:ty, $width:ident, $native:ty) => {
    impl Sealed for $word {}

    impl Word for $word {
      const WIDTH: Width = Width::$width;

      const ZERO: Self = 0;
      const ONE: Self = 1;
      const MAX: Self = <$word>::MAX;

      type Native = $native;

      #[inline]
      fn apply(op: RmwOp, lhs: Self, rhs: Self) -> Self {
        match op {
          RmwOp::Add => lhs.wrapping_add(rhs),
          RmwOp::Sub => lhs.wrapping_sub(rhs),
          RmwOp::And => lhs & rhs,
          RmwOp::Or => lhs | rhs,
          RmwOp::Xor => lhs ^ rhs,
        }
      }

      #[inline]
      fn truncate(value: u128) -> Self {
        value as Self
      }

      #[inline]
      fn widen(self) -> u128 {
        u128::from(self)
      }
    }

    const _: () = assert!(
      size_of::<$word>() == Width::$width.bytes(),
      "invalid word: size does not match width",
    );
  };
}

macro_rules! native {
  ($word:ty, $atomic:ty) => {
    // SAFETY: Forwards to the `core` atomic of the same width.
    unsafe impl Native<$word> for $atomic {
      const LOCK_FREE: bool = true;

      #[inline]
      unsafe fn from_ptr<'a>(ptr: *mut $word) -> Option<&'a Self> {
        // SAFETY: Caller guarantees validity, alignment and atomic-only access.
        Some(unsafe { <$atomic>::from_ptr(ptr) })
      }

      #[inline]
      fn load(&self, order: Ordering) -> $word {
        <$atomic>::load(self, order)
      }

      #[inline]
      fn store(&self, value: $word, order: Ordering) {
        <$atomic>::store(self, value, order);
      }

      #[inline]
      fn swap(&self, value: $word, order: Ordering) -> $word {
        <$atomic>::swap(self, value, order)
      }

      #[inline]
      fn compare_exchange(
        &self,
        current: $word,
        new: $word,
        success: Ordering,
        failure: Ordering,
      ) -> Result<$word, $word> {
        <$atomic>::compare_exchange(self, current, new, success, failure)
      }

      #[inline]
      fn fetch(&self, op: RmwOp, value: $word, order: Ordering) -> $word {
        match op {
          RmwOp::Add => self.fetch_add(value, order),
          RmwOp::Sub => self.fetch_sub(value, order),
          RmwOp::And => self.fetch_and(value, order),
          RmwOp::Or => self.fetch_or(value, order),
          RmwOp::Xor => self.fetch_xor(value, order),
        }
      }
    }
  };
}

#[cfg(target_has_atomic = "8")]
word!(u8, U8, AtomicU8);
#[cfg(not(target_has_atomic = "8"))]
word!(u8, U8, Locked);

#[cfg(target_has_atomic = "16")]
word!(u16, U16, AtomicU16);
#[cfg(not(target_has_atomic = "16"))]
word!(u16, U16, Locked);

#[cfg(target_has_atomic = "32")]
word!(u32, U32, AtomicU32);
#[cfg(not(target_has_atomic = "32"))]
word!(u32, U32, Locked);

#[cfg(target_has_atomic = "64")]
word!(u64, U64, AtomicU64);
#[cfg(not(target_has_atomic = "64"))]
word!(u64, U64, Locked);

// 16-byte accesses always take the fallback path, even where the target has
// double-width compare-and-swap.
word!(u128, U128, Locked);

#[cfg(target_has_atomic = "8")]
native!(u8, AtomicU8);
#[cfg(target_has_atomic = "16")]
native!(u16, AtomicU16);
#[cfg(target_has_atomic = "32")]
native!(u32, AtomicU32);
#[cfg(target_has_atomic = "64")]
native!(u64, AtomicU64);

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------
