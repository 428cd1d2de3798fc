use core::sync::atomic::Ordering;

use thiserror::Error;

/// The ordering requested for one atomic operation.
///
/// Discriminants match the `__ATOMIC_*` constants used by C and C++ compilers,
/// so a raw `model` argument converts with [`MemoryOrder::try_from`].
///
/// The hardware path honours the requested ordering. The fallback path always
/// delivers at least acquire/release, whatever was requested: the lock's own
/// acquire and release bracket the access.
#[derive(Clone, Copy, Debug, Default, Hash, PartialEq, Eq, PartialOrd, Ord)]
#[repr(i32)]
pub enum MemoryOrder {
  Relaxed = 0,
  Consume = 1,
  Acquire = 2,
  Release = 3,
  AcqRel = 4,
  #[default]
  SeqCst = 5,
}

impl MemoryOrder {
  /// Every order, in discriminant order.
  pub const ALL: [Self; 6] = [
    Self::Relaxed,
    Self::Consume,
    Self::Acquire,
    Self::Release,
    Self::AcqRel,
    Self::SeqCst,
  ];

  /// Converts a raw `__ATOMIC_*` value, or returns [`None`] if out of range.
  #[inline]
  pub const fn from_raw(raw: i32) -> Option<Self> {
    match raw {
      0 => Some(Self::Relaxed),
      1 => Some(Self::Consume),
      2 => Some(Self::Acquire),
      3 => Some(Self::Release),
      4 => Some(Self::AcqRel),
      5 => Some(Self::SeqCst),
      _ => None,
    }
  }

  /// Returns the raw `__ATOMIC_*` value.
  #[inline]
  pub const fn into_raw(self) -> i32 {
    self as i32
  }

  /// The [`Ordering`] for a hardware load.
  ///
  /// `Consume` is promoted to `Acquire`. Release semantics are meaningless on
  /// a load, so `Release` and `AcqRel` are strengthened to `SeqCst`.
  #[inline]
  pub const fn load(self) -> Ordering {
    match self {
      Self::Relaxed => Ordering::Relaxed,
      Self::Consume | Self::Acquire => Ordering::Acquire,
      Self::Release | Self::AcqRel | Self::SeqCst => Ordering::SeqCst,
    }
  }

  /// The [`Ordering`] for a hardware store.
  ///
  /// Acquire semantics are meaningless on a store, so `Consume`, `Acquire` and
  /// `AcqRel` are strengthened to `SeqCst`.
  #[inline]
  pub const fn store(self) -> Ordering {
    match self {
      Self::Relaxed => Ordering::Relaxed,
      Self::Release => Ordering::Release,
      Self::Consume | Self::Acquire | Self::AcqRel | Self::SeqCst => Ordering::SeqCst,
    }
  }

  /// The [`Ordering`] for a hardware read-modify-write.
  #[inline]
  pub const fn rmw(self) -> Ordering {
    match self {
      Self::Relaxed => Ordering::Relaxed,
      Self::Consume | Self::Acquire => Ordering::Acquire,
      Self::Release => Ordering::Release,
      Self::AcqRel => Ordering::AcqRel,
      Self::SeqCst => Ordering::SeqCst,
    }
  }

  /// The [`Ordering`] for the failure case of a hardware compare-exchange.
  ///
  /// A failed exchange performs no store, so the release half is dropped.
  #[inline]
  pub const fn failure(self) -> Ordering {
    match self {
      Self::Relaxed | Self::Release => Ordering::Relaxed,
      Self::Consume | Self::Acquire | Self::AcqRel => Ordering::Acquire,
      Self::SeqCst => Ordering::SeqCst,
    }
  }
}

impl TryFrom<i32> for MemoryOrder {
  type Error = OrderError;

  #[inline]
  fn try_from(other: i32) -> Result<Self, Self::Error> {
    Self::from_raw(other).ok_or(OrderError(other))
  }
}

impl From<MemoryOrder> for i32 {
  #[inline]
  fn from(other: MemoryOrder) -> Self {
    other.into_raw()
  }
}

/// A raw memory order outside `0..=5`.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, Error)]
#[error("invalid memory order: {0}")]
pub struct OrderError(i32);

impl OrderError {
  /// Returns the rejected raw value.
  #[inline]
  pub const fn value(self) -> i32 {
    self.0
  }
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------
