//! Striped lock table.
//!
//! A fixed array of [`RawLock`]s. An address selects its lock through
//! [`LockIndex`], so unrelated objects rarely contend and adjacent fields of
//! one object always do.

use core::fmt::Debug;
use core::fmt::DebugList;
use core::fmt::Formatter;
use core::fmt::Result as FmtResult;

use crate::index::LockIndex;
use crate::lock::DefaultLock;
use crate::lock::LockGuard;
use crate::lock::RawLock;
use crate::params::Capacity;
use crate::params::ConstParams;
use crate::params::DefaultParams;
use crate::params::Params;

/// The number of locks in the process-wide table.
pub const DEFAULT_LOCKS: usize = DefaultParams::LENGTH.as_usize();

/// A fixed-size table of locks selected by address.
///
/// `N` must be a power of two within
/// <code>[Capacity::MIN]..=[Capacity::MAX]</code>; any other value fails to
/// compile.
///
/// The table never allocates and needs no initialization beyond its
/// all-released starting state, so it can be a `static`:
///
/// ```
/// use latom::LockTable;
/// use latom::lock::SpinLock;
///
/// static LOCKS: LockTable<SpinLock, 64> = LockTable::new();
///
/// let value: u64 = 0;
/// let guard = LOCKS.lock(&raw const value);
///
/// assert_eq!(LOCKS.held(), 1);
/// drop(guard);
/// assert_eq!(LOCKS.held(), 0);
/// ```
///
/// [Capacity::MIN]: crate::config::Capacity::MIN
/// [Capacity::MAX]: crate::config::Capacity::MAX
#[repr(transparent)]
pub struct LockTable<L = DefaultLock, const N: usize = DEFAULT_LOCKS> {
  locks: [L; N],
}

impl<L, const N: usize> LockTable<L, N>
where
  L: RawLock,
{
  const VALID: () = assert!(
    Capacity::new(N).as_usize() == N,
    "invalid params: lock count must be a power of two in `Capacity::MIN..=Capacity::MAX`",
  );

  /// Creates a table with every lock released.
  #[cfg(not(any(loom, shuttle)))]
  #[inline]
  pub const fn new() -> Self {
    let () = Self::VALID;

    Self {
      locks: [const { L::UNLOCKED }; N],
    }
  }

  /// Creates a table with every lock released.
  #[cfg(any(loom, shuttle))]
  #[inline]
  pub fn new() -> Self {
    let () = Self::VALID;

    Self {
      locks: core::array::from_fn(|_| L::new()),
    }
  }

  /// Returns the number of locks in the table.
  #[inline]
  pub const fn capacity(&self) -> usize {
    N
  }

  /// Returns the index of the lock guarding the memory at `ptr`.
  #[inline]
  pub fn index_of<T>(&self, ptr: *const T) -> LockIndex<ConstParams<N>>
  where
    T: ?Sized,
  {
    LockIndex::of(ptr)
  }

  /// Returns the lock at `index`.
  #[inline]
  pub fn get(&self, index: LockIndex<ConstParams<N>>) -> &L {
    debug_assert!(
      index.get() < N,
      "LockTable::get requires that the index is in bounds",
    );

    // SAFETY: A `LockIndex<ConstParams<N>>` is masked to `0..N` because
    // `VALID` holds.
    unsafe { self.locks.get_unchecked(index.get()) }
  }

  /// Acquires the lock guarding the memory at `ptr`.
  ///
  /// Blocks until the lock is available. The lock is released when the
  /// returned guard is dropped.
  #[inline]
  pub fn lock<T>(&self, ptr: *const T) -> LockGuard<'_, L>
  where
    T: ?Sized,
  {
    let index: LockIndex<ConstParams<N>> = self.index_of(ptr);
    let lock: &L = self.get(index);

    if !lock.try_acquire() {
      #[cfg(feature = "tracing")]
      tracing::trace!(target: "latom", index = index.get(), "lock contended");

      lock.acquire();
    }

    // SAFETY: Acquired above.
    unsafe { LockGuard::adopt(lock) }
  }

  /// Returns the number of locks currently held.
  ///
  /// The answer may be stale by the time it is observed.
  pub fn held(&self) -> usize {
    self.locks.iter().filter(|lock| lock.is_locked()).count()
  }
}

impl<L, const N: usize> Default for LockTable<L, N>
where
  L: RawLock,
{
  #[inline]
  fn default() -> Self {
    Self::new()
  }
}

impl<L, const N: usize> Debug for LockTable<L, N>
where
  L: RawLock,
{
  fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
    f.debug_struct("LockTable")
      .field("capacity", &N)
      .field("held", &Held(self))
      .finish()
  }
}

/// Lists the indices of held locks.
struct Held<'table, L, const N: usize>(&'table LockTable<L, N>);

impl<L, const N: usize> Debug for Held<'_, L, N>
where
  L: RawLock,
{
  fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
    let mut debug: DebugList<'_, '_> = f.debug_list();

    for (index, lock) in self.0.locks.iter().enumerate() {
      if lock.is_locked() {
        debug.entry(&index);
      }
    }

    debug.finish()
  }
}

// -----------------------------------------------------------------------------
// Process-wide Table
// -----------------------------------------------------------------------------

#[cfg(not(any(loom, shuttle)))]
static LOCKS: LockTable = LockTable::new();

/// Returns the process-wide table used by the dispatchers.
///
/// It lives in static storage, starts with every lock released, and is never
/// torn down.
#[cfg(not(any(loom, shuttle)))]
#[inline]
pub fn global() -> &'static LockTable {
  &LOCKS
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------
