//! Lock primitives backing the fallback path.
//!
//! Every primitive here is a single word, valid when all-zero, and never
//! allocates, so a table of them can live in a `static` and be used before any
//! runtime initialization has happened.

use core::fmt::Debug;
use core::fmt::Formatter;
use core::fmt::Result as FmtResult;
use core::marker::PhantomData;

use crate::sync::atomic::AtomicUsize;
use crate::sync::atomic::Ordering::Acquire;
use crate::sync::atomic::Ordering::Relaxed;
use crate::sync::atomic::Ordering::Release;
use crate::sync::hint::spin_loop;

const UNLOCKED: usize = 0;
const LOCKED: usize = 1;

// -----------------------------------------------------------------------------
// Raw Lock API
// -----------------------------------------------------------------------------

/// A minimal mutual-exclusion primitive.
///
/// # Safety
///
/// Implementations must guarantee that:
///
/// - At most one thread holds the lock at any time.
/// - [`release()`] synchronizes-with the [`acquire()`] or successful
///   [`try_acquire()`] that next obtains the lock.
/// - The unlocked state is the all-zero bit pattern, and [`UNLOCKED`] and
///   [`new()`] both produce it.
///
/// Waiting is unbounded and unfair: under contention a thread may spin for an
/// arbitrarily long time.
///
/// [`acquire()`]: RawLock::acquire
/// [`try_acquire()`]: RawLock::try_acquire
/// [`release()`]: RawLock::release
/// [`new()`]: RawLock::new
/// [`UNLOCKED`]: RawLock::UNLOCKED
pub unsafe trait RawLock: Sync + Sized {
  /// A lock in the released state.
  #[cfg(not(any(loom, shuttle)))]
  const UNLOCKED: Self;

  /// Creates a lock in the released state.
  fn new() -> Self;

  /// Blocks the current thread until the lock is obtained.
  fn acquire(&self);

  /// Attempts to obtain the lock without waiting.
  ///
  /// Returns `true` if the lock is now held by the caller.
  fn try_acquire(&self) -> bool;

  /// Releases the lock.
  ///
  /// # Safety
  ///
  /// The lock must be held by the caller.
  unsafe fn release(&self);

  /// Returns `true` if some thread currently holds the lock.
  ///
  /// The answer may be stale by the time it is observed.
  fn is_locked(&self) -> bool;
}

// -----------------------------------------------------------------------------
// Spin Lock
// -----------------------------------------------------------------------------

/// A lock that spins on a compare-and-swap until it succeeds.
///
/// The most portable primitive: needs nothing beyond a word-sized atomic.
#[repr(transparent)]
pub struct SpinLock {
  state: AtomicUsize,
}

// SAFETY: `state` transitions `UNLOCKED -> LOCKED` only through an acquiring
// compare-exchange and back only through a releasing store.
unsafe impl RawLock for SpinLock {
  #[cfg(not(any(loom, shuttle)))]
  const UNLOCKED: Self = Self {
    state: AtomicUsize::new(UNLOCKED),
  };

  #[inline]
  fn new() -> Self {
    Self {
      state: AtomicUsize::new(UNLOCKED),
    }
  }

  #[inline]
  fn acquire(&self) {
    while self
      .state
      .compare_exchange_weak(UNLOCKED, LOCKED, Acquire, Relaxed)
      .is_err()
    {
      spin_loop();
    }
  }

  #[inline]
  fn try_acquire(&self) -> bool {
    self
      .state
      .compare_exchange(UNLOCKED, LOCKED, Acquire, Relaxed)
      .is_ok()
  }

  #[inline]
  unsafe fn release(&self) {
    self.state.store(UNLOCKED, Release);
  }

  #[inline]
  fn is_locked(&self) -> bool {
    self.state.load(Relaxed) != UNLOCKED
  }
}

impl Debug for SpinLock {
  fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
    debug_lock(self, "SpinLock", f)
  }
}

// -----------------------------------------------------------------------------
// Backoff Lock
// -----------------------------------------------------------------------------

/// A test-and-test-and-set lock with exponential backoff.
///
/// Waiters poll with plain loads instead of hammering the cache line with
/// read-modify-writes, spinning exponentially longer between polls. With the
/// `std` feature enabled, long waits yield to the OS scheduler.
#[repr(transparent)]
pub struct BackoffLock {
  state: AtomicUsize,
}

// SAFETY: Same state machine as `SpinLock`; the extra relaxed polling never
// changes `state`.
unsafe impl RawLock for BackoffLock {
  #[cfg(not(any(loom, shuttle)))]
  const UNLOCKED: Self = Self {
    state: AtomicUsize::new(UNLOCKED),
  };

  #[inline]
  fn new() -> Self {
    Self {
      state: AtomicUsize::new(UNLOCKED),
    }
  }

  #[inline]
  fn acquire(&self) {
    if self.try_acquire() {
      return;
    }

    self.acquire_slow();
  }

  #[inline]
  fn try_acquire(&self) -> bool {
    self
      .state
      .compare_exchange(UNLOCKED, LOCKED, Acquire, Relaxed)
      .is_ok()
  }

  #[inline]
  unsafe fn release(&self) {
    self.state.store(UNLOCKED, Release);
  }

  #[inline]
  fn is_locked(&self) -> bool {
    self.state.load(Relaxed) != UNLOCKED
  }
}

impl BackoffLock {
  #[cold]
  #[inline(never)]
  fn acquire_slow(&self) {
    let mut backoff: Backoff = Backoff::new();

    loop {
      while self.is_locked() {
        backoff.snooze();
      }

      if self
        .state
        .compare_exchange_weak(UNLOCKED, LOCKED, Acquire, Relaxed)
        .is_ok()
      {
        return;
      }
    }
  }
}

impl Debug for BackoffLock {
  fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
    debug_lock(self, "BackoffLock", f)
  }
}

/// Exponential backoff for contended waits.
struct Backoff {
  step: u32,
}

impl Backoff {
  const SPIN_LIMIT: u32 = 6;
  const YIELD_LIMIT: u32 = 10;

  #[inline]
  const fn new() -> Self {
    Self { step: 0 }
  }

  #[inline]
  fn snooze(&mut self) {
    if self.step <= Self::SPIN_LIMIT {
      for _ in 0..1_u32 << self.step {
        spin_loop();
      }
    } else {
      Self::park();
    }

    if self.step <= Self::YIELD_LIMIT {
      self.step += 1;
    }
  }

  #[cfg(any(feature = "std", loom, shuttle))]
  #[inline]
  fn park() {
    crate::sync::thread::yield_now();
  }

  #[cfg(not(any(feature = "std", loom, shuttle)))]
  #[inline]
  fn park() {
    for _ in 0..1_u32 << Self::SPIN_LIMIT {
      spin_loop();
    }
  }
}

// -----------------------------------------------------------------------------
// Default Lock
// -----------------------------------------------------------------------------

/// The lock primitive used by the process-wide table.
///
/// Selected at build time: [`BackoffLock`] when the `std` feature makes
/// yielding available, [`SpinLock`] otherwise. Model-checking builds always use
/// [`SpinLock`], whose every failed attempt is a scheduling point.
#[cfg(all(feature = "std", not(any(loom, shuttle))))]
pub type DefaultLock = BackoffLock;

/// The lock primitive used by the process-wide table.
///
/// Selected at build time: [`BackoffLock`] when the `std` feature makes
/// yielding available, [`SpinLock`] otherwise. Model-checking builds always use
/// [`SpinLock`], whose every failed attempt is a scheduling point.
#[cfg(not(all(feature = "std", not(any(loom, shuttle)))))]
pub type DefaultLock = SpinLock;

// -----------------------------------------------------------------------------
// Lock Guard
// -----------------------------------------------------------------------------

/// An RAII guard releasing a [`RawLock`] when dropped.
///
/// Guards are `!Send`: a lock is always released by the thread that took it.
#[must_use = "if unused the lock is released immediately"]
pub struct LockGuard<'lock, L>
where
  L: RawLock,
{
  lock: &'lock L,
  marker: PhantomData<*const ()>,
}

impl<'lock, L> LockGuard<'lock, L>
where
  L: RawLock,
{
  /// Acquires `lock`, blocking until it is available.
  #[inline]
  pub fn new(lock: &'lock L) -> Self {
    lock.acquire();

    // SAFETY: `acquire` returned, so the lock is held.
    unsafe { Self::adopt(lock) }
  }

  /// Wraps a lock already held by the current thread.
  ///
  /// # Safety
  ///
  /// `lock` must be held by the caller, and nothing else may release it.
  #[inline]
  pub unsafe fn adopt(lock: &'lock L) -> Self {
    Self {
      lock,
      marker: PhantomData,
    }
  }
}

impl<L> Drop for LockGuard<'_, L>
where
  L: RawLock,
{
  #[inline]
  fn drop(&mut self) {
    // SAFETY: A guard only exists while its lock is held.
    unsafe {
      self.lock.release();
    }
  }
}

impl<L> Debug for LockGuard<'_, L>
where
  L: RawLock + Debug,
{
  fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
    f.debug_struct("LockGuard").field("lock", self.lock).finish()
  }
}

// -----------------------------------------------------------------------------
// Misc. Utilities
// -----------------------------------------------------------------------------

fn debug_lock<L>(lock: &L, name: &str, f: &mut Formatter<'_>) -> FmtResult
where
  L: RawLock,
{
  f.debug_struct(name)
    .field("locked", &lock.is_locked())
    .finish()
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------
