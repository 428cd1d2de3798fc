#![cfg(not(any(loom, shuttle)))]

use std::cell::UnsafeCell;
use std::sync::Arc;
use std::sync::Barrier;
use std::thread;
use std::thread::JoinHandle;

use latom::LockTable;
use latom::MemoryOrder;
use latom::Word;
use latom::generic;
use latom::lock::SpinLock;
use latom::sized;

const THREADS: usize = 8;
const ROUNDS: usize = 2_000;

#[repr(C, align(16))]
struct Shared<T> {
  value: UnsafeCell<T>,
  start: Barrier,
}

// SAFETY: `value` is only accessed through `latom`.
unsafe impl<T> Sync for Shared<T> where T: Send {}

impl<T> Shared<T> {
  fn new(value: T) -> Self {
    Self {
      value: UnsafeCell::new(value),
      start: Barrier::new(THREADS),
    }
  }
}

fn run<T, F>(shared: &Arc<Shared<T>>, f: F)
where
  T: Send + 'static,
  F: Fn(*mut T) + Clone + Send + 'static,
{
  let handles: Vec<JoinHandle<()>> = (0..THREADS)
    .map(|_| {
      let shared: Arc<Shared<T>> = Arc::clone(shared);
      let f: F = f.clone();

      thread::spawn(move || {
        shared.start.wait();

        for _ in 0..ROUNDS {
          f(shared.value.get());
        }
      })
    })
    .collect();

  for handle in handles {
    handle.join().unwrap();
  }
}

fn expected<W>() -> W
where
  W: Word,
{
  W::truncate((THREADS * ROUNDS) as u128)
}

// -----------------------------------------------------------------------------
// Dispatched
// -----------------------------------------------------------------------------

fn dispatched_fetch_add<W>()
where
  W: Word,
{
  let shared: Arc<Shared<W>> = Arc::new(Shared::new(W::ZERO));

  run(&shared, |ptr: *mut W| {
    // SAFETY: Aligned and only accessed through `sized`.
    unsafe {
      sized::fetch_add(ptr, W::ONE, MemoryOrder::Relaxed);
    }
  });

  // SAFETY: All writers have been joined.
  let total: W = unsafe { sized::load(shared.value.get(), MemoryOrder::SeqCst) };

  assert_eq!(total, expected::<W>(), "lost updates at {:?}", W::WIDTH);
}

#[test]
fn test_dispatched_fetch_add_u8() {
  dispatched_fetch_add::<u8>();
}

#[test]
fn test_dispatched_fetch_add_u16() {
  dispatched_fetch_add::<u16>();
}

#[test]
fn test_dispatched_fetch_add_u32() {
  dispatched_fetch_add::<u32>();
}

#[test]
fn test_dispatched_fetch_add_u64() {
  dispatched_fetch_add::<u64>();
}

#[test]
fn test_dispatched_fetch_add_u128() {
  dispatched_fetch_add::<u128>();
}

// -----------------------------------------------------------------------------
// Forced Fallback
// -----------------------------------------------------------------------------

static LOCKS: LockTable<SpinLock, 64> = LockTable::new();

fn fallback_fetch_add<W>()
where
  W: Word,
{
  let shared: Arc<Shared<W>> = Arc::new(Shared::new(W::ZERO));

  run(&shared, |ptr: *mut W| {
    // SAFETY: Only accessed through `LOCKS`.
    unsafe {
      LOCKS.fetch(ptr, latom::RmwOp::Add, W::ONE);
    }
  });

  // SAFETY: All writers have been joined.
  let total: W = unsafe { LOCKS.load(shared.value.get()) };

  assert_eq!(total, expected::<W>(), "lost updates at {:?}", W::WIDTH);
}

#[test]
fn test_fallback_fetch_add_u8() {
  fallback_fetch_add::<u8>();
}

#[test]
fn test_fallback_fetch_add_u16() {
  fallback_fetch_add::<u16>();
}

#[test]
fn test_fallback_fetch_add_u32() {
  fallback_fetch_add::<u32>();
}

#[test]
fn test_fallback_fetch_add_u64() {
  fallback_fetch_add::<u64>();
}

#[test]
fn test_fallback_fetch_add_u128() {
  fallback_fetch_add::<u128>();
}

// -----------------------------------------------------------------------------
// Generic
// -----------------------------------------------------------------------------

#[test]
fn test_generic_counter_of_odd_size() {
  // A 6-byte little-endian counter: never a hardware width.
  let shared: Arc<Shared<[u8; 6]>> = Arc::new(Shared::new([0; 6]));

  run(&shared, |ptr: *mut [u8; 6]| {
    // SAFETY: Only accessed through `generic`.
    unsafe {
      let mut current: [u8; 6] = generic::load_value(ptr, MemoryOrder::Acquire);

      loop {
        let mut next: [u8; 8] = [0; 8];
        next[..6].copy_from_slice(&current);
        next = (u64::from_le_bytes(next) + 1).to_le_bytes();

        let desired: [u8; 6] = [next[0], next[1], next[2], next[3], next[4], next[5]];

        if generic::compare_exchange(
          6,
          ptr.cast(),
          (&raw mut current).cast(),
          (&raw const desired).cast(),
          MemoryOrder::AcqRel,
          MemoryOrder::Acquire,
        ) {
          break;
        }
      }
    }
  });

  // SAFETY: All writers have been joined.
  let total: [u8; 6] = unsafe { generic::load_value(shared.value.get(), MemoryOrder::SeqCst) };
  let mut bytes: [u8; 8] = [0; 8];

  bytes[..6].copy_from_slice(&total);

  assert_eq!(u64::from_le_bytes(bytes), (THREADS * ROUNDS) as u64);
}

#[test]
fn test_is_lock_free_matches_target() {
  assert!(!latom::is_lock_free(16));
  assert!(!latom::is_lock_free(6));
  assert_eq!(latom::is_lock_free(4), cfg!(target_has_atomic = "32"));
  assert_eq!(latom::is_lock_free(8), cfg!(target_has_atomic = "64"));
}
