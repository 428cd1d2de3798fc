//! Lock-protected accesses.
//!
//! Every operation here takes the table lock for the target address, performs
//! plain memory accesses, and releases the lock. Any two such operations on
//! overlapping memory within one granule are therefore serialized against each
//! other.
//!
//! None of these interoperate with hardware atomics on the same location:
//! memory must be accessed exclusively through one path or the other.

use core::ptr;
use core::slice;

use crate::lock::LockGuard;
use crate::lock::RawLock;
use crate::table::LockTable;
use crate::word::RmwOp;
use crate::word::Word;

impl<L, const N: usize> LockTable<L, N>
where
  L: RawLock,
{
  // ---------------------------------------------------------------------------
  // Typed Accesses
  // ---------------------------------------------------------------------------

  /// Reads the word at `ptr` under its lock.
  ///
  /// # Safety
  ///
  /// `ptr` must be valid for reads. Alignment is not required. Every
  /// concurrent access to the same memory must go through this table.
  #[inline]
  pub unsafe fn load<W>(&self, ptr: *const W) -> W
  where
    W: Word,
  {
    let _guard: LockGuard<'_, L> = self.lock(ptr);

    // SAFETY: Caller guarantees `ptr` is readable; the lock excludes writers.
    unsafe { ptr.read_unaligned() }
  }

  /// Writes `value` to `ptr` under its lock.
  ///
  /// # Safety
  ///
  /// `ptr` must be valid for writes. Alignment is not required. Every
  /// concurrent access to the same memory must go through this table.
  #[inline]
  pub unsafe fn store<W>(&self, ptr: *mut W, value: W)
  where
    W: Word,
  {
    let _guard: LockGuard<'_, L> = self.lock(ptr);

    // SAFETY: Caller guarantees `ptr` is writable; the lock excludes others.
    unsafe { ptr.write_unaligned(value) }
  }

  /// Replaces the word at `ptr` with `value`, returning the previous value.
  ///
  /// # Safety
  ///
  /// See [`LockTable::store`].
  #[inline]
  pub unsafe fn swap<W>(&self, ptr: *mut W, value: W) -> W
  where
    W: Word,
  {
    let _guard: LockGuard<'_, L> = self.lock(ptr);

    // SAFETY: Caller guarantees `ptr` is readable and writable.
    unsafe {
      let old: W = ptr.read_unaligned();
      ptr.write_unaligned(value);
      old
    }
  }

  /// Stores `desired` at `ptr` if it currently holds `current`.
  ///
  /// Returns the previous value, [`Ok`] if the store happened.
  ///
  /// # Safety
  ///
  /// See [`LockTable::store`].
  #[inline]
  pub unsafe fn compare_exchange<W>(&self, ptr: *mut W, current: W, desired: W) -> Result<W, W>
  where
    W: Word,
  {
    let _guard: LockGuard<'_, L> = self.lock(ptr);

    // SAFETY: Caller guarantees `ptr` is readable and writable.
    unsafe {
      let old: W = ptr.read_unaligned();

      if old == current {
        ptr.write_unaligned(desired);
        Ok(old)
      } else {
        Err(old)
      }
    }
  }

  /// Applies `op` with `value` to the word at `ptr`, returning the previous
  /// value.
  ///
  /// # Safety
  ///
  /// See [`LockTable::store`].
  #[inline]
  pub unsafe fn fetch<W>(&self, ptr: *mut W, op: RmwOp, value: W) -> W
  where
    W: Word,
  {
    let _guard: LockGuard<'_, L> = self.lock(ptr);

    // SAFETY: Caller guarantees `ptr` is readable and writable.
    unsafe {
      let old: W = ptr.read_unaligned();
      ptr.write_unaligned(W::apply(op, old, value));
      old
    }
  }

  // ---------------------------------------------------------------------------
  // Byte Accesses
  // ---------------------------------------------------------------------------

  /// Copies `size` bytes from `src` to `dest` under the lock for `src`.
  ///
  /// # Safety
  ///
  /// `src` must be valid for reads of `size` bytes, `dest` valid for writes of
  /// `size` bytes, and the two must not overlap. Every concurrent access to
  /// `src` must go through this table.
  #[inline]
  pub unsafe fn load_bytes(&self, size: usize, src: *const u8, dest: *mut u8) {
    if size == 0 {
      return;
    }

    let _guard: LockGuard<'_, L> = self.lock(src);

    // SAFETY: Caller guarantees both ranges are valid and disjoint.
    unsafe { ptr::copy_nonoverlapping(src, dest, size) }
  }

  /// Copies `size` bytes from `src` to `dest` under the lock for `dest`.
  ///
  /// # Safety
  ///
  /// `dest` must be valid for writes of `size` bytes, `src` valid for reads of
  /// `size` bytes, and the two must not overlap. Every concurrent access to
  /// `dest` must go through this table.
  #[inline]
  pub unsafe fn store_bytes(&self, size: usize, dest: *mut u8, src: *const u8) {
    if size == 0 {
      return;
    }

    let _guard: LockGuard<'_, L> = self.lock(dest);

    // SAFETY: Caller guarantees both ranges are valid and disjoint.
    unsafe { ptr::copy_nonoverlapping(src, dest, size) }
  }

  /// Copies `size` bytes of `ptr` to `old`, then `val` over `ptr`, as one
  /// step under the lock for `ptr`.
  ///
  /// # Safety
  ///
  /// `ptr` must be valid for reads and writes of `size` bytes, `val` valid
  /// for reads and `old` for writes. None of the three may overlap. Every
  /// concurrent access to `ptr` must go through this table.
  #[inline]
  pub unsafe fn exchange_bytes(&self, size: usize, ptr: *mut u8, val: *const u8, old: *mut u8) {
    if size == 0 {
      return;
    }

    let _guard: LockGuard<'_, L> = self.lock(ptr);

    // SAFETY: Caller guarantees all three ranges are valid and disjoint.
    unsafe {
      ptr::copy_nonoverlapping(ptr, old, size);
      ptr::copy_nonoverlapping(val, ptr, size);
    }
  }

  /// Compares `size` bytes of `ptr` with `expected`. If equal, copies
  /// `desired` over `ptr` and returns `true`; otherwise copies `ptr` into
  /// `expected` and returns `false`. Both outcomes happen under the lock for
  /// `ptr`.
  ///
  /// # Safety
  ///
  /// `ptr` and `expected` must be valid for reads and writes of `size` bytes
  /// and `desired` valid for reads. `ptr` must not overlap the other two.
  /// Every concurrent access to `ptr` must go through this table.
  #[inline]
  pub unsafe fn compare_exchange_bytes(
    &self,
    size: usize,
    ptr: *mut u8,
    expected: *mut u8,
    desired: *const u8,
  ) -> bool {
    if size == 0 {
      return true;
    }

    let _guard: LockGuard<'_, L> = self.lock(ptr);

    // SAFETY: Caller guarantees `ptr` and `expected` are readable for `size`
    // bytes. The slices are dropped before either location is written.
    let equal: bool = unsafe {
      let current: &[u8] = slice::from_raw_parts(ptr, size);
      let wanted: &[u8] = slice::from_raw_parts(expected, size);

      current == wanted
    };

    if equal {
      // SAFETY: Caller guarantees `desired` is readable and disjoint from `ptr`.
      unsafe { ptr::copy_nonoverlapping(desired, ptr, size) }
    } else {
      // SAFETY: Caller guarantees `expected` is writable and disjoint from `ptr`.
      unsafe { ptr::copy_nonoverlapping(ptr, expected, size) }
    }

    equal
  }
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------

#[cfg(all(test, not(any(loom, shuttle))))]
mod tests {
  use std::sync::Arc;
  use std::thread;
  use std::thread::JoinHandle;

  use crate::lock::SpinLock;
  use crate::table::LockTable;
  use crate::utils::each_width;
  use crate::word::RmwOp;
  use crate::word::Word;

  type Table = LockTable<SpinLock, 16>;

  #[repr(C, packed)]
  struct Packed {
    tag: u8,
    word: u64,
  }

  #[test]
  fn typed_load_store() {
    let table: Table = Table::new();

    each_width!({
      let mut value: W = W::ZERO;

      unsafe {
        table.store(&raw mut value, W::MAX);
        assert_eq!(table.load(&raw const value), W::MAX);
      }

      assert_eq!(table.held(), 0);
    });
  }

  #[test]
  fn typed_swap_returns_previous() {
    let table: Table = Table::new();

    each_width!({
      let mut value: W = W::ONE;

      unsafe {
        assert_eq!(table.swap(&raw mut value, W::MAX), W::ONE);
        assert_eq!(table.swap(&raw mut value, W::ZERO), W::MAX);
      }

      assert_eq!(value, W::ZERO);
    });
  }

  #[test]
  fn typed_compare_exchange() {
    let table: Table = Table::new();

    each_width!({
      let mut value: W = W::ONE;

      unsafe {
        assert_eq!(table.compare_exchange(&raw mut value, W::ZERO, W::MAX), Err(W::ONE));
        assert_eq!(value, W::ONE);

        assert_eq!(table.compare_exchange(&raw mut value, W::ONE, W::MAX), Ok(W::ONE));
        assert_eq!(value, W::MAX);
      }
    });
  }

  #[test]
  fn typed_fetch_returns_previous() {
    let table: Table = Table::new();

    each_width!({
      let mut value: W = W::truncate(0b1100);

      unsafe {
        assert_eq!(table.fetch(&raw mut value, RmwOp::Add, W::ONE).widen(), 0b1100);
        assert_eq!(table.fetch(&raw mut value, RmwOp::Sub, W::ONE).widen(), 0b1101);
        assert_eq!(table.fetch(&raw mut value, RmwOp::And, W::truncate(0b1010)).widen(), 0b1100);
        assert_eq!(table.fetch(&raw mut value, RmwOp::Or, W::truncate(0b0001)).widen(), 0b1000);
        assert_eq!(table.fetch(&raw mut value, RmwOp::Xor, W::MAX).widen(), 0b1001);
      }

      assert_eq!(value, W::apply(RmwOp::Xor, W::truncate(0b1001), W::MAX));
    });
  }

  #[test]
  fn typed_unaligned() {
    let table: Table = Table::new();
    let mut packed: Packed = Packed { tag: 7, word: 0 };

    unsafe {
      table.store(&raw mut packed.word, 0x0102_0304_0506_0708_u64);
      assert_eq!(table.fetch(&raw mut packed.word, RmwOp::Add, 1), 0x0102_0304_0506_0708);
      assert_eq!(table.load(&raw const packed.word), 0x0102_0304_0506_0709);
    }

    assert_eq!(packed.tag, 7);
  }

  #[test]
  fn bytes_load_store() {
    let table: Table = Table::new();
    let mut object: [u8; 3] = [1, 2, 3];
    let mut output: [u8; 3] = [0; 3];

    unsafe {
      table.load_bytes(3, object.as_ptr(), output.as_mut_ptr());
      assert_eq!(output, [1, 2, 3]);

      table.store_bytes(3, object.as_mut_ptr(), [9, 8, 7].as_ptr());
    }

    assert_eq!(object, [9, 8, 7]);
  }

  #[test]
  fn bytes_exchange() {
    let table: Table = Table::new();
    let mut object: [u8; 7] = [1; 7];
    let replace: [u8; 7] = [2; 7];
    let mut old: [u8; 7] = [0; 7];

    unsafe {
      table.exchange_bytes(7, object.as_mut_ptr(), replace.as_ptr(), old.as_mut_ptr());
    }

    assert_eq!(object, [2; 7]);
    assert_eq!(old, [1; 7]);
  }

  #[test]
  fn bytes_compare_exchange_success() {
    let table: Table = Table::new();
    let mut object: [u8; 24] = [5; 24];
    let mut expected: [u8; 24] = [5; 24];
    let desired: [u8; 24] = [6; 24];

    let success: bool = unsafe {
      table.compare_exchange_bytes(24, object.as_mut_ptr(), expected.as_mut_ptr(), desired.as_ptr())
    };

    assert!(success);
    assert_eq!(object, [6; 24]);
    assert_eq!(expected, [5; 24]);
  }

  #[test]
  fn bytes_compare_exchange_failure() {
    let table: Table = Table::new();
    let mut object: [u8; 24] = [5; 24];
    let mut expected: [u8; 24] = [5; 24];
    let desired: [u8; 24] = [6; 24];

    expected[23] = 0;

    let success: bool = unsafe {
      table.compare_exchange_bytes(24, object.as_mut_ptr(), expected.as_mut_ptr(), desired.as_ptr())
    };

    assert!(!success);
    assert_eq!(object, [5; 24]);
    assert_eq!(expected, [5; 24]);
  }

  #[test]
  fn zero_size_is_noop() {
    let table: Table = Table::new();
    let mut object: [u8; 1] = [1];
    let mut expected: [u8; 1] = [2];

    let success: bool = unsafe {
      table.compare_exchange_bytes(0, object.as_mut_ptr(), expected.as_mut_ptr(), [3].as_ptr())
    };

    assert!(success);
    assert_eq!(object, [1]);
    assert_eq!(expected, [2]);
    assert_eq!(table.held(), 0);
  }

  #[test]
  fn zero_size_accepts_null() {
    let table: Table = Table::new();
    let null: *mut u8 = core::ptr::null_mut();

    unsafe {
      table.load_bytes(0, null, null);
      table.store_bytes(0, null, null);
      table.exchange_bytes(0, null, null, null);
      assert!(table.compare_exchange_bytes(0, null, null, null));
    }

    assert_eq!(table.held(), 0);
  }

  #[test]
  fn fetch_add_has_no_lost_updates() {
    const THREADS: usize = 4;
    const ROUNDS: usize = 1_000;

    struct Shared {
      table: Table,
      value: core::cell::UnsafeCell<u128>,
    }

    // SAFETY: `value` is only touched through `table`.
    unsafe impl Sync for Shared {}

    let shared: Arc<Shared> = Arc::new(Shared {
      table: Table::new(),
      value: core::cell::UnsafeCell::new(0),
    });

    let handles: Vec<JoinHandle<()>> = (0..THREADS)
      .map(|_| {
        let shared: Arc<Shared> = Arc::clone(&shared);

        thread::spawn(move || {
          for _ in 0..ROUNDS {
            unsafe {
              shared.table.fetch(shared.value.get(), RmwOp::Add, 1);
            }
          }
        })
      })
      .collect();

    for handle in handles {
      handle.join().unwrap();
    }

    let total: u128 = unsafe { shared.table.load(shared.value.get()) };

    assert_eq!(total, (THREADS * ROUNDS) as u128);
  }
}
