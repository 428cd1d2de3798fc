//! Generic (runtime-size) dispatcher.
//!
//! Operates on objects of any byte size. Sizes of 1, 2, 4 or 8 bytes, at an
//! address aligned to the size, take the hardware path when the target has the
//! matching atomics. Everything else, including every 16-byte object, copies
//! bytes under the process-wide lock table.
//!
//! The choice depends only on the size and address, so repeated accesses to one
//! object always take the same path.
//!
//! # Safety
//!
//! Each function documents its pointer requirements. In addition, every
//! concurrent access to the target object must also go through this crate, with
//! the same size.

use core::ptr;

use crate::order::MemoryOrder;
use crate::table::global;
use crate::word::Native;
use crate::word::Width;
use crate::word::Word;

// -----------------------------------------------------------------------------
// Hardware Dispatch
// -----------------------------------------------------------------------------

/// An operation that can run against a hardware atomic of any width.
trait Access {
  type Output;

  /// Runs the operation against `atomic`.
  ///
  /// # Safety
  ///
  /// Any buffer the access carries must be valid for `size_of::<W>()` bytes.
  unsafe fn native<W>(self, atomic: &W::Native) -> Self::Output
  where
    W: Word;
}

/// Runs `access` on the hardware path, or hands it back if `size` bytes at
/// `ptr` must take the fallback path.
///
/// # Safety
///
/// `ptr` must be valid for reads and writes of `size` bytes.
#[inline]
unsafe fn hardware<A>(size: usize, ptr: *mut u8, access: A) -> Result<A::Output, A>
where
  A: Access,
{
  // SAFETY: Caller guarantees `ptr` covers `size` bytes; `native` checks
  // alignment for the width that `size` selects.
  unsafe {
    match Width::new(size) {
      Some(Width::U8) => native::<u8, A>(ptr, access),
      Some(Width::U16) => native::<u16, A>(ptr, access),
      Some(Width::U32) => native::<u32, A>(ptr, access),
      Some(Width::U64) => native::<u64, A>(ptr, access),
      Some(Width::U128) | None => Err(access),
    }
  }
}

/// # Safety
///
/// `ptr` must be valid for reads and writes of `W`.
#[inline]
unsafe fn native<W, A>(ptr: *mut u8, access: A) -> Result<A::Output, A>
where
  W: Word,
  A: Access,
{
  // The atomic view needs natural alignment, which can exceed
  // `align_of::<W>()` (`u64` on 32-bit x86).
  if !ptr.addr().is_multiple_of(size_of::<W>()) {
    return Err(access);
  }

  let ptr: *mut W = ptr.cast();

  // SAFETY: `ptr` is valid and aligned to the width of `W`.
  match unsafe { <W::Native as Native<W>>::from_ptr(ptr) } {
    // SAFETY: Caller guarantees the access's buffers.
    Some(atomic) => Ok(unsafe { access.native::<W>(atomic) }),
    None => Err(access),
  }
}

// -----------------------------------------------------------------------------
// Operations
// -----------------------------------------------------------------------------

struct Load {
  dest: *mut u8,
  order: MemoryOrder,
}

impl Access for Load {
  type Output = ();

  #[inline]
  unsafe fn native<W>(self, atomic: &W::Native) -> Self::Output
  where
    W: Word,
  {
    let value: W = atomic.load(self.order.load());

    // SAFETY: Caller guarantees `dest` holds `size_of::<W>()` bytes.
    unsafe { self.dest.cast::<W>().write_unaligned(value) }
  }
}

struct Store {
  src: *const u8,
  order: MemoryOrder,
}

impl Access for Store {
  type Output = ();

  #[inline]
  unsafe fn native<W>(self, atomic: &W::Native) -> Self::Output
  where
    W: Word,
  {
    // SAFETY: Caller guarantees `src` holds `size_of::<W>()` bytes.
    let value: W = unsafe { self.src.cast::<W>().read_unaligned() };

    atomic.store(value, self.order.store());
  }
}

struct Exchange {
  val: *const u8,
  old: *mut u8,
  order: MemoryOrder,
}

impl Access for Exchange {
  type Output = ();

  #[inline]
  unsafe fn native<W>(self, atomic: &W::Native) -> Self::Output
  where
    W: Word,
  {
    // SAFETY: Caller guarantees `val` and `old` hold `size_of::<W>()` bytes.
    unsafe {
      let value: W = self.val.cast::<W>().read_unaligned();
      let old: W = atomic.swap(value, self.order.rmw());

      self.old.cast::<W>().write_unaligned(old);
    }
  }
}

struct CompareExchange {
  expected: *mut u8,
  desired: *const u8,
  success: MemoryOrder,
  failure: MemoryOrder,
}

impl Access for CompareExchange {
  type Output = bool;

  #[inline]
  unsafe fn native<W>(self, atomic: &W::Native) -> Self::Output
  where
    W: Word,
  {
    // SAFETY: Caller guarantees `expected` and `desired` hold
    // `size_of::<W>()` bytes.
    unsafe {
      let expected: *mut W = self.expected.cast();
      let current: W = expected.read_unaligned();
      let desired: W = self.desired.cast::<W>().read_unaligned();

      match atomic.compare_exchange(current, desired, self.success.rmw(), self.failure.failure()) {
        Ok(_) => true,
        Err(actual) => {
          expected.write_unaligned(actual);
          false
        }
      }
    }
  }
}

/// Atomically copies `size` bytes from `src` to `dest`.
///
/// Atomic with respect to `src` only.
///
/// # Safety
///
/// `src` must be valid for reads of `size` bytes and `dest` valid for writes
/// of `size` bytes. The two must not overlap.
#[inline]
pub unsafe fn load(size: usize, src: *const u8, dest: *mut u8, order: MemoryOrder) {
  let access: Load = Load { dest, order };

  // SAFETY: Caller guarantees both buffers; `src` is only read.
  if unsafe { hardware(size, src.cast_mut(), access) }.is_err() {
    // SAFETY: Caller guarantees both buffers.
    unsafe { global().load_bytes(size, src, dest) }
  }
}

/// Atomically copies `size` bytes from `src` to `dest`.
///
/// Atomic with respect to `dest` only.
///
/// # Safety
///
/// `dest` must be valid for writes of `size` bytes and `src` valid for reads
/// of `size` bytes. The two must not overlap.
#[inline]
pub unsafe fn store(size: usize, dest: *mut u8, src: *const u8, order: MemoryOrder) {
  let access: Store = Store { src, order };

  // SAFETY: Caller guarantees both buffers.
  if unsafe { hardware(size, dest, access) }.is_err() {
    // SAFETY: Caller guarantees both buffers.
    unsafe { global().store_bytes(size, dest, src) }
  }
}

/// Atomically replaces `size` bytes at `ptr` with those at `val`, copying the
/// previous contents to `old`.
///
/// # Safety
///
/// `ptr` must be valid for reads and writes of `size` bytes, `val` for reads
/// and `old` for writes. None of the three may overlap.
#[inline]
pub unsafe fn exchange(
  size: usize,
  ptr: *mut u8,
  val: *const u8,
  old: *mut u8,
  order: MemoryOrder,
) {
  let access: Exchange = Exchange { val, old, order };

  // SAFETY: Caller guarantees all three buffers.
  if unsafe { hardware(size, ptr, access) }.is_err() {
    // SAFETY: Caller guarantees all three buffers.
    unsafe { global().exchange_bytes(size, ptr, val, old) }
  }
}

/// Atomically compares `size` bytes at `ptr` with those at `expected`.
///
/// If equal, copies `desired` over `ptr` and returns `true`. Otherwise copies
/// the current contents of `ptr` into `expected` and returns `false`. Never
/// fails spuriously and never partially applies.
///
/// # Safety
///
/// `ptr` and `expected` must be valid for reads and writes of `size` bytes and
/// `desired` valid for reads. `ptr` must not overlap the other two.
#[inline]
pub unsafe fn compare_exchange(
  size: usize,
  ptr: *mut u8,
  expected: *mut u8,
  desired: *const u8,
  success: MemoryOrder,
  failure: MemoryOrder,
) -> bool {
  let access: CompareExchange = CompareExchange {
    expected,
    desired,
    success,
    failure,
  };

  // SAFETY: Caller guarantees all three buffers.
  match unsafe { hardware(size, ptr, access) } {
    Ok(exchanged) => exchanged,
    // SAFETY: Caller guarantees all three buffers.
    Err(_) => unsafe { global().compare_exchange_bytes(size, ptr, expected, desired) },
  }
}

/// Copies a value of type `T` into an uninitialized destination through
/// [`load`].
///
/// # Safety
///
/// See [`load`]. `T` must be valid for any bit pattern the location can hold.
#[inline]
pub unsafe fn load_value<T>(src: *const T, order: MemoryOrder) -> T
where
  T: Copy,
{
  let mut dest: core::mem::MaybeUninit<T> = core::mem::MaybeUninit::uninit();

  // SAFETY: Caller guarantees `src`; `dest` is a local of the same size.
  unsafe {
    load(size_of::<T>(), src.cast(), dest.as_mut_ptr().cast(), order);
    dest.assume_init()
  }
}

/// Copies `value` into `dest` through [`store`].
///
/// # Safety
///
/// See [`store`].
#[inline]
pub unsafe fn store_value<T>(dest: *mut T, value: T, order: MemoryOrder)
where
  T: Copy,
{
  // SAFETY: Caller guarantees `dest`; `value` is a local of the same size.
  unsafe { store(size_of::<T>(), dest.cast(), ptr::from_ref(&value).cast(), order) }
}

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------
