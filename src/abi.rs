//! `__atomic_*` symbols with the C calling convention.
//!
//! These are the entry points compilers emit calls to when they cannot inline
//! an atomic access: the generic `__atomic_load`/`store`/`exchange`/
//! `compare_exchange` family over a runtime size, and the `_1`/`_2`/`_4`/`_8`/
//! `_16` fixed-width family with the fetch-and-modify variants.
//!
//! Raw memory-order arguments outside `0..=5` are treated as `SeqCst`.
//!
//! # Safety
//!
//! Callers must uphold the contracts of [`generic`] and [`sized`].
//!
//! [`generic`]: crate::generic
//! [`sized`]: crate::sized

use core::ffi::c_int;
use core::ffi::c_void;

use crate::generic;
use crate::order::MemoryOrder;
use crate::word::is_lock_free;

#[inline]
fn order(model: c_int) -> MemoryOrder {
  MemoryOrder::from_raw(model).unwrap_or(MemoryOrder::SeqCst)
}

// -----------------------------------------------------------------------------
// Generic
// -----------------------------------------------------------------------------

/// # Safety
///
/// See [`generic::load`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn __atomic_load(
  size: usize,
  src: *const c_void,
  dest: *mut c_void,
  model: c_int,
) {
  // SAFETY: Caller upholds the `generic::load` contract.
  unsafe { generic::load(size, src.cast(), dest.cast(), order(model)) }
}

/// # Safety
///
/// See [`generic::store`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn __atomic_store(
  size: usize,
  dest: *mut c_void,
  src: *const c_void,
  model: c_int,
) {
  // SAFETY: Caller upholds the `generic::store` contract.
  unsafe { generic::store(size, dest.cast(), src.cast(), order(model)) }
}

/// # Safety
///
/// See [`generic::exchange`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn __atomic_exchange(
  size: usize,
  ptr: *mut c_void,
  val: *const c_void,
  old: *mut c_void,
  model: c_int,
) {
  // SAFETY: Caller upholds the `generic::exchange` contract.
  unsafe { generic::exchange(size, ptr.cast(), val.cast(), old.cast(), order(model)) }
}

/// # Safety
///
/// See [`generic::compare_exchange`].
#[unsafe(no_mangle)]
pub unsafe extern "C" fn __atomic_compare_exchange(
  size: usize,
  ptr: *mut c_void,
  expected: *mut c_void,
  desired: *const c_void,
  success: c_int,
  failure: c_int,
) -> bool {
  // SAFETY: Caller upholds the `generic::compare_exchange` contract.
  unsafe {
    generic::compare_exchange(
      size,
      ptr.cast(),
      expected.cast(),
      desired.cast(),
      order(success),
      order(failure),
    )
  }
}

/// Returns `true` if `size` bytes at `ptr` take the hardware path.
///
/// A null `ptr` asks about a typically aligned object.
#[unsafe(no_mangle)]
pub extern "C" fn __atomic_is_lock_free(size: usize, ptr: *const c_void) -> bool {
  is_lock_free(size) && (ptr.is_null() || ptr.addr().is_multiple_of(size))
}

// -----------------------------------------------------------------------------
// Fixed Width
// -----------------------------------------------------------------------------

macro_rules! sized_abi {
  (@fetch $word:ty, $name:ident, $op:ident) => {
    /// # Safety
    ///
    /// See [`sized::fetch`](crate::sized::fetch).
    #[unsafe(no_mangle)]
    pub unsafe extern "C" fn $name(ptr: *mut $word, val: $word, model: c_int) -> $word {
      // SAFETY: Caller upholds the `sized` contract.
      unsafe { sized::fetch(ptr, RmwOp::$op, val, order(model)) }
    }
  };
  (
    $word:ty =>
      $load:ident,
      $store:ident,
      $exchange:ident,
      $compare_exchange:ident,
      $fetch_add:ident,
      $fetch_sub:ident,
      $fetch_and:ident,
      $fetch_or:ident,
      $fetch_xor:ident $(,)?
  ) => {
    /// # Safety
    ///
    /// See [`sized::load`](crate::sized::load).
    #[unsafe(no_mangle)]
    pub unsafe extern "C" fn $load(src: *const $word, model: c_int) -> $word {
      // SAFETY: Caller upholds the `sized` contract.
      unsafe { sized::load(src, order(model)) }
    }

    /// # Safety
    ///
    /// See [`sized::store`](crate::sized::store).
    #[unsafe(no_mangle)]
    pub unsafe extern "C" fn $store(dest: *mut $word, val: $word, model: c_int) {
      // SAFETY: Caller upholds the `sized` contract.
      unsafe { sized::store(dest, val, order(model)) }
    }

    /// # Safety
    ///
    /// See [`sized::exchange`](crate::sized::exchange).
    #[unsafe(no_mangle)]
    pub unsafe extern "C" fn $exchange(dest: *mut $word, val: $word, model: c_int) -> $word {
      // SAFETY: Caller upholds the `sized` contract.
      unsafe { sized::exchange(dest, val, order(model)) }
    }

    /// Stores `desired` if `*ptr == *expected`; otherwise copies `*ptr` into
    /// `*expected`.
    ///
    /// # Safety
    ///
    /// See [`sized::compare_exchange`](crate::sized::compare_exchange).
    /// `expected` must be valid for reads and writes.
    #[unsafe(no_mangle)]
    pub unsafe extern "C" fn $compare_exchange(
      ptr: *mut $word,
      expected: *mut $word,
      desired: $word,
      success: c_int,
      failure: c_int,
    ) -> bool {
      // SAFETY: Caller upholds the `sized` contract and guarantees `expected`.
      unsafe {
        let current: $word = expected.read_unaligned();

        match sized::compare_exchange(ptr, current, desired, order(success), order(failure)) {
          Ok(_) => true,
          Err(actual) => {
            expected.write_unaligned(actual);
            false
          }
        }
      }
    }

    sized_abi!(@fetch $word, $fetch_add, Add);
    sized_abi!(@fetch $word, $fetch_sub, Sub);
    sized_abi!(@fetch $word, $fetch_and, And);
    sized_abi!(@fetch $word, $fetch_or, Or);
    sized_abi!(@fetch $word, $fetch_xor, Xor);
  };
}

macro_rules! sized_mod {
  ($(#[$meta:meta])* $name:ident, $($tt:tt)*) => {
    $(#[$meta])*
    pub mod $name {
      use core::ffi::c_int;

      use super::order;
      use crate::sized;
      use crate::word::RmwOp;

      sized_abi!($($tt)*);
    }
  };
}

sized_mod!(
  /// 1-byte entry points.
  width1,
  u8 =>
    __atomic_load_1,
    __atomic_store_1,
    __atomic_exchange_1,
    __atomic_compare_exchange_1,
    __atomic_fetch_add_1,
    __atomic_fetch_sub_1,
    __atomic_fetch_and_1,
    __atomic_fetch_or_1,
    __atomic_fetch_xor_1,
);

sized_mod!(
  /// 2-byte entry points.
  width2,
  u16 =>
    __atomic_load_2,
    __atomic_store_2,
    __atomic_exchange_2,
    __atomic_compare_exchange_2,
    __atomic_fetch_add_2,
    __atomic_fetch_sub_2,
    __atomic_fetch_and_2,
    __atomic_fetch_or_2,
    __atomic_fetch_xor_2,
);

sized_mod!(
  /// 4-byte entry points.
  width4,
  u32 =>
    __atomic_load_4,
    __atomic_store_4,
    __atomic_exchange_4,
    __atomic_compare_exchange_4,
    __atomic_fetch_add_4,
    __atomic_fetch_sub_4,
    __atomic_fetch_and_4,
    __atomic_fetch_or_4,
    __atomic_fetch_xor_4,
);

sized_mod!(
  /// 8-byte entry points.
  width8,
  u64 =>
    __atomic_load_8,
    __atomic_store_8,
    __atomic_exchange_8,
    __atomic_compare_exchange_8,
    __atomic_fetch_add_8,
    __atomic_fetch_sub_8,
    __atomic_fetch_and_8,
    __atomic_fetch_or_8,
    __atomic_fetch_xor_8,
);

sized_mod!(
  /// 16-byte entry points. Always lock-based.
  #[allow(improper_ctypes_definitions)]
  width16,
  u128 =>
    __atomic_load_16,
    __atomic_store_16,
    __atomic_exchange_16,
    __atomic_compare_exchange_16,
    __atomic_fetch_add_16,
    __atomic_fetch_sub_16,
    __atomic_fetch_and_16,
    __atomic_fetch_or_16,
    __atomic_fetch_xor_16,
);

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
  use core::ffi::c_void;
  use core::ptr;

  use crate::abi::__atomic_compare_exchange;
  use crate::abi::__atomic_exchange;
  use crate::abi::__atomic_is_lock_free;
  use crate::abi::__atomic_load;
  use crate::abi::__atomic_store;
  use crate::abi::width4::__atomic_compare_exchange_4;
  use crate::abi::width4::__atomic_fetch_add_4;
  use crate::abi::width4::__atomic_load_4;
  use crate::abi::width16::__atomic_compare_exchange_16;
  use crate::abi::width16::__atomic_fetch_xor_16;
  use crate::abi::width16::__atomic_load_16;
  use crate::abi::width16::__atomic_store_16;

  const SEQ_CST: i32 = 5;

  #[repr(C, align(16))]
  struct Aligned<T>(T);

  #[test]
  fn generic_roundtrip() {
    let mut object: [u8; 5] = [0; 5];
    let mut output: [u8; 5] = [0; 5];
    let mut old: [u8; 5] = [0; 5];

    unsafe {
      __atomic_store(5, object.as_mut_ptr().cast(), [1_u8, 2, 3, 4, 5].as_ptr().cast(), SEQ_CST);
      __atomic_load(5, object.as_ptr().cast(), output.as_mut_ptr().cast(), SEQ_CST);
      __atomic_exchange(
        5,
        object.as_mut_ptr().cast(),
        [9_u8; 5].as_ptr().cast(),
        old.as_mut_ptr().cast(),
        SEQ_CST,
      );
    }

    assert_eq!(output, [1, 2, 3, 4, 5]);
    assert_eq!(old, [1, 2, 3, 4, 5]);
    assert_eq!(object, [9; 5]);
  }

  #[test]
  fn generic_compare_exchange_reports_current() {
    let mut object: [u8; 5] = [7; 5];
    let mut expected: [u8; 5] = [0; 5];

    let success: bool = unsafe {
      __atomic_compare_exchange(
        5,
        object.as_mut_ptr().cast(),
        expected.as_mut_ptr().cast(),
        [1_u8; 5].as_ptr().cast(),
        SEQ_CST,
        SEQ_CST,
      )
    };

    assert!(!success);
    assert_eq!(expected, [7; 5]);
    assert_eq!(object, [7; 5]);
  }

  #[test]
  fn invalid_model_is_seq_cst() {
    let mut value: Aligned<u32> = Aligned(3);

    unsafe {
      assert_eq!(__atomic_fetch_add_4(&raw mut value.0, 1, 42), 3);
      assert_eq!(__atomic_load_4(&raw const value.0, -1), 4);
    }
  }

  #[test]
  fn sized_compare_exchange_writes_back() {
    let mut value: Aligned<u32> = Aligned(10);
    let mut expected: u32 = 11;

    let success: bool = unsafe {
      __atomic_compare_exchange_4(&raw mut value.0, &raw mut expected, 12, SEQ_CST, SEQ_CST)
    };

    assert!(!success);
    assert_eq!(expected, 10);

    let success: bool = unsafe {
      __atomic_compare_exchange_4(&raw mut value.0, &raw mut expected, 12, SEQ_CST, SEQ_CST)
    };

    assert!(success);
    assert_eq!(value.0, 12);
  }

  #[test]
  fn sixteen_bytes() {
    let mut value: Aligned<u128> = Aligned(0);
    let mut expected: u128 = 0;

    unsafe {
      __atomic_store_16(&raw mut value.0, u128::MAX, SEQ_CST);
      assert_eq!(__atomic_fetch_xor_16(&raw mut value.0, u128::MAX >> 64, SEQ_CST), u128::MAX);
      assert_eq!(__atomic_load_16(&raw const value.0, SEQ_CST), u128::MAX << 64);

      let ptr: *mut u128 = &raw mut value.0;

      assert!(!__atomic_compare_exchange_16(ptr, &raw mut expected, 1, SEQ_CST, SEQ_CST));
      assert_eq!(expected, u128::MAX << 64);
      assert!(__atomic_compare_exchange_16(ptr, &raw mut expected, 1, SEQ_CST, SEQ_CST));
    }

    assert_eq!(value.0, 1);
  }

  #[test]
  fn is_lock_free_query() {
    let value: Aligned<[u8; 16]> = Aligned([0; 16]);
    let base: *const c_void = (&raw const value.0).cast();

    assert!(!__atomic_is_lock_free(16, ptr::null()));
    assert!(!__atomic_is_lock_free(3, ptr::null()));
    assert!(!__atomic_is_lock_free(16, base));

    #[cfg(target_has_atomic = "32")]
    {
      assert!(__atomic_is_lock_free(4, ptr::null()));
      assert!(__atomic_is_lock_free(4, base));
      assert!(!__atomic_is_lock_free(4, base.wrapping_byte_add(2)));
    }
  }
}
