//! Fixed-size dispatcher.
//!
//! Each operation is generic over [`Word`] and picks its path once, from the
//! word's [`Native`] view: the matching hardware atomic where the target has
//! one, otherwise the process-wide [`LockTable`]. The fallback path ignores the
//! requested [`MemoryOrder`]; the lock's acquire/release pairing is always at
//! least as strong.
//!
//! # Safety
//!
//! Every function here shares one contract. `ptr` must be valid for reads and
//! writes of `W` and aligned to `size_of::<W>()`, and every concurrent access
//! to the same memory must also go through this crate with the same `W`.
//! Mixing a hardware access with a fallback access on one location is
//! unsound, since the fallback lock does not exclude the hardware path.
//!
//! [`LockTable`]: crate::LockTable

use crate::order::MemoryOrder;
use crate::table::global;
use crate::word::Native;
use crate::word::RmwOp;
use crate::word::Word;

/// Returns the hardware view of `ptr`, if `W` has one.
///
/// # Safety
///
/// See the [module docs](self).
#[inline]
unsafe fn native<'a, W>(ptr: *mut W) -> Option<&'a W::Native>
where
  W: Word,
{
  // SAFETY: Caller upholds the module contract for `'a`.
  unsafe { <W::Native as Native<W>>::from_ptr(ptr) }
}

/// Atomically loads the word at `ptr`.
///
/// # Safety
///
/// See the [module docs](self).
#[inline]
pub unsafe fn load<W>(ptr: *const W, order: MemoryOrder) -> W
where
  W: Word,
{
  // SAFETY: Caller upholds the module contract.
  match unsafe { native(ptr.cast_mut()) } {
    Some(atomic) => atomic.load(order.load()),
    None => unsafe { global().load(ptr) },
  }
}

/// Atomically stores `value` at `ptr`.
///
/// # Safety
///
/// See the [module docs](self).
#[inline]
pub unsafe fn store<W>(ptr: *mut W, value: W, order: MemoryOrder)
where
  W: Word,
{
  // SAFETY: Caller upholds the module contract.
  match unsafe { native(ptr) } {
    Some(atomic) => atomic.store(value, order.store()),
    None => unsafe { global().store(ptr, value) },
  }
}

/// Atomically replaces the word at `ptr` with `value`, returning the previous
/// value.
///
/// # Safety
///
/// See the [module docs](self).
#[inline]
pub unsafe fn exchange<W>(ptr: *mut W, value: W, order: MemoryOrder) -> W
where
  W: Word,
{
  // SAFETY: Caller upholds the module contract.
  match unsafe { native(ptr) } {
    Some(atomic) => atomic.swap(value, order.rmw()),
    None => unsafe { global().swap(ptr, value) },
  }
}

/// Atomically stores `new` at `ptr` if it currently holds `current`.
///
/// Returns the value found at `ptr`: [`Ok`] if the store happened, [`Err`]
/// otherwise. Never fails spuriously.
///
/// # Safety
///
/// See the [module docs](self).
#[inline]
pub unsafe fn compare_exchange<W>(
  ptr: *mut W,
  current: W,
  new: W,
  success: MemoryOrder,
  failure: MemoryOrder,
) -> Result<W, W>
where
  W: Word,
{
  // SAFETY: Caller upholds the module contract.
  match unsafe { native(ptr) } {
    Some(atomic) => atomic.compare_exchange(current, new, success.rmw(), failure.failure()),
    None => unsafe { global().compare_exchange(ptr, current, new) },
  }
}

/// Atomically applies `op` with `value` to the word at `ptr`, returning the
/// previous value.
///
/// Arithmetic wraps on overflow.
///
/// # Safety
///
/// See the [module docs](self).
#[inline]
pub unsafe fn fetch<W>(ptr: *mut W, op: RmwOp, value: W, order: MemoryOrder) -> W
where
  W: Word,
{
  // SAFETY: Caller upholds the module contract.
  match unsafe { native(ptr) } {
    Some(atomic) => atomic.fetch(op, value, order.rmw()),
    None => unsafe { global().fetch(ptr, op, value) },
  }
}

macro_rules! fetch_op {
  ($(#[$meta:meta])* $name:ident, $op:ident) => {
    $(#[$meta])*
    ///
    /// # Safety
    ///
    /// See the [module docs](self).
    #[inline]
    pub unsafe fn $name<W>(ptr: *mut W, value: W, order: MemoryOrder) -> W
    where
      W: Word,
    {
      // SAFETY: Caller upholds the module contract.
      unsafe { fetch(ptr, RmwOp::$op, value, order) }
    }
  };
}

fetch_op!(
  /// Atomically adds `value` (wrapping), returning the previous value.
  fetch_add,
  Add
);

fetch_op!(
  /// Atomically subtracts `value` (wrapping), returning the previous value.
  fetch_sub,
  Sub
);

fetch_op!(
  /// Atomically bitwise-ands `value`, returning the previous value.
  fetch_and,
  And
);

fetch_op!(
  /// Atomically bitwise-ors `value`, returning the previous value.
  fetch_or,
  Or
);

fetch_op!(
  /// Atomically bitwise-xors `value`, returning the previous value.
  fetch_xor,
  Xor
);

// -----------------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------------
