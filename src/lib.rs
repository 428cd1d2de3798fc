//! Lock-striped fallback for atomic operations of arbitrary width.
//!
//! `latom` performs atomic loads, stores, exchanges, compare-exchanges and
//! fetch-and-modify operations on memory of any size. Accesses the hardware can
//! do in one instruction are passed straight through to `core::sync::atomic`.
//! Everything else is serialized through a fixed, process-wide table of locks,
//! striped by address.
//!
//! # Usage
//!
//! Fixed-width words go through [`sized`]:
//!
//! ```
//! use latom::MemoryOrder;
//! use latom::sized;
//!
//! let mut value: u128 = 1;
//!
//! // 16-byte words always take the lock-based path.
//! let old = unsafe { sized::fetch_add(&raw mut value, 41, MemoryOrder::AcqRel) };
//!
//! assert_eq!(old, 1);
//! assert_eq!(unsafe { sized::load(&raw const value, MemoryOrder::Acquire) }, 42);
//! ```
//!
//! Objects of any other size go through [`generic`]:
//!
//! ```
//! use latom::MemoryOrder;
//! use latom::generic;
//!
//! let mut object: [u8; 24] = [1; 24];
//! let mut expected: [u8; 24] = [0; 24];
//! let desired: [u8; 24] = [2; 24];
//!
//! let swapped = unsafe {
//!   generic::compare_exchange(
//!     24,
//!     object.as_mut_ptr(),
//!     expected.as_mut_ptr(),
//!     desired.as_ptr(),
//!     MemoryOrder::SeqCst,
//!     MemoryOrder::SeqCst,
//!   )
//! };
//!
//! // The exchange failed and `expected` now holds the current contents.
//! assert!(!swapped);
//! assert_eq!(expected, [1; 24]);
//! ```
//!
//! # Paths
//!
//! Each access takes exactly one of two paths:
//!
//! - The **hardware path**: 1, 2, 4 and 8-byte accesses, aligned to their size,
//!   on targets with the matching atomic instructions. The requested
//!   [`MemoryOrder`] is honoured.
//! - The **fallback path**: everything else. The access locks the table slot
//!   selected by its address, copies bytes, and unlocks. The lock supplies
//!   acquire/release ordering whatever was requested.
//!
//! 16-byte accesses always take the fallback path. [`is_lock_free`] reports
//! which path a size takes.
//!
//! Every access to one location must take the same path. Mixing a
//! `core::sync::atomic` access with a fallback access on the same memory is
//! unsound: the fallback lock does not exclude the hardware instruction.
//!
//! # Lock Table
//!
//! The process-wide table ([`global`]) is a `static` array of
//! [`DefaultLock`]s, valid when all-zero and never torn down. Addresses map to
//! locks through [`LockIndex`]: every byte of an aligned
//! [`ALIGNMENT`]-byte granule shares one lock, so adjacent fields of an object
//! accessed at different widths still serialize against each other.
//!
//! A [`LockTable`] of a different size or lock primitive can also be built
//! locally, for example to isolate a subsystem from the shared table:
//!
//! ```
//! use latom::LockTable;
//! use latom::lock::BackoffLock;
//!
//! static LOCKS: LockTable<BackoffLock, 4096> = LockTable::new();
//!
//! let mut value: u64 = 0;
//!
//! unsafe {
//!   LOCKS.store(&raw mut value, 7);
//!   assert_eq!(LOCKS.load(&raw const value), 7);
//! }
//! ```
//!
//! # Features
//!
//! - `std`: waiting threads yield to the OS scheduler after spinning.
//! - `tracing`: emit a `trace` event when a fallback lock is contended.
//! - `abi`: export the `__atomic_*` C symbols (see `abi`).
//!
//! [`ALIGNMENT`]: crate::config::ALIGNMENT
//! [`DefaultLock`]: crate::lock::DefaultLock
//!

#![cfg_attr(not(any(feature = "std", test)), no_std)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

mod index;
mod locked;
mod order;
mod params;
mod table;
mod utils;
mod word;

pub(crate) use crate::utils::sync;

#[cfg(not(any(loom, shuttle)))]
pub mod generic;

#[cfg(not(any(loom, shuttle)))]
pub mod sized;

#[cfg(all(feature = "abi", not(any(loom, shuttle))))]
#[cfg_attr(docsrs, doc(cfg(feature = "abi")))]
pub mod abi;

pub mod implementation {
  #![doc = include_str!("../IMPLEMENTATION.md")]
}

pub mod config {
  //! Compile-time parameters of the lock table.

  pub use crate::params::ALIGNMENT;
  pub use crate::params::Capacity;
  pub use crate::params::ConstParams;
  pub use crate::params::DebugParams;
  pub use crate::params::DefaultParams;
  pub use crate::params::Params;
  pub use crate::params::ParamsExt;
}

pub mod lock;

pub use self::index::LockIndex;

pub use self::order::MemoryOrder;
pub use self::order::OrderError;

pub use self::table::DEFAULT_LOCKS;
pub use self::table::LockTable;

#[cfg(not(any(loom, shuttle)))]
pub use self::table::global;

pub use self::word::Locked;
pub use self::word::Native;
pub use self::word::RmwOp;
pub use self::word::Width;
pub use self::word::WidthError;
pub use self::word::Word;
pub use self::word::is_lock_free;
