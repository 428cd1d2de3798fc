#[cfg(all(loom, shuttle))]
compile_error!("cannot use loom and shuttle at once");

#[cfg(not(any(loom, shuttle)))]
pub(crate) mod sync {
  pub(crate) mod atomic {
    pub(crate) use ::core::sync::atomic::AtomicUsize;
    pub(crate) use ::core::sync::atomic::Ordering;
  }

  pub(crate) mod hint {
    pub(crate) use ::core::hint::spin_loop;
  }

  #[cfg(feature = "std")]
  pub(crate) mod thread {
    pub(crate) use ::std::thread::yield_now;
  }
}

// Model checkers only switch threads at their own sync points, so every busy
// wait has to go through the scheduler.
#[cfg(loom)]
pub(crate) mod sync {
  pub(crate) mod atomic {
    pub(crate) use ::loom::sync::atomic::AtomicUsize;
    pub(crate) use ::loom::sync::atomic::Ordering;
  }

  pub(crate) mod hint {
    pub(crate) use ::loom::thread::yield_now as spin_loop;
  }

  pub(crate) mod thread {
    pub(crate) use ::loom::thread::yield_now;
  }
}

#[cfg(shuttle)]
pub(crate) mod sync {
  pub(crate) mod atomic {
    pub(crate) use ::shuttle::sync::atomic::AtomicUsize;
    pub(crate) use ::shuttle::sync::atomic::Ordering;
  }

  pub(crate) mod hint {
    pub(crate) use ::shuttle::thread::yield_now as spin_loop;
  }

  pub(crate) mod thread {
    pub(crate) use ::shuttle::thread::yield_now;
  }
}
