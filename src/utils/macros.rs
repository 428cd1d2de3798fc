macro_rules! each_capacity {
  ($expr:expr) => {
    #[cfg(any(coverage, coverage_nightly, miri))]
    {
      $crate::utils::each_capacity!(
        @impl $expr,
        4, 10, 16,
      );
    }

    #[cfg(not(any(coverage, coverage_nightly, miri)))]
    {
      $crate::utils::each_capacity!(
        @impl $expr,
        4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15, 16,
      );
    }
  };
  (@impl $expr:expr, $($bits:expr),+ $(,)?) => {
    $(
      $crate::utils::each_capacity!(@run $expr, $bits);
    )+
  };
  (@run $expr:expr, $bits:expr) => {{
    type P = $crate::params::ConstParams::<{ 1 << $bits }>;
    $expr
  }};
}

macro_rules! each_width {
  ($expr:expr) => {
    $crate::utils::each_width!(@impl $expr, u8, u16, u32, u64, u128);
  };
  (@impl $expr:expr, $($word:ty),+ $(,)?) => {
    $(
      $crate::utils::each_width!(@run $expr, $word);
    )+
  };
  (@run $expr:expr, $word:ty) => {{
    type W = $word;
    $expr
  }};
}

pub(crate) use each_capacity;
pub(crate) use each_width;
