//! Display names for enum variants, registered at compile time.
//!
//! Each enum lists its variants and their human-readable names once, via
//! [`display_names!`](crate::display_names), and gets lookups in both
//! directions without any runtime reflection:
//!
//! ```
//! use ampl::display::DisplayName;
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//! enum Tier { Free, Pro }
//!
//! ampl::display_names!(Tier {
//!     Free => "Free tier",
//!     Pro => "Professional",
//! });
//!
//! assert_eq!(Tier::Pro.display_name(), "Professional");
//! assert_eq!(Tier::from_display_name("Free tier"), Some(Tier::Free));
//! ```

/// Metadata lookup for a closed set of values.
pub trait DisplayName: Copy + 'static {
    /// Every value, in declaration order.
    const VARIANTS: &'static [Self];

    fn display_name(&self) -> &'static str;

    /// Exact-match reverse lookup.
    fn from_display_name(name: &str) -> Option<Self> {
        Self::VARIANTS
            .iter()
            .copied()
            .find(|v| v.display_name() == name)
    }
}

/// Implement [`DisplayName`] for an enum from a `Variant => "name"` list.
#[macro_export]
macro_rules! display_names {
    ($ty:ident { $($variant:ident => $name:expr),+ $(,)? }) => {
        impl $crate::display::DisplayName for $ty {
            const VARIANTS: &'static [Self] = &[$($ty::$variant),+];

            fn display_name(&self) -> &'static str {
                match self {
                    $($ty::$variant => $name),+
                }
            }
        }
    };
}
