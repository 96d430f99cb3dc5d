//! Macro for implementing Display and FromStr for fieldless domain enums
//!
//! Lanes, job statuses and text types are all persisted or logged as short
//! lowercase strings. This macro keeps the string table in one place.
//!
//! # Example
//!
//! ```rust
//! use tracelane_domain::impl_domain_status_conversions;
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//! pub enum FlushTrigger {
//!     Size,
//!     Timer,
//!     Shutdown,
//! }
//!
//! impl_domain_status_conversions!(FlushTrigger {
//!     Size => "size",
//!     Timer => "timer",
//!     Shutdown => "shutdown",
//! });
//!
//! assert_eq!(FlushTrigger::Timer.to_string(), "timer");
//! assert_eq!("SIZE".parse::<FlushTrigger>(), Ok(FlushTrigger::Size));
//! ```

/// Implements Display and FromStr traits for fieldless enums
///
/// - Display writes the mapped string
/// - FromStr parses case-insensitively and reports the enum name on failure
#[macro_export]
macro_rules! impl_domain_status_conversions {
    ($enum_name:ident { $($variant:ident => $str:expr),+ $(,)? }) => {
        impl ::std::fmt::Display for $enum_name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                match self {
                    $(Self::$variant => write!(f, $str),)+
                }
            }
        }

        impl ::std::str::FromStr for $enum_name {
            type Err = String;

            fn from_str(s: &str) -> ::std::result::Result<Self, Self::Err> {
                match s.to_lowercase().as_str() {
                    $($str => ::std::result::Result::Ok(Self::$variant),)+
                    _ => ::std::result::Result::Err(::std::format!("Invalid {}: {}", stringify!($enum_name), s)),
                }
            }
        }
    };
}


#[cfg(test)]
mod alias_scope_tests {
    // Mirrors modules that import the crate's one-parameter `Result` alias.
    #[allow(unused_imports)]
    use crate::errors::Result;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Flush {
        Size,
        Timer,
    }

    impl_domain_status_conversions!(Flush {
        Size => "size",
        Timer => "timer",
    });

    #[test]
    fn expands_where_result_is_the_domain_alias() {
        assert_eq!("timer".parse::<Flush>(), Ok(Flush::Timer));
        assert_eq!(Flush::Size.to_string(), "size");
        assert!("never".parse::<Flush>().is_err());
    }
}
