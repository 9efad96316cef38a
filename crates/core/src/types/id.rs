//! Newtype labels for type-safe entity references.
//!
//! The backend identifies products by opaque string ids and sizes by free-form
//! labels ("M", "XL", "32"). Use the `define_label!` macro to create wrappers
//! that prevent mixing them up and that can never hold an empty value.

/// Error returned when a label is empty after trimming.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind} cannot be empty")]
pub struct EmptyLabelError {
    /// Which label type rejected the input.
    pub kind: &'static str,
}

/// Macro to define a type-safe, non-empty string label.
///
/// Creates a newtype wrapper around `String` with:
/// - `Serialize` with `#[serde(transparent)]` and validating `Deserialize`
/// - `Debug`, `Clone`, `PartialEq`, `Eq`, `Hash`, `PartialOrd`, `Ord`
/// - `parse()` which trims and rejects empty input, `as_str()`
/// - `Display`, `FromStr`, `AsRef<str>` and `Borrow<str>`
///
/// # Example
///
/// ```rust
/// # use bazaar_core::define_label;
/// define_label!(ColorLabel, "color");
///
/// let color = ColorLabel::parse(" red ").unwrap();
/// assert_eq!(color.as_str(), "red");
/// assert!(ColorLabel::parse("   ").is_err());
/// ```
#[macro_export]
macro_rules! define_label {
    ($name:ident, $kind:literal) => {
        #[derive(
            Debug,
            Clone,
            PartialEq,
            Eq,
            Hash,
            PartialOrd,
            Ord,
            ::serde::Serialize
        )]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Parse a label, trimming surrounding whitespace.
            ///
            /// # Errors
            ///
            /// Returns an error if the trimmed input is empty.
            pub fn parse(s: &str) -> ::core::result::Result<Self, $crate::types::id::EmptyLabelError> {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    return Err($crate::types::id::EmptyLabelError { kind: $kind });
                }
                Ok(Self(trimmed.to_owned()))
            }

            /// Returns the label as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consumes the label and returns its inner string.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl ::core::fmt::Display for $name {
            fn fmt(&self, f: &mut ::core::fmt::Formatter<'_>) -> ::core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl ::core::str::FromStr for $name {
            type Err = $crate::types::id::EmptyLabelError;

            fn from_str(s: &str) -> ::core::result::Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl ::core::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl<'de> ::serde::Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> ::core::result::Result<Self, D::Error>
            where
                D: ::serde::Deserializer<'de>,
            {
                let raw = <String as ::serde::Deserialize>::deserialize(deserializer)?;
                Self::parse(&raw).map_err(::serde::de::Error::custom)
            }
        }
    };
}

define_label!(ProductId, "product id");
define_label!(SizeLabel, "size");
define_label!(OrderId, "order id");
define_label!(UserId, "user id");
