//! Shared identifiers and strongly-typed common values for workspace crates.
//!
//! ```rust
//! use gcommon::{AccountKind, SessionId, Timestamp, UserId};
//!
//! let user = UserId::from("kid-7");
//! let session = SessionId::new("session-1");
//!
//! assert_eq!(user.as_str(), "kid-7");
//! assert_eq!(session.to_string(), "session-1");
//! assert!(AccountKind::Restricted.is_restricted());
//! assert!(Timestamp::now() > Timestamp::from_millis(0));
//! ```

pub mod future {
    //! Shared async future aliases.
    //!
    //! ```rust
    //! use gcommon::BoxFuture;
    //!
    //! fn str_len<'a>(value: &'a str) -> BoxFuture<'a, usize> {
    //!     Box::pin(async move { value.len() })
    //! }
    //!
    //! let _future = str_len("hello");
    //! ```

    use std::future::Future;
    use std::pin::Pin;

    pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
}

pub mod ids {
    //! Cross-crate identifier newtypes.
    //!
    //! ```rust
    //! use gcommon::{MessageId, SessionId, UserId};
    //!
    //! let user = UserId::new("kid-42");
    //! let session = SessionId::from("session-42");
    //! let message = MessageId::from("m-1");
    //!
    //! assert_eq!(user.to_string(), "kid-42");
    //! assert_eq!(session.as_str(), "session-42");
    //! assert_eq!(message.as_str(), "m-1");
    //! ```

    use std::fmt::{Display, Formatter};

    macro_rules! string_id {
        ($name:ident) => {
            #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
            pub struct $name(String);

            impl $name {
                pub fn new(value: impl Into<String>) -> Self {
                    Self(value.into())
                }

                pub fn as_str(&self) -> &str {
                    self.0.as_str()
                }
            }

            impl Display for $name {
                fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
                    f.write_str(&self.0)
                }
            }

            impl From<String> for $name {
                fn from(value: String) -> Self {
                    Self(value)
                }
            }

            impl From<&str> for $name {
                fn from(value: &str) -> Self {
                    Self(value.to_string())
                }
            }
        };
    }

    string_id!(UserId);
    string_id!(SessionId);
    string_id!(MessageId);
}

pub mod account {
    //! Account classification shared by policy, provider, and chat layers.

    /// Whether a caller's outgoing messages are subject to content policy.
    ///
    /// Restricted accounts are supervised profiles; guardian accounts own
    /// the rulesets that govern them.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub enum AccountKind {
        Restricted,
        Guardian,
    }

    impl AccountKind {
        pub fn is_restricted(&self) -> bool {
            matches!(self, Self::Restricted)
        }
    }
}

pub mod role {
    //! Speaker roles shared by the provider and persistence layers.
    //!
    //! ```rust
    //! use gcommon::Role;
    //!
    //! assert_eq!(Role::Assistant.as_str(), "assistant");
    //! ```

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum Role {
        System,
        User,
        Assistant,
    }

    impl Role {
        pub fn as_str(&self) -> &'static str {
            match self {
                Self::System => "system",
                Self::User => "user",
                Self::Assistant => "assistant",
            }
        }
    }
}

pub mod time {
    //! Millisecond-precision wall-clock timestamps.
    //!
    //! ```rust
    //! use gcommon::Timestamp;
    //!
    //! let earlier = Timestamp::from_millis(1_000);
    //! let later = Timestamp::from_millis(2_000);
    //! assert!(earlier < later);
    //! assert_eq!(later.as_millis(), 2_000);
    //! ```

    use std::time::{SystemTime, UNIX_EPOCH};

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
    pub struct Timestamp(u64);

    impl Timestamp {
        pub fn now() -> Self {
            let millis = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|elapsed| elapsed.as_millis() as u64)
                .unwrap_or(0);
            Self(millis)
        }

        pub fn from_millis(millis: u64) -> Self {
            Self(millis)
        }

        pub fn as_millis(&self) -> u64 {
            self.0
        }
    }
}

pub mod options {
    //! Shared generation settings used by provider request types.
    //!
    //! ```rust
    //! use gcommon::GenerationOptions;
    //!
    //! let options = GenerationOptions::default()
    //!     .with_temperature(0.7)
    //!     .with_max_tokens(500);
    //!
    //! assert_eq!(options.temperature, Some(0.7));
    //! assert_eq!(options.max_tokens, Some(500));
    //! ```

    #[derive(Debug, Clone, Copy, PartialEq, Default)]
    pub struct GenerationOptions {
        pub temperature: Option<f32>,
        pub max_tokens: Option<u32>,
    }

    impl GenerationOptions {
        pub fn with_temperature(mut self, temperature: f32) -> Self {
            self.temperature = Some(temperature);
            self
        }

        pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
            self.max_tokens = Some(max_tokens);
            self
        }
    }
}

pub use account::AccountKind;
pub use future::BoxFuture;
pub use ids::{MessageId, SessionId, UserId};
pub use options::GenerationOptions;
pub use role::Role;
pub use time::Timestamp;
