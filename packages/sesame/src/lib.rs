//! Stateless login tokens that fit in a URL.
//!
//! This crate provides:
//! - Compact v2 tokens signed with keyed BLAKE2b, and legacy v1 tokens
//! - Primary key packers for integer, UUID, binary and text identifiers
//! - Revocation on password change, email change or login
//! - Scopes, expiry and secret rotation
//!
//! ```no_run
//! use sesame::{PackerRegistry, Sesame, Settings, UserSchema};
//!
//! let settings = Settings::new("application secret").with_max_age_secs(300);
//! let schema = UserSchema::new("User", "id", "AutoField");
//! let sesame = Sesame::load(settings, &schema, &PackerRegistry::new())?;
//! # Ok::<(), sesame::ConfigError>(())
//! ```

#![forbid(unsafe_code)]

pub mod clock;
pub mod config;
mod error;
pub mod keys;
pub mod logging;
pub mod packers;
pub mod revocation;
mod sesame;
pub mod settings;
pub mod tokens;
pub mod user;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use error::*;
pub use packers::{Packer, PackerRegistry, PrimaryKey};
pub use sesame::{AuthOptions, Sesame};
pub use settings::{Digest, Settings};
pub use tokens::TokenVersion;
pub use user::{FieldInfo, User, UserSchema, UserStore};
