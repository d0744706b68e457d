//! Entry point for creating and verifying tokens.
//!
//! [`Sesame`] owns the current [`Config`] behind an [`ArcSwap`]. Each
//! operation works on one snapshot, so a concurrent [`Sesame::reload`] is
//! seen entirely or not at all.

use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::error::{ConfigError, Result};
use crate::logging::redact;
use crate::packers::{PackerRegistry, PrimaryKey};
use crate::settings::Settings;
use crate::tokens;
use crate::user::{User, UserSchema, UserStore};
use arc_swap::ArcSwap;
use chrono::Duration;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Options for [`Sesame::authenticate`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthOptions {
    /// Scope the token must have been created for
    pub scope: String,
    /// Override of the configured maximum age
    pub max_age: Option<Duration>,
    /// Record the login; defaults to whether one-time tokens are enabled
    pub update_last_login: Option<bool>,
}

impl AuthOptions {
    /// Default options: default scope, configured max age
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Require a scope
    #[must_use]
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }

    /// Override the maximum age
    #[must_use]
    pub fn with_max_age(mut self, max_age: Duration) -> Self {
        self.max_age = Some(max_age);
        self
    }

    /// Force or suppress the last login update
    #[must_use]
    pub fn with_update_last_login(mut self, update: bool) -> Self {
        self.update_last_login = Some(update);
        self
    }
}

/// Token service with a swappable configuration
pub struct Sesame {
    config: ArcSwap<Config>,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for Sesame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sesame")
            .field("config", &self.config.load_full())
            .finish_non_exhaustive()
    }
}

impl Sesame {
    /// Service using the wall clock
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Service using the given clock
    #[must_use]
    pub fn with_clock(config: Config, clock: Arc<dyn Clock>) -> Self {
        Self {
            config: ArcSwap::from_pointee(config),
            clock,
        }
    }

    /// Load settings and create a service using the wall clock
    ///
    /// # Errors
    ///
    /// See [`Config::load`].
    pub fn load(
        settings: Settings,
        schema: &UserSchema,
        registry: &PackerRegistry,
    ) -> std::result::Result<Self, ConfigError> {
        Config::load(settings, schema, registry).map(Self::new)
    }

    /// Current configuration
    #[must_use]
    pub fn config(&self) -> Arc<Config> {
        self.config.load_full()
    }

    /// Load new settings and publish them atomically
    ///
    /// On error, the current configuration stays in place.
    ///
    /// # Errors
    ///
    /// See [`Config::load`].
    pub fn reload(
        &self,
        settings: Settings,
        schema: &UserSchema,
        registry: &PackerRegistry,
    ) -> std::result::Result<(), ConfigError> {
        let config = Config::load(settings, schema, registry)?;
        self.config.store(Arc::new(config));
        tracing::info!("Reloaded token configuration");
        Ok(())
    }

    /// Create a token for `user`, valid in `scope` (`""` is the default scope)
    ///
    /// # Errors
    ///
    /// Fails when the user's identifier can't be packed or the format doesn't
    /// support scopes.
    pub fn create_token<U: User + ?Sized>(&self, user: &U, scope: &str) -> Result<String> {
        let config = self.config.load_full();
        tokens::create_token(&config, user, scope, None, self.clock.now())
    }

    /// Create a token for `user` carrying `primary_key` instead of the value
    /// of the identifier field
    ///
    /// # Errors
    ///
    /// Same as [`Sesame::create_token`].
    pub fn create_token_for<U: User + ?Sized>(
        &self,
        user: &U,
        scope: &str,
        primary_key: &PrimaryKey,
    ) -> Result<String> {
        let config = self.config.load_full();
        tokens::create_token(&config, user, scope, Some(primary_key), self.clock.now())
    }

    /// Verify a token and return its user, or why it was rejected
    ///
    /// `get_user` resolves an identifier to an active user.
    ///
    /// # Errors
    ///
    /// Returns the kind of the first check that failed.
    pub fn verify_token<U, F>(
        &self,
        token: &str,
        get_user: F,
        scope: &str,
        max_age: Option<Duration>,
    ) -> Result<U>
    where
        U: User,
        F: FnOnce(&PrimaryKey) -> Option<U>,
    {
        let config = self.config.load_full();
        tokens::verify_token(&config, token, get_user, scope, max_age, self.clock.now())
    }

    /// Verify a token and return its user
    ///
    /// Rejections are logged and turned into `None`. So are usage errors,
    /// such as a scope with v1 tokens, which are logged at error level. Call
    /// [`Sesame::verify_token`] and check
    /// [`is_usage_error`](crate::TokenError::is_usage_error) to tell them
    /// apart from bad tokens.
    pub fn parse_token<U, F>(
        &self,
        token: &str,
        get_user: F,
        scope: &str,
        max_age: Option<Duration>,
    ) -> Option<U>
    where
        U: User,
        F: FnOnce(&PrimaryKey) -> Option<U>,
    {
        self.verify_token(token, get_user, scope, max_age).ok()
    }

    /// Query string parameters authenticating `user`
    ///
    /// # Errors
    ///
    /// Same as [`Sesame::create_token`].
    pub fn get_parameters<U: User + ?Sized>(
        &self,
        user: &U,
        scope: &str,
    ) -> Result<BTreeMap<String, String>> {
        let config = self.config.load_full();
        let token = tokens::create_token(&config, user, scope, None, self.clock.now())?;
        Ok(BTreeMap::from([(config.token_name().to_string(), token)]))
    }

    /// Complete query string authenticating `user`, starting with `?`
    ///
    /// # Errors
    ///
    /// Same as [`Sesame::create_token`].
    pub fn get_query_string<U: User + ?Sized>(&self, user: &U, scope: &str) -> Result<String> {
        let query = self
            .get_parameters(user, scope)?
            .iter()
            .map(|(name, value)| {
                format!(
                    "{}={}",
                    urlencoding::encode(name),
                    urlencoding::encode(value)
                )
            })
            .collect::<Vec<_>>()
            .join("&");
        Ok(format!("?{query}"))
    }

    /// Extract the token from a raw query string, with or without the
    /// leading `?`; `None` when no token is present
    #[must_use]
    pub fn token_from_query(&self, query: &str) -> Option<String> {
        let config = self.config.load();
        query
            .strip_prefix('?')
            .unwrap_or(query)
            .split('&')
            .map(|pair| pair.split_once('=').unwrap_or((pair, "")))
            .find(|(name, _)| {
                urlencoding::decode(name).is_ok_and(|name| name == config.token_name())
            })
            .and_then(|(_, value)| urlencoding::decode(value).ok())
            .map(|value| value.into_owned())
    }

    /// Authenticate a user with a token against a user store
    ///
    /// Records the login when one-time tokens are enabled, unless
    /// `options.update_last_login` says otherwise.
    pub fn authenticate<S: UserStore>(
        &self,
        store: &S,
        token: &str,
        options: &AuthOptions,
    ) -> Option<S::User> {
        let config = self.config.load_full();
        let now = self.clock.now();
        let mut user = tokens::verify_token(
            &config,
            token,
            |primary_key| store.get_user(primary_key),
            &options.scope,
            options.max_age,
            now,
        )
        .ok()?;

        if options.update_last_login.unwrap_or(config.one_time()) {
            store.update_last_login(&mut user, now);
            tracing::debug!(token = %redact(token), "Updated last login");
        }
        Some(user)
    }
}
