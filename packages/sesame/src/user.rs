//! Interfaces to the external user store.

use crate::packers::PrimaryKey;
use chrono::{DateTime, Utc};

/// A user record, as seen by the token codecs
pub trait User {
    /// Value of an identifier field; `pk` designates the primary key
    fn identifier(&self, field: &str) -> Option<PrimaryKey>;

    /// Password hash, if the user has one
    fn password(&self) -> Option<&str>;

    /// Email address, if the user type has an email field
    fn email(&self) -> Option<&str> {
        None
    }

    /// Last login time; `None` if the user never logged in
    fn last_login(&self) -> Option<DateTime<Utc>>;

    /// Inactive users can't log in
    fn is_active(&self) -> bool {
        true
    }
}

/// Storage owning user records
pub trait UserStore {
    /// User record type
    type User: User;

    /// Active user with this identifier, if any
    fn get_user(&self, key: &PrimaryKey) -> Option<Self::User>;

    /// Record a login
    fn update_last_login(&self, user: &mut Self::User, at: DateTime<Utc>);
}

/// Declared metadata of a field of the user type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldInfo {
    /// Field name
    pub name: String,
    /// Storage type name, such as `AutoField` or `UUIDField`
    pub type_name: String,
    /// Whether values are unique across users
    pub unique: bool,
}

impl FieldInfo {
    /// Describe a field
    pub fn new(name: impl Into<String>, type_name: impl Into<String>, unique: bool) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            unique,
        }
    }
}

/// Declared metadata of the user type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserSchema {
    /// Name of the user type, used in error messages
    pub label: String,
    /// Primary key field
    pub primary_key: FieldInfo,
    /// Other fields
    pub fields: Vec<FieldInfo>,
    /// Name of the email field, if the type has one
    pub email_field: Option<String>,
}

impl UserSchema {
    /// User type with the given primary key field
    pub fn new(
        label: impl Into<String>,
        primary_key_name: impl Into<String>,
        primary_key_type: impl Into<String>,
    ) -> Self {
        Self {
            label: label.into(),
            primary_key: FieldInfo::new(primary_key_name, primary_key_type, true),
            fields: Vec::new(),
            email_field: None,
        }
    }

    /// Declare another field
    #[must_use]
    pub fn with_field(mut self, field: FieldInfo) -> Self {
        self.fields.push(field);
        self
    }

    /// Declare the email field
    #[must_use]
    pub fn with_email_field(mut self, name: impl Into<String>) -> Self {
        self.email_field = Some(name.into());
        self
    }

    /// Look up a field; `pk` designates the primary key
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldInfo> {
        if name == "pk" || name == self.primary_key.name {
            return Some(&self.primary_key);
        }
        self.fields.iter().find(|f| f.name == name)
    }

    /// Whether the declared email field exists
    #[must_use]
    pub fn has_email_field(&self) -> bool {
        self.email_field
            .as_deref()
            .is_some_and(|name| self.field(name).is_some())
    }
}
