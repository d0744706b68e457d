//! Shared fixtures: an in-memory user store, settings and log capture

#![allow(dead_code)]

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use sesame::{
    Config, FieldInfo, ManualClock, PackError, Packer, PackerRegistry, PrimaryKey, Sesame, Settings,
    User, UserSchema, UserStore,
};
use std::collections::HashMap;
use std::io;
use std::sync::{Arc, Mutex};

pub const SECRET: &str = "insecure-test-secret";
pub const PASSWORD: &str = "pbkdf2_sha256$600000$c2FsdA$aGFzaA";

/// 2024-01-01T00:00:00Z
pub const NOW: i64 = 1_704_067_200;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestUser {
    pub pk: PrimaryKey,
    pub username: String,
    pub password: Option<String>,
    pub email: Option<String>,
    pub last_login: Option<DateTime<Utc>>,
    pub active: bool,
}

impl TestUser {
    pub fn new(pk: impl Into<PrimaryKey>, username: &str) -> Self {
        Self {
            pk: pk.into(),
            username: username.to_string(),
            password: Some(PASSWORD.to_string()),
            email: Some(format!("{username}@example.com")),
            last_login: DateTime::from_timestamp(NOW - 86_400, 0),
            active: true,
        }
    }
}

impl User for TestUser {
    fn identifier(&self, field: &str) -> Option<PrimaryKey> {
        match field {
            "pk" | "id" => Some(self.pk.clone()),
            "username" => Some(PrimaryKey::Str(self.username.clone())),
            _ => None,
        }
    }

    fn password(&self) -> Option<&str> {
        self.password.as_deref()
    }

    fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    fn last_login(&self) -> Option<DateTime<Utc>> {
        self.last_login
    }

    fn is_active(&self) -> bool {
        self.active
    }
}

/// Users indexed by primary key; lookups skip inactive users
#[derive(Debug, Default)]
pub struct MemoryStore {
    users: Mutex<HashMap<PrimaryKey, TestUser>>,
}

impl MemoryStore {
    pub fn with_users(users: impl IntoIterator<Item = TestUser>) -> Self {
        let store = Self::default();
        for user in users {
            store.save(user);
        }
        store
    }

    pub fn save(&self, user: TestUser) {
        self.users
            .lock()
            .expect("store lock")
            .insert(user.pk.clone(), user);
    }

    pub fn delete(&self, pk: &PrimaryKey) {
        self.users.lock().expect("store lock").remove(pk);
    }

    pub fn get(&self, pk: &PrimaryKey) -> Option<TestUser> {
        self.users.lock().expect("store lock").get(pk).cloned()
    }

    /// Lookup function for `parse_token` and `verify_token`
    pub fn lookup(&self) -> impl FnOnce(&PrimaryKey) -> Option<TestUser> + '_ {
        move |key| self.get_user(key)
    }
}

impl UserStore for MemoryStore {
    type User = TestUser;

    fn get_user(&self, key: &PrimaryKey) -> Option<TestUser> {
        let users = self.users.lock().expect("store lock");
        let user = match key {
            PrimaryKey::Str(name) => users.values().find(|u| &u.username == name),
            pk => users.get(pk),
        };
        user.filter(|u| u.active).cloned()
    }

    fn update_last_login(&self, user: &mut TestUser, at: DateTime<Utc>) {
        user.last_login = Some(at);
        self.save(user.clone());
    }
}

pub fn john() -> TestUser {
    TestUser::new(1i32, "john")
}

pub fn jane() -> TestUser {
    TestUser::new(2i32, "jane")
}

pub fn settings() -> Settings {
    Settings::new(SECRET)
}

pub fn schema() -> UserSchema {
    schema_with_pk("AutoField")
}

pub fn schema_with_pk(type_name: &str) -> UserSchema {
    UserSchema::new("User", "id", type_name)
        .with_field(FieldInfo::new("username", "CharField", true))
        .with_field(FieldInfo::new("first_name", "CharField", false))
        .with_field(FieldInfo::new("email", "EmailField", false))
        .with_email_field("email")
}

pub fn registry() -> PackerRegistry {
    PackerRegistry::new().register_custom("repeat", Arc::new(RepeatPacker))
}

pub fn clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::at_timestamp(NOW))
}

/// Service with the given settings and a stopped clock
pub fn service(settings: Settings) -> (Sesame, Arc<ManualClock>) {
    service_with_schema(settings, &schema())
}

pub fn service_with_schema(settings: Settings, schema: &UserSchema) -> (Sesame, Arc<ManualClock>) {
    let config = Config::load(settings, schema, &registry()).expect("valid settings");
    let clock = clock();
    (Sesame::with_clock(config, clock.clone()), clock)
}

/// Reload settings with the fixture schema and registry
pub fn reload(sesame: &Sesame, settings: Settings) {
    sesame
        .reload(settings, &schema(), &registry())
        .expect("valid settings");
}

pub fn decode_token(token: &str) -> Vec<u8> {
    URL_SAFE_NO_PAD.decode(token).expect("base64 token")
}

pub fn encode_token(data: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(data)
}

/// Change the base64 character at `index` so that its high data bits change
pub fn alter_char(token: &str, index: usize) -> String {
    const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-_";
    let mut bytes = token.as_bytes().to_vec();
    let position = ALPHABET
        .iter()
        .position(|&c| c == bytes[index])
        .expect("base64 character");
    bytes[index] = ALPHABET[(position + 16) % 64];
    String::from_utf8(bytes).expect("ASCII token")
}

/// Packs a 2-byte primary key twice
#[derive(Debug)]
pub struct RepeatPacker;

impl Packer for RepeatPacker {
    fn pack_pk(&self, pk: &PrimaryKey) -> Result<Vec<u8>, PackError> {
        let value = pk
            .as_i128()
            .and_then(|v| u16::try_from(v).ok())
            .ok_or_else(|| PackError::ValueOutOfRange(pk.to_string()))?;
        Ok([value.to_be_bytes(), value.to_be_bytes()].concat())
    }

    fn unpack_pk<'a>(&self, data: &'a [u8]) -> Result<(PrimaryKey, &'a [u8]), PackError> {
        if data.len() < 4 {
            return Err(PackError::Truncated {
                expected: 4,
                actual: data.len(),
            });
        }
        let (head, rest) = data.split_at(4);
        if head[..2] != head[2..] {
            return Err(PackError::Invalid("halves differ".to_string()));
        }
        let value = u16::from_be_bytes([head[0], head[1]]);
        Ok((PrimaryKey::Int(i32::from(value)), rest))
    }
}

/// Log output captured from a closure
#[derive(Debug, Clone, Default)]
pub struct LogCapture(Arc<Mutex<Vec<u8>>>);

impl LogCapture {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().expect("log lock")).into_owned()
    }

    #[track_caller]
    pub fn assert_contains(&self, needle: &str) {
        let contents = self.contents();
        assert!(
            contents.contains(needle),
            "expected logs to contain {needle:?}, got:\n{contents}"
        );
    }
}

impl io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().expect("log lock").extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Run `f` with every event written to a fresh capture
pub fn capture_logs<T>(f: impl FnOnce() -> T) -> (T, LogCapture) {
    let capture = LogCapture::default();
    let writer = capture.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_ansi(false)
        .with_writer(move || writer.clone())
        .finish();
    let result = tracing::subscriber::with_default(subscriber, f);
    (result, capture)
}
