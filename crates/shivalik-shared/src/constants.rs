/// Application name
pub const APP_NAME: &str = "MyShivalik";

/// Avatar used when an identity has no uploaded picture
pub const DEFAULT_PROFILE_PIC: &str = "https://i.postimg.cc/QN6VbVnJ/default-avatar.png";

/// Default HTTP API port
pub const DEFAULT_HTTP_PORT: u16 = 5000;

/// Default SQLite busy timeout in milliseconds
pub const DEFAULT_STORE_TIMEOUT_MS: u64 = 5_000;

/// Maximum request body / upload size in bytes (10 MiB)
pub const MAX_UPLOAD_SIZE: usize = 10 * 1024 * 1024;
