//! TigerStyle Constants
//!
//! Limits are named `<THING>_<UNIT>_MAX` so the bound and its unit read
//! together at every call site.

/// Maximum post title length in bytes
pub const POST_TITLE_BYTES_MAX: usize = 512;

/// Maximum post body length in bytes
pub const POST_CONTENT_BYTES_MAX: usize = 64 * 1024;

/// Maximum comment body length in bytes
pub const COMMENT_CONTENT_BYTES_MAX: usize = 2_000;

/// Buffered messages per subscription before `publish` blocks
pub const SUBSCRIPTION_BUFFER_COUNT: usize = 1;

/// Default pool size for the durable backend
pub const DB_CONNECTIONS_COUNT_DEFAULT: u32 = 10;

/// Microseconds per second
pub const TIME_MICROS_PER_SEC: i64 = 1_000_000;
