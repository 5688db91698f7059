/// Recipient token denoting "broadcast to everyone".
///
/// Registration refuses this name so it can never collide with a real
/// account.
pub const PUBLIC_ROOM: &str = "All";

/// Sender name carried by server-originated notices.
pub const SYSTEM_SENDER: &str = "System";

/// Names that can never be registered as accounts.
pub const RESERVED_NAMES: &[&str] = &[PUBLIC_ROOM, SYSTEM_SENDER];

/// Fallback avatar color for accounts that have none on record.
pub const DEFAULT_AVATAR_COLOR: &str = "#CCCCCC";

/// Maximum wire frame size in bytes (10 MiB).
pub const MAX_FRAME_SIZE: usize = 10 * 1024 * 1024;

/// Default TCP listen port of the relay.
pub const DEFAULT_PORT: u16 = 8888;

/// Key derivation context for password hashing (BLAKE3).
pub const KDF_CONTEXT_PASSWORD: &str = "banter-password-v1";
