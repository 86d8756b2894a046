pub mod handler;
pub mod registry;

pub use registry::{ConnectionEntry, ConnectionRegistry, ConnectionSender};

/// Shared room joining every seller and superadmin for support chat.
pub const SELLER_ADMIN_ROOM: &str = "seller_admin";
