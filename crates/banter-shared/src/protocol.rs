//! Wire protocol messages exchanged between clients and the relay.
//!
//! Every message kind is a distinct [`Envelope`] variant so that the
//! server's dispatch is an exhaustive match; adding a kind is a compile
//! error until every router handles it.

use serde::{Deserialize, Serialize};

/// All wire protocol messages.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Envelope {
    /// Account creation request.
    Register(Credentials),

    /// Registration accepted.
    RegisterSuccess { info: String },

    /// Registration refused (username already taken).
    RegisterFail { reason: String },

    /// Authentication request.
    Login(Credentials),

    /// Authentication accepted; carries the canonical username and the
    /// account's avatar color.
    LoginSuccess { username: String, avatar_color: String },

    /// Authentication refused (bad credentials or banned account).
    LoginFail { reason: String },

    /// Public message relayed to every online session.
    ChatAll { sender: String, content: String },

    /// Direct message; only delivered when the sender is an accepted
    /// friend of the recipient. Also reused for the server's
    /// "not friends" failure notice.
    ChatPrivate {
        sender: String,
        recipient: String,
        content: String,
    },

    /// File transfer; broadcast when the recipient is absent or the
    /// public-room sentinel, otherwise routed like a private message.
    File(Attachment),

    /// Inline image; same routing rules as [`Envelope::File`].
    Image(Attachment),

    /// Friend request from `from` to `to`. Inbound, `from` is ignored in
    /// favor of the connection's bound username; outbound it names the
    /// requester for the target to render.
    FriendRequest { from: String, to: String },

    /// Answer to a friend request. `to` names the original requester.
    FriendResponse {
        from: String,
        to: String,
        accepted: bool,
    },

    /// Remove an accepted friendship with `friend`.
    DeleteFriend { friend: String },

    /// The receiving user's current friend list.
    FriendList { friends: Vec<String> },

    /// Refreshed list of currently online usernames.
    OnlineUsers { users: Vec<String> },

    /// Replace the sender's stored avatar image.
    AvatarUpdate { image: Vec<u8> },

    /// Administrator: request the full account status list.
    AdminGetUsers,

    /// Administrator: ban an account and kick its live session.
    AdminBanUser { target: String },

    /// Administrator: lift an account's ban.
    AdminUnbanUser { target: String },

    /// Administrator: delete an account and its friendships.
    AdminDeleteUser { target: String },

    /// Account status list sent back to the administrator.
    AdminUserList { users: Vec<UserStatus> },

    /// Forced disconnect notice, sent before the server closes the
    /// connection.
    ForceLogout { reason: String },

    /// Voluntary disconnect.
    Logout,
}

/// Username/password pair carried by [`Envelope::Register`] and
/// [`Envelope::Login`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

/// Binary payload for file and image transfers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Attachment {
    pub sender: String,
    /// `None` or the public-room sentinel means broadcast.
    pub recipient: Option<String>,
    pub file_name: String,
    pub data: Vec<u8>,
}

/// One row of the administrator's account overview.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserStatus {
    pub username: String,
    pub online: bool,
    pub banned: bool,
}

impl Envelope {
    /// Serialize to binary (bincode).
    pub fn to_bytes(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    /// Deserialize from binary.
    pub fn from_bytes(data: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(data)
    }
}
