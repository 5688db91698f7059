//! Per-connection protocol state machine.
//!
//! A connection is unauthenticated until a successful login binds a
//! username to it; until then everything except register/login is
//! silently dropped. After authentication the router relays chat,
//! delegates friend-graph traffic to [`crate::social`], and gates the
//! moderation commands on the configured administrator identity.
//!
//! Store failures never escape to the peer: handlers propagate them with
//! `?` and `dispatch` converts them into a generic failure reply or a
//! logged drop at the connection boundary.

use tokio::sync::mpsc;
use tracing::{debug, error, info};

use banter_shared::auth::hash_password;
use banter_shared::{Credentials, Envelope};

use crate::error::Result;
use crate::registry::{Outbound, SessionHandle};
use crate::state::RelayState;
use crate::{moderation, social};

/// What the connection loop should do after a message was handled.
#[derive(Debug, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Disconnect,
}

/// Mutable per-connection state.
pub struct ConnState {
    /// Bound username; `None` until a successful login.
    pub username: Option<String>,
    /// This connection's outbound queue.
    pub tx: mpsc::UnboundedSender<Outbound>,
}

impl ConnState {
    pub fn new(tx: mpsc::UnboundedSender<Outbound>) -> Self {
        Self { username: None, tx }
    }

    /// Queue a direct reply on this connection.
    pub fn reply(&self, envelope: Envelope) {
        let _ = self.tx.send(Outbound::Deliver(envelope));
    }
}

/// Dispatch one inbound envelope against the connection's current
/// authentication state.
pub async fn dispatch(state: &RelayState, conn: &mut ConnState, envelope: Envelope) -> Flow {
    match envelope {
        Envelope::Register(creds) => {
            if let Err(e) = handle_register(state, conn, &creds).await {
                error!(error = %e, "registration failed");
                conn.reply(Envelope::RegisterFail {
                    reason: "Registration failed".into(),
                });
            }
            Flow::Continue
        }

        Envelope::Login(creds) => {
            if let Err(e) = handle_login(state, conn, &creds).await {
                error!(error = %e, "login failed");
                conn.reply(Envelope::LoginFail {
                    reason: "Login failed".into(),
                });
            }
            Flow::Continue
        }

        Envelope::Logout => {
            if let Some(username) = conn.username.take() {
                state.registry.remove_connection(&username, &conn.tx).await;
                info!(user = %username, "logged out");
            }
            Flow::Disconnect
        }

        envelope @ Envelope::ChatAll { .. } => {
            if conn.username.is_some() {
                state.registry.broadcast(envelope).await;
            }
            Flow::Continue
        }

        Envelope::ChatPrivate {
            sender,
            recipient,
            content,
        } => {
            if conn.username.is_some() {
                let forward = Envelope::ChatPrivate {
                    sender: sender.clone(),
                    recipient: recipient.clone(),
                    content,
                };
                if let Err(e) = social::route_private(state, &sender, &recipient, forward).await {
                    error!(error = %e, "private routing failed");
                }
            }
            Flow::Continue
        }

        Envelope::File(attachment) => {
            if conn.username.is_some() {
                if let Err(e) = social::route_attachment(state, attachment, Envelope::File).await {
                    error!(error = %e, "file routing failed");
                }
            }
            Flow::Continue
        }

        Envelope::Image(attachment) => {
            if conn.username.is_some() {
                if let Err(e) = social::route_attachment(state, attachment, Envelope::Image).await {
                    error!(error = %e, "image routing failed");
                }
            }
            Flow::Continue
        }

        Envelope::FriendRequest { to, .. } => {
            if let Some(actor) = conn.username.clone() {
                if let Err(e) = social::send_request(state, &actor, &to).await {
                    error!(error = %e, "friend request failed");
                }
            }
            Flow::Continue
        }

        Envelope::FriendResponse { to, accepted, .. } => {
            if let Some(actor) = conn.username.clone() {
                if let Err(e) = social::respond_request(state, conn, &actor, &to, accepted).await {
                    error!(error = %e, "friend response failed");
                }
            }
            Flow::Continue
        }

        Envelope::DeleteFriend { friend } => {
            if let Some(actor) = conn.username.clone() {
                if let Err(e) = social::remove_friendship(state, conn, &actor, &friend).await {
                    error!(error = %e, "friend removal failed");
                }
            }
            Flow::Continue
        }

        Envelope::AvatarUpdate { image } => {
            if let Some(actor) = conn.username.clone() {
                if image.is_empty() {
                    debug!(user = %actor, "empty avatar update dropped");
                } else if let Err(e) = state.store.lock().await.set_avatar(&actor, &image) {
                    error!(error = %e, "avatar update failed");
                }
            }
            Flow::Continue
        }

        Envelope::AdminGetUsers => {
            if state.is_admin(conn.username.as_deref()) {
                reply_user_list(conn, moderation::list_users_with_status(state).await);
            }
            Flow::Continue
        }

        Envelope::AdminBanUser { target } => {
            if state.is_admin(conn.username.as_deref()) {
                reply_user_list(conn, moderation::ban(state, &target).await);
            }
            Flow::Continue
        }

        Envelope::AdminUnbanUser { target } => {
            if state.is_admin(conn.username.as_deref()) {
                reply_user_list(conn, moderation::unban(state, &target).await);
            }
            Flow::Continue
        }

        Envelope::AdminDeleteUser { target } => {
            if state.is_admin(conn.username.as_deref()) {
                reply_user_list(conn, moderation::delete_user(state, &target).await);
            }
            Flow::Continue
        }

        // Server-to-client kinds have no meaning inbound.
        Envelope::RegisterSuccess { .. }
        | Envelope::RegisterFail { .. }
        | Envelope::LoginSuccess { .. }
        | Envelope::LoginFail { .. }
        | Envelope::FriendList { .. }
        | Envelope::OnlineUsers { .. }
        | Envelope::AdminUserList { .. }
        | Envelope::ForceLogout { .. } => {
            debug!("ignoring server-only message kind from client");
            Flow::Continue
        }
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn handle_register(state: &RelayState, conn: &ConnState, creds: &Credentials) -> Result<()> {
    let digest = hash_password(&creds.password);
    let created = state
        .store
        .lock()
        .await
        .create_user(&creds.username, &digest)?;

    if created {
        info!(user = %creds.username, "account registered");
        conn.reply(Envelope::RegisterSuccess {
            info: "Registration successful".into(),
        });
    } else {
        conn.reply(Envelope::RegisterFail {
            reason: "Username already exists".into(),
        });
    }
    Ok(())
}

async fn handle_login(state: &RelayState, conn: &mut ConnState, creds: &Credentials) -> Result<()> {
    let digest = hash_password(&creds.password);

    {
        let store = state.store.lock().await;

        // The ban notice takes precedence over a credential failure.
        if store.is_banned(&creds.username)? {
            conn.reply(Envelope::LoginFail {
                reason: "Your account has been banned.".into(),
            });
            return Ok(());
        }

        if !store.verify_credentials(&creds.username, &digest)? {
            conn.reply(Envelope::LoginFail {
                reason: "Invalid username or password".into(),
            });
            return Ok(());
        }
    }

    // Bind the username and register the session; this pushes the
    // refreshed online list (including us) to everyone.
    conn.username = Some(creds.username.clone());
    state
        .registry
        .add(SessionHandle::new(creds.username.clone(), conn.tx.clone()))
        .await;

    let (avatar_color, friends) = {
        let store = state.store.lock().await;
        (
            store.get_avatar_color(&creds.username)?,
            store.list_accepted_friends(&creds.username)?,
        )
    };

    conn.reply(Envelope::LoginSuccess {
        username: creds.username.clone(),
        avatar_color,
    });
    conn.reply(Envelope::FriendList { friends });
    info!(user = %creds.username, "logged in");
    Ok(())
}

/// Send the refreshed status list to the administrator, or log why there
/// is none.
fn reply_user_list(conn: &ConnState, result: Result<Vec<banter_shared::UserStatus>>) {
    match result {
        Ok(users) => conn.reply(Envelope::AdminUserList { users }),
        Err(e) => error!(error = %e, "moderation command failed"),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio::sync::mpsc;

    use banter_shared::{Attachment, Credentials, Envelope};
    use banter_store::Database;

    use super::*;
    use crate::config::ServerConfig;

    struct TestClient {
        conn: ConnState,
        rx: mpsc::UnboundedReceiver<Outbound>,
    }

    impl TestClient {
        fn connect() -> Self {
            let (tx, rx) = mpsc::unbounded_channel();
            Self {
                conn: ConnState::new(tx),
                rx,
            }
        }

        /// Drain queued envelopes, dropping close markers.
        fn envelopes(&mut self) -> Vec<Envelope> {
            let mut out = Vec::new();
            while let Ok(command) = self.rx.try_recv() {
                if let Outbound::Deliver(envelope) = command {
                    out.push(envelope);
                }
            }
            out
        }

        /// Drain the raw outbound command queue.
        fn commands(&mut self) -> Vec<Outbound> {
            let mut out = Vec::new();
            while let Ok(command) = self.rx.try_recv() {
                out.push(command);
            }
            out
        }
    }

    fn creds(username: &str, password: &str) -> Credentials {
        Credentials {
            username: username.into(),
            password: password.into(),
        }
    }

    fn test_state(dir: &tempfile::TempDir) -> Arc<RelayState> {
        let db = Database::open_at(&dir.path().join("relay.db")).unwrap();
        // Seed the administrator the way main does at startup.
        db.create_user("overseer", &hash_password("sekrit")).unwrap();

        let config = ServerConfig {
            admin_username: "overseer".into(),
            admin_password: "sekrit".into(),
            ..ServerConfig::default()
        };
        Arc::new(RelayState::new(config, db))
    }

    async fn login(state: &Arc<RelayState>, username: &str, password: &str) -> TestClient {
        let mut client = TestClient::connect();
        dispatch(state, &mut client.conn, Envelope::Login(creds(username, password))).await;
        client.envelopes();
        client
    }

    /// Register a fresh account, log it in, and discard the handshake
    /// traffic.
    async fn join(state: &Arc<RelayState>, username: &str) -> TestClient {
        let mut client = TestClient::connect();
        dispatch(
            state,
            &mut client.conn,
            Envelope::Register(creds(username, "pw")),
        )
        .await;
        dispatch(state, &mut client.conn, Envelope::Login(creds(username, "pw"))).await;
        client.envelopes();
        client
    }

    async fn befriend(
        state: &Arc<RelayState>,
        a: &mut TestClient,
        b: &mut TestClient,
        a_name: &str,
        b_name: &str,
    ) {
        dispatch(
            state,
            &mut a.conn,
            Envelope::FriendRequest {
                from: a_name.into(),
                to: b_name.into(),
            },
        )
        .await;
        dispatch(
            state,
            &mut b.conn,
            Envelope::FriendResponse {
                from: b_name.into(),
                to: a_name.into(),
                accepted: true,
            },
        )
        .await;
        a.envelopes();
        b.envelopes();
    }

    // ── Authentication ───────────────────────────────────────────

    #[tokio::test]
    async fn login_replies_success_then_friend_list() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir);

        let mut client = TestClient::connect();
        dispatch(&state, &mut client.conn, Envelope::Register(creds("ada", "pw"))).await;
        dispatch(&state, &mut client.conn, Envelope::Login(creds("ada", "pw"))).await;

        let envelopes = client.envelopes();
        assert!(matches!(
            &envelopes[0],
            Envelope::RegisterSuccess { .. }
        ));
        // Registration in the registry broadcast the online list before
        // the login reply, exactly as the session directory does it.
        assert!(matches!(
            &envelopes[1],
            Envelope::OnlineUsers { users } if users == &["ada".to_string()]
        ));
        match &envelopes[2] {
            Envelope::LoginSuccess {
                username,
                avatar_color,
            } => {
                assert_eq!(username, "ada");
                assert!(avatar_color.starts_with('#'));
            }
            other => panic!("expected login success, got {other:?}"),
        }
        assert!(matches!(
            &envelopes[3],
            Envelope::FriendList { friends } if friends.is_empty()
        ));

        assert!(state.registry.is_online("ada").await);
    }

    #[tokio::test]
    async fn login_with_wrong_password_fails() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir);
        join(&state, "ada").await;

        let mut intruder = TestClient::connect();
        dispatch(
            &state,
            &mut intruder.conn,
            Envelope::Login(creds("ada", "wrong")),
        )
        .await;

        assert!(matches!(
            intruder.envelopes().as_slice(),
            [Envelope::LoginFail { reason }] if reason == "Invalid username or password"
        ));
        assert!(intruder.conn.username.is_none());
    }

    #[tokio::test]
    async fn banned_account_cannot_login() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir);

        let mut client = TestClient::connect();
        dispatch(&state, &mut client.conn, Envelope::Register(creds("ada", "pw"))).await;
        state.store.lock().await.set_banned("ada", true).unwrap();

        dispatch(&state, &mut client.conn, Envelope::Login(creds("ada", "pw"))).await;

        let envelopes = client.envelopes();
        assert!(matches!(
            envelopes.last(),
            Some(Envelope::LoginFail { reason }) if reason.contains("banned")
        ));
        assert!(!state.registry.is_online("ada").await);
    }

    #[tokio::test]
    async fn duplicate_registration_refused() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir);
        join(&state, "ada").await;

        let mut twin = TestClient::connect();
        dispatch(&state, &mut twin.conn, Envelope::Register(creds("ada", "other"))).await;

        assert!(matches!(
            twin.envelopes().as_slice(),
            [Envelope::RegisterFail { reason }] if reason == "Username already exists"
        ));
    }

    #[tokio::test]
    async fn unauthenticated_traffic_is_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir);
        let mut online = join(&state, "ada").await;

        let mut lurker = TestClient::connect();
        dispatch(
            &state,
            &mut lurker.conn,
            Envelope::ChatAll {
                sender: "ghost".into(),
                content: "boo".into(),
            },
        )
        .await;

        assert!(lurker.envelopes().is_empty());
        assert!(online.envelopes().is_empty());
    }

    // ── Chat routing ─────────────────────────────────────────────

    #[tokio::test]
    async fn chat_all_reaches_every_session() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir);
        let mut ada = join(&state, "ada").await;
        let mut grace = join(&state, "grace").await;
        let mut dan = join(&state, "dan").await;
        ada.envelopes();
        grace.envelopes();

        dispatch(
            &state,
            &mut ada.conn,
            Envelope::ChatAll {
                sender: "ada".into(),
                content: "hi".into(),
            },
        )
        .await;

        for client in [&mut ada, &mut grace, &mut dan] {
            assert!(matches!(
                client.envelopes().as_slice(),
                [Envelope::ChatAll { sender, content }] if sender == "ada" && content == "hi"
            ));
        }
    }

    #[tokio::test]
    async fn private_chat_blocked_without_friendship() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir);
        let mut ada = join(&state, "ada").await;
        let mut grace = join(&state, "grace").await;
        ada.envelopes();

        dispatch(
            &state,
            &mut ada.conn,
            Envelope::ChatPrivate {
                sender: "ada".into(),
                recipient: "grace".into(),
                content: "psst".into(),
            },
        )
        .await;

        // The sender gets a system notice naming the blocked recipient;
        // the recipient never hears about it.
        match ada.envelopes().as_slice() {
            [Envelope::ChatPrivate {
                sender, content, ..
            }] => {
                assert_eq!(sender, "System");
                assert!(content.contains("grace"));
            }
            other => panic!("expected a failure notice, got {other:?}"),
        }
        assert!(grace.envelopes().is_empty());
    }

    #[tokio::test]
    async fn private_chat_delivered_and_echoed() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir);
        let mut ada = join(&state, "ada").await;
        let mut grace = join(&state, "grace").await;
        befriend(&state, &mut ada, &mut grace, "ada", "grace").await;

        dispatch(
            &state,
            &mut ada.conn,
            Envelope::ChatPrivate {
                sender: "ada".into(),
                recipient: "grace".into(),
                content: "psst".into(),
            },
        )
        .await;

        assert!(matches!(
            grace.envelopes().as_slice(),
            [Envelope::ChatPrivate { sender, content, .. }]
                if sender == "ada" && content == "psst"
        ));
        // The sender sees its own message rendered once.
        assert!(matches!(
            ada.envelopes().as_slice(),
            [Envelope::ChatPrivate { sender, .. }] if sender == "ada"
        ));
    }

    #[tokio::test]
    async fn private_chat_to_offline_friend_is_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir);
        let mut ada = join(&state, "ada").await;
        let mut grace = join(&state, "grace").await;
        befriend(&state, &mut ada, &mut grace, "ada", "grace").await;

        dispatch(&state, &mut grace.conn, Envelope::Logout).await;
        ada.envelopes();

        dispatch(
            &state,
            &mut ada.conn,
            Envelope::ChatPrivate {
                sender: "ada".into(),
                recipient: "grace".into(),
                content: "psst".into(),
            },
        )
        .await;

        // No recipient, no echo.
        assert!(ada.envelopes().is_empty());
    }

    #[tokio::test]
    async fn attachments_broadcast_or_gate_by_recipient() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir);
        let mut ada = join(&state, "ada").await;
        let mut grace = join(&state, "grace").await;
        ada.envelopes();

        let public = Attachment {
            sender: "ada".into(),
            recipient: Some("All".into()),
            file_name: "notes.txt".into(),
            data: vec![1, 2, 3],
        };
        dispatch(&state, &mut ada.conn, Envelope::File(public)).await;

        assert!(matches!(
            grace.envelopes().as_slice(),
            [Envelope::File(att)] if att.file_name == "notes.txt"
        ));

        // A directed attachment obeys the friend gate.
        let direct = Attachment {
            sender: "ada".into(),
            recipient: Some("grace".into()),
            file_name: "secret.png".into(),
            data: vec![9],
        };
        dispatch(&state, &mut ada.conn, Envelope::Image(direct)).await;

        assert!(grace.envelopes().is_empty());
        let notices = ada.envelopes();
        assert!(matches!(
            notices.last(),
            Some(Envelope::ChatPrivate { sender, .. }) if sender == "System"
        ));
    }

    // ── Friend graph ─────────────────────────────────────────────

    #[tokio::test]
    async fn friend_request_notifies_target_only() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir);
        let mut ada = join(&state, "ada").await;
        let mut grace = join(&state, "grace").await;
        ada.envelopes();

        dispatch(
            &state,
            &mut ada.conn,
            Envelope::FriendRequest {
                from: "ada".into(),
                to: "grace".into(),
            },
        )
        .await;

        assert!(matches!(
            grace.envelopes().as_slice(),
            [Envelope::FriendRequest { from, .. }] if from == "ada"
        ));
        assert!(ada.envelopes().is_empty());
    }

    #[tokio::test]
    async fn friend_request_to_unknown_user_is_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir);
        let mut ada = join(&state, "ada").await;
        ada.envelopes();

        dispatch(
            &state,
            &mut ada.conn,
            Envelope::FriendRequest {
                from: "ada".into(),
                to: "nobody".into(),
            },
        )
        .await;

        assert!(ada.envelopes().is_empty());
    }

    #[tokio::test]
    async fn accepting_request_confirms_both_sides() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir);
        let mut ada = join(&state, "ada").await;
        let mut grace = join(&state, "grace").await;
        ada.envelopes();

        dispatch(
            &state,
            &mut ada.conn,
            Envelope::FriendRequest {
                from: "ada".into(),
                to: "grace".into(),
            },
        )
        .await;
        grace.envelopes();

        dispatch(
            &state,
            &mut grace.conn,
            Envelope::FriendResponse {
                from: "grace".into(),
                to: "ada".into(),
                accepted: true,
            },
        )
        .await;

        // The requester hears the acceptance; the accepter gets a list.
        assert!(matches!(
            ada.envelopes().as_slice(),
            [Envelope::FriendResponse { from, accepted, .. }]
                if from == "grace" && *accepted
        ));
        assert!(matches!(
            grace.envelopes().as_slice(),
            [Envelope::FriendList { friends }] if friends == &["ada".to_string()]
        ));

        // Accepted friendships resolve in both directions.
        let store = state.store.lock().await;
        assert!(store.is_friend_accepted("ada", "grace").unwrap());
        assert!(store.is_friend_accepted("grace", "ada").unwrap());
    }

    #[tokio::test]
    async fn rejecting_request_changes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir);
        let mut ada = join(&state, "ada").await;
        let mut grace = join(&state, "grace").await;
        ada.envelopes();

        dispatch(
            &state,
            &mut ada.conn,
            Envelope::FriendRequest {
                from: "ada".into(),
                to: "grace".into(),
            },
        )
        .await;
        grace.envelopes();

        dispatch(
            &state,
            &mut grace.conn,
            Envelope::FriendResponse {
                from: "grace".into(),
                to: "ada".into(),
                accepted: false,
            },
        )
        .await;

        assert!(ada.envelopes().is_empty());
        assert!(grace.envelopes().is_empty());

        // The pending edge is untouched and nothing was accepted.
        let store = state.store.lock().await;
        let edge = store.get_friend_edge("ada", "grace").unwrap().unwrap();
        assert_eq!(edge.status, banter_store::FriendStatus::Pending);
        assert!(!store.is_friend_accepted("ada", "grace").unwrap());
        assert!(!store.is_friend_accepted("grace", "ada").unwrap());
    }

    #[tokio::test]
    async fn deleting_friend_refreshes_both_lists() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir);
        let mut ada = join(&state, "ada").await;
        let mut grace = join(&state, "grace").await;
        befriend(&state, &mut ada, &mut grace, "ada", "grace").await;

        dispatch(
            &state,
            &mut ada.conn,
            Envelope::DeleteFriend {
                friend: "grace".into(),
            },
        )
        .await;

        assert!(matches!(
            ada.envelopes().as_slice(),
            [Envelope::FriendList { friends }] if friends.is_empty()
        ));
        assert!(matches!(
            grace.envelopes().as_slice(),
            [Envelope::FriendList { friends }] if friends.is_empty()
        ));
    }

    // ── Moderation ───────────────────────────────────────────────

    #[tokio::test]
    async fn admin_commands_from_non_admin_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir);
        let mut ada = join(&state, "ada").await;
        join(&state, "grace").await;
        ada.envelopes();

        dispatch(&state, &mut ada.conn, Envelope::AdminGetUsers).await;
        dispatch(
            &state,
            &mut ada.conn,
            Envelope::AdminBanUser {
                target: "grace".into(),
            },
        )
        .await;

        assert!(ada.envelopes().is_empty());
        assert!(!state.store.lock().await.is_banned("grace").unwrap());
        assert!(state.registry.is_online("grace").await);
    }

    #[tokio::test]
    async fn admin_sees_online_and_ban_state() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir);
        let mut admin = login(&state, "overseer", "sekrit").await;
        join(&state, "ada").await;
        admin.envelopes();

        dispatch(&state, &mut admin.conn, Envelope::AdminGetUsers).await;

        let envelopes = admin.envelopes();
        match envelopes.last() {
            Some(Envelope::AdminUserList { users }) => {
                let ada = users.iter().find(|u| u.username == "ada").unwrap();
                assert!(ada.online);
                assert!(!ada.banned);
                let overseer = users.iter().find(|u| u.username == "overseer").unwrap();
                assert!(overseer.online);
            }
            other => panic!("expected a user list, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn banning_kicks_and_blocks_relogin() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir);
        let mut admin = login(&state, "overseer", "sekrit").await;
        let mut carol = join(&state, "carol").await;
        admin.envelopes();

        dispatch(
            &state,
            &mut admin.conn,
            Envelope::AdminBanUser {
                target: "carol".into(),
            },
        )
        .await;

        // The kicked session sees the notice, then the close marker.
        let commands = carol.commands();
        assert!(matches!(
            commands.first(),
            Some(Outbound::Deliver(Envelope::ForceLogout { .. }))
        ));
        assert!(matches!(commands.get(1), Some(Outbound::Close)));
        assert!(!state.registry.is_online("carol").await);

        // The admin got the refreshed status list.
        let envelopes = admin.envelopes();
        match envelopes.last() {
            Some(Envelope::AdminUserList { users }) => {
                let carol_row = users.iter().find(|u| u.username == "carol").unwrap();
                assert!(carol_row.banned);
                assert!(!carol_row.online);
            }
            other => panic!("expected a user list, got {other:?}"),
        }

        // A fresh login attempt is refused.
        let mut retry = TestClient::connect();
        dispatch(&state, &mut retry.conn, Envelope::Login(creds("carol", "pw"))).await;
        assert!(matches!(
            retry.envelopes().as_slice(),
            [Envelope::LoginFail { reason }] if reason.contains("banned")
        ));
    }

    #[tokio::test]
    async fn unban_restores_login() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir);
        let mut admin = login(&state, "overseer", "sekrit").await;
        join(&state, "carol").await;

        dispatch(
            &state,
            &mut admin.conn,
            Envelope::AdminBanUser {
                target: "carol".into(),
            },
        )
        .await;
        dispatch(
            &state,
            &mut admin.conn,
            Envelope::AdminUnbanUser {
                target: "carol".into(),
            },
        )
        .await;

        // Unban does not reconnect anyone.
        assert!(!state.registry.is_online("carol").await);

        let mut retry = login(&state, "carol", "pw").await;
        assert!(state.registry.is_online("carol").await);
        retry.envelopes();
    }

    #[tokio::test]
    async fn deleting_user_cascades_to_friends() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir);
        let mut admin = login(&state, "overseer", "sekrit").await;
        let mut carol = join(&state, "carol").await;
        let mut frank = join(&state, "frank").await;
        befriend(&state, &mut carol, &mut frank, "carol", "frank").await;
        admin.envelopes();
        frank.envelopes();

        dispatch(
            &state,
            &mut admin.conn,
            Envelope::AdminDeleteUser {
                target: "carol".into(),
            },
        )
        .await;

        // The account and its session are gone.
        assert!(!state.store.lock().await.user_exists("carol").unwrap());
        assert!(!state.registry.is_online("carol").await);
        assert!(matches!(
            carol.commands().first(),
            Some(Outbound::Deliver(Envelope::ForceLogout { .. }))
        ));

        // The online ex-friend got a list no longer naming the deleted
        // account.
        let lists: Vec<_> = frank
            .envelopes()
            .into_iter()
            .filter_map(|e| match e {
                Envelope::FriendList { friends } => Some(friends),
                _ => None,
            })
            .collect();
        assert_eq!(lists.last().unwrap(), &Vec::<String>::new());

        let envelopes = admin.envelopes();
        match envelopes.last() {
            Some(Envelope::AdminUserList { users }) => {
                assert!(users.iter().all(|u| u.username != "carol"));
            }
            other => panic!("expected a user list, got {other:?}"),
        }
    }

    // ── Session lifecycle ────────────────────────────────────────

    #[tokio::test]
    async fn logout_disconnects_and_updates_presence() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir);
        let mut ada = join(&state, "ada").await;
        let mut grace = join(&state, "grace").await;
        ada.envelopes();

        let flow = dispatch(&state, &mut ada.conn, Envelope::Logout).await;

        assert_eq!(flow, Flow::Disconnect);
        assert!(!state.registry.is_online("ada").await);
        assert!(matches!(
            grace.envelopes().as_slice(),
            [Envelope::OnlineUsers { users }] if users == &["grace".to_string()]
        ));
    }

    #[tokio::test]
    async fn duplicate_login_replaces_session() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir);
        let first = join(&state, "ada").await;
        let mut second = login(&state, "ada", "pw").await;

        assert_eq!(state.registry.online_users().await, vec!["ada"]);

        // The stale connection's cleanup must not evict the new session.
        assert!(
            !state
                .registry
                .remove_connection("ada", &first.conn.tx)
                .await
        );
        assert!(state.registry.is_online("ada").await);

        // Traffic lands on the replacement connection.
        state
            .registry
            .broadcast(Envelope::ChatAll {
                sender: "grace".into(),
                content: "hi".into(),
            })
            .await;
        assert!(matches!(
            second.envelopes().last(),
            Some(Envelope::ChatAll { .. })
        ));
    }

    #[tokio::test]
    async fn avatar_update_persists_image() {
        let dir = tempfile::tempdir().unwrap();
        let state = test_state(&dir);
        let mut ada = join(&state, "ada").await;

        dispatch(
            &state,
            &mut ada.conn,
            Envelope::AvatarUpdate {
                image: vec![1, 2, 3],
            },
        )
        .await;
        assert_eq!(
            state.store.lock().await.get_avatar("ada").unwrap(),
            Some(vec![1, 2, 3])
        );

        // Empty payloads are dropped, not persisted.
        dispatch(&state, &mut ada.conn, Envelope::AvatarUpdate { image: vec![] }).await;
        assert_eq!(
            state.store.lock().await.get_avatar("ada").unwrap(),
            Some(vec![1, 2, 3])
        );
    }
}
