//! Administrator-only operations: inspect, ban, unban, delete.
//!
//! Every operation returns the refreshed account status list so the
//! administrator's view stays current. Authorization (exact match on the
//! configured admin username) happens in the router before any of these
//! run.

use tracing::info;

use banter_shared::{Envelope, UserStatus};

use crate::error::Result;
use crate::state::RelayState;

/// Notice delivered to a session before a moderation kick.
const KICK_NOTICE: &str = "You have been banned/kicked by admin.";

/// Join stored ban flags with live registry membership.
pub async fn list_users_with_status(state: &RelayState) -> Result<Vec<UserStatus>> {
    let rows = state.store.lock().await.list_all_users()?;

    let mut users = Vec::with_capacity(rows.len());
    for (username, banned) in rows {
        let online = state.registry.is_online(&username).await;
        users.push(UserStatus {
            username,
            online,
            banned,
        });
    }
    Ok(users)
}

/// Ban an account and kick its live session, if any.
pub async fn ban(state: &RelayState, target: &str) -> Result<Vec<UserStatus>> {
    state.store.lock().await.set_banned(target, true)?;
    state.registry.kick(target, KICK_NOTICE).await;
    info!(user = %target, "account banned");
    list_users_with_status(state).await
}

/// Lift an account's ban. Nobody is reconnected automatically.
pub async fn unban(state: &RelayState, target: &str) -> Result<Vec<UserStatus>> {
    state.store.lock().await.set_banned(target, false)?;
    info!(user = %target, "account unbanned");
    list_users_with_status(state).await
}

/// Delete an account, its friend edges, and its live session, then push
/// every online ex-friend its own recomputed friend list.
///
/// The friends are collected before the deletion cascades their edges
/// away.
pub async fn delete_user(state: &RelayState, target: &str) -> Result<Vec<UserStatus>> {
    let former_friends = {
        let store = state.store.lock().await;
        let friends = store.list_accepted_friends(target)?;
        store.delete_user(target)?;
        friends
    };

    state.registry.kick(target, KICK_NOTICE).await;

    for friend in former_friends {
        if let Some(handle) = state.registry.get(&friend).await {
            let friends = state.store.lock().await.list_accepted_friends(&friend)?;
            handle.deliver(Envelope::FriendList { friends });
        }
    }

    info!(user = %target, "account deleted");
    list_users_with_status(state).await
}
