//! Social graph coordination — the friend request/accept handshake and
//! the private-message authorization gate.

use tracing::{debug, info};

use banter_shared::constants::{PUBLIC_ROOM, SYSTEM_SENDER};
use banter_shared::{Attachment, Envelope};
use banter_store::FriendStatus;

use crate::error::Result;
use crate::router::ConnState;
use crate::state::RelayState;

/// Record a pending friend request and notify the target if online.
///
/// Requests to unknown users are dropped without notice; duplicate
/// requests are idempotent. The requester is never echoed.
pub async fn send_request(state: &RelayState, from: &str, to: &str) -> Result<()> {
    {
        let store = state.store.lock().await;
        if !store.user_exists(to)? {
            debug!(%from, %to, "friend request to unknown user dropped");
            return Ok(());
        }
        store.add_friend_edge(from, to, FriendStatus::Pending)?;
    }

    if let Some(target) = state.registry.get(to).await {
        target.deliver(Envelope::FriendRequest {
            from: from.to_string(),
            to: to.to_string(),
        });
    }
    info!(%from, %to, "friend request recorded");
    Ok(())
}

/// Apply the target's answer to a pending request.
///
/// A rejection is a no-op: the pending edge stays as it is and nobody is
/// notified. An acceptance promotes the edge, mirrors it, confirms to
/// the requester (if online), and hands the accepter its refreshed
/// friend list.
pub async fn respond_request(
    state: &RelayState,
    conn: &ConnState,
    accepter: &str,
    requester: &str,
    accepted: bool,
) -> Result<()> {
    if !accepted {
        return Ok(());
    }

    let friends = {
        let store = state.store.lock().await;
        store.promote_friend_edge(requester, accepter)?;
        store.list_accepted_friends(accepter)?
    };

    if let Some(handle) = state.registry.get(requester).await {
        handle.deliver(Envelope::FriendResponse {
            from: accepter.to_string(),
            to: requester.to_string(),
            accepted: true,
        });
    }
    conn.reply(Envelope::FriendList { friends });
    info!(%accepter, %requester, "friend request accepted");
    Ok(())
}

/// Delete the friendship in both directions and refresh both parties'
/// lists — the actor always, the ex-friend only while online.
pub async fn remove_friendship(
    state: &RelayState,
    conn: &ConnState,
    actor: &str,
    friend: &str,
) -> Result<()> {
    let (actor_friends, ex_friends) = {
        let store = state.store.lock().await;
        store.delete_friend_edges(actor, friend)?;
        (
            store.list_accepted_friends(actor)?,
            store.list_accepted_friends(friend)?,
        )
    };

    conn.reply(Envelope::FriendList {
        friends: actor_friends,
    });
    if let Some(handle) = state.registry.get(friend).await {
        handle.deliver(Envelope::FriendList {
            friends: ex_friends,
        });
    }
    info!(%actor, %friend, "friendship removed");
    Ok(())
}

/// Relay a direct message, gated on the directed accepted edge
/// sender → recipient.
///
/// Non-friends get a system notice naming the blocked recipient; the
/// recipient is never contacted. On success the recipient (if online)
/// receives the message and the sender's own connection gets an echo,
/// unless sender and recipient are the same session.
pub async fn route_private(
    state: &RelayState,
    sender: &str,
    recipient: &str,
    envelope: Envelope,
) -> Result<()> {
    let allowed = state
        .store
        .lock()
        .await
        .is_friend_accepted(sender, recipient)?;

    if !allowed {
        if let Some(handle) = state.registry.get(sender).await {
            handle.deliver(Envelope::ChatPrivate {
                sender: SYSTEM_SENDER.to_string(),
                recipient: sender.to_string(),
                content: format!("Message failed: You are not friends with {recipient}"),
            });
        }
        debug!(%sender, %recipient, "private message blocked by friend gate");
        return Ok(());
    }

    if let Some(target) = state.registry.get(recipient).await {
        target.deliver(envelope.clone());
        if sender != recipient {
            if let Some(origin) = state.registry.get(sender).await {
                origin.deliver(envelope);
            }
        }
    }
    Ok(())
}

/// Route a file or image: broadcast when no recipient (or the public
/// room) is named, otherwise through the friend gate like a private
/// message.
pub async fn route_attachment(
    state: &RelayState,
    attachment: Attachment,
    wrap: fn(Attachment) -> Envelope,
) -> Result<()> {
    match attachment.recipient.as_deref() {
        None | Some(PUBLIC_ROOM) => {
            state.registry.broadcast(wrap(attachment)).await;
            Ok(())
        }
        Some(recipient) => {
            let sender = attachment.sender.clone();
            let recipient = recipient.to_string();
            route_private(state, &sender, &recipient, wrap(attachment)).await
        }
    }
}
