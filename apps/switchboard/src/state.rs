//! Control-plane state for the switchboard service: the transfer store, both
//! subscriber registries, and the warm-transfer operations themselves. Routes
//! stay thin; anything with state-consistency concerns lives here.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use roomkit::{ParticipantInfo, RoomServiceError, TokenError};

use crate::registry::{RegistryError, StreamEvent, SubscriberMap, Subscription, TransferNotice};
use crate::store::{main_room, support_room, TransferStore, WarmTransfer};

/// Identity used for support-room credentials when the caller does not name
/// one.
pub const DEFAULT_AGENT_IDENTITY: &str = "agent";

const DEFAULT_USER_TOKEN_TTL: Duration = Duration::from_secs(600);
const DEFAULT_SUPPORT_TOKEN_TTL: Duration = Duration::from_secs(3600);
const DEFAULT_SSE_KEEPALIVE: Duration = Duration::from_secs(20);

/// Mints join credentials for the media service. Minting is local signing,
/// so the trait is synchronous.
pub trait TokenIssuer: Send + Sync {
    fn issue(&self, room: &str, identity: &str, ttl: Duration) -> Result<String, TokenError>;
}

/// The media service's room and participant directory.
#[async_trait]
pub trait RoomDirectory: Send + Sync {
    async fn list_participants(&self, room: &str)
        -> Result<Vec<ParticipantInfo>, RoomServiceError>;
    /// Idempotent create-if-absent.
    async fn create_room(&self, room: &str) -> Result<(), RoomServiceError>;
}

#[derive(Debug, Error)]
pub enum TransferError {
    #[error("No pending warm transfer for this room")]
    NoPendingTransfer,
    #[error("token issuance failed: {0}")]
    Token(#[from] TokenError),
    #[error("room service failure: {0}")]
    Directory(#[from] RoomServiceError),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartedTransfer {
    pub token: String,
    pub support_room: String,
    pub already_started: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct TransferGrant {
    pub identity: String,
    pub token: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedTransfer {
    pub results: Vec<TransferGrant>,
    pub support_room: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferStatus {
    pub active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub support_room: Option<String>,
}

/// A credential together with the room it opens.
#[derive(Debug, Clone, Serialize)]
pub struct RoomGrant {
    pub token: String,
    pub room: String,
}

#[derive(Clone)]
pub struct AppState {
    transfers: Arc<TransferStore>,
    identity_streams: SubscriberMap,
    room_streams: SubscriberMap,
    tokens: Arc<dyn TokenIssuer>,
    directory: Arc<dyn RoomDirectory>,
    user_token_ttl: Duration,
    support_token_ttl: Duration,
    sse_keepalive: Duration,
}

impl AppState {
    pub fn new(tokens: Arc<dyn TokenIssuer>, directory: Arc<dyn RoomDirectory>) -> Self {
        Self {
            transfers: Arc::new(TransferStore::new()),
            identity_streams: SubscriberMap::new(),
            room_streams: SubscriberMap::new(),
            tokens,
            directory,
            user_token_ttl: DEFAULT_USER_TOKEN_TTL,
            support_token_ttl: DEFAULT_SUPPORT_TOKEN_TTL,
            sse_keepalive: DEFAULT_SSE_KEEPALIVE,
        }
    }

    pub fn with_token_ttls(mut self, user: Duration, support: Duration) -> Self {
        self.user_token_ttl = user;
        self.support_token_ttl = support;
        self
    }

    pub fn with_sse_keepalive(mut self, interval: Duration) -> Self {
        self.sse_keepalive = interval;
        self
    }

    pub fn sse_keepalive(&self) -> Duration {
        self.sse_keepalive
    }

    /// Starts a warm transfer for `room_base`, or idempotently joins the one
    /// already active: the first caller wins the support-room creation and
    /// later callers get a fresh credential for the same room.
    pub fn start_warm_transfer(
        &self,
        room_base: &str,
        agent_identity: Option<&str>,
    ) -> Result<StartedTransfer, TransferError> {
        let requester = agent_identity.unwrap_or(DEFAULT_AGENT_IDENTITY);

        // Minting is local signing, so the absence check and the insert stay
        // under one guard; racing starts for a new room serialize here.
        let mut transfers = self.transfers.guard();
        if let Some(entry) = transfers.get(room_base) {
            let support = entry.support_room.clone();
            drop(transfers);

            // Re-broadcast so an agent that subscribed after the first start
            // still learns the transfer is active.
            self.room_streams
                .publish(room_base, &StreamEvent::warm_started(support.clone()));
            let token = self.tokens.issue(&support, requester, self.support_token_ttl)?;
            debug!(room = room_base, agent = requester, "joining already-active warm transfer");
            return Ok(StartedTransfer {
                token,
                support_room: support,
                already_started: true,
            });
        }

        let support = support_room(room_base);
        let token = self.tokens.issue(&support, requester, self.support_token_ttl)?;
        transfers.insert(
            room_base.to_string(),
            WarmTransfer {
                support_room: support.clone(),
                agent_identity: agent_identity.map(str::to_owned),
                agent_token: token.clone(),
            },
        );
        drop(transfers);

        self.room_streams
            .publish(room_base, &StreamEvent::warm_started(support.clone()));
        info!(room = room_base, support_room = %support, "warm transfer started");
        Ok(StartedTransfer {
            token,
            support_room: support,
            already_started: false,
        })
    }

    /// Moves the main room's user participants to the support room: mints a
    /// support credential per user, pushes it on their identity stream, and
    /// clears the transfer record.
    pub async fn complete_transfer(
        &self,
        room_base: &str,
    ) -> Result<CompletedTransfer, TransferError> {
        let entry = self
            .transfers
            .get(room_base)
            .ok_or(TransferError::NoPendingTransfer)?;

        let main = main_room(room_base);
        let participants = match self.directory.list_participants(&main).await {
            Ok(list) => list,
            Err(err) => {
                // A completed transfer with nobody notified beats blocking the
                // agent's completion, so degrade to an empty roster.
                warn!(room = %main, error = %err, "participant listing failed during completion");
                Vec::new()
            }
        };

        let mut results = Vec::new();
        for participant in participants
            .iter()
            .filter(|p| !is_agent_identity(p.effective_identity()))
        {
            let identity = participant.effective_identity().to_string();
            let token = match self
                .tokens
                .issue(&entry.support_room, &identity, self.support_token_ttl)
            {
                Ok(token) => token,
                Err(err) => {
                    error!(identity = %identity, error = %err, "support credential failed; skipping participant");
                    continue;
                }
            };
            self.identity_streams.publish(
                &identity,
                &StreamEvent::Transfer(TransferNotice {
                    token: token.clone(),
                    support_room: entry.support_room.clone(),
                }),
            );
            results.push(TransferGrant { identity, token });
        }

        self.transfers.remove(room_base);
        info!(
            room = room_base,
            moved = results.len(),
            initiated_by = ?entry.agent_identity,
            "warm transfer completed"
        );
        Ok(CompletedTransfer {
            results,
            support_room: entry.support_room,
        })
    }

    /// Pure read; never mutates the store.
    pub fn warm_transfer_status(&self, room_base: &str) -> TransferStatus {
        match self.transfers.get(room_base) {
            Some(entry) => TransferStatus {
                active: true,
                support_room: Some(entry.support_room),
            },
            None => TransferStatus {
                active: false,
                support_room: None,
            },
        }
    }

    /// Token for a caller joining the main room of `room_base`.
    pub fn issue_user_token(
        &self,
        room_base: &str,
        user_name: &str,
    ) -> Result<RoomGrant, TransferError> {
        let room = main_room(room_base);
        let token = self.tokens.issue(&room, user_name, self.user_token_ttl)?;
        Ok(RoomGrant { token, room })
    }

    /// Routes an agent to whichever room needs one: the main room while the
    /// call is unattended, the support room once a pair is already inside.
    /// A directory miss is taken to mean the main room does not exist yet.
    pub async fn issue_agent_token(&self, room_base: &str) -> Result<RoomGrant, TransferError> {
        let room = main_room(room_base);
        let participants = match self.directory.list_participants(&room).await {
            Ok(list) => list,
            Err(err) => {
                warn!(room = %room, error = %err, "participant listing failed; ensuring room exists");
                self.directory.create_room(&room).await?;
                Vec::new()
            }
        };

        if participants.len() <= 1 {
            let token = self.tokens.issue(&room, "Agent A", self.support_token_ttl)?;
            Ok(RoomGrant { token, room })
        } else {
            let support = support_room(room_base);
            let token = self
                .tokens
                .issue(&support, "Agent B", self.support_token_ttl)?;
            Ok(RoomGrant {
                token,
                room: support,
            })
        }
    }

    pub fn subscribe_identity(&self, identity: &str) -> Result<Subscription, RegistryError> {
        self.identity_streams.subscribe(identity)
    }

    /// Room subscriptions catch up immediately: a transfer that started
    /// before the subscribe call is delivered as the stream's first event.
    pub fn subscribe_room(&self, room_base: &str) -> Result<Subscription, RegistryError> {
        let subscription = self.room_streams.subscribe(room_base)?;
        if let Some(entry) = self.transfers.get(room_base) {
            subscription.prime(StreamEvent::warm_started(entry.support_room));
        }
        Ok(subscription)
    }
}

/// Agents are recognized by naming convention: any identity containing
/// "agent", case-insensitive.
fn is_agent_identity(identity: &str) -> bool {
    identity.to_ascii_lowercase().contains("agent")
}


#[cfg(test)]
mod tests {
    use super::testing::{state_with, FixedDirectory, StaticTokens};
    use super::*;
    use tokio_stream::StreamExt;

    fn fresh_state() -> AppState {
        state_with(Arc::new(FixedDirectory::default()))
    }

    #[test]
    fn status_is_inactive_for_unknown_rooms() {
        let state = fresh_state();
        let status = state.warm_transfer_status("nowhere");
        assert!(!status.active);
        assert!(status.support_room.is_none());
    }

    #[test]
    fn start_creates_the_support_room_and_flips_status() {
        let state = fresh_state();
        let started = state.start_warm_transfer("acme", Some("Agent A")).unwrap();
        assert_eq!(started.support_room, "acme-support-room");
        assert!(!started.already_started);
        assert_eq!(started.token, "jwt-acme-support-room-Agent A");

        let status = state.warm_transfer_status("acme");
        assert!(status.active);
        assert_eq!(status.support_room.as_deref(), Some("acme-support-room"));
    }

    #[test]
    fn restart_is_idempotent_and_preserves_the_cached_token() {
        let state = fresh_state();
        let first = state.start_warm_transfer("acme", Some("Agent A")).unwrap();
        let second = state.start_warm_transfer("acme", Some("Agent B")).unwrap();

        assert_eq!(second.support_room, first.support_room);
        assert!(second.already_started);
        assert_eq!(second.token, "jwt-acme-support-room-Agent B");

        let record = state.transfers.get("acme").expect("record still present");
        assert_eq!(record.agent_token, first.token);
        assert_eq!(record.agent_identity.as_deref(), Some("Agent A"));
    }

    #[test]
    fn start_without_an_identity_uses_the_default_agent() {
        let state = fresh_state();
        let started = state.start_warm_transfer("acme", None).unwrap();
        assert_eq!(started.token, "jwt-acme-support-room-agent");
    }

    #[tokio::test]
    async fn complete_without_start_fails_and_leaves_state_unchanged() {
        let state = fresh_state();
        let err = state.complete_transfer("acme").await.unwrap_err();
        assert!(matches!(err, TransferError::NoPendingTransfer));
        assert!(!state.warm_transfer_status("acme").active);
    }

    #[tokio::test]
    async fn complete_moves_users_and_excludes_agents() {
        let directory = Arc::new(FixedDirectory::with_roster(&["carol", "Agent A"]));
        let state = state_with(directory);
        state.start_warm_transfer("acme", None).unwrap();

        let mut carol_stream = state.subscribe_identity("carol").unwrap();

        let completed = state.complete_transfer("acme").await.unwrap();
        assert_eq!(completed.support_room, "acme-support-room");
        assert_eq!(completed.results.len(), 1);
        assert_eq!(completed.results[0].identity, "carol");
        assert_eq!(completed.results[0].token, "jwt-acme-support-room-carol");

        match carol_stream.next().await {
            Some(StreamEvent::Transfer(notice)) => {
                assert_eq!(notice.support_room, "acme-support-room");
                assert_eq!(notice.token, "jwt-acme-support-room-carol");
            }
            other => panic!("expected transfer notice, got {other:?}"),
        }

        assert!(!state.warm_transfer_status("acme").active);
    }

    #[tokio::test]
    async fn complete_survives_an_unavailable_directory() {
        let state = fresh_state();
        state.start_warm_transfer("acme", None).unwrap();

        let completed = state.complete_transfer("acme").await.unwrap();
        assert!(completed.results.is_empty());
        assert!(!state.warm_transfer_status("acme").active);
    }

    #[tokio::test]
    async fn complete_skips_participants_whose_credential_fails() {
        let directory = Arc::new(FixedDirectory::with_roster(&["carol", "dave"]));
        let tokens = StaticTokens::default();
        tokens.deny.lock().push("dave".to_string());
        let state = AppState::new(Arc::new(tokens), directory);
        state.start_warm_transfer("acme", None).unwrap();

        let mut dave_stream = state.subscribe_identity("dave").unwrap();

        let completed = state.complete_transfer("acme").await.unwrap();
        assert_eq!(completed.results.len(), 1);
        assert_eq!(completed.results[0].identity, "carol");

        let quiet =
            tokio::time::timeout(Duration::from_millis(10), dave_stream.next()).await;
        assert!(quiet.is_err(), "skipped participant must not be notified");
        assert!(!state.warm_transfer_status("acme").active);
    }

    #[tokio::test]
    async fn room_subscribers_catch_up_on_an_active_transfer() {
        let state = fresh_state();
        state.start_warm_transfer("test", None).unwrap();

        let mut stream = state.subscribe_room("test").unwrap();
        match stream.next().await {
            Some(StreamEvent::Room(crate::registry::RoomEvent::WarmStarted { support_room })) => {
                assert_eq!(support_room, "test-support-room");
            }
            other => panic!("expected warm_started, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn start_notifies_existing_room_subscribers() {
        let state = fresh_state();
        let mut stream = state.subscribe_room("acme").unwrap();

        state.start_warm_transfer("acme", None).unwrap();
        assert!(matches!(stream.next().await, Some(StreamEvent::Room(_))));
    }

    #[test]
    fn user_tokens_target_the_main_room() {
        let state = fresh_state();
        let grant = state.issue_user_token("demo", "alice").unwrap();
        assert_eq!(grant.room, "demo-main-room");
        assert_eq!(grant.token, "jwt-demo-main-room-alice");
    }

    #[tokio::test]
    async fn agent_tokens_route_by_room_occupancy() {
        let lone = Arc::new(FixedDirectory::with_roster(&["caller"]));
        let state = state_with(lone);
        let grant = state.issue_agent_token("demo").await.unwrap();
        assert_eq!(grant.room, "demo-main-room");
        assert_eq!(grant.token, "jwt-demo-main-room-Agent A");

        let paired = Arc::new(FixedDirectory::with_roster(&["caller", "Agent A"]));
        let state = state_with(paired);
        let grant = state.issue_agent_token("demo").await.unwrap();
        assert_eq!(grant.room, "demo-support-room");
        assert_eq!(grant.token, "jwt-demo-support-room-Agent B");
    }

    #[tokio::test]
    async fn agent_token_creates_the_room_when_the_directory_misses() {
        let directory = Arc::new(FixedDirectory::default());
        let state = state_with(directory.clone());

        let grant = state.issue_agent_token("demo").await.unwrap();
        assert_eq!(grant.room, "demo-main-room");
        assert_eq!(*directory.created.lock(), vec!["demo-main-room"]);
    }

    #[test]
    fn agent_partition_is_a_case_insensitive_substring_match() {
        assert!(is_agent_identity("Agent A"));
        assert!(is_agent_identity("support-AGENT-2"));
        assert!(!is_agent_identity("carol"));
    }
}
