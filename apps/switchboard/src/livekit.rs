//! Wires the media-service clients into the coordinator's collaborator seams.

use std::time::Duration;

use async_trait::async_trait;
use roomkit::{ParticipantInfo, RoomServiceClient, RoomServiceError, TokenError, TokenMinter};

use crate::state::{RoomDirectory, TokenIssuer};

impl TokenIssuer for TokenMinter {
    fn issue(&self, room: &str, identity: &str, ttl: Duration) -> Result<String, TokenError> {
        self.join_token(room, identity, ttl)
    }
}

#[async_trait]
impl RoomDirectory for RoomServiceClient {
    async fn list_participants(
        &self,
        room: &str,
    ) -> Result<Vec<ParticipantInfo>, RoomServiceError> {
        RoomServiceClient::list_participants(self, room).await
    }

    async fn create_room(&self, room: &str) -> Result<(), RoomServiceError> {
        RoomServiceClient::create_room(self, room).await
    }
}
