//! Minimal client for the media server's API surface: signing the JWT access
//! tokens participants use to join rooms, and the room service calls the
//! coordination plane needs (participant listing, room creation).

pub mod rooms;
pub mod token;

pub use rooms::{ParticipantInfo, RoomServiceClient, RoomServiceError};
pub use token::{TokenError, TokenMinter, VideoGrant};
