//! Data Transfer Objects
//!
//! DTOs for gateway events and API request/response serialization.

pub mod request;
pub mod response;

pub use request::CreateRoomRequest;
pub use response::{
    MessageParty, MessageDto, OnlineUsersResponse, PresenceResponse, RoomResponse, RosterEntry,
    SYSTEM_PARTICIPANT_ID, SYSTEM_PARTICIPANT_NAME,
};
