//! Room registry.
//!
//! # Room Lifecycle
//! 1. A client sends `CreateRoom` and gets a fresh random room name, or
//!    sends `JoinRoom` with a name shared out of band.
//! 2. Joining a name nobody has used yet creates that room.
//! 3. Members share enemy spawns and see each other's cubes.
//! 4. A room is dropped once its last member leaves.
//!
//! A client is in at most one room at a time. Rooms hold two players: each
//! client replays exactly one remote peer as its companion.

use std::collections::HashMap;
use std::fmt;

use rand::{distributions::Alphanumeric, Rng};

use crate::net::{ClientId, RoomId};

/// Members allowed per room: the player and one companion.
pub const MAX_ROOM_MEMBERS: usize = 2;

/// Length of generated room names.
pub const ROOM_ID_LEN: usize = 6;

/// A named group of clients.
#[derive(Debug, Clone)]
pub struct Room {
    pub id: RoomId,
    /// Members in join order.
    pub members: Vec<ClientId>,
}

impl Room {
    pub fn new(id: RoomId) -> Self {
        Room {
            id,
            members: Vec::new(),
        }
    }

    pub fn is_member(&self, client: ClientId) -> bool {
        self.members.contains(&client)
    }

    pub fn is_full(&self) -> bool {
        self.members.len() >= MAX_ROOM_MEMBERS
    }
}

/// Room operation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomError {
    /// The client is already in a room.
    AlreadyMember,
    NotMember,
    UnknownRoom,
    RoomFull,
}

impl fmt::Display for RoomError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RoomError::AlreadyMember => write!(f, "client is already in a room"),
            RoomError::NotMember => write!(f, "client is not in a room"),
            RoomError::UnknownRoom => write!(f, "no such room"),
            RoomError::RoomFull => write!(f, "room is full"),
        }
    }
}

impl std::error::Error for RoomError {}

/// Tracks rooms and which room each client is in.
#[derive(Debug, Default)]
pub struct RoomRegistry {
    rooms: HashMap<RoomId, Room>,
    membership: HashMap<ClientId, RoomId>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a room under a fresh random name and puts `owner` in it.
    pub fn create_room(&mut self, owner: ClientId) -> Result<RoomId, RoomError> {
        if self.membership.contains_key(&owner) {
            return Err(RoomError::AlreadyMember);
        }
        let id = loop {
            let candidate = random_room_id();
            if !self.rooms.contains_key(&candidate) {
                break candidate;
            }
        };
        self.rooms.insert(id.clone(), Room::new(id.clone()));
        self.join_room(owner, &id)?;
        Ok(id)
    }

    /// Puts `client` in room `id`, creating the room if the name is unused.
    ///
    /// Returns the client's index in the member list.
    pub fn join_room(&mut self, client: ClientId, id: &RoomId) -> Result<usize, RoomError> {
        if self.membership.contains_key(&client) {
            return Err(RoomError::AlreadyMember);
        }
        let room = self
            .rooms
            .entry(id.clone())
            .or_insert_with(|| Room::new(id.clone()));
        if room.is_full() {
            return Err(RoomError::RoomFull);
        }
        room.members.push(client);
        self.membership.insert(client, id.clone());
        Ok(room.members.len() - 1)
    }

    /// Removes `client` from its room, dropping the room if it empties.
    pub fn leave(&mut self, client: ClientId) -> Result<RoomId, RoomError> {
        let id = self.membership.remove(&client).ok_or(RoomError::NotMember)?;
        let room = self.rooms.get_mut(&id).ok_or(RoomError::UnknownRoom)?;
        room.members.retain(|m| *m != client);
        self.cleanup_empty();
        Ok(id)
    }

    pub fn get_room(&self, id: &RoomId) -> Option<&Room> {
        self.rooms.get(id)
    }

    /// The room `client` is in, if any.
    pub fn room_of(&self, client: ClientId) -> Option<&Room> {
        self.membership.get(&client).and_then(|id| self.rooms.get(id))
    }

    /// Members of room `id`, in join order.
    pub fn members(&self, id: &RoomId) -> &[ClientId] {
        self.rooms
            .get(id)
            .map(|r| r.members.as_slice())
            .unwrap_or(&[])
    }

    pub fn room_ids(&self) -> impl Iterator<Item = &RoomId> {
        self.rooms.keys()
    }

    pub fn len(&self) -> usize {
        self.rooms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rooms.is_empty()
    }

    /// Drops rooms with no members.
    pub fn cleanup_empty(&mut self) {
        self.rooms.retain(|_, room| !room.members.is_empty());
    }
}

fn random_room_id() -> RoomId {
    let name: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(ROOM_ID_LEN)
        .map(char::from)
        .collect();
    RoomId(name)
}
