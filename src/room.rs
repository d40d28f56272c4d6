//! Room struct definition
//!
//! Represents a named chat room with an owner, an admin set and an
//! ordered member list.

use std::collections::HashSet;

use crate::types::{ClientId, RoomName};

/// Who owns a room
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Owner {
    /// Rooms created from configuration at startup
    Server,
    /// Rooms created with `/create`
    User(String),
}

impl Owner {
    pub fn is(&self, username: &str) -> bool {
        matches!(self, Owner::User(owner) if owner == username)
    }
}

impl std::fmt::Display for Owner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Owner::Server => write!(f, "server"),
            Owner::User(name) => write!(f, "{}", name),
        }
    }
}

/// Privilege tier of a username within one room
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Role {
    Member,
    Admin,
    Owner,
}

impl Role {
    /// Tag appended to a username in listings and chat lines
    pub fn tag(self) -> &'static str {
        match self {
            Role::Member => "",
            Role::Admin => " (admin)",
            Role::Owner => " (owner)",
        }
    }

    /// Whether this tier may kick anyone at all
    pub fn can_kick(self) -> bool {
        self > Role::Member
    }
}

/// Chat room
///
/// Members are client handles; the room never owns the clients.
#[derive(Debug)]
pub struct Room {
    /// Room name for identification
    pub name: RoomName,
    /// Room creator
    pub owner: Owner,
    /// Usernames granted kick privilege
    pub admins: HashSet<String>,
    /// Current members in join order
    users: Vec<ClientId>,
}

impl Room {
    /// Create a new, empty room
    pub fn new(name: RoomName, owner: Owner) -> Self {
        Self {
            name,
            owner,
            admins: HashSet::new(),
            users: Vec::new(),
        }
    }

    /// Current members in join order
    pub fn users(&self) -> &[ClientId] {
        &self.users
    }

    /// Check if a client is in this room
    pub fn contains(&self, client_id: ClientId) -> bool {
        self.users.contains(&client_id)
    }

    /// Add a member
    ///
    /// Returns false if the client is already a member.
    pub fn add_user(&mut self, client_id: ClientId) -> bool {
        if self.contains(client_id) {
            false
        } else {
            self.users.push(client_id);
            true
        }
    }

    /// Remove a member
    ///
    /// Returns true if the client was a member.
    pub fn remove_user(&mut self, client_id: ClientId) -> bool {
        let before = self.users.len();
        self.users.retain(|id| *id != client_id);
        self.users.len() != before
    }

    /// Get the number of members in the room
    pub fn user_count(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    pub fn is_owner(&self, username: &str) -> bool {
        self.owner.is(username)
    }

    pub fn is_admin(&self, username: &str) -> bool {
        self.admins.contains(username)
    }

    /// Privilege tier of `username` in this room
    pub fn role(&self, username: &str) -> Role {
        if self.is_owner(username) {
            Role::Owner
        } else if self.is_admin(username) {
            Role::Admin
        } else {
            Role::Member
        }
    }

    /// `username` followed by its role tag in this room
    pub fn tagged(&self, username: &str) -> String {
        format!("{}{}", username, self.role(username).tag())
    }

    /// Grant admin privilege
    ///
    /// Returns false if the user already was an admin.
    pub fn grant_admin(&mut self, username: &str) -> bool {
        self.admins.insert(username.to_string())
    }
}
