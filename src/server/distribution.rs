//! Room fan-out

use crate::message::ServerMessage;
use crate::types::{ClientId, RoomName};

use super::ChatServer;

impl ChatServer {
    /// Deliver `text` to every member of `rooms` not listed in `exclude`
    ///
    /// With a sender the line is prefixed by the sender's username and its
    /// role tag in each room; without one it goes out as a system notice.
    /// Blank text or an empty room list sends nothing and returns false.
    /// A failed delivery does not stop the fan-out; the recipient is
    /// terminated after the current event. Returns true when every
    /// delivery succeeded.
    pub fn distribute(
        &mut self,
        text: &str,
        rooms: &[RoomName],
        sender: Option<ClientId>,
        exclude: &[ClientId],
    ) -> bool {
        let text = text.trim();
        if text.is_empty() || rooms.is_empty() {
            return false;
        }

        let sender_name = match sender.and_then(|id| self.clients.get(&id)) {
            Some(client) => match &client.username {
                Some(username) => Some(username.clone()),
                None => unreachable!("unnamed client {} distributing chat", client.id),
            },
            None => None,
        };

        let mut deliveries = Vec::new();
        for name in rooms {
            let Some(room) = self.rooms.get(name) else {
                continue;
            };

            let line = match &sender_name {
                Some(username) => format!("{}: {}", room.tagged(username), text),
                None => text.to_string(),
            };

            for &member in room.users() {
                if !exclude.contains(&member) {
                    deliveries.push((member, line.clone()));
                }
            }
        }

        let mut delivered = true;
        for (member, line) in deliveries {
            delivered &= self.send(member, ServerMessage::Notice(line));
        }
        delivered
    }
}
