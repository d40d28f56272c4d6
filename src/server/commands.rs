//! Command handlers
//!
//! Each handler checks every precondition before touching state and
//! reports failures as a [`CommandError`]; the dispatcher sends the error
//! text back to the caller.

use tracing::info;

use crate::dispatch::CommandResult;
use crate::error::{CommandError, KickError};
use crate::message::ServerMessage;
use crate::room::{Owner, Role, Room};
use crate::types::{ClientId, RoomName};

use super::{ChatServer, FAREWELL};

/// Reject any argument for commands that take none
fn no_args(args: &[&str], usage: &'static str) -> CommandResult {
    if args.is_empty() {
        Ok(())
    } else {
        Err(CommandError::Usage(usage))
    }
}

/// Exactly one room name
fn room_arg<'a>(args: &[&'a str], usage: &'static str) -> Result<&'a str, CommandError> {
    match args {
        [] => Err(CommandError::Usage(usage)),
        [name] => Ok(*name),
        _ => Err(CommandError::RoomNameHasSpaces),
    }
}

impl ChatServer {
    /// Username and current room of the issuing client
    fn caller(&self, client_id: ClientId) -> Result<(String, Option<RoomName>), CommandError> {
        let client = self
            .clients
            .get(&client_id)
            .ok_or(CommandError::NotConnected)?;
        Ok((client.display_name().to_string(), client.room.clone()))
    }

    /// `/rooms`
    pub(crate) fn show_rooms(&mut self, client_id: ClientId, args: &[&str]) -> CommandResult {
        no_args(args, "/rooms")?;
        let (username, current) = self.caller(client_id)?;

        let mut listing = String::from("Available rooms:");
        for room in self.rooms.values() {
            listing.push_str(&format!("\n * {} ({})", room.name, room.user_count()));
            if room.is_admin(&username) {
                listing.push_str(" (admin)");
            }
            if room.is_owner(&username) {
                listing.push_str(" (owner)");
            }
            if current.as_ref() == Some(&room.name) {
                listing.push_str(" (current)");
            }
        }
        listing.push_str("\nEnd list");

        self.notify(client_id, listing);
        Ok(())
    }

    /// `/join <room>`
    pub(crate) fn join(&mut self, client_id: ClientId, args: &[&str]) -> CommandResult {
        let name = room_arg(args, "/join <room>")?;
        let (username, current) = self.caller(client_id)?;

        if let Some(current) = current {
            return Err(CommandError::AlreadyInRoom(current.to_string()));
        }

        let Some(room) = self.rooms.get_mut(name) else {
            return Err(CommandError::RoomNotFound(name.to_string()));
        };

        room.add_user(client_id);
        let room_name = room.name.clone();
        let joined = room.tagged(&username);

        if let Some(client) = self.clients.get_mut(&client_id) {
            client.enter_room(room_name.clone());
        }
        info!("'{}' joined room {}", username, room_name);

        self.distribute(
            &format!("{} joined the room", joined),
            &[room_name.clone()],
            None,
            &[client_id],
        );
        self.notify(client_id, format!("Joined the room: {}", room_name));

        self.who(client_id, &[])
    }

    /// `/who [room]`
    pub(crate) fn who(&mut self, client_id: ClientId, args: &[&str]) -> CommandResult {
        let (_, current) = self.caller(client_id)?;

        let target = match args {
            [] => current
                .map(|room| room.to_string())
                .ok_or(CommandError::NotInRoom)?,
            [name] => name.to_string(),
            _ => return Err(CommandError::RoomNameHasSpaces),
        };

        let Some(room) = self.rooms.get(target.as_str()) else {
            return Err(CommandError::RoomNotFound(target));
        };

        let listing = if room.is_empty() {
            format!("No users in: {}", room.name)
        } else {
            let mut listing = format!("Users in: {} ({})", room.name, room.user_count());
            for &member in room.users() {
                let Some(user) = self.clients.get(&member) else {
                    unreachable!("room {} lists unregistered client {}", room.name, member);
                };
                listing.push_str(&format!("\n * {}", room.tagged(user.display_name())));
                if member == client_id {
                    listing.push_str(" (you)");
                }
            }
            listing.push_str("\nEnd list");
            listing
        };

        self.notify(client_id, listing);
        Ok(())
    }

    /// `/leave`
    pub(crate) fn leave(&mut self, client_id: ClientId, args: &[&str]) -> CommandResult {
        no_args(args, "/leave")?;
        self.leave_current_room(client_id, true)
    }

    /// Take the caller out of its room and tell the remaining members
    fn leave_current_room(&mut self, client_id: ClientId, echo: bool) -> CommandResult {
        let Some(client) = self.clients.get_mut(&client_id) else {
            return Err(CommandError::NotConnected);
        };
        let Some(room_name) = client.leave_room() else {
            return Err(CommandError::NotInRoom);
        };
        let username = client.display_name().to_string();

        let room = self.room_mut(&room_name);
        room.remove_user(client_id);
        let departed = room.tagged(&username);
        info!("'{}' left room {}", username, room_name);

        self.distribute(
            &format!("{} left the room", departed),
            &[room_name.clone()],
            None,
            &[client_id],
        );
        if echo {
            self.notify(client_id, format!("Left the room: {}", room_name));
        }
        Ok(())
    }

    /// `/private <user> [message]`
    pub(crate) fn private(&mut self, client_id: ClientId, args: &[&str]) -> CommandResult {
        let Some((&target, body)) = args.split_first() else {
            return Err(CommandError::Usage("/private <user> <message>"));
        };
        let (username, _) = self.caller(client_id)?;

        if target == username {
            return Err(CommandError::PrivateToSelf);
        }
        let Some(&recipient) = self.usernames.get(target) else {
            return Err(CommandError::UserNotFound(target.to_string()));
        };

        // Nothing to deliver
        if body.is_empty() {
            self.send(client_id, ServerMessage::Prompt);
            return Ok(());
        }

        let line = format!("{} (private): {}", username, body.join(" "));
        self.notify(recipient, line.clone());
        self.notify(client_id, line);
        Ok(())
    }

    /// `/create <name>`
    ///
    /// The creator becomes the owner but does not join the room.
    pub(crate) fn create(&mut self, client_id: ClientId, args: &[&str]) -> CommandResult {
        let name = room_arg(args, "/create <name>")?;
        let (username, _) = self.caller(client_id)?;

        if self.rooms.contains_key(name) {
            return Err(CommandError::RoomExists(name.to_string()));
        }
        let room_name = RoomName::parse(name).ok_or(CommandError::RoomNameHasSpaces)?;

        self.rooms.insert(
            room_name.clone(),
            Room::new(room_name.clone(), Owner::User(username.clone())),
        );
        info!("'{}' created room {}", username, room_name);

        self.notify(client_id, format!("You created a room: {}", room_name));
        Ok(())
    }

    /// `/kick <user> ...` against the caller's current room
    pub(crate) fn kick(&mut self, client_id: ClientId, args: &[&str]) -> CommandResult {
        if args.is_empty() {
            return Err(CommandError::Usage("/kick <user1> <user2> ..."));
        }
        let (_, current) = self.caller(client_id)?;
        let room_name = current.ok_or(CommandError::NotInRoom)?;

        let targets: Vec<String> = args.iter().map(|arg| arg.to_string()).collect();
        self.kick_members(client_id, &room_name, &targets)
    }

    /// Kick each target in turn
    ///
    /// Rejected targets are reported individually and do not stop the
    /// batch; the result fails if any target was rejected.
    fn kick_members(
        &mut self,
        kicker_id: ClientId,
        room_name: &RoomName,
        targets: &[String],
    ) -> CommandResult {
        let (kicker, _) = self.caller(kicker_id)?;

        if !self.room_ref(room_name).role(&kicker).can_kick() {
            return Err(CommandError::CannotKickFrom(room_name.to_string()));
        }

        let mut failed = 0;
        for target in targets {
            if let Err(e) = self.kick_one(kicker_id, &kicker, room_name, target) {
                failed += 1;
                self.notify(kicker_id, e.to_string());
            }
        }

        if failed == 0 {
            Ok(())
        } else {
            Err(CommandError::KickIncomplete {
                failed,
                requested: targets.len(),
            })
        }
    }

    fn kick_one(
        &mut self,
        kicker_id: ClientId,
        kicker: &str,
        room_name: &RoomName,
        target: &str,
    ) -> Result<(), KickError> {
        let Some(&target_id) = self.usernames.get(target) else {
            return Err(KickError::NoSuchUser(target.to_string()));
        };

        let room = self.room_ref(room_name);
        if !room.contains(target_id) {
            return Err(KickError::NotInRoom(target.to_string()));
        }
        if target == kicker {
            return Err(KickError::SelfKick);
        }
        match room.role(target) {
            Role::Owner => return Err(KickError::Owner(target.to_string())),
            Role::Admin if room.role(kicker) != Role::Owner => {
                return Err(KickError::Admin(target.to_string()));
            }
            _ => {}
        }

        self.room_mut(room_name).remove_user(target_id);
        if let Some(client) = self.clients.get_mut(&target_id) {
            client.leave_room();
        }
        info!("'{}' kicked '{}' from room {}", kicker, target, room_name);

        self.notify(
            target_id,
            format!("You were kicked from the room: {}", room_name),
        );
        self.notify(kicker_id, format!("Kicked user: {}", target));
        self.distribute(
            &format!("{} was kicked from the room", target),
            &[room_name.clone()],
            None,
            &[kicker_id],
        );
        Ok(())
    }

    /// `/delete <name>`
    ///
    /// Kicks every non-owner member, removes the owner's own membership,
    /// then unregisters the room. Aborts if any kick fails.
    pub(crate) fn delete(&mut self, client_id: ClientId, args: &[&str]) -> CommandResult {
        let name = room_arg(args, "/delete <name>")?;
        let (username, _) = self.caller(client_id)?;

        let Some(room) = self.rooms.get(name) else {
            return Err(CommandError::RoomNotFound(name.to_string()));
        };
        if !room.is_owner(&username) {
            return Err(CommandError::CannotDelete(name.to_string()));
        }

        let room_name = room.name.clone();
        let owner = room.owner.to_string();
        let members: Vec<String> = room
            .users()
            .iter()
            .filter_map(|id| self.clients.get(id))
            .filter_map(|client| client.username.clone())
            .filter(|member| !room.is_owner(member))
            .collect();

        if !members.is_empty() && self.kick_members(client_id, &room_name, &members).is_err() {
            return Err(CommandError::DeleteAborted(room_name.to_string()));
        }

        if let Some(owner) = self.clients.get_mut(&client_id) {
            if owner.room.as_ref() == Some(&room_name) {
                owner.leave_room();
            }
        }
        self.room_mut(&room_name).remove_user(client_id);
        self.rooms.remove(&room_name);
        info!("Room {} of {} deleted", room_name, owner);

        self.notify(client_id, format!("Deleted room: {}", room_name));
        Ok(())
    }

    /// `/admin <user>`: owner grants kick privilege to a member
    pub(crate) fn grant_admin(&mut self, client_id: ClientId, args: &[&str]) -> CommandResult {
        let target = match args {
            [target] => *target,
            _ => return Err(CommandError::Usage("/admin <user>")),
        };
        let (username, current) = self.caller(client_id)?;
        let room_name = current.ok_or(CommandError::NotInRoom)?;

        let room = self.room_ref(&room_name);
        if !room.is_owner(&username) {
            return Err(CommandError::CannotGrantAdmin(room_name.to_string()));
        }
        let Some(&target_id) = self.usernames.get(target) else {
            return Err(CommandError::UserNotFound(target.to_string()));
        };
        if !room.contains(target_id) {
            return Err(CommandError::UserNotInRoom(target.to_string()));
        }
        if room.role(target) != Role::Member {
            return Err(CommandError::AlreadyPrivileged(target.to_string()));
        }

        self.room_mut(&room_name).grant_admin(target);
        info!("'{}' made '{}' an admin of room {}", username, target, room_name);

        self.notify(target_id, format!("You are now an admin of: {}", room_name));
        self.notify(client_id, format!("Granted admin to: {}", target));
        self.distribute(
            &format!("{} is now an admin", target),
            &[room_name],
            None,
            &[client_id, target_id],
        );
        Ok(())
    }

    /// `/quit`: leave any room, say goodbye and disconnect
    pub(crate) fn exit(&mut self, client_id: ClientId, args: &[&str]) -> CommandResult {
        no_args(args, "/quit")?;
        let (_, current) = self.caller(client_id)?;

        if current.is_some() {
            self.leave_current_room(client_id, false)?;
        }

        self.send(client_id, ServerMessage::Farewell(FAREWELL.to_string()));
        self.terminate(client_id);
        Ok(())
    }
}
