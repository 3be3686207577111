//! Authoritative room membership and metadata.
//!
//! The registry is the leaf of the realtime core: it holds no references to
//! the broadcast hub or the stores. Mutating operations return outcome
//! structs (`newly_joined`, `was_member`, deletion snapshots) so the caller
//! can compose side effects — system notices, fan-out, cascades — in
//! write-then-fanout order.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use parking_lot::Mutex;
use rand::Rng;

use lyceum_common::id::{prefix, prefixed_ulid};

use crate::models::room::{Language, Room, RoomKind, Visibility};

/// Maximum length accepted for a room name.
const MAX_NAME_LEN: usize = 100;

/// Invite codes are short uppercase-alphanumeric tokens, e.g. `7QZ3K1`.
const INVITE_CODE_LEN: usize = 6;
const INVITE_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    Validation(&'static str),
    NotFound,
    Forbidden(&'static str),
}

/// Result of a join: the room as the joiner now sees it, and whether the
/// membership actually grew (first join vs. reconnect/no-op).
#[derive(Debug)]
pub struct JoinOutcome {
    pub room: Room,
    pub newly_joined: bool,
}

pub struct LeaveOutcome {
    pub room: Room,
    pub was_member: bool,
}

struct RoomEntry {
    id: String,
    kind: RoomKind,
    name: String,
    visibility: Visibility,
    invite_code: Option<String>,
    owner_id: String,
    members: HashSet<String>,
    language: Option<Language>,
    created_at: DateTime<Utc>,
}

impl RoomEntry {
    /// Render a snapshot for one viewer. Only the owner sees the invite code.
    fn snapshot(&self, viewer: &str) -> Room {
        let mut members: Vec<String> = self.members.iter().cloned().collect();
        members.sort();
        Room {
            id: self.id.clone(),
            kind: self.kind,
            name: self.name.clone(),
            visibility: self.visibility,
            invite_code: if viewer == self.owner_id {
                self.invite_code.clone()
            } else {
                None
            },
            owner_id: self.owner_id.clone(),
            members,
            language: self.language,
            created_at: self.created_at,
        }
    }
}

/// Shared registry of all rooms.
///
/// `DashMap` for shard-level concurrency and `parking_lot::Mutex` per entry
/// for non-poisoning, fast locking. Invite codes are indexed separately to
/// keep them unique across rooms.
pub struct RoomRegistry {
    rooms: DashMap<String, Mutex<RoomEntry>>,
    invite_codes: DashMap<String, String>,
}

impl RoomRegistry {
    pub fn new() -> Self {
        Self {
            rooms: DashMap::new(),
            invite_codes: DashMap::new(),
        }
    }

    /// Create a room with the owner as sole initial member. Private rooms
    /// get a freshly claimed invite code.
    pub fn create_room(
        &self,
        kind: RoomKind,
        name: &str,
        visibility: Visibility,
        owner_id: &str,
        language: Option<Language>,
    ) -> Result<Room, RegistryError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(RegistryError::Validation("Room name is required"));
        }
        if name.len() > MAX_NAME_LEN {
            return Err(RegistryError::Validation(
                "Room name must be 100 characters or fewer",
            ));
        }

        let id = prefixed_ulid(prefix::ROOM);
        let invite_code = match visibility {
            Visibility::Private => Some(self.claim_invite_code(&id)),
            Visibility::Public => None,
        };

        let entry = RoomEntry {
            id: id.clone(),
            kind,
            name: name.to_string(),
            visibility,
            invite_code,
            owner_id: owner_id.to_string(),
            members: HashSet::from([owner_id.to_string()]),
            language: match kind {
                RoomKind::Code => Some(language.unwrap_or_default()),
                RoomKind::Chat => None,
            },
            created_at: Utc::now(),
        };
        let snapshot = entry.snapshot(owner_id);
        self.rooms.insert(id, Mutex::new(entry));
        Ok(snapshot)
    }

    /// Add a participant to a room. Idempotent: joining a room you are
    /// already in succeeds without touching membership. Private rooms
    /// require the invite code for non-members.
    pub fn join(
        &self,
        room_id: &str,
        user_id: &str,
        code: Option<&str>,
    ) -> Result<JoinOutcome, RegistryError> {
        let entry = self.rooms.get(room_id).ok_or(RegistryError::NotFound)?;
        let mut room = entry.lock();

        if room.members.contains(user_id) {
            return Ok(JoinOutcome {
                room: room.snapshot(user_id),
                newly_joined: false,
            });
        }

        if room.visibility == Visibility::Private {
            match code {
                None => return Err(RegistryError::Forbidden("An invite code is required")),
                Some(code) if room.invite_code.as_deref() != Some(code) => {
                    return Err(RegistryError::Forbidden("Invalid invite code"))
                }
                Some(_) => {}
            }
        }

        room.members.insert(user_id.to_string());
        Ok(JoinOutcome {
            room: room.snapshot(user_id),
            newly_joined: true,
        })
    }

    /// Remove a participant. Idempotent when they were not a member.
    pub fn leave(&self, room_id: &str, user_id: &str) -> Result<LeaveOutcome, RegistryError> {
        let entry = self.rooms.get(room_id).ok_or(RegistryError::NotFound)?;
        let mut room = entry.lock();
        let was_member = room.members.remove(user_id);
        Ok(LeaveOutcome {
            room: room.snapshot(user_id),
            was_member,
        })
    }

    /// Delete a room. Owner-only. Returns the final snapshot (members
    /// included) so the caller can run the cascade: purge the message log
    /// and document, then force-evict live subscribers.
    pub fn delete(&self, room_id: &str, requester_id: &str) -> Result<Room, RegistryError> {
        {
            let entry = self.rooms.get(room_id).ok_or(RegistryError::NotFound)?;
            let room = entry.lock();
            if room.owner_id != requester_id {
                return Err(RegistryError::Forbidden(
                    "Only the room owner can delete it",
                ));
            }
        }

        let (_, entry) = self.rooms.remove(room_id).ok_or(RegistryError::NotFound)?;
        let room = entry.into_inner();
        if let Some(code) = &room.invite_code {
            self.invite_codes.remove(code);
        }
        Ok(room.snapshot(requester_id))
    }

    /// Fetch a snapshot. Private rooms are only visible to their members.
    pub fn get(&self, room_id: &str, viewer_id: &str) -> Result<Room, RegistryError> {
        let entry = self.rooms.get(room_id).ok_or(RegistryError::NotFound)?;
        let room = entry.lock();
        if room.visibility == Visibility::Private && !room.members.contains(viewer_id) {
            return Err(RegistryError::Forbidden("Not a member of this room"));
        }
        Ok(room.snapshot(viewer_id))
    }

    pub fn is_member(&self, room_id: &str, user_id: &str) -> Result<bool, RegistryError> {
        let entry = self.rooms.get(room_id).ok_or(RegistryError::NotFound)?;
        let room = entry.lock();
        Ok(room.members.contains(user_id))
    }

    /// All public rooms plus private rooms the participant belongs to,
    /// oldest first.
    pub fn visible_to(&self, user_id: &str) -> Vec<Room> {
        let mut rooms: Vec<Room> = self
            .rooms
            .iter()
            .filter_map(|entry| {
                let room = entry.lock();
                if room.visibility == Visibility::Public || room.members.contains(user_id) {
                    Some(room.snapshot(user_id))
                } else {
                    None
                }
            })
            .collect();
        rooms.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        rooms
    }

    /// Generate an invite code and claim it in the cross-room index,
    /// retrying on the (unlikely) collision.
    fn claim_invite_code(&self, room_id: &str) -> String {
        loop {
            let code = generate_invite_code();
            match self.invite_codes.entry(code.clone()) {
                Entry::Vacant(slot) => {
                    slot.insert(room_id.to_string());
                    return code;
                }
                Entry::Occupied(_) => continue,
            }
        }
    }
}

impl Default for RoomRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn generate_invite_code() -> String {
    let mut rng = rand::thread_rng();
    (0..INVITE_CODE_LEN)
        .map(|_| {
            let idx = rng.gen_range(0..INVITE_CHARSET.len());
            INVITE_CHARSET[idx] as char
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry_with_public_room() -> (RoomRegistry, String) {
        let registry = RoomRegistry::new();
        let room = registry
            .create_room(RoomKind::Chat, "Study Hall", Visibility::Public, "usr_owner", None)
            .unwrap();
        (registry, room.id)
    }

    fn registry_with_private_room() -> (RoomRegistry, String, String) {
        let registry = RoomRegistry::new();
        let room = registry
            .create_room(RoomKind::Chat, "Algebra", Visibility::Private, "usr_owner", None)
            .unwrap();
        let code = room.invite_code.clone().unwrap();
        (registry, room.id, code)
    }

    #[test]
    fn create_room_sets_owner_as_sole_member() {
        let (registry, room_id) = registry_with_public_room();
        let room = registry.get(&room_id, "usr_owner").unwrap();
        assert_eq!(room.members, vec!["usr_owner".to_string()]);
        assert_eq!(room.owner_id, "usr_owner");
        assert!(room.invite_code.is_none());
    }

    #[test]
    fn create_room_rejects_empty_name() {
        let registry = RoomRegistry::new();
        let err = registry
            .create_room(RoomKind::Chat, "   ", Visibility::Public, "usr_a", None)
            .unwrap_err();
        assert!(matches!(err, RegistryError::Validation(_)));
    }

    #[test]
    fn private_room_gets_invite_code_in_expected_format() {
        let (_registry, _room_id, code) = registry_with_private_room();
        assert_eq!(code.len(), INVITE_CODE_LEN);
        assert!(code
            .bytes()
            .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit()));
    }

    #[test]
    fn invite_codes_are_unique_across_rooms() {
        let registry = RoomRegistry::new();
        let mut codes = std::collections::HashSet::new();
        for i in 0..50 {
            let room = registry
                .create_room(
                    RoomKind::Chat,
                    &format!("room {i}"),
                    Visibility::Private,
                    "usr_a",
                    None,
                )
                .unwrap();
            assert!(codes.insert(room.invite_code.unwrap()));
        }
    }

    #[test]
    fn code_room_defaults_language_to_plaintext() {
        let registry = RoomRegistry::new();
        let room = registry
            .create_room(RoomKind::Code, "Rustaceans", Visibility::Public, "usr_a", None)
            .unwrap();
        assert_eq!(room.language, Some(Language::Plaintext));

        let chat = registry
            .create_room(RoomKind::Chat, "Lounge", Visibility::Public, "usr_a", None)
            .unwrap();
        assert_eq!(chat.language, None);
    }

    #[test]
    fn join_public_room_is_idempotent() {
        let (registry, room_id) = registry_with_public_room();

        let first = registry.join(&room_id, "usr_b", None).unwrap();
        assert!(first.newly_joined);
        assert!(first.room.members.contains(&"usr_b".to_string()));

        let second = registry.join(&room_id, "usr_b", None).unwrap();
        assert!(!second.newly_joined);
        // Still exactly one occurrence.
        let count = second
            .room
            .members
            .iter()
            .filter(|m| m.as_str() == "usr_b")
            .count();
        assert_eq!(count, 1);
    }

    #[test]
    fn join_unknown_room_is_not_found() {
        let registry = RoomRegistry::new();
        assert_eq!(
            registry.join("room_missing", "usr_a", None).unwrap_err(),
            RegistryError::NotFound
        );
    }

    #[test]
    fn private_join_requires_matching_code() {
        let (registry, room_id, code) = registry_with_private_room();

        let err = registry.join(&room_id, "usr_b", Some("WRONG1")).unwrap_err();
        assert!(matches!(err, RegistryError::Forbidden(_)));

        let err = registry.join(&room_id, "usr_b", None).unwrap_err();
        assert!(matches!(err, RegistryError::Forbidden(_)));

        let outcome = registry.join(&room_id, "usr_b", Some(&code)).unwrap();
        assert!(outcome.newly_joined);
        assert!(outcome.room.members.contains(&"usr_b".to_string()));
    }

    #[test]
    fn private_rejoin_needs_no_code() {
        let (registry, room_id, code) = registry_with_private_room();
        registry.join(&room_id, "usr_b", Some(&code)).unwrap();

        let outcome = registry.join(&room_id, "usr_b", None).unwrap();
        assert!(!outcome.newly_joined);
    }

    #[test]
    fn leave_is_idempotent() {
        let (registry, room_id) = registry_with_public_room();
        registry.join(&room_id, "usr_b", None).unwrap();

        let first = registry.leave(&room_id, "usr_b").unwrap();
        assert!(first.was_member);
        assert!(!first.room.members.contains(&"usr_b".to_string()));

        let second = registry.leave(&room_id, "usr_b").unwrap();
        assert!(!second.was_member);
    }

    #[test]
    fn delete_requires_owner() {
        let (registry, room_id) = registry_with_public_room();
        registry.join(&room_id, "usr_b", None).unwrap();

        let err = registry.delete(&room_id, "usr_b").unwrap_err();
        assert!(matches!(err, RegistryError::Forbidden(_)));

        let room = registry.delete(&room_id, "usr_owner").unwrap();
        assert_eq!(room.members.len(), 2);
        assert_eq!(
            registry.get(&room_id, "usr_owner").unwrap_err(),
            RegistryError::NotFound
        );
    }

    #[test]
    fn delete_releases_invite_code() {
        let (registry, room_id, code) = registry_with_private_room();
        registry.delete(&room_id, "usr_owner").unwrap();
        assert!(!registry.invite_codes.contains_key(&code));
    }

    #[test]
    fn visible_to_includes_public_and_own_private_rooms() {
        let registry = RoomRegistry::new();
        let public = registry
            .create_room(RoomKind::Chat, "Open", Visibility::Public, "usr_a", None)
            .unwrap();
        let private_a = registry
            .create_room(RoomKind::Chat, "Secret A", Visibility::Private, "usr_a", None)
            .unwrap();
        registry
            .create_room(RoomKind::Chat, "Secret B", Visibility::Private, "usr_b", None)
            .unwrap();

        let visible: Vec<String> = registry
            .visible_to("usr_a")
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert!(visible.contains(&public.id));
        assert!(visible.contains(&private_a.id));
        assert_eq!(visible.len(), 2);
    }

    #[test]
    fn invite_code_is_redacted_for_non_owners() {
        let (registry, room_id, code) = registry_with_private_room();
        let outcome = registry.join(&room_id, "usr_b", Some(&code)).unwrap();
        assert!(outcome.room.invite_code.is_none());

        let owner_view = registry.get(&room_id, "usr_owner").unwrap();
        assert_eq!(owner_view.invite_code.as_deref(), Some(code.as_str()));
    }

    #[test]
    fn private_room_snapshot_hidden_from_non_members() {
        let (registry, room_id, _code) = registry_with_private_room();
        let err = registry.get(&room_id, "usr_stranger").unwrap_err();
        assert!(matches!(err, RegistryError::Forbidden(_)));
    }
}
