//! Room records as held in the store, and the projection sent to clients.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::utils::sanitize::text_field;

pub const MAX_MESSAGES: usize = 100;
pub const NICKNAME_MAX: usize = 30;
pub const ROOM_NAME_MAX: usize = 100;
pub const MESSAGE_MAX: usize = 500;
/// Members not seen for longer than this are dropped from `users`.
pub const PRESENCE_WINDOW: i64 = 300;

/// Room expiry policy, seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub max_lifetime:   u64,
    pub max_inactivity: u64,
}

impl Default for Limits {
    fn default() -> Self {
        Self { max_lifetime: 86_400, max_inactivity: 21_600 }
    }
}

impl Limits {
    pub fn lifetime(&self) -> i64 {
        i64::try_from(self.max_lifetime).unwrap_or(i64::MAX)
    }

    pub fn inactivity(&self) -> i64 {
        i64::try_from(self.max_inactivity).unwrap_or(i64::MAX)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub nickname:  String,
    pub joined:    i64,
    pub last_seen: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    System { message: String, time: i64 },
    User { client_id: String, nickname: String, message: String, time: i64 },
}

impl Message {
    pub fn time(&self) -> i64 {
        match self {
            Message::System { time, .. } | Message::User { time, .. } => *time,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Room {
    pub code:          String,
    pub name:          String,
    pub created:       i64,
    pub last_activity: i64,
    pub messages:      Vec<Message>,
    pub users:         HashMap<String, User>,
    pub creator_ip:    String,
}

impl Room {
    pub fn new(code: String, name: String, client_id: String, nickname: String, creator_ip: String, now: i64) -> Self {
        let mut users = HashMap::new();
        users.insert(client_id, User { nickname, joined: now, last_seen: now });
        Self {
            code,
            name,
            created: now,
            last_activity: now,
            messages: Vec::new(),
            users,
            creator_ip,
        }
    }

    pub fn is_member(&self, client_id: &str) -> bool {
        self.users.contains_key(client_id)
    }

    /// Silent past the inactivity window or older than the absolute lifetime.
    pub fn is_expired(&self, now: i64, limits: Limits) -> bool {
        now - self.last_activity > limits.inactivity() || now - self.created >= limits.lifetime()
    }

    /// Adds `client_id` with a join notice; returns false for an existing member.
    pub fn admit(&mut self, client_id: &str, nickname: &str, now: i64) -> bool {
        if self.is_member(client_id) {
            return false;
        }
        self.users.insert(
            client_id.to_owned(),
            User { nickname: nickname.to_owned(), joined: now, last_seen: now },
        );
        self.push(Message::System { message: format!("{nickname} joined"), time: now });
        true
    }

    /// Refreshes room activity and the member's presence. False if not a member.
    pub fn touch(&mut self, client_id: &str, now: i64) -> bool {
        let Some(user) = self.users.get_mut(client_id) else { return false };
        user.last_seen = now;
        self.last_activity = now;
        true
    }

    /// Appends a chat line under the member's current nickname.
    pub fn post(&mut self, client_id: &str, message: String, now: i64) -> bool {
        let Some(nickname) = self.users.get(client_id).map(|u| u.nickname.clone()) else {
            return false;
        };
        self.push(Message::User { client_id: client_id.to_owned(), nickname, message, time: now });
        true
    }

    /// Appends and drops the oldest entries beyond [`MAX_MESSAGES`].
    pub fn push(&mut self, msg: Message) {
        self.messages.push(msg);
        if self.messages.len() > MAX_MESSAGES {
            let excess = self.messages.len() - MAX_MESSAGES;
            self.messages.drain(..excess);
        }
    }

    /// Removes members not seen within `window`; returns how many went.
    pub fn prune_absent(&mut self, now: i64, window: i64) -> usize {
        let before = self.users.len();
        self.users.retain(|_, u| now - u.last_seen <= window);
        before - self.users.len()
    }

    pub fn view(&self) -> RoomView {
        RoomView {
            code:          self.code.clone(),
            name:          text_field(&self.name),
            created:       self.created,
            last_activity: self.last_activity,
            messages:      self.messages.iter().map(MessageView::from).collect(),
            users:         self
                .users
                .iter()
                .map(|(id, u)| (id.clone(), UserView::from(u)))
                .collect(),
        }
    }
}

/* ------------ projection sent across the boundary ------------ */

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomView {
    pub code:          String,
    pub name:          String,
    pub created:       i64,
    pub last_activity: i64,
    pub messages:      Vec<MessageView>,
    pub users:         BTreeMap<String, UserView>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MessageView {
    System { message: String, time: i64 },
    User { nickname: String, message: String, time: i64 },
}

impl MessageView {
    pub fn time(&self) -> i64 {
        match self {
            MessageView::System { time, .. } | MessageView::User { time, .. } => *time,
        }
    }

    pub fn text(&self) -> &str {
        match self {
            MessageView::System { message, .. } | MessageView::User { message, .. } => message,
        }
    }
}

impl From<&Message> for MessageView {
    fn from(m: &Message) -> Self {
        match m {
            Message::System { message, time } => MessageView::System {
                message: text_field(message),
                time:    *time,
            },
            Message::User { nickname, message, time, .. } => MessageView::User {
                nickname: text_field(nickname),
                message:  text_field(message),
                time:     *time,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserView {
    pub nickname:  String,
    pub joined:    i64,
    pub last_seen: i64,
}

impl From<&User> for UserView {
    fn from(u: &User) -> Self {
        Self { nickname: text_field(&u.nickname), joined: u.joined, last_seen: u.last_seen }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn room(now: i64) -> Room {
        Room::new("c".repeat(20), "lobby".into(), "alice".into(), "Alice".into(), "1.1.1.1".into(), now)
    }

    #[test]
    fn keeps_latest_hundred_in_order() {
        let mut r = room(0);
        for i in 0..105 {
            r.push(Message::System { message: i.to_string(), time: i });
        }
        assert_eq!(r.messages.len(), MAX_MESSAGES);
        assert_eq!(r.messages.first().map(Message::time), Some(5));
        assert_eq!(r.messages.last().map(Message::time), Some(104));
    }

    #[test]
    fn admit_is_idempotent() {
        let mut r = room(10);
        assert!(r.admit("bob", "Bob", 11));
        assert!(!r.admit("bob", "Bob", 12));
        assert_eq!(r.users.len(), 2);
        assert_eq!(r.messages.len(), 1);
    }

    #[test]
    fn prune_drops_stale_members_only() {
        let mut r = room(0);
        r.admit("bob", "Bob", 100);
        assert_eq!(r.prune_absent(301, PRESENCE_WINDOW), 1);
        assert!(!r.is_member("alice"));
        assert!(r.is_member("bob"));
    }

    #[test]
    fn expiry_covers_inactivity_and_lifetime() {
        let limits = Limits { max_lifetime: 1_000, max_inactivity: 100 };
        let mut r = room(0);
        assert!(!r.is_expired(100, limits));
        assert!(r.is_expired(101, limits));

        r.touch("alice", 950);
        assert!(!r.is_expired(999, limits));
        assert!(r.is_expired(1_000, limits));
    }

    #[test]
    fn oversized_limits_never_expire_a_fresh_room() {
        let limits = Limits { max_lifetime: u64::MAX, max_inactivity: u64::MAX };
        let r = room(0);
        assert!(!r.is_expired(0, limits));
        assert!(!r.is_expired(1_000_000, limits));
    }

    #[test]
    fn view_hides_sender_ids_and_tags_messages() {
        let mut r = room(0);
        r.post("alice", "hi".into(), 5);
        let v = r.view();
        let json = serde_json::to_value(&v).unwrap();
        assert_eq!(json["messages"][0]["type"], "user");
        assert_eq!(json["messages"][0]["nickname"], "Alice");
        assert!(json["messages"][0].get("client_id").is_none());
        assert_eq!(json["users"]["alice"]["joined"], 0);
    }
}
