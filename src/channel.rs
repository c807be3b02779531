//! Channel and channel registry
//!
//! A channel is a named set of session names. The registry owns every
//! channel, including the default one every session starts in.

use std::collections::{HashMap, HashSet};

/// Chat channel ("room")
#[derive(Debug)]
pub struct Channel {
    /// Channel name
    pub name: String,
    /// Member session names
    members: HashSet<String>,
}

impl Channel {
    /// Create an empty channel
    pub fn new(name: String) -> Self {
        Self {
            name,
            members: HashSet::new(),
        }
    }

    /// Add a member. Returns false if already a member.
    pub fn add(&mut self, name: &str) -> bool {
        self.members.insert(name.to_string())
    }

    /// Remove a member. Returns false if not a member.
    pub fn remove(&mut self, name: &str) -> bool {
        self.members.remove(name)
    }

    /// Check if a session is in this channel
    pub fn contains(&self, name: &str) -> bool {
        self.members.contains(name)
    }

    /// Iterate members in no particular order
    pub fn members(&self) -> impl Iterator<Item = &str> {
        self.members.iter().map(String::as_str)
    }

    /// Member names, sorted
    pub fn member_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.members.iter().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// All channels by name
///
/// Channels live until the process exits, even when empty.
#[derive(Debug)]
pub struct ChannelRegistry {
    channels: HashMap<String, Channel>,
    default: String,
}

impl ChannelRegistry {
    /// Create a registry holding only the default channel
    pub fn new(default: impl Into<String>) -> Self {
        let default = default.into();
        let mut channels = HashMap::new();
        channels.insert(default.clone(), Channel::new(default.clone()));
        Self { channels, default }
    }

    /// Name of the default channel
    pub fn default_name(&self) -> &str {
        &self.default
    }

    pub fn contains(&self, name: &str) -> bool {
        self.channels.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&Channel> {
        self.channels.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Channel> {
        self.channels.get_mut(name)
    }

    /// Create `name` if it doesn't exist. Returns true if it was created.
    pub fn create(&mut self, name: &str) -> bool {
        if self.channels.contains_key(name) {
            return false;
        }
        self.channels
            .insert(name.to_string(), Channel::new(name.to_string()));
        true
    }

    /// Remove `member` from every channel; returns the channels it was in
    pub fn remove_member_everywhere(&mut self, member: &str) -> Vec<String> {
        self.channels
            .values_mut()
            .filter_map(|ch| ch.remove(member).then(|| ch.name.clone()))
            .collect()
    }

    /// Channel names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.channels.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }
}
