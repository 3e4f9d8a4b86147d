//! Channel directory: the set of channels and their membership.

use std::sync::RwLock;

use chrono::Utc;

use legion_types::channel::{
    AutoModeDelay, Channel, ChannelId, ChannelKind, CreateChannelRequest, UpdateChannelRequest,
};
use legion_types::error::LegionError;

#[derive(Debug, Default)]
pub struct ChannelDirectory {
    channels: RwLock<Vec<Channel>>,
}

impl ChannelDirectory {
    pub fn new(channels: Vec<Channel>) -> Self {
        Self {
            channels: RwLock::new(channels),
        }
    }

    pub fn list(&self) -> Vec<Channel> {
        self.channels.read().expect("channel lock poisoned").clone()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.read().expect("channel lock poisoned").is_empty()
    }

    pub fn get(&self, id: &ChannelId) -> Result<Channel, LegionError> {
        self.channels
            .read()
            .expect("channel lock poisoned")
            .iter()
            .find(|c| &c.id == id)
            .cloned()
            .ok_or_else(|| LegionError::not_found("channel", id))
    }

    /// First system-log channel, where audit records are routed.
    pub fn system_log(&self) -> Option<ChannelId> {
        self.channels
            .read()
            .expect("channel lock poisoned")
            .iter()
            .find(|c| c.kind == ChannelKind::SystemLog)
            .map(|c| c.id)
    }

    pub fn add(
        &self,
        request: CreateChannelRequest,
        is_minion: impl Fn(&str) -> bool,
    ) -> Result<Channel, LegionError> {
        let name = validate_name(&request.name)?;
        let delay = request.auto_mode_delay.unwrap_or_default();
        delay.validate().map_err(LegionError::Validation)?;
        let members = normalize_members(request.kind, request.members, &is_minion)?;

        let channel = Channel {
            id: ChannelId::new(),
            name,
            description: request.description,
            kind: request.kind,
            members,
            auto_mode_active: false,
            auto_mode_delay: delay,
            created_at: Utc::now(),
        };
        self.channels
            .write()
            .expect("channel lock poisoned")
            .push(channel.clone());
        Ok(channel)
    }

    /// Apply a partial update. Switching away from the swarm kind turns autonomous mode off.
    pub fn update(
        &self,
        id: &ChannelId,
        request: UpdateChannelRequest,
        is_minion: impl Fn(&str) -> bool,
    ) -> Result<Channel, LegionError> {
        let name = request.name.as_deref().map(validate_name).transpose()?;
        if let Some(delay) = &request.auto_mode_delay {
            delay.validate().map_err(LegionError::Validation)?;
        }

        let mut channels = self.channels.write().expect("channel lock poisoned");
        let channel = channels
            .iter_mut()
            .find(|c| &c.id == id)
            .ok_or_else(|| LegionError::not_found("channel", id))?;

        let kind = request.kind.unwrap_or(channel.kind);
        let members = request.members.unwrap_or_else(|| channel.members.clone());
        let members = normalize_members(kind, members, &is_minion)?;

        if let Some(name) = name {
            channel.name = name;
        }
        if let Some(description) = request.description {
            channel.description = description;
        }
        if let Some(delay) = request.auto_mode_delay {
            channel.auto_mode_delay = delay;
        }
        channel.kind = kind;
        channel.members = members;
        if kind != ChannelKind::AutonomousSwarm {
            channel.auto_mode_active = false;
        }
        Ok(channel.clone())
    }

    pub fn remove(&self, id: &ChannelId) -> Result<Channel, LegionError> {
        let mut channels = self.channels.write().expect("channel lock poisoned");
        let index = channels
            .iter()
            .position(|c| &c.id == id)
            .ok_or_else(|| LegionError::not_found("channel", id))?;
        Ok(channels.remove(index))
    }

    pub fn set_auto_mode(&self, id: &ChannelId, active: bool) -> Result<Channel, LegionError> {
        let mut channels = self.channels.write().expect("channel lock poisoned");
        let channel = channels
            .iter_mut()
            .find(|c| &c.id == id)
            .ok_or_else(|| LegionError::not_found("channel", id))?;
        channel.auto_mode_active = active;
        Ok(channel.clone())
    }

    pub fn is_auto_active(&self, id: &ChannelId) -> bool {
        self.channels
            .read()
            .expect("channel lock poisoned")
            .iter()
            .any(|c| &c.id == id && c.auto_mode_active)
    }

    pub fn delay_of(&self, id: &ChannelId) -> Option<AutoModeDelay> {
        self.channels
            .read()
            .expect("channel lock poisoned")
            .iter()
            .find(|c| &c.id == id)
            .map(|c| c.auto_mode_delay)
    }

    /// Drop `name` from every member list. Returns whether anything changed.
    pub fn remove_member(&self, name: &str) -> bool {
        let mut changed = false;
        for channel in self.channels.write().expect("channel lock poisoned").iter_mut() {
            let before = channel.members.len();
            channel.members.retain(|m| m != name);
            changed |= channel.members.len() != before;
        }
        changed
    }

    pub fn rename_member(&self, from: &str, to: &str) -> bool {
        let mut changed = false;
        for channel in self.channels.write().expect("channel lock poisoned").iter_mut() {
            for member in channel.members.iter_mut().filter(|m| m.as_str() == from) {
                *member = to.to_string();
                changed = true;
            }
        }
        changed
    }
}

fn validate_name(name: &str) -> Result<String, LegionError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(LegionError::validation("channel name cannot be blank"));
    }
    Ok(name.to_string())
}

fn normalize_members(
    kind: ChannelKind,
    members: Vec<String>,
    is_minion: &impl Fn(&str) -> bool,
) -> Result<Vec<String>, LegionError> {
    if kind == ChannelKind::SystemLog {
        return Ok(Vec::new());
    }
    let mut normalized: Vec<String> = Vec::with_capacity(members.len());
    for member in members {
        let member = member.trim().to_string();
        if !is_minion(&member) {
            return Err(LegionError::validation(format!("unknown minion '{member}'")));
        }
        if !normalized.contains(&member) {
            normalized.push(member);
        }
    }
    Ok(normalized)
}
