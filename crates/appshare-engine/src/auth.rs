//! Pluggable authorization decisions.

use appshare_common::{ChannelTarget, SessionId, UserId};
use std::collections::HashSet;

use crate::process::InstanceSnapshot;

/// Answers who may launch, view and control what. Authentication happens
/// elsewhere; by the time a `UserId` reaches the engine it is trusted.
pub trait Authorizer: Send + Sync {
    fn can_launch(&self, _user: &UserId, _app: &str) -> bool {
        true
    }

    /// Control beyond ownership and session membership.
    fn can_control(&self, user: &UserId, instance: &InstanceSnapshot) -> bool {
        instance.owner == *user
    }

    /// Viewing without being the owner or a session participant.
    fn can_view(&self, user: &UserId, target: &ChannelTarget, owner: Option<&UserId>) -> bool {
        match target {
            ChannelTarget::LiveView => true,
            ChannelTarget::Instance(_) => owner == Some(user),
        }
    }

    /// May join `session` even when it does not allow guests.
    fn is_preauthorized(&self, _user: &UserId, _session: &SessionId) -> bool {
        false
    }
}

/// Owners control their own instances; everyone else goes through sessions.
#[derive(Debug, Default, Clone, Copy)]
pub struct OwnerPolicy;

impl Authorizer for OwnerPolicy {}

/// Fixed user lists on top of [`OwnerPolicy`].
#[derive(Debug, Default, Clone)]
pub struct StaticPolicy {
    /// Users allowed to launch; `None` means everyone.
    pub launchers: Option<HashSet<UserId>>,
    /// Users who may view and control every instance.
    pub admins: HashSet<UserId>,
    /// Users who may join guest-less sessions.
    pub preauthorized: HashSet<UserId>,
}

impl Authorizer for StaticPolicy {
    fn can_launch(&self, user: &UserId, _app: &str) -> bool {
        self.launchers
            .as_ref()
            .map(|set| set.contains(user))
            .unwrap_or(true)
    }

    fn can_control(&self, user: &UserId, instance: &InstanceSnapshot) -> bool {
        instance.owner == *user || self.admins.contains(user)
    }

    fn can_view(&self, user: &UserId, target: &ChannelTarget, owner: Option<&UserId>) -> bool {
        self.admins.contains(user) || OwnerPolicy.can_view(user, target, owner)
    }

    fn is_preauthorized(&self, user: &UserId, _session: &SessionId) -> bool {
        self.admins.contains(user) || self.preauthorized.contains(user)
    }
}
