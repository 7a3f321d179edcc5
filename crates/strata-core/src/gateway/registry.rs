//! # Agent Registry
//!
//! Credentials and permissions of registered agents.
//!
//! Secrets are never stored; the registry keeps a BLAKE3 digest and compares
//! digests in constant time.

use crate::{AgentId, Permission, StrataError};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use subtle::ConstantTimeEq;

/// A registered agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentCredential {
    pub agent_id: AgentId,
    secret_digest: [u8; 32],
    pub permissions: BTreeSet<Permission>,
    pub active: bool,
}

/// Public view of a credential.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentSummary {
    pub agent_id: AgentId,
    pub permissions: BTreeSet<Permission>,
    pub active: bool,
}

impl From<&AgentCredential> for AgentSummary {
    fn from(credential: &AgentCredential) -> Self {
        Self {
            agent_id: credential.agent_id.clone(),
            permissions: credential.permissions.clone(),
            active: credential.active,
        }
    }
}

fn digest(secret: &str) -> [u8; 32] {
    *blake3::hash(secret.as_bytes()).as_bytes()
}

/// Permissions granted when a registration names none.
#[must_use]
pub fn default_permissions() -> BTreeSet<Permission> {
    [Permission::Read, Permission::WriteStaging].into()
}

#[derive(Debug, Default)]
pub struct Registry {
    agents: BTreeMap<AgentId, AgentCredential>,
}

impl Registry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or re-register) an agent. Returns `true` for a new agent,
    /// `false` when an existing credential was replaced.
    pub fn register(
        &mut self,
        agent_id: AgentId,
        secret: &str,
        permissions: &[Permission],
    ) -> Result<bool, StrataError> {
        if secret.is_empty() {
            return Err(StrataError::InvalidIdentifier(
                "agent secret must not be empty".to_string(),
            ));
        }
        let permissions = if permissions.is_empty() {
            default_permissions()
        } else {
            permissions.iter().copied().collect()
        };
        let credential = AgentCredential {
            agent_id: agent_id.clone(),
            secret_digest: digest(secret),
            permissions,
            active: true,
        };
        Ok(self.agents.insert(agent_id, credential).is_none())
    }

    /// Deactivate an agent. Returns `false` if it is unknown.
    pub fn deactivate(&mut self, agent_id: &AgentId) -> bool {
        match self.agents.get_mut(agent_id) {
            Some(credential) => {
                credential.active = false;
                true
            }
            None => false,
        }
    }

    /// Check a secret. Unknown and inactive agents never authenticate.
    #[must_use]
    pub fn authenticate(&self, agent_id: &AgentId, secret: &str) -> bool {
        let Some(credential) = self.agents.get(agent_id) else {
            return false;
        };
        let matches: bool = digest(secret).ct_eq(&credential.secret_digest).into();
        matches && credential.active
    }

    /// Check that an agent may perform an operation needing `permission`.
    ///
    /// Every operation also needs `Read`.
    pub fn authorize(&self, agent_id: &AgentId, permission: Permission) -> Result<(), String> {
        let credential = self
            .agents
            .get(agent_id)
            .ok_or_else(|| format!("unknown agent '{agent_id}'"))?;
        if !credential.active {
            return Err(format!("agent '{agent_id}' is inactive"));
        }
        for needed in [Permission::Read, permission] {
            if !credential.permissions.contains(&needed) {
                return Err(format!(
                    "agent '{agent_id}' lacks the '{}' permission",
                    needed.as_str()
                ));
            }
        }
        Ok(())
    }

    #[must_use]
    pub fn get(&self, agent_id: &AgentId) -> Option<AgentSummary> {
        self.agents.get(agent_id).map(AgentSummary::from)
    }

    #[must_use]
    pub fn list(&self) -> Vec<AgentSummary> {
        self.agents.values().map(AgentSummary::from).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agent(name: &str) -> AgentId {
        AgentId::new(name).expect("agent id")
    }

    #[test]
    fn register_then_authenticate() {
        let mut registry = Registry::new();
        assert!(registry.register(agent("a1"), "s3cret", &[]).expect("register"));
        assert!(registry.authenticate(&agent("a1"), "s3cret"));
        assert!(!registry.authenticate(&agent("a1"), "s3cre"));
        assert!(!registry.authenticate(&agent("nobody"), "s3cret"));
    }

    #[test]
    fn empty_permissions_grant_read_and_staging() {
        let mut registry = Registry::new();
        registry.register(agent("a1"), "k", &[]).expect("register");
        let summary = registry.get(&agent("a1")).expect("registered");
        assert_eq!(summary.permissions, default_permissions());
        assert!(registry.authorize(&agent("a1"), Permission::WriteStaging).is_ok());
        let err = registry
            .authorize(&agent("a1"), Permission::WriteConsensus)
            .expect_err("no consensus permission");
        assert!(err.contains("write_consensus"));
    }

    #[test]
    fn read_is_always_required() {
        let mut registry = Registry::new();
        registry
            .register(agent("w"), "k", &[Permission::WriteStaging])
            .expect("register");
        assert!(registry.authorize(&agent("w"), Permission::WriteStaging).is_err());
    }

    #[test]
    fn deactivated_agent_is_locked_out() {
        let mut registry = Registry::new();
        registry.register(agent("a1"), "k", &[]).expect("register");
        assert!(registry.deactivate(&agent("a1")));
        assert!(!registry.authenticate(&agent("a1"), "k"));
        assert!(registry.authorize(&agent("a1"), Permission::Read).is_err());
        assert!(!registry.deactivate(&agent("ghost")));
    }

    #[test]
    fn re_registration_replaces_secret() {
        let mut registry = Registry::new();
        registry.register(agent("a1"), "old", &[]).expect("register");
        assert!(!registry.register(agent("a1"), "new", &[]).expect("re-register"));
        assert!(!registry.authenticate(&agent("a1"), "old"));
        assert!(registry.authenticate(&agent("a1"), "new"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn empty_secret_rejected() {
        let mut registry = Registry::new();
        assert!(registry.register(agent("a1"), "", &[]).is_err());
        assert!(registry.is_empty());
    }
}
