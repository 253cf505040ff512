//! Installation-wide hook policy

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::hook::{HookConfig, HookKind};
use crate::scope::RepositoryScope;

/// Which repositories a global policy applies to, by personal-ness
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PersonalRepoFilter {
    /// Every repository
    #[default]
    ApplyToAll,
    /// Personal repositories only
    OnlyPersonal,
    /// Non-personal repositories only
    ExcludePersonal,
}

impl PersonalRepoFilter {
    /// Map the host's numeric filter id
    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            0 => Some(Self::ApplyToAll),
            1 => Some(Self::OnlyPersonal),
            2 => Some(Self::ExcludePersonal),
            _ => None,
        }
    }

    /// Host numeric id of this filter
    pub fn id(self) -> u8 {
        match self {
            Self::ApplyToAll => 0,
            Self::OnlyPersonal => 1,
            Self::ExcludePersonal => 2,
        }
    }

    /// Whether a repository with the given personal flag passes the filter
    pub fn admits(self, personal: bool) -> bool {
        match self {
            Self::ApplyToAll => true,
            Self::OnlyPersonal => personal,
            Self::ExcludePersonal => !personal,
        }
    }
}

/// Global policy for one hook kind
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalPolicy {
    /// Hook kind this entry governs
    pub hook: HookKind,
    /// Whether the policy is switched on
    pub enabled: bool,
    /// Configuration installed where the policy applies
    pub config: HookConfig,
    /// Personal-repository filter
    pub filter: PersonalRepoFilter,
}

impl GlobalPolicy {
    /// Whether this policy covers the repository
    pub fn applies_to(&self, repository: &RepositoryScope) -> bool {
        self.enabled && self.filter.admits(repository.personal)
    }
}

/// A consistent snapshot of every global policy entry
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GlobalPolicies {
    entries: BTreeMap<HookKind, GlobalPolicy>,
}

impl GlobalPolicies {
    /// Empty snapshot: no global policy anywhere
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the entry for a hook kind
    pub fn insert(&mut self, policy: GlobalPolicy) {
        self.entries.insert(policy.hook, policy);
    }

    /// Entry for a hook kind, if one is configured
    pub fn get(&self, hook: HookKind) -> Option<&GlobalPolicy> {
        self.entries.get(&hook)
    }

    /// The entry for `hook` when it applies to the repository
    ///
    /// A hook kind without an entry never applies.
    pub fn applicable(&self, hook: HookKind, repository: &RepositoryScope) -> Option<&GlobalPolicy> {
        self.get(hook).filter(|policy| policy.applies_to(repository))
    }

    /// Whether the global policy for `hook` covers the repository
    pub fn applies_to(&self, hook: HookKind, repository: &RepositoryScope) -> bool {
        self.applicable(hook, repository).is_some()
    }

    /// Iterate entries in hook order
    pub fn iter(&self) -> impl Iterator<Item = &GlobalPolicy> {
        self.entries.values()
    }
}

impl FromIterator<GlobalPolicy> for GlobalPolicies {
    fn from_iter<T: IntoIterator<Item = GlobalPolicy>>(iter: T) -> Self {
        let mut policies = Self::new();
        for policy in iter {
            policies.insert(policy);
        }
        policies
    }
}
