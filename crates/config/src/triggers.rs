//! Trigger overrides per hook kind
//!
//! Each hook kind binds its artifacts to a set of host triggers. The defaults
//! come from [`HookKind::default_triggers`]; the `[triggers]` table may replace
//! them per kind.

use hookwarden_core::{HookKind, Trigger};
use serde::{Deserialize, Serialize};

/// `[triggers]` configuration section
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerSettings {
    /// Trigger ids for pre-receive hooks
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_receive: Option<Vec<String>>,

    /// Trigger ids for post-receive hooks
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_receive: Option<Vec<String>>,

    /// Trigger ids for merge checks
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merge_check: Option<Vec<String>>,
}

impl TriggerSettings {
    fn raw(&self, hook: HookKind) -> Option<&Vec<String>> {
        match hook {
            HookKind::PreReceive => self.pre_receive.as_ref(),
            HookKind::PostReceive => self.post_receive.as_ref(),
            HookKind::MergeCheck => self.merge_check.as_ref(),
        }
    }

    /// Triggers to bind for a hook kind
    ///
    /// Unknown ids are dropped with a warning. When nothing usable remains the
    /// kind's defaults apply.
    pub fn triggers_for(&self, hook: HookKind) -> Vec<Trigger> {
        let Some(ids) = self.raw(hook) else {
            return hook.default_triggers().to_vec();
        };

        let mut triggers = Vec::with_capacity(ids.len());
        for id in ids {
            match Trigger::from_id(id) {
                Some(trigger) if !triggers.contains(&trigger) => triggers.push(trigger),
                Some(_) => {}
                None => tracing::warn!(hook = %hook, trigger = %id, "Ignoring unknown trigger"),
            }
        }

        if triggers.is_empty() {
            tracing::debug!(hook = %hook, "No usable trigger override, using defaults");
            return hook.default_triggers().to_vec();
        }
        triggers
    }

    /// Replace the override for a hook kind
    pub fn set(&mut self, hook: HookKind, triggers: &[Trigger]) {
        let ids = Some(triggers.iter().map(|t| t.id().to_string()).collect());
        match hook {
            HookKind::PreReceive => self.pre_receive = ids,
            HookKind::PostReceive => self.post_receive = ids,
            HookKind::MergeCheck => self.merge_check = ids,
        }
    }
}
