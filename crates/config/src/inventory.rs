//! File-backed host description
//!
//! Describes the projects, users and repositories of a host together with the
//! hook settings stored at each project and repository. A hook table present at
//! a scope is that scope's own setting; an absent table means the scope
//! inherits.
//!
//! ```toml
//! [[projects]]
//! id = 1
//! key = "TEAM"
//!
//! [projects.hooks.pre-receive]
//! enabled = true
//! exe = "/opt/hooks/check"
//!
//! [[projects.repositories]]
//! id = 10
//! slug = "app"
//!
//! [[users]]
//! name = "alice"
//! id = 100
//!
//! [[users.repositories]]
//! id = 20
//! slug = "scratch"
//! ```

use hookwarden_core::{
    Error, HookConfig, HookConfigStore, HookKind, HookStatus, Inventory, Page, PageRequest,
    ProjectScope, RepositoryId, RepositoryScope, Result, Scope, ScopeType,
};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Hook setting stored at one scope
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HookSetting {
    /// Whether the hook is enabled at this scope
    #[serde(default)]
    pub enabled: bool,

    /// Executable; a setting without one has no stored configuration
    #[serde(default)]
    pub exe: Option<String>,

    /// Arguments
    #[serde(default)]
    pub params: Vec<String>,

    /// Run without blocking
    #[serde(default, rename = "async")]
    pub run_async: bool,

    /// Resolve the executable under the sandboxed hooks directory
    #[serde(default)]
    pub safe_path: bool,
}

impl HookSetting {
    fn config(&self) -> Option<HookConfig> {
        self.exe.as_ref().map(|exe| HookConfig {
            executable_path: exe.clone(),
            arguments: self.params.clone(),
            run_async: self.run_async,
            safe_mode: self.safe_path,
        })
    }
}

type HookTables = IndexMap<String, HookSetting>;

#[derive(Debug, Clone, Deserialize)]
struct RepositoryEntry {
    id: u64,
    slug: String,
    #[serde(default)]
    hooks: HookTables,
}

#[derive(Debug, Clone, Deserialize)]
struct ProjectEntry {
    id: u64,
    key: String,
    #[serde(default)]
    hooks: HookTables,
    #[serde(default)]
    repositories: Vec<RepositoryEntry>,
}

#[derive(Debug, Clone, Deserialize)]
struct UserEntry {
    name: String,
    /// Id of the user's personal project
    id: u64,
    #[serde(default)]
    repositories: Vec<RepositoryEntry>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct InventoryFile {
    #[serde(default)]
    projects: Vec<ProjectEntry>,
    #[serde(default)]
    users: Vec<UserEntry>,
}

/// Host inventory and hook settings loaded from a TOML file
#[derive(Debug, Default)]
pub struct HostInventory {
    projects: Vec<ProjectScope>,
    project_repositories: HashMap<String, Vec<RepositoryScope>>,
    users: Vec<String>,
    personal_repositories: HashMap<String, Vec<RepositoryScope>>,
    project_hooks: HashMap<String, HashMap<HookKind, HookSetting>>,
    repository_hooks: HashMap<RepositoryId, HashMap<HookKind, HookSetting>>,
}

/// Key of a user's personal project
pub fn personal_project_key(user: &str) -> String {
    format!("~{}", user.to_uppercase())
}

fn parse_hook_tables(tables: HookTables, owner: &str) -> HashMap<HookKind, HookSetting> {
    let mut hooks = HashMap::new();
    for (name, setting) in tables {
        match name.parse::<HookKind>() {
            Ok(hook) => {
                hooks.insert(hook, setting);
            }
            Err(_) => tracing::warn!(scope = %owner, table = %name, "Ignoring settings for unknown hook"),
        }
    }
    hooks
}

impl HostInventory {
    /// Load from a file; a missing file is an empty host
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No inventory file");
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path).map_err(|e| {
            Error::StoreUnavailable(format!("Failed to read inventory {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parse an inventory document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: InventoryFile = toml::from_str(content)
            .map_err(|e| Error::Message(format!("Failed to parse inventory: {e}")))?;

        let mut inventory = Self::default();

        for entry in file.projects {
            let project = ProjectScope::new(entry.id, entry.key);
            let mut repositories = Vec::with_capacity(entry.repositories.len());
            for repo in entry.repositories {
                let scope = RepositoryScope::new(repo.id, repo.slug, project.clone());
                let hooks = parse_hook_tables(repo.hooks, &scope.to_string());
                inventory.repository_hooks.insert(scope.id, hooks);
                repositories.push(scope);
            }
            let hooks = parse_hook_tables(entry.hooks, &project.key);
            inventory.project_hooks.insert(project.key.clone(), hooks);
            inventory
                .project_repositories
                .insert(project.key.clone(), repositories);
            inventory.projects.push(project);
        }

        for user in file.users {
            let project = ProjectScope::new(user.id, personal_project_key(&user.name));
            let mut repositories = Vec::with_capacity(user.repositories.len());
            for repo in user.repositories {
                let scope = RepositoryScope::personal(repo.id, repo.slug, project.clone());
                let hooks = parse_hook_tables(repo.hooks, &scope.to_string());
                inventory.repository_hooks.insert(scope.id, hooks);
                repositories.push(scope);
            }
            inventory
                .personal_repositories
                .insert(user.name.clone(), repositories);
            inventory.users.push(user.name);
        }

        Ok(inventory)
    }

    /// Find a project by key
    pub fn find_project(&self, key: &str) -> Option<&ProjectScope> {
        self.projects.iter().find(|p| p.key == key)
    }

    /// Find a repository by `KEY/slug` or `~user/slug`
    pub fn find_repository(&self, path: &str) -> Option<&RepositoryScope> {
        let (owner, slug) = path.split_once('/')?;
        if let Some(user) = owner.strip_prefix('~') {
            let key = personal_project_key(user);
            return self
                .personal_repositories
                .values()
                .flatten()
                .find(|r| r.project.key == key && r.slug == slug);
        }
        self.project_repositories
            .get(owner)?
            .iter()
            .find(|r| r.slug == slug)
    }

    /// Every repository, project repositories first
    pub fn repositories(&self) -> impl Iterator<Item = &RepositoryScope> {
        let projects = self
            .projects
            .iter()
            .filter_map(|p| self.project_repositories.get(&p.key))
            .flatten();
        let personal = self
            .users
            .iter()
            .filter_map(|u| self.personal_repositories.get(u))
            .flatten();
        projects.chain(personal)
    }

    fn setting(&self, scope: &Scope, hook: HookKind) -> Option<&HookSetting> {
        match scope {
            Scope::Global => None,
            Scope::Project(project) => self.project_hooks.get(&project.key)?.get(&hook),
            Scope::Repository(repo) => self.repository_hooks.get(&repo.id)?.get(&hook),
        }
    }
}

impl HookConfigStore for HostInventory {
    fn hook_config(&self, scope: &Scope, hook: HookKind) -> Result<Option<HookConfig>> {
        Ok(self.setting(scope, hook).and_then(HookSetting::config))
    }

    fn hook_status(&self, scope: &Scope, hook: HookKind) -> Result<HookStatus> {
        if let Some(setting) = self.setting(scope, hook) {
            return Ok(HookStatus {
                enabled: setting.enabled,
                source: scope.scope_type(),
            });
        }

        // Repositories in regular projects inherit the project setting
        if let Scope::Repository(repo) = scope
            && !repo.personal
            && let Some(setting) = self.setting(&Scope::Project(repo.project.clone()), hook)
        {
            return Ok(HookStatus {
                enabled: setting.enabled,
                source: ScopeType::Project,
            });
        }

        Ok(HookStatus::UNSET)
    }
}

impl Inventory for HostInventory {
    fn projects(&self, page: PageRequest) -> Result<Page<ProjectScope>> {
        Ok(Page::from_slice(&self.projects, page))
    }

    fn project_repositories(
        &self,
        project: &ProjectScope,
        page: PageRequest,
    ) -> Result<Page<RepositoryScope>> {
        let repositories = self
            .project_repositories
            .get(&project.key)
            .map_or(&[][..], Vec::as_slice);
        Ok(Page::from_slice(repositories, page))
    }

    fn users(&self, page: PageRequest) -> Result<Page<String>> {
        Ok(Page::from_slice(&self.users, page))
    }

    fn personal_repositories(
        &self,
        user: &str,
        page: PageRequest,
    ) -> Result<Page<RepositoryScope>> {
        let repositories = self
            .personal_repositories
            .get(user)
            .map_or(&[][..], Vec::as_slice);
        Ok(Page::from_slice(repositories, page))
    }
}
