//! Scope model
//!
//! A scope is where a hook can be configured: the whole installation, one
//! project, or one repository. Personal repositories live in a user's personal
//! project and never inherit project configuration.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Host identifier of a project
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectId(pub u64);

/// Host identifier of a repository
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RepositoryId(pub u64);

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for RepositoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A project scope
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProjectScope {
    /// Project id
    pub id: ProjectId,
    /// Project key, e.g. `PROJ` or `~ALICE` for a personal project
    pub key: String,
}

impl ProjectScope {
    /// Create a project scope
    pub fn new(id: u64, key: impl Into<String>) -> Self {
        Self {
            id: ProjectId(id),
            key: key.into(),
        }
    }
}

/// A repository scope together with the project that contains it
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RepositoryScope {
    /// Repository id
    pub id: RepositoryId,
    /// Repository slug
    pub slug: String,
    /// Containing project
    pub project: ProjectScope,
    /// Whether the repository belongs to a user's personal project
    pub personal: bool,
}

impl RepositoryScope {
    /// Create a repository inside a regular project
    pub fn new(id: u64, slug: impl Into<String>, project: ProjectScope) -> Self {
        Self {
            id: RepositoryId(id),
            slug: slug.into(),
            project,
            personal: false,
        }
    }

    /// Create a repository inside a user's personal project
    pub fn personal(id: u64, slug: impl Into<String>, project: ProjectScope) -> Self {
        Self {
            personal: true,
            ..Self::new(id, slug, project)
        }
    }
}

/// The three scope levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ScopeType {
    /// Installation-wide
    Global,
    /// One project
    Project,
    /// One repository
    Repository,
}

impl ScopeType {
    /// Token used inside script record keys
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Global => "GLOBAL",
            Self::Project => "PROJECT",
            Self::Repository => "REPOSITORY",
        }
    }
}

impl fmt::Display for ScopeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScopeType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "GLOBAL" => Ok(Self::Global),
            "PROJECT" => Ok(Self::Project),
            "REPOSITORY" => Ok(Self::Repository),
            other => Err(Error::Message(format!("Unknown scope type: {other}"))),
        }
    }
}

/// A place where a hook can be configured
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Scope {
    /// Installation-wide scope
    Global,
    /// Project scope
    Project(ProjectScope),
    /// Repository scope
    Repository(RepositoryScope),
}

impl Scope {
    /// Level of this scope
    pub fn scope_type(&self) -> ScopeType {
        match self {
            Self::Global => ScopeType::Global,
            Self::Project(_) => ScopeType::Project,
            Self::Repository(_) => ScopeType::Repository,
        }
    }

    /// Identifier token used inside script record keys
    ///
    /// The global scope has no host id and uses the literal `global`.
    pub fn id_token(&self) -> String {
        match self {
            Self::Global => "global".to_string(),
            Self::Project(project) => project.id.to_string(),
            Self::Repository(repo) => repo.id.to_string(),
        }
    }

    /// The repository, if this is a repository scope
    pub fn as_repository(&self) -> Option<&RepositoryScope> {
        match self {
            Self::Repository(repo) => Some(repo),
            _ => None,
        }
    }
}

impl From<ProjectScope> for Scope {
    fn from(project: ProjectScope) -> Self {
        Self::Project(project)
    }
}

impl From<RepositoryScope> for Scope {
    fn from(repo: RepositoryScope) -> Self {
        Self::Repository(repo)
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Global => f.write_str("global"),
            Self::Project(project) => write!(f, "project={}", project.key),
            Self::Repository(repo) => write!(f, "repository={repo}"),
        }
    }
}

impl fmt::Display for RepositoryScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.project.key, self.slug)
    }
}
