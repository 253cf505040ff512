//! Paged traversal of the host inventory
//!
//! Order: every regular project followed by its repositories, then every
//! user's personal repositories. Each listing is fetched page by page so the
//! host never has to materialize the whole inventory.

use hookwarden_core::{Inventory, PageRequest, ProjectScope, RepositoryScope, Result};

/// Default page size for inventory listings
pub const DEFAULT_PAGE_SIZE: usize = 10;

/// Callbacks invoked during a walk
pub trait WalkVisitor {
    /// Called once per regular project, before its repositories
    fn on_project(&mut self, _project: &ProjectScope) -> Result<()> {
        Ok(())
    }

    /// Called once per repository
    fn on_repository(&mut self, repository: &RepositoryScope) -> Result<()>;
}

impl<F> WalkVisitor for F
where
    F: FnMut(&RepositoryScope) -> Result<()>,
{
    fn on_repository(&mut self, repository: &RepositoryScope) -> Result<()> {
        self(repository)
    }
}

/// Inventory walker
#[derive(Clone, Copy)]
pub struct Walker<'a> {
    inventory: &'a dyn Inventory,
    page_size: usize,
}

impl<'a> Walker<'a> {
    /// Walker with the default page size
    pub fn new(inventory: &'a dyn Inventory) -> Self {
        Self {
            inventory,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Override the page size
    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Visit every project and repository
    pub fn walk(&self, visitor: &mut dyn WalkVisitor) -> Result<()> {
        let mut request = Some(PageRequest::first(self.page_size));
        while let Some(page_request) = request {
            let page = self.inventory.projects(page_request)?;
            for project in &page.values {
                visitor.on_project(project)?;
                self.walk_project(project, visitor)?;
            }
            request = page.next;
        }

        let mut request = Some(PageRequest::first(self.page_size));
        while let Some(page_request) = request {
            let page = self.inventory.users(page_request)?;
            for user in &page.values {
                self.walk_user(user, visitor)?;
            }
            request = page.next;
        }

        Ok(())
    }

    /// Visit the repositories of one project
    pub fn walk_project(&self, project: &ProjectScope, visitor: &mut dyn WalkVisitor) -> Result<()> {
        let mut request = Some(PageRequest::first(self.page_size));
        while let Some(page_request) = request {
            let page = self.inventory.project_repositories(project, page_request)?;
            for repository in &page.values {
                visitor.on_repository(repository)?;
            }
            request = page.next;
        }
        Ok(())
    }

    fn walk_user(&self, user: &str, visitor: &mut dyn WalkVisitor) -> Result<()> {
        let mut request = Some(PageRequest::first(self.page_size));
        while let Some(page_request) = request {
            let page = self.inventory.personal_repositories(user, page_request)?;
            for repository in &page.values {
                visitor.on_repository(repository)?;
            }
            request = page.next;
        }
        Ok(())
    }
}
