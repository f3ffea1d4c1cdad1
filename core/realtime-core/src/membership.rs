//! Which users are currently present in which projects.
//!
//! A project entry only exists while at least one user is present in it.

use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectMembership {
    projects: BTreeMap<String, BTreeSet<String>>,
}

impl ProjectMembership {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds membership from saved sets, dropping any that are empty.
    pub fn from_map(projects: BTreeMap<String, BTreeSet<String>>) -> Self {
        let projects = projects
            .into_iter()
            .filter(|(_, users)| !users.is_empty())
            .collect();
        Self { projects }
    }

    pub fn join(&mut self, project_id: &str, user_id: &str) {
        self.projects
            .entry(project_id.to_string())
            .or_default()
            .insert(user_id.to_string());
    }

    /// Removes the user from the project, dropping the project once empty.
    pub fn leave(&mut self, project_id: &str, user_id: &str) {
        let Some(users) = self.projects.get_mut(project_id) else {
            return;
        };
        users.remove(user_id);
        if users.is_empty() {
            self.projects.remove(project_id);
        }
    }

    pub fn users_in(&self, project_id: &str) -> Option<&BTreeSet<String>> {
        self.projects.get(project_id)
    }

    pub fn active_projects(&self) -> usize {
        self.projects.len()
    }

    /// Size of the union of all membership sets.
    pub fn active_users(&self) -> usize {
        self.projects
            .values()
            .flatten()
            .collect::<BTreeSet<_>>()
            .len()
    }

    pub fn as_map(&self) -> &BTreeMap<String, BTreeSet<String>> {
        &self.projects
    }
}
