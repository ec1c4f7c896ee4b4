use std::collections::{BTreeMap, HashMap};
use tracing::debug;

use crate::handle::{Handle, IdAllocator};
use crate::program::{ProgramDesc, ShaderProgram};

/// Group used when none is given.
pub const DEFAULT_GROUP: &str = "General";

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum RegistryError {
    #[error("A shader program named '{name}' already exists in group '{group}'")]
    DuplicateName { name: String, group: String },
}

/// Which groups a name lookup searches.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GroupQuery<'a> {
    Named(&'a str),
    /// Default group first, then every other group in lexical order.
    Autodetect,
}

/// Registry mapping handles to shader programs, with per-group name lookup
pub struct ProgramRegistry {
    programs: HashMap<u64, ShaderProgram>,
    groups: BTreeMap<String, HashMap<String, u64>>,
    ids: IdAllocator,
}

impl ProgramRegistry {
    pub fn new() -> Self {
        Self {
            programs: HashMap::new(),
            groups: BTreeMap::new(),
            ids: IdAllocator::new(),
        }
    }

    /// Create and register a program. Names are unique within a group.
    pub fn create(
        &mut self,
        name: &str,
        group: &str,
        desc: ProgramDesc,
    ) -> Result<Handle<ShaderProgram>, RegistryError> {
        let names = self.groups.entry(group.to_string()).or_default();
        if names.contains_key(name) {
            return Err(RegistryError::DuplicateName {
                name: name.to_string(),
                group: group.to_string(),
            });
        }

        let handle = Handle::new(self.ids.next_id());
        names.insert(name.to_string(), handle.id);
        self.programs
            .insert(handle.id, ShaderProgram::new(handle, name, group, desc));
        debug!("Registered program '{}' in group '{}' as {}", name, group, handle);
        Ok(handle)
    }

    pub fn get(&self, handle: Handle<ShaderProgram>) -> Option<&ShaderProgram> {
        self.programs.get(&handle.id)
    }

    pub fn get_mut(&mut self, handle: Handle<ShaderProgram>) -> Option<&mut ShaderProgram> {
        self.programs.get_mut(&handle.id)
    }

    pub fn find_by_name(&self, name: &str, query: GroupQuery<'_>) -> Option<Handle<ShaderProgram>> {
        let id = match query {
            GroupQuery::Named(group) => self.groups.get(group)?.get(name).copied(),
            GroupQuery::Autodetect => self
                .groups
                .get(DEFAULT_GROUP)
                .and_then(|names| names.get(name))
                .or_else(|| {
                    self.groups
                        .iter()
                        .filter(|(group, _)| group.as_str() != DEFAULT_GROUP)
                        .find_map(|(_, names)| names.get(name))
                })
                .copied(),
        }?;
        Some(Handle::new(id))
    }

    /// Remove a program. Attachments elsewhere that point at it are left dangling.
    pub fn remove(&mut self, handle: Handle<ShaderProgram>) -> Option<ShaderProgram> {
        let program = self.programs.remove(&handle.id)?;
        if let Some(names) = self.groups.get_mut(program.group()) {
            names.remove(program.name());
        }
        debug!("Removed program '{}' ({})", program.name(), handle);
        Some(program)
    }

    pub fn len(&self) -> usize {
        self.programs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }
}

impl Default for ProgramRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_and_find() {
        let mut registry = ProgramRegistry::new();
        let a = registry
            .create("a", DEFAULT_GROUP, ProgramDesc::inline("void main(){}"))
            .unwrap();
        assert_eq!(registry.find_by_name("a", GroupQuery::Named(DEFAULT_GROUP)), Some(a));
        assert_eq!(registry.find_by_name("a", GroupQuery::Autodetect), Some(a));
        assert_eq!(registry.find_by_name("a", GroupQuery::Named("Other")), None);
        assert_eq!(registry.get(a).unwrap().name(), "a");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_ids_are_unique_and_not_reused() {
        let mut registry = ProgramRegistry::new();
        let a = registry.create("a", DEFAULT_GROUP, ProgramDesc::default()).unwrap();
        let b = registry.create("b", DEFAULT_GROUP, ProgramDesc::default()).unwrap();
        assert_ne!(a.id, b.id);

        registry.remove(b);
        let c = registry.create("b", DEFAULT_GROUP, ProgramDesc::default()).unwrap();
        assert!(c.id > b.id);
        assert_eq!(registry.get(c).unwrap().shader_id(), c.id);
    }

    #[test]
    fn test_duplicate_names_per_group() {
        let mut registry = ProgramRegistry::new();
        registry.create("a", DEFAULT_GROUP, ProgramDesc::default()).unwrap();
        assert_eq!(
            registry.create("a", DEFAULT_GROUP, ProgramDesc::default()),
            Err(RegistryError::DuplicateName {
                name: "a".to_string(),
                group: DEFAULT_GROUP.to_string(),
            })
        );
        assert!(registry.create("a", "Effects", ProgramDesc::default()).is_ok());
    }

    #[test]
    fn test_autodetect_prefers_default_group_then_lexical() {
        let mut registry = ProgramRegistry::new();
        let zeta = registry.create("x", "Zeta", ProgramDesc::default()).unwrap();
        let alpha = registry.create("x", "Alpha", ProgramDesc::default()).unwrap();
        assert_eq!(registry.find_by_name("x", GroupQuery::Autodetect), Some(alpha));

        let general = registry.create("x", DEFAULT_GROUP, ProgramDesc::default()).unwrap();
        assert_eq!(registry.find_by_name("x", GroupQuery::Autodetect), Some(general));

        registry.remove(general);
        registry.remove(alpha);
        assert_eq!(registry.find_by_name("x", GroupQuery::Autodetect), Some(zeta));
    }

    #[test]
    fn test_remove_unknown() {
        let mut registry = ProgramRegistry::new();
        assert!(registry.remove(Handle::new(42)).is_none());
        assert!(registry.is_empty());
    }
}
