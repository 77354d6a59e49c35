//! Append-only registry of discovered agent identities.

use crate::error::RelayError;
use std::collections::HashMap;

/// One tracked agent identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entity {
    /// Numeric id parsed from the name suffix
    pub id: u32,

    /// Canonical (renamed) agent name, e.g. `agent3`
    pub name: String,
}

impl Entity {
    /// Parses an entity from a canonical name.
    ///
    /// Removes every occurrence of `tag` from the name (literal substring
    /// removal, mirroring the producer-side naming scheme) and parses the
    /// remainder as a non-negative integer.
    pub fn parse(name: &str, tag: &str) -> Result<Self, RelayError> {
        let suffix = name.replace(tag, "");
        let id = suffix
            .parse::<u32>()
            .map_err(|_| RelayError::invalid_name(name))?;

        Ok(Self {
            id,
            name: name.to_string(),
        })
    }
}

/// Tracks the set of known agent names in first-discovery order.
///
/// Append-only: entries are never removed for the process lifetime.
/// Presence checks are O(1); the discovery order is kept separately.
#[derive(Debug)]
pub struct EntityRegistry {
    /// Canonical tag stripped when parsing ids
    tag: String,

    /// name -> Entity
    entities: HashMap<String, Entity>,

    /// Names in first-discovery order
    order: Vec<String>,
}

impl EntityRegistry {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            entities: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Registers every not-yet-known name and returns the newly registered
    /// subsequence, in input order.
    ///
    /// Already-known names are skipped without re-parsing, so a name is
    /// returned at most once across the registry's lifetime.
    pub fn observe<'a>(
        &mut self,
        names: impl IntoIterator<Item = &'a str>,
    ) -> Result<Vec<String>, RelayError> {
        let mut discovered = Vec::new();

        for name in names {
            if self.entities.contains_key(name) {
                continue;
            }

            let entity = Entity::parse(name, &self.tag)?;
            self.entities.insert(name.to_string(), entity);
            self.order.push(name.to_string());
            discovered.push(name.to_string());
        }

        Ok(discovered)
    }

    /// Looks up a registered entity by name.
    pub fn get(&self, name: &str) -> Option<&Entity> {
        self.entities.get(name)
    }

    /// Returns all registered names in first-discovery order.
    pub fn names(&self) -> &[String] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_entity_id() {
        let entity = Entity::parse("agent42", "agent").unwrap();
        assert_eq!(entity.id, 42);
        assert_eq!(entity.name, "agent42");
    }

    #[test]
    fn test_parse_rejects_non_numeric_suffix() {
        assert!(matches!(
            Entity::parse("agentX", "agent"),
            Err(RelayError::InvalidEntityName { .. })
        ));
        // Tag alone leaves an empty suffix, which is not an integer either.
        assert!(Entity::parse("agent", "agent").is_err());
    }

    #[test]
    fn test_discovery_is_exactly_once() {
        let mut registry = EntityRegistry::new("agent");

        let first = registry.observe(["agent0", "agent1"]).unwrap();
        assert_eq!(first, vec!["agent0", "agent1"]);

        // Re-observing known names is a no-op; only the new one comes back.
        let second = registry.observe(["agent1", "agent2", "agent0"]).unwrap();
        assert_eq!(second, vec!["agent2"]);

        let third = registry.observe(["agent0", "agent1", "agent2"]).unwrap();
        assert!(third.is_empty());
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_first_discovery_order_is_kept() {
        let mut registry = EntityRegistry::new("agent");

        registry.observe(["agent5", "agent1"]).unwrap();
        registry.observe(["agent3", "agent1"]).unwrap();

        assert_eq!(registry.names(), ["agent5", "agent1", "agent3"]);
        assert_eq!(registry.get("agent5").unwrap().id, 5);
    }
}
