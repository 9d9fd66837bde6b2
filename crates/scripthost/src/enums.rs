//! Process-lifetime projection of host enumerations into script tables.
//!
//! The cache is built once from an [`EnumRegistry`] on first use and is
//! read-only afterwards. Share one cache between hosts with `Arc<EnumCache>`;
//! each host gets its own copy of the tables when attached.

use std::{collections::BTreeMap, sync::OnceLock};

use rhai::{Dynamic, Map};
use tracing::debug;

use crate::{ScriptHost, annotations::EnumRegistry, error::ScriptResult};

/// Member name to value for one enumeration.
pub type EnumTable = BTreeMap<String, i64>;

/// Exposed enumeration name to its member table.
pub type EnumTables = BTreeMap<String, EnumTable>;

/// Lazily built, immutable-after-build enum projection.
#[derive(Debug, Default)]
pub struct EnumCache {
    registry: EnumRegistry,
    tables: OnceLock<EnumTables>,
}

impl EnumCache {
    /// Create an unbuilt cache over `registry`.
    pub fn new(registry: EnumRegistry) -> Self {
        Self {
            registry,
            tables: OnceLock::new(),
        }
    }

    /// The registry the cache is built from.
    pub fn registry(&self) -> &EnumRegistry {
        &self.registry
    }

    /// Whether [`build`](Self::build) has completed.
    pub fn is_built(&self) -> bool {
        self.tables.get().is_some()
    }

    /// Build the tables if needed and return them.
    ///
    /// Concurrent first calls construct the tables exactly once.
    pub fn build(&self) -> &EnumTables {
        self.tables.get_or_init(|| {
            let tables = build_tables(&self.registry);
            debug!(enums = tables.len(), "built script enum cache");
            tables
        })
    }

    /// The table for one exposed enumeration.
    pub fn get(&self, name: &str) -> Option<&EnumTable> {
        self.build().get(name)
    }

    /// Exposed enumeration names.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.build().keys().map(String::as_str)
    }

    /// Bind every enumeration table as a global in `host`.
    ///
    /// Existing globals with the same names are overwritten, so attaching
    /// repeatedly leaves the same state as attaching once. A binding failure
    /// is reported by the host; remaining enumerations are still attached and
    /// the first failure is returned.
    pub fn attach_to(&self, host: &mut ScriptHost) -> ScriptResult<usize> {
        let mut attached = 0;
        let mut first_error = None;
        for (name, table) in self.build() {
            match host.set_global(name, Dynamic::from_map(to_script_map(table))) {
                Ok(()) => attached += 1,
                Err(err) => {
                    first_error.get_or_insert(err);
                }
            }
        }
        debug!(attached, "attached script enums");
        match first_error {
            Some(err) => Err(err),
            None => Ok(attached),
        }
    }
}

fn build_tables(registry: &EnumRegistry) -> EnumTables {
    registry
        .descriptors()
        .iter()
        .map(|descriptor| {
            let table = descriptor
                .visible_values()
                .map(|v| (v.member.clone(), v.value))
                .collect();
            (descriptor.name.clone(), table)
        })
        .collect()
}

fn to_script_map(table: &EnumTable) -> Map {
    table
        .iter()
        .map(|(member, value)| (member.as_str().into(), Dynamic::from(*value)))
        .collect()
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, thread};

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::annotations::{EnumDescriptor, EnumValueDescriptor};

    fn registry() -> EnumRegistry {
        let mut registry = EnumRegistry::new();
        registry
            .register_descriptor(
                EnumDescriptor::new("Color")
                    .value(EnumValueDescriptor::new("RED", 0))
                    .value(EnumValueDescriptor::new("GREEN", 1))
                    .value(EnumValueDescriptor::new("HIDDEN", 2).hidden(true)),
            )
            .unwrap();
        registry
            .register_descriptor(
                EnumDescriptor::new("Direction")
                    .value(EnumValueDescriptor::new("North", 10))
                    .value(EnumValueDescriptor::new("South", 20)),
            )
            .unwrap();
        registry
    }

    #[test]
    fn build_is_lazy_and_idempotent() {
        let cache = EnumCache::new(registry());
        assert!(!cache.is_built());

        let first = cache.build() as *const EnumTables;
        assert!(cache.is_built());
        let second = cache.build() as *const EnumTables;
        assert_eq!(first, second);
    }

    #[test]
    fn hidden_members_are_excluded() {
        let cache = EnumCache::new(registry());
        let color = cache.get("Color").unwrap();
        assert_eq!(
            color,
            &EnumTable::from([("GREEN".to_string(), 1), ("RED".to_string(), 0)])
        );
        assert_eq!(cache.names().collect::<Vec<_>>(), vec!["Color", "Direction"]);
    }

    #[test]
    fn concurrent_first_build_constructs_once() {
        let cache = Arc::new(EnumCache::new(registry()));
        let addrs: Vec<usize> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                thread::spawn(move || cache.build() as *const EnumTables as usize)
            })
            .collect::<Vec<_>>()
            .into_iter()
            .map(|h| h.join().unwrap())
            .collect();
        assert!(addrs.windows(2).all(|w| w[0] == w[1]));
    }

    #[test]
    fn empty_registry_builds_empty_cache() {
        let cache = EnumCache::default();
        assert!(cache.build().is_empty());
    }
}
