use rhai::{Dynamic, Map};

/// A reference to a table living in a script host's global namespace.
///
/// The handle shares storage with the script side: writes through the handle
/// are visible to scripts, and script writes are visible through the handle.
#[derive(Debug, Clone)]
pub struct Table {
    value: Dynamic,
}

impl Table {
    /// Create a detached, empty table.
    pub fn new() -> Self {
        Self::from_map(Map::new())
    }

    /// Wrap an owned map in a new shared cell.
    pub fn from_map(map: Map) -> Self {
        Self {
            value: Dynamic::from_map(map).into_shared(),
        }
    }

    /// Wrap an engine value holding a table. Values that are not yet shared
    /// are moved into a new shared cell. Returns `None` for non-tables.
    pub fn from_dynamic(value: Dynamic) -> Option<Self> {
        if !value.is::<Map>() {
            return None;
        }
        let value = if value.is_shared() {
            value
        } else {
            value.into_shared()
        };
        Some(Self { value })
    }

    /// Value stored under `key`, or `()` when absent.
    pub fn get(&self, key: &str) -> Dynamic {
        self.value
            .read_lock::<Map>()
            .and_then(|map| map.get(key).cloned())
            .unwrap_or(Dynamic::UNIT)
    }

    /// Store `value` under `key`, returning the previous value.
    pub fn set(&self, key: &str, value: impl Into<Dynamic>) -> Option<Dynamic> {
        let mut handle = self.value.clone();
        let mut map = handle.write_lock::<Map>()?;
        map.insert(key.into(), value.into())
    }

    /// Remove `key`, returning its value.
    pub fn remove(&self, key: &str) -> Option<Dynamic> {
        let mut handle = self.value.clone();
        let mut map = handle.write_lock::<Map>()?;
        map.remove(key)
    }

    /// Whether `key` is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.value
            .read_lock::<Map>()
            .is_some_and(|map| map.contains_key(key))
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.value.read_lock::<Map>().map_or(0, |map| map.len())
    }

    /// Whether the table has no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Keys in table order.
    pub fn keys(&self) -> Vec<String> {
        self.value
            .read_lock::<Map>()
            .map(|map| map.keys().map(|k| k.to_string()).collect())
            .unwrap_or_default()
    }

    /// An owned copy of the current contents.
    pub fn snapshot(&self) -> Map {
        self.value
            .read_lock::<Map>()
            .map(|map| (*map).clone())
            .unwrap_or_default()
    }

    /// The shared engine value backing this table.
    pub fn into_dynamic(self) -> Dynamic {
        self.value
    }
}

impl Default for Table {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Table> for Dynamic {
    fn from(table: Table) -> Self {
        table.into_dynamic()
    }
}

/// Move a table value into a shared cell in place so handles alias it.
pub(crate) fn share_in_place(slot: &mut Dynamic) {
    if slot.is::<Map>() && !slot.is_shared() {
        let value = std::mem::replace(slot, Dynamic::UNIT);
        *slot = value.into_shared();
    }
}
