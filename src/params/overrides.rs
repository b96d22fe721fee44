/// Records that override a default record, keyed by component or segment index.
///
/// Lookup returns a slot index; read and mutate access build on it. Clearing
/// keeps the allocation so a codestream object can be reused across encodes.
#[derive(Debug, Clone, PartialEq)]
pub struct OverrideList<T> {
    records: Vec<(u16, T)>,
}

impl<T> Default for OverrideList<T> {
    fn default() -> Self {
        Self {
            records: Vec::new(),
        }
    }
}

impl<T> OverrideList<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn position(&self, key: u16) -> Option<usize> {
        self.records.iter().position(|(k, _)| *k == key)
    }

    pub fn contains(&self, key: u16) -> bool {
        self.position(key).is_some()
    }

    pub fn get(&self, key: u16) -> Option<&T> {
        self.position(key).map(|slot| &self.records[slot].1)
    }

    pub fn get_mut(&mut self, key: u16) -> Option<&mut T> {
        self.position(key).map(|slot| &mut self.records[slot].1)
    }

    /// Appends a record, replacing any record already stored under `key`.
    pub fn insert(&mut self, key: u16, value: T) -> &mut T {
        let slot = match self.position(key) {
            Some(slot) => {
                self.records[slot].1 = value;
                slot
            }
            None => {
                self.records.push((key, value));
                self.records.len() - 1
            }
        };
        &mut self.records[slot].1
    }

    pub fn get_or_insert_with(&mut self, key: u16, make: impl FnOnce() -> T) -> &mut T {
        let slot = match self.position(key) {
            Some(slot) => slot,
            None => {
                self.records.push((key, make()));
                self.records.len() - 1
            }
        };
        &mut self.records[slot].1
    }

    /// Removes records whose key is not below `limit`, returning their keys.
    pub fn trim(&mut self, limit: u32) -> Vec<u16> {
        let mut removed = Vec::new();
        self.records.retain(|(key, _)| {
            let keep = u32::from(*key) < limit;
            if !keep {
                removed.push(*key);
            }
            keep
        });
        removed
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn capacity(&self) -> usize {
        self.records.capacity()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u16, &T)> {
        self.records.iter().map(|(key, value)| (*key, value))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (u16, &mut T)> {
        self.records.iter_mut().map(|(key, value)| (*key, value))
    }
}
