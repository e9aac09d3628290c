//! Dispatch table builder
//!
//! Assigns each concrete variant a stable index within one of the
//! four call spaces and binds it to a native symbol. The build is
//! atomic: every check runs before a table is materialized, so a
//! failed rebuild never leaves a half-renumbered table behind. The
//! built table is immutable, stamped, and shared read-only across
//! all concurrent calls.

use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use tether_abi::{BuildStamp, CallSpace, EntryKey, GenError, GenResult, NativeEntryPoint};

use crate::mono::MonoVariant;

/// Immutable, stamped dispatch table: the single source of truth
/// consulted by every generated call site.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchTable {
    entries: Vec<NativeEntryPoint>,
    stamp: BuildStamp,
    #[serde(skip)]
    by_key: FxHashMap<EntryKey, usize>,
}

impl DispatchTable {
    fn from_entries(entries: Vec<NativeEntryPoint>) -> Self {
        let stamp = BuildStamp::compute(&entries);
        let by_key = Self::index_map(&entries);
        DispatchTable {
            entries,
            stamp,
            by_key,
        }
    }

    fn index_map(entries: &[NativeEntryPoint]) -> FxHashMap<EntryKey, usize> {
        entries
            .iter()
            .enumerate()
            .map(|(pos, e)| (e.key(), pos))
            .collect()
    }

    /// Look up an entry by `(space, index)`.
    pub fn lookup(&self, key: EntryKey) -> Option<&NativeEntryPoint> {
        self.by_key.get(&key).map(|&pos| &self.entries[pos])
    }

    /// All entries in table order.
    pub fn entries(&self) -> &[NativeEntryPoint] {
        &self.entries
    }

    /// Number of entries in one call space.
    pub fn space_len(&self, space: CallSpace) -> usize {
        self.entries.iter().filter(|e| e.space == space).count()
    }

    /// Total number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The stamp of the generation pass that produced this table.
    pub fn stamp(&self) -> &BuildStamp {
        &self.stamp
    }

    /// Serialize the stamped table artifact to JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Load a stamped table artifact from JSON.
    ///
    /// The stamp is recomputed from the loaded entries and must match
    /// the stored one; a doctored or truncated artifact is rejected.
    pub fn from_json(json: &str) -> Result<Self, String> {
        let mut table: DispatchTable =
            serde_json::from_str(json).map_err(|e| format!("malformed table artifact: {e}"))?;
        let recomputed = BuildStamp::compute(&table.entries);
        if recomputed != table.stamp {
            return Err(format!(
                "table artifact stamp mismatch: stored {}, computed {}",
                table.stamp, recomputed
            ));
        }
        table.by_key = Self::index_map(&table.entries);
        Ok(table)
    }
}

/// Builder assigning indices in first-seen declaration order, one
/// monotonic counter per call space.
pub struct DispatchTableBuilder {
    counters: FxHashMap<CallSpace, u32>,
    entries: Vec<NativeEntryPoint>,
    keys: FxHashMap<EntryKey, String>,
    symbols: FxHashSet<String>,
    baseline: Option<DispatchTable>,
    version_boundary: bool,
}

impl DispatchTableBuilder {
    /// Create a builder over the native symbol set present at build
    /// time. Entries targeting symbols outside this set fail with
    /// `UnknownEntryPointTarget`.
    pub fn new(symbols: impl IntoIterator<Item = String>) -> Self {
        DispatchTableBuilder {
            counters: FxHashMap::default(),
            entries: Vec::new(),
            keys: FxHashMap::default(),
            symbols: symbols.into_iter().collect(),
            baseline: None,
            version_boundary: false,
        }
    }

    /// Carry a baseline table from a previous generation pass.
    ///
    /// Entries retained from the baseline (same space, owner and
    /// flattened name) must keep their index; drift fails the build
    /// with `IndexRenumbered` unless a version boundary is declared.
    pub fn with_baseline(mut self, baseline: DispatchTable) -> Self {
        self.baseline = Some(baseline);
        self
    }

    /// Declare a version boundary: already-compiled callers are
    /// expected to be regenerated, so renumbering is permitted.
    pub fn declare_version_boundary(&mut self) {
        self.version_boundary = true;
    }

    /// Register a monomorphized variant, assigning the next index in
    /// its call space.
    pub fn register(&mut self, variant: MonoVariant) -> GenResult<EntryKey> {
        let space = variant.space();
        let index = self.counters.get(&space).copied().unwrap_or(0);
        let entry = NativeEntryPoint {
            index,
            space,
            owner: variant.owner,
            flat_name: variant.flat_name,
            params: variant.params,
            ret: variant.ret,
            target: variant.target,
        };
        let key = self.insert(entry)?;
        self.counters.insert(space, index + 1);
        Ok(key)
    }

    /// Register a pre-numbered entry (artifact merge path). Collides
    /// with `DuplicateIndex` if the `(space, index)` slot is taken.
    pub fn register_entry(&mut self, entry: NativeEntryPoint) -> GenResult<EntryKey> {
        let key = self.insert(entry)?;
        let counter = self.counters.entry(key.space).or_insert(0);
        if *counter <= key.index {
            *counter = key.index + 1;
        }
        Ok(key)
    }

    fn insert(&mut self, entry: NativeEntryPoint) -> GenResult<EntryKey> {
        if !self.symbols.contains(&entry.target) {
            return Err(GenError::UnknownEntryPointTarget {
                entry: entry.qualified_name(),
                target: entry.target,
            });
        }
        let key = entry.key();
        if let Some(existing) = self.keys.get(&key) {
            return Err(GenError::DuplicateIndex {
                space: key.space,
                index: key.index,
                first: existing.clone(),
                second: entry.qualified_name(),
            });
        }
        self.keys.insert(key, entry.qualified_name());
        self.entries.push(entry);
        Ok(key)
    }

    /// Validate against the baseline and materialize the immutable
    /// table. Nothing is emitted on failure.
    pub fn build(self) -> GenResult<DispatchTable> {
        if let Some(baseline) = &self.baseline {
            if !self.version_boundary {
                for old in baseline.entries() {
                    let retained = self.entries.iter().find(|e| {
                        e.space == old.space && e.owner == old.owner && e.flat_name == old.flat_name
                    });
                    if let Some(new) = retained {
                        if new.index != old.index {
                            return Err(GenError::IndexRenumbered {
                                space: old.space,
                                entry: old.qualified_name(),
                                old: old.index,
                                new: new.index,
                            });
                        }
                    }
                }
            }
        }
        Ok(DispatchTable::from_entries(self.entries))
    }
}
