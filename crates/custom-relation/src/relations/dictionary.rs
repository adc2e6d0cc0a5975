//! Result dictionary: join key to the results carrying it

use std::cell::Cell;
use std::collections::HashMap;

use crate::error::RelationResult;
use crate::record::Record;

/// Results grouped by key, each bucket in original result order
#[derive(Debug, Default)]
pub struct Dictionary {
    buckets: HashMap<String, Vec<Record>>,
    results: usize,
    probes: Cell<usize>,
}

impl Dictionary {
    /// Group `results` by the key `key_of` computes for each.
    ///
    /// Records without a key are left out of every bucket. The first key
    /// error aborts the build.
    pub fn build<F>(results: Vec<Record>, mut key_of: F) -> RelationResult<Self>
    where
        F: FnMut(&Record) -> RelationResult<Option<String>>,
    {
        let mut buckets: HashMap<String, Vec<Record>> = HashMap::with_capacity(results.len());
        let total = results.len();

        for record in results {
            if let Some(key) = key_of(&record)? {
                buckets.entry(key).or_default().push(record);
            }
        }

        Ok(Self {
            buckets,
            results: total,
            probes: Cell::new(0),
        })
    }

    /// Bucket for `key`; every call counts as one probe
    pub fn get(&self, key: &str) -> Option<&[Record]> {
        self.probes.set(self.probes.get() + 1);
        self.buckets.get(key).map(Vec::as_slice)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.buckets.keys().map(String::as_str)
    }

    /// Number of distinct keys
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Number of records grouped
    pub fn result_count(&self) -> usize {
        self.results
    }

    pub fn probes(&self) -> usize {
        self.probes.get()
    }
}
