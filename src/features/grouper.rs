// Feature path grouper
// Collects flattened records into buckets keyed by path prefix

use std::collections::{BTreeMap, HashMap};

use super::bucket::{Bucket, BucketRole};
use super::record::FlattenedRecord;

/// Buckets in first-seen prefix order, addressable by prefix
#[derive(Debug, Clone, Default)]
pub struct BucketMap {
    buckets: Vec<Bucket>,
    index: HashMap<String, usize>,
}

impl BucketMap {
    pub fn get(&self, prefix: &str) -> Option<&Bucket> {
        self.index.get(prefix).map(|&i| &self.buckets[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Bucket> {
        self.buckets.iter()
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

impl FromIterator<Bucket> for BucketMap {
    /// Later buckets with an already-present prefix replace the earlier one
    fn from_iter<I: IntoIterator<Item = Bucket>>(iter: I) -> Self {
        let mut map = BucketMap::default();
        for bucket in iter {
            match map.index.get(&bucket.prefix) {
                Some(&i) => map.buckets[i] = bucket,
                None => {
                    map.index.insert(bucket.prefix.clone(), map.buckets.len());
                    map.buckets.push(bucket);
                }
            }
        }
        map
    }
}

/// Group flattened records into classified buckets.
///
/// Records with fewer than two path segments are dropped. When two records
/// address the same `(prefix, field)` the later one wins.
pub fn group(records: &[FlattenedRecord]) -> BucketMap {
    let mut order: Vec<(String, String)> = Vec::new();
    let mut fields: HashMap<String, BTreeMap<String, Vec<f64>>> = HashMap::new();
    let mut dropped = 0usize;

    for record in records {
        let Some(path) = record.feature_path() else {
            dropped += 1;
            continue;
        };

        let bucket_fields = fields.entry(path.prefix.clone()).or_insert_with(|| {
            order.push((path.prefix.clone(), path.root.clone()));
            BTreeMap::new()
        });
        bucket_fields.insert(path.field, record.data.clone());
    }

    if dropped > 0 {
        log::debug!("Dropped {} records with paths shorter than two segments", dropped);
    }

    let buckets: BucketMap = order
        .into_iter()
        .map(|(prefix, root)| {
            let role = BucketRole::classify(fields.remove(&prefix).unwrap_or_default());
            Bucket { prefix, root, role }
        })
        .collect();

    log::debug!("Grouped {} records into {} buckets", records.len(), buckets.len());

    buckets
}
