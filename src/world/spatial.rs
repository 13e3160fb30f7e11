use std::collections::{HashMap, HashSet};
use std::hash::Hash;

/// Edge length, in tiles, of one hash bucket.
pub const BUCKET_SIZE: i32 = 8;

/// Zero-area box mirroring one character's tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpatialEntry<Id> {
    pub min_x: i32,
    pub max_x: i32,
    pub min_y: i32,
    pub max_y: i32,
    pub id: Id,
}

impl<Id> SpatialEntry<Id> {
    pub fn point(id: Id, x: i32, y: i32) -> Self {
        Self {
            min_x: x,
            max_x: x,
            min_y: y,
            max_y: y,
            id,
        }
    }

    fn bucket(&self) -> BucketKey {
        BucketKey::containing(self.min_x, self.min_y)
    }

    fn inside(&self, min_x: i32, max_x: i32, min_y: i32, max_y: i32) -> bool {
        self.min_x >= min_x && self.max_x <= max_x && self.min_y >= min_y && self.max_y <= max_y
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct BucketKey {
    bx: i32,
    by: i32,
}

impl BucketKey {
    fn containing(x: i32, y: i32) -> Self {
        Self {
            bx: x.div_euclid(BUCKET_SIZE),
            by: y.div_euclid(BUCKET_SIZE),
        }
    }
}

/// Point index over integer tiles.
///
/// Tiles are hashed into fixed-size buckets; a box query visits only the
/// buckets overlapping the box and filters their members exactly. Empty
/// buckets are dropped so repeated move cycles do not grow the table.
#[derive(Debug, Clone)]
pub struct SpatialIndex<Id> {
    entries: HashMap<Id, SpatialEntry<Id>>,
    buckets: HashMap<BucketKey, HashSet<Id>>,
}

impl<Id> Default for SpatialIndex<Id> {
    fn default() -> Self {
        Self {
            entries: HashMap::new(),
            buckets: HashMap::new(),
        }
    }
}

impl<Id> PartialEq for SpatialIndex<Id>
where
    Id: Copy + Eq + Hash,
{
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries && self.buckets == other.buckets
    }
}

impl<Id> SpatialIndex<Id>
where
    Id: Copy + Eq + Hash + Ord,
{
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    pub fn contains(&self, id: Id) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn entry(&self, id: Id) -> Option<&SpatialEntry<Id>> {
        self.entries.get(&id)
    }

    pub fn position_of(&self, id: Id) -> Option<(i32, i32)> {
        self.entries.get(&id).map(|entry| (entry.min_x, entry.min_y))
    }

    /// Inserts `id` at `(x, y)`, replacing any entry it already had.
    pub fn insert(&mut self, id: Id, x: i32, y: i32) {
        self.remove(id);
        let entry = SpatialEntry::point(id, x, y);
        self.buckets.entry(entry.bucket()).or_default().insert(id);
        self.entries.insert(id, entry);
    }

    pub fn remove(&mut self, id: Id) -> Option<SpatialEntry<Id>> {
        let entry = self.entries.remove(&id)?;
        let key = entry.bucket();
        if let Some(bucket) = self.buckets.get_mut(&key) {
            bucket.remove(&id);
            if bucket.is_empty() {
                self.buckets.remove(&key);
            }
        }
        Some(entry)
    }

    /// Moves an existing entry; returns false when `id` is not indexed.
    pub fn update(&mut self, id: Id, x: i32, y: i32) -> bool {
        if self.remove(id).is_none() {
            return false;
        }
        self.insert(id, x, y);
        true
    }

    /// Ids inside the inclusive box, sorted.
    pub fn query_box(&self, min_x: i32, max_x: i32, min_y: i32, max_y: i32) -> Vec<Id> {
        if min_x > max_x || min_y > max_y {
            return Vec::new();
        }
        let low = BucketKey::containing(min_x, min_y);
        let high = BucketKey::containing(max_x, max_y);
        let span = (i64::from(high.bx) - i64::from(low.bx) + 1)
            .saturating_mul(i64::from(high.by) - i64::from(low.by) + 1);

        let mut found: Vec<Id> = if span > self.buckets.len() as i64 {
            self.entries
                .values()
                .filter(|entry| entry.inside(min_x, max_x, min_y, max_y))
                .map(|entry| entry.id)
                .collect()
        } else {
            let mut found = Vec::new();
            for bx in low.bx..=high.bx {
                for by in low.by..=high.by {
                    let Some(bucket) = self.buckets.get(&BucketKey { bx, by }) else {
                        continue;
                    };
                    found.extend(bucket.iter().copied().filter(|id| {
                        self.entries
                            .get(id)
                            .is_some_and(|entry| entry.inside(min_x, max_x, min_y, max_y))
                    }));
                }
            }
            found
        };
        found.sort_unstable();
        found
    }

    /// Square (Chebyshev) neighbourhood; callers wanting a circle post-filter.
    pub fn query_radius(&self, x: i32, y: i32, radius: i32) -> Vec<Id> {
        if radius < 0 {
            return Vec::new();
        }
        self.query_box(
            x.saturating_sub(radius),
            x.saturating_add(radius),
            y.saturating_sub(radius),
            y.saturating_add(radius),
        )
    }
}
