//! Measurement record and the filters applied to it during reads

use bytemuck::{Pod, Zeroable};

/// Measurement identifier
pub type Id = u64;
/// Measurement timestamp
pub type Time = u64;
/// Measured value
pub type Value = f64;
/// Small tag used for `flag` and `source`; `0` means "unfiltered" in queries
pub type Flag = u64;

/// One timestamped value for an id - exactly 40 bytes, stored verbatim in pages
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
#[repr(C)]
pub struct Meas {
    /// Series id
    pub id: Id,
    /// Timestamp
    pub time: Time,
    /// Value
    pub value: Value,
    /// Quality flag
    pub flag: Flag,
    /// Producer tag
    pub source: Flag,
}

impl Meas {
    /// Measurement without flag or source tags
    pub fn new(id: Id, time: Time, value: Value) -> Self {
        Self {
            id,
            time,
            value,
            flag: 0,
            source: 0,
        }
    }
}

/// Inclusive interval test
#[inline]
pub fn in_interval(from: Time, to: Time, time: Time) -> bool {
    from <= time && time <= to
}

/// Id/flag/source predicate shared by page scans and the storage reader
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryFilter {
    ids: Vec<Id>,
    source: Flag,
    flag: Flag,
}

impl QueryFilter {
    /// Filter on an id set (empty = any id) and optional source/flag tags
    pub fn new(ids: &[Id], source: Flag, flag: Flag) -> Self {
        let mut ids = ids.to_vec();
        ids.sort_unstable();
        ids.dedup();
        Self { ids, source, flag }
    }

    /// Filter accepting every measurement
    pub fn all() -> Self {
        Self::default()
    }

    /// Same tags, restricted to other ids
    pub fn with_ids(&self, ids: &[Id]) -> Self {
        Self::new(ids, self.source, self.flag)
    }

    /// Requested ids, sorted and deduplicated
    pub fn ids(&self) -> &[Id] {
        &self.ids
    }

    /// Source tag filter
    pub fn source(&self) -> Flag {
        self.source
    }

    /// Flag filter
    pub fn flag(&self) -> Flag {
        self.flag
    }

    /// True when no id, source or flag restriction applies
    pub fn is_unfiltered(&self) -> bool {
        self.ids.is_empty() && self.source == 0 && self.flag == 0
    }

    /// Smallest and largest requested id
    pub fn id_range(&self) -> Option<(Id, Id)> {
        Some((*self.ids.first()?, *self.ids.last()?))
    }

    /// Id is requested, or no ids were requested
    pub fn check_id(&self, id: Id) -> bool {
        self.ids.is_empty() || self.ids.binary_search(&id).is_ok()
    }

    /// Flag and source tags match (a zero filter matches anything)
    pub fn check_flags(&self, value: &Meas) -> bool {
        (self.flag == 0 || value.flag == self.flag)
            && (self.source == 0 || value.source == self.source)
    }

    /// Full id + tag predicate
    pub fn matches(&self, value: &Meas) -> bool {
        self.check_flags(value) && self.check_id(value.id)
    }
}
