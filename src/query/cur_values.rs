//! Last-known value per id

use crate::storage::page::Page;
use crate::types::{Id, Meas};
use parking_lot::RwLock;
use std::collections::HashMap;

/// Latest measurement of every id seen so far, by time
#[derive(Debug, Default)]
pub struct CurrentValueIndex {
    values: RwLock<HashMap<Id, Meas>>,
}

impl CurrentValueIndex {
    /// Empty index
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep `value` if it is not older than the stored one
    pub fn write_value(&self, value: &Meas) {
        Self::upsert(&mut self.values.write(), value);
    }

    /// [`CurrentValueIndex::write_value`] for every element of `values`
    pub fn write_all(&self, values: &[Meas]) {
        let mut map = self.values.write();
        for value in values {
            Self::upsert(&mut map, value);
        }
    }

    fn upsert(map: &mut HashMap<Id, Meas>, value: &Meas) {
        map.entry(value.id)
            .and_modify(|cur| {
                if value.time >= cur.time {
                    *cur = *value;
                }
            })
            .or_insert(*value);
    }

    /// Stored values for `ids` in request order, plus the ids not present
    pub fn read_values(&self, ids: &[Id]) -> (Vec<Meas>, Vec<Id>) {
        let map = self.values.read();
        let mut found = Vec::with_capacity(ids.len());
        let mut missing = Vec::new();
        for id in ids {
            match map.get(id) {
                Some(value) => found.push(*value),
                None => missing.push(*id),
            }
        }
        (found, missing)
    }

    /// Seed the index from the written slots of `page`
    pub fn load_from_page(&self, page: &Page) {
        let mut map = self.values.write();
        for value in page.write_window() {
            Self::upsert(&mut map, value);
        }
    }

    /// Number of ids tracked
    pub fn len(&self) -> usize {
        self.values.read().len()
    }

    /// No id tracked
    pub fn is_empty(&self) -> bool {
        self.values.read().is_empty()
    }
}
