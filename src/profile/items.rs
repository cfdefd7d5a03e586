//! Item ownership and lookup within one profile segment.

use crate::error::{ProfileError, Result};
use crate::types::{Item, ItemId, ItemInput};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

/// Owns the inventory entries of one profile segment.
///
/// Items are keyed by guid; lookups that return multiple guids preserve
/// insertion order. The collection itself never raises domain errors:
/// absent guids surface as `None`/empty results (or a neutral
/// `ItemNotFound` for mutations that cannot proceed without a target), and
/// gameplay code decides what that means.
#[derive(Clone, Debug, Default)]
pub struct ItemCollection {
    items: HashMap<ItemId, Item>,
    /// Guids in insertion order; kept in lockstep with `items`.
    order: Vec<ItemId>,
}

impl ItemCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a collection from a persisted document's item map.
    pub fn from_document(items: BTreeMap<ItemId, Item>) -> Self {
        let mut collection = Self::new();
        for (guid, item) in items {
            collection.insert(guid, item);
        }
        collection
    }

    /// The persisted form: guid-keyed map.
    pub fn to_document(&self) -> BTreeMap<ItemId, Item> {
        self.items
            .iter()
            .map(|(guid, item)| (*guid, item.clone()))
            .collect()
    }

    /// Insert an item under a known guid (used when loading documents).
    pub fn insert(&mut self, guid: ItemId, item: Item) {
        if self.items.insert(guid, item).is_none() {
            self.order.push(guid);
        }
    }

    /// Create a new item with a fresh guid. Duplicate template ids are
    /// legal; the guid is the identity.
    pub fn add(&mut self, input: ItemInput) -> ItemId {
        let guid = ItemId::generate();
        self.insert(guid, input.into_item());
        guid
    }

    pub fn get(&self, guid: ItemId) -> Option<&Item> {
        self.items.get(&guid)
    }

    /// Remove an item. Removing an absent guid is a no-op and returns
    /// `None`.
    pub fn remove(&mut self, guid: ItemId) -> Option<Item> {
        let removed = self.items.remove(&guid);
        if removed.is_some() {
            self.order.retain(|g| *g != guid);
        }
        removed
    }

    /// Guids whose template id matches exactly, in insertion order.
    pub fn find_by_template_id(&self, template_id: &str) -> Vec<ItemId> {
        self.find(|item| item.template_id == template_id)
    }

    /// Guids whose template name (the part after `:`) matches.
    pub fn find_by_name(&self, name: &str) -> Vec<ItemId> {
        self.find(|item| item.name() == name)
    }

    /// Guids whose template category (the part before `:`) matches.
    pub fn find_by_category(&self, category: &str) -> Vec<ItemId> {
        self.find(|item| item.category() == category)
    }

    /// Set an item's quantity to a final value (callers never pass deltas).
    pub fn set_quantity(&mut self, guid: ItemId, quantity: u64) -> Result<()> {
        let item = self
            .items
            .get_mut(&guid)
            .ok_or(ProfileError::ItemNotFound(guid))?;
        item.quantity = quantity;
        Ok(())
    }

    /// Replace one attribute key on an item.
    pub fn set_attribute(&mut self, guid: ItemId, name: &str, value: Value) -> Result<()> {
        let item = self
            .items
            .get_mut(&guid)
            .ok_or(ProfileError::ItemNotFound(guid))?;
        item.attributes.insert(name.to_string(), value);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Iterate entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (ItemId, &Item)> + '_ {
        self.order.iter().filter_map(|guid| {
            self.items.get(guid).map(|item| (*guid, item))
        })
    }

    fn find(&self, predicate: impl Fn(&Item) -> bool) -> Vec<ItemId> {
        self.iter()
            .filter_map(|(guid, item)| predicate(item).then_some(guid))
            .collect()
    }
}
