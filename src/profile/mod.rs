//! Per-account profile state: revisioned segments and the account
//! aggregate handlers mutate.

pub mod items;
pub mod notifications;
pub mod stats;

use crate::error::{ProfileError, Result};
use crate::sync::changelog::{classify, ChangeLog, SyncMode};
use crate::sync::response::{MultiUpdate, SyncResponse, RESPONSE_VERSION};
use crate::types::{
    document_token, server_time_now, ChangeRecord, ClientCommandRevision, Item, ItemId,
    ItemInput, Notification, ProfileDocument, ProfileType, Revision,
};
use serde_json::Value;
use tracing::{debug, warn};

pub use items::ItemCollection;
pub use notifications::NotificationQueue;
pub use stats::StatTable;

/// One revisioned profile segment: items, stats, queued notifications, and
/// the change log for the request in flight.
///
/// Mutations apply to the in-memory state immediately (a request reads its
/// own writes) and are committed when a response is built. Until then the
/// segment can be rolled back to its last committed point, which is what a
/// revision conflict does.
#[derive(Clone, Debug)]
pub struct Profile {
    account_id: String,
    profile_type: ProfileType,
    doc_id: String,
    created: String,
    updated: String,
    revision: Revision,
    wipe_number: u32,
    version: String,
    command_revision: u64,
    items: ItemCollection,
    stats: StatTable,
    notifications: NotificationQueue,
    changes: ChangeLog,
    rollback: Option<RollbackPoint>,
    dirty: bool,
}

/// Committed items/stats captured at the first mutation of a request.
#[derive(Clone, Debug)]
struct RollbackPoint {
    items: ItemCollection,
    stats: StatTable,
}

/// What committing a segment contributed to the response being built.
pub(crate) struct SegmentUpdate {
    pub revision: Revision,
    pub base: Revision,
    pub changes: Vec<ChangeRecord>,
    pub notifications: Vec<Notification>,
    pub command_revision: u64,
    pub bumped: bool,
}

impl Profile {
    /// A fresh, empty segment at revision 0, pending its first save.
    pub fn new(account_id: impl Into<String>, profile_type: ProfileType) -> Self {
        let now = server_time_now();
        Self {
            account_id: account_id.into(),
            profile_type,
            doc_id: document_token(),
            created: now.clone(),
            updated: now,
            revision: Revision(0),
            wipe_number: 4,
            version: String::new(),
            command_revision: 0,
            items: ItemCollection::new(),
            stats: StatTable::new(),
            notifications: NotificationQueue::new(),
            changes: ChangeLog::new(),
            rollback: None,
            dirty: true,
        }
    }

    /// Materialize a segment from its persisted document.
    pub fn from_document(doc: ProfileDocument) -> Self {
        Self {
            account_id: doc.account_id,
            profile_type: doc.profile_id,
            doc_id: doc.id,
            created: doc.created,
            updated: doc.updated,
            revision: doc.rvn,
            wipe_number: doc.wipe_number,
            version: doc.version,
            command_revision: doc.command_revision,
            items: ItemCollection::from_document(doc.items),
            stats: StatTable::from_document(doc.stats),
            notifications: NotificationQueue::new(),
            changes: ChangeLog::new(),
            rollback: None,
            dirty: false,
        }
    }

    /// The persisted form of the current committed state.
    pub fn to_document(&self) -> ProfileDocument {
        ProfileDocument {
            id: self.doc_id.clone(),
            created: self.created.clone(),
            updated: self.updated.clone(),
            rvn: self.revision,
            wipe_number: self.wipe_number,
            account_id: self.account_id.clone(),
            profile_id: self.profile_type,
            version: self.version.clone(),
            items: self.items.to_document(),
            stats: self.stats.to_document(),
            command_revision: self.command_revision,
        }
    }

    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    pub fn profile_type(&self) -> ProfileType {
        self.profile_type
    }

    /// The committed revision (`rvn`) of this segment.
    pub fn revision(&self) -> Revision {
        self.revision
    }

    pub fn command_revision(&self) -> u64 {
        self.command_revision
    }

    pub fn items(&self) -> &ItemCollection {
        &self.items
    }

    pub fn stats(&self) -> &StatTable {
        &self.stats
    }

    /// Whether this request has recorded mutations not yet committed into
    /// a response.
    pub fn has_pending_changes(&self) -> bool {
        !self.changes.is_empty()
    }

    /// Whether the committed state differs from what storage last saw.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub(crate) fn mark_clean(&mut self) {
        self.dirty = false;
    }

    // --- Item operations ---

    /// Create an item with a fresh guid and record `itemAdded`.
    pub fn add_item(&mut self, input: ItemInput) -> ItemId {
        self.checkpoint();
        let item = input.into_item();
        let guid = ItemId::generate();
        self.items.insert(guid, item.clone());
        self.changes.record(ChangeRecord::ItemAdded {
            item_id: guid,
            item,
        });
        guid
    }

    /// Delete an item and record `itemRemoved`. Removing an absent guid is
    /// a no-op.
    pub fn remove_item(&mut self, guid: ItemId) {
        if self.items.get(guid).is_none() {
            return;
        }
        self.checkpoint();
        self.items.remove(guid);
        self.changes
            .record(ChangeRecord::ItemRemoved { item_id: guid });
    }

    pub fn get_item_by_guid(&self, guid: ItemId) -> Option<&Item> {
        self.items.get(guid)
    }

    pub fn find_item_by_template_id(&self, template_id: &str) -> Vec<ItemId> {
        self.items.find_by_template_id(template_id)
    }

    /// Match on the name part of the template id only (after `:`).
    pub fn fuzzy_find_item_by_template_id(&self, name: &str) -> Vec<ItemId> {
        self.items.find_by_name(name)
    }

    /// Match on the category prefix of the template id (before `:`).
    pub fn find_items_by_type(&self, category: &str) -> Vec<ItemId> {
        self.items.find_by_category(category)
    }

    /// Set an item's quantity to a final value and record
    /// `itemQuantityChanged`. Negative quantities are rejected, never
    /// stored.
    pub fn change_item_quantity(&mut self, guid: ItemId, quantity: i64) -> Result<()> {
        let quantity = u64::try_from(quantity).map_err(|_| ProfileError::NegativeQuantity {
            item_id: guid,
            quantity,
        })?;
        if self.items.get(guid).is_none() {
            return Err(ProfileError::ItemNotFound(guid));
        }
        self.checkpoint();
        self.items.set_quantity(guid, quantity)?;
        self.changes.record(ChangeRecord::ItemQuantityChanged {
            item_id: guid,
            quantity,
        });
        Ok(())
    }

    /// Replace one attribute key and record `itemAttrChanged`.
    pub fn change_item_attribute(
        &mut self,
        guid: ItemId,
        attribute_name: &str,
        attribute_value: Value,
    ) -> Result<()> {
        if self.items.get(guid).is_none() {
            return Err(ProfileError::ItemNotFound(guid));
        }
        self.checkpoint();
        self.items
            .set_attribute(guid, attribute_name, attribute_value.clone())?;
        self.changes.record(ChangeRecord::ItemAttrChanged {
            item_id: guid,
            attribute_name: attribute_name.to_string(),
            attribute_value,
        });
        Ok(())
    }

    // --- Stat operations ---

    /// Current stat value, or `None` if never set.
    pub fn get_stat(&self, name: &str) -> Option<&Value> {
        self.stats.get(name)
    }

    /// Replace a stat wholesale and record `statModified`.
    pub fn modify_stat(&mut self, name: impl Into<String>, value: Value) {
        self.checkpoint();
        let name = name.into();
        self.stats.set(name.clone(), value.clone());
        self.changes
            .record(ChangeRecord::StatModified { name, value });
    }

    // --- Notifications ---

    /// Queue a notification for the next response.
    pub fn add_notifications(&mut self, notification: Notification) {
        self.notifications.push(notification);
    }

    pub fn get_notifications(&self) -> &[Notification] {
        self.notifications.as_slice()
    }

    /// Suppress everything queued for the next response.
    pub fn clear_notifications(&mut self) {
        self.notifications.clear();
    }

    // --- Request lifecycle ---

    /// Capture the committed state before the first mutation of a request.
    fn checkpoint(&mut self) {
        if self.rollback.is_none() {
            self.rollback = Some(RollbackPoint {
                items: self.items.clone(),
                stats: self.stats.clone(),
            });
        }
    }

    /// Commit the in-flight request into a response fragment.
    ///
    /// Bumps the revision iff the request recorded changes, then empties
    /// the change log and notification queue. For a full sync the records
    /// are superseded by one snapshot of the post-commit document.
    pub(crate) fn commit(&mut self, mode: SyncMode, now: &str) -> SegmentUpdate {
        let bumped = !self.changes.is_empty();
        let base = self.revision;
        if bumped {
            self.bump_revision(now);
        }
        let changes = match mode {
            SyncMode::Full => {
                self.changes.discard();
                vec![ChangeRecord::FullProfileUpdate {
                    profile: self.to_document(),
                }]
            }
            _ => self.changes.take(),
        };
        self.rollback = None;
        SegmentUpdate {
            revision: self.revision,
            base,
            changes,
            notifications: self.notifications.drain(),
            command_revision: self.command_revision,
            bumped,
        }
    }

    /// Abandon the in-flight request: restore the last committed state and
    /// drop its change records and notifications.
    pub(crate) fn discard_request(&mut self) {
        if let Some(rollback) = self.rollback.take() {
            self.items = rollback.items;
            self.stats = rollback.stats;
        }
        self.changes.discard();
        self.notifications.clear();
    }

    fn bump_revision(&mut self, now: &str) {
        self.revision = self.revision.next();
        self.command_revision += 1;
        self.updated = now.to_string();
        self.dirty = true;
    }
}

/// The account aggregate: all five profile segments for one account.
///
/// A request obtains this (behind the store's per-account lock), mutates
/// whichever segments it needs through [`PlayerProfile::profile_mut`], and
/// finishes with [`PlayerProfile::construct_response`] for the segment the
/// client addressed. Changes to the other segments ride along under
/// `multiUpdate`.
#[derive(Clone, Debug)]
pub struct PlayerProfile {
    account_id: String,
    segments: [Profile; 5],
}

impl PlayerProfile {
    /// A fresh account with all segments empty at revision 0.
    pub fn new(account_id: impl Into<String>) -> Self {
        let account_id = account_id.into();
        Self {
            segments: ProfileType::ALL.map(|t| Profile::new(account_id.clone(), t)),
            account_id,
        }
    }

    /// Assemble an account from loaded segments; `None` entries
    /// materialize fresh.
    pub fn from_segments(
        account_id: impl Into<String>,
        mut segments: impl FnMut(ProfileType) -> Option<Profile>,
    ) -> Self {
        let account_id = account_id.into();
        Self {
            segments: ProfileType::ALL.map(|t| {
                segments(t).unwrap_or_else(|| Profile::new(account_id.clone(), t))
            }),
            account_id,
        }
    }

    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    pub fn profile(&self, profile_type: ProfileType) -> &Profile {
        &self.segments[profile_type.index()]
    }

    pub fn profile_mut(&mut self, profile_type: ProfileType) -> &mut Profile {
        &mut self.segments[profile_type.index()]
    }

    /// Segments in response enumeration order.
    pub fn segments(&self) -> impl Iterator<Item = &Profile> + '_ {
        self.segments.iter()
    }

    pub(crate) fn segments_mut(&mut self) -> impl Iterator<Item = &mut Profile> + '_ {
        self.segments.iter_mut()
    }

    /// Clear queued notifications for one segment, or all of them.
    pub fn clear_notifications(&mut self, profile_type: Option<ProfileType>) {
        match profile_type {
            Some(t) => self.segments[t.index()].clear_notifications(),
            None => {
                for segment in &mut self.segments {
                    segment.clear_notifications();
                }
            }
        }
    }

    /// Build the protocol response for the addressed segment and commit
    /// the request.
    ///
    /// `rvn` is the revision the client last observed (`-1` for unknown);
    /// `revisions` is the parsed client guard (may be empty); `force_full`
    /// requests a snapshot regardless of how caught up the client is.
    ///
    /// A mutating request on a stale known `rvn` fails with
    /// [`ProfileError::RevisionConflict`]; every segment is rolled back to
    /// its last committed state, so a retry after resync applies exactly
    /// once.
    pub fn construct_response(
        &mut self,
        profile_type: ProfileType,
        rvn: i64,
        revisions: &[ClientCommandRevision],
        force_full: bool,
    ) -> Result<SyncResponse> {
        let now = server_time_now();
        let primary = &mut self.segments[profile_type.index()];
        let mutated = primary.has_pending_changes();
        let current = primary.revision;

        let mode = match classify(rvn, current, force_full, mutated) {
            Ok(mode) => mode,
            Err(e) => {
                warn!(
                    account = %self.account_id,
                    profile = %profile_type,
                    client_rvn = rvn,
                    current = %current,
                    "revision conflict, rolling back request"
                );
                self.discard_request();
                return Err(e);
            }
        };

        let update = primary.commit(mode, &now);
        let command_revision = if update.bumped {
            update.command_revision
        } else {
            guard_revision(revisions, profile_type)
                .filter(|v| *v > 0)
                .map(|v| v as u64)
                .unwrap_or(update.command_revision)
        };

        debug!(
            account = %self.account_id,
            profile = %profile_type,
            mode = ?mode,
            revision = %update.revision,
            changes = update.changes.len(),
            "constructed sync response"
        );

        let mut response = SyncResponse {
            profile_revision: update.revision,
            profile_id: profile_type,
            profile_changes_base_revision: update.base,
            profile_changes: update.changes,
            profile_command_revision: command_revision,
            server_time: now.clone(),
            multi_update: Vec::new(),
            notifications: update.notifications,
            response_version: RESPONSE_VERSION,
        };

        // Other segments touched by this request ride along, each with its
        // own bump. Segments with only queued notifications stay queued
        // until a request addresses them.
        for other in ProfileType::ALL {
            if other == profile_type {
                continue;
            }
            let segment = &mut self.segments[other.index()];
            if !segment.has_pending_changes() {
                continue;
            }
            let command_revision = guard_revision(revisions, other)
                .filter(|v| *v > 0)
                .map(|v| v as u64)
                .unwrap_or(segment.command_revision);
            let update = segment.commit(SyncMode::Incremental, &now);
            response.multi_update.push(MultiUpdate {
                profile_revision: update.revision,
                profile_id: other,
                profile_changes_base_revision: update.base,
                profile_changes: update.changes,
                profile_command_revision: command_revision,
                notifications: update.notifications,
            });
        }

        Ok(response)
    }

    fn discard_request(&mut self) {
        for segment in &mut self.segments {
            segment.discard_request();
        }
    }
}

fn guard_revision(
    revisions: &[ClientCommandRevision],
    profile_type: ProfileType,
) -> Option<i64> {
    revisions
        .iter()
        .find(|r| r.profile_id == profile_type)
        .map(|r| r.client_command_revision)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_fresh_segment_starts_at_zero() {
        let profile = Profile::new("acc", ProfileType::Profile0);
        assert_eq!(profile.revision(), Revision(0));
        assert!(profile.items().is_empty());
        assert!(profile.is_dirty());
    }

    #[test]
    fn test_mutations_are_visible_within_request() {
        let mut profile = Profile::new("acc", ProfileType::Profile0);
        let guid = profile.add_item(ItemInput::new("Currency:Gold", 100));
        profile.change_item_quantity(guid, 250).unwrap();
        assert_eq!(profile.get_item_by_guid(guid).unwrap().quantity, 250);
        assert_eq!(profile.changes.len(), 2);
    }

    #[test]
    fn test_negative_quantity_rejected_and_unchanged() {
        let mut profile = Profile::new("acc", ProfileType::Profile0);
        let guid = profile.add_item(ItemInput::new("Currency:Gold", 100));
        let err = profile.change_item_quantity(guid, -5).unwrap_err();
        assert!(matches!(err, ProfileError::NegativeQuantity { .. }));
        assert_eq!(profile.get_item_by_guid(guid).unwrap().quantity, 100);
        // The failed call recorded nothing.
        assert_eq!(profile.changes.len(), 1);
    }

    #[test]
    fn test_document_roundtrip() {
        let mut profile = Profile::new("acc", ProfileType::Monsterpit);
        let guid = profile.add_item(
            ItemInput::new("Character:Archer_T06", 1).with_attribute("level", json!(5)),
        );
        profile.modify_stat("pit_power", json!(1200));
        let restored = Profile::from_document(profile.to_document());
        assert_eq!(restored.profile_type(), ProfileType::Monsterpit);
        assert_eq!(
            restored.get_item_by_guid(guid).unwrap().attributes["level"],
            json!(5)
        );
        assert_eq!(restored.get_stat("pit_power"), Some(&json!(1200)));
    }

    #[test]
    fn test_discard_request_restores_state() {
        let mut player = PlayerProfile::new("acc");
        let profile = player.profile_mut(ProfileType::Profile0);
        let gold = profile.add_item(ItemInput::new("Currency:Gold", 100));
        let response = player
            .construct_response(ProfileType::Profile0, 0, &[], false)
            .unwrap();
        assert_eq!(response.profile_revision, Revision(1));

        // Stale rvn on a mutating request: conflict, state restored.
        let profile = player.profile_mut(ProfileType::Profile0);
        profile.change_item_quantity(gold, 9999).unwrap();
        profile.modify_stat("level", json!(2));
        let err = player
            .construct_response(ProfileType::Profile0, 0, &[], false)
            .unwrap_err();
        assert!(matches!(err, ProfileError::RevisionConflict { .. }));

        let profile = player.profile(ProfileType::Profile0);
        assert_eq!(profile.get_item_by_guid(gold).unwrap().quantity, 100);
        assert!(profile.get_stat("level").is_none());
        assert_eq!(profile.revision(), Revision(1));
    }
}
