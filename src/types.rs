//! Core types for the profile engine.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::ProfileError;

/// Unique identifier for an inventory item (guid on the wire).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(pub Uuid);

impl ItemId {
    /// Generate a fresh guid for a newly created item.
    pub fn generate() -> Self {
        ItemId(Uuid::new_v4())
    }
}

impl fmt::Debug for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ItemId({})", self.0)
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ItemId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(ItemId(Uuid::parse_str(s)?))
    }
}

/// Profile revision number (`rvn` on the wire).
#[derive(
    Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct Revision(pub u64);

impl Revision {
    pub fn next(self) -> Self {
        Revision(self.0 + 1)
    }
}

impl fmt::Debug for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Rvn({})", self.0)
    }
}

impl fmt::Display for Revision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The client-side revision sentinel meaning "send me everything".
pub const FULL_SYNC_RVN: i64 = -1;

/// The five per-account profile segments.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfileType {
    Profile0,
    Levels,
    Friends,
    Monsterpit,
    Multiplayer,
}

impl ProfileType {
    /// All segments, in the order responses enumerate them.
    pub const ALL: [ProfileType; 5] = [
        ProfileType::Profile0,
        ProfileType::Levels,
        ProfileType::Friends,
        ProfileType::Monsterpit,
        ProfileType::Multiplayer,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProfileType::Profile0 => "profile0",
            ProfileType::Levels => "levels",
            ProfileType::Friends => "friends",
            ProfileType::Monsterpit => "monsterpit",
            ProfileType::Multiplayer => "multiplayer",
        }
    }

    pub(crate) fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for ProfileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProfileType {
    type Err = ProfileError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "profile0" => Ok(ProfileType::Profile0),
            "levels" => Ok(ProfileType::Levels),
            "friends" => Ok(ProfileType::Friends),
            "monsterpit" => Ok(ProfileType::Monsterpit),
            "multiplayer" => Ok(ProfileType::Multiplayer),
            other => Err(ProfileError::UnknownProfileId(other.to_string())),
        }
    }
}

/// A single inventory entry.
///
/// `attributes` is schema-free: each template category carries its own
/// shape, so values stay as raw JSON rather than a fixed struct.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub template_id: String,
    #[serde(default)]
    pub attributes: serde_json::Map<String, Value>,
    pub quantity: u64,
}

impl Item {
    /// The category prefix of the template id (before `:`).
    pub fn category(&self) -> &str {
        self.template_id
            .split_once(':')
            .map(|(category, _)| category)
            .unwrap_or(&self.template_id)
    }

    /// The name part of the template id (after `:`).
    pub fn name(&self) -> &str {
        self.template_id
            .split_once(':')
            .map(|(_, name)| name)
            .unwrap_or(&self.template_id)
    }
}

/// Input for creating a new item (before a guid is assigned).
#[derive(Clone, Debug)]
pub struct ItemInput {
    pub template_id: String,
    pub attributes: serde_json::Map<String, Value>,
    pub quantity: u64,
}

impl ItemInput {
    pub fn new(template_id: impl Into<String>, quantity: u64) -> Self {
        Self {
            template_id: template_id.into(),
            attributes: serde_json::Map::new(),
            quantity,
        }
    }

    /// Replace the full attribute map.
    pub fn with_attributes(mut self, attributes: serde_json::Map<String, Value>) -> Self {
        self.attributes = attributes;
        self
    }

    /// Set a single attribute.
    pub fn with_attribute(mut self, key: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    pub(crate) fn into_item(self) -> Item {
        Item {
            template_id: self.template_id,
            attributes: self.attributes,
            quantity: self.quantity,
        }
    }
}

/// A one-shot server-authored event delivered with the next sync response.
///
/// Payloads are free-form; by protocol convention every notification carries
/// a `type` tag and whatever extra fields that type needs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(flatten)]
    pub payload: serde_json::Map<String, Value>,
}

impl Notification {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            payload: serde_json::Map::new(),
        }
    }

    /// Attach one payload field.
    pub fn with(mut self, key: impl Into<String>, value: Value) -> Self {
        self.payload.insert(key.into(), value);
        self
    }
}

/// One recorded mutation, capturing the new state of the affected entry.
///
/// The tags and field names are the wire protocol's; the change list built
/// from these records is the only source of truth for the diff a client
/// receives.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "changeType", rename_all = "camelCase")]
pub enum ChangeRecord {
    #[serde(rename_all = "camelCase")]
    ItemAdded { item_id: ItemId, item: Item },

    #[serde(rename_all = "camelCase")]
    ItemRemoved { item_id: ItemId },

    #[serde(rename_all = "camelCase")]
    ItemQuantityChanged { item_id: ItemId, quantity: u64 },

    #[serde(rename_all = "camelCase")]
    ItemAttrChanged {
        item_id: ItemId,
        attribute_name: String,
        attribute_value: Value,
    },

    #[serde(rename_all = "camelCase")]
    StatModified { name: String, value: Value },

    /// Full snapshot, sent instead of incremental records when the client
    /// cannot be brought up to date from its acknowledged revision.
    #[serde(rename_all = "camelCase")]
    FullProfileUpdate { profile: ProfileDocument },
}

/// Named stats of a profile segment, as persisted and sent on the wire.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct StatBlock {
    #[serde(default)]
    pub attributes: serde_json::Map<String, Value>,
}

/// Persisted form of one profile segment: one JSON document per
/// (account, segment) pair, also embedded verbatim in `fullProfileUpdate`
/// changes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileDocument {
    #[serde(rename = "_id", default = "document_token")]
    pub id: String,
    #[serde(default)]
    pub created: String,
    #[serde(default)]
    pub updated: String,
    #[serde(default)]
    pub rvn: Revision,
    #[serde(default = "default_wipe_number")]
    pub wipe_number: u32,
    pub account_id: String,
    pub profile_id: ProfileType,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub items: BTreeMap<ItemId, Item>,
    #[serde(default)]
    pub stats: StatBlock,
    #[serde(default)]
    pub command_revision: u64,
}

impl ProfileDocument {
    /// A fresh, empty document at revision 0.
    pub fn new(account_id: impl Into<String>, profile_id: ProfileType) -> Self {
        let now = server_time_now();
        Self {
            id: document_token(),
            created: now.clone(),
            updated: now,
            rvn: Revision(0),
            wipe_number: default_wipe_number(),
            account_id: account_id.into(),
            profile_id,
            version: String::new(),
            items: BTreeMap::new(),
            stats: StatBlock::default(),
            command_revision: 0,
        }
    }
}

/// One entry of the client's profile-revisions guard (the
/// `X-EpicGames-ProfileRevisions` header, parsed by the HTTP layer).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientCommandRevision {
    pub profile_id: ProfileType,
    pub client_command_revision: i64,
}

/// Parse the raw guard header into its entries.
///
/// An empty or absent header is not an error; it simply provides no
/// per-segment overrides.
pub fn parse_profile_revisions(raw: &str) -> crate::error::Result<Vec<ClientCommandRevision>> {
    if raw.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(raw).map_err(|e| ProfileError::Deserialization(e.to_string()))
}

fn default_wipe_number() -> u32 {
    4
}

/// Opaque token used for document `_id` fields.
pub fn document_token() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Format a timestamp the way the protocol expects: millisecond ISO-8601
/// with a `Z` suffix.
pub fn format_server_time(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Current time in wire format.
pub fn server_time_now() -> String {
    format_server_time(Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_profile_type_roundtrip() {
        for profile_type in ProfileType::ALL {
            let parsed: ProfileType = profile_type.as_str().parse().unwrap();
            assert_eq!(parsed, profile_type);
        }
        assert!("battlepass".parse::<ProfileType>().is_err());
    }

    #[test]
    fn test_template_id_parts() {
        let item = Item {
            template_id: "Currency:Gold".to_string(),
            attributes: serde_json::Map::new(),
            quantity: 100,
        };
        assert_eq!(item.category(), "Currency");
        assert_eq!(item.name(), "Gold");
    }

    #[test]
    fn test_change_record_wire_tags() {
        let record = ChangeRecord::StatModified {
            name: "level".to_string(),
            value: json!(3),
        };
        let wire = serde_json::to_value(&record).unwrap();
        assert_eq!(
            wire,
            json!({"changeType": "statModified", "name": "level", "value": 3})
        );

        let guid = ItemId::generate();
        let record = ChangeRecord::ItemQuantityChanged {
            item_id: guid,
            quantity: 7,
        };
        let wire = serde_json::to_value(&record).unwrap();
        assert_eq!(
            wire,
            json!({
                "changeType": "itemQuantityChanged",
                "itemId": guid.to_string(),
                "quantity": 7
            })
        );
    }

    #[test]
    fn test_notification_wire_shape() {
        let notification = Notification::new("CharacterLevelUp")
            .with("level", json!(2))
            .with("primary", json!(false));
        let wire = serde_json::to_value(&notification).unwrap();
        assert_eq!(
            wire,
            json!({"type": "CharacterLevelUp", "level": 2, "primary": false})
        );
    }

    #[test]
    fn test_server_time_format() {
        let time = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(format_server_time(time), "2024-01-01T00:00:00.000Z");
    }

    #[test]
    fn test_parse_profile_revisions() {
        let parsed = parse_profile_revisions(
            r#"[{"profileId": "profile0", "clientCommandRevision": 5}]"#,
        )
        .unwrap();
        assert_eq!(parsed.len(), 1);
        assert_eq!(parsed[0].profile_id, ProfileType::Profile0);
        assert_eq!(parsed[0].client_command_revision, 5);

        assert!(parse_profile_revisions("").unwrap().is_empty());
        assert!(parse_profile_revisions("not json").is_err());
    }

    #[test]
    fn test_document_defaults() {
        let doc: ProfileDocument = serde_json::from_value(json!({
            "accountId": "abc",
            "profileId": "monsterpit"
        }))
        .unwrap();
        assert_eq!(doc.rvn, Revision(0));
        assert_eq!(doc.wipe_number, 4);
        assert!(doc.items.is_empty());
        assert!(doc.stats.attributes.is_empty());
    }
}
