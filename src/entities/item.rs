use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Item class used to bucket ground items ("Coin", "Weapon", "Corpse", ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemClass(pub String);

impl ItemClass {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }
}

/// A plain item value: a name plus whatever modifiers the content attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimpleItem {
    pub uuid: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub mods: BTreeMap<String, serde_yaml::Value>,
}

impl SimpleItem {
    pub fn new(uuid: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            uuid: uuid.into(),
            name: name.into(),
            mods: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroundItem {
    pub item: SimpleItem,
    pub count: u32,
}
