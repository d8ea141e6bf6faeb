//! JSON projections of a database: a sanitized, cheap-to-load rendering of
//! the group tree used by the cache envelope.
//!
//! The projection format is version-tagged. Version 0 kept `Title`,
//! `UserName` and `URL` as top-level entry keys; version 1 collects all
//! string fields under `StringFields`. The loader accepts both, producers
//! only emit the current version.

use std::collections::HashMap;

use base64::{engine::general_purpose as base64_engine, Engine as _};
use serde_json::{json, Map, Value as Json};
use thiserror::Error;

use crate::db::{Database, Entry, Group, Value};

/// The projection version written by this library.
pub(crate) const PROJECTION_VERSION: u64 = 1;

const KEY_VERSION: &str = "version";
const KEY_NAME: &str = "Name";
const KEY_CUSTOM_ICONS: &str = "CustomIcons";
const KEY_GROUPS: &str = "Groups";
const KEY_ENTRIES: &str = "Entries";
const KEY_UUID: &str = "UUID";
const KEY_ICON_ID: &str = "IconID";
const KEY_CUSTOM_ICON_UUID: &str = "CustomIconUUID";
const KEY_TAGS: &str = "Tags";
const KEY_STRING_FIELDS: &str = "StringFields";
const KEY_PASSWORD: &str = "Password";
const KEY_HISTORY: &str = "History";

// entry keys that version 0 projections kept at the top level
const V0_STRING_FIELDS: [&str; 3] = ["Title", "UserName", "URL"];

/// Errors when loading a database from its projection
#[derive(Debug, Error)]
pub enum ProjectionError {
    #[error("Projected database has no name and no groups")]
    EmptyDatabase,

    #[error("Unsupported projection version: {}", version)]
    UnsupportedVersion { version: u64 },

    #[error("Malformed projection field: {}", field)]
    MalformedField { field: &'static str },

    #[error(transparent)]
    Base64(#[from] base64::DecodeError),
}

/// Decides which parts of a database make it into a projection.
///
/// All methods default to accepting, except passwords: projecting away the
/// passwords is the reason the cache envelope exists.
pub trait Filter {
    fn accept_group(&self, group: &Group) -> bool {
        let _ = group;
        true
    }

    fn accept_entry(&self, entry: &Entry) -> bool {
        let _ = entry;
        true
    }

    fn accept_history(&self) -> bool {
        true
    }

    fn accept_tags(&self) -> bool {
        true
    }

    fn accept_icons(&self) -> bool {
        true
    }

    fn accept_passwords(&self) -> bool {
        false
    }

    fn accept_string_field(&self, key: &str) -> bool {
        let _ = key;
        true
    }
}

/// The default filter: everything except passwords.
pub struct DefaultFilter;

impl Filter for DefaultFilter {}

/// Render a database to its JSON projection under a filter.
pub(crate) fn dump_database(db: &Database, filter: &dyn Filter) -> Json {
    let mut map = Map::new();

    map.insert(KEY_VERSION.to_string(), json!(PROJECTION_VERSION));

    if let Some(name) = &db.name {
        map.insert(KEY_NAME.to_string(), json!(name));
    }

    if filter.accept_icons() && !db.custom_icons.is_empty() {
        let mut icons = Map::new();
        for (uuid, data) in &db.custom_icons {
            icons.insert(uuid.clone(), json!(base64_engine::STANDARD.encode(data)));
        }
        map.insert(KEY_CUSTOM_ICONS.to_string(), Json::Object(icons));
    }

    let groups: Vec<Json> = db
        .groups
        .iter()
        .filter(|g| filter.accept_group(g))
        .map(|g| dump_group(g, filter))
        .collect();
    map.insert(KEY_GROUPS.to_string(), Json::Array(groups));

    Json::Object(map)
}

fn dump_group(group: &Group, filter: &dyn Filter) -> Json {
    let mut map = Map::new();

    map.insert(KEY_UUID.to_string(), json!(group.uuid));
    map.insert(KEY_NAME.to_string(), json!(group.name));

    if let Some(icon_id) = group.icon_id {
        map.insert(KEY_ICON_ID.to_string(), json!(icon_id));
    }

    if filter.accept_icons() {
        if let Some(custom_icon_uuid) = &group.custom_icon_uuid {
            map.insert(KEY_CUSTOM_ICON_UUID.to_string(), json!(custom_icon_uuid));
        }
    }

    let groups: Vec<Json> = group
        .groups
        .iter()
        .filter(|g| filter.accept_group(g))
        .map(|g| dump_group(g, filter))
        .collect();
    map.insert(KEY_GROUPS.to_string(), Json::Array(groups));

    let entries: Vec<Json> = group
        .entries
        .iter()
        .filter(|e| filter.accept_entry(e))
        .map(|e| dump_entry(e, filter))
        .collect();
    map.insert(KEY_ENTRIES.to_string(), Json::Array(entries));

    Json::Object(map)
}

fn dump_entry(entry: &Entry, filter: &dyn Filter) -> Json {
    let mut map = Map::new();

    map.insert(KEY_UUID.to_string(), json!(entry.uuid));

    if let Some(icon_id) = entry.icon_id {
        map.insert(KEY_ICON_ID.to_string(), json!(icon_id));
    }

    if filter.accept_icons() {
        if let Some(custom_icon_uuid) = &entry.custom_icon_uuid {
            map.insert(KEY_CUSTOM_ICON_UUID.to_string(), json!(custom_icon_uuid));
        }
    }

    if filter.accept_tags() {
        if let Some(tags) = &entry.tags {
            map.insert(KEY_TAGS.to_string(), json!(tags));
        }
    }

    let mut fields = Map::new();
    for (key, value) in &entry.fields {
        if !filter.accept_string_field(key) {
            continue;
        }
        if let Some(plain) = value.to_plain() {
            fields.insert(key.clone(), json!(plain));
        }
    }
    map.insert(KEY_STRING_FIELDS.to_string(), Json::Object(fields));

    if filter.accept_passwords() {
        if let Some(password) = entry.get_password() {
            map.insert(KEY_PASSWORD.to_string(), json!(password));
        }
    }

    if filter.accept_history() && !entry.history.is_empty() {
        let history: Vec<Json> = entry
            .history
            .iter()
            .map(|e| dump_entry(e, filter))
            .collect();
        map.insert(KEY_HISTORY.to_string(), Json::Array(history));
    }

    Json::Object(map)
}

/// Rebuild a database from its JSON projection, accepting all known
/// projection versions.
pub(crate) fn load_database(value: &Json) -> Result<Database, ProjectionError> {
    let obj = value
        .as_object()
        .ok_or(ProjectionError::MalformedField { field: "database" })?;

    let version = obj.get(KEY_VERSION).and_then(Json::as_u64).unwrap_or(0);
    if version > PROJECTION_VERSION {
        return Err(ProjectionError::UnsupportedVersion { version });
    }

    let name = obj
        .get(KEY_NAME)
        .and_then(Json::as_str)
        .map(str::to_string);

    let mut custom_icons = HashMap::new();
    if let Some(icons) = obj.get(KEY_CUSTOM_ICONS) {
        let icons = icons.as_object().ok_or(ProjectionError::MalformedField {
            field: KEY_CUSTOM_ICONS,
        })?;
        for (uuid, data) in icons {
            let data = data.as_str().ok_or(ProjectionError::MalformedField {
                field: KEY_CUSTOM_ICONS,
            })?;
            custom_icons.insert(uuid.clone(), base64_engine::STANDARD.decode(data)?);
        }
    }

    let groups = load_groups(obj, version)?;

    if name.is_none() && groups.is_empty() {
        return Err(ProjectionError::EmptyDatabase);
    }

    Ok(Database {
        name,
        custom_icons,
        groups,
        header_hash: None,
    })
}

fn load_groups(
    obj: &Map<String, Json>,
    version: u64,
) -> Result<Vec<Group>, ProjectionError> {
    let mut groups = Vec::new();

    if let Some(value) = obj.get(KEY_GROUPS) {
        let array = value
            .as_array()
            .ok_or(ProjectionError::MalformedField { field: KEY_GROUPS })?;
        for group in array {
            groups.push(load_group(group, version)?);
        }
    }

    Ok(groups)
}

fn load_group(value: &Json, version: u64) -> Result<Group, ProjectionError> {
    let obj = value
        .as_object()
        .ok_or(ProjectionError::MalformedField { field: "group" })?;

    let mut group = Group {
        uuid: obj
            .get(KEY_UUID)
            .and_then(Json::as_str)
            .unwrap_or_default()
            .to_string(),
        name: obj
            .get(KEY_NAME)
            .and_then(Json::as_str)
            .unwrap_or_default()
            .to_string(),
        icon_id: obj
            .get(KEY_ICON_ID)
            .and_then(Json::as_u64)
            .map(|v| v as usize),
        custom_icon_uuid: obj
            .get(KEY_CUSTOM_ICON_UUID)
            .and_then(Json::as_str)
            .map(str::to_string),
        groups: load_groups(obj, version)?,
        entries: Vec::new(),
    };

    if let Some(value) = obj.get(KEY_ENTRIES) {
        let array = value
            .as_array()
            .ok_or(ProjectionError::MalformedField { field: KEY_ENTRIES })?;
        for entry in array {
            group.entries.push(load_entry(entry, version)?);
        }
    }

    Ok(group)
}

fn load_entry(value: &Json, version: u64) -> Result<Entry, ProjectionError> {
    let obj = value
        .as_object()
        .ok_or(ProjectionError::MalformedField { field: "entry" })?;

    let mut entry = Entry {
        uuid: obj
            .get(KEY_UUID)
            .and_then(Json::as_str)
            .unwrap_or_default()
            .to_string(),
        icon_id: obj
            .get(KEY_ICON_ID)
            .and_then(Json::as_u64)
            .map(|v| v as usize),
        custom_icon_uuid: obj
            .get(KEY_CUSTOM_ICON_UUID)
            .and_then(Json::as_str)
            .map(str::to_string),
        tags: obj.get(KEY_TAGS).and_then(Json::as_str).map(str::to_string),
        ..Default::default()
    };

    if version == 0 {
        // pre-StringFields shape: the standard fields sit at the top level
        for key in V0_STRING_FIELDS {
            if let Some(value) = obj.get(key).and_then(Json::as_str) {
                entry
                    .fields
                    .insert(key.to_string(), Value::Unprotected(value.to_string()));
            }
        }
    } else if let Some(fields) = obj.get(KEY_STRING_FIELDS) {
        let fields = fields.as_object().ok_or(ProjectionError::MalformedField {
            field: KEY_STRING_FIELDS,
        })?;
        for (key, value) in fields {
            if let Some(value) = value.as_str() {
                entry
                    .fields
                    .insert(key.clone(), Value::Unprotected(value.to_string()));
            }
        }
    }

    if let Some(password) = obj.get(KEY_PASSWORD).and_then(Json::as_str) {
        entry.password = Some(Value::Unprotected(password.to_string()));
    }

    if let Some(history) = obj.get(KEY_HISTORY) {
        let array = history
            .as_array()
            .ok_or(ProjectionError::MalformedField { field: KEY_HISTORY })?;
        for past in array {
            let mut past = load_entry(past, version)?;
            past.history.clear();
            entry.history.push(past);
        }
    }

    Ok(entry)
}

#[cfg(test)]
mod projection_tests {
    use anyhow::Result;
    use serde_json::json;

    use super::*;

    fn sample_database() -> Database {
        let mut entry = Entry {
            uuid: "ZW50cnktMDE=".to_string(),
            icon_id: Some(12),
            tags: Some("bank;personal".to_string()),
            ..Default::default()
        };
        entry
            .fields
            .insert("Title".to_string(), Value::Unprotected("Bank".to_string()));
        entry.fields.insert(
            "UserName".to_string(),
            Value::Unprotected("jdoe".to_string()),
        );
        entry
            .fields
            .insert("URL".to_string(), Value::Unprotected("https://example.com".to_string()));
        entry.password = Some(Value::Unprotected("secret".to_string()));

        let mut past = entry.clone();
        past.password = Some(Value::Unprotected("older-secret".to_string()));
        entry.history.push(Entry {
            history: Vec::new(),
            ..past
        });

        let mut group = Group::new("Root");
        group.uuid = "Z3JvdXAtMDE=".to_string();
        group.entries.push(entry);

        let mut db = Database::default();
        db.name = Some("projected".to_string());
        db.custom_icons
            .insert("aWNvbg==".to_string(), vec![0x89, b'P', b'N', b'G']);
        db.groups.push(group);

        db
    }

    #[test]
    fn default_filter_strips_passwords_and_keeps_the_rest() -> Result<()> {
        let db = sample_database();

        let projected = dump_database(&db, &DefaultFilter);
        let loaded = load_database(&projected)?;

        assert_eq!(loaded.name.as_deref(), Some("projected"));
        assert_eq!(
            loaded.custom_icons.get("aWNvbg=="),
            Some(&vec![0x89, b'P', b'N', b'G'])
        );

        let entry = loaded.find_entry("ZW50cnktMDE=").expect("entry survives");
        assert_eq!(entry.get_title().as_deref(), Some("Bank"));
        assert_eq!(entry.get_username().as_deref(), Some("jdoe"));
        assert_eq!(entry.get_url().as_deref(), Some("https://example.com"));
        assert_eq!(entry.tags.as_deref(), Some("bank;personal"));
        assert_eq!(entry.icon_id, Some(12));

        // passwords are gone, at every level
        assert!(entry.password.is_none());
        assert!(entry.history[0].password.is_none());

        Ok(())
    }

    #[test]
    fn password_accepting_filter_keeps_passwords() -> Result<()> {
        struct WithPasswords;
        impl Filter for WithPasswords {
            fn accept_passwords(&self) -> bool {
                true
            }
        }

        let db = sample_database();

        let projected = dump_database(&db, &WithPasswords);
        let loaded = load_database(&projected)?;

        let entry = loaded.find_entry("ZW50cnktMDE=").unwrap();
        assert_eq!(entry.get_password().as_deref(), Some("secret"));

        Ok(())
    }

    #[test]
    fn history_and_tags_can_be_filtered_out() -> Result<()> {
        struct Minimal;
        impl Filter for Minimal {
            fn accept_history(&self) -> bool {
                false
            }
            fn accept_tags(&self) -> bool {
                false
            }
            fn accept_icons(&self) -> bool {
                false
            }
        }

        let db = sample_database();

        let projected = dump_database(&db, &Minimal);
        let loaded = load_database(&projected)?;

        assert!(loaded.custom_icons.is_empty());

        let entry = loaded.find_entry("ZW50cnktMDE=").unwrap();
        assert!(entry.history.is_empty());
        assert!(entry.tags.is_none());

        Ok(())
    }

    #[test]
    fn version_0_projection_loads() -> Result<()> {
        let projected = json!({
            "Name": "legacy",
            "Groups": [{
                "UUID": "Z3JvdXAtMDE=",
                "Name": "Root",
                "Entries": [{
                    "UUID": "ZW50cnktMDE=",
                    "Title": "Bank",
                    "UserName": "jdoe",
                    "URL": "https://example.com"
                }]
            }]
        });

        let loaded = load_database(&projected)?;

        let entry = loaded.find_entry("ZW50cnktMDE=").unwrap();
        assert_eq!(entry.get_title().as_deref(), Some("Bank"));
        assert_eq!(entry.get_username().as_deref(), Some("jdoe"));
        assert_eq!(entry.get_url().as_deref(), Some("https://example.com"));

        Ok(())
    }

    #[test]
    fn future_projection_version_is_rejected() {
        let projected = json!({ "version": 99, "Name": "from the future" });

        assert!(matches!(
            load_database(&projected),
            Err(ProjectionError::UnsupportedVersion { version: 99 })
        ));
    }

    #[test]
    fn empty_projection_is_rejected() {
        let projected = json!({ "version": 1, "Groups": [] });

        assert!(matches!(
            load_database(&projected),
            Err(ProjectionError::EmptyDatabase)
        ));
    }

    #[test]
    fn current_version_is_emitted() {
        let db = sample_database();
        let projected = dump_database(&db, &DefaultFilter);

        assert_eq!(
            projected.get("version").and_then(serde_json::Value::as_u64),
            Some(PROJECTION_VERSION)
        );
    }
}
