use crate::db::entry::Entry;

/// A database group with child groups and entries
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Group {
    /// The unique identifier of the group, kept in its base64 form
    pub uuid: String,

    /// The name of the group
    pub name: String,

    /// ID of the group's built-in icon
    pub icon_id: Option<usize>,

    /// UUID (base64) of a custom group icon
    pub custom_icon_uuid: Option<String>,

    /// Child groups, in document order
    pub groups: Vec<Group>,

    /// Entries of this group, in document order
    pub entries: Vec<Entry>,
}

impl Group {
    pub fn new(name: &str) -> Group {
        Group {
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// Depth-first search for an entry by its base64 UUID.
    pub fn find_entry(&self, uuid: &str) -> Option<&Entry> {
        for entry in &self.entries {
            if entry.uuid == uuid {
                return Some(entry);
            }
        }

        for group in &self.groups {
            if let Some(entry) = group.find_entry(uuid) {
                return Some(entry);
            }
        }

        None
    }
}

#[cfg(test)]
mod group_tests {
    use super::*;
    use crate::db::Value;

    fn entry(uuid: &str, title: &str) -> Entry {
        let mut e = Entry {
            uuid: uuid.to_string(),
            ..Default::default()
        };
        e.fields
            .insert("Title".to_string(), Value::Unprotected(title.to_string()));
        e
    }

    #[test]
    fn find_entry_searches_depth_first() {
        let mut root = Group::new("Root");
        root.entries.push(entry("top", "top-level"));

        let mut sub = Group::new("Sub");
        sub.entries.push(entry("deep", "nested"));
        root.groups.push(sub);

        assert_eq!(
            root.find_entry("top").and_then(|e| e.get_title()).as_deref(),
            Some("top-level")
        );
        assert_eq!(
            root.find_entry("deep").and_then(|e| e.get_title()).as_deref(),
            Some("nested")
        );
        assert!(root.find_entry("missing").is_none());
    }
}
