use std::collections::HashMap;

use crate::db::Value;

/// A database entry containing several key-value fields.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Entry {
    /// The unique identifier of the entry, kept in its base64 form
    pub uuid: String,

    /// ID of the entry's built-in icon
    pub icon_id: Option<usize>,

    /// UUID (base64) of a custom entry icon
    pub custom_icon_uuid: Option<String>,

    /// The entry's tags, as the raw separator-joined string
    pub tags: Option<String>,

    /// All string fields except the password, standard and user-defined alike
    pub fields: HashMap<String, Value>,

    /// The password field, kept apart from the other fields
    pub password: Option<Value>,

    /// Previous versions of this entry. Entries inside the history carry no
    /// history of their own.
    pub history: Vec<Entry>,
}

impl Entry {
    /// Get a field value by name, decrypting protected values.
    pub fn get(&self, key: &str) -> Option<String> {
        self.fields.get(key).and_then(Value::to_plain)
    }

    /// Convenience method for getting the value of the 'Title' field
    pub fn get_title(&self) -> Option<String> {
        self.get("Title")
    }

    /// Convenience method for getting the value of the 'UserName' field
    pub fn get_username(&self) -> Option<String> {
        self.get("UserName")
    }

    /// Convenience method for getting the value of the 'URL' field
    pub fn get_url(&self) -> Option<String> {
        self.get("URL")
    }

    /// The entry's password in the clear, if one is present.
    pub fn get_password(&self) -> Option<String> {
        self.password.as_ref().and_then(Value::to_plain)
    }
}
