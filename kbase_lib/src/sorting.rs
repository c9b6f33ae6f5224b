//! Client-side column sorting.

use std::borrow::Cow;
use std::cmp::Ordering;
use std::fmt;

use kbase_api::types::{AdminFile, AdminReport, AdminUser, UserFile, UserProfile};
use serde_json::Value;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub fn toggled(self) -> Self {
        match self {
            Self::Asc => Self::Desc,
            Self::Desc => Self::Asc,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A field value as seen by the comparator.
///
/// Values of different kinds order as `Missing < Bool < Number < Text`, so
/// absent fields collect at the start of an ascending sort.
#[derive(Clone, Debug, PartialEq)]
pub enum SortValue<'a> {
    Missing,
    Bool(bool),
    Number(f64),
    Text(Cow<'a, str>),
}

impl SortValue<'_> {
    fn rank(&self) -> u8 {
        match self {
            Self::Missing => 0,
            Self::Bool(_) => 1,
            Self::Number(_) => 2,
            Self::Text(_) => 3,
        }
    }

    pub fn compare(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Bool(a), Self::Bool(b)) => a.cmp(b),
            (Self::Number(a), Self::Number(b)) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
            (Self::Text(a), Self::Text(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl<'a> From<&'a str> for SortValue<'a> {
    fn from(s: &'a str) -> Self {
        Self::Text(Cow::Borrowed(s))
    }
}

impl<'a> From<&'a String> for SortValue<'a> {
    fn from(s: &'a String) -> Self {
        Self::Text(Cow::Borrowed(s.as_str()))
    }
}

impl<'a> From<&'a Option<String>> for SortValue<'a> {
    fn from(v: &'a Option<String>) -> Self {
        v.as_ref().map_or(Self::Missing, Self::from)
    }
}

impl<'a> From<&'a Option<u64>> for SortValue<'a> {
    fn from(v: &'a Option<u64>) -> Self {
        v.as_ref().map_or(Self::Missing, Self::from)
    }
}

impl<'a> From<&'a u64> for SortValue<'a> {
    fn from(n: &'a u64) -> Self {
        Self::Number(*n as f64)
    }
}

impl<'a> From<&'a Value> for SortValue<'a> {
    fn from(v: &'a Value) -> Self {
        match v {
            Value::Null => Self::Missing,
            Value::Bool(b) => Self::Bool(*b),
            Value::Number(n) => n.as_f64().map_or(Self::Missing, Self::Number),
            Value::String(s) => Self::Text(Cow::Borrowed(s.as_str())),
            other => Self::Text(Cow::Owned(other.to_string())),
        }
    }
}

/// Items that can be sorted by a named field.
pub trait Sortable {
    /// Value of `key`, or [`SortValue::Missing`] for unknown keys.
    fn sort_value(&self, key: &str) -> SortValue<'_>;
}

impl Sortable for Value {
    fn sort_value(&self, key: &str) -> SortValue<'_> {
        match self.get(key) {
            Some(value) => SortValue::from(value),
            None => SortValue::Missing,
        }
    }
}

impl Sortable for AdminUser {
    fn sort_value(&self, key: &str) -> SortValue<'_> {
        match key {
            "id" => (&self.id).into(),
            "user_id" => (&self.user_id).into(),
            "username" => (&self.username).into(),
            "email" => (&self.email).into(),
            "role" => (&self.role).into(),
            "created_at" => (&self.created_at).into(),
            "organization_id" => (&self.organization_id).into(),
            "last_login" => (&self.last_login).into(),
            _ => SortValue::Missing,
        }
    }
}

impl Sortable for AdminFile {
    fn sort_value(&self, key: &str) -> SortValue<'_> {
        match key {
            "id" => (&self.id).into(),
            "filename" => (&self.filename).into(),
            "original_filename" => (&self.original_filename).into(),
            "size" => (&self.size).into(),
            "uploaded_at" => (&self.uploaded_at).into(),
            "uploaded_by" => (&self.uploaded_by).into(),
            "organization_id" => (&self.organization_id).into(),
            _ => SortValue::Missing,
        }
    }
}

impl Sortable for AdminReport {
    fn sort_value(&self, key: &str) -> SortValue<'_> {
        match key {
            "id" => (&self.id).into(),
            "name" => (&self.name).into(),
            "type" | "report_type" => (&self.report_type).into(),
            "created_at" => (&self.created_at).into(),
            "created_by" => (&self.created_by).into(),
            _ => SortValue::Missing,
        }
    }
}

impl Sortable for UserFile {
    fn sort_value(&self, key: &str) -> SortValue<'_> {
        match key {
            "id" => (&self.id).into(),
            "filename" => (&self.filename).into(),
            "original_filename" => (&self.original_filename).into(),
            "size" => (&self.size).into(),
            "uploaded_at" => (&self.uploaded_at).into(),
            "organization_id" => (&self.organization_id).into(),
            _ => SortValue::Missing,
        }
    }
}

impl Sortable for UserProfile {
    fn sort_value(&self, key: &str) -> SortValue<'_> {
        match key {
            "user_id" => (&self.user_id).into(),
            "username" => (&self.username).into(),
            "email" => (&self.email).into(),
            "role" => (&self.role).into(),
            "organization_id" => (&self.organization_id).into(),
            "created_at" => (&self.created_at).into(),
            _ => SortValue::Missing,
        }
    }
}

/// Sort key and direction, toggled like a clickable column header.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Sorter {
    sort_key: Option<String>,
    sort_order: SortOrder,
}

impl Sorter {
    pub fn new(default_key: Option<&str>) -> Self {
        Self {
            sort_key: default_key.map(str::to_string),
            sort_order: SortOrder::Asc,
        }
    }

    pub fn sort_key(&self) -> Option<&str> {
        self.sort_key.as_deref()
    }

    pub fn sort_order(&self) -> SortOrder {
        self.sort_order
    }

    /// Same key flips the order; a new key starts ascending.
    pub fn toggle_sort(&mut self, key: &str) {
        if self.sort_key.as_deref() == Some(key) {
            self.sort_order = self.sort_order.toggled();
        } else {
            self.sort_key = Some(key.to_string());
            self.sort_order = SortOrder::Asc;
        }
    }

    /// Clears the key, leaving items in source order.
    pub fn reset(&mut self) {
        self.sort_key = None;
        self.sort_order = SortOrder::Asc;
    }

    /// Items in display order. Stable: equal values keep source order in
    /// both directions.
    pub fn sorted<'a, T: Sortable>(&self, items: &'a [T]) -> Vec<&'a T> {
        let mut out: Vec<&T> = items.iter().collect();
        let Some(key) = self.sort_key.as_deref() else {
            return out;
        };
        out.sort_by(|a, b| {
            let ord = a.sort_value(key).compare(&b.sort_value(key));
            match self.sort_order {
                SortOrder::Asc => ord,
                SortOrder::Desc => ord.reverse(),
            }
        });
        out
    }
}
