//! The three-state field cell used by every model entity.
//!
//! GitHub accepts `null` as a legitimate value for many fields, so "the
//! declaration does not mention this field" needs its own state distinct
//! from null: `Unset` fields inherit the provider default and never appear
//! in diffs, serializations or write bodies.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

#[cfg(test)]
#[path = "property_tests.rs"]
mod tests;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Property<T> {
    /// Not mentioned in the declaration; inherit and exclude from diff.
    #[default]
    Unset,
    /// Explicitly absent.
    Null,
    Value(T),
}

impl<T> Property<T> {
    pub fn is_unset(&self) -> bool {
        matches!(self, Property::Unset)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Property::Null)
    }

    /// Set to a concrete, non-null value.
    pub fn is_value(&self) -> bool {
        matches!(self, Property::Value(_))
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Property::Value(value) => Some(value),
            _ => None,
        }
    }

    pub fn into_value(self) -> Option<T> {
        match self {
            Property::Value(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_ref(&self) -> Property<&T> {
        match self {
            Property::Unset => Property::Unset,
            Property::Null => Property::Null,
            Property::Value(value) => Property::Value(value),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Property<U> {
        match self {
            Property::Unset => Property::Unset,
            Property::Null => Property::Null,
            Property::Value(value) => Property::Value(f(value)),
        }
    }
}

impl<T: Clone> Property<T> {
    pub fn cloned_value(&self) -> Option<T> {
        self.value().cloned()
    }
}

impl Property<String> {
    pub fn as_deref(&self) -> Option<&str> {
        self.value().map(String::as_str)
    }
}

impl<T> From<T> for Property<T> {
    fn from(value: T) -> Self {
        Property::Value(value)
    }
}

impl From<&str> for Property<String> {
    fn from(value: &str) -> Self {
        Property::Value(value.to_string())
    }
}

// Unset never reaches the serializer in practice: every entity field is
// annotated with `skip_serializing_if = "Property::is_unset"`. It still
// serializes as null to keep the impl total.
impl<T: Serialize> Serialize for Property<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Property::Unset | Property::Null => serializer.serialize_none(),
            Property::Value(value) => value.serialize(serializer),
        }
    }
}

// A missing key deserializes to Unset through Default; a present key is
// either Null or a Value.
impl<'de, T: Deserialize<'de>> Deserialize<'de> for Property<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Option::<T>::deserialize(deserializer)? {
            Some(value) => Property::Value(value),
            None => Property::Null,
        })
    }
}
