//! Tri-state field for partial updates.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A field of a partial update: absent, explicitly `null`, or a value.
///
/// Use with `#[serde(default)]` so a missing key becomes [`Patch::Absent`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Patch<T> {
    /// Key not present: leave the field untouched.
    #[default]
    Absent,
    /// Key present with `null`: clear the field.
    Null,
    /// Key present with a value: replace the field.
    Present(T),
}

impl<T> Patch<T> {
    /// Whether the key was present at all.
    pub fn is_set(&self) -> bool {
        !matches!(self, Patch::Absent)
    }

    /// Apply to a nullable field.
    pub fn apply(self, current: Option<T>) -> Option<T> {
        match self {
            Patch::Absent => current,
            Patch::Null => None,
            Patch::Present(value) => Some(value),
        }
    }

    /// Apply to a field whose cleared state is `T::default()`.
    pub fn apply_or_default(self, current: T) -> T
    where
        T: Default,
    {
        match self {
            Patch::Absent => current,
            Patch::Null => T::default(),
            Patch::Present(value) => value,
        }
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Patch<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Option::<T>::deserialize(deserializer)? {
            Some(value) => Patch::Present(value),
            None => Patch::Null,
        })
    }
}

impl<T: Serialize> Serialize for Patch<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Patch::Present(value) => serializer.serialize_some(value),
            Patch::Absent | Patch::Null => serializer.serialize_none(),
        }
    }
}
