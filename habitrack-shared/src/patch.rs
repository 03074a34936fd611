/// Tri-state field for partial updates
///
/// JSON `PATCH` bodies need to distinguish three cases that `Option<T>`
/// collapses into two:
///
/// - field omitted: leave the stored value untouched ([`Patch::Absent`])
/// - field present as `null` ([`Patch::Null`])
/// - field present with a value ([`Patch::Value`])
///
/// Fields of this type must be annotated with `#[serde(default)]` so that an
/// omitted key deserializes to `Absent`.
///
/// # Example
///
/// ```
/// use habitrack_shared::patch::Patch;
/// use serde::Deserialize;
///
/// #[derive(Deserialize)]
/// struct Body {
///     #[serde(default)]
///     tag_ids: Patch<Vec<u32>>,
/// }
///
/// let omitted: Body = serde_json::from_str("{}").unwrap();
/// assert!(omitted.tag_ids.is_absent());
///
/// let cleared: Body = serde_json::from_str(r#"{"tag_ids": []}"#).unwrap();
/// assert_eq!(cleared.tag_ids, Patch::Value(vec![]));
/// ```

use serde::{Deserialize, Deserializer, Serialize, Serializer};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Patch<T> {
    /// Field was not supplied
    #[default]
    Absent,

    /// Field was supplied as explicit `null`
    Null,

    /// Field was supplied with a value
    Value(T),
}

impl<T> Patch<T> {
    pub fn is_absent(&self) -> bool {
        matches!(self, Patch::Absent)
    }

    pub fn is_present(&self) -> bool {
        !self.is_absent()
    }

    /// Collapses to `Option<Option<T>>`: outer `None` means absent
    pub fn into_option(self) -> Option<Option<T>> {
        match self {
            Patch::Absent => None,
            Patch::Null => Some(None),
            Patch::Value(value) => Some(Some(value)),
        }
    }

    pub fn as_ref(&self) -> Patch<&T> {
        match self {
            Patch::Absent => Patch::Absent,
            Patch::Null => Patch::Null,
            Patch::Value(value) => Patch::Value(value),
        }
    }
}

impl<T: Default> Patch<T> {
    /// Treats explicit `null` as the empty value; `None` only when absent
    pub fn into_present_or_default(self) -> Option<T> {
        match self {
            Patch::Absent => None,
            Patch::Null => Some(T::default()),
            Patch::Value(value) => Some(value),
        }
    }
}

impl<T> From<Option<T>> for Patch<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(value) => Patch::Value(value),
            None => Patch::Null,
        }
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Patch<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        // Only reached when the key is present; absence comes from #[serde(default)]
        Option::<T>::deserialize(deserializer).map(Patch::from)
    }
}

impl<T: Serialize> Serialize for Patch<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Patch::Value(value) => serializer.serialize_some(value),
            Patch::Absent | Patch::Null => serializer.serialize_none(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Body {
        #[serde(default)]
        description: Patch<String>,

        #[serde(default)]
        tag_ids: Patch<Vec<u32>>,
    }

    #[test]
    fn test_omitted_field_is_absent() {
        let body: Body = serde_json::from_str("{}").unwrap();
        assert_eq!(body.description, Patch::Absent);
        assert_eq!(body.tag_ids, Patch::Absent);
    }

    #[test]
    fn test_null_field_is_null() {
        let body: Body = serde_json::from_str(r#"{"description": null}"#).unwrap();
        assert_eq!(body.description, Patch::Null);
        assert!(body.tag_ids.is_absent());
    }

    #[test]
    fn test_empty_list_is_a_value() {
        let body: Body = serde_json::from_str(r#"{"tag_ids": []}"#).unwrap();
        assert_eq!(body.tag_ids, Patch::Value(vec![]));
        assert!(body.tag_ids.is_present());
    }

    #[test]
    fn test_into_present_or_default() {
        assert_eq!(Patch::<Vec<u32>>::Absent.into_present_or_default(), None);
        assert_eq!(Patch::<Vec<u32>>::Null.into_present_or_default(), Some(vec![]));
        assert_eq!(
            Patch::Value(vec![1, 2]).into_present_or_default(),
            Some(vec![1, 2])
        );
    }

    #[test]
    fn test_into_option() {
        assert_eq!(Patch::<String>::Absent.into_option(), None);
        assert_eq!(Patch::<String>::Null.into_option(), Some(None));
        assert_eq!(
            Patch::Value("x".to_string()).into_option(),
            Some(Some("x".to_string()))
        );
    }
}
