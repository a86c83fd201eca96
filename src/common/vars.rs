//! String-keyed map of JSON values.

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};

/// Heterogeneous variable map.
///
/// Backs the context's shared store, event payloads and wait requirements.
/// Nothing enforces a per-key value type; callers read a key with the same
/// type they wrote it with.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Vars {
    inner: Map<String, Value>,
}

impl Vars {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `key` to `value`, replacing any previous value.
    pub fn set<V: Into<Value>>(
        &mut self,
        key: &str,
        value: V,
    ) {
        self.inner.insert(key.to_string(), value.into());
    }

    /// Builder-style [`Vars::set`].
    pub fn with<V: Into<Value>>(
        mut self,
        key: &str,
        value: V,
    ) -> Self {
        self.set(key, value);
        self
    }

    /// Get `key` converted into `T`; `None` when missing or of another type.
    pub fn get<T: DeserializeOwned>(
        &self,
        key: &str,
    ) -> Option<T> {
        self.inner.get(key).and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Get the raw value stored under `key`.
    pub fn get_value(
        &self,
        key: &str,
    ) -> Option<&Value> {
        self.inner.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.inner.iter()
    }
}

impl From<Map<String, Value>> for Vars {
    fn from(inner: Map<String, Value>) -> Self {
        Self {
            inner,
        }
    }
}

impl From<Vars> for Value {
    fn from(vars: Vars) -> Self {
        Value::Object(vars.inner)
    }
}

impl FromIterator<(String, Value)> for Vars {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            inner: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_vars_set_get() {
        let mut vars = Vars::new();
        vars.set("name", "Alice");
        vars.set("age", 30);
        vars.set("data", json!({"tags": ["a", "b"]}));

        assert_eq!(vars.get::<String>("name"), Some("Alice".to_string()));
        assert_eq!(vars.get::<u32>("age"), Some(30));
        assert_eq!(vars.get::<Vec<String>>("tags"), None);
        assert_eq!(vars.get_value("data"), Some(&json!({"tags": ["a", "b"]})));
        assert_eq!(vars.iter().count(), 3);
    }

    #[test]
    fn test_vars_wrong_type_is_none() {
        let vars = Vars::new().with("age", "thirty");
        assert_eq!(vars.get::<u32>("age"), None);
    }

    #[test]
    fn test_vars_serialize_transparent() {
        let vars = Vars::new().with("id", 7);
        assert_eq!(serde_json::to_value(&vars).unwrap(), json!({"id": 7}));
    }
}
