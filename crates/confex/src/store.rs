//! In-memory hierarchical value store
//!
//! The engine only needs two capabilities from a store: [ValueProvider] to read a path and
//! [ValueTarget] to write one. [MapStore] implements both on top of a nested [Value] tree.
//!
//! Path segments address object keys; on arrays they are decimal indices (`servers.0.host`).
use crate::error::{Error, Result};
use crate::expression::eval::ValueProvider;
use crate::path::Path;
use crate::value::{Map, Value};

/// Write access to the store
pub trait ValueTarget {
    fn assign(&mut self, path: &Path, value: Value) -> Result<()>;
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MapStore {
    root: Map,
}

impl MapStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a YAML (or JSON) document, its root must be a mapping
    pub fn from_yaml(source: &str) -> Result<Self> {
        let document: serde_yaml::Value =
            serde_yaml::from_str(source).map_err(|e| Error::Document(e.to_string()))?;
        Value::try_from(document)?.try_into()
    }

    pub fn root(&self) -> &Map {
        &self.root
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.root)
    }

    pub fn get(&self, path: &Path) -> Option<&Value> {
        let (first, rest) = path.segments().split_first()?;

        rest.iter()
            .try_fold(self.root.get(first)?, |value, segment| child(value, segment))
    }

    /// Deep merge `other` into this store, values from `other` win
    pub fn merge(&mut self, other: MapStore) {
        merge_maps(&mut self.root, other.root);
    }

    /// Every scalar leaf keyed by its dot separated path, in document order
    pub fn snapshot(&self) -> indexmap::IndexMap<String, Value> {
        let mut leaves = indexmap::IndexMap::new();
        for (key, value) in &self.root {
            collect_leaves(key.clone(), value, &mut leaves);
        }
        leaves
    }

    /// Returns the value at `path`, creating missing objects on the way
    fn get_or_insert(&mut self, path: &Path) -> Result<&mut Value> {
        let (first, rest) = path
            .segments()
            .split_first()
            .ok_or_else(|| Error::InvalidPath(path.to_string()))?;

        let mut current = self
            .root
            .entry(first.clone())
            .or_insert_with(|| Value::Object(Map::new()));

        for segment in rest {
            current = match current {
                Value::Object(map) => map
                    .entry(segment.clone())
                    .or_insert_with(|| Value::Object(Map::new())),
                Value::Array(list) => segment
                    .parse::<usize>()
                    .ok()
                    .and_then(|index| list.get_mut(index))
                    .ok_or_else(|| Error::PathNotFound {
                        path: path.to_string(),
                    })?,
                other => {
                    return Err(Error::TypeMismatch {
                        expected: "object",
                        found: other.kind(),
                    })
                }
            };
        }

        Ok(current)
    }
}

fn child<'v>(value: &'v Value, segment: &str) -> Option<&'v Value> {
    match value {
        Value::Object(map) => map.get(segment),
        Value::Array(list) => segment
            .parse::<usize>()
            .ok()
            .and_then(|index| list.get(index)),
        _ => None,
    }
}

fn collect_leaves(path: String, value: &Value, leaves: &mut indexmap::IndexMap<String, Value>) {
    match value {
        Value::Object(map) => {
            for (key, value) in map {
                collect_leaves(format!("{path}.{key}"), value, leaves);
            }
        }
        Value::Array(list) => {
            for (index, value) in list.iter().enumerate() {
                collect_leaves(format!("{path}.{index}"), value, leaves);
            }
        }
        scalar => {
            leaves.insert(path, scalar.clone());
        }
    }
}

fn merge_maps(target: &mut Map, source: Map) {
    for (key, value) in source {
        match (target.get_mut(&key), value) {
            (Some(Value::Object(existing)), Value::Object(incoming)) => {
                merge_maps(existing, incoming);
            }
            (_, value) => {
                target.insert(key, value);
            }
        }
    }
}

impl TryFrom<Value> for MapStore {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self> {
        match value {
            Value::Object(root) => Ok(Self { root }),
            other => Err(Error::Document(format!(
                "document root must be an object, got {}",
                other.kind()
            ))),
        }
    }
}

impl ValueProvider for MapStore {
    fn resolve(&self, path: &Path) -> Result<Value> {
        self.get(path).cloned().ok_or_else(|| Error::PathNotFound {
            path: path.to_string(),
        })
    }
}

impl ValueTarget for MapStore {
    fn assign(&mut self, path: &Path, value: Value) -> Result<()> {
        tracing::trace!(%path, "assign");
        *self.get_or_insert(path)? = value;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn path(p: &str) -> Path {
        Path::parse(p).unwrap()
    }

    fn sample() -> MapStore {
        MapStore::from_yaml(
            r#"
foo:
  bar:
    baz: HELLO
servers:
  - host: alpha
  - host: beta
port: 8080
"#,
        )
        .unwrap()
    }

    #[test]
    fn resolve() {
        let store = sample();
        assert_eq!(store.resolve(&path("foo.bar.baz")).unwrap(), Value::from("HELLO"));
        assert_eq!(store.resolve(&path("servers.1.host")).unwrap(), Value::from("beta"));
        assert_eq!(store.resolve(&path("port")).unwrap(), Value::Integer(8080));
        assert!(store.resolve(&path("foo.bar")).unwrap().as_map().is_ok());
    }

    #[test]
    fn resolve_missing() {
        let store = sample();
        for missing in ["nope", "foo.bar.baz.deeper", "servers.7.host", "servers.x"] {
            let err = store.resolve(&path(missing)).unwrap_err();
            assert!(matches!(err, Error::PathNotFound { path } if path == missing));
        }
    }

    #[test]
    fn assign_creates_objects() {
        let mut store = sample();
        store.assign(&path("new.nested.key"), "v".into()).unwrap();
        store.assign(&path("servers.0.host"), "gamma".into()).unwrap();

        assert_eq!(store.resolve(&path("new.nested.key")).unwrap(), Value::from("v"));
        assert_eq!(store.resolve(&path("servers.0.host")).unwrap(), Value::from("gamma"));
    }

    #[test]
    fn assign_through_scalar_fails() {
        let mut store = sample();
        let err = store.assign(&path("port.inner"), "v".into()).unwrap_err();
        assert!(matches!(err, Error::TypeMismatch { found: "integer", .. }));
        assert!(store.assign(&path("servers.9.host"), "v".into()).is_err());
        assert_eq!(store, sample());
    }

    #[test]
    fn snapshot_lists_leaves() {
        let keys: Vec<String> = sample().snapshot().into_keys().collect();
        assert_eq!(
            keys,
            vec!["foo.bar.baz", "servers.0.host", "servers.1.host", "port"]
        );
    }

    #[test]
    fn merge_is_deep() {
        let mut store = sample();
        store.merge(MapStore::from_yaml("foo: {bar: {qux: 1}}\nport: 9090").unwrap());

        assert_eq!(store.resolve(&path("foo.bar.baz")).unwrap(), Value::from("HELLO"));
        assert_eq!(store.resolve(&path("foo.bar.qux")).unwrap(), Value::Integer(1));
        assert_eq!(store.resolve(&path("port")).unwrap(), Value::Integer(9090));
    }

    #[test]
    fn root_must_be_a_mapping() {
        assert!(matches!(MapStore::from_yaml("- 1"), Err(Error::Document(_))));
        assert!(matches!(MapStore::from_yaml("a: ["), Err(Error::Document(_))));
    }
}
