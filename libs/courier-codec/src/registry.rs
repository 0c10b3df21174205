use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use apache_avro::Schema;
use courier_api::{SchemaError, SchemaId, SchemaSource, WireSchema};

use crate::compat::check_readable;

#[derive(Debug)]
struct Inner {
    next_id: SchemaId,
    by_id: HashMap<SchemaId, Arc<WireSchema>>,
    subjects: HashMap<String, Vec<Arc<WireSchema>>>,
}

/// Local, in-process schema source with versioned subjects.
///
/// Ids are global and start at 1. A new version is accepted only if it can
/// read data written with the subject's latest version.
#[derive(Debug)]
pub struct SchemaRegistry {
    inner: RwLock<Inner>,
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self {
            inner: RwLock::new(Inner {
                next_id: 1,
                by_id: HashMap::new(),
                subjects: HashMap::new(),
            }),
        }
    }
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        match self.inner.read() {
            Ok(g) => g,
            Err(poisoned) => {
                tracing::warn!("schema registry read lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        match self.inner.write() {
            Ok(g) => g,
            Err(poisoned) => {
                tracing::warn!("schema registry write lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    /// Publish `definition` as the next version of `subject`.
    ///
    /// Registering the latest definition again returns the existing version.
    pub fn register(&self, subject: &str, definition: &str) -> Result<Arc<WireSchema>, SchemaError> {
        let avro = Schema::parse_str(definition).map_err(|e| SchemaError::Invalid {
            subject: subject.to_string(),
            reason: e.to_string(),
        })?;

        let mut inner = self.write();
        let latest = inner.subjects.get(subject).and_then(|v| v.last().cloned());

        if let Some(latest) = &latest {
            if latest.avro().canonical_form() == avro.canonical_form() {
                return Ok(latest.clone());
            }
            check_readable(latest.avro(), &avro).map_err(|e| SchemaError::Incompatible {
                subject: subject.to_string(),
                reason: e.to_string(),
            })?;
        }

        let id = inner.next_id;
        let version = latest.map_or(1, |l| l.version() + 1);
        let schema = Arc::new(WireSchema::new(id, subject, version, avro)?);

        inner.next_id += 1;
        inner.by_id.insert(id, schema.clone());
        inner
            .subjects
            .entry(subject.to_string())
            .or_default()
            .push(schema.clone());

        tracing::info!(
            subject,
            version,
            schema_id = id,
            record = schema.record_name(),
            "schema registered"
        );
        Ok(schema)
    }

    /// Read an `.avsc` file and register it under `subject`.
    pub fn load_file(&self, subject: &str, path: impl AsRef<Path>) -> Result<Arc<WireSchema>, SchemaError> {
        let path = path.as_ref();
        let definition = std::fs::read_to_string(path).map_err(|e| SchemaError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        self.register(subject, &definition)
    }

    pub fn latest(&self, subject: &str) -> Result<Arc<WireSchema>, SchemaError> {
        self.read()
            .subjects
            .get(subject)
            .and_then(|v| v.last().cloned())
            .ok_or_else(|| SchemaError::SubjectNotFound(subject.to_string()))
    }

    pub fn version(&self, subject: &str, version: u32) -> Result<Arc<WireSchema>, SchemaError> {
        let inner = self.read();
        let versions = inner
            .subjects
            .get(subject)
            .ok_or_else(|| SchemaError::SubjectNotFound(subject.to_string()))?;
        versions
            .iter()
            .find(|s| s.version() == version)
            .cloned()
            .ok_or_else(|| SchemaError::VersionNotFound {
                subject: subject.to_string(),
                version,
            })
    }

    pub fn subjects(&self) -> Vec<String> {
        let mut names: Vec<String> = self.read().subjects.keys().cloned().collect();
        names.sort();
        names
    }
}

impl SchemaSource for SchemaRegistry {
    fn resolve(&self, id: SchemaId) -> Result<Arc<WireSchema>, SchemaError> {
        self.read()
            .by_id
            .get(&id)
            .cloned()
            .ok_or(SchemaError::NotFound(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const V1: &str = include_str!("../../../schemas/user_event.v1.avsc");
    const V2: &str = include_str!("../../../schemas/user_event.v2.avsc");

    #[test]
    fn test_versions_and_ids() {
        let registry = SchemaRegistry::new();
        let v1 = registry.register("user-events", V1).unwrap();
        let v2 = registry.register("user-events", V2).unwrap();

        assert_eq!((v1.id(), v1.version()), (1, 1));
        assert_eq!((v2.id(), v2.version()), (2, 2));
        assert_eq!(registry.latest("user-events").unwrap().id(), 2);
        assert_eq!(registry.version("user-events", 1).unwrap().id(), 1);
        assert_eq!(registry.resolve(2).unwrap().version(), 2);
        assert_eq!(registry.subjects(), vec!["user-events".to_string()]);
    }

    #[test]
    fn test_reregistering_latest_is_idempotent() {
        let registry = SchemaRegistry::new();
        let first = registry.register("user-events", V1).unwrap();
        let again = registry.register("user-events", V1).unwrap();
        assert_eq!(first.id(), again.id());
        assert!(matches!(registry.resolve(2), Err(SchemaError::NotFound(2))));
    }

    #[test]
    fn test_type_change_refused() {
        let registry = SchemaRegistry::new();
        registry.register("user-events", V1).unwrap();
        let changed = V1.replace(
            r#"{"name": "timestamp", "type": "long"}"#,
            r#"{"name": "timestamp", "type": "string"}"#,
        );
        let err = registry.register("user-events", &changed).unwrap_err();
        assert!(matches!(err, SchemaError::Incompatible { .. }), "{err:?}");
        assert_eq!(registry.latest("user-events").unwrap().version(), 1);
    }

    #[test]
    fn test_lookup_errors() {
        let registry = SchemaRegistry::new();
        assert!(matches!(registry.latest("nope"), Err(SchemaError::SubjectNotFound(_))));
        registry.register("user-events", V1).unwrap();
        assert!(matches!(
            registry.version("user-events", 7),
            Err(SchemaError::VersionNotFound { version: 7, .. })
        ));
    }

    #[test]
    fn test_missing_file() {
        let registry = SchemaRegistry::new();
        let err = registry.load_file("x", "/nonexistent/schema.avsc").unwrap_err();
        assert!(matches!(err, SchemaError::Io { .. }));
    }
}
