use super::error::{EngineError, EngineErrorKind};
use crate::config::ConnectionConfig;
use crate::model::Migration;
use etcd_client::{Client, DeleteOptions, GetOptions};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
enum KvOperationKind {
    Put,
    Delete,
}

#[derive(Debug, Deserialize)]
struct KvOperation {
    operation: KvOperationKind,
    key: String,
    /// String or nested object; non-string values are JSON-encoded before `put`.
    #[serde(default)]
    value: Option<serde_json::Value>,
}

fn value_to_string(value: Option<serde_json::Value>) -> String {
    match value {
        Some(serde_json::Value::String(s)) => s,
        Some(v) => v.to_string(),
        None => String::new(),
    }
}

/// Hierarchical key-value backend adapter (etcd). Non-transactional:
/// each operation in the payload is applied independently, so a failure
/// partway through a multi-operation payload leaves earlier operations
/// committed.
pub struct KvEngine {
    config: ConnectionConfig,
    client: Option<Client>,
}

impl KvEngine {
    pub fn new(config: ConnectionConfig) -> Self {
        KvEngine { config, client: None }
    }

    pub async fn connect(&mut self) -> Result<(), EngineError> {
        if self.client.is_none() {
            let client = Client::connect(self.config.endpoints(), None).await?;
            self.client = Some(client);
        }
        Ok(())
    }

    pub async fn close(&mut self) -> Result<(), EngineError> {
        self.client = None;
        Ok(())
    }

    async fn client(&mut self) -> Result<&mut Client, EngineError> {
        self.connect().await?;
        self.client.as_mut().ok_or(EngineError { kind: EngineErrorKind::ConnectionNotOpen })
    }

    /// Absolute if `schema` starts with `/`, otherwise rooted under the
    /// connection's own namespace: `/{connection}/{schema}[/{table}]/`.
    fn key_prefix(&self, schema: &str, table: Option<&str>) -> String {
        let base = if schema.starts_with('/') {
            schema.trim_end_matches('/').to_string()
        } else if schema.is_empty() {
            format!("/{}", self.config.name)
        } else {
            format!("/{}/{}", self.config.name, schema.trim_end_matches('/'))
        };

        match table {
            Some(t) if !t.is_empty() => format!("{base}/{t}/"),
            _ => format!("{base}/"),
        }
    }

    fn parse_operations(payload: &[u8]) -> Result<Vec<KvOperation>, EngineError> {
        let text = String::from_utf8_lossy(payload);
        let trimmed = text.trim();

        if let Ok(ops) = serde_json::from_str::<Vec<KvOperation>>(trimmed) {
            return Ok(ops);
        }

        if let Some((key, value)) = trimmed.split_once('=') {
            return Ok(vec![KvOperation {
                operation: KvOperationKind::Put,
                key: key.trim().to_string(),
                value: Some(serde_json::Value::String(value.trim().to_string())),
            }]);
        }

        Err(EngineError { kind: EngineErrorKind::InvalidKvPayload(trimmed.to_string()) })
    }

    pub async fn schema_exists(&mut self, schema: &str) -> Result<bool, EngineError> {
        let prefix = self.key_prefix(schema, None);
        let client = self.client().await?;
        let response = client
            .get(prefix, Some(GetOptions::new().with_prefix().with_limit(1)))
            .await?;
        Ok(!response.kvs().is_empty())
    }

    /// Key-value stores have no relational table concept; always report
    /// absence.
    pub async fn table_exists(&mut self, _schema: &str, _name: &str) -> Result<bool, EngineError> {
        Ok(false)
    }

    pub async fn execute(&mut self, migration: &Migration, schema: &str, payload: &[u8]) -> Result<(), EngineError> {
        let ops = Self::parse_operations(payload)?;
        let prefix = self.key_prefix(schema, migration.table.as_deref());
        let client = self.client().await?;

        for op in ops {
            let full_key = format!("{prefix}{}", op.key);
            match op.operation {
                KvOperationKind::Put => {
                    client.put(full_key, value_to_string(op.value), None).await?;
                }
                KvOperationKind::Delete => {
                    client.delete(full_key, Some(DeleteOptions::new())).await?;
                }
            }
        }

        Ok(())
    }

    pub async fn health_check(&mut self) -> Result<(), EngineError> {
        let client = self.client().await?;
        client.status().await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Backend;
    use std::collections::HashMap;

    fn config() -> ConnectionConfig {
        ConnectionConfig {
            name: "config".into(),
            backend: Backend::Etcd,
            host: "localhost".into(),
            port: 2379,
            username: String::new(),
            password: String::new(),
            database: String::new(),
            schema: String::new(),
            extra: HashMap::new(),
        }
    }

    #[test]
    fn key_prefix_is_rooted_under_connection_namespace() {
        let engine = KvEngine::new(config());
        assert_eq!(engine.key_prefix("features", None), "/config/features/");
        assert_eq!(engine.key_prefix("features", Some("flags")), "/config/features/flags/");
    }

    #[test]
    fn key_prefix_honors_absolute_schema() {
        let engine = KvEngine::new(config());
        assert_eq!(engine.key_prefix("/shared/ns", None), "/shared/ns/");
    }

    #[test]
    fn parse_operations_accepts_json_array() {
        let payload = br#"[{"operation":"put","key":"a","value":"1"},{"operation":"delete","key":"b"}]"#;
        let ops = KvEngine::parse_operations(payload).unwrap();
        assert_eq!(ops.len(), 2);
        assert!(matches!(ops[0].operation, KvOperationKind::Put));
        assert!(matches!(ops[1].operation, KvOperationKind::Delete));
    }

    #[test]
    fn parse_operations_falls_back_to_key_value_line() {
        let payload = b"feature.enabled=true";
        let ops = KvEngine::parse_operations(payload).unwrap();
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].key, "feature.enabled");
        assert_eq!(value_to_string(ops[0].value.clone()), "true");
    }

    #[test]
    fn parse_operations_accepts_nested_object_value() {
        let payload = br#"[{"operation":"put","key":"a","value":{"x":1}}]"#;
        let ops = KvEngine::parse_operations(payload).unwrap();
        assert_eq!(ops.len(), 1);
        assert_eq!(value_to_string(ops[0].value.clone()), r#"{"x":1}"#);
    }

    #[test]
    fn parse_operations_rejects_garbage() {
        let payload = b"not json and no equals sign";
        assert!(KvEngine::parse_operations(payload).is_err());
    }
}
