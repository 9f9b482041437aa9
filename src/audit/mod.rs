// Audit records for every board and block operation

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use serde::Serialize;
use serde_json::Value;

use crate::auth::Actor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditLevel {
    Read,
    Modify,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Fail,
    Success,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditRecord {
    pub operation: String,
    pub level: AuditLevel,
    pub actor: String,
    pub outcome: Outcome,
    pub meta: BTreeMap<String, Value>,
}

pub trait AuditSink: Send + Sync {
    fn log_record(&self, record: &AuditRecord);
}

/// Writes records as structured events under the `audit` target.
#[derive(Debug, Default)]
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn log_record(&self, record: &AuditRecord) {
        let meta = serde_json::to_string(&record.meta).unwrap_or_default();
        tracing::info!(
            target: "audit",
            operation = %record.operation,
            level = ?record.level,
            actor = %record.actor,
            outcome = ?record.outcome,
            meta = %meta,
            "audit record"
        );
    }
}

#[derive(Debug, Default)]
pub struct NoopAuditSink;

impl AuditSink for NoopAuditSink {
    fn log_record(&self, _record: &AuditRecord) {}
}

/// Keeps records in memory for assertions.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    records: Mutex<Vec<AuditRecord>>,
}

impl MemoryAuditSink {
    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().map(|records| records.clone()).unwrap_or_default()
    }

    pub fn last(&self) -> Option<AuditRecord> {
        self.records().pop()
    }
}

impl AuditSink for MemoryAuditSink {
    fn log_record(&self, record: &AuditRecord) {
        if let Ok(mut records) = self.records.lock() {
            records.push(record.clone());
        }
    }
}

/// Audit record for one operation in flight. It starts out failed and is
/// emitted when the scope is dropped, so an early return or a panic is logged
/// as a failure. Call [`AuditScope::success`] as the last step.
pub struct AuditScope {
    sink: Arc<dyn AuditSink>,
    record: AuditRecord,
}

impl AuditScope {
    pub fn begin(sink: Arc<dyn AuditSink>, operation: &str, level: AuditLevel, actor: &Actor) -> Self {
        Self {
            sink,
            record: AuditRecord {
                operation: operation.to_string(),
                level,
                actor: actor.user_id.clone(),
                outcome: Outcome::Fail,
                meta: BTreeMap::new(),
            },
        }
    }

    pub fn add_meta(&mut self, key: &str, value: impl Serialize) {
        let value = serde_json::to_value(value).unwrap_or(Value::Null);
        self.record.meta.insert(key.to_string(), value);
    }

    pub fn success(&mut self) {
        self.record.outcome = Outcome::Success;
    }
}

impl Drop for AuditScope {
    fn drop(&mut self) {
        self.sink.log_record(&self.record);
    }
}
