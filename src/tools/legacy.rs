//! Legacy tool-name translation (spec §4.3.4). Grounded on
//! `original_source/src/mcp_jive/tools/consolidated/backward_compatibility.py`'s
//! `BackwardCompatibilityWrapper`: a fixed map from a deprecated tool
//! name to a `(unified_tool_name, parameter_transform)` pair, plus a
//! one-shot-per-process deprecation warning.

use std::collections::HashSet;
use std::sync::Mutex;

use serde_json::{json, Value};
use tracing::warn;

use crate::error::ToolError;

fn rename_field(obj: &mut serde_json::Map<String, Value>, old: &str, new: &str) {
    if let Some(v) = obj.remove(old) {
        obj.entry(new.to_string()).or_insert(v);
    }
}

fn as_object(params: Value) -> serde_json::Map<String, Value> {
    match params {
        Value::Object(map) => map,
        _ => serde_json::Map::new(),
    }
}

struct LegacyEntry {
    legacy_name: &'static str,
    new_tool: &'static str,
    description: &'static str,
    transform: fn(Value) -> Value,
}

macro_rules! entry {
    ($legacy:literal, $new:literal, $desc:literal, $transform:expr) => {
        LegacyEntry { legacy_name: $legacy, new_tool: $new, description: $desc, transform: $transform }
    };
}

static MIGRATION_MAP: &[LegacyEntry] = &[
    entry!("jive_create_work_item", "jive_manage_work_item", "use jive_manage_work_item with action='create'", |p| {
        let mut obj = as_object(p);
        obj.insert("action".into(), json!("create"));
        Value::Object(obj)
    }),
    entry!("jive_update_work_item", "jive_manage_work_item", "use jive_manage_work_item with action='update'", |p| {
        let mut obj = as_object(p);
        obj.insert("action".into(), json!("update"));
        Value::Object(obj)
    }),
    entry!("jive_create_task", "jive_manage_work_item", "use jive_manage_work_item with action='create' and type='task'", |p| {
        let mut obj = as_object(p);
        obj.insert("action".into(), json!("create"));
        obj.insert("type".into(), json!("task"));
        Value::Object(obj)
    }),
    entry!("jive_update_task", "jive_manage_work_item", "use jive_manage_work_item with action='update'", |p| {
        let mut obj = as_object(p);
        obj.insert("action".into(), json!("update"));
        rename_field(&mut obj, "task_id", "work_item_id");
        Value::Object(obj)
    }),
    entry!("jive_delete_task", "jive_manage_work_item", "use jive_manage_work_item with action='delete'", |p| {
        let mut obj = as_object(p);
        obj.insert("action".into(), json!("delete"));
        rename_field(&mut obj, "task_id", "work_item_id");
        Value::Object(obj)
    }),
    entry!("jive_get_task", "jive_get_work_item", "use jive_get_work_item with action='get'", |p| {
        let mut obj = as_object(p);
        obj.insert("action".into(), json!("get"));
        rename_field(&mut obj, "task_id", "work_item_id");
        Value::Object(obj)
    }),
    entry!("jive_list_work_items", "jive_get_work_item", "use jive_get_work_item with action='list'", |p| {
        let mut obj = as_object(p);
        obj.insert("action".into(), json!("list"));
        Value::Object(obj)
    }),
    entry!("jive_list_tasks", "jive_get_work_item", "use jive_get_work_item with action='list' and type='task'", |p| {
        let mut obj = as_object(p);
        obj.insert("action".into(), json!("list"));
        obj.insert("type".into(), json!("task"));
        Value::Object(obj)
    }),
    entry!("jive_search_work_items", "jive_search_content", "use jive_search_content with action='search'", |p| {
        let mut obj = as_object(p);
        obj.insert("action".into(), json!("search"));
        Value::Object(obj)
    }),
    entry!("jive_search_tasks", "jive_search_content", "use jive_search_content with action='search'", |p| {
        let mut obj = as_object(p);
        obj.insert("action".into(), json!("search"));
        Value::Object(obj)
    }),
    entry!("jive_get_work_item_children", "jive_get_hierarchy", "use jive_get_hierarchy with action='get_children'", |p| {
        let mut obj = as_object(p);
        obj.insert("action".into(), json!("get_children"));
        Value::Object(obj)
    }),
    entry!("jive_get_work_item_dependencies", "jive_get_hierarchy", "use jive_get_hierarchy with action='get_dependencies'", |p| {
        let mut obj = as_object(p);
        obj.insert("action".into(), json!("get_dependencies"));
        obj.insert("relationship_type".into(), json!("dependencies"));
        Value::Object(obj)
    }),
    entry!("jive_get_task_hierarchy", "jive_get_hierarchy", "use jive_get_hierarchy with relationship_type='full_hierarchy'", |p| {
        let mut obj = as_object(p);
        obj.insert("action".into(), json!("get"));
        obj.insert("relationship_type".into(), json!("full_hierarchy"));
        rename_field(&mut obj, "root_task_id", "work_item_id");
        Value::Object(obj)
    }),
    entry!("jive_execute_workflow", "jive_execute_work_item", "use jive_execute_work_item with action='execute'", |p| {
        let mut obj = as_object(p);
        obj.insert("action".into(), json!("execute"));
        rename_field(&mut obj, "workflow_name", "work_item_id");
        Value::Object(obj)
    }),
    entry!("jive_validate_workflow", "jive_get_hierarchy", "use jive_get_hierarchy with action='validate_comprehensive'", |p| {
        let mut obj = as_object(p);
        obj.insert("action".into(), json!("validate_comprehensive"));
        Value::Object(obj)
    }),
    entry!("jive_get_workflow_status", "jive_execute_work_item", "use jive_execute_work_item with action='status'", |p| {
        let mut obj = as_object(p);
        obj.insert("action".into(), json!("status"));
        rename_field(&mut obj, "workflow_id", "execution_id");
        Value::Object(obj)
    }),
    entry!("jive_cancel_workflow", "jive_execute_work_item", "use jive_execute_work_item with action='cancel'", |p| {
        let mut obj = as_object(p);
        obj.insert("action".into(), json!("cancel"));
        rename_field(&mut obj, "workflow_id", "execution_id");
        Value::Object(obj)
    }),
    entry!("jive_get_progress_report", "jive_track_progress", "use jive_track_progress with action='report'", |p| {
        let mut obj = as_object(p);
        obj.insert("action".into(), json!("report"));
        Value::Object(obj)
    }),
    entry!("jive_get_analytics", "jive_track_progress", "use jive_track_progress with action='analytics'", |p| {
        let mut obj = as_object(p);
        obj.insert("action".into(), json!("analytics"));
        Value::Object(obj)
    }),
    entry!("jive_sync_file_to_database", "jive_sync_data", "use jive_sync_data with direction='file_to_db'", |p| {
        let mut obj = as_object(p);
        obj.insert("action".into(), json!("sync"));
        obj.insert("direction".into(), json!("file_to_db"));
        Value::Object(obj)
    }),
    entry!("jive_sync_database_to_file", "jive_sync_data", "use jive_sync_data with direction='db_to_file'", |p| {
        let mut obj = as_object(p);
        obj.insert("action".into(), json!("sync"));
        obj.insert("direction".into(), json!("db_to_file"));
        Value::Object(obj)
    }),
];

fn lookup(legacy_name: &str) -> Option<&'static LegacyEntry> {
    MIGRATION_MAP.iter().find(|e| e.legacy_name == legacy_name)
}

#[must_use]
pub fn is_legacy_tool(name: &str) -> bool {
    lookup(name).is_some()
}

/// Tracks which legacy names have already emitted their one-shot
/// deprecation warning this process (spec §4.3.4).
pub struct LegacyRegistry {
    warned: Mutex<HashSet<&'static str>>,
}

impl Default for LegacyRegistry {
    fn default() -> Self {
        Self { warned: Mutex::new(HashSet::new()) }
    }
}

impl LegacyRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves a legacy tool name to `(new_tool_name, transformed_params)`,
    /// logging a one-shot deprecation warning on the name's first call.
    pub fn translate(&self, legacy_name: &str, params: Value) -> Result<(&'static str, Value), ToolError> {
        let entry = lookup(legacy_name)
            .ok_or_else(|| ToolError::InvalidAction(format!("unknown legacy tool '{legacy_name}'")))?;

        if self.warned.lock().unwrap().insert(entry.legacy_name) {
            warn!(
                legacy_tool = entry.legacy_name,
                new_tool = entry.new_tool,
                "DEPRECATED: {}. {}",
                entry.legacy_name,
                entry.description
            );
        }

        Ok((entry.new_tool, (entry.transform)(params)))
    }

    #[must_use]
    pub fn list(&self) -> Vec<Value> {
        MIGRATION_MAP
            .iter()
            .map(|e| json!({ "legacy_tool": e.legacy_name, "new_tool": e.new_tool, "description": e.description }))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn translate_renames_task_id() {
        let registry = LegacyRegistry::new();
        let (tool, params) = registry.translate("jive_update_task", json!({ "task_id": "abc", "title": "x" })).unwrap();
        assert_eq!(tool, "jive_manage_work_item");
        assert_eq!(params["work_item_id"], "abc");
        assert_eq!(params["action"], "update");
        assert!(params.get("task_id").is_none());
    }

    #[test]
    fn translate_injects_action() {
        let registry = LegacyRegistry::new();
        let (_tool, params) = registry.translate("jive_create_work_item", json!({ "title": "x" })).unwrap();
        assert_eq!(params["action"], "create");
    }

    #[test]
    fn unknown_legacy_tool_errors() {
        let registry = LegacyRegistry::new();
        assert!(registry.translate("not_a_tool", json!({})).is_err());
    }

    #[test]
    fn warns_only_once() {
        let registry = LegacyRegistry::new();
        assert!(registry.warned.lock().unwrap().is_empty());
        registry.translate("jive_create_task", json!({})).unwrap();
        assert_eq!(registry.warned.lock().unwrap().len(), 1);
        registry.translate("jive_create_task", json!({})).unwrap();
        assert_eq!(registry.warned.lock().unwrap().len(), 1);
    }
}
