//! End-to-end scenarios over the seven unified tools (spec §8), driven
//! directly against `ToolContext` rather than through a transport —
//! grounded on the teacher's `tests/` integration style of exercising
//! the library's public API with a real (temp-directory) backing store.

use std::sync::Arc;

use jive_mcp::namespace::NamespaceManager;
use jive_mcp::store::StoreRegistry;
use jive_mcp::tools::hierarchy::GetHierarchyTool;
use jive_mcp::tools::legacy::LegacyRegistry;
use jive_mcp::tools::manage::ManageWorkItemTool;
use jive_mcp::tools::search::SearchContentTool;
use jive_mcp::tools::sync::SyncDataTool;
use jive_mcp::tools::{McpTool, ToolContext};
use serde_json::json;

async fn test_ctx() -> (ToolContext, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let namespaces = Arc::new(NamespaceManager::new(dir.path(), "default", true).unwrap());
    let stores = Arc::new(StoreRegistry::new(Arc::clone(&namespaces)));
    (ToolContext::new(stores, namespaces, "local-hash-384".to_string()), dir)
}

/// Scenario 3: create an initiative, then an epic parented under it —
/// the epic's sequence number is "1.1".
#[tokio::test]
async fn create_initiative_then_epic_gets_nested_sequence() {
    let (ctx, _dir) = test_ctx().await;
    let manage = ManageWorkItemTool;

    let initiative = manage
        .execute(&ctx, "default", json!({ "action": "create", "type": "initiative", "title": "A" }))
        .await;
    assert!(initiative.success);
    let initiative_id = initiative.data.unwrap()["id"].as_str().unwrap().to_string();

    let epic = manage
        .execute(
            &ctx,
            "default",
            json!({ "action": "create", "type": "epic", "title": "B", "parent_id": initiative_id }),
        )
        .await;
    assert!(epic.success);
    assert_eq!(epic.data.unwrap()["sequence_number"], "1.1");
}

/// Scenario 5: `full_hierarchy` returns a tree rooted at the parent with
/// its child one level deep and no grandchildren.
#[tokio::test]
async fn full_hierarchy_contains_nested_child() {
    let (ctx, _dir) = test_ctx().await;
    let manage = ManageWorkItemTool;
    let hierarchy = GetHierarchyTool;

    let a = manage.execute(&ctx, "default", json!({ "action": "create", "type": "initiative", "title": "A" })).await;
    let a_id = a.data.unwrap()["id"].as_str().unwrap().to_string();
    manage
        .execute(&ctx, "default", json!({ "action": "create", "type": "epic", "title": "B", "parent_id": a_id }))
        .await;

    let tree = hierarchy
        .execute(&ctx, "default", json!({ "action": "get", "work_item_id": a_id, "relationship_type": "full_hierarchy" }))
        .await;
    assert!(tree.success);
    let data = tree.data.unwrap();
    assert_eq!(data["title"], "A");
    assert_eq!(data["children"].as_array().unwrap().len(), 1);
    assert_eq!(data["children"][0]["title"], "B");
}

/// Scenario 4: hybrid search returns the matching item with a positive
/// score, and a `critical`-priority item outranks an otherwise identical
/// `medium`-priority sibling.
#[tokio::test]
async fn hybrid_search_ranks_critical_priority_higher() {
    let (ctx, _dir) = test_ctx().await;
    let manage = ManageWorkItemTool;
    let search = SearchContentTool;

    manage
        .execute(
            &ctx,
            "default",
            json!({ "action": "create", "type": "task", "title": "rebuild parser", "priority": "critical" }),
        )
        .await;
    manage
        .execute(
            &ctx,
            "default",
            json!({ "action": "create", "type": "task", "title": "rebuild parser twin", "priority": "medium" }),
        )
        .await;

    let result = search
        .execute(&ctx, "default", json!({ "action": "search", "query": "rebuild parser", "search_type": "hybrid" }))
        .await;
    assert!(result.success);
    let results = result.data.unwrap()["results"].clone();
    let results = results.as_array().unwrap();
    assert!(!results.is_empty());
    assert!(results[0]["score"].as_f64().unwrap() > 0.0);

    let critical_score = results.iter().find(|r| r["priority"] == "critical").unwrap()["score"].as_f64().unwrap();
    let medium_score = results.iter().find(|r| r["priority"] == "medium").unwrap()["score"].as_f64().unwrap();
    assert!(critical_score > medium_score);
}

/// Legacy call `jive_create_task` maps onto `jive_manage_work_item` with
/// `action="create"` and `type="task"`, and only warns once per name.
#[tokio::test]
async fn legacy_create_task_maps_to_unified_create() {
    let (ctx, _dir) = test_ctx().await;
    let manage = ManageWorkItemTool;
    let legacy = LegacyRegistry::new();

    let (tool_name, translated) = legacy.translate("jive_create_task", json!({ "title": "T" })).unwrap();
    assert_eq!(tool_name, "jive_manage_work_item");
    assert_eq!(translated["action"], "create");
    assert_eq!(translated["type"], "task");

    let outcome = manage.execute(&ctx, "default", translated).await;
    assert!(outcome.success);
    assert_eq!(outcome.data.unwrap()["title"], "T");
}

/// Boundary behaviour: restoring from a path with no backup returns
/// `success=false` with the `BACKUP_NOT_FOUND` error code.
#[tokio::test]
async fn restore_missing_backup_reports_not_found() {
    let (ctx, dir) = test_ctx().await;
    let sync = SyncDataTool;
    let missing_path = dir.path().join("no-such-backup.json");

    let outcome = sync
        .execute(&ctx, "default", json!({ "action": "restore", "file_path": missing_path.to_str().unwrap() }))
        .await;
    assert!(!outcome.success);
    assert_eq!(outcome.error_code, Some("BACKUP_NOT_FOUND"));
}

/// Boundary behaviour: deleting a nonexistent work item fails with
/// `WORK_ITEM_NOT_FOUND`.
#[tokio::test]
async fn delete_nonexistent_work_item_fails() {
    let (ctx, _dir) = test_ctx().await;
    let manage = ManageWorkItemTool;
    let outcome = manage.execute(&ctx, "default", json!({ "action": "delete", "work_item_id": "does-not-exist" })).await;
    assert!(!outcome.success);
    assert_eq!(outcome.error_code, Some("WORK_ITEM_NOT_FOUND"));
}

/// Spec §4.4.1: every tool accepting a `work_item_id` resolves it by
/// title when the caller doesn't have the raw id on hand, not just by
/// exact id.
#[tokio::test]
async fn get_hierarchy_resolves_work_item_by_title() {
    let (ctx, _dir) = test_ctx().await;
    let manage = ManageWorkItemTool;
    let hierarchy = GetHierarchyTool;

    let a = manage
        .execute(&ctx, "default", json!({ "action": "create", "type": "initiative", "title": "Launch Rocket" }))
        .await;
    assert!(a.success);
    let a_id = a.data.unwrap()["id"].as_str().unwrap().to_string();
    manage
        .execute(&ctx, "default", json!({ "action": "create", "type": "epic", "title": "Fuel Tank", "parent_id": a_id }))
        .await;

    let children = hierarchy.execute(&ctx, "default", json!({ "action": "get_children", "work_item_id": "Launch Rocket" })).await;
    assert!(children.success);
    let items = children.data.unwrap();
    let items = items.as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["title"], "Fuel Tank");
}
