//! Work-item CRUD, sequence numbering, hierarchy traversal, dependency
//! management, validation, and reorder/move/swap/recalculate (spec
//! §4.5.1-§4.5.4, §4.5.7). Grounded on
//! `original_source/src/mcp_jive/tools/consolidated/unified_hierarchy_tool.py`
//! and `unified_reorder_tool.py`.

use std::collections::{HashMap, HashSet};

use chrono::Utc;
use serde::Serialize;

use crate::error::ToolError;
use crate::models::{ItemType, Priority, Status, WorkItem};
use crate::store::StoreAdapter;

/// Partial update (spec §4.5.2). `None` means "leave unchanged"; for
/// `parent_id`, `Some(None)` means "explicitly clear the parent" versus
/// `None` meaning "don't touch it".
#[derive(Debug, Default, Clone)]
pub struct UpdatePatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub status: Option<Status>,
    pub priority: Option<Priority>,
    pub progress_percentage: Option<f64>,
    pub parent_id: Option<Option<String>>,
    pub tags: Option<Vec<String>>,
    pub acceptance_criteria: Option<Vec<String>>,
    pub dependencies: Option<Vec<String>>,
    pub metadata: Option<String>,
}

/// New-item parameters (spec §4.5.1).
#[derive(Debug, Clone)]
pub struct NewWorkItem {
    pub item_type: ItemType,
    pub title: String,
    pub description: String,
    pub parent_id: Option<String>,
    pub priority: Priority,
    pub tags: Vec<String>,
    pub acceptance_criteria: Vec<String>,
    pub dependencies: Vec<String>,
    pub metadata: String,
}

/// Finds the next top-level `(sequence_number, order_index)` (spec
/// §4.5.3): `max(existing top-level integers) + 1`.
fn next_top_level_sequence(top_level: &[&WorkItem]) -> (String, i64) {
    let max = top_level.iter().filter_map(|i| i.sequence_number.parse::<i64>().ok()).max().unwrap_or(0);
    let next = max + 1;
    (next.to_string(), next)
}

/// Finds the next child `(sequence_number, order_index)` under `parent`
/// given its current siblings (spec §4.5.3).
fn next_child_sequence(parent: &WorkItem, siblings: &[&WorkItem]) -> (String, i64) {
    let prefix = format!("{}.", parent.sequence_number);
    let max_k = siblings
        .iter()
        .filter_map(|s| {
            s.sequence_number
                .strip_prefix(prefix.as_str())
                .filter(|suffix| !suffix.contains('.'))
                .and_then(|suffix| suffix.parse::<i64>().ok())
        })
        .max()
        .unwrap_or(0);
    let k = max_k + 1;
    (format!("{prefix}{k}"), parent.order_index * 1000 + k)
}

async fn compute_sequence(
    store: &dyn StoreAdapter,
    parent_id: Option<&str>,
) -> Result<(String, i64), ToolError> {
    let all = store.list_work_items().await?;
    match parent_id {
        None => {
            let top_level: Vec<&WorkItem> = all.iter().filter(|i| i.parent_id.is_none()).collect();
            Ok(next_top_level_sequence(&top_level))
        }
        Some(pid) => {
            let parent = all
                .iter()
                .find(|i| i.id == pid)
                .ok_or_else(|| ToolError::WorkItemNotFound(pid.to_string()))?;
            let siblings: Vec<&WorkItem> =
                all.iter().filter(|i| i.parent_id.as_deref() == Some(pid)).collect();
            Ok(next_child_sequence(parent, &siblings))
        }
    }
}

fn validate_hierarchy_pair(parent: &WorkItem, child_type: ItemType) -> Result<(), ToolError> {
    match parent.item_type.allowed_child() {
        Some(allowed) if allowed == child_type => Ok(()),
        Some(allowed) => Err(ToolError::HierarchyViolation(format!(
            "{} can only parent {}, not {}",
            parent.item_type.as_str(),
            allowed.as_str(),
            child_type.as_str()
        ))),
        None => Err(ToolError::HierarchyViolation(format!(
            "{} is a leaf type and cannot have children",
            parent.item_type.as_str()
        ))),
    }
}

/// Create a work item (spec §4.5.1).
pub async fn create(
    store: &dyn StoreAdapter,
    embedding_model: &str,
    new: NewWorkItem,
) -> Result<WorkItem, ToolError> {
    if new.title.trim().is_empty() {
        return Err(ToolError::validation("title", "title must not be empty"));
    }

    if let Some(pid) = &new.parent_id {
        let parent = store
            .get_work_item(pid)
            .await?
            .ok_or_else(|| ToolError::WorkItemNotFound(pid.clone()))?;
        validate_hierarchy_pair(&parent, new.item_type)?;
    }

    let mut item = WorkItem::new(new.item_type, new.title, new.description);
    item.parent_id = new.parent_id.clone();
    item.priority = new.priority;
    item.tags = new.tags;
    item.acceptance_criteria = new.acceptance_criteria;
    item.dependencies = new.dependencies;
    item.metadata = new.metadata;
    item.vector = crate::embedding::embed(embedding_model, &item.embedding_text());

    let (seq, order) = compute_sequence(store, new.parent_id.as_deref()).await?;
    item.sequence_number = seq;
    item.order_index = order;

    store.add_work_item(&item).await?;
    Ok(item)
}

/// Apply a partial update (spec §4.5.2). Store has no in-place update:
/// the old row is deleted and the merged row reinserted, then re-read to
/// verify the write.
pub async fn update(
    store: &dyn StoreAdapter,
    embedding_model: &str,
    id: &str,
    patch: UpdatePatch,
    auto_calculate_status: bool,
) -> Result<WorkItem, ToolError> {
    let mut item = store.get_work_item(id).await?.ok_or_else(|| ToolError::WorkItemNotFound(id.to_string()))?;

    let mut text_changed = false;
    if let Some(title) = patch.title {
        text_changed = text_changed || title != item.title;
        item.title = title;
    }
    if let Some(description) = patch.description {
        text_changed = text_changed || description != item.description;
        item.description = description;
    }
    if let Some(tags) = patch.tags {
        item.tags = tags;
    }
    if let Some(ac) = patch.acceptance_criteria {
        item.acceptance_criteria = ac;
    }
    if let Some(deps) = patch.dependencies {
        item.dependencies = deps;
    }
    if let Some(metadata) = patch.metadata {
        item.metadata = metadata;
    }
    if let Some(priority) = patch.priority {
        item.priority = priority;
    }

    let mut reparented = false;
    if let Some(new_parent) = patch.parent_id {
        if new_parent != item.parent_id {
            if let Some(pid) = &new_parent {
                let parent = store
                    .get_work_item(pid)
                    .await?
                    .ok_or_else(|| ToolError::WorkItemNotFound(pid.clone()))?;
                validate_hierarchy_pair(&parent, item.item_type)?;
            }
            item.parent_id = new_parent;
            reparented = true;
        }
    }

    // Progress must be applied before status, so an explicit `status`
    // in the same call always wins (spec §4.5.2 status side effects).
    if let Some(progress) = patch.progress_percentage {
        item.apply_progress(progress, auto_calculate_status);
    }
    if let Some(status) = patch.status {
        item.apply_status(status);
    }

    if text_changed {
        item.vector = crate::embedding::embed(embedding_model, &item.embedding_text());
    }
    if reparented {
        let (seq, order) = compute_sequence(store, item.parent_id.as_deref()).await?;
        item.sequence_number = seq;
        item.order_index = order;
    }
    item.updated_at = Utc::now();

    // Store has no in-place update (spec §4.5.2); delete-then-reinsert is
    // serialised with retry against concurrent writers of the same id
    // (spec §5).
    crate::store::sqlite::with_retry(|| async {
        store.delete_work_item(id).await?;
        store.add_work_item(&item).await
    })
    .await?;

    let verified = store
        .get_work_item(id)
        .await?
        .ok_or_else(|| ToolError::internal("write verification failed: item vanished after update"))?;
    Ok(verified)
}

pub async fn delete(store: &dyn StoreAdapter, id: &str) -> Result<(), ToolError> {
    if store.delete_work_item(id).await? {
        Ok(())
    } else {
        Err(ToolError::WorkItemNotFound(id.to_string()))
    }
}

/// Resolve a `work_item_id` argument per spec §4.4.1: exact id, then
/// exact case-insensitive title, then keyword-AND over title+description.
pub async fn resolve_identifier(store: &dyn StoreAdapter, identifier: &str) -> Result<WorkItem, ToolError> {
    if let Some(item) = store.get_work_item(identifier).await? {
        return Ok(item);
    }

    let all = store.list_work_items().await?;
    let lower = identifier.to_lowercase();
    if let Some(item) = all.iter().find(|i| i.title.to_lowercase() == lower) {
        return Ok(item.clone());
    }

    let terms: Vec<&str> = identifier.split_whitespace().collect();
    if !terms.is_empty() {
        if let Some(item) = all.iter().find(|i| {
            let haystack = format!("{} {}", i.title, i.description).to_lowercase();
            terms.iter().all(|t| haystack.contains(&t.to_lowercase()))
        }) {
            return Ok(item.clone());
        }
    }

    Err(ToolError::WorkItemNotFound(identifier.to_string()))
}

pub async fn children(store: &dyn StoreAdapter, id: &str) -> Result<Vec<WorkItem>, ToolError> {
    let all = store.list_work_items().await?;
    let mut out: Vec<WorkItem> =
        all.into_iter().filter(|i| i.parent_id.as_deref() == Some(id)).collect();
    out.sort_by_key(|i| i.order_index);
    Ok(out)
}

/// Ancestor chain from the immediate parent to the root, cycle-guarded.
pub async fn parents(store: &dyn StoreAdapter, id: &str) -> Result<Vec<WorkItem>, ToolError> {
    let all = store.list_work_items().await?;
    let by_id: HashMap<&str, &WorkItem> = all.iter().map(|i| (i.id.as_str(), i)).collect();

    let mut chain = Vec::new();
    let mut visited = HashSet::new();
    visited.insert(id.to_string());
    let mut current = by_id.get(id).and_then(|i| i.parent_id.as_deref());
    while let Some(pid) = current {
        if !visited.insert(pid.to_string()) {
            break; // cycle guard
        }
        let Some(parent) = by_id.get(pid) else { break };
        chain.push((*parent).clone());
        current = parent.parent_id.as_deref();
    }
    Ok(chain)
}

#[derive(Debug, Clone, Serialize)]
pub struct HierarchyNode {
    #[serde(flatten)]
    pub item: WorkItem,
    pub children: Vec<HierarchyNode>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct HierarchyFilter {
    pub include_completed: bool,
    pub include_cancelled: bool,
}

impl HierarchyFilter {
    fn passes(self, item: &WorkItem) -> bool {
        (self.include_completed || item.status != Status::Completed)
            && (self.include_cancelled || item.status != Status::Cancelled)
    }
}

/// DFS tree rooted at `id`, cycle-guarded, bounded by `max_depth` (spec
/// §4.5.5).
pub async fn full_hierarchy(
    store: &dyn StoreAdapter,
    id: &str,
    max_depth: usize,
    filter: HierarchyFilter,
) -> Result<HierarchyNode, ToolError> {
    let all = store.list_work_items().await?;
    let root = all.iter().find(|i| i.id == id).ok_or_else(|| ToolError::WorkItemNotFound(id.to_string()))?;

    let mut by_parent: HashMap<&str, Vec<&WorkItem>> = HashMap::new();
    for item in &all {
        if let Some(pid) = &item.parent_id {
            by_parent.entry(pid.as_str()).or_default().push(item);
        }
    }
    for siblings in by_parent.values_mut() {
        siblings.sort_by_key(|i| i.order_index);
    }

    fn build(
        node: &WorkItem,
        by_parent: &HashMap<&str, Vec<&WorkItem>>,
        depth: usize,
        max_depth: usize,
        visited: &mut HashSet<String>,
        filter: HierarchyFilter,
    ) -> HierarchyNode {
        let children = if depth >= max_depth || !visited.insert(node.id.clone()) {
            Vec::new()
        } else {
            by_parent
                .get(node.id.as_str())
                .into_iter()
                .flatten()
                .filter(|c| filter.passes(c))
                .map(|c| build(c, by_parent, depth + 1, max_depth, visited, filter))
                .collect()
        };
        HierarchyNode { item: node.clone(), children }
    }

    let mut visited = HashSet::new();
    Ok(build(root, &by_parent, 0, max_depth, &mut visited, filter))
}

pub async fn ancestors(store: &dyn StoreAdapter, id: &str) -> Result<Vec<WorkItem>, ToolError> {
    parents(store, id).await
}

pub async fn descendants(
    store: &dyn StoreAdapter,
    id: &str,
    filter: HierarchyFilter,
) -> Result<Vec<WorkItem>, ToolError> {
    let tree = full_hierarchy(store, id, usize::MAX, filter).await?;
    let mut out = Vec::new();
    fn flatten(node: &HierarchyNode, out: &mut Vec<WorkItem>) {
        for child in &node.children {
            out.push(child.item.clone());
            flatten(child, out);
        }
    }
    flatten(&tree, &mut out);
    Ok(out)
}

pub async fn dependencies(store: &dyn StoreAdapter, id: &str) -> Result<Vec<WorkItem>, ToolError> {
    let item = store.get_work_item(id).await?.ok_or_else(|| ToolError::WorkItemNotFound(id.to_string()))?;
    let mut out = Vec::new();
    for dep_id in &item.dependencies {
        if let Some(dep) = store.get_work_item(dep_id).await? {
            out.push(dep);
        }
    }
    Ok(out)
}

pub async fn dependents(store: &dyn StoreAdapter, id: &str) -> Result<Vec<WorkItem>, ToolError> {
    let all = store.list_work_items().await?;
    Ok(all.into_iter().filter(|i| i.dependencies.iter().any(|d| d == id)).collect())
}

/// True if `target` can reach `source` via dependency edges (cycle check
/// for `add_dependency`, spec §4.5.6).
fn reaches(by_id: &HashMap<&str, &WorkItem>, from: &str, to: &str) -> bool {
    let mut visited = HashSet::new();
    let mut stack = vec![from.to_string()];
    while let Some(current) = stack.pop() {
        if current == to {
            return true;
        }
        if !visited.insert(current.clone()) {
            continue;
        }
        if let Some(item) = by_id.get(current.as_str()) {
            stack.extend(item.dependencies.iter().cloned());
        }
    }
    false
}

pub async fn add_dependency(store: &dyn StoreAdapter, src: &str, tgt: &str) -> Result<WorkItem, ToolError> {
    if src == tgt {
        return Err(ToolError::CircularDependency(format!("{src} cannot depend on itself")));
    }
    let all = store.list_work_items().await?;
    let by_id: HashMap<&str, &WorkItem> = all.iter().map(|i| (i.id.as_str(), i)).collect();
    if !by_id.contains_key(src) {
        return Err(ToolError::WorkItemNotFound(src.to_string()));
    }
    if !by_id.contains_key(tgt) {
        return Err(ToolError::WorkItemNotFound(tgt.to_string()));
    }
    if reaches(&by_id, tgt, src) {
        return Err(ToolError::CircularDependency(format!(
            "{tgt} already (transitively) depends on {src}"
        )));
    }

    let mut item = (*by_id[src]).clone();
    if !item.dependencies.iter().any(|d| d == tgt) {
        item.dependencies.push(tgt.to_string());
    }
    item.updated_at = Utc::now();
    store.delete_work_item(src).await?;
    store.add_work_item(&item).await?;
    Ok(item)
}

pub async fn remove_dependency(store: &dyn StoreAdapter, src: &str, tgt: &str) -> Result<WorkItem, ToolError> {
    let mut item = store.get_work_item(src).await?.ok_or_else(|| ToolError::WorkItemNotFound(src.to_string()))?;
    item.dependencies.retain(|d| d != tgt);
    item.updated_at = Utc::now();
    store.delete_work_item(src).await?;
    store.add_work_item(&item).await?;
    Ok(item)
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidationReport {
    pub is_valid: bool,
    pub orphans: Vec<String>,
    pub cycles: Vec<Vec<String>>,
    pub invalid_references: Vec<String>,
    pub depth_violations: Vec<String>,
}

const MAX_RECOMMENDED_DEPTH: usize = 10;

/// Comprehensive validator (spec §4.5.7): orphans, cycles, invalid
/// references, depth violations.
pub async fn validate_comprehensive(
    store: &dyn StoreAdapter,
    root_id: Option<&str>,
) -> Result<ValidationReport, ToolError> {
    let all = store.list_work_items().await?;
    let by_id: HashMap<&str, &WorkItem> = all.iter().map(|i| (i.id.as_str(), i)).collect();

    let mut invalid_references = Vec::new();
    for item in &all {
        if let Some(pid) = &item.parent_id {
            if !by_id.contains_key(pid.as_str()) {
                invalid_references.push(item.id.clone());
                continue;
            }
        }
        if item.dependencies.iter().any(|d| !by_id.contains_key(d.as_str())) {
            invalid_references.push(item.id.clone());
        }
    }
    let invalid_set: HashSet<&str> = invalid_references.iter().map(String::as_str).collect();

    // Cycle detection over parent-edges unioned with dependency-edges: a
    // proper multi-successor DFS, since a node's parent and its
    // dependencies are both edges a cycle can run through (spec §4.5.7(2),
    // P3). `InStack` nodes are on the current DFS path; `Done` nodes have
    // been fully explored and can't contribute a new cycle.
    #[derive(Clone, Copy, PartialEq, Eq)]
    enum Visit {
        InStack,
        Done,
    }

    fn visit(
        node: &str,
        by_id: &HashMap<&str, &WorkItem>,
        state: &mut HashMap<String, Visit>,
        path: &mut Vec<String>,
        cycles: &mut Vec<Vec<String>>,
    ) {
        if let Some(&s) = state.get(node) {
            if s == Visit::InStack {
                if let Some(idx) = path.iter().position(|n| n == node) {
                    cycles.push(path[idx..].to_vec());
                }
            }
            return;
        }
        let Some(item) = by_id.get(node) else { return };
        state.insert(node.to_string(), Visit::InStack);
        path.push(node.to_string());
        for succ in item.parent_id.iter().chain(item.dependencies.iter()) {
            visit(succ, by_id, state, path, cycles);
        }
        path.pop();
        state.insert(node.to_string(), Visit::Done);
    }

    let mut cycles: Vec<Vec<String>> = Vec::new();
    let mut state: HashMap<String, Visit> = HashMap::new();
    let mut path: Vec<String> = Vec::new();
    for item in &all {
        if !state.contains_key(item.id.as_str()) {
            visit(&item.id, &by_id, &mut state, &mut path, &mut cycles);
        }
    }
    // The same cycle can surface once per node that leads into it; report
    // each distinct cycle once.
    let mut seen_cycle_sets: HashSet<std::collections::BTreeSet<String>> = HashSet::new();
    cycles.retain(|c| seen_cycle_sets.insert(c.iter().cloned().collect()));

    let mut orphans = Vec::new();
    let mut depth_violations = Vec::new();
    for item in &all {
        if invalid_set.contains(item.id.as_str()) {
            continue;
        }
        let mut visited = HashSet::new();
        visited.insert(item.id.clone());
        let mut current = item.parent_id.clone();
        let mut depth = 0usize;
        let mut terminated_at_root = item.parent_id.is_none();
        let mut final_root = item.id.clone();
        let mut cyclic = false;
        while let Some(pid) = current {
            if !visited.insert(pid.clone()) {
                cyclic = true;
                break;
            }
            depth += 1;
            let Some(parent) = by_id.get(pid.as_str()) else {
                terminated_at_root = false;
                break;
            };
            final_root = parent.id.clone();
            if parent.parent_id.is_none() {
                terminated_at_root = true;
                current = None;
            } else {
                current = parent.parent_id.clone();
            }
        }
        if cyclic {
            continue; // already captured as a cycle
        }
        let root_mismatch = root_id.is_some_and(|r| terminated_at_root && final_root != r);
        if !terminated_at_root || root_mismatch {
            orphans.push(item.id.clone());
        }
        if depth > MAX_RECOMMENDED_DEPTH {
            depth_violations.push(item.id.clone());
        }
    }

    let is_valid =
        orphans.is_empty() && cycles.is_empty() && invalid_references.is_empty() && depth_violations.is_empty();

    Ok(ValidationReport { is_valid, orphans, cycles, invalid_references, depth_violations })
}

#[derive(Debug, Clone, Copy)]
pub enum OrphanAction<'a> {
    MoveToRoot,
    Delete,
    AssignParent(&'a str),
}

#[derive(Debug, Clone, Serialize)]
pub struct OrphanOutcome {
    pub id: String,
    pub success: bool,
    pub detail: String,
}

/// Apply a cleanup action to the orphan set (spec §4.5.7).
pub async fn cleanup_orphans(
    store: &dyn StoreAdapter,
    embedding_model: &str,
    orphan_ids: &[String],
    action: OrphanAction<'_>,
) -> Vec<OrphanOutcome> {
    let mut outcomes = Vec::new();
    for id in orphan_ids {
        let result: Result<String, ToolError> = async {
            match action {
                OrphanAction::Delete => {
                    delete(store, id).await?;
                    Ok("deleted".to_string())
                }
                OrphanAction::MoveToRoot => {
                    update(
                        store,
                        embedding_model,
                        id,
                        UpdatePatch { parent_id: Some(None), ..Default::default() },
                        true,
                    )
                    .await?;
                    Ok("moved to root".to_string())
                }
                OrphanAction::AssignParent(parent) => {
                    update(
                        store,
                        embedding_model,
                        id,
                        UpdatePatch { parent_id: Some(Some(parent.to_string())), ..Default::default() },
                        true,
                    )
                    .await?;
                    Ok(format!("assigned parent {parent}"))
                }
            }
        }
        .await;

        outcomes.push(match result {
            Ok(detail) => OrphanOutcome { id: id.clone(), success: true, detail },
            Err(e) => OrphanOutcome { id: id.clone(), success: false, detail: e.to_string() },
        });
    }
    outcomes
}

#[derive(Debug, Clone, Serialize)]
pub struct ReorderOutcome {
    pub id: String,
    pub sequence_number: String,
    pub order_index: i64,
}

fn positional_sequence(parent: Option<&WorkItem>, position_one_based: i64) -> (String, i64) {
    match parent {
        Some(p) => (format!("{}.{}", p.sequence_number, position_one_based), p.order_index * 1000 + position_one_based),
        None => (position_one_based.to_string(), position_one_based),
    }
}

/// Reorder a set of siblings into the given order (spec §4.5.4).
pub async fn reorder(store: &dyn StoreAdapter, work_item_ids: &[String]) -> Result<Vec<ReorderOutcome>, ToolError> {
    let mut items = Vec::new();
    for id in work_item_ids {
        items.push(store.get_work_item(id).await?.ok_or_else(|| ToolError::WorkItemNotFound(id.clone()))?);
    }
    let parent_id = items.first().map(|i| i.parent_id.clone()).unwrap_or(None);
    if items.iter().any(|i| i.parent_id != parent_id) {
        return Err(ToolError::validation("work_item_ids", "all items must share the same parent"));
    }
    let parent = match &parent_id {
        Some(pid) => Some(store.get_work_item(pid).await?.ok_or_else(|| ToolError::WorkItemNotFound(pid.clone()))?),
        None => None,
    };

    let mut outcomes = Vec::new();
    for (idx, mut item) in items.into_iter().enumerate() {
        let (seq, order) = positional_sequence(parent.as_ref(), idx as i64 + 1);
        item.sequence_number = seq.clone();
        item.order_index = order;
        item.updated_at = Utc::now();
        store.delete_work_item(&item.id).await?;
        store.add_work_item(&item).await?;
        outcomes.push(ReorderOutcome { id: item.id, sequence_number: seq, order_index: order });
    }
    Ok(outcomes)
}

/// Move an item to a new parent at `position` (-1 = append), renumbering
/// siblings (spec §4.5.4).
pub async fn move_item(
    store: &dyn StoreAdapter,
    id: &str,
    new_parent_id: Option<String>,
    position: i64,
) -> Result<Vec<ReorderOutcome>, ToolError> {
    let item = store.get_work_item(id).await?.ok_or_else(|| ToolError::WorkItemNotFound(id.to_string()))?;
    if let Some(pid) = &new_parent_id {
        let parent = store.get_work_item(pid).await?.ok_or_else(|| ToolError::WorkItemNotFound(pid.clone()))?;
        validate_hierarchy_pair(&parent, item.item_type)?;
    }

    let all = store.list_work_items().await?;
    let mut siblings: Vec<WorkItem> = all
        .into_iter()
        .filter(|i| i.id != id && i.parent_id == new_parent_id)
        .collect();
    siblings.sort_by_key(|i| i.order_index);

    let insert_at = if position < 0 || position as usize >= siblings.len() {
        siblings.len()
    } else {
        position as usize
    };

    let mut moved = item;
    moved.parent_id = new_parent_id.clone();
    siblings.insert(insert_at, moved);

    let ids: Vec<String> = siblings.iter().map(|i| i.id.clone()).collect();
    // Persist parent_id change for the moved item before reorder recomputes sequences.
    for sib in &siblings {
        if sib.id == id {
            let mut updated = sib.clone();
            updated.updated_at = Utc::now();
            store.delete_work_item(id).await?;
            store.add_work_item(&updated).await?;
        }
    }
    reorder(store, &ids).await
}

pub async fn swap(store: &dyn StoreAdapter, a_id: &str, b_id: &str) -> Result<(WorkItem, WorkItem), ToolError> {
    let mut a = store.get_work_item(a_id).await?.ok_or_else(|| ToolError::WorkItemNotFound(a_id.to_string()))?;
    let mut b = store.get_work_item(b_id).await?.ok_or_else(|| ToolError::WorkItemNotFound(b_id.to_string()))?;
    if a.parent_id != b.parent_id {
        return Err(ToolError::validation("work_item_ids", "items must share a parent to swap"));
    }
    std::mem::swap(&mut a.sequence_number, &mut b.sequence_number);
    std::mem::swap(&mut a.order_index, &mut b.order_index);
    a.updated_at = Utc::now();
    b.updated_at = Utc::now();
    store.delete_work_item(a_id).await?;
    store.add_work_item(&a).await?;
    store.delete_work_item(b_id).await?;
    store.add_work_item(&b).await?;
    Ok((a, b))
}

/// Regenerate all sequence numbers/order indices from scratch (spec
/// §4.5.3 "Regeneration"): DFS from the roots, siblings ordered by
/// `(order_index, created_at)`. Best-effort: every item's write is
/// attempted and reported independently.
pub async fn recalculate(store: &dyn StoreAdapter) -> Result<Vec<ReorderOutcome>, ToolError> {
    let all = store.list_work_items().await?;
    let mut by_parent: HashMap<Option<String>, Vec<WorkItem>> = HashMap::new();
    for item in all {
        by_parent.entry(item.parent_id.clone()).or_default().push(item);
    }
    for siblings in by_parent.values_mut() {
        siblings.sort_by(|a, b| a.order_index.cmp(&b.order_index).then(a.created_at.cmp(&b.created_at)));
    }

    let mut outcomes = Vec::new();
    let roots = by_parent.remove(&None).unwrap_or_default();

    // Iterative DFS carrying the (possibly just-renumbered) parent.
    let mut work: Vec<WorkItem> = Vec::new();
    {
        let mut frontier: Vec<(WorkItem, Option<WorkItem>)> =
            roots.into_iter().rev().map(|root| (root, None)).collect();
        let mut position_counters: HashMap<Option<String>, i64> = HashMap::new();
        while let Some((mut node, parent)) = frontier.pop() {
            let counter = position_counters.entry(node.parent_id.clone()).or_insert(0);
            *counter += 1;
            let position = *counter;
            let (seq, order) = positional_sequence(parent.as_ref(), position);
            node.sequence_number = seq;
            node.order_index = order;
            let children = by_parent.remove(&Some(node.id.clone())).unwrap_or_default();
            work.push(node.clone());
            for child in children.into_iter().rev() {
                frontier.push((child, Some(node.clone())));
            }
        }
    }

    for mut item in work {
        item.updated_at = Utc::now();
        let outcome = async {
            store.delete_work_item(&item.id).await?;
            store.add_work_item(&item).await?;
            Ok::<_, ToolError>(())
        }
        .await;
        match outcome {
            Ok(()) => outcomes.push(ReorderOutcome {
                id: item.id,
                sequence_number: item.sequence_number,
                order_index: item.order_index,
            }),
            Err(e) => {
                tracing::warn!(id = %item.id, error = %e, "recalculate: item write failed");
            }
        }
    }
    Ok(outcomes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::sqlite::SqliteStore;

    async fn store() -> (SqliteStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::open(dir.path()).unwrap();
        store.ensure_fts_index().await.unwrap();
        (store, dir)
    }

    fn new_item(item_type: ItemType, title: &str, parent_id: Option<String>) -> NewWorkItem {
        NewWorkItem {
            item_type,
            title: title.to_string(),
            description: String::new(),
            parent_id,
            priority: Priority::Medium,
            tags: Vec::new(),
            acceptance_criteria: Vec::new(),
            dependencies: Vec::new(),
            metadata: "{}".to_string(),
        }
    }

    #[tokio::test]
    async fn create_assigns_sequential_top_level_numbers() {
        let (store, _dir) = store().await;
        let a = create(&store, "local-hash-384", new_item(ItemType::Initiative, "A", None)).await.unwrap();
        let b = create(&store, "local-hash-384", new_item(ItemType::Initiative, "B", None)).await.unwrap();
        assert_eq!(a.sequence_number, "1");
        assert_eq!(b.sequence_number, "2");
    }

    #[tokio::test]
    async fn create_child_gets_dotted_sequence() {
        let (store, _dir) = store().await;
        let a = create(&store, "local-hash-384", new_item(ItemType::Initiative, "A", None)).await.unwrap();
        let epic = create(&store, "local-hash-384", new_item(ItemType::Epic, "B", Some(a.id.clone()))).await.unwrap();
        assert_eq!(epic.sequence_number, "1.1");
        assert_eq!(epic.order_index, 1001);
    }

    #[tokio::test]
    async fn create_rejects_wrong_hierarchy_pair() {
        let (store, _dir) = store().await;
        let a = create(&store, "local-hash-384", new_item(ItemType::Initiative, "A", None)).await.unwrap();
        let err = create(&store, "local-hash-384", new_item(ItemType::Task, "bad", Some(a.id))).await.unwrap_err();
        assert_eq!(err.error_code(), "HIERARCHY_VIOLATION");
    }

    #[tokio::test]
    async fn update_completed_status_forces_full_progress() {
        let (store, _dir) = store().await;
        let item = create(&store, "local-hash-384", new_item(ItemType::Task, "T", None)).await.unwrap();
        let updated = update(
            &store,
            "local-hash-384",
            &item.id,
            UpdatePatch { status: Some(Status::Completed), ..Default::default() },
            true,
        )
        .await
        .unwrap();
        assert_eq!(updated.progress_percentage, 100.0);
        assert!(updated.completed_at.is_some());
    }

    #[tokio::test]
    async fn self_dependency_is_circular() {
        let (store, _dir) = store().await;
        let item = create(&store, "local-hash-384", new_item(ItemType::Task, "T", None)).await.unwrap();
        let err = add_dependency(&store, &item.id, &item.id).await.unwrap_err();
        assert_eq!(err.error_code(), "CIRCULAR_DEPENDENCY");
    }

    #[tokio::test]
    async fn add_dependency_rejects_cycle() {
        let (store, _dir) = store().await;
        let a = create(&store, "local-hash-384", new_item(ItemType::Task, "A", None)).await.unwrap();
        let b = create(&store, "local-hash-384", new_item(ItemType::Task, "B", None)).await.unwrap();
        add_dependency(&store, &a.id, &b.id).await.unwrap();
        let err = add_dependency(&store, &b.id, &a.id).await.unwrap_err();
        assert_eq!(err.error_code(), "CIRCULAR_DEPENDENCY");
    }

    #[tokio::test]
    async fn resolve_identifier_falls_back_to_keyword_and() {
        let (store, _dir) = store().await;
        let mut item = NewWorkItem {
            description: "rebuild the query parser module".to_string(),
            ..new_item(ItemType::Task, "Refactor parser", None)
        };
        item.description = "rebuild the query parser module".to_string();
        let created = create(&store, "local-hash-384", item).await.unwrap();
        let found = resolve_identifier(&store, "parser module").await.unwrap();
        assert_eq!(found.id, created.id);
    }

    #[tokio::test]
    async fn recalculate_is_idempotent() {
        let (store, _dir) = store().await;
        let a = create(&store, "local-hash-384", new_item(ItemType::Initiative, "A", None)).await.unwrap();
        create(&store, "local-hash-384", new_item(ItemType::Epic, "B", Some(a.id.clone()))).await.unwrap();
        let first = recalculate(&store).await.unwrap();
        let second = recalculate(&store).await.unwrap();
        let mut first_map: HashMap<_, _> = first.into_iter().map(|o| (o.id, o.sequence_number)).collect();
        for outcome in second {
            assert_eq!(first_map.remove(&outcome.id), Some(outcome.sequence_number));
        }
    }

    #[tokio::test]
    async fn validate_comprehensive_reports_invalid_reference() {
        let (store, _dir) = store().await;
        let mut item = WorkItem::new(ItemType::Task, "orphaned".into(), String::new());
        item.parent_id = Some("missing-parent".to_string());
        item.sequence_number = "1".into();
        store.add_work_item(&item).await.unwrap();
        let report = validate_comprehensive(&store, None).await.unwrap();
        assert!(!report.is_valid);
        assert!(report.invalid_references.contains(&item.id));
    }

    #[tokio::test]
    async fn validate_comprehensive_catches_multi_edge_cycle() {
        let (store, _dir) = store().await;
        // A depends on [B, C], C depends on A. The cycle (A -> C -> A) only
        // shows up by walking C's dependency edges, not A's first edge
        // (A -> B), so a single-successor walk from A would miss it.
        let mut a = WorkItem::new(ItemType::Task, "A".into(), String::new());
        a.sequence_number = "1".into();
        let mut b = WorkItem::new(ItemType::Task, "B".into(), String::new());
        b.sequence_number = "2".into();
        let mut c = WorkItem::new(ItemType::Task, "C".into(), String::new());
        c.sequence_number = "3".into();

        a.dependencies = vec![b.id.clone(), c.id.clone()];
        c.dependencies = vec![a.id.clone()];

        store.add_work_item(&a).await.unwrap();
        store.add_work_item(&b).await.unwrap();
        store.add_work_item(&c).await.unwrap();

        let report = validate_comprehensive(&store, None).await.unwrap();
        assert!(!report.is_valid);
        assert!(!report.cycles.is_empty());
        let found = report.cycles.iter().any(|cycle| {
            let set: HashSet<&str> = cycle.iter().map(String::as_str).collect();
            set.contains(a.id.as_str()) && set.contains(c.id.as_str())
        });
        assert!(found, "expected a reported cycle containing both A and C, got {:?}", report.cycles);
    }
}
