//! Work-item engine, progress tracking, and execution state machine
//! (spec §4.5, §4.7). Implemented as free functions over `&dyn
//! StoreAdapter` rather than a stateful engine object: the store is
//! already namespace-scoped (spec P5), so there is nothing left for an
//! engine instance to own between calls — grounded on
//! `original_source/src/mcp_jive/tools/consolidated/unified_hierarchy_tool.py`,
//! whose `UnifiedHierarchyTool` methods are themselves thin wrappers over
//! a injected storage handle.

pub mod execution;
pub mod progress;
pub mod work_items;
