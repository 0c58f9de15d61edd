//! Data model (spec §3). `work_item` and `execution` carry the shapes the
//! engine and store adapter pass around; they are grounded on
//! `original_source/src/mcp_jive/storage/work_item_storage.py`'s row shape,
//! with serde derives following the teacher's `models/paper.rs` convention
//! for enums (`#[serde(rename_all = "snake_case")]` on each enum; the wire
//! format itself stays snake_case throughout, matching `original_source`'s
//! `model_dump()` field names rather than the teacher's camelCase MCP
//! protocol fields).

pub mod execution;
pub mod work_item;

pub use execution::{ExecutionEvent, ExecutionRecord, ExecutionStatus};
pub use work_item::{ItemType, Priority, Status, WorkItem};
