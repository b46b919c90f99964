//! epn-pipeline: fail-open notification processing.
//!
//! ```text
//! Received ──> no envelope ─────────────────────────────> Presented (as-is)
//!          └─> envelope ──strip──> decrypt ──ok──> merge ──> Presented
//!                                     └──any error──> Presented (original)
//! ```
//!
//! Push delivery does not redeliver on processing failure, so every error
//! degrades to presenting the original content rather than dropping the
//! notification. The raw envelope is stripped on every path; ciphertext
//! never reaches presentation or logs.

pub mod deadline;
pub mod merge;
pub mod pipeline;

pub use deadline::{process_with_deadline, Enricher};
pub use merge::merge_payload;
pub use pipeline::{Outcome, Pipeline};
