//! Message records and the approval workflow that owns their lifecycle.

pub mod model;
pub mod workflow;

pub use model::{FormDetails, MessageRecord, RecordStatus};
pub use workflow::ApprovalWorkflow;
