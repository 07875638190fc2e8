//! Wire protocol for droplink file transfers.
//!
//! Control messages are textual JSON frames carried out-of-band on the
//! channel; file content travels as raw binary frames between them. A
//! binary frame has no embedded offset or file identifier — it belongs
//! to whatever file the most recent `meta` announced, which is why the
//! sender is strictly sequential.
//!
//! # Message sequencing per file
//!
//! ```text
//! {"type":"meta","name":...,"size":N,"mimeType":...}
//! <binary chunk> × ⌈N / chunk_size⌉
//! {"type":"done"}            (or {"type":"cancel"} on abort)
//! ```

pub mod messages;

pub use messages::{ControlMessage, TransferMeta};
