//! Access Log Module
//!
//! Every request the node resolves is appended as one tab-separated line to a daily
//! file (`logs/YYYY-MM-DD.log`). External analytics tooling consumes these files,
//! so the record layout is a hard contract:
//!
//! ```text
//! fileId  requester  node  requestType  status  size  timestamp  correlationId
//! ```
//!
//! Exactly eight fields; absent values are the literal `null`.

pub mod record;
pub mod writer;

#[cfg(test)]
mod tests;
