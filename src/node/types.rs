/// How a read was resolved. The HTTP binding maps this onto 200 / 302 / 404.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOutcome {
    /// We hold the file; here are its bytes.
    ServeLocal { bytes: Vec<u8> },
    /// Another node holds the file.
    Redirect { address: String },
    NotFound,
}

impl ReadOutcome {
    pub fn status(&self) -> u16 {
        match self {
            ReadOutcome::ServeLocal { .. } => 200,
            ReadOutcome::Redirect { .. } => 302,
            ReadOutcome::NotFound => 404,
        }
    }
}

/// Answer to a capacity query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapacityDecision {
    /// `storage_limit - used_bytes`; negative when over the limit.
    pub space_left: i64,
    pub accepted: bool,
}
