use std::fmt;

/// Token written for an absent field.
pub const NULL_FIELD: &str = "null";

/// Number of fields in every access-log line.
pub const FIELD_COUNT: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestType {
    Write,
    Read,
    Transfer,
    Replicate,
    DistributedReplicate,
}

impl RequestType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestType::Write => "WRITE",
            RequestType::Read => "READ",
            RequestType::Transfer => "TRANSFER",
            RequestType::Replicate => "REPLICATE",
            RequestType::DistributedReplicate => "DISTRIBUTED_REPLICATE",
        }
    }
}

impl fmt::Display for RequestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One resolved request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessRecord {
    pub file_id: Option<String>,
    pub requester: Option<String>,
    pub node: String,
    pub request_type: RequestType,
    pub status: u16,
    /// Bytes, `-1` when not locally known.
    pub size: i64,
    /// Unix seconds.
    pub timestamp: i64,
    pub correlation_id: Option<String>,
}

impl AccessRecord {
    /// A record stamped with the current time.
    pub fn now(
        file_id: impl Into<String>,
        requester: impl Into<String>,
        node: impl Into<String>,
        request_type: RequestType,
        status: u16,
        size: i64,
    ) -> Self {
        Self {
            file_id: Some(file_id.into()),
            requester: Some(requester.into()),
            node: node.into(),
            request_type,
            status,
            size,
            timestamp: chrono::Utc::now().timestamp(),
            correlation_id: None,
        }
    }

    pub fn with_correlation(mut self, correlation_id: impl Into<String>) -> Self {
        self.correlation_id = Some(correlation_id.into());
        self
    }
}

/// Tabs and line breaks inside a value would change the field count.
fn field(value: Option<&str>) -> String {
    match value {
        Some(v) if !v.is_empty() => v.replace(['\t', '\n', '\r'], " "),
        _ => NULL_FIELD.to_string(),
    }
}

impl fmt::Display for AccessRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}",
            field(self.file_id.as_deref()),
            field(self.requester.as_deref()),
            field(Some(&self.node)),
            self.request_type,
            self.status,
            self.size,
            self.timestamp,
            field(self.correlation_id.as_deref()),
        )
    }
}
