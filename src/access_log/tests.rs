//! Access Log Tests
//!
//! The eight-field TSV layout is consumed by external tooling, so these tests pin
//! the field count, order and `null` handling.

#[cfg(test)]
mod tests {
    use crate::access_log::record::{AccessRecord, FIELD_COUNT, RequestType};
    use crate::access_log::writer::AccessLog;

    fn record(file_id: &str, request_type: RequestType, status: u16, timestamp: i64) -> AccessRecord {
        AccessRecord {
            file_id: Some(file_id.to_string()),
            requester: Some("192.168.0.7".to_string()),
            node: "localhost:5000".to_string(),
            request_type,
            status,
            size: 128,
            timestamp,
            correlation_id: None,
        }
    }

    // ============================================================
    // RECORD FORMAT TESTS
    // ============================================================

    #[test]
    fn test_record_has_eight_fields_in_order() {
        let line = record("abc", RequestType::Read, 302, 1_700_000_000)
            .with_correlation("req-1")
            .to_string();
        let fields: Vec<&str> = line.split('\t').collect();

        assert_eq!(fields.len(), FIELD_COUNT);
        assert_eq!(
            fields,
            vec![
                "abc",
                "192.168.0.7",
                "localhost:5000",
                "READ",
                "302",
                "128",
                "1700000000",
                "req-1"
            ]
        );
    }

    #[test]
    fn test_absent_values_are_null() {
        let mut rec = record("abc", RequestType::Write, 400, 0);
        rec.file_id = None;
        rec.requester = Some(String::new());
        rec.size = -1;

        let line = rec.to_string();
        let fields: Vec<&str> = line.split('\t').collect();
        assert_eq!(fields[0], "null");
        assert_eq!(fields[1], "null");
        assert_eq!(fields[5], "-1");
        assert_eq!(fields[7], "null");
    }

    #[test]
    fn test_embedded_tabs_do_not_change_field_count() {
        let mut rec = record("abc", RequestType::Read, 200, 0);
        rec.requester = Some("evil\tvalue\nwith breaks".to_string());

        assert_eq!(rec.to_string().split('\t').count(), FIELD_COUNT);
        assert!(!rec.to_string().contains('\n'));
    }

    #[test]
    fn test_request_type_tokens() {
        assert_eq!(RequestType::Write.as_str(), "WRITE");
        assert_eq!(RequestType::Read.as_str(), "READ");
        assert_eq!(RequestType::Transfer.as_str(), "TRANSFER");
        assert_eq!(RequestType::Replicate.as_str(), "REPLICATE");
        assert_eq!(
            RequestType::DistributedReplicate.as_str(),
            "DISTRIBUTED_REPLICATE"
        );
    }

    // ============================================================
    // WRITER TESTS
    // ============================================================

    #[tokio::test]
    async fn test_append_goes_to_daily_file() {
        let dir = tempfile::tempdir().unwrap();
        let log = AccessLog::new(dir.path()).unwrap();

        // 2023-11-14T22:13:20Z and the following day.
        log.append(&record("a", RequestType::Write, 201, 1_700_000_000))
            .await
            .unwrap();
        log.append(&record("b", RequestType::Read, 200, 1_700_000_000))
            .await
            .unwrap();
        log.append(&record("c", RequestType::Read, 404, 1_700_086_400))
            .await
            .unwrap();

        assert_eq!(
            log.list_logs().await.unwrap(),
            vec!["2023-11-14.log", "2023-11-15.log"]
        );

        let day = log.fetch(Some("2023-11-14")).await.unwrap().unwrap();
        let text = String::from_utf8(day).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("a\t"));
        assert!(lines[1].starts_with("b\t"));
    }

    #[tokio::test]
    async fn test_fetch_without_date_returns_earliest() {
        let dir = tempfile::tempdir().unwrap();
        let log = AccessLog::new(dir.path()).unwrap();

        log.append(&record("late", RequestType::Read, 200, 1_700_086_400))
            .await
            .unwrap();
        log.append(&record("early", RequestType::Read, 200, 1_700_000_000))
            .await
            .unwrap();

        let text = String::from_utf8(log.fetch(None).await.unwrap().unwrap()).unwrap();
        assert!(text.starts_with("early\t"));
    }

    #[tokio::test]
    async fn test_fetch_missing_and_invalid_dates() {
        let dir = tempfile::tempdir().unwrap();
        let log = AccessLog::new(dir.path()).unwrap();

        assert!(log.fetch(None).await.unwrap().is_none());
        assert!(log.fetch(Some("2020-01-01")).await.unwrap().is_none());
        assert!(log.fetch(Some("../../etc/passwd")).await.is_err());
    }
}
