// Wire codec - JSON5 payloads (NaN / Infinity survive, unlike plain JSON)
use crate::application::snapshot_source::{SnapshotRequest, WireRecord};
use crate::domain::event::{Event, PushMessage, WireValue};
use anyhow::Context;
use serde::Serialize;

/// Decode snapshot text into kind-routed records. Entries that are not
/// records come back as `Unrecognized` with no kind.
pub fn decode_snapshot(text: &str, request: &SnapshotRequest) -> anyhow::Result<Vec<WireRecord>> {
    let entries: Vec<WireValue> = json5::from_str(text).context("Failed to parse snapshot payload")?;
    Ok(entries
        .into_iter()
        .map(|entry| match entry {
            WireValue::Record(fields) => WireRecord::route(Event::from(fields), request),
            _ => WireRecord::Unrecognized { kind: None },
        })
        .collect())
}

pub fn decode_push(text: &str) -> anyhow::Result<PushMessage> {
    json5::from_str(text).context("Failed to parse push message")
}

#[derive(Debug, Serialize)]
struct SubscribeCommand<'a> {
    cmd: &'static str,
    stream: &'a str,
}

/// `{"cmd":"subscribe","stream":"<id>"}`
pub fn encode_subscribe(stream: &str) -> anyhow::Result<String> {
    Ok(serde_json::to_string(&SubscribeCommand {
        cmd: "subscribe",
        stream,
    })?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_snapshot_with_non_finite_values() {
        let request = SnapshotRequest::new("/dyn/kfs/snap", vec!["KalmanFilterStateExt".to_string()]);
        let text = r#"[
            {_name_: "KalmanFilterStateExt", tk: "2024-01-01T00:00:00Z", x: [NaN], P: [[Infinity]]},
            {_name_: "Heartbeat"},
        ]"#;

        let records = decode_snapshot(text, &request).unwrap();
        assert_eq!(records.len(), 2);

        let WireRecord::Event(event) = &records[0] else {
            panic!("expected an event, got {:?}", records[0]);
        };
        let x0 = event.get("x").and_then(|x| x.element(0)).and_then(WireValue::as_f64).unwrap();
        assert!(x0.is_nan());
        let p00 = event
            .get("P")
            .and_then(|p| p.element(0))
            .and_then(|row| row.element(0))
            .and_then(WireValue::as_f64)
            .unwrap();
        assert_eq!(p00, f64::INFINITY);

        assert!(matches!(&records[1], WireRecord::Unrecognized { kind: Some(k) } if k == "Heartbeat"));
    }

    #[test]
    fn test_non_record_entries_do_not_sink_the_snapshot() {
        let request = SnapshotRequest::new("/dyn/uls/snap", Vec::new());
        let text = r#"[
            {tm: "2024-01-01T00:00:00Z", upx: 0.1},
            42,
            "stray",
            {tm: "2024-01-01T00:01:00Z", upx: 0.2},
        ]"#;

        let records = decode_snapshot(text, &request).unwrap();
        assert_eq!(records.len(), 4);
        assert!(matches!(&records[0], WireRecord::Event(_)));
        assert_eq!(records[1], WireRecord::Unrecognized { kind: None });
        assert_eq!(records[2], WireRecord::Unrecognized { kind: None });
        assert!(matches!(&records[3], WireRecord::Event(_)));
    }

    #[test]
    fn test_decode_push() {
        let msg = decode_push(r#"{"stream": "/ws/uls", "event": {"tm": "2024-01-01T00:00:00Z", "upx": -Infinity}}"#)
            .unwrap();
        assert_eq!(msg.stream, "/ws/uls");
        assert_eq!(msg.event.get("upx").and_then(WireValue::as_f64), Some(f64::NEG_INFINITY));
    }

    #[test]
    fn test_decode_failure_propagates() {
        assert!(decode_push("{stream: ").is_err());
        assert!(decode_push(r#"{"event": {}}"#).is_err());
    }

    #[test]
    fn test_encode_subscribe() {
        assert_eq!(
            encode_subscribe("/ws/kfs").unwrap(),
            r#"{"cmd":"subscribe","stream":"/ws/kfs"}"#
        );
    }
}
