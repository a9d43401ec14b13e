//! Turns raw push frames into typed messages without ever failing the stream.

use tracing::{trace, warn};

use crate::model::StreamMessage;

/// Running counters for frames seen on the push stream.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecoderStats {
    pub frames_seen: u64,
    pub decoded: u64,
    pub dropped: u64,
    pub last_error: Option<String>,
}

#[derive(Debug, Default)]
pub struct MessageDecoder {
    stats: DecoderStats,
}

impl MessageDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode one frame. Malformed JSON and unknown `type` values are
    /// dropped with a diagnostic and yield `None`.
    pub fn decode(&mut self, raw: &str) -> Option<StreamMessage> {
        self.stats.frames_seen += 1;

        match serde_json::from_str::<StreamMessage>(raw) {
            Ok(message) => {
                self.stats.decoded += 1;
                trace!("Decoded {} frame", message.kind());
                Some(message)
            }
            Err(e) => {
                self.stats.dropped += 1;
                warn!("Dropping undecodable frame: {} | raw: {}", e, truncate(raw, 200));
                self.stats.last_error = Some(e.to_string());
                None
            }
        }
    }

    pub fn stats(&self) -> &DecoderStats {
        &self.stats
    }
}

fn truncate(raw: &str, max: usize) -> &str {
    match raw.char_indices().nth(max) {
        Some((idx, _)) => &raw[..idx],
        None => raw,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NoticeLevel;

    #[test]
    fn test_decode_tick() {
        let mut decoder = MessageDecoder::new();
        let raw = r#"{"type":"tick","tick_number":146,"agents":[{"id":"sentinel","price":24.9}],"total_market_cap":3349000,"active_shocks":1,"cascade_probability":0.3}"#;

        match decoder.decode(raw) {
            Some(StreamMessage::Tick(tick)) => {
                assert_eq!(tick.tick_number, Some(146));
                assert_eq!(tick.agents.len(), 1);
                assert_eq!(tick.agents[0].price, Some(24.9));
                assert_eq!(tick.agents[0].market_cap, None);
                assert_eq!(tick.active_shocks, Some(1));
            }
            other => panic!("Expected tick, got {:?}", other),
        }
        assert_eq!(decoder.stats().decoded, 1);
    }

    #[test]
    fn test_decode_shock_and_event() {
        let mut decoder = MessageDecoder::new();

        let shock = decoder.decode(
            r#"{"type":"shock","shock":{"id":"abc","type":"REGULATION","severity":0.8,"description":"New AML directive","timestamp":1700000000.5}}"#,
        );
        assert!(matches!(shock, Some(StreamMessage::Shock { .. })));

        // Shock types are a closed set
        let unknown = decoder.decode(
            r#"{"type":"shock","shock":{"id":"abd","type":"REGULATORY","severity":0.8,"description":"Typo","timestamp":1700000000.5}}"#,
        );
        assert!(unknown.is_none());
        assert_eq!(decoder.stats().dropped, 1);

        let event = decoder.decode(
            r#"{"type":"event","message":"Circuit breaker armed","timestamp":1700000001.0,"level":"warn"}"#,
        );
        match event {
            Some(StreamMessage::Event(notice)) => assert_eq!(notice.level, NoticeLevel::Warn),
            other => panic!("Expected event, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_ping_and_connected() {
        let mut decoder = MessageDecoder::new();
        assert_eq!(decoder.decode(r#"{"type":"ping"}"#), Some(StreamMessage::Ping));

        let connected = decoder.decode(
            r#"{"type":"connected","snapshot":{"tick_number":1,"total_market_cap":10,"cascade_probability":0.1,"agents":[]}}"#,
        );
        assert!(matches!(connected, Some(StreamMessage::Connected { .. })));
    }

    #[test]
    fn test_drops_bad_frames_without_failing() {
        let mut decoder = MessageDecoder::new();

        assert!(decoder.decode("not json").is_none());
        assert!(decoder.decode(r#"{"type":"mystery","x":1}"#).is_none());
        assert!(decoder.decode(r#"{"no_type":true}"#).is_none());
        // Still usable afterwards
        assert!(decoder.decode(r#"{"type":"ping"}"#).is_some());

        let stats = decoder.stats();
        assert_eq!(stats.frames_seen, 4);
        assert_eq!(stats.dropped, 3);
        assert_eq!(stats.decoded, 1);
        assert!(stats.last_error.is_some());
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo", 2), "hé");
        assert_eq!(truncate("abc", 10), "abc");
    }
}
