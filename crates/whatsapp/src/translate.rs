use switchboard_common::types::ChannelType;
use switchboard_router::{NormalizedInbound, PayloadTranslator, translate::required_str};

/// Maps raw WhatsApp payloads into the canonical inbound shape.
pub struct WhatsAppTranslator;

impl PayloadTranslator for WhatsAppTranslator {
    fn channel_type(&self) -> ChannelType {
        ChannelType::WhatsApp
    }

    fn translate(
        &self,
        payload: &serde_json::Value,
    ) -> switchboard_router::Result<NormalizedInbound> {
        Ok(NormalizedInbound {
            transport_message_id: required_str(payload, "message_id")?.to_string(),
            contact_id: required_str(payload, "from")?.to_string(),
            contact_name: payload
                .get("sender_name")
                .and_then(|v| v.as_str())
                .map(str::to_string),
            content: required_str(payload, "text")?.to_string(),
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn full_payload_translates() {
        let payload = serde_json::json!({
            "message_id": "wamid-1",
            "from": "491700000001",
            "sender_name": "Ada",
            "text": "hola",
        });
        let normalized = WhatsAppTranslator.translate(&payload).unwrap();
        assert_eq!(normalized.transport_message_id, "wamid-1");
        assert_eq!(normalized.contact_id, "491700000001");
        assert_eq!(normalized.contact_name.as_deref(), Some("Ada"));
        assert_eq!(normalized.content, "hola");
    }

    #[test]
    fn missing_text_is_malformed() {
        let payload = serde_json::json!({"message_id": "wamid-1", "from": "x"});
        assert!(WhatsAppTranslator.translate(&payload).is_err());
    }
}
