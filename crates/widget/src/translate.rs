use switchboard_common::types::ChannelType;
use switchboard_router::{NormalizedInbound, PayloadTranslator, translate::required_str};

/// Maps widget webhook payloads into the canonical inbound shape.
///
/// The widget frontend supplies a client-generated `message_id` so retried
/// posts deduplicate instead of double-appending.
pub struct WidgetTranslator;

impl PayloadTranslator for WidgetTranslator {
    fn channel_type(&self) -> ChannelType {
        ChannelType::Widget
    }

    fn translate(
        &self,
        payload: &serde_json::Value,
    ) -> switchboard_router::Result<NormalizedInbound> {
        Ok(NormalizedInbound {
            transport_message_id: required_str(payload, "message_id")?.to_string(),
            contact_id: required_str(payload, "visitor_id")?.to_string(),
            contact_name: payload
                .get("name")
                .and_then(|v| v.as_str())
                .map(str::to_string),
            content: required_str(payload, "text")?.to_string(),
        })
    }
}
