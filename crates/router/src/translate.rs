//! Provider payload translation, pluggable per channel type.

use std::collections::HashMap;

use switchboard_common::types::ChannelType;

use crate::{Error, Result};

/// Canonical shape of a translated inbound event, before it becomes a
/// stored [`switchboard_common::types::Message`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedInbound {
    /// Transport-level message id, used for redelivery dedup.
    pub transport_message_id: String,
    /// Channel-specific contact reference (JID, open-id, widget session…).
    pub contact_id: String,
    pub contact_name: Option<String>,
    pub content: String,
}

/// Translates one channel type's provider payloads into the canonical shape.
pub trait PayloadTranslator: Send + Sync {
    fn channel_type(&self) -> ChannelType;

    fn translate(&self, payload: &serde_json::Value) -> Result<NormalizedInbound>;
}

/// Registry of payload translators, keyed by channel type.
#[derive(Default)]
pub struct TranslatorRegistry {
    translators: HashMap<ChannelType, Box<dyn PayloadTranslator>>,
}

impl TranslatorRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, translator: Box<dyn PayloadTranslator>) {
        self.translators.insert(translator.channel_type(), translator);
    }

    pub fn translate(
        &self,
        channel_type: ChannelType,
        payload: &serde_json::Value,
    ) -> Result<NormalizedInbound> {
        let translator = self
            .translators
            .get(&channel_type)
            .ok_or(Error::NoTranslator(channel_type))?;
        translator.translate(payload)
    }

    #[must_use]
    pub fn supports(&self, channel_type: ChannelType) -> bool {
        self.translators.contains_key(&channel_type)
    }
}

/// Pull a required string field out of a provider payload.
pub fn required_str<'a>(payload: &'a serde_json::Value, field: &str) -> Result<&'a str> {
    payload
        .get(field)
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| Error::malformed(format!("missing field: {field}")))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    struct WidgetLike;

    impl PayloadTranslator for WidgetLike {
        fn channel_type(&self) -> ChannelType {
            ChannelType::Widget
        }

        fn translate(&self, payload: &serde_json::Value) -> Result<NormalizedInbound> {
            Ok(NormalizedInbound {
                transport_message_id: required_str(payload, "message_id")?.to_string(),
                contact_id: required_str(payload, "visitor_id")?.to_string(),
                contact_name: None,
                content: required_str(payload, "text")?.to_string(),
            })
        }
    }

    #[test]
    fn unregistered_channel_type_errors() {
        let registry = TranslatorRegistry::new();
        let err = registry
            .translate(ChannelType::WhatsApp, &serde_json::json!({}))
            .unwrap_err();
        assert!(matches!(err, Error::NoTranslator(ChannelType::WhatsApp)));
    }

    #[test]
    fn registered_translator_is_dispatched_by_type() {
        let mut registry = TranslatorRegistry::new();
        registry.register(Box::new(WidgetLike));
        assert!(registry.supports(ChannelType::Widget));

        let normalized = registry
            .translate(
                ChannelType::Widget,
                &serde_json::json!({"message_id": "m1", "visitor_id": "v1", "text": "hi"}),
            )
            .unwrap();
        assert_eq!(normalized.transport_message_id, "m1");
        assert_eq!(normalized.content, "hi");
    }

    #[test]
    fn missing_fields_are_malformed() {
        let mut registry = TranslatorRegistry::new();
        registry.register(Box::new(WidgetLike));
        let err = registry
            .translate(ChannelType::Widget, &serde_json::json!({"text": "hi"}))
            .unwrap_err();
        assert!(matches!(err, Error::Malformed { .. }));
    }
}
