use std::time::Duration;

use {async_trait::async_trait, tracing::info};

use switchboard_common::types::{Conversation, Message};

use crate::{AgentProfile, GenerationError};

/// Produces an automatic reply for one inbound message.
///
/// Implementations call an external AI provider and may be slow or fail;
/// callers always wrap invocations with [`generate_with_timeout`].
#[async_trait]
pub trait ReplyGenerator: Send + Sync {
    async fn generate(
        &self,
        conversation: &Conversation,
        trigger: &Message,
        agent: &AgentProfile,
    ) -> Result<String, GenerationError>;
}

/// Run one generation attempt under a caller-supplied timeout. A timeout is
/// reported as a [`GenerationError::Timeout`], not a panic or hang.
pub async fn generate_with_timeout(
    generator: &dyn ReplyGenerator,
    conversation: &Conversation,
    trigger: &Message,
    agent: &AgentProfile,
    timeout: Duration,
) -> Result<String, GenerationError> {
    match tokio::time::timeout(timeout, generator.generate(conversation, trigger, agent)).await {
        Ok(result) => result,
        Err(_) => Err(GenerationError::Timeout { timeout }),
    }
}

/// Development generator: echoes the inbound text. Stands in for a real
/// provider in demos and tests.
#[derive(Debug, Default, Clone)]
pub struct EchoGenerator;

#[async_trait]
impl ReplyGenerator for EchoGenerator {
    async fn generate(
        &self,
        conversation: &Conversation,
        trigger: &Message,
        agent: &AgentProfile,
    ) -> Result<String, GenerationError> {
        info!(
            conversation_id = %conversation.id,
            agent = %agent.name,
            model = %agent.model,
            "generating echo reply for: {}",
            trigger.content,
        );
        Ok(format!(
            "Echo: {}",
            if trigger.content.is_empty() {
                "(no text)"
            } else {
                &trigger.content
            }
        ))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use {
        super::*,
        switchboard_common::types::Sender,
    };

    struct SlowGenerator {
        delay: Duration,
    }

    #[async_trait]
    impl ReplyGenerator for SlowGenerator {
        async fn generate(
            &self,
            _conversation: &Conversation,
            _trigger: &Message,
            _agent: &AgentProfile,
        ) -> Result<String, GenerationError> {
            tokio::time::sleep(self.delay).await;
            Ok("too late".into())
        }
    }

    fn fixtures() -> (Conversation, Message, AgentProfile) {
        let conversation = Conversation::new("ch-1", "contact-1");
        let trigger = Message::new(&conversation.id, Sender::Contact, "Hi");
        let agent = AgentProfile::new("Bot", "openai", "gpt-4o-mini", "be brief");
        (conversation, trigger, agent)
    }

    #[tokio::test]
    async fn echo_generator_replies_with_the_inbound_text() {
        let (conversation, trigger, agent) = fixtures();
        let reply = EchoGenerator
            .generate(&conversation, &trigger, &agent)
            .await
            .unwrap();
        assert_eq!(reply, "Echo: Hi");
    }

    #[tokio::test(start_paused = true)]
    async fn slow_generation_times_out() {
        let (conversation, trigger, agent) = fixtures();
        let generator = SlowGenerator {
            delay: Duration::from_secs(120),
        };
        let err = generate_with_timeout(
            &generator,
            &conversation,
            &trigger,
            &agent,
            Duration::from_secs(10),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, GenerationError::Timeout { .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn fast_generation_beats_the_timeout() {
        let (conversation, trigger, agent) = fixtures();
        let reply = generate_with_timeout(
            &EchoGenerator,
            &conversation,
            &trigger,
            &agent,
            Duration::from_secs(10),
        )
        .await
        .unwrap();
        assert_eq!(reply, "Echo: Hi");
    }
}
