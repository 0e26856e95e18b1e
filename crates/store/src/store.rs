use std::{
    collections::{HashMap, HashSet},
    path::PathBuf,
    sync::{Arc, RwLock},
};

use {tokio::sync::Mutex, tracing::warn};

use switchboard_common::{
    now_ms,
    types::{Conversation, DeliveryStatus, Message, Sender},
};

use crate::{
    Error, Result,
    journal::{Journal, JournalRecord},
};

/// Result of an append: idempotent duplicate handling is not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    Appended,
    /// A message with the same id was already stored; nothing changed.
    Duplicate,
}

/// Filter for [`ConversationStore::list`].
#[derive(Debug, Clone, Default)]
pub struct ConversationFilter {
    pub channel_id: Option<String>,
    pub unread_only: bool,
    pub ai_disabled: Option<bool>,
}

struct ConversationState {
    conversation: Conversation,
    messages: Vec<Message>,
    ids: HashSet<String>,
    transport_ids: HashSet<String>,
}

impl ConversationState {
    fn new(conversation: Conversation) -> Self {
        Self {
            conversation,
            messages: Vec::new(),
            ids: HashSet::new(),
            transport_ids: HashSet::new(),
        }
    }

    /// Apply a message append. Returns false for duplicates, by message id
    /// or by transport message id (provider redeliveries arrive as new
    /// messages carrying the same wire id).
    fn push(&mut self, message: Message) -> bool {
        if self.ids.contains(&message.id) {
            return false;
        }
        if let Some(transport_id) = &message.transport_message_id
            && !self.transport_ids.insert(transport_id.clone())
        {
            return false;
        }
        self.ids.insert(message.id.clone());
        self.conversation.last_message_id = Some(message.id.clone());
        if message.sender == Sender::Contact {
            self.conversation.unread_count += 1;
        }
        self.messages.push(message);
        true
    }

    fn mark_read(&mut self) {
        self.conversation.unread_count = 0;
        for message in &mut self.messages {
            if message.sender == Sender::Contact
                && message.delivery_status.can_advance_to(DeliveryStatus::Read)
            {
                message.delivery_status = DeliveryStatus::Read;
            }
        }
    }

    /// Advance one message's delivery status. Returns false when the
    /// transition would regress (no-op).
    fn advance_delivery(&mut self, message_id: &str, status: DeliveryStatus) -> Result<bool> {
        let message = self
            .messages
            .iter_mut()
            .find(|m| m.id == message_id)
            .ok_or_else(|| Error::unknown_message(message_id))?;
        if message.delivery_status.can_advance_to(status) {
            message.delivery_status = status;
            Ok(true)
        } else {
            Ok(false)
        }
    }
}

struct Slot {
    state: Mutex<ConversationState>,
}

#[derive(Default)]
struct Index {
    slots: HashMap<String, Arc<Slot>>,
    by_contact: HashMap<(String, String), String>,
}

/// Owns the canonical set of conversations and messages.
///
/// Appends are linearized per conversation (one async lock each); appends to
/// different conversations are independent. Duplicate message ids are
/// absorbed, never doubled.
pub struct ConversationStore {
    index: RwLock<Index>,
    journal: Option<Journal>,
}

impl ConversationStore {
    /// Store with no persistence (tests, ephemeral deployments).
    #[must_use]
    pub fn in_memory() -> Arc<Self> {
        Arc::new(Self {
            index: RwLock::new(Index::default()),
            journal: None,
        })
    }

    /// Store journaled under `dir`, replaying any existing journal files.
    pub async fn open(dir: PathBuf) -> Result<Arc<Self>> {
        let journal = Journal::new(dir);
        let store = Self {
            index: RwLock::new(Index::default()),
            journal: None,
        };

        for conversation_id in journal.conversation_ids().await? {
            let records = journal.read(&conversation_id).await?;
            if let Some(state) = replay(&conversation_id, records) {
                let mut index = store.index.write().unwrap_or_else(|e| e.into_inner());
                let conv = &state.conversation;
                index.by_contact.insert(
                    (conv.channel_id.clone(), conv.contact_id.clone()),
                    conv.id.clone(),
                );
                index.slots.insert(
                    conv.id.clone(),
                    Arc::new(Slot {
                        state: Mutex::new(state),
                    }),
                );
            }
        }

        Ok(Arc::new(Self {
            journal: Some(journal),
            ..store
        }))
    }

    fn slot(&self, conversation_id: &str) -> Option<Arc<Slot>> {
        let index = self.index.read().unwrap_or_else(|e| e.into_inner());
        index.slots.get(conversation_id).cloned()
    }

    async fn record(&self, conversation_id: &str, record: JournalRecord) {
        if let Some(journal) = &self.journal
            && let Err(e) = journal.append(conversation_id, &record).await
        {
            warn!(conversation_id, error = %e, "journal append failed");
        }
    }

    /// Conversation for `(channel_id, contact_id)`, created on first contact.
    pub async fn find_or_create(
        &self,
        channel_id: &str,
        contact_id: &str,
        contact_name: Option<&str>,
    ) -> Result<Conversation> {
        let key = (channel_id.to_string(), contact_id.to_string());

        // Decide under the index lock, but never carry the guard across an
        // await: the lookup resolves to either a freshly created conversation
        // or the existing slot, and both continue after the lock is released.
        let (created, existing_slot) = {
            let mut index = self.index.write().unwrap_or_else(|e| e.into_inner());
            if let Some(existing_id) = index.by_contact.get(&key) {
                let slot = index.slots.get(existing_id).cloned();
                (None, slot)
            } else {
                let mut conversation = Conversation::new(channel_id, contact_id);
                conversation.contact_name = contact_name.map(str::to_string);
                index.by_contact.insert(key, conversation.id.clone());
                index.slots.insert(
                    conversation.id.clone(),
                    Arc::new(Slot {
                        state: Mutex::new(ConversationState::new(conversation.clone())),
                    }),
                );
                (Some(conversation), None)
            }
        };

        if let Some(conversation) = created {
            self.record(
                &conversation.id,
                JournalRecord::Conversation {
                    conversation: conversation.clone(),
                },
            )
            .await;
            return Ok(conversation);
        }

        let slot = existing_slot.ok_or_else(|| Error::unknown_conversation(contact_id))?;
        let state = slot.state.lock().await;
        Ok(state.conversation.clone())
    }

    /// Append a message to its conversation. Idempotent on duplicate ids.
    pub async fn append(&self, message: Message) -> Result<AppendOutcome> {
        let conversation_id = message.conversation_id.clone();
        let slot = self
            .slot(&conversation_id)
            .ok_or_else(|| Error::unknown_conversation(&conversation_id))?;

        // The slot lock is held across the journal write so readers never
        // observe a partial append and journal order equals append order.
        let mut state = slot.state.lock().await;
        if !state.push(message.clone()) {
            return Ok(AppendOutcome::Duplicate);
        }
        self.record(&conversation_id, JournalRecord::Message { message })
            .await;
        Ok(AppendOutcome::Appended)
    }

    pub async fn get(&self, conversation_id: &str) -> Option<Conversation> {
        let slot = self.slot(conversation_id)?;
        let state = slot.state.lock().await;
        Some(state.conversation.clone())
    }

    /// Ordered message history of one conversation.
    pub async fn messages(&self, conversation_id: &str) -> Option<Vec<Message>> {
        let slot = self.slot(conversation_id)?;
        let state = slot.state.lock().await;
        Some(state.messages.clone())
    }

    pub async fn list(&self, filter: &ConversationFilter) -> Vec<Conversation> {
        let slots: Vec<Arc<Slot>> = {
            let index = self.index.read().unwrap_or_else(|e| e.into_inner());
            index.slots.values().cloned().collect()
        };

        let mut conversations = Vec::new();
        for slot in slots {
            let state = slot.state.lock().await;
            let conv = &state.conversation;
            if let Some(channel_id) = &filter.channel_id
                && &conv.channel_id != channel_id
            {
                continue;
            }
            if filter.unread_only && conv.unread_count == 0 {
                continue;
            }
            if let Some(ai_disabled) = filter.ai_disabled
                && conv.ai_disabled != ai_disabled
            {
                continue;
            }
            conversations.push(conv.clone());
        }
        conversations.sort_by(|a, b| a.id.cmp(&b.id));
        conversations
    }

    /// Set the manual-takeover flag. Journaled so it survives restarts.
    pub async fn set_ai_disabled(&self, conversation_id: &str, value: bool) -> Result<()> {
        let slot = self
            .slot(conversation_id)
            .ok_or_else(|| Error::unknown_conversation(conversation_id))?;
        let mut state = slot.state.lock().await;
        if state.conversation.ai_disabled == value {
            return Ok(());
        }
        state.conversation.ai_disabled = value;
        self.record(
            conversation_id,
            JournalRecord::AiDisabled {
                value,
                at: now_ms(),
            },
        )
        .await;
        Ok(())
    }

    /// Reset the unread count and mark inbound messages read.
    pub async fn mark_read(&self, conversation_id: &str) -> Result<()> {
        let slot = self
            .slot(conversation_id)
            .ok_or_else(|| Error::unknown_conversation(conversation_id))?;
        let mut state = slot.state.lock().await;
        state.mark_read();
        self.record(conversation_id, JournalRecord::Read { at: now_ms() })
            .await;
        Ok(())
    }

    /// Advance a message's delivery status. Regressions are ignored
    /// (returns false), per the monotonic sent → delivered → read contract.
    pub async fn update_delivery_status(
        &self,
        conversation_id: &str,
        message_id: &str,
        status: DeliveryStatus,
    ) -> Result<bool> {
        let slot = self
            .slot(conversation_id)
            .ok_or_else(|| Error::unknown_conversation(conversation_id))?;
        let mut state = slot.state.lock().await;
        let advanced = state.advance_delivery(message_id, status)?;
        if advanced {
            self.record(
                conversation_id,
                JournalRecord::Delivery {
                    message_id: message_id.to_string(),
                    status,
                    at: now_ms(),
                },
            )
            .await;
        }
        Ok(advanced)
    }
}

/// Rebuild one conversation's state from its journal records.
fn replay(conversation_id: &str, records: Vec<JournalRecord>) -> Option<ConversationState> {
    let mut state: Option<ConversationState> = None;
    for record in records {
        if let JournalRecord::Conversation { conversation } = record {
            if state.is_none() {
                state = Some(ConversationState::new(conversation));
            }
            continue;
        }

        let Some(current) = state.as_mut() else {
            warn!(conversation_id, "journal does not start with a conversation record");
            return None;
        };
        match record {
            JournalRecord::Conversation { .. } => {},
            JournalRecord::Message { message } => {
                current.push(message);
            },
            JournalRecord::AiDisabled { value, .. } => {
                current.conversation.ai_disabled = value;
            },
            JournalRecord::Read { .. } => current.mark_read(),
            JournalRecord::Delivery {
                message_id, status, ..
            } => {
                if let Err(e) = current.advance_delivery(&message_id, status) {
                    warn!(conversation_id, error = %e, "skipping delivery record");
                }
            },
        }
    }
    state
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use {super::*, switchboard_common::types::Sender};

    #[tokio::test]
    async fn append_preserves_order_and_absorbs_duplicates() {
        let store = ConversationStore::in_memory();
        let conv = store.find_or_create("ch-1", "contact-1", None).await.unwrap();

        let first = Message::new(&conv.id, Sender::Contact, "one");
        let second = Message::new(&conv.id, Sender::Contact, "two");
        assert_eq!(
            store.append(first.clone()).await.unwrap(),
            AppendOutcome::Appended
        );
        assert_eq!(
            store.append(second.clone()).await.unwrap(),
            AppendOutcome::Appended
        );
        assert_eq!(
            store.append(first.clone()).await.unwrap(),
            AppendOutcome::Duplicate
        );

        let messages = store.messages(&conv.id).await.unwrap();
        let ids: Vec<&str> = messages.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec![first.id.as_str(), second.id.as_str()]);

        let conv = store.get(&conv.id).await.unwrap();
        assert_eq!(conv.last_message_id, Some(second.id));
        assert_eq!(conv.unread_count, 2);
    }

    #[tokio::test]
    async fn concurrent_appends_to_one_conversation_lose_nothing() {
        let store = ConversationStore::in_memory();
        let conv = store.find_or_create("ch-1", "contact-1", None).await.unwrap();

        let mut handles = Vec::new();
        for i in 0..32 {
            let store = Arc::clone(&store);
            let conversation_id = conv.id.clone();
            handles.push(tokio::spawn(async move {
                let message = Message::new(&conversation_id, Sender::Contact, format!("m{i}"));
                store.append(message).await.unwrap()
            }));
        }
        for handle in handles {
            assert_eq!(handle.await.unwrap(), AppendOutcome::Appended);
        }

        let messages = store.messages(&conv.id).await.unwrap();
        assert_eq!(messages.len(), 32);
        let unique: HashSet<&str> = messages.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(unique.len(), 32);
    }

    #[tokio::test]
    async fn concurrent_find_or_create_converges_on_one_thread() {
        let store = ConversationStore::in_memory();

        // Spawned tasks also pin down that the future is Send and stays so.
        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store.find_or_create("ch-1", "contact-1", None).await.unwrap().id
            }));
        }
        let mut ids = HashSet::new();
        for handle in handles {
            ids.insert(handle.await.unwrap());
        }
        assert_eq!(ids.len(), 1, "one contact must map to one conversation");
    }

    #[tokio::test]
    async fn find_or_create_reuses_the_contact_thread() {
        let store = ConversationStore::in_memory();
        let a = store.find_or_create("ch-1", "contact-1", Some("Ada")).await.unwrap();
        let b = store.find_or_create("ch-1", "contact-1", None).await.unwrap();
        let c = store.find_or_create("ch-2", "contact-1", None).await.unwrap();
        assert_eq!(a.id, b.id);
        assert_ne!(a.id, c.id);
        assert_eq!(a.contact_name.as_deref(), Some("Ada"));
    }

    #[tokio::test]
    async fn redelivery_with_same_transport_id_is_absorbed() {
        let store = ConversationStore::in_memory();
        let conv = store.find_or_create("ch-1", "contact-1", None).await.unwrap();

        let mut first = Message::new(&conv.id, Sender::Contact, "hi");
        first.transport_message_id = Some("wamid-1".into());
        assert_eq!(store.append(first).await.unwrap(), AppendOutcome::Appended);

        // Redeliveries get a fresh message id but carry the same wire id.
        let mut redelivery = Message::new(&conv.id, Sender::Contact, "hi");
        redelivery.transport_message_id = Some("wamid-1".into());
        assert_eq!(
            store.append(redelivery).await.unwrap(),
            AppendOutcome::Duplicate
        );
        assert_eq!(store.messages(&conv.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn append_to_unknown_conversation_errors() {
        let store = ConversationStore::in_memory();
        let message = Message::new("conv-missing", Sender::Contact, "hi");
        assert!(matches!(
            store.append(message).await.unwrap_err(),
            Error::UnknownConversation { .. }
        ));
    }

    #[tokio::test]
    async fn mark_read_resets_unread_and_advances_status() {
        let store = ConversationStore::in_memory();
        let conv = store.find_or_create("ch-1", "contact-1", None).await.unwrap();
        store
            .append(Message::new(&conv.id, Sender::Contact, "hi"))
            .await
            .unwrap();

        store.mark_read(&conv.id).await.unwrap();
        let conv = store.get(&conv.id).await.unwrap();
        assert_eq!(conv.unread_count, 0);
        let messages = store.messages(&conv.id).await.unwrap();
        assert_eq!(messages[0].delivery_status, DeliveryStatus::Read);
    }

    #[tokio::test]
    async fn delivery_status_transitions_are_monotonic() {
        let store = ConversationStore::in_memory();
        let conv = store.find_or_create("ch-1", "contact-1", None).await.unwrap();
        let message = Message::new(&conv.id, Sender::Agent, "reply");
        let message_id = message.id.clone();
        store.append(message).await.unwrap();

        assert!(
            store
                .update_delivery_status(&conv.id, &message_id, DeliveryStatus::Read)
                .await
                .unwrap()
        );
        // Regression to delivered is a no-op, not an error.
        assert!(
            !store
                .update_delivery_status(&conv.id, &message_id, DeliveryStatus::Delivered)
                .await
                .unwrap()
        );
        let messages = store.messages(&conv.id).await.unwrap();
        assert_eq!(messages[0].delivery_status, DeliveryStatus::Read);
    }

    #[tokio::test]
    async fn journal_replay_restores_history_and_takeover_flag() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().to_path_buf();

        let (conv_id, msg_id) = {
            let store = ConversationStore::open(path.clone()).await.unwrap();
            let conv = store.find_or_create("ch-1", "contact-1", Some("Ada")).await.unwrap();
            let message = Message::new(&conv.id, Sender::Contact, "hello");
            let msg_id = message.id.clone();
            store.append(message).await.unwrap();
            store
                .append(Message::new(&conv.id, Sender::Agent, "human here"))
                .await
                .unwrap();
            store.set_ai_disabled(&conv.id, true).await.unwrap();
            (conv.id.clone(), msg_id)
        };

        let store = ConversationStore::open(path).await.unwrap();
        let conv = store.get(&conv_id).await.unwrap();
        assert!(conv.ai_disabled, "takeover flag must survive restart");
        assert_eq!(conv.contact_name.as_deref(), Some("Ada"));

        let messages = store.messages(&conv_id).await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].id, msg_id);

        // The replayed thread still dedups.
        let mut duplicate = Message::new(&conv_id, Sender::Contact, "hello");
        duplicate.id = msg_id;
        assert_eq!(
            store.append(duplicate).await.unwrap(),
            AppendOutcome::Duplicate
        );
    }
}
