//! Append-only JSONL journal, one file per conversation, with file locking.

use std::{
    fs::{self, File, OpenOptions},
    io::{BufRead, BufReader, Write},
    path::PathBuf,
};

use {
    fd_lock::RwLock,
    serde::{Deserialize, Serialize},
};

use switchboard_common::types::{Conversation, DeliveryStatus, Message};

use crate::Result;

/// One line of a conversation journal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JournalRecord {
    /// Conversation created (snapshot of its initial fields).
    Conversation { conversation: Conversation },
    /// A message was appended.
    Message { message: Message },
    /// Manual takeover flag changed.
    AiDisabled { value: bool, at: i64 },
    /// The operator read the conversation (unread count reset).
    Read { at: i64 },
    /// Delivery status advanced for one message.
    Delivery {
        message_id: String,
        status: DeliveryStatus,
        at: i64,
    },
}

/// JSONL journal directory.
pub struct Journal {
    base_dir: PathBuf,
}

impl Journal {
    #[must_use]
    pub fn new(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    fn path_for(&self, conversation_id: &str) -> PathBuf {
        // Conversation ids are generated by us (`conv-<uuid>`), but sanitize
        // anyway so a hostile id cannot escape the journal directory.
        let safe: String = conversation_id
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.base_dir.join(format!("{safe}.jsonl"))
    }

    /// Append one record as a single line to the conversation's file.
    pub async fn append(&self, conversation_id: &str, record: &JournalRecord) -> Result<()> {
        let path = self.path_for(conversation_id);
        let line = serde_json::to_string(record)?;

        tokio::task::spawn_blocking(move || -> std::io::Result<()> {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            let file = OpenOptions::new().create(true).append(true).open(&path)?;
            let mut lock = RwLock::new(file);
            let mut guard = lock.write()?;
            writeln!(*guard, "{line}")?;
            Ok(())
        })
        .await??;

        Ok(())
    }

    /// Read every record of one conversation file. Malformed lines are
    /// skipped with a warning, never fatal.
    pub async fn read(&self, conversation_id: &str) -> Result<Vec<JournalRecord>> {
        let path = self.path_for(conversation_id);
        Self::read_file(path).await
    }

    /// Conversation ids that have a journal file.
    pub async fn conversation_ids(&self) -> Result<Vec<String>> {
        let base = self.base_dir.clone();
        let ids = tokio::task::spawn_blocking(move || -> std::io::Result<Vec<String>> {
            if !base.exists() {
                return Ok(vec![]);
            }
            let mut ids = Vec::new();
            for entry in fs::read_dir(&base)? {
                let entry = entry?;
                let name = entry.file_name();
                let name = name.to_string_lossy();
                if let Some(stem) = name.strip_suffix(".jsonl") {
                    ids.push(stem.to_string());
                }
            }
            ids.sort();
            Ok(ids)
        })
        .await??;
        Ok(ids)
    }

    async fn read_file(path: PathBuf) -> Result<Vec<JournalRecord>> {
        let records = tokio::task::spawn_blocking(move || -> std::io::Result<Vec<JournalRecord>> {
            if !path.exists() {
                return Ok(vec![]);
            }
            let file = File::open(&path)?;
            let reader = BufReader::new(file);
            let mut records = Vec::new();
            for line in reader.lines() {
                let line = line?;
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                match serde_json::from_str(trimmed) {
                    Ok(record) => records.push(record),
                    Err(e) => {
                        tracing::warn!(
                            path = %path.display(),
                            "skipping malformed journal line: {e}"
                        );
                    },
                }
            }
            Ok(records)
        })
        .await??;
        Ok(records)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use {
        super::*,
        switchboard_common::types::Sender,
    };

    #[tokio::test]
    async fn append_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let journal = Journal::new(dir.path().to_path_buf());

        let conversation = Conversation::new("ch-1", "contact-1");
        let id = conversation.id.clone();
        journal
            .append(&id, &JournalRecord::Conversation { conversation })
            .await
            .unwrap();
        let message = Message::new(&id, Sender::Contact, "hello");
        journal
            .append(&id, &JournalRecord::Message { message })
            .await
            .unwrap();

        let records = journal.read(&id).await.unwrap();
        assert_eq!(records.len(), 2);
        assert!(matches!(records[0], JournalRecord::Conversation { .. }));
        assert!(matches!(records[1], JournalRecord::Message { .. }));

        assert_eq!(journal.conversation_ids().await.unwrap(), vec![id]);
    }

    #[tokio::test]
    async fn malformed_lines_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let journal = Journal::new(dir.path().to_path_buf());

        let conversation = Conversation::new("ch-1", "contact-1");
        let id = conversation.id.clone();
        journal
            .append(&id, &JournalRecord::Conversation { conversation })
            .await
            .unwrap();

        // Corrupt the file with a half-written line.
        let path = dir.path().join(format!("{id}.jsonl"));
        let mut contents = fs::read_to_string(&path).unwrap();
        contents.push_str("{\"kind\":\"message\",\"mess");
        fs::write(&path, contents).unwrap();

        let records = journal.read(&id).await.unwrap();
        assert_eq!(records.len(), 1);
    }

    #[tokio::test]
    async fn missing_file_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let journal = Journal::new(dir.path().to_path_buf());
        assert!(journal.read("conv-none").await.unwrap().is_empty());
        assert!(journal.conversation_ids().await.unwrap().is_empty());
    }
}
