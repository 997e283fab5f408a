//! In-memory transcript store keyed by sender

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Bounded transcripts, one per sender.
///
/// Each sender's transcript sits behind its own async mutex, so a
/// read-generate-append cycle for one sender never interleaves with another
/// cycle for the same sender. Distinct senders do not contend.
#[derive(Debug)]
pub struct ConversationStore {
    transcripts: DashMap<String, Arc<Mutex<String>>>,
    cap: usize,
}

impl ConversationStore {
    /// Create a store that keeps at most `cap` characters per sender
    pub fn new(cap: usize) -> Self {
        Self {
            transcripts: DashMap::new(),
            cap,
        }
    }

    pub fn cap(&self) -> usize {
        self.cap
    }

    fn slot(&self, sender: &str) -> Arc<Mutex<String>> {
        Arc::clone(&self.transcripts.entry(sender.to_string()).or_default())
    }

    /// Take exclusive hold of a sender's transcript, creating it if needed.
    pub async fn lock(&self, sender: &str) -> ConversationGuard {
        let transcript = self.slot(sender).lock_owned().await;
        ConversationGuard {
            transcript,
            cap: self.cap,
        }
    }

    /// Current transcript for `sender`, empty if none exists yet
    pub async fn transcript(&self, sender: &str) -> String {
        let slot = match self.transcripts.get(sender) {
            Some(entry) => Arc::clone(entry.value()),
            None => return String::new(),
        };
        let transcript = slot.lock().await;
        transcript.clone()
    }

    /// Append one user/assistant exchange to a sender's transcript
    pub async fn append_exchange(&self, sender: &str, user_text: &str, reply: &str) {
        let mut guard = self.lock(sender).await;
        guard.record(user_text, reply);
    }

    /// Forget a sender. Returns whether a transcript existed.
    pub fn clear(&self, sender: &str) -> bool {
        self.transcripts.remove(sender).is_some()
    }

    /// Number of senders with a transcript
    pub fn len(&self) -> usize {
        self.transcripts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transcripts.is_empty()
    }
}

/// Exclusive access to one sender's transcript
pub struct ConversationGuard {
    transcript: OwnedMutexGuard<String>,
    cap: usize,
}

impl ConversationGuard {
    /// Transcript text as used in prompts
    pub fn history(&self) -> &str {
        self.transcript.trim()
    }

    /// Append an exchange and drop the oldest characters beyond the cap
    pub fn record(&mut self, user_text: &str, reply: &str) {
        let mut updated = self.transcript.trim().to_string();
        updated.push_str("\nUser: ");
        updated.push_str(user_text);
        updated.push_str("\nAssistant: ");
        updated.push_str(reply);

        *self.transcript = keep_last_chars(updated.trim(), self.cap).to_string();
    }
}

/// Suffix of `text` holding at most `cap` characters
fn keep_last_chars(text: &str, cap: usize) -> &str {
    let total = text.chars().count();
    if total <= cap {
        return text;
    }
    match text.char_indices().nth(total - cap) {
        Some((idx, _)) => &text[idx..],
        None => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keep_last_chars() {
        assert_eq!(keep_last_chars("abcdef", 10), "abcdef");
        assert_eq!(keep_last_chars("abcdef", 3), "def");
        assert_eq!(keep_last_chars("abcdef", 0), "");
        // multi-byte characters are never split
        assert_eq!(keep_last_chars("héllo wörld", 5), "wörld");
    }

    #[tokio::test]
    async fn test_missing_sender_has_empty_transcript() {
        let store = ConversationStore::new(4000);
        assert_eq!(store.transcript("15551230001").await, "");
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_append_exchange_format() {
        let store = ConversationStore::new(4000);
        store.append_exchange("15551230001", "Hi", "Hello!").await;
        store.append_exchange("15551230001", "How are you?", "Great.").await;

        assert_eq!(
            store.transcript("15551230001").await,
            "User: Hi\nAssistant: Hello!\nUser: How are you?\nAssistant: Great."
        );
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_cap_keeps_most_recent_suffix() {
        let store = ConversationStore::new(100);
        for i in 0..50 {
            store
                .append_exchange("s", &format!("message {}", i), &format!("reply {}", i))
                .await;
            assert!(store.transcript("s").await.chars().count() <= 100);
        }

        let transcript = store.transcript("s").await;
        assert!(transcript.ends_with("User: message 49\nAssistant: reply 49"));
        assert!(!transcript.contains("message 0\n"));
    }

    #[tokio::test]
    async fn test_senders_are_isolated() {
        let store = ConversationStore::new(4000);
        store.append_exchange("a", "from a", "to a").await;
        store.append_exchange("b", "from b", "to b").await;

        assert!(!store.transcript("a").await.contains("from b"));
        assert!(!store.transcript("b").await.contains("from a"));
        assert_eq!(store.len(), 2);
    }

    #[tokio::test]
    async fn test_clear() {
        let store = ConversationStore::new(4000);
        store.append_exchange("a", "hi", "hey").await;

        assert!(store.clear("a"));
        assert!(!store.clear("a"));
        assert_eq!(store.transcript("a").await, "");
    }

    #[tokio::test]
    async fn test_concurrent_appends_are_not_lost() {
        let store = Arc::new(ConversationStore::new(100_000));
        let mut handles = Vec::new();
        for i in 0..20 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store
                    .append_exchange("same", &format!("q{}", i), &format!("a{}", i))
                    .await;
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let transcript = store.transcript("same").await;
        for i in 0..20 {
            assert!(transcript.contains(&format!("User: q{}\n", i)));
        }
    }
}
