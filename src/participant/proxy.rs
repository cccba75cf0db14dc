//! Human-in-the-loop proxy participant

use super::{Action, Participant, ParticipantError};
use crate::transcript::{ParticipantId, Transcript};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};

/// How a proxy produces its utterance
#[derive(Debug)]
pub enum ProxyPolicy {
    /// Always say the same thing
    FixedReply(String),
    /// Pass the turn with an empty utterance
    Yield,
    /// Say each queued reply once, then defer to `then`
    Scripted {
        replies: VecDeque<String>,
        then: Box<ProxyPolicy>,
    },
    /// Wait for external input, yielding on timeout or when the sender is gone
    Channel {
        receiver: mpsc::Receiver<String>,
        timeout: Duration,
    },
}

impl ProxyPolicy {
    pub fn scripted<I, S>(replies: I, then: ProxyPolicy) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ProxyPolicy::Scripted {
            replies: replies.into_iter().map(Into::into).collect(),
            then: Box::new(then),
        }
    }

    /// A policy fed by the returned sender
    pub fn channel(timeout: Duration) -> (mpsc::Sender<String>, Self) {
        let (tx, receiver) = mpsc::channel(16);
        (tx, ProxyPolicy::Channel { receiver, timeout })
    }
}

/// Stands in for a human in the rotation
pub struct ProxyParticipant {
    id: ParticipantId,
    policy: Mutex<ProxyPolicy>,
}

impl ProxyParticipant {
    pub fn new(id: impl Into<ParticipantId>, policy: ProxyPolicy) -> Self {
        Self {
            id: id.into(),
            policy: Mutex::new(policy),
        }
    }

    async fn next_reply(&self) -> String {
        let mut guard = self.policy.lock().await;
        let mut policy: &mut ProxyPolicy = &mut guard;

        loop {
            match policy {
                ProxyPolicy::FixedReply(text) => return text.clone(),
                ProxyPolicy::Yield => return String::new(),
                ProxyPolicy::Scripted { replies, then } => {
                    if let Some(reply) = replies.pop_front() {
                        return reply;
                    }
                    policy = then.as_mut();
                }
                ProxyPolicy::Channel { receiver, timeout } => {
                    return match tokio::time::timeout(*timeout, receiver.recv()).await {
                        Ok(Some(text)) => text,
                        Ok(None) => {
                            tracing::info!(participant = %self.id, "Input closed, yielding turn");
                            String::new()
                        }
                        Err(_) => {
                            tracing::info!(
                                participant = %self.id,
                                timeout_secs = timeout.as_secs(),
                                "No input before timeout, yielding turn"
                            );
                            String::new()
                        }
                    };
                }
            }
        }
    }
}

#[async_trait]
impl Participant for ProxyParticipant {
    fn id(&self) -> &ParticipantId {
        &self.id
    }

    async fn act(&self, _history: &Transcript) -> Result<Action, ParticipantError> {
        Ok(Action::Utterance(self.next_reply().await))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn say(proxy: &ProxyParticipant) -> String {
        match proxy.act(&Transcript::seeded("task")).await.unwrap() {
            Action::Utterance(text) => text,
            other => panic!("proxy produced {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_fixed_and_yield() {
        let fixed = ProxyParticipant::new("User", ProxyPolicy::FixedReply("ok".to_string()));
        assert_eq!(say(&fixed).await, "ok");
        assert_eq!(say(&fixed).await, "ok");

        let quiet = ProxyParticipant::new("User", ProxyPolicy::Yield);
        assert_eq!(say(&quiet).await, "");
        assert!(quiet.tools().is_none());
    }

    #[tokio::test]
    async fn test_scripted_falls_through_nested_policies() {
        let policy = ProxyPolicy::scripted(
            ["first"],
            ProxyPolicy::scripted(["second"], ProxyPolicy::FixedReply("thank you".to_string())),
        );
        let proxy = ProxyParticipant::new("User", policy);

        assert_eq!(say(&proxy).await, "first");
        assert_eq!(say(&proxy).await, "second");
        assert_eq!(say(&proxy).await, "thank you");
        assert_eq!(say(&proxy).await, "thank you");
    }

    #[tokio::test]
    async fn test_channel_delivers_input() {
        let (tx, policy) = ProxyPolicy::channel(Duration::from_secs(5));
        let proxy = ProxyParticipant::new("User", policy);

        tx.send("plot it please".to_string()).await.unwrap();
        assert_eq!(say(&proxy).await, "plot it please");
    }

    #[tokio::test]
    async fn test_channel_timeout_yields() {
        let (_tx, policy) = ProxyPolicy::channel(Duration::from_millis(20));
        let proxy = ProxyParticipant::new("User", policy);
        assert_eq!(say(&proxy).await, "");
    }

    #[tokio::test]
    async fn test_closed_channel_yields() {
        let (tx, policy) = ProxyPolicy::channel(Duration::from_secs(30));
        drop(tx);
        let proxy = ProxyParticipant::new("User", policy);
        assert_eq!(say(&proxy).await, "");
    }
}
