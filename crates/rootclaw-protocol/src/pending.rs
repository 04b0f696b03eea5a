//! Outstanding-command table.
//!
//! Maps a [`CorrelationKey`] to exactly one single-shot completion channel.
//! A command is registered *before* its packet is written so that a fast
//! acknowledgement can never arrive ahead of its waiter. Dropping a
//! [`PendingCommand`] handle, for instance when the caller's future is
//! cancelled, removes its registration.

use crate::error::ProtocolError;
use crate::packet::CorrelationKey;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::oneshot;

type Completion = Result<(), ProtocolError>;
type Entries = Mutex<HashMap<CorrelationKey, Entry>>;

/// What to do when a key is registered while an earlier waiter for the same
/// key is still outstanding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DuplicatePolicy {
    /// Fail the new registration with [`ProtocolError::DuplicatePending`].
    #[default]
    Reject,
    /// Fail the earlier waiter with [`ProtocolError::Superseded`] and keep
    /// the new one.
    Replace,
}

struct Entry {
    token: u64,
    tx: oneshot::Sender<Completion>,
}

fn remove_current(entries: &Entries, key: CorrelationKey, token: u64) -> bool {
    let mut entries = entries.lock();
    if entries.get(&key).is_some_and(|e| e.token == token) {
        entries.remove(&key);
        return true;
    }
    false
}

/// Handle returned by [`PendingCommandTable::register`]; consumed by
/// [`PendingCommandTable::wait`].
pub struct PendingCommand {
    key: CorrelationKey,
    token: u64,
    rx: oneshot::Receiver<Completion>,
    entries: Weak<Entries>,
}

impl PendingCommand {
    pub fn key(&self) -> CorrelationKey {
        self.key
    }
}

impl fmt::Debug for PendingCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingCommand")
            .field("key", &self.key)
            .field("token", &self.token)
            .finish_non_exhaustive()
    }
}

impl Drop for PendingCommand {
    fn drop(&mut self) {
        if let Some(entries) = self.entries.upgrade() {
            if remove_current(&entries, self.key, self.token) {
                tracing::debug!(key = %self.key, "pending command abandoned");
            }
        }
    }
}

pub struct PendingCommandTable {
    entries: Arc<Entries>,
    next_token: AtomicU64,
    policy: DuplicatePolicy,
}

impl PendingCommandTable {
    pub fn new(policy: DuplicatePolicy) -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            next_token: AtomicU64::new(0),
            policy,
        }
    }

    pub fn policy(&self) -> DuplicatePolicy {
        self.policy
    }

    /// Register a completion handle under `key`.
    pub fn register(&self, key: CorrelationKey) -> Result<PendingCommand, ProtocolError> {
        let (tx, rx) = oneshot::channel();
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);

        let mut entries = self.entries.lock();
        if let Some(existing) = entries.remove(&key) {
            match self.policy {
                DuplicatePolicy::Reject => {
                    entries.insert(key, existing);
                    return Err(ProtocolError::DuplicatePending { key });
                }
                DuplicatePolicy::Replace => {
                    tracing::warn!(%key, "replacing pending command with the same key");
                    let _ = existing.tx.send(Err(ProtocolError::Superseded { key }));
                }
            }
        }
        entries.insert(key, Entry { token, tx });

        Ok(PendingCommand {
            key,
            token,
            rx,
            entries: Arc::downgrade(&self.entries),
        })
    }

    /// Suspend until `pending` is resolved, failed, or `timeout` elapses.
    ///
    /// On timeout the entry is removed, so a late [`resolve`](Self::resolve)
    /// for the same key is a no-op. Dropping the returned future before it
    /// completes removes the entry too.
    pub async fn wait(&self, mut pending: PendingCommand, timeout: Duration) -> Completion {
        let (key, token) = (pending.key, pending.token);

        tokio::select! {
            outcome = &mut pending.rx => {
                outcome.unwrap_or(Err(ProtocolError::LinkClosed))
            }
            () = tokio::time::sleep(timeout) => {
                self.remove_if_current(key, token);
                // A resolve may have landed between the timer firing and the removal.
                match pending.rx.try_recv() {
                    Ok(outcome) => outcome,
                    Err(_) => {
                        tracing::debug!(%key, "pending command timed out");
                        Err(ProtocolError::Timeout {
                            key,
                            timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                        })
                    }
                }
            }
        }
    }

    /// Register and wait in one step.
    pub async fn await_completion(&self, key: CorrelationKey, timeout: Duration) -> Completion {
        let pending = self.register(key)?;
        self.wait(pending, timeout).await
    }

    /// Fulfil the waiter registered under `key`. Returns `false` when no
    /// waiter exists (late or unmatched notification).
    pub fn resolve(&self, key: &CorrelationKey) -> bool {
        let Some(entry) = self.entries.lock().remove(key) else {
            return false;
        };
        if entry.tx.send(Ok(())).is_err() {
            tracing::debug!(%key, "waiter dropped before resolution");
        }
        true
    }

    /// Drop the registration without resolving it, e.g. after a failed write.
    pub fn cancel(&self, pending: &PendingCommand) {
        self.remove_if_current(pending.key, pending.token);
    }

    /// Fail every outstanding waiter with `error`. Returns how many were failed.
    pub fn fail_all(&self, error: &ProtocolError) -> usize {
        let drained: Vec<Entry> = self.entries.lock().drain().map(|(_, e)| e).collect();
        let count = drained.len();
        for entry in drained {
            let _ = entry.tx.send(Err(error.clone()));
        }
        count
    }

    pub fn contains(&self, key: &CorrelationKey) -> bool {
        self.entries.lock().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn remove_if_current(&self, key: CorrelationKey, token: u64) {
        remove_current(&self.entries, key, token);
    }
}

impl Default for PendingCommandTable {
    fn default() -> Self {
        Self::new(DuplicatePolicy::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn key(seq: u8) -> CorrelationKey {
        CorrelationKey::new(1, 8, seq)
    }

    #[tokio::test]
    async fn resolve_fulfils_matching_waiter() {
        let table = PendingCommandTable::default();
        let pending = table.register(key(1)).unwrap();
        assert!(table.contains(&key(1)));

        assert!(table.resolve(&key(1)));
        assert!(table.is_empty());
        assert_eq!(table.wait(pending, Duration::from_secs(10)).await, Ok(()));
    }

    #[tokio::test]
    async fn resolve_only_touches_its_own_key() {
        let table = PendingCommandTable::default();
        let first = table.register(key(1)).unwrap();
        let _second = table.register(key(2)).unwrap();

        assert!(table.resolve(&key(1)));
        assert!(table.contains(&key(2)));
        assert_eq!(table.wait(first, Duration::from_secs(1)).await, Ok(()));
    }

    #[test]
    fn resolve_unknown_key_is_noop() {
        let table = PendingCommandTable::default();
        assert!(!table.resolve(&key(9)));
        assert!(table.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_fails_and_removes_entry() {
        let table = PendingCommandTable::default();
        let pending = table.register(key(3)).unwrap();

        let err = table
            .wait(pending, Duration::from_millis(10_000))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ProtocolError::Timeout {
                key: key(3),
                timeout_ms: 10_000
            }
        );
        assert!(!table.contains(&key(3)));
        assert!(!table.resolve(&key(3)));
    }

    #[tokio::test(start_paused = true)]
    async fn resolve_before_deadline_wins() {
        let table = Arc::new(PendingCommandTable::default());
        let resolver = table.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(9_999)).await;
            resolver.resolve(&key(4));
        });

        let result = table
            .await_completion(key(4), Duration::from_millis(10_000))
            .await;
        assert_eq!(result, Ok(()));
    }

    #[test]
    fn reject_policy_keeps_first_waiter() {
        let table = PendingCommandTable::new(DuplicatePolicy::Reject);
        let _first = table.register(key(5)).unwrap();
        let err = table.register(key(5)).unwrap_err();
        assert_eq!(err, ProtocolError::DuplicatePending { key: key(5) });
        assert_eq!(table.len(), 1);
    }

    #[tokio::test]
    async fn replace_policy_supersedes_first_waiter() {
        let table = PendingCommandTable::new(DuplicatePolicy::Replace);
        let first = table.register(key(6)).unwrap();
        let second = table.register(key(6)).unwrap();

        assert_eq!(
            table.wait(first, Duration::from_secs(1)).await,
            Err(ProtocolError::Superseded { key: key(6) })
        );
        assert!(table.resolve(&key(6)));
        assert_eq!(table.wait(second, Duration::from_secs(1)).await, Ok(()));
    }

    #[tokio::test(start_paused = true)]
    async fn stale_timeout_does_not_remove_replacement() {
        let table = PendingCommandTable::new(DuplicatePolicy::Replace);
        let first = table.register(key(7)).unwrap();
        let token = first.token;
        let _second = table.register(key(7)).unwrap();

        table.remove_if_current(key(7), token);
        assert!(table.contains(&key(7)));
    }

    #[tokio::test]
    async fn fail_all_drains_with_error() {
        let table = PendingCommandTable::default();
        let a = table.register(key(1)).unwrap();
        let b = table.register(key(2)).unwrap();

        assert_eq!(table.fail_all(&ProtocolError::LinkClosed), 2);
        assert!(table.is_empty());
        assert_eq!(
            table.wait(a, Duration::from_secs(1)).await,
            Err(ProtocolError::LinkClosed)
        );
        assert_eq!(
            table.wait(b, Duration::from_secs(1)).await,
            Err(ProtocolError::LinkClosed)
        );
    }

    #[test]
    fn dropped_handle_releases_its_key() {
        let table = PendingCommandTable::default();
        let pending = table.register(key(9)).unwrap();
        drop(pending);

        assert!(table.is_empty());
        assert!(table.register(key(9)).is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_wait_releases_its_key() {
        let table = PendingCommandTable::default();
        let pending = table.register(key(7)).unwrap();

        let cancelled =
            tokio::time::timeout(Duration::from_millis(10), table.wait(pending, Duration::from_secs(10)))
                .await;
        assert!(cancelled.is_err());
        assert!(table.is_empty());
        assert!(table.register(key(7)).is_ok());
    }

    #[test]
    fn dropping_superseded_handle_keeps_replacement() {
        let table = PendingCommandTable::new(DuplicatePolicy::Replace);
        let first = table.register(key(10)).unwrap();
        let _second = table.register(key(10)).unwrap();

        drop(first);
        assert!(table.contains(&key(10)));
    }

    #[test]
    fn cancel_removes_registration() {
        let table = PendingCommandTable::default();
        let pending = table.register(key(8)).unwrap();
        table.cancel(&pending);
        assert!(table.is_empty());
    }
}
