//! InMemoryDeadLetterSink - drop された submission の保管先（開発用）
//!
//! プロセスが落ちれば消えるので、本番では永続ストアを実装した sink を使うこと。

use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::ports::{DeadLetter, DeadLetterSink};

#[derive(Debug, Default)]
pub struct InMemoryDeadLetterSink {
    letters: Mutex<Vec<DeadLetter>>,
}

impl InMemoryDeadLetterSink {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<DeadLetter>> {
        self.letters.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn letters(&self) -> Vec<DeadLetter> {
        self.lock().clone()
    }

    /// Take everything recorded so far (e.g. to replay it).
    pub fn drain(&self) -> Vec<DeadLetter> {
        std::mem::take(&mut *self.lock())
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

#[async_trait]
impl DeadLetterSink for InMemoryDeadLetterSink {
    async fn record(&self, letter: DeadLetter) {
        self.lock().push(letter);
    }
}
