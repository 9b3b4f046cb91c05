//! Domain identifiers (strongly-typed IDs).
//!
//! # ULID ベースの ID
//! キューに入る submission と、flush（バッチ実行）1 回ごとに ID を振ります。
//!
//! - **時刻でソート可能**: timestamp が先頭にあるため、生成順序でソートできる
//! - **調整不要**: 乱数部分があるので同じミリ秒に複数生成しても衝突しない
//!
//! `Id<T>` は Phantom type パターンで、`QueueId` と `FlushId` を
//! コンパイル時に区別します。

use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use ulid::Ulid;

/// IdMarker は各 ID 型のマーカー trait
///
/// Display で使うプレフィックス（"sub-", "flush-"）を提供します。
pub trait IdMarker: Send + Sync + 'static {
    fn prefix() -> &'static str;
}

/// ジェネリック ID 型
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Id<T: IdMarker> {
    ulid: Ulid,
    #[serde(skip)]
    _marker: PhantomData<T>,
}

impl<T: IdMarker> Id<T> {
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self {
            ulid,
            _marker: PhantomData,
        }
    }

    /// Fresh id from the system clock. Use `IdGenerator` when the clock matters.
    pub fn generate() -> Self {
        Self::from_ulid(Ulid::new())
    }

    pub fn as_ulid(&self) -> Ulid {
        self.ulid
    }
}

impl<T: IdMarker> From<Ulid> for Id<T> {
    fn from(ulid: Ulid) -> Self {
        Self::from_ulid(ulid)
    }
}

impl<T: IdMarker> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", T::prefix(), self.ulid)
    }
}

// ========================================
// マーカー型の定義
// ========================================

/// Queued submission のマーカー型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Submission {}

impl IdMarker for Submission {
    fn prefix() -> &'static str {
        "sub-"
    }
}

/// Flush（scheduler tick / escalation 1 回分）のマーカー型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Flush {}

impl IdMarker for Flush {
    fn prefix() -> &'static str {
        "flush-"
    }
}

/// Identifier handed back by `queue_submission`.
pub type QueueId = Id<Submission>;

/// Identifier of one flush run, used to correlate log lines.
pub type FlushId = Id<Flush>;
