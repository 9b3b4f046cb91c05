//! Impls - ports の実装（開発用・テスト用）
//!
//! # 含まれる実装
//! - **NoopCacheInvalidator**: cache を持たない構成のデフォルト
//! - **InMemoryDeadLetterSink**: drop された submission をメモリに保持
//!
//! 採点ロジック（SubmissionProcessor）の本番実装はアプリケーション側に置きます。

pub mod dead_letter;
pub mod noop;

pub use self::dead_letter::InMemoryDeadLetterSink;
pub use self::noop::NoopCacheInvalidator;
