//! Ports - 抽象化レイヤー
//!
//! このモジュールは Hexagonal Architecture の「ポート」を定義します。
//! 採点ロジック・キャッシュ・分析系などの外部コラボレータはすべてここの
//! trait 越しに呼ばれ、キュー本体は実装の詳細を知りません。

pub mod clock;
pub mod dead_letter;
pub mod id_generator;
pub mod processor;
pub mod side_effects;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::dead_letter::{DeadLetter, DeadLetterSink};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::processor::SubmissionProcessor;
pub use self::side_effects::{CacheInvalidator, DownstreamHook};
