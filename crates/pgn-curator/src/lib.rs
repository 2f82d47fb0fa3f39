//! 大規模な棋譜（PGN）アーカイブの選別と重複排除
//!
//! 入力ストリームを1局ずつ切り出し（[`record`]）、タグと本文に分け（[`tags`]）、
//! 決められた順序のルールで採否を判定し（[`rules`]）、採用分は実行をまたぐ
//! 重複排除ストア（[`dedup`]）で既出を除いてから出力する（[`session`]）。
//!
//! 指し手の合法性は検証しない。

pub mod common;
pub mod config;
pub mod dedup;
pub mod error;
pub mod hash;
pub mod record;
pub mod rules;
pub mod session;
pub mod tags;

pub use config::{FilterConfig, RunMode, SessionOptions};
pub use dedup::{DedupStore, MemoryDedupStore, SqliteDedupStore};
pub use error::{CurateError, Result};
pub use hash::ContentHash;
pub use record::{RawRecord, RecordReader};
pub use rules::{classify, evaluate, RejectReason, Verdict};
pub use session::{AlwaysContinue, ChunkDecision, ChunkPrompt, Outcome, RunCounters, Session};
pub use tags::{split_record, AttributeSet};
