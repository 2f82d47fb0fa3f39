//! 読み取り → 判定 → 重複確認 → 出力 を結ぶセッション
//!
//! 単一スレッドで逐次処理する。出力順は入力順と同じ。
//! 対話モードの一時停止は [`ChunkPrompt`] に委ね、ループ自体はコンソール入力を
//! 直接待たない。

use std::collections::{BTreeMap, HashSet};
use std::io::{self, Write};
use std::time::Instant;

use serde::Serialize;

use crate::config::{FilterConfig, RunMode, SessionOptions};
use crate::dedup::DedupStore;
use crate::error::Result;
use crate::hash::ContentHash;
use crate::record::RawRecord;
use crate::rules::{classify, RejectReason, Verdict};

/// チャンク終了時の操作者の選択
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkDecision {
    Continue,
    Quit,
}

/// 対話モードでチャンクごとに続行可否を尋ねる
pub trait ChunkPrompt {
    fn next_chunk(&mut self) -> io::Result<ChunkDecision>;
}

/// 常に続行する（非対話の埋め込み用）
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysContinue;

impl ChunkPrompt for AlwaysContinue {
    fn next_chunk(&mut self) -> io::Result<ChunkDecision> {
        Ok(ChunkDecision::Continue)
    }
}

/// 1レコードの最終的な扱い
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// ルールで除外
    Rejected(RejectReason),
    /// ルールは通過したが既出
    Duplicate,
    /// 新規として採用（dry-run では書き込まない）
    Accepted,
}

/// 実行中の集計（セッションごとにリセット）
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunCounters {
    pub total: u64,
    pub passed: u64,
    /// ルール除外と重複の合計
    pub failed: u64,
    pub duplicates: u64,
    pub insert_failures: u64,
    pub rejected_by_reason: BTreeMap<String, u64>,
}

impl RunCounters {
    fn record(&mut self, outcome: &Outcome) {
        self.total += 1;
        match outcome {
            Outcome::Accepted => self.passed += 1,
            Outcome::Duplicate => {
                self.failed += 1;
                self.duplicates += 1;
            }
            Outcome::Rejected(reason) => {
                self.failed += 1;
                *self.rejected_by_reason.entry(reason.label().to_string()).or_default() += 1;
            }
        }
    }

    pub fn summary_line(&self) -> String {
        format!(
            "Finished. Total games: {}, passed: {}, failed: {}",
            self.total, self.passed, self.failed
        )
    }
}

pub struct Session<'a> {
    config: &'a FilterConfig,
    options: SessionOptions,
    dedup: Option<&'a mut dyn DedupStore>,
    /// dry-run 中に「追加したことにする」ハッシュ（永続化しない）
    dry_run_seen: HashSet<ContentHash>,
    counters: RunCounters,
    last_status: Instant,
}

impl<'a> Session<'a> {
    pub fn new(
        config: &'a FilterConfig,
        options: SessionOptions,
        dedup: Option<&'a mut dyn DedupStore>,
    ) -> Self {
        Self {
            config,
            options,
            dedup,
            dry_run_seen: HashSet::new(),
            counters: RunCounters::default(),
            last_status: Instant::now(),
        }
    }

    pub fn counters(&self) -> &RunCounters {
        &self.counters
    }

    /// 1レコードを判定し、採用なら sink に書き出す。
    pub fn process(&mut self, record: &RawRecord, sink: &mut dyn Write) -> Result<(Verdict, Outcome)> {
        let verdict = classify(record, self.config);
        let outcome = match &verdict {
            Verdict::Reject(reason) => Outcome::Rejected(reason.clone()),
            Verdict::Accept => self.check_novelty(record, sink)?,
        };
        self.counters.record(&outcome);
        Ok((verdict, outcome))
    }

    fn check_novelty(&mut self, record: &RawRecord, sink: &mut dyn Write) -> Result<Outcome> {
        let dry_run = self.options.dry_run;
        if let Some(store) = self.dedup.as_deref_mut() {
            let hash = ContentHash::of_record(record.as_str());
            if store.contains(&hash)? {
                return Ok(Outcome::Duplicate);
            }
            if dry_run {
                if !self.dry_run_seen.insert(hash) {
                    return Ok(Outcome::Duplicate);
                }
                return Ok(Outcome::Accepted);
            }
            // 先に書き出してから登録する。間で落ちても「未出現」側に倒れる。
            write_record(sink, record)?;
            if let Err(e) = store.insert(&hash) {
                log::warn!("dedup insert failed for {hash}: {e}");
                self.counters.insert_failures += 1;
            }
            return Ok(Outcome::Accepted);
        }
        if !dry_run {
            write_record(sink, record)?;
        }
        Ok(Outcome::Accepted)
    }

    /// ストリームを最後まで（または対話モードで中断されるまで）処理する。
    pub fn run<I>(
        &mut self,
        records: I,
        sink: &mut dyn Write,
        console: &mut dyn Write,
        prompt: &mut dyn ChunkPrompt,
    ) -> Result<RunCounters>
    where
        I: IntoIterator<Item = io::Result<RawRecord>>,
    {
        log::info!(
            "session start: mode={:?} dry_run={} dedup={}",
            self.options.mode,
            self.options.dry_run,
            self.dedup.is_some()
        );
        self.last_status = Instant::now();
        let mut records = records.into_iter().peekable();
        let mut in_chunk = 0usize;

        while let Some(next) = records.next() {
            let record = next?;
            let (verdict, outcome) = self.process(&record, sink)?;
            match self.options.mode {
                RunMode::Batch => {
                    log::debug!("game {}: {verdict}", self.counters.total);
                }
                RunMode::Interactive { .. } => {
                    self.echo(console, &record, &verdict, &outcome)?;
                }
            }
            self.maybe_status(console)?;

            if let RunMode::Interactive { chunk } = self.options.mode {
                in_chunk += 1;
                // 次のレコードを先読みしてから尋ねる（最後のチャンクの後は確認しない）。
                // 読み取りがブロックしうるのは承知の上。
                if in_chunk >= chunk && records.peek().is_some() {
                    in_chunk = 0;
                    console.flush()?;
                    if prompt.next_chunk()? == ChunkDecision::Quit {
                        writeln!(console, "Quitting as requested by user.")?;
                        break;
                    }
                }
            }
        }

        sink.flush()?;
        if let Some(store) = self.dedup.as_deref_mut() {
            store.flush()?;
        }
        writeln!(console)?;
        writeln!(console, "{}", self.counters.summary_line())?;
        console.flush()?;
        log::info!(
            "session end: total={} passed={} failed={} duplicates={}",
            self.counters.total,
            self.counters.passed,
            self.counters.failed,
            self.counters.duplicates
        );
        Ok(self.counters.clone())
    }

    fn echo(
        &self,
        console: &mut dyn Write,
        record: &RawRecord,
        verdict: &Verdict,
        outcome: &Outcome,
    ) -> io::Result<()> {
        let bar = "=".repeat(40);
        writeln!(console)?;
        writeln!(console, "{bar} GAME {} {bar}", self.counters.total)?;
        writeln!(console, "{}", record.as_str())?;
        match verdict {
            Verdict::Accept => writeln!(console, "PREDICTION: PASS - OK")?,
            Verdict::Reject(reason) => writeln!(console, "PREDICTION: FAIL - {reason}")?,
        }
        if *outcome == Outcome::Duplicate {
            writeln!(console, "SKIP (duplicate)")?;
        }
        Ok(())
    }

    fn maybe_status(&mut self, console: &mut dyn Write) -> io::Result<()> {
        let interval = self.options.status_interval.max(1);
        if self.counters.total % interval != 0 {
            return Ok(());
        }
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_status).as_secs_f64();
        self.last_status = now;
        writeln!(
            console,
            "--STATUS-- processed {} games, passed {}, failed {}, elapsed={elapsed:.1}s",
            self.counters.total, self.counters.passed, self.counters.failed
        )
    }
}

/// レコードをそのまま書き、区切りの空行を足す
fn write_record(sink: &mut dyn Write, record: &RawRecord) -> io::Result<()> {
    sink.write_all(record.as_str().as_bytes())?;
    sink.write_all(b"\n")
}
