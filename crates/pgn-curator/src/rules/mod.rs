//! 対局の採否判定
//!
//! 判定は `(タグ, 本文, 設定)` の純粋関数。[`checks::CHECKS`] を定義順に
//! 評価し、最初に理由を返したチェックで打ち切る。どのチェックも理由を
//! 返さなければ採用。欠損・不正なデータはエラーにせず、番兵値か
//! 除外理由に落とす。

pub mod checks;

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::config::FilterConfig;
use crate::record::RawRecord;
use crate::tags::{split_record, AttributeSet};

static MOVE_NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)\.").expect("valid move-number regex"));

/// 除外理由。問題のあった値を保持する。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectReason {
    MissingTags,
    NoMoves,
    IncompleteResult { result: String },
    TerminationNotNormal { termination: String },
    BotInvolved { white: String, black: String },
    AnonymousPlayer { white: String, black: String },
    NonRatedEvent { event: String },
    WhiteRatingTooLow { elo: i64, min: i64 },
    BlackRatingTooLow { elo: i64, min: i64 },
    WhiteRatingDiffTooHigh { diff: i64, max: i64 },
    BlackRatingDiffTooHigh { diff: i64, max: i64 },
    IncrementTooHigh { increment: i64, max: i64 },
    TooFewMoves { moves: u64, min: u64 },
    EventNotInModes { event: String },
    TimeControlMismatch { actual: String, required: String },
    BaseTimeOutOfRange { base: Option<i64>, min: Option<i64>, max: Option<i64> },
    BinaryCharacter,
    MovesResultMismatch { result: String },
}

impl RejectReason {
    /// 集計キーに使う固定ラベル
    pub fn label(&self) -> &'static str {
        match self {
            RejectReason::MissingTags => "missing tags",
            RejectReason::NoMoves => "no moves",
            RejectReason::IncompleteResult { .. } => "incomplete result",
            RejectReason::TerminationNotNormal { .. } => "termination not normal",
            RejectReason::BotInvolved { .. } => "bot involved",
            RejectReason::AnonymousPlayer { .. } => "anonymous player",
            RejectReason::NonRatedEvent { .. } => "non-rated event",
            RejectReason::WhiteRatingTooLow { .. } => "white rating too low",
            RejectReason::BlackRatingTooLow { .. } => "black rating too low",
            RejectReason::WhiteRatingDiffTooHigh { .. } => "white rating-diff too high",
            RejectReason::BlackRatingDiffTooHigh { .. } => "black rating-diff too high",
            RejectReason::IncrementTooHigh { .. } => "increment too high",
            RejectReason::TooFewMoves { .. } => "too few moves",
            RejectReason::EventNotInModes { .. } => "event not in requested modes",
            RejectReason::TimeControlMismatch { .. } => "time control mismatch",
            RejectReason::BaseTimeOutOfRange { .. } => "base time out of range",
            RejectReason::BinaryCharacter => "binary character present",
            RejectReason::MovesResultMismatch { .. } => "moves/result mismatch",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = self.label();
        match self {
            RejectReason::MissingTags | RejectReason::NoMoves | RejectReason::BinaryCharacter => {
                f.write_str(label)
            }
            RejectReason::IncompleteResult { result } => write!(f, "{label}: {result:?}"),
            RejectReason::TerminationNotNormal { termination } => {
                write!(f, "{label}: {termination}")
            }
            RejectReason::BotInvolved { white, black }
            | RejectReason::AnonymousPlayer { white, black } => {
                write!(f, "{label}: {white} / {black}")
            }
            RejectReason::NonRatedEvent { event } | RejectReason::EventNotInModes { event } => {
                write!(f, "{label}: {event}")
            }
            RejectReason::WhiteRatingTooLow { elo, min }
            | RejectReason::BlackRatingTooLow { elo, min } => write!(f, "{label}: {elo} < {min}"),
            RejectReason::WhiteRatingDiffTooHigh { diff, max }
            | RejectReason::BlackRatingDiffTooHigh { diff, max } => {
                write!(f, "{label}: |{diff}| > {max}")
            }
            RejectReason::IncrementTooHigh { increment, max } => {
                write!(f, "{label}: {increment}s >= {max}s")
            }
            RejectReason::TooFewMoves { moves, min } => write!(f, "{label}: {moves} < {min}"),
            RejectReason::TimeControlMismatch { actual, required } => {
                write!(f, "{label}: {actual:?} != {required:?}")
            }
            RejectReason::BaseTimeOutOfRange { base, min, max } => {
                let bound = |v: &Option<i64>| v.map_or_else(|| "-".to_string(), |x| x.to_string());
                match base {
                    Some(b) => write!(f, "{label}: {b} not in [{}, {}]", bound(min), bound(max)),
                    None => write!(f, "{label}: unknown base time"),
                }
            }
            RejectReason::MovesResultMismatch { result } => {
                write!(f, "{label}: moves do not end with {result}")
            }
        }
    }
}

/// 判定結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Accept,
    Reject(RejectReason),
}

impl Verdict {
    pub fn is_accept(&self) -> bool {
        matches!(self, Verdict::Accept)
    }

    pub fn reason(&self) -> Option<&RejectReason> {
        match self {
            Verdict::Accept => None,
            Verdict::Reject(r) => Some(r),
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Accept => f.write_str("OK"),
            Verdict::Reject(r) => r.fmt(f),
        }
    }
}

/// 本文中の `N.` の最大値。見つからなければ 0。
pub fn extract_fullmove_count(body: &str) -> u64 {
    MOVE_NUMBER_RE
        .captures_iter(body)
        .filter_map(|c| c.get(1)?.as_str().parse::<u64>().ok())
        .max()
        .unwrap_or(0)
}

/// TimeControl を (持ち時間, 加算) に分解する。
///
/// 欠損・`unlimited` は両方 `None`。解釈できない要素はその要素だけ `None`。
pub fn parse_timecontrol(tc: Option<&str>) -> (Option<i64>, Option<i64>) {
    let tc = match tc.map(str::trim) {
        None | Some("") => return (None, None),
        Some(s) if s.eq_ignore_ascii_case("unlimited") => return (None, None),
        Some(s) => s,
    };
    let mut parts = tc.split('+');
    let base = parts.next().and_then(|p| p.trim().parse::<i64>().ok());
    let inc = parts.next().and_then(|p| p.trim().parse::<i64>().ok());
    (base, inc)
}

/// レーティング。欠損・不正値は 0 として扱う（`--min-white` 等で除外されうる）。
pub fn parse_elo(value: Option<&str>) -> i64 {
    value.and_then(|v| v.trim().parse::<i64>().ok()).unwrap_or(0)
}

/// レーティング変動（`+12` / `-7`）。欠損・不正値は「検査しない」。
pub fn parse_rating_diff(value: Option<&str>) -> Option<i64> {
    let v = value?.replace('+', "");
    let v = v.trim();
    if v.is_empty() {
        return None;
    }
    v.parse::<i64>().ok()
}

/// 判定に使う派生値をまとめたもの
#[derive(Debug, Clone)]
pub struct GameFacts<'a> {
    pub raw: &'a str,
    pub attrs: &'a AttributeSet,
    pub body: &'a str,
    pub full_moves: u64,
    pub base_time: Option<i64>,
    pub increment: Option<i64>,
    pub white_elo: i64,
    pub black_elo: i64,
    pub white_rating_diff: Option<i64>,
    pub black_rating_diff: Option<i64>,
}

impl<'a> GameFacts<'a> {
    pub fn derive(raw: &'a str, attrs: &'a AttributeSet, body: &'a str) -> Self {
        let (base_time, increment) = parse_timecontrol(attrs.get("TimeControl"));
        Self {
            raw,
            attrs,
            body,
            full_moves: extract_fullmove_count(body),
            base_time,
            increment,
            white_elo: parse_elo(attrs.get("WhiteElo")),
            black_elo: parse_elo(attrs.get("BlackElo")),
            white_rating_diff: parse_rating_diff(attrs.get("WhiteRatingDiff")),
            black_rating_diff: parse_rating_diff(attrs.get("BlackRatingDiff")),
        }
    }

    pub fn tag(&self, name: &str) -> &'a str {
        self.attrs.get_or_empty(name)
    }
}

/// 分解済みのレコードを判定する
pub fn evaluate(raw: &str, attrs: &AttributeSet, body: &str, config: &FilterConfig) -> Verdict {
    let facts = GameFacts::derive(raw, attrs, body);
    checks::CHECKS
        .iter()
        .find_map(|check| check(&facts, config))
        .map_or(Verdict::Accept, Verdict::Reject)
}

/// 生レコードを分解して判定する
pub fn classify(record: &RawRecord, config: &FilterConfig) -> Verdict {
    let (attrs, body) = split_record(record.as_str());
    evaluate(record.as_str(), &attrs, &body, config)
}
