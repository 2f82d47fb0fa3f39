//! 棋譜アーカイブから1局分のレコードを切り出すストリームリーダ
//!
//! アーカイブ全体をメモリに載せず、行を蓄積しながら末尾に結果トークン
//! （`1-0` / `0-1` / `1/2-1/2` / `*`）が現れた時点で1レコードとして返す。
//!
//! 既知の制約: コメントや注釈の中に結果トークンが行末に来ると、そこで
//! レコードが途中で切れる。境界判定はあくまでヒューリスティック。

use std::io::{self, BufRead};
use std::sync::LazyLock;

use regex::Regex;

use crate::common::io::read_line_lossy;

/// 境界判定で見る末尾の文字数
pub const BOUNDARY_TAIL_CHARS: usize = 200;

static RESULT_TAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|\W)(?:1-0|0-1|1/2-1/2|\*)\s*$").expect("valid result-token regex")
});

/// 1局分の生テキスト（ヘッダ行＋指し手、前後の空白を除き末尾に改行1つ）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    text: String,
}

impl RawRecord {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn into_string(self) -> String {
        self.text
    }
}

impl AsRef<str> for RawRecord {
    fn as_ref(&self) -> &str {
        &self.text
    }
}

/// `s` の末尾 `n` 文字（char 境界で安全に切る）
pub(crate) fn tail_chars(s: &str, n: usize) -> &str {
    if n == 0 {
        return "";
    }
    match s.char_indices().rev().nth(n - 1) {
        Some((idx, _)) => &s[idx..],
        None => s,
    }
}

/// 蓄積テキストの末尾が結果トークンで終わっているか
pub fn ends_with_result_token(text: &str) -> bool {
    let tail = tail_chars(text.trim_end(), BOUNDARY_TAIL_CHARS);
    RESULT_TAIL_RE.is_match(tail)
}

/// 読み取り途中の状態。ソースごとに新しく作り直す。
#[derive(Debug, Default)]
pub struct ReaderState {
    acc: String,
    seen_content: bool,
}

impl ReaderState {
    /// 1行（改行なし）を取り込み、レコードが完成したら返す。
    pub fn push_line(&mut self, line: &str) -> Option<RawRecord> {
        if !self.seen_content && line.trim().is_empty() {
            return None;
        }
        if self.seen_content {
            self.acc.push('\n');
        }
        self.seen_content = true;
        self.acc.push_str(line);
        if ends_with_result_token(&self.acc) {
            return Some(self.take());
        }
        None
    }

    /// ソース終端で残りを吐き出す（結果トークンの無い不完全レコード）。
    pub fn finish(&mut self) -> Option<RawRecord> {
        if self.acc.is_empty() {
            return None;
        }
        Some(self.take())
    }

    fn take(&mut self) -> RawRecord {
        let mut text = String::with_capacity(self.acc.len() + 1);
        text.push_str(self.acc.trim());
        text.push('\n');
        self.acc.clear();
        self.seen_content = false;
        RawRecord { text }
    }
}

/// 前方のみ・一度きりのレコードイテレータ
pub struct RecordReader<R> {
    source: R,
    state: ReaderState,
    scratch: Vec<u8>,
    line: String,
    done: bool,
}

impl<R: BufRead> RecordReader<R> {
    pub fn new(source: R) -> Self {
        Self {
            source,
            state: ReaderState::default(),
            scratch: Vec::with_capacity(256),
            line: String::with_capacity(256),
            done: false,
        }
    }
}

impl<R: BufRead> Iterator for RecordReader<R> {
    type Item = io::Result<RawRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        loop {
            match read_line_lossy(&mut self.source, &mut self.scratch, &mut self.line) {
                Ok(true) => {
                    let line = self.line.trim_end_matches('\n').trim_end_matches('\r');
                    if let Some(rec) = self.state.push_line(line) {
                        return Some(Ok(rec));
                    }
                }
                Ok(false) => {
                    self.done = true;
                    return self.state.finish().map(Ok);
                }
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(text: &str) -> Vec<String> {
        RecordReader::new(text.as_bytes())
            .map(|r| r.unwrap().into_string())
            .collect()
    }

    #[test]
    fn splits_games_on_result_tokens() {
        let text = "\n\n[Event \"Rated Blitz game\"]\n[Result \"1-0\"]\n\n1. e4 e5 2. Qh5 1-0\n\n\
                    [Event \"Rated Blitz game\"]\n[Result \"0-1\"]\n\n1. f3 e5 2. g4 Qh4# 0-1\n\n\
                    [Event \"Rated Blitz game\"]\n[Result \"1/2-1/2\"]\n\n1. d4 d5 1/2-1/2\n";
        let recs = collect(text);
        assert_eq!(recs.len(), 3);
        assert!(recs[0].starts_with("[Event"));
        assert!(recs[0].ends_with("2. Qh5 1-0\n"));
        assert!(recs[1].contains("Qh4#"));
        assert!(recs[2].ends_with("1/2-1/2\n"));
    }

    #[test]
    fn header_result_tag_is_not_a_boundary() {
        let recs = collect("[Result \"1-0\"]\n[White \"a\"]\n\n1. e4 1-0\n");
        assert_eq!(recs.len(), 1);
    }

    #[test]
    fn asterisk_terminates_record() {
        let recs = collect("[Result \"*\"]\n\n1. e4 *\n[Result \"1-0\"]\n\n1. d4 1-0\n");
        assert_eq!(recs.len(), 2);
        assert!(recs[0].ends_with("1. e4 *\n"));
    }

    #[test]
    fn token_glued_to_digits_does_not_match() {
        // "21-0" is not a result token
        assert!(!ends_with_result_token("1. e4 21-0"));
        assert!(ends_with_result_token("1. e4 1-0   \n"));
        assert!(ends_with_result_token("1-0"));
    }

    #[test]
    fn trailing_partial_record_is_yielded() {
        let recs = collect("[Result \"1-0\"]\n\n1. e4 1-0\n[Event \"x\"]\n\n1. e4 e5");
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[1], "[Event \"x\"]\n\n1. e4 e5\n");
    }

    #[test]
    fn crlf_lines_are_normalized() {
        let recs = collect("[Result \"1-0\"]\r\n\r\n1. e4 1-0\r\n");
        assert_eq!(recs, vec!["[Result \"1-0\"]\n\n1. e4 1-0\n".to_string()]);
    }

    #[test]
    fn tail_chars_respects_char_boundaries() {
        assert_eq!(tail_chars("ab\u{3042}c", 2), "\u{3042}c");
        assert_eq!(tail_chars("ab", 10), "ab");
        assert_eq!(tail_chars("ab", 0), "");
    }

    #[test]
    fn blank_only_input_yields_nothing() {
        assert!(collect("\n\n   \n").is_empty());
    }
}
