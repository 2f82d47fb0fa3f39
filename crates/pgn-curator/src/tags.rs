//! ヘッダ（タグ）と指し手本文の分離

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

static TAG_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^\s*\[(\S+)\s+"(.*)"\]\s*$"#).expect("valid tag-line regex"));

/// タグ名 → 値。同名タグは後勝ち。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeSet {
    tags: HashMap<String, String>,
}

impl AttributeSet {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.tags.get(name).map(String::as_str)
    }

    /// 無ければ空文字列
    pub fn get_or_empty(&self, name: &str) -> &str {
        self.get(name).unwrap_or("")
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.tags.insert(name.into(), value.into());
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for AttributeSet {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut set = Self::default();
        for (k, v) in iter {
            set.insert(k, v);
        }
        set
    }
}

/// `[Name "Value"]` 形式の1行を解釈する
pub fn parse_tag_line(line: &str) -> Option<(&str, &str)> {
    let caps = TAG_LINE_RE.captures(line)?;
    let name = caps.get(1)?.as_str();
    let value = caps.get(2)?.as_str();
    Some((name, value))
}

/// レコードを (タグ集合, 指し手本文) に分ける。
///
/// 先頭から連続するタグ行だけをヘッダとみなし、最初の非タグ行以降を本文とする。
/// 失敗はしない。タグが1つも無ければ本文はレコード全体になる。
pub fn split_record(text: &str) -> (AttributeSet, String) {
    let mut attrs = AttributeSet::default();
    let mut lines = text.lines();
    let mut body_lines: Vec<&str> = Vec::new();
    for line in lines.by_ref() {
        match parse_tag_line(line) {
            Some((name, value)) => attrs.insert(name, value),
            None => {
                body_lines.push(line);
                break;
            }
        }
    }
    body_lines.extend(lines);
    let body = body_lines.join("\n").trim().to_string();
    (attrs, body)
}
