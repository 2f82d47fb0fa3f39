//! フィルタ設定とセッション設定

/// ルール評価の閾値・有効フラグ
///
/// 数値閾値の `0` は「無効」を意味する（`min_*`）。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterConfig {
    /// 結果が無い / `*` の対局を除外
    pub skip_incomplete: bool,
    /// Termination が Normal 以外の対局を除外
    pub skip_termination: bool,
    /// BOT が関与する対局を除外
    pub skip_bots: bool,
    /// 匿名・ゲストの対局を除外
    pub skip_anonymous: bool,
    /// レーティング対象外の対局を除外
    pub skip_nonrated: bool,
    /// 白の最低レーティング（0=無効）
    pub min_white: i64,
    /// 黒の最低レーティング（0=無効）
    pub min_black: i64,
    /// 最低手数（0=無効）
    pub min_moves: u64,
    /// レーティング変動の絶対値の上限
    pub max_rating_diff: Option<i64>,
    /// この秒数以上の加算時間を持つ対局を除外
    pub max_increment: Option<i64>,
    /// Event に含まれていなければならない部分文字列（いずれか一致）
    pub modes: Option<Vec<String>>,
    /// TimeControl の完全一致指定
    pub timecontrol_exact: Option<String>,
    /// 持ち時間（秒）の下限
    pub time_min: Option<i64>,
    /// 持ち時間（秒）の上限
    pub time_max: Option<i64>,
}

pub const DEFAULT_MAX_RATING_DIFF: i64 = 150;
pub const DEFAULT_MAX_INCREMENT: i64 = 31;

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            skip_incomplete: true,
            skip_termination: true,
            skip_bots: true,
            skip_anonymous: true,
            skip_nonrated: true,
            min_white: 0,
            min_black: 0,
            min_moves: 0,
            max_rating_diff: Some(DEFAULT_MAX_RATING_DIFF),
            max_increment: Some(DEFAULT_MAX_INCREMENT),
            modes: None,
            timecontrol_exact: None,
            time_min: None,
            time_max: None,
        }
    }
}

/// `a,b, c` 形式のモード指定を分解する。空要素は捨てる。
pub fn parse_modes(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .map(str::to_string)
        .collect()
}

/// 実行モード
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// 一時停止せず最後まで処理する
    Batch,
    /// `chunk` 件ごとに判定結果を表示し、続行確認を待つ
    Interactive { chunk: usize },
}

impl RunMode {
    /// `--test-chunk` の値から決める（0=バッチ）
    pub fn from_test_chunk(n: usize) -> Self {
        if n == 0 { RunMode::Batch } else { RunMode::Interactive { chunk: n } }
    }
}

pub const DEFAULT_STATUS_INTERVAL: u64 = 100_000;
pub const DEFAULT_COMMIT_INTERVAL: u64 = 10_000;

/// セッション（オーケストレータ）の設定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    pub mode: RunMode,
    /// 判定と集計のみ行い、出力と重複ストアへの書き込みをしない
    pub dry_run: bool,
    /// 進捗行を出す間隔（レコード数、1以上）
    pub status_interval: u64,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            mode: RunMode::Batch,
            dry_run: false,
            status_interval: DEFAULT_STATUS_INTERVAL,
        }
    }
}
