//! pgn_filter - 大規模 PGN アーカイブのストリーミングフィルタ
//!
//! 入力 PGN（.gz 可）を1局ずつ判定し、条件を満たす対局を出力ファイルへ追記する。
//! `--dedup-db` を指定すると実行をまたいで同一対局の再出力を防ぐ。
//!
//! # 使用例
//!
//! ```bash
//! # レーティング 1800 以上のブリッツ・ラピッドを抽出（重複排除あり）
//! cargo run -p pgn-curator --release --bin pgn_filter -- \
//!   -i lichess_db_standard_rated_2024-01.pgn.gz -o filtered/blitz.pgn \
//!   --min-white 1800 --min-black 1800 --modes blitz,rapid --dedup-db filtered/seen.db
//!
//! # 最初の 20 局ずつ判定結果を表示して確認（書き込みなし）
//! cargo run -p pgn-curator --release --bin pgn_filter -- \
//!   -i sample.pgn -o /tmp/out.pgn -t 20 --dry-run
//! ```

use std::fs::File;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser};

use pgn_curator::common::io::{open_appender, open_reader};
use pgn_curator::config::{
    parse_modes, DEFAULT_COMMIT_INTERVAL, DEFAULT_MAX_INCREMENT, DEFAULT_MAX_RATING_DIFF,
    DEFAULT_STATUS_INTERVAL,
};
use pgn_curator::{
    ChunkDecision, ChunkPrompt, DedupStore, FilterConfig, RecordReader, RunMode, Session,
    SessionOptions, SqliteDedupStore,
};

/// 大規模 PGN アーカイブのフィルタ（ストリーミング）
#[derive(Parser, Debug)]
#[command(
    name = "pgn_filter",
    version,
    about = "Filter large PGN dumps (streaming)\n\nレーティング・手数・持ち時間・終局理由などで対局を選別し、重複を除いて追記する"
)]
struct Cli {
    /// 入力 PGN（.gz 可、"-" で標準入力）
    #[arg(short, long)]
    input: PathBuf,

    /// 出力 PGN（追記、.gz 可、"-" で標準出力）
    #[arg(short, long)]
    output: PathBuf,

    /// 対話確認モード: N 局ごとに判定を表示して Enter を待つ（0=無効）
    #[arg(short = 't', long, default_value_t = 0)]
    test_chunk: usize,

    /// 判定と集計のみ行い、出力・重複ストアに書き込まない
    #[arg(long)]
    dry_run: bool,

    /// 白の最低レーティング（0=無効）
    #[arg(long, default_value_t = 0)]
    min_white: i64,

    /// 黒の最低レーティング（0=無効）
    #[arg(long, default_value_t = 0)]
    min_black: i64,

    /// 最低手数（0=無効）
    #[arg(long, default_value_t = 0)]
    min_moves: u64,

    /// 許可する対局種別（カンマ区切り、Event タグの部分一致。例: blitz,rapid,classical）
    #[arg(long)]
    modes: Option<String>,

    /// TimeControl の完全一致（例: "600+0"）
    #[arg(long)]
    timecontrol_exact: Option<String>,

    /// 持ち時間（秒）の下限
    #[arg(long)]
    time_min: Option<i64>,

    /// 持ち時間（秒）の上限
    #[arg(long)]
    time_max: Option<i64>,

    /// 結果の無い対局を除外（既定 ON）
    #[arg(long, overrides_with = "allow_incomplete")]
    skip_incomplete: bool,
    /// 結果の無い対局も許可
    #[arg(long, overrides_with = "skip_incomplete")]
    allow_incomplete: bool,

    /// Termination が Normal 以外の対局を除外（既定 ON）
    #[arg(long, overrides_with = "allow_termination")]
    skip_termination: bool,
    /// Normal 以外の終局も許可
    #[arg(long, overrides_with = "skip_termination")]
    allow_termination: bool,

    /// BOT が関与する対局を除外（既定 ON）
    #[arg(long, overrides_with = "allow_bots")]
    skip_bots: bool,
    /// BOT を許可
    #[arg(long, overrides_with = "skip_bots")]
    allow_bots: bool,

    /// 匿名・ゲストの対局を除外（既定 ON）
    #[arg(long, overrides_with = "allow_anonymous")]
    skip_anonymous: bool,
    /// 匿名・ゲストを許可
    #[arg(long, overrides_with = "skip_anonymous")]
    allow_anonymous: bool,

    /// レーティング対象外の対局を除外（既定 ON）
    #[arg(long, overrides_with = "allow_nonrated")]
    skip_nonrated: bool,
    /// レーティング対象外も許可
    #[arg(long, overrides_with = "skip_nonrated")]
    allow_nonrated: bool,

    /// WhiteRatingDiff / BlackRatingDiff の絶対値の上限
    #[arg(long, default_value_t = DEFAULT_MAX_RATING_DIFF)]
    max_rating_diff: i64,

    /// 加算時間（秒）がこの値以上の対局を除外
    #[arg(long, default_value_t = DEFAULT_MAX_INCREMENT)]
    max_increment: i64,

    /// 進捗表示の間隔（局数）
    #[arg(long, default_value_t = DEFAULT_STATUS_INTERVAL, value_parser = clap::value_parser!(u64).range(1..))]
    status: u64,

    /// 重複排除用 SQLite ファイル（省略時は重複排除なし）
    #[arg(long)]
    dedup_db: Option<PathBuf>,

    /// 重複ストアのコミット間隔（追加件数）
    #[arg(long, default_value_t = DEFAULT_COMMIT_INTERVAL)]
    commit_interval: u64,

    /// 集計（除外理由別の件数を含む）を JSON で出力
    #[arg(long)]
    stats: Option<PathBuf>,
}

impl Cli {
    fn filter_config(&self) -> FilterConfig {
        let modes = self.modes.as_deref().map(parse_modes).filter(|m| !m.is_empty());
        FilterConfig {
            skip_incomplete: !self.allow_incomplete,
            skip_termination: !self.allow_termination,
            skip_bots: !self.allow_bots,
            skip_anonymous: !self.allow_anonymous,
            skip_nonrated: !self.allow_nonrated,
            min_white: self.min_white,
            min_black: self.min_black,
            min_moves: self.min_moves,
            max_rating_diff: Some(self.max_rating_diff),
            max_increment: Some(self.max_increment),
            modes,
            timecontrol_exact: self.timecontrol_exact.clone().filter(|s| !s.is_empty()),
            time_min: self.time_min,
            time_max: self.time_max,
        }
    }

    /// 引数同士の矛盾を検出する。標準入力を棋譜と確認応答の両方には使えない。
    fn validate(&self) -> std::result::Result<(), clap::Error> {
        if self.test_chunk > 0 && self.input.as_os_str() == "-" {
            return Err(Cli::command().error(
                ErrorKind::ArgumentConflict,
                "--test-chunk reads answers from stdin and cannot be combined with --input -",
            ));
        }
        Ok(())
    }

    fn session_options(&self) -> SessionOptions {
        SessionOptions {
            mode: RunMode::from_test_chunk(self.test_chunk),
            dry_run: self.dry_run,
            status_interval: self.status,
        }
    }
}

/// 標準入力で続行を確認する。"q" で終了、EOF も終了扱い。
struct StdinPrompt;

impl ChunkPrompt for StdinPrompt {
    fn next_chunk(&mut self) -> io::Result<ChunkDecision> {
        let mut out = io::stdout();
        write!(out, "Press Enter to continue to next chunk (or 'q' to quit): ")?;
        out.flush()?;
        let mut answer = String::new();
        if io::stdin().lock().read_line(&mut answer)? == 0 {
            return Ok(ChunkDecision::Quit);
        }
        if answer.trim().eq_ignore_ascii_case("q") {
            Ok(ChunkDecision::Quit)
        } else {
            Ok(ChunkDecision::Continue)
        }
    }
}

fn init_logger() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(|buf, record| {
            writeln!(buf, "[{}] {}: {}", record.level(), record.target(), record.args())
        })
        .write_style(env_logger::WriteStyle::Never)
        .target(env_logger::Target::Stderr)
        .init();
}

fn main() -> Result<()> {
    init_logger();
    let cli = Cli::parse();
    if let Err(e) = cli.validate() {
        e.exit();
    }
    let config = cli.filter_config();
    let options = cli.session_options();

    println!("Starting PGN filtering");
    println!("Input: {} -> Output: {}", cli.input.display(), cli.output.display());
    log::debug!("filter config: {config:?}");

    let reader = open_reader(&cli.input).context("cannot read input archive")?;

    let mut dedup = match &cli.dedup_db {
        Some(path) => {
            // dry-run は参照のみ（ファイルを作らず、pragma も設定しない）
            let store = if cli.dry_run {
                SqliteDedupStore::open_read_only(path)
            } else {
                SqliteDedupStore::open_with_interval(path, cli.commit_interval)
            }
            .context("cannot open dedup store")?;
            log::info!(
                "dedup store {} opened{} ({} entries)",
                path.display(),
                if store.is_read_only() { " read-only" } else { "" },
                store.len()?
            );
            Some(store)
        }
        None => None,
    };

    // dry-run では出力ファイルを開かない
    let mut writer = if cli.dry_run {
        None
    } else {
        Some(open_appender(&cli.output).context("cannot open output")?)
    };
    let mut discard = io::sink();
    let sink: &mut dyn Write = match writer.as_mut() {
        Some(w) => w,
        None => &mut discard,
    };

    let counters = {
        let store = dedup.as_mut().map(|d| d as &mut dyn DedupStore);
        let mut session = Session::new(&config, options, store);
        let mut console = io::stdout();
        session.run(RecordReader::new(reader), sink, &mut console, &mut StdinPrompt)?
    };

    if let Some(w) = writer {
        let path = w.path().to_path_buf();
        let bytes = w
            .close()
            .with_context(|| format!("failed to finalize {}", path.display()))?;
        log::info!("appended {bytes} bytes to {}", path.display());
    }
    if let Some(mut store) = dedup {
        store.close().context("failed to close dedup store")?;
    }

    if let Some(path) = &cli.stats {
        let file = File::create(path)
            .with_context(|| format!("Failed to create stats file: {}", path.display()))?;
        serde_json::to_writer_pretty(file, &counters).context("Failed to write stats JSON")?;
        log::info!("stats written to {}", path.display());
    }
    Ok(())
}
