//! ファイルI/Oユーティリティ（gzip対応）
//!
//! 入力は拡張子 `.gz` で透過的に展開し、出力は追記モードで開く。
//! パス `-` は標準入出力を表す。

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use flate2::Compression;
use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;

use crate::error::{CurateError, Result};

const READER_BUF_CAP: usize = 128 * 1024; // 128 KiB
const WRITER_BUF_CAP: usize = 64 * 1024;

fn is_gz(p: &Path) -> bool {
    p.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("gz"))
}

fn is_stdio(p: &Path) -> bool {
    p.to_string_lossy() == "-"
}

/// 入力を開く。`.gz` なら展開レイヤを挟む。
pub fn open_reader<P: AsRef<Path>>(path: P) -> Result<Box<dyn BufRead>> {
    let p = path.as_ref();
    if is_stdio(p) {
        return Ok(Box::new(BufReader::with_capacity(READER_BUF_CAP, io::stdin())));
    }
    let f = File::open(p).map_err(|source| CurateError::OpenInput {
        path: p.to_path_buf(),
        source,
    })?;
    if is_gz(p) {
        let dec = MultiGzDecoder::new(f);
        return Ok(Box::new(BufReader::with_capacity(READER_BUF_CAP, dec)));
    }
    Ok(Box::new(BufReader::with_capacity(READER_BUF_CAP, f)))
}

enum Sink {
    File(BufWriter<File>),
    Stdout(io::StdoutLock<'static>),
    Gz(GzEncoder<BufWriter<File>>),
}

/// 追記先。`close()` で gzip メンバを閉じ、書き込んだバイト数を返す。
#[must_use = "call .close() to finish the gzip member and surface write errors"]
pub struct Appender {
    path: PathBuf,
    sink: Sink,
    written: u64,
}

impl Appender {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// これまでに追記したバイト数（圧縮前）
    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn close(self) -> io::Result<u64> {
        match self.sink {
            Sink::File(w) => w.into_inner().map_err(|e| e.into_error())?.flush()?,
            Sink::Stdout(mut s) => s.flush()?,
            Sink::Gz(enc) => enc.finish()?.flush()?,
        }
        Ok(self.written)
    }
}

impl Write for Appender {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = match &mut self.sink {
            Sink::File(w) => w.write(buf)?,
            Sink::Stdout(s) => s.write(buf)?,
            Sink::Gz(enc) => enc.write(buf)?,
        };
        self.written += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        match &mut self.sink {
            Sink::File(w) => w.flush(),
            Sink::Stdout(s) => s.flush(),
            Sink::Gz(enc) => enc.flush(),
        }
    }
}

/// 出力を追記モードで開く。親ディレクトリが無ければ作成する。
///
/// `.gz` の場合は既存ファイルの末尾に新しい gzip メンバを追加する
/// （マルチメンバ gzip として読める）。
pub fn open_appender<P: AsRef<Path>>(path: P) -> Result<Appender> {
    let p = path.as_ref();
    let path = p.to_path_buf();
    if is_stdio(p) {
        return Ok(Appender {
            path,
            sink: Sink::Stdout(io::stdout().lock()),
            written: 0,
        });
    }
    if let Some(parent) = p.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| CurateError::CreateOutputDir {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(p)
        .map_err(|source| CurateError::OpenOutput {
            path: path.clone(),
            source,
        })?;
    let buffered = BufWriter::with_capacity(WRITER_BUF_CAP, file);
    let sink = if is_gz(p) {
        Sink::Gz(GzEncoder::new(buffered, Compression::default()))
    } else {
        Sink::File(buffered)
    };
    Ok(Appender {
        path,
        sink,
        written: 0,
    })
}

/// 1行読み込む（改行を含む）。不正な UTF-8 は U+FFFD に置換する。
///
/// EOF なら `Ok(false)`。
pub fn read_line_lossy<R: BufRead + ?Sized>(
    reader: &mut R,
    scratch: &mut Vec<u8>,
    line: &mut String,
) -> io::Result<bool> {
    scratch.clear();
    line.clear();
    if reader.read_until(b'\n', scratch)? == 0 {
        return Ok(false);
    }
    line.push_str(&String::from_utf8_lossy(scratch));
    Ok(true)
}
