//! リソースのバイト列を取得するフェッチャー
//!
//! ローダーはリソースの取得方法を知りません。取得は[`Fetch`]を実装した
//! 値としてローダーの構築時に注入されます。
//!
//! 以下の実装を提供します:
//!
//! - [`FileFetcher`]: ローカルファイルをメモリマップで読み込む
//! - [`MemoryFetcher`]: メモリ上のバイト列を返す
//! - [`GzipFetcher`]: 別のフェッチャーが返したgzipデータを展開する
//! - [`ZstdFetcher`]: 別のフェッチャーが返したZstandardデータを展開する

use std::fs::File;
use std::io::{self, Read};
use std::ops::Deref;
use std::sync::Arc;

use flate2::read::GzDecoder;
use hashbrown::HashMap;
use memmap2::Mmap;

/// 取得された1つのリソースのバイト列
///
/// ヒープ上のバッファまたはメモリマップドファイルのいずれかです。
pub enum RawBuffer {
    /// ヒープ上に確保されたバッファ
    Heap(Vec<u8>),
    /// メモリマップドファイル
    Mmap(Mmap),
}

impl RawBuffer {
    /// バイト列への参照を返します。
    #[inline(always)]
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Heap(bytes) => bytes,
            Self::Mmap(mmap) => mmap,
        }
    }
}

impl Deref for RawBuffer {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        self.as_bytes()
    }
}

impl AsRef<[u8]> for RawBuffer {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl From<Vec<u8>> for RawBuffer {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Heap(bytes)
    }
}

impl std::fmt::Debug for RawBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self {
            Self::Heap(_) => "Heap",
            Self::Mmap(_) => "Mmap",
        };
        f.debug_struct("RawBuffer")
            .field("kind", &kind)
            .field("len", &self.len())
            .finish()
    }
}

/// リソース識別子からバイト列を取得する機能
///
/// 実装は複数のスレッドから同時に呼び出されます。
/// 失敗した取得をリトライする場合は、このトレイトを実装したラッパーで行ってください。
pub trait Fetch: Send + Sync {
    /// 識別子が指すリソースを取得します。
    ///
    /// # エラー
    ///
    /// リソースを取得できない場合はI/Oエラーを返します。
    fn fetch(&self, identifier: &str) -> io::Result<RawBuffer>;
}

impl<F: Fetch + ?Sized> Fetch for Arc<F> {
    fn fetch(&self, identifier: &str) -> io::Result<RawBuffer> {
        (**self).fetch(identifier)
    }
}

impl<F: Fetch + ?Sized> Fetch for Box<F> {
    fn fetch(&self, identifier: &str) -> io::Result<RawBuffer> {
        (**self).fetch(identifier)
    }
}

/// ローカルファイルシステムからリソースを読み込むフェッチャー
///
/// 識別子をファイルパスとして扱い、ファイルをメモリマップします。
#[derive(Clone, Copy, Debug, Default)]
pub struct FileFetcher;

impl Fetch for FileFetcher {
    fn fetch(&self, identifier: &str) -> io::Result<RawBuffer> {
        let file = File::open(identifier)?;
        let meta = file.metadata()?;
        if meta.is_dir() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("The path '{identifier}' is a directory, but a file was expected."),
            ));
        }

        // Zero-length files cannot be mapped on every platform.
        if meta.len() == 0 {
            return Ok(RawBuffer::Heap(Vec::new()));
        }

        let mmap = unsafe { Mmap::map(&file)? };
        Ok(RawBuffer::Mmap(mmap))
    }
}

/// メモリ上のバイト列を返すフェッチャー
///
/// 辞書をバイナリに埋め込む場合やテストで使用します。
#[derive(Clone, Debug, Default)]
pub struct MemoryFetcher {
    resources: HashMap<String, Arc<[u8]>>,
}

impl MemoryFetcher {
    /// 空のフェッチャーを作成します。
    pub fn new() -> Self {
        Self::default()
    }

    /// 識別子にバイト列を登録します。同じ識別子の既存データは置き換えられます。
    pub fn insert<I, B>(&mut self, identifier: I, bytes: B)
    where
        I: Into<String>,
        B: Into<Arc<[u8]>>,
    {
        self.resources.insert(identifier.into(), bytes.into());
    }

    /// 登録されているリソースの数を返します。
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    /// リソースが1つも登録されていないかどうかを返します。
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

impl Fetch for MemoryFetcher {
    fn fetch(&self, identifier: &str) -> io::Result<RawBuffer> {
        self.resources
            .get(identifier)
            .map(|bytes| RawBuffer::Heap(bytes.to_vec()))
            .ok_or_else(|| {
                io::Error::new(
                    io::ErrorKind::NotFound,
                    format!("no resource is registered for '{identifier}'"),
                )
            })
    }
}

/// gzip圧縮されたリソースを展開するフェッチャー
///
/// 識別子に拡張子(既定では`.gz`)を付けて内側のフェッチャーから取得し、展開します。
#[derive(Clone, Debug)]
pub struct GzipFetcher<F> {
    inner: F,
    suffix: String,
}

impl<F: Fetch> GzipFetcher<F> {
    /// `.gz`を付けて取得するフェッチャーを作成します。
    pub fn new(inner: F) -> Self {
        Self::with_suffix(inner, ".gz")
    }

    /// 任意の拡張子を付けて取得するフェッチャーを作成します。空文字列の場合は識別子をそのまま使います。
    pub fn with_suffix<S: Into<String>>(inner: F, suffix: S) -> Self {
        Self {
            inner,
            suffix: suffix.into(),
        }
    }
}

impl<F: Fetch> Fetch for GzipFetcher<F> {
    fn fetch(&self, identifier: &str) -> io::Result<RawBuffer> {
        let compressed = self.inner.fetch(&format!("{identifier}{}", self.suffix))?;
        let mut decompressed = Vec::with_capacity(compressed.len() * 4);
        GzDecoder::new(compressed.as_bytes()).read_to_end(&mut decompressed)?;
        Ok(RawBuffer::Heap(decompressed))
    }
}

/// Zstandard圧縮されたリソースを展開するフェッチャー
///
/// 識別子に拡張子(既定では`.zst`)を付けて内側のフェッチャーから取得し、展開します。
#[derive(Clone, Debug)]
pub struct ZstdFetcher<F> {
    inner: F,
    suffix: String,
}

impl<F: Fetch> ZstdFetcher<F> {
    /// `.zst`を付けて取得するフェッチャーを作成します。
    pub fn new(inner: F) -> Self {
        Self::with_suffix(inner, ".zst")
    }

    /// 任意の拡張子を付けて取得するフェッチャーを作成します。空文字列の場合は識別子をそのまま使います。
    pub fn with_suffix<S: Into<String>>(inner: F, suffix: S) -> Self {
        Self {
            inner,
            suffix: suffix.into(),
        }
    }
}

impl<F: Fetch> Fetch for ZstdFetcher<F> {
    fn fetch(&self, identifier: &str) -> io::Result<RawBuffer> {
        let compressed = self.inner.fetch(&format!("{identifier}{}", self.suffix))?;
        let decompressed = zstd::stream::decode_all(compressed.as_bytes())?;
        Ok(RawBuffer::Heap(decompressed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io::Write;

    use flate2::Compression;
    use flate2::write::GzEncoder;
    use tempfile::tempdir;

    #[test]
    fn test_memory_fetcher() {
        let mut fetcher = MemoryFetcher::new();
        fetcher.insert("dic/cc.dat", vec![1u8, 2, 3]);
        assert_eq!(fetcher.len(), 1);

        assert_eq!(fetcher.fetch("dic/cc.dat").unwrap().as_bytes(), &[1, 2, 3]);
        let err = fetcher.fetch("dic/base.dat").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn test_file_fetcher() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("base.dat");
        std::fs::write(&path, [9u8, 8, 7, 6]).unwrap();
        let empty = dir.path().join("empty.dat");
        std::fs::write(&empty, b"").unwrap();

        let buffer = FileFetcher.fetch(path.to_str().unwrap()).unwrap();
        assert!(matches!(buffer, RawBuffer::Mmap(_)));
        assert_eq!(&*buffer, &[9, 8, 7, 6]);

        let buffer = FileFetcher.fetch(empty.to_str().unwrap()).unwrap();
        assert!(matches!(buffer, RawBuffer::Heap(_)));
        assert!(buffer.is_empty());

        let err = FileFetcher.fetch(dir.path().to_str().unwrap()).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);

        let missing = dir.path().join("missing.dat");
        let err = FileFetcher.fetch(missing.to_str().unwrap()).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn test_gzip_fetcher() {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"connection costs").unwrap();
        let compressed = encoder.finish().unwrap();

        let mut inner = MemoryFetcher::new();
        inner.insert("dic/cc.dat.gz", compressed);
        let fetcher = GzipFetcher::new(inner);

        assert_eq!(fetcher.fetch("dic/cc.dat").unwrap().as_bytes(), b"connection costs");
        assert!(fetcher.fetch("dic/base.dat").is_err());
    }

    #[test]
    fn test_zstd_fetcher() {
        let compressed = zstd::stream::encode_all(&b"check array"[..], 3).unwrap();

        let mut inner = MemoryFetcher::new();
        inner.insert("check.dat.zst", compressed);
        let fetcher = ZstdFetcher::new(inner);

        assert_eq!(fetcher.fetch("check.dat").unwrap().as_bytes(), b"check array");
    }

    #[test]
    fn test_zstd_fetcher_rejects_garbage() {
        let mut inner = MemoryFetcher::new();
        inner.insert("check.dat", vec![0u8; 16]);
        let fetcher = ZstdFetcher::with_suffix(inner, "");

        assert!(fetcher.fetch("check.dat").is_err());
    }
}
