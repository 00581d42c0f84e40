//! 辞書リソースの並行ローダー
//!
//! [`DictionaryLoader::load`]は4つのトラックをそれぞれ専用のスレッドで実行します:
//!
//! | トラック | リソース | ビルド操作 |
//! | -------- | -------- | ---------- |
//! | トライ | `base`, `check` | [`build_trie`](DictionaryAssembler::build_trie) |
//! | トークン情報 | `tid`, `tidPos`, `tidMap` | [`build_token_info`](DictionaryAssembler::build_token_info) |
//! | 接続コスト | `cc` | [`build_connection_costs`](DictionaryAssembler::build_connection_costs) |
//! | 未知語 | `unk`, `unkPos`, `unkMap`, `unkChar`, `unkCompat`, `unkInvoke` | [`build_unknown_dictionary`](DictionaryAssembler::build_unknown_dictionary) |
//!
//! トラック内のリソースは並行に取得され、すべての取得が完了してから
//! デコードとビルドが行われます。最初に観測されたエラーが即座に報告され、
//! 他のトラックの結果は破棄されます。実行中の取得はキャンセルされません。
//!
//! # 例
//!
//! ```
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use dicload::fetch::MemoryFetcher;
//! use dicload::DictionaryLoader;
//!
//! let fetcher = MemoryFetcher::new();
//! let loader = DictionaryLoader::builder("/dic").build(fetcher)?;
//!
//! assert_eq!(loader.identifier(dicload::ResourceKey::Cc), "/dic/cc.dat");
//! // No resources are registered, so the load fails with the first fetch error.
//! assert!(loader.load().is_err());
//! # Ok(())
//! # }
//! ```

mod track;

use std::fmt;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::bounded;

use crate::dictionary::{DictionaryAssembler, DictionaryParts, DynamicAssembler};
use crate::errors::{LoaderError, Result};
use crate::fetch::Fetch;
use crate::resource::{ResourceFileNames, ResourceKey, join_path};

use self::track::{TrackContext, TrackOutput};

/// 並行に実行される読み込みの単位
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TrackKind {
    /// base/check配列
    Trie,
    /// トークン情報
    TokenInfo,
    /// 接続コスト行列
    ConnectionCosts,
    /// 未知語辞書
    Unknown,
}

impl TrackKind {
    /// すべてのトラック
    pub const ALL: [Self; 4] = [
        Self::Trie,
        Self::TokenInfo,
        Self::ConnectionCosts,
        Self::Unknown,
    ];

    /// このトラックが取得するリソースを、ビルド操作に渡す順序で返します。
    pub const fn resources(self) -> &'static [ResourceKey] {
        match self {
            Self::Trie => &[ResourceKey::Base, ResourceKey::Check],
            Self::TokenInfo => &[ResourceKey::Tid, ResourceKey::TidPos, ResourceKey::TidMap],
            Self::ConnectionCosts => &[ResourceKey::Cc],
            Self::Unknown => &[
                ResourceKey::Unk,
                ResourceKey::UnkPos,
                ResourceKey::UnkMap,
                ResourceKey::UnkChar,
                ResourceKey::UnkCompat,
                ResourceKey::UnkInvoke,
            ],
        }
    }

    /// トラック名を返します。
    pub const fn name(self) -> &'static str {
        match self {
            Self::Trie => "trie",
            Self::TokenInfo => "token-info",
            Self::ConnectionCosts => "connection-costs",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for TrackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// ローダーの動作設定
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoaderOptions {
    /// 1回の取得を待つ最大時間。`None`の場合は無期限に待ちます。
    ///
    /// タイムアウトした取得は[`std::io::ErrorKind::TimedOut`]の取得エラーになります。
    /// 取得そのものは中断されず、後で届いた結果は破棄されます。
    pub fetch_timeout: Option<Duration>,

    /// ローダーが生成するスレッドの名前の接頭辞
    pub thread_name_prefix: String,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            fetch_timeout: None,
            thread_name_prefix: "dicload".to_string(),
        }
    }
}

/// [`DictionaryLoader`]のビルダー
#[derive(Clone, Debug)]
pub struct DictionaryLoaderBuilder {
    dic_path: String,
    file_names: ResourceFileNames,
    options: LoaderOptions,
}

impl DictionaryLoaderBuilder {
    /// ファイル名の対応を設定します。
    pub fn file_names(mut self, file_names: ResourceFileNames) -> Self {
        self.file_names = file_names;
        self
    }

    /// 取得のタイムアウトを設定します。
    pub fn fetch_timeout(mut self, timeout: Duration) -> Self {
        self.options.fetch_timeout = Some(timeout);
        self
    }

    /// スレッド名の接頭辞を設定します。
    pub fn thread_name_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.options.thread_name_prefix = prefix.into();
        self
    }

    /// 動作設定をまとめて置き換えます。
    pub fn options(mut self, options: LoaderOptions) -> Self {
        self.options = options;
        self
    }

    /// 参照アセンブラ[`DynamicAssembler`]を使うローダーを作成します。
    ///
    /// # エラー
    ///
    /// 解決されたリソース識別子が無効な場合にエラーを返します。
    pub fn build<F>(self, fetcher: F) -> Result<DictionaryLoader<DynamicAssembler>>
    where
        F: Fetch + 'static,
    {
        self.build_with_assembler(fetcher, DynamicAssembler)
    }

    /// 任意のアセンブラを使うローダーを作成します。
    ///
    /// # エラー
    ///
    /// 解決されたリソース識別子が無効な場合にエラーを返します。
    pub fn build_with_assembler<F, A>(self, fetcher: F, assembler: A) -> Result<DictionaryLoader<A>>
    where
        F: Fetch + 'static,
        A: DictionaryAssembler,
    {
        let mut identifiers = Vec::with_capacity(ResourceKey::ALL.len());
        for (key, name) in self.file_names.iter() {
            let identifier = join_path(&self.dic_path, name);
            validate_identifier(key, &identifier)?;
            identifiers.push(identifier);
        }

        Ok(DictionaryLoader {
            dic_path: self.dic_path,
            file_names: self.file_names,
            identifiers,
            fetcher: Arc::new(fetcher),
            assembler: Arc::new(assembler),
            options: self.options,
        })
    }
}

fn validate_identifier(key: ResourceKey, identifier: &str) -> Result<()> {
    if identifier.contains('\0') {
        return Err(LoaderError::invalid_path(
            identifier,
            format!("the identifier of '{key}' contains a NUL byte"),
        ));
    }
    if identifier.is_empty() || identifier.ends_with(crate::resource::SEPARATOR) {
        return Err(LoaderError::invalid_path(
            identifier,
            format!("the file name of '{key}' is empty"),
        ));
    }
    Ok(())
}

/// 辞書リソースを並行に取得・デコードし、アセンブラに渡すローダー
///
/// 構築後は不変で、[`load`](Self::load)を何度でも呼び出せます。
/// 各呼び出しは新しい取得・デコード・組み立てのサイクルを実行します。
pub struct DictionaryLoader<A: DictionaryAssembler = DynamicAssembler> {
    dic_path: String,
    file_names: ResourceFileNames,
    identifiers: Vec<String>,
    fetcher: Arc<dyn Fetch>,
    assembler: Arc<A>,
    options: LoaderOptions,
}

impl DictionaryLoader<DynamicAssembler> {
    /// ビルダーを作成します。
    ///
    /// # 引数
    ///
    /// * `dic_path` - 辞書ディレクトリのパス
    pub fn builder<P: Into<String>>(dic_path: P) -> DictionaryLoaderBuilder {
        DictionaryLoaderBuilder {
            dic_path: dic_path.into(),
            file_names: ResourceFileNames::default(),
            options: LoaderOptions::default(),
        }
    }

    /// 既定のファイル名と参照アセンブラでローダーを作成します。
    ///
    /// # エラー
    ///
    /// 解決されたリソース識別子が無効な場合にエラーを返します。
    pub fn new<P, F>(dic_path: P, fetcher: F) -> Result<Self>
    where
        P: Into<String>,
        F: Fetch + 'static,
    {
        Self::builder(dic_path).build(fetcher)
    }
}

impl<A: DictionaryAssembler> DictionaryLoader<A> {
    /// 辞書ディレクトリのパスを返します。
    pub fn dic_path(&self) -> &str {
        &self.dic_path
    }

    /// 解決済みのファイル名を返します。
    pub fn file_names(&self) -> &ResourceFileNames {
        &self.file_names
    }

    /// 動作設定を返します。
    pub fn options(&self) -> &LoaderOptions {
        &self.options
    }

    /// アセンブラを返します。
    pub fn assembler(&self) -> &A {
        &self.assembler
    }

    /// リソースの識別子を返します。
    pub fn identifier(&self, key: ResourceKey) -> &str {
        &self.identifiers[key as usize]
    }

    /// すべてのリソースを取得して辞書を組み立てます。
    ///
    /// 呼び出しごとにちょうど1つの結果を返します。成功時は組み立てられた辞書、
    /// 失敗時は最初に観測されたエラーです。部分的に組み立てられた辞書が
    /// 返されることはありません。
    ///
    /// # エラー
    ///
    /// - 取得に失敗した場合(タイムアウトを含む)は[`LoaderError::Fetch`]
    /// - バッファを型付き配列として解釈できない場合は[`LoaderError::Decode`]
    /// - アセンブラのビルド操作が失敗した場合は[`LoaderError::Assembly`]
    /// - トラックのスレッドがパニックした場合は[`LoaderError::ThreadPanic`]
    pub fn load(&self) -> Result<A::Output> {
        let start = Instant::now();
        log::debug!("[dicload] Loading dictionary from '{}'", self.dic_path);

        let result = self.run_tracks();
        match &result {
            Ok(_) => log::info!(
                "[dicload] Loaded dictionary from '{}' in {:?}",
                self.dic_path,
                start.elapsed()
            ),
            Err(e) => log::error!(
                "[dicload] Failed to load dictionary from '{}': {}",
                self.dic_path,
                e
            ),
        }
        result
    }

    fn run_tracks(&self) -> Result<A::Output> {
        // Sends never block, so tracks finishing after an early return exit freely.
        let (tx, rx) = bounded(TrackKind::ALL.len());

        for track in TrackKind::ALL {
            let ctx = TrackContext {
                track,
                requests: track
                    .resources()
                    .iter()
                    .map(|&key| (key, self.identifier(key).to_string()))
                    .collect(),
                fetcher: Arc::clone(&self.fetcher),
                assembler: Arc::clone(&self.assembler),
                fetch_timeout: self.options.fetch_timeout,
                thread_name: format!("{}-{}", self.options.thread_name_prefix, track),
            };
            let tx = tx.clone();
            thread::Builder::new()
                .name(ctx.thread_name.clone())
                .spawn(move || {
                    let result = ctx.run();
                    if tx.send(result).is_err() {
                        log::warn!("[dicload] Discarding the late result of the {track} track");
                    }
                })?;
        }
        drop(tx);

        let mut slots = PartSlots::<A>::default();
        for _ in TrackKind::ALL {
            match rx.recv() {
                Ok(Ok(output)) => slots.fill(output),
                Ok(Err(e)) => return Err(e),
                Err(_) => {
                    return Err(LoaderError::ThreadPanic(
                        "a track exited without reporting a result".to_string(),
                    ));
                }
            }
        }

        let parts = slots.into_parts()?;
        Ok(self.assembler.assemble(parts))
    }
}

impl<A: DictionaryAssembler> fmt::Debug for DictionaryLoader<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DictionaryLoader")
            .field("dic_path", &self.dic_path)
            .field("file_names", &self.file_names)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// トラックごとに1つずつ埋まる部品の置き場
struct PartSlots<A: DictionaryAssembler> {
    trie: Option<A::Trie>,
    token_info: Option<A::TokenInfo>,
    connection_costs: Option<A::ConnectionCosts>,
    unknown: Option<A::Unknown>,
}

impl<A: DictionaryAssembler> Default for PartSlots<A> {
    fn default() -> Self {
        Self {
            trie: None,
            token_info: None,
            connection_costs: None,
            unknown: None,
        }
    }
}

impl<A: DictionaryAssembler> PartSlots<A> {
    fn fill(&mut self, output: TrackOutput<A>) {
        match output {
            TrackOutput::Trie(part) => self.trie = Some(part),
            TrackOutput::TokenInfo(part) => self.token_info = Some(part),
            TrackOutput::ConnectionCosts(part) => self.connection_costs = Some(part),
            TrackOutput::Unknown(part) => self.unknown = Some(part),
        }
    }

    fn into_parts(self) -> Result<DictionaryParts<A>> {
        match (self.trie, self.token_info, self.connection_costs, self.unknown) {
            (Some(trie), Some(token_info), Some(connection_costs), Some(unknown)) => {
                Ok(DictionaryParts {
                    trie,
                    token_info,
                    connection_costs,
                    unknown,
                })
            }
            _ => Err(LoaderError::invalid_state(
                "missing dictionary part",
                "a track reported more than once",
            )),
        }
    }
}
