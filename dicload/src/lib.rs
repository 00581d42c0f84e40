//! # dicload
//!
//! 形態素解析辞書のバイナリリソースを並行に読み込むローダーです。
//!
//! ## 概要
//!
//! 辞書は12個の独立したバイナリリソース(ダブル配列、トークン情報、接続コスト、
//! 未知語定義など)から構成されます。このライブラリは、それらを4つのトラックに分けて
//! 並行に取得し、型付き配列にデコードして、辞書のコレクターに渡します。
//!
//! ## 主な機能
//!
//! - **並行読み込み**: トラックごとに専用スレッドで取得・デコード・構築を実行
//! - **単一の結果**: 1回の読み込みで、完成した辞書か最初のエラーのどちらか1つだけを報告
//! - **差し替え可能な取得**: ローカルファイル、メモリ、gzip/Zstandard圧縮に対応
//! - **スナップショット**: 組み立てた辞書をrkyv形式で保存・復元
//!
//! ## 使用例
//!
//! ```no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use dicload::fetch::{FileFetcher, GzipFetcher};
//! use dicload::DictionaryLoader;
//!
//! let loader = DictionaryLoader::new("dict/", GzipFetcher::new(FileFetcher))?;
//! let dict = loader.load()?;
//!
//! for &token_id in dict.lookup_tokens("東京") {
//!     println!("{:?}", dict.token_info().features(token_id));
//! }
//! # Ok(())
//! # }
//! ```
#![cfg_attr(docsrs, feature(doc_cfg))]

/// バッファの型付き配列へのデコード
pub mod decode;

/// 辞書の組み立て
pub mod dictionary;

/// エラー型の定義
pub mod errors;

/// リソースの取得
pub mod fetch;

/// 並行ローダー
pub mod loader;

/// リソースキーとファイル名
pub mod resource;

#[cfg(test)]
mod test_utils;

// Re-exports
pub use dictionary::{DictionaryAssembler, DictionaryParts, DynamicAssembler, DynamicDictionaries};
pub use errors::{LoaderError, Result};
pub use fetch::{Fetch, FileFetcher, RawBuffer};
pub use loader::{DictionaryLoader, DictionaryLoaderBuilder, LoaderOptions, TrackKind};
pub use resource::{ResourceFileNames, ResourceKey};

/// このライブラリのバージョン番号
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
