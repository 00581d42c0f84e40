//! エラー型の定義
//!
//! このモジュールは、辞書ローダーで使用されるすべてのエラー型を定義します。

use std::any::Any;
use std::error::Error;
use std::fmt;

use crate::decode::ElementType;
use crate::loader::TrackKind;
use crate::resource::ResourceKey;

/// ローダー専用のResult型
///
/// エラー型としてデフォルトで[`LoaderError`]を使用します。
pub type Result<T, E = LoaderError> = std::result::Result<T, E>;

/// 辞書アセンブラが返す不透明なエラー
pub type BoxError = Box<dyn Error + Send + Sync + 'static>;

/// ローダーのエラー型
///
/// 1回の`load()`呼び出しで報告されるのは、最初に観測されたエラー1つだけです。
#[derive(Debug, thiserror::Error)]
pub enum LoaderError {
    /// 無効なリソース識別子
    ///
    /// [`InvalidPathError`]のエラーバリアント。
    #[error(transparent)]
    InvalidPath(InvalidPathError),

    /// リソースの取得に失敗したエラー
    ///
    /// タイムアウトした取得は[`std::io::ErrorKind::TimedOut`]として報告されます。
    #[error("Failed to fetch '{identifier}': {source}")]
    Fetch {
        /// 取得しようとしたリソース識別子
        identifier: String,
        /// フェッチャーが返したI/Oエラー
        #[source]
        source: std::io::Error,
    },

    /// バッファのデコードエラー
    ///
    /// [`DecodeError`]のエラーバリアント。
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// アセンブラのビルド呼び出しが失敗したエラー
    #[error("Failed to build the {track} part: {source}")]
    Assembly {
        /// 失敗したトラック
        track: TrackKind,
        /// アセンブラが返したエラー
        #[source]
        source: BoxError,
    },

    /// 無効なフォーマットエラー
    ///
    /// [`InvalidFormatError`]のエラーバリアント。
    #[error(transparent)]
    InvalidFormat(InvalidFormatError),

    /// 無効な状態エラー
    ///
    /// [`InvalidStateError`]のエラーバリアント。
    #[error(transparent)]
    InvalidState(InvalidStateError),

    /// バックグラウンドスレッドパニックエラー
    ///
    /// トラックまたは取得スレッドがパニックした場合に発生します。
    #[error("Background thread panicked: {0}")]
    ThreadPanic(String),

    /// I/Oエラー
    ///
    /// スナップショットの読み書きやスレッド生成の失敗で発生します。
    #[error(transparent)]
    IoError(#[from] std::io::Error),

    /// rkyvシリアライゼーションエラー
    ///
    /// [`rkyv::rancor::Error`](rkyv::rancor::Error)のエラーバリアント。
    #[error(transparent)]
    RkyvError(#[from] rkyv::rancor::Error),
}

impl LoaderError {
    /// 無効なリソース識別子エラーを生成します
    ///
    /// # 引数
    ///
    /// * `identifier` - 問題のある識別子
    /// * `msg` - エラーメッセージ
    pub(crate) fn invalid_path<I, S>(identifier: I, msg: S) -> Self
    where
        I: Into<String>,
        S: Into<String>,
    {
        Self::InvalidPath(InvalidPathError {
            identifier: identifier.into(),
            msg: msg.into(),
        })
    }

    /// 無効なフォーマットエラーを生成します
    ///
    /// # 引数
    ///
    /// * `arg` - フォーマット名
    /// * `msg` - エラーメッセージ
    pub(crate) fn invalid_format<S>(arg: &'static str, msg: S) -> Self
    where
        S: Into<String>,
    {
        Self::InvalidFormat(InvalidFormatError::new(arg, msg))
    }

    /// 無効な状態エラーを生成します
    ///
    /// # 引数
    ///
    /// * `msg` - エラーメッセージ
    /// * `cause` - エラーの原因
    pub(crate) fn invalid_state<S, M>(msg: S, cause: M) -> Self
    where
        S: Into<String>,
        M: Into<String>,
    {
        Self::InvalidState(InvalidStateError {
            msg: msg.into(),
            cause: cause.into(),
        })
    }

    /// アセンブラのエラーをトラック情報付きで包みます
    pub(crate) fn assembly<E>(track: TrackKind, source: E) -> Self
    where
        E: Into<BoxError>,
    {
        Self::Assembly {
            track,
            source: source.into(),
        }
    }

    /// パニックのペイロードからスレッドパニックエラーを生成します
    pub(crate) fn from_panic(payload: Box<dyn Any + Send>) -> Self {
        let panic_msg = if let Some(s) = payload.downcast_ref::<&'static str>() {
            s.to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };
        Self::ThreadPanic(panic_msg)
    }

    /// このエラーがタイムアウトによる取得失敗かどうかを返します
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::Fetch { source, .. } if source.kind() == std::io::ErrorKind::TimedOut
        )
    }
}

/// リソース識別子が無効な場合に使用されるエラー
#[derive(Debug)]
pub struct InvalidPathError {
    /// 問題のある識別子
    pub(crate) identifier: String,

    /// エラーメッセージ
    pub(crate) msg: String,
}

impl fmt::Display for InvalidPathError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "InvalidPathError: {:?}: {}", self.identifier, self.msg)
    }
}

impl Error for InvalidPathError {}

/// バッファを型付き配列として解釈できない場合に使用されるエラー
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// バイト長が要素幅の倍数ではない
    #[error("Resource '{key}' has {len} bytes, which is not a multiple of the {width}-byte element width")]
    Misaligned {
        /// デコード対象のリソース
        key: ResourceKey,
        /// バッファのバイト長
        len: usize,
        /// 要素幅(バイト)
        width: usize,
    },

    /// 要求された要素型がリソースの宣言と一致しない
    #[error("Resource '{key}' is declared as {declared}, but was requested as {requested}")]
    TypeMismatch {
        /// デコード対象のリソース
        key: ResourceKey,
        /// リソースに宣言された要素型
        declared: ElementType,
        /// 要求された要素型
        requested: ElementType,
    },
}

/// 入力フォーマットが無効な場合に使用されるエラー
///
/// 参照アセンブラがビューの内容を検証する際に返します。
#[derive(Debug)]
pub struct InvalidFormatError {
    /// フォーマットの名前
    pub(crate) arg: &'static str,

    /// エラーメッセージ
    pub(crate) msg: String,
}

impl InvalidFormatError {
    pub(crate) fn new<S>(arg: &'static str, msg: S) -> Self
    where
        S: Into<String>,
    {
        Self {
            arg,
            msg: msg.into(),
        }
    }
}

impl fmt::Display for InvalidFormatError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "InvalidFormatError: {}: {}", self.arg, self.msg)
    }
}

impl Error for InvalidFormatError {}

/// 状態が無効な場合に使用されるエラー
#[derive(Debug)]
pub struct InvalidStateError {
    /// エラーメッセージ
    pub(crate) msg: String,

    /// エラーの根本原因
    pub(crate) cause: String,
}

impl fmt::Display for InvalidStateError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "InvalidStateError: {}: {}", self.msg, self.cause)
    }
}

impl Error for InvalidStateError {}
