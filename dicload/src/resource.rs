//! 辞書リソースの名前解決
//!
//! 辞書は12個の独立したバイナリリソースから構成されます。
//! このモジュールは、論理的なリソースキーからファイル名への対応付けと、
//! ベースディレクトリとファイル名を結合したリソース識別子の生成を扱います。

use std::fmt;
use std::str::FromStr;

use crate::decode::ElementType;

/// リソース識別子の区切り文字
pub const SEPARATOR: char = '/';

/// 辞書を構成するリソースの論理キー
///
/// 宣言順は各トラックに渡されるビューの順序と一致します。
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ResourceKey {
    /// ダブル配列のbase配列
    Base,
    /// ダブル配列のcheck配列
    Check,
    /// トークン情報
    Tid,
    /// トークンの品詞情報
    TidPos,
    /// トークンのターゲットマップ
    TidMap,
    /// 接続コスト行列
    Cc,
    /// 未知語エントリ
    Unk,
    /// 未知語の品詞情報
    UnkPos,
    /// 未知語のターゲットマップ
    UnkMap,
    /// 文字カテゴリマップ
    UnkChar,
    /// 互換文字カテゴリマップ
    UnkCompat,
    /// 未知語の起動定義
    UnkInvoke,
}

impl ResourceKey {
    /// すべてのキー(宣言順)
    pub const ALL: [Self; 12] = [
        Self::Base,
        Self::Check,
        Self::Tid,
        Self::TidPos,
        Self::TidMap,
        Self::Cc,
        Self::Unk,
        Self::UnkPos,
        Self::UnkMap,
        Self::UnkChar,
        Self::UnkCompat,
        Self::UnkInvoke,
    ];

    /// 論理名を返します(例: `"tidPos"`)。
    pub const fn name(self) -> &'static str {
        match self {
            Self::Base => "base",
            Self::Check => "check",
            Self::Tid => "tid",
            Self::TidPos => "tidPos",
            Self::TidMap => "tidMap",
            Self::Cc => "cc",
            Self::Unk => "unk",
            Self::UnkPos => "unkPos",
            Self::UnkMap => "unkMap",
            Self::UnkChar => "unkChar",
            Self::UnkCompat => "unkCompat",
            Self::UnkInvoke => "unkInvoke",
        }
    }

    /// 上書きされていない場合に使われるファイル名を返します。
    ///
    /// 圧縮の拡張子は含みません。圧縮の扱いはフェッチャーの責務です。
    pub const fn default_file_name(self) -> &'static str {
        match self {
            Self::Base => "base.dat",
            Self::Check => "check.dat",
            Self::Tid => "tid.dat",
            Self::TidPos => "tid_pos.dat",
            Self::TidMap => "tid_map.dat",
            Self::Cc => "cc.dat",
            Self::Unk => "unk.dat",
            Self::UnkPos => "unk_pos.dat",
            Self::UnkMap => "unk_map.dat",
            Self::UnkChar => "unk_char.dat",
            Self::UnkCompat => "unk_compat.dat",
            Self::UnkInvoke => "unk_invoke.dat",
        }
    }

    /// このリソースをデコードする際の要素型を返します。
    ///
    /// | キー | 要素型 |
    /// | ---- | ------ |
    /// | `base`, `check` | `i32` |
    /// | `cc` | `i16` |
    /// | `unkCompat` | `u32` |
    /// | その他 | `u8` |
    pub const fn element_type(self) -> ElementType {
        match self {
            Self::Base | Self::Check => ElementType::I32,
            Self::Cc => ElementType::I16,
            Self::UnkCompat => ElementType::U32,
            Self::Tid
            | Self::TidPos
            | Self::TidMap
            | Self::Unk
            | Self::UnkPos
            | Self::UnkMap
            | Self::UnkChar
            | Self::UnkInvoke => ElementType::U8,
        }
    }

    #[inline(always)]
    const fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ResourceKey {
    type Err = String;

    /// 論理名からキーをパースします。
    fn from_str(name: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|key| key.name() == name)
            .ok_or_else(|| format!("unknown resource key: {name}"))
    }
}

/// 12個のリソースキーそれぞれに対応するファイル名
///
/// 構築後は不変です。
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResourceFileNames {
    names: [String; 12],
}

impl Default for ResourceFileNames {
    fn default() -> Self {
        Self {
            names: ResourceKey::ALL.map(|key| key.default_file_name().to_string()),
        }
    }
}

impl ResourceFileNames {
    /// 部分的な上書きからファイル名の対応を作成します。
    ///
    /// 空文字列の上書きは無視され、既定のファイル名が使われます。
    /// 同じキーが複数回与えられた場合は後のものが優先されます。
    ///
    /// # 例
    ///
    /// ```
    /// use dicload::resource::{ResourceFileNames, ResourceKey};
    ///
    /// let names = ResourceFileNames::with_overrides([(ResourceKey::Cc, "custom_cc.dat")]);
    /// assert_eq!(names.get(ResourceKey::Cc), "custom_cc.dat");
    /// assert_eq!(names.get(ResourceKey::Base), "base.dat");
    /// ```
    pub fn with_overrides<I, S>(overrides: I) -> Self
    where
        I: IntoIterator<Item = (ResourceKey, S)>,
        S: Into<String>,
    {
        let mut names = Self::default();
        for (key, name) in overrides {
            let name = name.into();
            if !name.is_empty() {
                names.names[key.index()] = name;
            }
        }
        names
    }

    /// 指定されたキーのファイル名を返します。
    #[inline(always)]
    pub fn get(&self, key: ResourceKey) -> &str {
        &self.names[key.index()]
    }

    /// すべての(キー, ファイル名)の組を宣言順に返します。
    pub fn iter(&self) -> impl Iterator<Item = (ResourceKey, &str)> + '_ {
        ResourceKey::ALL
            .into_iter()
            .map(move |key| (key, self.get(key)))
    }
}

/// ベースディレクトリとファイル名を1つのリソース識別子に結合します。
///
/// 両側の先頭・末尾の区切り文字に関係なく、間にちょうど1つの区切り文字を置き、
/// 結果に含まれる連続した区切り文字を1つにまとめます。
/// ベースが空の場合はファイル名のみを正規化して返します。
///
/// # 例
///
/// ```
/// use dicload::resource::join_path;
///
/// assert_eq!(join_path("/dic/", "/base.dat"), "/dic/base.dat");
/// assert_eq!(join_path("/dic", "base.dat"), "/dic/base.dat");
/// ```
pub fn join_path(base: &str, name: &str) -> String {
    let mut joined = String::with_capacity(base.len() + name.len() + 1);
    if !base.is_empty() {
        joined.push_str(base);
        joined.push(SEPARATOR);
    }
    joined.push_str(name);

    let mut normalized = String::with_capacity(joined.len());
    let mut prev_sep = false;
    for c in joined.chars() {
        let is_sep = c == SEPARATOR;
        if !(is_sep && prev_sep) {
            normalized.push(c);
        }
        prev_sep = is_sep;
    }
    normalized
}
