//! 辞書の組み立て
//!
//! このモジュールは、デコード済みのビューから辞書を組み立てる[`DictionaryAssembler`]と、
//! その参照実装である[`DynamicAssembler`]を提供します。
//!
//! ローダーの4つのトラックはそれぞれ1つのビルド操作を呼び出し、
//! 自分の部品だけを所有して返します。4つの部品がすべて揃った後に
//! [`DictionaryAssembler::assemble`]が一度だけ呼ばれるため、
//! 1つのフィールドが2つのトラックから書き込まれることはありません。
//!
//! # 組み立てた辞書の保存
//!
//! [`DynamicDictionaries::write`]は組み立て済みの辞書を`rkyv`形式で書き出し、
//! [`DynamicDictionaries::read`]はそれを検証付きで読み戻します。
pub(crate) mod character;
pub(crate) mod connector;
pub(crate) mod token_info;
pub(crate) mod trie;
pub(crate) mod unknown;

use std::io::{Read, Write};

use rkyv::util::AlignedVec;
use rkyv::{Archive, Deserialize, Serialize};

use crate::errors::{InvalidFormatError, LoaderError, Result};

pub use crate::dictionary::character::{CharacterClass, CharacterDefinition};
pub use crate::dictionary::connector::ConnectionCosts;
pub use crate::dictionary::token_info::{TargetEntry, TokenInfo, TokenInfoDictionary};
pub use crate::dictionary::trie::{DoubleArrayTrie, TrieMatch};
pub use crate::dictionary::unknown::UnknownDictionary;

/// 組み立て済み辞書のスナップショットを識別するマジックバイト。
pub const SNAPSHOT_MAGIC: &[u8] = b"DicloadDynamicDictionaries 0.1\n";

const SNAPSHOT_MAGIC_LEN: usize = SNAPSHOT_MAGIC.len();
const RKYV_ALIGNMENT: usize = 16;
const PADDING_LEN: usize =
    (RKYV_ALIGNMENT - (SNAPSHOT_MAGIC_LEN % RKYV_ALIGNMENT)) % RKYV_ALIGNMENT;
const DATA_START: usize = SNAPSHOT_MAGIC_LEN + PADDING_LEN;

/// デコード済みのビューから辞書を組み立てるコレクター
///
/// 各ビルド操作は別々のスレッドから並行に呼び出されるため、
/// 実装は[`Send`]と[`Sync`]を満たす必要があります。
/// ビルド操作は自分の部品だけを返し、共有状態を書き換えてはいけません。
pub trait DictionaryAssembler: Send + Sync + 'static {
    /// トライトラックの部品
    type Trie: Send + 'static;
    /// トークン情報トラックの部品
    type TokenInfo: Send + 'static;
    /// 接続コストトラックの部品
    type ConnectionCosts: Send + 'static;
    /// 未知語トラックの部品
    type Unknown: Send + 'static;
    /// 組み立てた辞書
    type Output;
    /// ビルド操作のエラー
    type Error: std::error::Error + Send + Sync + 'static;

    /// base/check配列からトライを構築します。
    fn build_trie(&self, base: Vec<i32>, check: Vec<i32>) -> Result<Self::Trie, Self::Error>;

    /// トークン情報、品詞情報、ターゲットマップからトークン情報辞書を構築します。
    fn build_token_info(
        &self,
        token_info: Vec<u8>,
        pos: Vec<u8>,
        target_map: Vec<u8>,
    ) -> Result<Self::TokenInfo, Self::Error>;

    /// 接続コスト行列を構築します。
    fn build_connection_costs(
        &self,
        costs: Vec<i16>,
    ) -> Result<Self::ConnectionCosts, Self::Error>;

    /// 未知語辞書を構築します。引数は宣言順に渡されます。
    #[allow(clippy::too_many_arguments)]
    fn build_unknown_dictionary(
        &self,
        entries: Vec<u8>,
        pos: Vec<u8>,
        target_map: Vec<u8>,
        category_map: Vec<u8>,
        compatible_category_map: Vec<u32>,
        invoke_definitions: Vec<u8>,
    ) -> Result<Self::Unknown, Self::Error>;

    /// 4つのトラックの部品から辞書を組み立てます。
    fn assemble(&self, parts: DictionaryParts<Self>) -> Self::Output;
}

/// 4つのトラックがそれぞれ構築した部品
pub struct DictionaryParts<A: DictionaryAssembler + ?Sized> {
    pub trie: A::Trie,
    pub token_info: A::TokenInfo,
    pub connection_costs: A::ConnectionCosts,
    pub unknown: A::Unknown,
}

/// [`DynamicDictionaries`]を組み立てる参照実装
#[derive(Clone, Copy, Debug, Default)]
pub struct DynamicAssembler;

impl DictionaryAssembler for DynamicAssembler {
    type Trie = DoubleArrayTrie;
    type TokenInfo = TokenInfoDictionary;
    type ConnectionCosts = ConnectionCosts;
    type Unknown = UnknownDictionary;
    type Output = DynamicDictionaries;
    type Error = InvalidFormatError;

    fn build_trie(&self, base: Vec<i32>, check: Vec<i32>) -> Result<Self::Trie, Self::Error> {
        DoubleArrayTrie::from_arrays(base, check)
    }

    fn build_token_info(
        &self,
        token_info: Vec<u8>,
        pos: Vec<u8>,
        target_map: Vec<u8>,
    ) -> Result<Self::TokenInfo, Self::Error> {
        TokenInfoDictionary::from_views(token_info, pos, target_map)
    }

    fn build_connection_costs(
        &self,
        costs: Vec<i16>,
    ) -> Result<Self::ConnectionCosts, Self::Error> {
        ConnectionCosts::from_view(costs)
    }

    fn build_unknown_dictionary(
        &self,
        entries: Vec<u8>,
        pos: Vec<u8>,
        target_map: Vec<u8>,
        category_map: Vec<u8>,
        compatible_category_map: Vec<u32>,
        invoke_definitions: Vec<u8>,
    ) -> Result<Self::Unknown, Self::Error> {
        UnknownDictionary::from_views(
            entries,
            pos,
            target_map,
            category_map,
            compatible_category_map,
            invoke_definitions,
        )
    }

    fn assemble(&self, parts: DictionaryParts<Self>) -> Self::Output {
        DynamicDictionaries {
            trie: parts.trie,
            token_info: parts.token_info,
            connection_costs: parts.connection_costs,
            unknown: parts.unknown,
        }
    }
}

/// 形態素解析に必要な4つの構造をまとめた辞書
#[derive(Archive, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct DynamicDictionaries {
    pub(crate) trie: DoubleArrayTrie,
    pub(crate) token_info: TokenInfoDictionary,
    pub(crate) connection_costs: ConnectionCosts,
    pub(crate) unknown: UnknownDictionary,
}

impl DynamicDictionaries {
    /// ダブル配列トライを返します。
    #[inline(always)]
    pub fn trie(&self) -> &DoubleArrayTrie {
        &self.trie
    }

    /// トークン情報辞書を返します。
    #[inline(always)]
    pub fn token_info(&self) -> &TokenInfoDictionary {
        &self.token_info
    }

    /// 接続コスト行列を返します。
    #[inline(always)]
    pub fn connection_costs(&self) -> &ConnectionCosts {
        &self.connection_costs
    }

    /// 未知語辞書を返します。
    #[inline(always)]
    pub fn unknown(&self) -> &UnknownDictionary {
        &self.unknown
    }

    /// 表層形に完全一致するトークンIDを返します。
    ///
    /// トライの値をターゲットマップのキーとして引きます。
    pub fn lookup_tokens(&self, surface: &str) -> &[u32] {
        self.trie
            .lookup(surface)
            .and_then(|value| u32::try_from(value).ok())
            .map(|key| self.token_info.target(key))
            .unwrap_or(&[])
    }

    /// 4つの部品が構築時と同じ不変条件を満たすことを検証します。
    fn validate(&self) -> Result<(), InvalidFormatError> {
        self.trie.validate()?;
        self.token_info.validate()?;
        self.connection_costs.validate()?;
        self.unknown.validate()
    }

    /// 辞書を`rkyv`フォーマットでライターにシリアライズします。
    ///
    /// # エラー
    ///
    /// 書き込みに失敗した場合、またはシリアライズに失敗した場合にエラーを返します。
    pub fn write<W>(&self, mut wtr: W) -> Result<()>
    where
        W: Write,
    {
        let bytes = rkyv::to_bytes::<rkyv::rancor::Error>(self)?;

        wtr.write_all(SNAPSHOT_MAGIC)?;
        wtr.write_all(&[0xFF; PADDING_LEN])?;
        wtr.write_all(&bytes)?;
        Ok(())
    }

    /// [`write`](Self::write)で書き出された辞書を読み込みます。
    ///
    /// データはアーカイブとして検証されてからデシリアライズされ、
    /// さらに各部品の不変条件が検証されます。
    ///
    /// # エラー
    ///
    /// マジックバイトが一致しない場合、データが破損している場合は
    /// [`LoaderError::InvalidState`]、部品の不変条件を満たさない場合は
    /// [`LoaderError::InvalidFormat`]を返します。
    pub fn read<R>(mut rdr: R) -> Result<Self>
    where
        R: Read,
    {
        let mut bytes = Vec::new();
        rdr.read_to_end(&mut bytes)?;

        if !bytes.starts_with(SNAPSHOT_MAGIC) {
            return Err(LoaderError::invalid_format(
                "snapshot",
                "The magic number of the input snapshot mismatches.",
            ));
        }
        let Some(data_bytes) = bytes.get(DATA_START..) else {
            return Err(LoaderError::invalid_format(
                "snapshot",
                "Snapshot too small or corrupted.",
            ));
        };

        let mut aligned_bytes: AlignedVec<RKYV_ALIGNMENT> =
            AlignedVec::with_capacity(data_bytes.len());
        aligned_bytes.extend_from_slice(data_bytes);

        let dict = rkyv::from_bytes::<Self, rkyv::rancor::Error>(&aligned_bytes).map_err(|e| {
            LoaderError::invalid_state(
                "rkyv validation failed. The snapshot may be corrupted or incompatible.",
                e.to_string(),
            )
        })?;
        dict.validate().map_err(LoaderError::InvalidFormat)?;
        Ok(dict)
    }
}
