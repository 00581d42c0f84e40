//! トークン情報辞書
//!
//! 3つのバイト列から構築されます:
//!
//! - トークン情報: 10バイトのレコード(左文脈ID `i16`、右文脈ID `i16`、単語コスト `i16`、
//!   品詞情報オフセット `i32`)の並び
//! - 品詞情報: NUL終端されたUTF-8の素性文字列の連結
//! - ターゲットマップ: (キー `u32`、個数 `u32`、トークンID `u32` × 個数)の並び
//!
//! 数値はすべてリトルエンディアンです。

use std::collections::BTreeMap;

use byteorder::{LittleEndian, ReadBytesExt};
use rkyv::{Archive, Deserialize, Serialize};

use crate::errors::InvalidFormatError;

/// トークン情報レコードのバイト長
pub const TOKEN_INFO_RECORD_LEN: usize = 10;

/// 1つのトークンの接続情報とコスト
#[derive(Archive, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenInfo {
    /// 左文脈ID
    pub left_id: i16,
    /// 右文脈ID
    pub right_id: i16,
    /// 単語コスト
    pub word_cost: i16,
    /// 品詞情報バッファ内のオフセット
    pub pos_offset: i32,
}

/// ターゲットマップの1エントリ
#[derive(Archive, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TargetEntry {
    /// トライの値または文字クラスID
    pub key: u32,
    /// キーに対応するトークンID
    pub token_ids: Vec<u32>,
}

/// トークン情報辞書
#[derive(Archive, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct TokenInfoDictionary {
    pub(crate) entries: Vec<TokenInfo>,
    pub(crate) pos: Vec<u8>,
    pub(crate) target_map: Vec<TargetEntry>,
}

impl TokenInfoDictionary {
    /// 3つのビューからトークン情報辞書を構築します。
    ///
    /// # 引数
    ///
    /// * `token_info` - トークン情報レコード
    /// * `pos` - 品詞情報
    /// * `target_map` - ターゲットマップ
    ///
    /// # エラー
    ///
    /// レコード長が不正な場合、オフセットが品詞情報の範囲外の場合、
    /// ターゲットマップが存在しないトークンを参照する場合にエラーを返します。
    pub fn from_views(
        token_info: Vec<u8>,
        pos: Vec<u8>,
        target_map: Vec<u8>,
    ) -> Result<Self, InvalidFormatError> {
        let dict = Self {
            entries: parse_token_infos(&token_info)?,
            pos,
            target_map: parse_target_map(&target_map)?,
        };
        dict.validate()?;
        Ok(dict)
    }

    /// オフセットが品詞情報の範囲内にあり、ターゲットマップがキー順に並び、
    /// 存在するトークンだけを参照していることを検証します。
    pub(crate) fn validate(&self) -> Result<(), InvalidFormatError> {
        for (token_id, entry) in self.entries.iter().enumerate() {
            let in_range = usize::try_from(entry.pos_offset)
                .map(|offset| offset < self.pos.len())
                .unwrap_or(false);
            if !in_range {
                return Err(InvalidFormatError::new(
                    "pos",
                    format!(
                        "token {token_id} refers to offset {} outside of {} bytes",
                        entry.pos_offset,
                        self.pos.len()
                    ),
                ));
            }
        }

        if let Some(pair) = self.target_map.windows(2).find(|w| w[0].key >= w[1].key) {
            return Err(InvalidFormatError::new(
                "target_map",
                format!("key {} follows key {}", pair[1].key, pair[0].key),
            ));
        }
        for entry in &self.target_map {
            if let Some(&id) = entry
                .token_ids
                .iter()
                .find(|&&id| id as usize >= self.entries.len())
            {
                return Err(InvalidFormatError::new(
                    "target_map",
                    format!(
                        "key {} refers to token {id}, but only {} tokens exist",
                        entry.key,
                        self.entries.len()
                    ),
                ));
            }
        }
        Ok(())
    }

    /// トークン数を返します。
    #[inline(always)]
    pub fn num_tokens(&self) -> usize {
        self.entries.len()
    }

    /// ターゲットマップのキー数を返します。
    #[inline(always)]
    pub fn num_targets(&self) -> usize {
        self.target_map.len()
    }

    /// トークンの接続情報とコストを返します。
    #[inline(always)]
    pub fn token(&self, token_id: u32) -> Option<&TokenInfo> {
        self.entries.get(token_id as usize)
    }

    /// トークンの素性文字列を返します。
    ///
    /// 素性文字列が有効なUTF-8でない場合は`None`を返します。
    pub fn features(&self, token_id: u32) -> Option<&str> {
        let offset = usize::try_from(self.token(token_id)?.pos_offset).ok()?;
        let tail = self.pos.get(offset..)?;
        let end = tail.iter().position(|&b| b == 0).unwrap_or(tail.len());
        std::str::from_utf8(&tail[..end]).ok()
    }

    /// キーに対応するトークンIDを返します。キーが存在しない場合は空のスライスを返します。
    pub fn target(&self, key: u32) -> &[u32] {
        self.target_map
            .binary_search_by_key(&key, |entry| entry.key)
            .map(|i| self.target_map[i].token_ids.as_slice())
            .unwrap_or(&[])
    }
}

fn parse_token_infos(bytes: &[u8]) -> Result<Vec<TokenInfo>, InvalidFormatError> {
    if bytes.len() % TOKEN_INFO_RECORD_LEN != 0 {
        return Err(InvalidFormatError::new(
            "token_info",
            format!(
                "{} bytes is not a multiple of the {TOKEN_INFO_RECORD_LEN}-byte record length",
                bytes.len()
            ),
        ));
    }

    let mut entries = Vec::with_capacity(bytes.len() / TOKEN_INFO_RECORD_LEN);
    for record in bytes.chunks_exact(TOKEN_INFO_RECORD_LEN) {
        let entry = read_token_info(record)
            .map_err(|e| InvalidFormatError::new("token_info", e.to_string()))?;
        entries.push(entry);
    }
    Ok(entries)
}

fn read_token_info(mut record: &[u8]) -> std::io::Result<TokenInfo> {
    Ok(TokenInfo {
        left_id: record.read_i16::<LittleEndian>()?,
        right_id: record.read_i16::<LittleEndian>()?,
        word_cost: record.read_i16::<LittleEndian>()?,
        pos_offset: record.read_i32::<LittleEndian>()?,
    })
}

fn parse_target_map(mut bytes: &[u8]) -> Result<Vec<TargetEntry>, InvalidFormatError> {
    let truncated = |e: std::io::Error| {
        InvalidFormatError::new("target_map", format!("truncated target map: {e}"))
    };

    // Repeated keys accumulate their token ids in order.
    let mut map: BTreeMap<u32, Vec<u32>> = BTreeMap::new();
    while !bytes.is_empty() {
        let key = bytes.read_u32::<LittleEndian>().map_err(truncated)?;
        let count = bytes.read_u32::<LittleEndian>().map_err(truncated)? as usize;
        if bytes.len() / 4 < count {
            return Err(InvalidFormatError::new(
                "target_map",
                format!("key {key} declares {count} tokens but the buffer ends early"),
            ));
        }
        let ids = map.entry(key).or_default();
        ids.reserve(count);
        for _ in 0..count {
            ids.push(bytes.read_u32::<LittleEndian>().map_err(truncated)?);
        }
    }

    Ok(map
        .into_iter()
        .map(|(key, token_ids)| TargetEntry { key, token_ids })
        .collect())
}
