//! 未知語辞書
//!
//! 未知語のトークン情報と文字カテゴリ定義を保持します。
//! 未知語のターゲットマップのキーは文字カテゴリIDです。

use rkyv::{Archive, Deserialize, Serialize};

use crate::dictionary::character::{CharacterClass, CharacterDefinition};
use crate::dictionary::token_info::TokenInfoDictionary;
use crate::errors::InvalidFormatError;

/// 未知語辞書
#[derive(Archive, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct UnknownDictionary {
    pub(crate) token_info: TokenInfoDictionary,
    pub(crate) character_definition: CharacterDefinition,
}

impl UnknownDictionary {
    /// 6つのビューから未知語辞書を構築します。
    ///
    /// # エラー
    ///
    /// いずれかのビューが不正な場合にエラーを返します。
    pub fn from_views(
        entries: Vec<u8>,
        pos: Vec<u8>,
        target_map: Vec<u8>,
        category_map: Vec<u8>,
        compatible_category_map: Vec<u32>,
        invoke_definitions: Vec<u8>,
    ) -> Result<Self, InvalidFormatError> {
        let token_info = TokenInfoDictionary::from_views(entries, pos, target_map)?;
        let character_definition =
            CharacterDefinition::from_views(category_map, compatible_category_map, invoke_definitions)?;
        Ok(Self {
            token_info,
            character_definition,
        })
    }

    pub(crate) fn validate(&self) -> Result<(), InvalidFormatError> {
        self.token_info.validate()?;
        self.character_definition.validate()
    }

    /// 未知語のトークン情報を返します。
    #[inline(always)]
    pub fn token_info(&self) -> &TokenInfoDictionary {
        &self.token_info
    }

    /// 文字カテゴリ定義を返します。
    #[inline(always)]
    pub fn character_definition(&self) -> &CharacterDefinition {
        &self.character_definition
    }

    /// カテゴリに割り当てられた未知語トークンのIDを返します。
    #[inline(always)]
    pub fn tokens_for(&self, class: &CharacterClass) -> &[u32] {
        self.token_info.target(class.class_id)
    }
}
