//! 文字カテゴリ定義
//!
//! このモジュールは、未知語処理で使う文字カテゴリを管理します。
//! 3つのリソースから構築されます:
//!
//! - `unk_char`: コードポイントごとのカテゴリID(`u8`)
//! - `unk_compat`: コードポイントごとの互換カテゴリのビット集合(`u32`)
//! - `unk_invoke`: カテゴリ定義(起動フラグ `u8`、グループ化フラグ `u8`、
//!   最大長 `i32`、NUL終端のカテゴリ名)の並び
//!
//! マップの範囲外のコードポイントはカテゴリ0(`DEFAULT`)として扱います。

use byteorder::{LittleEndian, ReadBytesExt};
use rkyv::{Archive, Deserialize, Serialize};

use crate::errors::InvalidFormatError;

/// 互換カテゴリのビット集合で表現できるカテゴリ数
pub const MAX_CATEGORIES: usize = 32;

/// 1つの文字カテゴリ
#[derive(Archive, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CharacterClass {
    /// カテゴリID
    pub class_id: u32,
    /// カテゴリ名
    pub name: String,
    /// 既知語があっても未知語処理を起動するかどうか
    pub invoke: bool,
    /// 同じカテゴリの文字をグループ化するかどうか
    pub group: bool,
    /// グループ化する最大長
    pub max_length: i32,
}

/// 文字からカテゴリへのマッピング
#[derive(Archive, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CharacterDefinition {
    pub(crate) category_map: Vec<u8>,
    pub(crate) compatible_category_map: Vec<u32>,
    pub(crate) classes: Vec<CharacterClass>,
}

impl CharacterDefinition {
    /// 3つのビューから文字カテゴリ定義を構築します。
    ///
    /// # エラー
    ///
    /// 2つのマップの長さが異なる場合、カテゴリ定義が壊れている場合、
    /// マップが未定義のカテゴリを参照する場合にエラーを返します。
    pub fn from_views(
        category_map: Vec<u8>,
        compatible_category_map: Vec<u32>,
        invoke_definitions: Vec<u8>,
    ) -> Result<Self, InvalidFormatError> {
        let def = Self {
            category_map,
            compatible_category_map,
            classes: parse_invoke_definitions(&invoke_definitions)?,
        };
        def.validate()?;
        Ok(def)
    }

    /// マップの長さが等しく、すべての参照が定義済みのカテゴリを指すことを検証します。
    pub(crate) fn validate(&self) -> Result<(), InvalidFormatError> {
        if self.category_map.len() != self.compatible_category_map.len() {
            return Err(InvalidFormatError::new(
                "compatible_category_map",
                format!(
                    "{} code points are categorized but {} have compatibility sets",
                    self.category_map.len(),
                    self.compatible_category_map.len()
                ),
            ));
        }

        let classes = &self.classes;
        if classes.is_empty() {
            return Err(InvalidFormatError::new(
                "invoke_definitions",
                "at least the DEFAULT category must be defined",
            ));
        }
        if classes.len() > MAX_CATEGORIES {
            return Err(InvalidFormatError::new(
                "invoke_definitions",
                format!("more than {MAX_CATEGORIES} categories are defined"),
            ));
        }
        if let Some((i, class)) = classes
            .iter()
            .enumerate()
            .find(|&(i, class)| class.class_id as usize != i)
        {
            return Err(InvalidFormatError::new(
                "invoke_definitions",
                format!("category {} is stored at position {i}", class.class_id),
            ));
        }

        if let Some((cp, &id)) = self
            .category_map
            .iter()
            .enumerate()
            .find(|&(_, &id)| usize::from(id) >= classes.len())
        {
            return Err(InvalidFormatError::new(
                "category_map",
                format!("U+{cp:04X} refers to undefined category {id}"),
            ));
        }

        let valid_bits = if classes.len() >= MAX_CATEGORIES {
            u32::MAX
        } else {
            (1u32 << classes.len()) - 1
        };
        if let Some((cp, bits)) = self
            .compatible_category_map
            .iter()
            .enumerate()
            .find(|&(_, &bits)| bits & !valid_bits != 0)
        {
            return Err(InvalidFormatError::new(
                "compatible_category_map",
                format!("U+{cp:04X} refers to undefined categories {bits:#x}"),
            ));
        }
        Ok(())
    }

    /// 定義されているカテゴリをID順に返します。
    #[inline(always)]
    pub fn classes(&self) -> &[CharacterClass] {
        &self.classes
    }

    /// 文字のカテゴリを返します。
    pub fn lookup(&self, c: char) -> &CharacterClass {
        let id = self
            .category_map
            .get(c as usize)
            .map_or(0, |&id| usize::from(id));
        &self.classes[id]
    }

    /// 文字と互換性のあるカテゴリを、文字自身のカテゴリを除いてID順に返します。
    pub fn compatible_categories(&self, c: char) -> Vec<&CharacterClass> {
        let bits = self
            .compatible_category_map
            .get(c as usize)
            .copied()
            .unwrap_or(0);
        let own = self.lookup(c).class_id;
        self.classes
            .iter()
            .filter(|class| class.class_id != own && bits & (1 << class.class_id) != 0)
            .collect()
    }

    /// 名前でカテゴリを検索します。
    pub fn class_by_name(&self, name: &str) -> Option<&CharacterClass> {
        self.classes.iter().find(|class| class.name == name)
    }
}

fn parse_invoke_definitions(mut bytes: &[u8]) -> Result<Vec<CharacterClass>, InvalidFormatError> {
    let truncated = |e: std::io::Error| {
        InvalidFormatError::new("invoke_definitions", format!("truncated definition: {e}"))
    };

    let mut classes = vec![];
    while !bytes.is_empty() {
        if classes.len() == MAX_CATEGORIES {
            return Err(InvalidFormatError::new(
                "invoke_definitions",
                format!("more than {MAX_CATEGORIES} categories are defined"),
            ));
        }
        let invoke = bytes.read_u8().map_err(truncated)? != 0;
        let group = bytes.read_u8().map_err(truncated)? != 0;
        let max_length = bytes.read_i32::<LittleEndian>().map_err(truncated)?;
        let Some(end) = bytes.iter().position(|&b| b == 0) else {
            return Err(InvalidFormatError::new(
                "invoke_definitions",
                "category name is not NUL-terminated",
            ));
        };
        let name = std::str::from_utf8(&bytes[..end])
            .map_err(|e| InvalidFormatError::new("invoke_definitions", e.to_string()))?
            .to_string();
        bytes = &bytes[end + 1..];

        classes.push(CharacterClass {
            class_id: classes.len() as u32,
            name,
            invoke,
            group,
            max_length,
        });
    }
    Ok(classes)
}
