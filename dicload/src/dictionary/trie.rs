//! ダブル配列トライによる接頭辞検索
//!
//! base/check配列はビルド済みのものをそのまま保持します。
//! 遷移はUTF-8のバイト値に1を足したコードで行い、コード0は終端を表します。
//! 終端ノードのbase値`b`は値`-b - 1`を表します。

use rkyv::{Archive, Deserialize, Serialize};

use crate::errors::InvalidFormatError;

const ROOT_ID: usize = 0;
const TERM_CODE: i32 = 0;

/// ダブル配列トライ
#[derive(Archive, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct DoubleArrayTrie {
    pub(crate) base: Vec<i32>,
    pub(crate) check: Vec<i32>,
}

/// トライマッチング結果
#[derive(Debug, Eq, PartialEq, Clone)]
pub struct TrieMatch {
    /// キーに対応する値
    pub value: i32,
    /// マッチした接頭辞の終端位置(バイト単位)
    pub end_byte: usize,
}

impl DoubleArrayTrie {
    /// base/check配列からトライを作成します。
    ///
    /// # エラー
    ///
    /// 配列の長さが異なる場合、または空の場合にエラーを返します。
    pub fn from_arrays(base: Vec<i32>, check: Vec<i32>) -> Result<Self, InvalidFormatError> {
        let trie = Self { base, check };
        trie.validate()?;
        Ok(trie)
    }

    /// 2つの配列の長さが等しく、ルートノードが存在することを検証します。
    pub(crate) fn validate(&self) -> Result<(), InvalidFormatError> {
        if self.base.len() != self.check.len() {
            return Err(InvalidFormatError::new(
                "base",
                format!(
                    "base has {} elements but check has {}",
                    self.base.len(),
                    self.check.len()
                ),
            ));
        }
        if self.base.is_empty() {
            return Err(InvalidFormatError::new("base", "the trie has no root node"));
        }
        Ok(())
    }

    /// ノード数を返します。
    #[inline(always)]
    pub fn len(&self) -> usize {
        self.base.len()
    }

    /// トライが空かどうかを返します。ルートは常に存在するため、`false`になります。
    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        self.base.is_empty()
    }

    /// キーに完全一致する値を返します。
    pub fn lookup(&self, key: &str) -> Option<i32> {
        let mut node = ROOT_ID;
        for &b in key.as_bytes() {
            node = self.traverse(node, i32::from(b) + 1)?;
        }
        self.value(node)
    }

    /// キーの接頭辞のうち、トライに登録されているものをすべて返します。
    pub fn common_prefix_search(&self, key: &str) -> Vec<TrieMatch> {
        let mut matches = vec![];
        let mut node = ROOT_ID;
        for (i, &b) in key.as_bytes().iter().enumerate() {
            let Some(child) = self.traverse(node, i32::from(b) + 1) else {
                break;
            };
            node = child;
            if let Some(value) = self.value(node) {
                matches.push(TrieMatch {
                    value,
                    end_byte: i + 1,
                });
            }
        }
        matches
    }

    #[inline(always)]
    fn traverse(&self, parent: usize, code: i32) -> Option<usize> {
        let child = self.base.get(parent)?.checked_add(code)?;
        let child = usize::try_from(child).ok()?;
        let parent = i32::try_from(parent).ok()?;
        (*self.check.get(child)? == parent).then_some(child)
    }

    #[inline(always)]
    fn value(&self, node: usize) -> Option<i32> {
        let term = self.traverse(node, TERM_CODE)?;
        self.base[term].checked_neg()?.checked_sub(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::test_utils::build_double_array;

    #[test]
    fn test_lookup() {
        let (base, check) = build_double_array(&[("京都", 0), ("東京", 1), ("東京都", 2)]);
        let trie = DoubleArrayTrie::from_arrays(base, check).unwrap();

        assert_eq!(trie.lookup("京都"), Some(0));
        assert_eq!(trie.lookup("東京"), Some(1));
        assert_eq!(trie.lookup("東京都"), Some(2));
        assert_eq!(trie.lookup("東"), None);
        assert_eq!(trie.lookup("大阪"), None);
        assert_eq!(trie.lookup(""), None);
    }

    #[test]
    fn test_common_prefix_search() {
        let (base, check) = build_double_array(&[("東京", 1), ("東京都", 2)]);
        let trie = DoubleArrayTrie::from_arrays(base, check).unwrap();

        let matches = trie.common_prefix_search("東京都庁");
        assert_eq!(
            matches,
            vec![
                TrieMatch { value: 1, end_byte: 6 },
                TrieMatch { value: 2, end_byte: 9 },
            ]
        );
        assert!(trie.common_prefix_search("京都").is_empty());
    }

    #[test]
    fn test_mismatched_arrays() {
        assert!(DoubleArrayTrie::from_arrays(vec![1, 2], vec![0]).is_err());
        assert!(DoubleArrayTrie::from_arrays(vec![], vec![]).is_err());
    }
}
