//! 接続コスト行列
//!
//! `cc`リソースは`i16`の配列で、先頭2要素が前方・後方の次元数、
//! 残りが`forward_dimension × backward_dimension`個のコストです。

use rkyv::{Archive, Deserialize, Serialize};

use crate::errors::InvalidFormatError;

const HEADER_LEN: usize = 2;

/// 接続コスト行列
#[derive(Archive, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct ConnectionCosts {
    pub(crate) forward_dimension: usize,
    pub(crate) backward_dimension: usize,
    pub(crate) buffer: Vec<i16>,
}

impl ConnectionCosts {
    /// ヘッダ付きの`i16`ビューから行列を作成します。
    ///
    /// # エラー
    ///
    /// ヘッダがない場合、次元数が負の場合、要素数が次元数と一致しない場合にエラーを返します。
    pub fn from_view(buffer: Vec<i16>) -> Result<Self, InvalidFormatError> {
        let (Some(&forward), Some(&backward)) = (buffer.first(), buffer.get(1)) else {
            return Err(InvalidFormatError::new(
                "connection_costs",
                "the matrix header is missing",
            ));
        };
        let (Ok(forward_dimension), Ok(backward_dimension)) =
            (usize::try_from(forward), usize::try_from(backward))
        else {
            return Err(InvalidFormatError::new(
                "connection_costs",
                format!("negative dimensions {forward} x {backward}"),
            ));
        };

        let costs = Self {
            forward_dimension,
            backward_dimension,
            buffer,
        };
        costs.validate()?;
        Ok(costs)
    }

    /// ヘッダと要素数が次元数と一致することを検証します。
    pub(crate) fn validate(&self) -> Result<(), InvalidFormatError> {
        let (forward, backward) = (self.forward_dimension, self.backward_dimension);
        let header_matches = self.buffer.get(..HEADER_LEN).is_some_and(|header| {
            usize::try_from(header[0]) == Ok(forward) && usize::try_from(header[1]) == Ok(backward)
        });
        if !header_matches {
            return Err(InvalidFormatError::new(
                "connection_costs",
                format!("the matrix header does not describe {forward} x {backward}"),
            ));
        }

        let expected = forward
            .checked_mul(backward)
            .and_then(|n| n.checked_add(HEADER_LEN));
        if expected != Some(self.buffer.len()) {
            return Err(InvalidFormatError::new(
                "connection_costs",
                format!(
                    "{forward} x {backward} matrix does not fit in {} elements",
                    self.buffer.len()
                ),
            ));
        }
        Ok(())
    }

    /// 前方文脈IDの次元数を返します。
    #[inline(always)]
    pub fn forward_dimension(&self) -> usize {
        self.forward_dimension
    }

    /// 後方文脈IDの次元数を返します。
    #[inline(always)]
    pub fn backward_dimension(&self) -> usize {
        self.backward_dimension
    }

    /// 接続コストを返します。IDが範囲外の場合は`None`を返します。
    ///
    /// # 引数
    ///
    /// * `forward_id` - 前方文脈ID(前のトークンの右文脈ID)
    /// * `backward_id` - 後方文脈ID(次のトークンの左文脈ID)
    #[inline(always)]
    pub fn cost(&self, forward_id: usize, backward_id: usize) -> Option<i16> {
        if forward_id >= self.forward_dimension || backward_id >= self.backward_dimension {
            return None;
        }
        Some(self.buffer[forward_id * self.backward_dimension + backward_id + HEADER_LEN])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matrix() {
        let conn = ConnectionCosts::from_view(vec![2, 3, 0, 863, -3689, 1, 2, -2490]).unwrap();
        assert_eq!(conn.forward_dimension(), 2);
        assert_eq!(conn.backward_dimension(), 3);
        assert_eq!(conn.cost(0, 0), Some(0));
        assert_eq!(conn.cost(0, 1), Some(863));
        assert_eq!(conn.cost(0, 2), Some(-3689));
        assert_eq!(conn.cost(1, 2), Some(-2490));
        assert_eq!(conn.cost(2, 0), None);
        assert_eq!(conn.cost(0, 3), None);
    }

    #[test]
    fn test_empty_matrix() {
        let conn = ConnectionCosts::from_view(vec![0, 0]).unwrap();
        assert_eq!(conn.cost(0, 0), None);
    }

    #[test]
    fn test_invalid_matrix() {
        assert!(ConnectionCosts::from_view(vec![]).is_err());
        assert!(ConnectionCosts::from_view(vec![1]).is_err());
        assert!(ConnectionCosts::from_view(vec![-1, 1]).is_err());
        assert!(ConnectionCosts::from_view(vec![2, 2, 0, 0, 0]).is_err());
    }
}
