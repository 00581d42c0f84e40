//! バイト列から固定幅の数値配列へのデコード
//!
//! 各リソースの要素型は[`ResourceKey::element_type`]の表で宣言されており、
//! すべてのトラックは同じ[`decode`]関数を通してビューを作成します。
//! 複数バイトの要素はリトルエンディアンとして解釈します。

use std::fmt;

use byteorder::{ByteOrder, LittleEndian};

use crate::errors::DecodeError;
use crate::resource::ResourceKey;

/// 数値配列の要素型
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ElementType {
    /// 符号なし8ビット整数
    U8,
    /// 符号付き16ビット整数
    I16,
    /// 符号付き32ビット整数
    I32,
    /// 符号なし32ビット整数
    U32,
}

impl ElementType {
    /// 要素1つあたりのバイト数を返します。
    #[inline(always)]
    pub const fn width(self) -> usize {
        match self {
            Self::U8 => 1,
            Self::I16 => 2,
            Self::I32 | Self::U32 => 4,
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::U8 => "u8",
            Self::I16 => "i16",
            Self::I32 => "i32",
            Self::U32 => "u32",
        };
        f.write_str(name)
    }
}

mod private {
    pub trait Sealed {}

    impl Sealed for u8 {}
    impl Sealed for i16 {}
    impl Sealed for i32 {}
    impl Sealed for u32 {}
}

/// 型付きビューの要素になれる数値型
pub trait Element: Copy + Default + Send + 'static + private::Sealed {
    /// 対応する要素型
    const TYPE: ElementType;

    /// `src`を`dst`へ読み込みます。`src.len()`は`dst.len() * width`と等しくなければなりません。
    fn read_into(src: &[u8], dst: &mut [Self]);
}

impl Element for u8 {
    const TYPE: ElementType = ElementType::U8;

    #[inline(always)]
    fn read_into(src: &[u8], dst: &mut [Self]) {
        dst.copy_from_slice(src);
    }
}

impl Element for i16 {
    const TYPE: ElementType = ElementType::I16;

    #[inline(always)]
    fn read_into(src: &[u8], dst: &mut [Self]) {
        LittleEndian::read_i16_into(src, dst);
    }
}

impl Element for i32 {
    const TYPE: ElementType = ElementType::I32;

    #[inline(always)]
    fn read_into(src: &[u8], dst: &mut [Self]) {
        LittleEndian::read_i32_into(src, dst);
    }
}

impl Element for u32 {
    const TYPE: ElementType = ElementType::U32;

    #[inline(always)]
    fn read_into(src: &[u8], dst: &mut [Self]) {
        LittleEndian::read_u32_into(src, dst);
    }
}

/// リソースのバイト列を、そのキーに宣言された要素型の配列としてデコードします。
///
/// # 引数
///
/// * `key` - デコード対象のリソース
/// * `bytes` - 取得されたバイト列
///
/// # 戻り値
///
/// `bytes.len() / width`個の要素を持つ配列。
///
/// # エラー
///
/// - `T`がキーの宣言と異なる場合は[`DecodeError::TypeMismatch`]
/// - バイト長が要素幅の倍数でない場合は[`DecodeError::Misaligned`](切り捨ては行いません)
pub fn decode<T: Element>(key: ResourceKey, bytes: &[u8]) -> Result<Vec<T>, DecodeError> {
    let declared = key.element_type();
    if declared != T::TYPE {
        return Err(DecodeError::TypeMismatch {
            key,
            declared,
            requested: T::TYPE,
        });
    }

    let width = declared.width();
    if bytes.len() % width != 0 {
        return Err(DecodeError::Misaligned {
            key,
            len: bytes.len(),
            width,
        });
    }

    let mut view = vec![T::default(); bytes.len() / width];
    T::read_into(bytes, &mut view);
    Ok(view)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_i32() {
        let bytes = [1, 0, 0, 0, 0xff, 0xff, 0xff, 0xff];
        let view = decode::<i32>(ResourceKey::Base, &bytes).unwrap();
        assert_eq!(view, vec![1, -1]);
    }

    #[test]
    fn test_decode_i16() {
        let bytes = [2, 0, 3, 0, 0x18, 0xfc];
        let view = decode::<i16>(ResourceKey::Cc, &bytes).unwrap();
        assert_eq!(view, vec![2, 3, -1000]);
    }

    #[test]
    fn test_decode_u32() {
        let bytes = 0x8000_0001u32.to_le_bytes();
        let view = decode::<u32>(ResourceKey::UnkCompat, &bytes).unwrap();
        assert_eq!(view, vec![0x8000_0001]);
    }

    #[test]
    fn test_decode_u8_keeps_length() {
        let bytes = [0, 1, 2, 3, 4];
        let view = decode::<u8>(ResourceKey::UnkChar, &bytes).unwrap();
        assert_eq!(view.len(), 5);
    }

    #[test]
    fn test_decode_empty() {
        let view = decode::<i32>(ResourceKey::Check, &[]).unwrap();
        assert!(view.is_empty());
    }

    #[test]
    fn test_decode_misaligned() {
        let err = decode::<i32>(ResourceKey::Check, &[0; 7]).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::Misaligned { key: ResourceKey::Check, len: 7, width: 4 }
        ));

        let err = decode::<i16>(ResourceKey::Cc, &[0; 3]).unwrap_err();
        assert!(matches!(err, DecodeError::Misaligned { width: 2, .. }));
    }

    #[test]
    fn test_decode_type_mismatch() {
        let err = decode::<u8>(ResourceKey::UnkCompat, &[0; 4]).unwrap_err();
        assert!(matches!(
            err,
            DecodeError::TypeMismatch {
                declared: ElementType::U32,
                requested: ElementType::U8,
                ..
            }
        ));
    }
}
