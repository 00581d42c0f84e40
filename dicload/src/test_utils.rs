//! テスト用ユーティリティ
//!
//! バイナリリソースのエンコーダ、小さなサンプル辞書、
//! 失敗や遅延を注入するフェッチャーを提供します。

use std::collections::{BTreeMap, VecDeque};
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::Duration;

use byteorder::{LittleEndian, WriteBytesExt};
use hashbrown::HashSet;

use crate::fetch::{Fetch, MemoryFetcher, RawBuffer};
use crate::resource::{ResourceKey, join_path};

/// キーと値の組からbase/check配列を構築します。
///
/// 遷移コードはUTF-8のバイト値に1を足したもの、終端コードは0です。
/// 空きスロットのcheckは-1になります。
pub(crate) fn build_double_array(entries: &[(&str, i32)]) -> (Vec<i32>, Vec<i32>) {
    let mut children: Vec<BTreeMap<i32, usize>> = vec![BTreeMap::new()];
    let mut values: Vec<Option<i32>> = vec![None];
    for &(key, value) in entries {
        let mut node = 0;
        for &b in key.as_bytes() {
            let code = i32::from(b) + 1;
            node = match children[node].get(&code) {
                Some(&child) => child,
                None => {
                    let child = children.len();
                    children.push(BTreeMap::new());
                    values.push(None);
                    children[node].insert(code, child);
                    child
                }
            };
        }
        values[node] = Some(value);
    }

    let mut base = vec![0i32];
    let mut check = vec![-1i32];
    let mut queue = VecDeque::from([(0usize, 0usize)]);
    while let Some((node, slot)) = queue.pop_front() {
        let mut codes: Vec<i32> = children[node].keys().copied().collect();
        if values[node].is_some() {
            codes.insert(0, 0);
        }
        if codes.is_empty() {
            continue;
        }

        let mut b = 1i32;
        while !codes.iter().all(|&code| {
            let s = (b + code) as usize;
            s >= check.len() || (s != 0 && check[s] == -1)
        }) {
            b += 1;
        }

        let max_slot = (b + codes[codes.len() - 1]) as usize;
        if base.len() <= max_slot {
            base.resize(max_slot + 1, 0);
            check.resize(max_slot + 1, -1);
        }
        base[slot] = b;
        for &code in &codes {
            check[(b + code) as usize] = slot as i32;
        }
        if let Some(value) = values[node] {
            base[b as usize] = -value - 1;
        }
        for (&code, &child) in &children[node] {
            queue.push_back((child, (b + code) as usize));
        }
    }
    (base, check)
}

/// (左文脈ID, 右文脈ID, コスト, 素性)の並びをトークン情報と品詞情報にエンコードします。
pub(crate) fn encode_token_infos(tokens: &[(i16, i16, i16, &str)]) -> (Vec<u8>, Vec<u8>) {
    let mut tid = vec![];
    let mut pos = vec![];
    for &(left_id, right_id, cost, features) in tokens {
        tid.write_i16::<LittleEndian>(left_id).unwrap();
        tid.write_i16::<LittleEndian>(right_id).unwrap();
        tid.write_i16::<LittleEndian>(cost).unwrap();
        tid.write_i32::<LittleEndian>(pos.len() as i32).unwrap();
        pos.extend_from_slice(features.as_bytes());
        pos.push(0);
    }
    (tid, pos)
}

/// (キー, トークンID)の並びをターゲットマップにエンコードします。
pub(crate) fn encode_target_map(entries: &[(u32, &[u32])]) -> Vec<u8> {
    let mut bytes = vec![];
    for &(key, ids) in entries {
        bytes.write_u32::<LittleEndian>(key).unwrap();
        bytes.write_u32::<LittleEndian>(ids.len() as u32).unwrap();
        for &id in ids {
            bytes.write_u32::<LittleEndian>(id).unwrap();
        }
    }
    bytes
}

/// (名前, 起動, グループ化, 最大長)の並びをカテゴリ定義にエンコードします。
pub(crate) fn encode_invoke_definitions(classes: &[(&str, bool, bool, i32)]) -> Vec<u8> {
    let mut bytes = vec![];
    for &(name, invoke, group, max_length) in classes {
        bytes.push(u8::from(invoke));
        bytes.push(u8::from(group));
        bytes.write_i32::<LittleEndian>(max_length).unwrap();
        bytes.extend_from_slice(name.as_bytes());
        bytes.push(0);
    }
    bytes
}

pub(crate) fn encode_i16s(values: &[i16]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(values.len() * 2);
    for &v in values {
        bytes.write_i16::<LittleEndian>(v).unwrap();
    }
    bytes
}

pub(crate) fn encode_i32s(values: &[i32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(values.len() * 4);
    for &v in values {
        bytes.write_i32::<LittleEndian>(v).unwrap();
    }
    bytes
}

pub(crate) fn encode_u32s(values: &[u32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(values.len() * 4);
    for &v in values {
        bytes.write_u32::<LittleEndian>(v).unwrap();
    }
    bytes
}

/// サンプル辞書の接続コスト行列(ヘッダ付き)
pub(crate) const SAMPLE_COSTS: [i16; 6] = [2, 2, 0, 10, -5, 3];

/// 3語(京都、東京、東京都)と3つの文字カテゴリからなるサンプル辞書の12リソース
pub(crate) fn sample_resources() -> Vec<(ResourceKey, Vec<u8>)> {
    let (base, check) = build_double_array(&[("京都", 0), ("東京", 1), ("東京都", 2)]);
    let (tid, tid_pos) = encode_token_infos(&[
        (0, 0, 3000, "京都,名詞,固有名詞"),
        (0, 1, 2500, "東京,名詞,固有名詞"),
        (1, 1, 2000, "東京都,名詞,固有名詞"),
    ]);
    let tid_map = encode_target_map(&[(0, &[0]), (1, &[1]), (2, &[2])]);

    let (unk, unk_pos) = encode_token_infos(&[
        (0, 0, 10000, "記号,一般"),
        (1, 1, 5000, "名詞,固有名詞"),
        (1, 1, 4000, "名詞,数"),
    ]);
    let unk_map = encode_target_map(&[(0, &[0]), (1, &[1]), (2, &[2])]);

    let mut unk_char = vec![0u8; 128];
    let mut unk_compat = vec![0u32; 128];
    for c in b'A'..=b'Z' {
        unk_char[usize::from(c)] = 1;
    }
    for c in b'a'..=b'z' {
        unk_char[usize::from(c)] = 1;
    }
    for c in b'0'..=b'9' {
        unk_char[usize::from(c)] = 2;
        unk_compat[usize::from(c)] = 0b110;
    }
    let unk_invoke = encode_invoke_definitions(&[
        ("DEFAULT", false, true, 0),
        ("ALPHA", true, true, 0),
        ("NUMERIC", true, true, 0),
    ]);

    vec![
        (ResourceKey::Base, encode_i32s(&base)),
        (ResourceKey::Check, encode_i32s(&check)),
        (ResourceKey::Tid, tid),
        (ResourceKey::TidPos, tid_pos),
        (ResourceKey::TidMap, tid_map),
        (ResourceKey::Cc, encode_i16s(&SAMPLE_COSTS)),
        (ResourceKey::Unk, unk),
        (ResourceKey::UnkPos, unk_pos),
        (ResourceKey::UnkMap, unk_map),
        (ResourceKey::UnkChar, unk_char),
        (ResourceKey::UnkCompat, encode_u32s(&unk_compat)),
        (ResourceKey::UnkInvoke, unk_invoke),
    ]
}

/// サンプル辞書を既定のファイル名で`dic_path`以下に登録したフェッチャーを作成します。
pub(crate) fn sample_fetcher(dic_path: &str) -> MemoryFetcher {
    let mut fetcher = MemoryFetcher::new();
    for (key, bytes) in sample_resources() {
        fetcher.insert(join_path(dic_path, key.default_file_name()), bytes);
    }
    fetcher
}

fn identifiers<I, S>(ids: I) -> HashSet<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    ids.into_iter().map(Into::into).collect()
}

/// 指定した識別子の取得を失敗させるフェッチャー
pub(crate) struct FailingFetcher<F> {
    inner: F,
    failing: HashSet<String>,
}

impl<F: Fetch> FailingFetcher<F> {
    pub(crate) fn new<I, S>(inner: F, failing: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            inner,
            failing: identifiers(failing),
        }
    }
}

impl<F: Fetch> Fetch for FailingFetcher<F> {
    fn fetch(&self, identifier: &str) -> io::Result<RawBuffer> {
        if self.failing.contains(identifier) {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                format!("injected failure for '{identifier}'"),
            ));
        }
        self.inner.fetch(identifier)
    }
}

/// 指定した識別子の取得を遅延させるフェッチャー
pub(crate) struct StallingFetcher<F> {
    inner: F,
    stalled: HashSet<String>,
    delay: Duration,
}

impl<F: Fetch> StallingFetcher<F> {
    pub(crate) fn new<I, S>(inner: F, stalled: I, delay: Duration) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            inner,
            stalled: identifiers(stalled),
            delay,
        }
    }
}

impl<F: Fetch> Fetch for StallingFetcher<F> {
    fn fetch(&self, identifier: &str) -> io::Result<RawBuffer> {
        if self.stalled.contains(identifier) {
            thread::sleep(self.delay);
        }
        self.inner.fetch(identifier)
    }
}

/// 指定した識別子の取得でパニックするフェッチャー
pub(crate) struct PanickingFetcher<F> {
    inner: F,
    target: String,
}

impl<F: Fetch> PanickingFetcher<F> {
    pub(crate) fn new<S: Into<String>>(inner: F, target: S) -> Self {
        Self {
            inner,
            target: target.into(),
        }
    }
}

impl<F: Fetch> Fetch for PanickingFetcher<F> {
    fn fetch(&self, identifier: &str) -> io::Result<RawBuffer> {
        if identifier == self.target {
            panic!("fetcher exploded on '{identifier}'");
        }
        self.inner.fetch(identifier)
    }
}

/// 取得回数を数えるフェッチャー
pub(crate) struct CountingFetcher<F> {
    inner: F,
    calls: AtomicUsize,
}

impl<F: Fetch> CountingFetcher<F> {
    pub(crate) fn new(inner: F) -> Self {
        Self {
            inner,
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl<F: Fetch> Fetch for CountingFetcher<F> {
    fn fetch(&self, identifier: &str) -> io::Result<RawBuffer> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.fetch(identifier)
    }
}
