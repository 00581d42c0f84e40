//! 1つのトラックの実行
//!
//! トラックは担当するリソースを並行に取得し、すべて揃ってから要素型に
//! デコードして、アセンブラのビルド操作を1回だけ呼び出します。

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use crossbeam_channel::{RecvTimeoutError, bounded};

use crate::decode::{Element, decode};
use crate::dictionary::DictionaryAssembler;
use crate::errors::{LoaderError, Result};
use crate::fetch::{Fetch, RawBuffer};
use crate::loader::TrackKind;
use crate::resource::ResourceKey;

/// トラックが構築した部品
pub(super) enum TrackOutput<A: DictionaryAssembler> {
    Trie(A::Trie),
    TokenInfo(A::TokenInfo),
    ConnectionCosts(A::ConnectionCosts),
    Unknown(A::Unknown),
}

/// トラックのスレッドに渡される実行環境
pub(super) struct TrackContext<A: DictionaryAssembler> {
    pub(super) track: TrackKind,
    pub(super) requests: Vec<(ResourceKey, String)>,
    pub(super) fetcher: Arc<dyn Fetch>,
    pub(super) assembler: Arc<A>,
    pub(super) fetch_timeout: Option<Duration>,
    pub(super) thread_name: String,
}

impl<A: DictionaryAssembler> TrackContext<A> {
    /// トラックを実行します。パニックは[`LoaderError::ThreadPanic`]に変換されます。
    pub(super) fn run(self) -> Result<TrackOutput<A>> {
        let track = self.track;
        match panic::catch_unwind(AssertUnwindSafe(|| self.run_inner())) {
            Ok(result) => result,
            Err(payload) => {
                log::error!("[dicload] The {track} track panicked");
                Err(LoaderError::from_panic(payload))
            }
        }
    }

    fn run_inner(&self) -> Result<TrackOutput<A>> {
        let start = Instant::now();
        let buffers = fetch_all(
            &self.fetcher,
            &self.requests,
            self.fetch_timeout,
            &self.thread_name,
        )?;
        log::debug!(
            "[dicload] Fetched {} resource(s) of the {} track in {:?}",
            buffers.len(),
            self.track,
            start.elapsed()
        );

        let output = self.build(buffers)?;
        log::debug!(
            "[dicload] Built the {} part in {:?}",
            self.track,
            start.elapsed()
        );
        Ok(output)
    }

    fn build(&self, buffers: Vec<RawBuffer>) -> Result<TrackOutput<A>> {
        let asm = &*self.assembler;
        let track = self.track;
        let wrap = |e: A::Error| LoaderError::assembly(track, e);
        let mut views = Views::new(&self.requests, buffers)?;

        let output = match track {
            TrackKind::Trie => {
                let base = views.decode_next()?;
                let check = views.decode_next()?;
                TrackOutput::Trie(asm.build_trie(base, check).map_err(wrap)?)
            }
            TrackKind::TokenInfo => {
                let tid = views.decode_next()?;
                let pos = views.decode_next()?;
                let map = views.decode_next()?;
                TrackOutput::TokenInfo(asm.build_token_info(tid, pos, map).map_err(wrap)?)
            }
            TrackKind::ConnectionCosts => {
                let cc = views.decode_next()?;
                TrackOutput::ConnectionCosts(asm.build_connection_costs(cc).map_err(wrap)?)
            }
            TrackKind::Unknown => {
                let unk = views.decode_next()?;
                let pos = views.decode_next()?;
                let map = views.decode_next()?;
                let chars = views.decode_next()?;
                let compat = views.decode_next()?;
                let invoke = views.decode_next()?;
                TrackOutput::Unknown(
                    asm.build_unknown_dictionary(unk, pos, map, chars, compat, invoke)
                        .map_err(wrap)?,
                )
            }
        };
        Ok(output)
    }
}

/// 取得済みのバッファを、要求されたキーの順にデコードするカーソル
///
/// 要素型は受け取り側のビルド操作の引数型から決まり、
/// キーに宣言された要素型と異なる場合は[`DecodeError::TypeMismatch`](crate::errors::DecodeError::TypeMismatch)になります。
struct Views<'a> {
    keys: std::slice::Iter<'a, (ResourceKey, String)>,
    buffers: std::vec::IntoIter<RawBuffer>,
}

impl<'a> Views<'a> {
    fn new(requests: &'a [(ResourceKey, String)], buffers: Vec<RawBuffer>) -> Result<Self> {
        if requests.len() != buffers.len() {
            return Err(LoaderError::invalid_state(
                "unexpected number of fetched resources",
                format!("expected {}, got {}", requests.len(), buffers.len()),
            ));
        }
        Ok(Self {
            keys: requests.iter(),
            buffers: buffers.into_iter(),
        })
    }

    fn decode_next<T: Element>(&mut self) -> Result<Vec<T>> {
        match (self.keys.next(), self.buffers.next()) {
            (Some((key, _)), Some(buffer)) => Ok(decode::<T>(*key, &buffer)?),
            _ => Err(LoaderError::invalid_state(
                "missing fetched resource",
                "the track consumed more views than it requested",
            )),
        }
    }
}

/// 複数のリソースを並行に取得し、要求と同じ順序で返します。
///
/// 最初に失敗した取得のエラーを即座に返します。残りの取得は中断されず、
/// その結果は破棄されます。
pub(super) fn fetch_all(
    fetcher: &Arc<dyn Fetch>,
    requests: &[(ResourceKey, String)],
    timeout: Option<Duration>,
    thread_name: &str,
) -> Result<Vec<RawBuffer>> {
    let (tx, rx) = bounded(requests.len());

    for (i, (key, identifier)) in requests.iter().enumerate() {
        let fetcher = Arc::clone(fetcher);
        let identifier = identifier.clone();
        let tx = tx.clone();
        thread::Builder::new()
            .name(format!("{thread_name}-{key}"))
            .spawn(move || {
                log::debug!("[dicload] Fetching '{identifier}'");
                let result = match panic::catch_unwind(AssertUnwindSafe(|| {
                    fetcher.fetch(&identifier)
                })) {
                    Ok(Ok(buffer)) => {
                        log::debug!("[dicload] Fetched '{identifier}' ({} bytes)", buffer.len());
                        Ok(buffer)
                    }
                    Ok(Err(source)) => Err(LoaderError::Fetch { identifier, source }),
                    Err(payload) => Err(LoaderError::from_panic(payload)),
                };
                // The receiver is gone once the load has already failed.
                let _ = tx.send((i, result));
            })?;
    }
    drop(tx);

    let deadline = timeout.map(|timeout| Instant::now() + timeout);
    let mut slots: Vec<Option<RawBuffer>> = requests.iter().map(|_| None).collect();
    for _ in 0..requests.len() {
        let received = match deadline {
            Some(deadline) => rx.recv_deadline(deadline),
            None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };
        match received {
            Ok((i, Ok(buffer))) => slots[i] = Some(buffer),
            Ok((_, Err(e))) => return Err(e),
            Err(RecvTimeoutError::Timeout) => {
                let pending = slots.iter().position(Option::is_none).unwrap_or(0);
                let identifier = requests[pending].1.clone();
                log::warn!("[dicload] Timed out while fetching '{identifier}'");
                return Err(LoaderError::Fetch {
                    source: std::io::Error::new(
                        std::io::ErrorKind::TimedOut,
                        format!("no response within {:?}", timeout.unwrap_or_default()),
                    ),
                    identifier,
                });
            }
            Err(RecvTimeoutError::Disconnected) => {
                return Err(LoaderError::ThreadPanic(
                    "a fetch thread exited without reporting a result".to_string(),
                ));
            }
        }
    }

    slots
        .into_iter()
        .zip(requests)
        .map(|(slot, (_, identifier))| {
            slot.ok_or_else(|| {
                LoaderError::invalid_state("missing fetched resource", identifier.clone())
            })
        })
        .collect()
}
