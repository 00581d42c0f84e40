//! 辞書ディレクトリを読み込んで内容を表示するユーティリティ
//!
//! このバイナリは、辞書のバイナリリソースを並行に読み込み、各部品の統計を出力します。
//! 指定された表層形の検索結果の出力や、組み立てた辞書のスナップショットの書き出しも行います。

use std::error::Error;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::{Duration, Instant};

use dicload::fetch::{Fetch, FileFetcher, GzipFetcher, ZstdFetcher};
use dicload::{DictionaryLoader, ResourceFileNames, ResourceKey};

use clap::Parser;

/// リソースの圧縮形式
#[derive(Clone, Debug)]
enum Compression {
    None,
    Gzip,
    Zstd,
}

/// `Compression` の `FromStr` 実装
impl FromStr for Compression {
    type Err = &'static str;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name {
            "none" => Ok(Self::None),
            "gzip" => Ok(Self::Gzip),
            "zstd" => Ok(Self::Zstd),
            _ => Err("Could not parse a compression"),
        }
    }
}

/// `key=file` 形式のファイル名の上書き
#[derive(Clone, Debug)]
struct NameOverride {
    key: ResourceKey,
    name: String,
}

impl FromStr for NameOverride {
    type Err = String;

    fn from_str(arg: &str) -> Result<Self, Self::Err> {
        let (key, name) = arg
            .split_once('=')
            .ok_or_else(|| format!("expected key=file, got '{arg}'"))?;
        Ok(Self {
            key: key.parse()?,
            name: name.to_string(),
        })
    }
}

/// コマンドライン引数
#[derive(Parser, Debug)]
#[clap(name = "inspect", about = "Loads a dictionary directory and reports its contents")]
struct Args {
    /// Dictionary directory.
    #[clap(short = 'd', long)]
    dic_dir: String,

    /// Compression of the resource files. Choices are none, gzip, and zstd.
    #[clap(short = 'c', long, default_value = "none")]
    compression: Compression,

    /// Overrides a resource file name, e.g. cc=custom_cc.dat. Can be repeated.
    #[clap(short = 'n', long = "name")]
    names: Vec<NameOverride>,

    /// Gives up a fetch after the given milliseconds.
    #[clap(long)]
    timeout_ms: Option<u64>,

    /// Surface forms to look up. Can be repeated.
    #[clap(short = 'l', long = "lookup")]
    lookups: Vec<String>,

    /// Writes the assembled dictionary as a snapshot.
    #[clap(short = 'o', long)]
    snapshot: Option<PathBuf>,
}

/// メイン関数
///
/// 辞書を読み込み、統計と検索結果を標準出力に出力します。
fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    let fetcher: Box<dyn Fetch> = match args.compression {
        Compression::None => Box::new(FileFetcher),
        Compression::Gzip => Box::new(GzipFetcher::new(FileFetcher)),
        Compression::Zstd => Box::new(ZstdFetcher::new(FileFetcher)),
    };
    let file_names =
        ResourceFileNames::with_overrides(args.names.into_iter().map(|o| (o.key, o.name)));

    let mut builder = DictionaryLoader::builder(args.dic_dir).file_names(file_names);
    if let Some(ms) = args.timeout_ms {
        builder = builder.fetch_timeout(Duration::from_millis(ms));
    }
    let loader = builder.build(fetcher)?;

    eprintln!("Loading the dictionary...");
    let start = Instant::now();
    let dict = loader.load()?;
    eprintln!("Loaded in {:.3} seconds", start.elapsed().as_secs_f64());

    let out = std::io::stdout();
    let mut out = BufWriter::new(out.lock());

    for (key, name) in loader.file_names().iter() {
        writeln!(&mut out, "{key}\t{name}")?;
    }

    let trie = dict.trie();
    let token_info = dict.token_info();
    let costs = dict.connection_costs();
    let unknown = dict.unknown();
    writeln!(&mut out, "trie\tnodes={}", trie.len())?;
    writeln!(
        &mut out,
        "token-info\ttokens={}\ttargets={}",
        token_info.num_tokens(),
        token_info.num_targets()
    )?;
    writeln!(
        &mut out,
        "connection-costs\tforward={}\tbackward={}",
        costs.forward_dimension(),
        costs.backward_dimension()
    )?;
    let classes: Vec<_> = unknown
        .character_definition()
        .classes()
        .iter()
        .map(|class| class.name.as_str())
        .collect();
    writeln!(
        &mut out,
        "unknown\ttokens={}\tcategories={}",
        unknown.token_info().num_tokens(),
        classes.join(",")
    )?;

    for surface in &args.lookups {
        let token_ids = dict.lookup_tokens(surface);
        if token_ids.is_empty() {
            writeln!(&mut out, "{surface}\t(none)")?;
        }
        for &token_id in token_ids {
            let Some(token) = token_info.token(token_id) else {
                continue;
            };
            writeln!(
                &mut out,
                "{}\t{}\tleft_id={}\tright_id={}\tword_cost={}",
                surface,
                token_info.features(token_id).unwrap_or("*"),
                token.left_id,
                token.right_id,
                token.word_cost,
            )?;
        }
    }
    out.flush()?;

    if let Some(path) = args.snapshot {
        eprintln!("Writing the snapshot to {}...", path.display());
        dict.write(BufWriter::new(File::create(path)?))?;
    }

    Ok(())
}
