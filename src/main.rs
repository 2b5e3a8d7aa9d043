use clap::Parser;
use hayate_reader::capture::Capture;
use hayate_reader::config::Settings;
use hayate_reader::image::loader::MangaFile;
use hayate_reader::render::CanvasTarget;
use hayate_reader::state::MangaView;
use hayate_reader::thumbnail::{LoadSource, Thumbnails};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::runtime::Runtime;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser, Debug)]
#[command(name = "hayate-reader", version = VERSION, about = "ZIP / フォルダの画像をページとして読むビューア")]
struct Cli {
    /// 開く ZIP (cbz) またはフォルダ
    source: PathBuf,

    /// 表示するページ (0 始まり)
    #[arg(long, default_value_t = 0)]
    page: usize,

    /// 表示した画面を PNG で書き出す
    #[arg(long)]
    output: Option<PathBuf>,

    /// 全ページのサムネイルを生成する
    #[arg(long)]
    thumbnails: bool,

    /// サムネイルキャッシュを読み書きしない
    #[arg(long, requires = "thumbnails")]
    no_cache: bool,

    /// 表示領域上の選択範囲 `x1,y1,x2,y2` を切り出す
    #[arg(long, value_parser = parse_selection)]
    capture: Option<[f64; 4]>,

    /// 表示領域の大きさ `WxH` (省略時は画面と同じ大きさ)
    #[arg(long, value_parser = parse_view_size, requires = "capture")]
    view: Option<(f64, f64)>,

    #[arg(long, default_value = "config.json")]
    config: PathBuf,
}

fn parse_selection(s: &str) -> Result<[f64; 4], String> {
    let values = s
        .split(',')
        .map(|v| v.trim().parse::<f64>().map_err(|e| format!("{}: {}", v, e)))
        .collect::<Result<Vec<_>, _>>()?;
    <[f64; 4]>::try_from(values).map_err(|_| "x1,y1,x2,y2 の形式で指定してください".to_string())
}

fn parse_view_size(s: &str) -> Result<(f64, f64), String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| "WxH の形式で指定してください".to_string())?;
    let w: f64 = w.trim().parse().map_err(|e| format!("{}: {}", w, e))?;
    let h: f64 = h.trim().parse().map_err(|e| format!("{}: {}", h, e))?;
    if w <= 0.0 || h <= 0.0 {
        return Err("表示領域は正の大きさが必要です".to_string());
    }
    Ok((w, h))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let settings = Settings::load_or_default(&cli.config);
    if !cli.config.exists() {
        if let Err(e) = settings.save(&cli.config) {
            log::warn!("[Config] {} を作成できません: {}", cli.config.display(), e);
        }
    }

    let rt = Runtime::new()?;
    rt.block_on(run(cli, settings))
}

async fn run(cli: Cli, settings: Settings) -> Result<(), Box<dyn std::error::Error>> {
    log::info!("[App] hayate-reader v{}", VERSION);
    let manga_file = Arc::new(MangaFile::open(&cli.source, &settings).await?);
    log::info!(
        "[App] {} を開きました ({} ページ)",
        manga_file.source().path().display(),
        manga_file.len()
    );

    let thumbnails = if cli.thumbnails {
        let thumbnails = Thumbnails::new(manga_file.clone(), &settings);
        thumbnails.add_finished_page_load_handler(|page, thumbnail| {
            log::debug!(
                "[Thumbnail] ページ {} ({}x{}, {} bytes)",
                page,
                thumbnail.original_size.width,
                thumbnail.original_size.height,
                thumbnail.image.len()
            );
        });

        if cli.no_cache {
            thumbnails.load().await?;
            println!("サムネイル: {} ページを生成しました", thumbnails.len());
        } else {
            let from = match thumbnails.load_or_generate(&settings.thumbnail_cache_dir()).await? {
                LoadSource::Cache => "キャッシュから読み込み",
                LoadSource::Generated => "生成",
            };
            println!("サムネイル: {} ページを{}ました", thumbnails.len(), from);
        }
        for page in thumbnails.failed_pages() {
            println!("  ページ {} のサムネイルを作れませんでした", page);
        }
        Some(thumbnails)
    } else {
        None
    };

    let result = show_page(&cli, &settings, manga_file.clone()).await;

    if let Some(thumbnails) = thumbnails {
        thumbnails.finalize().await;
    }
    manga_file.finalize();
    result
}

async fn show_page(cli: &Cli, settings: &Settings, manga_file: Arc<MangaFile>) -> Result<(), Box<dyn std::error::Error>> {
    if manga_file.is_empty() {
        println!("表示できるページがありません");
        return Ok(());
    }

    let canvas = CanvasTarget::new();
    let view = MangaView::new(manga_file, Box::new(canvas.clone()), settings);
    view.move_to_page(cli.page).await?;

    let Some(frame) = canvas.current_frame() else {
        return Ok(());
    };
    println!(
        "ページ {}: {:?} ({}x{})",
        cli.page,
        frame.layout,
        frame.width(),
        frame.height()
    );

    if let Some(output) = &cli.output {
        save_frame(&frame.image, output)?;
        println!("画面を {} に保存しました", output.display());
    }

    if let Some([x1, y1, x2, y2]) = cli.capture {
        let view_size = cli
            .view
            .unwrap_or((frame.width() as f64, frame.height() as f64));
        let mut capture = Capture::new();
        capture.enable();
        capture.on_select_start(x1, y1);
        capture.on_select_end(x2, y2);
        let (w, h) = capture.capture(&frame, view_size, &settings.capture_output)?;
        println!("{}x{} を {} に切り出しました", w, h, settings.capture_output.display());
    }

    Ok(())
}

fn save_frame(image: &image::RgbaImage, path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    image.save_with_format(path, image::ImageFormat::Png)?;
    Ok(())
}
