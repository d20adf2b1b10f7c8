use color_eyre::eyre::{eyre, WrapErr};
use color_eyre::Report;
use folio::config::{Cmd, Flags, Setup};
use folio::direction;
use folio::editor::EditorSession;
use folio::model::source::{is_temporary, TEMPORARY_PREFIX};
use folio::model::{walk, Document};
use folio::post::{ContentStore, Language};
use folio::registry::TempFile;
use folio::render::Renderer;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use structopt::StructOpt;
use tokio::fs;
use tracing::{info, warn};

#[cfg(debug_assertions)]
const DEFAULT_FILTER: &str = "warn,folio=trace";
#[cfg(not(debug_assertions))]
const DEFAULT_FILTER: &str = "warn,folio=info";

fn install_tracing() {
    use tracing_error::ErrorLayer;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::{fmt, EnvFilter};

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(ErrorLayer::default())
        .init();
}

/// The file a `blob:<name>` handle of a draft refers to
fn asset_path(assets: &Path, handle: &str) -> Option<PathBuf> {
    let name = handle.strip_prefix(TEMPORARY_PREFIX)?;
    let file = Path::new(name).file_name()?;
    Some(assets.join(file))
}

async fn publish(
    setup: Setup,
    post: String,
    lang: Language,
    draft: PathBuf,
    assets: Option<PathBuf>,
) -> Result<(), Report> {
    let json = fs::read_to_string(&draft)
        .await
        .wrap_err_with(|| format!("Could not read draft {:?}", draft))?;
    let doc = Document::from_json(&json).wrap_err("Could not parse draft")?;

    let handles: Vec<String> = walk::image_sources(doc.root())
        .into_iter()
        .filter(|src| is_temporary(src))
        .map(str::to_owned)
        .collect();

    let mut session = EditorSession::new(
        doc,
        setup.settings,
        Arc::new(setup.storage),
        Arc::new(setup.store),
    );
    let assets = assets.unwrap_or_else(|| PathBuf::from("."));
    for handle in handles {
        let path = match asset_path(&assets, &handle) {
            Some(path) => path,
            None => continue,
        };
        match fs::read(&path).await {
            Ok(bytes) => {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                session.registry_mut().register(handle, TempFile::new(name, bytes));
            }
            Err(e) => warn!("Could not read {:?}: {}", path, e),
        }
    }

    let editor = session.start();
    let saved = editor.save(post.as_str(), lang).await;
    editor.close().await;
    let report = saved.wrap_err_with(|| format!("Could not save {} ({})", post, lang))?;

    for upload in &report.uploads {
        println!("{} -> {}", upload.handle, upload.url);
    }
    for orphan in &report.orphans {
        println!("{} was not uploaded", orphan);
    }
    for key in &report.pruned {
        println!("removed {}", key);
    }
    info!("Saved {} ({}) at {}", post, lang, report.version);
    Ok(())
}

async fn render(setup: Setup, post: String, lang: Language) -> Result<(), Report> {
    let json = setup
        .store
        .load(&post, lang)
        .await
        .wrap_err("Could not load post")?
        .ok_or_else(|| eyre!("{} has no {} content", post, lang))?;
    let renderer = Renderer::new(setup.settings.storage_base);
    let rendered = renderer.render(&json);
    println!("{}", rendered.html(Instant::now()));
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Report> {
    install_tracing();
    color_eyre::install()?;

    let flags = Flags::from_args();
    let setup = flags.load_cfg().await?;

    match flags.cmd {
        Cmd::Publish {
            post,
            lang,
            draft,
            assets,
        } => publish(setup, post, lang, draft, assets).await,
        Cmd::Render { post, lang } => render(setup, post, lang).await,
        Cmd::Classify { text } => {
            let dir = direction::classify(&text);
            println!("{}", dir.map(|d| d.as_str()).unwrap_or("none"));
            Ok(())
        }
    }
}
