//! # Configuration
//!
//! Flags come from the command line, everything else from an optional TOML
//! file:
//!
//! ```toml
//! [storage]
//! root = "./storage"
//! bucket = "blog-images"
//! public_base = "http://localhost:8080/storage/v1/object/public"
//!
//! [content]
//! save_dir = "./posts"
//!
//! [pipeline]
//! strict_orphans = false
//! ```
use crate::model::source::join_base;
use crate::pipeline::Settings;
use crate::post::{FolderStore, Language};
use crate::storage::LocalStorage;
use color_eyre::eyre::WrapErr;
use color_eyre::Report;
use serde::Deserialize;
use std::path::PathBuf;
use structopt::StructOpt;
use tokio::fs::read_to_string;
use tracing::instrument;

/// The commandline flags
#[derive(Debug, StructOpt)]
#[structopt(name = "folio", about = "Bilingual blog content pipeline")]
pub struct Flags {
    /// Which config file to use
    #[structopt(long = "cfg", short = "c", parse(from_os_str))]
    pub cfg: Option<PathBuf>,
    #[structopt(subcommand)]
    pub cmd: Cmd,
}

#[derive(Debug, StructOpt)]
pub enum Cmd {
    /// Upload the images of a draft and save it
    Publish {
        /// The post to save to
        #[structopt(long)]
        post: String,
        /// `en` or `ar`
        #[structopt(long)]
        lang: Language,
        /// A document whose images point at `blob:<file name>`
        #[structopt(long, parse(from_os_str))]
        draft: PathBuf,
        /// Where the files for those images are
        #[structopt(long, parse(from_os_str))]
        assets: Option<PathBuf>,
    },
    /// Print a saved post as HTML
    Render {
        #[structopt(long)]
        post: String,
        #[structopt(long)]
        lang: Language,
    },
    /// Print the direction of some text
    Classify { text: String },
}

/// The `[storage]` section
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory that holds one folder per bucket
    pub root: PathBuf,
    pub bucket: String,
    /// Public URL under which the buckets are served
    pub public_base: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("storage"),
            bucket: String::from("blog-images"),
            public_base: String::from("http://localhost:8080/storage/v1/object/public"),
        }
    }
}

/// The `[pipeline]` section
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PipelineConfig {
    /// Fail saves that reference missing temporary images
    #[serde(default)]
    pub strict_orphans: bool,
}

/// A configuration for the system
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    /// Where post content is saved
    #[serde(default)]
    pub content: FolderStore,
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

/// The setup that we are actually using
#[derive(Debug)]
pub struct Setup {
    pub storage: LocalStorage,
    pub store: FolderStore,
    pub settings: Settings,
}

impl From<Config> for Setup {
    fn from(config: Config) -> Self {
        let StorageConfig {
            root,
            bucket,
            public_base,
        } = config.storage;
        let storage_base = join_base(&public_base, &bucket);
        Setup {
            storage: LocalStorage::new(root, public_base),
            store: config.content,
            settings: Settings::new(bucket, storage_base).strict(config.pipeline.strict_orphans),
        }
    }
}

impl Flags {
    #[instrument]
    /// Load the configuration from a file
    pub async fn load_cfg(&self) -> Result<Setup, Report> {
        let config = if let Some(cfg) = &self.cfg {
            let cfg_string: String = read_to_string(cfg)
                .await
                .wrap_err("Could not read config file")?;
            toml::from_str(&cfg_string).wrap_err("Could not parse config file")?
        } else {
            Config::default()
        };
        Ok(Setup::from(config))
    }
}
