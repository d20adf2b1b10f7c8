//! # Editing sessions
//!
//! One task per open editor owns the live document, the temporary image
//! registry and the direction scheduler. Everything else talks to it through
//! an [`EditorHandle`], which sends [`EditorRequest`]s and waits for replies
//! on oneshot channels.
//!
//! Saving uploads images in a separate task, so the editor stays usable in
//! the meantime. Only when the save went through are the uploaded handles
//! swapped for URLs in the live tree and dropped from the registry. A save
//! that finishes after the session was closed is discarded.
use crate::direction::{self, FrameScheduler, FRAME};
use crate::model::{Document, ModelError, Node};
use crate::pipeline::{
    apply_rewrites, prune, KeyGenerator, MaterializeError, Plan, Settings, Upload,
};
use crate::post::{ContentStore, Language, StoreError};
use crate::registry::{new_handle, TempFile, TempFileRegistry};
use crate::storage::Storage;
use crate::util::{Counter, LoopState};
use bytes::Bytes;
use displaydoc::Display;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::time;
use tracing::{debug, info, info_span, trace, warn};
use tracing_futures::Instrument;

/// The number of edits a session has seen
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version(u64);

impl From<u64> for Version {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// The editor session has ended
#[derive(Debug, Copy, Clone, PartialEq, Eq, Error, Display)]
pub struct SessionClosed;

/// Error when saving
#[derive(Debug, Error, Display)]
pub enum SaveError {
    /// Could not upload images: {0}
    Materialize(#[from] MaterializeError),
    /// Could not serialize the document: {0}
    Model(#[from] ModelError),
    /// Could not persist the document: {0}
    Store(#[from] StoreError),
    /// A save is already running
    Busy,
    /// {0}
    Closed(#[from] SessionClosed),
}

/// What a successful save did
#[derive(Debug, Clone)]
pub struct SaveReport {
    /// The version that was saved
    pub version: Version,
    /// The document as persisted
    pub doc: Document,
    pub uploads: Vec<Upload>,
    /// Temporary images that could not be uploaded and stay as they are
    pub orphans: Vec<String>,
    /// Storage keys removed because the saved version no longer uses them
    pub pruned: Vec<String>,
}

pub type EditFn = Box<dyn FnOnce(&mut Document) + Send>;

pub enum EditorRequest {
    /// Change the document
    Edit(EditFn),
    /// Add an image from a local file at the end of the document
    InsertImage {
        name: String,
        bytes: Bytes,
        alt: Option<String>,
        reply: oneshot::Sender<String>,
    },
    /// Get a copy of the current document
    Snapshot(oneshot::Sender<Document>),
    Save {
        post: String,
        lang: Language,
        reply: oneshot::Sender<Result<SaveReport, SaveError>>,
    },
    /// End the session, dropping all temporary images
    Close(oneshot::Sender<()>),
}

impl fmt::Debug for EditorRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Edit(_) => f.write_str("Edit"),
            Self::InsertImage { name, bytes, .. } => f
                .debug_struct("InsertImage")
                .field("name", name)
                .field("len", &bytes.len())
                .finish(),
            Self::Snapshot(_) => f.write_str("Snapshot"),
            Self::Save { post, lang, .. } => f
                .debug_struct("Save")
                .field("post", post)
                .field("lang", lang)
                .finish(),
            Self::Close(_) => f.write_str("Close"),
        }
    }
}

/// What the save task hands back to the session
struct Saved {
    version: Version,
    result: Result<SaveReport, SaveError>,
    reply: oneshot::Sender<Result<SaveReport, SaveError>>,
}

/// A handle to a running session
#[derive(Debug, Clone)]
pub struct EditorHandle(mpsc::Sender<EditorRequest>);

impl EditorHandle {
    async fn send(&self, req: EditorRequest) -> Result<(), SessionClosed> {
        self.0.send(req).await.map_err(|_| SessionClosed)
    }

    /// Apply `f` to the live document
    pub async fn edit<F>(&self, f: F) -> Result<(), SessionClosed>
    where
        F: FnOnce(&mut Document) + Send + 'static,
    {
        self.send(EditorRequest::Edit(Box::new(f))).await
    }

    /// Insert an image, returning its temporary handle
    pub async fn insert_image(
        &self,
        name: impl Into<String>,
        bytes: impl Into<Bytes>,
        alt: Option<String>,
    ) -> Result<String, SessionClosed> {
        let (reply, rx) = oneshot::channel();
        self.send(EditorRequest::InsertImage {
            name: name.into(),
            bytes: bytes.into(),
            alt,
            reply,
        })
        .await?;
        rx.await.map_err(|_| SessionClosed)
    }

    pub async fn snapshot(&self) -> Result<Document, SessionClosed> {
        let (reply, rx) = oneshot::channel();
        self.send(EditorRequest::Snapshot(reply)).await?;
        rx.await.map_err(|_| SessionClosed)
    }

    /// Upload pending images and persist the document
    pub async fn save(
        &self,
        post: impl Into<String>,
        lang: Language,
    ) -> Result<SaveReport, SaveError> {
        let (reply, rx) = oneshot::channel();
        self.send(EditorRequest::Save {
            post: post.into(),
            lang,
            reply,
        })
        .await?;
        rx.await.map_err(|_| SessionClosed)?
    }

    /// End the session and wait until its temporary images are released
    pub async fn close(self) {
        let (reply, rx) = oneshot::channel();
        if self.send(EditorRequest::Close(reply)).await.is_ok() {
            let _ = rx.await;
        }
    }
}

pub struct EditorSession {
    doc: Document,
    versions: Counter<Version>,
    version: Version,
    registry: TempFileRegistry,
    scheduler: FrameScheduler,
    keys: KeyGenerator,
    settings: Settings,
    storage: Arc<dyn Storage>,
    store: Arc<dyn ContentStore>,
    saving: bool,
    saved_tx: mpsc::Sender<Saved>,
    saved_rx: mpsc::Receiver<Saved>,
}

impl fmt::Debug for EditorSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EditorSession")
            .field("version", &self.version)
            .field("registry", &self.registry)
            .field("settings", &self.settings)
            .field("saving", &self.saving)
            .finish()
    }
}

impl EditorSession {
    pub fn new(
        doc: Document,
        settings: Settings,
        storage: Arc<dyn Storage>,
        store: Arc<dyn ContentStore>,
    ) -> Self {
        let (saved_tx, saved_rx) = mpsc::channel(4);
        let mut versions = Counter::default();
        let version = versions.next();
        let mut scheduler = FrameScheduler::default();
        scheduler.request();
        Self {
            doc,
            versions,
            version,
            registry: TempFileRegistry::new(),
            scheduler,
            keys: KeyGenerator::new(),
            settings,
            storage,
            store,
            saving: false,
            saved_tx,
            saved_rx,
        }
    }

    /// Start a session on `doc`
    pub fn spawn(
        doc: Document,
        settings: Settings,
        storage: Arc<dyn Storage>,
        store: Arc<dyn ContentStore>,
    ) -> EditorHandle {
        Self::new(doc, settings, storage, store).start()
    }

    /// The registry, to subscribe to it or add files before the session starts
    pub fn registry_mut(&mut self) -> &mut TempFileRegistry {
        &mut self.registry
    }

    pub fn start(self) -> EditorHandle {
        let (req_tx, req_rx) = mpsc::channel(32);
        tokio::spawn(self.run(req_rx));
        EditorHandle(req_tx)
    }

    async fn run(mut self, mut req_rx: mpsc::Receiver<EditorRequest>) {
        let mut frames = time::interval(FRAME);
        loop {
            let state = tokio::select! {
                req = req_rx.recv() => match req {
                    Some(req) => self.handle_request(req),
                    None => LoopState::Break("all handles dropped"),
                },
                Some(saved) = self.saved_rx.recv() => {
                    self.finish_save(saved);
                    LoopState::Continue
                }
                _ = frames.tick() => {
                    self.direction_pass();
                    LoopState::Continue
                }
            };
            if let LoopState::Break(reason) = state {
                info!("Editor session ended: {}", reason);
                break;
            }
        }
    }

    fn bump(&mut self) {
        self.version = self.versions.next();
        self.scheduler.request();
    }

    fn direction_pass(&mut self) {
        if self.scheduler.take() {
            let tagged = direction::apply(self.doc.root_mut());
            if tagged > 0 {
                trace!("Retagged {} blocks at {}", tagged, self.version);
            }
        }
    }

    fn handle_request(&mut self, req: EditorRequest) -> LoopState<&'static str> {
        trace!("{:?}", req);
        match req {
            EditorRequest::Edit(f) => {
                f(&mut self.doc);
                self.bump();
            }
            EditorRequest::InsertImage {
                name,
                bytes,
                alt,
                reply,
            } => {
                let handle = self.registry.register(new_handle(), TempFile::new(name, bytes));
                let mut image = Node::image(handle.clone());
                if let (Some(alt), Some(attrs)) = (alt, image.attrs_mut()) {
                    attrs.set("alt", alt);
                }
                if let Some(root) = self.doc.root_mut().block_mut() {
                    root.content.get_or_insert_with(Vec::new).push(image);
                }
                self.bump();
                let _ = reply.send(handle);
            }
            EditorRequest::Snapshot(reply) => {
                self.direction_pass();
                let _ = reply.send(self.doc.clone());
            }
            EditorRequest::Save { post, lang, reply } => self.start_save(post, lang, reply),
            EditorRequest::Close(reply) => {
                self.registry.cleanup();
                let _ = reply.send(());
                return LoopState::Break("closed");
            }
        }
        LoopState::Continue
    }

    fn start_save(
        &mut self,
        post: String,
        lang: Language,
        reply: oneshot::Sender<Result<SaveReport, SaveError>>,
    ) {
        if self.saving {
            let _ = reply.send(Err(SaveError::Busy));
            return;
        }
        self.direction_pass();
        let plan = match Plan::prepare(&self.doc, &self.registry, &self.keys, &self.settings) {
            Ok(plan) => plan,
            Err(e) => {
                let _ = reply.send(Err(e.into()));
                return;
            }
        };
        self.saving = true;

        let version = self.version;
        let span = info_span!("save", post = %post, lang = %lang, version = %version);
        let storage = self.storage.clone();
        let store = self.store.clone();
        let settings = self.settings.clone();
        let saved_tx = self.saved_tx.clone();
        let task = async move {
            let result = save(plan, version, &post, lang, &*storage, &*store, &settings).await;
            let saved = Saved {
                version,
                result,
                reply,
            };
            if saved_tx.send(saved).await.is_err() {
                debug!("Session is gone, discarding save result");
            }
        };
        tokio::spawn(task.instrument(span));
    }

    fn finish_save(&mut self, saved: Saved) {
        self.saving = false;
        let Saved {
            version,
            result,
            reply,
        } = saved;
        if let Ok(report) = &result {
            let urls = report
                .uploads
                .iter()
                .map(|u| (u.handle.clone(), u.url.clone()))
                .collect();
            let rewritten = apply_rewrites(self.doc.root_mut(), &urls);
            for upload in &report.uploads {
                self.registry.remove(&upload.handle);
            }
            if rewritten > 0 {
                self.version = self.versions.next();
            }
            info!(
                "Saved {}, {} images uploaded, now at {}",
                version,
                report.uploads.len(),
                self.version
            );
        }
        let _ = reply.send(result);
    }
}

impl Drop for EditorSession {
    fn drop(&mut self) {
        if !self.registry.is_empty() {
            self.registry.cleanup();
        }
    }
}

async fn save(
    plan: Plan,
    version: Version,
    post: &str,
    lang: Language,
    storage: &dyn Storage,
    store: &dyn ContentStore,
    settings: &Settings,
) -> Result<SaveReport, SaveError> {
    let materialized = plan.execute(storage, &settings.bucket).await?;
    let previous = match store.load(post, lang).await {
        Ok(Some(json)) => Document::from_json(&json).ok(),
        Ok(None) => None,
        Err(e) => {
            warn!("Could not load previous version: {}", e);
            None
        }
    };

    // without the other language no key is known to be unused
    let other = lang.other();
    let others = match store.load(post, other).await {
        Ok(Some(json)) => match Document::from_json(&json) {
            Ok(doc) => Some(vec![doc]),
            Err(e) => {
                warn!("Could not read {} content, keeping old images: {}", other, e);
                None
            }
        },
        Ok(None) => Some(Vec::new()),
        Err(e) => {
            warn!("Could not load {} content, keeping old images: {}", other, e);
            None
        }
    };

    let json = materialized.doc.to_json()?;
    store.save(post, lang, json).await?;

    let pruned = match (&previous, others) {
        (Some(previous), Some(others)) => {
            let base = &settings.storage_base;
            let bucket = &settings.bucket;
            match prune::prune(storage, bucket, previous, &materialized.doc, &others, base).await {
                Ok(pruned) => pruned,
                Err(e) => {
                    warn!("Could not remove unused images: {}", e);
                    Vec::new()
                }
            }
        }
        _ => Vec::new(),
    };

    Ok(SaveReport {
        version,
        doc: materialized.doc,
        uploads: materialized.uploads,
        orphans: materialized.orphans,
        pruned,
    })
}
