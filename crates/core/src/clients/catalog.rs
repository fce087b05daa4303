use std::{
    collections::{BTreeSet, HashMap},
    sync::Arc,
};

use async_trait::async_trait;
use futures::{
    future::{BoxFuture, Shared},
    FutureExt,
};
use parking_lot::Mutex;
use serde::Deserialize;
use tracing::{info, warn};

use super::{fetch_json, CatalogSource};
use crate::{error::ClientError, models::WebTableId};

/// A downloadable file attached to a catalog entry.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogFile {
    /// File id.
    #[serde(default)]
    pub id: Option<String>,
    /// Last update, epoch milliseconds.
    #[serde(default)]
    pub updated_at: Option<i64>,
    /// Preview image.
    #[serde(default)]
    pub img_url: Option<String>,
    /// Authors.
    #[serde(default)]
    pub authors: Vec<String>,
    /// Feature tags.
    #[serde(default)]
    pub features: Vec<String>,
}

/// A table design in the community catalog.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    /// Design id; the same value cabinet tables carry as their web id.
    pub id: WebTableId,
    /// Game name.
    pub name: String,
    /// Manufacturer.
    #[serde(default)]
    pub manufacturer: Option<String>,
    /// Release year.
    #[serde(default)]
    pub year: Option<i32>,
    /// Theme tags.
    #[serde(default)]
    pub theme: BTreeSet<String>,
    /// Designers.
    #[serde(default)]
    pub designers: BTreeSet<String>,
    /// Feature tags.
    #[serde(default)]
    pub features: BTreeSet<String>,
    /// Table builds.
    #[serde(default)]
    pub table_files: Vec<CatalogFile>,
    /// Backglass builds.
    #[serde(default)]
    pub b2s_files: Vec<CatalogFile>,
}

impl CatalogEntry {
    /// `"name (manufacturer year)"` when both are known, otherwise the name.
    pub fn title(&self) -> String {
        match (&self.manufacturer, self.year) {
            (Some(manufacturer), Some(year)) => format!("{} ({manufacturer} {year})", self.name),
            _ => self.name.clone(),
        }
    }

    /// Preview image of the table build.
    pub fn table_url(&self) -> Option<&str> {
        first_image(&self.table_files)
    }

    /// Preview image of the backglass build.
    pub fn backglass_url(&self) -> Option<&str> {
        first_image(&self.b2s_files)
    }
}

fn first_image(files: &[CatalogFile]) -> Option<&str> {
    let mut files = files.iter().collect::<Vec<_>>();
    files.sort_by_key(|file| file.updated_at.unwrap_or(0));
    files.into_iter().find_map(|file| file.img_url.as_deref())
}

/// Fetches the catalog dump over HTTP.
#[derive(Debug, Clone)]
pub struct HttpCatalog {
    http: reqwest::Client,
    url: String,
}

impl HttpCatalog {
    /// Source reading the JSON dump at `url`.
    pub fn new(http: reqwest::Client, url: impl Into<String>) -> Self {
        Self {
            http,
            url: url.into(),
        }
    }
}

#[async_trait]
impl CatalogSource for HttpCatalog {
    async fn entries(&self) -> Result<Vec<CatalogEntry>, ClientError> {
        fetch_json(&self.http, &self.url).await
    }
}

type Contents = Arc<HashMap<WebTableId, CatalogEntry>>;
type LoadFuture = Shared<BoxFuture<'static, Result<Contents, Arc<ClientError>>>>;

enum State {
    Idle,
    Loading(LoadFuture),
    Loaded(Contents),
}

enum Step {
    Ready(Contents),
    Wait(LoadFuture),
}

/// Catalog contents, downloaded once on first use and shared by every caller.
pub struct TableCatalog<S> {
    source: Arc<S>,
    state: Mutex<State>,
}

impl<S: CatalogSource + 'static> TableCatalog<S> {
    /// Catalog backed by `source`; nothing is fetched until first use.
    pub fn new(source: S) -> Self {
        Self {
            source: Arc::new(source),
            state: Mutex::new(State::Idle),
        }
    }

    /// Make sure the contents are loaded.
    pub async fn load(&self) -> Result<(), ClientError> {
        self.contents().await.map(|_| ())
    }

    /// Entries whose name contains `text`, ignoring case, sorted by name.
    pub async fn find(&self, text: &str) -> Result<Vec<CatalogEntry>, ClientError> {
        let needle = text.to_lowercase();
        let contents = self.contents().await?;
        let mut found = contents
            .values()
            .filter(|entry| entry.name.to_lowercase().contains(&needle))
            .cloned()
            .collect::<Vec<_>>();
        found.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        Ok(found)
    }

    /// Entry with the given id.
    pub async fn find_id(&self, id: &WebTableId) -> Result<Option<CatalogEntry>, ClientError> {
        Ok(self.contents().await?.get(id).cloned())
    }

    async fn contents(&self) -> Result<Contents, ClientError> {
        let future = match self.step() {
            Step::Ready(contents) => return Ok(contents),
            Step::Wait(future) => future,
        };

        let result = future.clone().await;
        self.settle(&future, &result);
        result.map_err(ClientError::Shared)
    }

    /// Record the outcome of `future`. A failure only clears the state while
    /// `future` is still the load in flight, so a retry started in the
    /// meantime is left alone.
    fn settle(&self, future: &LoadFuture, result: &Result<Contents, Arc<ClientError>>) {
        let mut state = self.state.lock();
        match result {
            Ok(contents) => *state = State::Loaded(contents.clone()),
            Err(err) => {
                if matches!(&*state, State::Loading(current) if current.ptr_eq(future)) {
                    *state = State::Idle;
                }
                warn!("catalog load failed: {err}");
            }
        }
    }

    fn step(&self) -> Step {
        let mut state = self.state.lock();
        match &*state {
            State::Loaded(contents) => Step::Ready(contents.clone()),
            State::Loading(future) => Step::Wait(future.clone()),
            State::Idle => {
                let source = self.source.clone();
                let future = async move {
                    let entries = source.entries().await.map_err(Arc::new)?;
                    info!("loaded {} catalog entries", entries.len());
                    let contents = entries
                        .into_iter()
                        .map(|entry| (entry.id.clone(), entry))
                        .collect::<HashMap<_, _>>();
                    Ok::<_, Arc<ClientError>>(Arc::new(contents))
                }
                .boxed()
                .shared();
                *state = State::Loading(future.clone());
                Step::Wait(future)
            }
        }
    }
}
