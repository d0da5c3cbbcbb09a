//! Sources the warm index is loaded from. A collection hands out pages of
//! parallel `ids` / `embeddings` / `metadatas`; an empty page ends the scan.
//!
//! - [`MemoryCollection`]: records already in memory (tests, JSONL).
//! - [`JsonlCollection`]: one `.jsonl` file, or every `.jsonl` under a directory.
//! - [`ChromaCollection`]: a ChromaDB collection over its REST API.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;
use url::Url;
use walkdir::WalkDir;

use crate::record::{Metadata, Record};

/// One page of a paginated collection read.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub ids: Vec<String>,
    pub embeddings: Vec<Vec<f32>>,
    pub metadatas: Vec<Metadata>,
}

impl Page {
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Checks the three arrays line up.
    pub fn validate(&self) -> Result<(), CollectionError> {
        if self.embeddings.len() != self.ids.len() || self.metadatas.len() != self.ids.len() {
            return Err(CollectionError::Malformed(format!(
                "page arrays differ in length: {} ids, {} embeddings, {} metadatas",
                self.ids.len(),
                self.embeddings.len(),
                self.metadatas.len()
            )));
        }
        Ok(())
    }
}

/// Paginated read access to a vector collection.
#[async_trait]
pub trait Collection: Send + Sync {
    /// Returns up to `limit` records starting at `offset`.
    async fn get(&self, limit: usize, offset: usize) -> Result<Page, CollectionError>;
}

/// Records held in memory, paged by slicing.
#[derive(Debug, Clone, Default)]
pub struct MemoryCollection {
    records: Vec<Record>,
}

impl MemoryCollection {
    pub fn new(records: Vec<Record>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl Collection for MemoryCollection {
    async fn get(&self, limit: usize, offset: usize) -> Result<Page, CollectionError> {
        let start = offset.min(self.records.len());
        let end = start.saturating_add(limit).min(self.records.len());
        let mut page = Page::default();
        for r in &self.records[start..end] {
            page.ids.push(r.id.clone());
            page.embeddings.push(r.embedding.clone());
            page.metadatas.push(r.metadata.clone());
        }
        Ok(page)
    }
}

/// Records read from JSON Lines: one `{"id", "embedding", "metadata"}` object
/// per line. Blank lines are skipped; any other bad line fails the open.
#[derive(Debug, Clone)]
pub struct JsonlCollection {
    root: PathBuf,
    files: Vec<PathBuf>,
    records: MemoryCollection,
}

impl JsonlCollection {
    /// Reads `path`, which is either a `.jsonl` file or a directory scanned
    /// (recursively, hidden entries skipped, sorted by name) for `.jsonl` files.
    pub fn open(path: &Path) -> Result<Self, CollectionError> {
        let files = jsonl_files(path)?;
        let mut records = Vec::new();
        for file in &files {
            let raw = std::fs::read_to_string(file)
                .map_err(|e| CollectionError::Read(file.clone(), e))?;
            let before = records.len();
            for (n, line) in raw.lines().enumerate() {
                if line.trim().is_empty() {
                    continue;
                }
                let record: Record = serde_json::from_str(line).map_err(|e| CollectionError::Parse {
                    file: file.clone(),
                    line: n + 1,
                    source: e,
                })?;
                records.push(record);
            }
            debug!(file = %file.display(), records = records.len() - before, "read jsonl file");
        }
        Ok(Self {
            root: path.to_path_buf(),
            files,
            records: MemoryCollection::new(records),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Files the records were read from, in load order.
    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl Collection for JsonlCollection {
    async fn get(&self, limit: usize, offset: usize) -> Result<Page, CollectionError> {
        self.records.get(limit, offset).await
    }
}

fn jsonl_files(path: &Path) -> Result<Vec<PathBuf>, CollectionError> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }
    if !path.is_dir() {
        return Err(CollectionError::NotFound(path.to_path_buf()));
    }
    let mut files = Vec::new();
    for entry in WalkDir::new(path)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !is_hidden(e))
    {
        let entry = entry.map_err(|e| CollectionError::Walk(e.to_string()))?;
        let p = entry.path();
        if p.extension().map_or(false, |e| e == "jsonl") && p.is_file() {
            files.push(p.to_path_buf());
        }
    }
    Ok(files)
}

fn is_hidden(entry: &walkdir::DirEntry) -> bool {
    entry
        .file_name()
        .to_str()
        .map(|s| s.starts_with('.'))
        .unwrap_or(false)
}

/// A ChromaDB collection read over the v1 REST API.
#[derive(Debug, Clone)]
pub struct ChromaCollection {
    http: reqwest::Client,
    base: Url,
    name: String,
    id: String,
}

#[derive(Debug, Deserialize)]
struct ChromaCollectionInfo {
    id: String,
}

#[derive(Debug, Serialize)]
struct ChromaGetRequest<'a> {
    limit: usize,
    offset: usize,
    include: [&'a str; 2],
}

#[derive(Debug, Deserialize)]
struct ChromaGetResponse {
    ids: Vec<String>,
    #[serde(default)]
    embeddings: Option<Vec<Vec<f32>>>,
    #[serde(default)]
    metadatas: Option<Vec<Option<Metadata>>>,
}

impl ChromaCollection {
    /// Resolves the collection `name` on the server at `base_url`.
    pub async fn connect(base_url: &str, name: &str) -> Result<Self, CollectionError> {
        let mut base = Url::parse(base_url).map_err(CollectionError::Url)?;
        if !base.path().ends_with('/') {
            let dir = format!("{}/", base.path());
            base.set_path(&dir);
        }
        let http = reqwest::Client::new();
        let url = base
            .join(&format!("api/v1/collections/{name}"))
            .map_err(CollectionError::Url)?;
        let info: ChromaCollectionInfo = http
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        debug!(collection = name, id = %info.id, "resolved chroma collection");
        Ok(Self {
            http,
            base,
            name: name.to_string(),
            id: info.id,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

#[async_trait]
impl Collection for ChromaCollection {
    async fn get(&self, limit: usize, offset: usize) -> Result<Page, CollectionError> {
        let url = self
            .base
            .join(&format!("api/v1/collections/{}/get", self.id))
            .map_err(CollectionError::Url)?;
        let res: ChromaGetResponse = self
            .http
            .post(url)
            .json(&ChromaGetRequest {
                limit,
                offset,
                include: ["embeddings", "metadatas"],
            })
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let n = res.ids.len();
        let embeddings = match res.embeddings {
            Some(e) => e,
            None if n == 0 => Vec::new(),
            None => {
                return Err(CollectionError::Malformed(
                    "chroma returned records without embeddings".to_string(),
                ))
            }
        };
        let metadatas = res
            .metadatas
            .unwrap_or_else(|| vec![None; n])
            .into_iter()
            .map(Option::unwrap_or_default)
            .collect();
        let page = Page {
            ids: res.ids,
            embeddings,
            metadatas,
        };
        page.validate()?;
        Ok(page)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CollectionError {
    #[error("collection source not found: {0}")]
    NotFound(PathBuf),
    #[error("walk error: {0}")]
    Walk(String),
    #[error("read error for {0}: {1}")]
    Read(PathBuf, std::io::Error),
    #[error("bad record in {}:{line}: {source}", .file.display())]
    Parse {
        file: PathBuf,
        line: usize,
        source: serde_json::Error,
    },
    #[error("invalid collection URL: {0}")]
    Url(url::ParseError),
    #[error("collection request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("malformed collection: {0}")]
    Malformed(String),
}

#[cfg(test)]
mod tests {
    use std::fs;

    use serde_json::json;
    use tempfile::TempDir;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn record(id: &str) -> Record {
        Record {
            id: id.to_string(),
            embedding: vec![1.0, 0.0],
            metadata: Metadata::default(),
        }
    }

    #[tokio::test]
    async fn memory_pages_until_empty() {
        let c = MemoryCollection::new(vec![record("a"), record("b"), record("c")]);
        assert_eq!(c.get(2, 0).await.unwrap().ids, vec!["a", "b"]);
        assert_eq!(c.get(2, 2).await.unwrap().ids, vec!["c"]);
        assert!(c.get(2, 4).await.unwrap().is_empty());
    }

    #[test]
    fn validate_rejects_misaligned_page() {
        let page = Page {
            ids: vec!["a".into()],
            embeddings: vec![],
            metadatas: vec![Metadata::default()],
        };
        assert!(matches!(page.validate(), Err(CollectionError::Malformed(_))));
    }

    #[tokio::test]
    async fn jsonl_directory_is_read_in_name_order() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("b.jsonl"),
            "{\"id\": \"b1\", \"embedding\": [0.0, 1.0], \"metadata\": {\"postcode\": \"ML1 1AA\"}}\n",
        )
        .unwrap();
        fs::write(
            dir.path().join("a.jsonl"),
            "{\"id\": \"a1\", \"embedding\": [1.0, 0.0]}\n\n{\"id\": \"a2\", \"embedding\": [1.0, 1.0]}\n",
        )
        .unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();
        fs::create_dir(dir.path().join(".hidden")).unwrap();
        fs::write(dir.path().join(".hidden").join("c.jsonl"), "not json").unwrap();

        let c = JsonlCollection::open(dir.path()).unwrap();
        assert_eq!(c.len(), 3);
        assert_eq!(c.files().len(), 2);
        let page = c.get(10, 0).await.unwrap();
        assert_eq!(page.ids, vec!["a1", "a2", "b1"]);
        assert_eq!(page.metadatas[2].postcode.as_deref(), Some("ML1 1AA"));
    }

    #[test]
    fn jsonl_bad_line_reports_position() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("fit.jsonl");
        fs::write(&file, "{\"id\": \"a\", \"embedding\": []}\n{oops\n").unwrap();
        match JsonlCollection::open(&file) {
            Err(CollectionError::Parse { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn jsonl_missing_path() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            JsonlCollection::open(&dir.path().join("nope")),
            Err(CollectionError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn chroma_resolves_and_pages() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/collections/fit"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "c-1", "name": "fit"})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/v1/collections/c-1/get"))
            .and(body_json(json!({"limit": 2, "offset": 0, "include": ["embeddings", "metadatas"]})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ids": ["a", "b"],
                "embeddings": [[1.0, 0.0], [0.0, 1.0]],
                "metadatas": [{"postcode": "M1 1AA", "capacity_kw": 4.0}, null],
                "documents": null
            })))
            .mount(&server)
            .await;

        let c = ChromaCollection::connect(&server.uri(), "fit").await.unwrap();
        assert_eq!(c.id(), "c-1");
        let page = c.get(2, 0).await.unwrap();
        assert_eq!(page.ids, vec!["a", "b"]);
        assert_eq!(page.metadatas[0].capacity_kw(), Some(4.0));
        assert_eq!(page.metadatas[1], Metadata::default());
    }

    #[tokio::test]
    async fn chroma_unreachable_collection_fails() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/collections/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        assert!(matches!(
            ChromaCollection::connect(&server.uri(), "missing").await,
            Err(CollectionError::Http(_))
        ));
    }
}
