//! Warm index: every record of a collection held in memory, with exact
//! postcode-area filtering and cosine-similarity ranking done here rather than
//! by the vector store.
//!
//! Built once from a full paginated scan and read-only afterwards; a changed
//! source means building a new index. Embeddings are unit-normalised at load
//! (zero vectors are kept as-is), so ranking is a dot product.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{Local, NaiveDate};
use serde::Serialize;
use tracing::{debug, info};

use crate::collection::{Collection, CollectionError};
use crate::embedder::{EmbedError, Embedder};
use crate::lifetime::years_left;
use crate::postcode::{normalize_areas, normalize_prefix, postcode_area, postcode_prefix};
use crate::record::Metadata;
use crate::technology::Technology;

/// Records fetched per collection page while loading.
pub const DEFAULT_PAGE_SIZE: usize = 5000;
/// Results returned when the caller does not say otherwise.
pub const DEFAULT_TOP_K: usize = 200;

/// In-memory snapshot of a collection plus the embedder used for queries.
#[derive(Debug)]
pub struct WarmIndex<E> {
    ids: Vec<String>,
    /// Unit-normalised embeddings, aligned with `ids`.
    embeddings: Vec<Vec<f32>>,
    metadata: Vec<Metadata>,
    area_map: HashMap<String, Vec<usize>>,
    prefix_map: HashMap<String, Vec<usize>>,
    dimension: usize,
    embedder: E,
}

/// Parameters of one search. Build with [`SearchQuery::new`] and the setters.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchQuery {
    pub text: String,
    /// Postcode areas; authoritative when set and non-empty.
    pub areas: Option<Vec<String>>,
    /// Two-character prefixes; only consulted when `areas` is unset.
    pub prefixes: Option<Vec<String>>,
    pub technology: Option<String>,
    pub min_kw: Option<f64>,
    pub max_kw: Option<f64>,
    pub repowering_window: Option<Vec<String>>,
    pub min_years_left: Option<f64>,
    pub max_years_left: Option<f64>,
    pub top_k: usize,
    /// Reference date for years-left filters. Defaults to today.
    pub as_of: Option<NaiveDate>,
}

impl SearchQuery {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            areas: None,
            prefixes: None,
            technology: None,
            min_kw: None,
            max_kw: None,
            repowering_window: None,
            min_years_left: None,
            max_years_left: None,
            top_k: DEFAULT_TOP_K,
            as_of: None,
        }
    }

    pub fn areas<I, S>(mut self, areas: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.areas = Some(areas.into_iter().map(Into::into).collect());
        self
    }

    pub fn prefixes<I, S>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.prefixes = Some(prefixes.into_iter().map(Into::into).collect());
        self
    }

    pub fn technology(mut self, technology: impl Into<String>) -> Self {
        self.technology = Some(technology.into());
        self
    }

    pub fn min_kw(mut self, kw: f64) -> Self {
        self.min_kw = Some(kw);
        self
    }

    pub fn max_kw(mut self, kw: f64) -> Self {
        self.max_kw = Some(kw);
        self
    }

    pub fn repowering_window<I, S>(mut self, windows: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.repowering_window = Some(windows.into_iter().map(Into::into).collect());
        self
    }

    pub fn min_years_left(mut self, years: f64) -> Self {
        self.min_years_left = Some(years);
        self
    }

    pub fn max_years_left(mut self, years: f64) -> Self {
        self.max_years_left = Some(years);
        self
    }

    pub fn top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn as_of(mut self, date: NaiveDate) -> Self {
        self.as_of = Some(date);
        self
    }
}

/// One ranked result, borrowing from the index.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit<'a> {
    pub score: f32,
    pub id: &'a str,
    pub metadata: &'a Metadata,
}

impl<E: Embedder> WarmIndex<E> {
    /// Reads every page of `collection` (until an empty page) and builds the
    /// area and prefix maps. Any collection error aborts the load.
    pub async fn load<C>(collection: &C, embedder: E, page_size: usize) -> Result<Self, CollectionError>
    where
        C: Collection + ?Sized,
    {
        let page_size = page_size.max(1);
        let mut ids = Vec::new();
        let mut embeddings: Vec<Vec<f32>> = Vec::new();
        let mut metadata = Vec::new();
        let mut seen = HashSet::new();
        let mut dimension = None;

        loop {
            let page = collection.get(page_size, ids.len()).await?;
            if page.is_empty() {
                break;
            }
            page.validate()?;
            debug!(offset = ids.len(), records = page.ids.len(), "fetched page");
            for ((id, embedding), meta) in page.ids.into_iter().zip(page.embeddings).zip(page.metadatas) {
                let dim = *dimension.get_or_insert(embedding.len());
                if embedding.len() != dim {
                    return Err(CollectionError::Malformed(format!(
                        "record {id} has {} dimensions, expected {dim}",
                        embedding.len()
                    )));
                }
                if !seen.insert(id.clone()) {
                    return Err(CollectionError::Malformed(format!("duplicate record id {id}")));
                }
                ids.push(id);
                embeddings.push(normalize(&embedding));
                metadata.push(meta);
            }
        }

        let mut area_map: HashMap<String, Vec<usize>> = HashMap::new();
        let mut prefix_map: HashMap<String, Vec<usize>> = HashMap::new();
        for (pos, meta) in metadata.iter().enumerate() {
            if let Some(area) = postcode_area(meta) {
                area_map.entry(area).or_default().push(pos);
            }
            if let Some(prefix) = postcode_prefix(meta) {
                prefix_map.entry(prefix).or_default().push(pos);
            }
        }

        info!(
            records = ids.len(),
            areas = area_map.len(),
            prefixes = prefix_map.len(),
            "warm index loaded"
        );
        Ok(Self {
            ids,
            embeddings,
            metadata,
            area_map,
            prefix_map,
            dimension: dimension.unwrap_or(0),
            embedder,
        })
    }

    /// Embeds `query.text` and ranks the index against it.
    ///
    /// An empty result is a normal outcome (nothing in the requested areas, or
    /// everything filtered out). Errors mean bad input or a failed embed call.
    pub async fn search(&self, query: &SearchQuery) -> Result<Vec<SearchHit<'_>>, SearchError> {
        if query.text.trim().is_empty() {
            return Err(SearchError::EmptyQuery);
        }
        if query.top_k == 0 {
            return Err(SearchError::InvalidTopK);
        }
        let mut vectors = self.embedder.encode(&[query.text.clone()]).await?;
        if vectors.is_empty() {
            return Err(EmbedError::Count { expected: 1, got: 0 }.into());
        }
        let query_vector = vectors.swap_remove(0);
        self.search_vector(&query_vector, query)
    }

    pub fn embedder(&self) -> &E {
        &self.embedder
    }
}

impl<E> WarmIndex<E> {
    /// Ranks against an already-embedded query; `query.text` is not used.
    pub fn search_vector(&self, query_vector: &[f32], query: &SearchQuery) -> Result<Vec<SearchHit<'_>>, SearchError> {
        if query.top_k == 0 {
            return Err(SearchError::InvalidTopK);
        }
        if !self.is_empty() && query_vector.len() != self.dimension {
            return Err(SearchError::DimensionMismatch {
                expected: self.dimension,
                got: query_vector.len(),
            });
        }
        let Some(candidates) = self.candidates(query) else {
            debug!("no records in requested areas/prefixes");
            return Ok(Vec::new());
        };
        let filter = RecordFilter::new(query);
        if filter.rejects_all() {
            return Ok(Vec::new());
        }

        let q = normalize(query_vector);
        let mut scored: Vec<(usize, f32)> = candidates
            .iter()
            .map(|&pos| (pos, dot(&q, &self.embeddings[pos])))
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));

        let hits: Vec<SearchHit<'_>> = scored
            .into_iter()
            .filter(|&(pos, _)| filter.accepts(&self.metadata[pos]))
            .take(query.top_k)
            .map(|(pos, score)| SearchHit {
                score,
                id: &self.ids[pos],
                metadata: &self.metadata[pos],
            })
            .collect();
        debug!(candidates = candidates.len(), hits = hits.len(), "search done");
        Ok(hits)
    }

    /// Candidate positions in load order. `None` when a geographic filter was
    /// requested and nothing matches it.
    fn candidates(&self, query: &SearchQuery) -> Option<Vec<usize>> {
        let (map, keys) = match (&query.areas, &query.prefixes) {
            (Some(areas), _) if !areas.is_empty() => (&self.area_map, normalize_areas(areas)),
            (_, Some(prefixes)) if !prefixes.is_empty() => {
                let mut keys: Vec<String> = prefixes.iter().map(|p| normalize_prefix(p)).collect();
                keys.retain(|k| !k.is_empty());
                (&self.prefix_map, keys)
            }
            _ => return Some((0..self.ids.len()).collect()),
        };
        let mut positions: Vec<usize> = keys
            .iter()
            .filter_map(|k| map.get(k))
            .flatten()
            .copied()
            .collect();
        if positions.is_empty() {
            return None;
        }
        positions.sort_unstable();
        positions.dedup();
        Some(positions)
    }

    /// Number of loaded records.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Embedding length, 0 for an empty index.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn metadata(&self, pos: usize) -> Option<&Metadata> {
        self.metadata.get(pos)
    }

    /// Record positions for an exact postcode area.
    pub fn records_in_area(&self, area: &str) -> &[usize] {
        self.area_map
            .get(&area.trim().to_uppercase())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Record count per postcode area, sorted by area.
    pub fn area_counts(&self) -> BTreeMap<&str, usize> {
        self.area_map
            .iter()
            .map(|(area, positions)| (area.as_str(), positions.len()))
            .collect()
    }

    /// Records with no derivable postcode area.
    pub fn unlocated(&self) -> usize {
        self.ids.len() - self.area_map.values().map(Vec::len).sum::<usize>()
    }
}

/// Metadata filters of a query, resolved once per search.
struct RecordFilter {
    /// `Some(None)`: a technology was asked for but is not a known one.
    technology: Option<Option<Technology>>,
    min_kw: Option<f64>,
    max_kw: Option<f64>,
    windows: Option<Vec<String>>,
    min_years: Option<f64>,
    max_years: Option<f64>,
    as_of: NaiveDate,
}

impl RecordFilter {
    fn new(query: &SearchQuery) -> Self {
        let windows = query
            .repowering_window
            .as_ref()
            .map(|ws| {
                ws.iter()
                    .map(|w| w.trim().to_uppercase())
                    .filter(|w| !w.is_empty())
                    .collect::<Vec<_>>()
            })
            .filter(|ws| !ws.is_empty());
        Self {
            technology: query.technology.as_deref().map(Technology::canonicalize),
            min_kw: query.min_kw,
            max_kw: query.max_kw,
            windows,
            min_years: query.min_years_left,
            max_years: query.max_years_left,
            as_of: query.as_of.unwrap_or_else(|| Local::now().date_naive()),
        }
    }

    fn rejects_all(&self) -> bool {
        matches!(self.technology, Some(None))
    }

    fn accepts(&self, meta: &Metadata) -> bool {
        if let Some(wanted) = self.technology {
            let have = meta.technology.as_deref().and_then(Technology::canonicalize);
            if wanted.is_none() || have != wanted {
                return false;
            }
        }
        if self.min_kw.is_some() || self.max_kw.is_some() {
            match meta.capacity_kw() {
                Some(kw) if within(kw, self.min_kw, self.max_kw) => {}
                _ => return false,
            }
        }
        if let Some(windows) = &self.windows {
            let have = meta.repowering_window.as_deref().map(|w| w.trim().to_uppercase());
            if !have.map_or(false, |w| windows.contains(&w)) {
                return false;
            }
        }
        if self.min_years.is_some() || self.max_years.is_some() {
            match years_left(meta, self.as_of) {
                Some(years) if within(years, self.min_years, self.max_years) => {}
                _ => return false,
            }
        }
        true
    }
}

/// Inclusive bounds check; a NaN bound or value never passes.
fn within(value: f64, min: Option<f64>, max: Option<f64>) -> bool {
    min.map_or(true, |m| value >= m) && max.map_or(true, |m| value <= m)
}

fn normalize(v: &[f32]) -> Vec<f32> {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm <= 0.0 {
        return v.to_vec();
    }
    v.iter().map(|x| x / norm).collect()
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    let n = a.len().min(b.len());
    (0..n).map(|i| a[i] * b[i]).sum()
}

#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("query text is empty")]
    EmptyQuery,
    #[error("top_k must be at least 1")]
    InvalidTopK,
    #[error("query embedding has {got} dimensions, index has {expected}")]
    DimensionMismatch { expected: usize, got: usize },
    #[error(transparent)]
    Embed(#[from] EmbedError),
}
