//! Work list construction.
//!
//! The query list is a header-less CSV of `category,query,pages` rows.
//! Every row expands into one [`FetchTask`] per result page; the full list
//! is then shuffled and capped so that consecutive runs spread their
//! request budget over different queries.

use std::io::Read;
use std::path::Path;

use koopi_offer_models::{FetchTask, QueryRow, SiteConfig};
use rand::Rng;
use rand::seq::SliceRandom as _;

use crate::CrawlError;

/// Reads and validates the query list at `path`.
///
/// # Errors
///
/// Returns [`CrawlError::Input`] if the file cannot be read and
/// [`CrawlError::MalformedRow`] for a row with fewer than three columns or
/// a non-numeric page count.
pub fn read_query_rows(path: &Path) -> Result<Vec<QueryRow>, CrawlError> {
    let file = std::fs::File::open(path).map_err(|e| CrawlError::Input {
        path: path.to_path_buf(),
        source: e.into(),
    })?;
    parse_query_rows(file).map_err(|e| match e {
        CrawlError::Input { source, .. } => CrawlError::Input {
            path: path.to_path_buf(),
            source,
        },
        other => other,
    })
}

/// Parses query list rows from any reader.
///
/// # Errors
///
/// See [`read_query_rows`].
pub fn parse_query_rows<R: Read>(reader: R) -> Result<Vec<QueryRow>, CrawlError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut rows = Vec::new();
    for record in csv_reader.records() {
        let record = record.map_err(|source| CrawlError::Input {
            path: "<input>".into(),
            source,
        })?;
        let line = record.position().map_or(0, csv::Position::line);

        let (Some(category), Some(query), Some(pages)) =
            (record.get(0), record.get(1), record.get(2))
        else {
            return Err(CrawlError::MalformedRow {
                line,
                reason: format!("expected 3 columns, found {}", record.len()),
            });
        };

        let pages = pages.parse::<u32>().map_err(|e| CrawlError::MalformedRow {
            line,
            reason: format!("page count '{pages}' is not a number: {e}"),
        })?;

        rows.push(QueryRow {
            category: category.to_owned(),
            query: query.to_owned(),
            pages,
        });
    }

    Ok(rows)
}

/// File name of the cached copy of `query`'s result page `page`.
///
/// Spaces become hyphens; path separators are replaced too so a query can
/// never address a file outside the cache directory.
#[must_use]
pub fn cache_key(query: &str, page: u32) -> String {
    let slug: String = query
        .chars()
        .map(|c| match c {
            ' ' | '/' | '\\' => '-',
            c => c,
        })
        .collect();
    format!("{slug}-{page}.html")
}

/// Absolute URL of `query`'s result page `page`.
#[must_use]
pub fn page_url(site: &SiteConfig, query: &str, page: u32) -> String {
    let escaped: String = url::form_urlencoded::byte_serialize(query.as_bytes()).collect();
    if page >= 2 {
        format!("{}{escaped}{}{page}", site.search_url, site.page_param)
    } else {
        format!("{}{escaped}", site.search_url)
    }
}

/// Expands every row into one task per page, in input order.
#[must_use]
pub fn build_tasks(rows: &[QueryRow], site: &SiteConfig) -> Vec<FetchTask> {
    rows.iter()
        .flat_map(|row| {
            (1..=row.pages).map(move |page| FetchTask {
                url: page_url(site, &row.query, page),
                cache_key: cache_key(&row.query, page),
                category: row.category.clone(),
                query: row.query.clone(),
            })
        })
        .collect()
}

/// Uniformly shuffles `tasks` and keeps at most `max` of them.
#[must_use]
pub fn shuffle_and_cap(tasks: Vec<FetchTask>, max: usize) -> Vec<FetchTask> {
    shuffle_and_cap_with(tasks, max, &mut rand::rng())
}

/// [`shuffle_and_cap`] with an explicit random source.
#[must_use]
pub fn shuffle_and_cap_with<R: Rng + ?Sized>(
    mut tasks: Vec<FetchTask>,
    max: usize,
    rng: &mut R,
) -> Vec<FetchTask> {
    tasks.shuffle(rng);
    tasks.truncate(max);
    tasks
}
