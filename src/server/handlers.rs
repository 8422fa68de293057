//! HTTP request handlers.

use crate::error::{AppError, Result};
use crate::export::{self, ExportFormat, ExportJob};
use crate::library::{CatalogStats, Entry, Query};
use crate::server::AppState;
use axum::{
    Json,
    body::Body,
    extract::{Path, Query as QueryParams, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tokio_util::io::ReaderStream;

/// Listing responses are rebuilt on every rescan and must not be cached.
const NO_STORE: [(header::HeaderName, &str); 1] = [(header::CACHE_CONTROL, "no-store")];

fn not_found(number: u64) -> AppError {
    AppError::NotFound(format!("Manga not found: {}", number))
}

// ============================================================================
// CATALOG
// ============================================================================

/// Query parameters for the listing.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    /// Optional search query.
    pub q: Option<String>,
}

/// List all entries, or the ones matching `?q=`.
pub async fn list_manga(
    State(state): State<AppState>,
    QueryParams(params): QueryParams<ListQuery>,
) -> Response {
    let snapshot = state.store.snapshot();

    match params.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
        Some(q) => (NO_STORE, Json(Query::parse(q).apply(snapshot.entries()))).into_response(),
        None => (NO_STORE, Json(snapshot.entries())).into_response(),
    }
}

/// Single entry (JSON).
pub async fn get_manga(
    State(state): State<AppState>,
    Path(number): Path<u64>,
) -> Result<Json<Entry>> {
    state
        .store
        .get(number)
        .map(Json)
        .ok_or_else(|| not_found(number))
}

/// Page image, whatever its extension on disk.
pub async fn manga_page(
    State(state): State<AppState>,
    Path((number, page)): Path<(u64, u32)>,
) -> Result<Response<Body>> {
    if page == 0 {
        return Err(AppError::InvalidFormat("page numbers start at 1".to_string()));
    }

    let resolved = state
        .store
        .resolver()
        .resolve(number, page)
        .ok_or_else(|| AppError::NotFound(format!("Page not found: {}/{}", number, page)))?;

    let file = tokio::fs::File::open(&resolved.path).await?;
    let length = file.metadata().await?.len();
    let body = Body::from_stream(ReaderStream::new(file));

    Ok(Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, resolved.format.mime_type())
        .header(header::CONTENT_LENGTH, length)
        .header(header::CACHE_CONTROL, "public, max-age=86400")
        .body(body)
        .unwrap_or_else(|_| Response::default()))
}

// ============================================================================
// EXPORT
// ============================================================================

/// ZIP download of an entry.
pub async fn manga_archive(
    State(state): State<AppState>,
    Path(number): Path<u64>,
) -> Result<Response<Body>> {
    export_impl(state, number, ExportFormat::Zip).await
}

/// PDF download of an entry.
pub async fn manga_pdf(
    State(state): State<AppState>,
    Path(number): Path<u64>,
) -> Result<Response<Body>> {
    export_impl(state, number, ExportFormat::Pdf).await
}

/// Internal export implementation.
async fn export_impl(state: AppState, number: u64, format: ExportFormat) -> Result<Response<Body>> {
    let entry = state.store.get(number).ok_or_else(|| not_found(number))?;
    let resolver = state.store.resolver().clone();
    let exporter = export::get_exporter(format, &state.config.export);

    let data = tokio::task::spawn_blocking(move || {
        let job = ExportJob::resolve(&resolver, entry);
        exporter.export(&job)
    })
    .await??;

    let content_disposition = format!("attachment; filename=\"{}\"", format.file_name(number));

    Ok(Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, format.mime_type())
        .header(header::CONTENT_DISPOSITION, content_disposition)
        .header(header::CONTENT_LENGTH, data.len())
        .body(Body::from(data))
        .unwrap_or_else(|_| Response::default()))
}

// ============================================================================
// STATS API
// ============================================================================

/// Rescan response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RescanResponse {
    ok: bool,
    rebuilt: usize,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    ts: chrono::DateTime<chrono::Utc>,
    total_pages: u64,
    dir_size_bytes: u64,
    rejected: usize,
}

/// API: Rebuild the catalog.
pub async fn api_rescan(State(state): State<AppState>) -> Result<Json<RescanResponse>> {
    let snapshot = state.rebuild().await?;
    let stats = snapshot.stats();

    Ok(Json(RescanResponse {
        ok: true,
        rebuilt: stats.count,
        ts: stats.built_at,
        total_pages: stats.total_pages,
        dir_size_bytes: stats.total_bytes,
        rejected: snapshot.rejected().len(),
    }))
}

/// API: Get library statistics.
pub async fn api_stats(State(state): State<AppState>) -> impl IntoResponse {
    (NO_STORE, Json::<CatalogStats>(state.store.stats()))
}

/// API: Candidates left out of the current catalog, and why.
pub async fn api_rejected(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.store.snapshot();
    (NO_STORE, Json(snapshot.rejected().to_vec()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::tests::{write_page, write_valid_entry};
    use axum::body::to_bytes;
    use tokio_test::block_on;

    fn state_for(root: &std::path::Path) -> AppState {
        let mut config = Config::default();
        config.library.root = root.to_path_buf();
        AppState::from_config(config)
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_list_and_search() {
        let dir = tempfile::tempdir().unwrap();
        write_valid_entry(dir.path(), 1, 3);
        write_valid_entry(dir.path(), 2, 40);
        let state = state_for(dir.path());

        block_on(async {
            state.rebuild().await.unwrap();

            let response =
                list_manga(State(state.clone()), QueryParams(ListQuery::default())).await;
            assert_eq!(response.headers()[header::CACHE_CONTROL], "no-store");
            let json = body_json(response).await;
            assert_eq!(json.as_array().unwrap().len(), 2);
            assert_eq!(json[0]["number"], 1);
            assert_eq!(json[0]["title"], "Entry 1");

            let query = ListQuery {
                q: Some(">10".to_string()),
            };
            let json = body_json(list_manga(State(state), QueryParams(query)).await).await;
            assert_eq!(json.as_array().unwrap().len(), 1);
            assert_eq!(json[0]["number"], 2);
        });
    }

    #[test]
    fn test_get_manga_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_for(dir.path());

        block_on(async {
            let err = get_manga(State(state), Path(5)).await.unwrap_err();
            assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
        });
    }

    #[test]
    fn test_page_served_with_resolved_type() {
        let dir = tempfile::tempdir().unwrap();
        write_valid_entry(dir.path(), 3, 2);
        std::fs::remove_file(dir.path().join("3").join("2.jpg")).unwrap();
        write_page(dir.path(), 3, 2, "webp");
        let state = state_for(dir.path());

        block_on(async {
            let response = manga_page(State(state.clone()), Path((3, 2))).await.unwrap();
            assert_eq!(response.headers()[header::CONTENT_TYPE], "image/webp");
            let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
            assert_eq!(
                bytes.as_ref(),
                std::fs::read(dir.path().join("3").join("2.webp")).unwrap()
            );

            let err = manga_page(State(state.clone()), Path((3, 9))).await.unwrap_err();
            assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);

            let err = manga_page(State(state), Path((3, 0))).await.unwrap_err();
            assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
        });
    }

    #[test]
    fn test_archive_download_headers() {
        let dir = tempfile::tempdir().unwrap();
        write_valid_entry(dir.path(), 42, 2);
        let state = state_for(dir.path());

        block_on(async {
            state.rebuild().await.unwrap();
            let response = manga_archive(State(state), Path(42)).await.unwrap();
            assert_eq!(response.headers()[header::CONTENT_TYPE], "application/zip");
            assert_eq!(
                response.headers()[header::CONTENT_DISPOSITION],
                "attachment; filename=\"doujinshi_00042.zip\""
            );
        });
    }

    #[test]
    fn test_export_unknown_entry() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_for(dir.path());

        block_on(async {
            let err = manga_pdf(State(state), Path(1)).await.unwrap_err();
            assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
        });
    }

    #[test]
    fn test_rescan_and_stats() {
        let dir = tempfile::tempdir().unwrap();
        write_valid_entry(dir.path(), 1, 4);
        write_valid_entry(dir.path(), 7, 6);
        crate::tests::write_meta(dir.path(), 9, r#"{"pages": 0}"#);
        let state = state_for(dir.path());

        block_on(async {
            let Json(rescan) = api_rescan(State(state.clone())).await.unwrap();
            let json = serde_json::to_value(&rescan).unwrap();
            assert_eq!(json["ok"], true);
            assert_eq!(json["rebuilt"], 2);
            assert_eq!(json["totalPages"], 10);
            assert_eq!(json["rejected"], 1);
            assert!(json["dirSizeBytes"].as_u64().unwrap() > 0);

            let json = body_json(api_stats(State(state.clone())).await.into_response()).await;
            assert_eq!(json["mangaCount"], 2);
            assert_eq!(json["totalPages"], 10);
            assert_eq!(json["ts"], rescan.ts.timestamp_millis());

            let json = body_json(api_rejected(State(state)).await.into_response()).await;
            assert_eq!(json[0]["number"], 9);
            assert_eq!(json[0]["reason"], "empty");
        });
    }

    #[test]
    fn test_rescan_while_scanning_conflicts() {
        let dir = tempfile::tempdir().unwrap();
        write_valid_entry(dir.path(), 1, 1);
        let state = state_for(dir.path());

        block_on(async {
            let held = state.store.hold_scan();
            let err = api_rescan(State(state.clone())).await.unwrap_err();
            assert_eq!(err.into_response().status(), StatusCode::CONFLICT);
            assert!(state.store.list().is_empty());
            drop(held);

            let Json(rescan) = api_rescan(State(state.clone())).await.unwrap();
            assert_eq!(rescan.rebuilt, 1);
        });
    }

    #[test]
    fn test_overlapping_rescans_succeed_or_conflict() {
        let dir = tempfile::tempdir().unwrap();
        for id in 1..=50 {
            write_valid_entry(dir.path(), id, 3);
        }
        let state = state_for(dir.path());

        block_on(async {
            let mut handles = Vec::new();
            for _ in 0..8 {
                let state = state.clone();
                handles.push(tokio::spawn(async move { state.rebuild().await }));
            }
            for handle in handles {
                if let Err(e) = handle.await.unwrap() {
                    assert_eq!(e.into_response().status(), StatusCode::CONFLICT);
                }
            }
        });
        assert_eq!(state.store.list().len(), 50);
    }
}
