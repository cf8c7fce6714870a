//! Axum JSON surface for the FOAM dashboard pages.

use std::sync::Arc;

use axum::{
    extract::{Path as AxumPath, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use foam_analytics::{build_page_view, page_facet_panels, AnalyticsError, RawSelections};
use foam_core::{Datasets, FacetOrder, Page};
use foam_data::{load_datasets, load_facet_order, DataConfig};
use serde::Serialize;
use tokio::net::TcpListener;
use tracing::{info, warn};

pub const CRATE_NAME: &str = "foam-web";

#[derive(Debug, Clone)]
pub enum DataState {
    Loaded(Arc<Datasets>),
    /// Start-up load failed on a missing input; pages answer with this warning.
    Unavailable(String),
}

#[derive(Debug, Clone)]
pub struct AppState {
    pub data: DataState,
    pub facet_order: FacetOrder,
}

impl AppState {
    pub fn new(datasets: Datasets, facet_order: FacetOrder) -> Self {
        Self {
            data: DataState::Loaded(Arc::new(datasets)),
            facet_order,
        }
    }

    pub fn unavailable(warning: impl Into<String>) -> Self {
        Self {
            data: DataState::Unavailable(warning.into()),
            facet_order: FacetOrder::default(),
        }
    }

    /// Load both tables once. Missing files degrade to a warning state; any
    /// other load failure is an error.
    pub fn from_config(config: &DataConfig) -> anyhow::Result<Self> {
        let facet_order = load_facet_order(config)?;
        match load_datasets(config) {
            Ok(datasets) => {
                info!(
                    opportunities = datasets.opportunities.len(),
                    awards = datasets.awards.len(),
                    "datasets loaded"
                );
                Ok(Self::new(datasets, facet_order))
            }
            Err(err) if err.is_missing_input() => {
                warn!(error = %err, "datasets unavailable");
                Ok(Self {
                    data: DataState::Unavailable(err.to_string()),
                    facet_order,
                })
            }
            Err(err) => Err(err.into()),
        }
    }
}

#[derive(Debug, Serialize)]
struct PageLink {
    slug: &'static str,
    title: &'static str,
}

#[derive(Debug, Serialize)]
struct IndexBody {
    pages: Vec<PageLink>,
    opportunities: Option<usize>,
    awards: Option<usize>,
    warning: Option<String>,
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/pages/{page}", get(page_handler))
        .route("/pages/{page}/facets", get(facets_handler))
        .with_state(Arc::new(state))
}

pub async fn serve_from_env() -> anyhow::Result<()> {
    let port: u16 = std::env::var("FOAM_WEB_PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(8000);
    let state = AppState::from_config(&DataConfig::from_env())?;
    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    info!(port, "serving dashboard");
    axum::serve(listener, app(state)).await?;
    Ok(())
}

async fn index_handler(State(state): State<Arc<AppState>>) -> Response {
    let pages = Page::ALL
        .into_iter()
        .map(|p| PageLink {
            slug: p.slug(),
            title: p.title(),
        })
        .collect();
    let body = match &state.data {
        DataState::Loaded(data) => IndexBody {
            pages,
            opportunities: Some(data.opportunities.len()),
            awards: Some(data.awards.len()),
            warning: None,
        },
        DataState::Unavailable(warning) => IndexBody {
            pages,
            opportunities: None,
            awards: None,
            warning: Some(warning.clone()),
        },
    };
    Json(body).into_response()
}

async fn page_handler(
    State(state): State<Arc<AppState>>,
    AxumPath(page): AxumPath<String>,
    Query(params): Query<Vec<(String, String)>>,
) -> Response {
    let (page, datasets) = match resolve_request(&state, &page) {
        Ok(resolved) => resolved,
        Err(resp) => return resp,
    };
    match build_page_view(page, &datasets, &selections_from_query(params)) {
        Ok(view) => Json(view).into_response(),
        Err(err) => analytics_error(err),
    }
}

async fn facets_handler(
    State(state): State<Arc<AppState>>,
    AxumPath(page): AxumPath<String>,
    Query(params): Query<Vec<(String, String)>>,
) -> Response {
    let (page, datasets) = match resolve_request(&state, &page) {
        Ok(resolved) => resolved,
        Err(resp) => return resp,
    };
    match page_facet_panels(
        page,
        &datasets,
        &state.facet_order,
        &selections_from_query(params),
    ) {
        Ok(panels) => Json(panels).into_response(),
        Err(err) => analytics_error(err),
    }
}

fn resolve_request(state: &AppState, slug: &str) -> Result<(Page, Arc<Datasets>), Response> {
    let page = slug
        .parse::<Page>()
        .map_err(|err| json_error(StatusCode::NOT_FOUND, err.to_string()))?;
    match &state.data {
        DataState::Loaded(data) => Ok((page, Arc::clone(data))),
        DataState::Unavailable(warning) => Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(serde_json::json!({ "warning": warning })),
        )
            .into_response()),
    }
}

/// Repeated `facet=value` pairs; blank values select nothing.
fn selections_from_query(params: Vec<(String, String)>) -> RawSelections {
    let mut raw = RawSelections::new();
    for (key, value) in params {
        if value.trim().is_empty() {
            continue;
        }
        raw.entry(key).or_default().insert(value);
    }
    raw
}

fn analytics_error(err: AnalyticsError) -> Response {
    let status = match err {
        AnalyticsError::UnknownFacet { .. } => StatusCode::BAD_REQUEST,
        AnalyticsError::UnknownColumn(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    json_error(status, err.to_string())
}

fn json_error(status: StatusCode, message: String) -> Response {
    (status, Json(serde_json::json!({ "error": message }))).into_response()
}
