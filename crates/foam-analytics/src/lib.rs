//! Filtering, KPI and grouped-table pipeline behind the FOAM dashboard pages.

use foam_core::Page;
use thiserror::Error;

pub mod filter;
pub mod format;
pub mod kpi;
pub mod pages;
pub mod table;

pub use filter::{facet_options, filter_rows, row_matches, FacetOption, FacetSelections};
pub use format::format_currency_label;
pub use kpi::{
    competitor_kpis, contracts_kpis, current_opportunities_kpis, CompetitorKpis, ContractKpis,
    OpportunityKpis,
};
pub use pages::{
    build_page_view, page_facet_panels, Chart, FacetPanel, PageKpis, PageView, RawSelections,
};
pub use table::{group_by, project, Aggregation, Measure, SortOrder, Table};

pub const CRATE_NAME: &str = "foam-analytics";

#[derive(Debug, Error)]
pub enum AnalyticsError {
    #[error("unknown column `{0}`")]
    UnknownColumn(String),
    #[error("page `{page}` has no facet `{key}`")]
    UnknownFacet { page: Page, key: String },
}
