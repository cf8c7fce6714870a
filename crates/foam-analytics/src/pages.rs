//! Per-page facet sets, chart tables and record listings.

use std::collections::{BTreeMap, BTreeSet};

use foam_core::{
    Award, AwardColumn, Column, Datasets, FacetOrder, Opportunity, OpportunityColumn, Page, Record,
    CONTRACTS_EXPIRED,
};
use serde::Serialize;
use tracing::debug;

use crate::filter::{facet_options, filter_rows, FacetOption, FacetSelections};
use crate::kpi::{
    competitor_kpis, contracts_kpis, current_opportunities_kpis, CompetitorKpis, ContractKpis,
    OpportunityKpis,
};
use crate::table::{group_by, project, Measure, SortOrder, Table};
use crate::AnalyticsError;

/// Facet-key → selected values, as received from a request.
pub type RawSelections = BTreeMap<String, BTreeSet<String>>;

const SHORT_LABEL: usize = 15;
const NAICS_CHART_ROWS: usize = 27;
const RECIPIENT_CHART_ROWS: usize = 10;

#[derive(Debug, Clone, Copy)]
pub struct FacetSpec<C> {
    pub key: &'static str,
    pub label: &'static str,
    pub column: C,
}

pub const OPPORTUNITY_FACETS: [FacetSpec<OpportunityColumn>; 5] = [
    FacetSpec {
        key: "agency",
        label: "Agency",
        column: OpportunityColumn::AwardingAgency,
    },
    FacetSpec {
        key: "type",
        label: "Opportunity Type",
        column: OpportunityColumn::OpportunityType,
    },
    FacetSpec {
        key: "score",
        label: "ECS Rating",
        column: OpportunityColumn::Score,
    },
    FacetSpec {
        key: "set_aside",
        label: "Set Aside Type",
        column: OpportunityColumn::SetAsideType,
    },
    FacetSpec {
        key: "days_remaining",
        label: "Days Remaining",
        column: OpportunityColumn::DaysRemainingCode,
    },
];

pub const COMPETITOR_FACETS: [FacetSpec<AwardColumn>; 5] = [
    FacetSpec {
        key: "agency",
        label: "Agency",
        column: AwardColumn::AwardingAgency,
    },
    FacetSpec {
        key: "awardee",
        label: "Awardee",
        column: AwardColumn::RecipientName,
    },
    FacetSpec {
        key: "contract_type",
        label: "Contract Type",
        column: AwardColumn::AwardType,
    },
    FacetSpec {
        key: "contract_status",
        label: "Contract Status",
        column: AwardColumn::ContractStatus,
    },
    FacetSpec {
        key: "amount_bin",
        label: "Award Amount Bins",
        column: AwardColumn::AmountBin,
    },
];

pub const FORECAST_FACETS: [FacetSpec<AwardColumn>; 4] = [
    FacetSpec {
        key: "agency",
        label: "Agency",
        column: AwardColumn::AwardingAgency,
    },
    FacetSpec {
        key: "incumbent",
        label: "Incumbent Name",
        column: AwardColumn::RecipientName,
    },
    FacetSpec {
        key: "contract_status",
        label: "Contract Status",
        column: AwardColumn::ContractStatus,
    },
    FacetSpec {
        key: "months_to_end",
        label: "Months To Contract Ends",
        column: AwardColumn::MonthsUntilEnd,
    },
];

const OPPORTUNITY_RECORD_COLUMNS: [OpportunityColumn; 9] = [
    OpportunityColumn::AwardingAgency,
    OpportunityColumn::Title,
    OpportunityColumn::OpportunityType,
    OpportunityColumn::PostedDate,
    OpportunityColumn::DaysToResponseDeadline,
    OpportunityColumn::DescriptionLink,
    OpportunityColumn::NaicsDescription,
    OpportunityColumn::SetAsideType,
    OpportunityColumn::Score,
];

const AWARD_RECORD_COLUMNS: [AwardColumn; 10] = [
    AwardColumn::AwardId,
    AwardColumn::AwardingAgency,
    AwardColumn::RecipientName,
    AwardColumn::AmountBin,
    AwardColumn::AwardAmount,
    AwardColumn::StartDate,
    AwardColumn::EndDate,
    AwardColumn::LastModifiedDate,
    AwardColumn::MonthsUntilEnd,
    AwardColumn::Url,
];

const FORECAST_RECORD_COLUMNS: [AwardColumn; 10] = [
    AwardColumn::AwardId,
    AwardColumn::AwardingAgency,
    AwardColumn::RecipientName,
    AwardColumn::NaicsDescription,
    AwardColumn::AwardAmount,
    AwardColumn::StartDate,
    AwardColumn::EndDate,
    AwardColumn::LastModifiedDate,
    AwardColumn::MonthsUntilEnd,
    AwardColumn::Url,
];

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PageKpis {
    CurrentOpportunities(OpportunityKpis),
    CompetitorInfo(CompetitorKpis),
    ForecastRecompetes(ContractKpis),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Chart {
    pub id: &'static str,
    pub title: &'static str,
    pub table: Table,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageView {
    pub page: Page,
    pub title: &'static str,
    pub total_rows: usize,
    pub filtered_rows: usize,
    pub kpis: PageKpis,
    pub charts: Vec<Chart>,
    pub records: Table,
}

impl PageView {
    pub fn chart(&self, id: &str) -> Option<&Chart> {
        self.charts.iter().find(|c| c.id == id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FacetPanel {
    pub key: &'static str,
    pub label: &'static str,
    pub column: &'static str,
    pub options: Vec<FacetOption>,
}

fn resolve<C: Column>(
    page: Page,
    specs: &[FacetSpec<C>],
    raw: &RawSelections,
) -> Result<FacetSelections<C>, AnalyticsError> {
    let mut selections = FacetSelections::new();
    for (key, values) in raw {
        let spec = specs
            .iter()
            .find(|s| s.key == key.as_str())
            .ok_or_else(|| AnalyticsError::UnknownFacet {
                page,
                key: key.clone(),
            })?;
        selections = selections.with(spec.column, values.iter().cloned());
    }
    Ok(selections)
}

fn panels<R: Record>(
    rows: &[R],
    specs: &[FacetSpec<R::Column>],
    order: &FacetOrder,
    selections: &FacetSelections<R::Column>,
) -> Vec<FacetPanel> {
    specs
        .iter()
        .map(|spec| FacetPanel {
            key: spec.key,
            label: spec.label,
            column: spec.column.header(),
            options: facet_options(
                rows,
                spec.column,
                order.for_header(spec.column.header()),
                selections.values(spec.column),
            ),
        })
        .collect()
}

/// Facet panels for a page, enumerated from the unfiltered base table.
pub fn page_facet_panels(
    page: Page,
    datasets: &Datasets,
    order: &FacetOrder,
    raw: &RawSelections,
) -> Result<Vec<FacetPanel>, AnalyticsError> {
    Ok(match page {
        Page::CurrentOpportunities => {
            let selections = resolve(page, &OPPORTUNITY_FACETS, raw)?;
            panels(&datasets.opportunities, &OPPORTUNITY_FACETS, order, &selections)
        }
        Page::CompetitorInfo => {
            let selections = resolve(page, &COMPETITOR_FACETS, raw)?;
            panels(&datasets.awards, &COMPETITOR_FACETS, order, &selections)
        }
        Page::ForecastRecompetes => {
            let selections = resolve(page, &FORECAST_FACETS, raw)?;
            panels(&datasets.awards, &FORECAST_FACETS, order, &selections)
        }
    })
}

/// Filter the page's base table and compute its KPIs, charts and records.
pub fn build_page_view(
    page: Page,
    datasets: &Datasets,
    raw: &RawSelections,
) -> Result<PageView, AnalyticsError> {
    let view = match page {
        Page::CurrentOpportunities => {
            let selections = resolve(page, &OPPORTUNITY_FACETS, raw)?;
            let rows = filter_rows(&datasets.opportunities, &selections);
            PageView {
                page,
                title: page.title(),
                total_rows: datasets.opportunities.len(),
                filtered_rows: rows.len(),
                kpis: PageKpis::CurrentOpportunities(current_opportunities_kpis(&rows)),
                charts: vec![
                    Chart {
                        id: "opportunities_by_type",
                        title: "OPPORTUNITY BY TYPE",
                        table: opportunities_by_type(&rows)?,
                    },
                    Chart {
                        id: "opportunities_by_agency",
                        title: "OPPORTUNITY BY AWARDING AGENCIES",
                        table: opportunities_by_agency(&rows)?,
                    },
                    Chart {
                        id: "opportunities_by_posted_date",
                        title: "OPPORTUNITY POSTED BY MONTH",
                        table: opportunities_by_posted_date(&rows),
                    },
                    Chart {
                        id: "avg_days_by_naics",
                        title: "AVG. DAYS TO RESPONSE TO DEADLINE BY NAICS",
                        table: avg_days_by_naics(&rows)?,
                    },
                ],
                records: project(&rows, &OPPORTUNITY_RECORD_COLUMNS),
            }
        }
        Page::CompetitorInfo => {
            let selections = resolve(page, &COMPETITOR_FACETS, raw)?;
            let rows = filter_rows(&datasets.awards, &selections);
            PageView {
                page,
                title: page.title(),
                total_rows: datasets.awards.len(),
                filtered_rows: rows.len(),
                kpis: PageKpis::CompetitorInfo(competitor_kpis(&rows)),
                charts: vec![
                    Chart {
                        id: "awards_by_recipient",
                        title: "NUMBER OF PAST AWARDS BY RECIPIENTS",
                        table: awards_by_recipient(&rows)?,
                    },
                    Chart {
                        id: "award_amount_by_recipient",
                        title: "PAST AWARDS AMOUNT BY RECIPIENTS",
                        table: award_amount_by_recipient(&rows)?,
                    },
                    Chart {
                        id: "award_amount_by_agency",
                        title: "PAST AWARDS AMOUNT BY AWARDING AGENCY",
                        table: award_amount_by_agency(&rows)?,
                    },
                    Chart {
                        id: "award_amount_by_naics_and_agency",
                        title: "PAST AWARDS AMOUNT BY NAICS AND RECIPIENT",
                        table: award_amount_by_naics_and_agency(&rows)?,
                    },
                ],
                records: project(&rows, &AWARD_RECORD_COLUMNS),
            }
        }
        Page::ForecastRecompetes => {
            let selections = resolve(page, &FORECAST_FACETS, raw)?;
            let rows = filter_rows(&datasets.awards, &selections);
            PageView {
                page,
                title: page.title(),
                total_rows: datasets.awards.len(),
                filtered_rows: rows.len(),
                kpis: PageKpis::ForecastRecompetes(contracts_kpis(&rows)),
                charts: vec![
                    Chart {
                        id: "award_amount_by_months_until_end",
                        title: "AWARD AMOUNT BY MONTHS UNTIL CONTRACT ENDS",
                        table: award_amount_by_months_until_end(&rows)?,
                    },
                    Chart {
                        id: "award_amount_by_duration",
                        title: "AWARD AMOUNT BY CONTRACT DURATION (Years)",
                        table: award_amount_by_duration(&rows),
                    },
                ],
                records: project(&rows, &FORECAST_RECORD_COLUMNS),
            }
        }
    };
    debug!(
        page = %page,
        total_rows = view.total_rows,
        filtered_rows = view.filtered_rows,
        "built page view"
    );
    Ok(view)
}

pub fn opportunities_by_type(rows: &[Opportunity]) -> Result<Table, AnalyticsError> {
    group_by(
        rows,
        &[OpportunityColumn::OpportunityType],
        &[
            Measure::count(OpportunityColumn::NoticeId),
            Measure::mean(OpportunityColumn::DaysToResponseDeadline),
        ],
    )
    .sort_by(OpportunityColumn::DaysToResponseDeadline.header(), SortOrder::Ascending)
}

pub fn opportunities_by_agency(rows: &[Opportunity]) -> Result<Table, AnalyticsError> {
    group_by(
        rows,
        &[OpportunityColumn::AwardingAgency],
        &[Measure::count(OpportunityColumn::NoticeId)],
    )
    .sort_by(OpportunityColumn::NoticeId.header(), SortOrder::Ascending)?
    .truncate_text(OpportunityColumn::AwardingAgency.header(), SHORT_LABEL)
}

pub fn opportunities_by_posted_date(rows: &[Opportunity]) -> Table {
    group_by(
        rows,
        &[OpportunityColumn::PostedDate],
        &[Measure::count(OpportunityColumn::NoticeId)],
    )
}

pub fn avg_days_by_naics(rows: &[Opportunity]) -> Result<Table, AnalyticsError> {
    Ok(group_by(
        rows,
        &[OpportunityColumn::NaicsDescription],
        &[Measure::mean(OpportunityColumn::DaysToResponseDeadline)],
    )
    .sort_by(OpportunityColumn::DaysToResponseDeadline.header(), SortOrder::Ascending)?
    .truncate_text(OpportunityColumn::NaicsDescription.header(), SHORT_LABEL)?
    .head(NAICS_CHART_ROWS))
}

/// The ten recipients with the most awards, listed smallest count first.
pub fn awards_by_recipient(rows: &[Award]) -> Result<Table, AnalyticsError> {
    group_by(
        rows,
        &[AwardColumn::RecipientName],
        &[Measure::count(AwardColumn::GeneratedInternalId).named("Number of Awards")],
    )
    .top("Number of Awards", RECIPIENT_CHART_ROWS)
}

pub fn award_amount_by_recipient(rows: &[Award]) -> Result<Table, AnalyticsError> {
    Ok(group_by(
        rows,
        &[AwardColumn::RecipientName],
        &[Measure::sum(AwardColumn::AwardAmount)],
    )
    .with_currency_label(AwardColumn::AwardAmount.header(), "Formatted Award Amount")?
    .head(RECIPIENT_CHART_ROWS))
}

pub fn award_amount_by_agency(rows: &[Award]) -> Result<Table, AnalyticsError> {
    group_by(
        rows,
        &[AwardColumn::AwardingAgency],
        &[
            Measure::count(AwardColumn::AwardId).named("Number of Awards"),
            Measure::sum(AwardColumn::AwardAmount),
        ],
    )
    .format_currency(AwardColumn::AwardAmount.header())
}

pub fn award_amount_by_naics_and_agency(rows: &[Award]) -> Result<Table, AnalyticsError> {
    group_by(
        rows,
        &[AwardColumn::NaicsDescription, AwardColumn::AwardingAgency],
        &[Measure::sum(AwardColumn::AwardAmount)],
    )
    .sort_by(AwardColumn::AwardAmount.header(), SortOrder::Descending)?
    .format_currency(AwardColumn::AwardAmount.header())?
    .rename(AwardColumn::NaicsDescription.header(), "NAICS")
}

pub fn award_amount_by_months_until_end(rows: &[Award]) -> Result<Table, AnalyticsError> {
    group_by(
        rows,
        &[AwardColumn::MonthsUntilEnd, AwardColumn::RecipientName],
        &[Measure::sum(AwardColumn::AwardAmount)],
    )
    .exclude(AwardColumn::MonthsUntilEnd.header(), CONTRACTS_EXPIRED)
}

pub fn award_amount_by_duration(rows: &[Award]) -> Table {
    group_by(
        rows,
        &[AwardColumn::ContractDurationYears, AwardColumn::RecipientName],
        &[Measure::sum(AwardColumn::AwardAmount)],
    )
}
