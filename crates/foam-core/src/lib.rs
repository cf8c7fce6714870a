//! Core domain model for FOAM: opportunity/award records, typed columns and cells.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub const CRATE_NAME: &str = "foam-core";

/// Size bins counted as "$6+ million" awards.
pub const LARGE_AWARD_BINS: [&str; 2] = ["6-12 million", "12+ million"];

/// Terminal value of the months-until-end bin.
pub const CONTRACTS_EXPIRED: &str = "Contract/s Expired";

/// Display color for a `DaysRemainingCode` traffic-light value.
pub fn status_color(code: &str) -> Option<&'static str> {
    match code {
        "Red" => Some("#e76f51"),
        "Yellow" => Some("#e9c46a"),
        "Green" => Some("#2a9d8f"),
        _ => None,
    }
}

/// A single table value as seen by the filter and aggregation layers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    Text(String),
    Number(f64),
    Date(NaiveDate),
    Null,
}

impl Cell {
    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Number(v) => Some(*v),
            _ => None,
        }
    }

    pub fn text(value: Option<&str>) -> Self {
        value.map_or(Cell::Null, |v| Cell::Text(v.to_string()))
    }

    pub fn number(value: Option<f64>) -> Self {
        value.map_or(Cell::Null, Cell::Number)
    }

    pub fn date(value: Option<NaiveDate>) -> Self {
        value.map_or(Cell::Null, Cell::Date)
    }

    fn rank(&self) -> u8 {
        match self {
            Cell::Number(_) => 0,
            Cell::Date(_) => 1,
            Cell::Text(_) => 2,
            Cell::Null => 3,
        }
    }

    /// Total order used for grouping and sorting: numbers, dates, text, then nulls.
    pub fn total_cmp(&self, other: &Cell) -> Ordering {
        match (self, other) {
            (Cell::Number(a), Cell::Number(b)) => a.total_cmp(b),
            (Cell::Date(a), Cell::Date(b)) => a.cmp(b),
            (Cell::Text(a), Cell::Text(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Text(v) => f.write_str(v),
            Cell::Number(v) => write!(f, "{v}"),
            Cell::Date(v) => write!(f, "{}", v.format("%Y-%m-%d")),
            Cell::Null => Ok(()),
        }
    }
}

/// Column of a typed table, addressable by its source header.
pub trait Column: Copy + Eq + Ord + fmt::Debug + 'static {
    fn header(self) -> &'static str;
    fn all() -> &'static [Self];

    fn from_header(header: &str) -> Option<Self> {
        Self::all().iter().copied().find(|c| c.header() == header)
    }
}

/// Row of a typed table.
pub trait Record {
    type Column: Column;

    fn cell(&self, column: Self::Column) -> Cell;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum OpportunityColumn {
    NoticeId,
    AwardingAgency,
    Title,
    Description,
    OpportunityType,
    Score,
    ScoreMapped,
    SetAsideType,
    DaysRemainingCode,
    DaysToResponseDeadline,
    PostedDate,
    NaicsDescription,
    DescriptionLink,
}

impl Column for OpportunityColumn {
    fn header(self) -> &'static str {
        match self {
            Self::NoticeId => "Notice_ID",
            Self::AwardingAgency => "Awarding_Agency",
            Self::Title => "Title",
            Self::Description => "DescriptionText",
            Self::OpportunityType => "Type",
            Self::Score => "Score",
            Self::ScoreMapped => "Score_Mapped",
            Self::SetAsideType => "Set_Aside_Type",
            Self::DaysRemainingCode => "DaysRemainingCode",
            Self::DaysToResponseDeadline => "Days_to_ResponseDeadline",
            Self::PostedDate => "Posted_Date",
            Self::NaicsDescription => "NAICSCodeDesc",
            Self::DescriptionLink => "Description link",
        }
    }

    fn all() -> &'static [Self] {
        &[
            Self::NoticeId,
            Self::AwardingAgency,
            Self::Title,
            Self::Description,
            Self::OpportunityType,
            Self::Score,
            Self::ScoreMapped,
            Self::SetAsideType,
            Self::DaysRemainingCode,
            Self::DaysToResponseDeadline,
            Self::PostedDate,
            Self::NaicsDescription,
            Self::DescriptionLink,
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AwardColumn {
    AwardId,
    AwardingAgency,
    RecipientName,
    AwardType,
    ContractStatus,
    NaicsDescription,
    AmountBin,
    GeneratedInternalId,
    AwardAmount,
    Description,
    StartDate,
    EndDate,
    LastModifiedDate,
    MonthsUntilEnd,
    Url,
    OffersReceived,
    ContractDurationYears,
}

impl Column for AwardColumn {
    fn header(self) -> &'static str {
        match self {
            Self::AwardId => "Award ID",
            Self::AwardingAgency => "Awarding Agency",
            Self::RecipientName => "Recipient Name",
            Self::AwardType => "Contract Award Type",
            Self::ContractStatus => "Contract Status",
            Self::NaicsDescription => "naics_description",
            Self::AmountBin => "AwardAmount_Binned",
            Self::GeneratedInternalId => "generated_internal_id",
            Self::AwardAmount => "Award Amount",
            Self::Description => "Description",
            Self::StartDate => "Start Date",
            Self::EndDate => "End Date",
            Self::LastModifiedDate => "Last Modified Date",
            Self::MonthsUntilEnd => "Months Until Contract Ends",
            Self::Url => "PastAwards_URL",
            Self::OffersReceived => "number_of_offers_received",
            Self::ContractDurationYears => "Contract Duration (Years)",
        }
    }

    fn all() -> &'static [Self] {
        &[
            Self::AwardId,
            Self::AwardingAgency,
            Self::RecipientName,
            Self::AwardType,
            Self::ContractStatus,
            Self::NaicsDescription,
            Self::AmountBin,
            Self::GeneratedInternalId,
            Self::AwardAmount,
            Self::Description,
            Self::StartDate,
            Self::EndDate,
            Self::LastModifiedDate,
            Self::MonthsUntilEnd,
            Self::Url,
            Self::OffersReceived,
            Self::ContractDurationYears,
        ]
    }
}

/// One solicitation notice from the active opportunities feed.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Opportunity {
    pub notice_id: Option<String>,
    pub awarding_agency: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub opportunity_type: Option<String>,
    pub score: Option<String>,
    pub score_mapped: Option<String>,
    pub set_aside_type: Option<String>,
    pub days_remaining_code: Option<String>,
    pub days_to_response_deadline: Option<f64>,
    pub posted_date: Option<NaiveDate>,
    pub naics_description: Option<String>,
    pub description_link: Option<String>,
    /// Derived from `days_remaining_code` at load time.
    pub status_color: Option<String>,
}

impl Record for Opportunity {
    type Column = OpportunityColumn;

    fn cell(&self, column: OpportunityColumn) -> Cell {
        use OpportunityColumn as C;
        match column {
            C::NoticeId => Cell::text(self.notice_id.as_deref()),
            C::AwardingAgency => Cell::text(self.awarding_agency.as_deref()),
            C::Title => Cell::text(self.title.as_deref()),
            C::Description => Cell::text(self.description.as_deref()),
            C::OpportunityType => Cell::text(self.opportunity_type.as_deref()),
            C::Score => Cell::text(self.score.as_deref()),
            C::ScoreMapped => Cell::text(self.score_mapped.as_deref()),
            C::SetAsideType => Cell::text(self.set_aside_type.as_deref()),
            C::DaysRemainingCode => Cell::text(self.days_remaining_code.as_deref()),
            C::DaysToResponseDeadline => Cell::number(self.days_to_response_deadline),
            C::PostedDate => Cell::date(self.posted_date),
            C::NaicsDescription => Cell::text(self.naics_description.as_deref()),
            C::DescriptionLink => Cell::text(self.description_link.as_deref()),
        }
    }
}

/// One historical contract award row. Several rows may share a `generated_internal_id`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Award {
    pub award_id: String,
    pub awarding_agency: Option<String>,
    pub recipient_name: Option<String>,
    pub award_type: Option<String>,
    pub contract_status: Option<String>,
    pub naics_description: Option<String>,
    pub amount_bin: Option<String>,
    pub generated_internal_id: Option<String>,
    pub award_amount: Option<f64>,
    pub description: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub last_modified_date: Option<NaiveDate>,
    pub months_until_end: Option<String>,
    pub url: Option<String>,
    pub number_of_offers_received: Option<f64>,
    pub contract_duration_years: Option<f64>,
}

impl Record for Award {
    type Column = AwardColumn;

    fn cell(&self, column: AwardColumn) -> Cell {
        use AwardColumn as C;
        match column {
            C::AwardId => Cell::Text(self.award_id.clone()),
            C::AwardingAgency => Cell::text(self.awarding_agency.as_deref()),
            C::RecipientName => Cell::text(self.recipient_name.as_deref()),
            C::AwardType => Cell::text(self.award_type.as_deref()),
            C::ContractStatus => Cell::text(self.contract_status.as_deref()),
            C::NaicsDescription => Cell::text(self.naics_description.as_deref()),
            C::AmountBin => Cell::text(self.amount_bin.as_deref()),
            C::GeneratedInternalId => Cell::text(self.generated_internal_id.as_deref()),
            C::AwardAmount => Cell::number(self.award_amount),
            C::Description => Cell::text(self.description.as_deref()),
            C::StartDate => Cell::date(self.start_date),
            C::EndDate => Cell::date(self.end_date),
            C::LastModifiedDate => Cell::date(self.last_modified_date),
            C::MonthsUntilEnd => Cell::text(self.months_until_end.as_deref()),
            C::Url => Cell::text(self.url.as_deref()),
            C::OffersReceived => Cell::number(self.number_of_offers_received),
            C::ContractDurationYears => Cell::number(self.contract_duration_years),
        }
    }
}

/// Both base tables, loaded once and shared read-only.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Datasets {
    pub opportunities: Vec<Opportunity>,
    pub awards: Vec<Award>,
}

/// User-defined display order for ordinal facet columns, keyed by source header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacetOrder {
    #[serde(default)]
    pub facet_order: BTreeMap<String, Vec<String>>,
}

impl Default for FacetOrder {
    fn default() -> Self {
        let mut facet_order = BTreeMap::new();
        facet_order.insert(
            AwardColumn::AmountBin.header().to_string(),
            ["0-1 million", "1-6 million", "6-12 million", "12+ million"]
                .into_iter()
                .map(String::from)
                .collect(),
        );
        Self { facet_order }
    }
}

impl FacetOrder {
    pub fn for_header(&self, header: &str) -> Option<&[String]> {
        self.facet_order.get(header).map(Vec::as_slice)
    }

    /// Overlay `other` on top of `self`; entries in `other` win.
    pub fn merged(mut self, other: FacetOrder) -> Self {
        self.facet_order.extend(other.facet_order);
        self
    }
}

/// Dashboard page selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Page {
    CurrentOpportunities,
    CompetitorInfo,
    ForecastRecompetes,
}

impl Page {
    pub const ALL: [Page; 3] = [
        Page::CurrentOpportunities,
        Page::CompetitorInfo,
        Page::ForecastRecompetes,
    ];

    pub fn slug(self) -> &'static str {
        match self {
            Page::CurrentOpportunities => "current-opportunities",
            Page::CompetitorInfo => "competitor-info",
            Page::ForecastRecompetes => "forecast-recompetes",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Page::CurrentOpportunities => "Current Opportunities",
            Page::CompetitorInfo => "Competitor Info",
            Page::ForecastRecompetes => "Forecast Recompetes",
        }
    }
}

impl fmt::Display for Page {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownPage(pub String);

impl fmt::Display for UnknownPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown page `{}`", self.0)
    }
}

impl std::error::Error for UnknownPage {}

impl FromStr for Page {
    type Err = UnknownPage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Page::ALL
            .into_iter()
            .find(|p| p.slug() == s || p.title().eq_ignore_ascii_case(s))
            .ok_or_else(|| UnknownPage(s.to_string()))
    }
}
