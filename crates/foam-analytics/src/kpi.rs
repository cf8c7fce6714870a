//! Headline KPI scalars, one set per page.

use std::collections::HashSet;

use foam_core::{Award, Opportunity, LARGE_AWARD_BINS};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct OpportunityKpis {
    pub total_opportunities: usize,
    /// NaN when no row carries a deadline.
    pub avg_days_to_respond: f64,
    pub positive_score_count: usize,
    pub green_status_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CompetitorKpis {
    pub total_past_awards: usize,
    pub six_million_above: usize,
    pub award_amount: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ContractKpis {
    pub contracts_count: usize,
    pub average_offers_per_contract: f64,
    pub contracts_value: f64,
}

fn total_award_amount(rows: &[Award]) -> f64 {
    rows.iter().filter_map(|r| r.award_amount).sum()
}

/// Distinct non-null contract ids.
fn distinct_contracts<'a>(rows: impl IntoIterator<Item = &'a Award>) -> usize {
    rows.into_iter()
        .filter_map(|r| r.generated_internal_id.as_deref())
        .collect::<HashSet<_>>()
        .len()
}

pub fn current_opportunities_kpis(rows: &[Opportunity]) -> OpportunityKpis {
    let total_opportunities = rows
        .iter()
        .filter_map(|r| r.notice_id.as_deref())
        .collect::<HashSet<_>>()
        .len();
    let (days_sum, days_n) = rows
        .iter()
        .filter_map(|r| r.days_to_response_deadline)
        .fold((0.0, 0usize), |(sum, n), d| (sum + d, n + 1));
    let avg_days_to_respond = if days_n == 0 {
        f64::NAN
    } else {
        days_sum / days_n as f64
    };
    OpportunityKpis {
        total_opportunities,
        avg_days_to_respond,
        positive_score_count: rows
            .iter()
            .filter(|r| r.score_mapped.as_deref() == Some("Positive"))
            .count(),
        green_status_count: rows
            .iter()
            .filter(|r| r.days_remaining_code.as_deref() == Some("Green"))
            .count(),
    }
}

pub fn competitor_kpis(rows: &[Award]) -> CompetitorKpis {
    CompetitorKpis {
        total_past_awards: distinct_contracts(rows),
        six_million_above: rows
            .iter()
            .filter(|r| {
                r.amount_bin
                    .as_deref()
                    .is_some_and(|bin| LARGE_AWARD_BINS.contains(&bin))
            })
            .count(),
        award_amount: total_award_amount(rows),
    }
}

/// Average offers counts every row whose offer count is `> 0` or non-null.
/// The second condition subsumes the first, so a recorded `0` still counts
/// toward both the sum and the contract denominator.
pub fn contracts_kpis(rows: &[Award]) -> ContractKpis {
    let with_offers = rows
        .iter()
        .filter(|r| {
            let offers = r.number_of_offers_received;
            offers.is_some_and(|n| n > 0.0) || offers.is_some()
        })
        .collect::<Vec<_>>();
    let total_offers: f64 = with_offers
        .iter()
        .filter_map(|r| r.number_of_offers_received)
        .sum();
    let offer_contracts = distinct_contracts(with_offers.iter().copied());
    let average_offers_per_contract = if offer_contracts == 0 {
        0.0
    } else {
        total_offers / offer_contracts as f64
    };
    ContractKpis {
        contracts_count: distinct_contracts(rows),
        average_offers_per_contract,
        contracts_value: total_award_amount(rows),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn award(id: &str, bin: &str, amount: Option<f64>, offers: Option<f64>) -> Award {
        Award {
            award_id: format!("A-{id}"),
            generated_internal_id: Some(id.to_string()),
            amount_bin: Some(bin.to_string()),
            award_amount: amount,
            number_of_offers_received: offers,
            ..Default::default()
        }
    }

    #[test]
    fn opportunity_kpis_on_empty_table() {
        let kpis = current_opportunities_kpis(&[]);
        assert_eq!(kpis.total_opportunities, 0);
        assert!(kpis.avg_days_to_respond.is_nan());
        assert_eq!(kpis.positive_score_count, 0);
        assert_eq!(kpis.green_status_count, 0);
    }

    #[test]
    fn opportunity_kpis_count_distinct_notices() {
        let rows = vec![
            Opportunity {
                notice_id: Some("N1".into()),
                score_mapped: Some("Positive".into()),
                days_remaining_code: Some("Green".into()),
                days_to_response_deadline: Some(10.0),
                ..Default::default()
            },
            Opportunity {
                notice_id: Some("N1".into()),
                score_mapped: Some("Negative".into()),
                days_remaining_code: Some("Red".into()),
                days_to_response_deadline: None,
                ..Default::default()
            },
            Opportunity {
                notice_id: Some("N2".into()),
                score_mapped: Some("Positive".into()),
                days_remaining_code: Some("Green".into()),
                days_to_response_deadline: Some(20.0),
                ..Default::default()
            },
        ];
        let kpis = current_opportunities_kpis(&rows);
        assert_eq!(kpis.total_opportunities, 2);
        assert_eq!(kpis.avg_days_to_respond, 15.0);
        assert_eq!(kpis.positive_score_count, 2);
        assert_eq!(kpis.green_status_count, 2);
    }

    #[test]
    fn competitor_kpis_count_large_bins_by_row() {
        let rows = vec![
            award("X", "12+ million", Some(20_000_000.0), None),
            award("X", "6-12 million", Some(7_000_000.0), None),
            award("Y", "1-6 million", None, None),
        ];
        let kpis = competitor_kpis(&rows);
        assert_eq!(kpis.total_past_awards, 2);
        assert_eq!(kpis.six_million_above, 2);
        assert_eq!(kpis.award_amount, 27_000_000.0);
    }

    #[test]
    fn blank_ids_are_not_counted_as_contracts_or_notices() {
        let mut blank = award("X", "12+ million", Some(5.0), Some(2.0));
        blank.generated_internal_id = None;
        let rows = vec![award("CONT_1", "0-1 million", Some(1.0), Some(4.0)), blank];

        assert_eq!(competitor_kpis(&rows).total_past_awards, 1);
        let kpis = contracts_kpis(&rows);
        assert_eq!(kpis.contracts_count, 1);
        assert_eq!(kpis.average_offers_per_contract, 6.0);

        let notices = vec![
            Opportunity {
                notice_id: Some("N1".into()),
                ..Default::default()
            },
            Opportunity::default(),
        ];
        assert_eq!(current_opportunities_kpis(&notices).total_opportunities, 1);
    }

    #[test]
    fn competitor_kpis_with_only_small_awards() {
        let rows = vec![
            award("X", "0-1 million", Some(10.0), None),
            award("Y", "0-1 million", Some(20.0), None),
        ];
        let kpis = competitor_kpis(&rows);
        assert_eq!(kpis.six_million_above, 0);
        assert_eq!(competitor_kpis(&[]).award_amount, 0.0);
    }

    #[test]
    fn average_offers_counts_recorded_zero() {
        let kpis = contracts_kpis(&[award("X", "0-1 million", None, Some(0.0))]);
        assert_eq!(kpis.contracts_count, 1);
        assert_eq!(kpis.average_offers_per_contract, 0.0);
        assert_eq!(kpis.contracts_value, 0.0);
    }

    #[test]
    fn average_offers_divides_by_contracts_with_offers() {
        let rows = vec![
            award("X", "0-1 million", Some(1.0), Some(3.0)),
            award("X", "0-1 million", Some(2.0), Some(1.0)),
            award("Y", "0-1 million", Some(3.0), Some(0.0)),
            award("Z", "0-1 million", Some(4.0), None),
        ];
        let kpis = contracts_kpis(&rows);
        assert_eq!(kpis.contracts_count, 3);
        assert_eq!(kpis.average_offers_per_contract, 2.0);
        assert_eq!(kpis.contracts_value, 10.0);
    }

    #[test]
    fn average_offers_is_zero_without_offer_data() {
        let rows = vec![award("X", "0-1 million", Some(5.0), None)];
        let kpis = contracts_kpis(&rows);
        assert_eq!(kpis.average_offers_per_contract, 0.0);
        assert_eq!(contracts_kpis(&[]).average_offers_per_contract, 0.0);
    }
}
