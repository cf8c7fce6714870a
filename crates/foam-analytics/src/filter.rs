//! Facet filtering: AND across facets, OR within a facet's selected values.

use std::collections::{BTreeMap, BTreeSet};

use foam_core::{Cell, Column, Record};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FacetSelections<C: Column> {
    selected: BTreeMap<C, BTreeSet<String>>,
}

impl<C: Column> Default for FacetSelections<C> {
    fn default() -> Self {
        Self {
            selected: BTreeMap::new(),
        }
    }
}

impl<C: Column> FacetSelections<C> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select(&mut self, column: C, value: impl Into<String>) -> &mut Self {
        self.selected.entry(column).or_default().insert(value.into());
        self
    }

    pub fn with<I, S>(mut self, column: C, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let entry = self.selected.entry(column).or_default();
        entry.extend(values.into_iter().map(Into::into));
        self
    }

    pub fn values(&self, column: C) -> Option<&BTreeSet<String>> {
        self.selected.get(&column).filter(|v| !v.is_empty())
    }

    /// True when no facet constrains the rows.
    pub fn is_unconstrained(&self) -> bool {
        self.selected.values().all(BTreeSet::is_empty)
    }

    fn active(&self) -> impl Iterator<Item = (C, &BTreeSet<String>)> {
        self.selected
            .iter()
            .filter(|(_, values)| !values.is_empty())
            .map(|(column, values)| (*column, values))
    }
}

pub fn row_matches<R: Record>(row: &R, selections: &FacetSelections<R::Column>) -> bool {
    selections.active().all(|(column, values)| match row.cell(column) {
        Cell::Null => false,
        cell => values.contains(&cell.to_string()),
    })
}

/// Rows matching every non-empty facet selection, as a fresh copy.
pub fn filter_rows<R>(rows: &[R], selections: &FacetSelections<R::Column>) -> Vec<R>
where
    R: Record + Clone,
{
    rows.iter()
        .filter(|row| row_matches(*row, selections))
        .cloned()
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FacetOption {
    pub value: String,
    pub count: usize,
    pub selected: bool,
}

/// Distinct non-null values of `column` with row counts.
///
/// Values follow `order` when given; values it does not list come after, in
/// natural order.
pub fn facet_options<R: Record>(
    rows: &[R],
    column: R::Column,
    order: Option<&[String]>,
    selected: Option<&BTreeSet<String>>,
) -> Vec<FacetOption> {
    let mut cells = rows
        .iter()
        .map(|row| row.cell(column))
        .filter(|cell| !cell.is_null())
        .collect::<Vec<_>>();
    cells.sort_by(Cell::total_cmp);

    let mut options: Vec<FacetOption> = Vec::new();
    let mut previous: Option<Cell> = None;
    for cell in cells {
        let repeated = previous
            .as_ref()
            .is_some_and(|prev| prev.total_cmp(&cell).is_eq());
        if repeated {
            if let Some(last) = options.last_mut() {
                last.count += 1;
            }
            continue;
        }
        let value = cell.to_string();
        options.push(FacetOption {
            selected: selected.is_some_and(|s| s.contains(&value)),
            value,
            count: 1,
        });
        previous = Some(cell);
    }

    if let Some(order) = order {
        options.sort_by_key(|o| {
            order
                .iter()
                .position(|v| *v == o.value)
                .unwrap_or(usize::MAX)
        });
    }
    options
}
