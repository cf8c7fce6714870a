//! Row-oriented result tables plus the group/reduce/sort toolkit the page
//! builders are assembled from.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use foam_core::{Cell, Column, Record};
use serde::Serialize;

use crate::format::format_currency_label;
use crate::AnalyticsError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    /// Non-null values.
    Count,
    /// Nulls skipped; 0 for an all-null group.
    Sum,
    /// Nulls skipped; NaN for an all-null group.
    Mean,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Ascending,
    Descending,
}

/// One reduced output column of a group-by.
#[derive(Debug, Clone)]
pub struct Measure<C: Column> {
    pub column: C,
    pub aggregation: Aggregation,
    pub name: String,
}

impl<C: Column> Measure<C> {
    pub fn new(column: C, aggregation: Aggregation) -> Self {
        Self {
            column,
            aggregation,
            name: column.header().to_string(),
        }
    }

    pub fn count(column: C) -> Self {
        Self::new(column, Aggregation::Count)
    }

    pub fn sum(column: C) -> Self {
        Self::new(column, Aggregation::Sum)
    }

    pub fn mean(column: C) -> Self {
        Self::new(column, Aggregation::Mean)
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

struct GroupKey(Vec<Cell>);

impl PartialEq for GroupKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other).is_eq()
    }
}

impl Eq for GroupKey {}

impl PartialOrd for GroupKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for GroupKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0
            .iter()
            .zip(&other.0)
            .map(|(a, b)| a.total_cmp(b))
            .find(|o| o.is_ne())
            .unwrap_or_else(|| self.0.len().cmp(&other.0.len()))
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Accumulator {
    non_null: usize,
    numeric: usize,
    sum: f64,
}

impl Accumulator {
    fn push(&mut self, cell: &Cell) {
        if cell.is_null() {
            return;
        }
        self.non_null += 1;
        if let Some(v) = cell.as_f64().filter(|v| !v.is_nan()) {
            self.numeric += 1;
            self.sum += v;
        }
    }

    fn finish(&self, aggregation: Aggregation) -> Cell {
        match aggregation {
            Aggregation::Count => Cell::Number(self.non_null as f64),
            Aggregation::Sum => Cell::Number(self.sum),
            Aggregation::Mean if self.numeric == 0 => Cell::Number(f64::NAN),
            Aggregation::Mean => Cell::Number(self.sum / self.numeric as f64),
        }
    }
}

/// Group `rows` by `keys` and reduce each measure per group.
///
/// Rows with a null key are dropped. Groups come out in key order.
pub fn group_by<R: Record>(
    rows: &[R],
    keys: &[R::Column],
    measures: &[Measure<R::Column>],
) -> Table {
    let mut groups: BTreeMap<GroupKey, Vec<Accumulator>> = BTreeMap::new();
    for row in rows {
        let key = keys.iter().map(|k| row.cell(*k)).collect::<Vec<_>>();
        if key.iter().any(Cell::is_null) {
            continue;
        }
        let accs = groups
            .entry(GroupKey(key))
            .or_insert_with(|| vec![Accumulator::default(); measures.len()]);
        for (acc, measure) in accs.iter_mut().zip(measures) {
            acc.push(&row.cell(measure.column));
        }
    }

    let columns = keys
        .iter()
        .map(|k| k.header().to_string())
        .chain(measures.iter().map(|m| m.name.clone()))
        .collect();
    let rows = groups
        .into_iter()
        .map(|(key, accs)| {
            let mut row = key.0;
            row.extend(
                accs.iter()
                    .zip(measures)
                    .map(|(acc, m)| acc.finish(m.aggregation)),
            );
            row
        })
        .collect();
    Table { columns, rows }
}

/// Plain column projection, one output row per input row.
pub fn project<R: Record>(rows: &[R], columns: &[R::Column]) -> Table {
    Table {
        columns: columns.iter().map(|c| c.header().to_string()).collect(),
        rows: rows
            .iter()
            .map(|row| columns.iter().map(|c| row.cell(*c)).collect())
            .collect(),
    }
}

fn is_missing(cell: &Cell) -> bool {
    match cell {
        Cell::Null => true,
        Cell::Number(v) => v.is_nan(),
        _ => false,
    }
}

impl Table {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Result<usize, AnalyticsError> {
        self.columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| AnalyticsError::UnknownColumn(name.to_string()))
    }

    pub fn column(&self, name: &str) -> Result<Vec<&Cell>, AnalyticsError> {
        let idx = self.column_index(name)?;
        Ok(self.rows.iter().map(|row| &row[idx]).collect())
    }

    /// Stable sort on one column; NaN and null sort last in either order.
    pub fn sort_by(mut self, name: &str, order: SortOrder) -> Result<Self, AnalyticsError> {
        let idx = self.column_index(name)?;
        self.rows.sort_by(|a, b| {
            let (a, b) = (&a[idx], &b[idx]);
            match (is_missing(a), is_missing(b)) {
                (true, true) => Ordering::Equal,
                (true, false) => Ordering::Greater,
                (false, true) => Ordering::Less,
                (false, false) => match order {
                    SortOrder::Ascending => a.total_cmp(b),
                    SortOrder::Descending => b.total_cmp(a),
                },
            }
        });
        Ok(self)
    }

    pub fn head(mut self, n: usize) -> Self {
        self.rows.truncate(n);
        self
    }

    /// The `n` largest rows by `name`, presented in ascending order.
    pub fn top(self, name: &str, n: usize) -> Result<Self, AnalyticsError> {
        self.sort_by(name, SortOrder::Descending)?
            .head(n)
            .sort_by(name, SortOrder::Ascending)
    }

    /// Cut text labels to `width` characters.
    pub fn truncate_text(mut self, name: &str, width: usize) -> Result<Self, AnalyticsError> {
        let idx = self.column_index(name)?;
        for row in &mut self.rows {
            if let Cell::Text(label) = &mut row[idx] {
                if let Some((cut, _)) = label.char_indices().nth(width) {
                    label.truncate(cut);
                }
            }
        }
        Ok(self)
    }

    pub fn rename(mut self, from: &str, to: &str) -> Result<Self, AnalyticsError> {
        let idx = self.column_index(from)?;
        self.columns[idx] = to.to_string();
        Ok(self)
    }

    /// Replace a numeric column with its currency label.
    pub fn format_currency(mut self, name: &str) -> Result<Self, AnalyticsError> {
        let idx = self.column_index(name)?;
        for row in &mut self.rows {
            if let Some(v) = row[idx].as_f64() {
                row[idx] = Cell::Text(format_currency_label(v));
            }
        }
        Ok(self)
    }

    /// Append a currency label column computed from `source`.
    pub fn with_currency_label(mut self, source: &str, name: &str) -> Result<Self, AnalyticsError> {
        let idx = self.column_index(source)?;
        self.columns.push(name.to_string());
        for row in &mut self.rows {
            let label = row[idx]
                .as_f64()
                .map(|v| Cell::Text(format_currency_label(v)))
                .unwrap_or(Cell::Null);
            row.push(label);
        }
        Ok(self)
    }

    /// Drop rows whose `name` cell renders as `value`.
    pub fn exclude(mut self, name: &str, value: &str) -> Result<Self, AnalyticsError> {
        let idx = self.column_index(name)?;
        self.rows.retain(|row| row[idx].to_string() != value);
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use foam_core::{Award, AwardColumn};

    fn award(id: &str, recipient: Option<&str>, amount: Option<f64>) -> Award {
        Award {
            award_id: format!("award-{id}"),
            generated_internal_id: Some(id.to_string()),
            recipient_name: recipient.map(String::from),
            award_amount: amount,
            ..Default::default()
        }
    }

    fn numbers(table: &Table, name: &str) -> Vec<f64> {
        table
            .column(name)
            .unwrap()
            .into_iter()
            .map(|c| c.as_f64().unwrap())
            .collect()
    }

    #[test]
    fn group_by_reduces_each_measure_and_drops_null_keys() {
        let rows = vec![
            award("1", Some("Acme"), Some(10.0)),
            award("2", Some("Acme"), None),
            award("3", Some("Globex"), Some(5.0)),
            award("4", None, Some(100.0)),
        ];
        let table = group_by(
            &rows,
            &[AwardColumn::RecipientName],
            &[
                Measure::count(AwardColumn::AwardAmount).named("n"),
                Measure::sum(AwardColumn::AwardAmount),
                Measure::mean(AwardColumn::AwardAmount).named("avg"),
            ],
        );
        assert_eq!(table.columns, vec!["Recipient Name", "n", "Award Amount", "avg"]);
        assert_eq!(
            table.rows[0],
            vec![
                Cell::Text("Acme".into()),
                Cell::Number(1.0),
                Cell::Number(10.0),
                Cell::Number(10.0),
            ]
        );
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn all_null_groups_sum_to_zero_and_average_to_nan() {
        let rows = vec![award("1", Some("Acme"), None)];
        let table = group_by(
            &rows,
            &[AwardColumn::RecipientName],
            &[
                Measure::sum(AwardColumn::AwardAmount),
                Measure::mean(AwardColumn::AwardAmount).named("avg"),
            ],
        );
        assert_eq!(numbers(&table, "Award Amount"), vec![0.0]);
        assert!(numbers(&table, "avg")[0].is_nan());
    }

    #[test]
    fn group_by_on_empty_input_is_an_empty_table() {
        let table = group_by::<Award>(
            &[],
            &[AwardColumn::RecipientName],
            &[Measure::count(AwardColumn::GeneratedInternalId)],
        );
        assert!(table.is_empty());
        assert_eq!(table.columns.len(), 2);
    }

    #[test]
    fn grouped_count_skips_blank_ids() {
        let mut blank = award("x", Some("Acme"), Some(1.0));
        blank.generated_internal_id = None;
        let rows = vec![award("1", Some("Acme"), Some(1.0)), blank];
        let table = group_by(
            &rows,
            &[AwardColumn::RecipientName],
            &[Measure::count(AwardColumn::GeneratedInternalId).named("Number of Awards")],
        );
        assert_eq!(numbers(&table, "Number of Awards"), vec![1.0]);
    }

    #[test]
    fn sort_keeps_nan_last_in_both_directions() {
        let table = Table {
            columns: vec!["k".into(), "v".into()],
            rows: vec![
                vec![Cell::Text("a".into()), Cell::Number(f64::NAN)],
                vec![Cell::Text("b".into()), Cell::Number(2.0)],
                vec![Cell::Text("c".into()), Cell::Number(1.0)],
            ],
        };
        let asc = table.clone().sort_by("v", SortOrder::Ascending).unwrap();
        assert_eq!(asc.rows[0][0], Cell::Text("c".into()));
        assert!(asc.rows[2][1].as_f64().unwrap().is_nan());
        let desc = table.sort_by("v", SortOrder::Descending).unwrap();
        assert_eq!(desc.rows[0][0], Cell::Text("b".into()));
        assert!(desc.rows[2][1].as_f64().unwrap().is_nan());
    }

    #[test]
    fn top_returns_available_rows_without_padding() {
        let mut rows = Vec::new();
        for (recipient, count) in [("A", 50), ("B", 40), ("C", 30), ("D", 20), ("E", 10)] {
            for i in 0..count {
                rows.push(award(&format!("{recipient}{i}"), Some(recipient), Some(1.0)));
            }
        }
        let table = group_by(
            &rows,
            &[AwardColumn::RecipientName],
            &[Measure::count(AwardColumn::GeneratedInternalId)],
        )
        .top("generated_internal_id", 10)
        .unwrap();
        assert_eq!(numbers(&table, "generated_internal_id"), vec![10.0, 20.0, 30.0, 40.0, 50.0]);
    }

    #[test]
    fn top_keeps_the_largest_groups() {
        let rows = (0..12)
            .flat_map(|g| {
                let recipient = format!("r{g:02}");
                (0..=g)
                    .map(|i| award(&format!("{g}-{i}"), Some(recipient.as_str()), None))
                    .collect::<Vec<_>>()
            })
            .collect::<Vec<_>>();
        let table = group_by(
            &rows,
            &[AwardColumn::RecipientName],
            &[Measure::count(AwardColumn::GeneratedInternalId).named("Number of Awards")],
        )
        .top("Number of Awards", 10)
        .unwrap();
        assert_eq!(table.len(), 10);
        assert_eq!(numbers(&table, "Number of Awards").first(), Some(&3.0));
        assert_eq!(numbers(&table, "Number of Awards").last(), Some(&12.0));
    }

    #[test]
    fn labels_truncate_by_characters() {
        let table = Table {
            columns: vec!["agency".into()],
            rows: vec![
                vec![Cell::Text("Department of Veterans Affairs".into())],
                vec![Cell::Text("Économie générale".into())],
                vec![Cell::Text("DOE".into())],
            ],
        }
        .truncate_text("agency", 15)
        .unwrap();
        assert_eq!(
            table.column("agency").unwrap(),
            vec![
                &Cell::Text("Department of V".into()),
                &Cell::Text("Économie généra".into()),
                &Cell::Text("DOE".into()),
            ]
        );
    }

    #[test]
    fn currency_columns_and_exclusions() {
        let table = Table {
            columns: vec!["bin".into(), "amount".into()],
            rows: vec![
                vec![Cell::Text("0-6 Months".into()), Cell::Number(2_300_000.0)],
                vec![Cell::Text("Contract/s Expired".into()), Cell::Number(5.0)],
            ],
        };
        let labelled = table
            .clone()
            .with_currency_label("amount", "label")
            .unwrap()
            .exclude("bin", "Contract/s Expired")
            .unwrap();
        assert_eq!(labelled.rows, vec![vec![
            Cell::Text("0-6 Months".into()),
            Cell::Number(2_300_000.0),
            Cell::Text("2.30 M".into()),
        ]]);

        let formatted = table
            .format_currency("amount")
            .unwrap()
            .rename("amount", "Amount")
            .unwrap();
        assert_eq!(formatted.columns, vec!["bin", "Amount"]);
        assert_eq!(formatted.rows[1][1], Cell::Text("5.00".into()));
    }

    #[test]
    fn unknown_columns_are_errors() {
        let table = Table {
            columns: vec!["a".into()],
            rows: vec![],
        };
        assert!(matches!(
            table.sort_by("b", SortOrder::Ascending),
            Err(AnalyticsError::UnknownColumn(name)) if name == "b"
        ));
    }
}
