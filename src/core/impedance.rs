use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::table::{Cell, Table};
use crate::error::{QcError, Result};

/// Column order of every impedance table, empty or not
pub const IMPEDANCE_COLUMNS: [&str; 7] = [
    "utc_start",
    "seconds",
    "channel_i",
    "frequency",
    "V_actuation",
    "capacitance",
    "impedance",
];

/// One validated impedance sample
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpedanceRow {
    pub utc_start: DateTime<Utc>,
    pub seconds: f64,
    pub channel_i: usize,
    /// Hz
    pub frequency: f64,
    #[serde(rename = "V_actuation")]
    pub v_actuation: f64,
    /// Farads
    pub capacitance: f64,
    /// Ohms
    pub impedance: f64,
}

/// Sample as replied by the control board; any field may be absent
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawImpedanceRow {
    #[serde(default)]
    pub utc_start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub seconds: Option<f64>,
    #[serde(default)]
    pub channel_i: Option<usize>,
    #[serde(default)]
    pub frequency: Option<f64>,
    #[serde(default, rename = "V_actuation")]
    pub v_actuation: Option<f64>,
    #[serde(default)]
    pub capacitance: Option<f64>,
    #[serde(default)]
    pub impedance: Option<f64>,
}

impl RawImpedanceRow {
    /// Complete the row, or `None` when any value (timestamp included)
    /// is missing or NaN.
    pub fn complete(&self) -> Option<ImpedanceRow> {
        let finite = |v: Option<f64>| v.filter(|x| !x.is_nan());

        Some(ImpedanceRow {
            utc_start: self.utc_start?,
            seconds: finite(self.seconds)?,
            channel_i: self.channel_i?,
            frequency: finite(self.frequency)?,
            v_actuation: finite(self.v_actuation)?,
            capacitance: finite(self.capacitance)?,
            impedance: finite(self.impedance)?,
        })
    }
}

/// Ordered impedance samples of a single sweep
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImpedanceTable {
    pub rows: Vec<ImpedanceRow>,
}

impl ImpedanceTable {
    pub fn new(rows: Vec<ImpedanceRow>) -> Self {
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn channels(&self) -> Vec<usize> {
        let mut channels: Vec<usize> = self.rows.iter().map(|r| r.channel_i).collect();
        channels.sort_unstable();
        channels.dedup();
        channels
    }

    /// Median capacitance per channel, ordered by channel
    pub fn median_capacitance(&self) -> Vec<(usize, f64)> {
        self.channels()
            .into_iter()
            .map(|channel| {
                let mut values: Vec<f64> = self
                    .rows
                    .iter()
                    .filter(|r| r.channel_i == channel)
                    .map(|r| r.capacitance)
                    .collect();
                values.sort_by(|a, b| a.total_cmp(b));
                let mid = values.len() / 2;
                let median = if values.len() % 2 == 0 {
                    (values[mid - 1] + values[mid]) / 2.0
                } else {
                    values[mid]
                };
                (channel, median)
            })
            .collect()
    }

    pub fn to_table(&self) -> Table {
        let mut table = Table::new(&IMPEDANCE_COLUMNS);
        for (i, row) in self.rows.iter().enumerate() {
            let values = vec![
                Cell::from(row.utc_start),
                Cell::from(row.seconds),
                Cell::from(row.channel_i),
                Cell::from(row.frequency),
                Cell::from(row.v_actuation),
                Cell::from(row.capacitance),
                Cell::from(row.impedance),
            ];
            // Column count is fixed above, so this cannot fail.
            let _ = table.push_row(i, values);
        }
        table
    }

    pub fn from_table(table: &Table) -> Result<Self> {
        if table.column_names() != IMPEDANCE_COLUMNS {
            return Err(QcError::Schema(format!(
                "expected impedance columns {:?}, found {:?}",
                IMPEDANCE_COLUMNS,
                table.column_names()
            )));
        }

        let mut rows = Vec::with_capacity(table.len());
        for i in 0..table.len() {
            let cells = table.row(i).unwrap_or_default();
            let bad = |name: &str| QcError::Schema(format!("row {}: bad '{}' value", i, name));
            let float = |k: usize| cells[k].as_f64().ok_or_else(|| bad(IMPEDANCE_COLUMNS[k]));

            rows.push(ImpedanceRow {
                utc_start: cells[0].as_timestamp().ok_or_else(|| bad("utc_start"))?,
                seconds: float(1)?,
                channel_i: cells[2]
                    .as_i64()
                    .and_then(|c| usize::try_from(c).ok())
                    .ok_or_else(|| bad("channel_i"))?,
                frequency: float(3)?,
                v_actuation: float(4)?,
                capacitance: float(5)?,
                impedance: float(6)?,
            });
        }
        Ok(Self { rows })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complete_drops_nan() {
        let raw = RawImpedanceRow {
            seconds: Some(0.1),
            channel_i: Some(3),
            frequency: Some(10e3),
            v_actuation: Some(f64::NAN),
            capacitance: Some(1e-12),
            impedance: Some(1e6),
            ..Default::default()
        };
        assert!(raw.complete().is_none());
    }

    #[test]
    fn test_complete_requires_timestamp() {
        let mut raw = RawImpedanceRow {
            seconds: Some(0.1),
            channel_i: Some(3),
            frequency: Some(10e3),
            v_actuation: Some(100.0),
            capacitance: Some(1e-12),
            impedance: Some(1e6),
            ..Default::default()
        };
        assert!(raw.complete().is_none());

        raw.utc_start = Some(Utc::now());
        assert_eq!(raw.complete().map(|r| r.channel_i), Some(3));
    }

    #[test]
    fn test_median_even_count() {
        let start = Utc::now();
        let row = |c: f64| ImpedanceRow {
            utc_start: start,
            seconds: 0.0,
            channel_i: 1,
            frequency: 1e3,
            v_actuation: 100.0,
            capacitance: c,
            impedance: 1.0,
        };
        let table = ImpedanceTable::new(vec![row(1.0), row(4.0), row(2.0), row(3.0)]);
        assert_eq!(table.median_capacitance(), vec![(1, 2.5)]);
    }
}
