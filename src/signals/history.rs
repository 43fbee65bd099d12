use super::processor::{top_by_oi_change, OptionSnapshotRow};
use super::rules::SignalLabel;
use crate::error::{ExportError, IngestError};
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::path::Path;

/// Export columns, in file order
pub const HISTORY_COLUMNS: [&str; 9] = [
    "Strike_Price",
    "CE_OI",
    "CE_CHG_OI",
    "CE_LTP",
    "PE_OI",
    "PE_CHG_OI",
    "PE_LTP",
    "Signal",
    "Time",
];

/// Capture time format of the `Time` column
pub const TIME_FORMAT: &str = "%H:%M";

/// A labeled row captured during one poll cycle
#[derive(Debug, Clone, PartialEq)]
pub struct SignalHistoryEntry {
    pub row: OptionSnapshotRow,
    pub label: SignalLabel,
    pub captured_at: DateTime<FixedOffset>,
}

/// One line of the exported history file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryRecord {
    #[serde(rename = "Strike_Price")]
    pub strike: f64,
    #[serde(rename = "CE_OI")]
    pub call_open_interest: f64,
    #[serde(rename = "CE_CHG_OI")]
    pub call_oi_change: f64,
    #[serde(rename = "CE_LTP")]
    pub call_last_price: f64,
    #[serde(rename = "PE_OI")]
    pub put_open_interest: f64,
    #[serde(rename = "PE_CHG_OI")]
    pub put_oi_change: f64,
    #[serde(rename = "PE_LTP")]
    pub put_last_price: f64,
    #[serde(rename = "Signal")]
    pub signal: SignalLabel,
    #[serde(rename = "Time")]
    pub time: String,
}

impl From<&SignalHistoryEntry> for HistoryRecord {
    fn from(entry: &SignalHistoryEntry) -> Self {
        let r = &entry.row;
        Self {
            strike: r.strike,
            call_open_interest: r.call_open_interest,
            call_oi_change: r.call_oi_change,
            call_last_price: r.call_last_price,
            put_open_interest: r.put_open_interest,
            put_oi_change: r.put_oi_change,
            put_last_price: r.put_last_price,
            signal: entry.label,
            time: entry.captured_at.format(TIME_FORMAT).to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OptionSide {
    #[serde(rename = "CE")]
    Call,
    #[serde(rename = "PE")]
    Put,
}

impl OptionSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            OptionSide::Call => "CE",
            OptionSide::Put => "PE",
        }
    }
}

/// Paper trade entered from a signal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub strike: f64,
    pub side: OptionSide,
    pub quantity: u32,
    pub entry_price: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Portfolio {
    trades: Vec<Trade>,
}

impl Portfolio {
    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    pub fn execute(&mut self, side: OptionSide, strike: f64, quantity: u32, entry_price: f64) -> &Trade {
        self.trades.push(Trade {
            strike,
            side,
            quantity,
            entry_price,
        });
        &self.trades[self.trades.len() - 1]
    }

    /// Enter at the first strike carrying `label`, at that side's LTP.
    /// Only BUY labels open positions.
    pub fn execute_signal(
        &mut self,
        label: SignalLabel,
        labeled: &[(OptionSnapshotRow, SignalLabel)],
        quantity: u32,
    ) -> Option<&Trade> {
        let side = match label {
            SignalLabel::BuyCall | SignalLabel::StrongBuyCall => OptionSide::Call,
            SignalLabel::BuyPut | SignalLabel::StrongBuyPut => OptionSide::Put,
            _ => return None,
        };

        let (row, _) = labeled.iter().find(|(_, l)| *l == label)?;
        let price = match side {
            OptionSide::Call => row.call_last_price,
            OptionSide::Put => row.put_last_price,
        };

        Some(self.execute(side, row.strike, quantity, price))
    }

    /// Total unrealised P&L against the latest rows. Positions whose
    /// strike is absent from `rows` are skipped.
    pub fn mark_to_market(&self, rows: &[OptionSnapshotRow]) -> f64 {
        self.trades
            .iter()
            .filter_map(|t| {
                let row = rows.iter().find(|r| r.strike == t.strike)?;
                let current = match t.side {
                    OptionSide::Call => row.call_last_price,
                    OptionSide::Put => row.put_last_price,
                };
                Some((current - t.entry_price) * t.quantity as f64)
            })
            .sum()
    }
}

/// Session state threaded through the poll loop
#[derive(Debug, Clone, Default)]
pub struct AccumulatorState {
    history: Vec<SignalHistoryEntry>,
    capture_times: Vec<DateTime<FixedOffset>>,
    portfolio: Portfolio,
}

impl AccumulatorState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append the cycle's top-N rows by combined OI change. Returns how
    /// many entries were appended.
    pub fn record_cycle(
        &mut self,
        labeled: &[(OptionSnapshotRow, SignalLabel)],
        captured_at: DateTime<FixedOffset>,
        top_n: usize,
    ) -> usize {
        let top = top_by_oi_change(labeled, top_n, |(row, _)| row);
        let appended = top.len();

        self.history
            .extend(top.into_iter().map(|(row, label)| SignalHistoryEntry {
                row,
                label,
                captured_at,
            }));
        self.capture_times.push(captured_at);

        appended
    }

    pub fn entries(&self) -> &[SignalHistoryEntry] {
        &self.history
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn buy_signals(&self) -> impl Iterator<Item = &SignalHistoryEntry> {
        self.history.iter().filter(|e| e.label.is_buy())
    }

    pub fn capture_times(&self) -> &[DateTime<FixedOffset>] {
        &self.capture_times
    }

    pub fn portfolio(&self) -> &Portfolio {
        &self.portfolio
    }

    pub fn portfolio_mut(&mut self) -> &mut Portfolio {
        &mut self.portfolio
    }

    pub fn records(&self) -> Vec<HistoryRecord> {
        self.history.iter().map(HistoryRecord::from).collect()
    }

    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), ExportError> {
        let mut wtr = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(writer);
        // Header is written even for an empty history
        wtr.write_record(HISTORY_COLUMNS)?;
        for record in self.records() {
            wtr.serialize(record)?;
        }
        wtr.flush()?;
        Ok(())
    }

    pub fn export_csv_string(&self) -> Result<String, ExportError> {
        let mut buf = Vec::new();
        self.write_csv(&mut buf)?;
        Ok(String::from_utf8(buf)?)
    }

    /// Rewrite the export file with the full history
    pub fn save_csv(&self, path: impl AsRef<Path>) -> Result<(), ExportError> {
        let file = std::fs::File::create(path)?;
        self.write_csv(file)
    }
}

/// Parse a previously exported history file
pub fn read_history<R: Read>(reader: R) -> Result<Vec<HistoryRecord>, IngestError> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::Headers)
        .from_reader(reader);

    let headers = rdr.headers()?.clone();
    let missing: Vec<String> = HISTORY_COLUMNS
        .iter()
        .filter(|col| !headers.iter().any(|h| h == **col))
        .map(|col| col.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(IngestError::MissingColumns(missing));
    }

    rdr.deserialize()
        .map(|rec| rec.map_err(IngestError::from))
        .collect()
}

/// Per strike (ascending), how many times each label was captured
pub fn signal_counts(records: &[HistoryRecord]) -> Vec<(f64, BTreeMap<SignalLabel, usize>)> {
    let mut counts: Vec<(f64, BTreeMap<SignalLabel, usize>)> = Vec::new();

    for record in records {
        let slot = match counts.iter().position(|(strike, _)| *strike == record.strike) {
            Some(i) => i,
            None => {
                counts.push((record.strike, BTreeMap::new()));
                counts.len() - 1
            }
        };
        *counts[slot].1.entry(record.signal).or_insert(0) += 1;
    }

    counts.sort_by(|a, b| a.0.total_cmp(&b.0));
    counts
}
