//! Google Sheets row store adapter.
//!
//! Submissions live in one column of a form-responses tab; review state is
//! the row's background color. Reading a range returns each row's text plus
//! its color, decoded into a [`StatusMarker`]; writing a status repaints the
//! row via a `repeatCell` formatting update.

use serde::Deserialize;
use tracing::debug;

use crate::adapters::{AdapterError, RowStore};
use crate::config::SheetConfig;
use crate::types::{StatusMarker, SubmissionRow, MARKER_UNREVIEWED};

/// Base URL for the Google Sheets v4 API.
const SHEETS_API_BASE: &str = "https://sheets.googleapis.com/v4/spreadsheets";

/// Fields mask limiting the read to cell text and background color.
const READ_FIELDS: &str =
    "sheets.data.rowData.values.formattedValue,sheets.data.rowData.values.effectiveFormat.backgroundColor";

// ---------------------------------------------------------------------------
// Sheets API types (minimal subset)
// ---------------------------------------------------------------------------

/// `spreadsheets.get` response, narrowed by the fields mask.
#[derive(Debug, Default, Deserialize)]
struct SpreadsheetResponse {
    #[serde(default)]
    sheets: Vec<SheetData>,
}

#[derive(Debug, Default, Deserialize)]
struct SheetData {
    #[serde(default)]
    data: Vec<GridData>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GridData {
    #[serde(default)]
    row_data: Vec<RowData>,
}

#[derive(Debug, Default, Deserialize)]
struct RowData {
    #[serde(default)]
    values: Vec<CellData>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CellData {
    formatted_value: Option<String>,
    effective_format: Option<CellFormat>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CellFormat {
    background_color: Option<SheetColor>,
}

/// Sheets color — float channels in `0.0..=1.0`, omitted when zero.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
struct SheetColor {
    #[serde(default)]
    red: f64,
    #[serde(default)]
    green: f64,
    #[serde(default)]
    blue: f64,
}

// ---------------------------------------------------------------------------
// Color conversion
// ---------------------------------------------------------------------------

/// Quantize one float channel to a byte. Clamped to 0..=1 first, so the
/// scaled value always fits.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn channel_to_byte(value: f64) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}

fn marker_from_color(color: SheetColor) -> StatusMarker {
    StatusMarker {
        red: channel_to_byte(color.red),
        green: channel_to_byte(color.green),
        blue: channel_to_byte(color.blue),
    }
}

fn channel_to_float(value: u8) -> f64 {
    f64::from(value) / 255.0
}

// ---------------------------------------------------------------------------
// Row extraction
// ---------------------------------------------------------------------------

/// Flatten a `spreadsheets.get` response into submission rows.
///
/// Row indices are assigned sequentially from `start_row`; the Sheets API
/// returns the requested range in order with no gaps. Cells without an
/// explicit format decode as white (the sheet's actual default), so a blank
/// formatting record never hides a pending submission.
fn rows_from_response(start_row: u64, response: &SpreadsheetResponse) -> Vec<SubmissionRow> {
    let row_data = response
        .sheets
        .first()
        .and_then(|sheet| sheet.data.first())
        .map(|grid| grid.row_data.as_slice())
        .unwrap_or_default();

    let mut rows = Vec::with_capacity(row_data.len());
    let mut row_index = start_row;
    for row in row_data {
        let cell = row.values.first();
        let text = cell
            .and_then(|c| c.formatted_value.clone())
            .unwrap_or_default();
        let marker = cell
            .and_then(|c| c.effective_format.as_ref())
            .and_then(|f| f.background_color)
            .map_or(MARKER_UNREVIEWED, marker_from_color);
        rows.push(SubmissionRow {
            row_index,
            text,
            marker,
        });
        row_index = row_index.saturating_add(1);
    }
    rows
}

// ---------------------------------------------------------------------------
// Adapter implementation
// ---------------------------------------------------------------------------

/// Google Sheets implementation of [`RowStore`].
///
/// One instance holds the authenticated session (a bearer token) for the
/// process lifetime. Token acquisition and refresh happen outside the core.
pub struct SheetsRowStore {
    client: reqwest::Client,
    config: SheetConfig,
}

impl SheetsRowStore {
    /// Create a row store over an existing HTTP client.
    pub fn new(client: reqwest::Client, config: SheetConfig) -> Self {
        Self { client, config }
    }

    fn read_url(&self) -> String {
        format!("{}/{}", SHEETS_API_BASE, self.config.spreadsheet_id)
    }
}

#[async_trait::async_trait]
impl RowStore for SheetsRowStore {
    async fn read_range(&self, start_row: u64) -> Result<Vec<SubmissionRow>, AdapterError> {
        let range = format!("'{}'!B{}:B", self.config.tab, start_row);
        let resp = self
            .client
            .get(self.read_url())
            .bearer_auth(&self.config.access_token)
            .query(&[
                ("ranges", range.as_str()),
                ("fields", READ_FIELDS),
                ("includeGridData", "true"),
            ])
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(AdapterError::Api(format!(
                "sheets read failed: {}",
                resp.status()
            )));
        }

        let body: SpreadsheetResponse = resp.json().await?;
        let rows = rows_from_response(start_row, &body);
        debug!(start_row, count = rows.len(), "read sheet range");
        Ok(rows)
    }

    async fn write_status(
        &self,
        row_index: u64,
        marker: StatusMarker,
    ) -> Result<(), AdapterError> {
        // repeatCell over the whole row; the single-cell update variant does
        // not repaint rows reliably.
        let request = serde_json::json!({
            "requests": [{
                "repeatCell": {
                    "range": {
                        "sheetId": self.config.grid_sheet_id,
                        // The grid indexes from 0.
                        "startRowIndex": row_index.saturating_sub(1),
                        "startColumnIndex": 0,
                        "endRowIndex": row_index,
                    },
                    "fields": "userEnteredFormat",
                    "cell": {
                        "userEnteredFormat": {
                            "backgroundColor": {
                                "red": channel_to_float(marker.red),
                                "green": channel_to_float(marker.green),
                                "blue": channel_to_float(marker.blue),
                            },
                        },
                    },
                },
            }],
        });

        let url = format!(
            "{}/{}:batchUpdate",
            SHEETS_API_BASE, self.config.spreadsheet_id
        );
        let resp = self
            .client
            .post(url)
            .bearer_auth(&self.config.access_token)
            .json(&request)
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(AdapterError::Api(format!(
                "sheets status write failed: {}",
                resp.status()
            )));
        }

        debug!(row_index, ?marker, "wrote status marker");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
