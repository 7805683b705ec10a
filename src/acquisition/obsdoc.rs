//! Observation Document Decoder
//!
//! The VLA control system multicasts one XML observation document ("obsdoc")
//! per scan. Only the handful of fields the dispatcher needs are decoded:
//!
//! | obsdoc field           | meaning                         |
//! |------------------------|---------------------------------|
//! | `datasetId`            | project / dataset id            |
//! | `datasetID`            | legacy spelling of `datasetId`  |
//! | `scanNo`, `subscanNo`  | scan and subscan number         |
//! | `name`                 | source name (`FINISH` at end)   |
//! | `ra`, `dec`            | position, radians               |
//! | `startTime`            | scan start, MJD                 |
//! | `intent` (repeated)    | `Key=Value` or `Key='Value'`    |
//!
//! Fields may appear as attributes of the root element or as its direct
//! child elements; deeper elements are ignored.

use std::collections::BTreeMap;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use thiserror::Error;

use crate::types::{ScanRecord, ScanTime};

/// Obsdoc decoding errors
#[derive(Debug, Error)]
pub enum ObsdocError {
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("document is not UTF-8")]
    NotUtf8,

    #[error("missing required field {0}")]
    MissingField(&'static str),

    #[error("invalid value for {field}: {value:?}")]
    InvalidField { field: &'static str, value: String },
}

/// Raw obsdoc fields before normalization.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Obsdoc {
    pub dataset_id: Option<String>,
    pub legacy_dataset_id: Option<String>,
    pub config_id: Option<String>,
    pub scan_no: Option<u32>,
    pub subscan_no: Option<u32>,
    pub name: Option<String>,
    pub ra_rad: Option<f64>,
    pub dec_rad: Option<f64>,
    pub start_time_mjd: Option<f64>,
    pub intents: BTreeMap<String, String>,
}

impl Obsdoc {
    /// Project id, preferring the current `datasetId` spelling.
    pub fn project_id(&self) -> Option<&str> {
        self.dataset_id
            .as_deref()
            .or(self.legacy_dataset_id.as_deref())
    }

    /// Value of the `ScanIntent` intent, `"None"` if absent.
    pub fn scan_intent(&self) -> &str {
        self.intents.get("ScanIntent").map_or("None", String::as_str)
    }

    /// Normalize into a [`ScanRecord`].
    ///
    /// Project id and scan number are required. A missing start time reads
    /// as MJD 0; a missing position reads as 0 rad.
    pub fn to_scan_record(&self) -> Result<ScanRecord, ObsdocError> {
        let project_id = self
            .project_id()
            .ok_or(ObsdocError::MissingField("datasetId"))?
            .to_string();
        let scan_number = self.scan_no.ok_or(ObsdocError::MissingField("scanNo"))?;

        Ok(ScanRecord {
            project_id,
            scan_number,
            scan_intent: self.scan_intent().to_string(),
            source_name: self.name.clone().unwrap_or_default(),
            ra_deg: self.ra_rad.unwrap_or(0.0).to_degrees(),
            dec_deg: self.dec_rad.unwrap_or(0.0).to_degrees(),
            start_time: ScanTime::Mjd(self.start_time_mjd.unwrap_or(0.0)),
        })
    }

    fn set_field(&mut self, key: &str, value: &str) -> Result<(), ObsdocError> {
        match key {
            "datasetId" => self.dataset_id = Some(value.to_string()),
            "datasetID" => self.legacy_dataset_id = Some(value.to_string()),
            "configId" => self.config_id = Some(value.to_string()),
            "scanNo" => self.scan_no = Some(parse_field("scanNo", value)?),
            "subscanNo" => self.subscan_no = Some(parse_field("subscanNo", value)?),
            "name" => self.name = Some(value.to_string()),
            "ra" => self.ra_rad = Some(parse_finite("ra", value)?),
            "dec" => self.dec_rad = Some(parse_finite("dec", value)?),
            "startTime" => self.start_time_mjd = Some(parse_finite("startTime", value)?),
            "intent" => self.add_intent(value),
            _ => {}
        }
        Ok(())
    }

    fn add_intent(&mut self, item: &str) {
        match parse_intent(item) {
            Some((k, v)) => {
                self.intents.insert(k, v);
            }
            None => tracing::debug!(intent = %item, "Ignoring malformed intent"),
        }
    }
}

/// Decode an obsdoc from raw datagram bytes.
pub fn parse_obsdoc_bytes(bytes: &[u8]) -> Result<Obsdoc, ObsdocError> {
    let xml = std::str::from_utf8(bytes).map_err(|_| ObsdocError::NotUtf8)?;
    parse_obsdoc(xml)
}

/// Decode an obsdoc XML document.
pub fn parse_obsdoc(xml: &str) -> Result<Obsdoc, ObsdocError> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut doc = Obsdoc::default();
    let mut depth = 0usize;
    // Name of the open direct child of the root, if any.
    let mut field: Option<String> = None;

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                depth += 1;
                match depth {
                    1 => read_attributes(&mut doc, &e)?,
                    2 => field = Some(local_name(&e)),
                    _ => {}
                }
            }
            Event::Empty(e) => {
                if depth == 0 {
                    read_attributes(&mut doc, &e)?;
                }
            }
            Event::Text(t) => {
                if depth == 2 {
                    if let Some(key) = field.as_deref() {
                        let text = t.unescape()?;
                        doc.set_field(key, text.trim())?;
                    }
                }
            }
            Event::End(_) => {
                if depth == 2 {
                    field = None;
                }
                depth = depth.saturating_sub(1);
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(doc)
}

fn read_attributes(doc: &mut Obsdoc, e: &BytesStart<'_>) -> Result<(), ObsdocError> {
    for attr in e.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).into_owned();
        let value = attr.unescape_value()?;
        doc.set_field(&key, value.trim())?;
    }
    Ok(())
}

fn local_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.local_name().as_ref()).into_owned()
}

fn parse_field<T: std::str::FromStr>(field: &'static str, value: &str) -> Result<T, ObsdocError> {
    value.parse().map_err(|_| ObsdocError::InvalidField {
        field,
        value: value.to_string(),
    })
}

/// Like [`parse_field`] but rejects `NaN` and infinities, which have no JSON
/// representation on the queue.
fn parse_finite(field: &'static str, value: &str) -> Result<f64, ObsdocError> {
    let parsed: f64 = parse_field(field, value)?;
    if parsed.is_finite() {
        Ok(parsed)
    } else {
        Err(ObsdocError::InvalidField {
            field,
            value: value.to_string(),
        })
    }
}

/// Split `Key=Value`, dropping one pair of matching quotes around the value.
fn parse_intent(item: &str) -> Option<(String, String)> {
    let (key, value) = item.split_once('=')?;
    let key = key.trim();
    if key.is_empty() {
        return None;
    }
    let value = value.trim();
    let unquoted = ['\'', '"']
        .iter()
        .find_map(|q| value.strip_prefix(*q).and_then(|v| v.strip_suffix(*q)))
        .unwrap_or(value);
    Some((key.to_string(), unquoted.to_string()))
}
