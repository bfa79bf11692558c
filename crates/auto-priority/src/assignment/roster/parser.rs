use std::collections::BTreeMap;
use std::io::Read;

use serde::{Deserialize, Deserializer};

use super::RosterError;

/// One normalized CSV line: a worker, optionally paired with one category.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RosterEntry {
    pub line: u64,
    pub site: String,
    pub worker: String,
    pub name: Option<String>,
    pub attributes: BTreeMap<String, f32>,
    pub category: Option<CategoryEntry>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct CategoryEntry {
    pub category: String,
    pub skill: f32,
    pub disabled: bool,
    pub priority: u8,
}

pub(crate) fn parse_entries<R: Read>(reader: R) -> Result<Vec<RosterEntry>, RosterError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let headers = csv_reader.headers()?.clone();
    let mut entries = Vec::new();

    for record in csv_reader.records() {
        let record = record?;
        let line = record.position().map(|position| position.line()).unwrap_or(0);
        let row: RosterRow = record.deserialize(Some(&headers))?;
        entries.push(row.into_entry(line)?);
    }

    Ok(entries)
}

#[derive(Debug, Deserialize)]
struct RosterRow {
    #[serde(rename = "Site")]
    site: String,
    #[serde(rename = "Worker")]
    worker: String,
    #[serde(rename = "Name", default, deserialize_with = "empty_string_as_none")]
    name: Option<String>,
    #[serde(rename = "Manipulation", default)]
    manipulation: Option<f32>,
    #[serde(rename = "Sight", default)]
    sight: Option<f32>,
    #[serde(rename = "Attributes", default, deserialize_with = "empty_string_as_none")]
    attributes: Option<String>,
    #[serde(rename = "Category", default, deserialize_with = "empty_string_as_none")]
    category: Option<String>,
    #[serde(rename = "Skill", default)]
    skill: Option<f32>,
    #[serde(rename = "Disabled", default, deserialize_with = "empty_string_as_none")]
    disabled: Option<String>,
    #[serde(rename = "Priority", default)]
    priority: Option<u8>,
}

impl RosterRow {
    fn into_entry(self, line: u64) -> Result<RosterEntry, RosterError> {
        if self.site.is_empty() || self.worker.is_empty() {
            return Err(RosterError::InvalidRow {
                line,
                reason: "site and worker are required".to_string(),
            });
        }

        let mut attributes = match self.attributes.as_deref() {
            Some(raw) => parse_attributes(raw)
                .map_err(|reason| RosterError::InvalidRow { line, reason })?,
            None => BTreeMap::new(),
        };
        if let Some(level) = self.manipulation {
            attributes.insert(crate::assignment::domain::MANIPULATION.to_string(), level);
        }
        if let Some(level) = self.sight {
            attributes.insert(crate::assignment::domain::SIGHT.to_string(), level);
        }

        let disabled = match self.disabled.as_deref() {
            Some(raw) => parse_flag(raw).ok_or_else(|| RosterError::InvalidRow {
                line,
                reason: format!("'{raw}' is not a recognised Disabled flag"),
            })?,
            None => false,
        };

        let category = self.category.map(|category| CategoryEntry {
            category,
            skill: self.skill.unwrap_or(0.0),
            disabled,
            priority: self.priority.unwrap_or(0),
        });

        Ok(RosterEntry {
            line,
            site: self.site,
            worker: self.worker,
            name: self.name,
            attributes,
            category,
        })
    }
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<String>::deserialize(deserializer)?;
    Ok(opt.filter(|value| !value.trim().is_empty()))
}

/// `name=value` pairs separated by `;`.
fn parse_attributes(raw: &str) -> Result<BTreeMap<String, f32>, String> {
    let mut attributes = BTreeMap::new();
    for pair in raw.split(';').map(str::trim).filter(|pair| !pair.is_empty()) {
        let (name, value) = pair
            .split_once('=')
            .ok_or_else(|| format!("attribute '{pair}' must be written as name=value"))?;
        let value: f32 = value
            .trim()
            .parse()
            .map_err(|_| format!("attribute '{}' has a non-numeric value", name.trim()))?;
        attributes.insert(name.trim().to_ascii_lowercase(), value);
    }
    Ok(attributes)
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "y" | "1" | "x" => Some(true),
        "false" | "no" | "n" | "0" => Some(false),
        _ => None,
    }
}
