use std::cmp::Ordering;

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq)]
pub struct TeamRecord {
    pub id: String,
    pub team_name: String,
    pub overall: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RankedEntry {
    pub record: TeamRecord,
    /// 1-based standing among all teams in the last applied snapshot.
    pub rank: usize,
}

impl RankedEntry {
    pub fn is_podium(&self) -> bool {
        self.rank <= PODIUM_SIZE
    }
}

pub const PODIUM_SIZE: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    #[error("collection root is neither an object nor an array")]
    NotACollection,
    #[error("record {id} is not an object")]
    NotAnObject { id: String },
    #[error("record {id} has no teamName")]
    MissingTeamName { id: String },
    #[error("record {id} has no overall score")]
    MissingOverall { id: String },
    #[error("record {id} has a non-numeric overall score")]
    InvalidOverall { id: String },
}

/// Result of folding one raw snapshot into a ranked sequence.
#[derive(Debug, Clone, Default)]
pub struct Standings {
    pub entries: Vec<RankedEntry>,
    pub rejected: Vec<RecordError>,
}

/// Turn a raw keyed collection into canonical standings.
///
/// `None`, `null`, `{}` and `[]` all mean "no records". Objects keep the key
/// order they were delivered in; arrays use their index as the key and skip
/// `null` holes. Records that fail to parse are reported in `rejected` and
/// left out of the ranking.
pub fn build_standings(raw: Option<&Value>) -> Standings {
    let mut records = Vec::new();
    let mut rejected = Vec::new();

    match raw {
        None | Some(Value::Null) => {}
        Some(Value::Object(map)) => {
            for (key, value) in map {
                match parse_record(key, value) {
                    Ok(record) => records.push(record),
                    Err(err) => rejected.push(err),
                }
            }
        }
        Some(Value::Array(items)) => {
            for (idx, value) in items.iter().enumerate() {
                if value.is_null() {
                    continue;
                }
                match parse_record(&idx.to_string(), value) {
                    Ok(record) => records.push(record),
                    Err(err) => rejected.push(err),
                }
            }
        }
        Some(_) => rejected.push(RecordError::NotACollection),
    }

    Standings {
        entries: rank_records(records),
        rejected,
    }
}

pub fn parse_record(id: &str, value: &Value) -> Result<TeamRecord, RecordError> {
    let Some(obj) = value.as_object() else {
        return Err(RecordError::NotAnObject { id: id.to_string() });
    };
    let team_name = obj
        .get("teamName")
        .and_then(Value::as_str)
        .ok_or_else(|| RecordError::MissingTeamName { id: id.to_string() })?;
    let overall = match obj.get("overall") {
        None | Some(Value::Null) => {
            return Err(RecordError::MissingOverall { id: id.to_string() });
        }
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        Some(_) => None,
    }
    .filter(|v| v.is_finite())
    .ok_or_else(|| RecordError::InvalidOverall { id: id.to_string() })?;

    Ok(TeamRecord {
        id: id.to_string(),
        team_name: team_name.to_string(),
        overall,
    })
}

/// Sort by `overall` descending, keeping input order for ties, then number
/// the result 1..=N.
pub fn rank_records(records: Vec<TeamRecord>) -> Vec<RankedEntry> {
    let mut indexed: Vec<(usize, TeamRecord)> = records.into_iter().enumerate().collect();
    indexed.sort_by(|(ia, a), (ib, b)| {
        b.overall
            .partial_cmp(&a.overall)
            .unwrap_or(Ordering::Equal)
            .then(ia.cmp(ib))
    });
    indexed
        .into_iter()
        .enumerate()
        .map(|(pos, (_, record))| RankedEntry {
            record,
            rank: pos + 1,
        })
        .collect()
}
