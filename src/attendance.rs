use chrono::{DateTime, SecondsFormat, Utc};

use crate::token::{GeoPoint, TokenPayload};

/// One committed mark. `scanned_at` is the consumer-side commit time;
/// the rest is carried from the decoded payload.
#[derive(Debug, Clone)]
pub struct AttendanceRecord {
    pub class_id: String,
    pub token_id: String,
    pub issued_at: String,
    pub geo: Option<GeoPoint>,
    pub scanned_at: String,
}

/// In-memory commit target of the exchange. Append-only between
/// explicit clears; order is commit order.
#[derive(Debug, Default)]
pub struct AttendanceLog {
    records: Vec<AttendanceRecord>,
}

impl AttendanceLog {
    pub fn new() -> Self {
        AttendanceLog {
            records: Vec::new(),
        }
    }

    pub fn commit(&mut self, payload: &TokenPayload, scanned_at: DateTime<Utc>) -> &AttendanceRecord {
        self.records.push(AttendanceRecord {
            class_id: payload.class_id.clone(),
            token_id: payload.token_id.clone(),
            issued_at: payload.issued_at.clone(),
            geo: payload.geo,
            scanned_at: scanned_at.to_rfc3339_opts(SecondsFormat::Secs, true),
        });
        &self.records[self.records.len() - 1]
    }

    pub fn records(&self) -> &[AttendanceRecord] {
        &self.records
    }

    pub fn for_class<'a>(&'a self, class_id: &'a str) -> impl Iterator<Item = &'a AttendanceRecord> {
        self.records.iter().filter(move |r| r.class_id == class_id)
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}
