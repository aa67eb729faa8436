use serde::Deserialize;

use crate::attendance::AttendanceLog;
use crate::issuer::Issuer;
use crate::qr::QrFrameDecoder;
use crate::scanner::ScanSession;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

pub struct AppState {
    pub issuer: Issuer,
    pub scanner: ScanSession,
    pub attendance: AttendanceLog,
    pub decoder: QrFrameDecoder,
}

impl AppState {
    pub fn new() -> Self {
        AppState {
            issuer: Issuer::new(),
            scanner: ScanSession::new(),
            attendance: AttendanceLog::new(),
            decoder: QrFrameDecoder,
        }
    }
}
