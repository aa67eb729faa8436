use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::clock::{format_countdown, ExpiryClock};
use crate::token::{AttendanceToken, GeoPoint, TokenPayload};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IssuerPhase {
    Idle,
    Generating,
    Active,
    Expired,
}

impl IssuerPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            IssuerPhase::Idle => "idle",
            IssuerPhase::Generating => "generating",
            IssuerPhase::Active => "active",
            IssuerPhase::Expired => "expired",
        }
    }
}

#[derive(Debug, Error)]
pub enum LocationError {
    #[error("geolocation unavailable: {0}")]
    Denied(String),
    #[error("geolocation is not supported on this device")]
    Unsupported,
}

/// One-shot "current position" boundary. The dashboard frontend owns
/// the actual device call and forwards its outcome with each request.
pub trait LocationProvider {
    fn current_position(&mut self) -> Result<GeoPoint, LocationError>;
}

/// Location outcome carried inside an IPC request: either a fix or
/// the failure message the device reported. Neither means the device
/// has no geolocation at all.
#[derive(Debug)]
pub struct ReportedFix {
    pub fix: Option<GeoPoint>,
    pub error: Option<String>,
}

impl LocationProvider for ReportedFix {
    fn current_position(&mut self) -> Result<GeoPoint, LocationError> {
        match (self.fix.take(), self.error.take()) {
            (Some(fix), _) => Ok(fix),
            (None, Some(message)) => Err(LocationError::Denied(message)),
            (None, None) => Err(LocationError::Unsupported),
        }
    }
}

/// Snapshot returned by `status` and `tick`.
#[derive(Debug, Clone)]
pub struct IssuerStatus {
    pub phase: IssuerPhase,
    pub class_id: Option<String>,
    pub token_id: Option<String>,
    pub validity_seconds: Option<i64>,
    pub remaining_seconds: Option<i64>,
    pub countdown: Option<String>,
    pub expired_notice: bool,
}

/// Everything a successful mint hands back, cloned out so the caller
/// holds no borrow on the issuer.
#[derive(Debug, Clone)]
pub struct MintedToken {
    pub payload: TokenPayload,
    pub validity_seconds: i64,
    pub code: String,
}

/// Issuer-side state machine: Idle -> Generating -> Active ->
/// Expired, with regeneration looping back through Generating. At
/// most one token is ever live.
#[derive(Debug)]
pub struct Issuer {
    phase: IssuerPhase,
    token: Option<AttendanceToken>,
    clock: Option<ExpiryClock>,
}

impl Issuer {
    pub fn new() -> Self {
        Issuer {
            phase: IssuerPhase::Idle,
            token: None,
            clock: None,
        }
    }

    pub fn phase(&self) -> IssuerPhase {
        self.phase
    }

    pub fn token(&self) -> Option<&AttendanceToken> {
        self.token.as_ref()
    }

    /// Mint a fresh token for `class_id`. Any live token is discarded
    /// and its clock cancelled before the new window starts; a failed
    /// location fix leaves the issuer idle with nothing minted.
    pub fn generate(
        &mut self,
        class_id: &str,
        validity_seconds: i64,
        location: &mut dyn LocationProvider,
        now: DateTime<Utc>,
    ) -> Result<MintedToken, LocationError> {
        self.teardown();
        self.phase = IssuerPhase::Generating;
        let fix = match location.current_position() {
            Ok(fix) => fix,
            Err(e) => {
                self.phase = IssuerPhase::Idle;
                return Err(e);
            }
        };
        let payload = TokenPayload::mint(class_id, fix, now);
        let minted = MintedToken {
            payload: payload.clone(),
            validity_seconds,
            code: payload.encode(),
        };
        self.token = Some(AttendanceToken::new(payload, validity_seconds));
        self.clock = Some(ExpiryClock::start(now, validity_seconds));
        self.phase = IssuerPhase::Active;
        Ok(minted)
    }

    /// Countdown heartbeat. The first call at or past the deadline
    /// moves Active to Expired; that snapshot alone carries the
    /// expiry notice.
    pub fn tick(&mut self, now: DateTime<Utc>) -> IssuerStatus {
        let mut notice = false;
        if self.phase == IssuerPhase::Active {
            if let Some(clock) = self.clock.as_mut() {
                if clock.poll(now) {
                    self.phase = IssuerPhase::Expired;
                    notice = true;
                }
            }
        }
        let mut status = self.status(now);
        status.expired_notice = notice;
        status
    }

    /// Pure read; never transitions.
    pub fn status(&self, now: DateTime<Utc>) -> IssuerStatus {
        let (remaining, countdown) = match (self.phase, self.clock.as_ref()) {
            (IssuerPhase::Active, Some(clock)) => (
                Some(clock.remaining_seconds(now)),
                Some(clock.countdown(now)),
            ),
            (IssuerPhase::Expired, _) => (Some(0), Some(format_countdown(0))),
            _ => (None, None),
        };
        IssuerStatus {
            phase: self.phase,
            class_id: self.token.as_ref().map(|t| t.payload.class_id.clone()),
            token_id: self.token.as_ref().map(|t| t.payload.token_id.clone()),
            validity_seconds: self.token.as_ref().map(|t| t.validity_seconds),
            remaining_seconds: remaining,
            countdown,
            expired_notice: false,
        }
    }

    /// Navigate-away path: cancels the clock (its notice never fires)
    /// and drops the token. Safe to call repeatedly.
    pub fn reset(&mut self) {
        self.teardown();
    }

    fn teardown(&mut self) {
        if let Some(clock) = self.clock.as_mut() {
            clock.cancel();
        }
        self.clock = None;
        self.token = None;
        self.phase = IssuerPhase::Idle;
    }
}

impl Default for Issuer {
    fn default() -> Self {
        Self::new()
    }
}
