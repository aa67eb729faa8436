use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use crate::qr::{FrameDecoder, RasterBuffer};
use crate::token::TokenPayload;

/// Hold time after a successful decode; the student-side UI gets its
/// confirmation beat before the session returns to idle.
pub const VERIFY_COOLDOWN_SECONDS: i64 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanPhase {
    Idle,
    Requesting,
    Scanning,
    Verifying,
    PermissionDenied,
}

impl ScanPhase {
    pub fn as_str(self) -> &'static str {
        match self {
            ScanPhase::Idle => "idle",
            ScanPhase::Requesting => "requesting",
            ScanPhase::Scanning => "scanning",
            ScanPhase::Verifying => "verifying",
            ScanPhase::PermissionDenied => "permissionDenied",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CameraFacing {
    #[default]
    Rear,
    Front,
}

impl CameraFacing {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "rear" | "environment" => Some(CameraFacing::Rear),
            "front" | "user" => Some(CameraFacing::Front),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CameraFacing::Rear => "rear",
            CameraFacing::Front => "front",
        }
    }
}

// Handle on the granted media stream. The session owns it
// exclusively; stop_tracks is the single release path.
#[derive(Debug)]
struct CameraHandle {
    facing: CameraFacing,
    tracks_open: bool,
}

impl CameraHandle {
    fn open(facing: CameraFacing) -> Self {
        CameraHandle {
            facing,
            tracks_open: true,
        }
    }

    fn stop_tracks(&mut self) {
        self.tracks_open = false;
    }
}

#[derive(Debug, Error)]
#[error("scanner is {actual}, expected {expected}")]
pub struct ScanStateError {
    pub expected: &'static str,
    pub actual: &'static str,
}

/// What a single delivered frame did to the session.
#[derive(Debug)]
pub enum FrameOutcome {
    /// Session is not scanning; the frame was dropped untouched.
    Ignored,
    /// Stream had no full frame buffered yet; no decode was attempted.
    Skipped,
    /// Decode attempt ran and found no usable token.
    NoMatch,
    /// First successful decode of the session. The camera is already
    /// released and the session is verifying.
    Decoded(TokenPayload),
}

/// Consumer-side state machine. `Requesting` waits on the camera
/// grant; `Scanning` runs one decode attempt per delivered frame; the
/// first success releases the camera, commits once, and holds
/// `Verifying` for the cool-down.
#[derive(Debug)]
pub struct ScanSession {
    phase: ScanPhase,
    camera: Option<CameraHandle>,
    verify_until: Option<DateTime<Utc>>,
    commits: u32,
    denial: Option<String>,
}

impl ScanSession {
    pub fn new() -> Self {
        ScanSession {
            phase: ScanPhase::Idle,
            camera: None,
            verify_until: None,
            commits: 0,
            denial: None,
        }
    }

    pub fn phase(&self) -> ScanPhase {
        self.phase
    }

    pub fn commits(&self) -> u32 {
        self.commits
    }

    pub fn tracks_open(&self) -> bool {
        self.camera.as_ref().map(|c| c.tracks_open).unwrap_or(false)
    }

    pub fn facing(&self) -> Option<CameraFacing> {
        self.camera.as_ref().map(|c| c.facing)
    }

    pub fn denial(&self) -> Option<&str> {
        self.denial.as_deref()
    }

    /// Begin a session. A live previous session is stopped first; its
    /// camera does not carry over.
    pub fn start(&mut self) {
        self.stop();
        self.commits = 0;
        self.phase = ScanPhase::Requesting;
    }

    pub fn camera_granted(&mut self, facing: CameraFacing) -> Result<(), ScanStateError> {
        if self.phase != ScanPhase::Requesting {
            return Err(ScanStateError {
                expected: "requesting",
                actual: self.phase.as_str(),
            });
        }
        self.camera = Some(CameraHandle::open(facing));
        self.phase = ScanPhase::Scanning;
        Ok(())
    }

    /// Terminal display state; the user must remediate permissions
    /// and start over.
    pub fn camera_denied(&mut self, message: String) -> Result<(), ScanStateError> {
        if self.phase != ScanPhase::Requesting {
            return Err(ScanStateError {
                expected: "requesting",
                actual: self.phase.as_str(),
            });
        }
        self.release_camera();
        self.denial = Some(message);
        self.phase = ScanPhase::PermissionDenied;
        Ok(())
    }

    /// One decode attempt. Runs only while scanning, and only once
    /// the stream reports a full buffered frame; the first hit halts
    /// the loop before any further frame is looked at.
    pub fn on_frame(
        &mut self,
        frame: &RasterBuffer,
        ready: bool,
        decoder: &dyn FrameDecoder,
        now: DateTime<Utc>,
    ) -> FrameOutcome {
        if self.phase != ScanPhase::Scanning {
            return FrameOutcome::Ignored;
        }
        if !ready {
            return FrameOutcome::Skipped;
        }
        let Some(content) = decoder.decode(frame) else {
            return FrameOutcome::NoMatch;
        };
        let Ok(payload) = TokenPayload::decode(&content) else {
            // some other QR wandered into view; keep scanning
            return FrameOutcome::NoMatch;
        };
        self.release_camera();
        self.verify_until = Some(now + Duration::seconds(VERIFY_COOLDOWN_SECONDS));
        self.commits += 1;
        self.phase = ScanPhase::Verifying;
        FrameOutcome::Decoded(payload)
    }

    /// Clears the verifying hold once the cool-down has elapsed.
    pub fn tick(&mut self, now: DateTime<Utc>) {
        if self.phase == ScanPhase::Verifying {
            let done = self.verify_until.map(|t| now >= t).unwrap_or(true);
            if done {
                self.verify_until = None;
                self.phase = ScanPhase::Idle;
            }
        }
    }

    /// Teardown. Idempotent and legal from every phase, including a
    /// session that never started; always leaves the camera released.
    pub fn stop(&mut self) {
        self.release_camera();
        self.verify_until = None;
        self.denial = None;
        self.phase = ScanPhase::Idle;
    }

    fn release_camera(&mut self) {
        if let Some(camera) = self.camera.as_mut() {
            camera.stop_tracks();
        }
        self.camera = None;
    }
}

impl Default for ScanSession {
    fn default() -> Self {
        Self::new()
    }
}
