//! In-memory desktop implementations for deterministic testing.
//!
//! `MockBackend` records every call it receives and asserts that no two
//! device operations ever overlap; `MockCapture` serves canned frames.

use async_trait::async_trait;
use chrono::Utc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use vigil_core::{Result, VigilError, WindowInfo};

use crate::backend::DesktopBackend;
use crate::capture::{Frame, ScreenCapture};

/// One recorded backend call.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendCall {
    MovePointer { x: i32, y: i32 },
    Click { button: u8, at: Option<(i32, i32)> },
    TypeText(String),
    KeyChord(String),
    ListWindows,
    ActivateWindow(String),
}

/// A desktop backend that records calls instead of synthesizing input.
///
/// Panics if two device operations overlap — the executor's device mutex is
/// supposed to make that impossible, and tests lean on this to prove it.
#[derive(Default)]
pub struct MockBackend {
    calls: Mutex<Vec<BackendCall>>,
    windows: Mutex<Vec<WindowInfo>>,
    fail_reason: Mutex<Option<String>>,
    latency: Mutex<Duration>,
    in_flight: AtomicBool,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the window list returned by `list_windows`.
    pub fn with_windows(self, windows: Vec<WindowInfo>) -> Self {
        *self.windows.lock().unwrap() = windows;
        self
    }

    /// Make every subsequent device operation fail with this reason.
    pub fn fail_with(&self, reason: impl Into<String>) {
        *self.fail_reason.lock().unwrap() = Some(reason.into());
    }

    /// Add artificial latency to every operation — widens the race window
    /// for concurrency tests.
    pub fn with_latency(self, latency: Duration) -> Self {
        *self.latency.lock().unwrap() = latency;
        self
    }

    /// All calls recorded so far, in order.
    pub fn calls(&self) -> Vec<BackendCall> {
        self.calls.lock().unwrap().clone()
    }

    async fn record(&self, call: BackendCall) -> Result<()> {
        if self.in_flight.swap(true, Ordering::SeqCst) {
            panic!("concurrent device access: {call:?}");
        }
        let latency = *self.latency.lock().unwrap();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }
        let failure = self.fail_reason.lock().unwrap().clone();
        self.calls.lock().unwrap().push(call);
        self.in_flight.store(false, Ordering::SeqCst);
        match failure {
            Some(reason) => Err(VigilError::Device(reason)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl DesktopBackend for MockBackend {
    async fn move_pointer(&self, x: i32, y: i32) -> Result<()> {
        self.record(BackendCall::MovePointer { x, y }).await
    }

    async fn click(&self, button: u8, at: Option<(i32, i32)>) -> Result<()> {
        self.record(BackendCall::Click { button, at }).await
    }

    async fn type_text(&self, text: &str) -> Result<()> {
        self.record(BackendCall::TypeText(text.to_string())).await
    }

    async fn key_chord(&self, chord: &str) -> Result<()> {
        self.record(BackendCall::KeyChord(chord.to_string())).await
    }

    async fn list_windows(&self) -> Result<Vec<WindowInfo>> {
        self.record(BackendCall::ListWindows).await?;
        Ok(self.windows.lock().unwrap().clone())
    }

    async fn activate_window(&self, id: &str) -> Result<()> {
        self.record(BackendCall::ActivateWindow(id.to_string()))
            .await?;
        let known = self.windows.lock().unwrap().iter().any(|w| w.id == id);
        if known {
            Ok(())
        } else {
            Err(VigilError::Device(format!("window {id} not found")))
        }
    }
}

/// A screen source that serves a canned PNG.
pub struct MockCapture {
    png: Vec<u8>,
    fail_reason: Mutex<Option<String>>,
    captures: AtomicU64,
}

impl MockCapture {
    pub fn new() -> Self {
        Self {
            // Enough of a PNG for anything that only looks at the magic.
            png: vec![0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n'],
            fail_reason: Mutex::new(None),
            captures: AtomicU64::new(0),
        }
    }

    pub fn with_png(mut self, png: Vec<u8>) -> Self {
        self.png = png;
        self
    }

    /// Make every subsequent capture fail with this reason.
    pub fn fail_with(&self, reason: impl Into<String>) {
        *self.fail_reason.lock().unwrap() = Some(reason.into());
    }

    pub fn capture_count(&self) -> u64 {
        self.captures.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ScreenCapture for MockCapture {
    async fn capture(&self) -> Result<Frame> {
        self.captures.fetch_add(1, Ordering::SeqCst);
        if let Some(reason) = self.fail_reason.lock().unwrap().clone() {
            return Err(VigilError::Capture(reason));
        }
        Ok(Frame {
            png: self.png.clone(),
            captured_at: Utc::now(),
            file_name: None,
        })
    }
}
