//! Camera source dispatch.

use anyhow::{anyhow, Result};

use crate::config::CameraSettings;
use crate::error::WatchError;
use crate::frame::{Frame, PixelFormat};

use super::FrameSource;

#[cfg(feature = "ingest-v4l2")]
use super::v4l2::V4l2CameraSource;

/// Camera frame source.
///
/// Opening acquires the device handle; dropping releases it.
pub struct CameraSource {
    backend: CameraBackend,
}

impl std::fmt::Debug for CameraSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CameraSource").finish_non_exhaustive()
    }
}

enum CameraBackend {
    Synthetic(SyntheticCameraSource),
    #[cfg(feature = "ingest-v4l2")]
    V4l2(V4l2CameraSource),
}

impl CameraSource {
    /// Open the source named by the configured URI. Fails with
    /// `SourceUnavailable` when the device or path cannot be opened.
    pub fn open(settings: &CameraSettings) -> Result<Self, WatchError> {
        if settings.uri.starts_with("stub://") {
            let source =
                SyntheticCameraSource::open(settings).map_err(WatchError::SourceUnavailable)?;
            return Ok(Self {
                backend: CameraBackend::Synthetic(source),
            });
        }

        if !settings.uri.contains("://") {
            #[cfg(feature = "ingest-v4l2")]
            {
                let source =
                    V4l2CameraSource::open(settings).map_err(WatchError::SourceUnavailable)?;
                return Ok(Self {
                    backend: CameraBackend::V4l2(source),
                });
            }
            #[cfg(not(feature = "ingest-v4l2"))]
            {
                return Err(WatchError::SourceUnavailable(anyhow!(
                    "device capture from {} requires the ingest-v4l2 feature",
                    settings.uri
                )));
            }
        }

        Err(WatchError::SourceUnavailable(anyhow!(
            "unsupported camera uri scheme: {}",
            settings.uri
        )))
    }

    /// Capture statistics for health logging.
    pub fn stats(&self) -> SourceStats {
        match &self.backend {
            CameraBackend::Synthetic(source) => source.stats(),
            #[cfg(feature = "ingest-v4l2")]
            CameraBackend::V4l2(source) => source.stats(),
        }
    }
}

impl FrameSource for CameraSource {
    fn capture(&mut self) -> Result<Option<Frame>> {
        match &mut self.backend {
            CameraBackend::Synthetic(source) => source.capture(),
            #[cfg(feature = "ingest-v4l2")]
            CameraBackend::V4l2(source) => source.capture(),
        }
    }

    fn is_streaming(&self) -> bool {
        match &self.backend {
            CameraBackend::Synthetic(source) => source.is_streaming(),
            #[cfg(feature = "ingest-v4l2")]
            CameraBackend::V4l2(source) => source.is_streaming(),
        }
    }
}

/// Statistics for a camera source.
#[derive(Clone, Debug)]
pub struct SourceStats {
    pub frames_captured: u64,
    pub uri: String,
}

// ----------------------------------------------------------------------------
// Synthetic source (stub://) for tests and hardware-free runs
// ----------------------------------------------------------------------------

struct SyntheticCameraSource {
    uri: String,
    width: u32,
    height: u32,
    frame_count: u64,
    /// Simulated "scene" state; changes periodically so frame-change
    /// detectors have something to see.
    scene_state: u8,
    /// Stop producing after this many frames (`?frames=N`).
    frame_limit: Option<u64>,
    /// Report a transient timeout on every Mth capture (`?timeout_every=M`).
    timeout_every: Option<u64>,
    capture_attempts: u64,
}

impl SyntheticCameraSource {
    fn open(settings: &CameraSettings) -> Result<Self> {
        let (frame_limit, timeout_every) = parse_stub_query(&settings.uri)?;
        log::info!("CameraSource: connected to {} (synthetic)", settings.uri);
        Ok(Self {
            uri: settings.uri.clone(),
            width: settings.width,
            height: settings.height,
            frame_count: 0,
            scene_state: 0,
            frame_limit,
            timeout_every,
            capture_attempts: 0,
        })
    }

    fn capture(&mut self) -> Result<Option<Frame>> {
        if !self.is_streaming() {
            return Ok(None);
        }

        self.capture_attempts += 1;
        if let Some(every) = self.timeout_every {
            if self.capture_attempts % every == 0 {
                return Ok(None);
            }
        }

        self.frame_count += 1;
        let pixels = self.generate_synthetic_pixels();
        let frame = Frame::new(
            pixels,
            self.width,
            self.height,
            PixelFormat::Rgb8,
            self.frame_count,
        )?;
        Ok(Some(frame))
    }

    /// Generate a deterministic pixel pattern with occasional scene
    /// changes.
    fn generate_synthetic_pixels(&mut self) -> Vec<u8> {
        let pixel_count = (self.width * self.height * 3) as usize;

        if self.frame_count % 50 == 0 {
            self.scene_state = self.scene_state.wrapping_add(1);
        }

        let mut pixels = vec![0u8; pixel_count];
        for (i, pixel) in pixels.iter_mut().enumerate() {
            *pixel = ((i as u64 + self.frame_count + self.scene_state as u64) % 256) as u8;
        }
        pixels
    }

    fn is_streaming(&self) -> bool {
        match self.frame_limit {
            Some(limit) => self.frame_count < limit,
            None => true,
        }
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            uri: self.uri.clone(),
        }
    }
}

/// Parse `?frames=N&timeout_every=M` from a stub URI.
fn parse_stub_query(uri: &str) -> Result<(Option<u64>, Option<u64>)> {
    let Some((_, query)) = uri.split_once('?') else {
        return Ok((None, None));
    };
    let mut frames = None;
    let mut timeout_every = None;
    for pair in query.split('&').filter(|p| !p.is_empty()) {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| anyhow!("malformed stub query parameter '{}'", pair))?;
        let parsed: u64 = value
            .parse()
            .map_err(|_| anyhow!("stub parameter '{}' must be an integer", key))?;
        match key {
            "frames" => frames = Some(parsed),
            "timeout_every" => {
                if parsed == 0 {
                    return Err(anyhow!("timeout_every must be > 0"));
                }
                timeout_every = Some(parsed);
            }
            other => return Err(anyhow!("unknown stub parameter '{}'", other)),
        }
    }
    Ok((frames, timeout_every))
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
