#![cfg(feature = "ingest-v4l2")]

//! V4L2 device capture.
//!
//! Opens a local device node (e.g. /dev/video0), negotiates packed RGB
//! output, and captures frames through a memory-mapped buffer stream.
//! The device handle is held exclusively and released on drop.

use anyhow::{anyhow, Context, Result};
use ouroboros::self_referencing;
use std::io::ErrorKind;

use crate::config::CameraSettings;
use crate::frame::{Frame, PixelFormat};

use super::camera::SourceStats;

pub(super) struct V4l2CameraSource {
    uri: String,
    state: DeviceState,
    frame_count: u64,
    active_width: u32,
    active_height: u32,
    last_error: Option<String>,
}

#[self_referencing]
struct DeviceState {
    device: v4l::Device,
    #[borrows(mut device)]
    #[covariant]
    stream: v4l::prelude::MmapStream<'this, v4l::Device>,
}

impl V4l2CameraSource {
    pub(super) fn open(settings: &CameraSettings) -> Result<Self> {
        use v4l::buffer::Type;
        use v4l::video::Capture;

        let mut device = v4l::Device::with_path(&settings.uri)
            .with_context(|| format!("open v4l2 device {}", settings.uri))?;

        let mut format = device.format().context("read v4l2 format")?;
        format.width = settings.width;
        format.height = settings.height;
        format.fourcc = v4l::FourCC::new(b"RGB3");
        let format = match device.set_format(&format) {
            Ok(format) => format,
            Err(err) => {
                log::warn!(
                    "CameraSource: failed to set format on {}: {}",
                    settings.uri,
                    err
                );
                device
                    .format()
                    .context("read v4l2 format after set failure")?
            }
        };
        if &format.fourcc.repr != b"RGB3" {
            return Err(anyhow!(
                "device {} does not support packed RGB capture (active format {})",
                settings.uri,
                format.fourcc
            ));
        }

        if settings.target_fps > 0 {
            let params = v4l::video::capture::Parameters::with_fps(settings.target_fps);
            if let Err(err) = device.set_params(&params) {
                log::warn!(
                    "CameraSource: failed to set fps on {}: {}",
                    settings.uri,
                    err
                );
            }
        }

        let mut state = DeviceStateTryBuilder {
            device,
            stream_builder: |device| {
                v4l::prelude::MmapStream::with_buffers(device, Type::VideoCapture, 4)
                    .map_err(|err| anyhow::Error::new(err).context("create v4l2 buffer stream"))
            },
        }
        .try_build()?;

        // Bound each dequeue so a stalled device surfaces as a transient
        // timeout and the run loop stays responsive to shutdown.
        let frame_timeout = settings.frame_timeout();
        state.with_stream_mut(|stream| stream.set_timeout(frame_timeout));

        log::info!(
            "CameraSource: connected to {} ({}x{})",
            settings.uri,
            format.width,
            format.height
        );

        Ok(Self {
            uri: settings.uri.clone(),
            state,
            frame_count: 0,
            active_width: format.width,
            active_height: format.height,
            last_error: None,
        })
    }

    pub(super) fn capture(&mut self) -> Result<Option<Frame>> {
        use v4l::io::traits::CaptureStream;

        let next = self.state.with_stream_mut(|stream| {
            stream.next().map(|(buf, _meta)| buf.to_vec())
        });
        let buf = match next {
            Ok(buf) => buf,
            // A capture that misses its deadline is a transient timeout.
            Err(err) if matches!(err.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => {
                return Ok(None);
            }
            Err(err) => {
                self.last_error = Some(err.to_string());
                return Err(anyhow::Error::new(err).context("capture v4l2 frame"));
            }
        };

        let expected = (self.active_width as usize) * (self.active_height as usize) * 3;
        if buf.len() < expected {
            let err = anyhow!(
                "short v4l2 buffer: {} bytes, expected {}",
                buf.len(),
                expected
            );
            self.last_error = Some(err.to_string());
            return Err(err);
        }

        self.frame_count += 1;
        let frame = Frame::new(
            buf[..expected].to_vec(),
            self.active_width,
            self.active_height,
            PixelFormat::Rgb8,
            self.frame_count,
        )?;
        Ok(Some(frame))
    }

    pub(super) fn is_streaming(&self) -> bool {
        self.last_error.is_none()
    }

    pub(super) fn stats(&self) -> SourceStats {
        SourceStats {
            frames_captured: self.frame_count,
            uri: self.uri.clone(),
        }
    }
}
