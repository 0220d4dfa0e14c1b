use super::{DecodedFrame, EAGAIN};
use crate::codec::{FrameSource, VideoFrame};
use crate::{Error, Result};
use ffmpeg_next as ffmpeg;
use std::path::Path;

/// Decoder for the best video stream of a media file
pub struct FfmpegSource {
    input: Option<ffmpeg::format::context::Input>,
    decoder: ffmpeg::decoder::Video,
    stream_index: usize,
    time_base: f64,
    /// Stream start time in seconds, subtracted from every timestamp
    start_offset: f64,
    frame_rate: Option<f64>,
    pending: Option<DecodedFrame>,
    last_timestamp: Option<f64>,
    draining: bool,
    finished: bool,
}

impl FfmpegSource {
    pub fn open(path: &Path) -> Result<Self> {
        let path_str = super::path_str(path)?;

        if !path.exists() {
            return Err(Error::IO(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("File not found: {}", path_str),
            )));
        }

        super::init()?;

        let input = ffmpeg::format::input(&path_str)
            .map_err(|e| Error::FFmpeg(format!("Failed to open input: {}", e)))?;

        let (stream_index, time_base, start_time, frame_rate, decoder) = {
            let video_stream = input
                .streams()
                .best(ffmpeg::media::Type::Video)
                .ok_or_else(|| Error::FFmpeg("No video stream found in input file".to_string()))?;

            let decoder_context =
                ffmpeg::codec::context::Context::from_parameters(video_stream.parameters())
                    .map_err(|e| Error::FFmpeg(format!("Failed to create decoder context: {}", e)))?;

            let decoder = decoder_context
                .decoder()
                .video()
                .map_err(|e| Error::FFmpeg(format!("Failed to create video decoder: {}", e)))?;

            let frame_rate = positive_rate(video_stream.avg_frame_rate())
                .or_else(|| positive_rate(video_stream.rate()));

            (
                video_stream.index(),
                f64::from(video_stream.time_base()),
                video_stream.start_time(),
                frame_rate,
                decoder,
            )
        };

        let start_offset = if start_time == ffmpeg::sys::AV_NOPTS_VALUE {
            0.0
        } else {
            start_time as f64 * time_base
        };

        log::info!(
            "Opened {}: {}x{} {:?}, {:?} fps",
            path_str,
            decoder.width(),
            decoder.height(),
            decoder.format(),
            frame_rate
        );

        Ok(Self {
            input: Some(input),
            decoder,
            stream_index,
            time_base,
            start_offset,
            frame_rate,
            pending: None,
            last_timestamp: None,
            draining: false,
            finished: false,
        })
    }

    /// Send the next packet of the video stream to the decoder, or EOF once
    /// the container has no packets left.
    fn feed_packet(&mut self) -> Result<()> {
        let input = self
            .input
            .as_mut()
            .ok_or_else(|| Error::FFmpeg("Input already closed".to_string()))?;

        let mut packet = ffmpeg::Packet::empty();
        loop {
            match packet.read(input) {
                Ok(()) => {
                    if packet.stream() != self.stream_index {
                        continue;
                    }

                    return self
                        .decoder
                        .send_packet(&packet)
                        .map_err(|e| Error::FFmpeg(format!("Decoder send failed: {}", e)));
                }
                Err(ffmpeg::Error::Eof) => {
                    self.draining = true;
                    return self
                        .decoder
                        .send_eof()
                        .map_err(|e| Error::FFmpeg(format!("Failed to send EOF to decoder: {}", e)));
                }
                Err(e) => return Err(Error::FFmpeg(format!("Failed to read packet: {}", e))),
            }
        }
    }

    fn decode_next(&mut self) -> Result<Option<DecodedFrame>> {
        let mut decoded = ffmpeg::frame::Video::empty();

        loop {
            match self.decoder.receive_frame(&mut decoded) {
                Ok(()) => {
                    let timestamp = self.frame_time(&decoded);
                    self.last_timestamp = Some(timestamp);
                    return Ok(Some(DecodedFrame::new(decoded, timestamp)));
                }
                Err(ffmpeg::Error::Eof) => {
                    self.finished = true;
                    return Ok(None);
                }
                Err(ffmpeg::Error::Other { errno }) if errno == EAGAIN && !self.draining => {
                    self.feed_packet()?;
                }
                Err(ffmpeg::Error::Other { errno }) if errno == EAGAIN => {
                    self.finished = true;
                    return Ok(None);
                }
                Err(e) => return Err(Error::FFmpeg(format!("Decoder receive failed: {}", e))),
            }
        }
    }

    fn frame_time(&self, frame: &ffmpeg::frame::Video) -> f64 {
        match frame.timestamp().or_else(|| frame.pts()) {
            Some(pts) => pts as f64 * self.time_base - self.start_offset,
            None => {
                let step = self.frame_rate.map(|rate| 1.0 / rate).unwrap_or(0.0);
                self.last_timestamp.map(|t| t + step).unwrap_or(0.0)
            }
        }
    }
}

impl FrameSource for FfmpegSource {
    type Frame = DecodedFrame;

    fn seek_precise(&mut self, seconds: f64) -> Result<()> {
        if seconds > 0.0 {
            let input = self
                .input
                .as_mut()
                .ok_or_else(|| Error::FFmpeg("Input already closed".to_string()))?;

            // Land on the keyframe at or before the target, then decode forward.
            let target = ((seconds + self.start_offset) * ffmpeg::sys::AV_TIME_BASE as f64) as i64;
            input
                .seek(target, ..=target)
                .map_err(|e| Error::FFmpeg(format!("Failed to seek: {}", e)))?;
        }

        self.decoder.flush();
        self.pending = None;
        self.last_timestamp = None;
        self.draining = false;
        self.finished = false;

        // Half a frame of slack so a frame stamped 4.9999s still counts as 5s.
        let tolerance = self.frame_rate.map(|rate| 0.5 / rate).unwrap_or(0.0);
        let mut discarded = 0usize;

        while let Some(frame) = self.decode_next()? {
            if frame.timestamp() + tolerance >= seconds {
                log::debug!(
                    "Seeked to {:.3}s, first frame at {:.3}s after {} pre-roll frames",
                    seconds,
                    frame.timestamp(),
                    discarded
                );
                self.pending = Some(frame);
                return Ok(());
            }
            discarded += 1;
        }

        log::debug!("Seek to {:.3}s reached end of stream", seconds);
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<DecodedFrame>> {
        if let Some(frame) = self.pending.take() {
            return Ok(Some(frame));
        }

        if self.finished {
            return Ok(None);
        }

        self.decode_next()
    }

    fn frame_rate(&self) -> Option<f64> {
        self.frame_rate
    }

    fn close(&mut self) -> Result<()> {
        if self.input.take().is_some() {
            log::debug!("Input closed");
        }
        Ok(())
    }
}

fn positive_rate(rate: ffmpeg::Rational) -> Option<f64> {
    if rate.numerator() > 0 && rate.denominator() > 0 {
        Some(f64::from(rate))
    } else {
        None
    }
}
