use super::{DecodedFrame, EAGAIN};
use crate::codec::{FrameSink, SinkConfig, VideoFrame};
use crate::{Error, Result};
use ffmpeg_next as ffmpeg;
use std::path::Path;

struct VideoTrack {
    encoder: ffmpeg::encoder::Video,
    format: ffmpeg::format::Pixel,
    stream_index: usize,
    encoder_time_base: ffmpeg::Rational,
    stream_time_base: ffmpeg::Rational,
}

/// H.264 writer into an MP4 container
///
/// The file is created by [`FfmpegSink::create`]. The encoder is opened on the
/// first frame so it takes the frame's pixel format as is.
pub struct FfmpegSink {
    output: ffmpeg::format::context::Output,
    config: SinkConfig,
    track: Option<VideoTrack>,
    next_pts: i64,
}

impl FfmpegSink {
    pub fn create(path: &Path, config: &SinkConfig) -> Result<Self> {
        let path_str = super::path_str(path)?;

        super::init()?;

        let output = ffmpeg::format::output(&path_str)
            .map_err(|e| Error::FFmpeg(format!("Failed to create output: {}", e)))?;

        log::info!(
            "Starting MP4 encoding to: {} ({} @ {} fps)",
            path_str,
            config.frame_size,
            config.frame_rate
        );
        log::info!(
            "H.264: bitrate={}, preset={}, crf={:?}",
            config.bitrate,
            config.preset,
            config.crf
        );

        Ok(Self {
            output,
            config: config.clone(),
            track: None,
            next_pts: 0,
        })
    }

    pub fn frames_encoded(&self) -> u64 {
        self.next_pts as u64
    }

    /// Encoder opened for the first frame, `None` before it.
    pub fn pixel_format(&self) -> Option<ffmpeg::format::Pixel> {
        self.track.as_ref().map(|track| track.format)
    }

    fn open_track(&mut self, format: ffmpeg::format::Pixel) -> Result<VideoTrack> {
        let codec = ffmpeg::encoder::find_by_name("libx264")
            .or_else(|| ffmpeg::encoder::find(ffmpeg::codec::Id::H264))
            .ok_or_else(|| Error::FFmpeg("H264 encoder not found".to_string()))?;

        let mut encoder = ffmpeg::codec::context::Context::new_with_codec(codec)
            .encoder()
            .video()
            .map_err(|e| Error::FFmpeg(format!("Failed to get video encoder: {}", e)))?;

        let rate = ffmpeg::Rational::from(self.config.frame_rate);
        let encoder_time_base = rate.invert();

        encoder.set_width(self.config.frame_size.width);
        encoder.set_height(self.config.frame_size.height);
        encoder.set_format(format);
        encoder.set_frame_rate(Some(rate));
        encoder.set_time_base(encoder_time_base);

        if self
            .output
            .format()
            .flags()
            .contains(ffmpeg::format::Flags::GLOBAL_HEADER)
        {
            encoder.set_flags(ffmpeg::codec::Flags::GLOBAL_HEADER);
        }

        let mut opts = ffmpeg::Dictionary::new();
        opts.set("preset", self.config.preset.as_str());
        match self.config.crf {
            Some(crf) => opts.set("crf", &crf.to_string()),
            None => encoder.set_bit_rate(self.config.bitrate as usize),
        }

        let encoder = encoder
            .open_with(opts)
            .map_err(|e| Error::FFmpeg(format!("Failed to open video encoder: {}", e)))?;

        let stream_index = {
            let mut stream = self
                .output
                .add_stream(codec)
                .map_err(|e| Error::FFmpeg(format!("Failed to add video stream: {}", e)))?;
            stream.set_parameters(&encoder);
            stream.set_time_base(encoder_time_base);
            stream.index()
        };

        self.output
            .write_header()
            .map_err(|e| Error::FFmpeg(format!("Failed to write header: {}", e)))?;

        // The muxer may pick its own time base while writing the header.
        let stream_time_base = self
            .output
            .stream(stream_index)
            .ok_or_else(|| Error::FFmpeg("Video stream missing after header".to_string()))?
            .time_base();

        Ok(VideoTrack {
            encoder,
            format,
            stream_index,
            encoder_time_base,
            stream_time_base,
        })
    }
}

impl FrameSink<DecodedFrame> for FfmpegSink {
    fn encode_frame(&mut self, frame: DecodedFrame) -> Result<()> {
        let size = frame.size();
        if size != self.config.frame_size {
            return Err(Error::FFmpeg(format!(
                "frame size changed mid-stream. current size: {}. expect size: {}",
                size, self.config.frame_size
            )));
        }

        if self.track.is_none() {
            let track = self.open_track(frame.format())?;
            self.track = Some(track);
        }

        let Self {
            output,
            track,
            next_pts,
            ..
        } = self;

        let Some(track) = track.as_mut() else {
            return Err(Error::FFmpeg("Video encoder not initialised".to_string()));
        };

        if frame.format() != track.format {
            return Err(Error::FFmpeg(format!(
                "pixel format changed mid-stream: {:?} -> {:?}",
                track.format,
                frame.format()
            )));
        }

        let mut video = frame.into_video();
        video.set_pts(Some(*next_pts));
        video.set_kind(ffmpeg::picture::Type::None);

        track
            .encoder
            .send_frame(&video)
            .map_err(|e| Error::FFmpeg(format!("Video encoding failed: {}", e)))?;
        *next_pts += 1;

        write_packets(track, output, false)
    }

    fn finish(mut self) -> Result<()> {
        let Some(mut track) = self.track.take() else {
            return Err(Error::FFmpeg("No video frames received".to_string()));
        };

        track
            .encoder
            .send_eof()
            .map_err(|e| Error::FFmpeg(format!("Failed to send EOF to video encoder: {}", e)))?;
        write_packets(&mut track, &mut self.output, true)?;

        self.output
            .write_trailer()
            .map_err(|e| Error::FFmpeg(format!("Failed to write trailer: {}", e)))?;

        log::info!("MP4 encoding completed. Frames: {}", self.frames_encoded());

        Ok(())
    }
}

fn write_packets(
    track: &mut VideoTrack,
    output: &mut ffmpeg::format::context::Output,
    eof_sent: bool,
) -> Result<()> {
    let mut packet = ffmpeg::Packet::empty();
    while packet_ready(track.encoder.receive_packet(&mut packet), eof_sent)? {
        packet.set_stream(track.stream_index);
        packet.rescale_ts(track.encoder_time_base, track.stream_time_base);
        packet
            .write_interleaved(output)
            .map_err(|e| Error::FFmpeg(format!("Failed to write packet: {}", e)))?;
    }

    Ok(())
}

/// `true` when `receive_packet` produced a packet, `false` when the encoder
/// has nothing more for now. Once EOF was sent only `Eof` ends the drain.
fn packet_ready(result: std::result::Result<(), ffmpeg::Error>, eof_sent: bool) -> Result<bool> {
    match result {
        Ok(()) => Ok(true),
        Err(ffmpeg::Error::Eof) => Ok(false),
        Err(ffmpeg::Error::Other { errno }) if errno == EAGAIN && !eof_sent => Ok(false),
        Err(e) => Err(Error::FFmpeg(format!("Failed to receive packet: {}", e))),
    }
}
