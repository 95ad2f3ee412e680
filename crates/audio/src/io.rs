use std::fs::File;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use symphonia::core::audio::{AudioBufferRef, SampleBuffer as InterleavedBuffer, Signal};
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::debug;

use beatwise_domain::SampleBuffer;

/// Fully decoded track, one sample vector per channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecodedAudio {
    pub sample_rate: u32,
    pub channels: Vec<Vec<f32>>,
}

impl DecodedAudio {
    pub fn frames(&self) -> usize {
        self.channels.first().map(Vec::len).unwrap_or(0)
    }

    /// Takes one channel out of the decoded audio as an engine input.
    pub fn into_channel(mut self, index: usize) -> Result<SampleBuffer> {
        if index >= self.channels.len() {
            return Err(anyhow!(
                "channel {} requested but track has {} channel(s)",
                index,
                self.channels.len()
            ));
        }
        let samples = self.channels.swap_remove(index);
        SampleBuffer::new(samples, self.sample_rate).map_err(Into::into)
    }
}

pub struct AudioDecoder;

impl AudioDecoder {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<DecodedAudio> {
        let path_ref = path.as_ref();
        let file =
            File::open(path_ref).with_context(|| format!("open audio file {:?}", path_ref))?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());
        let mut hint = Hint::new();
        if let Some(ext) = path_ref.extension().and_then(|ext| ext.to_str()) {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .with_context(|| format!("probe audio format {:?}", path_ref))?;
        let mut format = probed.format;
        let track = format
            .default_track()
            .ok_or_else(|| anyhow!("no default track found"))?;
        let track_id = track.id;
        let sample_rate = track
            .codec_params
            .sample_rate
            .ok_or_else(|| anyhow!("track does not declare a sample rate"))?;
        let channel_count = track
            .codec_params
            .channels
            .map(|c| c.count())
            .unwrap_or(1);
        let mut decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())?;
        let mut channels = vec![Vec::new(); channel_count];

        loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                Err(SymphError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    break;
                }
                Err(SymphError::ResetRequired) => break,
                Err(err) => return Err(err.into()),
            };
            if packet.track_id() != track_id {
                continue;
            }
            match decoder.decode(&packet) {
                Ok(buffer) => append_planar(&mut channels, buffer),
                Err(SymphError::DecodeError(reason)) => {
                    debug!(reason, "skipping undecodable packet");
                }
                Err(err) => return Err(err.into()),
            }
        }

        debug!(
            sample_rate,
            channels = channels.len(),
            frames = channels.first().map(Vec::len).unwrap_or(0),
            "decoded audio file"
        );
        Ok(DecodedAudio {
            sample_rate,
            channels,
        })
    }
}

fn append_planar(channels: &mut Vec<Vec<f32>>, buffer: AudioBufferRef<'_>) {
    let count = buffer.spec().channels.count();
    if count == 0 {
        return;
    }
    if channels.len() < count {
        channels.resize(count, Vec::new());
    }
    match buffer {
        AudioBufferRef::F32(buf) => {
            for (ch, out) in channels.iter_mut().enumerate().take(count) {
                out.extend_from_slice(buf.chan(ch));
            }
        }
        other => {
            let spec = *other.spec();
            let mut interleaved = InterleavedBuffer::<f32>::new(other.frames() as u64, spec);
            interleaved.copy_interleaved_ref(other);
            for frame in interleaved.samples().chunks_exact(count) {
                for (out, sample) in channels.iter_mut().zip(frame) {
                    out.push(*sample);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decoder_handles_missing_file() {
        let result = AudioDecoder::open("does-not-exist.wav");
        assert!(result.is_err());
    }

    #[test]
    fn into_channel_rejects_out_of_range_index() {
        let audio = DecodedAudio {
            sample_rate: 44_100,
            channels: vec![vec![0.0; 4], vec![0.5; 4]],
        };
        assert_eq!(audio.frames(), 4);
        assert!(audio.clone().into_channel(2).is_err());
        let right = audio.into_channel(1).unwrap();
        assert_eq!(right.samples(), &[0.5; 4]);
        assert_eq!(right.sample_rate(), 44_100);
    }
}
