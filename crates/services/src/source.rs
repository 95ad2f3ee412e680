use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::debug;

use beatwise_audio::AudioDecoder;
use beatwise_domain::SampleBuffer;

/// Produces a decoded channel for a track.
#[async_trait]
pub trait SampleSource: Send + Sync {
    async fn load(&self, path: &Path) -> Result<SampleBuffer>;
}

/// Decodes local files with symphonia on the blocking pool.
#[derive(Debug, Clone, Copy, Default)]
pub struct DecoderSource {
    channel: usize,
}

impl DecoderSource {
    pub fn new(channel: usize) -> Self {
        Self { channel }
    }
}

#[async_trait]
impl SampleSource for DecoderSource {
    async fn load(&self, path: &Path) -> Result<SampleBuffer> {
        let owned = path.to_path_buf();
        let channel = self.channel;
        debug!(path = %owned.display(), channel, "decoding track");
        tokio::task::spawn_blocking(move || AudioDecoder::open(&owned)?.into_channel(channel))
            .await
            .context("decode task failed")?
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_file_fails_to_load() {
        let source = DecoderSource::new(0);
        assert!(source.load(Path::new("missing.wav")).await.is_err());
    }
}
