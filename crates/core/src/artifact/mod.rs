use bytes::Bytes;
use std::io::Cursor;
use std::path::Path;
use std::time::Duration;
use symphonia::core::codecs::CODEC_TYPE_NULL;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

pub const DEFAULT_AUDIO_FILE_NAME: &str = "emotional_story.wav";

#[derive(thiserror::Error, Debug)]
pub enum ArtifactError {
    #[error("failed to write audio to {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("unrecognized audio payload: {0}")]
    Probe(String),

    #[error("audio payload has no playable track")]
    NoTrack,
}

/// Audio produced by a finished job.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AudioArtifact {
    pub bytes: Bytes,
    pub content_type: Option<String>,
}

/// What the payload turned out to contain.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AudioInfo {
    pub sample_rate_hz: u32,
    pub channels: u16,
    pub duration: Option<Duration>,
}

impl AudioArtifact {
    pub fn new(bytes: Bytes, content_type: Option<String>) -> Self {
        Self {
            bytes,
            content_type,
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub async fn save(&self, path: &Path) -> Result<(), ArtifactError> {
        tokio::fs::write(path, &self.bytes)
            .await
            .map_err(|source| ArtifactError::Write {
                path: path.display().to_string(),
                source,
            })?;
        tracing::debug!(path = %path.display(), bytes = self.bytes.len(), "audio saved");
        Ok(())
    }

    pub fn probe(&self) -> Result<AudioInfo, ArtifactError> {
        let cursor = Cursor::new(self.bytes.to_vec());
        let mss = MediaSourceStream::new(Box::new(cursor), Default::default());

        let mut hint = Hint::new();
        if let Some(mime) = self.content_type.as_deref() {
            hint.mime_type(mime);
        }

        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(|e| ArtifactError::Probe(e.to_string()))?;

        let track = probed
            .format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or(ArtifactError::NoTrack)?;
        let params = &track.codec_params;

        let sample_rate_hz = params.sample_rate.ok_or(ArtifactError::NoTrack)?;
        let channels = params
            .channels
            .map(|c| c.count() as u16)
            .ok_or(ArtifactError::NoTrack)?;
        let duration = params
            .n_frames
            .map(|frames| Duration::from_secs_f64(frames as f64 / f64::from(sample_rate_hz)));

        Ok(AudioInfo {
            sample_rate_hz,
            channels,
            duration,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wav_bytes(sample_rate: u32, channels: u16, frames: u32) -> Vec<u8> {
        let bits: u16 = 16;
        let block_align = channels * bits / 8;
        let data_len = frames * u32::from(block_align);
        let mut out = Vec::with_capacity(44 + data_len as usize);
        out.extend_from_slice(b"RIFF");
        out.extend_from_slice(&(36 + data_len).to_le_bytes());
        out.extend_from_slice(b"WAVE");
        out.extend_from_slice(b"fmt ");
        out.extend_from_slice(&16u32.to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes());
        out.extend_from_slice(&channels.to_le_bytes());
        out.extend_from_slice(&sample_rate.to_le_bytes());
        out.extend_from_slice(&(sample_rate * u32::from(block_align)).to_le_bytes());
        out.extend_from_slice(&block_align.to_le_bytes());
        out.extend_from_slice(&bits.to_le_bytes());
        out.extend_from_slice(b"data");
        out.extend_from_slice(&data_len.to_le_bytes());
        out.resize(44 + data_len as usize, 0);
        out
    }

    #[test]
    fn probes_wav_payload() {
        let artifact = AudioArtifact::new(
            Bytes::from(wav_bytes(22_050, 1, 22_050)),
            Some("audio/wav".to_owned()),
        );
        let info = artifact.probe().expect("wav probes");
        assert_eq!(info.sample_rate_hz, 22_050);
        assert_eq!(info.channels, 1);
        assert_eq!(info.duration, Some(Duration::from_secs(1)));
    }

    #[test]
    fn garbage_is_not_audio() {
        let artifact = AudioArtifact::new(Bytes::from_static(b"definitely not audio"), None);
        assert!(artifact.probe().is_err());
    }

    #[tokio::test]
    async fn save_writes_bytes() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join(DEFAULT_AUDIO_FILE_NAME);

        let artifact = AudioArtifact::new(Bytes::from_static(b"RIFF...."), None);
        artifact.save(&path).await.expect("saved");
        assert_eq!(std::fs::read(&path).expect("read back"), b"RIFF....");
    }

    #[tokio::test]
    async fn save_into_missing_directory_fails() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("absent").join(DEFAULT_AUDIO_FILE_NAME);

        let artifact = AudioArtifact::new(Bytes::from_static(b"RIFF...."), None);
        let err = artifact.save(&path).await.expect_err("no parent dir");
        assert!(matches!(err, ArtifactError::Write { .. }));
    }
}
