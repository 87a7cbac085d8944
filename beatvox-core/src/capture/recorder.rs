//! Assembly of captured PCM chunks into a WAV payload

use std::io::Cursor;

use hound::{SampleFormat, WavSpec, WavWriter};

use super::{AudioProfile, CaptureError};

/// Encode i16 little-endian PCM bytes as a complete WAV file in memory.
pub fn encode_wav(pcm: &[u8], profile: AudioProfile) -> Result<Vec<u8>, CaptureError> {
    let spec = WavSpec {
        channels: profile.channels,
        sample_rate: profile.sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = WavWriter::new(&mut cursor, spec)
            .map_err(|e| CaptureError::Recorder(e.to_string()))?;
        for sample in pcm.chunks_exact(2) {
            let value = i16::from_le_bytes([sample[0], sample[1]]);
            writer
                .write_sample(value)
                .map_err(|e| CaptureError::Recorder(e.to_string()))?;
        }
        writer
            .finalize()
            .map_err(|e| CaptureError::Recorder(e.to_string()))?;
    }

    Ok(cursor.into_inner())
}
