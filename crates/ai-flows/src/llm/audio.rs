/// PCM layout of a raw sample stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcmFormat {
    pub channels: u16,
    pub sample_rate: u32,
    pub bits_per_sample: u16,
}

/// Native output of the speech model: mono, 24 kHz, 16-bit little-endian.
pub const SPEECH_MODEL_PCM: PcmFormat = PcmFormat {
    channels: 1,
    sample_rate: 24_000,
    bits_per_sample: 16,
};

pub const WAV_HEADER_LEN: usize = 44;
const PCM_FORMAT_TAG: u16 = 1;

impl PcmFormat {
    pub const fn block_align(self) -> u16 {
        self.channels * (self.bits_per_sample / 8)
    }

    pub const fn byte_rate(self) -> u32 {
        self.sample_rate * self.block_align() as u32
    }
}

/// Reads the sample rate from a `audio/L16;codec=pcm;rate=24000` style MIME type.
pub fn pcm_format_from_mime(mime_type: &str) -> PcmFormat {
    let sample_rate = mime_type
        .split(';')
        .filter_map(|param| param.trim().strip_prefix("rate="))
        .find_map(|rate| rate.trim().parse::<u32>().ok())
        .filter(|rate| *rate > 0)
        .unwrap_or(SPEECH_MODEL_PCM.sample_rate);

    PcmFormat {
        sample_rate,
        ..SPEECH_MODEL_PCM
    }
}

/// Wraps raw PCM bytes in a canonical 44-byte RIFF/WAVE container.
///
/// Chunk sizes saturate at `u32::MAX`; the speech model never returns payloads near that.
pub fn pcm_to_wav(pcm: &[u8], format: PcmFormat) -> Vec<u8> {
    let data_len = u32::try_from(pcm.len()).unwrap_or(u32::MAX);
    let riff_len = data_len.saturating_add((WAV_HEADER_LEN - 8) as u32);

    let mut wav = Vec::with_capacity(WAV_HEADER_LEN + pcm.len());
    wav.extend_from_slice(b"RIFF");
    wav.extend_from_slice(&riff_len.to_le_bytes());
    wav.extend_from_slice(b"WAVE");

    wav.extend_from_slice(b"fmt ");
    wav.extend_from_slice(&16_u32.to_le_bytes());
    wav.extend_from_slice(&PCM_FORMAT_TAG.to_le_bytes());
    wav.extend_from_slice(&format.channels.to_le_bytes());
    wav.extend_from_slice(&format.sample_rate.to_le_bytes());
    wav.extend_from_slice(&format.byte_rate().to_le_bytes());
    wav.extend_from_slice(&format.block_align().to_le_bytes());
    wav.extend_from_slice(&format.bits_per_sample.to_le_bytes());

    wav.extend_from_slice(b"data");
    wav.extend_from_slice(&data_len.to_le_bytes());
    wav.extend_from_slice(pcm);
    wav
}
