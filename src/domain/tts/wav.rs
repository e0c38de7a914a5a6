//! WAV framing for raw PCM returned by the speech API.
//!
//! The API streams headerless PCM described by a MIME-like string such as
//! `audio/L16;codec=pcm;rate=24000`. Players need a RIFF container, so the
//! samples are prefixed with a canonical 44-byte header.

pub const DEFAULT_SAMPLE_RATE: u32 = 24_000;
pub const DEFAULT_BITS_PER_SAMPLE: u16 = 16;
pub const HEADER_LEN: usize = 44;

const CHANNELS: u16 = 1;
const PCM_FORMAT: u16 = 1;
const FMT_CHUNK_LEN: u32 = 16;

const WAV_MIME_TYPES: [&str; 4] = ["audio/wav", "audio/x-wav", "audio/wave", "audio/vnd.wave"];

/// Sample layout parsed from a content descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioFormat {
    pub sample_rate: u32,
    pub bits_per_sample: u16,
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            bits_per_sample: DEFAULT_BITS_PER_SAMPLE,
        }
    }
}

impl AudioFormat {
    /// Parse `rate=<int>` and an `L<int>` subtype out of a descriptor.
    /// Anything unparseable keeps the default.
    pub fn from_descriptor(descriptor: &str) -> Self {
        let mut format = Self::default();

        for param in descriptor.split(';').map(str::trim) {
            if let Some(value) = strip_prefix_ignore_case(param, "rate=") {
                if let Some(rate) = value.trim().parse::<u32>().ok().filter(|r| *r > 0) {
                    format.sample_rate = rate;
                }
            } else if let Some((_, subtype)) = param.split_once('/') {
                if let Some(bits) = parse_linear_subtype(subtype) {
                    format.bits_per_sample = bits;
                }
            }
        }

        format
    }

    fn block_align(&self) -> u16 {
        CHANNELS * (self.bits_per_sample / 8)
    }

    fn byte_rate(&self) -> u32 {
        self.sample_rate.saturating_mul(u32::from(self.block_align()))
    }
}

/// Fields of a canonical PCM WAV header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavHeader {
    pub chunk_size: u32,
    pub channels: u16,
    pub sample_rate: u32,
    pub byte_rate: u32,
    pub block_align: u16,
    pub bits_per_sample: u16,
    pub data_len: u32,
}

impl WavHeader {
    /// Read a canonical 44-byte header. `None` for anything else.
    pub fn parse(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < HEADER_LEN
            || &bytes[0..4] != b"RIFF"
            || &bytes[8..12] != b"WAVE"
            || &bytes[12..16] != b"fmt "
            || &bytes[36..40] != b"data"
        {
            return None;
        }

        Some(Self {
            chunk_size: read_u32(bytes, 4),
            channels: read_u16(bytes, 22),
            sample_rate: read_u32(bytes, 24),
            byte_rate: read_u32(bytes, 28),
            block_align: read_u16(bytes, 32),
            bits_per_sample: read_u16(bytes, 34),
            data_len: read_u32(bytes, 40),
        })
    }
}

/// True when the descriptor already names a playable WAV container
pub fn is_container_descriptor(descriptor: &str) -> bool {
    let base = descriptor
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    WAV_MIME_TYPES.contains(&base.as_str())
}

/// Wrap raw PCM samples in a WAV container.
///
/// Input that is already a WAV file (by descriptor or by header) is returned
/// unchanged, so encoding twice is harmless.
pub fn encode(raw: &[u8], descriptor: &str) -> Vec<u8> {
    if is_container_descriptor(descriptor) || WavHeader::parse(raw).is_some() {
        return raw.to_vec();
    }

    let format = AudioFormat::from_descriptor(descriptor);
    let data_len = u32::try_from(raw.len()).unwrap_or(u32::MAX);

    let mut out = Vec::with_capacity(HEADER_LEN + raw.len());
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&data_len.saturating_add(36).to_le_bytes());
    out.extend_from_slice(b"WAVE");
    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&FMT_CHUNK_LEN.to_le_bytes());
    out.extend_from_slice(&PCM_FORMAT.to_le_bytes());
    out.extend_from_slice(&CHANNELS.to_le_bytes());
    out.extend_from_slice(&format.sample_rate.to_le_bytes());
    out.extend_from_slice(&format.byte_rate().to_le_bytes());
    out.extend_from_slice(&format.block_align().to_le_bytes());
    out.extend_from_slice(&format.bits_per_sample.to_le_bytes());
    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_len.to_le_bytes());
    out.extend_from_slice(raw);
    out
}

fn strip_prefix_ignore_case<'a>(value: &'a str, prefix: &str) -> Option<&'a str> {
    let head = value.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix)
        .then(|| &value[prefix.len()..])
}

/// `L16` -> 16
fn parse_linear_subtype(subtype: &str) -> Option<u16> {
    let digits = subtype.trim().strip_prefix(['L', 'l'])?;
    digits.parse::<u16>().ok().filter(|bits| *bits > 0)
}

fn read_u16(bytes: &[u8], at: usize) -> u16 {
    u16::from_le_bytes([bytes[at], bytes[at + 1]])
}

fn read_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}
