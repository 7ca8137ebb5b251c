//! Pure-bytes MP3 duration parser. Decodes MPEG frame headers and
//! Xing/VBRI/ID3 headers well enough to recover a duration in whole seconds,
//! without needing a full decoder. Fails soft: any malformed input yields
//! `None` rather than an error, since this is only ever a fallback path for
//! formats lofty's container-level duration doesn't already give us.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

/// How much audio data to scan for a frame sync after skipping ID3v2.
const SCAN_WINDOW: usize = 64 * 1024;

/// MPEG version from the frame header's 2-bit version field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MpegVersion {
    V1,
    V2,
    V25,
}

/// Layer from the frame header's 2-bit layer field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Layer {
    L1,
    L2,
    L3,
}

#[derive(Debug, Clone, Copy)]
struct FrameHeader {
    version: MpegVersion,
    layer: Layer,
    bitrate_kbps: u32,
    sample_rate: u32,
    padding: u32,
}

impl FrameHeader {
    /// Frame size in bytes, per the standard MPEG audio formula.
    fn frame_size(&self) -> Option<u32> {
        if self.bitrate_kbps == 0 || self.sample_rate == 0 {
            return None;
        }
        let size = match self.layer {
            Layer::L1 => {
                (12 * self.bitrate_kbps * 1000 / self.sample_rate + self.padding) * 4
            }
            Layer::L2 | Layer::L3 => {
                let coeff = if matches!(self.version, MpegVersion::V1) { 144 } else { 72 };
                coeff * self.bitrate_kbps * 1000 / self.sample_rate + self.padding
            }
        };
        Some(size)
    }

    /// Samples per frame, used to turn a Xing frame count into a duration.
    fn samples_per_frame(&self) -> u32 {
        match (self.version, self.layer) {
            (MpegVersion::V1, Layer::L1) => 384,
            (MpegVersion::V1, Layer::L2) => 1152,
            (MpegVersion::V1, Layer::L3) => 1152,
            (_, Layer::L1) => 384,
            (_, Layer::L2) => 1152,
            (_, Layer::L3) => 576,
        }
    }
}

const BITRATE_TABLE_V1_L1: [u32; 16] = [0, 32, 64, 96, 128, 160, 192, 224, 256, 288, 320, 352, 384, 416, 448, 0];
const BITRATE_TABLE_V1_L2: [u32; 16] = [0, 32, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320, 384, 0];
const BITRATE_TABLE_V1_L3: [u32; 16] = [0, 32, 40, 48, 56, 64, 80, 96, 112, 128, 160, 192, 224, 256, 320, 0];
const BITRATE_TABLE_V2_L1: [u32; 16] = [0, 32, 48, 56, 64, 80, 96, 112, 128, 144, 160, 176, 192, 224, 256, 0];
const BITRATE_TABLE_V2_L23: [u32; 16] = [0, 8, 16, 24, 32, 40, 48, 56, 64, 80, 96, 112, 128, 144, 160, 0];

const SAMPLE_RATE_V1: [u32; 4] = [44100, 48000, 32000, 0];
const SAMPLE_RATE_V2: [u32; 4] = [22050, 24000, 16000, 0];
const SAMPLE_RATE_V25: [u32; 4] = [11025, 12000, 8000, 0];

/// Parse the duration of the MP3 at `path`, in whole seconds. Returns `None`
/// ("unknown") on any I/O error or unparseable header, never an error.
pub fn parse_mp3_duration(path: &Path) -> Option<u32> {
    let mut file = File::open(path).ok()?;
    let file_len = file.metadata().ok()?.len();

    let mut id3_header = [0u8; 10];
    file.read_exact(&mut id3_header).ok()?;

    let mut audio_start: u64 = 0;
    if &id3_header[0..3] == b"ID3" {
        let size = syncsafe_u32(&id3_header[6..10]);
        audio_start = 10 + size as u64;
    }

    file.seek(SeekFrom::Start(audio_start)).ok()?;
    let remaining = file_len.saturating_sub(audio_start) as usize;
    let to_read = remaining.min(SCAN_WINDOW);
    let mut buf = vec![0u8; to_read];
    file.read_exact(&mut buf).ok()?;

    let (frame_offset, header) = find_first_frame(&buf)?;

    // Xing/Info can live at header+32, +17, or +9 depending on stereo mode
    // and MPEG version; VBRI is always at header+32.
    for xing_off in [32usize, 17, 9] {
        if let Some((frames, _bytes)) = read_xing(&buf, frame_offset, xing_off) {
            if frames > 0 {
                let samples = frames as u64 * header.samples_per_frame() as u64;
                let secs = (samples as f64 / header.sample_rate as f64).round() as u32;
                return Some(secs);
            }
        }
    }
    if let Some(frames) = read_vbri(&buf, frame_offset) {
        if frames > 0 {
            let samples = frames as u64 * header.samples_per_frame() as u64;
            let secs = (samples as f64 / header.sample_rate as f64).round() as u32;
            return Some(secs);
        }
    }

    // CBR fallback: (audio_bytes - 128) * 8 / bitrate_bps, the 128 covers a
    // possible trailing ID3v1 tag.
    let audio_bytes = file_len.saturating_sub(audio_start);
    if header.bitrate_kbps == 0 {
        return None;
    }
    let usable = audio_bytes.saturating_sub(128);
    let secs = (usable * 8) / (header.bitrate_kbps as u64 * 1000);
    Some(secs as u32)
}

fn syncsafe_u32(bytes: &[u8]) -> u32 {
    ((bytes[0] as u32 & 0x7F) << 21)
        | ((bytes[1] as u32 & 0x7F) << 14)
        | ((bytes[2] as u32 & 0x7F) << 7)
        | (bytes[3] as u32 & 0x7F)
}

/// Scan `buf` for a valid MPEG frame sync (`0xFF` followed by the top 3 bits
/// of the next byte set), returning its offset and parsed header.
fn find_first_frame(buf: &[u8]) -> Option<(usize, FrameHeader)> {
    if buf.len() < 4 {
        return None;
    }
    for i in 0..buf.len() - 4 {
        if buf[i] == 0xFF && (buf[i + 1] & 0xE0) == 0xE0 {
            if let Some(header) = parse_frame_header(&buf[i..i + 4]) {
                return Some((i, header));
            }
        }
    }
    None
}

fn parse_frame_header(b: &[u8]) -> Option<FrameHeader> {
    let version_bits = (b[1] >> 3) & 0x03;
    let version = match version_bits {
        0b00 => MpegVersion::V25,
        0b10 => MpegVersion::V2,
        0b11 => MpegVersion::V1,
        _ => return None, // reserved
    };

    let layer_bits = (b[1] >> 1) & 0x03;
    let layer = match layer_bits {
        0b01 => Layer::L3,
        0b10 => Layer::L2,
        0b11 => Layer::L1,
        _ => return None, // reserved
    };

    let bitrate_index = ((b[2] >> 4) & 0x0F) as usize;
    if bitrate_index == 0 || bitrate_index == 15 {
        return None;
    }

    let sample_rate_index = ((b[2] >> 2) & 0x03) as usize;
    if sample_rate_index == 3 {
        return None;
    }

    let bitrate_kbps = match (version, layer) {
        (MpegVersion::V1, Layer::L1) => BITRATE_TABLE_V1_L1[bitrate_index],
        (MpegVersion::V1, Layer::L2) => BITRATE_TABLE_V1_L2[bitrate_index],
        (MpegVersion::V1, Layer::L3) => BITRATE_TABLE_V1_L3[bitrate_index],
        (_, Layer::L1) => BITRATE_TABLE_V2_L1[bitrate_index],
        (_, Layer::L2 | Layer::L3) => BITRATE_TABLE_V2_L23[bitrate_index],
    };

    let sample_rate = match version {
        MpegVersion::V1 => SAMPLE_RATE_V1[sample_rate_index],
        MpegVersion::V2 => SAMPLE_RATE_V2[sample_rate_index],
        MpegVersion::V25 => SAMPLE_RATE_V25[sample_rate_index],
    };

    let padding = ((b[2] >> 1) & 0x01) as u32;

    Some(FrameHeader {
        version,
        layer,
        bitrate_kbps,
        sample_rate,
        padding,
    })
}

/// Read a Xing/Info header at `frame_offset + relative_offset`, returning
/// `(frames, bytes)` if both the tag marker and the frames field are present.
fn read_xing(buf: &[u8], frame_offset: usize, relative_offset: usize) -> Option<(u32, u32)> {
    let start = frame_offset + relative_offset;
    if start + 16 > buf.len() {
        return None;
    }
    let tag = &buf[start..start + 4];
    if tag != b"Xing" && tag != b"Info" {
        return None;
    }
    let flags = u32::from_be_bytes(buf[start + 4..start + 8].try_into().ok()?);
    let mut pos = start + 8;
    let frames = if flags & 0x1 != 0 {
        let v = u32::from_be_bytes(buf[pos..pos + 4].try_into().ok()?);
        pos += 4;
        v
    } else {
        0
    };
    let bytes = if flags & 0x2 != 0 {
        u32::from_be_bytes(buf[pos..pos + 4].try_into().ok()?)
    } else {
        0
    };
    Some((frames, bytes))
}

/// Read a VBRI header at `frame_offset + 32`, returning the frame count.
fn read_vbri(buf: &[u8], frame_offset: usize) -> Option<u32> {
    let start = frame_offset + 32;
    if start + 26 > buf.len() {
        return None;
    }
    if &buf[start..start + 4] != b"VBRI" {
        return None;
    }
    // frame count is a big-endian u32 at offset 14 within the VBRI header
    let frames = u32::from_be_bytes(buf[start + 14..start + 18].try_into().ok()?);
    Some(frames)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn mpeg1_l3_header(bitrate_index: u8, sample_rate_index: u8, padding: u8) -> [u8; 4] {
        let mut b = [0xFFu8, 0xFB, 0, 0];
        b[1] = 0xE0 | (0b11 << 3) | (0b01 << 1); // MPEG1, Layer3
        b[2] = (bitrate_index << 4) | (sample_rate_index << 2) | (padding << 1);
        b
    }

    fn write_xing(frames: u32) -> Vec<u8> {
        let mut v = Vec::new();
        v.extend_from_slice(b"Xing");
        v.extend_from_slice(&0x1u32.to_be_bytes()); // flags: frames present
        v.extend_from_slice(&frames.to_be_bytes());
        v
    }

    #[test]
    fn vbr_xing_duration_matches_spec_scenario() {
        // scenario 6: frames=9000, samples_per_frame=1152, sample_rate=44100 -> 235s
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let mut f = std::fs::File::create(tmp.path()).unwrap();

        let header = mpeg1_l3_header(9, 0, 0); // bitrate idx 9 -> 128kbps, sr idx 0 -> 44100
        let mut frame = header.to_vec();
        // pad out to xing offset 32 relative to frame start
        frame.resize(32, 0);
        frame.extend_from_slice(&write_xing(9000));
        frame.resize(2000, 0);

        f.write_all(&frame).unwrap();
        drop(f);

        let secs = parse_mp3_duration(tmp.path()).unwrap();
        assert_eq!(secs, 235);
    }

    #[test]
    fn malformed_file_fails_soft() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(tmp.path(), b"not an mp3 at all, just text").unwrap();
        assert_eq!(parse_mp3_duration(tmp.path()), None);
    }

    #[test]
    fn skips_id3_header_before_scanning() {
        let tmp = tempfile::NamedTempFile::new().unwrap();
        let mut f = std::fs::File::create(tmp.path()).unwrap();

        let mut id3 = vec![b'I', b'D', b'3', 3, 0, 0];
        // syncsafe size = 10 extra bytes of tag payload
        id3.extend_from_slice(&[0, 0, 0, 10]);
        id3.extend_from_slice(&[0u8; 10]);
        f.write_all(&id3).unwrap();

        let header = mpeg1_l3_header(9, 0, 0);
        let mut frame = header.to_vec();
        frame.resize(32, 0);
        frame.extend_from_slice(&write_xing(100));
        frame.resize(2000, 0);
        f.write_all(&frame).unwrap();
        drop(f);

        let secs = parse_mp3_duration(tmp.path()).unwrap();
        assert_eq!(secs, (100u64 * 1152 / 44100) as u32);
    }
}
