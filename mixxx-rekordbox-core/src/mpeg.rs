//! MPEG audio header inspection
//!
//! Encoders may write up to three layers of metadata into the first audio
//! frame of an MP3 file:
//! - Xing/Info header: frame count, byte count, seek TOC (VBR header)
//! - LAME tag: encoder string, delays, music length and music CRC
//!
//! Which of these are present decides how many samples a decoder drops at
//! stream start, see [`crate::offset`].
//!
//! Reference: http://gabriel.mp3-tech.org/mp3infotag.html

use std::fs::File;
use std::io::{Cursor, Read, Seek, SeekFrom};
use std::path::Path;

use binrw::{BinRead, BinReaderExt};

use crate::error::{Error, Result};

/// ID3v2 header length (the tag size field excludes it)
const ID3V2_HEADER_LEN: usize = 10;

/// How far past the ID3v2 tag we look for the first frame sync
const SYNC_WINDOW: u64 = 64 * 1024;

/// Xing flag bits gating the optional fields
const XING_FRAMES: u32 = 0x0001;
const XING_BYTES: u32 = 0x0002;
const XING_TOC: u32 = 0x0004;
const XING_QUALITY: u32 = 0x0008;

const LAME_MAGIC: &[u8; 4] = b"LAME";

/// MPEG audio version
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MpegVersion {
    V1,
    V2,
    V25,
}

/// Decoded 4-byte MPEG audio frame header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub version: MpegVersion,
    /// Layer 1, 2 or 3
    pub layer: u8,
    pub bitrate_index: u8,
    pub sample_rate_index: u8,
    /// Channel mode 0b11
    pub mono: bool,
}

impl FrameHeader {
    /// Parse a frame header, rejecting reserved and free-format values
    pub fn parse(bytes: [u8; 4]) -> Option<Self> {
        if bytes[0] != 0xFF || bytes[1] & 0xE0 != 0xE0 {
            return None;
        }

        let version = match (bytes[1] >> 3) & 0x03 {
            0 => MpegVersion::V25,
            2 => MpegVersion::V2,
            3 => MpegVersion::V1,
            _ => return None,
        };
        let layer = match (bytes[1] >> 1) & 0x03 {
            1 => 3,
            2 => 2,
            3 => 1,
            _ => return None,
        };

        let bitrate_index = bytes[2] >> 4;
        if bitrate_index == 0 || bitrate_index == 0x0F {
            return None;
        }
        let sample_rate_index = (bytes[2] >> 2) & 0x03;
        if sample_rate_index == 0x03 {
            return None;
        }

        Some(Self {
            version,
            layer,
            bitrate_index,
            sample_rate_index,
            mono: bytes[3] >> 6 == 0x03,
        })
    }

    /// Length of the Layer III side information following the header.
    /// The Xing/Info header starts right after it.
    pub fn side_info_len(&self) -> usize {
        match (self.version, self.mono) {
            (MpegVersion::V1, true) => 17,
            (MpegVersion::V1, false) => 32,
            (_, true) => 9,
            (_, false) => 17,
        }
    }
}

/// Xing/Info VBR header (big-endian)
#[derive(BinRead, Debug, Clone)]
#[br(big)]
pub struct XingHeader {
    /// `Xing` for VBR streams, `Info` for CBR streams
    #[br(assert(tag == *b"Xing" || tag == *b"Info"))]
    pub tag: [u8; 4],
    pub flags: u32,
    #[br(if(flags & XING_FRAMES != 0))]
    pub frames: Option<u32>,
    #[br(if(flags & XING_BYTES != 0))]
    pub bytes: Option<u32>,
    #[br(if(flags & XING_TOC != 0))]
    pub toc: Option<[u8; 100]>,
    #[br(if(flags & XING_QUALITY != 0))]
    pub quality: Option<u32>,
}

/// LAME extension tag, 36 bytes following the Xing fields
#[derive(BinRead, Debug, Clone)]
#[br(big)]
pub struct LameTag {
    /// e.g. `LAME3.100`
    pub encoder: [u8; 9],
    pub revision_vbr_method: u8,
    pub lowpass: u8,
    pub peak_amplitude: u32,
    pub radio_gain: u16,
    pub audiophile_gain: u16,
    pub encoding_flags: u8,
    pub bitrate: u8,
    /// 12 bits encoder delay, 12 bits padding
    pub encoder_delays: [u8; 3],
    pub misc: u8,
    pub mp3_gain: u8,
    pub preset_surround: u16,
    pub music_length: u32,
    /// CRC-16 of the audio data, 0 when the encoder did not compute it
    pub music_crc: u16,
    pub tag_crc: u16,
}

/// Header shape of an MP3 file, in increasing order of metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Mp3Case {
    /// No Xing/Info header
    A,
    /// Xing/Info header without LAME tag
    B,
    /// LAME tag without a music CRC
    C,
    /// LAME tag with a non-zero music CRC
    D,
}

/// Everything we read from the first audio frame
#[derive(Debug, Clone)]
pub struct Mp3Info {
    pub frame: FrameHeader,
    pub xing: Option<XingHeader>,
    pub lame: Option<LameTag>,
}

impl Mp3Info {
    pub fn case(&self) -> Mp3Case {
        match (&self.xing, &self.lame) {
            (None, _) => Mp3Case::A,
            (Some(_), None) => Mp3Case::B,
            (Some(_), Some(lame)) if lame.music_crc == 0 => Mp3Case::C,
            (Some(_), Some(_)) => Mp3Case::D,
        }
    }
}

/// Inspect the first audio frame of an MP3 file on disk
pub fn inspect_file<P: AsRef<Path>>(path: P) -> Result<Mp3Info> {
    let mut file = File::open(path)?;

    let mut header = [0u8; ID3V2_HEADER_LEN];
    let read = read_up_to(&mut file, &mut header)?;
    let skip = id3v2_len(&header[..read]).unwrap_or(0);
    file.seek(SeekFrom::Start(skip as u64))?;

    let mut window = Vec::new();
    file.take(SYNC_WINDOW).read_to_end(&mut window)?;

    scan_frames(&window)
}

/// Inspect an in-memory MP3 file, starting at byte 0
pub fn inspect_bytes(data: &[u8]) -> Result<Mp3Info> {
    let skip = id3v2_len(data).unwrap_or(0);
    if skip > data.len() {
        return Err(Error::Mpeg("ID3v2 tag runs past end of data".into()));
    }
    let end = data.len().min(skip + SYNC_WINDOW as usize);
    scan_frames(&data[skip..end])
}

/// Total ID3v2 tag length including header and optional footer
fn id3v2_len(header: &[u8]) -> Option<usize> {
    if header.len() < ID3V2_HEADER_LEN || &header[..3] != b"ID3" {
        return None;
    }

    // Syncsafe integer: 7 bits per byte
    let size = header[6..10]
        .iter()
        .fold(0usize, |acc, b| (acc << 7) | (*b as usize & 0x7F));
    let footer = if header[5] & 0x10 != 0 { ID3V2_HEADER_LEN } else { 0 };

    Some(ID3V2_HEADER_LEN + size + footer)
}

fn scan_frames(buf: &[u8]) -> Result<Mp3Info> {
    for start in 0..buf.len().saturating_sub(3) {
        if buf[start] != 0xFF {
            continue;
        }
        let bytes = [buf[start], buf[start + 1], buf[start + 2], buf[start + 3]];
        if let Some(frame) = FrameHeader::parse(bytes) {
            return read_frame_metadata(buf, start, frame);
        }
    }

    Err(Error::Mpeg("no MPEG audio frame found".into()))
}

fn read_frame_metadata(buf: &[u8], start: usize, frame: FrameHeader) -> Result<Mp3Info> {
    let xing_at = start + 4 + frame.side_info_len();
    let tag = buf
        .get(xing_at..xing_at + 4)
        .ok_or_else(|| Error::Mpeg("first frame is truncated".into()))?;

    if tag != b"Xing" && tag != b"Info" {
        return Ok(Mp3Info { frame, xing: None, lame: None });
    }

    let mut cursor = Cursor::new(&buf[xing_at..]);
    let xing: XingHeader = cursor.read_be()?;

    let lame_at = xing_at + cursor.position() as usize;
    let lame = match buf.get(lame_at..lame_at + LAME_MAGIC.len()) {
        Some(magic) if magic == LAME_MAGIC => {
            let tag: LameTag = Cursor::new(&buf[lame_at..]).read_be()?;
            Some(tag)
        }
        _ => None,
    };

    Ok(Mp3Info { frame, xing: Some(xing), lame })
}

/// `read` until the buffer is full or EOF
fn read_up_to<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..])? {
            0 => break,
            n => filled += n,
        }
    }
    Ok(filled)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    /// MPEG1 Layer III, 128 kbps, 44.1 kHz, joint stereo
    const STEREO_HEADER: [u8; 4] = [0xFF, 0xFB, 0x90, 0x64];

    /// Build a first frame with optional Xing (flags) and LAME (music CRC) data
    pub(crate) fn frame_bytes(xing_flags: Option<u32>, music_crc: Option<u16>) -> Vec<u8> {
        let mut buf = STEREO_HEADER.to_vec();
        buf.extend_from_slice(&[0u8; 32]);

        if let Some(flags) = xing_flags {
            buf.extend_from_slice(b"Info");
            buf.extend_from_slice(&flags.to_be_bytes());
            if flags & XING_FRAMES != 0 {
                buf.extend_from_slice(&1000u32.to_be_bytes());
            }
            if flags & XING_BYTES != 0 {
                buf.extend_from_slice(&4_000_000u32.to_be_bytes());
            }
            if flags & XING_TOC != 0 {
                buf.extend_from_slice(&[0u8; 100]);
            }
            if flags & XING_QUALITY != 0 {
                buf.extend_from_slice(&57u32.to_be_bytes());
            }

            if let Some(crc) = music_crc {
                buf.extend_from_slice(b"LAME3.100");
                buf.extend_from_slice(&[0u8; 23]);
                buf.extend_from_slice(&crc.to_be_bytes());
                buf.extend_from_slice(&[0u8; 2]);
            }
        }

        buf.resize(417, 0);
        buf
    }

    fn with_id3(frame: Vec<u8>) -> Vec<u8> {
        // 200 byte tag body, syncsafe 0x00 0x00 0x01 0x48
        let mut buf = b"ID3\x04\x00\x00\x00\x00\x01\x48".to_vec();
        buf.extend_from_slice(&[0u8; 200]);
        buf.extend(frame);
        buf
    }

    #[test]
    fn test_frame_header_parse() {
        let header = FrameHeader::parse(STEREO_HEADER).unwrap();
        assert_eq!(header.version, MpegVersion::V1);
        assert_eq!(header.layer, 3);
        assert!(!header.mono);
        assert_eq!(header.side_info_len(), 32);

        // MPEG2 mono
        let header = FrameHeader::parse([0xFF, 0xF3, 0x90, 0xC0]).unwrap();
        assert_eq!(header.version, MpegVersion::V2);
        assert!(header.mono);
        assert_eq!(header.side_info_len(), 9);

        assert!(FrameHeader::parse([0xFF, 0xFB, 0xF0, 0x64]).is_none());
        assert!(FrameHeader::parse([0xFF, 0xFB, 0x9C, 0x64]).is_none());
        assert!(FrameHeader::parse([0x00, 0xFB, 0x90, 0x64]).is_none());
    }

    #[test]
    fn test_case_without_xing() {
        let info = inspect_bytes(&frame_bytes(None, None)).unwrap();
        assert!(info.xing.is_none());
        assert_eq!(info.case(), Mp3Case::A);
    }

    #[test]
    fn test_case_xing_without_lame() {
        let info = inspect_bytes(&frame_bytes(Some(0x0F), None)).unwrap();
        let xing = info.xing.as_ref().unwrap();
        assert_eq!(xing.frames, Some(1000));
        assert_eq!(xing.quality, Some(57));
        assert_eq!(info.case(), Mp3Case::B);
    }

    #[test]
    fn test_case_lame_without_crc() {
        let info = inspect_bytes(&frame_bytes(Some(0x03), Some(0))).unwrap();
        assert_eq!(&info.lame.as_ref().unwrap().encoder, b"LAME3.100");
        assert_eq!(info.case(), Mp3Case::C);
    }

    #[test]
    fn test_case_lame_with_crc() {
        let info = inspect_bytes(&frame_bytes(Some(0x0F), Some(0xBEEF))).unwrap();
        assert_eq!(info.lame.as_ref().unwrap().music_crc, 0xBEEF);
        assert_eq!(info.case(), Mp3Case::D);
    }

    #[test]
    fn test_skips_id3v2_tag() {
        let info = inspect_bytes(&with_id3(frame_bytes(Some(0x0F), Some(1)))).unwrap();
        assert_eq!(info.case(), Mp3Case::D);
    }

    #[test]
    fn test_inspect_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&with_id3(frame_bytes(Some(0x01), None))).unwrap();

        let info = inspect_file(file.path()).unwrap();
        assert_eq!(info.case(), Mp3Case::B);
    }

    #[test]
    fn test_no_frame_is_an_error() {
        assert!(matches!(inspect_bytes(b"not an mp3 at all"), Err(Error::Mpeg(_))));
        assert!(inspect_bytes(&[]).is_err());
    }

    #[test]
    fn test_truncated_frame_is_an_error() {
        let truncated = &frame_bytes(None, None)[..20];
        assert!(inspect_bytes(truncated).is_err());
    }
}
