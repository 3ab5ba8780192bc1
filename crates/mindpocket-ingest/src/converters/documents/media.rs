//! Metadata summaries for images and audio.

use mindpocket_core::{ConversionResult, Result};

use super::{malformed, DocumentConverter};

fn be_u16(data: &[u8], at: usize) -> Option<u32> {
    data.get(at..at + 2)
        .map(|b| u32::from(u16::from_be_bytes([b[0], b[1]])))
}

fn le_u16(data: &[u8], at: usize) -> Option<u32> {
    data.get(at..at + 2)
        .map(|b| u32::from(u16::from_le_bytes([b[0], b[1]])))
}

fn be_u32(data: &[u8], at: usize) -> Option<u32> {
    data.get(at..at + 4)
        .map(|b| u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
}

fn le_u32(data: &[u8], at: usize) -> Option<u32> {
    data.get(at..at + 4)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

fn le_u24(data: &[u8], at: usize) -> Option<u32> {
    data.get(at..at + 3)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], 0]))
}

fn metadata_markdown(heading: &str, fields: &[(&str, String)]) -> String {
    let mut lines = vec![format!("# {}", heading), String::new()];
    lines.extend(fields.iter().map(|(k, v)| format!("- **{}**: {}", k, v)));
    lines.join("\n")
}

// =============================================================================
// IMAGES
// =============================================================================

pub struct ImageConverter;

impl DocumentConverter for ImageConverter {
    fn name(&self) -> &'static str {
        "image"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &[".jpg", ".jpeg", ".png", ".gif", ".webp"]
    }

    fn convert(&self, data: &[u8]) -> Result<Option<ConversionResult>> {
        let kind = infer::get(data)
            .filter(|k| k.matcher_type() == infer::MatcherType::Image)
            .ok_or_else(|| malformed("image", "unrecognized image data"))?;

        let mut fields = vec![
            ("Format", kind.mime_type().to_string()),
            ("Size", format!("{} bytes", data.len())),
        ];
        if let Some((width, height)) = image_dimensions(data, kind.extension()) {
            fields.push(("Width", format!("{}px", width)));
            fields.push(("Height", format!("{}px", height)));
        }
        Ok(Some(ConversionResult::new(
            None,
            metadata_markdown("ImageMetadata", &fields),
        )))
    }
}

fn image_dimensions(data: &[u8], extension: &str) -> Option<(u32, u32)> {
    match extension {
        "png" => Some((be_u32(data, 16)?, be_u32(data, 20)?)),
        "gif" => Some((le_u16(data, 6)?, le_u16(data, 8)?)),
        "jpg" => jpeg_dimensions(data),
        "webp" => webp_dimensions(data),
        _ => None,
    }
}

fn jpeg_dimensions(data: &[u8]) -> Option<(u32, u32)> {
    let mut pos = 2;
    while pos + 4 <= data.len() {
        if data[pos] != 0xFF {
            return None;
        }
        let marker = data[pos + 1];
        if marker == 0xFF {
            pos += 1;
            continue;
        }
        let length = be_u16(data, pos + 2)? as usize;
        let is_frame = (0xC0..=0xCF).contains(&marker) && !matches!(marker, 0xC4 | 0xC8 | 0xCC);
        if is_frame {
            let height = be_u16(data, pos + 5)?;
            let width = be_u16(data, pos + 7)?;
            return Some((width, height));
        }
        pos += 2 + length;
    }
    None
}

fn webp_dimensions(data: &[u8]) -> Option<(u32, u32)> {
    match data.get(12..16)? {
        b"VP8 " => Some((le_u16(data, 26)? & 0x3FFF, le_u16(data, 28)? & 0x3FFF)),
        b"VP8L" => {
            let bits = le_u32(data, 21)?;
            Some(((bits & 0x3FFF) + 1, ((bits >> 14) & 0x3FFF) + 1))
        }
        b"VP8X" => Some((le_u24(data, 24)? + 1, le_u24(data, 27)? + 1)),
        _ => None,
    }
}

// =============================================================================
// AUDIO
// =============================================================================

pub struct AudioConverter;

impl DocumentConverter for AudioConverter {
    fn name(&self) -> &'static str {
        "audio"
    }

    fn extensions(&self) -> &'static [&'static str] {
        &[".mp3", ".wav"]
    }

    fn convert(&self, data: &[u8]) -> Result<Option<ConversionResult>> {
        let kind = infer::get(data)
            .filter(|k| k.matcher_type() == infer::MatcherType::Audio)
            .ok_or_else(|| malformed("audio", "unrecognized audio data"))?;

        let mut fields = vec![
            ("Format", kind.mime_type().to_string()),
            ("Size", format!("{} bytes", data.len())),
        ];
        let mut title = None;

        match kind.extension() {
            "wav" => {
                if let Some(wav) = wav_info(data) {
                    fields.push(("Channels", wav.channels.to_string()));
                    fields.push(("Sample rate", format!("{} Hz", wav.sample_rate)));
                    if let Some(duration) = wav.duration_secs {
                        fields.push(("Duration", format!("{:.2} s", duration)));
                    }
                }
            }
            "mp3" => {
                let tags = id3_tags(data);
                if let Some(t) = &tags.title {
                    fields.push(("Title", t.clone()));
                }
                if let Some(a) = tags.artist {
                    fields.push(("Artist", a));
                }
                title = tags.title;
            }
            _ => {}
        }

        Ok(Some(ConversionResult::new(
            title,
            metadata_markdown("AudioMetadata", &fields),
        )))
    }
}

struct WavInfo {
    channels: u32,
    sample_rate: u32,
    duration_secs: Option<f64>,
}

fn wav_info(data: &[u8]) -> Option<WavInfo> {
    let mut pos = 12;
    let mut format: Option<(u32, u32, u32)> = None;
    let mut data_len: Option<u32> = None;

    while pos + 8 <= data.len() {
        let id = &data[pos..pos + 4];
        let size = le_u32(data, pos + 4)?;
        let body = pos + 8;
        match id {
            b"fmt " => {
                let channels = le_u16(data, body + 2)?;
                let sample_rate = le_u32(data, body + 4)?;
                let byte_rate = le_u32(data, body + 8)?;
                format = Some((channels, sample_rate, byte_rate));
            }
            b"data" => data_len = Some(size),
            _ => {}
        }
        // Chunks are word-aligned.
        pos = body + size as usize + (size as usize & 1);
    }

    let (channels, sample_rate, byte_rate) = format?;
    Some(WavInfo {
        channels,
        sample_rate,
        duration_secs: data_len
            .filter(|_| byte_rate > 0)
            .map(|len| f64::from(len) / f64::from(byte_rate)),
    })
}

#[derive(Debug, Default, PartialEq)]
struct Id3Tags {
    title: Option<String>,
    artist: Option<String>,
}

fn syncsafe(data: &[u8], at: usize) -> Option<u32> {
    let b = data.get(at..at + 4)?;
    Some(b.iter().fold(0u32, |acc, &x| (acc << 7) | u32::from(x & 0x7F)))
}

fn decode_id3_text(frame: &[u8]) -> Option<String> {
    let (&encoding, text) = frame.split_first()?;
    let decoded: String = match encoding {
        0 => text.iter().map(|&b| char::from(b)).collect(),
        1 | 2 => {
            let mut bytes = text;
            let mut big_endian = encoding == 2;
            if bytes.starts_with(&[0xFF, 0xFE]) {
                bytes = &bytes[2..];
            } else if bytes.starts_with(&[0xFE, 0xFF]) {
                big_endian = true;
                bytes = &bytes[2..];
            }
            let units: Vec<u16> = bytes
                .chunks_exact(2)
                .map(|p| {
                    if big_endian {
                        u16::from_be_bytes([p[0], p[1]])
                    } else {
                        u16::from_le_bytes([p[0], p[1]])
                    }
                })
                .collect();
            String::from_utf16_lossy(&units)
        }
        _ => String::from_utf8_lossy(text).into_owned(),
    };
    let decoded = decoded.trim_matches(char::from(0)).trim().to_string();
    Some(decoded).filter(|s| !s.is_empty())
}

fn id3_tags(data: &[u8]) -> Id3Tags {
    let mut tags = Id3Tags::default();
    if !data.starts_with(b"ID3") || data.len() < 10 {
        return tags;
    }
    let version = data[3];
    let Some(tag_size) = syncsafe(data, 6) else {
        return tags;
    };
    let end = (10 + tag_size as usize).min(data.len());
    let mut pos = 10;

    while pos + 10 <= end {
        let id = &data[pos..pos + 4];
        if id[0] == 0 {
            break;
        }
        let size = if version >= 4 {
            syncsafe(data, pos + 4)
        } else {
            be_u32(data, pos + 4)
        };
        let Some(size) = size.map(|s| s as usize) else {
            break;
        };
        let body = pos + 10;
        if body + size > end {
            break;
        }
        match id {
            b"TIT2" => tags.title = decode_id3_text(&data[body..body + size]),
            b"TPE1" => tags.artist = decode_id3_text(&data[body..body + size]),
            _ => {}
        }
        pos = body + size;
    }
    tags
}

#[cfg(test)]
mod tests {
    use super::*;
    use mindpocket_core::Error;

    fn png(width: u32, height: u32) -> Vec<u8> {
        let mut data = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
        data.extend_from_slice(&13u32.to_be_bytes());
        data.extend_from_slice(b"IHDR");
        data.extend_from_slice(&width.to_be_bytes());
        data.extend_from_slice(&height.to_be_bytes());
        data.extend_from_slice(&[8, 6, 0, 0, 0]);
        data
    }

    #[test]
    fn test_png_metadata() {
        let data = png(640, 480);
        let result = ImageConverter.convert(&data).unwrap().unwrap();
        assert_eq!(
            result.markdown,
            format!(
                "# ImageMetadata\n\n- **Format**: image/png\n- **Size**: {} bytes\n- **Width**: 640px\n- **Height**: 480px",
                data.len()
            )
        );
    }

    #[test]
    fn test_gif_and_jpeg_dimensions() {
        let mut gif = b"GIF89a".to_vec();
        gif.extend_from_slice(&[0x20, 0x00, 0x10, 0x00, 0, 0, 0]);
        assert_eq!(image_dimensions(&gif, "gif"), Some((32, 16)));

        let jpeg = [
            0xFF, 0xD8, // SOI
            0xFF, 0xE0, 0x00, 0x04, 0x00, 0x00, // APP0, 2 payload bytes
            0xFF, 0xC0, 0x00, 0x0B, 0x08, 0x01, 0x2C, 0x01, 0x90, 0x03, 0x00, 0x00, 0x00,
        ];
        assert_eq!(jpeg_dimensions(&jpeg), Some((400, 300)));
    }

    #[test]
    fn test_non_image_is_error() {
        let err = ImageConverter.convert(b"definitely not an image").unwrap_err();
        assert!(matches!(err, Error::Conversion(_)));
    }

    fn wav(channels: u16, sample_rate: u32, seconds: u32) -> Vec<u8> {
        let bits = 16u16;
        let block_align = channels * bits / 8;
        let byte_rate = sample_rate * u32::from(block_align);
        let data_len = byte_rate * seconds;

        let mut data = b"RIFF".to_vec();
        data.extend_from_slice(&(36 + data_len).to_le_bytes());
        data.extend_from_slice(b"WAVEfmt ");
        data.extend_from_slice(&16u32.to_le_bytes());
        data.extend_from_slice(&1u16.to_le_bytes());
        data.extend_from_slice(&channels.to_le_bytes());
        data.extend_from_slice(&sample_rate.to_le_bytes());
        data.extend_from_slice(&byte_rate.to_le_bytes());
        data.extend_from_slice(&block_align.to_le_bytes());
        data.extend_from_slice(&bits.to_le_bytes());
        data.extend_from_slice(b"data");
        data.extend_from_slice(&data_len.to_le_bytes());
        data.resize(data.len() + data_len as usize, 0);
        data
    }

    #[test]
    fn test_wav_metadata() {
        let data = wav(2, 8000, 2);
        let result = AudioConverter.convert(&data).unwrap().unwrap();
        assert!(result.markdown.starts_with("# AudioMetadata\n\n"));
        assert!(result.markdown.contains("- **Channels**: 2"));
        assert!(result.markdown.contains("- **Sample rate**: 8000 Hz"));
        assert!(result.markdown.contains("- **Duration**: 2.00 s"));
    }

    fn id3_frame(id: &[u8; 4], text: &str) -> Vec<u8> {
        let mut body = vec![3u8];
        body.extend_from_slice(text.as_bytes());
        let mut frame = id.to_vec();
        frame.extend_from_slice(&(body.len() as u32).to_be_bytes());
        frame.extend_from_slice(&[0, 0]);
        frame.extend_from_slice(&body);
        frame
    }

    #[test]
    fn test_mp3_id3_tags() {
        let mut frames = id3_frame(b"TIT2", "夜曲");
        frames.extend(id3_frame(b"TPE1", "Jay"));
        let size = frames.len() as u32;
        let mut data = b"ID3".to_vec();
        data.extend_from_slice(&[3, 0, 0]);
        data.extend_from_slice(&[
            ((size >> 21) & 0x7F) as u8,
            ((size >> 14) & 0x7F) as u8,
            ((size >> 7) & 0x7F) as u8,
            (size & 0x7F) as u8,
        ]);
        data.extend(frames);
        data.extend_from_slice(&[0xFF, 0xFB, 0x90, 0x00]);

        let result = AudioConverter.convert(&data).unwrap().unwrap();
        assert_eq!(result.title.as_deref(), Some("夜曲"));
        assert!(result.markdown.contains("- **Title**: 夜曲"));
        assert!(result.markdown.contains("- **Artist**: Jay"));
    }
}
