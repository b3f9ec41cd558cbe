use crate::icons::DecodeError;
use crate::platform::{IconImage, ImageDecoderImpl, Size};
use png::{ColorType, Transformations};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Decodes PNG files of any colour type into 8 bit RGBA.
#[derive(Debug, Default, Clone, Copy)]
pub struct PngDecoder;

impl PngDecoder {
    pub fn new() -> Self {
        Self
    }
}

impl ImageDecoderImpl for PngDecoder {
    fn decode(&self, path: &Path) -> Result<IconImage, DecodeError> {
        let file = File::open(path).map_err(|source| DecodeError::Missing {
            path: path.to_path_buf(),
            source,
        })?;

        let malformed = |source| DecodeError::Malformed {
            path: path.to_path_buf(),
            source,
        };

        let mut decoder = png::Decoder::new(BufReader::new(file));
        decoder.set_transformations(Transformations::normalize_to_color8());
        let mut reader = decoder.read_info().map_err(malformed)?;

        let mut buffer = vec![0; reader.output_buffer_size()];
        let info = reader.next_frame(&mut buffer).map_err(malformed)?;
        buffer.truncate(info.buffer_size());

        let pixels = match info.color_type {
            ColorType::Rgba => buffer,
            ColorType::Rgb => buffer
                .chunks_exact(3)
                .flat_map(|p| [p[0], p[1], p[2], 255])
                .collect(),
            ColorType::GrayscaleAlpha => buffer
                .chunks_exact(2)
                .flat_map(|p| [p[0], p[0], p[0], p[1]])
                .collect(),
            ColorType::Grayscale => buffer.iter().flat_map(|&v| [v, v, v, 255]).collect(),
            ColorType::Indexed => {
                return Err(DecodeError::Unsupported {
                    path: path.to_path_buf(),
                    reason: "palette was not expanded".to_string(),
                })
            }
        };

        Ok(IconImage::new(Size::new(info.width, info.height), pixels))
    }
}
