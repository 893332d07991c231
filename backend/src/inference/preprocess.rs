use std::io::Cursor;

use image::error::UnsupportedErrorKind;
use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageError, ImageReader};
use ndarray::Array4;
use serde::{Deserialize, Serialize};

use super::error::PipelineError;
use super::tensor::{ImageTensor, InputSize};

/// Resampling filter used when resizing to the model input size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResizeFilter {
    Nearest,
    Triangle,
    #[default]
    CatmullRom,
    Gaussian,
    Lanczos3,
}

impl From<ResizeFilter> for FilterType {
    fn from(filter: ResizeFilter) -> Self {
        match filter {
            ResizeFilter::Nearest => FilterType::Nearest,
            ResizeFilter::Triangle => FilterType::Triangle,
            ResizeFilter::CatmullRom => FilterType::CatmullRom,
            ResizeFilter::Gaussian => FilterType::Gaussian,
            ResizeFilter::Lanczos3 => FilterType::Lanczos3,
        }
    }
}

/// Turns encoded image bytes into the model's input tensor.
///
/// Steps run in a fixed order so the output is reproducible bit for bit:
/// decode, convert to RGB, resize, cast to `f32`, divide by 255, add the batch axis.
#[derive(Debug, Clone)]
pub struct Preprocessor {
    target: InputSize,
    filter: ResizeFilter,
}

impl Preprocessor {
    pub fn new(target: InputSize, filter: ResizeFilter) -> Self {
        Self { target, filter }
    }

    pub fn target(&self) -> InputSize {
        self.target
    }

    pub fn preprocess(&self, raw: &[u8]) -> Result<ImageTensor, PipelineError> {
        let image = decode(raw)?;
        let rgb = image.to_rgb8();

        // Resizing to the current size is skipped; resampling filters are not all identity maps.
        let rgb = if rgb.dimensions() == (self.target.width, self.target.height) {
            rgb
        } else {
            imageops::resize(
                &rgb,
                self.target.width,
                self.target.height,
                self.filter.into(),
            )
        };

        let (width, height) = rgb.dimensions();
        let values: Vec<f32> = rgb
            .into_raw()
            .into_iter()
            .map(|v| f32::from(v) / 255.0)
            .collect();

        let data = Array4::from_shape_vec((1, height as usize, width as usize, 3), values)
            .map_err(|e| PipelineError::Decode(format!("pixel buffer mismatch: {}", e)))?;
        Ok(ImageTensor::from_array(data))
    }
}

fn decode(raw: &[u8]) -> Result<DynamicImage, PipelineError> {
    let reader = ImageReader::new(Cursor::new(raw))
        .with_guessed_format()
        .map_err(|e| PipelineError::Decode(e.to_string()))?;
    let image = reader.decode().map_err(map_image_error)?;

    if image.width() == 0 || image.height() == 0 {
        return Err(PipelineError::Decode("image has zero area".into()));
    }
    Ok(image)
}

fn map_image_error(err: ImageError) -> PipelineError {
    match &err {
        ImageError::Unsupported(e) if matches!(e.kind(), UnsupportedErrorKind::Color(_)) => {
            PipelineError::UnsupportedMode(err.to_string())
        }
        _ => PipelineError::Decode(err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::fixtures::encode_png;
    use image::{GrayImage, Luma, Rgb, RgbImage, Rgba, RgbaImage};

    fn default_preprocessor() -> Preprocessor {
        Preprocessor::new(InputSize::default(), ResizeFilter::default())
    }

    #[test]
    fn solid_white_image_becomes_all_ones() {
        let white = RgbImage::from_pixel(100, 100, Rgb([255, 255, 255]));
        let bytes = encode_png(DynamicImage::ImageRgb8(white));

        let tensor = default_preprocessor().preprocess(&bytes).unwrap();

        assert_eq!(tensor.shape(), &[1, 224, 224, 3]);
        assert!(tensor.array().iter().all(|&v| v == 1.0));
    }

    #[test]
    fn alpha_channel_is_dropped() {
        let rgba = RgbaImage::from_pixel(8, 8, Rgba([10, 20, 30, 0]));
        let bytes = encode_png(DynamicImage::ImageRgba8(rgba));

        let tensor = Preprocessor::new(InputSize::new(8, 8), ResizeFilter::Nearest)
            .preprocess(&bytes)
            .unwrap();

        assert_eq!(tensor.shape(), &[1, 8, 8, 3]);
        let px = tensor.array().slice(ndarray::s![0, 3, 3, ..]).to_vec();
        assert_eq!(px, vec![10.0 / 255.0, 20.0 / 255.0, 30.0 / 255.0]);
    }

    #[test]
    fn grayscale_is_expanded_to_three_channels() {
        let gray = GrayImage::from_pixel(30, 20, Luma([128]));
        let bytes = encode_png(DynamicImage::ImageLuma8(gray));

        let tensor = default_preprocessor().preprocess(&bytes).unwrap();

        assert_eq!(tensor.shape(), &[1, 224, 224, 3]);
        let expected = 128.0 / 255.0;
        assert!(tensor.array().iter().all(|&v| (v - expected).abs() < 1e-6));
    }

    #[test]
    fn values_stay_in_unit_range_for_high_contrast_input() {
        // Lanczos overshoots on hard edges; the u8 round trip clamps it.
        let checker = RgbImage::from_fn(64, 48, |x, y| {
            if (x / 4 + y / 4) % 2 == 0 {
                Rgb([255, 0, 255])
            } else {
                Rgb([0, 255, 0])
            }
        });
        let bytes = encode_png(DynamicImage::ImageRgb8(checker));

        let tensor = Preprocessor::new(InputSize::new(50, 70), ResizeFilter::Lanczos3)
            .preprocess(&bytes)
            .unwrap();

        assert_eq!(tensor.shape(), &[1, 70, 50, 3]);
        assert!(tensor.array().iter().all(|&v| (0.0..=1.0).contains(&v)));
    }

    #[test]
    fn sixteen_bit_input_is_accepted() {
        let gray = image::ImageBuffer::<Luma<u16>, Vec<u16>>::from_pixel(16, 16, Luma([65535]));
        let bytes = encode_png(DynamicImage::ImageLuma16(gray));

        let tensor = Preprocessor::new(InputSize::new(16, 16), ResizeFilter::Triangle)
            .preprocess(&bytes)
            .unwrap();

        assert!(tensor.array().iter().all(|&v| v == 1.0));
    }

    fn indexed_png(width: u32, height: u32, palette: &[u8], indices: &[u8]) -> Vec<u8> {
        let mut buf = Vec::new();
        {
            let mut encoder = png::Encoder::new(&mut buf, width, height);
            encoder.set_color(png::ColorType::Indexed);
            encoder.set_depth(png::BitDepth::Eight);
            encoder.set_palette(palette.to_vec());
            let mut writer = encoder.write_header().unwrap();
            writer.write_image_data(indices).unwrap();
        }
        buf
    }

    #[test]
    fn palette_image_is_expanded_to_rgb() {
        let bytes = indexed_png(2, 2, &[10, 200, 30, 0, 0, 0], &[0, 1, 1, 0]);

        let tensor = Preprocessor::new(InputSize::new(2, 2), ResizeFilter::Nearest)
            .preprocess(&bytes)
            .unwrap();

        assert_eq!(tensor.shape(), &[1, 2, 2, 3]);
        let first = tensor.array().slice(ndarray::s![0, 0, 0, ..]).to_vec();
        assert_eq!(first, vec![10.0 / 255.0, 200.0 / 255.0, 30.0 / 255.0]);
        let second = tensor.array().slice(ndarray::s![0, 0, 1, ..]).to_vec();
        assert_eq!(second, vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn palette_image_is_resized() {
        let bytes = indexed_png(1, 1, &[10, 200, 30], &[0]);

        let tensor = Preprocessor::new(InputSize::new(4, 4), ResizeFilter::Nearest)
            .preprocess(&bytes)
            .unwrap();

        assert_eq!(tensor.shape(), &[1, 4, 4, 3]);
        let px = tensor.array().slice(ndarray::s![0, 3, 3, ..]).to_vec();
        assert_eq!(px, vec![10.0 / 255.0, 200.0 / 255.0, 30.0 / 255.0]);
    }

    #[test]
    fn unsupported_color_maps_to_unsupported_mode() {
        use image::error::{ImageFormatHint, UnsupportedError};
        use image::ExtendedColorType;

        let err = ImageError::Unsupported(UnsupportedError::from_format_and_kind(
            ImageFormatHint::Unknown,
            UnsupportedErrorKind::Color(ExtendedColorType::Rgb1),
        ));
        assert!(matches!(
            map_image_error(err),
            PipelineError::UnsupportedMode(_)
        ));
    }

    #[test]
    fn unsupported_format_maps_to_decode() {
        use image::error::{ImageFormatHint, UnsupportedError};

        let err = ImageError::Unsupported(UnsupportedError::from_format_and_kind(
            ImageFormatHint::Unknown,
            UnsupportedErrorKind::Format(ImageFormatHint::Unknown),
        ));
        assert!(matches!(map_image_error(err), PipelineError::Decode(_)));
    }

    #[test]
    fn text_bytes_fail_with_decode_error() {
        let err = default_preprocessor()
            .preprocess(b"this is a plain text file, not an image")
            .unwrap_err();
        assert!(matches!(err, PipelineError::Decode(_)));
    }

    #[test]
    fn truncated_png_fails_with_decode_error() {
        let white = RgbImage::from_pixel(40, 40, Rgb([255, 255, 255]));
        let bytes = encode_png(DynamicImage::ImageRgb8(white));

        let err = default_preprocessor()
            .preprocess(&bytes[..bytes.len() / 2])
            .unwrap_err();
        assert!(matches!(err, PipelineError::Decode(_)));
    }

    #[test]
    fn preprocessing_is_deterministic() {
        let img = RgbImage::from_fn(37, 53, |x, y| Rgb([(x * 7) as u8, (y * 5) as u8, 90]));
        let bytes = encode_png(DynamicImage::ImageRgb8(img));
        let preprocessor = default_preprocessor();

        let first = preprocessor.preprocess(&bytes).unwrap();
        let second = preprocessor.preprocess(&bytes).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn filter_names_deserialize_from_config() {
        let filter: ResizeFilter = serde_yaml::from_str("catmullrom").unwrap();
        assert_eq!(filter, ResizeFilter::CatmullRom);
        let filter: ResizeFilter = serde_yaml::from_str("lanczos3").unwrap();
        assert_eq!(filter, ResizeFilter::Lanczos3);
    }
}
