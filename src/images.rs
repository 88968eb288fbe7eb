//! Raster image XObject inversion.
//!
//! Each image reached by the walker is decoded to 8-bit RGB (or RGBA when
//! a soft mask is attached), run through the per-pixel transform, scaled
//! down when a lower output DPI was requested, and re-embedded. Stencil
//! masks are never touched: their paint color comes from the content
//! stream, which is already rewritten, and inverting the mask bits would
//! swap painted and unpainted areas.

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use image::{DynamicImage, ImageFormat, RgbImage, RgbaImage};
use lopdf::{dictionary, Document, Object, ObjectId, Stream};
use std::io::{Read, Write};

use crate::color;
use crate::error::InvertError;
use crate::InvertMode;

/// JPEG quality for a requested output DPI, snapped to the nearest
/// supported tier: 150 DPI encodes at 70, 300 at 85, 600 at 92.
pub(crate) fn jpeg_quality_for_dpi(dpi: u32) -> u8 {
    if dpi <= 150 {
        70
    } else if dpi >= 600 {
        92
    } else {
        85
    }
}

fn dict_u32(stream: &Stream, key: &[u8]) -> Option<u32> {
    match stream.dict.get(key) {
        Ok(Object::Integer(n)) => Some(*n as u32),
        _ => None,
    }
}

/// First entry of the stream's Filter chain, if any.
fn first_filter(stream: &Stream) -> Option<String> {
    stream.dict.get(b"Filter").ok().and_then(|f| match f {
        Object::Name(n) => Some(String::from_utf8_lossy(n).to_string()),
        Object::Array(arr) => arr.first().and_then(|f| match f {
            Object::Name(n) => Some(String::from_utf8_lossy(n).to_string()),
            _ => None,
        }),
        _ => None,
    })
}

/// Resolve a ColorSpace entry to its family name.
fn color_space_name(obj: &Object, doc: &Document) -> String {
    match obj {
        Object::Name(name) => String::from_utf8_lossy(name).to_string(),
        Object::Array(arr) => {
            if let Some(Object::Name(name)) = arr.first() {
                String::from_utf8_lossy(name).to_string()
            } else {
                "Unknown".to_string()
            }
        }
        Object::Reference(id) => {
            if let Ok(resolved) = doc.get_object(*id) {
                color_space_name(resolved, doc)
            } else {
                "Unknown".to_string()
            }
        }
        _ => "Unknown".to_string(),
    }
}

/// True for 1-bit stencil masks, which paint the current color.
pub(crate) fn is_stencil(stream: &Stream) -> bool {
    matches!(stream.dict.get(b"ImageMask"), Ok(Object::Boolean(true)))
}

/// Decode a PDF image stream into raw pixel data.
fn decode_image_stream(
    stream: &Stream,
    width: u32,
    height: u32,
    color_space: &str,
    bits_per_component: u32,
) -> Result<DynamicImage, InvertError> {
    let content = &stream.content;

    let decoded_data = match first_filter(stream).as_deref() {
        Some("FlateDecode") => {
            let mut decoder = ZlibDecoder::new(&content[..]);
            let mut decoded = Vec::new();
            decoder
                .read_to_end(&mut decoded)
                .map_err(|e| InvertError::ImageTransform(e.to_string()))?;
            decoded
        }
        Some("DCTDecode") => {
            let img = image::load_from_memory_with_format(content, ImageFormat::Jpeg)
                .map_err(|e| InvertError::ImageTransform(format!("JPEG decode: {}", e)))?;
            return Ok(img);
        }
        Some("JPXDecode") => {
            let img = image::load_from_memory(content)
                .map_err(|e| InvertError::ImageTransform(format!("JPEG2000 decode: {}", e)))?;
            return Ok(img);
        }
        None => content.clone(),
        Some(other) => {
            return Err(InvertError::ImageTransform(format!(
                "unsupported filter: {}",
                other
            )));
        }
    };

    if bits_per_component != 8 {
        return Err(InvertError::ImageTransform(format!(
            "unsupported bit depth: {}",
            bits_per_component
        )));
    }

    match color_space {
        "DeviceRGB" | "RGB" | "CalRGB" => {
            let expected = (width * height * 3) as usize;
            if decoded_data.len() < expected {
                return Err(InvertError::ImageTransform(format!(
                    "RGB data too short: {} < {}",
                    decoded_data.len(),
                    expected
                )));
            }
            RgbImage::from_raw(width, height, decoded_data[..expected].to_vec())
                .map(DynamicImage::ImageRgb8)
                .ok_or_else(|| InvertError::ImageTransform("invalid RGB buffer".into()))
        }
        "DeviceGray" | "Gray" | "CalGray" => {
            let expected = (width * height) as usize;
            if decoded_data.len() < expected {
                return Err(InvertError::ImageTransform(format!(
                    "gray data too short: {} < {}",
                    decoded_data.len(),
                    expected
                )));
            }
            image::GrayImage::from_raw(width, height, decoded_data[..expected].to_vec())
                .map(DynamicImage::ImageLuma8)
                .ok_or_else(|| InvertError::ImageTransform("invalid gray buffer".into()))
        }
        "DeviceCMYK" | "CMYK" => {
            let expected = (width * height * 4) as usize;
            if decoded_data.len() < expected {
                return Err(InvertError::ImageTransform(format!(
                    "CMYK data too short: {} < {}",
                    decoded_data.len(),
                    expected
                )));
            }
            let mut rgb_data = Vec::with_capacity((width * height * 3) as usize);
            for chunk in decoded_data[..expected].chunks(4) {
                let c = chunk[0] as f32 / 255.0;
                let m = chunk[1] as f32 / 255.0;
                let y = chunk[2] as f32 / 255.0;
                let k = chunk[3] as f32 / 255.0;
                rgb_data.push(((1.0 - c) * (1.0 - k) * 255.0) as u8);
                rgb_data.push(((1.0 - m) * (1.0 - k) * 255.0) as u8);
                rgb_data.push(((1.0 - y) * (1.0 - k) * 255.0) as u8);
            }
            RgbImage::from_raw(width, height, rgb_data)
                .map(DynamicImage::ImageRgb8)
                .ok_or_else(|| InvertError::ImageTransform("invalid CMYK buffer".into()))
        }
        "ICCBased" => {
            // No profile decoding; guess the layout from the data size.
            let pixels = (width * height) as usize;
            if decoded_data.len() >= pixels * 3 {
                RgbImage::from_raw(width, height, decoded_data[..pixels * 3].to_vec())
                    .map(DynamicImage::ImageRgb8)
                    .ok_or_else(|| InvertError::ImageTransform("invalid ICCBased buffer".into()))
            } else if decoded_data.len() >= pixels {
                image::GrayImage::from_raw(width, height, decoded_data[..pixels].to_vec())
                    .map(DynamicImage::ImageLuma8)
                    .ok_or_else(|| InvertError::ImageTransform("invalid ICCBased buffer".into()))
            } else {
                Err(InvertError::ImageTransform(
                    "could not determine ICCBased layout".into(),
                ))
            }
        }
        other => Err(InvertError::ImageTransform(format!(
            "unsupported color space: {}",
            other
        ))),
    }
}

/// Decode a soft-mask stream into one alpha byte per pixel.
fn decode_smask_stream(stream: &Stream, width: u32, height: u32) -> Result<Vec<u8>, InvertError> {
    let decoded = match first_filter(stream).as_deref() {
        Some("FlateDecode") => {
            let mut decoder = ZlibDecoder::new(&stream.content[..]);
            let mut decoded = Vec::new();
            decoder
                .read_to_end(&mut decoded)
                .map_err(|e| InvertError::ImageTransform(e.to_string()))?;
            decoded
        }
        Some("DCTDecode") => image::load_from_memory_with_format(&stream.content, ImageFormat::Jpeg)
            .map_err(|e| InvertError::ImageTransform(format!("SMask JPEG decode: {}", e)))?
            .to_luma8()
            .into_raw(),
        None => stream.content.clone(),
        Some(other) => {
            return Err(InvertError::ImageTransform(format!(
                "unsupported SMask filter: {}",
                other
            )));
        }
    };

    let expected = (width * height) as usize;
    if decoded.len() < expected {
        return Err(InvertError::ImageTransform(format!(
            "SMask data too short: {} < {}",
            decoded.len(),
            expected
        )));
    }
    Ok(decoded[..expected].to_vec())
}

/// Apply the per-pixel transform, leaving alpha untouched. Fully
/// transparent pixels are written as transparent zero.
fn invert_pixels(img: &DynamicImage, mode: InvertMode) -> DynamicImage {
    match img {
        DynamicImage::ImageRgba8(rgba) => {
            let mut out = rgba.clone();
            for pixel in out.pixels_mut() {
                let [r, g, b, a] = pixel.0;
                pixel.0 = if a == 0 {
                    [0, 0, 0, 0]
                } else {
                    let [nr, ng, nb] = color::invert_pixel(mode, r, g, b);
                    [nr, ng, nb, a]
                };
            }
            DynamicImage::ImageRgba8(out)
        }
        other => {
            let mut rgb = other.to_rgb8();
            for pixel in rgb.pixels_mut() {
                let [r, g, b] = pixel.0;
                pixel.0 = color::invert_pixel(mode, r, g, b);
            }
            DynamicImage::ImageRgb8(rgb)
        }
    }
}

/// Downscale by `dpi / 300` with bilinear interpolation when a lower DPI
/// was requested. Never upscales.
fn scale_for_dpi(img: DynamicImage, output_dpi: u32) -> DynamicImage {
    if output_dpi >= 300 {
        return img;
    }
    let scale = output_dpi as f32 / 300.0;
    let width = ((img.width() as f32 * scale).round() as u32).max(1);
    let height = ((img.height() as f32 * scale).round() as u32).max(1);
    if width >= img.width() && height >= img.height() {
        return img;
    }
    img.resize_exact(width, height, image::imageops::FilterType::Triangle)
}

fn flate_compress(data: &[u8]) -> Result<Vec<u8>, InvertError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::best());
    encoder
        .write_all(data)
        .map_err(|e| InvertError::ImageTransform(e.to_string()))?;
    encoder
        .finish()
        .map_err(|e| InvertError::ImageTransform(e.to_string()))
}

fn image_xobject_dict(width: u32, height: u32, color_space: &str, filter: &str) -> lopdf::Dictionary {
    dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => width as i64,
        "Height" => height as i64,
        "ColorSpace" => Object::Name(color_space.as_bytes().to_vec()),
        "BitsPerComponent" => 8,
        "Filter" => Object::Name(filter.as_bytes().to_vec()),
    }
}

/// Encode an opaque image as a DCTDecode (JPEG) stream.
fn encode_jpeg_stream(img: &DynamicImage, quality: u8) -> Result<Stream, InvertError> {
    let rgb = img.to_rgb8();
    let (width, height) = rgb.dimensions();

    let mut jpeg_bytes = Vec::new();
    let mut encoder = jpeg_encoder::Encoder::new(&mut jpeg_bytes, quality);
    encoder.set_sampling_factor(jpeg_encoder::SamplingFactor::R_4_2_0);
    encoder
        .encode(
            rgb.as_raw(),
            width as u16,
            height as u16,
            jpeg_encoder::ColorType::Rgb,
        )
        .map_err(|e| InvertError::ImageTransform(format!("JPEG encode: {}", e)))?;

    Ok(Stream::new(
        image_xobject_dict(width, height, "DeviceRGB", "DCTDecode"),
        jpeg_bytes,
    ))
}

/// Encode losslessly with FlateDecode. RGBA input is split into an RGB
/// stream plus a grayscale SMask stream so the alpha channel survives
/// byte for byte.
fn encode_lossless_stream(img: &DynamicImage) -> Result<(Stream, Option<Stream>), InvertError> {
    match img {
        DynamicImage::ImageRgba8(rgba) => {
            let (width, height) = rgba.dimensions();
            let mut rgb_data = Vec::with_capacity((width * height * 3) as usize);
            let mut alpha_data = Vec::with_capacity((width * height) as usize);
            for pixel in rgba.pixels() {
                rgb_data.extend_from_slice(&pixel.0[..3]);
                alpha_data.push(pixel.0[3]);
            }

            let main = Stream::new(
                image_xobject_dict(width, height, "DeviceRGB", "FlateDecode"),
                flate_compress(&rgb_data)?,
            );
            let smask = Stream::new(
                image_xobject_dict(width, height, "DeviceGray", "FlateDecode"),
                flate_compress(&alpha_data)?,
            );
            Ok((main, Some(smask)))
        }
        other => {
            let rgb = other.to_rgb8();
            let (width, height) = rgb.dimensions();
            let main = Stream::new(
                image_xobject_dict(width, height, "DeviceRGB", "FlateDecode"),
                flate_compress(rgb.as_raw())?,
            );
            Ok((main, None))
        }
    }
}

/// Invert one image XObject in place.
///
/// Returns `Ok(false)` when the image was deliberately left alone (stencil
/// mask). Any decode or encode failure is an error; the caller logs it and
/// keeps the original object.
pub(crate) fn invert_image_xobject(
    doc: &mut Document,
    id: ObjectId,
    mode: InvertMode,
    compress: bool,
    output_dpi: u32,
) -> Result<bool, InvertError> {
    let stream = match doc.get_object(id) {
        Ok(Object::Stream(s)) => s.clone(),
        _ => return Err(InvertError::ImageTransform("not a stream object".into())),
    };

    if is_stencil(&stream) {
        log::debug!("skipping stencil mask {:?}", id);
        return Ok(false);
    }

    let width = dict_u32(&stream, b"Width").unwrap_or(0);
    let height = dict_u32(&stream, b"Height").unwrap_or(0);
    if width == 0 || height == 0 {
        return Err(InvertError::ImageTransform("invalid dimensions".into()));
    }

    let color_space = stream
        .dict
        .get(b"ColorSpace")
        .ok()
        .map(|cs| color_space_name(cs, doc))
        .unwrap_or_else(|| "DeviceRGB".to_string());
    let bits_per_component = dict_u32(&stream, b"BitsPerComponent").unwrap_or(8);

    let mut img = decode_image_stream(&stream, width, height, &color_space, bits_per_component)?;

    // Merge an attached soft mask into an RGBA raster so transparency is
    // carried through the transform.
    if let Ok(Object::Reference(smask_id)) = stream.dict.get(b"SMask") {
        if let Ok(Object::Stream(smask_stream)) = doc.get_object(*smask_id) {
            match decode_smask_stream(smask_stream, width, height) {
                Ok(alpha) => {
                    let rgb = img.to_rgb8();
                    let mut rgba_data = Vec::with_capacity((width * height * 4) as usize);
                    for (pixel, a) in rgb.pixels().zip(alpha.iter()) {
                        rgba_data.extend_from_slice(&pixel.0);
                        rgba_data.push(*a);
                    }
                    if let Some(rgba) = RgbaImage::from_raw(width, height, rgba_data) {
                        img = DynamicImage::ImageRgba8(rgba);
                    }
                }
                Err(e) => log::debug!("could not decode SMask of {:?}: {}", id, e),
            }
        }
    }

    let inverted = scale_for_dpi(invert_pixels(&img, mode), output_dpi);
    let has_alpha = matches!(inverted, DynamicImage::ImageRgba8(_));

    let new_stream = if compress && !has_alpha {
        encode_jpeg_stream(&inverted, jpeg_quality_for_dpi(output_dpi))?
    } else {
        let (mut main, smask) = encode_lossless_stream(&inverted)?;
        if let Some(smask) = smask {
            let smask_id = doc.add_object(Object::Stream(smask));
            main.dict.set("SMask", Object::Reference(smask_id));
        }
        main
    };

    doc.objects.insert(id, Object::Stream(new_stream));
    Ok(true)
}
