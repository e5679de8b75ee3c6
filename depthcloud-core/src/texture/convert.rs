//! Native sensor layouts to texture formats.
//!
//! Every conversion mirrors the image vertically (the sensor's first row
//! becomes the texture's last row) and writes straight into the destination
//! buffer without intermediate allocation.

use crate::error::ConvertError;
use bytemuck::Pod;
use depthcloud_sensor::{NativeFormat, SensorImage};
use image::{ImageBuffer, Luma, Pixel, Rgba};

/// Pixel formats the converter can write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetFormat {
    /// 8-bit RGBA.
    Rgba32,
    /// Single-channel f32, meters.
    RFloat,
    /// Single-channel u8, confidence levels.
    R8,
}

impl TargetFormat {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            TargetFormat::Rgba32 | TargetFormat::RFloat => 4,
            TargetFormat::R8 => 1,
        }
    }

    /// The native layout holding the same samples, used to turn textures back into images.
    pub fn native_equivalent(self) -> NativeFormat {
        match self {
            TargetFormat::Rgba32 => NativeFormat::Rgba32,
            TargetFormat::RFloat => NativeFormat::DepthFloat32,
            TargetFormat::R8 => NativeFormat::OneComponent8,
        }
    }
}

/// A pixel type that can be the destination of a conversion.
pub trait ConvertTarget: Pixel<Subpixel: Pod> {
    const FORMAT: TargetFormat;
}

impl ConvertTarget for Rgba<u8> {
    const FORMAT: TargetFormat = TargetFormat::Rgba32;
}

impl ConvertTarget for Luma<f32> {
    const FORMAT: TargetFormat = TargetFormat::RFloat;
}

impl ConvertTarget for Luma<u8> {
    const FORMAT: TargetFormat = TargetFormat::R8;
}

/// Byte length of a mirrored `width` x `height` conversion into `format`.
pub fn converted_size(width: u32, height: u32, format: TargetFormat) -> usize {
    width as usize * height as usize * format.bytes_per_pixel()
}

/// Convert `image` into a typed texture of the same resolution.
///
/// # Panics
///
/// Panics if `dst` does not have the image's dimensions. Callers reallocate
/// their textures whenever the sensor resolution changes.
pub fn convert_into<P: ConvertTarget>(
    image: &SensorImage,
    dst: &mut ImageBuffer<P, Vec<P::Subpixel>>,
) -> Result<(), ConvertError>
where
    P::Subpixel: Pod,
{
    assert_eq!(
        dst.dimensions(),
        image.dimensions(),
        "The texture is not the same size as the sensor image."
    );
    convert_raw(image, P::FORMAT, bytemuck::cast_slice_mut(&mut **dst))
}

/// Convert `image` into raw bytes of `target` format.
///
/// # Panics
///
/// Panics if `out.len()` differs from [`converted_size`]. A wrong-sized
/// destination is a programming error; writing into it would produce garbage.
pub fn convert_raw(image: &SensorImage, target: TargetFormat, out: &mut [u8]) -> Result<(), ConvertError> {
    let (width, height) = image.dimensions();
    assert_eq!(
        out.len(),
        converted_size(width, height, target),
        "The destination buffer is not the same size as the converted data."
    );

    let native = image.format();
    let supported = matches!(
        (native, target),
        (
            NativeFormat::Rgba32 | NativeFormat::Bgra32 | NativeFormat::Rgb24 | NativeFormat::Nv12,
            TargetFormat::Rgba32
        ) | (NativeFormat::DepthFloat32 | NativeFormat::DepthUint16, TargetFormat::RFloat)
            | (NativeFormat::OneComponent8, TargetFormat::R8)
    );
    if !supported {
        return Err(ConvertError::Unsupported { from: native, to: target });
    }
    if out.is_empty() {
        return Ok(());
    }

    let (w, h) = (width as usize, height as usize);
    let src = image.data();
    let out_stride = w * target.bytes_per_pixel();

    match native {
        NativeFormat::Nv12 => convert_nv12(src, w, h, out, out_stride),
        NativeFormat::Rgba32 | NativeFormat::OneComponent8 => {
            for_mirrored_rows(src, out, w * target.bytes_per_pixel(), out_stride, h, |src_row, out_row| {
                out_row.copy_from_slice(src_row);
            });
        }
        NativeFormat::Bgra32 => {
            for_mirrored_rows(src, out, w * 4, out_stride, h, |src_row, out_row| {
                for (s, d) in src_row.chunks_exact(4).zip(out_row.chunks_exact_mut(4)) {
                    d.copy_from_slice(&[s[2], s[1], s[0], s[3]]);
                }
            });
        }
        NativeFormat::Rgb24 => {
            for_mirrored_rows(src, out, w * 3, out_stride, h, |src_row, out_row| {
                for (s, d) in src_row.chunks_exact(3).zip(out_row.chunks_exact_mut(4)) {
                    d.copy_from_slice(&[s[0], s[1], s[2], u8::MAX]);
                }
            });
        }
        NativeFormat::DepthFloat32 => {
            for_mirrored_rows(src, out, w * 4, out_stride, h, |src_row, out_row| {
                for (s, d) in src_row.chunks_exact(4).zip(out_row.chunks_exact_mut(4)) {
                    let meters = f32::from_le_bytes([s[0], s[1], s[2], s[3]]);
                    d.copy_from_slice(&meters.to_ne_bytes());
                }
            });
        }
        NativeFormat::DepthUint16 => {
            for_mirrored_rows(src, out, w * 2, out_stride, h, |src_row, out_row| {
                for (s, d) in src_row.chunks_exact(2).zip(out_row.chunks_exact_mut(4)) {
                    let meters = u16::from_le_bytes([s[0], s[1]]) as f32 / 1000.0;
                    d.copy_from_slice(&meters.to_ne_bytes());
                }
            });
        }
    }
    Ok(())
}

/// Wrap a texture back into a detached sensor image of the equivalent native layout.
///
/// The texture's rows are taken as they are, so converting the result again
/// undoes the mirror of the first conversion.
pub fn to_sensor_image<P: ConvertTarget>(
    texture: &ImageBuffer<P, Vec<P::Subpixel>>,
) -> Result<SensorImage, ConvertError>
where
    P::Subpixel: Pod,
{
    let (width, height) = texture.dimensions();
    let bytes: &[u8] = bytemuck::cast_slice(&**texture);
    let data = match P::FORMAT {
        TargetFormat::RFloat => bytes
            .chunks_exact(4)
            .flat_map(|c| f32::from_ne_bytes([c[0], c[1], c[2], c[3]]).to_le_bytes())
            .collect(),
        TargetFormat::Rgba32 | TargetFormat::R8 => bytes.to_vec(),
    };
    Ok(SensorImage::detached(
        width,
        height,
        P::FORMAT.native_equivalent(),
        data,
    )?)
}

/// Call `f` with each source row and the output row it lands on after a vertical flip.
fn for_mirrored_rows(
    src: &[u8],
    out: &mut [u8],
    src_stride: usize,
    out_stride: usize,
    height: usize,
    mut f: impl FnMut(&[u8], &mut [u8]),
) {
    for (row, out_row) in out.chunks_exact_mut(out_stride).enumerate() {
        let src_row = height - 1 - row;
        f(&src[src_row * src_stride..(src_row + 1) * src_stride], out_row);
    }
}

fn convert_nv12(src: &[u8], w: usize, h: usize, out: &mut [u8], out_stride: usize) {
    let (luma, chroma) = src.split_at(w * h);
    let chroma_stride = w.div_ceil(2) * 2;

    for (row, out_row) in out.chunks_exact_mut(out_stride).enumerate() {
        let src_row = h - 1 - row;
        let y_row = &luma[src_row * w..(src_row + 1) * w];
        let uv_row = &chroma[(src_row / 2) * chroma_stride..][..chroma_stride];

        for (x, d) in out_row.chunks_exact_mut(4).enumerate() {
            let y = y_row[x] as f32;
            let u = uv_row[(x / 2) * 2] as f32 - 128.0;
            let v = uv_row[(x / 2) * 2 + 1] as f32 - 128.0;

            // BT.601
            let r = (y + 1.402 * v).clamp(0.0, 255.0) as u8;
            let g = (y - 0.344 * u - 0.714 * v).clamp(0.0, 255.0) as u8;
            let b = (y + 1.772 * u).clamp(0.0, 255.0) as u8;
            d.copy_from_slice(&[r, g, b, u8::MAX]);
        }
    }
}
