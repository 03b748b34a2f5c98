// SPDX-License-Identifier: GPL-3.0-only

//! Device format to display RGBX conversion
//!
//! One converter per raw format the preview worker can meet. All of them
//! write 32-bit RGBX (alpha forced to 255) using BT.601 fixed-point math;
//! MJPEG goes through the JPEG decoder instead.

use crate::constants::PREVIEW_PIXEL_BYTES;
use crate::errors::{ConvertError, ConvertResult};
use crate::frame::{FrameFormat, RawFrame};
use image::ImageFormat;

/// BT.601 YUV to RGBX for one pixel.
#[inline]
fn yuv_to_rgbx(y: i32, u: i32, v: i32, out: &mut [u8]) {
    let c = y - 16;
    let d = u - 128;
    let e = v - 128;

    let r = (298 * c + 409 * e + 128) >> 8;
    let g = (298 * c - 100 * d - 208 * e + 128) >> 8;
    let b = (298 * c + 516 * d + 128) >> 8;

    out[0] = r.clamp(0, 255) as u8;
    out[1] = g.clamp(0, 255) as u8;
    out[2] = b.clamp(0, 255) as u8;
    out[3] = 255;
}

/// Check the source payload against the converter's own input requirement
/// and shape `dst` as an RGBX frame of the same geometry. The requirement
/// is computed per converter, not from the frame's claimed format: the
/// unknown-format fallback runs the YUYV path on frames whose header says
/// otherwise. Header fields carry over so sequence/timestamps survive
/// conversion.
fn prepare_rgbx_output(src: &RawFrame, dst: &mut RawFrame, needed: usize) -> ConvertResult<()> {
    if src.width == 0 || src.height == 0 {
        return Err(ConvertError::BadDimensions {
            width: src.width,
            height: src.height,
        });
    }
    if src.data.len() < needed {
        return Err(ConvertError::ShortInput {
            needed,
            got: src.data.len(),
        });
    }
    let out_bytes = src.width as usize * src.height as usize * PREVIEW_PIXEL_BYTES;
    if !dst.ensure_capacity(out_bytes) {
        return Err(ConvertError::OutputAllocation(out_bytes));
    }
    dst.data.clear();
    dst.data.resize(out_bytes, 0);
    dst.format = FrameFormat::Rgbx;
    dst.width = src.width;
    dst.height = src.height;
    dst.step = src.width as usize * PREVIEW_PIXEL_BYTES;
    dst.sequence = src.sequence;
    dst.timestamp = src.timestamp;
    Ok(())
}

/// YUYV (packed 4:2:2) to RGBX.
pub fn yuyv_to_rgbx(src: &RawFrame, dst: &mut RawFrame) -> ConvertResult<()> {
    let pixels = src.width as usize * src.height as usize;
    prepare_rgbx_output(src, dst, pixels * 2)?;
    let input = &src.data[..pixels * 2];
    for (group, out) in input
        .chunks_exact(4)
        .zip(dst.data.chunks_exact_mut(2 * PREVIEW_PIXEL_BYTES))
    {
        let y0 = group[0] as i32;
        let u = group[1] as i32;
        let y1 = group[2] as i32;
        let v = group[3] as i32;
        yuv_to_rgbx(y0, u, v, &mut out[..4]);
        yuv_to_rgbx(y1, u, v, &mut out[4..]);
    }
    Ok(())
}

/// Semi-planar 4:2:0 to RGBX; `vu_order` selects NV21's swapped chroma.
fn semiplanar_to_rgbx(src: &RawFrame, dst: &mut RawFrame, vu_order: bool) -> ConvertResult<()> {
    if src.width % 2 != 0 || src.height % 2 != 0 {
        return Err(ConvertError::BadDimensions {
            width: src.width,
            height: src.height,
        });
    }
    let w = src.width as usize;
    let h = src.height as usize;
    prepare_rgbx_output(src, dst, w * h * 3 / 2)?;
    let y_plane = &src.data[..w * h];
    let uv_plane = &src.data[w * h..w * h + w * h / 2];

    for row in 0..h {
        let uv_row = (row / 2) * w;
        for col in 0..w {
            let y = y_plane[row * w + col] as i32;
            let uv_idx = uv_row + (col & !1);
            let (u, v) = if vu_order {
                (uv_plane[uv_idx + 1] as i32, uv_plane[uv_idx] as i32)
            } else {
                (uv_plane[uv_idx] as i32, uv_plane[uv_idx + 1] as i32)
            };
            let out = (row * w + col) * PREVIEW_PIXEL_BYTES;
            yuv_to_rgbx(y, u, v, &mut dst.data[out..out + PREVIEW_PIXEL_BYTES]);
        }
    }
    Ok(())
}

/// NV12 (semi-planar, UV) to RGBX.
pub fn nv12_to_rgbx(src: &RawFrame, dst: &mut RawFrame) -> ConvertResult<()> {
    semiplanar_to_rgbx(src, dst, false)
}

/// NV21 (semi-planar, VU) to RGBX.
pub fn nv21_to_rgbx(src: &RawFrame, dst: &mut RawFrame) -> ConvertResult<()> {
    semiplanar_to_rgbx(src, dst, true)
}

/// I420 (planar 4:2:0) to RGBX.
pub fn i420_to_rgbx(src: &RawFrame, dst: &mut RawFrame) -> ConvertResult<()> {
    if src.width % 2 != 0 || src.height % 2 != 0 {
        return Err(ConvertError::BadDimensions {
            width: src.width,
            height: src.height,
        });
    }
    let w = src.width as usize;
    let h = src.height as usize;
    prepare_rgbx_output(src, dst, w * h * 3 / 2)?;
    let y_plane = &src.data[..w * h];
    let u_plane = &src.data[w * h..w * h + w * h / 4];
    let v_plane = &src.data[w * h + w * h / 4..w * h + w * h / 2];

    for row in 0..h {
        let chroma_row = (row / 2) * (w / 2);
        for col in 0..w {
            let y = y_plane[row * w + col] as i32;
            let chroma_idx = chroma_row + col / 2;
            let u = u_plane[chroma_idx] as i32;
            let v = v_plane[chroma_idx] as i32;
            let out = (row * w + col) * PREVIEW_PIXEL_BYTES;
            yuv_to_rgbx(y, u, v, &mut dst.data[out..out + PREVIEW_PIXEL_BYTES]);
        }
    }
    Ok(())
}

/// MJPEG to RGBX through the JPEG decoder.
///
/// The decoded image's own dimensions win over the frame header; MJPEG
/// headers are authoritative for their payload.
pub fn mjpeg_to_rgbx(src: &RawFrame, dst: &mut RawFrame) -> ConvertResult<()> {
    if src.data.is_empty() {
        return Err(ConvertError::ShortInput { needed: 1, got: 0 });
    }
    let decoded = image::load_from_memory_with_format(&src.data, ImageFormat::Jpeg)
        .map_err(|e| ConvertError::Decode(e.to_string()))?;
    let rgba = decoded.to_rgba8();
    let (width, height) = rgba.dimensions();
    let out_bytes = width as usize * height as usize * PREVIEW_PIXEL_BYTES;
    if !dst.ensure_capacity(out_bytes) {
        return Err(ConvertError::OutputAllocation(out_bytes));
    }
    dst.data.clear();
    dst.data.extend_from_slice(rgba.as_raw());
    dst.format = FrameFormat::Rgbx;
    dst.width = width;
    dst.height = height;
    dst.step = width as usize * PREVIEW_PIXEL_BYTES;
    dst.sequence = src.sequence;
    dst.timestamp = src.timestamp;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(format: FrameFormat, width: u32, height: u32, data: Vec<u8>) -> RawFrame {
        RawFrame {
            format,
            width,
            height,
            step: 0,
            data,
            sequence: Some(3),
            timestamp: None,
        }
    }

    fn out_frame() -> RawFrame {
        RawFrame::with_capacity(0).expect("alloc")
    }

    #[test]
    fn yuyv_white_converts_to_white() {
        // Y=235 U=V=128 is studio-swing white
        let src = frame(FrameFormat::Yuyv, 2, 2, vec![235, 128, 235, 128, 235, 128, 235, 128]);
        let mut dst = out_frame();
        yuyv_to_rgbx(&src, &mut dst).expect("convert");
        assert_eq!(dst.format, FrameFormat::Rgbx);
        assert_eq!(dst.data.len(), 16);
        for pixel in dst.data.chunks_exact(4) {
            assert!(pixel[0] > 250 && pixel[1] > 250 && pixel[2] > 250);
            assert_eq!(pixel[3], 255);
        }
        assert_eq!(dst.sequence, Some(3));
    }

    #[test]
    fn yuyv_rejects_short_input() {
        let src = frame(FrameFormat::Yuyv, 4, 4, vec![0; 10]);
        let mut dst = out_frame();
        assert!(matches!(
            yuyv_to_rgbx(&src, &mut dst),
            Err(ConvertError::ShortInput { needed: 32, got: 10 })
        ));
    }

    #[test]
    fn nv12_neutral_gray() {
        let mut data = vec![128u8; 4]; // Y
        data.extend_from_slice(&[128, 128]); // UV
        let src = frame(FrameFormat::Nv12, 2, 2, data);
        let mut dst = out_frame();
        nv12_to_rgbx(&src, &mut dst).expect("convert");
        for pixel in dst.data.chunks_exact(4) {
            // neutral chroma: R == G == B
            assert_eq!(pixel[0], pixel[1]);
            assert_eq!(pixel[1], pixel[2]);
            assert_eq!(pixel[3], 255);
        }
    }

    #[test]
    fn nv21_swaps_chroma_against_nv12() {
        // strong V in NV12 order reads as strong U in NV21 order
        let mut data = vec![128u8; 4];
        data.extend_from_slice(&[255, 0]);
        let nv12_src = frame(FrameFormat::Nv12, 2, 2, data.clone());
        let nv21_src = frame(FrameFormat::Nv21, 2, 2, data);
        let mut nv12_out = out_frame();
        let mut nv21_out = out_frame();
        nv12_to_rgbx(&nv12_src, &mut nv12_out).expect("convert");
        nv21_to_rgbx(&nv21_src, &mut nv21_out).expect("convert");
        // NV12 reads (u=255, v=0): blue-ish. NV21 reads (u=0, v=255): red-ish.
        assert!(nv12_out.data[2] > nv12_out.data[0]);
        assert!(nv21_out.data[0] > nv21_out.data[2]);
    }

    #[test]
    fn i420_matches_nv12_for_same_content() {
        let w = 4u32;
        let h = 2u32;
        let y: Vec<u8> = (0..8).map(|i| 16 + i * 20).collect();
        let u = [100u8, 140];
        let v = [90u8, 200];

        let mut nv12_data = y.clone();
        nv12_data.extend_from_slice(&[u[0], v[0], u[1], v[1]]);
        let mut i420_data = y;
        i420_data.extend_from_slice(&u);
        i420_data.extend_from_slice(&v);

        let mut nv12_out = out_frame();
        let mut i420_out = out_frame();
        nv12_to_rgbx(&frame(FrameFormat::Nv12, w, h, nv12_data), &mut nv12_out).expect("convert");
        i420_to_rgbx(&frame(FrameFormat::I420, w, h, i420_data), &mut i420_out).expect("convert");
        assert_eq!(nv12_out.data, i420_out.data);
    }

    #[test]
    fn mjpeg_decodes_real_jpeg() {
        let rgb = image::RgbImage::from_pixel(8, 8, image::Rgb([200, 100, 50]));
        let mut jpeg = Vec::new();
        rgb.write_to(&mut std::io::Cursor::new(&mut jpeg), ImageFormat::Jpeg)
            .expect("encode");

        let src = frame(FrameFormat::Mjpeg, 8, 8, jpeg);
        let mut dst = out_frame();
        mjpeg_to_rgbx(&src, &mut dst).expect("decode");
        assert_eq!((dst.width, dst.height), (8, 8));
        assert_eq!(dst.data.len(), 8 * 8 * 4);
        assert_eq!(dst.format, FrameFormat::Rgbx);
    }

    #[test]
    fn mjpeg_rejects_garbage() {
        let src = frame(FrameFormat::Mjpeg, 8, 8, vec![0xDE, 0xAD, 0xBE, 0xEF]);
        let mut dst = out_frame();
        assert!(matches!(
            mjpeg_to_rgbx(&src, &mut dst),
            Err(ConvertError::Decode(_))
        ));
    }
}
