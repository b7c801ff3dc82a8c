use crate::shared::error::StreamError;
use crate::shared::picture::Picture;
use crate::shared::pixel_format::PixelFormat;

/// Converts a GRAY8 or RGB24 picture into `dst`'s pixel format.
///
/// YUV output uses BT.601 coefficients: limited range (16-235) for the
/// `yuv*p` formats and full range for YUVJ420P. Chroma samples are the
/// average of the pixels they cover.
pub fn convert(src: &Picture, dst: &mut Picture) -> Result<(), StreamError> {
    if (src.width(), src.height()) != (dst.width(), dst.height()) {
        return Err(StreamError::Encode(format!(
            "cannot convert {}x{} picture into {}x{}",
            src.width(),
            src.height(),
            dst.width(),
            dst.height()
        )));
    }
    if !matches!(src.format(), PixelFormat::Gray8 | PixelFormat::Rgb24) {
        return Err(StreamError::Encode(format!(
            "conversion from {} is not supported",
            src.format()
        )));
    }

    let width = src.width() as usize;
    let height = src.height() as usize;

    match dst.format() {
        PixelFormat::Gray8 => {
            let out = dst.data_mut();
            for y in 0..height {
                for x in 0..width {
                    let [r, g, b] = rgb_at(src, x, y);
                    out[y * width + x] = luma_full(r, g, b);
                }
            }
        }
        PixelFormat::Rgb24 => {
            let out = dst.data_mut();
            for y in 0..height {
                for x in 0..width {
                    let i = (y * width + x) * 3;
                    out[i..i + 3].copy_from_slice(&rgb_at(src, x, y));
                }
            }
        }
        PixelFormat::Yuv420p => to_yuv(src, dst, (2, 2), Range::Limited),
        PixelFormat::Yuvj420p => to_yuv(src, dst, (2, 2), Range::Full),
        PixelFormat::Yuv422p => to_yuv(src, dst, (2, 1), Range::Limited),
        PixelFormat::Yuv444p => to_yuv(src, dst, (1, 1), Range::Limited),
    }
    Ok(())
}

#[derive(Clone, Copy)]
enum Range {
    Limited,
    Full,
}

fn rgb_at(src: &Picture, x: usize, y: usize) -> [u8; 3] {
    let width = src.width() as usize;
    let data = src.data();
    match src.format() {
        PixelFormat::Rgb24 => {
            let i = (y * width + x) * 3;
            [data[i], data[i + 1], data[i + 2]]
        }
        _ => {
            let v = data[y * width + x];
            [v, v, v]
        }
    }
}

fn clamp(v: i32) -> u8 {
    v.clamp(0, 255) as u8
}

fn luma_full(r: u8, g: u8, b: u8) -> u8 {
    let (r, g, b) = (r as i32, g as i32, b as i32);
    clamp((77 * r + 150 * g + 29 * b + 128) >> 8)
}

fn luma(range: Range, r: i32, g: i32, b: i32) -> u8 {
    match range {
        Range::Limited => clamp(((66 * r + 129 * g + 25 * b + 128) >> 8) + 16),
        Range::Full => clamp((77 * r + 150 * g + 29 * b + 128) >> 8),
    }
}

fn chroma(range: Range, r: i32, g: i32, b: i32) -> (u8, u8) {
    match range {
        Range::Limited => (
            clamp(((-38 * r - 74 * g + 112 * b + 128) >> 8) + 128),
            clamp(((112 * r - 94 * g - 18 * b + 128) >> 8) + 128),
        ),
        Range::Full => (
            clamp(((-43 * r - 85 * g + 128 * b + 128) >> 8) + 128),
            clamp(((128 * r - 107 * g - 21 * b + 128) >> 8) + 128),
        ),
    }
}

fn to_yuv(src: &Picture, dst: &mut Picture, (sx, sy): (usize, usize), range: Range) {
    let width = src.width() as usize;
    let height = src.height() as usize;
    let planes = dst.planes();
    let chroma_width = planes[1].row_bytes;
    let chroma_height = planes[1].rows;
    let u_range = dst.plane_range(1);
    let v_start = dst.plane_range(2).start;

    let data = dst.data_mut();
    for y in 0..height {
        for x in 0..width {
            let [r, g, b] = rgb_at(src, x, y);
            data[y * width + x] = luma(range, r as i32, g as i32, b as i32);
        }
    }

    let (head, v_plane) = data.split_at_mut(v_start);
    let u_plane = &mut head[u_range];
    for cy in 0..chroma_height {
        for cx in 0..chroma_width {
            let (mut r, mut g, mut b, mut n) = (0i32, 0i32, 0i32, 0i32);
            for y in cy * sy..((cy + 1) * sy).min(height) {
                for x in cx * sx..((cx + 1) * sx).min(width) {
                    let [pr, pg, pb] = rgb_at(src, x, y);
                    r += pr as i32;
                    g += pg as i32;
                    b += pb as i32;
                    n += 1;
                }
            }
            let n = n.max(1);
            let (u, v) = chroma(range, r / n, g / n, b / n);
            u_plane[cy * chroma_width + cx] = u;
            v_plane[cy * chroma_width + cx] = v;
        }
    }
}
