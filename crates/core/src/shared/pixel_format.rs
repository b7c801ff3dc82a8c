/// Pixel layout of the frames a caller supplies.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PixelLayout {
    Gray,
    Rgb,
}

impl PixelLayout {
    /// Maps the colour-channel count used by capture code: 1 is grayscale,
    /// anything else is packed RGB.
    pub fn from_colours(colours: u8) -> Self {
        if colours == 1 {
            Self::Gray
        } else {
            Self::Rgb
        }
    }

    pub fn pixel_format(self) -> PixelFormat {
        match self {
            Self::Gray => PixelFormat::Gray8,
            Self::Rgb => PixelFormat::Rgb24,
        }
    }
}

/// Pixel formats understood by the frame buffers.
///
/// Planar formats store their planes back to back with no row padding.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PixelFormat {
    Gray8,
    Rgb24,
    Yuv420p,
    /// Full-range 4:2:0, preferred by MJPEG encoders.
    Yuvj420p,
    Yuv422p,
    Yuv444p,
}

/// Geometry of one plane: bytes per row and number of rows.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PlaneGeometry {
    pub row_bytes: usize,
    pub rows: usize,
}

impl PlaneGeometry {
    pub fn len(&self) -> usize {
        self.row_bytes * self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl PixelFormat {
    pub fn name(self) -> &'static str {
        match self {
            Self::Gray8 => "gray",
            Self::Rgb24 => "rgb24",
            Self::Yuv420p => "yuv420p",
            Self::Yuvj420p => "yuvj420p",
            Self::Yuv422p => "yuv422p",
            Self::Yuv444p => "yuv444p",
        }
    }

    pub fn planes(self, width: u32, height: u32) -> Vec<PlaneGeometry> {
        let w = width as usize;
        let h = height as usize;
        let cw = w.div_ceil(2);
        let ch = h.div_ceil(2);
        let plane = |row_bytes, rows| PlaneGeometry { row_bytes, rows };
        match self {
            Self::Gray8 => vec![plane(w, h)],
            Self::Rgb24 => vec![plane(w.saturating_mul(3), h)],
            Self::Yuv420p | Self::Yuvj420p => vec![plane(w, h), plane(cw, ch), plane(cw, ch)],
            Self::Yuv422p => vec![plane(w, h), plane(cw, h), plane(cw, h)],
            Self::Yuv444p => vec![plane(w, h), plane(w, h), plane(w, h)],
        }
    }

    /// Bytes needed for one tightly packed picture, or `None` when that
    /// does not fit in `usize`.
    pub fn picture_size(self, width: u32, height: u32) -> Option<usize> {
        self.planes(width, height)
            .iter()
            .try_fold(0usize, |total, p| total.checked_add(p.row_bytes.checked_mul(p.rows)?))
    }
}

impl std::fmt::Display for PixelFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
