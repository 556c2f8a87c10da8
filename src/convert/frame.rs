use crate::panel::{ColorMode, PanelSpec};

/// A 1 bit-per-pixel layer, packed MSB first with each row padded to a whole byte.
/// A set bit is "white" (no ink), matching what two-colour controllers expect.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Plane {
    width: u16,
    height: u16,
    data: Vec<u8>,
}

impl Plane {
    pub fn white(width: u16, height: u16) -> Self {
        let len = Self::stride_for(width) * height as usize;
        Self {
            width,
            height,
            data: vec![0xFF; len],
        }
    }

    pub fn from_bytes(width: u16, height: u16, data: Vec<u8>) -> Option<Self> {
        if data.len() != Self::stride_for(width) * height as usize {
            return None;
        }
        Some(Self {
            width,
            height,
            data,
        })
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn stride(&self) -> usize {
        Self::stride_for(self.width)
    }

    fn stride_for(width: u16) -> usize {
        (width as usize).div_ceil(8)
    }

    pub fn is_white(&self, x: usize, y: usize) -> bool {
        let (byte, mask) = self.locate(x, y);
        self.data[byte] & mask != 0
    }

    pub fn set_white(&mut self, x: usize, y: usize, white: bool) {
        let (byte, mask) = self.locate(x, y);
        if white {
            self.data[byte] |= mask;
        } else {
            self.data[byte] &= !mask;
        }
    }

    pub fn invert(&mut self) {
        for byte in &mut self.data {
            *byte = !*byte;
        }
        self.mask_row_padding();
    }

    fn locate(&self, x: usize, y: usize) -> (usize, u8) {
        (y * self.stride() + x / 8, 0x80 >> (x % 8))
    }

    // Padding bits past the last column stay white so inversion never leaks ink.
    fn mask_row_padding(&mut self) {
        let used = self.width as usize % 8;
        if used == 0 {
            return;
        }
        let pad_mask = 0xFFu8 >> used;
        let stride = self.stride();
        for row in self.data.chunks_mut(stride) {
            if let Some(last) = row.last_mut() {
                *last |= pad_mask;
            }
        }
    }
}

/// One palette index per pixel, row-major. Indices address the ACeP device palette.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IndexedPlane {
    width: u16,
    height: u16,
    indices: Vec<u8>,
}

impl IndexedPlane {
    pub fn filled(width: u16, height: u16, index: u8) -> Self {
        Self {
            width,
            height,
            indices: vec![index & 0x07; width as usize * height as usize],
        }
    }

    pub fn from_indices(width: u16, height: u16, indices: Vec<u8>) -> Option<Self> {
        if indices.len() != width as usize * height as usize {
            return None;
        }
        Some(Self {
            width,
            height,
            indices,
        })
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    pub fn indices(&self) -> &[u8] {
        &self.indices
    }

    pub fn get(&self, x: usize, y: usize) -> u8 {
        self.indices[y * self.width as usize + x]
    }
}

/// Device-ready output of the conversion pipeline.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Frame {
    TwoColor { primary: Plane, secondary: Plane },
    Palette(IndexedPlane),
}

impl Frame {
    pub fn blank(panel: &PanelSpec) -> Self {
        match panel.color_mode {
            ColorMode::TwoColor => Frame::TwoColor {
                primary: Plane::white(panel.width, panel.height),
                secondary: Plane::white(panel.width, panel.height),
            },
            ColorMode::SevenColorPalette => {
                Frame::Palette(IndexedPlane::filled(panel.width, panel.height, 1))
            }
        }
    }

    pub fn dimensions(&self) -> (u16, u16) {
        match self {
            Frame::TwoColor { primary, .. } => (primary.width(), primary.height()),
            Frame::Palette(plane) => (plane.width(), plane.height()),
        }
    }

    pub fn color_mode(&self) -> ColorMode {
        match self {
            Frame::TwoColor { .. } => ColorMode::TwoColor,
            Frame::Palette(_) => ColorMode::SevenColorPalette,
        }
    }

    /// Exchanges the black and red planes. Palette frames are returned unchanged.
    pub fn swap_planes(self) -> Self {
        match self {
            Frame::TwoColor { primary, secondary } => Frame::TwoColor {
                primary: secondary,
                secondary: primary,
            },
            palette => palette,
        }
    }

    pub fn fits(&self, panel: &PanelSpec) -> bool {
        self.color_mode() == panel.color_mode && self.dimensions() == (panel.width, panel.height)
    }
}
