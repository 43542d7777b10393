use {
    crate::utils::debug_fn::debug_fn,
    ahash::AHashMap,
    std::{
        fmt::{Debug, Write},
        sync::LazyLock,
    },
};

pub const INVALID_FOURCC: u32 = 0;

/// Bit layout of a packed RGB(A) format.
///
/// `colors` and `offsets` are indexed red, green, blue, alpha. Offsets are bit
/// offsets within the little-endian pixel.
#[derive(Copy, Clone, Debug)]
pub struct Format {
    pub name: &'static str,
    pub drm: u32,
    pub bpp: u32,
    pub colors: [u8; 4],
    pub offsets: [u8; 4],
}

impl Format {
    pub fn has_alpha(&self) -> bool {
        self.colors[3] != 0
    }
}

impl PartialEq for Format {
    fn eq(&self, other: &Self) -> bool {
        self.drm == other.drm
    }
}

impl Eq for Format {}

static FORMATS_MAP: LazyLock<AHashMap<u32, &'static Format>> = LazyLock::new(|| {
    let mut map = AHashMap::new();
    for format in FORMATS {
        assert!(map.insert(format.drm, format).is_none());
    }
    map
});

pub fn formats() -> &'static AHashMap<u32, &'static Format> {
    &FORMATS_MAP
}

pub fn format_by_fourcc(fourcc: u32) -> Option<&'static Format> {
    FORMATS_MAP.get(&fourcc).copied()
}

/// Returns the format with the same color layout as `format` but without alpha.
pub fn find_opaque(format: &'static Format) -> Option<&'static Format> {
    if !format.has_alpha() {
        return Some(format);
    }
    FORMATS.iter().find(|other| {
        other.bpp == format.bpp
            && !other.has_alpha()
            && other.colors[..3] == format.colors[..3]
            && other.offsets[..3] == format.offsets[..3]
    })
}

pub const fn fourcc_code(a: char, b: char, c: char, d: char) -> u32 {
    (a as u32) | ((b as u32) << 8) | ((c as u32) << 16) | ((d as u32) << 24)
}

pub fn debug(fourcc: u32) -> impl Debug {
    debug_fn(move |fmt| {
        fmt.write_char(fourcc as u8 as char)?;
        fmt.write_char((fourcc >> 8) as u8 as char)?;
        fmt.write_char((fourcc >> 16) as u8 as char)?;
        fmt.write_char((fourcc >> 24) as u8 as char)?;
        Ok(())
    })
}

const fn rgba(
    name: &'static str,
    drm: u32,
    bpp: u32,
    colors: [u8; 4],
    offsets: [u8; 4],
) -> Format {
    Format {
        name,
        drm,
        bpp,
        colors,
        offsets,
    }
}

pub const ARGB8888: Format = rgba(
    "argb8888",
    fourcc_code('A', 'R', '2', '4'),
    32,
    [8, 8, 8, 8],
    [16, 8, 0, 24],
);

pub const XRGB8888: Format = rgba(
    "xrgb8888",
    fourcc_code('X', 'R', '2', '4'),
    32,
    [8, 8, 8, 0],
    [16, 8, 0, 0],
);

pub const ABGR8888: Format = rgba(
    "abgr8888",
    fourcc_code('A', 'B', '2', '4'),
    32,
    [8, 8, 8, 8],
    [0, 8, 16, 24],
);

pub const XBGR8888: Format = rgba(
    "xbgr8888",
    fourcc_code('X', 'B', '2', '4'),
    32,
    [8, 8, 8, 0],
    [0, 8, 16, 0],
);

pub const RGBA8888: Format = rgba(
    "rgba8888",
    fourcc_code('R', 'A', '2', '4'),
    32,
    [8, 8, 8, 8],
    [24, 16, 8, 0],
);

pub const RGBX8888: Format = rgba(
    "rgbx8888",
    fourcc_code('R', 'X', '2', '4'),
    32,
    [8, 8, 8, 0],
    [24, 16, 8, 0],
);

pub const BGRA8888: Format = rgba(
    "bgra8888",
    fourcc_code('B', 'A', '2', '4'),
    32,
    [8, 8, 8, 8],
    [8, 16, 24, 0],
);

pub const BGRX8888: Format = rgba(
    "bgrx8888",
    fourcc_code('B', 'X', '2', '4'),
    32,
    [8, 8, 8, 0],
    [8, 16, 24, 0],
);

pub const RGB565: Format = rgba(
    "rgb565",
    fourcc_code('R', 'G', '1', '6'),
    16,
    [5, 6, 5, 0],
    [11, 5, 0, 0],
);

pub const ARGB2101010: Format = rgba(
    "argb2101010",
    fourcc_code('A', 'R', '3', '0'),
    32,
    [10, 10, 10, 2],
    [20, 10, 0, 30],
);

pub const XRGB2101010: Format = rgba(
    "xrgb2101010",
    fourcc_code('X', 'R', '3', '0'),
    32,
    [10, 10, 10, 0],
    [20, 10, 0, 0],
);

pub const ABGR2101010: Format = rgba(
    "abgr2101010",
    fourcc_code('A', 'B', '3', '0'),
    32,
    [10, 10, 10, 2],
    [0, 10, 20, 30],
);

pub const XBGR2101010: Format = rgba(
    "xbgr2101010",
    fourcc_code('X', 'B', '3', '0'),
    32,
    [10, 10, 10, 0],
    [0, 10, 20, 0],
);

pub const ARGB16161616F: Format = rgba(
    "argb16161616f",
    fourcc_code('A', 'R', '4', 'H'),
    64,
    [16, 16, 16, 16],
    [32, 16, 0, 48],
);

pub const XRGB16161616F: Format = rgba(
    "xrgb16161616f",
    fourcc_code('X', 'R', '4', 'H'),
    64,
    [16, 16, 16, 0],
    [32, 16, 0, 0],
);

pub const ABGR16161616F: Format = rgba(
    "abgr16161616f",
    fourcc_code('A', 'B', '4', 'H'),
    64,
    [16, 16, 16, 16],
    [0, 16, 32, 48],
);

pub const XBGR16161616F: Format = rgba(
    "xbgr16161616f",
    fourcc_code('X', 'B', '4', 'H'),
    64,
    [16, 16, 16, 0],
    [0, 16, 32, 0],
);

pub static FORMATS: &[Format] = &[
    ARGB8888,
    XRGB8888,
    ABGR8888,
    XBGR8888,
    RGBA8888,
    RGBX8888,
    BGRA8888,
    BGRX8888,
    RGB565,
    ARGB2101010,
    XRGB2101010,
    ABGR2101010,
    XBGR2101010,
    ARGB16161616F,
    XRGB16161616F,
    ABGR16161616F,
    XBGR16161616F,
];
