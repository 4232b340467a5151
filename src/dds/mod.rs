//! DDS container codec.
//!
//! Only the parts of the format the pipeline needs: the fixed 128-byte
//! prologue, the byte extent of the top mip, a decoder for the top mip of the
//! layouts found in game corpora, and a writer for uncompressed 1- and
//! 4-channel images with full mip chains.

mod decode;

pub use decode::decode_rgba;

use std::path::{Path, PathBuf};

use bytemuck::{Pod, Zeroable};
use image::{
    GrayImage, ImageBuffer, Pixel, RgbaImage,
    imageops::{self, FilterType},
};

use crate::{
    error::{Result, TexbindError},
    utils::write_atomic,
};

pub const DDS_MAGIC: [u8; 4] = *b"DDS ";
/// Size of magic plus the legacy header; pixel data of legacy files starts here.
pub const HEADER_LEN: usize = 128;
/// Size of the `DX10` extension that follows the legacy header.
pub const DX10_HEADER_LEN: usize = 20;

pub const DDSD_CAPS: u32 = 0x1;
pub const DDSD_HEIGHT: u32 = 0x2;
pub const DDSD_WIDTH: u32 = 0x4;
pub const DDSD_PITCH: u32 = 0x8;
pub const DDSD_PIXELFORMAT: u32 = 0x1000;
pub const DDSD_MIPMAPCOUNT: u32 = 0x20000;

pub const DDSCAPS_COMPLEX: u32 = 0x8;
pub const DDSCAPS_TEXTURE: u32 = 0x1000;
pub const DDSCAPS_MIPMAP: u32 = 0x400000;

pub const DDPF_ALPHAPIXELS: u32 = 0x1;
pub const DDPF_ALPHA: u32 = 0x2;
pub const DDPF_FOURCC: u32 = 0x4;
pub const DDPF_RGB: u32 = 0x40;
pub const DDPF_YUV: u32 = 0x200;
pub const DDPF_LUMINANCE: u32 = 0x20000;
/// RGB | YUV | ALPHA | LUMINANCE: the uncompressed family.
pub const DDPF_UNCOMPRESSED: u32 = DDPF_ALPHA | DDPF_RGB | DDPF_YUV | DDPF_LUMINANCE;

pub const FOURCC_DXT1: [u8; 4] = *b"DXT1";
pub const FOURCC_DX10: [u8; 4] = *b"DX10";

pub const DXGI_R8G8B8A8_UNORM: u32 = 28;
pub const DXGI_R8G8B8A8_UNORM_SRGB: u32 = 29;
pub const DXGI_B8G8R8A8_UNORM: u32 = 87;
pub const DXGI_B8G8R8A8_UNORM_SRGB: u32 = 91;
const D3D10_RESOURCE_DIMENSION_TEXTURE2D: u32 = 3;

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Zeroable, Pod)]
pub struct DdsPixelFormat {
    pub size: u32,
    pub flags: u32,
    pub four_cc: [u8; 4],
    pub rgb_bit_count: u32,
    pub r_mask: u32,
    pub g_mask: u32,
    pub b_mask: u32,
    pub a_mask: u32,
}

impl DdsPixelFormat {
    /// 8-bit single channel stored in the red mask.
    pub fn luminance8() -> Self {
        Self {
            size: 32,
            flags: DDPF_LUMINANCE,
            rgb_bit_count: 8,
            r_mask: 0xFF,
            ..Default::default()
        }
    }

    /// 32-bit RGBA with bytes in R, G, B, A order.
    pub fn rgba8() -> Self {
        Self {
            size: 32,
            flags: DDPF_RGB | DDPF_ALPHAPIXELS,
            rgb_bit_count: 32,
            r_mask: 0x0000_00FF,
            g_mask: 0x0000_FF00,
            b_mask: 0x00FF_0000,
            a_mask: 0xFF00_0000,
            ..Default::default()
        }
    }

    /// 24-bit RGB with bytes in B, G, R order.
    pub fn bgr8() -> Self {
        Self {
            size: 32,
            flags: DDPF_RGB,
            rgb_bit_count: 24,
            r_mask: 0x00FF_0000,
            g_mask: 0x0000_FF00,
            b_mask: 0x0000_00FF,
            ..Default::default()
        }
    }

    pub fn four_cc(code: [u8; 4]) -> Self {
        Self {
            size: 32,
            flags: DDPF_FOURCC,
            four_cc: code,
            ..Default::default()
        }
    }

    pub fn is_four_cc(&self) -> bool {
        self.flags & DDPF_FOURCC != 0
    }

    pub fn is_uncompressed(&self) -> bool {
        !self.is_four_cc() && self.flags & DDPF_UNCOMPRESSED != 0
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Zeroable, Pod)]
pub struct DdsHeader {
    pub magic: [u8; 4],
    pub size: u32,
    pub flags: u32,
    pub height: u32,
    pub width: u32,
    pub pitch_or_linear_size: u32,
    pub depth: u32,
    pub mip_map_count: u32,
    pub reserved1: [u32; 11],
    pub pixel_format: DdsPixelFormat,
    pub caps: u32,
    pub caps2: u32,
    pub caps3: u32,
    pub caps4: u32,
    pub reserved2: u32,
}

impl DdsHeader {
    /// Header for a mipmapped 2D texture whose rows are `pitch` bytes.
    pub fn new(width: u32, height: u32, pitch: u32, mip_map_count: u32, pf: DdsPixelFormat) -> Self {
        Self {
            magic: DDS_MAGIC,
            size: 124,
            flags: DDSD_CAPS
                | DDSD_HEIGHT
                | DDSD_WIDTH
                | DDSD_PITCH
                | DDSD_PIXELFORMAT
                | DDSD_MIPMAPCOUNT,
            height,
            width,
            pitch_or_linear_size: pitch,
            depth: 1,
            mip_map_count,
            reserved1: [0; 11],
            pixel_format: pf,
            caps: DDSCAPS_COMPLEX | DDSCAPS_TEXTURE | DDSCAPS_MIPMAP,
            caps2: 0,
            caps3: 0,
            caps4: 0,
            reserved2: 0,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::bytes_of(self)
    }
}

#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Zeroable, Pod)]
pub struct DdsHeaderDx10 {
    pub dxgi_format: u32,
    pub resource_dimension: u32,
    pub misc_flag: u32,
    pub array_size: u32,
    pub misc_flags2: u32,
}

/// The header facts of one texture file, parsed from its prologue and the
/// `DX10` extension when present.
#[derive(Clone, Debug)]
pub struct TextureAsset {
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    pub mip_map_count: u32,
    pub format: DdsPixelFormat,
    /// Present when the format code is `DX10`.
    pub dx10: Option<DdsHeaderDx10>,
}

impl TextureAsset {
    /// Parses the prologue at the start of `bytes`.
    pub fn parse(path: impl AsRef<Path>, bytes: &[u8]) -> Result<Self> {
        let path = path.as_ref();
        if bytes.len() < 4 || bytes[0..4] != DDS_MAGIC {
            return Err(TexbindError::malformed(path, "missing DDS magic"));
        }
        if bytes.len() < HEADER_LEN {
            return Err(TexbindError::malformed(
                path,
                format!("header is {} bytes, expected {HEADER_LEN}", bytes.len()),
            ));
        }

        let header = bytemuck::pod_read_unaligned::<DdsHeader>(&bytes[..HEADER_LEN]);
        let format = header.pixel_format;

        let dx10 = if format.is_four_cc() && format.four_cc == FOURCC_DX10 {
            let end = HEADER_LEN + DX10_HEADER_LEN;
            if bytes.len() < end {
                return Err(TexbindError::malformed(path, "truncated DX10 header"));
            }
            Some(bytemuck::pod_read_unaligned::<DdsHeaderDx10>(
                &bytes[HEADER_LEN..end],
            ))
        } else {
            None
        };

        Ok(Self {
            path: path.to_path_buf(),
            width: header.width,
            height: header.height,
            mip_map_count: header.mip_map_count,
            format,
            dx10,
        })
    }

    /// Byte length of the top mip level.
    pub fn mip_extent(&self) -> Result<usize> {
        let pixels = self.pixel_count()?;
        if self.format.is_four_cc() {
            if self.format.four_cc == FOURCC_DXT1 {
                Ok(pixels / 2)
            } else {
                Ok(pixels)
            }
        } else if self.format.flags & DDPF_UNCOMPRESSED != 0 {
            pixels
                .checked_mul(self.format.rgb_bit_count as usize)
                .map(|bits| bits / 8)
                .ok_or_else(|| self.too_large())
        } else {
            Err(TexbindError::unsupported(
                &self.path,
                format!("pixel format flags {:#x}", self.format.flags),
            ))
        }
    }

    /// `width * height`, or an error when a corrupt header overflows it.
    pub fn pixel_count(&self) -> Result<usize> {
        (self.width as usize)
            .checked_mul(self.height as usize)
            .ok_or_else(|| self.too_large())
    }

    fn too_large(&self) -> TexbindError {
        TexbindError::malformed(
            &self.path,
            format!("{}x{} top mip does not fit in memory", self.width, self.height),
        )
    }

    /// Offset of the first pixel byte.
    pub fn data_offset(&self) -> usize {
        if self.dx10.is_some() {
            HEADER_LEN + DX10_HEADER_LEN
        } else {
            HEADER_LEN
        }
    }

    /// The 4bpp block format, whose 1-bit alpha is useless as a gloss source.
    pub fn is_dxt1(&self) -> bool {
        self.format.is_four_cc() && self.format.four_cc == FOURCC_DXT1
    }

    pub fn four_cc_str(&self) -> String {
        String::from_utf8_lossy(&self.format.four_cc).into_owned()
    }

    /// Whether the stored format carries an alpha channel.
    pub fn has_alpha(&self) -> bool {
        let pf = &self.format;
        if pf.is_four_cc() {
            return match &pf.four_cc {
                b"DXT2" | b"DXT3" | b"DXT4" | b"DXT5" => true,
                b"DX10" => self.dx10.is_some_and(|ext| {
                    matches!(
                        ext.dxgi_format,
                        DXGI_R8G8B8A8_UNORM
                            | DXGI_R8G8B8A8_UNORM_SRGB
                            | DXGI_B8G8R8A8_UNORM
                            | DXGI_B8G8R8A8_UNORM_SRGB
                    )
                }),
                _ => false,
            };
        }
        (pf.flags & DDPF_ALPHAPIXELS != 0 && pf.a_mask != 0) || pf.flags & DDPF_ALPHA != 0
    }
}

/// Number of levels in a full chain down to the smaller dimension's 1 pixel.
pub fn mip_count(width: u32, height: u32) -> u32 {
    let min = width.min(height).max(1);
    u32::BITS - min.leading_zeros()
}

/// Encodes an uncompressed image with a full mip chain.
///
/// `channels` must be 1 (legacy header, 8-bit single channel) or 4 (`DX10`
/// header, `R8G8B8A8_UNORM`).
pub fn encode_dds(
    path: &Path,
    pixels: &[u8],
    width: u32,
    height: u32,
    channels: u32,
) -> Result<Vec<u8>> {
    if width == 0 || height == 0 {
        return Err(TexbindError::unsupported(path, "zero-sized image"));
    }
    let expected = width as usize * height as usize * channels as usize;
    if pixels.len() != expected {
        return Err(TexbindError::unsupported(
            path,
            format!("pixel buffer is {} bytes, expected {expected}", pixels.len()),
        ));
    }

    let levels = mip_count(width, height);
    let mut out = Vec::with_capacity(HEADER_LEN + DX10_HEADER_LEN + expected * 4 / 3 + 16);

    match channels {
        1 => {
            let header = DdsHeader::new(width, height, width, levels, DdsPixelFormat::luminance8());
            out.extend_from_slice(header.as_bytes());
            let image = GrayImage::from_raw(width, height, pixels.to_vec())
                .ok_or_else(|| TexbindError::unsupported(path, "bad single channel buffer"))?;
            push_mip_chain(&mut out, image, levels);
        }
        4 => {
            let header = DdsHeader::new(
                width,
                height,
                width * 4,
                levels,
                DdsPixelFormat::four_cc(FOURCC_DX10),
            );
            let ext = DdsHeaderDx10 {
                dxgi_format: DXGI_R8G8B8A8_UNORM,
                resource_dimension: D3D10_RESOURCE_DIMENSION_TEXTURE2D,
                misc_flag: 0,
                array_size: 1,
                misc_flags2: 0,
            };
            out.extend_from_slice(header.as_bytes());
            out.extend_from_slice(bytemuck::bytes_of(&ext));
            let image = RgbaImage::from_raw(width, height, pixels.to_vec())
                .ok_or_else(|| TexbindError::unsupported(path, "bad RGBA buffer"))?;
            push_mip_chain(&mut out, image, levels);
        }
        other => {
            return Err(TexbindError::unsupported(
                path,
                format!("cannot write {other} channel images"),
            ));
        }
    }

    Ok(out)
}

/// Encodes and atomically writes a DDS file, creating parent directories.
pub fn write_dds(
    path: impl AsRef<Path>,
    pixels: &[u8],
    width: u32,
    height: u32,
    channels: u32,
) -> Result<()> {
    let path = path.as_ref();
    let bytes = encode_dds(path, pixels, width, height, channels)?;
    write_atomic(path, &bytes)
}

fn push_mip_chain<P>(out: &mut Vec<u8>, mut level: ImageBuffer<P, Vec<u8>>, levels: u32)
where
    P: Pixel<Subpixel = u8> + 'static,
{
    for i in 0..levels {
        out.extend_from_slice(level.as_raw());
        if i + 1 < levels {
            let (w, h) = level.dimensions();
            level = imageops::resize(&level, (w / 2).max(1), (h / 2).max(1), FilterType::Triangle);
        }
    }
}
