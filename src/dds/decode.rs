use image::{ImageFormat, RgbaImage};

use super::{
    DDPF_ALPHA, DDPF_ALPHAPIXELS, DDPF_LUMINANCE, DDPF_RGB, DXGI_B8G8R8A8_UNORM,
    DXGI_B8G8R8A8_UNORM_SRGB, DXGI_R8G8B8A8_UNORM, DXGI_R8G8B8A8_UNORM_SRGB, TextureAsset,
};
use crate::error::{Result, TexbindError};

/// Decodes the top mip of `bytes` (the whole file) into RGBA.
///
/// Formats without alpha decode with an opaque alpha channel.
pub fn decode_rgba(asset: &TextureAsset, bytes: &[u8]) -> Result<RgbaImage> {
    let pf = &asset.format;
    if pf.is_four_cc() {
        return match &pf.four_cc {
            b"DXT1" | b"DXT3" | b"DXT5" => {
                Ok(image::load_from_memory_with_format(bytes, ImageFormat::Dds)?.to_rgba8())
            }
            b"DX10" => decode_dx10(asset, bytes),
            _ => Err(TexbindError::unsupported(
                &asset.path,
                format!("cannot decode {}", asset.four_cc_str()),
            )),
        };
    }

    if pf.flags & (DDPF_RGB | DDPF_LUMINANCE | DDPF_ALPHA) == 0 {
        return Err(TexbindError::unsupported(
            &asset.path,
            format!("cannot decode pixel format flags {:#x}", pf.flags),
        ));
    }

    let bytes_per_pixel = match pf.rgb_bit_count {
        8 | 16 | 24 | 32 => pf.rgb_bit_count as usize / 8,
        other => {
            return Err(TexbindError::unsupported(
                &asset.path,
                format!("{other}-bit uncompressed pixels"),
            ));
        }
    };
    let data = top_level(asset, bytes, bytes_per_pixel)?;

    let alpha_mask = if pf.flags & (DDPF_ALPHAPIXELS | DDPF_ALPHA) != 0 {
        pf.a_mask
    } else {
        0
    };

    let mut out = Vec::with_capacity(data.len() / bytes_per_pixel * 4);
    for px in data.chunks_exact(bytes_per_pixel) {
        let mut word = [0u8; 4];
        word[..bytes_per_pixel].copy_from_slice(px);
        let value = u32::from_le_bytes(word);

        let alpha = channel(value, alpha_mask).unwrap_or(255);
        let rgb = if pf.flags & DDPF_LUMINANCE != 0 {
            let l = channel(value, pf.r_mask).unwrap_or(0);
            [l, l, l]
        } else if pf.flags & DDPF_RGB != 0 {
            [
                channel(value, pf.r_mask).unwrap_or(0),
                channel(value, pf.g_mask).unwrap_or(0),
                channel(value, pf.b_mask).unwrap_or(0),
            ]
        } else {
            // alpha-only
            [0, 0, 0]
        };
        out.extend_from_slice(&[rgb[0], rgb[1], rgb[2], alpha]);
    }

    RgbaImage::from_raw(asset.width, asset.height, out)
        .ok_or_else(|| TexbindError::malformed(&asset.path, "pixel buffer size mismatch"))
}

fn decode_dx10(asset: &TextureAsset, bytes: &[u8]) -> Result<RgbaImage> {
    let dxgi = asset.dx10.map(|ext| ext.dxgi_format).unwrap_or_default();
    let swap = match dxgi {
        DXGI_R8G8B8A8_UNORM | DXGI_R8G8B8A8_UNORM_SRGB => false,
        DXGI_B8G8R8A8_UNORM | DXGI_B8G8R8A8_UNORM_SRGB => true,
        other => {
            return Err(TexbindError::unsupported(
                &asset.path,
                format!("cannot decode DXGI format {other}"),
            ));
        }
    };

    let mut data = top_level(asset, bytes, 4)?.to_vec();
    if swap {
        for px in data.chunks_exact_mut(4) {
            px.swap(0, 2);
        }
    }

    RgbaImage::from_raw(asset.width, asset.height, data)
        .ok_or_else(|| TexbindError::malformed(&asset.path, "pixel buffer size mismatch"))
}

fn top_level<'a>(asset: &TextureAsset, bytes: &'a [u8], bytes_per_pixel: usize) -> Result<&'a [u8]> {
    let start = asset.data_offset();
    let len = asset
        .pixel_count()?
        .checked_mul(bytes_per_pixel)
        .ok_or_else(|| TexbindError::malformed(&asset.path, "top mip size overflows"))?;
    bytes.get(start..start.saturating_add(len)).ok_or_else(|| {
        TexbindError::malformed(
            &asset.path,
            format!("top mip needs {len} bytes at offset {start}, file is {}", bytes.len()),
        )
    })
}

/// Extracts the bits under `mask` and rescales them to 8 bits.
fn channel(value: u32, mask: u32) -> Option<u8> {
    if mask == 0 {
        return None;
    }
    let shift = mask.trailing_zeros();
    let max = (mask >> shift) as u64;
    let raw = ((value & mask) >> shift) as u64;
    Some((raw * 255 / max) as u8)
}
