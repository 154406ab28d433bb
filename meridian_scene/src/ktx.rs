//! Reader for KTX 1.1 cube maps with uncompressed 8-bit RGB or RGBA faces.

use crate::{environment::CubeData, error::LoadError};
use meridian_render::{PixelData, PixelFormat};
use std::path::Path;

const IDENTIFIER: [u8; 12] = [
    0xab, b'K', b'T', b'X', b' ', b'1', b'1', 0xbb, b'\r', b'\n', 0x1a, b'\n',
];
const ENDIANNESS: u32 = 0x0403_0201;

const GL_UNSIGNED_BYTE: u32 = 0x1401;
const GL_RGB: u32 = 0x1907;
const GL_RGBA: u32 = 0x1908;

/// Reads the cube map at `path`; an unreadable file is no map.
pub(crate) fn load_cube_map(path: &Path) -> Result<Option<CubeData>, LoadError> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "failed to read cube map");
            return Ok(None);
        }
    };
    parse(&bytes)
        .map(Some)
        .map_err(|reason| LoadError::InvalidKtx {
            path: path.to_owned(),
            reason,
        })
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
    swap: bool,
}

impl<'a> Reader<'a> {
    fn take(&mut self, len: usize) -> Result<&'a [u8], &'static str> {
        let end = self.pos.checked_add(len).ok_or("truncated file")?;
        let slice = self.bytes.get(self.pos..end).ok_or("truncated file")?;
        self.pos = end;
        Ok(slice)
    }

    fn u32(&mut self) -> Result<u32, &'static str> {
        let mut word = [0; 4];
        word.copy_from_slice(self.take(4)?);
        let value = u32::from_le_bytes(word);
        Ok(if self.swap { value.swap_bytes() } else { value })
    }

    fn align(&mut self) {
        self.pos = align4(self.pos);
    }
}

fn align4(value: usize) -> usize {
    (value + 3) & !3
}

pub(crate) fn parse(bytes: &[u8]) -> Result<CubeData, &'static str> {
    let mut reader = Reader {
        bytes,
        pos: 0,
        swap: false,
    };
    if reader.take(IDENTIFIER.len())? != IDENTIFIER {
        return Err("not a KTX 1.1 file");
    }
    reader.swap = match reader.u32()? {
        ENDIANNESS => false,
        value if value == ENDIANNESS.swap_bytes() => true,
        _ => return Err("invalid endianness marker"),
    };

    let gl_type = reader.u32()?;
    let gl_type_size = reader.u32()?;
    let gl_format = reader.u32()?;
    let _gl_internal_format = reader.u32()?;
    let _gl_base_internal_format = reader.u32()?;
    let width = reader.u32()?;
    let height = reader.u32()?;
    let depth = reader.u32()?;
    let array_elements = reader.u32()?;
    let face_count = reader.u32()?;
    let mip_levels = reader.u32()?.max(1);
    let key_value_bytes = reader.u32()?;

    if gl_type != GL_UNSIGNED_BYTE || gl_type_size != 1 {
        return Err("only uncompressed 8-bit formats are supported");
    }
    let format = match gl_format {
        GL_RGB => PixelFormat::Rgb888,
        GL_RGBA => PixelFormat::Rgba8888,
        _ => return Err("unsupported pixel format"),
    };
    if face_count != 6 || depth != 0 || height == 0 {
        return Err("not a cube map");
    }
    if array_elements != 0 {
        return Err("cube map arrays are not supported");
    }
    if width != height {
        return Err("cube faces must be square");
    }
    if mip_levels > u32::BITS - width.leading_zeros() {
        return Err("more mip levels than the face size allows");
    }

    reader.take(key_value_bytes as usize)?;

    let bpp = format.bytes_per_pixel();
    let mut faces = vec![Vec::with_capacity(mip_levels as usize); 6];
    for level in 0..mip_levels {
        let size = (width >> level).max(1);
        let row = size as usize * bpp;
        let padded_row = align4(row);
        let image_size = reader.u32()? as usize;
        if image_size != padded_row * size as usize {
            return Err("image size does not match the header");
        }

        for face in faces.iter_mut() {
            let image = reader.take(image_size)?;
            let mut data = Vec::with_capacity(row * size as usize);
            for line in image.chunks_exact(padded_row) {
                data.extend_from_slice(&line[..row]);
            }
            face.push(PixelData::new(size, size, format, data));
            reader.align();
        }
        reader.align();
    }

    Ok(CubeData { faces })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// RGB cube whose every texel in face `f` has the value `f`.
    pub(crate) fn rgb_cube(size: u32, mip_levels: u32) -> Vec<u8> {
        let mut bytes = IDENTIFIER.to_vec();
        let key_value = b"abc\0";
        for word in [
            ENDIANNESS,
            GL_UNSIGNED_BYTE,
            1,
            GL_RGB,
            0x8051,
            GL_RGB,
            size,
            size,
            0,
            0,
            6,
            mip_levels,
            key_value.len() as u32,
        ] {
            bytes.extend_from_slice(&word.to_le_bytes());
        }
        bytes.extend_from_slice(key_value);

        for level in 0..mip_levels.max(1) {
            let size = (size >> level).max(1) as usize;
            let padded_row = align4(size * 3);
            bytes.extend_from_slice(&((padded_row * size) as u32).to_le_bytes());
            for face in 0..6u8 {
                for _ in 0..size {
                    let mut line = vec![face; size * 3];
                    line.resize(padded_row, 0xee);
                    bytes.extend_from_slice(&line);
                }
            }
        }
        bytes
    }

    #[test]
    fn faces_keep_order_and_mip_chain() {
        let cube = parse(&rgb_cube(2, 2)).unwrap();
        assert_eq!(cube.faces.len(), 6);
        for (index, face) in cube.faces.iter().enumerate() {
            assert_eq!(face.len(), 2);
            assert_eq!(face[0].data, vec![index as u8; 12]);
            assert_eq!((face[1].width, face[1].height), (1, 1));
            assert_eq!(face[1].data, vec![index as u8; 3]);
        }
    }

    #[test]
    fn swapped_endianness_is_read() {
        let mut bytes = rgb_cube(1, 1);
        // Byte-swap every header word and the image size.
        for start in (12..12 + 13 * 4).step_by(4).chain([12 + 13 * 4 + 4]) {
            bytes[start..start + 4].reverse();
        }
        let cube = parse(&bytes).unwrap();
        assert_eq!(cube.faces[2][0].data, vec![2, 2, 2]);
    }

    #[test]
    fn malformed_files_are_rejected() {
        assert_eq!(parse(b"not a texture").unwrap_err(), "not a KTX 1.1 file");

        let bytes = rgb_cube(2, 1);
        assert_eq!(parse(&bytes[..bytes.len() - 1]).unwrap_err(), "truncated file");

        let mut bytes = rgb_cube(2, 1);
        // Number of faces.
        bytes[12 + 10 * 4] = 1;
        assert_eq!(parse(&bytes).unwrap_err(), "not a cube map");
    }
}
