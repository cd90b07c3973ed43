//! Shared object table for buffers and textures
//!
//! Handles are 1-based and monotonic: a slot freed by deletion is never
//! handed out again, so a stale handle reliably fails instead of silently
//! aliasing a newer object. Handle 0 names the default texture for texture
//! targets and "no buffer" for buffer targets.

use pyrite_core::{GlError, Result};
use pyrite_hw::AddressSpace;

use crate::types::{BaseFormat, TextureFilter, TextureWrap};

pub type Handle = u32;

/// Buffer object storage. GPU address is assigned on first data upload.
#[derive(Debug, Clone, Default)]
pub struct BufferObject {
    pub data: Vec<u8>,
    pub gpu_addr: u32,
}

impl BufferObject {
    /// (Re)allocate the store; an upload of `None` leaves it zero-filled.
    pub fn set_data(
        &mut self,
        space: &mut AddressSpace,
        size: usize,
        data: Option<&[u8]>,
    ) -> Result<()> {
        if let Some(bytes) = data {
            if bytes.len() != size {
                return Err(GlError::UploadOutOfBounds {
                    offset: 0,
                    len: bytes.len(),
                    size,
                });
            }
        }
        self.gpu_addr = space.alloc(size, 64)?;
        self.data = match data {
            Some(bytes) => bytes.to_vec(),
            None => vec![0; size],
        };
        Ok(())
    }

    /// Overwrite a sub-range of an existing store.
    pub fn sub_data(&mut self, offset: usize, bytes: &[u8]) -> Result<()> {
        let end = offset
            .checked_add(bytes.len())
            .ok_or(GlError::UploadOutOfBounds {
                offset,
                len: bytes.len(),
                size: self.data.len(),
            })?;
        if end > self.data.len() {
            return Err(GlError::UploadOutOfBounds {
                offset,
                len: bytes.len(),
                size: self.data.len(),
            });
        }
        self.data[offset..end].copy_from_slice(bytes);
        Ok(())
    }

    pub fn is_allocated(&self) -> bool {
        self.gpu_addr != 0
    }
}

/// Texture object storage plus its sampler parameters.
#[derive(Debug, Clone)]
pub struct TextureObject {
    pub width: u32,
    pub height: u32,
    pub width_shift: u32,
    pub height_shift: u32,
    pub pitch: usize,
    pub format: BaseFormat,
    pub data: Vec<u8>,
    pub gpu_addr: u32,
    pub mip_levels: u32,
    pub min_filter: TextureFilter,
    pub mag_filter: TextureFilter,
    pub wrap_s: TextureWrap,
    pub wrap_t: TextureWrap,
}

impl Default for TextureObject {
    fn default() -> Self {
        Self {
            width: 0,
            height: 0,
            width_shift: 0,
            height_shift: 0,
            pitch: 0,
            format: BaseFormat::Luminance,
            data: Vec::new(),
            gpu_addr: 0,
            mip_levels: 0,
            min_filter: TextureFilter::NearestMipmapLinear,
            mag_filter: TextureFilter::Linear,
            wrap_s: TextureWrap::Repeat,
            wrap_t: TextureWrap::Repeat,
        }
    }
}

impl TextureObject {
    /// A unit bound to an incomplete texture is skipped at draw time.
    pub fn is_complete(&self) -> bool {
        self.width != 0 && self.height != 0 && self.pitch != 0 && !self.data.is_empty()
    }
}

#[derive(Debug)]
enum Slot {
    Buffer(BufferObject),
    Texture(TextureObject),
    Freed,
}

/// Table of all generated objects, both kinds sharing one handle space.
#[derive(Debug)]
pub struct ObjectTable {
    slots: Vec<Slot>,
    default_texture: TextureObject,
}

impl ObjectTable {
    pub fn new() -> Self {
        Self { slots: Vec::new(), default_texture: TextureObject::default() }
    }

    pub fn gen_buffers(&mut self, n: usize) -> Vec<Handle> {
        (0..n)
            .map(|_| {
                self.slots.push(Slot::Buffer(BufferObject::default()));
                self.slots.len() as Handle
            })
            .collect()
    }

    pub fn gen_textures(&mut self, n: usize) -> Vec<Handle> {
        (0..n)
            .map(|_| {
                self.slots.push(Slot::Texture(TextureObject::default()));
                self.slots.len() as Handle
            })
            .collect()
    }

    /// Free the named buffers. Handle 0 entries are ignored; storage is
    /// dropped immediately and the handles are retired for good.
    pub fn delete_buffers(&mut self, handles: &[Handle]) -> Result<()> {
        for &h in handles {
            if h == 0 {
                continue;
            }
            self.buffer(h)?;
            self.slots[(h - 1) as usize] = Slot::Freed;
        }
        Ok(())
    }

    pub fn delete_textures(&mut self, handles: &[Handle]) -> Result<()> {
        for &h in handles {
            if h == 0 {
                continue;
            }
            self.texture(h)?;
            self.slots[(h - 1) as usize] = Slot::Freed;
        }
        Ok(())
    }

    fn slot(&self, h: Handle) -> Result<&Slot> {
        self.slots
            .get(h.wrapping_sub(1) as usize)
            .filter(|s| !matches!(s, Slot::Freed))
            .ok_or(GlError::InvalidHandle(h))
    }

    pub fn buffer(&self, h: Handle) -> Result<&BufferObject> {
        match self.slot(h)? {
            Slot::Buffer(b) => Ok(b),
            _ => Err(GlError::WrongObjectKind(h, "buffer")),
        }
    }

    pub fn buffer_mut(&mut self, h: Handle) -> Result<&mut BufferObject> {
        self.slot(h)?;
        match &mut self.slots[(h - 1) as usize] {
            Slot::Buffer(b) => Ok(b),
            _ => Err(GlError::WrongObjectKind(h, "buffer")),
        }
    }

    /// Texture lookup; handle 0 resolves to the default texture.
    pub fn texture(&self, h: Handle) -> Result<&TextureObject> {
        if h == 0 {
            return Ok(&self.default_texture);
        }
        match self.slot(h)? {
            Slot::Texture(t) => Ok(t),
            _ => Err(GlError::WrongObjectKind(h, "texture")),
        }
    }

    pub fn texture_mut(&mut self, h: Handle) -> Result<&mut TextureObject> {
        if h == 0 {
            return Ok(&mut self.default_texture);
        }
        self.slot(h)?;
        match &mut self.slots[(h - 1) as usize] {
            Slot::Texture(t) => Ok(t),
            _ => Err(GlError::WrongObjectKind(h, "texture")),
        }
    }
}

impl Default for ObjectTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handles_are_one_based_and_monotonic() {
        let mut table = ObjectTable::new();
        assert_eq!(table.gen_buffers(2), vec![1, 2]);
        assert_eq!(table.gen_textures(1), vec![3]);
        table.delete_buffers(&[1]).unwrap();
        // the freed slot is never reissued
        assert_eq!(table.gen_buffers(1), vec![4]);
        assert_eq!(table.buffer(1).unwrap_err(), GlError::InvalidHandle(1));
    }

    #[test]
    fn test_kind_mismatch() {
        let mut table = ObjectTable::new();
        let b = table.gen_buffers(1)[0];
        assert_eq!(table.texture(b).unwrap_err(), GlError::WrongObjectKind(b, "texture"));
    }

    #[test]
    fn test_delete_ignores_zero() {
        let mut table = ObjectTable::new();
        table.delete_textures(&[0]).unwrap();
        assert_eq!(table.delete_textures(&[9]), Err(GlError::InvalidHandle(9)));
    }

    #[test]
    fn test_default_texture_is_handle_zero() {
        let mut table = ObjectTable::new();
        assert!(!table.texture(0).unwrap().is_complete());
        table.texture_mut(0).unwrap().width = 4;
    }

    #[test]
    fn test_buffer_sub_data_bounds() {
        let mut buffer = BufferObject::default();
        let mut space = AddressSpace::new();
        buffer.set_data(&mut space, 8, None).unwrap();
        buffer.sub_data(4, &[1, 2, 3, 4]).unwrap();
        assert_eq!(buffer.data[4..], [1, 2, 3, 4]);
        assert!(matches!(
            buffer.sub_data(6, &[0; 4]),
            Err(GlError::UploadOutOfBounds { .. })
        ));
    }
}
