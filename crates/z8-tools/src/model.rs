use anyhow::Result;
use std::path::Path;

use z8_codec::MemoryView;

#[derive(Debug, Clone)]
pub struct Segment {
    pub name: String,
    pub base: u16,
    pub bytes: Vec<u8>,
}

impl Segment {
    /// One past the last address, as u32 so a segment may end at %FFFF.
    pub fn end(&self) -> u32 {
        self.base as u32 + self.bytes.len() as u32
    }
}

#[derive(Debug, Clone)]
pub struct Image {
    pub segments: Vec<Segment>,
}

pub fn load_raw_bin(path: &Path, base: u16, skip: usize, len: Option<usize>) -> Result<Image> {
    let file = std::fs::read(path)?;
    anyhow::ensure!(skip <= file.len(), "--skip exceeds file size");
    let mut payload = &file[skip..];
    if let Some(lim) = len {
        anyhow::ensure!(lim <= payload.len(), "--len exceeds remaining file size after skip");
        payload = &payload[..lim];
    }
    anyhow::ensure!(
        base as usize + payload.len() <= 0x10000,
        "image does not fit into the 64 KiB address space at %{base:04X}"
    );
    let seg = Segment { name: "segment0".into(), base, bytes: payload.to_vec() };
    Ok(Image { segments: vec![seg] })
}

impl Image {
    /// Address range covered by the first segment, end inclusive.
    pub fn span(&self) -> Option<(u16, u16)> {
        let s = self.segments.first()?;
        let last = s.end().checked_sub(1)?;
        (last >= s.base as u32).then_some((s.base, last as u16))
    }
}

impl MemoryView for Image {
    fn read_u8(&self, addr: u16) -> Option<u8> {
        self.segments.iter().find_map(|s| {
            let off = addr.checked_sub(s.base)? as usize;
            s.bytes.get(off).copied()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loader_maps_skip_and_len() {
        let path = std::env::temp_dir().join("_z8_tools_test.bin");
        std::fs::write(&path, [0u8, 1, 2, 3, 4, 5]).unwrap();
        let img = load_raw_bin(&path, 0x8000, 2, Some(3)).unwrap();
        assert_eq!(img.segments.len(), 1);
        let s = &img.segments[0];
        assert_eq!(s.base, 0x8000);
        assert_eq!(s.bytes, vec![2, 3, 4]);
        assert_eq!(img.read_u16(0x8000), Some(0x0203));
        assert_eq!(img.read_u8(0x8003), None);
        assert_eq!(img.span(), Some((0x8000, 0x8002)));
        assert!(load_raw_bin(&path, 0xFFFF, 0, None).is_err());
        let _ = std::fs::remove_file(&path);
    }
}
