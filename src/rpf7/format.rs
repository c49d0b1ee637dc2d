use crate::{
    cc,
    io::{Endian, Sink, Source},
};
use std::io::{self, Read, Seek, Write};

pub(crate) const MAGIC: u32 = cc::make_four(b"RPF7");
pub(crate) const RESOURCE_MAGIC: u32 = cc::make_four(b"RSC7");

/// `entryOffset` value that marks a directory record.
pub(crate) const DIRECTORY_OFFSET: u32 = 0x007F_FFFF;
/// Payload data is addressed in blocks of this many bytes.
pub(crate) const DATA_BLOCK_SIZE: u64 = 0x200;
/// The name heap is padded out to a multiple of this many bytes.
pub(crate) const NAME_BLOCK_SIZE: u64 = 0x10;
/// Largest value the 24-bit `entrySize` field can carry.
pub(crate) const MAX_ENTRY_SIZE: u64 = 0x00FF_FFFF;
/// Largest name-heap alignment exponent the 4-bit descriptor field allows.
pub(crate) const MAX_NAME_SHIFT: u32 = 3;

#[must_use]
pub(crate) const fn name_block_size(len: u64) -> u64 {
    (len + NAME_BLOCK_SIZE - 1) / NAME_BLOCK_SIZE * NAME_BLOCK_SIZE
}

#[must_use]
pub(crate) const fn data_block_size(len: u64) -> u64 {
    (len + DATA_BLOCK_SIZE - 1) / DATA_BLOCK_SIZE * DATA_BLOCK_SIZE
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[repr(u32)]
pub enum Encryption {
    None = 0,
    /// No encryption ("OPEN").
    Open = 0x4E45_504F,
    /// AES encryption.
    Aes = 0x0FFF_FFF9,
    /// Whitebox AES encryption.
    Ng = 0x0FEF_FFFF,
}

#[derive(Clone, Copy, Debug)]
pub(crate) struct Header {
    pub(crate) entry_count: u32,
    pub(crate) name_size: u32,
}

impl Header {
    pub(crate) const SIZE: u64 = 0x10;
    /// Byte offset of the `name_size` field within the header.
    pub(crate) const NAME_SIZE_OFFSET: u64 = 0x8;

    #[must_use]
    pub(crate) fn name_shift(&self) -> u32 {
        (self.name_size >> 28) & 0x3
    }

    #[must_use]
    pub(crate) fn name_len(&self) -> u32 {
        self.name_size & 0x0FFF_FFFF
    }
}

/// One 16-byte directory record.
///
/// The low 8 bytes are a little-endian bit-packed word; the high 8 bytes are
/// a pair of words whose meaning follows the record's classification:
/// children index/count for directories, virtual/physical flags for
/// resources, real size/encrypted for plain files.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub(crate) struct Entry {
    pub(crate) name_offset: u16,
    pub(crate) entry_size: u32,
    pub(crate) entry_offset: u32,
    pub(crate) resource: bool,
    pub(crate) meta: [u32; 2],
}

impl Entry {
    pub(crate) const SIZE: u64 = 0x10;

    #[must_use]
    pub(crate) fn directory() -> Self {
        Self {
            entry_offset: DIRECTORY_OFFSET,
            ..Self::default()
        }
    }

    #[must_use]
    pub(crate) fn file(real_size: u32) -> Self {
        Self {
            meta: [real_size, 0],
            ..Self::default()
        }
    }

    #[must_use]
    pub(crate) fn resource(virtual_flags: u32, physical_flags: u32) -> Self {
        Self {
            resource: true,
            meta: [virtual_flags, physical_flags],
            ..Self::default()
        }
    }

    #[must_use]
    pub(crate) fn is_directory(&self) -> bool {
        self.entry_offset == DIRECTORY_OFFSET
    }

    #[must_use]
    pub(crate) fn is_resource(&self) -> bool {
        self.resource
    }

    #[must_use]
    pub(crate) fn is_file(&self) -> bool {
        !self.is_directory() && !self.is_resource()
    }

    #[must_use]
    pub(crate) fn is_compressed(&self) -> bool {
        self.is_file() && self.entry_size != 0 && self.entry_size != self.real_size()
    }

    /// On-disk payload length, falling back to the real size for entries
    /// stored verbatim.
    #[must_use]
    pub(crate) fn data_size(&self) -> u64 {
        if self.entry_size == 0 {
            u64::from(self.real_size())
        } else {
            u64::from(self.entry_size)
        }
    }

    #[must_use]
    pub(crate) fn children_index(&self) -> u32 {
        self.meta[0]
    }

    #[must_use]
    pub(crate) fn children_count(&self) -> u32 {
        self.meta[1]
    }

    pub(crate) fn set_children(&mut self, index: u32, count: u32) {
        self.meta = [index, count];
    }

    #[must_use]
    pub(crate) fn real_size(&self) -> u32 {
        self.meta[0]
    }

    #[must_use]
    pub(crate) fn virtual_flags(&self) -> u32 {
        self.meta[0]
    }

    #[must_use]
    pub(crate) fn physical_flags(&self) -> u32 {
        self.meta[1]
    }

    #[allow(clippy::cast_possible_truncation)]
    #[must_use]
    fn from_wire(low: u64, meta: [u32; 2]) -> Self {
        Self {
            name_offset: (low & 0xFFFF) as u16,
            entry_size: ((low >> 16) & 0x00FF_FFFF) as u32,
            entry_offset: ((low >> 40) & 0x007F_FFFF) as u32,
            resource: (low >> 63) != 0,
            meta,
        }
    }

    #[must_use]
    fn to_wire(self) -> (u64, [u32; 2]) {
        let low = u64::from(self.name_offset)
            | (u64::from(self.entry_size & 0x00FF_FFFF) << 16)
            | (u64::from(self.entry_offset & 0x007F_FFFF) << 40)
            | (u64::from(self.resource) << 63);
        (low, self.meta)
    }

    pub(crate) fn read<R>(source: &mut Source<'_, R>) -> io::Result<Self>
    where
        R: Read + Seek,
    {
        let (low, meta0, meta1): (u64, u32, u32) = source.read(Endian::Little)?;
        Ok(Self::from_wire(low, [meta0, meta1]))
    }

    pub(crate) fn write<W>(&self, sink: &mut Sink<'_, W>) -> io::Result<()>
    where
        W: Write + Seek,
    {
        let (low, meta) = self.to_wire();
        sink.write(&(low, meta[0], meta[1]), Endian::Little)
    }
}

#[cfg(test)]
mod tests {
    use super::{data_block_size, name_block_size, Entry, DIRECTORY_OFFSET};
    use crate::io::{Sink, Source};
    use std::io::Cursor;

    #[test]
    fn block_sizes() {
        assert_eq!(name_block_size(0), 0);
        assert_eq!(name_block_size(1), 16);
        assert_eq!(name_block_size(16), 16);
        assert_eq!(name_block_size(17), 32);
        assert_eq!(data_block_size(0), 0);
        assert_eq!(data_block_size(1), 512);
        assert_eq!(data_block_size(512), 512);
        assert_eq!(data_block_size(513), 1024);
    }

    #[test]
    fn classification() {
        let directory = Entry::directory();
        assert!(directory.is_directory());
        assert!(!directory.is_resource());
        assert!(!directory.is_file());
        assert_eq!(directory.entry_size, 0);

        let resource = Entry::resource(0x9070_0000, 0x9040_0000);
        assert!(resource.is_resource());
        assert!(!resource.is_directory());
        assert!(!resource.is_file());
        assert_eq!(resource.virtual_flags(), 0x9070_0000);
        assert_eq!(resource.physical_flags(), 0x9040_0000);

        let file = Entry::file(1024);
        assert!(file.is_file());
        assert_eq!(file.real_size(), 1024);
        assert!(!file.is_compressed());
        assert_eq!(file.data_size(), 1024);
    }

    #[test]
    fn compression_classification() {
        let mut file = Entry::file(1024);
        file.entry_size = 300;
        assert!(file.is_compressed());
        assert_eq!(file.data_size(), 300);

        // stored form matching the real size means "not compressed"
        file.entry_size = 1024;
        assert!(!file.is_compressed());
    }

    #[test]
    fn wire_layout() {
        let mut entry = Entry::file(77);
        entry.name_offset = 0xABCD;
        entry.entry_size = 0x0012_3456;
        entry.entry_offset = 0x0065_4321;
        let (low, meta) = entry.to_wire();
        assert_eq!(low & 0xFFFF, 0xABCD);
        assert_eq!((low >> 16) & 0x00FF_FFFF, 0x0012_3456);
        assert_eq!((low >> 40) & 0x007F_FFFF, 0x0065_4321);
        assert_eq!(low >> 63, 0);
        assert_eq!(meta, [77, 0]);

        let resource = Entry::resource(1, 2);
        let (low, _) = resource.to_wire();
        assert_eq!(low >> 63, 1);

        let directory = Entry::directory();
        let (low, _) = directory.to_wire();
        assert_eq!((low >> 40) & 0x007F_FFFF, u64::from(DIRECTORY_OFFSET));
    }

    #[test]
    fn wire_round_trip() -> anyhow::Result<()> {
        let mut entry = Entry::resource(0xDEAD_BEEF, 0xCAFE_F00D);
        entry.name_offset = 0xFFFF;
        entry.entry_size = 0x00FF_FFFF;
        entry.entry_offset = 0x007F_FFFE;

        let mut stream = Cursor::new(Vec::new());
        entry.write(&mut Sink::new(&mut stream))?;
        assert_eq!(stream.get_ref().len() as u64, Entry::SIZE);

        stream.set_position(0);
        let read_back = Entry::read(&mut Source::new(&mut stream))?;
        assert_eq!(read_back, entry);
        Ok(())
    }
}
