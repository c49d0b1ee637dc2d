use crate::{
    io::{Endian, Sink, Source},
    rpf7::{
        compression,
        format::{self, Encryption, Entry, Header},
        names::{self, NameHeap},
        tree::{EntryTree, Node, NodeId},
        Error, Result,
    },
};
use bstr::{BStr, BString, ByteSlice as _};
use std::{
    collections::{BTreeMap, BTreeSet, VecDeque},
    fs,
    io::{self, Write},
    path::Path,
};

/// Parameters for [`ArchiveWriter`].
///
/// ```rust
/// use rpf::rpf7::WriteOptions;
///
/// let _ = WriteOptions::builder()
///     .compression_exclusions([".rpf", ".bik", ".awc", ".dat"])
///     .build();
/// ```
#[derive(Clone, Debug)]
pub struct WriteOptions {
    compression_exclusions: Vec<BString>,
}

impl WriteOptions {
    #[must_use]
    pub fn builder() -> WriteOptionsBuilder {
        WriteOptionsBuilder::new()
    }

    #[must_use]
    fn is_compression_excluded(&self, extension: &BStr) -> bool {
        self.compression_exclusions
            .iter()
            .any(|excluded| excluded == extension)
    }
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            compression_exclusions: vec![".rpf".into(), ".bik".into(), ".awc".into()],
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct WriteOptionsBuilder(WriteOptions);

impl WriteOptionsBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn build(self) -> WriteOptions {
        self.0
    }

    /// Replaces the set of extensions whose payloads are stored verbatim.
    #[must_use]
    pub fn compression_exclusions<I, T>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<BString>,
    {
        self.0.compression_exclusions = extensions.into_iter().map(Into::into).collect();
        self
    }
}

/// An RPF7 archive opened for reading.
///
/// The directory tree and path index are built up front; payloads are read
/// on demand. Extraction takes `&mut self` because every read seeks the
/// archive's one file handle — open independent instances for concurrent
/// access.
pub struct Archive {
    stream: fs::File,
    entries: Vec<Entry>,
    tree: EntryTree,
    index: BTreeMap<BString, usize>,
}

impl Archive {
    pub fn open<P>(path: P) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::FileNotFound(path.to_path_buf()));
        }
        if !path.is_file() {
            return Err(Error::NotAFile(path.to_path_buf()));
        }

        let mut stream = fs::File::open(path)?;
        let header = Self::read_header(&mut stream)?;
        let names = Self::read_names(&mut stream, &header)?;
        let entries = Self::read_entries(&mut stream, &header)?;
        let (tree, index) = Self::build_tree_and_index(&entries, &names)?;
        Ok(Self {
            stream,
            entries,
            tree,
            index,
        })
    }

    /// Number of file entries reachable through the path index.
    #[must_use]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    #[must_use]
    pub fn contains_entry<K>(&self, entry_path: K) -> bool
    where
        K: AsRef<BStr>,
    {
        self.index.contains_key(entry_path.as_ref())
    }

    /// All indexed archive paths, in lexicographic order.
    pub fn entry_paths(&self) -> impl Iterator<Item = &BStr> {
        self.index.keys().map(|path| path.as_bstr())
    }

    /// Reads an entry's payload, inflating it when stored compressed.
    pub fn entry_data<K>(&mut self, entry_path: K) -> Result<Vec<u8>>
    where
        K: AsRef<BStr>,
    {
        let entry_path = entry_path.as_ref();
        let &entry_index = self
            .index
            .get(entry_path)
            .ok_or_else(|| Error::EntryNotFound(entry_path.into()))?;
        let entry = self.entries[entry_index];

        let mut source = Source::new(&mut self.stream);
        source.seek_absolute(u64::from(entry.entry_offset) * format::DATA_BLOCK_SIZE)?;
        let stored = source.read_vec(usize::try_from(entry.data_size())?)?;

        Ok(if entry.is_compressed() {
            compression::decompress(&stored)
        } else {
            stored
        })
    }

    /// Extracts an entry to the host filesystem, creating parent directories.
    pub fn save_entry_to_path<K, P>(&mut self, entry_path: K, output_path: P) -> Result<()>
    where
        K: AsRef<BStr>,
        P: AsRef<Path>,
    {
        let data = self.entry_data(entry_path)?;
        let output_path = output_path.as_ref();
        if let Some(parent) = output_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(output_path, data)?;
        Ok(())
    }

    /// Writes an indented rendition of the directory tree, one entry per line.
    pub fn write_entry_tree<W>(&self, out: &mut W) -> io::Result<()>
    where
        W: ?Sized + Write,
    {
        self.write_tree_level(out, EntryTree::ROOT, 0)
    }

    fn write_tree_level<W>(&self, out: &mut W, parent: NodeId, level: usize) -> io::Result<()>
    where
        W: ?Sized + Write,
    {
        for child in self.tree.children(parent) {
            let node = self.tree.node(child);
            let is_directory = match node.entry {
                Some(entry_index) => self.entries[entry_index].is_directory(),
                None => false,
            };
            writeln!(
                out,
                "{:indent$}{} | {}",
                "",
                node.name,
                if is_directory { "dir" } else { "file" },
                indent = level * 2
            )?;
            if node.first_child.is_some() {
                self.write_tree_level(out, child, level + 1)?;
            }
        }
        Ok(())
    }

    fn read_header(stream: &mut fs::File) -> Result<Header> {
        let mut source = Source::new(stream);
        source.seek_absolute(0)?;
        let (magic, entry_count, name_size, encryption): (u32, u32, u32, u32) =
            source.read(Endian::Little)?;
        if magic != format::MAGIC {
            return Err(Error::InvalidMagic(magic));
        }
        if encryption != Encryption::Open as u32 {
            return Err(Error::UnsupportedEncryption(encryption));
        }
        Ok(Header {
            entry_count,
            name_size,
        })
    }

    fn read_names(stream: &mut fs::File, header: &Header) -> Result<BTreeMap<u16, BString>> {
        let mut source = Source::new(stream);
        source.seek_absolute(Header::SIZE + Entry::SIZE * u64::from(header.entry_count))?;
        let heap = source.read_vec(header.name_len() as usize)?;
        names::decode(&heap, header.name_shift())
    }

    fn read_entries(stream: &mut fs::File, header: &Header) -> Result<Vec<Entry>> {
        let mut source = Source::new(stream);
        source.seek_absolute(Header::SIZE)?;
        let mut entries = Vec::with_capacity(header.entry_count as usize);
        for _ in 0..header.entry_count {
            entries.push(Entry::read(&mut source)?);
        }

        let Some(root) = entries.first().copied() else {
            return Err(Error::MalformedArchive("archive contains no entries"));
        };
        if !root.is_directory() {
            return Err(Error::MalformedArchive("root entry is not a directory"));
        }
        Ok(entries)
    }

    fn build_tree_and_index(
        entries: &[Entry],
        names: &BTreeMap<u16, BString>,
    ) -> Result<(EntryTree, BTreeMap<BString, usize>)> {
        let mut tree = EntryTree::new();
        tree.node_mut(EntryTree::ROOT).entry = Some(0);
        let mut index = BTreeMap::new();
        let mut path_stack = vec![Self::entry_name(&entries[0], names)?.clone()];
        Self::descend(
            entries,
            names,
            &mut tree,
            &mut index,
            0,
            EntryTree::ROOT,
            &mut path_stack,
        )?;
        Ok((tree, index))
    }

    fn descend(
        entries: &[Entry],
        names: &BTreeMap<u16, BString>,
        tree: &mut EntryTree,
        index: &mut BTreeMap<BString, usize>,
        parent_index: usize,
        parent_node: NodeId,
        path_stack: &mut Vec<BString>,
    ) -> Result<()> {
        let parent = entries[parent_index];
        for k in 0..parent.children_count() as usize {
            let child_index = parent.children_index() as usize + k;
            let Some(child) = entries.get(child_index) else {
                return Err(Error::MalformedArchive("directory child index is out of range"));
            };
            // also rules out cyclic directory records
            if child_index <= parent_index {
                return Err(Error::MalformedArchive(
                    "directory children must follow their parent",
                ));
            }
            let name = Self::entry_name(child, names)?;

            let mut full_path = BString::default();
            for part in path_stack.iter() {
                full_path.extend_from_slice(part.as_slice());
                full_path.push(b'/');
            }
            full_path.extend_from_slice(name.as_slice());

            let node = tree.add(parent_node, name.as_bstr());
            tree.node_mut(node).entry = Some(child_index);

            if name.contains(&b'.') {
                index.insert(full_path, child_index);
            }

            if child.is_directory() {
                path_stack.push(name.clone());
                Self::descend(entries, names, tree, index, child_index, node, path_stack)?;
                path_stack.pop();
            }
        }
        Ok(())
    }

    fn entry_name<'a>(entry: &Entry, names: &'a BTreeMap<u16, BString>) -> Result<&'a BString> {
        names
            .get(&entry.name_offset)
            .ok_or(Error::MalformedArchive("name offset points outside the name heap"))
    }
}

/// Builds a new RPF7 archive on the host filesystem.
///
/// Entries are registered with [`add_entry`](Self::add_entry) and nothing is
/// serialized until [`finish`](Self::finish) runs the write pipeline.
/// Dropping the writer without finishing leaves the output truncated.
pub struct ArchiveWriter {
    stream: fs::File,
    tree: EntryTree,
    entries: Vec<Entry>,
    options: WriteOptions,
}

impl ArchiveWriter {
    pub fn create<P>(path: P) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        Self::create_with(path, WriteOptions::default())
    }

    pub fn create_with<P>(path: P, options: WriteOptions) -> Result<Self>
    where
        P: AsRef<Path>,
    {
        let stream = fs::File::create(path)?;
        Ok(Self {
            stream,
            tree: EntryTree::new(),
            entries: Vec::new(),
            options,
        })
    }

    /// Registers a host file under the given archive path.
    ///
    /// Backslashes are normalized to slashes and a leading slash is ensured.
    /// Paths without a dot in their final component are silently ignored;
    /// the dot is the format's only file marker.
    pub fn add_entry<K, P>(&mut self, entry_path: K, source_path: P)
    where
        K: AsRef<BStr>,
        P: AsRef<Path>,
    {
        let normalized = normalize_entry_path(entry_path.as_ref());
        let has_extension = normalized
            .rsplit(|&byte| byte == b'/')
            .next()
            .is_some_and(|leaf| leaf.contains(&b'.'));
        if !has_extension {
            return;
        }
        self.tree.add_path(normalized.as_bstr(), source_path.as_ref());
    }

    /// Serializes the registered entries and closes the archive.
    ///
    /// Layout work happens in four phases: name offsets are assigned, the
    /// tree is flattened to the record table, header/records/names hit the
    /// disk, and finally payloads are emitted with the records rewritten to
    /// carry their back-patched offsets and sizes.
    pub fn finish(mut self) -> Result<()> {
        let heap = self.assign_names()?;
        self.flatten_tree(&heap)?;
        self.write_metadata(&heap)?;

        let metadata_len = Header::SIZE
            + Entry::SIZE * self.entries.len() as u64
            + heap.bytes.len() as u64;
        self.write_entry_data(format::data_block_size(metadata_len))?;
        self.rewrite_entries()?;
        self.stream.flush()?;
        Ok(())
    }

    fn assign_names(&self) -> Result<NameHeap> {
        let mut names = BTreeSet::new();
        let mut stack = vec![EntryTree::ROOT];
        while let Some(id) = stack.pop() {
            for child in self.tree.children(id) {
                names.insert(self.tree.node(child).name.clone());
                stack.push(child);
            }
        }
        names::encode(&names)
    }

    /// Flattens the tree breadth-first so every directory's children occupy
    /// one contiguous run of records.
    fn flatten_tree(&mut self, heap: &NameHeap) -> Result<()> {
        let mut entries = Vec::with_capacity(usize::try_from(self.tree.total_count())?);
        entries.push(Entry::directory());
        self.tree.node_mut(EntryTree::ROOT).entry = Some(0);

        let mut queue = VecDeque::from([(EntryTree::ROOT, 0usize)]);
        while let Some((parent, parent_entry)) = queue.pop_front() {
            let children = self.tree.sorted_children(parent);
            let first = u32::try_from(entries.len())?;
            entries[parent_entry].set_children(first, self.tree.node(parent).children_count);

            for child in children {
                let entry_index = entries.len();
                let (mut entry, has_children) = {
                    let node = self.tree.node(child);
                    let entry = if node.name.contains(&b'.') {
                        make_file_entry(node)?
                    } else {
                        Entry::directory()
                    };
                    (entry, node.first_child.is_some())
                };
                entry.name_offset = heap
                    .offsets
                    .get(&self.tree.node(child).name)
                    .copied()
                    .unwrap_or(0);
                entries.push(entry);
                self.tree.node_mut(child).entry = Some(entry_index);
                if has_children {
                    queue.push_back((child, entry_index));
                }
            }
        }

        self.entries = entries;
        Ok(())
    }

    fn write_metadata(&mut self, heap: &NameHeap) -> Result<()> {
        let entry_count = u32::try_from(self.entries.len())?;
        let mut sink = Sink::new(&mut self.stream);
        sink.seek_absolute(0)?;
        // the name descriptor is back-patched once the heap is on disk
        sink.write(
            &(format::MAGIC, entry_count, 0u32, Encryption::Open as u32),
            Endian::Little,
        )?;
        for entry in &self.entries {
            entry.write(&mut sink)?;
        }
        sink.write_bytes(&heap.bytes)?;
        sink.seek_absolute(Header::NAME_SIZE_OFFSET)?;
        sink.write(&heap.descriptor(), Endian::Little)?;
        Ok(())
    }

    fn write_entry_data(&mut self, data_start: u64) -> Result<()> {
        let mut payload_nodes = Vec::new();
        collect_payload_nodes(&self.tree, EntryTree::ROOT, &mut payload_nodes);

        let mut position = data_start;
        for id in payload_nodes {
            let node = self.tree.node(id);
            let Some(entry_index) = node.entry else { continue };
            let data = fs::read(&node.source_path)?;

            let compress_payload = !self.entries[entry_index].is_resource()
                && !self
                    .options
                    .is_compression_excluded(extension_of(node.name.as_bstr()));
            let payload = if compress_payload {
                compression::compress(&data)?
            } else {
                data
            };

            let entry = &mut self.entries[entry_index];
            if compress_payload || entry.is_resource() {
                entry.entry_size = checked_entry_size(payload.len())?;
            } else {
                // stored verbatim; zero means "length equals the real size"
                entry.entry_size = 0;
            }

            let block = position / format::DATA_BLOCK_SIZE;
            if block >= u64::from(format::DIRECTORY_OFFSET) {
                return Err(Error::ArchiveTooLarge(position));
            }
            entry.entry_offset = u32::try_from(block)?;

            let mut sink = Sink::new(&mut self.stream);
            sink.seek_absolute(position)?;
            sink.write_bytes(&payload)?;
            let padded = format::data_block_size(payload.len() as u64);
            sink.pad(padded - payload.len() as u64)?;
            position += padded;
        }
        Ok(())
    }

    fn rewrite_entries(&mut self) -> Result<()> {
        let mut sink = Sink::new(&mut self.stream);
        sink.seek_absolute(Header::SIZE)?;
        for entry in &self.entries {
            entry.write(&mut sink)?;
        }
        Ok(())
    }
}

/// Payload emission order: depth-first, each subtree flushed as its parent's
/// sibling run reaches it.
fn collect_payload_nodes(tree: &EntryTree, parent: NodeId, out: &mut Vec<NodeId>) {
    for child in tree.sorted_children(parent) {
        if tree.node(child).first_child.is_some() {
            collect_payload_nodes(tree, child, out);
        }
        if !tree.node(child).archive_path.is_empty() {
            out.push(child);
        }
    }
}

fn make_file_entry(node: &Node) -> Result<Entry> {
    // dotted names that were never registered as entries are directory
    // components; they serialize as empty file records regardless
    if node.archive_path.is_empty() {
        return Ok(Entry::file(0));
    }

    let path = node.source_path.as_path();
    if !path.exists() {
        return Err(Error::FileNotFound(path.to_path_buf()));
    }
    if !path.is_file() {
        return Err(Error::NotAFile(path.to_path_buf()));
    }

    let mut file = fs::File::open(path)?;
    let len = file.metadata()?.len();
    if len >= 16 {
        let mut source = Source::new(&mut file);
        let (magic, _flags, virtual_flags, physical_flags): (u32, u32, u32, u32) =
            source.read(Endian::Little)?;
        if magic == format::RESOURCE_MAGIC {
            return Ok(Entry::resource(virtual_flags, physical_flags));
        }
    }
    Ok(Entry::file(u32::try_from(len)?))
}

#[allow(clippy::cast_possible_truncation)]
fn checked_entry_size(len: usize) -> Result<u32> {
    let len = len as u64;
    if len > format::MAX_ENTRY_SIZE {
        return Err(Error::EntryTooLarge(len));
    }
    Ok(len as u32)
}

fn normalize_entry_path(path: &BStr) -> BString {
    let mut bytes: Vec<u8> = path
        .iter()
        .map(|&byte| if byte == b'\\' { b'/' } else { byte })
        .collect();
    if bytes.first() != Some(&b'/') {
        bytes.insert(0, b'/');
    }
    BString::from(bytes)
}

fn extension_of(name: &BStr) -> &BStr {
    match name.rfind_byte(b'.') {
        Some(at) => &name[at..],
        None => <&BStr>::default(),
    }
}
