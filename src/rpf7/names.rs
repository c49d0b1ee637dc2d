use crate::rpf7::{format, Error, Result};
use bstr::BString;
use std::collections::{BTreeMap, BTreeSet};

/// An encoded name heap: the padded bytes as they appear on disk, plus the
/// shifted offset every name was assigned.
pub(crate) struct NameHeap {
    pub(crate) shift: u32,
    pub(crate) offsets: BTreeMap<BString, u16>,
    pub(crate) bytes: Vec<u8>,
}

impl NameHeap {
    /// The header's packed name descriptor: 28-bit padded length, 4-bit shift.
    #[must_use]
    pub(crate) fn descriptor(&self) -> u32 {
        #[allow(clippy::cast_possible_truncation)]
        let len = self.bytes.len() as u32;
        len | (self.shift << 28)
    }
}

/// Decodes a raw name heap into shifted-offset → name.
///
/// Alignment padding between names is skipped by rounding each start
/// position up to the next `1 << shift` boundary. The zero bytes of the
/// outer 16-byte padding decode as empty names; they are inert because no
/// record points at them.
pub(crate) fn decode(heap: &[u8], shift: u32) -> Result<BTreeMap<u16, BString>> {
    let mask = (1usize << shift) - 1;
    let mut names = BTreeMap::new();
    let mut start = 0usize;
    let mut pos = 0usize;
    while pos < heap.len() {
        if heap[pos] != 0 {
            pos += 1;
            continue;
        }
        let offset = u16::try_from(start >> shift)
            .map_err(|_| Error::MalformedArchive("name heap exceeds the addressable range"))?;
        names.insert(offset, BString::from(&heap[start..pos]));
        start = (pos + 1 + mask) & !mask;
        pos = start;
    }
    Ok(names)
}

/// Encodes the given names at the smallest shift they fit under.
pub(crate) fn encode(names: &BTreeSet<BString>) -> Result<NameHeap> {
    for shift in 0..=format::MAX_NAME_SHIFT {
        if let Some(heap) = encode_with_shift(names, shift) {
            return Ok(heap);
        }
    }
    Err(Error::NameHeapOverflow)
}

/// Returns `None` when a name would land past the 16-bit shifted-offset cap.
fn encode_with_shift(names: &BTreeSet<BString>, shift: u32) -> Option<NameHeap> {
    let mask = (1usize << shift) - 1;
    let mut offsets = BTreeMap::new();
    let mut bytes = Vec::new();

    // the root's anonymous name always claims offset zero
    offsets.insert(BString::default(), 0u16);
    bytes.push(0u8);

    for name in names {
        if name.is_empty() {
            continue;
        }
        let aligned = (bytes.len() + mask) & !mask;
        let offset = u16::try_from(aligned >> shift).ok()?;
        bytes.resize(aligned, 0);
        offsets.insert(name.clone(), offset);
        bytes.extend_from_slice(name.as_slice());
        bytes.push(0u8);
    }

    let padded = format::name_block_size(bytes.len() as u64) as usize;
    bytes.resize(padded, 0);
    Some(NameHeap {
        shift,
        offsets,
        bytes,
    })
}

#[cfg(test)]
mod tests {
    use super::{decode, encode};
    use crate::rpf7::Error;
    use bstr::BString;
    use std::collections::BTreeSet;

    fn name_set<const N: usize>(names: [&str; N]) -> BTreeSet<BString> {
        names.into_iter().map(BString::from).collect()
    }

    #[test]
    fn empty_set_is_a_single_padded_block() -> anyhow::Result<()> {
        let heap = encode(&BTreeSet::new())?;
        assert_eq!(heap.shift, 0);
        assert_eq!(heap.bytes, [0u8; 16]);
        assert_eq!(heap.descriptor(), 16);
        assert_eq!(heap.offsets[&BString::default()], 0);
        Ok(())
    }

    #[test]
    fn round_trip_at_shift_zero() -> anyhow::Result<()> {
        let names = name_set(["common", "data", "levels.meta"]);
        let heap = encode(&names)?;
        assert_eq!(heap.shift, 0);
        assert_eq!(heap.bytes.len() % 16, 0);

        let decoded = decode(&heap.bytes, heap.shift)?;
        for (name, offset) in &heap.offsets {
            assert_eq!(decoded.get(offset), Some(name));
        }
        Ok(())
    }

    #[test]
    fn offsets_are_lexicographic_and_stable() -> anyhow::Result<()> {
        let heap = encode(&name_set(["b", "a", "c"]))?;
        // "" at 0, then "a" at 1, "b" at 3, "c" at 5
        let offsets: Vec<(BString, u16)> = heap.offsets.clone().into_iter().collect();
        assert_eq!(
            offsets,
            [
                (BString::from(""), 0),
                (BString::from("a"), 1),
                (BString::from("b"), 3),
                (BString::from("c"), 5),
            ]
        );

        let again = encode(&name_set(["c", "b", "a"]))?;
        assert_eq!(again.bytes, heap.bytes);
        Ok(())
    }

    #[test]
    fn shifted_starts_are_aligned() -> anyhow::Result<()> {
        let names = name_set(["aa", "bbbb", "c"]);
        for shift in 1..=3u32 {
            let heap = super::encode_with_shift(&names, shift).expect("names fit at any shift");
            for (name, &offset) in &heap.offsets {
                let at = (usize::from(offset)) << shift;
                let end = at + name.len();
                assert_eq!(&heap.bytes[at..end], name.as_slice());
                assert_eq!(heap.bytes[end], 0);
            }
            let decoded = decode(&heap.bytes, shift)?;
            for (name, offset) in &heap.offsets {
                assert_eq!(decoded.get(offset), Some(name));
            }
        }
        Ok(())
    }

    #[test]
    fn grows_the_shift_until_names_fit() -> anyhow::Result<()> {
        // 5000 names of ~40 bytes only fit once offsets are scaled by 4
        let names: BTreeSet<BString> = (0..5000)
            .map(|i| BString::from(format!("entry_with_a_long_descriptive_name_{i:05}")))
            .collect();
        let heap = encode(&names)?;
        assert_eq!(heap.shift, 2);
        assert_eq!(heap.bytes.len() % 16, 0);
        assert_eq!(heap.descriptor() >> 28, 2);

        let decoded = decode(&heap.bytes, heap.shift)?;
        for (name, offset) in &heap.offsets {
            assert_eq!(decoded.get(offset), Some(name));
        }
        Ok(())
    }

    #[test]
    fn overflow_even_at_the_largest_shift() {
        let names: BTreeSet<BString> = (0..5000)
            .map(|i| BString::from(format!("{:>120}", i)))
            .collect();
        let result = encode(&names);
        assert!(matches!(result, Err(Error::NameHeapOverflow)));
    }
}
