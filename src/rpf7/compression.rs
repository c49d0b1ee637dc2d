use crate::rpf7::Result;
use flate2::{write::DeflateEncoder, Compression, Decompress, FlushDecompress, Status};
use std::io::Write;

/// Inflate output is drained in chunks of this many bytes.
const CHUNK_SIZE: usize = 128;

/// Compresses a whole payload as a raw DEFLATE stream (no zlib wrapper).
pub(crate) fn compress(data: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = DeflateEncoder::new(Vec::with_capacity(data.len()), Compression::best());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

/// Inflates a whole raw-DEFLATE payload.
///
/// Any status other than a clean continuation ends the stream, including
/// genuine corruption: the bytes produced so far are returned rather than an
/// error. Corrupt payloads therefore come back truncated.
pub(crate) fn decompress(data: &[u8]) -> Vec<u8> {
    let mut inflater = Decompress::new(false);
    let mut out = Vec::new();
    let mut chunk = [0u8; CHUNK_SIZE];
    loop {
        let consumed_before = inflater.total_in();
        let produced_before = inflater.total_out();
        #[allow(clippy::cast_possible_truncation)]
        let status = inflater.decompress(
            &data[consumed_before as usize..],
            &mut chunk,
            FlushDecompress::None,
        );
        #[allow(clippy::cast_possible_truncation)]
        let produced = (inflater.total_out() - produced_before) as usize;
        out.extend_from_slice(&chunk[..produced]);

        match status {
            // continue only while the stream is moving forward
            Ok(Status::Ok) if inflater.total_in() > consumed_before || produced > 0 => {}
            _ => break,
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::{compress, decompress};

    #[test]
    fn round_trip() -> anyhow::Result<()> {
        let payload = b"the quick brown fox jumps over the lazy dog";
        let stored = compress(payload)?;
        assert_ne!(stored.as_slice(), payload.as_slice());
        assert_eq!(decompress(&stored), payload);
        Ok(())
    }

    #[test]
    fn streams_are_headerless() -> anyhow::Result<()> {
        // a zlib wrapper would always begin with 0x78
        let stored = compress(b"hello")?;
        assert_ne!(stored[0], 0x78);

        let mut zlib = flate2::Decompress::new(true);
        let mut sink = [0u8; 64];
        let result = zlib.decompress(&stored, &mut sink, flate2::FlushDecompress::Finish);
        assert!(result.is_err());
        Ok(())
    }

    #[test]
    fn empty_payload() -> anyhow::Result<()> {
        let stored = compress(b"")?;
        assert!(!stored.is_empty());
        assert_eq!(decompress(&stored), b"");
        Ok(())
    }

    #[test]
    fn output_longer_than_one_chunk() -> anyhow::Result<()> {
        let payload: Vec<u8> = (0..10_000u32).map(|i| (i % 251) as u8).collect();
        let stored = compress(&payload)?;
        assert_eq!(decompress(&stored), payload);
        Ok(())
    }

    #[test]
    fn corrupt_input_yields_a_truncated_buffer() -> anyhow::Result<()> {
        let payload = b"some compressible payload some compressible payload";
        let stored = compress(payload)?;

        // cutting the stream short loses the tail, not the whole payload
        let truncated = decompress(&stored[..stored.len() - 4]);
        assert!(truncated.len() < payload.len());
        assert_eq!(&payload[..truncated.len()], truncated.as_slice());

        // garbage neither panics nor errors
        let _ = decompress(b"\x12\x34\x56 not a deflate stream");
        Ok(())
    }
}
