//! Postings format with block-based compression
//!
//! A posting list is a vbyte block count followed by blocks of up to
//! [`BLOCK_SIZE`] postings:
//! - vbyte posting count
//! - doc id deltas, bitpacked
//! - term frequencies, bitpacked (fields recording frequencies)
//! - per posting, `tf` vbyte position deltas (fields recording positions)

use std::io;

use super::types::{DocId, Posting, PostingListMeta};
use crate::schema::IndexRecordOption;

/// Postings per block
pub const BLOCK_SIZE: usize = 128;

/// Variable-byte encoding for integers
pub fn encode_vbyte(value: u32, output: &mut Vec<u8>) {
    let mut v = value;
    loop {
        let byte = (v & 0x7F) as u8;
        v >>= 7;
        if v == 0 {
            output.push(byte | 0x80); // high bit marks the last byte
            break;
        } else {
            output.push(byte);
        }
    }
}

/// Decode a variable-byte encoded integer
pub fn decode_vbyte(input: &[u8], pos: &mut usize) -> io::Result<u32> {
    let mut result: u32 = 0;
    let mut shift = 0;

    loop {
        if *pos >= input.len() {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "Unexpected end of vbyte",
            ));
        }

        let byte = input[*pos];
        *pos += 1;

        result |= ((byte & 0x7F) as u32) << shift;

        if byte & 0x80 != 0 {
            return Ok(result);
        }

        shift += 7;
        if shift > 28 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "VByte value too large",
            ));
        }
    }
}

/// Bitpack a block of integers with the minimum width for its max value
pub fn bitpack_encode(values: &[u32], output: &mut Vec<u8>) {
    let max_val = values.iter().copied().max().unwrap_or(0);
    let bits_needed = (32 - max_val.leading_zeros()) as u8;
    output.push(bits_needed);
    if bits_needed == 0 {
        return;
    }

    let mut current: u64 = 0;
    let mut bits_in_current = 0u32;

    for &value in values {
        current |= (value as u64) << bits_in_current;
        bits_in_current += bits_needed as u32;

        while bits_in_current >= 8 {
            output.push(current as u8);
            current >>= 8;
            bits_in_current -= 8;
        }
    }

    if bits_in_current > 0 {
        output.push(current as u8);
    }
}

/// Decode `count` bitpacked integers
pub fn bitpack_decode(input: &[u8], pos: &mut usize, count: usize) -> io::Result<Vec<u32>> {
    if *pos >= input.len() {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "Unexpected end of bitpack",
        ));
    }

    let bits_needed = input[*pos] as u32;
    *pos += 1;

    if bits_needed == 0 {
        return Ok(vec![0; count]);
    }
    if bits_needed > 32 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "Bitpack width too large",
        ));
    }

    let total_bits = count as u64 * bits_needed as u64;
    let bytes_needed = total_bits.div_ceil(8) as usize;

    if *pos + bytes_needed > input.len() {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "Not enough bytes for bitpack",
        ));
    }

    let mut values = Vec::with_capacity(count);
    let mut current: u64 = 0;
    let mut bits_available = 0;
    let mask = (1u64 << bits_needed) - 1;

    for _ in 0..count {
        while bits_available < bits_needed {
            current |= (input[*pos] as u64) << bits_available;
            *pos += 1;
            bits_available += 8;
        }

        values.push((current & mask) as u32);
        current >>= bits_needed;
        bits_available -= bits_needed;
    }

    Ok(values)
}

/// Writer for the postings file of one segment
#[derive(Default)]
pub struct PostingsWriter {
    data: Vec<u8>,
}

impl PostingsWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a posting list (sorted by doc id) and return its metadata
    pub fn write_posting_list(
        &mut self,
        postings: &[Posting],
        record: IndexRecordOption,
    ) -> PostingListMeta {
        let offset = self.data.len() as u64;
        let blocks: Vec<&[Posting]> = postings.chunks(BLOCK_SIZE).collect();
        encode_vbyte(blocks.len() as u32, &mut self.data);

        let mut prev_doc = 0u32;
        let mut total_term_frequency = 0u64;
        for block in blocks {
            encode_vbyte(block.len() as u32, &mut self.data);

            let mut deltas = Vec::with_capacity(block.len());
            for posting in block {
                deltas.push(posting.doc - prev_doc);
                prev_doc = posting.doc;
            }
            bitpack_encode(&deltas, &mut self.data);

            if record.has_freqs() {
                let tfs: Vec<u32> = block.iter().map(|p| p.term_frequency).collect();
                bitpack_encode(&tfs, &mut self.data);
            }

            if record.has_positions() {
                for posting in block {
                    let mut prev_pos = 0u32;
                    for &pos in &posting.positions {
                        encode_vbyte(pos - prev_pos, &mut self.data);
                        prev_pos = pos;
                    }
                }
            }

            total_term_frequency += block
                .iter()
                .map(|p| p.term_frequency as u64)
                .sum::<u64>();
        }

        PostingListMeta {
            offset,
            length: self.data.len() as u64 - offset,
            doc_frequency: postings.len() as u32,
            total_term_frequency,
        }
    }

    pub fn into_data(self) -> Vec<u8> {
        self.data
    }
}

/// Reader over the postings file of one segment
pub struct PostingsReader {
    data: Vec<u8>,
}

impl PostingsReader {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    /// Decode a whole posting list
    pub fn read_postings(
        &self,
        meta: &PostingListMeta,
        record: IndexRecordOption,
    ) -> io::Result<Vec<Posting>> {
        let start = meta.offset as usize;
        let end = (meta.offset + meta.length) as usize;
        if end > self.data.len() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "Posting list extends beyond data",
            ));
        }
        let data = &self.data[start..end];
        let mut pos = 0;

        let block_count = decode_vbyte(data, &mut pos)? as usize;
        let mut postings = Vec::with_capacity(meta.doc_frequency as usize);
        let mut doc: DocId = 0;

        for _ in 0..block_count {
            let count = decode_vbyte(data, &mut pos)? as usize;
            let deltas = bitpack_decode(data, &mut pos, count)?;
            let tfs = if record.has_freqs() {
                bitpack_decode(data, &mut pos, count)?
            } else {
                vec![1; count]
            };

            for (delta, tf) in deltas.into_iter().zip(tfs) {
                doc += delta;
                let mut posting = Posting::new(doc, tf);
                if record.has_positions() {
                    let mut position = 0u32;
                    posting.positions.reserve(tf as usize);
                    for _ in 0..tf {
                        position += decode_vbyte(data, &mut pos)?;
                        posting.positions.push(position);
                    }
                }
                postings.push(posting);
            }
        }

        Ok(postings)
    }

    pub fn len_bytes(&self) -> usize {
        self.data.len()
    }
}
