//! two-pass huffman codec with an embedded frequency-table header
//!
//! encoded stream layout:
//!
//! ```text
//! file_len:u64 LE  freq[0..256]:u64 LE each  payload bits, msb-first
//! ```
//!
//! the decoder rebuilds the tree from the table with the same
//! deterministic construction the encoder used, then emits exactly
//! `file_len` symbols, ignoring the zero bits padding the final byte.

mod bitio;
mod tree;

pub use bitio::{BitReader, BitWriter};
pub use tree::{assign_codes, build_tree, Code, Node, MAX_CODE_BITS};

use std::io::{self, Read, Seek, SeekFrom, Write};

use crate::error::{Error, Result};
use crate::types::read_fully;

/// header size: file_len plus 256 frequency counters
pub const HEADER_LEN: usize = 8 + 256 * 8;

const CHUNK: usize = 64 * 1024;

/// compress a byte stream
///
/// two passes over the input: one to count frequencies, one to encode,
/// which is why the input must seek. returns the encoded payload bit
/// count, excluding header and padding.
pub fn compress<R: Read + Seek, W: Write>(input: &mut R, output: &mut W) -> Result<u64> {
    let (freqs, file_len) = count_frequencies(input)?;

    let mut header = Vec::with_capacity(HEADER_LEN);
    header.extend_from_slice(&file_len.to_le_bytes());
    for freq in &freqs {
        header.extend_from_slice(&freq.to_le_bytes());
    }
    output.write_all(&header).map_err(Error::ArchiveWrite)?;

    let codes = match build_tree(&freqs) {
        Some(tree) => assign_codes(&tree)?,
        None => return Ok(0),
    };

    input
        .seek(SeekFrom::Start(0))
        .map_err(Error::ArchiveRead)?;

    let mut writer = BitWriter::new(&mut *output);
    let mut buf = vec![0u8; CHUNK];
    loop {
        let n = read_fully(input, &mut buf).map_err(Error::ArchiveRead)?;
        if n == 0 {
            break;
        }
        for &byte in &buf[..n] {
            let code = codes[byte as usize].as_ref().ok_or_else(|| {
                Error::ArchiveRead(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "input changed between passes",
                ))
            })?;
            for i in 0..code.len as usize {
                writer.write_bit(code.bit(i)).map_err(Error::ArchiveWrite)?;
            }
        }
        if n < buf.len() {
            break;
        }
    }

    writer.finish().map_err(Error::ArchiveWrite)
}

/// decompress a stream produced by [`compress`]
///
/// single pass; emits exactly the original byte count. a header or
/// payload that ends early is a malformed archive.
pub fn decompress<R: Read, W: Write>(input: &mut R, output: &mut W) -> Result<u64> {
    let mut len_buf = [0u8; 8];
    read_header_bytes(input, &mut len_buf)?;
    let file_len = u64::from_le_bytes(len_buf);

    let mut freqs = [0u64; 256];
    let mut table = [0u8; 256 * 8];
    read_header_bytes(input, &mut table)?;
    for (i, chunk) in table.chunks_exact(8).enumerate() {
        let mut counter = [0u8; 8];
        counter.copy_from_slice(chunk);
        freqs[i] = u64::from_le_bytes(counter);
    }

    let total: u64 = freqs.iter().sum();
    if total != file_len {
        return Err(Error::MalformedArchive(format!(
            "frequency table sums to {total}, header says {file_len}"
        )));
    }
    if file_len == 0 {
        return Ok(0);
    }

    let Some(tree) = build_tree(&freqs) else {
        return Err(Error::MalformedArchive(
            "empty frequency table for a nonempty stream".to_string(),
        ));
    };

    let mut bits = BitReader::new(input);
    let mut out = Vec::with_capacity(CHUNK.min(file_len as usize));
    let mut emitted = 0u64;
    while emitted < file_len {
        out.push(decode_symbol(&tree, &mut bits)?);
        emitted += 1;
        if out.len() == CHUNK {
            output.write_all(&out).map_err(Error::ArchiveWrite)?;
            out.clear();
        }
    }
    if !out.is_empty() {
        output.write_all(&out).map_err(Error::ArchiveWrite)?;
    }
    Ok(emitted)
}

/// count per-symbol frequencies and the total byte count
fn count_frequencies<R: Read>(input: &mut R) -> Result<([u64; 256], u64)> {
    let mut freqs = [0u64; 256];
    let mut total = 0u64;
    let mut buf = vec![0u8; CHUNK];
    loop {
        let n = read_fully(input, &mut buf).map_err(Error::ArchiveRead)?;
        if n == 0 {
            break;
        }
        for &byte in &buf[..n] {
            freqs[byte as usize] += 1;
        }
        total += n as u64;
        if n < buf.len() {
            break;
        }
    }
    Ok((freqs, total))
}

fn decode_symbol<R: Read>(root: &Node, bits: &mut BitReader<R>) -> Result<u8> {
    // a single-leaf tree still consumes one bit per symbol
    if let Node::Leaf(sym) = root {
        next_bit(bits)?;
        return Ok(*sym);
    }

    let mut node = root;
    loop {
        match node {
            Node::Leaf(sym) => return Ok(*sym),
            Node::Internal(left, right) => {
                node = if next_bit(bits)? { right } else { left };
            }
        }
    }
}

fn next_bit<R: Read>(bits: &mut BitReader<R>) -> Result<bool> {
    bits.read_bit()
        .map_err(Error::ArchiveRead)?
        .ok_or_else(|| Error::MalformedArchive("compressed payload truncated".to_string()))
}

fn read_header_bytes<R: Read>(input: &mut R, buf: &mut [u8]) -> Result<()> {
    let n = read_fully(input, buf).map_err(Error::ArchiveRead)?;
    if n != buf.len() {
        return Err(Error::MalformedArchive(
            "truncated huffman header".to_string(),
        ));
    }
    Ok(())
}
