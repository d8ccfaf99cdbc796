//! Immutable row-major vector store with a flat binary on-disk format.
//!
//! The file layout is a fixed header followed by the raw matrix and a
//! trailing checksum, all little-endian:
//!
//! ```text
//! magic  u32   "VSTR"
//! version u16  format version (currently 1)
//! width  u8    element byte width (4 = f32)
//! _      u8    reserved
//! count  u64   number of points N
//! dim    u32   dimensionality D
//! data   N * D * f32, row-major
//! crc32  u32   checksum of the data bytes
//! ```
//!
//! The flat layout keeps row access O(1) with no per-row parsing.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::error::{Result, VantageError};
use crate::vector;

const STORE_MAGIC: u32 = u32::from_le_bytes(*b"VSTR");
const FORMAT_VERSION: u16 = 1;
const ELEMENT_WIDTH: u8 = 4;

/// An immutable, row-major matrix of `f32` vectors addressable by row index.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorStore {
    dim: usize,
    data: Vec<f32>,
}

impl VectorStore {
    /// Build a store from equal-length rows.
    pub fn from_rows(rows: &[Vec<f32>]) -> Result<Self> {
        let Some(first) = rows.first() else {
            return Err(VantageError::invalid_argument(
                "vector store requires at least one row",
            ));
        };
        let dim = first.len();
        if dim == 0 {
            return Err(VantageError::invalid_argument(
                "vectors must have at least one dimension",
            ));
        }

        let mut data = Vec::with_capacity(rows.len() * dim);
        for (i, row) in rows.iter().enumerate() {
            if row.len() != dim {
                return Err(VantageError::dimension_mismatch(dim, row.len()));
            }
            if !vector::is_finite(row) {
                return Err(VantageError::invalid_argument(format!(
                    "row {i} contains non-finite values"
                )));
            }
            data.extend_from_slice(row);
        }

        Ok(VectorStore { dim, data })
    }

    /// Wrap an existing flat row-major buffer.
    pub fn from_flat(dim: usize, data: Vec<f32>) -> Result<Self> {
        if dim == 0 {
            return Err(VantageError::invalid_argument(
                "vectors must have at least one dimension",
            ));
        }
        if data.len() % dim != 0 {
            return Err(VantageError::invalid_argument(format!(
                "buffer length {} is not a multiple of dimension {dim}",
                data.len()
            )));
        }
        if !vector::is_finite(&data) {
            return Err(VantageError::invalid_argument(
                "buffer contains non-finite values",
            ));
        }

        Ok(VectorStore { dim, data })
    }

    /// Number of points in the store.
    pub fn len(&self) -> usize {
        self.data.len() / self.dim
    }

    /// Check whether the store holds no points.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Dimensionality shared by every point.
    pub fn dimension(&self) -> usize {
        self.dim
    }

    /// Borrow the row at the given index.
    ///
    /// Panics if the index is out of bounds, like slice indexing.
    pub fn row(&self, index: u32) -> &[f32] {
        let start = index as usize * self.dim;
        &self.data[start..start + self.dim]
    }

    /// Size of the raw matrix in bytes.
    pub fn data_bytes(&self) -> usize {
        self.data.len() * ELEMENT_WIDTH as usize
    }

    /// Load a store from a file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            VantageError::storage(format!("failed to open {}: {e}", path.display()))
        })?;
        Self::read_from(BufReader::new(file))
    }

    /// Save the store to a file, overwriting any existing content.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|e| {
            VantageError::storage(format!("failed to create {}: {e}", path.display()))
        })?;
        let mut writer = BufWriter::new(file);
        self.write_to(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    /// Read a store from the binary format.
    pub fn read_from<R: Read>(mut reader: R) -> Result<Self> {
        let magic = reader.read_u32::<LittleEndian>()?;
        if magic != STORE_MAGIC {
            return Err(VantageError::storage("not a vector store file"));
        }

        let version = reader.read_u16::<LittleEndian>()?;
        if version != FORMAT_VERSION {
            return Err(VantageError::storage(format!(
                "unsupported format version {version}"
            )));
        }

        let width = reader.read_u8()?;
        if width != ELEMENT_WIDTH {
            return Err(VantageError::storage(format!(
                "unsupported element width {width}"
            )));
        }
        let _reserved = reader.read_u8()?;

        let count = reader.read_u64::<LittleEndian>()? as usize;
        let dim = reader.read_u32::<LittleEndian>()? as usize;
        if dim == 0 {
            return Err(VantageError::storage("dimensionality must be > 0"));
        }

        let payload_bytes = count
            .checked_mul(dim)
            .and_then(|elements| elements.checked_mul(ELEMENT_WIDTH as usize))
            .ok_or_else(|| VantageError::storage("point count overflows"))?;
        let mut payload = vec![0u8; payload_bytes];
        reader.read_exact(&mut payload).map_err(|e| {
            VantageError::storage(format!("truncated vector data: {e}"))
        })?;

        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&payload);
        let expected = reader.read_u32::<LittleEndian>().map_err(|e| {
            VantageError::storage(format!("missing checksum: {e}"))
        })?;
        let actual = hasher.finalize();
        if expected != actual {
            return Err(VantageError::storage(format!(
                "checksum mismatch: expected {expected:#010x}, got {actual:#010x}"
            )));
        }

        let data = payload
            .chunks_exact(ELEMENT_WIDTH as usize)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect();

        Ok(VectorStore { dim, data })
    }

    /// Write the store in the binary format.
    pub fn write_to<W: Write>(&self, mut writer: W) -> Result<()> {
        writer.write_u32::<LittleEndian>(STORE_MAGIC)?;
        writer.write_u16::<LittleEndian>(FORMAT_VERSION)?;
        writer.write_u8(ELEMENT_WIDTH)?;
        writer.write_u8(0)?;
        writer.write_u64::<LittleEndian>(self.len() as u64)?;
        writer.write_u32::<LittleEndian>(self.dim as u32)?;

        let mut hasher = crc32fast::Hasher::new();
        for value in &self.data {
            let bytes = value.to_le_bytes();
            writer.write_all(&bytes)?;
            hasher.update(&bytes);
        }
        writer.write_u32::<LittleEndian>(hasher.finalize())?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_store() -> VectorStore {
        VectorStore::from_rows(&[
            vec![1.0, 2.0, 3.0],
            vec![4.0, 5.0, 6.0],
            vec![7.0, 8.0, 9.0],
        ])
        .unwrap()
    }

    #[test]
    fn test_from_rows() {
        let store = sample_store();
        assert_eq!(store.len(), 3);
        assert_eq!(store.dimension(), 3);
        assert_eq!(store.row(1), &[4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_from_rows_rejects_ragged_input() {
        let result = VectorStore::from_rows(&[vec![1.0, 2.0], vec![1.0]]);
        assert!(matches!(
            result,
            Err(VantageError::DimensionMismatch { expected: 2, actual: 1 })
        ));
    }

    #[test]
    fn test_from_rows_rejects_non_finite() {
        let result = VectorStore::from_rows(&[vec![1.0, f32::NAN]]);
        assert!(result.is_err());
    }

    #[test]
    fn test_from_flat() {
        let store = VectorStore::from_flat(2, vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(store.row(1), &[3.0, 4.0]);

        assert!(VectorStore::from_flat(3, vec![1.0, 2.0]).is_err());
        assert!(VectorStore::from_flat(0, vec![]).is_err());
    }

    #[test]
    fn test_empty_store() {
        let store = VectorStore::from_flat(4, vec![]).unwrap();
        assert!(store.is_empty());
        assert_eq!(store.len(), 0);
        assert_eq!(store.dimension(), 4);
    }

    #[test]
    fn test_roundtrip_in_memory() {
        let store = sample_store();
        let mut buffer = Vec::new();
        store.write_to(&mut buffer).unwrap();

        let reloaded = VectorStore::read_from(buffer.as_slice()).unwrap();
        assert_eq!(store, reloaded);
    }

    #[test]
    fn test_rejects_bad_magic() {
        let store = sample_store();
        let mut buffer = Vec::new();
        store.write_to(&mut buffer).unwrap();
        buffer[0] ^= 0xFF;

        let result = VectorStore::read_from(buffer.as_slice());
        assert!(matches!(result, Err(VantageError::Storage(_))));
    }

    #[test]
    fn test_rejects_corrupted_payload() {
        let store = sample_store();
        let mut buffer = Vec::new();
        store.write_to(&mut buffer).unwrap();
        // Flip a bit in the first data element, after the 20-byte header.
        buffer[20] ^= 0x01;

        let result = VectorStore::read_from(buffer.as_slice());
        match result {
            Err(VantageError::Storage(msg)) => assert!(msg.contains("checksum")),
            other => panic!("expected checksum failure, got {other:?}"),
        }
    }

    #[test]
    fn test_rejects_truncated_file() {
        let store = sample_store();
        let mut buffer = Vec::new();
        store.write_to(&mut buffer).unwrap();
        buffer.truncate(buffer.len() - 8);

        assert!(VectorStore::read_from(buffer.as_slice()).is_err());
    }

    #[test]
    fn test_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("points.vstr");

        let store = sample_store();
        store.save(&path).unwrap();
        let reloaded = VectorStore::load(&path).unwrap();

        assert_eq!(store, reloaded);
    }
}
