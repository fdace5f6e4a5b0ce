//! Minimal NumPy `.npy` v1.0 reader/writer: just enough to persist flat
//! `f32`/`u64` tensors with a `fortran_order: False` (row-major) header.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use crate::errors::{KbError, KbResult};

const MAGIC: &[u8] = b"\x93NUMPY";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NpyHeader {
    pub dtype: String,
    pub fortran_order: bool,
    pub shape: Vec<usize>,
}

fn dtype_str(kind: char, size: usize) -> String {
    format!("<{kind}{size}")
}

fn build_header(dtype: &str, shape: &[usize]) -> Vec<u8> {
    let shape_str = if shape.is_empty() {
        "()".to_string()
    } else if shape.len() == 1 {
        format!("({},)", shape[0])
    } else {
        let parts: Vec<String> = shape.iter().map(|d| d.to_string()).collect();
        format!("({})", parts.join(","))
    };
    let mut dict = format!("{{'descr': '{dtype}', 'fortran_order': False, 'shape': {shape_str}, }}");
    // pad so that len(magic)+len(version)+len(header_len_u16)+len(dict) is a multiple of 16
    let prefix_len = MAGIC.len() + 2 + 2;
    let pad = (16 - (prefix_len + dict.len() + 1) % 16) % 16;
    dict.extend(std::iter::repeat(' ').take(pad));
    dict.push('\n');

    let mut header = Vec::with_capacity(prefix_len + dict.len());
    header.extend_from_slice(MAGIC);
    header.push(1);
    header.push(0);
    header.extend_from_slice(&(dict.len() as u16).to_le_bytes());
    header.extend_from_slice(dict.as_bytes());
    header
}

pub fn read_header(reader: &mut impl Read) -> std::io::Result<NpyHeader> {
    let mut magic = [0u8; 6];
    reader.read_exact(&mut magic)?;
    if magic != MAGIC[..] {
        return Err(std::io::Error::new(std::io::ErrorKind::InvalidData, "bad npy magic"));
    }
    let mut version = [0u8; 2];
    reader.read_exact(&mut version)?;
    let mut len_bytes = [0u8; 2];
    reader.read_exact(&mut len_bytes)?;
    let header_len = u16::from_le_bytes(len_bytes) as usize;
    let mut dict = vec![0u8; header_len];
    reader.read_exact(&mut dict)?;
    let dict = String::from_utf8_lossy(&dict);

    let dtype = extract_between(&dict, "'descr':", ",").trim().trim_matches('\'').to_string();
    let fortran_order = extract_between(&dict, "'fortran_order':", ",").trim() == "True";
    let shape_str = extract_between(&dict, "'shape':", "}");
    let shape: Vec<usize> = shape_str
        .trim()
        .trim_start_matches('(')
        .trim_end()
        .trim_end_matches(',')
        .trim_end_matches(')')
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.parse().unwrap_or(0))
        .collect();

    Ok(NpyHeader {
        dtype,
        fortran_order,
        shape,
    })
}

fn extract_between<'a>(s: &'a str, after: &str, before: &str) -> &'a str {
    let start = s.find(after).map(|i| i + after.len()).unwrap_or(0);
    let rest = &s[start..];
    let end = rest.find(before).unwrap_or(rest.len());
    &rest[..end]
}

pub fn check_header(header: &NpyHeader, dtype: &str, shape: &[usize], path: &str) -> KbResult<()> {
    if header.dtype != dtype || header.fortran_order {
        return Err(KbError::NpyHeader {
            path: path.to_string(),
            reason: format!("expected dtype {dtype} row-major, found {} fortran_order={}", header.dtype, header.fortran_order),
        });
    }
    if header.shape != shape {
        return Err(KbError::NpyShape {
            path: path.to_string(),
            expected: shape.to_vec(),
            found: header.shape.clone(),
        });
    }
    Ok(())
}

pub fn write_array(path: &Path, dtype: &str, shape: &[usize], data: &[u8]) -> std::io::Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    writer.write_all(&build_header(dtype, shape))?;
    writer.write_all(data)?;
    Ok(())
}

pub fn write_f32_array(path: &Path, shape: &[usize], data: &[f32]) -> KbResult<()> {
    let bytes: Vec<u8> = data.iter().flat_map(|v| v.to_le_bytes()).collect();
    write_array(path, &dtype_str('f', 4), shape, &bytes)?;
    Ok(())
}

pub fn write_u64_array(path: &Path, shape: &[usize], data: &[u64]) -> KbResult<()> {
    let bytes: Vec<u8> = data.iter().flat_map(|v| v.to_le_bytes()).collect();
    write_array(path, &dtype_str('u', 8), shape, &bytes)?;
    Ok(())
}

pub fn read_f32_array(path: &Path, shape: &[usize]) -> KbResult<Vec<f32>> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let header = read_header(&mut reader)?;
    check_header(&header, &dtype_str('f', 4), shape, &path.display().to_string())?;
    let count: usize = shape.iter().product::<usize>().max(1);
    let mut bytes = vec![0u8; count * 4];
    reader.read_exact(&mut bytes)?;
    Ok(bytes.chunks_exact(4).map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]])).collect())
}

pub fn read_u64_array(path: &Path, shape: &[usize]) -> KbResult<Vec<u64>> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let header = read_header(&mut reader)?;
    check_header(&header, &dtype_str('u', 8), shape, &path.display().to_string())?;
    let count: usize = shape.iter().product::<usize>().max(1);
    let mut bytes = vec![0u8; count * 8];
    reader.read_exact(&mut bytes)?;
    Ok(bytes
        .chunks_exact(8)
        .map(|c| u64::from_le_bytes(c.try_into().unwrap()))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn header_round_trips() {
        let header_bytes = build_header("<f4", &[3, 4]);
        let mut cursor = Cursor::new(header_bytes);
        let parsed = read_header(&mut cursor).unwrap();
        assert_eq!(parsed.dtype, "<f4");
        assert!(!parsed.fortran_order);
        assert_eq!(parsed.shape, vec![3, 4]);
    }

    #[test]
    fn header_length_is_16_aligned() {
        for shape in [vec![], vec![7], vec![3, 256, 256]] {
            let header = build_header("<u8", &shape);
            assert_eq!(header.len() % 16, 0);
        }
    }

    #[test]
    fn f32_array_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.npy");
        let data = vec![1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0];
        write_f32_array(&path, &[2, 3], &data).unwrap();
        let back = read_f32_array(&path, &[2, 3]).unwrap();
        assert_eq!(back, data);
    }

    #[test]
    fn scalar_shape_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("s.npy");
        write_u64_array(&path, &[], &[42]).unwrap();
        let back = read_u64_array(&path, &[]).unwrap();
        assert_eq!(back, vec![42]);
    }
}
