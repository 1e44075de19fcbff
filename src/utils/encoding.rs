use std::io::{self, Read, Write};

/// Read a little-endian u32 at `offset`
#[inline]
pub fn get_u32(buf: &[u8], offset: usize) -> u32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&buf[offset..offset + 4]);
    u32::from_le_bytes(bytes)
}

/// Read a little-endian i32 at `offset`
#[inline]
pub fn get_i32(buf: &[u8], offset: usize) -> i32 {
    get_u32(buf, offset) as i32
}

/// Read a little-endian u64 at `offset`
#[inline]
pub fn get_u64(buf: &[u8], offset: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&buf[offset..offset + 8]);
    u64::from_le_bytes(bytes)
}

/// Read a little-endian u16 at `offset`
#[inline]
pub fn get_u16(buf: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([buf[offset], buf[offset + 1]])
}

#[inline]
pub fn put_u16(buf: &mut [u8], offset: usize, value: u16) {
    buf[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
}

#[inline]
pub fn put_u32(buf: &mut [u8], offset: usize, value: u32) {
    buf[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

#[inline]
pub fn put_i32(buf: &mut [u8], offset: usize, value: i32) {
    put_u32(buf, offset, value as u32);
}

#[inline]
pub fn put_u64(buf: &mut [u8], offset: usize, value: u64) {
    buf[offset..offset + 8].copy_from_slice(&value.to_le_bytes());
}

/// Write a u32 in little-endian format
pub fn write_u32_le<W: Write>(writer: &mut W, value: u32) -> io::Result<()> {
    writer.write_all(&value.to_le_bytes())
}

/// Read a u32 in little-endian format.
///
/// Returns `Ok(None)` on a clean end of stream (no bytes left).
pub fn read_u32_le<R: Read>(reader: &mut R) -> io::Result<Option<u32>> {
    let mut buf = [0u8; 4];
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) if filled == 0 => return Ok(None),
            Ok(0) => {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "truncated u32",
                ));
            }
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(Some(u32::from_le_bytes(buf)))
}

/// Write a length-prefixed UTF-8 string
pub fn write_str<W: Write>(writer: &mut W, value: &str) -> io::Result<()> {
    write_u32_le(writer, value.len() as u32)?;
    writer.write_all(value.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slice_accessors() {
        let mut buf = vec![0u8; 16];
        put_u64(&mut buf, 0, 0x0102_0304_0506_0708);
        put_i32(&mut buf, 8, -1);
        put_u16(&mut buf, 12, 513);

        assert_eq!(get_u64(&buf, 0), 0x0102_0304_0506_0708);
        assert_eq!(get_i32(&buf, 8), -1);
        assert_eq!(get_u32(&buf, 8), u32::MAX);
        assert_eq!(get_u16(&buf, 12), 513);
    }

    #[test]
    fn test_read_u32_clean_eof() {
        let mut empty: &[u8] = &[];
        assert_eq!(read_u32_le(&mut empty).unwrap(), None);

        let mut truncated: &[u8] = &[1, 2];
        assert!(read_u32_le(&mut truncated).is_err());
    }

    #[test]
    fn test_write_str() {
        let mut out = Vec::new();
        write_str(&mut out, "ab").unwrap();
        assert_eq!(out, vec![2, 0, 0, 0, b'a', b'b']);
    }
}
