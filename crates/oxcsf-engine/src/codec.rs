//! Little-endian field codecs for the binary snapshot format.
//!
//! Components serialise themselves with these helpers so the on-disk layout
//! is explicit at every call site.

use std::io::{Read, Write};

use crate::error::{Error, Result};

pub(crate) fn put_u8<W: Write>(w: &mut W, v: u8) -> Result<()> {
    w.write_all(&[v])?;
    Ok(())
}

pub(crate) fn get_u8<R: Read>(r: &mut R) -> Result<u8> {
    let mut buf = [0_u8; 1];
    r.read_exact(&mut buf)?;
    Ok(buf[0])
}

pub(crate) fn put_bool<W: Write>(w: &mut W, v: bool) -> Result<()> {
    put_u8(w, u8::from(v))
}

pub(crate) fn get_bool<R: Read>(r: &mut R) -> Result<bool> {
    match get_u8(r)? {
        0 => Ok(false),
        1 => Ok(true),
        v => Err(Error::snapshot(format!("invalid boolean byte: {v}"))),
    }
}

pub(crate) fn put_u32<W: Write>(w: &mut W, v: u32) -> Result<()> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

pub(crate) fn get_u32<R: Read>(r: &mut R) -> Result<u32> {
    let mut buf = [0_u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

pub(crate) fn put_u64<W: Write>(w: &mut W, v: u64) -> Result<()> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

pub(crate) fn get_u64<R: Read>(r: &mut R) -> Result<u64> {
    let mut buf = [0_u8; 8];
    r.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

pub(crate) fn put_usize<W: Write>(w: &mut W, v: usize) -> Result<()> {
    let v = u32::try_from(v).map_err(|_| Error::snapshot(format!("length out of range: {v}")))?;
    put_u32(w, v)
}

pub(crate) fn get_usize<R: Read>(r: &mut R) -> Result<usize> {
    Ok(get_u32(r)? as usize)
}

pub(crate) fn put_f64<W: Write>(w: &mut W, v: f64) -> Result<()> {
    w.write_all(&v.to_le_bytes())?;
    Ok(())
}

pub(crate) fn get_f64<R: Read>(r: &mut R) -> Result<f64> {
    let mut buf = [0_u8; 8];
    r.read_exact(&mut buf)?;
    Ok(f64::from_le_bytes(buf))
}

pub(crate) fn put_f64_slice<W: Write>(w: &mut W, values: &[f64]) -> Result<()> {
    put_usize(w, values.len())?;
    for v in values {
        put_f64(w, *v)?;
    }
    Ok(())
}

pub(crate) fn get_f64_vec<R: Read>(r: &mut R) -> Result<Vec<f64>> {
    let len = get_usize(r)?;
    let mut values = Vec::with_capacity(len);
    for _ in 0..len {
        values.push(get_f64(r)?);
    }
    Ok(values)
}

pub(crate) fn put_bytes<W: Write>(w: &mut W, bytes: &[u8]) -> Result<()> {
    put_usize(w, bytes.len())?;
    w.write_all(bytes)?;
    Ok(())
}

pub(crate) fn get_bytes<R: Read>(r: &mut R) -> Result<Vec<u8>> {
    let len = get_usize(r)?;
    let mut bytes = vec![0_u8; len];
    r.read_exact(&mut bytes)?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_round_trips() {
        let mut buf = Vec::new();
        put_u32(&mut buf, 0xDEAD_BEEF).unwrap();
        put_f64(&mut buf, -1.5).unwrap();
        put_bool(&mut buf, true).unwrap();
        put_u64(&mut buf, u64::MAX).unwrap();

        let mut r = buf.as_slice();
        assert_eq!(get_u32(&mut r).unwrap(), 0xDEAD_BEEF);
        assert_eq!(get_f64(&mut r).unwrap(), -1.5);
        assert!(get_bool(&mut r).unwrap());
        assert_eq!(get_u64(&mut r).unwrap(), u64::MAX);
    }

    #[test]
    fn slice_round_trips() {
        let mut buf = Vec::new();
        put_f64_slice(&mut buf, &[1.0, 2.0, 3.0]).unwrap();
        put_bytes(&mut buf, b"01#").unwrap();

        let mut r = buf.as_slice();
        assert_eq!(get_f64_vec(&mut r).unwrap(), vec![1.0, 2.0, 3.0]);
        assert_eq!(get_bytes(&mut r).unwrap(), b"01#");
    }

    #[test]
    fn truncated_input_is_a_snapshot_error() {
        let mut buf = Vec::new();
        put_u32(&mut buf, 7).unwrap();
        let mut r = &buf[..2];
        assert!(get_u32(&mut r).is_err());
    }

    #[test]
    fn invalid_bool_is_rejected() {
        let mut r = [7_u8].as_slice();
        assert!(matches!(get_bool(&mut r), Err(Error::Snapshot(_))));
    }
}
