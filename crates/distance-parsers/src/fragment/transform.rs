//! Transform block of the object fragment
//!
//! ```text
//! pos    3 × f32  or SKIP
//! rot    4 × f32  or SKIP   (xyzw)
//! scale  3 × f32  or SKIP
//! ```
//!
//! An empty body means the object carries no transform at all.

use std::io::{Seek, Write};

use distance_core::{Quat, Result, Transform, Vec3, SKIP};

use crate::bytes::{DstBytes, DstWriter};

fn skipped(r: &mut DstBytes) -> Result<bool> {
    if r.remaining() >= 4 && r.peek(4)?[..] == SKIP {
        r.read_bytes(4)?;
        return Ok(true);
    }
    Ok(false)
}

fn read_floats<const N: usize>(r: &mut DstBytes) -> Result<Option<[f32; N]>> {
    if skipped(r)? {
        return Ok(None);
    }
    let mut out = [0f32; N];
    for v in out.iter_mut() {
        *v = r.read_f32()?;
    }
    Ok(Some(out))
}

/// Read a transform; `None` if the body is empty
pub fn read_transform(r: &mut DstBytes) -> Result<Option<Transform>> {
    if r.remaining() == 0 {
        return Ok(None);
    }
    let pos = read_floats::<3>(r)?.map(Vec3::from);
    let rot = read_floats::<4>(r)?.map(Quat::from);
    let scale = read_floats::<3>(r)?.map(Vec3::from);
    Ok(Some(Transform::new(pos, rot, scale)))
}

fn write_floats<W: Write + Seek, const N: usize>(w: &mut DstWriter<W>, values: Option<[f32; N]>) -> Result<()> {
    match values {
        Some(values) => values.iter().try_for_each(|v| w.write_f32(*v)),
        None => w.write_bytes(&SKIP),
    }
}

/// Write a transform; absent elements become SKIP
pub fn write_transform<W: Write + Seek>(w: &mut DstWriter<W>, transform: Option<&Transform>) -> Result<()> {
    let Some(t) = transform else {
        return Ok(());
    };
    write_floats(w, t.pos.map(Vec3::to_array))?;
    write_floats(w, t.rot.map(Quat::to_array))?;
    write_floats(w, t.scale.map(Vec3::to_array))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn emit(t: Option<&Transform>) -> Vec<u8> {
        let mut w = DstWriter::memory();
        write_transform(&mut w, t).unwrap();
        w.into_bytes()
    }

    #[test]
    fn test_empty_transform_is_three_skips() {
        let out = emit(Some(&Transform::EMPTY));
        assert_eq!(out, [SKIP, SKIP, SKIP].concat());
    }

    #[test]
    fn test_filled_transform() {
        let out = emit(Some(&Transform::fill()));
        assert_eq!(out.len(), 40);
        let floats: Vec<f32> = out
            .chunks_exact(4)
            .map(|c| f32::from_le_bytes(c.try_into().unwrap()))
            .collect();
        assert_eq!(floats, vec![0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_no_transform() {
        assert!(emit(None).is_empty());
        assert_eq!(read_transform(&mut DstBytes::new(Vec::new())).unwrap(), None);
    }

    #[test]
    fn test_partial() {
        let t = Transform::new(Some(Vec3::new(1.0, 2.0, 3.0)), None, None);
        let out = emit(Some(&t));
        assert_eq!(out.len(), 20);
        assert_eq!(&out[12..], [SKIP, SKIP].concat().as_slice());
        assert_eq!(read_transform(&mut DstBytes::new(out)).unwrap(), Some(t));
    }

    proptest! {
        #[test]
        fn prop_roundtrip(
            pos in proptest::option::of(proptest::array::uniform3(-1e6f32..1e6)),
            rot in proptest::option::of(proptest::array::uniform4(-1f32..1.0)),
            scale in proptest::option::of(proptest::array::uniform3(0f32..100.0)),
        ) {
            let t = Transform::new(pos.map(Vec3::from), rot.map(Quat::from), scale.map(Vec3::from));
            let out = emit(Some(&t));
            prop_assert_eq!(read_transform(&mut DstBytes::new(out)).unwrap(), Some(t));
        }
    }
}
