//! Fixture builders shared by the integration tests
//!
//! Files are assembled section by section with explicit bodies, the way the
//! game lays them out, instead of going through the object model.

#![allow(dead_code)]

use std::io::Cursor;
use std::sync::Arc;

use distance_parsers::{DstWriter, Magic, Registry, Result, Section, SKIP};

pub type Writer = DstWriter<Cursor<Vec<u8>>>;

pub fn registry() -> Arc<Registry> {
    Arc::new(Registry::eager().expect("eager registry"))
}

pub fn build(f: impl FnOnce(&mut Writer) -> Result<()>) -> Vec<u8> {
    let mut w = DstWriter::memory();
    f(&mut w).expect("fixture");
    w.into_bytes()
}

pub fn component(
    w: &mut Writer,
    magic: Magic,
    id: u32,
    version: u32,
    body: impl FnOnce(&mut Writer) -> Result<()>,
) -> Result<()> {
    w.write_section(&Section::component(magic, id, version), body)
}

/// Object fragment with a position, no rotation and unit scale
pub fn transform(w: &mut Writer, pos: [f32; 3]) -> Result<()> {
    component(w, Magic::M3, 0x01, 0, |w| {
        for v in pos {
            w.write_f32(v)?;
        }
        w.write_bytes(&SKIP)?;
        for _ in 0..3 {
            w.write_f32(1.0)?;
        }
        Ok(())
    })
}

/// GoldenSimples v3 with the editor defaults
pub fn golden_simples(w: &mut Writer, image_index: i32) -> Result<()> {
    component(w, Magic::M2, 0x83, 3, |w| {
        w.write_i32(image_index)?;
        w.write_i32(17)?;
        w.write_i32(0)?;
        for v in [1.0, 1.0, 1.0, 0.0, 0.0, 0.0] {
            w.write_f32(v)?;
        }
        w.write_bytes(&[0, 0, 0, 0])?;
        w.write_f32(0.0)?;
        w.write_bytes(&[0, 0, 0, 0])?;
        w.write_u8(0)?;
        w.write_f32(1.0)
    })
}

pub fn cube(w: &mut Writer, x: f32) -> Result<()> {
    w.write_section(&Section::object("CubeGS").with_count(2), |w| {
        transform(w, [x, 0.0, 0.0])?;
        golden_simples(w, 17)
    })
}

/// Object with a transform and an unknown raw component
pub fn plain_object(w: &mut Writer, type_name: &str, pos: [f32; 3]) -> Result<()> {
    w.write_section(&Section::object(type_name).with_count(2), |w| {
        transform(w, pos)?;
        component(w, Magic::M2, 0x16, 0, |w| w.write_bytes(&[0xde, 0xad, 0xbe, 0xef]))
    })
}

pub fn level_settings(w: &mut Writer, name: &str) -> Result<()> {
    w.write_section(&Section::object("LevelSettings").with_count(1), |w| {
        component(w, Magic::M2, 0x52, 25, |w| {
            w.write_str(name)?;
            // skybox, music, physics ...
            for v in 0u32..24 {
                w.write_u32(v * 3)?;
            }
            Ok(())
        })
    })
}

pub fn layer_flags(w: &mut Writer) -> Result<()> {
    w.write_u32(Magic::M1.value())?;
    w.write_u32(1)?;
    w.write_bytes(&[1, 0, 1, 0])
}

/// Index of the row with time 86260 in [`leaderboard_bytes`]
pub const FERREUS_ROW: usize = 10;
/// Index of the row with the escaped name in [`leaderboard_bytes`]
pub const ESCAPED_ROW: usize = 13;

pub fn escaped_name() -> String {
    format!("{}NiceRacer", "\u{7f}".repeat(9))
}

/// Local leaderboard with 20 rows
pub fn leaderboard_bytes() -> Vec<u8> {
    build(|w| {
        w.write_section(&Section::object("LocalLeaderboard").with_count(1), |w| {
            component(w, Magic::M2, 0x37, 1, |w| {
                w.write_u32(20)?;
                for i in 0..20usize {
                    let (name, time) = match i {
                        FERREUS_ROW => ("Ferreus".to_string(), 86260),
                        ESCAPED_ROW => (escaped_name(), 91000 + i as i32),
                        _ => (format!("Racer{i}"), 80000 + 1000 * i as i32),
                    };
                    w.write_str(&name)?;
                    w.write_i32(time)?;
                    w.write_u64(0x1100_0000_0000 + i as u64)?;
                }
                Ok(())
            })
        })
    })
}

/// Level v3 with settings and one layer of six objects ending in the finish
pub fn straightroad_bytes() -> Vec<u8> {
    build(|w| {
        w.write_section(&Section::level("Test-straightroad", 3).with_count(1), |w| {
            level_settings(w, "Test-straightroad")?;
            w.write_section(&Section::layer("Default").with_count(6), |w| {
                layer_flags(w)?;
                plain_object(w, "LevelEditorCarSpawner", [0.0, 0.0, 0.0])?;
                plain_object(w, "EmpireStartZone", [0.0, 0.0, 10.0])?;
                for i in 0..3 {
                    cube(w, i as f32 * 50.0)?;
                }
                plain_object(w, "EmpireEndZone", [0.0, 0.0, 900.0])
            })
        })
    })
}

/// Group named "2cubes" holding two cubes
pub fn two_cubes_bytes() -> Vec<u8> {
    build(|w| {
        w.write_section(&Section::object("Group").with_count(3), |w| {
            transform(w, [0.0, 5.0, 0.0])?;
            component(w, Magic::M2, 0x1d, 2, |w| {
                w.write_i32(0)?;
                w.write_u8(1)
            })?;
            component(w, Magic::M2, 0x63, 0, |w| w.write_str("2cubes"))?;
            w.write_section(&Section::children().with_count(2), |w| {
                cube(w, -2.0)?;
                cube(w, 2.0)
            })
        })
    })
}

/// Level whose single layer holds `objects` cubes, cut inside the last one
pub fn truncated_level_bytes(objects: usize) -> Vec<u8> {
    let full = build(|w| {
        w.write_section(&Section::level("Cut", 3).with_count(1), |w| {
            level_settings(w, "Cut")?;
            w.write_section(&Section::layer("Default").with_count(objects as u32), |w| {
                layer_flags(w)?;
                for i in 0..objects {
                    cube(w, i as f32)?;
                }
                Ok(())
            })
        })
    });
    full[..full.len() - 20].to_vec()
}
