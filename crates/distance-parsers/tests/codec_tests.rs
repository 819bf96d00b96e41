//! Integration tests for the file entry points
//!
//! These tests cover:
//! - Leaderboard rows, including escaped legacy names
//! - Level structure, settings edits and lazy equivalence
//! - Groups read as custom objects
//! - Truncated files and captured errors
//! - SKIP transform elements
//! - Autoload manifests

mod common;

use distance_parsers::{
    probe_file, CustomNameAttrs, CustomObject, DstBytes, DstFile, DstFormat, FileKind, GoldenSimplesAttrs,
    GroupAttrs, HumanReadable, Leaderboard, LeaderboardEntry, Level, LevelSettingsAttrs, Magic, Manifest,
    ReadOptions, Registry, Vec3,
};

use common::*;

mod leaderboard_tests {
    use super::*;

    #[test]
    fn test_rows() {
        let board = Leaderboard::from_bytes_with(leaderboard_bytes(), registry(), &ReadOptions::default()).unwrap();
        let entries = board.entries().unwrap();

        assert_eq!(entries.len(), 20);
        assert_eq!(entries[FERREUS_ROW].playername, "Ferreus");
        assert_eq!(entries[FERREUS_ROW].time, 86260);
        assert_eq!(entries[0].replay, Some(0x1100_0000_0000));
    }

    #[test]
    fn test_escaped_name() {
        let board = Leaderboard::from_bytes_with(leaderboard_bytes(), registry(), &ReadOptions::default()).unwrap();
        let name = &board.entries().unwrap()[ESCAPED_ROW].playername;

        assert_eq!(name.chars().count(), 18);
        assert!(name.starts_with(&"\u{7f}".repeat(9)));
        assert_eq!(*name, escaped_name());
    }

    #[test]
    fn test_untouched_roundtrip() {
        let bytes = leaderboard_bytes();
        let board = Leaderboard::from_bytes_with(bytes.clone(), registry(), &ReadOptions::strict()).unwrap();
        assert_eq!(board.to_bytes().unwrap(), bytes);
    }

    #[test]
    fn test_edit_rows() {
        let registry = registry();
        let mut board = Leaderboard::from_bytes_with(leaderboard_bytes(), registry.clone(), &ReadOptions::default())
            .unwrap();
        let mut entries = board.entries().unwrap();
        entries.truncate(3);
        entries.push(LeaderboardEntry {
            playername: "Newcomer".into(),
            time: 70000,
            replay: None,
        });
        board.set_entries(&entries).unwrap();

        let back = Leaderboard::from_bytes_with(board.to_bytes().unwrap(), registry, &ReadOptions::strict()).unwrap();
        let rows = back.entries().unwrap();
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[3].playername, "Newcomer");
        assert_eq!(rows[3].replay, Some(0));
    }

    #[test]
    fn test_probe() {
        let kind = probe_file(&DstBytes::new(leaderboard_bytes()), &registry()).unwrap();
        assert_eq!(kind, FileKind::Leaderboard);
    }
}

mod level_tests {
    use super::*;

    fn open() -> Level {
        Level::from_bytes_with(straightroad_bytes(), registry(), &ReadOptions::default()).unwrap()
    }

    #[test]
    fn test_structure() {
        let level = open();
        assert_eq!(level.name(), "Test-straightroad");
        assert_eq!(level.version(), 3);
        assert_eq!(level.layer_count(), 1);

        let layer = level.layer(0).unwrap();
        assert_eq!(layer.name(), "Default");
        let flags = layer.flags().unwrap();
        assert!(flags.is_active() && !flags.is_frozen() && flags.is_visible());
        assert_eq!(layer.objects().len(), 6);
        assert_eq!(layer.objects().last().unwrap().type_name(), "EmpireEndZone");
        assert_eq!(layer.objects().get(0).unwrap().class().name, "DstObject");
    }

    #[test]
    fn test_settings_rename() {
        let registry = registry();
        let mut level = open();
        let settings = level.settings_mut().unwrap();
        assert_eq!(settings.name().unwrap(), "Test-straightroad");
        settings.set_name("New".into()).unwrap();

        let level = Level::from_bytes_with(level.to_bytes().unwrap(), registry, &ReadOptions::strict()).unwrap();
        assert_eq!(level.settings().unwrap().name().unwrap(), "New");
        assert_eq!(level.layer(0).unwrap().objects().len(), 6);
    }

    #[test]
    fn test_untouched_roundtrip() {
        let bytes = straightroad_bytes();
        let level = Level::from_bytes_with(bytes.clone(), registry(), &ReadOptions::strict()).unwrap();
        assert_eq!(level.to_bytes().unwrap(), bytes);
    }

    #[test]
    fn test_lazy_equivalence() {
        let lazy = open();
        let direct = lazy.layer(0).unwrap().objects().get(3).unwrap().to_bytes().unwrap();

        let full = open();
        full.materialize_all();
        let indexed = full.layer(0).unwrap().objects().get(3).unwrap().to_bytes().unwrap();
        assert_eq!(direct, indexed);
    }

    #[test]
    fn test_only_touched_objects_are_read() {
        let level = open();
        let layer = level.layer(0).unwrap();
        assert!(layer.objects().get_cached(5).is_none());
        assert!(layer.objects().get(1).is_some());
        assert!(layer.objects().get_cached(5).is_none());
    }

    #[test]
    fn test_golden_simple_fields() {
        let level = open();
        let cube = level.layer(0).unwrap().objects().get(2).unwrap();
        assert_eq!(cube.type_name(), "CubeGS");
        assert_eq!(cube.image_index().unwrap(), 17);
        assert_eq!(cube.tex_scale().unwrap(), Vec3::ONE);
    }

    #[test]
    fn test_as_dst_file() {
        let file = DstFile::from_bytes_with(straightroad_bytes(), registry(), &ReadOptions::default()).unwrap();
        assert_eq!(file.kind(), FileKind::Level);
        let json = file.to_json();
        assert_eq!(json["name"], "Test-straightroad");
        assert_eq!(json["layers"][0]["objects"].as_array().unwrap().len(), 6);
    }
}

mod group_tests {
    use super::*;

    #[test]
    fn test_two_cubes() {
        let custom = CustomObject::from_bytes_with(two_cubes_bytes(), registry(), &ReadOptions::strict()).unwrap();
        let group = custom.object();

        assert_eq!(group.type_name(), "Group");
        assert_eq!(group.custom_name().unwrap(), "2cubes");
        assert_eq!(group.inspect_children().unwrap(), 0);
        assert_eq!(group.children().len(), 2);
        for child in group.children().iter() {
            assert_eq!(child.type_name(), "CubeGS");
        }
        let second = group.children().get(1).unwrap();
        assert_eq!(second.real_transform().pos, Some(Vec3::new(2.0, 0.0, 0.0)));
    }

    #[test]
    fn test_rename_roundtrip() {
        let registry = registry();
        let mut custom = CustomObject::from_bytes_with(two_cubes_bytes(), registry.clone(), &ReadOptions::default())
            .unwrap();
        custom.object_mut().set_custom_name("3cubes".into()).unwrap();
        let cube = registry.create_object("CubeGS").unwrap();
        custom.object_mut().children_mut().push(cube);

        let back = CustomObject::from_bytes_with(custom.to_bytes().unwrap(), registry, &ReadOptions::strict()).unwrap();
        assert_eq!(back.object().custom_name().unwrap(), "3cubes");
        assert_eq!(back.object().children().len(), 3);
    }

    #[test]
    fn test_untouched_roundtrip() {
        let bytes = two_cubes_bytes();
        let custom = CustomObject::from_bytes_with(bytes.clone(), registry(), &ReadOptions::default()).unwrap();
        assert_eq!(custom.to_bytes().unwrap(), bytes);
    }
}

mod truncated_tests {
    use super::*;

    #[test]
    fn test_cut_inside_last_object() {
        let level = Level::from_bytes_with(truncated_level_bytes(4), registry(), &ReadOptions::default()).unwrap();
        let layer = level.layer(0).unwrap();
        assert!(layer.sane_end_pos());
        assert!(layer.exception().is_none());
        assert!(level.settings().unwrap().sane_end_pos());
        let objects = layer.objects();

        assert_eq!(objects.len(), 4);
        for obj in objects.iter().take(3) {
            assert!(obj.exception().is_none());
            assert!(obj.sane_end_pos());
        }
        let last = objects.get(3).unwrap();
        assert!(last.exception().unwrap().is_short_read());
        assert!(level.check_exceptions().unwrap_err().is_short_read());
    }

    #[test]
    fn test_strict_read_fails() {
        let err = Level::from_bytes_with(truncated_level_bytes(4), registry(), &ReadOptions::strict()).unwrap_err();
        assert!(err.is_short_read());
    }

    #[test]
    fn test_cut_header() {
        let bytes = straightroad_bytes();
        let err = Level::from_bytes_with(bytes[..10].to_vec(), registry(), &ReadOptions::default()).unwrap_err();
        assert!(err.is_short_read());
    }
}

mod transform_tests {
    use super::*;

    #[test]
    fn test_skip_rotation() {
        let bytes = two_cubes_bytes();
        let custom = CustomObject::from_bytes_with(bytes.clone(), registry(), &ReadOptions::default()).unwrap();
        let t = custom.object().transform().unwrap();

        assert_eq!(t.pos, Some(Vec3::new(0.0, 5.0, 0.0)));
        assert!(t.rot.is_none());
        assert_eq!(t.scale, Some(Vec3::ONE));
        assert!(!t.is_effective());
        assert!(custom.object().real_transform().is_effective());
        assert_eq!(custom.to_bytes().unwrap(), bytes);
    }

    #[test]
    fn test_child_placement() {
        let custom = CustomObject::from_bytes_with(two_cubes_bytes(), registry(), &ReadOptions::default()).unwrap();
        let group = custom.object().real_transform();
        let cube = custom.object().children().get(0).unwrap().real_transform();

        let placed = group.apply(&cube).unwrap();
        assert_eq!(placed.pos, Some(Vec3::new(-2.0, 5.0, 0.0)));
    }
}

mod manifest_tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn test_manifest_file_roundtrip() {
        let eager = Registry::eager().unwrap().export_manifest();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("manifest.json");
        eager.save(&path).unwrap();

        let loaded = Manifest::load(&path).unwrap();
        assert_eq!(loaded, eager);
        assert!(loaded.check(&eager).is_empty());
    }

    #[test]
    fn test_stale_manifest_detected() {
        let eager = Registry::eager().unwrap().export_manifest();
        let mut stale = eager.clone();
        stale.keys.retain(|e| e.key.magic != Magic::M6);

        let problems = stale.check(&eager);
        assert!(!problems.is_empty());
        assert!(problems.iter().all(|p| p.starts_with("missing")));
    }

    #[test]
    fn test_autoload_reads_level() {
        let manifest = Registry::eager().unwrap().export_manifest();
        let registry = Arc::new(Registry::from_manifest(manifest).unwrap());
        assert!(registry.loaded_modules().is_empty());

        let bytes = straightroad_bytes();
        let level = Level::from_bytes_with(bytes.clone(), registry.clone(), &ReadOptions::strict()).unwrap();
        assert_eq!(level.layer(0).unwrap().objects().last().unwrap().type_name(), "EmpireEndZone");
        assert!(!registry.loaded_modules().is_empty());
        assert_eq!(level.to_bytes().unwrap(), bytes);
    }
}

mod file_tests {
    use super::*;

    #[test]
    fn test_save_and_open() {
        let registry = registry();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Test-straightroad.bytes");
        std::fs::write(&path, straightroad_bytes()).unwrap();

        let level = Level::open_with(&path, registry.clone(), &ReadOptions::default()).unwrap();
        let out = dir.path().join("copy.bytes");
        level.save(&out).unwrap();
        assert_eq!(std::fs::read(&out).unwrap(), straightroad_bytes());

        let mapped = ReadOptions {
            memory_mapping_threshold: 0,
            ..ReadOptions::default()
        };
        let file = DstFile::open_with(&out, registry, &mapped).unwrap();
        assert!(file.to_readable_string().contains("EmpireEndZone"));
    }
}
