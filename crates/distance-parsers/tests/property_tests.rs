//! Property tests over whole files

mod common;

use distance_parsers::{DstFormat, Leaderboard, LeaderboardEntry, Level, ReadOptions};
use proptest::prelude::*;

use common::*;

fn entry() -> impl Strategy<Value = LeaderboardEntry> {
    ("\\PC{0,24}", any::<i32>(), any::<u64>()).prop_map(|(playername, time, replay)| LeaderboardEntry {
        playername,
        time,
        replay: Some(replay),
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_leaderboard_entries_roundtrip(entries in prop::collection::vec(entry(), 0..24)) {
        let registry = registry();
        let mut board = Leaderboard::new(registry.clone()).unwrap();
        board.set_entries(&entries).unwrap();

        let bytes = board.to_bytes().unwrap();
        let back = Leaderboard::from_bytes_with(bytes.clone(), registry, &ReadOptions::strict()).unwrap();
        prop_assert_eq!(back.entries().unwrap(), entries);
        prop_assert_eq!(back.to_bytes().unwrap(), bytes);
    }

    #[test]
    fn prop_truncated_level_never_panics(cut in 0usize..1000) {
        let bytes = straightroad_bytes();
        let cut = cut.min(bytes.len() - 1);
        let registry = registry();

        if let Ok(level) = Level::from_bytes_with(bytes[..cut].to_vec(), registry, &ReadOptions::default()) {
            level.materialize_all();
            prop_assert!(level.check_exceptions().is_err());
        }
    }
}
