// tests/property_env_overlay.rs
mod common;
use crate::common::builders::{ScriptConfigBuilder, TaskConfigBuilder};

use std::path::Path;

use proptest::prelude::*;

use taskvisor::exec::{EnvOverlay, color_for};

fn env_pairs() -> impl Strategy<Value = Vec<(String, String)>> {
    prop::collection::vec(("[A-D]", "[a-z]{0,4}"), 0..8)
}

proptest! {
    #[test]
    fn later_layers_win(task_envs in env_pairs(), script_envs in env_pairs()) {
        let mut task = TaskConfigBuilder::new("t");
        for (k, v) in task_envs.iter() {
            task = task.env(k, v);
        }
        let mut script = ScriptConfigBuilder::new("s", "/bin/true");
        for (k, v) in script_envs.iter() {
            script = script.env(k, v);
        }

        let overlay = EnvOverlay::for_task(&task.build(), Path::new("/"))
            .expect("no env file to read")
            .with_script(&script.build());

        for key in ["A", "B", "C", "D"] {
            let from_script = script_envs.iter().rev().find(|(k, _)| k == key);
            let from_task = task_envs.iter().rev().find(|(k, _)| k == key);
            let want = from_script.or(from_task).map(|(_, v)| v.as_str());

            prop_assert_eq!(overlay.get(key), want);
            prop_assert_eq!(overlay.resolved().get(key).copied(), want);
        }
    }

    #[test]
    fn colors_cycle_every_seven_launches(index in 0usize..10_000) {
        prop_assert_eq!(color_for(index), color_for(index + 7));
        prop_assert_eq!(color_for(index), color_for(index % 7));
    }
}

#[test]
fn first_six_colors_are_distinct() {
    let colors: Vec<_> = (0..7).map(color_for).collect();
    for i in 0..6 {
        for j in (i + 1)..6 {
            assert_ne!(colors[i], colors[j]);
        }
    }
    assert_eq!(colors[6], colors[0]);
}
