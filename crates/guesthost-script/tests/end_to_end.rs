//! Full stack against a real interpreter: venv, subprocess bridge, calls.
//! Skips when the host has no usable python3 (or no venv module).

use std::path::Path;

use guesthost_env::interpreter::discover_interpreter;
use guesthost_script::{GuestValue, InvocationError, ScriptHost, ScriptHostError, ScriptHostOptions};

const TYPE_PASSING: &str = r#"
import sys

def simple(greeting, n):
    print("called with", greeting, n)
    return greeting + " " + str(n)

def shapes():
    return {"i": 2 ** 70, "b": b"\x00\x01", "s": {1, 2}, "l": (1, 2.5, None, True)}

def boom():
    raise ValueError("bad input")
"#;

fn host_or_skip(scripts: &Path, work: &Path, entry_point: &str) -> Option<ScriptHost> {
    let Ok(python) = discover_interpreter() else {
        eprintln!("skipping: no python interpreter on PATH");
        return None;
    };
    let opts = ScriptHostOptions {
        working_dir: Some(work.to_path_buf()),
        base_interpreter: Some(python),
        ..Default::default()
    };
    match ScriptHost::build(scripts, entry_point, &opts) {
        Ok(h) => Some(h),
        Err(ScriptHostError::Provisioning(e)) => {
            eprintln!("skipping: cannot provision environment: {}", e);
            None
        }
        Err(e) => panic!("unexpected build failure: {e}"),
    }
}

#[test]
fn test_simple_call_round_trip() {
    let scripts = tempfile::tempdir().unwrap();
    let work = tempfile::tempdir().unwrap();
    std::fs::write(scripts.path().join("type_passing.py"), TYPE_PASSING).unwrap();

    let Some(mut host) = host_or_skip(scripts.path(), work.path(), "type_passing.simple") else {
        return;
    };

    let out = host
        .call_entry_point(&["Bonjour".into(), GuestValue::Int(123)])
        .unwrap();
    assert_eq!(out, GuestValue::Str("Bonjour 123".into()));

    let shapes = host.call_named("shapes", &[]).unwrap();
    assert_eq!(shapes.get("i"), Some(&GuestValue::Str((1u128 << 70).to_string())));
    assert_eq!(shapes.get("b"), Some(&GuestValue::Bytes(vec![0, 1])));
    assert_eq!(shapes.get("s").map(GuestValue::native_type_name), Some("str"));
    assert_eq!(
        shapes.get("l"),
        Some(&GuestValue::List(vec![
            GuestValue::Int(1),
            GuestValue::Float(2.5),
            GuestValue::None,
            GuestValue::Bool(true),
        ]))
    );

    match host.call_named("boom", &[]) {
        Err(InvocationError::GuestRaised { kind, message, traceback }) => {
            assert_eq!(kind, "ValueError");
            assert_eq!(message, "bad input");
            assert!(traceback.unwrap_or_default().contains("boom"));
        }
        other => panic!("expected a guest exception, got {other:?}"),
    }

    // the runtime survives a guest exception
    host.execute("import json").unwrap();
    let again = host
        .call_entry_point(&["Hi".into(), GuestValue::Int(-1)])
        .unwrap();
    assert_eq!(again, GuestValue::Str("Hi -1".into()));

    let env = host.into_environment();
    let root = env.root().to_path_buf();
    assert!(root.exists());
    env.remove().unwrap();
    assert!(!root.exists());
}
