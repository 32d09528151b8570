use std::{fs, path::Path, process::Command};

use tempfile::TempDir;

fn setupdeps() -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_setupdeps"));
    command
        .env_remove("SETUPDEPS_CONFIG")
        .env_remove("SETUPDEPS_SENTINEL")
        .env_remove("SETUPDEPS_AVAILABLE")
        .env_remove("RUST_LOG");
    command
}

fn write(dir: &Path, name: &str, contents: &str) -> String {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create fixture dir");
    }
    fs::write(&path, contents).expect("write fixture");
    path.to_string_lossy().into_owned()
}

#[test]
fn prints_one_specifier_per_line() {
    let dir = TempDir::new().expect("tempdir");
    let setup = write(
        dir.path(),
        "setup.py",
        "from setuptools import setup\nsetup(install_requires=['a>=1', 'b'])\n",
    );

    let output = setupdeps().arg(&setup).output().expect("run setupdeps");
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout), "a>=1\nb\n");
}

#[test]
fn json_report_per_descriptor() {
    let dir = TempDir::new().expect("tempdir");
    let first = write(dir.path(), "one/setup.py", "setup(install_requires=['x'])\n");
    let second = write(dir.path(), "two/setup.py", "print('no registration')\n");

    let output = setupdeps()
        .args(["--format", "json"])
        .arg(&first)
        .arg(&second)
        .output()
        .expect("run setupdeps");
    assert!(output.status.success());

    let reports: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("stdout is JSON");
    assert_eq!(
        reports,
        serde_json::json!([
            { "path": first, "install_requires": ["x"] },
            { "path": second, "install_requires": [] },
        ])
    );
}

#[test]
fn sentinel_from_flag_env_and_config() {
    let dir = TempDir::new().expect("tempdir");
    let setup = write(
        dir.path(),
        "setup.py",
        "import versioneer\nsetup(install_requires=['pkg==' + str(versioneer.get_version())])\n",
    );
    let config = write(dir.path(), "setupdeps.toml", "sentinel = \"FROM-CONFIG\"\n");

    let stdout = |command: &mut Command| {
        let output = command.output().expect("run setupdeps");
        assert!(output.status.success());
        String::from_utf8_lossy(&output.stdout).into_owned()
    };

    assert_eq!(stdout(setupdeps().arg(&setup)), "pkg==FIXME\n");
    assert_eq!(
        stdout(setupdeps().args(["--config", config.as_str()]).arg(&setup)),
        "pkg==FROM-CONFIG\n"
    );
    assert_eq!(
        stdout(
            setupdeps()
                .args(["--config", config.as_str()])
                .env("SETUPDEPS_SENTINEL", "FROM-ENV")
                .arg(&setup)
        ),
        "pkg==FROM-ENV\n"
    );
    assert_eq!(
        stdout(
            setupdeps()
                .env("SETUPDEPS_SENTINEL", "FROM-ENV")
                .args(["--sentinel", "FROM-FLAG"])
                .arg(&setup)
        ),
        "pkg==FROM-FLAG\n"
    );
}

#[test]
fn failures_set_the_exit_code() {
    let dir = TempDir::new().expect("tempdir");
    let good = write(dir.path(), "good/setup.py", "setup(install_requires=['ok'])\n");
    let bad = write(dir.path(), "bad/setup.py", "import sys\nsys.exit(2)\n");
    let missing = dir.path().join("missing/setup.py");

    let output = setupdeps()
        .arg(&good)
        .arg(&bad)
        .arg(&missing)
        .output()
        .expect("run setupdeps");
    assert!(!output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout), "ok\n");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("SystemExit: 2"), "{stderr}");
    assert!(stderr.contains("could not read"), "{stderr}");
}

#[test]
fn invalid_config_is_reported() {
    let dir = TempDir::new().expect("tempdir");
    let setup = write(dir.path(), "setup.py", "setup(install_requires=['a'])\n");
    let config = write(dir.path(), "bad.toml", "recursion_limit = \"deep\"\n");

    let output = setupdeps()
        .args(["--config", config.as_str()])
        .arg(&setup)
        .output()
        .expect("run setupdeps");
    assert!(!output.status.success());
    assert!(output.stdout.is_empty());
    assert!(String::from_utf8_lossy(&output.stderr).starts_with("Error:"));
}
