#![cfg(unix)]

use assert_cmd::Command;
use std::env;
use std::error::Error;
use std::ffi::OsString;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tempfile::{tempdir, TempDir};

// Stand-ins for the real programs: "decoding" and "encoding" copy bytes
// through the pipe, lame fails for destinations containing "broken".
const STUBS: &[(&str, &str)] = &[
    (
        "flac",
        "#!/bin/sh\n[ \"$1\" = \"--version\" ] && exit 0\nfor last; do :; done\ncat \"$last\"\n",
    ),
    (
        "lame",
        "#!/bin/sh\n[ \"$1\" = \"--version\" ] && exit 0\nfor last; do :; done\n\
         case \"$last\" in *broken*) cat >/dev/null; echo \"lame: forced failure\" >&2; exit 1;; esac\n\
         cat > \"$last\"\n",
    ),
    (
        "metaflac",
        "#!/bin/sh\n[ \"$1\" = \"--version\" ] && exit 0\necho \"    comment[0]: TITLE=Stub\"\n",
    ),
    (
        "id3v2",
        "#!/bin/sh\n[ \"$1\" = \"--version\" ] && exit 0\nexit 0\n",
    ),
];

/// Directory holding the stub programs, written once for the whole test
/// binary.
fn stub_dir() -> &'static Path {
    static DIR: OnceLock<TempDir> = OnceLock::new();
    DIR.get_or_init(|| {
        let dir = tempdir().expect("stub dir");
        for (name, body) in STUBS {
            let path = dir.path().join(name);
            fs::write(&path, body).expect("write stub");
            fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).expect("chmod stub");
        }
        dir
    })
    .path()
}

fn stub_path() -> OsString {
    let mut paths = vec![stub_dir().to_path_buf()];
    if let Some(path) = env::var_os("PATH") {
        paths.extend(env::split_paths(&path));
    }
    env::join_paths(paths).expect("valid PATH")
}

fn flac2mp3() -> Result<Command, Box<dyn Error>> {
    let mut cmd = Command::cargo_bin("flac2mp3")?;
    cmd.env("PATH", stub_path()).env_remove("RUST_LOG");
    Ok(cmd)
}

fn write_album(base: &Path, names: &[&str]) -> Result<PathBuf, Box<dyn Error>> {
    let album = base.join("album");
    for (i, name) in names.iter().enumerate() {
        let disc = if i % 2 == 0 { "disc1" } else { "disc2" };
        let path = album.join(disc).join(format!("{name}.flac"));
        fs::create_dir_all(path.parent().unwrap())?;
        fs::write(&path, format!("audio for {name}"))?;
    }
    Ok(album)
}

#[test]
fn cli_reports_one_failure_among_ten_files() -> Result<(), Box<dyn Error>> {
    let input_dir = tempdir()?;
    let output_dir = tempdir()?;
    let names = [
        "t01", "t02", "t03", "t04", "broken05", "t06", "t07", "t08", "t09", "t10",
    ];
    let album = write_album(input_dir.path(), &names)?;

    let assert = flac2mp3()?
        .arg("-o")
        .arg(output_dir.path())
        .args(["-j", "3"])
        .arg(&album)
        .assert()
        .code(4);

    let stdout = String::from_utf8(assert.get_output().stdout.clone())?;
    assert!(stdout.contains("Total files processed: 10"), "{stdout}");
    assert!(stdout.contains("Succeeded: 9"), "{stdout}");
    assert!(stdout.contains("Failed: 1"), "{stdout}");
    assert!(stdout.contains("broken05.flac: encode step exited with"));
    assert!(stdout.contains("lame: forced failure"));

    assert_eq!(
        fs::read_to_string(output_dir.path().join("disc1/t01.mp3"))?,
        "audio for t01"
    );
    assert!(output_dir.path().join("disc2/t10.mp3").exists());
    Ok(())
}

#[test]
fn cli_skips_existing_outputs_without_overwrite() -> Result<(), Box<dyn Error>> {
    let input_dir = tempdir()?;
    let output_dir = tempdir()?;
    let album = write_album(input_dir.path(), &["a", "b"])?;

    flac2mp3()?
        .arg("-o")
        .arg(output_dir.path())
        .arg(&album)
        .assert()
        .success();

    let existing = output_dir.path().join("disc1/a.mp3");
    fs::write(&existing, "hand edited")?;

    let assert = flac2mp3()?
        .arg("-o")
        .arg(output_dir.path())
        .arg(&album)
        .assert()
        .success();
    let stdout = String::from_utf8(assert.get_output().stdout.clone())?;
    assert!(stdout.contains("Skipped: 2"), "{stdout}");
    assert_eq!(fs::read_to_string(&existing)?, "hand edited");

    flac2mp3()?
        .arg("-o")
        .arg(output_dir.path())
        .arg("--overwrite")
        .arg(&album)
        .assert()
        .success();
    assert_eq!(fs::read_to_string(&existing)?, "audio for a");
    Ok(())
}

#[test]
fn cli_writes_next_to_sources_without_output_dir() -> Result<(), Box<dyn Error>> {
    let input_dir = tempdir()?;
    let album = write_album(input_dir.path(), &["solo"])?;

    flac2mp3()?.arg(&album).assert().success();

    assert!(album.join("disc1/solo.mp3").exists());
    assert!(album.join("disc1/solo.flac").exists());
    Ok(())
}

#[test]
fn cli_copies_files_matching_pattern() -> Result<(), Box<dyn Error>> {
    let input_dir = tempdir()?;
    let output_dir = tempdir()?;
    let album = write_album(input_dir.path(), &["a"])?;
    fs::write(album.join("cover.jpg"), "jpeg")?;
    fs::write(album.join("rip.log"), "log")?;

    flac2mp3()?
        .arg("-o")
        .arg(output_dir.path())
        .args(["-c", r"\.jpg$"])
        .arg(&album)
        .assert()
        .success();

    assert_eq!(fs::read_to_string(output_dir.path().join("cover.jpg"))?, "jpeg");
    assert!(!output_dir.path().join("rip.log").exists());
    Ok(())
}

#[test]
fn cli_never_copies_a_file_onto_itself() -> Result<(), Box<dyn Error>> {
    let input_dir = tempdir()?;
    let album = write_album(input_dir.path(), &["a", "b"])?;
    fs::write(album.join("cover.jpg"), "jpeg")?;

    flac2mp3()?
        .arg("-o")
        .arg(&album)
        .arg("--overwrite")
        .args(["-c", r"\.jpg$"])
        .arg(&album)
        .assert()
        .success();

    assert_eq!(fs::read_to_string(album.join("cover.jpg"))?, "jpeg");
    assert!(album.join("disc1/a.mp3").exists());
    Ok(())
}

#[test]
fn cli_appends_to_log_file_when_quiet() -> Result<(), Box<dyn Error>> {
    let input_dir = tempdir()?;
    let log_dir = tempdir()?;
    let album = write_album(input_dir.path(), &["good", "broken"])?;
    let log_file = log_dir.path().join("run.log");
    fs::write(&log_file, "earlier run\n")?;

    let assert = flac2mp3()?
        .arg("-q")
        .arg("-l")
        .arg(&log_file)
        .arg(&album)
        .assert()
        .code(4);
    assert!(assert.get_output().stdout.is_empty());
    assert!(assert.get_output().stderr.is_empty());

    let log = fs::read_to_string(&log_file)?;
    assert!(log.starts_with("earlier run\n"));
    assert!(log.contains("Transcoded 'good.flac'"), "{log}");
    assert!(log.contains("Failed to transcode 'broken.flac'"), "{log}");
    Ok(())
}

#[test]
fn cli_requires_external_programs() -> Result<(), Box<dyn Error>> {
    let input_dir = tempdir()?;
    let empty_bin = tempdir()?;
    let album = write_album(input_dir.path(), &["a"])?;

    let assert = Command::cargo_bin("flac2mp3")?
        .env("PATH", empty_bin.path())
        .arg(&album)
        .assert()
        .code(1);

    let stderr = String::from_utf8(assert.get_output().stderr.clone())?;
    assert!(stderr.contains("The following programs are required"), "{stderr}");
    assert!(stderr.contains("lame"));
    Ok(())
}

#[test]
fn cli_logs_fatal_errors_to_log_file() -> Result<(), Box<dyn Error>> {
    let input_dir = tempdir()?;
    let empty_bin = tempdir()?;
    let log_dir = tempdir()?;
    let album = write_album(input_dir.path(), &["a"])?;
    let log_file = log_dir.path().join("run.log");

    let assert = Command::cargo_bin("flac2mp3")?
        .env("PATH", empty_bin.path())
        .env_remove("RUST_LOG")
        .arg("-q")
        .arg("-l")
        .arg(&log_file)
        .arg(&album)
        .assert()
        .code(1);
    assert!(assert.get_output().stderr.is_empty());

    let log = fs::read_to_string(&log_file)?;
    assert!(log.contains("ERROR"), "{log}");
    assert!(log.contains("The following programs are required"), "{log}");
    Ok(())
}

#[test]
fn cli_requires_input_paths() -> Result<(), Box<dyn Error>> {
    flac2mp3()?.assert().code(2);
    Ok(())
}
