use process_helper::{run, Options};
use std::error::Error as _;
use tempfile::TempDir;

#[test]
fn test_empty_command() {
    let err = run("", &Options::new()).unwrap_err();
    assert!(err.is_empty_command_error());
    assert_eq!(err.to_string(), "command must not be empty");
    assert!(err.source().is_none());
}

#[test]
fn test_conflicting_options() {
    let opts = Options {
        puts_output: Some(true),
        puts_output_only_on_exception: true,
        ..Default::default()
    };
    let err = run("true", &opts).unwrap_err();
    assert!(err.is_conflicting_options_error());
    assert_eq!(
        err.to_string(),
        "'puts_output' and 'puts_output_only_on_exception' options cannot \
         both be true"
    );
}

#[test]
fn test_validation_spawns_nothing() {
    let tmpdir = TempDir::new().unwrap();
    let marker = tmpdir.path().join("marker");
    let cmd = format!("touch '{}'", marker.display());

    let opts = Options {
        puts_output: Some(true),
        puts_output_only_on_exception: true,
        ..Default::default()
    };
    assert!(run(&cmd, &opts).unwrap_err().is_conflicting_options_error());
    assert!(!marker.exists());

    // Sanity check that the command would have created the file
    let mut quiet = Options::new();
    quiet.suppress_output();
    run(&cmd, &quiet).unwrap();
    assert!(marker.exists());
}

#[test]
fn test_missing_program_is_exit_error() {
    // The shell itself launches fine and reports 127
    let mut opts = Options::new();
    opts.suppress_output();
    let err = run("this-program-does-not-exist-1234", &opts).unwrap_err();
    assert!(err.is_exit_error());
    assert!(!err.is_launch_error());
    assert!(err.to_string().starts_with("Command failed"));
}
