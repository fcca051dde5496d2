use deskdriver::config::DriverConfig;
use deskdriver::{CopiedFiles, RecoveryCleaner};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn touch(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, b"stale").unwrap();
    path
}

fn spreadsheet_cleaner(recovery: &Path, desktop: &Path) -> RecoveryCleaner {
    let recovery_config = DriverConfig::spreadsheet().app.recovery;
    RecoveryCleaner::new(vec![recovery.to_path_buf()], recovery_config.patterns)
        .with_desktop(desktop.to_path_buf(), recovery_config.desktop_patterns)
}

#[test]
fn test_removes_matching_artifacts_and_keeps_the_rest() {
    let recovery = TempDir::new().unwrap();
    let desktop = TempDir::new().unwrap();

    let autosave = touch(recovery.path(), "Book1.xlsx~RF1a2b.TMP");
    let recovered = touch(recovery.path(), "Budget [Recovered].xlsx");
    let lock = touch(recovery.path(), "~$Budget.xlsx");
    let desktop_lock = touch(desktop.path(), "~$Report.xlsx");
    let unrelated = touch(recovery.path(), "notes.txt");
    let desktop_doc = touch(desktop.path(), "Report.xlsx");
    let lookalike = touch(recovery.path(), "decode.log");

    let report = spreadsheet_cleaner(recovery.path(), desktop.path()).cleanup(&CopiedFiles::new());

    for removed in [&autosave, &recovered, &lock, &desktop_lock] {
        assert!(!removed.exists(), "{} should be gone", removed.display());
    }
    for kept in [&unrelated, &desktop_doc, &lookalike] {
        assert!(kept.exists(), "{} should be kept", kept.display());
    }
    assert_eq!(report.removed.len(), 4);
    assert!(report.failed.is_empty());
}

#[test]
fn test_registered_files_are_never_deleted() {
    let recovery = TempDir::new().unwrap();
    let desktop = TempDir::new().unwrap();
    let mine = touch(desktop.path(), "~$Fixture.xlsx");
    let stale = touch(desktop.path(), "~$Other.xlsx");

    let copied = CopiedFiles::new();
    copied.register(&mine);

    let report = spreadsheet_cleaner(recovery.path(), desktop.path()).cleanup(&copied);

    assert!(mine.exists());
    assert!(!stale.exists());
    assert_eq!(report.skipped, vec![mine.clone()]);
    assert_eq!(report.removed, vec![stale]);

    // Forgetting the registration makes it ordinary debris again.
    copied.clear();
    let report = spreadsheet_cleaner(recovery.path(), desktop.path()).cleanup(&copied);
    assert!(!mine.exists());
    assert_eq!(report.removed, vec![mine]);
}

#[test]
fn test_exclusion_set_is_shared_between_clones() {
    let desktop = TempDir::new().unwrap();
    let mine = touch(desktop.path(), "~$Shared.xlsx");

    let copied = CopiedFiles::new();
    let handle = copied.clone();
    handle.register(&mine);

    assert!(copied.contains(&mine));
    RecoveryCleaner::new(vec![], vec![])
        .with_desktop(desktop.path().to_path_buf(), vec!["*~$*.xlsx".to_string()])
        .cleanup(&copied);
    assert!(mine.exists());
}

#[test]
fn test_second_sweep_is_a_no_op() {
    let recovery = TempDir::new().unwrap();
    let desktop = TempDir::new().unwrap();
    touch(recovery.path(), "Book1.xls~1");
    let cleaner = spreadsheet_cleaner(recovery.path(), desktop.path());

    assert_eq!(cleaner.cleanup(&CopiedFiles::new()).removed.len(), 1);
    let again = cleaner.cleanup(&CopiedFiles::new());
    assert!(again.removed.is_empty());
    assert!(again.failed.is_empty());
}

#[test]
fn test_file_matching_several_patterns_is_handled_once() {
    let recovery = TempDir::new().unwrap();
    // Matches both "*.xlsx~*" and "*[Recovered]*".
    touch(recovery.path(), "Plan [Recovered].xlsx~1");
    let cleaner = RecoveryCleaner::new(
        vec![recovery.path().to_path_buf()],
        DriverConfig::spreadsheet().app.recovery.patterns,
    );

    let report = cleaner.cleanup(&CopiedFiles::new());

    assert_eq!(report.removed.len(), 1);
    assert!(report.failed.is_empty());
}

#[test]
fn test_missing_directories_are_skipped() {
    let root = TempDir::new().unwrap();
    let cleaner = RecoveryCleaner::new(
        vec![root.path().join("does-not-exist")],
        vec!["*".to_string()],
    )
    .with_desktop(root.path().join("nor-this"), vec!["*".to_string()]);

    let report = cleaner.cleanup(&CopiedFiles::new());

    assert_eq!(report, Default::default());
}

#[test]
fn test_directories_matching_a_pattern_are_left_alone() {
    let recovery = TempDir::new().unwrap();
    fs::create_dir(recovery.path().join("Old [Recovered]")).unwrap();
    let cleaner = RecoveryCleaner::new(
        vec![recovery.path().to_path_buf()],
        vec!["*[[]Recovered[]]*".to_string()],
    );

    let report = cleaner.cleanup(&CopiedFiles::new());

    assert!(report.removed.is_empty());
    assert!(recovery.path().join("Old [Recovered]").is_dir());
}

#[test]
fn test_relative_registration_before_file_exists_is_honored() {
    let desktop = TempDir::new().unwrap();
    let previous = std::env::current_dir().unwrap();
    std::env::set_current_dir(desktop.path()).unwrap();

    let copied = CopiedFiles::new();
    copied.register("~$Fixture.xlsx");
    let mine = touch(desktop.path(), "~$Fixture.xlsx");
    let report = RecoveryCleaner::new(vec![], vec![])
        .with_desktop(desktop.path().to_path_buf(), vec!["*~$*.xlsx".to_string()])
        .cleanup(&copied);

    std::env::set_current_dir(previous).unwrap();
    assert!(mine.exists(), "registered file was deleted");
    assert!(report.removed.is_empty());
    assert_eq!(report.skipped.len(), 1);
    assert!(copied.contains(&mine));
}

#[test]
fn test_registration_through_dot_components_matches() {
    let desktop = TempDir::new().unwrap();
    let mine = touch(desktop.path(), "~$Dotted.xlsx");

    let copied = CopiedFiles::new();
    copied.register(desktop.path().join(".").join("~$Dotted.xlsx"));
    RecoveryCleaner::new(vec![], vec![])
        .with_desktop(desktop.path().to_path_buf(), vec!["*~$*.xlsx".to_string()])
        .cleanup(&copied);

    assert!(mine.exists());
}

fn refuse_locked(path: &Path) -> std::io::Result<()> {
    let locked = path
        .file_name()
        .is_some_and(|name| name.to_string_lossy().contains("locked"));
    if locked {
        Err(std::io::Error::new(
            std::io::ErrorKind::PermissionDenied,
            "file is in use",
        ))
    } else {
        fs::remove_file(path)
    }
}

#[test]
fn test_undeletable_file_is_reported_and_sweep_continues() {
    let desktop = TempDir::new().unwrap();
    let first = touch(desktop.path(), "~$a.xlsx");
    let locked = touch(desktop.path(), "~$locked.xlsx");
    let last = touch(desktop.path(), "~$z.xlsx");

    let report = RecoveryCleaner::new(vec![], vec![])
        .with_desktop(desktop.path().to_path_buf(), vec!["*~$*.xlsx".to_string()])
        .with_remover(refuse_locked)
        .cleanup(&CopiedFiles::new());

    assert_eq!(report.failed, vec![locked.clone()]);
    assert!(locked.exists());
    assert!(!first.exists());
    assert!(!last.exists());
    assert_eq!(report.removed.len(), 2);
}
