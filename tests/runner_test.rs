mod common;

use common::{TestProject, source};
use modernize_attrs::config::DiscoveryConfig;
use modernize_attrs::{FileDiscovery, FileStatus, Result, RunOptions, run_batch};

const LEGACY: &str = r#"
import attr

@attr.s
class Point:
    x = attr.ib(type=int)
    y = attr.ib(type=int, default=0)
"#;

const MIGRATED: &str = r#"
from attrs import define

@define
class Point:
    x: int
    y: int = 0
"#;

const UNTYPED: &str = r#"
import attr

@attr.s
class Loose:
    x = attr.ib()
"#;

fn project() -> Result<TestProject> {
    let project = TestProject::new()?;
    project.add_file("pkg/__init__.py", "")?;
    project.add_file("pkg/point.py", &source(LEGACY))?;
    project.add_file("pkg/loose.py", &source(UNTYPED))?;
    project.add_file("pkg/broken.py", "class Broken(:\n")?;
    project.add_file("pkg/.venv/vendored.py", &source(LEGACY))?;
    project.add_file("README.md", "# not python\n")?;
    Ok(project)
}

fn discover(project: &TestProject) -> Result<Vec<std::path::PathBuf>> {
    FileDiscovery::new(&DiscoveryConfig::default())?.discover(&[project.root()])
}

#[test]
fn test_batch_rewrites_and_reports_each_file() -> Result<()> {
    let project = project()?;
    let files = discover(&project)?;
    assert_eq!(files.len(), 4);

    let report = run_batch(&files, RunOptions { jobs: 2, dry_run: false })?;

    assert_eq!(report.total(), 4);
    assert_eq!(report.successes(), 3);
    assert_eq!(report.failures(), 1);
    assert_eq!(report.diagnostics(), 1);

    let changed: Vec<_> = report.changed().map(|file| file.path.clone()).collect();
    assert_eq!(changed, vec![project.root().join("pkg/point.py")]);

    assert_eq!(project.read("pkg/point.py")?, source(MIGRATED));
    assert_eq!(project.read("pkg/loose.py")?, source(UNTYPED));
    assert_eq!(project.read("pkg/.venv/vendored.py")?, source(LEGACY));
    Ok(())
}

#[test]
fn test_report_keeps_input_order() -> Result<()> {
    let project = project()?;
    let files = discover(&project)?;

    let report = run_batch(&files, RunOptions { jobs: 4, dry_run: true })?;
    let reported: Vec<_> = report.files.iter().map(|file| file.path.clone()).collect();

    assert_eq!(reported, files);
    Ok(())
}

#[test]
fn test_dry_run_writes_nothing() -> Result<()> {
    let project = project()?;
    let files = discover(&project)?;

    let report = run_batch(&files, RunOptions { jobs: 1, dry_run: true })?;

    assert!(report.dry_run);
    assert_eq!(report.changed().count(), 1);
    assert_eq!(project.read("pkg/point.py")?, source(LEGACY));
    Ok(())
}

#[test]
fn test_second_run_changes_nothing() -> Result<()> {
    let project = project()?;
    let files = discover(&project)?;

    run_batch(&files, RunOptions::default())?;
    let report = run_batch(&files, RunOptions::default())?;

    assert_eq!(report.changed().count(), 0);
    let broken = report
        .files
        .iter()
        .find(|file| file.path.ends_with("broken.py"))
        .map(|file| &file.status);
    assert!(matches!(broken, Some(FileStatus::Failed { .. })));
    Ok(())
}

#[test]
fn test_json_report_shape() -> Result<()> {
    let project = project()?;
    let files = discover(&project)?;

    let report = run_batch(&files, RunOptions { jobs: 1, dry_run: true })?;
    let json = serde_json::to_value(&report)?;

    assert_eq!(json["dry_run"], true);
    let entries = json["files"].as_array().map(Vec::len);
    assert_eq!(entries, Some(4));
    let loose = json["files"]
        .as_array()
        .and_then(|files| files.iter().find(|file| file["path"].as_str().is_some_and(|p| p.ends_with("loose.py"))))
        .cloned()
        .unwrap_or_default();
    assert_eq!(loose["status"], "unchanged");
    assert_eq!(loose["diagnostics"][0]["kind"], "unsafe_class");
    assert_eq!(loose["diagnostics"][0]["class_name"], "Loose");
    Ok(())
}
