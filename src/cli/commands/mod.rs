pub mod check;
pub mod run;

use modernize_attrs::FileReport;

/// One line per diagnostic, prefixed by the file it belongs to.
pub fn print_diagnostics(file: &FileReport) {
    for diagnostic in &file.diagnostics {
        println!("{}: {}", file.path.display(), diagnostic);
    }
}
