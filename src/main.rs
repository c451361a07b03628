use std::path::{Path, PathBuf};
use std::process::ExitCode;

use scanbind::config::Project;
use scanbind::maker::djvu::{DjvuBackend, DjvuToolchain};
use scanbind::pipeline::coordinator::DocumentConverter;
use scanbind::pipeline::default_worker_count;
use scanbind::source::FileImageSource;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();

    if args.is_empty() || args.iter().any(|a| a == "--help" || a == "-h") {
        eprintln!("Usage: scanbind <project.yaml>...");
        eprintln!("  Convert scanned page images into DjVu documents.");
        return if args.is_empty() {
            ExitCode::FAILURE
        } else {
            ExitCode::SUCCESS
        };
    }

    if args.iter().any(|a| a == "--version" || a == "-V") {
        eprintln!("scanbind {}", env!("CARGO_PKG_VERSION"));
        return ExitCode::SUCCESS;
    }

    let mut has_error = false;
    for project_arg in &args {
        let project_path = Path::new(project_arg);

        let project = match Project::from_file(project_path) {
            Ok(p) => p,
            Err(e) => {
                eprintln!("ERROR: Failed to load project {project_arg}: {e}");
                has_error = true;
                continue;
            }
        };

        // Relative paths in the project file resolve against its directory.
        let project_dir = project_path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .to_path_buf();
        let output = resolve_path(&project_dir, &project.output);

        let document_flags = project.document_flags();
        let backend = match DjvuBackend::new(&output, &document_flags, DjvuToolchain::default()) {
            Ok(b) => b,
            Err(e) => {
                eprintln!("ERROR: Failed to prepare {project_arg}: {e}");
                has_error = true;
                continue;
            }
        };

        let mut converter = DocumentConverter::new(backend, document_flags);
        for page in &project.pages {
            let image = resolve_path(&project_dir, &page.image);
            converter.add_page(Box::new(FileImageSource::new(image)), project.page_flags(page));
        }

        let workers = if project.workers == 0 {
            default_worker_count()
        } else {
            project.workers
        };

        match converter.run(workers) {
            Ok(report) if report.status.is_ok() => {
                eprintln!(
                    "OK: {project_arg} -> {} ({} pages)",
                    output.display(),
                    report.pages_done
                );
            }
            Ok(report) => {
                eprintln!(
                    "ERROR: {project_arg} -> {}: {} ({} pages merged)",
                    output.display(),
                    report.status.message(),
                    report.pages_done
                );
                has_error = true;
            }
            Err(e) => {
                eprintln!("ERROR: {project_arg} -> {}: {e}", output.display());
                has_error = true;
            }
        }
    }

    if has_error {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

/// Resolve a potentially relative path against a base directory.
/// If the path is already absolute, return it as-is.
fn resolve_path(base_dir: &Path, path: &str) -> PathBuf {
    let p = Path::new(path);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        base_dir.join(p)
    }
}
