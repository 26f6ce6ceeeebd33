//! Command-line interface for codestrata.

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::analysis::{is_recognized_extension, SourceFile};
use crate::config::Config;
use crate::detect::Severity;
use crate::pipeline::Engine;
use crate::report::{self, Format};
use crate::security::VulnSeverity;
use crate::Result;

/// Exit codes.
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILED: i32 = 1;
pub const EXIT_ERROR: i32 = 2;

/// Directory names never descended into.
const SKIPPED_DIRS: &[&str] = &[
    "node_modules",
    "target",
    "vendor",
    "dist",
    "build",
    ".git",
    "__pycache__",
];

/// Multi-language static analysis - hierarchical code graphs, quality issues
/// and security findings.
#[derive(Parser)]
#[command(name = "codestrata")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Debug logging on stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Errors only on stderr, no progress bar
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build the code graph and report quality issues
    Analyze(AnalyzeArgs),
    /// Run the security scanner only
    Scan(ScanArgs),
}

/// Arguments for the analyze command.
#[derive(Parser)]
pub struct AnalyzeArgs {
    /// Path to analyze (file or directory)
    pub path: PathBuf,

    /// Path to a configuration file (default: auto-discover)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Output format: pretty or json
    #[arg(short, long, default_value = "pretty")]
    pub format: Format,

    /// Skip the security scan
    #[arg(long)]
    pub no_security: bool,

    /// Exit 1 when an issue (error|warning|info) or vulnerability
    /// (critical|high|medium|low) at or above this severity is found
    #[arg(long)]
    pub fail_on: Option<FailOn>,
}

/// Arguments for the scan command.
#[derive(Parser)]
pub struct ScanArgs {
    /// Path to scan (file or directory)
    pub path: PathBuf,

    /// Path to a configuration file (default: auto-discover)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Output format: pretty, json, or sarif
    #[arg(short, long, default_value = "pretty")]
    pub format: Format,

    /// Exit 1 when a vulnerability at or above this severity is found
    #[arg(long)]
    pub fail_on: Option<VulnSeverity>,
}

/// Severity gate for `analyze`. Issue severities are tried first, so `info`
/// means any issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailOn {
    Issue(Severity),
    Vulnerability(VulnSeverity),
}

impl std::str::FromStr for FailOn {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        if let Ok(severity) = s.parse::<Severity>() {
            return Ok(FailOn::Issue(severity));
        }
        s.parse::<VulnSeverity>()
            .map(FailOn::Vulnerability)
            .map_err(|_| format!("unknown severity: {}", s))
    }
}

/// Convert a path below `root` to a `/`-separated relative string.
fn relative_path(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn is_hidden(name: &str) -> bool {
    name.starts_with('.') && name != "." && name != ".."
}

fn load_file(root: &Path, path: &Path) -> Option<SourceFile> {
    match fs::read(path) {
        Ok(bytes) => Some(SourceFile::new(
            relative_path(root, path),
            String::from_utf8_lossy(&bytes).into_owned(),
        )),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "skipping unreadable file");
            None
        }
    }
}

fn progress_bar(len: usize, hidden: bool) -> ProgressBar {
    if hidden {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(len as u64);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
    {
        bar.set_style(style.progress_chars("█▓▒░  "));
    }
    bar
}

/// Collect every recognized source file under `root`, sorted by path.
///
/// Paths in the returned files are relative to `root`. A file `root` is
/// returned alone, named relative to its parent directory.
pub fn collect_files(root: &Path, config: &Config, show_progress: bool) -> Result<Vec<SourceFile>> {
    if root.is_file() {
        let parent = root.parent().unwrap_or(Path::new(""));
        return Ok(load_file(parent, root).into_iter().collect());
    }

    let excluded = config.excluded_set()?;
    let mut paths = Vec::new();

    let walker = WalkDir::new(root)
        .follow_links(true)
        .into_iter()
        .filter_entry(|e| {
            if e.depth() == 0 || !e.file_type().is_dir() {
                return true;
            }
            let name = e.file_name().to_string_lossy();
            if SKIPPED_DIRS.contains(&name.as_ref()) {
                return false;
            }
            if !config.include_hidden && is_hidden(&name) {
                return false;
            }
            !excluded.is_match(relative_path(root, e.path()))
        });

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(error = %e, "skipping unreadable directory entry");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        if !is_recognized_extension(ext) {
            continue;
        }
        let rel = relative_path(root, path);
        if !config.include_hidden && rel.split('/').any(is_hidden) {
            continue;
        }
        if excluded.is_match(&rel) {
            debug!(path = %rel, "excluded by configuration");
            continue;
        }
        paths.push(path.to_path_buf());
    }
    paths.sort();

    let bar = progress_bar(paths.len(), !show_progress);
    bar.set_message("loading");
    let mut files = Vec::with_capacity(paths.len());
    for path in &paths {
        if let Some(file) = load_file(root, path) {
            files.push(file);
        }
        bar.inc(1);
    }
    bar.finish_and_clear();

    files.sort_by(|a, b| a.path.cmp(&b.path));
    info!(files = files.len(), root = %root.display(), "collected source files");
    Ok(files)
}

/// Load configuration relative to the analyzed path.
fn load_config(explicit: Option<&Path>, root: &Path) -> Result<Config> {
    let dir = if root.is_dir() {
        root.to_path_buf()
    } else {
        root.parent().map(Path::to_path_buf).unwrap_or_default()
    };
    let (config, path) = Config::load(explicit, &dir)?;
    if let Some(path) = path {
        debug!(config = %path.display(), "loaded configuration");
    }
    Ok(config)
}

fn project_name(config: &Config, root: &Path) -> String {
    if let Some(name) = &config.project {
        return name.clone();
    }
    let dir = if root.is_dir() { Some(root) } else { root.parent() };
    dir.and_then(|d| d.file_name())
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "project".to_string())
}

fn resolve_root(path: &Path) -> anyhow::Result<PathBuf> {
    path.canonicalize()
        .map_err(|e| anyhow::anyhow!("cannot access path {:?}: {}", path, e))
}

/// Run the analyze command.
pub fn run_analyze(args: &AnalyzeArgs, show_progress: bool) -> anyhow::Result<i32> {
    if args.format == Format::Sarif {
        eprintln!("Error: sarif output is only available for 'codestrata scan'");
        return Ok(EXIT_ERROR);
    }

    let root = resolve_root(&args.path)?;
    let mut config = load_config(args.config.as_deref(), &root)?;
    if args.no_security {
        config.security.enabled = false;
    }
    let project = project_name(&config, &root);

    let files = collect_files(&root, &config, show_progress)?;
    if files.is_empty() {
        warn!(path = %args.path.display(), "no source files found");
    }

    let engine = Engine::new(config)?;
    let result = engine.run(&project, &files);

    match args.format {
        Format::Json => println!("{}", report::render_json(&result)?),
        _ => print!("{}", report::render_pretty(&result)),
    }

    let failed = match args.fail_on {
        Some(FailOn::Issue(threshold)) => result.has_issue_at_least(threshold),
        Some(FailOn::Vulnerability(threshold)) => result
            .security
            .as_ref()
            .is_some_and(|s| s.has_at_least(threshold)),
        None => false,
    };
    Ok(if failed { EXIT_FAILED } else { EXIT_SUCCESS })
}

/// Run the scan command.
pub fn run_scan(args: &ScanArgs, show_progress: bool) -> anyhow::Result<i32> {
    let root = resolve_root(&args.path)?;
    let config = load_config(args.config.as_deref(), &root)?;
    let files = collect_files(&root, &config, show_progress)?;
    if files.is_empty() {
        warn!(path = %args.path.display(), "no source files found");
    }

    let engine = Engine::new(config)?;
    let report = engine.scan(&files);

    match args.format {
        Format::Json => println!("{}", report::render_json(&report)?),
        Format::Sarif => println!("{}", report::render_sarif(&report)?),
        Format::Pretty => print!(
            "{}",
            report::render_pretty_security(&args.path.to_string_lossy(), &report)
        ),
    }

    let failed = args
        .fail_on
        .is_some_and(|threshold| report.has_at_least(threshold));
    Ok(if failed { EXIT_FAILED } else { EXIT_SUCCESS })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(root: &Path, rel: &str, content: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn paths(files: &[SourceFile]) -> Vec<&str> {
        files.iter().map(|f| f.path.as_str()).collect()
    }

    #[test]
    fn test_collect_skips_vendor_and_hidden() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, "src/main.rs", "fn main() {}\n");
        write(root, "src/app.ts", "export const a = 1;\n");
        write(root, "node_modules/pkg/index.js", "module.exports = 1;\n");
        write(root, "target/debug/build.rs", "fn main() {}\n");
        write(root, ".cache/x.py", "x = 1\n");
        write(root, "notes.bin", "\0\0");

        let files = collect_files(root, &Config::default(), false).unwrap();
        assert_eq!(paths(&files), vec!["src/app.ts", "src/main.rs"]);
    }

    #[test]
    fn test_collect_include_hidden_and_excludes() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, ".config/setup.py", "x = 1\n");
        write(root, "src/generated/api.ts", "export const a = 1;\n");
        write(root, "src/lib.py", "y = 2\n");

        let config = Config {
            include_hidden: true,
            excluded_paths: vec!["**/generated/**".to_string()],
            ..Default::default()
        };
        let files = collect_files(root, &config, false).unwrap();
        assert_eq!(paths(&files), vec![".config/setup.py", "src/lib.py"]);
    }

    #[test]
    fn test_collect_single_file() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "one.py", "def f():\n    pass\n");
        let files = collect_files(&dir.path().join("one.py"), &Config::default(), false).unwrap();
        assert_eq!(paths(&files), vec!["one.py"]);
    }

    #[test]
    fn test_fail_on_parse() {
        assert_eq!("warning".parse::<FailOn>(), Ok(FailOn::Issue(Severity::Warning)));
        assert_eq!(
            "high".parse::<FailOn>(),
            Ok(FailOn::Vulnerability(VulnSeverity::High))
        );
        assert!("fatal".parse::<FailOn>().is_err());
    }

    #[test]
    fn test_project_name_prefers_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            project: Some("shop".to_string()),
            ..Default::default()
        };
        assert_eq!(project_name(&config, dir.path()), "shop");
        let name = project_name(&Config::default(), dir.path());
        assert_eq!(Some(name.as_str()), dir.path().file_name().and_then(|n| n.to_str()));
    }

    #[test]
    fn test_cli_parses_subcommands() {
        let cli = Cli::try_parse_from(["codestrata", "scan", ".", "--format", "sarif", "--fail-on", "high"])
            .unwrap();
        match cli.command {
            Commands::Scan(args) => {
                assert_eq!(args.format, Format::Sarif);
                assert_eq!(args.fail_on, Some(VulnSeverity::High));
            }
            Commands::Analyze(_) => panic!("expected scan"),
        }
        assert!(Cli::try_parse_from(["codestrata", "analyze", ".", "--format", "xml"]).is_err());
    }
}
