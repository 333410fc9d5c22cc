//! Arkiv CLI - Command-line tool for ZIP and TAR archives.
//!
//! This is the main entry point for the Arkiv command-line application.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::time::{Instant, UNIX_EPOCH};

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, warn};
use memmap2::Mmap;
use serde::Serialize;
use walkdir::WalkDir;

use arkiv::prelude::*;
use arkiv::DecodeOptions;

/// Arkiv - ZIP and TAR archive tool
#[derive(Parser)]
#[command(name = "arkiv")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an archive from a directory
    Create {
        /// Directory to archive
        #[arg(short, long, env = "ARKIV_INPUT")]
        input: PathBuf,

        /// Archive file to write
        #[arg(short, long, env = "ARKIV_OUTPUT")]
        output: PathBuf,

        /// Archive format (inferred from the output extension by default)
        #[arg(short, long, value_enum)]
        format: Option<FormatArg>,

        /// Store entries without compression
        #[arg(long)]
        store: bool,

        /// DEFLATE level (0-9)
        #[arg(short, long, env = "ARKIV_LEVEL", default_value_t = 6,
              value_parser = clap::value_parser!(u32).range(0..=9))]
        level: u32,

        /// Archive comment (ZIP only)
        #[arg(short, long)]
        comment: Option<String>,
    },

    /// List contents of an archive
    List {
        /// Archive file
        #[arg(short, long, env = "ARKIV_INPUT")]
        input: PathBuf,

        /// Filter pattern (glob)
        #[arg(short, long)]
        filter: Option<String>,

        /// Show detailed information
        #[arg(short, long)]
        detailed: bool,

        /// Print entries as JSON
        #[arg(long)]
        json: bool,
    },

    /// Extract an archive into a directory
    Extract {
        /// Archive file
        #[arg(short, long, env = "ARKIV_INPUT")]
        input: PathBuf,

        /// Output directory
        #[arg(short, long, env = "ARKIV_OUTPUT")]
        output: PathBuf,

        /// Filter pattern (glob)
        #[arg(short, long)]
        filter: Option<String>,

        /// Verify checksums while decoding
        #[arg(long)]
        verify: bool,
    },

    /// Decode an archive and check every checksum
    Verify {
        /// Archive file
        #[arg(short, long, env = "ARKIV_INPUT")]
        input: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum FormatArg {
    Zip,
    Tar,
    TarGz,
}

impl From<FormatArg> for ArchiveFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Zip => ArchiveFormat::Zip,
            FormatArg::Tar => ArchiveFormat::Tar,
            FormatArg::TarGz => ArchiveFormat::TarGz,
        }
    }
}

/// One line of `list --json`.
#[derive(Debug, Serialize)]
struct ListEntry<'a> {
    name: &'a str,
    kind: &'static str,
    size: u64,
    mode: String,
    last_modified: u64,
    compressed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    target: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    comment: Option<&'a str>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(log_filter(cli.verbose)),
    )
    .init();

    match cli.command {
        Commands::Create {
            input,
            output,
            format,
            store,
            level,
            comment,
        } => {
            cmd_create(&input, &output, format.map(Into::into), store, level, comment)?;
        }
        Commands::List {
            input,
            filter,
            detailed,
            json,
        } => {
            cmd_list(&input, filter.as_deref(), detailed, json)?;
        }
        Commands::Extract {
            input,
            output,
            filter,
            verify,
        } => {
            cmd_extract(&input, &output, filter.as_deref(), verify)?;
        }
        Commands::Verify { input } => {
            cmd_verify(&input)?;
        }
    }

    Ok(())
}

/// `RUST_LOG`-style filter for the given number of `-v` flags.
fn log_filter(verbose: u8) -> String {
    let level = match verbose {
        0 => return "warn".to_string(),
        1 => "debug",
        _ => "trace",
    };
    ["arkiv", "arkiv_common", "arkiv_tar", "arkiv_zip"]
        .iter()
        .fold("warn".to_string(), |filter, krate| {
            format!("{},{}={}", filter, krate, level)
        })
}

fn cmd_create(
    input: &Path,
    output: &Path,
    format: Option<ArchiveFormat>,
    store: bool,
    level: u32,
    comment: Option<String>,
) -> Result<()> {
    let format = match format.or_else(|| ArchiveFormat::from_path(output)) {
        Some(format) => format,
        None => bail!(
            "cannot infer the archive format from {}; pass --format",
            output.display()
        ),
    };

    println!("Archiving {} as {}", input.display(), format);
    let start = Instant::now();

    let mut archive = collect_entries(input, format)?;
    if store {
        archive.iter_mut().for_each(|f| f.set_compress(false));
    }
    if let Some(comment) = comment {
        if format != ArchiveFormat::Zip {
            warn!("archive comments are only stored in ZIP archives");
        }
        archive.set_comment(comment);
    }

    let data = arkiv::encode_with(&mut archive, format, FlateCodec::new(level))
        .with_context(|| format!("Failed to encode {}", output.display()))?;
    fs::write(output, &data).with_context(|| format!("Failed to write {}", output.display()))?;

    println!(
        "Wrote {} entries ({} bytes) to {} in {:?}",
        archive.len(),
        data.len(),
        output.display(),
        start.elapsed()
    );
    Ok(())
}

fn cmd_list(input: &Path, filter: Option<&str>, detailed: bool, json: bool) -> Result<()> {
    let data = map_input(input)?;
    let archive = arkiv::decode(&data).context("Failed to decode archive")?;
    let pattern = compile_filter(filter)?;

    let files: Vec<&ArchiveFile> = archive
        .iter()
        .filter(|f| matches_filter(pattern.as_ref(), f.name()))
        .collect();

    if json {
        let entries: Vec<ListEntry<'_>> = files.iter().map(|f| list_entry(f)).collect();
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    for file in &files {
        if detailed {
            println!(
                "{} {:>6o} {:>12} {:>12} {}",
                kind_char(file.kind()),
                file.mode(),
                file.size(),
                file.last_modified(),
                file.name()
            );
        } else {
            println!("{}", file.name());
        }
    }

    if !archive.comment().is_empty() {
        println!("\nComment: {}", archive.comment());
    }
    println!("\nTotal: {} entries", files.len());
    Ok(())
}

fn cmd_extract(input: &Path, output: &Path, filter: Option<&str>, verify: bool) -> Result<()> {
    println!("Opening archive: {}", input.display());

    let start = Instant::now();
    let data = map_input(input)?;
    let archive = arkiv::decode_with(&data, DecodeOptions { verify })
        .context("Failed to decode archive")?;
    println!("Loaded {} entries in {:?}", archive.len(), start.elapsed());

    let pattern = compile_filter(filter)?;
    let selected: Vec<ArchiveFile> = archive
        .into_iter()
        .filter(|f| matches_filter(pattern.as_ref(), f.name()))
        .collect();

    println!("Extracting {} entries...", selected.len());

    let pb = ProgressBar::new(selected.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")?
            .progress_chars("#>-"),
    );

    fs::create_dir_all(output)
        .with_context(|| format!("Failed to create {}", output.display()))?;

    let codec = FlateCodec::default();
    let start = Instant::now();
    for mut file in selected {
        let Some(path) = safe_join(output, file.name()) else {
            bail!("refusing to extract {}: path escapes the output directory", file.name());
        };
        ensure_no_symlink(output, &path)
            .with_context(|| format!("refusing to extract {}", file.name()))?;
        write_entry(&path, &mut file, &codec)
            .with_context(|| format!("Failed to extract {}", file.name()))?;
        pb.inc(1);
    }

    pb.finish_with_message("Done");
    println!("Extraction completed in {:?}", start.elapsed());
    Ok(())
}

fn cmd_verify(input: &Path) -> Result<()> {
    let data = map_input(input)?;
    let format = ArchiveFormat::detect(&data).context("Unrecognized archive format")?;

    let start = Instant::now();
    let archive = arkiv::decode_as(&data, format, DecodeOptions { verify: true })
        .with_context(|| format!("{} failed verification", input.display()))?;

    println!(
        "OK: {} entries ({}) verified in {:?}",
        archive.len(),
        format,
        start.elapsed()
    );
    Ok(())
}

fn map_input(path: &Path) -> Result<Mmap> {
    let file =
        fs::File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let mmap = unsafe { Mmap::map(&file) }
        .with_context(|| format!("Failed to map {}", path.display()))?;
    debug!("mapped {} ({} bytes)", path.display(), mmap.len());
    Ok(mmap)
}

/// Walk `root` and build the model entries, in file name order.
///
/// Symlinks are kept as links for TAR and skipped for ZIP.
fn collect_entries(root: &Path, format: ArchiveFormat) -> Result<Archive> {
    if !root.is_dir() {
        bail!("{} is not a directory", root.display());
    }

    let mut archive = Archive::new();
    for entry in WalkDir::new(root).min_depth(1).sort_by_file_name() {
        let entry = entry.with_context(|| format!("Failed to walk {}", root.display()))?;
        let relative = entry.path().strip_prefix(root)?;
        let Some(name) = archive_name(relative) else {
            warn!("skipping {}: not a UTF-8 path", entry.path().display());
            continue;
        };

        let metadata = entry
            .metadata()
            .with_context(|| format!("Failed to stat {}", entry.path().display()))?;
        let file_type = entry.file_type();

        let file = if file_type.is_dir() {
            ArchiveFile::directory(format!("{}/", name))
        } else if file_type.is_symlink() {
            if format == ArchiveFormat::Zip {
                warn!("skipping symlink {}: ZIP archives cannot store links", name);
                continue;
            }
            let target = fs::read_link(entry.path())?;
            let Some(target) = target.to_str() else {
                warn!("skipping symlink {}: target is not UTF-8", name);
                continue;
            };
            ArchiveFile::symlink(name, target)
        } else if file_type.is_file() {
            let data = fs::read(entry.path())
                .with_context(|| format!("Failed to read {}", entry.path().display()))?;
            ArchiveFile::file(name, data)
        } else {
            warn!("skipping {}: unsupported file type", name);
            continue;
        };

        let mut file = file.with_last_modified(modified_seconds(&metadata));
        if let Some(mode) = unix_mode(&metadata) {
            file.set_mode(mode);
        }
        archive.add(file);
    }
    Ok(archive)
}

/// POSIX-style archive name of a relative path.
fn archive_name(relative: &Path) -> Option<String> {
    let parts = relative
        .components()
        .map(|c| c.as_os_str().to_str())
        .collect::<Option<Vec<_>>>()?;
    Some(parts.join("/"))
}

/// Join an archive name onto `root`, refusing anything that would leave it.
fn safe_join(root: &Path, name: &str) -> Option<PathBuf> {
    let mut path = root.to_path_buf();
    let mut depth = 0usize;
    for component in Path::new(name).components() {
        match component {
            Component::Normal(part) => {
                path.push(part);
                depth += 1;
            }
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    (depth > 0).then_some(path)
}

/// Fail if any existing component of `path` below `root` is a symlink.
fn ensure_no_symlink(root: &Path, path: &Path) -> Result<()> {
    let relative = path.strip_prefix(root)?;
    let mut current = root.to_path_buf();
    for component in relative.components() {
        current.push(component);
        match fs::symlink_metadata(&current) {
            Ok(metadata) if metadata.file_type().is_symlink() => {
                bail!("path runs through symlink {}", current.display());
            }
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => break,
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to stat {}", current.display()))
            }
        }
    }
    Ok(())
}

fn write_entry(path: &Path, file: &mut ArchiveFile, codec: &FlateCodec) -> Result<()> {
    match file.kind() {
        EntryKind::Directory => {
            fs::create_dir_all(path)?;
        }
        EntryKind::Symlink => {
            let Some(target) = file.symlink_target() else {
                bail!("symlink target is not UTF-8");
            };
            create_parent(path)?;
            make_symlink(target, path)?;
        }
        EntryKind::File => {
            create_parent(path)?;
            fs::write(path, file.data(codec)?)?;
            set_mode(path, file.mode())?;
        }
    }
    Ok(())
}

fn create_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

fn modified_seconds(metadata: &fs::Metadata) -> u64 {
    metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map_or(0, |d| d.as_secs())
}

#[cfg(unix)]
fn unix_mode(metadata: &fs::Metadata) -> Option<u32> {
    use std::os::unix::fs::PermissionsExt;
    Some(metadata.permissions().mode())
}

#[cfg(not(unix))]
fn unix_mode(_metadata: &fs::Metadata) -> Option<u32> {
    None
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode))?;
    Ok(())
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> Result<()> {
    Ok(())
}

#[cfg(unix)]
fn make_symlink(target: &str, path: &Path) -> Result<()> {
    std::os::unix::fs::symlink(target, path)?;
    Ok(())
}

#[cfg(not(unix))]
fn make_symlink(target: &str, path: &Path) -> Result<()> {
    warn!("skipping symlink {} -> {}: not supported here", path.display(), target);
    Ok(())
}

fn compile_filter(filter: Option<&str>) -> Result<Option<glob::Pattern>> {
    filter
        .map(|p| glob::Pattern::new(p).with_context(|| format!("Invalid filter pattern: {}", p)))
        .transpose()
}

fn matches_filter(pattern: Option<&glob::Pattern>, name: &str) -> bool {
    pattern.map_or(true, |p| p.matches(name))
}

fn kind_char(kind: EntryKind) -> char {
    match kind {
        EntryKind::File => '-',
        EntryKind::Directory => 'd',
        EntryKind::Symlink => 'l',
    }
}

fn list_entry(file: &ArchiveFile) -> ListEntry<'_> {
    ListEntry {
        name: file.name(),
        kind: match file.kind() {
            EntryKind::File => "file",
            EntryKind::Directory => "directory",
            EntryKind::Symlink => "symlink",
        },
        size: file.size(),
        mode: format!("{:04o}", file.mode()),
        last_modified: file.last_modified(),
        compressed: file.content().is_compressed(),
        target: file.symlink_target(),
        comment: file.comment(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn populate(root: &Path) {
        fs::create_dir_all(root.join("src/nested")).unwrap();
        fs::write(root.join("README"), b"readme").unwrap();
        fs::write(root.join("src/lib.rs"), b"pub fn f() {}").unwrap();
        fs::write(root.join("src/nested/data.bin"), vec![0xAB; 4096]).unwrap();
    }

    #[test]
    fn test_log_filter() {
        assert_eq!(log_filter(0), "warn");
        assert!(log_filter(1).contains("arkiv_zip=debug"));
        assert!(log_filter(5).contains("arkiv_tar=trace"));
    }

    #[test]
    fn test_safe_join_rejects_escapes() {
        let root = Path::new("/out");
        assert_eq!(safe_join(root, "a/b.txt"), Some(PathBuf::from("/out/a/b.txt")));
        assert_eq!(safe_join(root, "./a/"), Some(PathBuf::from("/out/a")));
        assert_eq!(safe_join(root, "../evil"), None);
        assert_eq!(safe_join(root, "a/../../evil"), None);
        assert_eq!(safe_join(root, "/etc/passwd"), None);
        assert_eq!(safe_join(root, "."), None);
    }

    #[test]
    fn test_collect_entries_is_sorted_and_relative() {
        let dir = tempdir().unwrap();
        populate(dir.path());

        let archive = collect_entries(dir.path(), ArchiveFormat::Tar).unwrap();
        let names: Vec<_> = archive.iter().map(|f| f.name()).collect();
        assert_eq!(
            names,
            ["README", "src/", "src/lib.rs", "src/nested/", "src/nested/data.bin"]
        );
        assert!(archive.find("src/").unwrap().is_directory());
        assert_eq!(archive.find("README").unwrap().raw_content(), Some(&b"readme"[..]));
    }

    #[cfg(unix)]
    #[test]
    fn test_symlinks_only_kept_for_tar() {
        let dir = tempdir().unwrap();
        populate(dir.path());
        std::os::unix::fs::symlink("README", dir.path().join("link")).unwrap();

        let tar = collect_entries(dir.path(), ArchiveFormat::Tar).unwrap();
        assert_eq!(tar.find("link").unwrap().symlink_target(), Some("README"));

        let zip = collect_entries(dir.path(), ArchiveFormat::Zip).unwrap();
        assert!(zip.find("link").is_none());
    }

    #[test]
    fn test_create_then_extract() {
        for extension in ["zip", "tar", "tar.gz"] {
            let src = tempdir().unwrap();
            populate(src.path());
            let work = tempdir().unwrap();
            let archive_path = work.path().join(format!("out.{}", extension));
            let out = work.path().join("extracted");

            cmd_create(src.path(), &archive_path, None, false, 6, None).unwrap();
            cmd_verify(&archive_path).unwrap();
            cmd_extract(&archive_path, &out, None, true).unwrap();

            assert_eq!(fs::read(out.join("README")).unwrap(), b"readme");
            assert_eq!(fs::read(out.join("src/nested/data.bin")).unwrap(), vec![0xAB; 4096]);
            assert!(out.join("src/nested").is_dir());
        }
    }

    #[test]
    fn test_extract_with_filter() {
        let src = tempdir().unwrap();
        populate(src.path());
        let work = tempdir().unwrap();
        let archive_path = work.path().join("out.zip");
        let out = work.path().join("extracted");

        cmd_create(src.path(), &archive_path, None, true, 0, Some("note".into())).unwrap();
        cmd_extract(&archive_path, &out, Some("src/*.rs"), false).unwrap();

        assert!(out.join("src/lib.rs").is_file());
        assert!(!out.join("README").exists());
    }

    #[test]
    fn test_extract_refuses_escaping_names() {
        let mut archive = Archive::new();
        archive.add(ArchiveFile::file("../escape.txt", b"x".to_vec()));
        let data = arkiv::encode(&mut archive, ArchiveFormat::Tar).unwrap();

        let work = tempdir().unwrap();
        let archive_path = work.path().join("evil.tar");
        fs::write(&archive_path, data).unwrap();

        let result = cmd_extract(&archive_path, &work.path().join("out"), None, false);
        assert!(result.is_err());
        assert!(!work.path().join("escape.txt").exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_extract_refuses_paths_through_symlinks() {
        let work = tempdir().unwrap();
        let outside = work.path().join("outside");
        fs::create_dir(&outside).unwrap();

        let mut archive = Archive::new();
        archive.add(ArchiveFile::symlink("link", outside.to_str().unwrap()));
        archive.add(ArchiveFile::file("link/planted.txt", b"x".to_vec()));
        let data = arkiv::encode(&mut archive, ArchiveFormat::Tar).unwrap();

        let archive_path = work.path().join("links.tar");
        fs::write(&archive_path, data).unwrap();

        let out = work.path().join("out");
        let result = cmd_extract(&archive_path, &out, None, false);
        assert!(result.is_err());
        assert!(!outside.join("planted.txt").exists());
        assert!(fs::symlink_metadata(out.join("link")).unwrap().file_type().is_symlink());
    }

    #[cfg(unix)]
    #[test]
    fn test_extract_refuses_writing_over_symlink() {
        let work = tempdir().unwrap();
        let victim = work.path().join("victim.txt");
        fs::write(&victim, b"original").unwrap();

        let mut archive = Archive::new();
        archive.add(ArchiveFile::symlink("a.txt", victim.to_str().unwrap()));
        archive.add(ArchiveFile::file("a.txt", b"replaced".to_vec()));
        let data = arkiv::encode(&mut archive, ArchiveFormat::Tar).unwrap();

        let archive_path = work.path().join("overwrite.tar");
        fs::write(&archive_path, data).unwrap();

        assert!(cmd_extract(&archive_path, &work.path().join("out"), None, false).is_err());
        assert_eq!(fs::read(&victim).unwrap(), b"original");
    }

    #[test]
    fn test_ensure_no_symlink_allows_missing_paths() {
        let work = tempdir().unwrap();
        fs::create_dir(work.path().join("dir")).unwrap();
        let path = work.path().join("dir/new/file.txt");
        assert!(ensure_no_symlink(work.path(), &path).is_ok());
    }

    #[test]
    fn test_unknown_output_extension() {
        let src = tempdir().unwrap();
        let work = tempdir().unwrap();
        let result = cmd_create(src.path(), &work.path().join("out.rar"), None, false, 6, None);
        assert!(result.is_err());
    }

    #[test]
    fn test_list_entry_json_shape() {
        let file = ArchiveFile::file("a.txt", b"abc".to_vec())
            .with_mode(0o640)
            .with_last_modified(42);
        let json = serde_json::to_value(list_entry(&file)).unwrap();
        assert_eq!(json["name"], "a.txt");
        assert_eq!(json["kind"], "file");
        assert_eq!(json["size"], 3);
        assert_eq!(json["mode"], "0640");
        assert!(json.get("target").is_none());
    }
}
