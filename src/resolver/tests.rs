use super::*;
use crate::extract::ArchiveFormat;
use std::ffi::OsStr;
use std::fs::File;
use std::io::Write as _;
use std::thread::sleep;
use std::time::Duration;
use tempfile::TempDir;
use zip::write::SimpleFileOptions;

fn find(resolver: &LoaderResolver, target: &str) -> Option<Resolution> {
    resolver.find(target, FindOptions::default())
}

fn loader(resolution: Resolution) -> Loader {
    match resolution {
        Resolution::Loader(loader) => loader,
        Resolution::Asset(asset) => panic!("expected a loader, got asset {:?}", asset.path),
    }
}

fn command_args(loader: &Loader) -> (&OsStr, Vec<&OsStr>) {
    match &loader.source {
        LoaderSource::Command { command, args } => {
            (command.as_os_str(), args.iter().map(OsString::as_os_str).collect())
        }
        other => panic!("expected a command loader, got {other:?}"),
    }
}

fn write_zip(path: &Path, members: &[(&str, &str)]) {
    let mut writer = zip::ZipWriter::new(File::create(path).unwrap());
    for (name, content) in members {
        writer.start_file(*name, SimpleFileOptions::default()).unwrap();
        writer.write_all(content.as_bytes()).unwrap();
    }
    writer.finish().unwrap();
}

#[test]
fn test_exact_static_match() {
    let dir = TempDir::new().unwrap();
    fs::create_dir(dir.path().join("data")).unwrap();
    fs::write(dir.path().join("data/cities.csv"), "a,b").unwrap();

    let resolver = LoaderResolver::new(dir.path());
    let found = find(&resolver, "data/cities.csv").unwrap();
    assert!(matches!(&found, Resolution::Asset(_)));
    assert_eq!(found.path(), dir.path().join("data/cities.csv"));
}

#[test]
fn test_exact_interpreter_match() {
    let dir = TempDir::new().unwrap();
    fs::create_dir(dir.path().join("data")).unwrap();
    fs::write(dir.path().join("data/cities.csv.py"), "print()").unwrap();

    let resolver = LoaderResolver::new(dir.path());
    let found = loader(find(&resolver, "data/cities.csv").unwrap());
    assert_eq!(found.path, dir.path().join("data/cities.csv.py"));
    assert_eq!(found.target_path, "data/cities.csv");

    let (command, args) = command_args(&found);
    assert_eq!(command, "python3");
    assert_eq!(args, [dir.path().join("data/cities.csv.py").as_os_str()]);
}

#[test]
fn test_empty_interpreter_template_executes_file_directly() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("tool.csv.exe"), "").unwrap();

    let resolver = LoaderResolver::new(dir.path());
    let found = loader(find(&resolver, "tool.csv").unwrap());

    let (command, args) = command_args(&found);
    assert_eq!(command, dir.path().join("tool.csv.exe").as_os_str());
    assert!(args.is_empty());
}

#[test]
fn test_missing_target_resolves_to_none() {
    let dir = TempDir::new().unwrap();
    let resolver = LoaderResolver::new(dir.path());
    assert!(find(&resolver, "nope.csv").is_none());
}

#[test]
fn test_extensionless_target_skips_exact_but_may_match_dynamic() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("report.py"), "print()").unwrap();

    let resolver = LoaderResolver::new(dir.path());
    // the exact interpreter probe rejects an extension-less target as a
    // configuration error, but the dynamic walk still resolves the script
    let found = loader(find(&resolver, "report").unwrap());
    assert_eq!(found.path, dir.path().join("report.py"));
}

#[test]
fn test_disabled_interpreter_is_ignored() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("data.csv.py"), "print()").unwrap();

    let resolver = LoaderResolver::with_interpreters(
        dir.path(),
        InterpreterTable::with_overrides([(".py".to_string(), None)]),
    );
    assert!(find(&resolver, "data.csv").is_none());
}

#[test]
fn test_dynamic_param_match() {
    let dir = TempDir::new().unwrap();
    fs::create_dir(dir.path().join("reports")).unwrap();
    fs::write(dir.path().join("reports/[id].json.py"), "print()").unwrap();

    let resolver = LoaderResolver::new(dir.path());
    let found = loader(find(&resolver, "reports/42.json").unwrap());
    assert_eq!(found.path, dir.path().join("reports/[id].json.py"));

    let (command, args) = command_args(&found);
    assert_eq!(command, "python3");
    assert_eq!(
        args,
        [
            dir.path().join("reports/[id].json.py").as_os_str(),
            OsStr::new("--id"),
            OsStr::new("42"),
        ]
    );
}

#[test]
fn test_dynamic_literal_wins_over_bracket() {
    let dir = TempDir::new().unwrap();
    fs::create_dir(dir.path().join("a")).unwrap();
    fs::create_dir(dir.path().join("[x]")).unwrap();
    fs::write(dir.path().join("a/b.csv.py"), "literal").unwrap();
    fs::write(dir.path().join("[x]/b.csv.py"), "bracket").unwrap();

    let resolver = LoaderResolver::new(dir.path());

    // concrete directory wins
    let found = loader(find(&resolver, "a/b.csv").unwrap());
    assert_eq!(found.path, dir.path().join("a/b.csv.py"));
    let (_, args) = command_args(&found);
    assert_eq!(args.len(), 1); // no parameters

    // anything else falls through to the bracket directory
    let found = loader(find(&resolver, "z/b.csv").unwrap());
    assert_eq!(found.path, dir.path().join("[x]/b.csv.py"));
    let (_, args) = command_args(&found);
    assert_eq!(args[1..], [OsStr::new("--x"), OsStr::new("z")]);
}

#[test]
fn test_dynamic_nested_params_outermost_first() {
    let dir = TempDir::new().unwrap();
    fs::create_dir(dir.path().join("[region]")).unwrap();
    fs::write(dir.path().join("[region]/[year].csv.py"), "print()").unwrap();

    let resolver = LoaderResolver::new(dir.path());
    let found = loader(find(&resolver, "emea/2024.csv").unwrap());

    let (_, args) = command_args(&found);
    assert_eq!(
        args[1..],
        [
            OsStr::new("--region"),
            OsStr::new("emea"),
            OsStr::new("--year"),
            OsStr::new("2024"),
        ]
    );
}

#[test]
fn test_dynamic_bracket_asset() {
    let dir = TempDir::new().unwrap();
    fs::create_dir(dir.path().join("[slug]")).unwrap();
    fs::write(dir.path().join("[slug]/style.css"), "body{}").unwrap();

    let resolver = LoaderResolver::new(dir.path());
    let found = find(&resolver, "anything/style.css").unwrap();
    assert!(matches!(&found, Resolution::Asset(_)));
    assert_eq!(found.path(), dir.path().join("[slug]/style.css"));
}

#[test]
fn test_archive_fallback_zip() {
    let dir = TempDir::new().unwrap();
    write_zip(&dir.path().join("data.zip"), &[("inner.csv", "a,b")]);

    let resolver = LoaderResolver::new(dir.path());
    let found = loader(find(&resolver, "data/inner.csv").unwrap());
    assert_eq!(found.path, dir.path().join("data.zip"));
    assert_eq!(found.target_path, "data/inner.csv");

    match &found.source {
        LoaderSource::Archive {
            format,
            preload,
            inflate_path,
        } => {
            assert_eq!(*format, ArchiveFormat::Zip);
            assert_eq!(inflate_path, "inner.csv");
            match preload {
                Preload::Static(path) => assert_eq!(path, Path::new("data.zip")),
                Preload::Loader(_) => panic!("expected a static preload"),
            }
        }
        other => panic!("expected an archive loader, got {other:?}"),
    }
}

#[test]
fn test_archive_member_path_below_nested_boundary() {
    let dir = TempDir::new().unwrap();
    fs::create_dir(dir.path().join("a")).unwrap();
    write_zip(&dir.path().join("a/b.zip"), &[("c/d.csv", "x")]);

    let resolver = LoaderResolver::new(dir.path());
    let found = loader(find(&resolver, "a/b/c/d.csv").unwrap());
    match &found.source {
        LoaderSource::Archive { inflate_path, .. } => assert_eq!(inflate_path, "c/d.csv"),
        other => panic!("expected an archive loader, got {other:?}"),
    }
}

#[test]
fn test_archive_never_shadows_real_directory() {
    let dir = TempDir::new().unwrap();
    fs::create_dir(dir.path().join("data")).unwrap();
    write_zip(&dir.path().join("data.zip"), &[("inner.csv", "x")]);

    let resolver = LoaderResolver::new(dir.path());
    assert!(find(&resolver, "data/inner.csv").is_none());
}

#[test]
fn test_top_level_target_never_probes_archives() {
    let dir = TempDir::new().unwrap();
    let resolver = LoaderResolver::new(dir.path());
    assert!(find(&resolver, "cities.csv").is_none());
}

#[test]
fn test_generated_archive_preload_is_inner_loader() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("data.zip.sh"), "exit 0").unwrap();

    let resolver = LoaderResolver::new(dir.path());
    let found = loader(find(&resolver, "data/member.txt").unwrap());
    assert_eq!(found.path, dir.path().join("data.zip.sh"));
    match &found.source {
        LoaderSource::Archive { preload, .. } => {
            match preload {
                Preload::Loader(inner) => assert_eq!(inner.target_path, "data.zip"),
                Preload::Static(_) => panic!("expected a loader preload"),
            }
        }
        other => panic!("expected an archive loader, got {other:?}"),
    }
}

#[test]
fn test_watch_path() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("app.jsx"), "export default 1").unwrap();
    fs::write(dir.path().join("data.csv.py"), "print()").unwrap();
    fs::write(dir.path().join("plain.txt"), "x").unwrap();

    let resolver = LoaderResolver::new(dir.path());

    // exact file wins
    assert_eq!(
        resolver.watch_path("plain.txt").unwrap(),
        dir.path().join("plain.txt")
    );
    // .jsx sibling for a .js request
    assert_eq!(
        resolver.watch_path("app.js").unwrap(),
        dir.path().join("app.jsx")
    );
    // generated file: watch the loader script
    assert_eq!(
        resolver.watch_path("data.csv").unwrap(),
        dir.path().join("data.csv.py")
    );
    assert!(resolver.watch_path("missing.csv").is_none());
}

#[test]
fn test_source_file_hash_static_ignores_touch() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("cities.csv"), "a,b").unwrap();

    let resolver = LoaderResolver::new(dir.path());
    let hash1 = resolver.source_file_hash("cities.csv");

    sleep(Duration::from_millis(20));
    fs::write(dir.path().join("cities.csv"), "a,b").unwrap();
    let hash2 = resolver.source_file_hash("cities.csv");

    assert_eq!(hash1.len(), 64);
    assert_eq!(hash1, hash2); // content unchanged
}

#[test]
fn test_source_file_hash_generated_tracks_touch() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("gen.csv.py"), "print()").unwrap();

    let resolver = LoaderResolver::new(dir.path());
    let hash1 = resolver.source_file_hash("gen.csv");

    // touching the loader script without changing its bytes forces a new hash
    sleep(Duration::from_millis(20));
    fs::write(dir.path().join("gen.csv.py"), "print()").unwrap();
    let hash2 = resolver.source_file_hash("gen.csv");

    assert_ne!(hash1, hash2);
}

#[test]
fn test_source_file_hash_missing_is_empty_hash() {
    let dir = TempDir::new().unwrap();
    let resolver = LoaderResolver::new(dir.path());
    assert_eq!(
        resolver.source_file_hash("missing.csv"),
        ContentHash::of_empty().to_hex()
    );
}

#[test]
fn test_last_modified_helpers() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("gen.csv.py"), "print()").unwrap();

    let resolver = LoaderResolver::new(dir.path());
    // source: the loader script backs the generated file
    assert!(resolver.source_last_modified("gen.csv").is_some());
    // output: nothing cached yet
    assert!(resolver.output_last_modified("gen.csv").is_none());
    assert!(resolver.source_last_modified("missing.csv").is_none());
}

#[test]
fn test_resolve_file_path_format() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("cities.csv"), "a,b").unwrap();

    let resolver = LoaderResolver::new(dir.path());
    let reference = resolver.resolve_file_path("cities.csv");
    let sha = reference.strip_prefix("/_file/cities.csv?sha=").unwrap();
    assert_eq!(sha.len(), 64);
    assert!(sha.chars().all(|c| c.is_ascii_hexdigit()));
}
