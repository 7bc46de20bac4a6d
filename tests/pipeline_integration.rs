use jpf_autodoc::aggregate::Relationship;
use jpf_autodoc::coordinator::Coordinator;
use jpf_autodoc::error::{AutodocError, ReadError};
use jpf_autodoc::facts::FactKind;
use jpf_autodoc::reader::read_path;
use jpf_autodoc::settings::AnalysisConfig;
use jpf_autodoc::unit::{Provenance, Unit, UnitSet};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

const CLASS_BYTES: &[u8] = &[0xCA, 0xFE, 0xBA, 0xBE, 0x00, 0x00, 0x00, 0x34];

fn temp_dir(name: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    std::env::temp_dir().join(format!(
        "jpf_autodoc_it_{}_{}_{}",
        std::process::id(),
        nanos,
        name
    ))
}

fn write_file(path: &Path, content: &[u8]) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, content)?;
    Ok(())
}

fn write_jar(path: &Path, entries: &[(&str, &[u8])]) -> anyhow::Result<()> {
    use std::io::Write;
    use zip::write::FileOptions;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = std::fs::File::create(path)?;
    let mut zip = zip::ZipWriter::new(file);
    let options = FileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    for (name, content) in entries {
        zip.start_file(*name, options)?;
        zip.write_all(content)?;
    }
    zip.finish()?;
    Ok(())
}

fn run_json(bin: &str, args: &[&str]) -> anyhow::Result<Value> {
    let out = Command::new(bin).args(args).output()?;
    if !out.status.success() {
        return Err(anyhow::anyhow!(
            "command failed: status={:?}, stderr={}",
            out.status.code(),
            String::from_utf8_lossy(&out.stderr)
        ));
    }
    Ok(serde_json::from_slice(&out.stdout)?)
}

fn sequential() -> AnalysisConfig {
    AnalysisConfig::builder().parallel(false).build().unwrap()
}

fn parallel(threads: usize) -> AnalysisConfig {
    AnalysisConfig::builder()
        .parallel(true)
        .thread_count(threads)
        .build()
        .unwrap()
}

fn jpf_units(names: &[&str]) -> UnitSet {
    names
        .iter()
        .map(|name| Unit::new(*name, CLASS_BYTES.to_vec(), Provenance::File, "test"))
        .collect()
}

#[test]
fn directory_with_archive_and_loose_unit_yields_three_units() -> anyhow::Result<()> {
    let base = temp_dir("three_units");
    write_jar(
        &base.join("lib").join("classes.jar"),
        &[("a/B.class", CLASS_BYTES), ("a/C.class", CLASS_BYTES)],
    )?;
    write_file(&base.join("D.class"), CLASS_BYTES)?;

    let report = read_path(&base)?;
    assert!(report.skipped.is_empty());
    let units: UnitSet = report.units.into_iter().collect();
    assert_eq!(units.len(), 3);
    assert_eq!(units.get("a.B").unwrap().provenance(), Provenance::ArchiveMember);
    assert_eq!(units.get("D").unwrap().provenance(), Provenance::DirectoryMember);
    Ok(())
}

#[test]
fn listener_units_produce_listener_facts_and_inheritance() -> anyhow::Result<()> {
    let base = temp_dir("listeners");
    write_jar(
        &base.join("jpf.jar"),
        &[
            ("gov/nasa/jpf/Listener.class", CLASS_BYTES),
            ("gov/nasa/jpf/search/SearchListener.class", CLASS_BYTES),
        ],
    )?;
    write_file(&base.join("gov/nasa/jpf/Config.class"), CLASS_BYTES)?;

    let aggregate = Coordinator::new().analyze_source(&base, &parallel(2))?;
    assert_eq!(aggregate.metadata().units_analyzed, 3);
    assert_eq!(aggregate.metadata().source_path.as_deref(), Some(base.as_path()));
    assert!(aggregate.contains(FactKind::Listener, "gov.nasa.jpf.search.SearchListener"));
    assert!(aggregate.contains(FactKind::ConfigOption, "unknown"));
    assert_eq!(
        aggregate.listeners().get("gov.nasa.jpf.search.SearchListener").unwrap().listener_type,
        "SearchListener"
    );
    assert!(
        aggregate
            .cross_references()
            .values()
            .any(|x| x.relationship == Relationship::Inheritance
                && x.source_key == "gov.nasa.jpf.search.SearchListener"
                && x.target_key == "gov.nasa.jpf.Listener")
    );
    Ok(())
}

#[test]
fn sequential_runs_are_deterministic_and_match_parallel() {
    let units = jpf_units(&[
        "gov.nasa.jpf.Listener",
        "gov.nasa.jpf.search.SearchListener",
        "gov.nasa.jpf.vm.StringModel",
        "gov.nasa.jpf.vm.StringNativePeer",
        "gov.nasa.jpf.vm.IntChoiceGenerator",
        "gov.nasa.jpf.util.JPFLogger",
        "gov.nasa.jpf.SearchConfig",
    ]);
    let coordinator = Coordinator::new();

    let first = coordinator.run(&units, &sequential()).unwrap();
    let second = coordinator.run(&units, &sequential()).unwrap();
    let first_json = serde_json::to_value(&first).unwrap();
    let second_json = serde_json::to_value(&second).unwrap();
    for key in [
        "config_options",
        "config_annotations",
        "choice_generators",
        "loggers",
        "types",
        "model_classes",
        "native_peers",
        "listeners",
        "cross_references",
    ] {
        assert_eq!(first_json[key], second_json[key], "{key}");
    }

    for threads in 1..=units.len() {
        let pooled = coordinator.run(&units, &parallel(threads)).unwrap();
        assert_eq!(pooled.types(), first.types(), "threads = {threads}");
        assert_eq!(pooled.listeners(), first.listeners(), "threads = {threads}");
        assert_eq!(pooled.config_options(), first.config_options(), "threads = {threads}");
        assert_eq!(pooled.native_peers(), first.native_peers(), "threads = {threads}");
        assert_eq!(
            pooled.cross_references().len(),
            first.cross_references().len(),
            "threads = {threads}"
        );
    }
}

#[test]
fn cross_references_only_point_at_existing_facts() {
    let units = jpf_units(&[
        "gov.nasa.jpf.Listener",
        "gov.nasa.jpf.search.SearchListener",
        "gov.nasa.jpf.ListenerConfig",
        "gov.nasa.jpf.vm.StringModel",
        "gov.nasa.jpf.vm.StringNativePeer",
    ]);
    let aggregate = Coordinator::new().run(&units, &parallel(3)).unwrap();
    assert!(!aggregate.cross_references().is_empty());
    for xref in aggregate.cross_references().values() {
        assert!(aggregate.contains(xref.source_kind, &xref.source_key), "{xref:?}");
        assert!(aggregate.contains(xref.target_kind, &xref.target_key), "{xref:?}");
    }
}

#[test]
fn malformed_unit_is_isolated() {
    let mut units = jpf_units(&["gov.nasa.jpf.Listener", "gov.nasa.jpf.search.SearchListener"]);
    units.add(Unit::new(
        "gov.nasa.jpf.BrokenListener",
        b"garbage".to_vec(),
        Provenance::File,
        "test",
    ));

    for config in [sequential(), parallel(2)] {
        let aggregate = Coordinator::new().run(&units, &config).unwrap();
        assert_eq!(aggregate.metadata().units_analyzed, 3);
        assert!(aggregate.contains(FactKind::Listener, "gov.nasa.jpf.Listener"));
        assert!(aggregate.contains(FactKind::Listener, "gov.nasa.jpf.search.SearchListener"));
        assert!(!aggregate.contains(FactKind::Listener, "gov.nasa.jpf.BrokenListener"));
        assert!(!aggregate.contains(FactKind::TypeInfo, "gov.nasa.jpf.BrokenListener"));
        assert!(
            aggregate
                .metadata()
                .unit_failures
                .iter()
                .all(|f| f.unit == "gov.nasa.jpf.BrokenListener")
        );
    }
}

#[test]
fn include_and_exclude_patterns_filter_units() {
    let units = jpf_units(&[
        "gov.nasa.jpf.FooListener",
        "gov.nasa.jpf.FooListenerTest",
        "com.other.FooListener",
    ]);
    let config = AnalysisConfig::builder()
        .include_pattern(r"gov\.nasa\.jpf\..*")
        .exclude_pattern(".*Test$")
        .parallel(false)
        .build()
        .unwrap();

    let filter = config.name_filter();
    assert!(!filter.accepts("gov.nasa.jpf.FooTest"));
    assert!(filter.accepts("gov.nasa.jpf.Foo"));
    assert!(!filter.accepts("com.other.Foo"));

    let aggregate = Coordinator::new().run(&units, &config).unwrap();
    assert_eq!(aggregate.metadata().units_analyzed, 1);
    let listeners: Vec<&str> = aggregate.listeners().keys().collect();
    assert_eq!(listeners, vec!["gov.nasa.jpf.FooListener"]);
}

#[test]
fn tar_sources_fail_with_missing_capability() -> anyhow::Result<()> {
    let base = temp_dir("tar");
    let tarball = base.join("classes.tar.gz");
    write_file(&tarball, b"not really gzip")?;

    let result = Coordinator::new().analyze_source(&tarball, &sequential());
    let Err(AutodocError::Read(ReadError::UnsupportedFormat { capability, .. })) = &result else {
        panic!("expected unsupported format, got {result:?}");
    };
    assert_eq!(capability, "gzip/tar decompression");
    let message = result.unwrap_err().to_string();
    assert!(message.contains("decompression capability"), "{message}");
    Ok(())
}

#[test]
fn one_bad_source_does_not_stop_the_others() -> anyhow::Result<()> {
    let base = temp_dir("multi");
    let jar = base.join("ok.jar");
    write_jar(&jar, &[("gov/nasa/jpf/AListener.class", CLASS_BYTES)])?;
    let missing = base.join("missing.jar");

    let results =
        Coordinator::new().analyze_sources(&[missing.clone(), jar.clone()], &sequential());
    assert_eq!(results.len(), 2);
    assert!(matches!(
        results[0].1,
        Err(AutodocError::Read(ReadError::NotFound(_)))
    ));
    let ok = results[1].1.as_ref().unwrap();
    assert!(ok.contains(FactKind::Listener, "gov.nasa.jpf.AListener"));
    Ok(())
}

#[test]
fn cli_analyze_emits_json_per_source() -> anyhow::Result<()> {
    let bin = env!("CARGO_BIN_EXE_jpf-autodoc");
    let base = temp_dir("cli");
    let jar = base.join("jpf.jar");
    write_jar(
        &jar,
        &[
            ("gov/nasa/jpf/Listener.class", CLASS_BYTES),
            ("gov/nasa/jpf/search/SearchListener.class", CLASS_BYTES),
        ],
    )?;
    let jar_arg = jar.to_string_lossy().to_string();

    let out = run_json(
        bin,
        &["--no-site", "analyze", &jar_arg, "--types-only", "--validate", "--threads", "2"],
    )?;
    let reports = out.as_array().unwrap();
    assert_eq!(reports.len(), 1);
    let result = &reports[0]["result"];
    assert!(result["listeners"]["gov.nasa.jpf.search.SearchListener"].is_object());
    assert_eq!(result["config_options"].as_object().unwrap().len(), 0);
    assert_eq!(result["metadata"]["units_analyzed"], 2);
    assert_eq!(result["validation"]["valid"], true);
    let relationships: Vec<&str> = result["cross_references"]
        .as_object()
        .unwrap()
        .values()
        .filter_map(|x| x["relationship"].as_str())
        .collect();
    assert!(relationships.contains(&"INHERITANCE"));

    let units = run_json(bin, &["--no-site", "units", &jar_arg])?;
    assert_eq!(units["count"], 2);
    assert_eq!(units["units"][0]["provenance"], "archive_member");
    Ok(())
}
