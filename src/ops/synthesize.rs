//! One synthesizer run over the workspace.
//!
//! 1. Look up the source roots of every bundle and fix its project name.
//! 2. Build the dependency graph once.
//! 3. Per bundle: reconcile files, compute filters, write the project.
//! 4. Whole-run diagnostics.

use std::collections::{BTreeMap, BTreeSet};

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};

use super::report::{
    project_cycles, unused_libraries, unused_projects, unused_root, BundleSummary, Report,
};
use crate::catalog::{CatalogEntry, RootOrigin, SourceRootCatalog};
use crate::core::workspace::{
    CLASSPATH_FILE, LOCAL_FAMILY, MANUAL_OVERRIDE_FILE, NO_SOURCE_FAMILY, OUTPUT_DIR,
    PROJECTS_DIR, PROJECT_FILE,
};
use crate::core::{Bundle, Workspace};
use crate::emit::{read_manual_override, resolve_dependencies, ProjectFileEmitter};
use crate::graph::DependencyGraph;
use crate::reconcile::{FileReconciler, Filters, InclusionExclusionComputer, MappingKey};
use crate::sources::{BundleIndex, PluginDirIndex};
use crate::util::fs::list_files;
use crate::util::{Diagnostic, GlobalContext, SynthError};

/// Options for a run.
#[derive(Debug, Clone)]
pub struct SynthesizeOptions {
    /// Draw a progress bar over the bundles
    pub progress: bool,
}

impl Default for SynthesizeOptions {
    fn default() -> Self {
        SynthesizeOptions { progress: true }
    }
}

/// A bundle with its catalog entry and project name.
#[derive(Debug)]
struct Plan {
    bundle: String,
    project: String,
    entry: CatalogEntry,
}

/// Result of one bundle.
#[derive(Debug)]
struct BundleOutcome {
    summary: BundleSummary,
    mapping_roots: BTreeSet<String>,
    written: usize,
    pruned: usize,
}

/// Run the synthesizer on the workspace at the context's working directory.
pub fn synthesize(ctx: &GlobalContext, opts: &SynthesizeOptions) -> Result<Report> {
    let ws = Workspace::load(ctx)?;
    let plugins_dir = ctx.plugins_dir(&ws.config().workspace);
    let index = PluginDirIndex::load(&plugins_dir)?;
    if index.is_empty() {
        tracing::warn!("no bundles found in {}", index.path().display());
    } else {
        tracing::info!("Indexed {} bundles from {}", index.len(), index.path().display());
    }
    synthesize_index(&ws, &index, opts)
}

/// Run the synthesizer over bundles from any index.
pub fn synthesize_index(
    ws: &Workspace,
    index: &dyn BundleIndex,
    opts: &SynthesizeOptions,
) -> Result<Report> {
    let mut catalog = SourceRootCatalog::scan(ws)?;
    let plans = plan_projects(ws, index, &mut catalog);
    let projects: BTreeMap<String, String> = plans
        .iter()
        .map(|p| (p.bundle.clone(), p.project.clone()))
        .collect();

    let graph = DependencyGraph::build(index);
    let mut report = Report::default();
    report
        .diagnostics
        .extend(graph.diagnostics().into_iter().map(Diagnostic::logged));

    let pb = if opts.progress && plans.len() > 1 {
        let pb = ProgressBar::new(plans.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
                .progress_chars("#>-"),
        );
        Some(pb)
    } else {
        None
    };

    let mut unused_roots = Vec::new();
    for plan in &plans {
        if let Some(pb) = &pb {
            pb.set_message(plan.bundle.clone());
        }

        let Some(bundle) = index.get(&plan.bundle) else {
            continue;
        };
        let outcome = synthesize_bundle(
            ws,
            bundle,
            plan,
            &mut catalog,
            &graph,
            &projects,
            &mut report.diagnostics,
        )
        .with_context(|| format!("failed to synthesize project for `{}`", plan.bundle))?;

        for root in &plan.entry.roots {
            let files = catalog.files(root)?;
            if let Some(unused) = unused_root(
                &plan.bundle,
                root,
                files,
                outcome.mapping_roots.iter().map(String::as_str),
            ) {
                unused_roots.push(unused);
            }
        }

        report.written += outcome.written;
        report.pruned += outcome.pruned;
        report.bundles.push(outcome.summary);

        if let Some(pb) = &pb {
            pb.inc(1);
        }
    }

    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    unused_roots.sort();
    for unused in &unused_roots {
        let message = match unused.uncovered {
            None => format!("source root {} is unused", unused.root),
            Some(n) => format!("source root {} has {} files outside mappings", unused.root, n),
        };
        tracing::debug!("[{}] {}", unused.bundle, message);
    }
    report.unused_roots = unused_roots;

    report.unused_libraries = unused_libraries(&ws.library_repos()?, catalog.entries().values());

    let produced: BTreeSet<String> = projects.values().cloned().collect();
    report.unused_projects = unused_projects(&ws.existing_projects()?, &produced);

    report.cycles = project_cycles(&graph, &projects);
    for cycle in &report.cycles {
        report.diagnostics.push(
            Diagnostic::warning(format!("dependency cycle: {}", cycle.join(" -> "))).logged(),
        );
    }

    tracing::info!(
        "Synthesized {} projects ({} descriptors written)",
        report.bundles.len(),
        report.written
    );

    Ok(report)
}

/// Look up every bundle in the catalog and name its project.
fn plan_projects(
    ws: &Workspace,
    index: &dyn BundleIndex,
    catalog: &mut SourceRootCatalog,
) -> Vec<Plan> {
    index
        .ids()
        .into_iter()
        .map(|id| {
            let entry = catalog.lookup(&id);
            let family = match entry.family() {
                Some(family) => family.to_string(),
                None if ws.project_dir(&ws.project_name(LOCAL_FAMILY, &id)).is_dir() => {
                    LOCAL_FAMILY.to_string()
                }
                None => NO_SOURCE_FAMILY.to_string(),
            };
            let project = ws.project_name(&family, &id);
            Plan {
                bundle: id,
                project,
                entry,
            }
        })
        .collect()
}

/// Files already in a project folder, workspace-relative.
///
/// Generated descriptors, IDE settings, the manual override file and the
/// output tree are not source.
fn local_files(ws: &Workspace, project: &str) -> Result<Vec<String>> {
    let skipped = [PROJECT_FILE, CLASSPATH_FILE, MANUAL_OVERRIDE_FILE];
    let skipped_dirs = [format!("{}/", OUTPUT_DIR), ".settings/".to_string()];

    Ok(list_files(&ws.project_dir(project))?
        .into_iter()
        .filter(|f| !skipped.contains(&f.as_str()))
        .filter(|f| !skipped_dirs.iter().any(|d| f.starts_with(d.as_str())))
        .map(|f| format!("{}/{}/{}", PROJECTS_DIR, project, f))
        .collect())
}

fn synthesize_bundle(
    ws: &Workspace,
    bundle: &Bundle,
    plan: &Plan,
    catalog: &mut SourceRootCatalog,
    graph: &DependencyGraph,
    projects: &BTreeMap<String, String>,
    diagnostics: &mut Vec<Diagnostic>,
) -> Result<BundleOutcome> {
    let id = bundle.id();
    let correction = ws.config().bundle(id);
    let project_dir = ws.project_dir(&plan.project);

    let manual = read_manual_override(&project_dir)?;
    let mut pool = local_files(ws, &plan.project)?;

    let entry = &plan.entry;
    if entry.origin == RootOrigin::Explicit
        && entry.roots.is_empty()
        && !entry.missing.is_empty()
        && pool.is_empty()
    {
        return Err(SynthError::MissingLibraryRoots {
            bundle: id.to_string(),
            roots: entry.missing.clone(),
        }
        .into());
    }
    for missing in &entry.missing {
        diagnostics.push(
            Diagnostic::warning(format!("configured source root {} does not exist", missing))
                .for_bundle(id)
                .with_location(ws.resolve(missing))
                .logged(),
        );
    }

    for root in &entry.roots {
        pool.extend(catalog.files(root)?.iter().map(|f| format!("{}/{}", root, f)));
    }
    pool.sort();
    pool.dedup();

    let mut targets: BTreeSet<String> = bundle.files().clone();
    targets.extend(correction.extra_files.iter().cloned());
    targets.extend(manual.iter().flatten().cloned());
    for removed in &correction.removed_files {
        targets.remove(removed);
    }

    let reconciler = FileReconciler::new(pool.iter().cloned());
    let reconciliation = reconciler.reconcile(id, &targets)?;

    let (computer, invalid) = InclusionExclusionComputer::new(id, &correction.exclude);
    diagnostics.extend(invalid);

    let roots = reconciliation.roots();
    let mut filters: BTreeMap<MappingKey, Filters> = BTreeMap::new();
    for (key, files) in reconciliation.real() {
        let prefix = format!("{}/", key.root);
        let under_root: Vec<String> = pool
            .iter()
            .filter_map(|p| p.strip_prefix(&prefix))
            .map(str::to_string)
            .collect();
        let (filter, found) =
            computer.compute(key, &under_root, files, roots.iter().copied());
        diagnostics.extend(found);
        filters.insert(key.clone(), filter);
    }

    let (dependencies, unresolved) = resolve_dependencies(id, graph, &correction, projects);
    diagnostics.extend(unresolved);

    let missing_files = reconciliation.missing().map_or(0, BTreeSet::len);
    if missing_files > 0 {
        diagnostics.push(
            Diagnostic::note(format!("{} files without source", missing_files))
                .for_bundle(id)
                .logged(),
        );
    }

    let mut written = 0;
    let mut pruned = 0;
    if manual.is_some() {
        tracing::info!("{}: manual override, descriptors left untouched", plan.project);
    } else {
        let emitter = ProjectFileEmitter::new(ws);
        let descriptor = emitter.describe(
            bundle,
            &plan.project,
            &reconciliation,
            &filters,
            dependencies.clone(),
        );
        let emitted = emitter.emit(&descriptor)?;
        written = emitted.written.len();
        pruned = emitted.pruned.len();
    }

    Ok(BundleOutcome {
        summary: BundleSummary {
            bundle: id.to_string(),
            project: plan.project.clone(),
            dependencies,
            dependents: graph.merged_dependents(id).len(),
            transitive_dependents: graph.transitive_dependents(id).len(),
            missing_files,
            manual: manual.is_some(),
        },
        mapping_roots: roots.into_iter().map(str::to_string).collect(),
        written,
        pruned,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::manifest::{Attributes, BUNDLE_SYMBOLIC_NAME, BUNDLE_VERSION, REQUIRE_BUNDLE};
    use crate::core::BundleSet;
    use crate::util::config::SourceOverride;
    use crate::util::Config;
    use std::path::Path;
    use tempfile::TempDir;

    fn write(root: &Path, rel: &str, contents: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
    }

    fn bundle(id: &str, requires: &str, files: &[&str]) -> Bundle {
        let mut attrs = Attributes::new();
        attrs.insert(BUNDLE_SYMBOLIC_NAME.into(), id.into());
        attrs.insert(BUNDLE_VERSION.into(), "1.0.0".into());
        if !requires.is_empty() {
            attrs.insert(REQUIRE_BUNDLE.into(), requires.into());
        }
        Bundle::from_manifest(attrs, files.iter().map(|f| f.to_string())).unwrap()
    }

    fn sample_workspace(tmp: &TempDir) {
        let root = tmp.path();
        write(root, "libraries/core/org.example.a/META-INF/MANIFEST.MF", "Bundle-SymbolicName: org.example.a\n");
        write(root, "libraries/core/org.example.a/plugin.xml", "<plugin/>");
        write(root, "libraries/core/org.example.a/src/org/example/a/A.java", "");
        write(root, "libraries/core/org.example.a/src/org/example/a/Unused.java", "");
        write(root, "libraries/core/org.example.b/META-INF/MANIFEST.MF", "Bundle-SymbolicName: org.example.b\n");
        write(root, "libraries/core/org.example.b/src/org/example/b/B.java", "");
        std::fs::create_dir_all(root.join("libraries/idle")).unwrap();
        std::fs::create_dir_all(root.join("projects/ide-core-org.example.gone")).unwrap();
    }

    fn sample_index() -> BundleSet {
        [
            bundle(
                "org.example.a",
                "org.example.b;visibility:=reexport",
                &[
                    "META-INF/MANIFEST.MF",
                    "plugin.xml",
                    "org/example/a/A.class",
                    "org/example/a/A$1.class",
                    "about.html",
                ],
            ),
            bundle(
                "org.example.b",
                "org.example.a",
                &["META-INF/MANIFEST.MF", "org/example/b/B.class"],
            ),
        ]
        .into_iter()
        .collect()
    }

    fn quiet() -> SynthesizeOptions {
        SynthesizeOptions { progress: false }
    }

    #[test]
    fn test_run_generates_projects() {
        let tmp = TempDir::new().unwrap();
        sample_workspace(&tmp);
        let ws = Workspace::new(tmp.path().to_path_buf(), Config::default());

        let report = synthesize_index(&ws, &sample_index(), &quiet()).unwrap();

        let classpath = std::fs::read_to_string(
            tmp.path().join("projects/ide-core-org.example.a/.classpath"),
        )
        .unwrap();
        assert!(classpath.contains(r#"path="core_org.example.a_src""#));
        assert!(classpath.contains(r#"including="org/example/a/A.java""#));
        assert!(classpath.contains(r#"path="/ide-core-org.example.b" combineaccessrules="false" exported="true""#));
        assert!(classpath.contains("x-miss-x"));

        let project = std::fs::read_to_string(
            tmp.path().join("projects/ide-core-org.example.a/.project"),
        )
        .unwrap();
        assert!(project.contains("PARENT-2-PROJECT_LOC/libraries/core/org.example.a/src"));

        assert_eq!(report.bundles.len(), 2);
        assert_eq!(report.bundles[0].missing_files, 1);
        assert_eq!(report.unused_libraries, vec!["idle"]);
        assert_eq!(report.unused_projects, vec!["ide-core-org.example.gone"]);
        assert_eq!(
            report.cycles,
            vec![vec![
                "ide-core-org.example.a",
                "ide-core-org.example.b",
                "ide-core-org.example.a"
            ]]
        );
        assert!(report
            .unused_roots
            .iter()
            .all(|r| r.uncovered.is_some()));
    }

    #[test]
    fn test_second_run_is_byte_identical() {
        let tmp = TempDir::new().unwrap();
        sample_workspace(&tmp);
        let ws = Workspace::new(tmp.path().to_path_buf(), Config::default());

        let first = synthesize_index(&ws, &sample_index(), &quiet()).unwrap();
        assert_eq!(first.written, 4);

        let path = tmp.path().join("projects/ide-core-org.example.a/.classpath");
        let before = std::fs::read(&path).unwrap();
        let mtime = std::fs::metadata(&path).unwrap().modified().unwrap();

        let second = synthesize_index(&ws, &sample_index(), &quiet()).unwrap();
        assert_eq!(second.written, 0);
        assert_eq!(std::fs::read(&path).unwrap(), before);
        assert_eq!(std::fs::metadata(&path).unwrap().modified().unwrap(), mtime);
        assert_eq!(first.to_string(), second.to_string());
    }

    #[test]
    fn test_manual_override_suppresses_descriptors() {
        let tmp = TempDir::new().unwrap();
        sample_workspace(&tmp);
        write(
            tmp.path(),
            "projects/ide-core-org.example.b/.manual",
            "# hand-maintained\nextra/file.txt\n",
        );
        write(tmp.path(), "projects/ide-core-org.example.b/bin/9/x.class", "");
        let ws = Workspace::new(tmp.path().to_path_buf(), Config::default());

        let report = synthesize_index(&ws, &sample_index(), &quiet()).unwrap();

        let dir = tmp.path().join("projects/ide-core-org.example.b");
        assert!(!dir.join(".classpath").exists());
        assert!(dir.join("bin/9").is_dir());
        let b = report.bundles.iter().find(|b| b.bundle == "org.example.b").unwrap();
        assert!(b.manual);
        assert_eq!(b.missing_files, 1);
    }

    #[test]
    fn test_missing_explicit_roots_without_local_source_is_fatal() {
        let tmp = TempDir::new().unwrap();
        sample_workspace(&tmp);
        let mut config = Config::default();
        config.sources.insert(
            "org.example.b".into(),
            SourceOverride {
                roots: vec!["gone/org.example.b".into()],
            },
        );
        let ws = Workspace::new(tmp.path().to_path_buf(), config);

        let err = synthesize_index(&ws, &sample_index(), &quiet()).unwrap_err();
        let synth = err.downcast_ref::<SynthError>().unwrap();
        assert!(matches!(synth, SynthError::MissingLibraryRoots { .. }));
    }

    #[test]
    fn test_unknown_source_gets_nosrc_project() {
        let tmp = TempDir::new().unwrap();
        let ws = Workspace::new(tmp.path().to_path_buf(), Config::default());
        let index: BundleSet = [bundle("org.other.thing", "", &["plugin.xml"])]
            .into_iter()
            .collect();

        let report = synthesize_index(&ws, &index, &quiet()).unwrap();
        assert_eq!(report.bundles[0].project, "ide-nosrc-org.other.thing");
        assert!(tmp
            .path()
            .join("projects/ide-nosrc-org.other.thing/.classpath")
            .is_file());
    }
}
