//! Unit tests for migrator-engine.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use migrator_rules::{
    DeprecatedModule, DeprecationAction, RemovedField, RemovedModel, RenamedField, RenamedModel,
    RuleFragment, RuleSetCompiler, ScopeSpec, ScopedFragment, StaticSource, TextCheck,
    VersionCatalog,
};
use rstest::{fixture, rstest};
use tempfile::TempDir;

use crate::rewriters::{
    AttrsToExpressions, BumpVersion, ChatterBlocks, DomainHelpers, ReadGroupArguments,
    RemoveMigrationFolder, RemoveUstr, SetModuleInstallable, SlugifyHelper, SqlConstraints,
    TranslationFormat, TreeToList,
};
use crate::{
    Aggregator, EngineError, Migration, MigrationOptions, ModuleReport, RewriteContext, Rewriter,
    RewriterRegistry, Severity,
};

const MANIFEST: &str = r#"{
    "name": "Demo",
    "version": "16.0.1.0.0",
    "depends": ["base"],
    "installable": False,
}
"#;

#[fixture]
fn workspace() -> TempDir {
    tempfile::tempdir().expect("tempdir")
}

fn write_files(root: &Path, files: &[(&str, &str)]) {
    for (relative, content) in files {
        let path = root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create directories");
        }
        fs::write(path, content).expect("write file");
    }
}

/// Creates the module `demo` with a default manifest and `files`.
fn module(workspace: &TempDir, files: &[(&str, &str)]) -> PathBuf {
    let root = workspace.path().join("demo");
    write_files(&root, &[("__manifest__.py", MANIFEST)]);
    write_files(&root, files);
    root
}

fn read(root: &Path, relative: &str) -> String {
    fs::read_to_string(root.join(relative)).expect("read file")
}

fn fragment(init: &str, target: &str, rules: RuleFragment) -> ScopedFragment {
    let scope = ScopeSpec::step(init, target)
        .resolve(&VersionCatalog::odoo(), "test")
        .expect("scope resolves");
    ScopedFragment::new("test", scope, rules)
}

fn prepare(
    fragments: Vec<ScopedFragment>,
    registry: RewriterRegistry,
    init: &str,
    target: &str,
    options: MigrationOptions,
) -> Migration {
    let compiler = RuleSetCompiler::new(VersionCatalog::odoo())
        .with_source(StaticSource::registered(fragments));
    Migration::prepare(compiler, registry, init, target, options).expect("migration prepares")
}

fn run(migration: &Migration, workspace: &TempDir) -> ModuleReport {
    migration
        .run_module(workspace.path(), "demo")
        .expect("module migrates")
}

/// Runs one rewriter alone over `files` and returns the module root.
fn rewrite_with(
    workspace: &TempDir,
    registry: RewriterRegistry,
    init: &str,
    target: &str,
    files: &[(&str, &str)],
) -> (PathBuf, ModuleReport) {
    let root = module(workspace, files);
    let migration = prepare(Vec::new(), registry, init, target, MigrationOptions::new());
    let report = run(&migration, workspace);
    (root, report)
}

// =============================================================================
// Aggregator and report
// =============================================================================

#[test]
fn diagnostics_group_by_message_with_sorted_files() {
    let mut aggregator = Aggregator::new("demo");
    aggregator.warning("Check me", Some(Path::new("views/b.xml")));
    aggregator.warning("Check me", Some(Path::new("models/a.py")));
    aggregator.error("Check me", Some(Path::new("views/b.xml")));
    aggregator.info("Done", None);

    let report = aggregator.into_report();
    assert_eq!(report.entries().len(), 2);
    let entry = report.entry("Check me").expect("grouped entry");
    assert_eq!(entry.severity(), Severity::Error);
    assert_eq!(entry.files(), ["models/a.py", "views/b.xml"]);
    assert!(report.has_errors());
}

#[test]
fn counts_since_an_earlier_snapshot_only_cover_new_diagnostics() {
    let mut aggregator = Aggregator::new("demo");
    aggregator.warning("first", None);
    let before = aggregator.counts();
    aggregator.warning("second", None);
    aggregator.error("third", None);

    let delta = aggregator.counts().since(before);
    assert_eq!((delta.info, delta.warning, delta.error), (0, 1, 1));
}

#[test]
fn reports_serialise_grouped_entries() {
    let mut aggregator = Aggregator::new("demo");
    aggregator.error("Check me", Some(Path::new("views/b.xml")));
    aggregator.error("Check me", Some(Path::new("models/a.py")));
    aggregator.info("Done", None);
    let rendered =
        serde_json::to_string_pretty(&aggregator.into_report()).expect("report serialises");

    insta::assert_snapshot!(rendered, @r#"
    {
      "module": "demo",
      "entries": [
        {
          "message": "Check me",
          "severity": "error",
          "files": [
            "models/a.py",
            "views/b.xml"
          ]
        },
        {
          "message": "Done",
          "severity": "info",
          "files": []
        }
      ]
    }
    "#);
}

// =============================================================================
// Driver and text rules
// =============================================================================

#[rstest]
fn renamed_files_receive_the_rules_of_their_new_name(workspace: TempDir) {
    let rules = RuleFragment::default()
        .with_rename("old.txt", "new.txt")
        .with_replacement(".txt", "foo", "bar");
    let root = module(&workspace, &[("old.txt", "foo\n")]);
    let migration = prepare(
        vec![fragment("12.0", "13.0", rules)],
        RewriterRegistry::empty(),
        "12.0",
        "13.0",
        MigrationOptions::new().with_extensions([".py", ".txt"]),
    );

    let report = run(&migration, &workspace);

    assert_eq!(read(&root, "new.txt"), "bar\n");
    assert!(!root.join("old.txt").exists());
    assert!(report.entries().is_empty());
}

#[rstest]
fn renames_into_the_allow_list_are_rewritten(workspace: TempDir) {
    let rules = RuleFragment::default()
        .with_rename("legacy.txt", "legacy.csv")
        .with_replacement(".csv", ";", ",");
    let root = module(&workspace, &[("data/legacy.txt", "id;name\n")]);
    let migration = prepare(
        vec![fragment("12.0", "13.0", rules)],
        RewriterRegistry::empty(),
        "12.0",
        "13.0",
        MigrationOptions::new(),
    );

    run(&migration, &workspace);

    assert_eq!(read(&root, "data/legacy.csv"), "id,name\n");
}

#[rstest]
fn renames_onto_existing_files_are_reported(workspace: TempDir) {
    let rules = RuleFragment::default().with_rename("old.txt", "new.txt");
    let root = module(&workspace, &[("old.txt", "old\n"), ("new.txt", "new\n")]);
    let migration = prepare(
        vec![fragment("12.0", "13.0", rules)],
        RewriterRegistry::empty(),
        "12.0",
        "13.0",
        MigrationOptions::new().with_extensions([".txt"]),
    );

    let report = run(&migration, &workspace);

    assert_eq!(read(&root, "old.txt"), "old\n");
    assert_eq!(read(&root, "new.txt"), "new\n");
    let entry = report
        .entry("Cannot rename 'old.txt' to 'new.txt': the target already exists")
        .expect("rename conflict entry");
    assert_eq!(entry.severity(), Severity::Error);
    assert_eq!(entry.files(), ["old.txt"]);
}

#[cfg(unix)]
#[rstest]
#[case::regular(0o644)]
#[case::executable(0o755)]
fn rewritten_files_keep_their_permissions(workspace: TempDir, #[case] mode: u32) {
    use std::os::unix::fs::PermissionsExt;

    let root = module(&workspace, &[("scripts/tool.py", "x = 'foo'\n")]);
    let script = root.join("scripts/tool.py");
    fs::set_permissions(&script, fs::Permissions::from_mode(mode)).expect("set mode");
    let rules = RuleFragment::default().with_replacement(".py", "foo", "bar");
    let migration = prepare(
        vec![fragment("12.0", "13.0", rules)],
        RewriterRegistry::empty(),
        "12.0",
        "13.0",
        MigrationOptions::new(),
    );

    run(&migration, &workspace);

    assert_eq!(read(&root, "scripts/tool.py"), "x = 'bar'\n");
    let metadata = fs::metadata(&script).expect("stat rewritten file");
    assert_eq!(metadata.permissions().mode() & 0o777, mode);
}

/// Log sink shared between a test and its subscriber.
#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    fn text(&self) -> String {
        let bytes = self.0.lock().expect("log buffer lock").clone();
        String::from_utf8(bytes).expect("logs are UTF-8")
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().expect("log buffer lock").extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[test]
fn ordering_hazards_are_logged_once_per_step() {
    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::WARN)
        .finish();
    let rules = RuleFragment::default()
        .with_replacement(".py", "tree", "list")
        .with_replacement(".py", "list", "items");

    tracing::subscriber::with_default(subscriber, || {
        prepare(
            vec![fragment("16.0", "17.0", rules)],
            RewriterRegistry::empty(),
            "16.0",
            "17.0",
            MigrationOptions::new(),
        );
    });

    let text = logs.text();
    assert_eq!(text.matches("ordering_hazard").count(), 1, "{text}");
}

#[rstest]
fn one_message_over_many_files_yields_one_entry(workspace: TempDir) {
    let mut rules = RuleFragment::default();
    rules.text_warnings.insert(
        ".py".to_owned(),
        vec![TextCheck::new(r"\bname_get\b", "name_get is replaced by _compute_display_name")],
    );
    module(
        &workspace,
        &[
            ("models/c.py", "def name_get(self):\n    pass\n"),
            ("models/a.py", "def name_get(self):\n    pass\n"),
            ("models/b.py", "def name_get(self):\n    pass\n"),
        ],
    );
    let migration = prepare(
        vec![fragment("16.0", "17.0", rules)],
        RewriterRegistry::empty(),
        "16.0",
        "17.0",
        MigrationOptions::new(),
    );

    let report = run(&migration, &workspace);

    assert_eq!(report.entries().len(), 1);
    let entry = report
        .entry("name_get is replaced by _compute_display_name")
        .expect("warning entry");
    assert_eq!(entry.severity(), Severity::Warning);
    assert_eq!(entry.files(), ["models/a.py", "models/b.py", "models/c.py"]);
}

#[rstest]
fn files_that_are_not_utf8_are_skipped_with_a_warning(workspace: TempDir) {
    let root = module(&workspace, &[]);
    fs::write(root.join("binary.py"), [0xff, 0xfe, 0x00]).expect("write binary file");
    let rules = RuleFragment::default().with_replacement("*", "x", "y");
    let migration = prepare(
        vec![fragment("12.0", "13.0", rules)],
        RewriterRegistry::empty(),
        "12.0",
        "13.0",
        MigrationOptions::new(),
    );

    let report = run(&migration, &workspace);

    let entry = report.entry(crate::NOT_UTF8_MESSAGE).expect("utf-8 entry");
    assert_eq!(entry.files(), ["binary.py"]);
}

#[test]
fn unknown_rewriters_abort_preparation() {
    let rules = RuleFragment::default().with_rewriter("does_not_exist");
    let compiler = RuleSetCompiler::new(VersionCatalog::odoo())
        .with_source(StaticSource::registered(vec![fragment("12.0", "13.0", rules)]));

    let outcome = Migration::prepare(
        compiler,
        RewriterRegistry::empty(),
        "12.0",
        "13.0",
        MigrationOptions::new(),
    );

    assert!(matches!(
        outcome,
        Err(EngineError::UnknownRewriter { ref name, .. }) if name == "does_not_exist"
    ));
}

#[test]
fn missing_modules_are_configuration_errors() {
    let dir = tempfile::tempdir().expect("tempdir");
    let migration = prepare(
        Vec::new(),
        RewriterRegistry::empty(),
        "12.0",
        "13.0",
        MigrationOptions::new(),
    );

    let outcome = migration.run_module(dir.path(), "absent");

    assert!(matches!(outcome, Err(EngineError::ModuleNotFound { .. })));
}

#[rstest]
fn directories_are_scanned_for_modules(workspace: TempDir) {
    module(&workspace, &[]);
    fs::create_dir_all(workspace.path().join("not_a_module")).expect("create directory");
    let migration = prepare(
        Vec::new(),
        RewriterRegistry::empty(),
        "12.0",
        "13.0",
        MigrationOptions::new(),
    );

    let reports = migration
        .run_directory(workspace.path())
        .expect("directory migrates");

    let names: Vec<&str> = reports.iter().map(ModuleReport::module).collect();
    assert_eq!(names, ["demo"]);
}

/// Deletes the manifest, leaving later steps without one.
struct DropManifest;

impl Rewriter for DropManifest {
    fn name(&self) -> &'static str {
        "drop_manifest"
    }

    fn scope(&self) -> ScopeSpec {
        ScopeSpec::step("12.0", "13.0")
    }

    fn rewrite(&self, context: &mut RewriteContext<'_>) -> Result<(), EngineError> {
        let manifest = context.manifest().to_path_buf();
        fs::remove_file(&manifest).map_err(|error| EngineError::io(manifest, error))
    }
}

#[rstest]
fn steps_that_cannot_run_end_the_module_with_an_error(workspace: TempDir) {
    module(&workspace, &[]);
    let migration = prepare(
        Vec::new(),
        RewriterRegistry::empty().with(DropManifest),
        "12.0",
        "13.0",
        MigrationOptions::new(),
    );

    let report = run(&migration, &workspace);

    let stopped = report
        .entries()
        .iter()
        .find(|entry| entry.message().starts_with("Migration stopped at step always: no manifest"))
        .expect("stopped entry");
    assert_eq!(stopped.severity(), Severity::Error);
    assert!(stopped.files().is_empty());
}

#[rstest]
fn modules_that_cannot_be_opened_do_not_stop_the_others(workspace: TempDir) {
    module(&workspace, &[]);
    let migration = prepare(
        Vec::new(),
        RewriterRegistry::empty(),
        "12.0",
        "13.0",
        MigrationOptions::new(),
    );
    let names = ["ghost".to_owned(), "demo".to_owned()];

    let reports = migration.run_modules(workspace.path(), &names);

    let [ghost, demo] = reports.as_slice() else {
        panic!("expected two reports, got {reports:?}");
    };
    assert_eq!(ghost.module(), "ghost");
    assert!(ghost.has_errors());
    assert!(
        ghost
            .entries()
            .iter()
            .any(|entry| entry.message().starts_with("Migration failed: module 'ghost' not found"))
    );
    assert_eq!(demo.module(), "demo");
    assert!(!demo.has_errors());
}

// =============================================================================
// Deprecated-entity resolver
// =============================================================================

fn deprecated(
    action: DeprecationAction,
    new: Option<&str>,
    note: Option<&str>,
) -> DeprecatedModule {
    DeprecatedModule {
        name: "mod_x".to_owned(),
        action,
        new_name: new.map(str::to_owned),
        note: note.map(str::to_owned),
    }
}

fn migrate_manifest(
    workspace: &TempDir,
    depends: &str,
    deprecation: DeprecatedModule,
) -> (String, ModuleReport) {
    let manifest = format!("{{\"name\": \"Demo\", \"depends\": {depends}}}\n");
    let root = module(workspace, &[("__manifest__.py", &manifest)]);
    let mut rules = RuleFragment::default();
    rules.deprecated_modules.push(deprecation);
    let migration = prepare(
        vec![fragment("12.0", "13.0", rules)],
        RewriterRegistry::empty(),
        "12.0",
        "13.0",
        MigrationOptions::new(),
    );
    let report = run(&migration, workspace);
    (read(&root, "__manifest__.py"), report)
}

#[rstest]
#[case::replaced_when_absent(
    r#"["mod_x"]"#,
    r#"["mod_y"]"#,
    "'mod_x' merged in 'mod_y'. Replacing dependency.",
    Severity::Info
)]
#[case::kept_when_already_present(
    r#"["mod_x", "mod_y"]"#,
    r#"["mod_x", "mod_y"]"#,
    "'mod_x' merged in 'mod_y'. You should remove the dependency to 'mod_x' manually.",
    Severity::Error
)]
fn merged_dependencies(
    workspace: TempDir,
    #[case] depends: &str,
    #[case] expected: &str,
    #[case] message: &str,
    #[case] severity: Severity,
) {
    let deprecation = deprecated(DeprecationAction::Merged, Some("mod_y"), None);

    let (manifest, report) = migrate_manifest(&workspace, depends, deprecation);

    assert_eq!(
        manifest,
        format!("{{\"name\": \"Demo\", \"depends\": {expected}}}\n")
    );
    let entry = report.entry(message).expect("deprecation entry");
    assert_eq!(entry.severity(), severity);
    assert_eq!(entry.files(), ["__manifest__.py"]);
}

#[rstest]
#[case::removed(
    deprecated(DeprecationAction::Removed, None, None),
    r#"["mod_x", "base"]"#,
    "Depends on removed module 'mod_x'",
    Severity::Error
)]
#[case::renamed(
    deprecated(DeprecationAction::Renamed, Some("mod_y"), None),
    r#"["mod_y", "base"]"#,
    "Replaced dependency of 'mod_x' by 'mod_y'.",
    Severity::Info
)]
#[case::oca_moved(
    deprecated(DeprecationAction::OcaMoved, Some("mod_y"), Some("OCA/server-tools")),
    r#"["mod_y", "base"]"#,
    "Replaced dependency of 'mod_x' by 'mod_y' (OCA/server-tools)\nCheck that 'mod_y' is available on your system.",
    Severity::Warning
)]
fn deprecated_dependencies(
    workspace: TempDir,
    #[case] deprecation: DeprecatedModule,
    #[case] expected: &str,
    #[case] message: &str,
    #[case] severity: Severity,
) {
    let (manifest, report) = migrate_manifest(&workspace, r#"["mod_x", "base"]"#, deprecation);

    assert_eq!(
        manifest,
        format!("{{\"name\": \"Demo\", \"depends\": {expected}}}\n")
    );
    assert_eq!(report.entries().len(), 1);
    let entry = report.entry(message).expect("deprecation entry");
    assert_eq!(entry.severity(), severity);
    assert_eq!(entry.files(), ["__manifest__.py"]);
}

#[rstest]
fn unrelated_dependencies_are_left_alone(workspace: TempDir) {
    let deprecation = deprecated(DeprecationAction::Renamed, Some("mod_y"), None);

    let (manifest, report) = migrate_manifest(&workspace, r#"["mod_xy", "base"]"#, deprecation);

    assert_eq!(manifest, "{\"name\": \"Demo\", \"depends\": [\"mod_xy\", \"base\"]}\n");
    assert!(report.entries().is_empty());
}

fn entity_rules(rules: RuleFragment) -> Migration {
    prepare(
        vec![fragment("16.0", "17.0", rules)],
        RewriterRegistry::empty(),
        "16.0",
        "17.0",
        MigrationOptions::new(),
    )
}

fn channel_rename() -> RuleFragment {
    let mut rules = RuleFragment::default();
    rules.renamed_models.push(RenamedModel {
        old: "mail.channel".to_owned(),
        new: "discuss.channel".to_owned(),
        note: None,
    });
    rules
}

const CHANNEL_RENAMED: &str =
    "Model 'mail.channel' renamed to 'discuss.channel'. Check the remaining references.";

#[rstest]
#[case::python_class(
    "models/channel.py",
    "class Channel(models.Model):\n    _inherit = 'mail.channel'\n\n    def go(self):\n        return self.env[\"mail.channel\"]\n",
    "class Channel(models.Model):\n    _inherit = 'discuss.channel'\n\n    def go(self):\n        return self.env[\"discuss.channel\"]\n"
)]
#[case::xml_record(
    "data/channel.xml",
    "<odoo>\n    <record id=\"general\" model=\"mail.channel\">\n        <field name=\"name\">general</field>\n    </record>\n</odoo>\n",
    "<odoo>\n    <record id=\"general\" model=\"discuss.channel\">\n        <field name=\"name\">general</field>\n    </record>\n</odoo>\n"
)]
fn renamed_models_change_inside_their_scope(
    workspace: TempDir,
    #[case] file: &str,
    #[case] source: &str,
    #[case] expected: &str,
) {
    let root = module(&workspace, &[(file, source)]);

    let report = run(&entity_rules(channel_rename()), &workspace);

    assert_eq!(read(&root, file), expected);
    let entry = report.entry(CHANNEL_RENAMED).expect("rename entry");
    assert_eq!(entry.severity(), Severity::Warning);
    assert_eq!(entry.files(), [file]);
}

#[rstest]
#[case::python_class(
    "models/other.py",
    "class Other(models.Model):\n    _name = 'x.other'\n\n    topic = fields.Char(help='mail.channel')\n"
)]
#[case::module_level(
    "models/helpers.py",
    "CHANNEL_MODEL = 'mail.channel'\n"
)]
#[case::xml_record(
    "data/action.xml",
    "<odoo>\n    <record id=\"action\" model=\"ir.actions.act_window\">\n        <field name=\"context\">{'default_model': 'mail.channel'}</field>\n    </record>\n</odoo>\n"
)]
fn renamed_models_leave_other_scopes_alone(
    workspace: TempDir,
    #[case] file: &str,
    #[case] source: &str,
) {
    let root = module(&workspace, &[(file, source)]);

    let report = run(&entity_rules(channel_rename()), &workspace);

    assert_eq!(read(&root, file), source);
    assert!(report.entries().is_empty());
}

#[rstest]
fn removed_models_are_reported_where_a_scope_binds_them(workspace: TempDir) {
    let root = module(
        &workspace,
        &[
            (
                "models/legacy.py",
                "class Legacy(models.Model):\n    _inherit = ['x.gone', 'mail.thread']\n",
            ),
            (
                "models/other.py",
                "class Other(models.Model):\n    _name = 'x.other'\n\n    kind = fields.Char(help='x.gone')\n",
            ),
        ],
    );
    let mut rules = RuleFragment::default();
    rules.removed_models.push(RemovedModel {
        model: "x.gone".to_owned(),
        note: Some("use x.new".to_owned()),
    });

    let report = run(&entity_rules(rules), &workspace);

    let entry = report
        .entry("Model 'x.gone' has been removed (use x.new)")
        .expect("removal entry");
    assert_eq!(entry.severity(), Severity::Error);
    assert_eq!(entry.files(), ["models/legacy.py"]);
    assert_eq!(
        read(&root, "models/legacy.py"),
        "class Legacy(models.Model):\n    _inherit = ['x.gone', 'mail.thread']\n"
    );
}

#[rstest]
fn renamed_fields_change_only_inside_their_model(workspace: TempDir) {
    let source = "\
from odoo import models


class Partner(models.Model):
    _inherit = 'res.partner'

    def go(self):
        return self.mapped('mobile')


class Other(models.Model):
    _name = 'x.other'

    def go(self):
        return self.mapped('mobile')
";
    let root = module(&workspace, &[("models/partner.py", source)]);
    let mut rules = RuleFragment::default();
    rules.renamed_fields.push(RenamedField {
        model: "res.partner".to_owned(),
        old: "mobile".to_owned(),
        new: "phone".to_owned(),
        note: None,
    });
    rules.removed_fields.push(RemovedField {
        model: "x.other".to_owned(),
        field: "mobile".to_owned(),
        note: Some("use phone".to_owned()),
    });
    let migration = prepare(
        vec![fragment("17.0", "18.0", rules)],
        RewriterRegistry::empty(),
        "17.0",
        "18.0",
        MigrationOptions::new(),
    );

    let report = run(&migration, &workspace);

    let updated = read(&root, "models/partner.py");
    assert!(updated.contains("    _inherit = 'res.partner'\n\n    def go(self):\n        return self.mapped('phone')"));
    assert!(updated.contains("    _name = 'x.other'\n\n    def go(self):\n        return self.mapped('mobile')"));
    assert!(
        report
            .entry("Field 'mobile' of model 'res.partner' renamed to 'phone'. Check the remaining references.")
            .is_some()
    );
    let removed = report
        .entry("Field 'mobile' has been removed from model 'x.other' (use phone)")
        .expect("removal entry");
    assert_eq!(removed.severity(), Severity::Error);
}

// =============================================================================
// Structural rewriters
// =============================================================================

#[rstest]
fn manifests_are_made_installable_and_bumped(workspace: TempDir) {
    let registry = RewriterRegistry::empty()
        .with(SetModuleInstallable)
        .with(BumpVersion);
    let (root, _) = rewrite_with(&workspace, registry, "16.0", "17.0", &[]);

    assert_eq!(
        read(&root, "__manifest__.py"),
        r#"{
    "name": "Demo",
    "version": "17.0.1.0.0",
    "depends": ["base"],
    "installable": True,
}
"#
    );
}

#[rstest]
#[case::enabled(true)]
#[case::disabled(false)]
fn migration_folders_are_removed_on_request(workspace: TempDir, #[case] enabled: bool) {
    let root = module(&workspace, &[("migrations/16.0.1.0.0/pre-migrate.py", "pass\n")]);
    let migration = prepare(
        Vec::new(),
        RewriterRegistry::empty().with(RemoveMigrationFolder),
        "16.0",
        "17.0",
        MigrationOptions::new().with_remove_migration_folder(enabled),
    );

    let report = run(&migration, &workspace);

    assert_eq!(root.join("migrations").exists(), !enabled);
    assert_eq!(
        report.entry("Removed the 'migrations' folder").is_some(),
        enabled
    );
}

#[rstest]
fn translation_interpolation_moves_into_the_call(workspace: TempDir) {
    let source = "\
message = _(\"Hello %s\") % name
other = _('%(a)s and %(b)s') % {'a': first, 'b': second}
third = _(\"{} is {}\").format(left, right)
";
    let (root, _) = rewrite_with(
        &workspace,
        RewriterRegistry::empty().with(TranslationFormat),
        "13.0",
        "14.0",
        &[("models/demo.py", source)],
    );

    assert_eq!(
        read(&root, "models/demo.py"),
        "\
message = _(\"Hello %s\", name)
other = _('%(a)s and %(b)s', a=first, b=second)
third = _(\"%s is %s\", left, right)
"
    );
}

const READ_GROUP_SOURCE: &str = "\
from odoo import models


class ResPartner(models.Model):
    _inherit = \"res.partner\"

    def _compute_task_count(self):
        task_data = self.env['project.task']._read_group(
            domain=[('partner_id', 'in', self.ids)],
            fields=['partner_id'], groupby=['partner_id']
        )
        group_dependent = self.env['project.task']._read_group([
            ('depend_on_ids', 'in', task_data.ids),
            ], ['depend_on_ids'], ['depend_on_ids'])
        totals = self.env['account.move']._read_group([], ['amount', 'partner_id'], ['partner_id'])
";

#[rstest]
fn read_group_arguments_follow_the_new_signature(workspace: TempDir) {
    let (root, report) = rewrite_with(
        &workspace,
        RewriterRegistry::empty().with(ReadGroupArguments),
        "16.0",
        "17.0",
        &[("models/res_partner.py", READ_GROUP_SOURCE)],
    );

    assert_eq!(
        read(&root, "models/res_partner.py"),
        "\
from odoo import models


class ResPartner(models.Model):
    _inherit = \"res.partner\"

    def _compute_task_count(self):
        task_data = self.env['project.task']._read_group(
            domain=[('partner_id', 'in', self.ids)],
            aggregates=['__count'], groupby=['partner_id']
        )
        group_dependent = self.env['project.task']._read_group([
            ('depend_on_ids', 'in', task_data.ids),
            ], ['depend_on_ids'], ['__count'])
        totals = self.env['account.move']._read_group([], ['partner_id'], ['amount:sum'])
"
    );
    let entry = report
        .entries()
        .iter()
        .find(|entry| entry.message().starts_with("'_read_group' arguments were reordered"))
        .expect("reorder warning");
    assert_eq!(entry.files(), ["models/res_partner.py"]);
}

#[rstest]
fn attrs_and_states_become_expressions(workspace: TempDir) {
    let view = r#"<odoo>
    <record id="view_form" model="ir.ui.view">
        <field name="arch" type="xml">
            <form>
                <button name="action_confirm" type="object" states="draft,sent"/>
                <field name="partner_id" attrs="{'readonly': [('state', 'not in', ['draft'])], 'invisible': ['|', ('active', '=', False), ('type', '=', 'service')]}"/>
                <field name="note" attrs="{'required': [('amount', '&gt;', 0)]}"/>
            </form>
        </field>
    </record>
</odoo>
"#;
    let (root, report) = rewrite_with(
        &workspace,
        RewriterRegistry::empty().with(AttrsToExpressions),
        "16.0",
        "17.0",
        &[("views/view.xml", view)],
    );

    assert_eq!(
        read(&root, "views/view.xml"),
        r#"<odoo>
    <record id="view_form" model="ir.ui.view">
        <field name="arch" type="xml">
            <form>
                <button name="action_confirm" type="object" invisible="state not in ('draft', 'sent')"/>
                <field name="partner_id" readonly="state not in ['draft']" invisible="not active or type == 'service'"/>
                <field name="note" required="amount &gt; 0"/>
            </form>
        </field>
    </record>
</odoo>
"#
    );
    assert!(report.entries().is_empty());
}

const FETCHMAIL_SOURCE: &str = "\
from odoo import models, tools, _
from odoo.tools import misc
from odoo.tools import ustr
from odoo.tools.misc import ustr
from odoo.tools.misc import ustr, find_in_path
from odoo.tools import ustr, config, consteq, file_path
from odoo.tools.misc import lazy, ustr
from odoo.tools import config, consteq, ustr, file_path
from ssl import SSLError
from odoo.exceptions import UserError


class FetchMailServer(models.Model):
    _inherit = \"fetchmail.server\"

    def example_method_use_ustr(self):
        try:
            server_name = ustr(self.name)
            description = misc.ustr(self._description)
            connection = self.connect(allow_archived=True)
        except SSLError as e:
            raise UserError(_(tools.ustr(e)))
";

const FETCHMAIL_RESULT: &str = "\
from odoo import models, tools, _
from odoo.tools import misc
from odoo.tools.misc import find_in_path
from odoo.tools import config, consteq, file_path
from odoo.tools.misc import lazy
from odoo.tools import config, consteq, file_path
from ssl import SSLError
from odoo.exceptions import UserError


class FetchMailServer(models.Model):
    _inherit = \"fetchmail.server\"

    def example_method_use_ustr(self):
        try:
            server_name = self.name
            description = self._description
            connection = self.connect(allow_archived=True)
        except SSLError as e:
            raise UserError(_(e))
";

#[rstest]
fn ustr_wrappers_and_imports_disappear(workspace: TempDir) {
    let (root, report) = rewrite_with(
        &workspace,
        RewriterRegistry::empty().with(RemoveUstr),
        "17.0",
        "18.0",
        &[("models/fetchmail.py", FETCHMAIL_SOURCE)],
    );

    assert_eq!(read(&root, "models/fetchmail.py"), FETCHMAIL_RESULT);
    assert!(report.entries().is_empty());
}

#[rstest]
fn nested_ustr_calls_unwrap_completely(workspace: TempDir) {
    let (root, _) = rewrite_with(
        &workspace,
        RewriterRegistry::empty().with(RemoveUstr),
        "17.0",
        "18.0",
        &[("models/nested.py", "value = ustr(ustr(name))\n")],
    );

    assert_eq!(read(&root, "models/nested.py"), "value = name\n");
}

#[rstest]
#[case::passed_as_value(
    "from odoo.tools import ustr\n\nnames = map(ustr, values)\n",
    "from odoo.tools import ustr\n\nnames = map(ustr, values)\n"
)]
#[case::extra_arguments(
    "from odoo.tools import config, ustr\n\na = ustr(name)\nb = ustr(raw, 'latin-1')\n",
    "from odoo.tools import config, ustr\n\na = name\nb = ustr(raw, 'latin-1')\n"
)]
fn remaining_ustr_uses_keep_the_import(
    workspace: TempDir,
    #[case] source: &str,
    #[case] expected: &str,
) {
    let (root, report) = rewrite_with(
        &workspace,
        RewriterRegistry::empty().with(RemoveUstr),
        "17.0",
        "18.0",
        &[("models/text.py", source)],
    );

    assert_eq!(read(&root, "models/text.py"), expected);
    let entry = report
        .entry("'ustr' is still used outside single-argument calls; its import was kept.")
        .expect("kept import entry");
    assert_eq!(entry.severity(), Severity::Warning);
    assert_eq!(entry.files(), ["models/text.py"]);
}

#[rstest]
fn unparsable_files_are_reported_and_left_alone(workspace: TempDir) {
    let broken = "from odoo.tools import ustr\n\ndef broken(:\n    return ustr(1)\n";
    let (root, report) = rewrite_with(
        &workspace,
        RewriterRegistry::empty().with(RemoveUstr),
        "17.0",
        "18.0",
        &[("models/broken.py", broken)],
    );

    assert_eq!(read(&root, "models/broken.py"), broken);
    let entry = report
        .entry("remove_ustr skipped: the file could not be parsed")
        .expect("parse failure entry");
    assert_eq!(entry.severity(), Severity::Error);
    assert_eq!(entry.files(), ["models/broken.py"]);
}

#[rstest]
fn slug_helpers_move_to_ir_http(workspace: TempDir) {
    let website = "\
from odoo import api, models
from odoo.addons.http_routing.models.ir_http import slugify


class Website(models.Model):
    _inherit = \"website\"

    @api.model
    def example_method_use_slugify(self, page_name):
        return \"/\" + slugify(page_name, max_length=1024, path=True)
";
    let controller = "\
from odoo import http
from odoo.addons.http_routing.models.ir_http import slugify
from odoo.http import request


class MainController(http.Controller):
    def redirect_to_main(self):
        return slugify(request.env.user.partner_id.name)
";
    let (root, _) = rewrite_with(
        &workspace,
        RewriterRegistry::empty().with(SlugifyHelper),
        "17.0",
        "18.0",
        &[
            ("models/website.py", website),
            ("controllers/main.py", controller),
        ],
    );

    assert_eq!(
        read(&root, "models/website.py"),
        "\
from odoo import api, models


class Website(models.Model):
    _inherit = \"website\"

    @api.model
    def example_method_use_slugify(self, page_name):
        return \"/\" + self.env[\"ir.http\"]._slugify(page_name, max_length=1024, path=True)
"
    );
    assert_eq!(
        read(&root, "controllers/main.py"),
        "\
from odoo import http
from odoo.http import request


class MainController(http.Controller):
    def redirect_to_main(self):
        return request.env[\"ir.http\"]._slugify(request.env.user.partner_id.name)
"
    );
}

#[rstest]
fn tree_views_become_list_views(workspace: TempDir) {
    let python = "self.env.ref('module_name.tree_view').write({'view_mode': 'tree'})\n";
    let view = "\
<odoo>
    <record id=\"view_tree\" model=\"ir.ui.view\">
        <field name=\"arch\" type=\"xml\">
            <tree string=\"Partners\">
                <field name=\"name\"/>
            </tree>
        </field>
    </record>
    <record id=\"action\" model=\"ir.actions.act_window\">
        <field name=\"view_mode\">tree,form</field>
    </record>
</odoo>
";
    let (root, _) = rewrite_with(
        &workspace,
        RewriterRegistry::empty().with(TreeToList),
        "17.0",
        "18.0",
        &[("models/res_partner.py", python), ("views/view.xml", view)],
    );

    assert_eq!(
        read(&root, "models/res_partner.py"),
        "self.env.ref('module_name.tree_view').write({'view_mode': 'list'})\n"
    );
    assert_eq!(
        read(&root, "views/view.xml"),
        "\
<odoo>
    <record id=\"view_tree\" model=\"ir.ui.view\">
        <field name=\"arch\" type=\"xml\">
            <list string=\"Partners\">
                <field name=\"name\"/>
            </list>
        </field>
    </record>
    <record id=\"action\" model=\"ir.actions.act_window\">
        <field name=\"view_mode\">list,form</field>
    </record>
</odoo>
"
    );
}

#[rstest]
fn chatter_blocks_collapse(workspace: TempDir) {
    let view = "\
<form>
    <div class=\"oe_chatter\">
        <field name=\"message_ids\"/>
    </div>
</form>
";
    let (root, _) = rewrite_with(
        &workspace,
        RewriterRegistry::empty().with(ChatterBlocks),
        "17.0",
        "18.0",
        &[("views/view.xml", view)],
    );

    assert_eq!(read(&root, "views/view.xml"), "<form>\n    <chatter/>\n</form>\n");
}

#[rstest]
fn sql_constraints_become_constraint_attributes(workspace: TempDir) {
    let source = "\
from odoo import models, fields


class ResPartner(models.Model):
    _inherit = \"res.partner\"

    test_field_2 = fields.Char()

    _sql_constraints = [
        (\"name_uniq\", \"unique(test_field_2)\", \"The name must be unique!\"),
        (\"email_check\", \"CHECK(test_field_2 LIKE '%@%')\", \"Invalid email format\"),
        (\"phone_not_empty\", \"CHECK(test_field_2 IS NOT NULL OR test_field_2 IS NOT NULL)\"),
        (\"long_constraint_example\", \"CHECK(LENGTH(test_field_2) > 2 AND LENGTH(test_field_2) < 100 AND test_field_2 IS NOT NULL)\", \"Name validation\"),
    ]
";
    let (root, _) = rewrite_with(
        &workspace,
        RewriterRegistry::empty().with(SqlConstraints),
        "18.0",
        "19.0",
        &[("models/res_partner.py", source)],
    );

    assert_eq!(
        read(&root, "models/res_partner.py"),
        "\
from odoo import models, fields


class ResPartner(models.Model):
    _inherit = \"res.partner\"

    test_field_2 = fields.Char()

    _name_uniq = models.Constraint(
        'unique(test_field_2)',
        \"The name must be unique!\",
    )
    _email_check = models.Constraint(
        \"CHECK(test_field_2 LIKE '%@%')\",
        \"Invalid email format\",
    )
    _phone_not_empty = models.Constraint('CHECK(test_field_2 IS NOT NULL OR test_field_2 IS NOT NULL)')
    _long_constraint_example = models.Constraint(
        'CHECK(LENGTH(test_field_2) > 2 AND LENGTH(test_field_2) < 100 AND test_field_2 IS NOT NULL)',
        \"Name validation\",
    )
"
    );
}

#[rstest]
fn dynamic_sql_constraints_are_reported(workspace: TempDir) {
    let source = "\
class Partner(models.Model):
    _sql_constraints = [(\"name_uniq\", UNIQUE_NAME, \"Taken\")]
";
    let (root, report) = rewrite_with(
        &workspace,
        RewriterRegistry::empty().with(SqlConstraints),
        "18.0",
        "19.0",
        &[("models/partner.py", source)],
    );

    assert_eq!(read(&root, "models/partner.py"), source);
    let entry = report
        .entry("Failed to replace sql_constraints")
        .expect("failure entry");
    assert_eq!(entry.severity(), Severity::Warning);
}

#[rstest]
fn expression_helpers_move_to_domain(workspace: TempDir) {
    let source = "\
from odoo import models
from odoo.osv import expression


class SaleOrder(models.Model):
    _inherit = \"sale.order\"

    def simple_search(self, base_domain):
        extra_domain = [('state', '=', 'sale')]
        result1 = expression.AND([base_domain, extra_domain])
        result2 = expression.OR([result1, [('state', '=', 'draft')]])
        return result2
";
    let (root, _) = rewrite_with(
        &workspace,
        RewriterRegistry::empty().with(DomainHelpers),
        "18.0",
        "19.0",
        &[("models/sale_order.py", source)],
    );

    assert_eq!(
        read(&root, "models/sale_order.py"),
        "\
from odoo import models
from odoo.fields import Domain


class SaleOrder(models.Model):
    _inherit = \"sale.order\"

    def simple_search(self, base_domain):
        extra_domain = [('state', '=', 'sale')]
        result1 = Domain.AND([base_domain, extra_domain])
        result2 = Domain.OR([result1, [('state', '=', 'draft')]])
        return result2
"
    );
}

#[rstest]
fn a_second_run_changes_nothing(workspace: TempDir) {
    let root = module(
        &workspace,
        &[
            ("models/fetchmail.py", FETCHMAIL_SOURCE),
            (
                "views/view.xml",
                "<odoo>\n    <tree>\n        <field name=\"name\"/>\n    </tree>\n</odoo>\n",
            ),
        ],
    );
    let migration = prepare(
        Vec::new(),
        RewriterRegistry::builtin(),
        "17.0",
        "18.0",
        MigrationOptions::new(),
    );

    run(&migration, &workspace);
    let first = (
        read(&root, "__manifest__.py"),
        read(&root, "models/fetchmail.py"),
        read(&root, "views/view.xml"),
    );
    run(&migration, &workspace);
    let second = (
        read(&root, "__manifest__.py"),
        read(&root, "models/fetchmail.py"),
        read(&root, "views/view.xml"),
    );

    assert_eq!(first.1, FETCHMAIL_RESULT);
    assert_eq!(first, second);
}

#[test]
fn the_registry_schedules_rewriters_by_scope() {
    let registry = RewriterRegistry::builtin();
    let catalog = VersionCatalog::odoo();
    let compiler = RuleSetCompiler::new(catalog.clone())
        .with_source(registry.source(&catalog).expect("registry source"));
    let path = compiler.resolve("16.0", "18.0").expect("path");
    let steps = compiler.compile(&path).expect("compiled");

    let scheduled: Vec<Vec<&str>> = steps
        .iter()
        .map(|step| {
            step.rules()
                .structural_rewriters()
                .iter()
                .map(String::as_str)
                .collect()
        })
        .collect();
    assert_eq!(
        scheduled,
        [
            vec![
                "translation_format",
                "read_group_arguments",
                "attrs_to_expressions",
            ],
            vec!["tree_to_list", "chatter_blocks", "remove_ustr", "slugify_helper"],
            vec![
                "set_module_installable",
                "bump_version",
                "remove_migration_folder",
            ],
        ]
    );
}
