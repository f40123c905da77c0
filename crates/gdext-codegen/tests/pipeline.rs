//! End-to-end runs over the fixture header and API descriptor.

use std::fs;
use std::path::{Path, PathBuf};

use gdext_codegen::api::BuildConfiguration;
use gdext_codegen::generator::DEFAULT_BANNER;
use gdext_codegen::{Config, Error, GeneratedArtifact, OutputUnit, Pipeline};
use tempfile::TempDir;

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(name)
}

/// A scratch project root holding copies of the fixtures, optionally edited.
struct Project {
    dir: TempDir,
}

impl Project {
    fn new() -> Self {
        Self::with_inputs(
            &fs::read_to_string(fixture("gdextension_interface.h")).unwrap(),
            &fs::read_to_string(fixture("extension_api.json")).unwrap(),
        )
    }

    fn with_api_edit(from: &str, to: &str) -> Self {
        let api = fs::read_to_string(fixture("extension_api.json")).unwrap();
        assert!(api.contains(from), "fixture does not contain {from:?}");
        Self::with_inputs(
            &fs::read_to_string(fixture("gdextension_interface.h")).unwrap(),
            &api.replacen(from, to, 1),
        )
    }

    fn with_inputs(header: &str, api: &str) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let inputs = dir.path().join("godot_headers");
        fs::create_dir_all(inputs.join("godot")).unwrap();
        fs::write(inputs.join("godot/gdextension_interface.h"), header).unwrap();
        fs::write(inputs.join("extension_api.json"), api).unwrap();
        Self { dir }
    }

    fn root(&self) -> &Path {
        self.dir.path()
    }

    fn config(&self) -> Config {
        Config::load(self.root(), None).unwrap()
    }

    fn pipeline(&self) -> Pipeline {
        Pipeline::new(self.config())
    }

    fn read(&self, path: &str) -> String {
        fs::read_to_string(self.root().join(path))
            .unwrap_or_else(|e| panic!("reading {path}: {e}"))
    }
}

fn artifact<'a>(artifacts: &'a [GeneratedArtifact], path: &str) -> &'a str {
    artifacts
        .iter()
        .find(|a| a.path == Path::new(path))
        .map(|a| a.content.as_str())
        .unwrap_or_else(|| panic!("no artifact at {path}"))
}

/// Collapse the padding gofmt-style alignment puts between cells.
fn squeeze(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if c == ' ' && out.ends_with(' ') {
            continue;
        }
        out.push(c);
    }
    out
}

// ── Scenarios ───────────────────────────────────────────────────

#[test]
fn test_vector2_members_and_length() {
    let artifacts = Project::new().pipeline().generate().unwrap();
    let builtins = artifact(&artifacts, "pkg/builtin/builtinclasses.gen.go");

    assert!(builtins.contains("type Vector2 struct"));
    assert!(builtins.contains("opaque [8]uint8"));
    assert!(builtins.contains("func (cx *Vector2) GetX() float64"));
    assert!(builtins.contains("func (cx *Vector2) SetX(value float64)"));
    assert!(builtins.contains("func (cx *Vector2) GetY() float64"));
    assert!(builtins.contains("func (cx *Vector2) SetY(value float64)"));
    assert!(builtins.contains("func (cx *Vector2) Length() float64"));
    assert!(builtins.contains("mb := globalVector2MethodBindings.methodLength"));
    assert!(builtins.contains("Float64Encoder"));
    assert!(builtins.contains("func NewVector2WithFloatFloat(x float64, y float64) Vector2"));
    assert!(builtins.contains("func Vector2FromAngle(angle float64) Vector2"));

    let bindings = artifact(&artifacts, "pkg/builtin/builtinclasses.bindings.gen.go");
    assert!(bindings.contains("methodLength"));
    assert!(bindings.contains("466405837"));
    assert!(bindings.contains("GDEXTENSION_VARIANT_TYPE_VECTOR2"));
}

#[test]
fn test_get_proc_address_alias_and_shim() {
    let artifacts = Project::new().pipeline().generate().unwrap();

    let wrapper_go = &squeeze(artifact(&artifacts, "pkg/ffi/ffi_wrapper.gen.go"));
    assert!(wrapper_go.contains(
        "GDExtensionInterfaceGetProcAddress = C.GDExtensionInterfaceGetProcAddress"
    ));
    assert!(wrapper_go.contains(
        "func CallFunc_GDExtensionInterfaceGetProcAddress(fn GDExtensionInterfaceGetProcAddress"
    ));

    let wrapper_h = artifact(&artifacts, "pkg/ffi/ffi_wrapper.gen.h");
    assert!(wrapper_h.contains(
        "GDExtensionInterfaceFunctionPtr callFunc_GDExtensionInterfaceGetProcAddress(\
         GDExtensionInterfaceGetProcAddress fn, const char *p_function_name);"
    ));

    let wrapper_c = artifact(&artifacts, "pkg/ffi/ffi_wrapper.gen.c");
    assert!(wrapper_c.contains("return fn(p_function_name);"));

    let interface = artifact(&artifacts, "pkg/ffi/ffi.gen.go");
    assert!(interface.contains(
        "func LoadGDExtensionInterface(getProcAddress GDExtensionInterfaceGetProcAddress) *GDExtensionInterface"
    ));
    assert!(interface.contains("loadProcAddress(getProcAddress, \"mem_free\")"));
    // the loader itself is not a table entry
    assert!(!interface.contains("\"get_proc_address\""));
}

#[test]
fn test_unknown_argument_type_names_type_and_method() {
    let project = Project::with_api_edit(
        r#"{"name": "position", "type": "Vector2"}"#,
        r#"{"name": "position", "type": "Frobnicator"}"#,
    );
    let err = project.pipeline().run().unwrap_err();

    assert!(err.is_resolve(), "unexpected error: {err}");
    let message = err.to_string();
    assert!(message.contains("`Frobnicator`"));
    assert!(message.contains("classes.Node.methods.set_position_hint"));
    assert!(!project.root().join("pkg").exists());
}

#[test]
fn test_enums_with_same_member_do_not_collide() {
    let artifacts = Project::new().pipeline().generate().unwrap();
    let enums = &squeeze(artifact(&artifacts, "pkg/constant/classes.enums.gen.go"));

    assert!(enums.contains("NodeDuplicateFlags_NONE NodeDuplicateFlags = 0"));
    assert!(enums.contains("ResourceFlushMode_NONE ResourceFlushMode = 0"));
    assert!(enums.contains("func (e NodeDuplicateFlags) Has(flag NodeDuplicateFlags) bool"));
    assert!(!enums.contains("func (e ResourceFlushMode) Has("));
    assert_eq!(enums.matches("\tNONE ").count(), 0);
}

// ── Whole-run properties ────────────────────────────────────────

#[test]
fn test_generation_is_deterministic() {
    let project = Project::new();
    let first = project.pipeline().generate().unwrap();
    let second = project.pipeline().generate().unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_second_run_leaves_files_untouched() {
    let project = Project::new();
    let first = project.pipeline().run().unwrap();
    assert!(!first.written.is_empty());
    assert!(first.unchanged.is_empty());

    let second = project.pipeline().run().unwrap();
    assert!(second.is_up_to_date());
    assert_eq!(second.unchanged.len(), first.written.len());
}

#[test]
fn test_every_unit_produces_output() {
    let artifacts = Project::new().pipeline().generate().unwrap();
    for unit in OutputUnit::ALL {
        assert!(
            artifacts.iter().any(|a| a.unit == unit),
            "no artifact for unit {unit}"
        );
    }
    for a in &artifacts {
        assert!(
            a.content.starts_with(&format!("// {DEFAULT_BANNER}")),
            "{} is missing the banner",
            a.path.display()
        );
    }
}

#[test]
fn test_every_class_and_function_is_emitted() {
    let artifacts = Project::new().pipeline().generate().unwrap();

    let interfaces = &squeeze(artifact(&artifacts, "pkg/builtin/classes.interfaces.gen.go"));
    for class in ["Object", "RefCounted", "Resource", "Node", "Engine"] {
        assert!(interfaces.contains(&format!("type {class} interface")), "{class}");
    }
    assert!(interfaces.contains("V_Ready()"));
    assert!(interfaces.contains("NodeEncoder = ClassEncoder[Node]{}"));

    let refs = artifact(&artifacts, "pkg/builtin/classes.ref.interfaces.gen.go");
    assert!(refs.contains("type RefResource interface"));
    assert!(!refs.contains("type RefNode interface"));

    let impls = artifact(&artifacts, "pkg/gdclassimpl/classes.gen.go");
    assert!(impls.contains("type NodeImpl struct"));
    assert!(impls.contains("func GetEngine() *EngineImpl"));
    assert!(impls.contains("func ResourceGenerateSceneUniqueId() "));

    let utility = artifact(&artifacts, "pkg/gdutilfunc/utilityfunctions.gen.go");
    assert!(utility.contains("func Sin(angleRad float64) float64"));
    assert!(utility.contains("func Print(arg1 builtin.Variant, varargs ...builtin.Variant)"));

    let structures = &squeeze(artifact(&artifacts, "pkg/nativestructure/nativestructures.gen.go"));
    assert!(structures.contains("type Glyph struct"));
    assert!(structures.contains("Padding [2]int32"));

    let constants = &squeeze(artifact(&artifacts, "pkg/constant/classes.constants.gen.go"));
    assert!(constants.contains("Node_NOTIFICATION_READY = 13"));

    let init = &squeeze(artifact(&artifacts, "pkg/gdclassinit/classes.init.gen.go"));
    assert!(init.contains("ClassTagNode ClassTag"));
    assert!(init.contains("case \"_ready\":"));
}

#[test]
fn test_output_follows_gofmt_layout() {
    let artifacts = Project::new().pipeline().generate().unwrap();

    let init = artifact(&artifacts, "pkg/gdclassinit/classes.init.gen.go");
    assert!(init.contains("var classTagNames = [...]string{\n"));
    assert!(init.contains("var classTagsByName = map[string]ClassTag{\n"));
    assert!(init.contains("\tswitch tag {\n\tcase ClassTag"));

    let enums = artifact(&artifacts, "pkg/constant/globalenums.gen.go");
    let columns: Vec<_> = enums
        .lines()
        .filter(|l| l.starts_with("\tSide_"))
        .map(|l| l.find(" Side =").unwrap())
        .collect();
    assert!(columns.len() > 1);
    assert!(columns.iter().all(|&c| c == columns[0]), "{enums}");

    for a in artifacts.iter().filter(|a| a.path.extension().is_some_and(|e| e == "go")) {
        let imports: Vec<_> = a
            .content
            .lines()
            .filter(|l| l.starts_with("\t\"github.com/"))
            .collect();
        let mut sorted = imports.clone();
        sorted.sort();
        assert_eq!(imports, sorted, "{}", a.path.display());
        assert!(!a.content.contains("]ffi.GDExtensionConstTypePtr {"), "{}", a.path.display());
    }
}

#[test]
fn test_check_reports_pending_changes_without_writing() {
    let project = Project::new();
    let pending = project.pipeline().check().unwrap();
    assert!(!pending.is_up_to_date());
    assert!(!project.root().join("pkg").exists());

    project.pipeline().run().unwrap();
    assert!(project.pipeline().check().unwrap().is_up_to_date());
}

#[test]
fn test_files_land_under_output_dir() {
    let project = Project::new();
    let mut config = project.config();
    config.set_output_dir(project.root().join("gen"));
    let report = Pipeline::new(config).run().unwrap();

    assert!(report.written.iter().all(|p| p.starts_with(project.root().join("gen"))));
    let text = squeeze(&project.read("gen/pkg/constant/globalenums.gen.go"));
    assert!(text.contains("package constant"));
    assert!(text.contains("Side_SIDE_LEFT Side = 0"));
}

#[test]
fn test_build_configuration_selects_sizes() {
    let project = Project::new();
    let mut config = project.config();
    config.set_build_configuration(BuildConfiguration::Double64);
    let artifacts = Pipeline::new(config).generate().unwrap();
    let builtins = artifact(&artifacts, "pkg/builtin/builtinclasses.gen.go");
    assert!(builtins.contains("opaque [16]uint8"));
}

#[test]
fn test_config_file_overrides_module_and_banner() {
    let project = Project::new();
    fs::write(
        project.root().join("gdext-codegen.toml"),
        "module_path = \"example.com/game\"\nbanner = \"generated for tests\"\n",
    )
    .unwrap();
    let artifacts = project.pipeline().generate().unwrap();
    let impls = artifact(&artifacts, "pkg/gdclassimpl/classes.gen.go");
    assert!(impls.starts_with("// generated for tests\n"));
    assert!(impls.contains("\"example.com/game/pkg/builtin\""));
}

// ── Failures ────────────────────────────────────────────────────

#[test]
fn test_malformed_header_is_a_parse_error() {
    let api = fs::read_to_string(fixture("extension_api.json")).unwrap();
    let project = Project::with_inputs("typedef struct { int x } Broken;\n", &api);
    let err = project.pipeline().generate().unwrap_err();
    assert!(err.is_parse(), "unexpected error: {err}");
    assert!(err.to_string().contains("Broken"));
}

#[test]
fn test_invalid_descriptor_is_a_schema_error() {
    let project = Project::with_api_edit(r#""name": "Node","#, r#""name": "","#);
    let err = project.pipeline().generate().unwrap_err();
    assert!(err.is_schema(), "unexpected error: {err}");
}

#[test]
fn test_method_without_hash_aborts_before_writing() {
    let project = Project::with_api_edit(r#", "hash": 466405837}"#, "}");
    let err = project.pipeline().run().unwrap_err();

    assert!(err.is_template(), "unexpected error: {err}");
    assert!(err.to_string().contains("Vector2"));
    assert!(!project.root().join("pkg").exists());
}

#[test]
fn test_missing_input_is_an_io_error() {
    let project = Project::new();
    fs::remove_file(project.root().join("godot_headers/extension_api.json")).unwrap();
    let err = project.pipeline().generate().unwrap_err();
    assert!(err.is_io());
    assert!(matches!(err, Error::Input { ref path, .. } if path.ends_with("extension_api.json")));
}
