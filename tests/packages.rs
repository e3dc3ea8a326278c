//! Workspace import scenarios: vendor precedence, GOPATH fallback, package
//! identity, and module-manifest resolution.

use std::path::PathBuf;

use anyhow::{Result, bail};
use goterp::{Interp, Options, Value, stdlib};

fn workspace_interp(gopath: &str) -> Interp {
    let mut interp = Interp::new(Options {
        gopath: PathBuf::from(gopath),
    });
    interp.use_symbols(stdlib());
    interp
}

fn eval_sample(gopath: &str) -> Result<String> {
    let mut interp = workspace_interp(gopath);
    interp.eval("import \"github.com/foo/pkg\"")?;
    match interp.eval("pkg.NewSample()")? {
        Some(Value::Str(s)) => Ok(s),
        other => bail!("expected a string result, got {other:?}"),
    }
}

#[test]
fn resolves_packages_across_workspace_layouts() {
    let cases = [
        ("vendor", "tests/_pkg", "root Fromage"),
        ("vendor inside vendor", "tests/_pkg0", "root Fromage Cheese"),
        (
            "multiple vendor folders and subpackage in vendor",
            "tests/_pkg3",
            "root Fromage Couteau Cheese!",
        ),
        (
            "multiple vendor folders and multiple subpackages in vendor",
            "tests/_pkg4",
            "root Fromage Cheese Vin! Couteau",
        ),
        (
            "fallback to GOPATH",
            "tests/_pkg6",
            "root Fromage Cheese Vin! Couteau",
        ),
    ];

    for (desc, gopath, expected) in cases {
        let got = eval_sample(gopath).unwrap_or_else(|err| panic!("{desc}: {err}"));
        assert_eq!(got, expected, "{desc}");
    }
}

#[test]
fn mixed_packages_in_one_directory_fail_with_position() {
    let mut interp = workspace_interp("tests/_pkg9");
    let err = interp
        .eval("import \"github.com/foo/pkg\"")
        .expect_err("expected import failure");
    assert_eq!(
        err.to_string(),
        "1:21: import \"github.com/foo/pkg\" error: found packages pkg and pkgfalse in tests/_pkg9/src/github.com/foo/pkg"
    );
}

#[test]
fn module_manifest_workspace_resolves_sources() {
    // Mirrors the host contract: the literal value "off" disables module mode.
    if std::env::var("GO111MODULE").map(|v| v == "off").unwrap_or(false) {
        return;
    }
    let got = eval_sample("tests/_pkg12").expect("module workspace");
    assert_eq!(got, "gomod!");
}

#[test]
fn imported_functions_surface_as_callable_handles() {
    let mut interp = workspace_interp("tests/_pkg");
    interp
        .eval("import \"github.com/foo/pkg\"")
        .expect("import failed");
    let handle = interp
        .eval("pkg.NewSample")
        .expect("eval failed")
        .expect("expected a handle");
    assert!(matches!(handle, Value::Func { .. }));
    let result = interp.call(&handle, &[]).expect("call failed");
    assert_eq!(result, Value::Str("root Fromage".to_string()));
}

#[test]
fn importing_the_same_package_twice_is_idempotent() {
    let mut interp = workspace_interp("tests/_pkg");
    interp
        .eval("import \"github.com/foo/pkg\"")
        .expect("first import failed");
    interp
        .eval("import \"github.com/foo/pkg\"")
        .expect("second import failed");
    let result = interp.eval("pkg.NewSample()").expect("eval failed");
    assert_eq!(result, Some(Value::Str("root Fromage".to_string())));
}

#[test]
fn failed_import_keeps_the_instance_usable() {
    let mut interp = workspace_interp("tests/_pkg");
    let err = interp
        .eval("import \"guthib.com/no/such\"")
        .expect_err("expected import failure");
    assert!(err.to_string().contains("unable to find source related to"));

    interp
        .eval("import \"github.com/foo/pkg\"")
        .expect("import after failure");
    let result = interp.eval("pkg.NewSample()").expect("eval failed");
    assert_eq!(result, Some(Value::Str("root Fromage".to_string())));
}
