use setupdeps::{extract, extract_text, domain::Source, ExtractConfig, ExtractError, HostModules};

fn extracted(input: &str) -> Vec<String> {
    extracted_with(input, &ExtractConfig::default())
}

fn extracted_with(input: &str, config: &ExtractConfig) -> Vec<String> {
    match extract_text(input, "setup.py", config) {
        Ok(requirements) => requirements,
        Err(e) => panic!("Extraction failed:\n{e}"),
    }
}

#[test]
fn typical_setuptools_descriptor() {
    let input = r#"
import os
from setuptools import setup, find_packages

here = os.path.abspath(os.path.dirname(__file__))

with open(os.path.join(here, "README.md")) as f:
    long_description = f.read()

about = {}
exec("__version__ = '1.2.0'", about)

setup(
    name="pkg",
    version=about.get("__version__", "0.0.0"),
    long_description=long_description,
    packages=find_packages(exclude=["tests"]),
    install_requires=[
        "requests>=2.20",
        "click~=8.0",
    ],
    extras_require={"dev": ["pytest"]},
)
"#;
    assert_eq!(extracted(input), vec!["requests>=2.20", "click~=8.0"]);
}

#[test]
fn computed_requirement_lists() {
    let input = r#"
import sys
from setuptools import setup

base = ["six", "attrs>=19"]
extra = []
if sys.version_info < (3, 8):
    extra.append("importlib-metadata")
if sys.version_info >= (3, 0):
    extra += ["typing-extensions"]

pinned = {"numpy": "1.24", "scipy": "1.10"}
reqs = base + extra + [f"{name}>={version}" for name, version in sorted(pinned.items())]

setup(name="pkg", install_requires=reqs)
"#;
    assert_eq!(
        extracted(input),
        vec![
            "six",
            "attrs>=19",
            "typing-extensions",
            "numpy>=1.24",
            "scipy>=1.10"
        ]
    );
}

#[test]
fn kwargs_expansion() {
    let input = r#"
import setuptools

def requirements():
    return ["flask", "jinja2"]

metadata = dict(name="pkg", version="1.0")
options = {"install_requires": requirements(), "zip_safe": False}

setuptools.setup(**metadata, **options)
"#;
    assert_eq!(extracted(input), vec!["flask", "jinja2"]);
}

#[test]
fn setup_methods_on_objects_are_not_intercepted() {
    let input = r#"
import setuptools

class Helper:
    def setup(self):
        return ["from-method"]

    def run(self):
        return self.setup()

helper = Helper()
deps = helper.run() + helper.setup()
setuptools.setup(install_requires=deps)
"#;
    assert_eq!(extracted(input), vec!["from-method", "from-method"]);
}

#[test]
fn requirements_read_from_a_file_become_the_sentinel() {
    let input = r#"
from setuptools import setup

def read_requirements(path):
    with open(path) as f:
        return [line.strip() for line in f.read().splitlines() if line.strip()]

setup(install_requires=read_requirements("requirements.txt") + ["wheel"])
"#;
    assert_eq!(extracted(input), vec!["FIXME", "wheel"]);
}

#[test]
fn string_install_requires() {
    let input = "from setuptools import setup\nsetup(install_requires='''\n  a>=1\n\n  b\n''')\n";
    assert_eq!(extracted(input), vec!["a>=1", "b"]);
}

#[test]
fn stubbed_imports_render_as_the_sentinel() {
    let input = r#"
from setuptools import setup
from mypkg.version import VERSION
import numpy as np

setup(
    install_requires=[
        "mypkg-core==" + str(VERSION),
        "numpy>={}".format(np.__version__),
        "ext==%s" % np.get_include().strip(),
    ],
)
"#;
    assert_eq!(
        extracted(input),
        vec!["mypkg-core==FIXME", "numpy>=FIXME", "ext==FIXME"]
    );
}

#[test]
fn available_modules_are_left_alone() {
    let input = r#"
import numpy
from setuptools import setup
setup(install_requires=["numpy>=" + str(getattr(numpy, "__version__", "1.0"))])
"#;
    assert_eq!(extracted(input), vec!["numpy>=FIXME"]);

    let config = ExtractConfig {
        available_modules: vec!["numpy".to_string()],
        ..ExtractConfig::default()
    };
    assert_eq!(extracted_with(input, &config), vec!["numpy>=1.0"]);
}

#[test]
fn custom_sentinel() {
    let config = ExtractConfig {
        sentinel: "UNKNOWN".to_string(),
        ..ExtractConfig::default()
    };
    let input = r#"
import versioneer
setup(install_requires=[
    "x==" + str(versioneer.get_version()),
    "y==" + versioneer.get_version(),
])
"#;
    // Concatenating onto a stub yields another stub, which records as the bare sentinel.
    assert_eq!(extracted_with(input, &config), vec!["x==UNKNOWN", "UNKNOWN"]);
}

#[test]
fn the_probe_decides_what_is_stubbed() {
    let config = ExtractConfig::default();
    let source = Source::new(
        "setup.py",
        setupdeps::domain::Text::new("import setuptools\nsetuptools.setup(install_requires=['a'])\n"),
    );
    let probed = std::cell::RefCell::new(vec![]);
    let prober = |root: &str| {
        probed.borrow_mut().push(root.to_string());
        false
    };
    assert_eq!(extract(&source, &prober, &config).ok(), Some(vec!["a".to_string()]));
    assert_eq!(*probed.borrow(), vec!["setuptools"]);
}

#[test]
fn sequential_extractions_are_isolated() {
    let first = "from setuptools import setup\nsetup(install_requires=['one'])\n";
    let second = "from setuptools import setup\nprint('nothing to see')\n";
    assert_eq!(extracted(first), vec!["one"]);
    assert!(extracted(second).is_empty());
    assert_eq!(extracted(first), vec!["one"]);
}

#[test]
fn write_opens_are_refused() {
    let input = r#"
from setuptools import setup
with open("pkg/_version.py", "w") as f:
    f.write("__version__ = '1.0'")
setup(install_requires=["never"])
"#;
    let error = match extract_text(input, "pkg/setup.py", &ExtractConfig::default()) {
        Ok(requirements) => panic!("Expected a failure, got {requirements:?}"),
        Err(e) => e,
    };
    let ExtractError::ExecutionFailure { path, line, exception } = &error else {
        panic!("Expected ExecutionFailure, got {error:?}");
    };
    assert_eq!(path, "pkg/setup.py");
    assert_eq!(*line, 3);
    assert!(exception.starts_with("PermissionError"), "{exception}");
}

#[test]
fn malformed_descriptor() {
    let error = extract_text("setup(install_requires=[\n", "setup.py", &ExtractConfig::default());
    assert!(matches!(error, Err(ExtractError::MalformedSource { .. })));
}

#[test]
fn host_modules_default_probe() {
    let prober = HostModules::default();
    let config = ExtractConfig::default();
    let source = Source::new(
        "setup.py",
        setupdeps::domain::Text::new(
            "import os.path, sys\nsetup(install_requires=[os.path.join('a', 'b'), sys.platform])\n",
        ),
    );
    assert_eq!(
        extract(&source, &prober, &config).ok(),
        Some(vec!["a/b".to_string(), "linux".to_string()])
    );
}

#[test]
fn runaway_recursion_is_an_execution_failure() {
    let input = "def f(n):\n    return f(n + 1)\nf(0)\nsetup(install_requires=['never'])\n";
    let outcome = std::thread::Builder::new()
        .stack_size(1024 * 1024)
        .spawn(move || extract_text(input, "setup.py", &ExtractConfig::default()))
        .expect("spawn extraction thread")
        .join()
        .expect("extraction thread panicked");
    let Err(ExtractError::ExecutionFailure { exception, .. }) = &outcome else {
        panic!("Expected ExecutionFailure, got {outcome:?}");
    };
    assert!(exception.starts_with("RecursionError"), "{exception}");
}

#[test]
fn stub_as_the_whole_requirement_list() {
    let input = r#"
from setuptools import setup
import requirements
setup(install_requires=requirements.REQUIRED)
"#;
    assert_eq!(extracted(input), vec!["FIXME"]);
}

#[test]
fn byte_order_mark() {
    let input = "\u{feff}from setuptools import setup\nsetup(install_requires=['a'])\n";
    assert_eq!(extracted(input), vec!["a"]);
}
