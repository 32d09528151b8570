//! The modules the sandbox implements natively. None of them reach the real filesystem, the
//! environment, or the network: paths are manipulated as text and every query about the host
//! answers as if nothing were there.

use crate::{
    core::{log, Container, LogLevel},
    domain::ModuleName,
    sanitizer::NATIVE_MODULES,
    treewalk::{
        builtins::Builtin,
        types::{Dict, Exception, Module, NamedFields, StringIO, Tuple},
        utils::{check_args, Args},
        Raise, TreewalkInterpreter, TreewalkResult, TreewalkValue,
    },
};

const CWD: &str = "/";

static OS_FUNCTIONS: [Builtin; 13] = [
    Builtin { name: "getenv", call: os_getenv },
    Builtin { name: "getcwd", call: os_getcwd },
    Builtin { name: "listdir", call: os_listdir },
    Builtin { name: "walk", call: os_walk },
    Builtin { name: "system", call: os_system },
    Builtin { name: "chdir", call: os_ignored },
    Builtin { name: "makedirs", call: os_ignored },
    Builtin { name: "mkdir", call: os_ignored },
    Builtin { name: "remove", call: os_ignored },
    Builtin { name: "unlink", call: os_ignored },
    Builtin { name: "rmdir", call: os_ignored },
    Builtin { name: "removedirs", call: os_ignored },
    Builtin { name: "rename", call: os_ignored },
];

static OS_PATH_FUNCTIONS: [Builtin; 17] = [
    Builtin { name: "join", call: path_join },
    Builtin { name: "dirname", call: path_dirname },
    Builtin { name: "basename", call: path_basename },
    Builtin { name: "split", call: path_split },
    Builtin { name: "splitext", call: path_splitext },
    Builtin { name: "normpath", call: path_normpath },
    Builtin { name: "abspath", call: path_abspath },
    Builtin { name: "realpath", call: path_abspath },
    Builtin { name: "isabs", call: path_isabs },
    Builtin { name: "expanduser", call: path_identity },
    Builtin { name: "expandvars", call: path_identity },
    Builtin { name: "exists", call: path_missing },
    Builtin { name: "isfile", call: path_missing },
    Builtin { name: "isdir", call: path_missing },
    Builtin { name: "islink", call: path_missing },
    Builtin { name: "lexists", call: path_missing },
    Builtin { name: "relpath", call: path_relpath },
];

static SYS_FUNCTIONS: [Builtin; 1] = [Builtin { name: "exit", call: sys_exit }];

static IO_FUNCTIONS: [Builtin; 2] = [
    Builtin { name: "StringIO", call: io_string_io },
    Builtin { name: "open", call: io_open },
];

const VERSION_INFO_FIELDS: NamedFields = NamedFields {
    type_name: "sys.version_info",
    names: &["major", "minor", "micro", "releaselevel", "serial"],
};

/// Whether `root` is a package the sandbox implements itself, so that unknown submodules of it
/// fail to import instead of loading empty.
pub fn is_native_root(root: &str) -> bool {
    NATIVE_MODULES.contains(&root)
}

/// Submodules that are loaded together with their parent: `import os` makes `os.path` usable.
pub fn eager_children(name: &ModuleName) -> Vec<ModuleName> {
    match name.as_str().as_str() {
        "os" => vec![ModuleName::from_dotted("os.path")],
        _ => vec![],
    }
}

/// Build a host module, or `None` when `name` is not one.
pub fn host_module(interpreter: &TreewalkInterpreter<'_>, name: &ModuleName) -> Option<Module> {
    let mut module = Module::new(name.clone());
    let functions: &'static [Builtin] = match name.as_str().as_str() {
        "os" => {
            module.insert("sep", TreewalkValue::str("/"));
            module.insert("name", TreewalkValue::str("posix"));
            module.insert("linesep", TreewalkValue::str("\n"));
            module.insert("pathsep", TreewalkValue::str(":"));
            module.insert("curdir", TreewalkValue::str("."));
            module.insert("environ", TreewalkValue::dict(Dict::default()));
            &OS_FUNCTIONS
        }
        "os.path" => {
            module.insert("sep", TreewalkValue::str("/"));
            module.insert("curdir", TreewalkValue::str("."));
            module.insert("pardir", TreewalkValue::str(".."));
            &OS_PATH_FUNCTIONS
        }
        "sys" => {
            populate_sys(interpreter, &mut module);
            &SYS_FUNCTIONS
        }
        "io" => &IO_FUNCTIONS,
        _ => return None,
    };
    for builtin in functions {
        module.insert(builtin.name, TreewalkValue::BuiltinFunction(builtin));
    }
    log(LogLevel::Trace, || format!("Built host module {name}"));
    Some(module)
}

fn populate_sys(interpreter: &TreewalkInterpreter<'_>, module: &mut Module) {
    let config = interpreter.config();
    let version = config.python_version;
    let version_info = Tuple::named(
        VERSION_INFO_FIELDS,
        vec![
            TreewalkValue::Int(version.major),
            TreewalkValue::Int(version.minor),
            TreewalkValue::Int(version.micro),
            TreewalkValue::str("final"),
            TreewalkValue::Int(0),
        ],
    );
    let stream = || TreewalkValue::StringIO(Container::new(StringIO::default()));

    module.insert("version_info", TreewalkValue::Tuple(version_info));
    module.insert(
        "version",
        TreewalkValue::str(format!("{version} (main) [setupdeps sandbox]")),
    );
    module.insert("platform", TreewalkValue::str(config.platform.as_str()));
    module.insert(
        "argv",
        TreewalkValue::list(vec![TreewalkValue::str(interpreter.path())]),
    );
    module.insert("path", TreewalkValue::list(vec![]));
    module.insert("modules", TreewalkValue::Dict(interpreter.sys_modules()));
    module.insert("maxsize", TreewalkValue::Int(i64::MAX));
    module.insert("byteorder", TreewalkValue::str("little"));
    module.insert("executable", TreewalkValue::str("/usr/bin/python3"));
    module.insert("stdout", stream());
    module.insert("stderr", stream());
}

fn path_arg<'a>(
    interpreter: &TreewalkInterpreter<'_>,
    args: &'a Args,
    name: &str,
) -> TreewalkResult<&'a str> {
    check_args(args, name, |n| n == 1, "1").raise(interpreter)?;
    match &args.args()[0] {
        TreewalkValue::Str(path) => Ok(path),
        other => Exception::type_error(format!(
            "expected str, bytes or os.PathLike object, not {}",
            other.type_name()
        ))
        .raise(interpreter),
    }
}

fn os_getenv(interpreter: &TreewalkInterpreter<'_>, args: Args) -> TreewalkResult<TreewalkValue> {
    check_args(&args, "getenv", |n| (1..=2).contains(&n), "1 to 2").raise(interpreter)?;
    Ok(args.get(1, "default").cloned().unwrap_or(TreewalkValue::None))
}

fn os_getcwd(interpreter: &TreewalkInterpreter<'_>, args: Args) -> TreewalkResult<TreewalkValue> {
    check_args(&args, "getcwd", |n| n == 0, "0").raise(interpreter)?;
    Ok(TreewalkValue::str(CWD))
}

fn os_listdir(interpreter: &TreewalkInterpreter<'_>, args: Args) -> TreewalkResult<TreewalkValue> {
    check_args(&args, "listdir", |n| n <= 1, "at most 1").raise(interpreter)?;
    Ok(TreewalkValue::list(vec![]))
}

/// Walking an empty filesystem yields nothing.
fn os_walk(interpreter: &TreewalkInterpreter<'_>, args: Args) -> TreewalkResult<TreewalkValue> {
    check_args(&args, "walk", |n| (1..=4).contains(&n), "1 to 4").raise(interpreter)?;
    Ok(TreewalkValue::list(vec![]))
}

/// Shell commands are not run; they report success.
fn os_system(interpreter: &TreewalkInterpreter<'_>, args: Args) -> TreewalkResult<TreewalkValue> {
    let command = path_arg(interpreter, &args, "system")?;
    log(LogLevel::Debug, || format!("Skipped os.system({command:?})"));
    Ok(TreewalkValue::Int(0))
}

/// Directory changes and filesystem mutations succeed without touching anything.
fn os_ignored(interpreter: &TreewalkInterpreter<'_>, args: Args) -> TreewalkResult<TreewalkValue> {
    check_args(&args, "os", |n| n >= 1, "at least 1").raise(interpreter)?;
    log(LogLevel::Debug, || {
        format!("Skipped a filesystem call on {:?}", args.args()[0])
    });
    Ok(TreewalkValue::None)
}

fn sys_exit(interpreter: &TreewalkInterpreter<'_>, args: Args) -> TreewalkResult<TreewalkValue> {
    check_args(&args, "exit", |n| n <= 1, "at most 1").raise(interpreter)?;
    let code = args.get_arg(0).cloned().unwrap_or(TreewalkValue::None);
    Exception::system_exit(code).raise(interpreter)
}

fn io_string_io(
    interpreter: &TreewalkInterpreter<'_>,
    args: Args,
) -> TreewalkResult<TreewalkValue> {
    check_args(&args, "StringIO", |n| n <= 1, "at most 1").raise(interpreter)?;
    let initial = match args.get(0, "initial_value") {
        None | Some(TreewalkValue::None) => String::new(),
        Some(TreewalkValue::Str(s)) => s.clone(),
        Some(other) => {
            return Exception::type_error(format!(
                "initial_value must be str or None, not {}",
                other.type_name()
            ))
            .raise(interpreter)
        }
    };
    Ok(TreewalkValue::StringIO(Container::new(StringIO::new(initial))))
}

/// `io.open` is `open`; read-mode calls were rewritten before execution.
fn io_open(interpreter: &TreewalkInterpreter<'_>, args: Args) -> TreewalkResult<TreewalkValue> {
    let open = interpreter.load_var("open")?;
    interpreter.call(&open, args)
}

/// `posixpath.join`: an absolute component discards everything before it.
pub fn join(first: &str, rest: &[&str]) -> String {
    let mut path = first.to_string();
    for part in rest {
        if part.starts_with('/') {
            path = part.to_string();
        } else if path.is_empty() || path.ends_with('/') {
            path.push_str(part);
        } else {
            path.push('/');
            path.push_str(part);
        }
    }
    path
}

pub fn split(path: &str) -> (String, String) {
    let cut = path.rfind('/').map_or(0, |i| i + 1);
    let (head, tail) = path.split_at(cut);
    let head = if !head.is_empty() && head.chars().any(|c| c != '/') {
        head.trim_end_matches('/')
    } else {
        head
    };
    (head.to_string(), tail.to_string())
}

/// Leading dots belong to the name, so `.bashrc` has no extension.
pub fn splitext(path: &str) -> (String, String) {
    let name_start = path.rfind('/').map_or(0, |i| i + 1);
    let name = &path[name_start..];
    match name.rfind('.') {
        Some(dot) if name[..dot].chars().any(|c| c != '.') => {
            let dot = name_start + dot;
            (path[..dot].to_string(), path[dot..].to_string())
        }
        _ => (path.to_string(), String::new()),
    }
}

pub fn normpath(path: &str) -> String {
    if path.is_empty() {
        return ".".to_string();
    }
    let leading = match path.chars().take_while(|c| *c == '/').count() {
        0 => "",
        2 => "//",
        _ => "/",
    };
    let mut parts: Vec<&str> = vec![];
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." if parts.last().is_some_and(|last| *last != "..") => {
                parts.pop();
            }
            ".." if !leading.is_empty() => {}
            part => parts.push(part),
        }
    }
    let normalized = format!("{leading}{}", parts.join("/"));
    if normalized.is_empty() {
        ".".to_string()
    } else {
        normalized
    }
}

/// `posixpath.relpath`: both sides are made absolute against the working directory first.
pub fn relpath(path: &str, start: &str) -> String {
    let components = |p: &str| {
        normpath(&join(CWD, &[p]))
            .split('/')
            .filter(|part| !part.is_empty())
            .map(String::from)
            .collect::<Vec<_>>()
    };
    let (path, start) = (components(path), components(start));
    let common = path.iter().zip(&start).take_while(|(a, b)| a == b).count();
    let mut parts = vec![".."; start.len() - common];
    parts.extend(path[common..].iter().map(String::as_str));
    if parts.is_empty() {
        ".".to_string()
    } else {
        parts.join("/")
    }
}

fn path_join(interpreter: &TreewalkInterpreter<'_>, args: Args) -> TreewalkResult<TreewalkValue> {
    check_args(&args, "join", |n| n >= 1, "at least 1").raise(interpreter)?;
    let parts = args
        .args()
        .iter()
        .map(|part| part.as_str().raise(interpreter))
        .collect::<TreewalkResult<Vec<_>>>()?;
    Ok(TreewalkValue::str(join(parts[0], &parts[1..])))
}

fn path_dirname(interpreter: &TreewalkInterpreter<'_>, args: Args) -> TreewalkResult<TreewalkValue> {
    let path = path_arg(interpreter, &args, "dirname")?;
    Ok(TreewalkValue::str(split(path).0))
}

fn path_basename(
    interpreter: &TreewalkInterpreter<'_>,
    args: Args,
) -> TreewalkResult<TreewalkValue> {
    let path = path_arg(interpreter, &args, "basename")?;
    Ok(TreewalkValue::str(split(path).1))
}

fn path_split(interpreter: &TreewalkInterpreter<'_>, args: Args) -> TreewalkResult<TreewalkValue> {
    let (head, tail) = split(path_arg(interpreter, &args, "split")?);
    Ok(TreewalkValue::tuple(vec![
        TreewalkValue::Str(head),
        TreewalkValue::Str(tail),
    ]))
}

fn path_splitext(
    interpreter: &TreewalkInterpreter<'_>,
    args: Args,
) -> TreewalkResult<TreewalkValue> {
    let (root, ext) = splitext(path_arg(interpreter, &args, "splitext")?);
    Ok(TreewalkValue::tuple(vec![
        TreewalkValue::Str(root),
        TreewalkValue::Str(ext),
    ]))
}

fn path_normpath(
    interpreter: &TreewalkInterpreter<'_>,
    args: Args,
) -> TreewalkResult<TreewalkValue> {
    let path = path_arg(interpreter, &args, "normpath")?;
    Ok(TreewalkValue::str(normpath(path)))
}

/// Relative paths resolve against a fixed working directory of `/`.
fn path_abspath(
    interpreter: &TreewalkInterpreter<'_>,
    args: Args,
) -> TreewalkResult<TreewalkValue> {
    let path = path_arg(interpreter, &args, "abspath")?;
    Ok(TreewalkValue::str(normpath(&join(CWD, &[path]))))
}

fn path_relpath(
    interpreter: &TreewalkInterpreter<'_>,
    args: Args,
) -> TreewalkResult<TreewalkValue> {
    check_args(&args, "relpath", |n| (1..=2).contains(&n), "1 to 2").raise(interpreter)?;
    let path = args.args()[0].as_str().raise(interpreter)?;
    if path.is_empty() {
        return Exception::value_error("no path specified").raise(interpreter);
    }
    let start = match args.get(1, "start") {
        None | Some(TreewalkValue::None) => CWD,
        Some(start) => start.as_str().raise(interpreter)?,
    };
    Ok(TreewalkValue::str(relpath(path, start)))
}

fn path_isabs(interpreter: &TreewalkInterpreter<'_>, args: Args) -> TreewalkResult<TreewalkValue> {
    let path = path_arg(interpreter, &args, "isabs")?;
    Ok(TreewalkValue::Bool(path.starts_with('/')))
}

fn path_identity(
    interpreter: &TreewalkInterpreter<'_>,
    args: Args,
) -> TreewalkResult<TreewalkValue> {
    let path = path_arg(interpreter, &args, "expanduser")?;
    Ok(TreewalkValue::str(path))
}

/// The sandbox has no filesystem, so nothing exists.
fn path_missing(
    interpreter: &TreewalkInterpreter<'_>,
    args: Args,
) -> TreewalkResult<TreewalkValue> {
    path_arg(interpreter, &args, "exists")?;
    Ok(TreewalkValue::Bool(false))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{domain::ExceptionKind, treewalk::test_utils::*};

    #[test]
    fn posix_paths() {
        assert_eq!(join("a", &["b", "c"]), "a/b/c");
        assert_eq!(join("a/", &["/etc", "x"]), "/etc/x");
        assert_eq!(join("", &["b"]), "b");
        assert_eq!(split("/usr/lib/"), ("/usr/lib".to_string(), String::new()));
        assert_eq!(split("//x"), ("//".to_string(), "x".to_string()));
        assert_eq!(split("setup.py"), (String::new(), "setup.py".to_string()));
        assert_eq!(
            splitext("pkg/archive.tar.gz"),
            ("pkg/archive.tar".to_string(), ".gz".to_string())
        );
        assert_eq!(splitext(".bashrc"), (".bashrc".to_string(), String::new()));
        assert_eq!(normpath("a//b/./c/../d"), "a/b/d");
        assert_eq!(normpath("/../x"), "/x");
        assert_eq!(normpath("../../x"), "../../x");
        assert_eq!(normpath("a/.."), ".");
        assert_eq!(relpath("/src/pkg/mod.py", "/src"), "pkg/mod.py");
        assert_eq!(relpath("/src", "/src/pkg/data"), "../..");
        assert_eq!(relpath("pkg", "/"), "pkg");
        assert_eq!(relpath("/a", "/a"), ".");
    }

    #[test]
    fn filesystem_calls_are_inert() {
        let interpreter = run(r#"
import os
from os import walk, makedirs
from os.path import relpath
os.chdir(os.path.dirname(os.path.abspath(__file__)))
cwd = os.getcwd()
data = []
for root, dirs, files in os.walk("pkg/data"):
    data.extend(files)
walked = list(walk("."))
makedirs("build/lib", exist_ok=True)
os.mkdir("dist")
os.remove("MANIFEST")
os.unlink("stale.txt")
os.rmdir("tmp")
os.removedirs("a/b")
os.rename("old", "new")
status = os.system("make docs")
rel = relpath("/pkg/data/x.json", "/pkg")
linked = os.path.islink("x") or os.path.lexists("x")
"#);
        assert_eq!(read(&interpreter, "cwd"), TreewalkValue::str("/"));
        assert_eq!(read(&interpreter, "data"), list_of_strs(&[]));
        assert_eq!(read(&interpreter, "walked"), TreewalkValue::list(vec![]));
        assert_eq!(read(&interpreter, "status"), TreewalkValue::Int(0));
        assert_eq!(read(&interpreter, "rel"), TreewalkValue::str("data/x.json"));
        assert_eq!(read(&interpreter, "linked"), TreewalkValue::Bool(false));

        assert_raises!(
            run_expect_error("import os\nos.path.relpath('')"),
            ValueError,
            "no path specified"
        );
    }

    #[test]
    fn os_module() {
        let interpreter = run(r#"
import os
here = os.path.dirname(os.path.abspath(__file__))
readme = os.path.join(here, "README.rst")
token = os.getenv("TOKEN", "none")
env = os.environ.get("HOME")
exists = os.path.exists(readme)
files = os.listdir(".")
"#);
        assert_eq!(read(&interpreter, "here"), TreewalkValue::str("/"));
        assert_eq!(read(&interpreter, "readme"), TreewalkValue::str("/README.rst"));
        assert_eq!(read(&interpreter, "token"), TreewalkValue::str("none"));
        assert_eq!(read(&interpreter, "env"), TreewalkValue::None);
        assert_eq!(read(&interpreter, "exists"), TreewalkValue::Bool(false));
        assert_eq!(read(&interpreter, "files"), list_of_strs(&[]));
    }

    #[test]
    fn sys_module() {
        let interpreter = run(r#"
import sys
modern = sys.version_info >= (3, 8)
major = sys.version_info.major
linux = sys.platform.startswith("linux")
loaded = "sys" in sys.modules
big = sys.maxsize > 2 ** 32
"#);
        assert_eq!(read(&interpreter, "modern"), TreewalkValue::Bool(true));
        assert_eq!(read(&interpreter, "major"), TreewalkValue::Int(3));
        assert_eq!(read(&interpreter, "linux"), TreewalkValue::Bool(true));
        assert_eq!(read(&interpreter, "loaded"), TreewalkValue::Bool(true));
        assert_eq!(read(&interpreter, "big"), TreewalkValue::Bool(true));

        let error = run_expect_error("import sys\nsys.exit(2)");
        assert_eq!(error.exception.kind, ExceptionKind::SystemExit);
        assert_eq!(error.line, 2);
    }

    #[test]
    fn io_module() {
        let interpreter = run(r#"
from io import StringIO
buffer = StringIO("seed")
text = buffer.read()
"#);
        assert_eq!(read(&interpreter, "text"), TreewalkValue::str("seed"));

        let error = run_expect_error("import io\nio.open('setup.cfg')");
        assert_eq!(error.exception.kind, ExceptionKind::PermissionError);
    }

    #[test]
    fn host_module_names() {
        assert!(is_native_root("os"));
        assert!(!is_native_root("numpy"));
        assert_eq!(
            eager_children(&ModuleName::from_dotted("os")),
            vec![ModuleName::from_dotted("os.path")]
        );
        assert!(eager_children(&ModuleName::from_dotted("sys")).is_empty());
    }
}
