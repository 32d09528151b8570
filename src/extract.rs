//! The extraction pipeline: parse a build descriptor, neutralize it, run it in the sandbox and
//! hand back whatever the registration call was given.

use std::{fmt, io::Read, path::Path};

use thiserror::Error;

use crate::{
    config::ExtractConfig,
    core::{log, LogLevel},
    domain::{Source, Text},
    parser::parse,
    sanitizer::{neutralize, AvailabilityProber, HostModules},
    treewalk::{
        compile::{compile, fix_missing_locations},
        RaisedException, TreewalkInterpreter,
    },
};

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("could not read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("File \"{path}\", line {line}\nSyntaxError: {message}")]
    MalformedSource {
        path: String,
        line: usize,
        message: String,
    },
    #[error("File \"{path}\", line {line}\n{exception}")]
    ExecutionFailure {
        path: String,
        line: usize,
        /// The raised exception as Python prints it, e.g. `KeyError: 'name'`.
        exception: String,
    },
}

impl ExtractError {
    pub fn path(&self) -> &str {
        match self {
            ExtractError::Io { path, .. }
            | ExtractError::MalformedSource { path, .. }
            | ExtractError::ExecutionFailure { path, .. } => path,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Parsing,
    Neutralizing,
    Executing,
    Captured,
    Failed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Idle => "idle",
            Phase::Parsing => "parsing",
            Phase::Neutralizing => "neutralizing",
            Phase::Executing => "executing",
            Phase::Captured => "captured",
            Phase::Failed => "failed",
        };
        write!(f, "{name}")
    }
}

/// Runs extractions one after another. Every run builds its own interpreter and capture buffer,
/// so nothing a descriptor does is visible to the next one.
pub struct Extractor<'a> {
    config: &'a ExtractConfig,
    prober: &'a dyn AvailabilityProber,
    phase: Phase,
    history: Vec<Phase>,
}

impl<'a> Extractor<'a> {
    pub fn new(config: &'a ExtractConfig, prober: &'a dyn AvailabilityProber) -> Self {
        Self {
            config,
            prober,
            phase: Phase::Idle,
            history: vec![],
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Every phase entered so far, oldest first.
    pub fn history(&self) -> &[Phase] {
        &self.history
    }

    fn enter(&mut self, phase: Phase) {
        log(LogLevel::Debug, || format!("Extraction {} -> {phase}", self.phase));
        self.phase = phase;
        self.history.push(phase);
    }

    pub fn extract(&mut self, source: &Source) -> Result<Vec<String>, ExtractError> {
        let result = self.run(source);
        match &result {
            Ok(_) => self.enter(Phase::Captured),
            Err(e) => {
                log(LogLevel::Debug, || format!("Extraction failed: {e}"));
                self.enter(Phase::Failed);
            }
        }
        self.enter(Phase::Idle);
        result
    }

    fn run(&mut self, source: &Source) -> Result<Vec<String>, ExtractError> {
        let path = source.path_str();

        self.enter(Phase::Parsing);
        let ast = parse(source.text()).map_err(|e| ExtractError::MalformedSource {
            path: path.clone(),
            line: e.line(),
            message: e.message(),
        })?;

        self.enter(Phase::Neutralizing);
        let mut ast = neutralize(ast, self.prober, self.config);

        self.enter(Phase::Executing);
        fix_missing_locations(&mut ast);
        compile(&ast).map_err(|e| ExtractError::MalformedSource {
            path: path.clone(),
            line: e.line,
            message: e.message,
        })?;

        let interpreter = TreewalkInterpreter::new(self.config, self.prober, &path);
        interpreter
            .execute(&ast)
            .map_err(|raised| ExtractError::ExecutionFailure {
                path: path.clone(),
                line: raised.line,
                exception: describe(&interpreter, &raised),
            })?;

        let mut capture = interpreter.take_capture();
        if capture.is_empty() {
            log(LogLevel::Debug, || {
                format!("{path} never reached the registration call")
            });
        }
        Ok(capture.drain())
    }
}

/// Render an exception the way the last line of a Python traceback does.
fn describe(interpreter: &TreewalkInterpreter, raised: &RaisedException) -> String {
    let kind = raised.exception.type_name();
    let message = interpreter
        .str(&raised.exception.as_value())
        .unwrap_or_default();
    if message.is_empty() {
        kind
    } else {
        format!("{kind}: {message}")
    }
}

/// Extract the requirements of an in-memory descriptor.
pub fn extract(
    source: &Source,
    prober: &dyn AvailabilityProber,
    config: &ExtractConfig,
) -> Result<Vec<String>, ExtractError> {
    Extractor::new(config, prober).extract(source)
}

/// Extract from `text`, reporting diagnostics against `path`. Modules are probed with the host
/// modules plus the configured extras.
pub fn extract_text(
    text: &str,
    path: &str,
    config: &ExtractConfig,
) -> Result<Vec<String>, ExtractError> {
    let prober = HostModules::new(config.available_modules.iter().cloned());
    extract(&Source::new(path, Text::new(text)), &prober, config)
}

pub fn extract_from_path(
    path: impl AsRef<Path>,
    prober: &dyn AvailabilityProber,
    config: &ExtractConfig,
) -> Result<Vec<String>, ExtractError> {
    let source = Source::from_path(&path).map_err(|source| ExtractError::Io {
        path: path.as_ref().to_string_lossy().into_owned(),
        source,
    })?;
    extract(&source, prober, config)
}

pub fn extract_from_reader<R: Read>(
    path: &str,
    reader: R,
    prober: &dyn AvailabilityProber,
    config: &ExtractConfig,
) -> Result<Vec<String>, ExtractError> {
    let source = Source::from_reader(path, reader).map_err(|source| ExtractError::Io {
        path: path.to_string(),
        source,
    })?;
    extract(&source, prober, config)
}
