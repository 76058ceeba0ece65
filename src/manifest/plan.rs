// Build plan module
// Breaks install/build command strings into steps for inspection.
// Steps are never executed by the host.

use std::fmt;

use super::types::Manifest;

/// Runtime selected by a builder identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Runtime {
    Python,
    Node,
    Static,
    Go,
    Other(String),
}

impl Runtime {
    pub fn from_builder(builder: &str) -> Self {
        // Version pins look like "@vercel/python@4.1.0"
        let name = builder
            .rsplit_once('@')
            .filter(|(head, _)| !head.is_empty())
            .map_or(builder, |(head, _)| head);

        match name {
            "@vercel/python" => Self::Python,
            "@vercel/node" => Self::Node,
            "@vercel/static" => Self::Static,
            "@vercel/go" => Self::Go,
            _ => Self::Other(builder.to_string()),
        }
    }
}

impl fmt::Display for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Python => f.write_str("python"),
            Self::Node => f.write_str("node"),
            Self::Static => f.write_str("static"),
            Self::Go => f.write_str("go"),
            Self::Other(builder) => write!(f, "other ({builder})"),
        }
    }
}

/// What a command step does
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    PackageInstall,
    Compile,
    Other,
}

impl StepKind {
    fn classify(program: &str) -> Self {
        match program {
            "apt-get" | "apt" | "pip" | "pip3" | "npm" | "yarn" => Self::PackageInstall,
            "gcc" | "cc" | "clang" | "javac" | "rustc" | "go" => Self::Compile,
            _ => Self::Other,
        }
    }

    const fn label(self) -> &'static str {
        match self {
            Self::PackageInstall => "install",
            Self::Compile => "compile",
            Self::Other => "run",
        }
    }
}

/// One command of an `&&` chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandStep {
    pub program: String,
    pub args: Vec<String>,
    pub kind: StepKind,
}

impl CommandStep {
    fn parse(command: &str) -> Option<Self> {
        let mut words = command.split_whitespace().map(ToString::to_string);
        let program = words.next()?;
        let kind = StepKind::classify(&program);
        Some(Self {
            program,
            args: words.collect(),
            kind,
        })
    }
}

impl fmt::Display for CommandStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind.label(), self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Split a shell command string on `&&`
pub fn split_command(command: &str) -> Vec<CommandStep> {
    command.split("&&").filter_map(CommandStep::parse).collect()
}

/// Everything the manifest asks the platform to do before serving
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildPlan {
    pub install: Vec<CommandStep>,
    pub build: Vec<CommandStep>,
    pub entrypoints: Vec<(String, Runtime)>,
}

impl BuildPlan {
    pub fn from_manifest(manifest: &Manifest) -> Self {
        Self {
            install: manifest
                .install_command
                .as_deref()
                .map(split_command)
                .unwrap_or_default(),
            build: manifest
                .build_command
                .as_deref()
                .map(split_command)
                .unwrap_or_default(),
            entrypoints: manifest
                .builds
                .iter()
                .map(|b| (b.src.clone(), Runtime::from_builder(&b.builder)))
                .collect(),
        }
    }
}

impl fmt::Display for BuildPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Install steps:")?;
        write_steps(f, &self.install)?;
        writeln!(f, "Build steps:")?;
        write_steps(f, &self.build)?;
        writeln!(f, "Entrypoints:")?;
        if self.entrypoints.is_empty() {
            writeln!(f, "  (none)")?;
        }
        for (src, runtime) in &self.entrypoints {
            writeln!(f, "  {src} -> {runtime}")?;
        }
        Ok(())
    }
}

fn write_steps(f: &mut fmt::Formatter<'_>, steps: &[CommandStep]) -> fmt::Result {
    if steps.is_empty() {
        return writeln!(f, "  (none)");
    }
    for (i, step) in steps.iter().enumerate() {
        writeln!(f, "  {}. {step}", i + 1)?;
    }
    Ok(())
}
