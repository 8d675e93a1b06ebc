//! Interpreter table: file extension to command template.
//!
//! The resolver probes `target + ext` for every registered extension; a hit
//! means the matched file is a data loader executed through the template. An
//! empty template means the matched file is executed directly as the command.

/// Built-in interpreter commands by loader extension.
const DEFAULT_INTERPRETERS: &[(&str, &[&str])] = &[
    (".js", &["node", "--no-warnings=ExperimentalWarning"]),
    (".ts", &["tsx"]),
    (".py", &["python3"]),
    (".r", &["Rscript"]),
    (".R", &["Rscript"]),
    (".rs", &["rust-script"]),
    (".go", &["go", "run"]),
    (".java", &["java"]),
    (".jl", &["julia"]),
    (".php", &["php"]),
    (".sh", &["sh"]),
    (".exe", &[]),
];

/// Ordered mapping from file extension (with leading dot) to command
/// template. Iteration order is registration order, which is also the
/// resolver's probe order; re-registering an extension replaces its template
/// in place (last registration wins).
#[derive(Debug, Clone)]
pub struct InterpreterTable {
    entries: Vec<(String, Vec<String>)>,
}

impl InterpreterTable {
    /// The built-in table.
    pub fn new() -> Self {
        Self {
            entries: DEFAULT_INTERPRETERS
                .iter()
                .map(|(ext, command)| {
                    (
                        (*ext).to_string(),
                        command.iter().map(|s| (*s).to_string()).collect(),
                    )
                })
                .collect(),
        }
    }

    /// The built-in table with caller overrides applied. `Some` replaces or
    /// appends an entry; `None` disables a built-in extension.
    pub fn with_overrides<I>(overrides: I) -> Self
    where
        I: IntoIterator<Item = (String, Option<Vec<String>>)>,
    {
        let mut table = Self::new();
        for (ext, command) in overrides {
            match command {
                Some(command) => table.register(ext, command),
                None => table.entries.retain(|(e, _)| *e != ext),
            }
        }
        table
    }

    /// Register a command template for an extension.
    pub fn register(&mut self, ext: String, command: Vec<String>) {
        if let Some(entry) = self.entries.iter_mut().find(|(e, _)| *e == ext) {
            entry.1 = command;
        } else {
            self.entries.push((ext, command));
        }
    }

    /// Command template for an extension, if registered.
    pub fn lookup(&self, ext: &str) -> Option<&[String]> {
        self.entries
            .iter()
            .find(|(e, _)| e == ext)
            .map(|(_, command)| command.as_slice())
    }

    /// All entries in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries
            .iter()
            .map(|(ext, command)| (ext.as_str(), command.as_slice()))
    }

    /// Number of registered extensions.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for InterpreterTable {
    fn default() -> Self {
        Self::new()
    }
}
