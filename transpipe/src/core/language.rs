//! Language-specific knowledge for building per-test executable units.
//!
//! One compiled (C++) and one interpreted (Python) variant are supported. Each
//! knows how to spot test function names in a test source and how to append a
//! driver that invokes exactly one named test.

use std::borrow::Cow;
use std::collections::HashSet;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static CPP_TEST_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*(?:static\s+|inline\s+)*void\s+(test_\w+)\s*\(\s*(?:void)?\s*\)")
        .expect("cpp test pattern is valid")
});
static PYTHON_TEST_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^def\s+(test_\w+)\s*\(\s*\)").expect("python test pattern is valid")
});
static CPP_MAIN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^(\s*(?:int|auto)\s+)main(\s*\()").expect("cpp main pattern is valid")
});
static PYTHON_MAIN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?m)^if\s+__name__\s*==\s*(?:'__main__'|"__main__")\s*:"#)
        .expect("python main guard pattern is valid")
});

/// Name given to a C++ `main` displaced by the unit driver.
const DISPLACED_CPP_MAIN: &str = "displaced_main";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Cpp,
    Python,
}

impl Language {
    /// Whether a build step runs before execution.
    pub fn is_compiled(self) -> bool {
        match self {
            Self::Cpp => true,
            Self::Python => false,
        }
    }

    /// Source file name inside a unit's private directory.
    pub fn source_file(self) -> &'static str {
        match self {
            Self::Cpp => "unit.cpp",
            Self::Python => "unit.py",
        }
    }

    fn entry_point_pattern(self) -> &'static Regex {
        match self {
            Self::Cpp => &CPP_MAIN_RE,
            Self::Python => &PYTHON_MAIN_RE,
        }
    }

    /// Whether `source` has its own entry point (`main` or a `__main__` guard).
    pub fn has_entry_point(self, source: &str) -> bool {
        self.entry_point_pattern().is_match(source)
    }

    /// Neutralize an existing entry point so only the unit driver runs.
    ///
    /// A C++ `main` is renamed; a Python `__main__` guard becomes `if False:`.
    /// Line numbers are preserved.
    fn displace_entry_point(self, source: &str) -> Cow<'_, str> {
        match self {
            Self::Cpp => CPP_MAIN_RE.replace_all(source, format!("${{1}}{DISPLACED_CPP_MAIN}${{2}}")),
            Self::Python => PYTHON_MAIN_RE.replace_all(source, "if False:"),
        }
    }

    fn test_pattern(self) -> &'static Regex {
        match self {
            Self::Cpp => &CPP_TEST_RE,
            Self::Python => &PYTHON_TEST_RE,
        }
    }

    /// Test function names defined in `tests`, unique, in first-seen order.
    pub fn test_names(self, tests: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        self.test_pattern()
            .captures_iter(tests)
            .filter_map(|caps| caps.get(1))
            .map(|m| m.as_str().to_string())
            .filter(|name| seen.insert(name.clone()))
            .collect()
    }

    /// Self-contained program: implementation, tests, and a driver calling `test`.
    pub fn build_unit(self, implementation: &str, tests: &str, test: &str) -> String {
        let driver = match self {
            Self::Cpp => format!("int main() {{\n    {test}();\n    return 0;\n}}\n"),
            Self::Python => format!("if __name__ == \"__main__\":\n    {test}()\n"),
        };
        format!(
            "{}\n\n{}\n\n{}",
            self.displace_entry_point(implementation).trim_end(),
            self.displace_entry_point(tests).trim_end(),
            driver
        )
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Cpp => "cpp",
            Self::Python => "python",
        })
    }
}

/// Names present in both lists, in `a`'s order.
pub fn common_test_names(a: &[String], b: &[String]) -> Vec<String> {
    let in_b: HashSet<&str> = b.iter().map(String::as_str).collect();
    a.iter()
        .filter(|name| in_b.contains(name.as_str()))
        .cloned()
        .collect()
}
