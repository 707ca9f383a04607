//! Injection script compiler.
//!
//! A profile is turned into [`OverrideBlock`]s, each block into statements,
//! and the program into one strict-mode IIFE:
//!
//! ```text
//! (function () {
//!   'use strict';
//!   try {
//!     <prelude helpers>
//!     try { <block> } catch (e) { console.debug("override failed", "<name>", e); }
//!     ...
//!   } catch (e) {
//!   }
//! })();
//! ```
//!
//! A failing block leaves its API un-spoofed and the rest still run. With
//! nothing to spoof the output is the bare wrapper, no prelude.

pub mod ast;
pub mod blocks;
pub mod install;
pub mod prelude;

pub use blocks::{OverrideBlock, PRIVATE_ADDRESS_PATTERN};
pub use install::InstallContext;

use crate::dom::Window;
use crate::native::NativeWrapper;
use crate::profile::FingerprintProfile;
use ast::{Expr, Renderer, Stmt};
use prelude::Helper;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use tracing::{debug, warn};

/// Compiler settings.
#[derive(Debug, Clone, Copy)]
pub struct Compiler {
    /// Indented, one statement per line. Compact output joins lines.
    pub pretty: bool,
}

impl Default for Compiler {
    fn default() -> Self {
        Self { pretty: true }
    }
}

impl Compiler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn compact() -> Self {
        Self { pretty: false }
    }

    pub fn compile_script(&self, profile: &FingerprintProfile) -> CompiledScript {
        let blocks = OverrideBlock::plan(profile);

        let mut helpers = BTreeSet::new();
        for block in &blocks {
            for helper in block.helpers() {
                helpers.extend(helper.requires().iter().copied());
                helpers.insert(helper);
            }
        }

        let mut body: Vec<Stmt> = helpers.iter().map(|h| Stmt::Raw(h.source())).collect();
        for block in &blocks {
            debug!(block = block.name(), "emitting override block");
            body.push(Stmt::Try {
                body: block.to_stmts(),
                binding: "e".to_string(),
                handler: vec![Expr::ident("console")
                    .member("debug")
                    .call(vec![
                        Expr::str("override failed"),
                        Expr::str(block.name()),
                        Expr::ident("e"),
                    ])
                    .stmt()],
            });
        }

        let program = [Stmt::Iife(vec![
            Stmt::Directive("use strict"),
            Stmt::Try {
                body,
                binding: "e".to_string(),
                handler: Vec::new(),
            },
        ])];
        let source = Renderer::new(self.pretty).render(&program);
        debug!(
            blocks = blocks.len(),
            helpers = helpers.len(),
            bytes = source.len(),
            "compiled injection script"
        );
        CompiledScript {
            source,
            blocks,
            helpers: helpers.into_iter().collect(),
        }
    }
}

/// A compiled script and the blocks it was built from.
#[derive(Debug, Clone)]
pub struct CompiledScript {
    source: String,
    blocks: Vec<OverrideBlock>,
    helpers: Vec<Helper>,
}

/// Outcome of [`CompiledScript::install`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InstallReport {
    pub applied: Vec<String>,
    /// `(block, error)` for blocks that threw.
    pub failed: Vec<(String, String)>,
}

impl InstallReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

impl CompiledScript {
    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn into_string(self) -> String {
        self.source
    }

    pub fn blocks(&self) -> &[OverrideBlock] {
        &self.blocks
    }

    pub fn block_names(&self) -> Vec<&'static str> {
        self.blocks.iter().map(OverrideBlock::name).collect()
    }

    pub fn helpers(&self) -> &[Helper] {
        &self.helpers
    }

    /// No blocks: the source is the bare wrapper.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Run the script's blocks against `window`, isolating failures per
    /// block the way the emitted `try/catch` does.
    pub fn install(&self, window: &Window, natives: &NativeWrapper) -> InstallReport {
        let ctx = InstallContext::new(window, natives);
        let mut report = InstallReport::default();
        for block in &self.blocks {
            match block.install(&ctx) {
                Ok(()) => report.applied.push(block.name().to_string()),
                Err(e) => {
                    warn!(block = block.name(), error = %e, "override failed");
                    report.failed.push((block.name().to_string(), e.to_string()));
                }
            }
        }
        report
    }
}

impl fmt::Display for CompiledScript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

impl AsRef<str> for CompiledScript {
    fn as_ref(&self) -> &str {
        &self.source
    }
}

/// Compile `profile` into page-injectable JavaScript.
pub fn compile(profile: &FingerprintProfile) -> String {
    Compiler::default().compile_script(profile).into_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::{FingerprintGenerator, GenerateOptions};

    fn profile() -> FingerprintProfile {
        FingerprintGenerator::with_seed(42)
            .generate(&GenerateOptions::windows().browser("chrome-120"))
            .unwrap()
    }

    #[test]
    fn test_prelude_emitted_once() {
        let source = compile(&profile());
        assert_eq!(source.matches("const make = ").count(), 1);
        assert_eq!(source.matches("const pixelNoise = ").count(), 1);
        assert!(source.starts_with("(function () {\n  'use strict';\n  try {\n"));
        assert!(source.ends_with("})();\n"));
    }

    #[test]
    fn test_each_block_isolated() {
        let script = Compiler::default().compile_script(&profile());
        let source = script.as_str();
        for name in script.block_names() {
            let handler = format!("console.debug(\"override failed\", \"{}\", e);", name);
            assert!(source.contains(&handler), "{} has no handler", name);
        }
    }

    #[test]
    fn test_compact_has_no_indentation() {
        let script = Compiler::compact().compile_script(&profile());
        assert!(!script.as_str().contains("\n  "));
    }
}
