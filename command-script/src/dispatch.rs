//! # Dispatch 模块
//!
//! 把解析好的脚本逐条交给下游编译器。
//!
//! ```text
//! ParsedScript ──► prepare（替换 + 检查）──► CommandDispatch ──► 指令
//!                        │                        │
//!                        └──── 诊断 ◄──────────────┘
//! ```
//!
//! 下游编译器只会看到没有任何错误的命令。

use tracing::{debug, warn};

use crate::config::ScriptConfig;
use crate::diagnostic::{Diagnostic, DiagnosticResult};
use crate::script::ParsedScript;
use crate::script::command::CommandNode;
use crate::variables::Variables;

/// 下游命令编译器
pub trait CommandDispatch {
    /// 把一条已检查的命令翻译为指令；失败时返回错误信息
    fn dispatch(&self, command: &CommandNode) -> Result<Vec<String>, String>;
}

/// 编译结果
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompileOutput {
    /// 按命令顺序排列的指令
    pub instructions: Vec<String>,
    pub diagnostics: DiagnosticResult,
}

impl CompileOutput {
    pub fn is_ok(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

/// 编译整个脚本
///
/// 有错误的命令不交给下游，诊断累积后继续；遇到致命诊断时停止。
pub fn compile_script(
    script: &ParsedScript,
    vars: &Variables<'_>,
    config: &ScriptConfig,
    dispatcher: &dyn CommandDispatch,
) -> CompileOutput {
    let mut output = CompileOutput::default();

    for command in &script.commands {
        let prepared = command.prepare(vars, config);
        if !prepared.is_ok() {
            let fatal = prepared.diagnostics.has_fatal();
            output.diagnostics.merge(prepared.diagnostics);
            if fatal {
                warn!(line = command.line, name = %command.name, "stopping at fatal diagnostic");
                break;
            }
            continue;
        }

        match dispatcher.dispatch(&prepared.command) {
            Ok(instructions) => output.instructions.extend(instructions),
            Err(message) => output.diagnostics.push(
                Diagnostic::error(message)
                    .with_line(command.line)
                    .with_detail(command.text.trim()),
            ),
        }
    }

    debug!(
        instructions = output.instructions.len(),
        errors = output.diagnostics.error_count(),
        "compiled script"
    );
    output
}
