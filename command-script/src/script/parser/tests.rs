//! # Parser 测试

use super::*;
use crate::script::command::{BUILTIN_COMMANDS, KnownCommands};
use crate::script::element::{Kind, Node};

fn parse(text: &str) -> ParsedScript {
    Parser::default().parse(text)
}

fn argument(script: &ParsedScript, index: usize) -> Arc<Element> {
    script.commands[index]
        .argument
        .clone()
        .expect("command has an argument")
}

fn messages(script: &ParsedScript) -> Vec<String> {
    script
        .diagnostics
        .iter()
        .map(|d| d.message.clone())
        .collect()
}

// -------------------------------------------------------------------------
// 命令切分
// -------------------------------------------------------------------------

#[test]
fn test_commands_one_per_line() {
    let script = parse("go-to: \"file://a.html\"\n\n// comment\nreload:\nclick: \"#id\"");
    assert!(script.diagnostics.is_empty(), "{:?}", script.diagnostics);
    let names: Vec<_> = script.commands.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["go-to", "reload", "click"]);
    assert_eq!(script.commands[1].line, 4);
    assert!(script.commands[1].argument.is_none());
    assert_eq!(script.commands[2].text, "click: \"#id\"");
}

#[test]
fn test_trailing_comment_not_in_command_text() {
    let script = parse("click: 1 // note\nreload:");
    assert!(script.diagnostics.is_empty());
    assert_eq!(script.commands.len(), 2);
    assert_eq!(script.commands[0].text, "click: 1");
    assert_eq!(script.commands[0].argument_text(), "1");
}

#[test]
fn test_argument_can_span_lines_inside_brackets() {
    let script = parse("click: (1,\n  2)\nreload:");
    assert!(script.diagnostics.is_empty());
    assert_eq!(script.commands.len(), 2);
    assert_eq!(script.commands[0].argument_text(), "(1, 2)");
    assert_eq!(script.commands[1].line, 3);
}

#[test]
fn test_unknown_command_is_fatal() {
    let catalog = KnownCommands::new(BUILTIN_COMMANDS.iter().copied());
    let script = Parser::new(&catalog).parse("reload:\nnope: 1\nreload:");
    assert_eq!(script.commands.len(), 2);
    assert_eq!(script.diagnostics.fatal_count(), 1);
    let diag = &script.diagnostics.diagnostics[0];
    assert_eq!(diag.message, "unknown command `nope`");
    assert_eq!(diag.line, Some(2));
    assert_eq!(diag.detail.as_deref(), Some("nope: 1"));
}

#[test]
fn test_missing_colon_is_fatal() {
    let script = parse("reload\nclick: 1");
    assert_eq!(script.commands.len(), 1);
    assert!(script.diagnostics.has_fatal());
    assert_eq!(
        messages(&script),
        vec!["expected `:` after command name `reload`"]
    );
}

#[test]
fn test_command_must_start_with_identifier() {
    let script = parse("\"click\": 1");
    assert!(script.diagnostics.has_fatal());
    assert_eq!(
        messages(&script),
        vec!["expected a command name, found `\"click\"`"]
    );
}

#[test]
fn test_trailing_tokens_after_argument() {
    let script = parse("click: 1 2\nreload:");
    assert_eq!(script.commands.len(), 2);
    assert!(!script.diagnostics.has_fatal());
    assert_eq!(
        messages(&script),
        vec!["unexpected `2` after command argument"]
    );
}

#[test]
fn test_recoverable_error_keeps_next_command() {
    let script = parse("click: (1 2)\nreload:");
    assert_eq!(script.commands.len(), 2);
    assert_eq!(script.commands[1].name, "reload");
    assert_eq!(script.diagnostics.len(), 1);
    assert!(!script.diagnostics.has_fatal());
    assert_eq!(
        messages(&script),
        vec!["expected `,` or `)` in tuple, found `2`"]
    );
}

#[test]
fn test_fatal_error_stops_script() {
    let script = parse("click: [1, \"a\"]\nclick: \"abc\nreload:");
    assert_eq!(script.commands.len(), 2);
    assert_eq!(script.diagnostics.len(), 2);
    assert!(!script.diagnostics.diagnostics[0].fatal);
    assert!(script.diagnostics.diagnostics[1].fatal);
    assert!(
        script.diagnostics.diagnostics[1]
            .message
            .starts_with("unclosed string")
    );
}

#[test]
fn test_parse_is_deterministic() {
    let text = "click: (1, \"a\")\nassert: |x| + 1 == 2\nwrite: [1, \"b\"]";
    assert_eq!(parse(text), parse(text));
}

// -------------------------------------------------------------------------
// 字面量
// -------------------------------------------------------------------------

#[test]
fn test_scalars() {
    let script = parse("a: \"s\"\nb: 'q'\nc: 12\nd: -3.5\ne: true\nf: some-ident");
    assert!(script.diagnostics.is_empty());
    let kinds: Vec<_> = (0..6).map(|i| argument(&script, i).kind()).collect();
    assert_eq!(
        kinds,
        vec![
            Kind::String,
            Kind::String,
            Kind::Number,
            Kind::Number,
            Kind::Bool,
            Kind::Ident
        ]
    );
    assert_eq!(argument(&script, 3).text(), "-3.5");
    assert_eq!(argument(&script, 3).number_value(), Some(-3.5));
    assert_eq!(argument(&script, 1).string_value(), "q");
}

#[test]
fn test_source_is_verbatim() {
    let script = parse("click: (1,\"a\" ,  [2])");
    let arg = argument(&script, 0);
    assert_eq!(arg.source(), "(1,\"a\" ,  [2])");
    assert_eq!(arg.text(), "(1, \"a\", [2])");
    let copy = Arc::clone(&arg);
    assert_eq!(copy.source(), arg.source());
}

#[test]
fn test_single_element_tuple() {
    assert_eq!(argument(&parse("a: (1,)"), 0).text(), "(1,)");
    assert_eq!(argument(&parse("a: (1)"), 0).text(), "(1)");
}

#[test]
fn test_variables() {
    let script = parse("click: |selector|");
    let arg = argument(&script, 0);
    assert_eq!(arg.node, Node::Variable("selector".to_string()));
    assert!(script.commands[0].has_variable);

    let script = parse("click: |selector");
    assert_eq!(
        messages(&script),
        vec!["missing `|` after variable name `selector`"]
    );
}

#[test]
fn test_unexpected_character() {
    let script = parse("click: @");
    assert_eq!(messages(&script), vec!["unexpected character `@`"]);
}

#[test]
fn test_extra_dot_in_number() {
    let script = parse("click: 1.2.3");
    assert_eq!(script.diagnostics.len(), 1);
    assert!(script.diagnostics.diagnostics[0].message.contains("only contain one `.`"));
}

// -------------------------------------------------------------------------
// 容器
// -------------------------------------------------------------------------

#[test]
fn test_array_kinds_must_match() {
    assert!(parse("a: [1, 2]").diagnostics.is_empty());

    let script = parse("a: [1, \"a\"]");
    assert_eq!(script.diagnostics.len(), 1);
    let message = &script.diagnostics.diagnostics[0].message;
    assert!(message.contains("expected array of `number`"), "{message}");
    assert!(message.contains("found `string` at position 1"), "{message}");
}

#[test]
fn test_tuples_are_heterogeneous() {
    let script = parse("a: (1, \"a\", true)");
    assert!(script.diagnostics.is_empty());
    assert_eq!(argument(&script, 0).children().len(), 3);
}

#[test]
fn test_json_keys_must_be_strings() {
    let script = parse("a: {\"a\": 1, |k|: [2]}");
    assert!(script.diagnostics.is_empty());

    let script = parse("a: {1: 2}");
    assert_eq!(
        messages(&script),
        vec!["only strings can be used as keys in JSON dict, found `number` (`1`)"]
    );
}

#[test]
fn test_json_missing_colon_and_value() {
    let script = parse("a: {\"k\" 1}");
    assert_eq!(
        messages(&script)[0],
        "expected `:` after key `\"k\"` in json"
    );

    let script = parse("a: {\"k\": }");
    assert_eq!(
        messages(&script),
        vec!["expected a value after `:` for key `\"k\"`"]
    );
}

#[test]
fn test_unclosed_containers_are_fatal() {
    for (text, message) in [
        ("a: (1, 2", "missing `)` to close tuple"),
        ("a: [1, 2", "missing `]` to close array"),
        ("a: {\"x\": 1", "missing `}` to close json"),
    ] {
        let script = parse(&format!("{text}\nreload:"));
        assert_eq!(script.diagnostics.fatal_count(), 1, "{text}");
        assert_eq!(script.diagnostics.fatal_only()[0].message, message);
        assert_eq!(script.commands.len(), 1);
    }
}

#[test]
fn test_unexpected_comma_in_tuple() {
    let script = parse("a: (1,, 2)");
    assert_eq!(messages(&script), vec!["unexpected `,` in tuple"]);
}

#[test]
fn test_deep_nesting_is_fatal() {
    let depth = 3000;
    let text = format!("a: {}1{}\nreload:", "[".repeat(depth), "]".repeat(depth));
    let script = parse(&text);
    assert_eq!(script.commands.len(), 1);
    assert_eq!(script.diagnostics.fatal_count(), 1);
    assert_eq!(
        script.diagnostics.fatal_only()[0].message,
        format!("nesting too deep: more than {MAX_NESTING} levels")
    );

    // 混合括号与块同样计入层数
    let mixed = format!(
        "a: {}block {{ reload: }}{}",
        "(".repeat(MAX_NESTING),
        ")".repeat(MAX_NESTING)
    );
    assert_eq!(parse(&mixed).diagnostics.fatal_count(), 1);
}

#[test]
fn test_nesting_within_limit_is_accepted() {
    let depth = MAX_NESTING;
    let text = format!("a: {}1{}", "[".repeat(depth), "]".repeat(depth));
    let script = parse(&text);
    assert!(script.diagnostics.is_empty(), "{:?}", script.diagnostics);
    assert_eq!(argument(&script, 0).text(), &text["a: ".len()..]);
}

// -------------------------------------------------------------------------
// 块
// -------------------------------------------------------------------------

#[test]
fn test_block_contains_commands() {
    let script = parse("a: block { reload: }");
    assert!(script.diagnostics.is_empty());
    let arg = argument(&script, 0);
    let Node::Block { commands, text } = &arg.node else {
        panic!("expected block, got {:?}", arg.kind());
    };
    assert_eq!(commands.len(), 1);
    assert_eq!(commands[0].name, "reload");
    assert!(commands[0].argument.is_none());
    assert_eq!(text, " reload: ");
}

#[test]
fn test_block_in_define_function() {
    let text = "define-function: (\n  \"f\",\n  [],\n  block {\n    reload:\n    click: 1\n  },\n)";
    let script = parse(text);
    assert!(script.diagnostics.is_empty(), "{:?}", script.diagnostics);
    let arg = argument(&script, 0);
    let items = arg.children();
    assert_eq!(items.len(), 3);
    let Node::Block { commands, .. } = &items[2].node else {
        panic!("expected block");
    };
    assert_eq!(commands.len(), 2);
    assert_eq!(commands[0].line, 5);
    assert_eq!(commands[1].line, 6);
}

#[test]
fn test_unclosed_block_is_fatal() {
    let script = parse("a: block { reload:");
    assert_eq!(script.diagnostics.len(), 1);
    let diag = &script.diagnostics.diagnostics[0];
    assert!(diag.fatal);
    assert!(diag.message.contains("missing `}`"));
}

#[test]
fn test_block_errors_are_reported() {
    let script = parse("a: block {\n  click: (1 2)\n}\nreload:");
    assert_eq!(script.commands.len(), 2);
    assert_eq!(script.diagnostics.len(), 1);
    assert_eq!(script.diagnostics.diagnostics[0].line, Some(2));
}

#[test]
fn test_block_elements_slice_outer_source() {
    let script = parse("a: block {\n  click: [1,  2]\n}");
    let arg = argument(&script, 0);
    let Node::Block { commands, .. } = &arg.node else {
        panic!("expected block");
    };
    let inner = commands[0].argument.clone().expect("click has an argument");
    assert_eq!(inner.source(), "[1,  2]");
    assert_eq!(inner.text(), "[1, 2]");
}

#[test]
fn test_block_word_without_brace_is_ident() {
    let script = parse("a: block");
    assert_eq!(argument(&script, 0).kind(), Kind::Ident);
}

// -------------------------------------------------------------------------
// 表达式
// -------------------------------------------------------------------------

#[test]
fn test_expression_is_flat() {
    let script = parse("a: 1 + 2 * |x|");
    assert!(script.diagnostics.is_empty());
    let arg = argument(&script, 0);
    assert_eq!(arg.kind(), Kind::Expression);
    assert_eq!(arg.children().len(), 5);
    assert_eq!(arg.text(), "1 + 2 * |x|");
    assert_eq!(arg.source(), "1 + 2 * |x|");
}

#[test]
fn test_sign_only_in_operand_position() {
    let script = parse("a: [-1, -2.5]");
    assert!(script.diagnostics.is_empty());

    let script = parse("a: 1 - -2");
    assert_eq!(messages(&script), vec!["unexpected `-` after `-`"]);
    assert_eq!(argument(&script, 0).children().len(), 3);
}

#[test]
fn test_operator_after_operator() {
    let script = parse("a: 1 - - 2");
    assert_eq!(messages(&script), vec!["unexpected `-` after `-`"]);
    assert!(!script.diagnostics.has_fatal());
}

#[test]
fn test_missing_operand() {
    let script = parse("a: 1 +\nreload:");
    assert_eq!(messages(&script), vec!["expected an element after `+`"]);
    assert_eq!(script.commands.len(), 2);
}

#[test]
fn test_or_between_variables() {
    let script = parse("a: |x| || |y|");
    assert!(script.diagnostics.is_empty());
    assert_eq!(argument(&script, 0).children().len(), 3);
}

// -------------------------------------------------------------------------
// 单个元素
// -------------------------------------------------------------------------

#[test]
fn test_parse_element_spans_lines() {
    let element = parse_element("{\n  \"a\": [1, 2],\n  \"b\": null\n}");
    assert!(!element.has_errors());
    assert_eq!(element.kind(), Kind::Json);
    assert_eq!(element.text(), "{\"a\": [1, 2], \"b\": null}");
}

#[test]
fn test_parse_element_trailing_content() {
    let element = parse_element("[1] x");
    assert_eq!(
        element.error.as_ref().map(|e| e.message.as_str()),
        Some("unexpected `x` after element")
    );

    let empty = parse_element("");
    assert_eq!(empty.kind(), Kind::Unknown);
    assert!(empty.has_errors());
}
