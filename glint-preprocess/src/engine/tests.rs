use super::*;

fn run(source: &str) -> PreprocessResult<String> {
    Preprocessor::new().preprocess(source, &[])
}

fn run_with(source: &str, defines: &[(&str, &str)]) -> PreprocessResult<String> {
    let defines: Vec<MacroDefine> = defines
        .iter()
        .map(|(name, value)| MacroDefine::new(*name, *value))
        .collect();
    Preprocessor::new().preprocess(source, &defines)
}

#[test]
fn test_plain_source_passes_through() {
    let source = "#version 450\nvoid main() {}\n";
    assert_eq!(run(source).unwrap(), source);
}

#[test]
fn test_object_define() {
    let out = run("#define PI 3.14\nfloat x = PI;\n").unwrap();
    assert_eq!(out, "\nfloat x = 3.14;\n");
}

#[test]
fn test_parenthesised_object_define() {
    let out = run("#define V (1.0)\nfloat v = V;").unwrap();
    assert_eq!(out, "\nfloat v = (1.0);\n");
}

#[test]
fn test_function_define() {
    let out = run("#define SQ(x) ((x)*(x))\nfloat y = SQ(a + 1);").unwrap();
    assert_eq!(out, "\nfloat y = ((a + 1)*(a + 1));\n");
}

#[test]
fn test_external_defines_apply() {
    let out = run_with("float a = A;", &[("A", "1.0")]).unwrap();
    assert_eq!(out, "float a = 1.0;\n");
}

#[test]
fn test_later_define_wins() {
    let out = run_with("int x = X;", &[("X", "1"), ("X", "2")]).unwrap();
    assert_eq!(out, "int x = 2;\n");
}

#[test]
fn test_gl_es_precision_block() {
    let source = "#ifdef GL_ES\nprecision mediump float;\n#endif\nvoid main(){}";
    assert_eq!(
        run_with(source, &[("GL_ES", "1")]).unwrap(),
        "\nprecision mediump float;\n\nvoid main(){}\n"
    );
    assert_eq!(run(source).unwrap(), "\n\n\nvoid main(){}\n");
}

#[test]
fn test_ifdef_else() {
    let source = "#ifdef FOO\nfoo\n#else\nbar\n#endif\n";
    assert_eq!(run_with(source, &[("FOO", "1")]).unwrap(), "\nfoo\n\n\n\n");
    assert_eq!(run(source).unwrap(), "\n\n\nbar\n\n");
}

#[test]
fn test_ifndef() {
    let source = "#ifndef FOO\nmissing\n#endif\n";
    assert_eq!(run(source).unwrap(), "\nmissing\n\n");
    assert_eq!(run_with(source, &[("FOO", "")]).unwrap(), "\n\n\n");
}

#[test]
fn test_elif_chain() {
    let source = "#if MODE == 1\none\n#elif MODE == 2\ntwo\n#else\nother\n#endif";
    assert_eq!(
        run_with(source, &[("MODE", "2")]).unwrap(),
        "\n\n\ntwo\n\n\n\n"
    );
    assert_eq!(
        run_with(source, &[("MODE", "1")]).unwrap(),
        "\none\n\n\n\n\n\n"
    );
    assert_eq!(
        run_with(source, &[("MODE", "7")]).unwrap(),
        "\n\n\n\n\nother\n\n"
    );
}

#[test]
fn test_defined_operator() {
    let source = "#if defined(A) && !defined B\nyes\n#endif";
    assert_eq!(run_with(source, &[("A", "1")]).unwrap(), "\nyes\n\n");
    assert_eq!(run_with(source, &[("A", "1"), ("B", "1")]).unwrap(), "\n\n\n");
}

#[test]
fn test_empty_define_counts_as_defined() {
    let out = run_with("#if defined(EMPTY)\nok\n#endif", &[("EMPTY", "")]).unwrap();
    assert_eq!(out, "\nok\n\n");
}

#[test]
fn test_define_value_in_condition() {
    let out = run_with("#if COUNT > 2\nmany\n#endif", &[("COUNT", "4")]).unwrap();
    assert_eq!(out, "\nmany\n\n");
}

#[test]
fn test_unknown_identifier_in_condition_is_false() {
    let out = run("#if UNDEFINED\nx\n#else\ny\n#endif").unwrap();
    assert_eq!(out, "\n\n\ny\n\n");
}

#[test]
fn test_inactive_region_skips_everything() {
    let source = "#if 0\n#if 1\nhidden\n#endif\n#bogus\n#error nope\n#endif\nshown";
    assert_eq!(run(source).unwrap(), "\n\n\n\n\n\n\nshown\n");
}

#[test]
fn test_undef() {
    let out = run("#define A 1\n#undef A\n#ifdef A\nx\n#endif\n").unwrap();
    assert_eq!(out, "\n\n\n\n\n");
}

#[test]
fn test_comments_removed_lines_kept() {
    let source = "float a; // PI here\n/* multi\nline */ float b;\n";
    let out = run_with(source, &[("PI", "3.14")]).unwrap();
    assert_eq!(out, "float a; \n \n float b;\n");
}

#[test]
fn test_line_splicing_keeps_line_count() {
    let source = "#define ADD(a, b) \\\n  ((a) + (b))\nint x = ADD(1, 2);\n";
    assert_eq!(run(source).unwrap(), "\n\nint x = ((1) + (2));\n");
}

#[test]
fn test_macro_arguments_continue_on_next_line() {
    let source = "#define ADD(a, b) ((a) + (b))\nfloat x = ADD(1.0,\n    2.0);";
    assert_eq!(run(source).unwrap(), "\nfloat x = ((1.0) + (2.0));\n\n");

    let source = "#define ADD(a, b) ((a) + (b))\nfloat x = ADD(\n  1.0,\n  2.0\n);\nfloat y;\n";
    let out = run(source).unwrap();
    assert_eq!(out, "\nfloat x = ((1.0) + (2.0));\n\n\n\nfloat y;\n");
    assert_eq!(out.lines().count(), source.lines().count());
}

#[test]
fn test_unclosed_macro_call_is_an_error() {
    let err = run("#define F(x) x\nF(1,\n2").unwrap_err();
    assert_eq!(
        err,
        PreprocessError::UnterminatedArguments {
            name: "F".to_string(),
            line: 2,
        }
    );

    let err = run("#define F(x) x\n#if 1\nF(1,\n#endif\n").unwrap_err();
    assert!(matches!(err, PreprocessError::UnterminatedArguments { line: 3, .. }));
}

#[test]
fn test_object_macro_expanding_to_function_macro_name() {
    let source = "#define F(x) x\n#define G F\nfloat y = G(1.0);";
    assert_eq!(run(source).unwrap(), "\n\nfloat y = 1.0;\n");
}

#[test]
fn test_expanded_argument_is_not_expanded_again() {
    let source = "#define color color * tint\n#define ID(x) x\nID(color)";
    assert_eq!(run(source).unwrap(), "\n\ncolor * tint\n");
}

#[test]
fn test_line_count_preserved() {
    let source = "#version 300 es\n\
                  #define N 4\n\
                  #ifdef GL_ES\n\
                  precision highp float;\n\
                  #endif\n\
                  /* a\n\
                  b */\n\
                  uniform vec4 u[N];\n\
                  void main() {}\n";
    let out = run_with(source, &[("GL_ES", "1")]).unwrap();
    assert_eq!(out.lines().count(), source.lines().count());
    assert!(out.starts_with("#version 300 es\n"));
    assert!(out.contains("uniform vec4 u[4];"));
}

#[test]
fn test_driver_directives_pass_through() {
    let source = "#version 100\n#extension GL_OES_standard_derivatives : enable\n#pragma optimize(off)\n#line 10\n";
    assert_eq!(run(source).unwrap(), source);
}

#[test]
fn test_crlf_input() {
    assert_eq!(run("a\r\nb\r\n").unwrap(), "a\nb\n");
}

#[test]
fn test_null_directive() {
    assert_eq!(run("#\nx\n").unwrap(), "\nx\n");
}

#[test]
fn test_state_does_not_leak_between_calls() {
    let engine = Preprocessor::new();
    engine.preprocess("#define A 1\n", &[]).unwrap();
    let out = engine.preprocess("#ifdef A\nleak\n#endif\n", &[]).unwrap();
    assert_eq!(out, "\n\n\n");
}

#[test]
fn test_error_directive() {
    let err = run("#if 1\n#error missing feature\n#endif").unwrap_err();
    assert_eq!(
        err,
        PreprocessError::ErrorDirective {
            message: "missing feature".to_string(),
            line: 2,
        }
    );
}

#[test]
fn test_unknown_directive() {
    let err = run("void main() {}\n#frobnicate\n").unwrap_err();
    assert_eq!(
        err,
        PreprocessError::UnknownDirective {
            directive: "frobnicate".to_string(),
            line: 2,
        }
    );
}

#[test]
fn test_include_must_be_resolved_first() {
    let err = run("#include \"a.glsl\"").unwrap_err();
    assert_eq!(err, PreprocessError::UnresolvedInclude { line: 1 });
}

#[test]
fn test_unbalanced_conditionals() {
    assert_eq!(
        run("#endif").unwrap_err(),
        PreprocessError::UnbalancedConditional {
            directive: "endif".to_string(),
            line: 1,
        }
    );
    assert!(matches!(
        run("x\n#else\n").unwrap_err(),
        PreprocessError::UnbalancedConditional { line: 2, .. }
    ));
}

#[test]
fn test_unterminated_conditional() {
    assert_eq!(
        run("\n#ifdef A\n#if 1\n").unwrap_err(),
        PreprocessError::UnterminatedConditional { count: 2, line: 2 }
    );
}

#[test]
fn test_elif_after_else() {
    let err = run("#if 0\n#else\n#elif 1\n#endif").unwrap_err();
    assert!(matches!(err, PreprocessError::Malformed { line: 3, .. }));
}

#[test]
fn test_invalid_expression() {
    let err = run("#if 1 +\n#endif").unwrap_err();
    assert!(matches!(err, PreprocessError::InvalidExpression { line: 1, .. }));

    let err = run("#if defined(\n#endif").unwrap_err();
    assert!(matches!(err, PreprocessError::InvalidExpression { line: 1, .. }));
}

#[test]
fn test_malformed_define() {
    assert!(matches!(
        run("#define 1abc 2").unwrap_err(),
        PreprocessError::Malformed { line: 1, .. }
    ));
    assert!(matches!(
        run("#define F(a, 2) a").unwrap_err(),
        PreprocessError::Malformed { .. }
    ));
}

#[test]
fn test_recursion_limit_is_configurable() {
    let source = "#define A B\n#define B C\n#define C D\nA\n";
    assert_eq!(run(source).unwrap(), "\n\n\nD\n");

    let shallow = Preprocessor::new().with_max_expansion_depth(1);
    assert!(matches!(
        shallow.preprocess(source, &[]),
        Err(PreprocessError::RecursionLimit { line: 4, .. })
    ));
}
