use crate::complete::CompletionList;
use crate::exec::STATUS_READ_TOO_MUCH;
use crate::expand::{
    expand_one, expand_string, expand_to_command_and_args, ExpandFlags, ExpandResult,
};
use crate::operation_context::{no_cancel, OperationContext, EXPANSION_LIMIT_DEFAULT};
use crate::parse_constants::{ParseErrorCode, ParseErrorList};
use crate::sentinel::reserved_codepoint;
use crate::tests::prelude::*;
use crate::util::getpid;
use crate::wchar::prelude::*;

fn expand_test_impl(
    shell: &TestShell,
    input: &wstr,
    flags: ExpandFlags,
    expected: Vec<WString>,
    error_message: Option<&str>,
) {
    let mut output = CompletionList::new();
    let mut errors = ParseErrorList::new();
    let ctx = shell.ctx();

    if expand_string(input.to_owned(), &mut output, flags, &ctx, Some(&mut errors))
        == ExpandResult::error
    {
        assert_ne!(
            errors,
            vec![],
            "Bug: Parse error reported but no error text found."
        );
        panic!("{}", errors[0].describe(input, false));
    }

    let output: Vec<WString> = output.into_iter().map(|c| c.completion).collect();
    assert_eq!(
        output,
        expected,
        "{}",
        error_message.unwrap_or("expand mismatch")
    );
}

/// Perform parameter expansion and test if the output equals the parameter list supplied.
macro_rules! expand_test {
    ($shell:expr, $input:expr, $flags:expr, ( $($expected:expr),* $(,)? )) => {
        expand_test_impl(&$shell, L!($input), $flags, vec![$( $expected.into(), )*], None)
    };
    ($shell:expr, $input:expr, $flags:expr, ( $($expected:expr),* $(,)? ), $error:literal) => {
        expand_test_impl(&$shell, L!($input), $flags, vec![$( $expected.into(), )*], Some($error))
    };
    ($shell:expr, $input:expr, $flags:expr, $expected:expr) => {
        expand_test_impl(&$shell, L!($input), $flags, vec![ $expected.into() ], None)
    };
    ($shell:expr, $input:expr, $flags:expr, $expected:expr, $error:literal) => {
        expand_test_impl(&$shell, L!($input), $flags, vec![ $expected.into() ], Some($error))
    };
}

/// Run an expansion which is expected to fail, returning the result code and the error list.
fn expand_fail(shell: &TestShell, input: &wstr, flags: ExpandFlags) -> (ExpandResult, ParseErrorList) {
    let mut output = CompletionList::new();
    let mut errors = ParseErrorList::new();
    let ctx = shell.ctx();
    let res = expand_string(input.to_owned(), &mut output, flags, &ctx, Some(&mut errors));
    assert_eq!(res, ExpandResult::error, "expected expansion to fail");
    (res, errors)
}

const NOFLAGS: ExpandFlags = ExpandFlags::empty();

#[test]
fn test_expand_trivial() {
    let shell = TestShell::new();
    expand_test!(shell, "foo", NOFLAGS, "foo", "Strings do not expand to themselves");
    expand_test!(shell, "", NOFLAGS, "");
    // Quoting and escaping just reproduce the literal text.
    expand_test!(shell, "'foo'", NOFLAGS, "foo");
    expand_test!(shell, "\"foo\"", NOFLAGS, "foo");
    expand_test!(shell, "fo\\o", NOFLAGS, "foo");
    expand_test!(shell, "pre\\(notsub\\)", NOFLAGS, "pre(notsub)");
}

#[test]
fn test_expand_braces() {
    let shell = TestShell::new();
    expand_test!(
        shell,
        "a{b,c,d}e",
        NOFLAGS,
        ("abe", "ace", "ade"),
        "Brace expansion is broken"
    );
    expand_test!(
        shell,
        "a{1,2,3}b",
        NOFLAGS,
        ("a1b", "a2b", "a3b"),
        "Brace expansion is broken"
    );
    expand_test!(
        shell,
        "a{b{1,2},c}d",
        NOFLAGS,
        ("ab1d", "ab2d", "acd"),
        "Nested brace expansion is broken"
    );
    expand_test!(
        shell,
        "{a,b}{1,2}",
        NOFLAGS,
        ("a1", "a2", "b1", "b2"),
        "Brace expansion is not order-preserving"
    );
    expand_test!(
        shell,
        "{ alpha , b}",
        NOFLAGS,
        ("alpha", "b"),
        "Spaces at brace margins are not trimmed"
    );
    expand_test!(
        shell,
        "{a b,c}",
        NOFLAGS,
        ("a b", "c"),
        "Interior spaces in brace items are not preserved"
    );
    // A brace group without a separator or variable is literal input.
    expand_test!(shell, "{foo}", NOFLAGS, "{foo}");
    expand_test!(shell, "{}", NOFLAGS, "{}");
    // Quoted braces are never expansion syntax.
    expand_test!(shell, "'{a,b}'", NOFLAGS, "{a,b}");
}

#[test]
fn test_expand_braces_errors() {
    let shell = TestShell::new();
    let (_, errors) = expand_fail(&shell, L!("{a,b"), NOFLAGS);
    assert_eq!(errors[0].code, ParseErrorCode::syntax);
    assert_eq!(errors[0].text, "Mismatched braces");

    // An unmatched closing brace is also a syntax error.
    let (_, errors) = expand_fail(&shell, L!("a,b}"), NOFLAGS);
    assert_eq!(errors[0].text, "Mismatched braces");
}

#[test]
fn test_expand_braces_for_completions() {
    // An unclosed brace during completion synthesizes the closing brace and completes the last
    // item typed.
    let mut shell = TestShell::new();
    shell.matcher = TestMatcher::with_files(&["beta1", "beta2", "alpha"]);
    expand_test!(
        shell,
        "{alpha,bet",
        ExpandFlags::FOR_COMPLETIONS,
        ("beta1", "beta2"),
        "Unclosed brace does not complete"
    );
}

#[test]
fn test_expand_variables() {
    let mut shell = TestShell::new();
    shell.env.set("x", &["a", "b", "c"]);
    shell.env.set("single", &["alone"]);
    shell.env.set("empty", &[""]);
    shell.env.set("inner", &["x"]);

    expand_test!(shell, "$x", NOFLAGS, ("a", "b", "c"));
    expand_test!(
        shell,
        "prefix-$x-suffix",
        NOFLAGS,
        ("prefix-a-suffix", "prefix-b-suffix", "prefix-c-suffix"),
        "Cartesian product expansion is broken"
    );
    expand_test!(
        shell,
        "\"prefix-$x-suffix\"",
        NOFLAGS,
        "prefix-a b c-suffix",
        "Quoted expansion does not join with the delimiter"
    );
    expand_test!(shell, "$single", NOFLAGS, "alone");
    // Missing variables expand to nothing, and take the whole argument with them.
    expand_test!(shell, "$unset", NOFLAGS, ());
    expand_test!(shell, "pre$unset", NOFLAGS, ());
    // In quotes, a missing variable expands to an empty string instead.
    expand_test!(shell, "\"$unset\"", NOFLAGS, "");
    expand_test!(shell, "\"$unset$x\"", NOFLAGS, "a b c");
    // $$var performs double expansion.
    expand_test!(shell, "$$inner", NOFLAGS, ("a", "b", "c"));
    // An empty value concatenates as the empty string.
    expand_test!(shell, "$empty$single", NOFLAGS, "alone");
    // Variables can be escaped or skipped.
    expand_test!(shell, "foo\\$bar", ExpandFlags::SKIP_VARIABLES, "foo$bar");
    expand_test!(shell, "$x", ExpandFlags::SKIP_VARIABLES, "$x");
    expand_test!(shell, "\"$x\"", ExpandFlags::SKIP_VARIABLES, "$x");
}

#[test]
fn test_expand_variables_pathvar() {
    let mut shell = TestShell::new();
    shell.env.set_pathvar("paths", &["/bin", "/usr/bin"]);
    expand_test!(shell, "$paths", NOFLAGS, ("/bin", "/usr/bin"));
    expand_test!(
        shell,
        "\"$paths\"",
        NOFLAGS,
        "/bin:/usr/bin",
        "Quoted path variables do not join with colons"
    );
}

#[test]
fn test_expand_variable_errors() {
    let shell = TestShell::new();

    let (_, errors) = expand_fail(&shell, L!("$"), NOFLAGS);
    assert_eq!(errors[0].code, ParseErrorCode::syntax);
    assert_eq!(errors[0].text, "Expected a variable name after this $.");
    assert_eq!(errors[0].source_start, 0);

    let (_, errors) = expand_fail(&shell, L!("\"$\""), NOFLAGS);
    assert_eq!(errors[0].text, "Expected a variable name after this $.");

    let (_, errors) = expand_fail(&shell, L!("$$"), NOFLAGS);
    assert_eq!(errors[0].text, "$$ is not the pid. Please use %self instead.");

    let (_, errors) = expand_fail(&shell, L!("$?"), NOFLAGS);
    assert_eq!(
        errors[0].text,
        "$? is not the exit status. Please use $status instead."
    );

    let (_, errors) = expand_fail(&shell, L!("${foo}"), NOFLAGS);
    assert_eq!(
        errors[0].text,
        "Variables cannot be bracketed. Please use {$foo} instead."
    );

    let (_, errors) = expand_fail(&shell, L!("$-"), NOFLAGS);
    assert_eq!(errors[0].text, "$- is not a valid variable name.");
}

#[test]
fn test_expand_slices() {
    let mut shell = TestShell::new();
    shell.env.set("x", &["a", "b", "c", "d", "e"]);

    expand_test!(shell, "$x[1]", NOFLAGS, "a");
    expand_test!(shell, "$x[-1]", NOFLAGS, "e");
    expand_test!(shell, "$x[2..-1]", NOFLAGS, ("b", "c", "d", "e"));
    expand_test!(shell, "$x[-1..2]", NOFLAGS, ("e", "d", "c", "b"));
    // [1..-1] is the identity on a non-empty list, [-1..1] its reverse.
    expand_test!(shell, "$x[1..-1]", NOFLAGS, ("a", "b", "c", "d", "e"));
    expand_test!(shell, "$x[-1..1]", NOFLAGS, ("e", "d", "c", "b", "a"));
    // Open-ended ranges.
    expand_test!(shell, "$x[..2]", NOFLAGS, ("a", "b"));
    expand_test!(shell, "$x[3..]", NOFLAGS, ("c", "d", "e"));
    // Repeats and multiple indices are allowed.
    expand_test!(shell, "$x[1 1 2]", NOFLAGS, ("a", "a", "b"));
    // The maximum valid index selects the last element; one past is silently dropped.
    expand_test!(shell, "$x[5]", NOFLAGS, "e");
    expand_test!(shell, "$x[6]", NOFLAGS, ());
    // An entirely out-of-bounds range is dropped.
    expand_test!(shell, "$x[17..18]", NOFLAGS, ());
    // A slice of a missing variable is valid syntax which expands to nothing.
    expand_test!(shell, "$unset[1]", NOFLAGS, ());

    // Quoted, the selected items join with the delimiter.
    expand_test!(shell, "\"$x[2..3]\"", NOFLAGS, "b c");
}

#[test]
fn test_expand_slice_errors() {
    let mut shell = TestShell::new();
    shell.env.set("x", &["a", "b", "c"]);

    // A literal zero index errors at the zero's offset, regardless of the variable.
    let (_, errors) = expand_fail(&shell, L!("$x[0]"), NOFLAGS);
    assert_eq!(errors[0].code, ParseErrorCode::syntax);
    assert_eq!(errors[0].text, "array indices start at 1, not 0.");
    assert_eq!(errors[0].source_start, 3);

    let (_, errors) = expand_fail(&shell, L!("$unset[0]"), NOFLAGS);
    assert_eq!(errors[0].text, "array indices start at 1, not 0.");
    assert_eq!(errors[0].source_start, 7);

    let (_, errors) = expand_fail(&shell, L!("$x[bogus]"), NOFLAGS);
    assert_eq!(errors[0].text, "Invalid index value");
    assert_eq!(errors[0].source_start, 3);
}

#[test]
fn test_expand_history() {
    let mut shell = TestShell::new();
    shell.history = Some(TestHistory::with_items(&["echo recent", "ls", "make"]));

    expand_test!(shell, "$history[1]", NOFLAGS, "echo recent");
    expand_test!(shell, "$history[2..3]", NOFLAGS, ("ls", "make"));
    expand_test!(shell, "\"$history\"", NOFLAGS, "echo recent ls make");

    // Without a history collaborator, $history behaves like an unset variable.
    let plain = TestShell::new();
    expand_test!(plain, "$history", NOFLAGS, ());
    expand_test!(plain, "\"$history\"", NOFLAGS, "");
}

#[test]
fn test_expand_cmdsubst() {
    let mut shell = TestShell::new();
    shell.subshell.on("echo a b", &["a b"]);
    shell.subshell.on("echo lines", &["a", "b"]);
    shell.subshell.on("one", &["1"]);
    shell.subshell.on("two", &["2", "3"]);

    expand_test!(shell, "(one)", NOFLAGS, "1");
    expand_test!(
        shell,
        "pre-(echo a b)-suf",
        NOFLAGS,
        "pre-a b-suf",
        "Command substitution output must be escaped into the surrounding argument"
    );
    expand_test!(
        shell,
        "pre-(echo lines)-suf",
        NOFLAGS,
        ("pre-a-suf", "pre-b-suf"),
        "Multi-line command substitution must produce a cartesian product"
    );
    expand_test!(
        shell,
        "(one)x(two)",
        NOFLAGS,
        ("1x2", "1x3"),
        "Tail command substitutions must expand recursively, line-major"
    );
    // Quoted or escaped parens are not command substitutions.
    expand_test!(shell, "\"(one)\"", NOFLAGS, "(one)");
}

#[test]
fn test_expand_cmdsubst_slices() {
    let mut shell = TestShell::new();
    shell.subshell.on("seq", &["1", "2", "3", "4", "5"]);

    expand_test!(shell, "(seq)[2..4]", NOFLAGS, ("2", "3", "4"));
    expand_test!(shell, "(seq)[-1]", NOFLAGS, "5");
    expand_test!(shell, "(seq)[7]", NOFLAGS, ());

    let (_, errors) = expand_fail(&shell, L!("(seq)[0]"), NOFLAGS);
    assert_eq!(errors[0].code, ParseErrorCode::syntax);
    assert_eq!(errors[0].text, "array indices start at 1, not 0.");
    assert_eq!(errors[0].source_start, 6);
}

#[test]
fn test_expand_cmdsubst_in_braces() {
    let mut shell = TestShell::new();
    shell.subshell.on("csv", &["x,y"]);
    // A comma in command substitution output must not split the surrounding brace group.
    expand_test!(shell, "{(csv),z}", NOFLAGS, ("x,y", "z"));
}

#[test]
fn test_expand_cmdsubst_errors() {
    let mut shell = TestShell::new();
    shell.subshell.on("ok", &["fine"]);
    shell.subshell.fail("big", STATUS_READ_TOO_MUCH);

    let (_, errors) = expand_fail(&shell, L!("(big)"), NOFLAGS);
    assert_eq!(errors[0].code, ParseErrorCode::cmdsubst);
    assert_eq!(
        errors[0].text,
        "Too much data emitted by command substitution so it was discarded"
    );
    assert_eq!(errors[0].source_start, 0);

    let (_, errors) = expand_fail(&shell, L!("(unmapped)"), NOFLAGS);
    assert_eq!(errors[0].code, ParseErrorCode::cmdsubst);
    assert_eq!(
        errors[0].text,
        "Unknown error while evaluating command substitution"
    );

    // Unclosed and unbalanced parens always error.
    let (_, errors) = expand_fail(&shell, L!("(ok"), NOFLAGS);
    assert_eq!(errors[0].code, ParseErrorCode::syntax);
    assert_eq!(errors[0].text, "Mismatched parenthesis");
    let (_, _errors) = expand_fail(&shell, L!("(ok)("), NOFLAGS);

    // With SKIP_CMDSUBST, any substitution is an error.
    let (_, errors) = expand_fail(&shell, L!("(ok)"), ExpandFlags::SKIP_CMDSUBST);
    assert_eq!(errors[0].code, ParseErrorCode::cmdsubst);
    assert_eq!(errors[0].text, "Command substitutions not allowed");
    // Without one, plain strings still pass.
    expand_test!(shell, "plain\\ text", ExpandFlags::SKIP_CMDSUBST, "plain text");
}

#[test]
fn test_expand_tilde() {
    let mut shell = TestShell::new();
    shell.env.set("HOME", &["/u/me"]);
    shell.users.add("alice", "/home/alice");

    expand_test!(shell, "~", NOFLAGS, "/u/me");
    expand_test!(shell, "~/x", NOFLAGS, "/u/me/x");
    expand_test!(shell, "~alice/x", NOFLAGS, "/home/alice/x");
    // An unknown user restores the literal tilde.
    expand_test!(shell, "~foo/x", NOFLAGS, "~foo/x");
    // A tilde is only special in first position.
    expand_test!(shell, "x~y", NOFLAGS, "x~y");
    expand_test!(shell, "\\~", NOFLAGS, "~");
    expand_test!(shell, "~/x", ExpandFlags::SKIP_HOME_DIRECTORIES, "~/x");

    // The home path is normalized.
    shell.env.set("HOME", &["/u//me/./dir/.."]);
    expand_test!(shell, "~/x", NOFLAGS, "/u/me/x");

    // A missing HOME makes the whole completion empty.
    let mut homeless = TestShell::new();
    homeless.env.set("HOME", &[""]);
    expand_test!(homeless, "~/x", NOFLAGS, "");
}

#[test]
fn test_expand_percent_self() {
    let shell = TestShell::new();
    let pid = getpid().to_wstring();
    expand_test_impl(&shell, L!("%self"), NOFLAGS, vec![pid.clone()], None);
    // %self is only special when it is the whole token.
    expand_test!(shell, "%self/foo", NOFLAGS, "%self/foo");
    expand_test!(shell, "x%self", NOFLAGS, "x%self");
}

#[test]
fn test_expand_wildcards() {
    let mut shell = TestShell::new();
    shell.matcher = TestMatcher::with_files(&["file10", "file1", "file2", "other"]);

    // Matches come back in natural order: digit runs compare numerically.
    expand_test!(
        shell,
        "file*",
        NOFLAGS,
        ("file1", "file2", "file10"),
        "Wildcard matches are not naturally sorted"
    );
    expand_test!(shell, "file?", NOFLAGS, ("file1", "file2"));
    expand_test!(shell, "oth*", NOFLAGS, "other");

    // Skipping wildcards downgrades the markers to literal characters.
    expand_test!(shell, "a*", ExpandFlags::SKIP_WILDCARDS, "a*");
    expand_test!(shell, "a?b**", ExpandFlags::SKIP_WILDCARDS, "a?b**");

    // Quoted and escaped wildcard characters are literal and do not glob.
    expand_test!(shell, "'file*'", NOFLAGS, "file*");
    expand_test!(shell, "file\\*", NOFLAGS, "file*");

    // A wildcard in an executables-only expansion matches nothing.
    expand_test!(shell, "file*", ExpandFlags::EXECUTABLES_ONLY, ());
}

#[test]
fn test_expand_wildcard_no_match() {
    let mut shell = TestShell::new();
    shell.matcher = TestMatcher::with_files(&["file1"]);

    let mut output = CompletionList::new();
    let ctx = shell.ctx();
    let res = expand_string(L!("nope*").to_owned(), &mut output, NOFLAGS, &ctx, None);
    assert_eq!(res, ExpandResult::wildcard_no_match);
    assert!(output.is_empty());

    let mut output = CompletionList::new();
    let res = expand_string(L!("file*").to_owned(), &mut output, NOFLAGS, &ctx, None);
    assert_eq!(res, ExpandResult::wildcard_match);
    assert_eq!(output.len(), 1);
}

#[test]
fn test_expand_wildcard_match_not_masked() {
    // If one completion of a stage matches and another does not, the overall result is still a
    // match.
    let mut shell = TestShell::new();
    shell.env.set("dirs", &["yes", "no"]);
    shell.matcher = TestMatcher::with_files(&["yes1"]);

    let mut output = CompletionList::new();
    let ctx = shell.ctx();
    let res = expand_string(L!("$dirs*").to_owned(), &mut output, NOFLAGS, &ctx, None);
    assert_eq!(res, ExpandResult::wildcard_match);
    assert_eq!(output.len(), 1);
    assert_eq!(output[0].completion, "yes1");
}

#[test]
fn test_expand_cd_paths() {
    let mut shell = TestShell::new();
    shell.env.set_pathvar("CDPATH", &["/cd1", "/cd2"]);
    shell.matcher.add_dir("/cd1", &["subA"]);
    shell.matcher.add_dir("/cd2", &["subB1", "subB2"]);

    expand_test!(
        shell,
        "sub*",
        ExpandFlags::SPECIAL_FOR_CD,
        ("subA", "subB1", "subB2"),
        "cd expansion does not search CDPATH"
    );

    // Anchored paths ignore CDPATH and resolve against the working directory.
    let mut anchored = TestShell::new();
    anchored.env.set_pathvar("CDPATH", &["/cd1"]);
    anchored.matcher.add_dir("/cwd/", &["./sub1"]);
    expand_test!(anchored, "./sub*", ExpandFlags::SPECIAL_FOR_CD, "./sub1");
}

#[test]
fn test_expand_command_paths() {
    let mut shell = TestShell::new();
    shell.env.set_pathvar("PATH", &["/bin", "/usr/bin"]);
    shell.matcher.add_dir("/bin", &["prog1"]);
    shell.matcher.add_dir("/usr/bin", &["prog2"]);

    expand_test!(
        shell,
        "prog*",
        ExpandFlags::SPECIAL_FOR_COMMAND,
        ("prog1", "prog2"),
        "command expansion does not search PATH"
    );

    // A slash anywhere pins command expansion to the working directory.
    let mut slashed = TestShell::new();
    slashed.env.set_pathvar("PATH", &["/bin"]);
    slashed.matcher.add_dir("/cwd/", &["bin/prog1"]);
    expand_test!(
        slashed,
        "bin/prog*",
        ExpandFlags::SPECIAL_FOR_COMMAND,
        "bin/prog1"
    );
}

#[test]
fn test_expand_completions_unexpand_tildes() {
    let mut shell = TestShell::new();
    shell.env.set("HOME", &["/home/me"]);
    shell.matcher = TestMatcher::with_files(&["/home/me/foo", "/home/me/fox"]);

    let mut output = CompletionList::new();
    let ctx = shell.ctx();
    let res = expand_string(
        L!("~/fo").to_owned(),
        &mut output,
        ExpandFlags::FOR_COMPLETIONS,
        &ctx,
        None,
    );
    assert_eq!(res, ExpandResult::wildcard_match);
    let strings: Vec<WString> = output.iter().map(|c| c.completion.clone()).collect();
    assert_eq!(strings, vec![WString::from_str("~/foo"), WString::from_str("~/fox")]);
    // The restored tildes are marked literal so they are not escaped on display, and the
    // restoration does not double-apply.
    for comp in &output {
        assert!(comp
            .flags
            .contains(crate::complete::CompleteFlags::DONT_ESCAPE_TILDES));
        assert!(!comp.completion.starts_with("~~"));
    }
}

#[test]
fn test_expand_one() {
    let mut shell = TestShell::new();
    shell.env.set("single", &["one"]);
    shell.env.set("multi", &["a", "b"]);
    let ctx = shell.ctx();

    let mut s = L!("clean").to_owned();
    assert!(expand_one(&mut s, NOFLAGS, &ctx, None));
    assert_eq!(s, "clean");

    let mut s = L!("$single").to_owned();
    assert!(expand_one(&mut s, NOFLAGS, &ctx, None));
    assert_eq!(s, "one");

    let mut s = L!("$multi").to_owned();
    assert!(!expand_one(&mut s, NOFLAGS, &ctx, None));
}

#[test]
fn test_expand_to_command_and_args() {
    let mut shell = TestShell::new();
    shell.env.set("cmd", &["mycmd", "arg1", "arg2"]);
    let ctx = shell.ctx();

    let mut cmd = WString::new();
    let mut args = vec![];
    let res = expand_to_command_and_args(L!("$cmd"), &ctx, &mut cmd, Some(&mut args), None, false);
    assert_eq!(res, ExpandResult::ok);
    assert_eq!(cmd, "mycmd");
    assert_eq!(args, vec![WString::from_str("arg1"), WString::from_str("arg2")]);

    // Command substitutions are not allowed in command position.
    let mut cmd = WString::new();
    let res = expand_to_command_and_args(L!("(one)"), &ctx, &mut cmd, None, None, false);
    assert_eq!(res, ExpandResult::error);
}

#[test]
fn test_expand_overflow() {
    let mut shell = TestShell::new();
    shell.env.set("x", &["1", "2", "3", "4", "5"]);
    let mut ctx = shell.ctx();
    ctx.expansion_limit = 2;

    let mut output = CompletionList::new();
    let mut errors = ParseErrorList::new();
    let res = expand_string(
        L!("$x").to_owned(),
        &mut output,
        NOFLAGS,
        &ctx,
        Some(&mut errors),
    );
    assert_eq!(res, ExpandResult::error);
    assert_eq!(errors[0].code, ParseErrorCode::generic);
    assert_eq!(errors[0].text, "Expansion produced too many results");
}

#[test]
fn test_expand_cancellation() {
    let shell = TestShell::new();
    let mut ctx = shell.ctx();
    ctx.cancel_checker = Box::new(|| true);

    let mut output = CompletionList::new();
    let mut errors = ParseErrorList::new();
    let res = expand_string(
        L!("a{b,c}").to_owned(),
        &mut output,
        NOFLAGS,
        &ctx,
        Some(&mut errors),
    );
    assert_eq!(res, ExpandResult::error);
    assert!(output.is_empty());
    // Cancellation records no error.
    assert!(errors.is_empty());
}

#[test]
fn test_expand_wildcard_cancellation() {
    let env = TestEnv::new();
    let subshell = TestSubshell::default();
    let cancel = CancelMatcher;
    let ctx = OperationContext::foreground(
        &env,
        &subshell,
        Box::new(no_cancel),
        EXPANSION_LIMIT_DEFAULT,
    )
    .with_wildcards(&cancel);

    let mut output = CompletionList::new();
    let res = expand_string(L!("file*").to_owned(), &mut output, NOFLAGS, &ctx, None);
    assert_eq!(res, ExpandResult::error);
    assert!(output.is_empty());
}

#[test]
fn test_no_marker_leaks() {
    // No reserved code point may ever appear in expansion output, whatever mixture of syntax and
    // skip flags produced it.
    let mut shell = TestShell::new();
    shell.env.set("x", &["a", "b"]);
    shell.env.set("HOME", &["/u/me"]);
    shell.subshell.on("one", &["1"]);
    shell.matcher = TestMatcher::with_files(&["file1"]);

    let inputs: &[&str] = &[
        "foo",
        "'quoted'",
        "\"$x\"",
        "$x-$x",
        "a{b,c}d",
        "{lit}",
        "~/path",
        "%self",
        "(one)-tail",
        "file*",
        "a\\*b",
        "\\~home",
    ];
    let flag_sets = [
        ExpandFlags::empty(),
        ExpandFlags::SKIP_VARIABLES,
        ExpandFlags::SKIP_WILDCARDS,
        ExpandFlags::SKIP_HOME_DIRECTORIES,
    ];
    for input in inputs {
        for flags in flag_sets {
            let mut output = CompletionList::new();
            let ctx = shell.ctx();
            let _ = expand_string(WString::from_str(input), &mut output, flags, &ctx, None);
            for comp in &output {
                assert!(
                    !comp.completion.chars().any(reserved_codepoint),
                    "marker leaked from input {input:?}: {:?}",
                    comp.completion
                );
            }
        }
    }
}
