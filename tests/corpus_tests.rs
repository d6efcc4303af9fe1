//! Runs every case in `tests/cases/*.match` against the built-in symbol table.

mod common;

use common::{cases_dir, init_logging, load_cases, Case, Outcome};
use ovn_match::{parse, validate, Validation};

fn check(case: &Case) -> Result<(), String> {
    let location = format!("{}:{}", case.file.display(), case.line);
    match (&case.outcome, parse(&case.input)) {
        (Outcome::Valid, Ok(_)) => Ok(()),
        (Outcome::Canonical(expected), Ok(expr)) if expr.to_string() == *expected => Ok(()),
        (Outcome::Canonical(expected), Ok(expr)) => Err(format!(
            "{location}: {:?} printed as {:?}, expected {expected:?}",
            case.input,
            expr.to_string()
        )),
        (Outcome::Invalid(expected), Err(err)) if err.to_string() == *expected => Ok(()),
        (Outcome::Invalid(expected), Err(err)) => Err(format!(
            "{location}: {:?} failed with {:?}, expected {expected:?}",
            case.input,
            err.to_string()
        )),
        (Outcome::Invalid(expected), Ok(expr)) => Err(format!(
            "{location}: {:?} parsed as {expr}, expected {expected:?}",
            case.input
        )),
        (_, Err(err)) => Err(format!("{location}: {:?} failed: {err}", case.input)),
    }
}

#[test]
fn corpus_cases() {
    init_logging();
    let cases = load_cases(&cases_dir()).expect("case files load");
    assert!(cases.len() > 50, "only found {} cases", cases.len());

    let failures: Vec<String> = cases.iter().filter_map(|case| check(case).err()).collect();
    assert!(failures.is_empty(), "{} case(s) failed:\n{}", failures.len(), failures.join("\n"));
}

#[test]
fn validate_agrees_with_parse() {
    init_logging();
    for case in load_cases(&cases_dir()).expect("case files load") {
        let expected = match &case.outcome {
            Outcome::Valid | Outcome::Canonical(_) => Validation::Valid,
            Outcome::Invalid(message) => Validation::Invalid(message.clone()),
        };
        assert_eq!(validate(&case.input), expected, "{}:{}", case.file.display(), case.line);
    }
}

#[test]
fn canonical_forms_reparse_to_themselves() {
    init_logging();
    for case in load_cases(&cases_dir()).expect("case files load") {
        let Outcome::Canonical(printed) = &case.outcome else {
            continue;
        };
        let reparsed = parse(printed).unwrap_or_else(|e| panic!("{printed:?} does not reparse: {e}"));
        assert_eq!(reparsed.to_string(), *printed);
    }
}
