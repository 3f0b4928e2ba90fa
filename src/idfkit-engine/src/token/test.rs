// Copyright 2021 The Simlin Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use super::ErrorCode::*;
use super::Token::*;
use super::{EquationError, ErrorCode, Lexer, Token};

// straight from LALRPOP
fn test(input: &str, expected: Vec<(&str, Token)>) {
    let tokenizer = Lexer::new(input);
    let len = expected.len();
    for (token, (expected_span, expected_tok)) in tokenizer.zip(expected.into_iter()) {
        let expected_start = expected_span.find('~').unwrap();
        let expected_end = expected_span.rfind('~').unwrap() + 1;
        assert_eq!(Ok((expected_start, expected_tok, expected_end)), token);
    }

    let tokenizer = Lexer::new(input);
    assert_eq!(None, tokenizer.skip(len).next());
}

fn test_err(input: &str, expected: (&str, ErrorCode)) {
    let tokenizer = Lexer::new(input);
    let token = tokenizer.into_iter().find(|t| t.is_err()).unwrap();
    let (expected_span, expected_code) = expected;
    let expected_start = expected_span.find('~').unwrap();
    let expected_end = expected_span.rfind('~').unwrap() + 1;
    let expected_err = EquationError {
        start: expected_start,
        end: expected_end,
        code: expected_code,
    };
    assert_eq!(Err(expected_err), token);
}

#[test]
fn constraint() {
    test(
        "G002 + 3 < G003 / 2 + 1.4",
        vec![
            ("~~~~                     ", Ident("G002")),
            ("     ~                   ", Plus),
            ("       ~                 ", Num("3")),
            ("         ~               ", Lt),
            ("           ~~~~          ", Ident("G003")),
            ("                ~        ", Div),
            ("                  ~      ", Num("2")),
            ("                    ~    ", Plus),
            ("                      ~~~", Num("1.4")),
        ],
    );
}

#[test]
fn comparisons() {
    test("<=", vec![("~~", Lte)]);
    test(">=", vec![("~~", Gte)]);
    test("==", vec![("~~", Eq)]);
    test("=", vec![("~", Eq)]);
    test("!=", vec![("~~", Neq)]);
    test("<>", vec![("~~", Neq)]);
    test("< >", vec![("~  ", Lt), ("  ~", Gt)]);
}

#[test]
fn logic() {
    test(
        "not A and B or C",
        vec![
            ("~~~             ", Not),
            ("    ~           ", Ident("A")),
            ("      ~~~       ", And),
            ("          ~     ", Ident("B")),
            ("            ~~  ", Or),
            ("               ~", Ident("C")),
        ],
    );
    test(
        "!A&&B||C",
        vec![
            ("~       ", Not),
            (" ~      ", Ident("A")),
            ("  ~~    ", And),
            ("    ~   ", Ident("B")),
            ("     ~~ ", Or),
            ("       ~", Ident("C")),
        ],
    );
    // keywords are lowercase only
    test("AND", vec![("~~~", Ident("AND"))]);
}

#[test]
fn powers() {
    test(
        "A**2^3*4",
        vec![
            ("~       ", Ident("A")),
            (" ~~     ", Exp),
            ("   ~    ", Num("2")),
            ("    ~   ", Exp),
            ("     ~  ", Num("3")),
            ("      ~ ", Mul),
            ("       ~", Num("4")),
        ],
    );
}

#[test]
fn calls() {
    test(
        "max(A, 2) % 3",
        vec![
            ("~~~          ", Ident("max")),
            ("   ~         ", LParen),
            ("    ~        ", Ident("A")),
            ("     ~       ", Comma),
            ("       ~     ", Num("2")),
            ("        ~    ", RParen),
            ("          ~  ", Mod),
            ("            ~", Num("3")),
        ],
    );
}

#[test]
fn negative_num() {
    test("-3", vec![("~ ", Minus), (" ~", Num("3"))]);
}

#[test]
fn numbers() {
    #[rustfmt::skip]
    test("4.0e5", vec![
        ("~~~~~", Num("4.0e5")),
    ]);
    #[rustfmt::skip]
    test("4.0e-5", vec![
        ("~~~~~~", Num("4.0e-5")),
    ]);
    #[rustfmt::skip]
    test(".5", vec![
        ("~~", Num(".5")),
    ]);
    #[rustfmt::skip]
    test("2.06101e+06", vec![
        ("~~~~~~~~~~~", Num("2.06101e+06")),
    ]);
}

#[test]
fn idents() {
    test(
        "_3 G_3a",
        vec![("~~     ", Ident("_3")), ("   ~~~~", Ident("G_3a"))],
    );
}

#[test]
fn unrecognized_token() {
    test_err("A `", ("  ~", InvalidToken));
    test_err("A & B", ("  ~  ", UnrecognizedToken));
    test_err("A | B", ("  ~  ", UnrecognizedToken));
}
