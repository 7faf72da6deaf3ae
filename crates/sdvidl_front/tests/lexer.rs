//! Lexer integration tests: round-trip fidelity, position tracking and
//! token persistence across macro-expansion boundaries.

use std::rc::Rc;

use sdvidl_base::Result;
use sdvidl_front::{
    CodeCursor, DirectiveFlow, Environment, Lexer, LexingMode, Pipeline, Source, Token,
    TokenKind, TokenSink,
};

/// Sink that records every out-of-band piece verbatim.
#[derive(Default)]
struct CollectSink {
    pieces: Vec<String>,
}

impl TokenSink for CollectSink {
    fn whitespace(&mut self, token: &Token) {
        self.pieces.push(token.text().to_owned());
    }

    fn comment(&mut self, token: &Token) {
        self.pieces.push(token.text().to_owned());
    }

    fn directive(&mut self, _cursor: &mut CodeCursor) -> Result<DirectiveFlow> {
        unreachable!("no directives in these sources");
    }
}

/// Tokens plus whitespace plus comments reassemble the source exactly.
#[test]
fn lexing_round_trips_the_source() {
    let code = "module vehicle {\n\
                \t// door control\n\
                \tinterface Door {\n\
                \t\tvoid open(in short speed); /* degrees per second */\n\
                \t\tattribute boolean locked;\n\
                \t};\n\
                };\n";
    let source = Rc::new(Source::from_literal(code));
    let mut cursor = CodeCursor::new(&source);
    let mut lexer = Lexer::new(true, LexingMode::Idl);
    let mut sink = CollectSink::default();

    let mut reassembled = String::new();
    loop {
        let start = sink.pieces.len();
        let token = lexer.next(&mut cursor, Some(&source), &mut sink).unwrap();
        for piece in &sink.pieces[start..] {
            reassembled.push_str(piece);
        }
        if !token.is_valid() {
            break;
        }
        reassembled.push_str(token.text());
    }
    assert_eq!(reassembled, code);
}

#[test]
fn token_positions_follow_lines_and_tab_stops() {
    let code = "module m;\n\tconst long value = 1;\n";
    let source = Rc::new(Source::from_literal(code));
    let mut cursor = CodeCursor::new(&source);
    let mut lexer = Lexer::new(true, LexingMode::Idl);
    let mut sink = CollectSink::default();

    let mut positions = Vec::new();
    loop {
        let token = lexer.next(&mut cursor, Some(&source), &mut sink).unwrap();
        if !token.is_valid() {
            break;
        }
        positions.push((token.text().to_owned(), token.line(), token.col()));
    }

    assert_eq!(positions[0], ("module".to_owned(), 1, 1));
    assert_eq!(positions[1], ("m".to_owned(), 1, 8));
    assert_eq!(positions[2], (";".to_owned(), 1, 9));
    // The tab advances the column to the next multiple of four plus one.
    assert_eq!(positions[3], ("const".to_owned(), 2, 5));
}

#[test]
fn tokens_spanning_an_expansion_survive_cursor_reuse() {
    let mut env = Environment::new();
    env.define_from_cli("TEST").unwrap();
    env.define_from_cli("ABBA=2").unwrap();
    env.define_from_cli("AB(c)=AB##c").unwrap();

    // Expanding AB(B) prepends "ABB"; together with the following source
    // character it forms the identifier "ABBA".
    let mut cursor = CodeCursor::from_text("(B)A");
    assert!(env.test_and_expand_current("AB", &mut cursor, false).unwrap());
    let mut token = cursor.location(TokenKind::Identifier);
    cursor.advance_by(3); // prepended "ABB"
    cursor.advance(); // "A" from the source
    cursor.update_location(&mut token);
    assert_eq!(token.text(), "ABBA");

    // Further prepends must not invalidate the promoted token.
    cursor.prepend("other");
    assert_eq!(token.text(), "ABBA");
}

#[test]
fn expanded_tokens_keep_the_invocation_position() {
    let mut pipeline = Pipeline::from_source_text(
        "#define VALUE 10\nconst long x = VALUE;\n",
        Environment::new(),
    )
    .unwrap();
    loop {
        let token = pipeline.next_token().unwrap();
        if !token.is_valid() {
            break;
        }
        if token.text() == "10" {
            // The expansion is synthetic text attributed to line 2.
            assert_eq!(token.line(), 2);
            return;
        }
    }
    panic!("expansion result not seen");
}

#[test]
fn strict_environment_drops_extension_keywords() {
    let mut env = Environment::new();
    env.set_strict();
    // Under strict rules 'pointer' is a plain identifier, and identifiers
    // that collide with keywords by case only are rejected.
    let mut pipeline =
        Pipeline::from_source_text("pointer", env.clone()).unwrap();
    let token = pipeline.next_token().unwrap();
    assert_eq!(token.kind(), TokenKind::Identifier);

    let mut pipeline = Pipeline::from_source_text("Interface", env).unwrap();
    assert!(pipeline.next_token().is_err());
}

#[test]
fn default_environment_reserves_extension_keywords() {
    let mut pipeline = Pipeline::from_source_text("pointer u8string", Environment::new()).unwrap();
    assert_eq!(pipeline.next_token().unwrap().kind(), TokenKind::Keyword);
    assert_eq!(pipeline.next_token().unwrap().kind(), TokenKind::Keyword);
}
