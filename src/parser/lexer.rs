//! Token stream for the minimal GTA3script surface syntax this crate parses
//! end to end. Modeled on the teacher's `Logos`-derived token enum.

use logos::Logos;

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"//[^\n]*")]
#[logos(skip r"[ \t\r]+")]
pub enum Token {
    #[token("\n")]
    Newline,

    #[token("(")]
    LeftParen,
    #[token(")")]
    RightParen,
    #[token("{")]
    LeftCurly,
    #[token("}")]
    RightCurly,
    #[token(",")]
    Comma,
    #[token(":")]
    Colon,
    #[token("=")]
    Assign,

    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("==")]
    EqEq,
    #[token("<>")]
    NotEq,
    #[token("<=")]
    LessEq,
    #[token(">=")]
    GreaterEq,
    #[token("<")]
    Less,
    #[token(">")]
    Greater,
    #[token("&&")]
    AndAnd,
    #[token("||")]
    OrOr,
    #[token("NOT")]
    Not,

    #[token("IF")]
    If,
    #[token("ELSE")]
    Else,
    #[token("ENDIF")]
    EndIf,
    #[token("WHILE")]
    While,
    #[token("ENDWHILE")]
    EndWhile,
    #[token("REPEAT")]
    Repeat,
    #[token("ENDREPEAT")]
    EndRepeat,
    #[token("SWITCH")]
    Switch,
    #[token("CASE")]
    Case,
    #[token("DEFAULT")]
    Default,
    #[token("BREAK")]
    Break,
    #[token("ENDSWITCH")]
    EndSwitch,
    #[token("CONTINUE")]
    Continue,
    #[token("SCRIPT_NAME")]
    ScriptName,

    #[regex(r"-?[0-9]+", |lex| lex.slice().parse::<i64>().ok())]
    IntLiteral(i64),
    #[regex(r"-?[0-9]+\.[0-9]+", |lex| lex.slice().parse::<f32>().ok())]
    FloatLiteral(f32),
    #[regex(r#""[^"]*""#, |lex| { let s = lex.slice(); s[1..s.len()-1].to_string() })]
    StringLiteral(String),
    #[regex(r"[A-Za-z_][A-Za-z0-9_]*", |lex| lex.slice().to_string())]
    Identifier(String),
    #[regex(r"[A-Za-z_][A-Za-z0-9_]*:", |lex| { let s = lex.slice(); s[..s.len()-1].to_string() })]
    LabelDecl(String),
}
