//! Formula compiler: tokenises an infix expression and runs a shunting-yard
//! transformation with function-argument counting to produce the BIFF
//! parsed-token (Ptg) byte stream.
//!
//! This does not evaluate formulas — it only compiles the single arithmetic
//! + function-call formula form the worksheet writer supports into the byte
//! codes a BIFF reader expects to find in a FORMULA record.

use crate::cellref::{self, CellRef};
use crate::error::XlsError;

// Ptg opcodes.
const T_INT: u8 = 0x1E;
const T_REF_V: u8 = 0x44;
const T_ADD: u8 = 0x03;
const T_SUB: u8 = 0x04;
const T_MUL: u8 = 0x05;
const T_DIV: u8 = 0x06;
const T_UMINUS: u8 = 0x13;
const T_FUNC_V: u8 = 0x41;
const T_FUNC_VAR_V: u8 = 0x42;

/// One entry in the function table: name, Ptg function code, and arity
/// (`None` means variadic, encoded with `tFuncVarV` + an argument count).
struct FuncDef {
    name: &'static str,
    code: u16,
    fixed_arity: Option<u8>,
}

const FUNCTIONS: &[FuncDef] = &[
    FuncDef { name: "SUM", code: 0x0004, fixed_arity: None },
    FuncDef { name: "ABS", code: 0x0018, fixed_arity: Some(1) },
];

fn lookup_func(name: &str) -> Option<&'static FuncDef> {
    FUNCTIONS.iter().find(|f| f.name == name)
}

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Number(u16),
    CellRef(String),
    Range(String),
    Func(String),
    LParen,
    RParen,
    Comma,
    Op(char),
}

/// Tokeniser state, named to match the single-pass state machine this is
/// grounded on (Default/Word/Number/String).
enum LexState {
    Default,
    Word,
    Number,
    Str,
}

fn tokenize(input: &str) -> Result<Vec<Tok>, XlsError> {
    let mut tokens = Vec::new();
    let mut state = LexState::Default;
    let mut cur = String::new();
    let chars: Vec<char> = input.chars().collect();
    let mut i = 0;

    while i <= chars.len() {
        let ch = chars.get(i).copied();
        match state {
            LexState::Default => match ch {
                None => {}
                Some(' ') | Some('\t') => {}
                Some('(') => tokens.push(Tok::LParen),
                Some(')') => tokens.push(Tok::RParen),
                Some(',') => tokens.push(Tok::Comma),
                Some(c @ ('+' | '-' | '*' | '/' | '<' | '>' | '=')) => tokens.push(Tok::Op(c)),
                Some(c) if c.is_ascii_digit() => {
                    cur.push(c);
                    state = LexState::Number;
                }
                Some(c) if c.is_ascii_alphabetic() || c == '$' => {
                    cur.push(c);
                    state = LexState::Word;
                }
                Some('"') => {
                    state = LexState::Str;
                }
                Some(c) => {
                    log::warn!("formula compiler: skipping unrecognised character {c:?}");
                }
            },
            LexState::Word => match ch {
                Some(c) if c.is_ascii_alphanumeric() || c == '$' || c == ':' => {
                    cur.push(c);
                    i += 1;
                    continue;
                }
                _ => {
                    tokens.push(classify_word(std::mem::take(&mut cur)));
                    state = LexState::Default;
                    continue;
                }
            },
            LexState::Number => match ch {
                Some(c) if c.is_ascii_digit() => {
                    cur.push(c);
                    i += 1;
                    continue;
                }
                _ => {
                    let n: u16 = cur
                        .parse()
                        .map_err(|_| XlsError::FormulaSyntax(format!("number literal out of range: {cur:?}")))?;
                    tokens.push(Tok::Number(n));
                    cur = String::new();
                    state = LexState::Default;
                    continue;
                }
            },
            LexState::Str => match ch {
                Some('"') => {
                    // Non-goal: no Ptg string token is emitted here (the
                    // token set this compiler targets has none); a literal
                    // is accepted lexically but rejected at compile time.
                    return Err(XlsError::FormulaSyntax(format!(
                        "string literal {cur:?} has no Ptg encoding in this formula compiler"
                    )));
                }
                None => return Err(XlsError::FormulaSyntax("unterminated string literal".into())),
                Some(c) => cur.push(c),
            },
        }
        i += 1;
    }

    Ok(tokens)
}

fn classify_word(word: String) -> Tok {
    if word.contains(':') {
        Tok::Range(word)
    } else if lookup_func(&word).is_some() {
        Tok::Func(word)
    } else {
        Tok::CellRef(word)
    }
}

fn precedence(op: char) -> u8 {
    match op {
        '!' => 4,
        '*' | '/' | '%' => 3,
        '+' | '-' => 2,
        '=' => 1,
        _ => 0,
    }
}

fn left_assoc(op: char) -> bool {
    matches!(op, '*' | '/' | '%' | '+' | '-')
}

fn binary_ptg(op: char) -> Result<u8, XlsError> {
    match op {
        '+' => Ok(T_ADD),
        '-' => Ok(T_SUB),
        '*' => Ok(T_MUL),
        '/' => Ok(T_DIV),
        other => Err(XlsError::FormulaSyntax(format!("operator {other:?} has no Ptg encoding in this formula compiler"))),
    }
}

/// Encodes the relativity bits for a `tRefV` row field.
///
/// Grounded on scenario S4 (`=SUM(A1,A2,A3)` compiling to rows with no
/// bits set): an unqualified reference (no `$`) is written with both bits
/// clear, and the bit for an axis is set exactly when that axis carries a
/// `$`. See DESIGN.md for why this is the opposite of the literal `row_rel`
/// naming in the reference prose.
fn row_field(r: &CellRef) -> u16 {
    (r.row as u16 & 0x3FFF) | ((r.col_abs as u16) << 14) | ((r.row_abs as u16) << 15)
}

enum StackItem {
    Op(char),
    LParen,
    Func(String),
}

struct Frame {
    argc: i32,
}

/// Compiles an infix formula (with or without its leading `=`) into the
/// Ptg byte stream that goes into a FORMULA record.
pub fn compile(formula: &str) -> Result<Vec<u8>, XlsError> {
    let body = formula.strip_prefix('=').unwrap_or(formula);
    let tokens = tokenize(body)?;

    let mut out = Vec::new();
    let mut op_stack: Vec<StackItem> = Vec::new();
    let mut frames: Vec<Frame> = vec![Frame { argc: 0 }];
    let mut pending_negate = false;
    let mut prev_was_operand = false;

    for tok in &tokens {
        match tok {
            Tok::Number(n) => {
                emit_number(&mut out, *n, pending_negate);
                pending_negate = false;
                frames.last_mut().unwrap().argc += 1;
                prev_was_operand = true;
            }
            Tok::CellRef(s) => {
                let r = cellref::parse_a1(s)?;
                emit_cellref(&mut out, &r, pending_negate);
                pending_negate = false;
                frames.last_mut().unwrap().argc += 1;
                prev_was_operand = true;
            }
            Tok::Range(s) => {
                return Err(XlsError::FormulaSyntax(format!(
                    "cell range {s:?} has no Ptg encoding in this formula compiler"
                )));
            }
            Tok::Func(name) => {
                let def = lookup_func(name)
                    .ok_or_else(|| XlsError::FormulaSyntax(format!("unknown function {name:?}")))?;
                frames.last_mut().unwrap().argc += 1;
                op_stack.push(StackItem::Func(def.name.to_string()));
                frames.push(Frame { argc: 0 });
                prev_was_operand = false;
            }
            Tok::LParen => {
                op_stack.push(StackItem::LParen);
                prev_was_operand = false;
            }
            Tok::Comma => {
                pop_until_lparen(&mut op_stack, &mut out)?;
                prev_was_operand = false;
            }
            Tok::RParen => {
                pop_until_lparen(&mut op_stack, &mut out)?;
                match op_stack.pop() {
                    Some(StackItem::LParen) => {}
                    _ => return Err(XlsError::FormulaSyntax("mismatched parentheses".into())),
                }
                if let Some(StackItem::Func(_)) = op_stack.last() {
                    let name = match op_stack.pop() {
                        Some(StackItem::Func(n)) => n,
                        _ => unreachable!(),
                    };
                    let def = lookup_func(&name).expect("function name already validated");
                    let frame = frames.pop().expect("function frame pushed on call");
                    match def.fixed_arity {
                        Some(_) => {
                            out.push(T_FUNC_V);
                            out.extend_from_slice(&def.code.to_le_bytes());
                        }
                        None => {
                            out.push(T_FUNC_VAR_V);
                            out.push(frame.argc.max(0) as u8);
                            out.extend_from_slice(&def.code.to_le_bytes());
                        }
                    }
                }
                prev_was_operand = true;
            }
            Tok::Op(c) => {
                if *c == '-' && !prev_was_operand {
                    // Unary negation: fold into the next operand.
                    pending_negate = true;
                    continue;
                }
                let op = *c;
                while let Some(StackItem::Op(top)) = op_stack.last() {
                    let top = *top;
                    let should_pop = if left_assoc(top) {
                        precedence(top) >= precedence(op)
                    } else {
                        precedence(top) > precedence(op)
                    };
                    if !should_pop {
                        break;
                    }
                    out.push(binary_ptg(top)?);
                    op_stack.pop();
                }
                op_stack.push(StackItem::Op(op));
                frames.last_mut().unwrap().argc -= 1;
                prev_was_operand = false;
            }
        }
    }

    while let Some(item) = op_stack.pop() {
        match item {
            StackItem::Op(op) => out.push(binary_ptg(op)?),
            StackItem::LParen | StackItem::Func(_) => {
                return Err(XlsError::FormulaSyntax("mismatched parentheses".into()));
            }
        }
    }

    Ok(out)
}

fn pop_until_lparen(op_stack: &mut Vec<StackItem>, out: &mut Vec<u8>) -> Result<(), XlsError> {
    loop {
        match op_stack.last() {
            Some(StackItem::Op(op)) => {
                let op = *op;
                out.push(binary_ptg(op)?);
                op_stack.pop();
            }
            Some(StackItem::LParen) => break,
            _ => return Err(XlsError::FormulaSyntax("mismatched parentheses".into())),
        }
    }
    Ok(())
}

fn emit_number(out: &mut Vec<u8>, n: u16, negate: bool) {
    out.push(T_INT);
    out.extend_from_slice(&n.to_le_bytes());
    if negate {
        out.push(T_UMINUS);
    }
}

fn emit_cellref(out: &mut Vec<u8>, r: &CellRef, negate: bool) {
    out.push(T_REF_V);
    out.extend_from_slice(&row_field(r).to_le_bytes());
    out.push(r.col as u8);
    if negate {
        out.push(T_UMINUS);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiles_precedence_correctly() {
        // 2+3*4 -> postfix 2 3 4 * + == 14
        let bytes = compile("=2+3*4").unwrap();
        assert_eq!(
            bytes,
            vec![
                T_INT, 2, 0, // 2
                T_INT, 3, 0, // 3
                T_INT, 4, 0, // 4
                T_MUL, T_ADD,
            ]
        );
    }

    #[test]
    fn compiles_parens_correctly() {
        // (2+3)*4 -> postfix 2 3 + 4 * == 20
        let bytes = compile("=(2+3)*4").unwrap();
        assert_eq!(
            bytes,
            vec![T_INT, 2, 0, T_INT, 3, 0, T_ADD, T_INT, 4, 0, T_MUL]
        );
    }

    #[test]
    fn compiles_sum_of_cell_refs() {
        let bytes = compile("=SUM(A1,A2,A3)").unwrap();
        assert_eq!(
            bytes,
            vec![
                0x44, 0x00, 0x00, 0x00, // A1
                0x44, 0x01, 0x00, 0x00, // A2
                0x44, 0x02, 0x00, 0x00, // A3
                0x42, 0x03, 0x04, 0x00, // tFuncVarV argc=3 SUM(0x0004)
            ]
        );
    }

    #[test]
    fn compiles_fixed_arity_function() {
        let bytes = compile("=ABS(A1)").unwrap();
        assert_eq!(
            bytes,
            vec![0x44, 0x00, 0x00, 0x00, T_FUNC_V, 0x18, 0x00]
        );
    }

    #[test]
    fn unary_minus_emits_magnitude_then_uminus() {
        let bytes = compile("=-5+2").unwrap();
        assert_eq!(
            bytes,
            vec![T_INT, 5, 0, T_UMINUS, T_INT, 2, 0, T_ADD]
        );
    }

    #[test]
    fn mismatched_parens_is_formula_syntax_error() {
        assert!(matches!(compile("=(1+2"), Err(XlsError::FormulaSyntax(_))));
        assert!(matches!(compile("=1+2)"), Err(XlsError::FormulaSyntax(_))));
    }

    #[test]
    fn unknown_function_is_formula_syntax_error() {
        assert!(matches!(compile("=NOPE(1)"), Err(XlsError::FormulaSyntax(_))));
    }

    #[test]
    fn cell_range_has_no_encoding() {
        assert!(matches!(compile("=SUM(A1:A3)"), Err(XlsError::FormulaSyntax(_))));
    }
}
