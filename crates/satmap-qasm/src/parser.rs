//! Parser for `OpenQASM` 2, lowering directly into a [`Circuit`].

use rustc_hash::FxHashMap;
use satmap_ir::{Circuit, ClbitId, Instruction, QubitId};

use crate::error::{ParseError, ParseResult};
use crate::lexer::{SpannedToken, Token, line_of, tokenize};

/// Parse a QASM2 source string into a Circuit.
pub fn parse(source: &str) -> ParseResult<Circuit> {
    let mut parser = Parser::new(source)?;
    parser.parse_program()?;
    Ok(parser.circuit)
}

/// A register operand: one bit, or the whole register.
#[derive(Debug, Clone)]
enum Operand {
    Bit(u32),
    Whole { start: u32, size: u32 },
}

impl Operand {
    fn broadcast_len(&self) -> Option<u32> {
        match self {
            Operand::Bit(_) => None,
            Operand::Whole { size, .. } => Some(*size),
        }
    }

    fn at(&self, i: u32) -> u32 {
        match self {
            Operand::Bit(id) => *id,
            Operand::Whole { start, .. } => start + i,
        }
    }
}

struct Parser<'a> {
    source: &'a str,
    tokens: Vec<SpannedToken>,
    pos: usize,
    circuit: Circuit,
    qregs: FxHashMap<String, (u32, u32)>,
    cregs: FxHashMap<String, (u32, u32)>,
}

impl<'a> Parser<'a> {
    fn new(source: &'a str) -> ParseResult<Self> {
        let mut tokens = Vec::new();
        for result in tokenize(source) {
            match result {
                Ok(t) => tokens.push(t),
                Err((span, message)) => {
                    return Err(ParseError::LexerError {
                        line: line_of(source, span.start),
                        message,
                    });
                }
            }
        }
        Ok(Self {
            source,
            tokens,
            pos: 0,
            circuit: Circuit::new("main"),
            qregs: FxHashMap::default(),
            cregs: FxHashMap::default(),
        })
    }

    fn is_eof(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|t| &t.token)
    }

    fn line(&self) -> usize {
        let offset = self
            .tokens
            .get(self.pos.min(self.tokens.len().saturating_sub(1)))
            .map_or(0, |t| t.span.start);
        line_of(self.source, offset)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos)?.token.clone();
        self.pos += 1;
        Some(token)
    }

    fn unexpected(&self, expected: &str, found: &Token) -> ParseError {
        ParseError::UnexpectedToken {
            line: self.line(),
            expected: expected.into(),
            found: found.to_string(),
        }
    }

    fn expect(&mut self, expected: &Token) -> ParseResult<()> {
        let found = self
            .advance()
            .ok_or_else(|| ParseError::UnexpectedEof(format!("expected {expected}")))?;
        if std::mem::discriminant(&found) != std::mem::discriminant(expected) {
            self.pos -= 1;
            return Err(self.unexpected(&expected.to_string(), &found));
        }
        Ok(())
    }

    fn consume(&mut self, token: &Token) -> bool {
        let matches = self
            .peek()
            .is_some_and(|t| std::mem::discriminant(t) == std::mem::discriminant(token));
        if matches {
            self.pos += 1;
        }
        matches
    }

    fn ident(&mut self, what: &str) -> ParseResult<String> {
        match self.advance() {
            Some(Token::Ident(name)) => Ok(name),
            Some(other) => {
                self.pos -= 1;
                Err(self.unexpected(what, &other))
            }
            None => Err(ParseError::UnexpectedEof(what.into())),
        }
    }

    fn int(&mut self) -> ParseResult<u64> {
        match self.advance() {
            Some(Token::Int(v)) => Ok(v),
            Some(other) => {
                self.pos -= 1;
                Err(self.unexpected("integer", &other))
            }
            None => Err(ParseError::UnexpectedEof("integer".into())),
        }
    }

    fn parse_program(&mut self) -> ParseResult<()> {
        self.expect(&Token::OpenQasm)?;
        match self.advance() {
            Some(Token::Real(v)) if (2.0..3.0).contains(&v) => {}
            Some(Token::Int(2)) => {}
            Some(other) => return Err(ParseError::InvalidVersion(other.to_string())),
            None => return Err(ParseError::UnexpectedEof("version number".into())),
        }
        self.expect(&Token::Semicolon)?;

        while !self.is_eof() {
            self.parse_statement()?;
        }
        Ok(())
    }

    fn parse_statement(&mut self) -> ParseResult<()> {
        let token = self
            .peek()
            .cloned()
            .ok_or_else(|| ParseError::UnexpectedEof("statement".into()))?;

        match token {
            Token::Include => {
                self.advance();
                match self.advance() {
                    Some(Token::Str(_)) => {}
                    Some(other) => {
                        self.pos -= 1;
                        return Err(self.unexpected("include path", &other));
                    }
                    None => return Err(ParseError::UnexpectedEof("include path".into())),
                }
                self.expect(&Token::Semicolon)
            }
            Token::Qreg | Token::Creg => self.parse_register(matches!(token, Token::Qreg)),
            Token::Gate => self.skip_gate_definition(),
            Token::Opaque => self.skip_past_semicolon(),
            Token::Measure => self.parse_measure(),
            Token::Reset => {
                self.advance();
                let operand = self.qubit_operand()?;
                self.expect(&Token::Semicolon)?;
                for q in expand("reset", &[operand], self.line())? {
                    self.circuit.apply(Instruction::reset(QubitId(q[0])))?;
                }
                Ok(())
            }
            Token::Barrier => {
                self.advance();
                let operands = self.qubit_operands()?;
                self.expect(&Token::Semicolon)?;
                let mut qubits = Vec::new();
                for op in &operands {
                    match op {
                        Operand::Bit(id) => qubits.push(QubitId(*id)),
                        Operand::Whole { start, size } => {
                            qubits.extend((*start..start + size).map(QubitId));
                        }
                    }
                }
                self.circuit.apply(Instruction::barrier(qubits))?;
                Ok(())
            }
            Token::If => Err(ParseError::Unsupported {
                line: self.line(),
                construct: "classically controlled operation".into(),
            }),
            Token::Ident(_) => self.parse_gate_call(),
            other => Err(self.unexpected("statement", &other)),
        }
    }

    fn parse_register(&mut self, quantum: bool) -> ParseResult<()> {
        self.advance();
        let name = self.ident("register name")?;
        self.expect(&Token::LBracket)?;
        let size = u32::try_from(self.int()?).map_err(|_| ParseError::Unsupported {
            line: self.line(),
            construct: "register size".into(),
        })?;
        self.expect(&Token::RBracket)?;
        self.expect(&Token::Semicolon)?;

        if quantum {
            let ids = self.circuit.add_qreg(name.clone(), size)?;
            let start = ids.first().map_or(self.circuit.num_qubits() as u32, |q| q.0);
            self.qregs.insert(name, (start, size));
        } else {
            let ids = self.circuit.add_creg(name.clone(), size)?;
            let start = ids.first().map_or(self.circuit.num_clbits() as u32, |c| c.0);
            self.cregs.insert(name, (start, size));
        }
        Ok(())
    }

    /// `gate name(params) args { ... }` declares a gate; its body is not
    /// needed since calls are kept opaque.
    fn skip_gate_definition(&mut self) -> ParseResult<()> {
        while let Some(token) = self.advance() {
            if token == Token::LBrace {
                let mut depth = 1;
                while depth > 0 {
                    match self.advance() {
                        Some(Token::LBrace) => depth += 1,
                        Some(Token::RBrace) => depth -= 1,
                        Some(_) => {}
                        None => return Err(ParseError::UnexpectedEof("gate body".into())),
                    }
                }
                return Ok(());
            }
        }
        Err(ParseError::UnexpectedEof("gate body".into()))
    }

    fn skip_past_semicolon(&mut self) -> ParseResult<()> {
        while let Some(token) = self.advance() {
            if token == Token::Semicolon {
                return Ok(());
            }
        }
        Err(ParseError::UnexpectedEof("';'".into()))
    }

    fn parse_measure(&mut self) -> ParseResult<()> {
        self.advance();
        let qubits = self.qubit_operand()?;
        self.expect(&Token::Arrow)?;
        let clbits = self.operand(false)?;
        self.expect(&Token::Semicolon)?;

        for pair in expand("measure", &[qubits, clbits], self.line())? {
            self.circuit
                .apply(Instruction::measure(QubitId(pair[0]), ClbitId(pair[1])))?;
        }
        Ok(())
    }

    fn parse_gate_call(&mut self) -> ParseResult<()> {
        let name = self.ident("gate name")?;
        let params = if self.consume(&Token::LParen) {
            self.parameter_texts()?
        } else {
            vec![]
        };
        let operands = self.qubit_operands()?;
        self.expect(&Token::Semicolon)?;

        for qubits in expand(&name, &operands, self.line())? {
            self.circuit.apply(Instruction::gate(
                name.clone(),
                params.clone(),
                qubits.into_iter().map(QubitId),
            ))?;
        }
        Ok(())
    }

    /// Parameter expressions as source text, split on top-level commas.
    /// The opening parenthesis has already been consumed.
    fn parameter_texts(&mut self) -> ParseResult<Vec<String>> {
        let mut params = Vec::new();
        let mut depth = 0usize;
        let mut start: Option<usize> = None;
        let mut end = 0;

        loop {
            let Some(spanned) = self.tokens.get(self.pos).cloned() else {
                return Err(ParseError::UnexpectedEof("')'".into()));
            };
            self.pos += 1;
            match spanned.token {
                Token::RParen if depth == 0 => {
                    if let Some(s) = start {
                        params.push(self.source[s..end].trim().to_string());
                    }
                    return Ok(params);
                }
                Token::Comma if depth == 0 => {
                    let Some(s) = start.take() else {
                        return Err(self.unexpected("parameter", &Token::Comma));
                    };
                    params.push(self.source[s..end].trim().to_string());
                }
                token => {
                    match token {
                        Token::LParen => depth += 1,
                        Token::RParen => depth -= 1,
                        _ => {}
                    }
                    start.get_or_insert(spanned.span.start);
                    end = spanned.span.end;
                }
            }
        }
    }

    fn qubit_operands(&mut self) -> ParseResult<Vec<Operand>> {
        let mut operands = vec![self.qubit_operand()?];
        while self.consume(&Token::Comma) {
            operands.push(self.qubit_operand()?);
        }
        Ok(operands)
    }

    fn qubit_operand(&mut self) -> ParseResult<Operand> {
        self.operand(true)
    }

    fn operand(&mut self, quantum: bool) -> ParseResult<Operand> {
        let name = self.ident("register")?;
        let registers = if quantum { &self.qregs } else { &self.cregs };
        let &(start, size) = registers
            .get(&name)
            .ok_or_else(|| ParseError::UndefinedRegister(name.clone()))?;

        if self.consume(&Token::LBracket) {
            let index = self.int()?;
            self.expect(&Token::RBracket)?;
            if index >= u64::from(size) {
                return Err(ParseError::IndexOutOfBounds {
                    register: name,
                    index: index as usize,
                    size: size as usize,
                });
            }
            Ok(Operand::Bit(start + index as u32))
        } else {
            Ok(Operand::Whole { start, size })
        }
    }
}

/// Expand whole-register arguments into one operand list per repetition.
fn expand(operation: &str, operands: &[Operand], line: usize) -> ParseResult<Vec<Vec<u32>>> {
    let mut repeat: Option<u32> = None;
    for len in operands.iter().filter_map(Operand::broadcast_len) {
        match repeat {
            Some(r) if r != len => {
                return Err(ParseError::BroadcastMismatch {
                    operation: operation.to_string(),
                    line,
                });
            }
            _ => repeat = Some(len),
        }
    }
    let repeat = repeat.unwrap_or(1);
    Ok((0..repeat)
        .map(|i| operands.iter().map(|op| op.at(i)).collect())
        .collect())
}
