//! A reader for the generic textual form of the IR.
//!
//! This accepts exactly the form [`Context::print_ir`] produces (plus
//! insignificant whitespace): operations as
//! `%r1, %r2 = dialect.op %a, %b {attr = value} : type1, type2 { ...region... }`,
//! regions in braces with an optional `^(%arg: type):` block header.
//! Operation names are resolved through the dialect registry, so an
//! unregistered mnemonic fails with `UnknownOp`.

use veriop_ir::{
    builtin,
    diagnostics::Unsupported,
    Attribute, AttributeMap, BitVectorAttr, CmpPredicate, Context, FxHashMap, IntAttr, Operation,
    Report, SmallStr, Type, Value,
};

pub fn parse_module(ctx: &mut Context, input: &str) -> Result<Operation, Report> {
    let tokens = lex(input)?;
    let mut parser = Parser {
        ctx,
        tokens,
        pos: 0,
        values: FxHashMap::default(),
    };
    parser.parse_module()
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    /// Bare identifier, possibly dotted (`smt.bv.add`, `i8`).
    Ident(String),
    /// `%name`
    ValueName(String),
    /// `@name`
    Symbol(String),
    /// `"..."`
    Str(String),
    /// Decimal integer, possibly negative.
    Number(i128),
    Bang,
    Caret,
    LBrace,
    RBrace,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Less,
    Greater,
    Colon,
    Comma,
    Equal,
    Arrow,
    Hash,
}

fn lex(input: &str) -> Result<Vec<Token>, Report> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();
    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '/' => {
                // Line comment.
                chars.next();
                if chars.peek() == Some(&'/') {
                    for c in chars.by_ref() {
                        if c == '\n' {
                            break;
                        }
                    }
                } else {
                    return Err(Unsupported::new("unexpected '/' in input"));
                }
            }
            '%' | '@' => {
                chars.next();
                let mut name = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_alphanumeric() || c == '_' || c == '$' || c == '.' {
                        name.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(if c == '%' {
                    Token::ValueName(name)
                } else {
                    Token::Symbol(name)
                });
            }
            '"' => {
                chars.next();
                let mut text = String::new();
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some('\\') => match chars.next() {
                            Some('n') => text.push('\n'),
                            Some('t') => text.push('\t'),
                            Some(c) => text.push(c),
                            None => return Err(Unsupported::new("unterminated string literal")),
                        },
                        Some(c) => text.push(c),
                        None => return Err(Unsupported::new("unterminated string literal")),
                    }
                }
                tokens.push(Token::Str(text));
            }
            '-' => {
                chars.next();
                if chars.peek() == Some(&'>') {
                    chars.next();
                    tokens.push(Token::Arrow);
                } else {
                    let mut digits = String::from("-");
                    while let Some(&c) = chars.peek() {
                        if c.is_ascii_digit() {
                            digits.push(c);
                            chars.next();
                        } else {
                            break;
                        }
                    }
                    let value: i128 = digits
                        .parse()
                        .map_err(|_| Unsupported::new(format!("bad integer '{digits}'")))?;
                    tokens.push(Token::Number(value));
                }
            }
            c if c.is_ascii_digit() => {
                let mut digits = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_ascii_digit() {
                        digits.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let value: i128 = digits
                    .parse()
                    .map_err(|_| Unsupported::new(format!("bad integer '{digits}'")))?;
                tokens.push(Token::Number(value));
            }
            c if c.is_alphabetic() || c == '_' => {
                let mut name = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_alphanumeric() || c == '_' || c == '.' {
                        name.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Ident(name));
            }
            _ => {
                chars.next();
                tokens.push(match c {
                    '!' => Token::Bang,
                    '^' => Token::Caret,
                    '{' => Token::LBrace,
                    '}' => Token::RBrace,
                    '(' => Token::LParen,
                    ')' => Token::RParen,
                    '[' => Token::LBracket,
                    ']' => Token::RBracket,
                    '<' => Token::Less,
                    '>' => Token::Greater,
                    ':' => Token::Colon,
                    ',' => Token::Comma,
                    '=' => Token::Equal,
                    '#' => Token::Hash,
                    other => {
                        return Err(Unsupported::new(format!(
                            "unexpected character '{other}' in input"
                        )));
                    }
                });
            }
        }
    }
    Ok(tokens)
}

struct Parser<'a> {
    ctx: &'a mut Context,
    tokens: Vec<Token>,
    pos: usize,
    values: FxHashMap<String, Value>,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek2(&self) -> Option<&Token> {
        self.tokens.get(self.pos + 1)
    }

    fn next(&mut self) -> Result<Token, Report> {
        let token = self
            .tokens
            .get(self.pos)
            .cloned()
            .ok_or_else(|| Unsupported::new("unexpected end of input"))?;
        self.pos += 1;
        Ok(token)
    }

    fn expect(&mut self, token: Token) -> Result<(), Report> {
        let found = self.next()?;
        if found != token {
            return Err(Unsupported::new(format!(
                "expected {token:?}, found {found:?}"
            )));
        }
        Ok(())
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek() == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// Parse the whole input: either an explicit `builtin.module { ... }` or
    /// a bare list of ops that gets wrapped in a fresh module.
    fn parse_module(&mut self) -> Result<Operation, Report> {
        if self.peek() == Some(&Token::Ident("builtin.module".to_string())) {
            self.pos += 1;
            let module = builtin::create_module(self.ctx);
            let body = builtin::module_body(self.ctx, module);
            self.expect(Token::LBrace)?;
            while !self.eat(&Token::RBrace) {
                let op = self.parse_op()?;
                self.ctx.append_op(body, op);
            }
            if self.peek().is_some() {
                return Err(Unsupported::new("trailing input after module"));
            }
            Ok(module)
        } else {
            let module = builtin::create_module(self.ctx);
            let body = builtin::module_body(self.ctx, module);
            while self.peek().is_some() {
                let op = self.parse_op()?;
                self.ctx.append_op(body, op);
            }
            Ok(module)
        }
    }

    fn parse_op(&mut self) -> Result<Operation, Report> {
        // Optional result list.
        let mut result_names = Vec::new();
        if matches!(self.peek(), Some(Token::ValueName(_))) {
            loop {
                match self.next()? {
                    Token::ValueName(name) => result_names.push(name),
                    other => {
                        return Err(Unsupported::new(format!(
                            "expected a result name, found {other:?}"
                        )));
                    }
                }
                if !self.eat(&Token::Comma) {
                    break;
                }
            }
            self.expect(Token::Equal)?;
        }

        let Token::Ident(op_name) = self.next()? else {
            return Err(Unsupported::new("expected an operation name"));
        };
        let definition = self.ctx.registry().expect(&op_name)?;

        // Operand list.
        let mut operands = Vec::new();
        while matches!(self.peek(), Some(Token::ValueName(_))) {
            let Token::ValueName(name) = self.next()? else {
                unreachable!()
            };
            let value = *self.values.get(&name).ok_or_else(|| {
                Unsupported::new(format!("use of undefined value '%{name}'"))
            })?;
            operands.push(value);
            if !self.eat(&Token::Comma) {
                break;
            }
        }

        // Attribute dictionary. A '{' here is ambiguous with a region (a
        // region body can also open with a bare op name); an attribute
        // dict always starts with `ident =`.
        let mut attrs = AttributeMap::new();
        if self.peek() == Some(&Token::LBrace)
            && matches!(self.peek2(), Some(Token::Ident(_)))
            && self.tokens.get(self.pos + 2) == Some(&Token::Equal)
        {
            self.pos += 1;
            loop {
                let Token::Ident(name) = self.next()? else {
                    return Err(Unsupported::new("expected an attribute name"));
                };
                self.expect(Token::Equal)?;
                let value = self.parse_attr()?;
                attrs.set(name.as_str(), value);
                if self.eat(&Token::RBrace) {
                    break;
                }
                self.expect(Token::Comma)?;
            }
        }

        // Result types.
        let mut result_types = Vec::new();
        if !result_names.is_empty() {
            self.expect(Token::Colon)?;
            loop {
                result_types.push(self.parse_type()?);
                if !self.eat(&Token::Comma) {
                    break;
                }
            }
        }
        if result_types.len() != result_names.len() {
            return Err(Unsupported::new(format!(
                "op '{op_name}' declares {} results but {} result types",
                result_names.len(),
                result_types.len()
            )));
        }

        let op = self.ctx.create_op(definition, &operands, result_types, attrs);
        for (index, name) in result_names.into_iter().enumerate() {
            let result = self.ctx.op_result(op, index);
            if !name.chars().all(|c| c.is_ascii_digit()) {
                self.ctx.set_name_hint(result, SmallStr::from(name.as_str()));
            }
            self.values.insert(name, result);
        }

        // Region.
        if self.eat(&Token::LBrace) {
            let region = self.ctx.add_region(op);

            // Optional block header with arguments.
            let mut arg_bindings: Vec<(String, Type)> = Vec::new();
            if self.eat(&Token::Caret) {
                if let Some(Token::Ident(_)) = self.peek() {
                    self.pos += 1;
                }
                self.expect(Token::LParen)?;
                if !self.eat(&Token::RParen) {
                    loop {
                        let Token::ValueName(name) = self.next()? else {
                            return Err(Unsupported::new("expected a block argument name"));
                        };
                        self.expect(Token::Colon)?;
                        let ty = self.parse_type()?;
                        arg_bindings.push((name, ty));
                        if self.eat(&Token::RParen) {
                            break;
                        }
                        self.expect(Token::Comma)?;
                    }
                }
                self.expect(Token::Colon)?;
            }

            let arg_types: Vec<Type> = arg_bindings.iter().map(|(_, ty)| ty.clone()).collect();
            let block = self.ctx.create_block(region, &arg_types);
            for (index, (name, _)) in arg_bindings.into_iter().enumerate() {
                let arg = self.ctx.block_args(block)[index];
                if !name.chars().all(|c| c.is_ascii_digit()) {
                    self.ctx.set_name_hint(arg, SmallStr::from(name.as_str()));
                }
                self.values.insert(name, arg);
            }

            while !self.eat(&Token::RBrace) {
                let nested = self.parse_op()?;
                self.ctx.append_op(block, nested);
            }
        }

        Ok(op)
    }

    fn parse_attr(&mut self) -> Result<Attribute, Report> {
        match self.next()? {
            Token::Number(value) => {
                // `N : iW` is an integer attribute; a bare number defaults
                // to width 64.
                let width = if self.eat(&Token::Colon) {
                    match self.parse_type()? {
                        Type::Int(w) => w,
                        other => {
                            return Err(Unsupported::new(format!(
                                "integer attribute typed as non-integer {other}"
                            )));
                        }
                    }
                } else {
                    64
                };
                Ok(Attribute::Int(IntAttr::new(to_unsigned(value, width), width)))
            }
            Token::Str(text) => Ok(Attribute::string(text.as_str())),
            Token::Symbol(name) => Ok(Attribute::symbol(name.as_str())),
            Token::LBracket => {
                let mut items = Vec::new();
                if !self.eat(&Token::RBracket) {
                    loop {
                        items.push(self.parse_attr()?);
                        if self.eat(&Token::RBracket) {
                            break;
                        }
                        self.expect(Token::Comma)?;
                    }
                }
                Ok(Attribute::Array(items))
            }
            Token::Hash => {
                // `#smt.bv<value : width>`
                let Token::Ident(name) = self.next()? else {
                    return Err(Unsupported::new("expected an attribute mnemonic after '#'"));
                };
                if name != "smt.bv" {
                    return Err(Unsupported::new(format!("unknown attribute '#{name}'")));
                }
                self.expect(Token::Less)?;
                let Token::Number(value) = self.next()? else {
                    return Err(Unsupported::new("expected a bit-vector value"));
                };
                self.expect(Token::Colon)?;
                let Token::Number(width) = self.next()? else {
                    return Err(Unsupported::new("expected a bit-vector width"));
                };
                self.expect(Token::Greater)?;
                let width = width as u32;
                let attr = BitVectorAttr::new(to_unsigned(value, width), width)?;
                Ok(Attribute::BitVector(attr))
            }
            Token::Ident(word) => match word.as_str() {
                "true" => Ok(Attribute::Bool(true)),
                "false" => Ok(Attribute::Bool(false)),
                _ => {
                    if let Some(predicate) = CmpPredicate::from_str(&word) {
                        return Ok(Attribute::Predicate(predicate));
                    }
                    // Fall back to a type attribute (`i8`, ...).
                    self.pos -= 1;
                    Ok(Attribute::Type(self.parse_type()?))
                }
            },
            Token::Bang | Token::LParen => {
                self.pos -= 1;
                Ok(Attribute::Type(self.parse_type()?))
            }
            other => Err(Unsupported::new(format!(
                "cannot parse attribute at {other:?}"
            ))),
        }
    }

    fn parse_type(&mut self) -> Result<Type, Report> {
        match self.next()? {
            Token::Ident(name) => {
                if let Some(width) = name.strip_prefix('i').and_then(|w| w.parse::<u32>().ok()) {
                    return Ok(Type::Int(width));
                }
                Err(Unsupported::new(format!("unknown type '{name}'")))
            }
            Token::LParen => {
                // Function type `(T, ...) -> T`.
                let mut args = Vec::new();
                if !self.eat(&Token::RParen) {
                    loop {
                        args.push(self.parse_type()?);
                        if self.eat(&Token::RParen) {
                            break;
                        }
                        self.expect(Token::Comma)?;
                    }
                }
                self.expect(Token::Arrow)?;
                let ret = self.parse_type()?;
                Ok(Type::Func(args, Box::new(ret)))
            }
            Token::Bang => {
                let Token::Ident(name) = self.next()? else {
                    return Err(Unsupported::new("expected a type mnemonic after '!'"));
                };
                match name.as_str() {
                    "smt.bool" => Ok(Type::Bool),
                    "smt.bv" => {
                        self.expect(Token::Less)?;
                        let Token::Number(width) = self.next()? else {
                            return Err(Unsupported::new("expected a bit-vector width"));
                        };
                        self.expect(Token::Greater)?;
                        Ok(Type::BitVec(width as u32))
                    }
                    "smt.utils.pair" => {
                        self.expect(Token::Less)?;
                        let first = self.parse_type()?;
                        self.expect(Token::Comma)?;
                        let second = self.parse_type()?;
                        self.expect(Token::Greater)?;
                        Ok(Type::pair(first, second))
                    }
                    "smt.array" => {
                        self.expect(Token::Less)?;
                        let key = self.parse_type()?;
                        self.expect(Token::Comma)?;
                        let value = self.parse_type()?;
                        self.expect(Token::Greater)?;
                        Ok(Type::array(key, value))
                    }
                    "smt.sort" => {
                        self.expect(Token::Less)?;
                        let Token::Ident(sort) = self.next()? else {
                            return Err(Unsupported::new("expected a sort name"));
                        };
                        self.expect(Token::Greater)?;
                        Ok(Type::Sort(sort.as_str().into()))
                    }
                    "mem.memory" => Ok(Type::Memory),
                    "mem.block" => Ok(Type::MemBlock),
                    "mem.bid" => Ok(Type::BlockId),
                    "mem_effect.ptr" => Ok(Type::Pointer),
                    "eff.state" => Ok(Type::State),
                    "pdl.operation" => Ok(Type::PdlOperation),
                    "pdl.value" => Ok(Type::PdlValue),
                    "pdl.type" => Ok(Type::PdlType),
                    "pdl.attribute" => Ok(Type::PdlAttribute),
                    other => Err(Unsupported::new(format!("unknown type '!{other}'"))),
                }
            }
            other => Err(Unsupported::new(format!("cannot parse type at {other:?}"))),
        }
    }
}

/// Wrap a possibly negative literal into the unsigned two's complement
/// value of the given width.
fn to_unsigned(value: i128, width: u32) -> u128 {
    if value >= 0 {
        value as u128
    } else if width >= 128 {
        value as u128
    } else {
        (value as u128) & ((1u128 << width) - 1)
    }
}
