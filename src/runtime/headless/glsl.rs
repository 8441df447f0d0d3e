//! A structural model of GLSL ES source code, detailed enough to simulate what a driver reports
//! when compiling and linking: syntax errors in the top-level structure, misplaced storage
//! qualifiers, mismatched varyings and uniforms, and which attributes end up active.
//!
//! Expressions inside function bodies are not type checked; identifiers in them only count as
//! "static use" of the variables they name.

use fnv::FnvHashSet;
use web_sys::WebGlRenderingContext as Gl;

use crate::pipeline::ShaderStage;

const MAX_VERTEX_ATTRIBS: u32 = 16;

#[derive(Clone, PartialEq, Debug)]
enum TokenKind {
    Ident(String),
    Number(String),
    Punct(char),
}

#[derive(Clone, PartialEq, Debug)]
struct Token {
    kind: TokenKind,
    line: usize,
}

impl Token {
    fn ident(&self) -> Option<&str> {
        match &self.kind {
            TokenKind::Ident(ident) => Some(ident),
            _ => None,
        }
    }

    fn is_punct(&self, c: char) -> bool {
        self.kind == TokenKind::Punct(c)
    }

    fn text(&self) -> String {
        match &self.kind {
            TokenKind::Ident(text) | TokenKind::Number(text) => text.clone(),
            TokenKind::Punct(c) => c.to_string(),
        }
    }
}

#[derive(Clone, PartialEq, Debug)]
pub(crate) struct Variable {
    pub(crate) name: String,
    pub(crate) type_name: String,
    pub(crate) location: Option<u32>,
}

/// The interface of a successfully compiled shader stage.
#[derive(Clone, PartialEq, Debug, Default)]
pub(crate) struct ShaderInterface {
    /// Vertex attributes for a vertex stage, varyings for a fragment stage.
    pub(crate) inputs: Vec<Variable>,
    /// Varyings for a vertex stage, color outputs for a fragment stage.
    pub(crate) outputs: Vec<Variable>,
    pub(crate) uniforms: Vec<Variable>,
    pub(crate) has_main: bool,
    /// Every identifier referenced inside a function body.
    pub(crate) used: FnvHashSet<String>,
}

#[derive(Clone, PartialEq, Debug)]
pub(crate) struct LinkedAttribute {
    pub(crate) name: String,
    pub(crate) type_name: String,
    pub(crate) location: u32,
}

fn syntax_error(token: &Token) -> String {
    format!("ERROR: 0:{}: '{}' : syntax error\n", token.line, token.text())
}

fn end_of_file_error(line: usize) -> String {
    format!("ERROR: 0:{}: '' : syntax error: unexpected end of file\n", line)
}

fn tokenize(source: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut chars = source.chars().peekable();
    let mut line = 1;
    let mut at_line_start = true;

    while let Some(c) = chars.next() {
        if c == '\n' {
            line += 1;
            at_line_start = true;

            continue;
        }

        if c.is_whitespace() {
            continue;
        }

        if c == '#' && at_line_start {
            while let Some(&next) = chars.peek() {
                if next == '\n' {
                    break;
                }

                chars.next();
            }

            continue;
        }

        at_line_start = false;

        if c == '/' && chars.peek() == Some(&'/') {
            while let Some(&next) = chars.peek() {
                if next == '\n' {
                    break;
                }

                chars.next();
            }
        } else if c == '/' && chars.peek() == Some(&'*') {
            chars.next();

            let mut previous = ' ';
            let mut closed = false;

            for next in &mut chars {
                if next == '\n' {
                    line += 1;
                }

                if previous == '*' && next == '/' {
                    closed = true;

                    break;
                }

                previous = next;
            }

            if !closed {
                return Err(end_of_file_error(line));
            }
        } else if c.is_ascii_alphabetic() || c == '_' {
            let mut ident = c.to_string();

            while let Some(&next) = chars.peek() {
                if next.is_ascii_alphanumeric() || next == '_' {
                    ident.push(next);
                    chars.next();
                } else {
                    break;
                }
            }

            tokens.push(Token {
                kind: TokenKind::Ident(ident),
                line,
            });
        } else if c.is_ascii_digit()
            || (c == '.' && chars.peek().map_or(false, char::is_ascii_digit))
        {
            let mut number = c.to_string();

            while let Some(&next) = chars.peek() {
                let exponent_sign = (next == '+' || next == '-')
                    && (number.ends_with('e') || number.ends_with('E'));

                if next.is_ascii_alphanumeric() || next == '.' || exponent_sign {
                    number.push(next);
                    chars.next();
                } else {
                    break;
                }
            }

            tokens.push(Token {
                kind: TokenKind::Number(number),
                line,
            });
        } else if "{}()[];,.=+-*/%<>!&|^?:~".contains(c) {
            tokens.push(Token {
                kind: TokenKind::Punct(c),
                line,
            });
        } else {
            return Err(format!(
                "ERROR: 0:{}: '{}' : invalid character\n",
                line, c
            ));
        }
    }

    Ok(tokens)
}

fn is_precision_qualifier(ident: &str) -> bool {
    ident == "lowp" || ident == "mediump" || ident == "highp"
}

/// Returns the number of attribute slots a vertex input of the given type occupies, or `None` if
/// the type cannot be used for vertex inputs.
fn attribute_slots(type_name: &str) -> Option<u32> {
    match type_name {
        "float" | "vec2" | "vec3" | "vec4" | "int" | "ivec2" | "ivec3" | "ivec4" | "uint"
        | "uvec2" | "uvec3" | "uvec4" => Some(1),
        "mat2" => Some(2),
        "mat3" => Some(3),
        "mat4" => Some(4),
        _ => None,
    }
}

/// Maps a GLSL type name onto the type identifier the driver reports for it.
pub(crate) fn type_id(type_name: &str) -> u32 {
    match type_name {
        "float" => Gl::FLOAT,
        "vec2" => Gl::FLOAT_VEC2,
        "vec3" => Gl::FLOAT_VEC3,
        "vec4" => Gl::FLOAT_VEC4,
        "mat2" => Gl::FLOAT_MAT2,
        "mat3" => Gl::FLOAT_MAT3,
        "mat4" => Gl::FLOAT_MAT4,
        "int" => Gl::INT,
        "ivec2" => Gl::INT_VEC2,
        "ivec3" => Gl::INT_VEC3,
        "ivec4" => Gl::INT_VEC4,
        "uint" => Gl::UNSIGNED_INT,
        "bool" => Gl::BOOL,
        "bvec2" => Gl::BOOL_VEC2,
        "bvec3" => Gl::BOOL_VEC3,
        "bvec4" => Gl::BOOL_VEC4,
        "sampler2D" => Gl::SAMPLER_2D,
        "samplerCube" => Gl::SAMPLER_CUBE,
        _ => 0,
    }
}

#[derive(Clone, Copy, PartialEq, Debug)]
enum Storage {
    Attribute,
    Varying,
    Uniform,
    In,
    Out,
}

impl Storage {
    fn from_ident(ident: &str) -> Option<Self> {
        match ident {
            "attribute" => Some(Storage::Attribute),
            "varying" => Some(Storage::Varying),
            "uniform" => Some(Storage::Uniform),
            "in" => Some(Storage::In),
            "out" => Some(Storage::Out),
            _ => None,
        }
    }
}

/// Simulates compiling the `source` of a shader `stage`. On failure, returns the info log.
pub(crate) fn compile(stage: ShaderStage, source: &str) -> Result<ShaderInterface, String> {
    let tokens = tokenize(source)?;
    let last_line = tokens.last().map(|token| token.line).unwrap_or(1);
    let mut interface = ShaderInterface::default();
    let mut index = 0;

    while index < tokens.len() {
        let start = index;
        let mut delimiters = Vec::new();

        // Scan a top-level statement, which ends in either a `;` (a declaration) or a `{` (the
        // start of a function body).
        let terminator = loop {
            let token = tokens.get(index).ok_or_else(|| end_of_file_error(last_line))?;

            match token.kind {
                TokenKind::Punct('(') => delimiters.push(')'),
                TokenKind::Punct('[') => delimiters.push(']'),
                TokenKind::Punct(c @ ')') | TokenKind::Punct(c @ ']') => {
                    if delimiters.pop() != Some(c) {
                        return Err(syntax_error(token));
                    }
                }
                TokenKind::Punct('{') | TokenKind::Punct(';') if delimiters.is_empty() => {
                    break token;
                }
                TokenKind::Punct('{') | TokenKind::Punct('}') | TokenKind::Punct(';') => {
                    return Err(syntax_error(token));
                }
                _ => (),
            }

            index += 1;
        };

        let statement = &tokens[start..index];

        index += 1;

        if terminator.is_punct(';') {
            if !statement.is_empty() {
                parse_declaration(stage, statement, terminator, &mut interface)?;
            }

            continue;
        }

        if statement.first().and_then(Token::ident) == Some("struct") {
            index = scan_block(&tokens, index, last_line, &mut interface.used)?;

            // Declarators after the closing brace, up to the terminating `;`.
            loop {
                let token = tokens.get(index).ok_or_else(|| end_of_file_error(last_line))?;

                index += 1;

                if token.is_punct(';') {
                    break;
                }

                if token.ident().is_none() && !token.is_punct(',') {
                    return Err(syntax_error(token));
                }
            }

            continue;
        }

        let function_name = parse_function_header(statement, terminator)?;

        index = scan_block(&tokens, index, last_line, &mut interface.used)?;

        if function_name == "main" {
            interface.has_main = true;
        }
    }

    Ok(interface)
}

/// Scans a `{ ... }` block whose opening brace precedes `index`, checking that delimiters balance
/// and recording every identifier in `used`. Returns the index after the closing brace.
fn scan_block(
    tokens: &[Token],
    mut index: usize,
    last_line: usize,
    used: &mut FnvHashSet<String>,
) -> Result<usize, String> {
    // `;` is only valid directly inside a block, or inside the header of a `for` loop.
    const FOR_HEADER: char = 'f';

    let mut delimiters = vec!['}'];

    while !delimiters.is_empty() {
        let token = tokens.get(index).ok_or_else(|| end_of_file_error(last_line))?;
        let after_for = index > 0 && tokens[index - 1].ident() == Some("for");

        match &token.kind {
            TokenKind::Punct('(') if after_for => delimiters.push(FOR_HEADER),
            TokenKind::Punct('(') => delimiters.push(')'),
            TokenKind::Punct('[') => delimiters.push(']'),
            TokenKind::Punct('{') => delimiters.push('}'),
            TokenKind::Punct(')') => match delimiters.pop() {
                Some(')') | Some(FOR_HEADER) => (),
                _ => return Err(syntax_error(token)),
            },
            TokenKind::Punct(c) if *c == ']' || *c == '}' => {
                if delimiters.pop() != Some(*c) {
                    return Err(syntax_error(token));
                }
            }
            TokenKind::Punct(';') => match delimiters.last() {
                Some(&'}') | Some(&FOR_HEADER) => (),
                _ => return Err(syntax_error(token)),
            },
            TokenKind::Ident(ident) => {
                used.insert(ident.clone());
            }
            _ => (),
        }

        index += 1;
    }

    Ok(index)
}

/// Validates `type name ( parameters )` and returns the function name.
fn parse_function_header(header: &[Token], terminator: &Token) -> Result<String, String> {
    let return_type = header.get(0).ok_or_else(|| syntax_error(terminator))?;
    let name = header.get(1).ok_or_else(|| syntax_error(terminator))?;
    let open = header.get(2).ok_or_else(|| syntax_error(terminator))?;

    if return_type.ident().is_none() {
        return Err(syntax_error(return_type));
    }

    let name = name.ident().ok_or_else(|| syntax_error(name))?;

    if !open.is_punct('(') {
        return Err(syntax_error(open));
    }

    match header.last() {
        Some(close) if close.is_punct(')') => (),
        _ => return Err(syntax_error(terminator)),
    }

    if name == "main" {
        let parameters = &header[3..header.len() - 1];
        let no_parameters = parameters.is_empty()
            || (parameters.len() == 1 && parameters[0].ident() == Some("void"));

        if return_type.ident() != Some("void") || !no_parameters {
            return Err(format!(
                "ERROR: 0:{}: 'main' : function must have the signature void main()\n",
                return_type.line
            ));
        }
    }

    Ok(name.to_string())
}

fn parse_declaration(
    stage: ShaderStage,
    statement: &[Token],
    terminator: &Token,
    interface: &mut ShaderInterface,
) -> Result<(), String> {
    let mut rest = statement;
    let mut location = None;

    if rest[0].ident() == Some("precision") {
        let well_formed = rest.len() == 3
            && rest[1].ident().map_or(false, is_precision_qualifier)
            && rest[2].ident().is_some();

        return if well_formed {
            Ok(())
        } else {
            Err(syntax_error(rest.get(1).unwrap_or(terminator)))
        };
    }

    if rest[0].ident() == Some("layout") {
        let (parsed, remainder) = parse_layout(rest, terminator)?;

        location = parsed;
        rest = remainder;
    }

    if rest.first().and_then(Token::ident) == Some("invariant") {
        rest = &rest[1..];
    }

    let storage = match rest.first().and_then(Token::ident).and_then(Storage::from_ident) {
        Some(storage) => storage,
        // Globals, constants, structs and function prototypes do not contribute to the
        // interface.
        None => return Ok(()),
    };
    let qualifier = &rest[0];

    rest = &rest[1..];

    if rest.first().and_then(Token::ident).map_or(false, is_precision_qualifier) {
        rest = &rest[1..];
    }

    let type_token = rest.get(0).ok_or_else(|| syntax_error(terminator))?;
    let type_name = type_token.ident().ok_or_else(|| syntax_error(type_token))?;
    let name_token = rest.get(1).ok_or_else(|| syntax_error(terminator))?;
    let name = name_token.ident().ok_or_else(|| syntax_error(name_token))?;

    match &rest[2..] {
        [] => (),
        [open, size, close] if open.is_punct('[') && close.is_punct(']') => {
            if !matches!(size.kind, TokenKind::Number(_)) {
                return Err(syntax_error(size));
            }
        }
        [unexpected, ..] => return Err(syntax_error(unexpected)),
    }

    let variable = Variable {
        name: name.to_string(),
        type_name: type_name.to_string(),
        location,
    };

    let list = match (stage, storage) {
        (ShaderStage::Vertex, Storage::Attribute) | (ShaderStage::Vertex, Storage::In) => {
            if attribute_slots(type_name).is_none() {
                return Err(format!(
                    "ERROR: 0:{}: '{}' : cannot be used as the type of a vertex input\n",
                    type_token.line, type_name
                ));
            }

            &mut interface.inputs
        }
        (ShaderStage::Fragment, Storage::Attribute) => {
            return Err(format!(
                "ERROR: 0:{}: 'attribute' : supported in vertex shaders only\n",
                qualifier.line
            ));
        }
        (ShaderStage::Fragment, Storage::Varying) | (ShaderStage::Fragment, Storage::In) => {
            &mut interface.inputs
        }
        (_, Storage::Varying) | (_, Storage::Out) => &mut interface.outputs,
        (_, Storage::Uniform) => &mut interface.uniforms,
    };

    if list.iter().any(|existing| existing.name == variable.name) {
        return Err(format!(
            "ERROR: 0:{}: '{}' : redefinition\n",
            name_token.line, name
        ));
    }

    list.push(variable);

    Ok(())
}

/// Parses a `layout ( qualifier [= value], ... )` prefix, returning the `location` it specifies
/// (if any) and the remaining tokens.
fn parse_layout<'a>(
    statement: &'a [Token],
    terminator: &Token,
) -> Result<(Option<u32>, &'a [Token]), String> {
    let open = statement.get(1).ok_or_else(|| syntax_error(terminator))?;

    if !open.is_punct('(') {
        return Err(syntax_error(open));
    }

    let close = statement
        .iter()
        .position(|token| token.is_punct(')'))
        .ok_or_else(|| syntax_error(terminator))?;
    let mut location = None;

    for qualifier in statement[2..close].split(|token| token.is_punct(',')) {
        match qualifier {
            [key, equals, value] if key.ident() == Some("location") && equals.is_punct('=') => {
                let parsed = match &value.kind {
                    TokenKind::Number(number) => number.parse::<u32>().ok(),
                    _ => None,
                };

                location = Some(parsed.ok_or_else(|| syntax_error(value))?);
            }
            [key] | [key, _, _] if key.ident().is_some() => (),
            [] => return Err(syntax_error(&statement[close])),
            [unexpected, ..] => return Err(syntax_error(unexpected)),
        }
    }

    Ok((location, &statement[close + 1..]))
}

/// Simulates linking a vertex and a fragment stage. Returns the active attributes with their
/// assigned locations, or the info log on failure.
pub(crate) fn link(
    vertex: &ShaderInterface,
    fragment: &ShaderInterface,
) -> Result<Vec<LinkedAttribute>, String> {
    if !vertex.has_main {
        return Err("ERROR: Missing main() in vertex shader\n".to_string());
    }

    if !fragment.has_main {
        return Err("ERROR: Missing main() in fragment shader\n".to_string());
    }

    for input in fragment
        .inputs
        .iter()
        .filter(|input| fragment.used.contains(&input.name))
    {
        match vertex.outputs.iter().find(|output| output.name == input.name) {
            None => {
                return Err(format!(
                    "ERROR: Varying '{}' has static use in the fragment shader, but is \
                     undeclared in the vertex shader\n",
                    input.name
                ))
            }
            Some(output) if output.type_name != input.type_name => {
                return Err(format!(
                    "ERROR: Types of varying '{}' differ between vertex and fragment shaders\n",
                    input.name
                ))
            }
            _ => (),
        }
    }

    for uniform in &fragment.uniforms {
        let mismatch = vertex.uniforms.iter().any(|other| {
            other.name == uniform.name && other.type_name != uniform.type_name
        });

        if mismatch {
            return Err(format!(
                "ERROR: Types of uniform '{}' differ between vertex and fragment shaders\n",
                uniform.name
            ));
        }
    }

    assign_attribute_locations(vertex)
}

fn assign_attribute_locations(vertex: &ShaderInterface) -> Result<Vec<LinkedAttribute>, String> {
    let active: Vec<&Variable> = vertex
        .inputs
        .iter()
        .filter(|input| vertex.used.contains(&input.name))
        .collect();
    let mut occupied = [false; MAX_VERTEX_ATTRIBS as usize];
    let mut locations = vec![None; active.len()];

    for (index, input) in active.iter().enumerate() {
        if let Some(location) = input.location {
            let slots = attribute_slots(&input.type_name).unwrap_or(1);

            if !occupy(location, slots, &mut occupied) {
                return Err(format!(
                    "ERROR: Location {} assigned to attribute '{}' is unavailable\n",
                    location, input.name
                ));
            }

            locations[index] = Some(location);
        }
    }

    for (index, input) in active.iter().enumerate() {
        if locations[index].is_none() {
            let slots = attribute_slots(&input.type_name).unwrap_or(1);
            let location = (0..MAX_VERTEX_ATTRIBS)
                .find(|start| occupy(*start, slots, &mut occupied))
                .ok_or_else(|| "ERROR: Too many active vertex attributes\n".to_string())?;

            locations[index] = Some(location);
        }
    }

    Ok(active
        .into_iter()
        .zip(locations)
        .map(|(input, location)| LinkedAttribute {
            name: input.name.clone(),
            type_name: input.type_name.clone(),
            location: location.unwrap_or(0),
        })
        .collect())
}

/// Marks `slots` consecutive attribute slots from `start` as occupied, if all are free.
fn occupy(start: u32, slots: u32, occupied: &mut [bool]) -> bool {
    let end = match start.checked_add(slots) {
        Some(end) if end <= MAX_VERTEX_ATTRIBS => end,
        _ => return false,
    };

    if occupied[start as usize..end as usize].iter().any(|o| *o) {
        return false;
    }

    for slot in &mut occupied[start as usize..end as usize] {
        *slot = true;
    }

    true
}
