//! Typed SPICE models built from `.model` and `.subckt` statements.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

use crate::library::SpiceLibrary;
use crate::model::value::parse_value;
use crate::parser::grammar::inline_comment_start;

/// A model statement could not be turned into a [`SpiceModel`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    #[error("Not a .model or .subckt statement: {0}")]
    NotAModel(String),
    #[error("Model statement without a name")]
    MissingName,
    #[error("Model '{model}' has no device type")]
    MissingType { model: String },
    #[error("Model '{model}' has unknown device type '{type_name}'")]
    UnknownType { model: String, type_name: String },
    #[error("Model '{model}' has unbalanced parentheses")]
    UnbalancedParens { model: String },
    #[error("Model '{model}' has malformed parameter '{token}'")]
    MalformedParam { model: String, token: String },
    #[error("Model '{model}' is a kind of '{base}', which is not defined before it")]
    AkoBaseNotFound { model: String, base: String },
    #[error("Model '{model}' is a kind of '{base}', which is a subcircuit")]
    AkoBaseIsSubcircuit { model: String, base: String },
    #[error("Subcircuit '{model}' is not terminated by .ends")]
    MissingEnds { model: String },
}

/// Device types accepted in `.model` statements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DeviceType {
    Resistor,
    Capacitor,
    Inductor,
    Switch,
    CurrentSwitch,
    Diode,
    Npn,
    Pnp,
    Njf,
    Pjf,
    Nmos,
    Pmos,
    Nmf,
    Pmf,
    Vdmos,
    Tra,
    Ltra,
    Urc,
    Txl,
}

impl DeviceType {
    /// Look up a SPICE type keyword, case-insensitively.
    pub fn from_spice(keyword: &str) -> Option<Self> {
        let ty = match keyword.to_ascii_uppercase().as_str() {
            "R" | "RES" => DeviceType::Resistor,
            "C" | "CAP" => DeviceType::Capacitor,
            "L" | "IND" => DeviceType::Inductor,
            "SW" | "VSWITCH" => DeviceType::Switch,
            "CSW" | "ISWITCH" => DeviceType::CurrentSwitch,
            "D" => DeviceType::Diode,
            "NPN" => DeviceType::Npn,
            "PNP" => DeviceType::Pnp,
            "NJF" | "NJFET" => DeviceType::Njf,
            "PJF" | "PJFET" => DeviceType::Pjf,
            "NMOS" => DeviceType::Nmos,
            "PMOS" => DeviceType::Pmos,
            "NMF" => DeviceType::Nmf,
            "PMF" => DeviceType::Pmf,
            "VDMOS" => DeviceType::Vdmos,
            "TRA" => DeviceType::Tra,
            "LTRA" => DeviceType::Ltra,
            "URC" => DeviceType::Urc,
            "TXL" => DeviceType::Txl,
            _ => return None,
        };
        Some(ty)
    }

    /// Canonical SPICE keyword.
    pub fn as_spice(&self) -> &'static str {
        match self {
            DeviceType::Resistor => "R",
            DeviceType::Capacitor => "C",
            DeviceType::Inductor => "L",
            DeviceType::Switch => "SW",
            DeviceType::CurrentSwitch => "CSW",
            DeviceType::Diode => "D",
            DeviceType::Npn => "NPN",
            DeviceType::Pnp => "PNP",
            DeviceType::Njf => "NJF",
            DeviceType::Pjf => "PJF",
            DeviceType::Nmos => "NMOS",
            DeviceType::Pmos => "PMOS",
            DeviceType::Nmf => "NMF",
            DeviceType::Pmf => "PMF",
            DeviceType::Vdmos => "VDMOS",
            DeviceType::Tra => "TRA",
            DeviceType::Ltra => "LTRA",
            DeviceType::Urc => "URC",
            DeviceType::Txl => "TXL",
        }
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_spice())
    }
}

/// One `name=value` model parameter. Names are lowercased; values are kept
/// as written and evaluated when they are plain numbers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelParam {
    pub name: String,
    pub value: String,
    pub numeric: Option<f64>,
}

impl ModelParam {
    fn new(name: &str, value: &str) -> Self {
        Self {
            name: name.to_ascii_lowercase(),
            value: value.to_string(),
            numeric: parse_value(value),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ModelKind {
    Device {
        device: DeviceType,
        level: Option<f64>,
        version: Option<String>,
    },
    Subcircuit {
        pins: Vec<String>,
        /// Statements between `.subckt` and `.ends`, comments removed.
        body: Vec<String>,
    },
}

/// A model loaded from a library. Never mutated after construction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpiceModel {
    name: String,
    kind: ModelKind,
    params: Vec<ModelParam>,
    #[serde(skip)]
    source: String,
}

impl SpiceModel {
    /// Build a model from the full text of a `.model` or `.subckt` statement.
    ///
    /// `library` holds the models loaded so far; `ako:` models look their
    /// base model up in it.
    pub fn create(library: &SpiceLibrary, text: &str) -> Result<Self, ModelError> {
        let statements = logical_statements(text);
        let Some(first) = statements.first() else {
            return Err(ModelError::NotAModel(text.trim().to_string()));
        };

        let keyword = first.split_whitespace().next().unwrap_or_default();
        if keyword.eq_ignore_ascii_case(".model") {
            create_device_model(library, first, text)
        } else if keyword.eq_ignore_ascii_case(".subckt") {
            create_subcircuit(&statements, text)
        } else {
            Err(ModelError::NotAModel(first.clone()))
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &ModelKind {
        &self.kind
    }

    pub fn params(&self) -> &[ModelParam] {
        &self.params
    }

    /// Original statement text, as it appeared in the library.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn is_subcircuit(&self) -> bool {
        matches!(self.kind, ModelKind::Subcircuit { .. })
    }

    pub fn device_type(&self) -> Option<DeviceType> {
        match self.kind {
            ModelKind::Device { device, .. } => Some(device),
            ModelKind::Subcircuit { .. } => None,
        }
    }

    /// Parameter by name, case-insensitive.
    pub fn param(&self, name: &str) -> Option<&ModelParam> {
        self.params.iter().find(|p| p.name.eq_ignore_ascii_case(name))
    }

    pub fn param_value(&self, name: &str) -> Option<f64> {
        self.param(name).and_then(|p| p.numeric)
    }
}

fn create_device_model(
    library: &SpiceLibrary,
    statement: &str,
    source: &str,
) -> Result<SpiceModel, ModelError> {
    let after_keyword = skip_token(statement);
    let (name, rest) = split_name(after_keyword);
    if name.is_empty() {
        return Err(ModelError::MissingName);
    }
    let rest = rest.trim_start();

    let (device, params) = if starts_with_ignore_case(rest, "ako:") {
        let rest = rest["ako:".len()..].trim_start();
        let (base_name, rest) = split_name(rest);
        let base = library
            .find_model(base_name)
            .ok_or_else(|| ModelError::AkoBaseNotFound {
                model: name.to_string(),
                base: base_name.to_string(),
            })?;
        let Some(base_device) = base.device_type() else {
            return Err(ModelError::AkoBaseIsSubcircuit {
                model: name.to_string(),
                base: base_name.to_string(),
            });
        };

        // An optional type keyword may precede the overrides.
        let rest = rest.trim_start();
        let (type_token, after_type) = split_name(rest);
        let is_type = !type_token.is_empty()
            && !type_token.contains('=')
            && !after_type.trim_start().starts_with('=');
        let (device, rest) = if is_type {
            let device = DeviceType::from_spice(type_token).ok_or_else(|| ModelError::UnknownType {
                model: name.to_string(),
                type_name: type_token.to_string(),
            })?;
            (device, after_type)
        } else {
            (base_device, rest)
        };

        let mut params = base.params().to_vec();
        for param in parse_params(name, rest)? {
            match params.iter_mut().find(|p| p.name == param.name) {
                Some(existing) => *existing = param,
                None => params.push(param),
            }
        }
        (device, params)
    } else {
        let (type_token, rest) = split_name(rest);
        if type_token.is_empty() {
            return Err(ModelError::MissingType {
                model: name.to_string(),
            });
        }
        let device = DeviceType::from_spice(type_token).ok_or_else(|| ModelError::UnknownType {
            model: name.to_string(),
            type_name: type_token.to_string(),
        })?;
        (device, parse_params(name, rest)?)
    };

    let level = params
        .iter()
        .find(|p| p.name == "level")
        .and_then(|p| p.numeric);
    let version = params
        .iter()
        .find(|p| p.name == "version")
        .map(|p| p.value.trim_matches(|c| c == '\'' || c == '"').to_string());

    Ok(SpiceModel {
        name: name.to_string(),
        kind: ModelKind::Device {
            device,
            level,
            version,
        },
        params,
        source: source.to_string(),
    })
}

fn create_subcircuit(statements: &[String], source: &str) -> Result<SpiceModel, ModelError> {
    let header = &statements[0];
    let (name, rest) = split_name(skip_token(header).trim_start());
    if name.is_empty() {
        return Err(ModelError::MissingName);
    }

    let ends = statements.last().filter(|s| {
        statements.len() > 1
            && s.split_whitespace()
                .next()
                .is_some_and(|k| k.eq_ignore_ascii_case(".ends"))
    });
    if ends.is_none() {
        return Err(ModelError::MissingEnds {
            model: name.to_string(),
        });
    }

    // Pins run up to `params:` or the first `name=value` token.
    let mut pins = Vec::new();
    let mut param_text = String::new();
    let mut tokens = rest.split_whitespace().peekable();
    while let Some(token) = tokens.next() {
        if token.eq_ignore_ascii_case("params:") {
            param_text = tokens.collect::<Vec<_>>().join(" ");
            break;
        }
        if token.contains('=') || tokens.peek().is_some_and(|t| t.starts_with('=')) {
            let remaining: Vec<_> = std::iter::once(token).chain(tokens).collect();
            param_text = remaining.join(" ");
            break;
        }
        pins.push(token.to_string());
    }

    let params = parse_params(name, &param_text)?;
    let body = statements[1..statements.len() - 1].to_vec();

    Ok(SpiceModel {
        name: name.to_string(),
        kind: ModelKind::Subcircuit { pins, body },
        params,
        source: source.to_string(),
    })
}

/// Join continuation lines and drop comments and blank lines.
fn logical_statements(text: &str) -> Vec<String> {
    let mut statements: Vec<String> = Vec::new();

    for line in text.lines() {
        let line = strip_inline_comment(line);
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('*') {
            continue;
        }
        if let Some(continuation) = trimmed.strip_prefix('+') {
            if let Some(last) = statements.last_mut() {
                last.push(' ');
                last.push_str(continuation.trim());
                continue;
            }
        }
        statements.push(trimmed.to_string());
    }

    statements
}

/// Remove `;` comments and ngspice-style ` $ ` comments.
fn strip_inline_comment(line: &str) -> &str {
    match inline_comment_start(line) {
        Some(idx) => &line[..idx],
        None => line,
    }
}

fn skip_token(text: &str) -> &str {
    let text = text.trim_start();
    match text.find(char::is_whitespace) {
        Some(idx) => &text[idx..],
        None => "",
    }
}

/// Split off a name that ends at whitespace or `(`.
fn split_name(text: &str) -> (&str, &str) {
    let text = text.trim_start();
    let end = text
        .find(|c: char| c.is_whitespace() || c == '(')
        .unwrap_or(text.len());
    (&text[..end], &text[end..])
}

fn starts_with_ignore_case(text: &str, prefix: &str) -> bool {
    text.len() >= prefix.len()
        && text.is_char_boundary(prefix.len())
        && text[..prefix.len()].eq_ignore_ascii_case(prefix)
}

#[derive(Debug, PartialEq)]
enum ParamToken<'a> {
    Word(&'a str),
    Equals,
}

/// Tokenize a parameter list. Parentheses and commas separate tokens; brace
/// expressions are kept whole.
fn param_tokens<'a>(model: &str, text: &'a str) -> Result<Vec<ParamToken<'a>>, ModelError> {
    let unbalanced = || ModelError::UnbalancedParens {
        model: model.to_string(),
    };

    let mut tokens = Vec::new();
    let mut paren_depth = 0i32;
    let mut word_start: Option<usize> = None;
    let mut brace_depth = 0i32;

    for (idx, ch) in text.char_indices() {
        if brace_depth > 0 {
            match ch {
                '{' => brace_depth += 1,
                '}' => brace_depth -= 1,
                _ => {}
            }
            continue;
        }

        let separator = match ch {
            '{' => {
                brace_depth = 1;
                word_start.get_or_insert(idx);
                false
            }
            '(' => {
                paren_depth += 1;
                true
            }
            ')' => {
                paren_depth -= 1;
                if paren_depth < 0 {
                    return Err(unbalanced());
                }
                true
            }
            '=' => true,
            ',' => true,
            c if c.is_whitespace() => true,
            _ => {
                word_start.get_or_insert(idx);
                false
            }
        };

        if separator {
            if let Some(start) = word_start.take() {
                tokens.push(ParamToken::Word(&text[start..idx]));
            }
            if ch == '=' {
                tokens.push(ParamToken::Equals);
            }
        }
    }

    if paren_depth != 0 || brace_depth != 0 {
        return Err(unbalanced());
    }
    if let Some(start) = word_start {
        tokens.push(ParamToken::Word(&text[start..]));
    }

    Ok(tokens)
}

fn parse_params(model: &str, text: &str) -> Result<Vec<ModelParam>, ModelError> {
    let tokens = param_tokens(model, text)?;
    let malformed = |token: &str| ModelError::MalformedParam {
        model: model.to_string(),
        token: token.to_string(),
    };

    let mut params = Vec::new();
    let mut iter = tokens.into_iter().peekable();
    while let Some(token) = iter.next() {
        let ParamToken::Word(name) = token else {
            return Err(malformed("="));
        };
        if !matches!(iter.peek(), Some(ParamToken::Equals)) {
            // Bare flag, e.g. `pchan` on a VDMOS model.
            params.push(ModelParam::new(name, ""));
            continue;
        }
        iter.next();
        match iter.next() {
            Some(ParamToken::Word(value)) => params.push(ModelParam::new(name, value)),
            _ => return Err(malformed(name)),
        }
    }

    Ok(params)
}
